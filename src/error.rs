//! Error types for archive assembly and length prediction.

use thiserror::Error;

/// Result type alias used throughout the library.
pub type Result<T> = std::result::Result<T, ZipError>;

/// Everything that can abort an archive.
///
/// None of these are recoverable mid-stream: once bytes have been handed to the
/// consumer, a truncated ZIP is not a smaller valid ZIP.
#[derive(Error, Debug)]
pub enum ZipError {
    /// A member produced a different number of bytes than it declared.
    #[error("Size mismatch for '{name}': declared {declared} bytes, source produced {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    /// A member's data did not match its declared CRC-32.
    #[error("CRC mismatch for '{name}': declared {declared:#010x}, data has {actual:#010x}")]
    CrcMismatch {
        name: String,
        declared: u32,
        actual: u32,
    },

    /// Member names are limited by the 16-bit length field.
    #[error("File name is {len} bytes long, the ZIP format allows at most 65535")]
    NameTooLong { len: usize },

    /// Every member needs a name.
    #[error("Every member must have a non-empty name")]
    EmptyName,

    /// More members than a classic end record can count, with Zip64 disabled.
    #[error("Archive has {count} members, more than 65535 requires Zip64")]
    TooManyEntries { count: u64 },

    /// A size or offset does not fit its 32-bit field and Zip64 is disabled.
    #[error("{what} does not fit in 32 bits and Zip64 is disabled")]
    FieldOverflow { what: String },

    /// The total length can only be predicted when every size is known.
    #[error("Cannot predict the archive length: size of '{name}' is unknown")]
    UnknownSize { name: String },

    /// A metadata-only input was handed to the encoder.
    #[error("Member '{name}' has no data source")]
    MissingSource { name: String },

    /// The byte source of a member failed mid-stream.
    #[error("Failed to read data for '{name}': {source}")]
    SourceRead {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream already failed; it cannot produce a valid archive anymore.
    #[error("Archive stream was aborted by an earlier error")]
    Aborted,
}
