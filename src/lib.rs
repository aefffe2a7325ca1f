//! # zipstream
//!
//! Lazily streamed ZIP archives whose total length is known before the first byte.
//!
//! This library assembles a ZIP archive from heterogeneous members (in-memory
//! buffers, local files, HTTP downloads, arbitrary async streams) and produces it
//! chunk by chunk, pulling member data only as fast as the consumer takes the
//! output. Nothing beyond the current chunk and the central directory metadata is
//! held in memory, which makes it suitable for on-the-fly downloads.
//!
//! Whenever every member's size is known up front, [`predict_length`] computes the
//! exact archive length from metadata alone, e.g. to send a `Content-Length` before
//! streaming the body.
//!
//! ## Features
//!
//! - Stored (uncompressed) members, streamed without buffering
//! - Members of unknown size via data descriptors
//! - ZIP64 records for members, offsets and counts beyond classic limits
//! - UTF-8 file names and extended timestamps
//! - Exact length prediction, in lock-step with the encoder
//!
//! ## Example
//!
//! ```no_run
//! use zipstream::{ArchiveOptions, HttpSource, Input, ZipStream, predict_length};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = ArchiveOptions::default();
//!     let inputs = vec![
//!         Input::buffer("README.txt", "hello"),
//!         Input::file("Cargo.toml"),
//!         HttpSource::open("https://example.com/data.csv").await?,
//!     ];
//!
//!     let mut entries = Vec::new();
//!     for input in inputs {
//!         entries.push(input.into_entry(&options).await?);
//!     }
//!
//!     // fails if the download did not announce its size
//!     if let Ok(length) = predict_length(entries.iter().map(|e| &e.metadata), &options) {
//!         println!("Content-Length: {length}");
//!     }
//!
//!     let mut stream = ZipStream::new(entries, options);
//!     stream.write_to(&mut tokio::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{BufferSource, ByteSource, HttpSource, ReaderSource};
pub use zip::{
    ArchiveOptions, DeclaredSize, Entry, EntryMetadata, EntryName, Input, Utf8Policy, ZipStream,
    predict_length,
};
