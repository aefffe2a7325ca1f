//! ZIP archive assembly and length prediction.
//!
//! This module produces ZIP archives as a stream of byte chunks, and computes the
//! exact length of such an archive ahead of time from member metadata alone.
//!
//! ## Architecture
//!
//! - [`name`] and [`date`]: encoding of member names and modification times
//! - [`entry`]: members and the inputs they are normalised from
//! - [`layout`]: per-member and end-of-archive layout decisions (classic or Zip64
//!   fields, data descriptors, extra fields)
//! - [`structures`]: byte layout of every ZIP record
//! - [`assembler`]: the streaming encoder, [`ZipStream`]
//! - [`predictor`]: the length predictor, [`predict_length`]
//!
//! The encoder and the predictor make every size-affecting decision through
//! [`layout`], so for members with known sizes the predicted length is exactly the
//! number of bytes the stream emits.
//!
//! ## ZIP Format Overview
//!
//! The archive is written front to back:
//! 1. For each member, a Local File Header, the stored data, and a data descriptor
//!    when the CRC or size was not known before the data
//! 2. Central Directory with metadata for all members
//! 3. ZIP64 End of Central Directory and its locator, when any field overflowed
//! 4. End of Central Directory (EOCD) record
//!
//! ## Limitations
//!
//! - Members are always stored, never compressed
//! - No encryption support
//! - No archive comments

mod assembler;
pub mod date;
mod entry;
pub mod layout;
pub mod name;
mod options;
mod predictor;
pub mod structures;

pub use assembler::ZipStream;
pub use date::{DosDateTime, ModTime};
pub use entry::{DeclaredSize, Entry, EntryMetadata, Input};
pub use name::{EntryName, Utf8Policy};
pub use options::ArchiveOptions;
pub use predictor::predict_length;
