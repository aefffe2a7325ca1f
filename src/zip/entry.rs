//! Archive members and the inputs they are built from.
//!
//! Callers describe members with one of the [`Input`] variants. Normalisation turns
//! every variant into the same [`EntryMetadata`] (everything the layout depends on)
//! and, for the encoder, an [`Entry`] pairing that metadata with a byte source.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::{Result, ZipError};
use crate::io::{BufferSource, ByteSource, EmptySource, ReaderSource};

use super::date::ModTime;
use super::name::{EntryName, encode_name};
use super::options::ArchiveOptions;

/// Size of a member as known before its data is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredSize {
    Known(u64),
    Unknown,
}

impl From<Option<u64>> for DeclaredSize {
    fn from(value: Option<u64>) -> Self {
        value.map_or(DeclaredSize::Unknown, DeclaredSize::Known)
    }
}

/// Normalised description of one member, without its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Encoded name; a trailing `/` makes this a directory member
    pub name: Vec<u8>,
    /// Whether readers must decode the name as UTF-8
    pub utf8: bool,
    pub modified: ModTime,
    pub size: DeclaredSize,
    /// CRC-32 of the data, when known before the data is read
    pub crc32: Option<u32>,
}

impl EntryMetadata {
    pub fn new(
        name: EntryName,
        size: DeclaredSize,
        modified: Option<DateTime<Utc>>,
        options: &ArchiveOptions,
    ) -> Result<Self> {
        let (name, utf8) = encode_name(name, options.utf8_policy)?;
        let modified = modified.map_or_else(ModTime::now, ModTime::from_datetime);
        let is_directory = name.ends_with(b"/");

        Ok(Self {
            name,
            utf8,
            modified,
            size: if is_directory {
                DeclaredSize::Known(0)
            } else {
                size
            },
            crc32: None,
        })
    }

    pub fn with_crc32(mut self, crc32: u32) -> Self {
        self.crc32 = Some(crc32);
        self
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with(b"/")
    }

    /// Name for messages; lossy for names that aren't UTF-8
    pub fn display_name(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }
}

/// A member ready to be encoded: metadata plus the source of its bytes
pub struct Entry {
    pub metadata: EntryMetadata,
    pub source: Box<dyn ByteSource>,
}

impl Entry {
    pub fn new(metadata: EntryMetadata, source: impl ByteSource + 'static) -> Self {
        Self {
            metadata,
            source: Box::new(source),
        }
    }
}

/// The shapes of input a member can be built from.
pub enum Input {
    /// A local file or directory; name defaults to the path's last component
    File {
        path: PathBuf,
        name: Option<EntryName>,
    },
    /// Incrementally produced bytes, optionally with a size known up front
    Stream {
        name: EntryName,
        size: Option<u64>,
        modified: Option<DateTime<Utc>>,
        source: Box<dyn ByteSource>,
    },
    /// Data already in memory; size and checksum are known
    Buffer {
        name: EntryName,
        data: Bytes,
        modified: Option<DateTime<Utc>>,
    },
    /// A directory member; a trailing `/` is added when missing
    Directory {
        name: EntryName,
        modified: Option<DateTime<Utc>>,
    },
    /// Metadata only, usable for length prediction but not for encoding
    Meta {
        name: EntryName,
        size: Option<u64>,
        modified: Option<DateTime<Utc>>,
        crc32: Option<u32>,
    },
}

impl Input {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Input::File {
            path: path.into(),
            name: None,
        }
    }

    pub fn buffer(name: impl Into<EntryName>, data: impl Into<Bytes>) -> Self {
        Input::Buffer {
            name: name.into(),
            data: data.into(),
            modified: None,
        }
    }

    pub fn directory(name: impl Into<EntryName>) -> Self {
        Input::Directory {
            name: name.into(),
            modified: None,
        }
    }

    pub fn stream(
        name: impl Into<EntryName>,
        size: Option<u64>,
        source: impl ByteSource + 'static,
    ) -> Self {
        Input::Stream {
            name: name.into(),
            size,
            modified: None,
            source: Box::new(source),
        }
    }

    /// Describe the member without touching its data.
    pub async fn metadata(&self, options: &ArchiveOptions) -> Result<EntryMetadata> {
        match self {
            Input::File { path, name } => {
                let (metadata, _) = stat_file(path, name.clone(), options).await?;
                Ok(metadata)
            }
            Input::Stream {
                name, size, modified, ..
            } => EntryMetadata::new(name.clone(), (*size).into(), *modified, options),
            Input::Buffer {
                name,
                data,
                modified,
            } => buffer_metadata(name.clone(), data, *modified, options),
            Input::Directory { name, modified } => EntryMetadata::new(
                name.clone().into_directory(),
                DeclaredSize::Known(0),
                *modified,
                options,
            ),
            Input::Meta {
                name,
                size,
                modified,
                crc32,
            } => {
                let metadata = EntryMetadata::new(name.clone(), (*size).into(), *modified, options)?;
                Ok(match crc32 {
                    Some(crc) => metadata.with_crc32(*crc),
                    None => metadata,
                })
            }
        }
    }

    /// Normalise into an encodable member, opening files as needed.
    pub async fn into_entry(self, options: &ArchiveOptions) -> Result<Entry> {
        match self {
            Input::File { path, name } => {
                let (metadata, is_dir) = stat_file(&path, name, options).await?;
                if is_dir {
                    return Ok(Entry::new(metadata, EmptySource));
                }
                let source = ReaderSource::open(&path).await?;
                Ok(Entry::new(metadata, source))
            }
            Input::Stream {
                name,
                size,
                modified,
                source,
            } => Ok(Entry {
                metadata: EntryMetadata::new(name, size.into(), modified, options)?,
                source,
            }),
            Input::Buffer {
                name,
                data,
                modified,
            } => {
                let metadata = buffer_metadata(name, &data, modified, options)?;
                Ok(Entry::new(metadata, BufferSource::new(data)))
            }
            Input::Directory { name, modified } => {
                let metadata = EntryMetadata::new(
                    name.into_directory(),
                    DeclaredSize::Known(0),
                    modified,
                    options,
                )?;
                Ok(Entry::new(metadata, EmptySource))
            }
            Input::Meta { name, .. } => Err(ZipError::MissingSource {
                name: match name {
                    EntryName::Text(s) => s,
                    EntryName::Raw(b) => String::from_utf8_lossy(&b).into_owned(),
                },
            }),
        }
    }
}

fn buffer_metadata(
    name: EntryName,
    data: &Bytes,
    modified: Option<DateTime<Utc>>,
    options: &ArchiveOptions,
) -> Result<EntryMetadata> {
    let metadata = EntryMetadata::new(
        name,
        DeclaredSize::Known(data.len() as u64),
        modified,
        options,
    )?;
    Ok(metadata.with_crc32(crc32fast::hash(data)))
}

async fn stat_file(
    path: &Path,
    name: Option<EntryName>,
    options: &ArchiveOptions,
) -> Result<(EntryMetadata, bool)> {
    let stat = tokio::fs::metadata(path).await?;
    let name = name.or_else(|| path_name(path)).ok_or(ZipError::EmptyName)?;
    let modified = stat.modified().ok().map(DateTime::<Utc>::from);

    let metadata = if stat.is_dir() {
        EntryMetadata::new(name.into_directory(), DeclaredSize::Known(0), modified, options)?
    } else {
        EntryMetadata::new(name, DeclaredSize::Known(stat.len()), modified, options)?
    };
    Ok((metadata, stat.is_dir()))
}

/// Last component of a path, as raw bytes where the platform allows it
fn path_name(path: &Path) -> Option<EntryName> {
    let file_name = path.file_name()?;

    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        Some(EntryName::Raw(file_name.as_bytes().to_vec()))
    }

    #[cfg(not(unix))]
    {
        Some(EntryName::Text(file_name.to_string_lossy().into_owned()))
    }
}
