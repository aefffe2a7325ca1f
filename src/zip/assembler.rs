//! Streaming ZIP encoder.
//!
//! [`ZipStream`] turns an ordered sequence of members into archive bytes, one chunk
//! per pull. It never seeks back: anything that is only known once a member's data
//! has passed (its CRC, or its size when undeclared) goes into the data descriptor
//! that trails the member and into the central directory written at the end.

use bytes::Bytes;
use crc32fast::Hasher as Crc32;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{Result, ZipError};
use crate::io::ByteSource;

use super::entry::{DeclaredSize, Entry, EntryMetadata};
use super::layout::{EndLayout, MemberLayout, ZIP64_LIMIT, check_entry_count};
use super::options::ArchiveOptions;
use super::structures::*;

/// Where members come from: a list known up front, or a channel fed by another task
enum EntryFeed {
    Queue(std::vec::IntoIter<Entry>),
    Channel(mpsc::Receiver<Result<Entry>>),
}

impl EntryFeed {
    async fn next(&mut self) -> Option<Result<Entry>> {
        match self {
            EntryFeed::Queue(entries) => entries.next().map(Ok),
            EntryFeed::Channel(rx) => rx.recv().await,
        }
    }
}

enum State {
    /// Between members; the next pull starts a member or the central directory
    Members,
    /// Draining the current member's source
    Data(Box<ActiveMember>),
    Done,
    Failed,
}

/// The member whose data is currently being streamed
struct ActiveMember {
    metadata: EntryMetadata,
    layout: MemberLayout,
    offset: u64,
    source: Box<dyn ByteSource>,
    crc: Crc32,
    written: u64,
}

impl ActiveMember {
    /// Account for a chunk before it is forwarded.
    fn consume(&mut self, chunk: &[u8]) -> Result<()> {
        let written = self.written + chunk.len() as u64;
        match self.metadata.size {
            DeclaredSize::Known(declared) if written > declared => {
                return Err(ZipError::SizeMismatch {
                    name: self.metadata.display_name(),
                    declared,
                    actual: written,
                });
            }
            DeclaredSize::Unknown if !self.layout.zip64_sizes && written >= ZIP64_LIMIT => {
                return Err(ZipError::FieldOverflow {
                    what: format!("Size of '{}'", self.metadata.display_name()),
                });
            }
            _ => {}
        }

        self.crc.update(chunk);
        self.written = written;
        Ok(())
    }
}

/// A finished member, waiting for the central directory
struct CentralRecord {
    metadata: EntryMetadata,
    layout: MemberLayout,
    offset: u64,
    crc32: u32,
    size: u64,
}

impl CentralRecord {
    fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut extra = Vec::with_capacity(self.layout.central_extra_len() as usize);
        let mut zip64_values = Vec::with_capacity(3);
        if self.layout.zip64_sizes {
            zip64_values.extend([self.size, self.size]);
        }
        if self.layout.zip64_offset {
            zip64_values.push(self.offset);
        }
        if !zip64_values.is_empty() {
            write_zip64_extra(&mut extra, &zip64_values)?;
        }
        if let Some(mtime) = self.metadata.modified.unix {
            write_extended_timestamp(&mut extra, mtime)?;
        }
        debug_assert_eq!(extra.len() as u64, self.layout.central_extra_len());

        let size = if self.layout.zip64_sizes {
            SENTINEL_U32
        } else {
            self.size as u32
        };

        CentralDirectoryHeader {
            version_needed: self.layout.central_version_needed(),
            flags: self.layout.flags(self.metadata.utf8),
            last_mod_time: self.metadata.modified.dos.time,
            last_mod_date: self.metadata.modified.dos.date,
            crc32: self.crc32,
            compressed_size: size,
            uncompressed_size: size,
            external_attrs: if self.layout.is_directory {
                DIRECTORY_ATTRIBUTES
            } else {
                FILE_ATTRIBUTES
            },
            lfh_offset: if self.layout.zip64_offset {
                SENTINEL_U32
            } else {
                self.offset as u32
            },
            file_name: &self.metadata.name,
            extra_field: &extra,
        }
        .write(out)?;
        Ok(())
    }
}

/// Encode the local file header of a member.
fn local_header(metadata: &EntryMetadata, layout: &MemberLayout) -> Result<Vec<u8>> {
    let declared = match metadata.size {
        DeclaredSize::Known(n) if !layout.is_directory => n,
        _ => 0,
    };

    let mut extra = Vec::with_capacity(layout.local_extra_len() as usize);
    if layout.zip64_sizes {
        write_zip64_extra(&mut extra, &[declared, declared])?;
    }
    if let Some(mtime) = metadata.modified.unix {
        write_extended_timestamp(&mut extra, mtime)?;
    }
    debug_assert_eq!(extra.len() as u64, layout.local_extra_len());

    let size = if layout.zip64_sizes {
        SENTINEL_U32
    } else {
        declared as u32
    };
    // a deferred CRC is zero here and written to the descriptor instead
    let crc32 = if layout.data_descriptor {
        0
    } else {
        metadata.crc32.unwrap_or(0)
    };

    let mut out = Vec::with_capacity(layout.local_header_len(metadata.name.len()) as usize);
    LocalFileHeader {
        version_needed: layout.local_version_needed(),
        flags: layout.flags(metadata.utf8),
        last_mod_time: metadata.modified.dos.time,
        last_mod_date: metadata.modified.dos.date,
        crc32,
        compressed_size: size,
        uncompressed_size: size,
        file_name: &metadata.name,
        extra_field: &extra,
    }
    .write(&mut out)?;
    Ok(out)
}

/// Lazily encoded ZIP archive.
///
/// Each call to [`next_chunk`](Self::next_chunk) produces the next piece of the
/// archive: a local header, a chunk of member data as it arrives from the source, a
/// data descriptor, or finally the central directory with the end records. Member
/// data is pulled only when the consumer asks for more, so a slow consumer slows
/// down the sources instead of filling memory.
///
/// ## Example
///
/// ```no_run
/// use zipstream::{ArchiveOptions, Input, ZipStream};
///
/// # async fn run() -> zipstream::Result<()> {
/// let options = ArchiveOptions::default();
/// let entries = vec![
///     Input::buffer("hello.txt", &b"hello"[..]).into_entry(&options).await?,
///     Input::directory("empty").into_entry(&options).await?,
/// ];
///
/// let mut stream = ZipStream::new(entries, options);
/// let mut out = tokio::io::stdout();
/// stream.write_to(&mut out).await?;
/// # Ok(())
/// # }
/// ```
pub struct ZipStream {
    feed: EntryFeed,
    options: ArchiveOptions,
    state: State,
    /// Bytes handed out so far; the offset of whatever comes next
    offset: u64,
    central: Vec<CentralRecord>,
    any_zip64: bool,
}

impl ZipStream {
    /// Encode a list of members in order.
    pub fn new(entries: Vec<Entry>, options: ArchiveOptions) -> Self {
        Self::with_feed(EntryFeed::Queue(entries.into_iter()), options)
    }

    /// Encode members as they arrive on a channel; the archive ends when every
    /// sender is dropped.
    ///
    /// A producer that fails to prepare a member sends the error instead, which
    /// aborts the archive before its central directory is written.
    pub fn from_channel(rx: mpsc::Receiver<Result<Entry>>, options: ArchiveOptions) -> Self {
        Self::with_feed(EntryFeed::Channel(rx), options)
    }

    fn with_feed(feed: EntryFeed, options: ArchiveOptions) -> Self {
        Self {
            feed,
            options,
            state: State::Members,
            offset: 0,
            central: Vec::new(),
            any_zip64: false,
        }
    }

    /// Total number of bytes produced so far.
    pub fn bytes_emitted(&self) -> u64 {
        self.offset
    }

    /// Produce the next chunk of the archive, or `None` once it is complete.
    ///
    /// # Errors
    ///
    /// Any error aborts the archive: the bytes produced so far do not form a valid
    /// ZIP, and every later call returns [`ZipError::Aborted`].
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.advance().await {
            Ok(Some(chunk)) => {
                self.offset += chunk.len() as u64;
                Ok(Some(chunk))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                log::debug!("Archive aborted after {} bytes: {}", self.offset, e);
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    /// Drain the whole archive into `writer`, returning the number of bytes written.
    pub async fn write_to<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> Result<u64> {
        let mut total = 0;
        while let Some(chunk) = self.next_chunk().await? {
            writer.write_all(&chunk).await?;
            total += chunk.len() as u64;
        }
        writer.flush().await?;
        Ok(total)
    }

    async fn advance(&mut self) -> Result<Option<Bytes>> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Members => {
                    return match self.feed.next().await {
                        Some(entry) => self.start_member(entry?).map(Some),
                        None => self.finish().map(Some),
                    };
                }
                State::Data(mut active) => {
                    let next = active.source.next_chunk().await;
                    let next = next.map_err(|source| ZipError::SourceRead {
                        name: active.metadata.display_name(),
                        source,
                    })?;

                    match next {
                        Some(chunk) => {
                            active.consume(&chunk)?;
                            self.state = State::Data(active);
                            if !chunk.is_empty() {
                                return Ok(Some(chunk));
                            }
                        }
                        None => {
                            let descriptor = self.finish_member(*active)?;
                            self.state = State::Members;
                            if descriptor.is_some() {
                                return Ok(descriptor);
                            }
                        }
                    }
                }
                State::Done => return Ok(None),
                State::Failed => {
                    self.state = State::Failed;
                    return Err(ZipError::Aborted);
                }
            }
        }
    }

    fn start_member(&mut self, entry: Entry) -> Result<Bytes> {
        let Entry { metadata, source } = entry;
        check_entry_count(self.central.len() as u64 + 1, &self.options)?;

        let layout = MemberLayout::plan(&metadata, self.offset, &self.options)?;
        let header = local_header(&metadata, &layout)?;
        debug_assert_eq!(
            header.len() as u64,
            layout.local_header_len(metadata.name.len())
        );

        log::trace!(
            "Member '{}' at offset {}: {:?}",
            metadata.display_name(),
            self.offset,
            layout
        );
        self.any_zip64 |= layout.uses_zip64();

        if layout.is_directory {
            // nothing to read, the source is dropped unread
            self.central.push(CentralRecord {
                metadata,
                layout,
                offset: self.offset,
                crc32: 0,
                size: 0,
            });
            self.state = State::Members;
        } else {
            self.state = State::Data(Box::new(ActiveMember {
                metadata,
                layout,
                offset: self.offset,
                source,
                crc: Crc32::new(),
                written: 0,
            }));
        }

        Ok(Bytes::from(header))
    }

    /// Validate a drained member and produce its data descriptor, if it has one.
    fn finish_member(&mut self, active: ActiveMember) -> Result<Option<Bytes>> {
        let ActiveMember {
            metadata,
            layout,
            offset,
            crc,
            written,
            ..
        } = active;
        let crc32 = crc.finalize();

        if let DeclaredSize::Known(declared) = metadata.size
            && written != declared
        {
            return Err(ZipError::SizeMismatch {
                name: metadata.display_name(),
                declared,
                actual: written,
            });
        }
        if let Some(declared) = metadata.crc32
            && declared != crc32
        {
            return Err(ZipError::CrcMismatch {
                name: metadata.display_name(),
                declared,
                actual: crc32,
            });
        }

        let descriptor = if layout.data_descriptor {
            let mut out = Vec::with_capacity(layout.descriptor_len() as usize);
            DataDescriptor {
                crc32,
                size: written,
                zip64: layout.zip64_sizes,
            }
            .write(&mut out)?;
            debug_assert_eq!(out.len() as u64, layout.descriptor_len());
            Some(Bytes::from(out))
        } else {
            None
        };

        log::debug!(
            "Member '{}': {} bytes, crc32 {:08x}",
            metadata.display_name(),
            written,
            crc32
        );

        self.central.push(CentralRecord {
            metadata,
            layout,
            offset,
            crc32,
            size: written,
        });
        Ok(descriptor)
    }

    /// Emit the central directory and the end records.
    fn finish(&mut self) -> Result<Bytes> {
        let cd_offset = self.offset;
        let mut out = Vec::new();
        for record in &self.central {
            record.write(&mut out)?;
        }

        let cd_size = out.len() as u64;
        let entries = self.central.len() as u64;
        let end = EndLayout::plan(entries, cd_offset, cd_size, self.any_zip64, &self.options)?;

        if end.zip64 {
            Zip64EOCD {
                total_entries: entries,
                cd_size,
                cd_offset,
            }
            .write(&mut out)?;
            Zip64EOCDLocator {
                eocd64_offset: cd_offset + cd_size,
            }
            .write(&mut out)?;
            EndOfCentralDirectory::zip64_sentinels().write(&mut out)?;
        } else {
            EndOfCentralDirectory {
                total_entries: entries as u16,
                cd_size: cd_size as u32,
                cd_offset: cd_offset as u32,
            }
            .write(&mut out)?;
        }
        debug_assert_eq!(out.len() as u64, cd_size + end.tail_len());

        log::debug!(
            "Archive complete: {} members, {} bytes{}",
            entries,
            cd_offset + out.len() as u64,
            if end.zip64 { " (zip64)" } else { "" }
        );
        Ok(Bytes::from(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{BufferSource, EmptySource};
    use crate::zip::ModTime;
    use chrono::{TimeZone, Utc};

    fn meta(name: &str, size: DeclaredSize) -> EntryMetadata {
        EntryMetadata {
            name: name.as_bytes().to_vec(),
            utf8: false,
            modified: ModTime::from_datetime(Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 0).unwrap()),
            size,
            crc32: None,
        }
    }

    async fn collect(stream: &mut ZipStream) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn empty_archive_is_a_bare_end_record() {
        let mut stream = ZipStream::new(Vec::new(), ArchiveOptions::default());
        let bytes = collect(&mut stream).await.unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[0..4], EndOfCentralDirectory::SIGNATURE);
        assert!(stream.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn known_size_without_crc_writes_a_classic_descriptor() {
        let entry = Entry::new(meta("a.txt", DeclaredSize::Known(5)), BufferSource::new(&b"hello"[..]));
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());

        let header = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(&header[0..4], LocalFileHeader::SIGNATURE);
        assert_eq!(u16::from_le_bytes([header[6], header[7]]), FLAG_DATA_DESCRIPTOR);
        assert_eq!(&header[18..26], &[5, 0, 0, 0, 5, 0, 0, 0]);

        let data = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(&data[..], b"hello");

        let descriptor = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(descriptor.len() as u64, DataDescriptor::SIZE);
        assert_eq!(&descriptor[0..4], DataDescriptor::SIGNATURE);
        assert_eq!(&descriptor[4..8], &0x3610A686u32.to_le_bytes());
    }

    #[tokio::test]
    async fn unknown_size_header_reserves_zip64_fields() {
        let entry = Entry::new(meta("s.bin", DeclaredSize::Unknown), BufferSource::new(&b"abc"[..]));
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());

        let header = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(u16::from_le_bytes([header[4], header[5]]), VERSION_ZIP64);
        assert_eq!(&header[18..26], &[0xFF; 8]);
        assert_eq!(header.len(), 30 + 5 + 20);

        stream.next_chunk().await.unwrap().unwrap();
        let descriptor = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(descriptor.len() as u64, DataDescriptor::ZIP64_SIZE);
        assert_eq!(&descriptor[8..16], &3u64.to_le_bytes());
    }

    #[tokio::test]
    async fn oversized_declared_size_uses_zip64_local_header() {
        let entry = Entry::new(meta("huge", DeclaredSize::Known(0xFFFFFFFF)), EmptySource);
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());

        let header = stream.next_chunk().await.unwrap().unwrap();
        assert_eq!(&header[18..26], &[0xFF; 8]);
        let extra = &header[30 + 4..];
        assert_eq!(&extra[0..4], &[0x01, 0x00, 16, 0]);
        assert_eq!(&extra[4..12], &0xFFFFFFFFu64.to_le_bytes());

        // the source ends right away, far short of the declared size
        assert!(matches!(
            stream.next_chunk().await,
            Err(ZipError::SizeMismatch { actual: 0, .. })
        ));
    }

    #[tokio::test]
    async fn errors_poison_the_stream() {
        let entry = Entry::new(meta("a", DeclaredSize::Known(2)), BufferSource::new(&b"abc"[..]));
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());

        stream.next_chunk().await.unwrap();
        assert!(matches!(
            stream.next_chunk().await,
            Err(ZipError::SizeMismatch {
                declared: 2,
                actual: 3,
                ..
            })
        ));
        assert!(matches!(stream.next_chunk().await, Err(ZipError::Aborted)));
        assert_eq!(stream.bytes_emitted(), 31);
    }

    #[tokio::test]
    async fn declared_crc_is_verified() {
        let entry = Entry::new(
            meta("a", DeclaredSize::Known(3)).with_crc32(0x12345678),
            BufferSource::new(&b"abc"[..]),
        );
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());
        let result = collect(&mut stream).await;
        assert!(matches!(
            result,
            Err(ZipError::CrcMismatch {
                declared: 0x12345678,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn oversized_names_fail_before_any_output() {
        let mut metadata = meta("x", DeclaredSize::Known(3));
        metadata.name = vec![b'x'; 70_000];
        let entry = Entry::new(metadata, BufferSource::new(&b"abc"[..]));
        let mut stream = ZipStream::new(vec![entry], ArchiveOptions::default());

        assert!(matches!(
            stream.next_chunk().await,
            Err(ZipError::NameTooLong { len: 70_000 })
        ));
        assert_eq!(stream.bytes_emitted(), 0);
    }
}
