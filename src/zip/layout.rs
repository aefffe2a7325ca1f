//! Record layout decisions shared by the encoder and the length predictor.
//!
//! Every choice that changes how many bytes a member or the archive tail occupies
//! is made here, from metadata and the running offset alone. [`ZipStream`] and
//! [`predict_length`] both call into this module with the same inputs, which is
//! what keeps the advertised length and the emitted length identical.
//!
//! [`ZipStream`]: super::ZipStream
//! [`predict_length`]: super::predict_length

use crate::error::{Result, ZipError};

use super::entry::{DeclaredSize, EntryMetadata};
use super::name::check_name;
use super::options::ArchiveOptions;
use super::structures::*;

/// Smallest value that no longer fits a classic 32-bit size or offset field
pub const ZIP64_LIMIT: u64 = 0xFFFFFFFF;

/// Largest member count a classic end record holds
pub const MAX_CLASSIC_ENTRIES: u64 = 0xFFFF;

/// Per-member layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLayout {
    pub is_directory: bool,
    /// Sizes are carried in a Zip64 extra field (local and central)
    pub zip64_sizes: bool,
    /// The start offset is carried in the central record's Zip64 extra field
    pub zip64_offset: bool,
    /// A data descriptor follows the member data
    pub data_descriptor: bool,
    pub extended_timestamp: bool,
}

impl MemberLayout {
    /// Decide the layout of a member starting at `offset`.
    ///
    /// Unknown sizes reserve Zip64 size fields (when allowed) so the descriptor width
    /// is fixed before the data is seen. A descriptor is needed whenever the CRC or
    /// the size has to be deferred past the data.
    pub fn plan(metadata: &EntryMetadata, offset: u64, options: &ArchiveOptions) -> Result<Self> {
        // metadata fields are public, so the name may not have gone through `encode_name`
        check_name(&metadata.name)?;

        let is_directory = metadata.is_directory();
        let size = if is_directory {
            DeclaredSize::Known(0)
        } else {
            metadata.size
        };

        let zip64_sizes = match size {
            DeclaredSize::Known(n) => n >= ZIP64_LIMIT,
            DeclaredSize::Unknown => options.allow_zip64,
        };
        if zip64_sizes && !options.allow_zip64 {
            return Err(ZipError::FieldOverflow {
                what: format!("Size of '{}'", metadata.display_name()),
            });
        }

        let zip64_offset = offset >= ZIP64_LIMIT;
        if zip64_offset && !options.allow_zip64 {
            return Err(ZipError::FieldOverflow {
                what: format!("Offset of '{}'", metadata.display_name()),
            });
        }

        let data_descriptor = match size {
            DeclaredSize::Known(0) => false,
            DeclaredSize::Known(_) => metadata.crc32.is_none(),
            DeclaredSize::Unknown => true,
        };

        Ok(Self {
            is_directory,
            zip64_sizes,
            zip64_offset,
            data_descriptor,
            extended_timestamp: metadata.modified.has_extended_timestamp(),
        })
    }

    pub fn uses_zip64(&self) -> bool {
        self.zip64_sizes || self.zip64_offset
    }

    pub fn flags(&self, utf8: bool) -> u16 {
        let mut flags = 0;
        if self.data_descriptor {
            flags |= FLAG_DATA_DESCRIPTOR;
        }
        if utf8 {
            flags |= FLAG_UTF8;
        }
        flags
    }

    pub fn local_version_needed(&self) -> u16 {
        if self.zip64_sizes {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        }
    }

    pub fn central_version_needed(&self) -> u16 {
        if self.uses_zip64() {
            VERSION_ZIP64
        } else {
            VERSION_DEFAULT
        }
    }

    pub fn local_extra_len(&self) -> u64 {
        let mut len = 0;
        if self.zip64_sizes {
            len += EXTRA_HEADER_LEN + 16;
        }
        if self.extended_timestamp {
            len += EXTENDED_TIMESTAMP_LEN;
        }
        len
    }

    pub fn local_header_len(&self, name_len: usize) -> u64 {
        LocalFileHeader::SIZE + name_len as u64 + self.local_extra_len()
    }

    pub fn descriptor_len(&self) -> u64 {
        match (self.data_descriptor, self.zip64_sizes) {
            (false, _) => 0,
            (true, false) => DataDescriptor::SIZE,
            (true, true) => DataDescriptor::ZIP64_SIZE,
        }
    }

    /// Number of 64-bit values in the central record's Zip64 extra field
    pub fn central_zip64_values(&self) -> u64 {
        let mut n = 0;
        if self.zip64_sizes {
            n += 2;
        }
        if self.zip64_offset {
            n += 1;
        }
        n
    }

    pub fn central_extra_len(&self) -> u64 {
        let mut len = 0;
        let values = self.central_zip64_values();
        if values > 0 {
            len += EXTRA_HEADER_LEN + 8 * values;
        }
        if self.extended_timestamp {
            len += EXTENDED_TIMESTAMP_LEN;
        }
        len
    }

    pub fn central_header_len(&self, name_len: usize) -> u64 {
        CentralDirectoryHeader::SIZE + name_len as u64 + self.central_extra_len()
    }
}

/// Reject the `count`-th member when it can't be recorded.
pub fn check_entry_count(count: u64, options: &ArchiveOptions) -> Result<()> {
    if count > MAX_CLASSIC_ENTRIES && !options.allow_zip64 {
        return Err(ZipError::TooManyEntries { count });
    }
    Ok(())
}

/// Layout of the archive tail, decided once every member is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndLayout {
    /// Zip64 end record and locator precede the classic end record
    pub zip64: bool,
}

impl EndLayout {
    pub fn plan(
        entries: u64,
        cd_offset: u64,
        cd_size: u64,
        any_member_zip64: bool,
        options: &ArchiveOptions,
    ) -> Result<Self> {
        check_entry_count(entries, options)?;

        let cd_overflow = cd_offset >= ZIP64_LIMIT || cd_size >= ZIP64_LIMIT;
        if cd_overflow && !options.allow_zip64 {
            return Err(ZipError::FieldOverflow {
                what: "Central directory offset".to_string(),
            });
        }

        Ok(Self {
            zip64: any_member_zip64 || entries > MAX_CLASSIC_ENTRIES || cd_overflow,
        })
    }

    pub fn tail_len(&self) -> u64 {
        if self.zip64 {
            Zip64EOCD::SIZE + Zip64EOCDLocator::SIZE + EndOfCentralDirectory::SIZE
        } else {
            EndOfCentralDirectory::SIZE
        }
    }
}
