use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{Result, Write};

/// Compression method "stored": data is written verbatim
pub const METHOD_STORED: u16 = 0;

/// Version needed to extract plain stored members
pub const VERSION_DEFAULT: u16 = 20;
/// Version needed once Zip64 fields are involved
pub const VERSION_ZIP64: u16 = 45;
/// Unix host, ZIP format version 4.5
pub const VERSION_MADE_BY: u16 = (3 << 8) | VERSION_ZIP64;

/// General purpose flag bit 3: sizes and CRC follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;
/// General purpose flag bit 11: name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Unix mode and DOS attributes for the external attribute field
pub const FILE_ATTRIBUTES: u32 = 0o100644 << 16;
pub const DIRECTORY_ATTRIBUTES: u32 = (0o040755 << 16) | 0x10;

/// Sentinel written in a 32-bit field whose value lives in the Zip64 extra field
pub const SENTINEL_U32: u32 = 0xFFFFFFFF;
/// Sentinel written in a 16-bit count field of a Zip64 archive
pub const SENTINEL_U16: u16 = 0xFFFF;

/// Zip64 extended information extra field
pub const ZIP64_EXTRA_ID: u16 = 0x0001;
/// Extended timestamp extra field ("UT")
pub const EXTENDED_TIMESTAMP_ID: u16 = 0x5455;
/// Header (4) + flags (1) + mtime (4)
pub const EXTENDED_TIMESTAMP_LEN: u64 = 9;
/// Extra field header: id + data size
pub const EXTRA_HEADER_LEN: u64 = 4;

/// Local File Header (LFH) - 30 bytes
pub struct LocalFileHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name: &'a [u8],
    pub extra_field: &'a [u8],
}

impl LocalFileHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x03\x04";
    pub const SIZE: u64 = 30;

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(METHOD_STORED)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(self.extra_field.len() as u16)?;
        out.write_all(self.file_name)?;
        out.write_all(self.extra_field)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes
pub struct CentralDirectoryHeader<'a> {
    pub version_needed: u16,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attrs: u32,
    pub lfh_offset: u32,
    pub file_name: &'a [u8],
    pub extra_field: &'a [u8],
}

impl CentralDirectoryHeader<'_> {
    pub const SIGNATURE: &'static [u8] = b"PK\x01\x02";
    pub const SIZE: u64 = 46;

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(METHOD_STORED)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(self.file_name.len() as u16)?;
        out.write_u16::<LittleEndian>(self.extra_field.len() as u16)?;
        out.write_u16::<LittleEndian>(0)?; // comment length
        out.write_u16::<LittleEndian>(0)?; // disk number start
        out.write_u16::<LittleEndian>(0)?; // internal attributes
        out.write_u32::<LittleEndian>(self.external_attrs)?;
        out.write_u32::<LittleEndian>(self.lfh_offset)?;
        out.write_all(self.file_name)?;
        out.write_all(self.extra_field)
    }
}

/// Data descriptor trailing a member whose CRC or size was deferred.
/// 16 bytes, or 24 with 64-bit sizes.
pub struct DataDescriptor {
    pub crc32: u32,
    pub size: u64,
    pub zip64: bool,
}

impl DataDescriptor {
    pub const SIGNATURE: &'static [u8] = b"PK\x07\x08";
    pub const SIZE: u64 = 16;
    pub const ZIP64_SIZE: u64 = 24;

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        if self.zip64 {
            out.write_u64::<LittleEndian>(self.size)?;
            out.write_u64::<LittleEndian>(self.size)
        } else {
            out.write_u32::<LittleEndian>(self.size as u32)?;
            out.write_u32::<LittleEndian>(self.size as u32)
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: u64 = 22;

    /// Classic record of a Zip64 archive: every field defers to the Zip64 record
    pub fn zip64_sentinels() -> Self {
        Self {
            total_entries: SENTINEL_U16,
            cd_size: SENTINEL_U32,
            cd_offset: SENTINEL_U32,
        }
    }

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?; // disk number
        out.write_u16::<LittleEndian>(0)?; // disk with central directory
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u16::<LittleEndian>(self.total_entries)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(0) // comment length
    }
}

/// ZIP64 End of Central Directory - 56 bytes
pub struct Zip64EOCD {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64EOCD {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const SIZE: u64 = 56;

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        // size of the remaining record, excluding signature and this field
        out.write_u64::<LittleEndian>(Self::SIZE - 12)?;
        out.write_u16::<LittleEndian>(VERSION_MADE_BY)?;
        out.write_u16::<LittleEndian>(VERSION_ZIP64)?;
        out.write_u32::<LittleEndian>(0)?; // disk number
        out.write_u32::<LittleEndian>(0)?; // disk with central directory
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.total_entries)?;
        out.write_u64::<LittleEndian>(self.cd_size)?;
        out.write_u64::<LittleEndian>(self.cd_offset)
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
pub struct Zip64EOCDLocator {
    pub eocd64_offset: u64,
}

impl Zip64EOCDLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: u64 = 20;

    pub fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(Self::SIGNATURE)?;
        out.write_u32::<LittleEndian>(0)?; // disk with the Zip64 EOCD
        out.write_u64::<LittleEndian>(self.eocd64_offset)?;
        out.write_u32::<LittleEndian>(1) // total disks
    }
}

/// Append a Zip64 extended information field holding `values` in order
pub fn write_zip64_extra<W: Write>(out: &mut W, values: &[u64]) -> Result<()> {
    out.write_u16::<LittleEndian>(ZIP64_EXTRA_ID)?;
    out.write_u16::<LittleEndian>((values.len() * 8) as u16)?;
    for value in values {
        out.write_u64::<LittleEndian>(*value)?;
    }
    Ok(())
}

/// Append an extended timestamp field carrying the modification time only
pub fn write_extended_timestamp<W: Write>(out: &mut W, mtime: i32) -> Result<()> {
    out.write_u16::<LittleEndian>(EXTENDED_TIMESTAMP_ID)?;
    out.write_u16::<LittleEndian>((EXTENDED_TIMESTAMP_LEN - EXTRA_HEADER_LEN) as u16)?;
    out.write_u8(0x01)?; // mtime present
    out.write_i32::<LittleEndian>(mtime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_records_have_their_documented_sizes() {
        let mut buf = Vec::new();
        LocalFileHeader {
            version_needed: VERSION_DEFAULT,
            flags: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: 0,
            uncompressed_size: 0,
            file_name: b"",
            extra_field: b"",
        }
        .write(&mut buf)
        .unwrap();
        assert_eq!(buf.len() as u64, LocalFileHeader::SIZE);

        buf.clear();
        DataDescriptor {
            crc32: 1,
            size: 2,
            zip64: false,
        }
        .write(&mut buf)
        .unwrap();
        assert_eq!(buf.len() as u64, DataDescriptor::SIZE);

        buf.clear();
        DataDescriptor {
            crc32: 1,
            size: 2,
            zip64: true,
        }
        .write(&mut buf)
        .unwrap();
        assert_eq!(buf.len() as u64, DataDescriptor::ZIP64_SIZE);

        buf.clear();
        EndOfCentralDirectory::zip64_sentinels().write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, EndOfCentralDirectory::SIZE);
        assert_eq!(&buf[8..10], b"\xFF\xFF");

        buf.clear();
        Zip64EOCD {
            total_entries: 1,
            cd_size: 2,
            cd_offset: 3,
        }
        .write(&mut buf)
        .unwrap();
        assert_eq!(buf.len() as u64, Zip64EOCD::SIZE);

        buf.clear();
        Zip64EOCDLocator { eocd64_offset: 9 }.write(&mut buf).unwrap();
        assert_eq!(buf.len() as u64, Zip64EOCDLocator::SIZE);
    }

    #[test]
    fn central_header_layout() {
        let mut buf = Vec::new();
        CentralDirectoryHeader {
            version_needed: VERSION_DEFAULT,
            flags: FLAG_UTF8,
            last_mod_time: 0x1234,
            last_mod_date: 0x5678,
            crc32: 0xDEADBEEF,
            compressed_size: 5,
            uncompressed_size: 5,
            external_attrs: FILE_ATTRIBUTES,
            lfh_offset: 42,
            file_name: b"a.txt",
            extra_field: b"",
        }
        .write(&mut buf)
        .unwrap();

        assert_eq!(buf.len() as u64, CentralDirectoryHeader::SIZE + 5);
        assert_eq!(&buf[0..4], CentralDirectoryHeader::SIGNATURE);
        assert_eq!(u16::from_le_bytes([buf[8], buf[9]]), FLAG_UTF8);
        assert_eq!(u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]), 0xDEADBEEF);
        assert_eq!(u32::from_le_bytes([buf[42], buf[43], buf[44], buf[45]]), 42);
        assert_eq!(&buf[46..], b"a.txt");
    }

    #[test]
    fn extra_fields() {
        let mut buf = Vec::new();
        write_zip64_extra(&mut buf, &[1, 2]).unwrap();
        assert_eq!(buf.len(), 20);
        assert_eq!(&buf[0..4], &[0x01, 0x00, 16, 0]);

        buf.clear();
        write_extended_timestamp(&mut buf, -1).unwrap();
        assert_eq!(buf.len() as u64, EXTENDED_TIMESTAMP_LEN);
        assert_eq!(buf, [0x55, 0x54, 5, 0, 1, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
