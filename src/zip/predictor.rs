use crate::error::{Result, ZipError};

use super::entry::{DeclaredSize, EntryMetadata};
use super::layout::{EndLayout, MemberLayout, check_entry_count};
use super::options::ArchiveOptions;

/// Compute the exact length of the archive [`ZipStream`](super::ZipStream) would
/// produce for these members, without touching any data.
///
/// # Errors
///
/// Returns [`ZipError::UnknownSize`] when a (non-directory) member has no declared
/// size, and the same layout errors the encoder would raise for these members.
pub fn predict_length<'a, I>(entries: I, options: &ArchiveOptions) -> Result<u64>
where
    I: IntoIterator<Item = &'a EntryMetadata>,
{
    let mut offset = 0u64;
    let mut cd_size = 0u64;
    let mut count = 0u64;
    let mut any_zip64 = false;

    for metadata in entries {
        let size = match metadata.size {
            _ if metadata.is_directory() => 0,
            DeclaredSize::Known(n) => n,
            DeclaredSize::Unknown => {
                return Err(ZipError::UnknownSize {
                    name: metadata.display_name(),
                });
            }
        };

        count += 1;
        check_entry_count(count, options)?;

        let layout = MemberLayout::plan(metadata, offset, options)?;
        offset += layout.local_header_len(metadata.name.len()) + size + layout.descriptor_len();
        cd_size += layout.central_header_len(metadata.name.len());
        any_zip64 |= layout.uses_zip64();
    }

    let end = EndLayout::plan(count, offset, cd_size, any_zip64, options)?;
    Ok(offset + cd_size + end.tail_len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::ModTime;
    use chrono::{TimeZone, Utc};

    fn meta(name: &str, size: DeclaredSize) -> EntryMetadata {
        EntryMetadata {
            name: name.as_bytes().to_vec(),
            utf8: true,
            modified: ModTime::from_datetime(Utc.with_ymd_and_hms(2023, 7, 4, 9, 30, 0).unwrap()),
            size,
            crc32: None,
        }
    }

    #[test]
    fn empty_archive() {
        let none: Vec<EntryMetadata> = Vec::new();
        assert_eq!(predict_length(&none, &ArchiveOptions::default()).unwrap(), 22);
    }

    #[test]
    fn sums_headers_data_descriptors_and_tail() {
        let entries = [
            meta("a.txt", DeclaredSize::Known(5)).with_crc32(0x3610A686),
            meta("b.txt", DeclaredSize::Known(7)),
            meta("dir/", DeclaredSize::Known(0)),
        ];
        let expected = (30 + 5 + 5)
            + (30 + 5 + 7 + 16)
            + (30 + 4)
            + (46 + 5) * 2
            + (46 + 4)
            + 22;
        assert_eq!(
            predict_length(&entries, &ArchiveOptions::default()).unwrap(),
            expected
        );
    }

    #[test]
    fn unknown_sizes_cannot_be_predicted() {
        let entries = [meta("stream", DeclaredSize::Unknown)];
        let err = predict_length(&entries, &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, ZipError::UnknownSize { name } if name == "stream"));

        // directories ignore their declared size
        let dirs = [meta("d/", DeclaredSize::Unknown)];
        assert!(predict_length(&dirs, &ArchiveOptions::default()).is_ok());
    }

    #[test]
    fn large_member_switches_to_zip64_everywhere() {
        let size = 0xFFFFFFFFu64;
        let entries = [meta("big", DeclaredSize::Known(size)), meta("next", DeclaredSize::Known(1))];
        let first = 30 + 3 + 20 + size + 24;
        // the second member starts beyond 4 GiB, so its central record carries its offset
        let second = 30 + 4 + 1 + 16;
        let central = (46 + 3 + 20) + (46 + 4 + 12);
        assert_eq!(
            predict_length(&entries, &ArchiveOptions::default()).unwrap(),
            first + second + central + 56 + 20 + 22
        );
    }

    #[test]
    fn just_below_the_limit_keeps_classic_member_fields() {
        let size = 0xFFFFFFFEu64;
        let entries = [meta("big", DeclaredSize::Known(size))];
        // the member fits, but the central directory starts past 4 GiB
        assert_eq!(
            predict_length(&entries, &ArchiveOptions::default()).unwrap(),
            (30 + 3 + size + 16) + (46 + 3) + 56 + 20 + 22
        );
    }

    #[test]
    fn oversized_names_are_rejected() {
        let mut long = meta("x", DeclaredSize::Known(1));
        long.name = vec![b'x'; 70_000];
        let err = predict_length([&long], &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, ZipError::NameTooLong { len: 70_000 }));
    }
}
