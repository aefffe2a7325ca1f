//! Modification time encoding.
//!
//! Every member carries the legacy MS-DOS date/time pair. Instants the DOS fields
//! cannot represent faithfully (sub-second precision, before 1980, after 2107) also
//! get an extended timestamp extra field with the Unix time, so readers that know
//! the extension recover the precise value and everyone else still sees a usable
//! coarse date.

use chrono::{DateTime, Datelike, Timelike, Utc};

const DOS_MIN_YEAR: i32 = 1980;
const DOS_MAX_YEAR: i32 = 2107;

/// Packed MS-DOS date and time (2 second resolution, UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00
    pub const MIN: DosDateTime = DosDateTime {
        date: 0x0021,
        time: 0x0000,
    };

    /// 2107-12-31 23:59:58
    pub const MAX: DosDateTime = DosDateTime {
        date: 0xFF9F,
        time: 0xBF7D,
    };

    /// Encode an instant, clamping to the representable range.
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        let year = dt.year();
        if year < DOS_MIN_YEAR {
            return Self::MIN;
        }
        if year > DOS_MAX_YEAR {
            return Self::MAX;
        }

        let date = (dt.day() as u16) | ((dt.month() as u16) << 5) | (((year - DOS_MIN_YEAR) as u16) << 9);
        // leap seconds report second 59 with an oversized nanosecond value
        let second = dt.second().min(59);
        let time = ((second as u16) >> 1) | ((dt.minute() as u16) << 5) | ((dt.hour() as u16) << 11);
        Self { date, time }
    }

    /// Parse modification date to (year, month, day)
    pub fn ymd(&self) -> (u16, u8, u8) {
        let day = (self.date & 0x1F) as u8;
        let month = ((self.date >> 5) & 0x0F) as u8;
        let year = ((self.date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn hms(&self) -> (u8, u8, u8) {
        let second = ((self.time & 0x1F) * 2) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Modification time of a member as written to its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModTime {
    pub dos: DosDateTime,
    /// Unix seconds for the extended timestamp field, when one is needed.
    pub unix: Option<i32>,
}

impl ModTime {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let year = dt.year();
        let precise = dt.nanosecond() != 0 || !(DOS_MIN_YEAR..=DOS_MAX_YEAR).contains(&year);
        let unix = precise.then(|| dt.timestamp().clamp(i32::MIN as i64, i32::MAX as i64) as i32);

        Self {
            dos: DosDateTime::from_datetime(&dt),
            unix,
        }
    }

    /// Current time, used for inputs that carry no timestamp.
    ///
    /// Truncated to whole seconds, so defaulted members carry no extended timestamp.
    pub fn now() -> Self {
        let now = Utc::now();
        Self::from_datetime(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn has_extended_timestamp(&self) -> bool {
        self.unix.is_some()
    }
}

impl From<DateTime<Utc>> for ModTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_datetime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encodes_whole_seconds_without_extension() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 15, 13, 45, 30).unwrap();
        let t = ModTime::from_datetime(dt);
        assert_eq!(t.dos.ymd(), (2024, 3, 15));
        assert_eq!(t.dos.hms(), (13, 45, 30));
        assert_eq!(t.unix, None);
    }

    #[test]
    fn odd_seconds_round_down() {
        let dt = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 59).unwrap();
        assert_eq!(DosDateTime::from_datetime(&dt).hms(), (0, 0, 58));
    }

    #[test]
    fn sub_second_instants_get_extended_timestamp() {
        let dt = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
        let t = ModTime::from_datetime(dt);
        assert_eq!(t.unix, Some(1_700_000_000));
        assert!(t.has_extended_timestamp());
    }

    #[test]
    fn clamps_out_of_range_years() {
        let early = Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap();
        let t = ModTime::from_datetime(early);
        assert_eq!(t.dos, DosDateTime::MIN);
        assert_eq!(t.unix, Some(0));
        assert_eq!(DosDateTime::MIN.ymd(), (1980, 1, 1));

        let late = Utc.with_ymd_and_hms(2200, 6, 1, 12, 0, 0).unwrap();
        let t = ModTime::from_datetime(late);
        assert_eq!(t.dos, DosDateTime::MAX);
        assert_eq!(t.unix, Some(i32::MAX));
        assert_eq!(DosDateTime::MAX.ymd(), (2107, 12, 31));
        assert_eq!(DosDateTime::MAX.hms(), (23, 59, 58));
    }
}
