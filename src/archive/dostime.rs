use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

/// MS-DOS packed timestamp as stored in zip headers.
///
/// `date`: bits 15..9 year since 1980, 8..5 month, 4..0 day.
/// `time`: bits 15..11 hour, 10..5 minute, 4..0 second / 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub date: u16,
    pub time: u16,
}

const MIN_YEAR: i32 = 1980;
const MAX_YEAR: i32 = MIN_YEAR + 127;

impl DosDateTime {
    /// Pack a wall-clock time. Years outside 1980..=2107 are clamped.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        let year = dt.year().clamp(MIN_YEAR, MAX_YEAR);
        let date = (((year - MIN_YEAR) as u16) << 9)
            | ((dt.month() as u16) << 5)
            | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11)
            | ((dt.minute() as u16) << 5)
            | (dt.second() / 2) as u16;
        Self { date, time }
    }

    /// Unpack into a wall-clock time, or `None` when a field is out of range.
    pub fn to_datetime(self) -> Option<NaiveDateTime> {
        let year = MIN_YEAR + i32::from(self.date >> 9);
        let month = u32::from((self.date >> 5) & 0x0F);
        let day = u32::from(self.date & 0x1F);
        let hour = u32::from(self.time >> 11);
        let minute = u32::from((self.time >> 5) & 0x3F);
        let second = u32::from(self.time & 0x1F) * 2;
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_packing_layout() {
        let packed = DosDateTime::from_datetime(at(2024, 3, 15, 13, 45, 31));
        assert_eq!(packed.date, (44 << 9) | (3 << 5) | 15);
        assert_eq!(packed.time, (13 << 11) | (45 << 5) | 15);
    }

    #[test]
    fn test_two_second_resolution() {
        let packed = DosDateTime::from_datetime(at(2001, 1, 1, 0, 0, 59));
        assert_eq!(packed.to_datetime(), Some(at(2001, 1, 1, 0, 0, 58)));
    }

    #[test]
    fn test_year_clamped_to_epoch() {
        let packed = DosDateTime::from_datetime(at(1970, 6, 1, 12, 0, 0));
        assert_eq!(packed.date >> 9, 0);
        assert_eq!(packed.to_datetime(), Some(at(1980, 6, 1, 12, 0, 0)));
    }

    #[test]
    fn test_invalid_fields_decode_to_none() {
        let zeroed = DosDateTime { date: 0, time: 0 };
        assert_eq!(zeroed.to_datetime(), None);
    }
}
