use core::fmt;

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// Calendar date and time at the two-second resolution of the MS-DOS encoding.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DateTimeCS {
    year: u16,
    month: u16,
    day: u16,
    hour: u16,
    minute: u16,
    second: u16,
}

impl Default for DateTimeCS {
    /// 1980, January 1st, midnight: the MS-DOS epoch.
    fn default() -> Self {
        Self {
            year: 1980,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

impl DateTimeCS {
    pub fn from_chrono_datetime<Tz: TimeZone>(datetime: DateTime<Tz>) -> Self {
        Self {
            year: datetime.year().clamp(1980, 2107) as u16,
            month: datetime.month() as u16,
            day: datetime.day() as u16,
            hour: datetime.hour() as u16,
            minute: datetime.minute() as u16,
            second: datetime.second() as u16,
        }
    }

    /// Converts POSIX seconds (UTC). Instants before 1980 collapse to the MS-DOS epoch
    /// and instants after 2107 to its last representable year.
    pub fn from_timestamp(timestamp: i64) -> Self {
        match Utc.timestamp_opt(timestamp, 0).single() {
            Some(datetime) if datetime.year() >= 1980 => Self::from_chrono_datetime(datetime),
            _ => Self::default(),
        }
    }

    pub fn now() -> Self {
        Self::from_chrono_datetime(Utc::now())
    }

    pub fn from_msdos(datepart: u16, timepart: u16) -> Self {
        let seconds = (timepart & 0b0000000000011111) << 1;
        let minutes = (timepart & 0b0000011111100000) >> 5;
        let hours = (timepart & 0b1111100000000000) >> 11;
        let days = datepart & 0b0000000000011111;
        let months = (datepart & 0b0000000111100000) >> 5;
        let years = (datepart & 0b1111111000000000) >> 9;

        Self {
            year: years + 1980,
            month: months,
            day: days,
            hour: hours,
            minute: minutes,
            second: seconds,
        }
    }

    /// Returns `(date, time)`: 7-bit year since 1980, 4-bit month, 5-bit day and
    /// 5-bit hour, 6-bit minute, 5-bit second/2.
    pub fn ms_dos(&self) -> (u16, u16) {
        let date = self.day | (self.month << 5) | self.year.saturating_sub(1980) << 9;
        let time = (self.second / 2) | (self.minute << 5) | self.hour << 11;
        (date, time)
    }

    pub fn to_time(&self) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
            .and_then(|date| {
                date.and_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for DateTimeCS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:}", self.to_time())
    }
}

/// The (timezone-less) date and time written in the archive alongside an entry.
///
/// Use `FileDateTime::Zero` if the date and time are insignificant. This will set the value to
/// 1980, January 1st, midnight.
/// Use `FileDateTime::Custom` to set a custom date and time.
/// Use `FileDateTime::Now` for the current UTC date and time.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum FileDateTime {
    #[default]
    Zero,
    Custom(DateTimeCS),
    Now,
}

impl FileDateTime {
    pub fn date_time(&self) -> DateTimeCS {
        match self {
            FileDateTime::Zero => DateTimeCS::default(),
            FileDateTime::Custom(date_time) => *date_time,
            FileDateTime::Now => DateTimeCS::now(),
        }
    }

    pub fn ms_dos(&self) -> (u16, u16) {
        self.date_time().ms_dos()
    }
}
