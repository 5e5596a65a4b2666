//! Member modification times.
//!
//! The two container formats store modification times differently:
//! - The indexed format (ZIP) stores MS-DOS date/time fields with a
//!   resolution of 2 seconds, covering the years 1980 to 2107 and carrying
//!   no time zone.
//! - The sequential format (TAR) stores Unix seconds.
//!
//! [`Timestamp`] keeps the value as Unix seconds together with the precision
//! of the field it was read from, so callers can tell a rounded DOS time from
//! an exact one.
//!
//! DOS fields hold local wall-clock time, the way Info-ZIP and Python's
//! `zipfile` write them. They are converted through the system time zone
//! ([`chrono::Local`]) when read and written, and [`Display`](fmt::Display)
//! renders local time as well. A wall-clock time skipped by a daylight saving
//! change resolves to the first valid instant an hour later.
//!
//! # Example
//!
//! ```rust
//! use arcfold::{TimePrecision, Timestamp};
//!
//! let ts = Timestamp::from_dos_fields(2024, 3, 1, 12, 30, 15).unwrap();
//! assert_eq!(ts.precision(), TimePrecision::DosTwoSeconds);
//! assert_eq!(ts.to_string(), "2024-03-01 12:30:15");
//! ```

use chrono::{
    DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc,
};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Display format used for listings.
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// First year representable in MS-DOS date fields.
const DOS_MIN_YEAR: i32 = 1980;

/// Last year representable in MS-DOS date fields.
const DOS_MAX_YEAR: i32 = 2107;

/// Resolution of the field a [`Timestamp`] was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimePrecision {
    /// MS-DOS date/time fields, 2-second resolution.
    DosTwoSeconds,
    /// Unix seconds.
    UnixSeconds,
}

/// MS-DOS date/time fields: `(year, month, day, hour, minute, second)`.
pub type DosFields = (u16, u8, u8, u8, u8, u8);

/// A member modification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    precision: TimePrecision,
}

impl Timestamp {
    /// Creates a timestamp from Unix seconds.
    #[inline]
    pub const fn from_unix_secs(secs: i64) -> Self {
        Self {
            secs,
            precision: TimePrecision::UnixSeconds,
        }
    }

    /// Creates a timestamp from MS-DOS date/time fields in local time.
    ///
    /// Returns `None` if the fields do not form a valid calendar date and
    /// time (a zeroed DOS date, as written by some tools, is invalid).
    pub fn from_dos_fields(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Option<Self> {
        let naive = NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))?
            .and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))?;
        let secs = local_to_unix(naive)?;
        Some(Self {
            secs,
            precision: TimePrecision::DosTwoSeconds,
        })
    }

    /// Creates a timestamp from a `SystemTime`, truncating sub-second
    /// precision.
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs() as i64,
            Err(e) => {
                let duration = e.duration();
                let whole = duration.as_secs() as i64;
                if duration.subsec_nanos() > 0 {
                    -(whole + 1)
                } else {
                    -whole
                }
            }
        };
        Self::from_unix_secs(secs)
    }

    /// Returns the current time.
    pub fn now() -> Self {
        Self::from_unix_secs(Utc::now().timestamp())
    }

    /// Returns the timestamp as Unix seconds.
    #[inline]
    pub const fn as_unix_secs(&self) -> i64 {
        self.secs
    }

    /// Returns the resolution of the source field.
    #[inline]
    pub const fn precision(&self) -> TimePrecision {
        self.precision
    }

    /// Converts to a `SystemTime`.
    pub fn as_system_time(&self) -> SystemTime {
        if self.secs >= 0 {
            UNIX_EPOCH + Duration::from_secs(self.secs as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.secs.unsigned_abs())
        }
    }

    /// Converts to a chrono UTC date-time, if representable.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs, 0)
    }

    /// Converts to local date-time, if representable.
    pub fn as_local_datetime(&self) -> Option<DateTime<Local>> {
        self.as_datetime().map(|dt| dt.with_timezone(&Local))
    }

    /// Converts to MS-DOS date/time fields in local time for writing into
    /// the indexed format.
    ///
    /// Times before 1980 clamp to 1980-01-01 00:00:00 and times after 2107
    /// clamp to the last representable instant. Seconds round down to an
    /// even value.
    pub fn to_dos_fields(&self) -> DosFields {
        const MIN: DosFields = (DOS_MIN_YEAR as u16, 1, 1, 0, 0, 0);
        const MAX: DosFields = (DOS_MAX_YEAR as u16, 12, 31, 23, 59, 58);

        let Some(dt) = self.as_local_datetime() else {
            return if self.secs < 0 { MIN } else { MAX };
        };
        if dt.year() < DOS_MIN_YEAR {
            return MIN;
        }
        if dt.year() > DOS_MAX_YEAR {
            return MAX;
        }
        (
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            (dt.second() - dt.second() % 2) as u8,
        )
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_local_datetime() {
            Some(dt) => write!(f, "{}", dt.format(DISPLAY_FORMAT)),
            None => write!(f, "@{}", self.secs),
        }
    }
}

/// Resolves a local wall-clock time to Unix seconds.
fn local_to_unix(naive: NaiveDateTime) -> Option<i64> {
    if let Some(dt) = Local.from_local_datetime(&naive).earliest() {
        return Some(dt.timestamp());
    }
    let later = naive.checked_add_signed(TimeDelta::hours(1))?;
    Local
        .from_local_datetime(&later)
        .earliest()
        .map(|dt| dt.timestamp())
}
