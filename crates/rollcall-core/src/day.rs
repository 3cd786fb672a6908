//! # School Days
//!
//! A [`SchoolDay`] is a calendar date with no time-of-day component. The
//! ledger's natural key is `(student_id, day)`, so every path that computes
//! "today" must agree on the same date regardless of the machine clock it
//! runs on.
//!
//! ## Day Boundary
//!
//! [`DayClock`] derives the day by shifting UTC by a fixed offset (the
//! school's reference zone, `+07:00` by default) and truncating to the date.
//! A fixed offset has no daylight-saving transitions. Schools in zones that
//! observe DST must pick the offset that matches their school hours.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Wire format for days.
const DAY_FORMAT: &str = "%Y-%m-%d";

/// A calendar date in the school's reference timezone.
///
/// Serializes as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchoolDay(NaiveDate);

impl SchoolDay {
    /// Wrap an existing calendar date.
    pub const fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build a day from year, month and day-of-month.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDay`] for impossible dates such as
    /// February 30th.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self, ValidationError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidDay(format!("{year:04}-{month:02}-{day:02}")))
    }

    /// Parse a strict `YYYY-MM-DD` string. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDay`] if the string is not a valid
    /// calendar date in that format.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        NaiveDate::parse_from_str(trimmed, DAY_FORMAT)
            .map(Self)
            .map_err(|_| ValidationError::InvalidDay(s.to_string()))
    }

    /// Access the underlying date.
    pub const fn as_date(&self) -> NaiveDate {
        self.0
    }

    /// Day of the week.
    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Whether the day falls on Saturday or Sunday.
    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday(), Weekday::Sat | Weekday::Sun)
    }

    /// The following calendar day.
    pub fn next(&self) -> Self {
        Self(self.0.succ_opt().unwrap_or(self.0))
    }
}

impl std::fmt::Display for SchoolDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl std::str::FromStr for SchoolDay {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SchoolDay {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SchoolDay> for String {
    fn from(day: SchoolDay) -> Self {
        day.to_string()
    }
}

/// Derives the canonical [`SchoolDay`] from wall-clock time.
///
/// Cheap to copy. A clock may be pinned to a fixed day, which replaces the
/// wall clock entirely (used by replay tooling and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    offset: FixedOffset,
    pinned: Option<SchoolDay>,
}

impl DayClock {
    /// Default reference offset in hours east of UTC.
    pub const DEFAULT_OFFSET_HOURS: i32 = 7;

    /// Build a clock for a whole-hour offset east of UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidUtcOffset`] if `hours` is outside
    /// `-23..=23`.
    pub fn from_offset_hours(hours: i32) -> Result<Self, ValidationError> {
        if !(-23..=23).contains(&hours) {
            return Err(ValidationError::InvalidUtcOffset(hours));
        }
        let offset =
            FixedOffset::east_opt(hours * 3600).ok_or(ValidationError::InvalidUtcOffset(hours))?;
        Ok(Self {
            offset,
            pinned: None,
        })
    }

    /// Return a copy of this clock that always reports `day` as today.
    pub fn pinned(self, day: SchoolDay) -> Self {
        Self {
            pinned: Some(day),
            ..self
        }
    }

    /// The reference offset.
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// The school day containing `instant`.
    pub fn day_of(&self, instant: DateTime<Utc>) -> SchoolDay {
        SchoolDay(instant.with_timezone(&self.offset).date_naive())
    }

    /// Today's school day.
    pub fn today(&self) -> SchoolDay {
        self.pinned.unwrap_or_else(|| self.day_of(Utc::now()))
    }

    /// Current time in the reference offset.
    pub fn now_local(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

impl Default for DayClock {
    fn default() -> Self {
        Self::from_offset_hours(Self::DEFAULT_OFFSET_HOURS).unwrap_or(Self {
            offset: Utc.fix(),
            pinned: None,
        })
    }
}
