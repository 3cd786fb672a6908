//! # Calendar Oracle
//!
//! The generator asks one question of the calendar: is this date a
//! non-school day? The oracle is an external collaborator; [`WeekdayCalendar`]
//! is the built-in answer (weekends plus a fixed holiday list).

use std::collections::BTreeSet;

use async_trait::async_trait;
use rollcall_core::{SchoolDay, ValidationError};

use crate::error::CalendarError;

/// Answers whether a date is a non-school day.
#[async_trait]
pub trait Calendar: Send + Sync {
    /// `true` for weekends, holidays and any other day without classes.
    async fn is_non_school_day(&self, day: SchoolDay) -> Result<bool, CalendarError>;
}

/// Saturdays, Sundays and an explicit set of holidays are non-school days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeekdayCalendar {
    holidays: BTreeSet<SchoolDay>,
}

impl WeekdayCalendar {
    /// A calendar with no holidays.
    pub fn new() -> Self {
        Self::default()
    }

    /// A calendar with the given holidays.
    pub fn with_holidays(holidays: impl IntoIterator<Item = SchoolDay>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Parse a comma-separated `YYYY-MM-DD` list. Blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first entry that is not a valid day.
    pub fn parse_holidays(list: &str) -> Result<Self, ValidationError> {
        let holidays = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(SchoolDay::parse)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self { holidays })
    }

    /// Number of configured holidays.
    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }
}

#[async_trait]
impl Calendar for WeekdayCalendar {
    async fn is_non_school_day(&self, day: SchoolDay) -> Result<bool, CalendarError> {
        Ok(day.is_weekend() || self.holidays.contains(&day))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> SchoolDay {
        SchoolDay::parse(s).unwrap()
    }

    #[tokio::test]
    async fn weekends_are_non_school_days() {
        let calendar = WeekdayCalendar::new();
        assert!(calendar.is_non_school_day(day("2025-03-15")).await.unwrap());
        assert!(calendar.is_non_school_day(day("2025-03-16")).await.unwrap());
        assert!(!calendar.is_non_school_day(day("2025-03-10")).await.unwrap());
    }

    #[tokio::test]
    async fn listed_holiday_is_skipped() {
        let calendar = WeekdayCalendar::parse_holidays("2025-03-31, 2025-04-01,").unwrap();
        assert_eq!(calendar.holiday_count(), 2);
        assert!(calendar.is_non_school_day(day("2025-03-31")).await.unwrap());
        assert!(!calendar.is_non_school_day(day("2025-04-02")).await.unwrap());
    }

    #[test]
    fn parse_holidays_rejects_garbage() {
        assert!(matches!(
            WeekdayCalendar::parse_holidays("2025-03-31,next friday"),
            Err(ValidationError::InvalidDay(_))
        ));
    }

    #[test]
    fn empty_list_means_no_holidays() {
        assert_eq!(WeekdayCalendar::parse_holidays("").unwrap().holiday_count(), 0);
    }
}
