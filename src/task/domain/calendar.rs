//! Working-day arithmetic for due-date computation.
//!
//! Weekends are never working days. Public holidays are optional: the
//! German federal holidays (with Corpus Christi as a separate switch) and any
//! number of fixed month/day holidays can be enabled.

use super::TaskDomainError;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Upper bound on calendar days scanned by a single computation.
const MAX_SCANNED_DAYS: i64 = 100_000;

/// A holiday repeating on the same month and day every year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomHoliday {
    /// Month, `1..=12`.
    pub month: u32,
    /// Day of month, `1..=31`.
    pub day: u32,
}

impl CustomHoliday {
    /// Creates a fixed yearly holiday.
    #[must_use]
    pub const fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }

    fn matches(self, date: NaiveDate) -> bool {
        date.month() == self.month && date.day() == self.day
    }
}

/// Calendar deciding which days count towards a service level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingDayCalendar {
    german_holidays: bool,
    corpus_christi: bool,
    custom_holidays: BTreeSet<CustomHoliday>,
}

impl WorkingDayCalendar {
    /// Creates a calendar where only weekends are non-working days.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables the German federal public holidays.
    #[must_use]
    pub fn with_german_holidays(mut self, corpus_christi: bool) -> Self {
        self.german_holidays = true;
        self.corpus_christi = corpus_christi;
        self
    }

    /// Adds custom holidays.
    #[must_use]
    pub fn with_custom_holidays(mut self, holidays: impl IntoIterator<Item = CustomHoliday>) -> Self {
        self.custom_holidays.extend(holidays);
        self
    }

    /// Returns `true` when `date` is neither a weekend day nor a holiday.
    #[must_use]
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Returns `true` when `date` is an enabled holiday.
    #[must_use]
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if self.custom_holidays.iter().any(|holiday| holiday.matches(date)) {
            return true;
        }
        self.german_holidays && self.is_german_holiday(date)
    }

    /// Moves `start` forward by `days` working days, keeping the time of day.
    ///
    /// A zero offset yields `start` itself when it falls on a working day and
    /// the next working day otherwise. Negative offsets move backwards.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::WorkingDayOutOfRange`] when the result
    /// cannot be represented.
    pub fn add_working_days(
        &self,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<DateTime<Utc>, TaskDomainError> {
        let direction = if days < 0 { -1 } else { 1 };
        self.shift(start, days, direction)
    }

    /// Moves `start` backward by `days` working days, keeping the time of day.
    ///
    /// A zero offset yields `start` itself when it falls on a working day and
    /// the previous working day otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::WorkingDayOutOfRange`] when the result
    /// cannot be represented.
    pub fn subtract_working_days(
        &self,
        start: DateTime<Utc>,
        days: i64,
    ) -> Result<DateTime<Utc>, TaskDomainError> {
        let direction = if days < 0 { 1 } else { -1 };
        self.shift(start, days, direction)
    }

    fn shift(
        &self,
        start: DateTime<Utc>,
        days: i64,
        direction: i64,
    ) -> Result<DateTime<Utc>, TaskDomainError> {
        let out_of_range = || TaskDomainError::WorkingDayOutOfRange { start, days };
        let mut remaining = days.unsigned_abs();
        for step in 0..MAX_SCANNED_DAYS {
            let candidate = offset_by(start, step.saturating_mul(direction)).ok_or_else(out_of_range)?;
            if !self.is_working_day(candidate.date_naive()) {
                continue;
            }
            if remaining == 0 {
                return Ok(candidate);
            }
            remaining -= 1;
        }
        Err(out_of_range())
    }

    fn is_german_holiday(&self, date: NaiveDate) -> bool {
        let fixed = [(1, 1), (5, 1), (10, 3), (12, 25), (12, 26)];
        if fixed
            .iter()
            .any(|&(month, day)| date.month() == month && date.day() == day)
        {
            return true;
        }

        let Some(easter) = easter_sunday(date.year()) else {
            return false;
        };
        let offset = date.signed_duration_since(easter).num_days();
        match offset {
            -2 | 1 | 39 | 50 => true,
            60 => self.corpus_christi,
            _ => false,
        }
    }
}

fn offset_by(start: DateTime<Utc>, offset: i64) -> Option<DateTime<Utc>> {
    let magnitude = Days::new(offset.unsigned_abs());
    if offset < 0 {
        start.checked_sub_days(magnitude)
    } else {
        start.checked_add_days(magnitude)
    }
}

/// Gregorian Easter Sunday (anonymous Gregorian algorithm).
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b.div_euclid(4);
    let e = b.rem_euclid(4);
    let f = (b + 8).div_euclid(25);
    let g = (b - f + 1).div_euclid(3);
    let h = (19 * a + b - d - g + 15).rem_euclid(30);
    let i = c.div_euclid(4);
    let k = c.rem_euclid(4);
    let l = (32 + 2 * e + 2 * i - h - k).rem_euclid(7);
    let m = (a + 11 * h + 22 * l).div_euclid(451);
    let month = (h + l - 7 * m + 114).div_euclid(31);
    let day = (h + l - 7 * m + 114).rem_euclid(31) + 1;
    NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
}
