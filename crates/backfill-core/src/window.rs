//! The synthesis window and the backward day walk.
//!
//! A window is the closed date range `[start, end]` over which history is
//! fabricated. The walk visits `end - 1` down to `start` inclusive, so it
//! always performs exactly `(end - start).days` steps.
//!
//! All date arithmetic uses chrono's checked `Days` operations; the window
//! constructor rejects anything that would step outside chrono's range.

use chrono::{Days, NaiveDate};

/// Year of the open-ended sentinel.
const SENTINEL_YEAR: i32 = 9999;

/// The `effective_to` value carried by every current version.
///
/// Using a maximal date rather than `NULL` keeps the as-of predicate
/// `effective_from <= asof < effective_to` uniform for current and closed rows.
pub fn open_ended() -> NaiveDate {
    NaiveDate::from_ymd_opt(SENTINEL_YEAR, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Errors that can occur when constructing a window.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// The end date precedes the start date.
    #[error("window end {end} precedes start {start}")]
    Inverted {
        /// Requested start date.
        start: NaiveDate,
        /// Requested end date.
        end: NaiveDate,
    },

    /// The window has no days at all.
    #[error("window length must be at least one day")]
    Empty,

    /// The window reaches the open-ended sentinel or beyond chrono's range.
    #[error("window ending {end} with {days} days is out of range")]
    OutOfRange {
        /// Requested end date.
        end: NaiveDate,
        /// Requested length in days.
        days: u32,
    },
}

/// The closed date range `[start, end]` to synthesize history over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SynthesisWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl SynthesisWindow {
    /// Create a window from explicit bounds.
    ///
    /// `start == end` is allowed: such a window yields no walk steps and
    /// every entity keeps its single seeded version.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::Inverted`] if `end < start`, or
    /// [`WindowError::OutOfRange`] if `end` is not strictly before the sentinel.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::Inverted { start, end });
        }
        if end >= open_ended() {
            return Err(WindowError::OutOfRange { end, days: 0 });
        }
        Ok(Self { start, end })
    }

    /// Create a window of `days` calendar days ending on `end` (inclusive).
    ///
    /// A 30-day window ending today starts 29 days ago, matching the daily
    /// snapshot grain of the reporting layer.
    ///
    /// # Errors
    ///
    /// Returns [`WindowError::Empty`] for `days == 0`, or
    /// [`WindowError::OutOfRange`] if the start would precede chrono's range.
    pub fn ending_at(end: NaiveDate, days: u32) -> Result<Self, WindowError> {
        let span = days.checked_sub(1).ok_or(WindowError::Empty)?;
        let start = end
            .checked_sub_days(Days::new(u64::from(span)))
            .ok_or(WindowError::OutOfRange { end, days })?;
        Self::new(start, end)
    }

    /// First day of the window; the earliest version of every entity starts here.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the window ("today").
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of walk steps, `(end - start).days`.
    pub fn step_count(&self) -> u64 {
        u64::try_from(self.end.signed_duration_since(self.start).num_days()).unwrap_or(0)
    }

    /// Whether `date` falls inside `[start, end]`.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Days visited by the backward walk: `end - 1` down to `start` inclusive.
    pub fn walk_days(&self) -> BackwardDays {
        BackwardDays {
            next: self.end.checked_sub_days(Days::new(1)),
            floor: self.start,
        }
    }

    /// Every calendar day of the window in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

/// Iterator over walk days, newest first.
#[derive(Debug, Clone)]
pub struct BackwardDays {
    next: Option<NaiveDate>,
    floor: NaiveDate,
}

impl Iterator for BackwardDays {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<Self::Item> {
        let day = self.next.filter(|day| *day >= self.floor)?;
        self.next = day.checked_sub_days(Days::new(1));
        Some(day)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn ending_at_counts_the_end_day() {
        let window = SynthesisWindow::ending_at(date(2025, 3, 10), 10).unwrap();
        assert_eq!(window.start(), date(2025, 3, 1));
        assert_eq!(window.end(), date(2025, 3, 10));
        assert_eq!(window.step_count(), 9);
        assert_eq!(window.dates().count(), 10);
    }

    #[test]
    fn walk_runs_from_yesterday_down_to_start() {
        let window = SynthesisWindow::new(date(2025, 3, 1), date(2025, 3, 4)).unwrap();
        let days: Vec<NaiveDate> = window.walk_days().collect();
        assert_eq!(days, vec![date(2025, 3, 3), date(2025, 3, 2), date(2025, 3, 1)]);
    }

    #[test]
    fn walk_length_matches_step_count_across_month_boundary() {
        let window = SynthesisWindow::ending_at(date(2024, 3, 2), 30).unwrap();
        let steps = u64::try_from(window.walk_days().count()).unwrap();
        assert_eq!(steps, window.step_count());
        assert_eq!(window.walk_days().last(), Some(window.start()));
    }

    #[test]
    fn single_day_window_has_no_steps() {
        let window = SynthesisWindow::ending_at(date(2025, 1, 1), 1).unwrap();
        assert_eq!(window.step_count(), 0);
        assert_eq!(window.walk_days().count(), 0);
    }

    #[test]
    fn rejects_empty_and_inverted_windows() {
        assert!(matches!(
            SynthesisWindow::ending_at(date(2025, 1, 1), 0),
            Err(WindowError::Empty)
        ));
        assert!(matches!(
            SynthesisWindow::new(date(2025, 1, 2), date(2025, 1, 1)),
            Err(WindowError::Inverted { .. })
        ));
        assert!(matches!(
            SynthesisWindow::new(date(2025, 1, 2), open_ended()),
            Err(WindowError::OutOfRange { .. })
        ));
    }

    #[test]
    fn contains_is_inclusive_on_both_ends() {
        let window = SynthesisWindow::new(date(2025, 1, 1), date(2025, 1, 5)).unwrap();
        assert!(window.contains(date(2025, 1, 1)));
        assert!(window.contains(date(2025, 1, 5)));
        assert!(!window.contains(date(2025, 1, 6)));
    }

    #[test]
    fn sentinel_is_end_of_year_9999() {
        assert_eq!(open_ended(), date(9999, 12, 31));
    }
}
