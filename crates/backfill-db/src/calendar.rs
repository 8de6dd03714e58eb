//! The `dim_dates` calendar dimension.
//!
//! Reporting joins the versioned tables to `dim_dates` on
//! `effective_from <= full_date < effective_to` to get daily grain, so the
//! calendar must cover every day of the synthesis window.

use backfill_core::SynthesisWindow;
use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::PgPool;

use crate::error::DbError;

/// One calendar row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    /// The date.
    pub full_date: NaiveDate,
    /// Calendar year.
    pub year: i32,
    /// Month, 1-12.
    pub month: i32,
    /// Day of month, 1-31.
    pub day: i32,
    /// ISO 8601 week number.
    pub iso_week: i32,
    /// ISO weekday, Monday = 1.
    pub weekday: i32,
    /// Saturday or Sunday.
    pub is_weekend: bool,
}

impl CalendarDay {
    /// Derive the calendar attributes of `date`.
    pub fn of(date: NaiveDate) -> Self {
        let weekday = date.weekday();
        Self {
            full_date: date,
            year: date.year(),
            month: small(date.month()),
            day: small(date.day()),
            iso_week: small(date.iso_week().week()),
            weekday: small(weekday.number_from_monday()),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
        }
    }
}

/// Calendar components are at most 53, so this never saturates.
fn small(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Operations on the `dim_dates` table.
pub struct CalendarStore<'a> {
    pool: &'a PgPool,
}

impl<'a> CalendarStore<'a> {
    /// Create a calendar store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Rewrite the calendar rows for every day of `window`.
    ///
    /// Rows outside the window are left alone, so successive runs over
    /// different windows accumulate a continuous calendar.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the transaction fails.
    pub async fn replace_window(&self, window: SynthesisWindow) -> Result<u64, DbError> {
        let days: Vec<CalendarDay> = window.dates().map(CalendarDay::of).collect();

        let mut tx = self.pool.begin().await?;
        sqlx::query(r"DELETE FROM dim_dates WHERE full_date BETWEEN $1 AND $2")
            .bind(window.start())
            .bind(window.end())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"INSERT INTO dim_dates (full_date, year, month, day, iso_week, weekday, is_weekend)
              SELECT * FROM UNNEST($1::DATE[], $2::INTEGER[], $3::INTEGER[], $4::INTEGER[], $5::INTEGER[], $6::INTEGER[], $7::BOOLEAN[])",
        )
        .bind(days.iter().map(|d| d.full_date).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.year).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.month).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.day).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.iso_week).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.weekday).collect::<Vec<_>>())
        .bind(days.iter().map(|d| d.is_weekend).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let written = u64::try_from(days.len()).unwrap_or(u64::MAX);
        tracing::info!(
            rows = written,
            start = %window.start(),
            end = %window.end(),
            "Wrote calendar dimension"
        );
        Ok(written)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn weekend_and_iso_week_are_derived() {
        // 2025-01-04 is a Saturday in ISO week 1.
        let saturday = CalendarDay::of(NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());
        assert!(saturday.is_weekend);
        assert_eq!(saturday.weekday, 6);
        assert_eq!(saturday.iso_week, 1);

        // 2024-12-30 is a Monday that already belongs to ISO week 1 of 2025.
        let monday = CalendarDay::of(NaiveDate::from_ymd_opt(2024, 12, 30).unwrap());
        assert!(!monday.is_weekend);
        assert_eq!(monday.weekday, 1);
        assert_eq!(monday.iso_week, 1);
        assert_eq!(monday.year, 2024);
    }
}
