//! Late-return penalties.
//!
//! A fee accrues per whole day elapsed since the start of the due date. Part
//! days are truncated, so returning on the due date itself costs nothing.

use chrono::{NaiveDate, NaiveDateTime};

use crate::clock::start_of_day;

/// Per-day late fee in currency minor units.
pub const RATE_PER_DAY: u64 = 1000;

/// Whole days between the start of `due_date` and `as_of`, truncated toward zero.
#[must_use]
pub fn days_late(due_date: NaiveDate, as_of: NaiveDateTime) -> i64 {
    (as_of - start_of_day(due_date)).num_days()
}

/// Late fee at the standard [`RATE_PER_DAY`].
#[must_use]
pub fn compute_late_fee(due_date: NaiveDate, as_of: NaiveDateTime) -> u64 {
    FeeSchedule::default().late_fee(due_date, as_of)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSchedule {
    pub rate_per_day: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            rate_per_day: RATE_PER_DAY,
        }
    }
}

impl FeeSchedule {
    #[must_use]
    pub fn new(rate_per_day: u64) -> Self {
        Self { rate_per_day }
    }

    /// Fee owed for a loan due on `due_date` and returned at `as_of`; zero when not late.
    #[must_use]
    pub fn late_fee(&self, due_date: NaiveDate, as_of: NaiveDateTime) -> u64 {
        match u64::try_from(days_late(due_date, as_of)) {
            Ok(days) if days > 0 => days.saturating_mul(self.rate_per_day),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        day(y, m, d).and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn five_days_late_costs_five_days() {
        assert_eq!(compute_late_fee(day(2024, 1, 10), at(2024, 1, 15, 0, 0)), 5000);
        assert_eq!(compute_late_fee(day(2024, 1, 10), at(2024, 1, 15, 23, 59)), 5000);
    }

    #[test]
    fn on_time_and_early_returns_are_free() {
        let due = day(2024, 1, 10);
        assert_eq!(compute_late_fee(due, at(2024, 1, 10, 0, 0)), 0);
        assert_eq!(compute_late_fee(due, at(2024, 1, 10, 18, 0)), 0);
        assert_eq!(compute_late_fee(due, at(2024, 1, 2, 9, 0)), 0);
    }

    #[test]
    fn partial_days_truncate() {
        let due = day(2024, 1, 10);
        assert_eq!(days_late(due, at(2024, 1, 11, 23, 59)), 1);
        assert_eq!(days_late(due, at(2024, 1, 9, 12, 0)), 0);
        assert_eq!(days_late(due, at(2024, 1, 8, 12, 0)), -1);
    }

    #[test]
    fn schedule_rate_is_configurable() {
        let schedule = FeeSchedule::new(250);
        assert_eq!(schedule.late_fee(day(2024, 2, 28), at(2024, 3, 2, 8, 0)), 750);
    }
}
