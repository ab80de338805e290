use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Source of the current wall-clock time.
///
/// Loan status and late fees depend on "now"; controllers take a clock so
/// both can be evaluated at a fixed instant in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time of the machine running the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl FixedClock {
    /// Clock frozen at `hour:00` on the given day.
    ///
    /// # Panics
    /// Panics if the date or hour is invalid.
    #[must_use]
    pub fn at(year: i32, month: u32, day: u32, hour: u32) -> Self {
        let at = NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .expect("valid calendar instant");
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Midnight at the start of `date`.
#[must_use]
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::default())
}
