//! Daily fire-time computation.

use chrono::{DateTime, Days, FixedOffset, NaiveTime, TimeDelta, Utc};

/// A wall-clock time that recurs every day in a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

impl DailySchedule {
    #[must_use]
    pub const fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self { time, offset }
    }

    /// The first occurrence strictly after `now`.
    #[must_use]
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.offset).naive_local();

        let mut candidate = local_now.date().and_time(self.time);
        if candidate <= local_now {
            candidate = candidate
                .checked_add_days(Days::new(1))
                .unwrap_or(candidate);
        }

        (candidate - TimeDelta::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }
}
