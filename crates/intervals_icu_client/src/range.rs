//! Calendar date ranges used as `oldest`/`newest` query parameters.

use chrono::{Duration, NaiveDate};

/// Inclusive range of calendar dates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateRange {
    oldest: NaiveDate,
    newest: NaiveDate,
}

impl DateRange {
    /// Swaps the bounds if they are given in the wrong order.
    pub fn new(oldest: NaiveDate, newest: NaiveDate) -> Self {
        if oldest <= newest {
            Self { oldest, newest }
        } else {
            Self {
                oldest: newest,
                newest: oldest,
            }
        }
    }

    /// The last `days` days ending with `today`, today included.
    /// Zero is treated as one day. Ranges reaching past the earliest
    /// representable date start at [`NaiveDate::MIN`].
    pub fn last_days(days: u32, today: NaiveDate) -> Self {
        let back = i64::from(days.max(1)) - 1;
        let oldest = today
            .checked_sub_signed(Duration::days(back))
            .unwrap_or(NaiveDate::MIN);
        Self::new(oldest, today)
    }

    /// From `today` up to `days` days ahead.
    pub fn ahead(today: NaiveDate, days: i64) -> Self {
        let newest = today
            .checked_add_signed(Duration::days(days))
            .unwrap_or(NaiveDate::MAX);
        Self::new(today, newest)
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    pub fn oldest(&self) -> NaiveDate {
        self.oldest
    }

    pub fn newest(&self) -> NaiveDate {
        self.newest
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.newest - self.oldest).num_days() + 1
    }

    /// Query pairs in the form the API expects (`YYYY-MM-DD`).
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("oldest", self.oldest.format("%Y-%m-%d").to_string()),
            ("newest", self.newest.format("%Y-%m-%d").to_string()),
        ]
    }
}
