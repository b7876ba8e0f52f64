use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::errors::PageViewError;

/// Source of "now" for the resolver.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Clock positioned at noon of the day after `day`, so that `day` is the
    /// last complete day.
    pub fn with_last_complete_day(day: NaiveDate) -> Self {
        let next = day + Duration::days(1);
        let noon = next.and_hms_opt(12, 0, 0).unwrap_or_default().and_utc();
        Self { now: noon }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

/// Longest range a caller may ask for, about ten years.
pub const MAX_DAYS: i64 = 3650;

/// Inclusive range of whole UTC days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Range of `num_days` days ending at (and including) `end`.
    pub fn ending_at(end: NaiveDate, num_days: i64) -> Result<Self, PageViewError> {
        if num_days <= 0 {
            return Err(PageViewError::InvalidArgument(format!(
                "number of days must be positive, got {}",
                num_days
            )));
        }
        let start = Duration::try_days(num_days - 1)
            .and_then(|span| end.checked_sub_signed(span))
            .ok_or_else(|| {
                PageViewError::InvalidArgument(format!("{} days is out of range", num_days))
            })?;
        Ok(Self { start, end })
    }

    pub fn days(&self) -> usize {
        ((self.end - self.start).num_days() + 1) as usize
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.days())
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedDay {
    computed_on: NaiveDate,
    last_complete_day: NaiveDate,
}

/// Resolves day counts into ranges ending at the last complete UTC day.
pub struct RangeResolver {
    clock: Mutex<Arc<dyn Clock>>,
    cached: Mutex<Option<CachedDay>>,
}

impl RangeResolver {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Mutex::new(clock),
            cached: Mutex::new(None),
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    pub fn set_clock(&self, clock: Arc<dyn Clock>) {
        *self.clock.lock().unwrap_or_else(|e| e.into_inner()) = clock;
        self.invalidate();
    }

    pub fn invalidate(&self) {
        *self.cached.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The most recent UTC day that has fully elapsed.
    pub fn last_complete_day(&self) -> NaiveDate {
        let today = {
            let clock = self.clock.lock().unwrap_or_else(|e| e.into_inner());
            clock.now().date_naive()
        };

        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        match *cached {
            // a long-running process rolls over at midnight
            Some(day) if day.computed_on == today => day.last_complete_day,
            _ => {
                let last_complete_day = today - Duration::days(1);
                debug!("Last complete day is {}", last_complete_day);
                *cached = Some(CachedDay {
                    computed_on: today,
                    last_complete_day,
                });
                last_complete_day
            }
        }
    }

    /// Range of the last `num_days` complete days, at most [`MAX_DAYS`].
    pub fn resolve(&self, num_days: i64) -> Result<DateRange, PageViewError> {
        if num_days > MAX_DAYS {
            return Err(PageViewError::InvalidArgument(format!(
                "number of days must be at most {}, got {}",
                MAX_DAYS, num_days
            )));
        }
        DateRange::ending_at(self.last_complete_day(), num_days)
    }
}

impl Default for RangeResolver {
    fn default() -> Self {
        Self::system()
    }
}
