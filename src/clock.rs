//! Time sources for the store. The engine itself only ever sees `now` as an argument.
use crate::model::TimeStamp;
use chrono::{Duration, Utc};
use std::sync::{Mutex, PoisonError};

pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<TimeStamp<Utc>>,
}

impl ManualClock {
    pub fn new(start: TimeStamp<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }
    pub fn set(&self, now: TimeStamp<Utc>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = (current.to_datetime_utc() + by).into();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeStamp<Utc> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// lets tests keep a handle on the clock they gave to a store
impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> TimeStamp<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = TimeStamp::new_with(2026, 2, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start.clone());
        assert_eq!(clock.now(), start);

        clock.advance(Duration::days(2));
        assert_eq!(start.days_until(&clock.now()), 2);
    }
}
