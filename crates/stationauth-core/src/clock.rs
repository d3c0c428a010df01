//! Wall-clock access and per-request deadlines.
//!
//! A [`Deadline`] is built once per task invocation from the request's
//! `expiry_time` and threaded through every timeout-bounded call, so the
//! staleness check and the store query budget are derived from the same
//! instant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::OffsetDateTime;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the system wall clock (UTC).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that always returns a settable instant. Used by tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Wraps a clock so successive readings strictly increase.
///
/// A reading equal to or earlier than the previous one is bumped to one
/// nanosecond after it. Audit record keys embed the start instant, so two
/// invocations never share a key.
pub struct MonotonicClock {
    inner: Arc<dyn Clock>,
    last: Mutex<Option<OffsetDateTime>>,
}

impl MonotonicClock {
    pub fn new(inner: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            last: Mutex::new(None),
        }
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> OffsetDateTime {
        let reading = self.inner.now();
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let next = match *last {
            Some(prev) if reading <= prev => prev + time::Duration::nanoseconds(1),
            _ => reading,
        };
        *last = Some(next);
        next
    }
}

/// Absolute point in time after which a request is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    expires_at: OffsetDateTime,
}

impl Deadline {
    pub fn new(expires_at: OffsetDateTime) -> Self {
        Self { expires_at }
    }

    /// Deadline `timeout` after `now`.
    pub fn after(now: OffsetDateTime, timeout: Duration) -> Self {
        Self::new(now + timeout)
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Time left until expiry, or `None` once the deadline has been reached.
    ///
    /// Never returns a zero duration: a request with nothing left is expired.
    pub fn remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        let left = self.expires_at - now;
        if left <= time::Duration::ZERO {
            return None;
        }
        Duration::try_from(left).ok().filter(|d| !d.is_zero())
    }
}
