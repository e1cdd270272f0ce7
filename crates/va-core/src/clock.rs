//! Injectable clock — lets the orchestrator and admission layer be tested
//! with deterministic time instead of `chrono::Utc::now()` / `Instant::now()`.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;

/// Abstraction over wall-clock and monotonic time.
///
/// Production code uses [`SystemClock`]; tests use [`FixedClock`] so that
/// TTL expiry, admission counters, and timer-fire logic are deterministic.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    /// A clock pinned to a fixed instant, advanced explicitly by tests.
    pub struct FixedClock {
        utc: Mutex<DateTime<Utc>>,
        mono: Instant,
    }

    impl FixedClock {
        pub fn new(start: DateTime<Utc>) -> Self {
            Self {
                utc: Mutex::new(start),
                mono: Instant::now(),
            }
        }

        pub fn advance(&self, delta: chrono::Duration) {
            let mut guard = self.utc.lock().unwrap();
            *guard += delta;
        }
    }

    impl Clock for FixedClock {
        fn now_utc(&self) -> DateTime<Utc> {
            *self.utc.lock().unwrap()
        }

        fn monotonic(&self) -> Instant {
            self.mono
        }
    }
}
