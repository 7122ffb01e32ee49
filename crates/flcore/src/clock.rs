//! Monotonic time source abstraction, so the playback tick state machine
//! (§4.D, §8) can be driven by a deterministic fake clock in tests instead
//! of the wall clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// A monotonic source of "now", expressed as an offset from some
/// unspecified origin. Only deltas between successive calls are
/// meaningful.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Wraps `std::time::Instant` for production use.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A manually-advanced clock for deterministic tests (spec §8: "fake clock
/// in tests").
///
/// # Example
/// ```
/// use flcore::clock::{Clock, FakeClock};
/// use std::time::Duration;
///
/// let clock = FakeClock::new();
/// assert_eq!(clock.now(), Duration::ZERO);
/// clock.advance(Duration::from_millis(16));
/// assert_eq!(clock.now(), Duration::from_millis(16));
/// ```
pub struct FakeClock {
    nanos: AtomicU64,
}

impl FakeClock {
    #[must_use]
    pub fn new() -> Self {
        Self { nanos: AtomicU64::new(0) }
    }

    pub fn advance(&self, dt: Duration) {
        #[allow(clippy::cast_possible_truncation)]
        self.nanos.fetch_add(dt.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
