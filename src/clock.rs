//! Clock sources used to stamp events.
//!
//! The buffer never reads a clock itself; a [`Writer`](crate::writer::Writer)
//! stamps each event with the reading of the clock it was created with.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A monotonic time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

/// Time elapsed since the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        MonotonicClock {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Wall-clock time since the Unix epoch.
///
/// Pair it with [`TraceBufferBuilder::epoch`](crate::buffer::TraceBufferBuilder::epoch)
/// so absolute stamps can be turned back into offsets.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
    }
}

/// Always returns the same reading. Targets without a timer use
/// `FixedClock::default()`, which reads zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FixedClock(pub Duration);

impl Clock for FixedClock {
    fn now(&self) -> Duration {
        self.0
    }
}

/// A clock advanced by hand, shared between a test and its writers.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Duration) -> Self {
        ManualClock {
            nanos: AtomicU64::new(saturating_nanos(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(saturating_nanos(by), Ordering::AcqRel);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(saturating_nanos(to), Ordering::Release);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Acquire))
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Duration::from_secs(2));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::from_millis(2500));
        clock.set(Duration::from_secs(1));
        assert_eq!((&clock).now(), Duration::from_secs(1));
    }

    #[test]
    fn monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }

    #[test]
    fn fixed_clock_defaults_to_zero() {
        assert_eq!(FixedClock::default().now(), Duration::ZERO);
    }
}
