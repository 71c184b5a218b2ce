//! Acquisition-epoch clocks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic seconds in the same epoch as the acquisition source timestamps.
pub trait Clock: Send + Sync {
    fn local_clock(&self) -> f64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn local_clock(&self) -> f64 {
        (**self).local_clock()
    }
}

/// Seconds since the clock was created.
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
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
    fn local_clock(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for tests and replays. Never goes backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, now: f64) {
        let current = f64::from_bits(self.bits.load(Ordering::Acquire));
        if now >= current {
            self.bits.store(now.to_bits(), Ordering::Release);
        }
    }

    pub fn advance(&self, dt: f64) {
        let _ = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + dt.max(0.0)).to_bits())
            });
    }
}

impl Clock for ManualClock {
    fn local_clock(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_forward() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        assert_eq!(clock.local_clock(), 1.5);
        clock.set(1.0);
        assert_eq!(clock.local_clock(), 1.5);
        clock.advance(-3.0);
        assert_eq!(clock.local_clock(), 1.5);
    }

    #[test]
    fn test_monotonic_clock_is_non_decreasing() {
        let clock = MonotonicClock::new();
        let a = clock.local_clock();
        let b = clock.local_clock();
        assert!(b >= a);
    }
}
