//! Clocks and replay pacing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current time.
///
/// Only differences between readings matter, so any fixed origin works.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Monotonic wall clock.
#[derive(Clone, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
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

/// Clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the engine.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, to: Duration) {
        self.nanos.store(to.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Maps capture timestamps onto clock readings.
///
/// A single anchor pairs one clock reading with one capture timestamp. A
/// packet is due once as much clock time has passed since the anchor as
/// capture time separates it from the anchor timestamp.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplayClock {
    anchor: Option<(Duration, Duration)>,
}

impl ReplayClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the anchor. Later calls are ignored.
    pub fn anchor(&mut self, now: Duration, ts: Duration) {
        if self.anchor.is_none() {
            self.anchor = Some((now, ts));
        }
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor.is_some()
    }

    /// Whether a packet stamped `ts` may be emitted at `now`.
    ///
    /// Without an anchor every packet is due.
    pub fn is_due(&self, ts: Duration, now: Duration) -> bool {
        self.time_until_due(ts, now).is_zero()
    }

    /// Clock time left until a packet stamped `ts` is due.
    pub fn time_until_due(&self, ts: Duration, now: Duration) -> Duration {
        match self.anchor {
            Some((anchor_now, anchor_ts)) => ts
                .saturating_sub(anchor_ts)
                .saturating_sub(now.saturating_sub(anchor_now)),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_unanchored_is_always_due() {
        let clock = ReplayClock::new();
        assert!(clock.is_due(ms(1_000_000), ms(0)));
    }

    #[test]
    fn test_due_after_elapsed_gap() {
        let mut clock = ReplayClock::new();
        clock.anchor(ms(500), ms(10_000));
        assert!(clock.is_due(ms(10_000), ms(500)));
        assert!(!clock.is_due(ms(10_200), ms(699)));
        assert_eq!(clock.time_until_due(ms(10_200), ms(650)), ms(50));
        assert!(clock.is_due(ms(10_200), ms(700)));
    }

    #[test]
    fn test_anchor_is_fixed_once() {
        let mut clock = ReplayClock::new();
        clock.anchor(ms(0), ms(100));
        clock.anchor(ms(50), ms(0));
        assert!(!clock.is_due(ms(200), ms(99)));
        assert!(clock.is_due(ms(200), ms(100)));
    }

    #[test]
    fn test_earlier_timestamps_are_due() {
        let mut clock = ReplayClock::new();
        clock.anchor(ms(0), ms(100));
        assert!(clock.is_due(ms(40), ms(0)));
    }

    #[test]
    fn test_manual_clock_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(ms(30));
        assert_eq!(clock.now(), ms(30));
        handle.set(ms(5));
        assert_eq!(clock.now(), ms(5));
    }
}
