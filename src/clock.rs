use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic elapsed-time provider.
pub trait TimeSource {
    /// Time elapsed since the source's origin. Never decreases.
    fn now(&self) -> Duration;
}

/// Production time source backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven time source for tests and headless runs. Clones share the
/// same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualTimeSource {
    now: Rc<Cell<Duration>>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Moves the time forward to `to`; earlier values are ignored.
    pub fn set(&self, to: Duration) {
        if to > self.now.get() {
            self.now.set(to);
        }
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Elapsed-time accounting for one level run.
///
/// All inputs are raw times from a [`TimeSource`]. The effective elapsed
/// time is `raw_elapsed - paused_accumulated` and only moves while the clock
/// is running.
#[derive(Debug, Clone)]
pub struct SessionClock {
    origin: Duration,
    raw_elapsed: Duration,
    paused_accumulated: Duration,
    pause_started_at: Option<Duration>,
}

impl SessionClock {
    pub fn start(origin: Duration) -> Self {
        Self {
            origin,
            raw_elapsed: Duration::ZERO,
            paused_accumulated: Duration::ZERO,
            pause_started_at: None,
        }
    }

    /// Refresh the raw elapsed time. Ignored while paused.
    pub fn update(&mut self, now: Duration) {
        if self.pause_started_at.is_none() {
            let raw = now.saturating_sub(self.origin);
            if raw > self.raw_elapsed {
                self.raw_elapsed = raw;
            }
        }
    }

    pub fn pause(&mut self, now: Duration) {
        if self.pause_started_at.is_none() {
            self.update(now);
            self.pause_started_at = Some(now);
        }
    }

    pub fn resume(&mut self, now: Duration) {
        if let Some(started) = self.pause_started_at.take() {
            self.paused_accumulated += now.saturating_sub(started);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started_at.is_some()
    }

    /// Effective elapsed time as of the last update.
    pub fn effective(&self) -> Duration {
        self.raw_elapsed.saturating_sub(self.paused_accumulated)
    }

    /// Effective elapsed time at `now` without mutating the clock. Frozen
    /// while paused.
    pub fn effective_at(&self, now: Duration) -> Duration {
        match self.pause_started_at {
            Some(_) => self.effective(),
            None => now
                .saturating_sub(self.origin)
                .max(self.raw_elapsed)
                .saturating_sub(self.paused_accumulated),
        }
    }

    /// Raw time since the level started, pauses included.
    pub fn raw_at(&self, now: Duration) -> Duration {
        now.saturating_sub(self.origin)
    }

    pub fn paused_accumulated(&self) -> Duration {
        self.paused_accumulated
    }

    pub fn remaining(&self, total: Duration) -> Duration {
        total.saturating_sub(self.effective())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn effective_tracks_raw_time_without_pauses() {
        let mut clock = SessionClock::start(secs(10.0));
        clock.update(secs(12.5));
        assert_eq!(clock.effective(), secs(2.5));
        assert_eq!(clock.remaining(secs(70.0)), secs(67.5));
    }

    #[test]
    fn effective_never_decreases_across_updates() {
        let mut clock = SessionClock::start(Duration::ZERO);
        let mut last = Duration::ZERO;
        for ms in [0u64, 16, 33, 33, 50, 40, 66, 100] {
            clock.update(Duration::from_millis(ms));
            assert!(clock.effective() >= last);
            last = clock.effective();
        }
        assert_eq!(last, Duration::from_millis(100));
    }

    #[test]
    fn pause_freezes_and_resume_excludes_paused_span() {
        let mut clock = SessionClock::start(Duration::ZERO);
        clock.update(secs(5.0));
        clock.pause(secs(5.0));
        clock.update(secs(9.0));
        assert_eq!(clock.effective(), secs(5.0));
        assert_eq!(clock.effective_at(secs(9.0)), secs(5.0));

        clock.resume(secs(9.0));
        clock.update(secs(9.0));
        assert_eq!(clock.effective(), secs(5.0));
        assert_eq!(clock.paused_accumulated(), secs(4.0));

        clock.update(secs(10.0));
        assert_eq!(clock.effective(), secs(6.0));
    }

    #[test]
    fn double_pause_and_stray_resume_are_harmless() {
        let mut clock = SessionClock::start(Duration::ZERO);
        clock.resume(secs(1.0));
        assert_eq!(clock.paused_accumulated(), Duration::ZERO);

        clock.pause(secs(2.0));
        clock.pause(secs(3.0));
        clock.resume(secs(4.0));
        assert_eq!(clock.paused_accumulated(), secs(2.0));
        assert!(!clock.is_paused());
    }

    #[test]
    fn time_before_origin_saturates_to_zero() {
        let mut clock = SessionClock::start(secs(3.0));
        clock.update(secs(1.0));
        assert_eq!(clock.effective(), Duration::ZERO);
        assert_eq!(clock.raw_at(secs(1.0)), Duration::ZERO);
    }

    #[test]
    fn manual_time_source_is_shared_between_clones() {
        let source = ManualTimeSource::new();
        let handle = source.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(source.now(), Duration::from_millis(250));

        handle.set(Duration::from_millis(100));
        assert_eq!(source.now(), Duration::from_millis(250));
    }

    #[test]
    fn monotonic_time_source_moves_forward() {
        let source = MonotonicTimeSource::new();
        let a = source.now();
        let b = source.now();
        assert!(b >= a);
    }
}
