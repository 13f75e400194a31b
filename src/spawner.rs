use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::marker::Marker;

/// Emits markers on a fixed cadence, independent of scroll speed.
#[derive(Debug, Clone)]
pub struct SpawnScheduler {
    interval: Duration,
    lanes: usize,
    last_spawn: Duration,
    spawned: usize,
    rng: StdRng,
}

impl SpawnScheduler {
    pub fn new(interval: Duration, lanes: usize, rng: StdRng) -> Self {
        Self {
            interval,
            lanes,
            last_spawn: Duration::ZERO,
            spawned: 0,
            rng,
        }
    }

    pub fn seeded(interval: Duration, lanes: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(interval, lanes, rng)
    }

    /// At most one marker per call. A caller that stalls for several
    /// intervals gets a single marker and the skipped ones are dropped.
    pub fn advance(&mut self, now: Duration, speed: f64) -> Option<Marker> {
        if self.lanes == 0 || now.saturating_sub(self.last_spawn) < self.interval {
            return None;
        }
        let lane = self.rng.gen_range(0..self.lanes);
        self.last_spawn = now;
        self.spawned += 1;
        log::trace!("spawned marker in lane {} at {:?}", lane, now);
        Some(Marker::spawn(lane, speed))
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn last_spawn(&self) -> Duration {
        self.last_spawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(interval_ms: u64) -> SpawnScheduler {
        SpawnScheduler::seeded(Duration::from_millis(interval_ms), 4, Some(9))
    }

    #[test]
    fn nothing_before_first_interval() {
        let mut s = scheduler(600);
        assert!(s.advance(Duration::from_millis(0), 2.0).is_none());
        assert!(s.advance(Duration::from_millis(599), 2.0).is_none());
        let m = s.advance(Duration::from_millis(600), 2.0).unwrap();
        assert_eq!(m.speed, 2.0);
        assert_eq!(m.y, 0.0);
        assert!(m.lane < 4);
    }

    #[test]
    fn spawn_count_follows_cadence() {
        let interval = 600u64;
        let mut s = scheduler(interval);
        let tick = 16u64;
        let total = 70_000u64;
        let mut t = 0;
        while t <= total {
            s.advance(Duration::from_millis(t), 2.0);
            t += tick;
        }
        let expected = (total / interval) as i64;
        // a tick that lands late pushes later spawns back, never forward
        let spawned = s.spawned() as i64;
        assert!(spawned <= expected + 1, "spawned {spawned}, expected {expected}");
        assert!(spawned >= expected - 2, "spawned {spawned}, expected {expected}");
    }

    #[test]
    fn exact_ticks_give_floor_count() {
        let mut s = scheduler(500);
        for ms in (0..=10_000u64).step_by(50) {
            s.advance(Duration::from_millis(ms), 1.0);
        }
        assert_eq!(s.spawned(), 20);
    }

    #[test]
    fn stalled_caller_gets_one_marker_not_a_burst() {
        let mut s = scheduler(600);
        assert!(s.advance(Duration::from_secs(10), 2.0).is_some());
        assert!(s.advance(Duration::from_secs(10), 2.0).is_none());
        assert_eq!(s.spawned(), 1);
        assert_eq!(s.last_spawn(), Duration::from_secs(10));
    }

    #[test]
    fn lanes_are_drawn_across_the_whole_range() {
        let mut s = scheduler(1);
        let mut seen = [0usize; 4];
        for ms in 1..=400u64 {
            if let Some(m) = s.advance(Duration::from_millis(ms), 1.0) {
                seen[m.lane] += 1;
            }
        }
        assert!(seen.iter().all(|&n| n > 0));
        assert_eq!(seen.iter().sum::<usize>(), 400);
    }

    #[test]
    fn same_seed_same_lanes() {
        let lanes = |seed| {
            let mut s = SpawnScheduler::seeded(Duration::from_millis(1), 4, Some(seed));
            (1..=20u64)
                .filter_map(|ms| s.advance(Duration::from_millis(ms), 1.0))
                .map(|m| m.lane)
                .collect::<Vec<_>>()
        };
        assert_eq!(lanes(3), lanes(3));
    }
}
