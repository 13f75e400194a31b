use std::time::Duration;

use serde::Serialize;

use crate::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerState {
    Active,
    Hit,
    Missed,
}

/// Judgment geometry shared by the lifecycle and the judge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub line_y: f64,
    pub marker_height: f64,
}

impl Window {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            line_y: config.judgment_line_y,
            marker_height: config.marker_height,
        }
    }

    pub fn top(&self) -> f64 {
        self.line_y - self.marker_height
    }

    /// `[line - height, line]`, both ends inclusive.
    pub fn contains(&self, y: f64) -> bool {
        self.top() <= y && y <= self.line_y
    }
}

/// What a single advance did to a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Moved,
    BecameHittable,
    Missed,
}

/// One falling reaction target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub lane: usize,
    pub y: f64,
    pub speed: f64,
    state: MarkerState,
    became_hittable_at: Option<Duration>,
    resolved_at: Option<Duration>,
}

impl Marker {
    pub fn spawn(lane: usize, speed: f64) -> Self {
        Self::at(lane, speed, 0.0)
    }

    pub fn at(lane: usize, speed: f64, y: f64) -> Self {
        Self {
            lane,
            y,
            speed,
            state: MarkerState::Active,
            became_hittable_at: None,
            resolved_at: None,
        }
    }

    pub fn state(&self) -> MarkerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MarkerState::Active
    }

    pub fn became_hittable_at(&self) -> Option<Duration> {
        self.became_hittable_at
    }

    pub fn resolved_at(&self) -> Option<Duration> {
        self.resolved_at
    }

    /// One tick of movement. Only active markers move; a marker past the
    /// line turns `Missed` in the same tick it crosses.
    pub fn advance(&mut self, window: &Window, now: Duration) -> Option<Transition> {
        if self.state != MarkerState::Active {
            return None;
        }
        self.y += self.speed;

        if self.y > window.line_y {
            self.state = MarkerState::Missed;
            self.resolved_at = Some(now);
            return Some(Transition::Missed);
        }
        if self.became_hittable_at.is_none() && self.y >= window.top() {
            self.became_hittable_at = Some(now);
            return Some(Transition::BecameHittable);
        }
        Some(Transition::Moved)
    }

    /// Marks the entry into the window for a marker placed there directly.
    pub fn observe_window(&mut self, window: &Window, now: Duration) {
        if self.is_active() && self.became_hittable_at.is_none() && self.y >= window.top() {
            self.became_hittable_at = Some(now);
        }
    }

    /// `Active -> Hit`. Returns false and leaves the marker untouched from
    /// any other state.
    pub fn hit(&mut self, now: Duration) -> bool {
        if self.state != MarkerState::Active {
            return false;
        }
        self.state = MarkerState::Hit;
        self.resolved_at = Some(now);
        true
    }

    pub fn is_hittable(&self, window: &Window) -> bool {
        self.is_active() && window.contains(self.y)
    }

    /// Time from entering the window to resolution, when both are known.
    pub fn reaction_time(&self) -> Option<Duration> {
        match (self.became_hittable_at, self.resolved_at) {
            (Some(start), Some(end)) => Some(end.saturating_sub(start)),
            _ => None,
        }
    }

    pub fn distance_from(&self, window: &Window) -> f64 {
        (self.y - window.line_y).abs()
    }

    /// Resolved more than `grace` ago.
    pub fn expired(&self, now: Duration, grace: Duration) -> bool {
        self.resolved_at
            .is_some_and(|at| now.saturating_sub(at) > grace)
    }
}

/// Arena of the markers a level currently owns, in spawn order.
///
/// `live` holds active and missed markers (what gets drawn); hit markers
/// leave it immediately and stay in `recent_hits` only long enough to
/// classify a repeated press as a duplicate.
#[derive(Debug, Clone, Default)]
pub struct MarkerField {
    live: Vec<Marker>,
    recent_hits: Vec<Marker>,
}

impl MarkerField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, marker: Marker) {
        self.live.push(marker);
    }

    pub fn live(&self) -> &[Marker] {
        &self.live
    }

    pub fn recent_hits(&self) -> &[Marker] {
        &self.recent_hits
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Advances every active marker; returns the markers that turned
    /// `Missed` this tick.
    pub fn advance(&mut self, window: &Window, now: Duration) -> Vec<Marker> {
        self.live
            .iter_mut()
            .filter_map(|m| match m.advance(window, now) {
                Some(Transition::Missed) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drops missed markers past the display grace and hits past the
    /// duplicate window. Bookkeeping only.
    pub fn prune(&mut self, now: Duration, miss_grace: Duration, duplicate_window: Duration) {
        self.live
            .retain(|m| !(m.state() == MarkerState::Missed && m.expired(now, miss_grace)));
        self.recent_hits
            .retain(|m| !m.expired(now, duplicate_window));
    }

    /// First hittable marker in `lane`, in spawn order.
    pub fn first_hittable(&self, lane: usize, window: &Window) -> Option<usize> {
        self.live
            .iter()
            .position(|m| m.lane == lane && m.is_hittable(window))
    }

    /// Resolves the marker at `index` as a hit and moves it out of the live
    /// set.
    pub fn take_hit(&mut self, index: usize, now: Duration) -> Option<Marker> {
        let marker = self.live.get_mut(index)?;
        if !marker.hit(now) {
            return None;
        }
        let marker = self.live.remove(index);
        self.recent_hits.push(marker.clone());
        Some(marker)
    }

    /// Most recent hit in `lane` still inside the duplicate window.
    pub fn recent_hit(&self, lane: usize, now: Duration, window: Duration) -> Option<&Marker> {
        self.recent_hits
            .iter()
            .rev()
            .find(|m| m.lane == lane && !m.expired(now, window))
    }

    pub fn clear(&mut self) {
        self.live.clear();
        self.recent_hits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Window {
        Window {
            line_y: 500.0,
            marker_height: 40.0,
        }
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn new_marker_is_active_at_top() {
        let m = Marker::spawn(2, 2.0);
        assert_eq!(m.state(), MarkerState::Active);
        assert_eq!(m.y, 0.0);
        assert_eq!(m.became_hittable_at(), None);
        assert_eq!(m.resolved_at(), None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let w = window();
        assert!(w.contains(460.0));
        assert!(w.contains(500.0));
        assert!(!w.contains(459.9));
        assert!(!w.contains(500.1));
    }

    #[test]
    fn entering_window_sets_hittable_once() {
        let w = window();
        let mut m = Marker::at(0, 2.0, 456.0);
        assert_eq!(m.advance(&w, ms(10)), Some(Transition::Moved));
        assert_eq!(m.advance(&w, ms(20)), Some(Transition::BecameHittable));
        assert_eq!(m.became_hittable_at(), Some(ms(20)));
        assert_eq!(m.advance(&w, ms(30)), Some(Transition::Moved));
        assert_eq!(m.became_hittable_at(), Some(ms(20)));
    }

    #[test]
    fn crossing_the_line_misses() {
        let w = window();
        let mut m = Marker::at(1, 2.0, 499.0);
        assert_eq!(m.advance(&w, ms(100)), Some(Transition::Missed));
        assert_eq!(m.state(), MarkerState::Missed);
        assert!(m.y > w.line_y);
        assert_eq!(m.resolved_at(), Some(ms(100)));

        // terminal: no further movement
        let y = m.y;
        assert_eq!(m.advance(&w, ms(116)), None);
        assert_eq!(m.y, y);
    }

    #[test]
    fn exactly_on_the_line_is_still_hittable() {
        let w = window();
        let mut m = Marker::at(1, 2.0, 498.0);
        m.advance(&w, ms(5));
        assert_eq!(m.y, 500.0);
        assert!(m.is_hittable(&w));
    }

    #[test]
    fn hit_is_terminal_and_sets_resolution() {
        let mut m = Marker::at(3, 2.0, 480.0);
        assert!(m.hit(ms(40)));
        assert_eq!(m.state(), MarkerState::Hit);
        assert_eq!(m.resolved_at(), Some(ms(40)));
        assert!(!m.hit(ms(50)));
        assert_eq!(m.resolved_at(), Some(ms(40)));
    }

    #[test]
    fn reaction_time_needs_both_timestamps() {
        let w = window();
        let mut m = Marker::at(0, 2.0, 470.0);
        m.hit(ms(300));
        assert_eq!(m.reaction_time(), None);

        let mut m = Marker::at(0, 2.0, 470.0);
        m.observe_window(&w, ms(100));
        m.hit(ms(300));
        assert_eq!(m.reaction_time(), Some(ms(200)));
    }

    #[test]
    fn field_prunes_missed_after_grace_only() {
        let w = window();
        let mut field = MarkerField::new();
        field.push(Marker::at(0, 2.0, 499.0));
        let missed = field.advance(&w, ms(1000));
        assert_eq!(missed.len(), 1);

        field.prune(ms(1500), ms(500), ms(500));
        assert_eq!(field.len(), 1);
        field.prune(ms(1501), ms(500), ms(500));
        assert!(field.is_empty());
    }

    #[test]
    fn take_hit_moves_marker_to_recent_hits() {
        let w = window();
        let mut field = MarkerField::new();
        field.push(Marker::at(2, 2.0, 100.0));
        field.push(Marker::at(2, 2.0, 480.0));

        let idx = field.first_hittable(2, &w).unwrap();
        assert_eq!(idx, 1);
        let hit = field.take_hit(idx, ms(10)).unwrap();
        assert_eq!(hit.state(), MarkerState::Hit);
        assert_eq!(field.len(), 1);
        assert_eq!(field.recent_hits().len(), 1);
        assert!(field.recent_hit(2, ms(200), ms(500)).is_some());
        assert!(field.recent_hit(1, ms(200), ms(500)).is_none());

        field.prune(ms(600), ms(500), ms(500));
        assert!(field.recent_hits().is_empty());
    }
}
