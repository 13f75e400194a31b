use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::marker::{Marker, MarkerField, Window};

/// Result of one press or one missed marker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Outcome {
    Hit,
    Miss,
    Duplicate,
    Incorrect,
}

/// Timing and geometry of a resolved press, before it is stamped into an
/// analytics event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub outcome: Outcome,
    pub lane: usize,
    pub reaction_time: Option<Duration>,
    pub reaction_distance: Option<f64>,
    pub speed: f64,
}

impl Judgment {
    fn from_hit(marker: &Marker, window: &Window) -> Self {
        Self {
            outcome: Outcome::Hit,
            lane: marker.lane,
            reaction_time: marker.reaction_time(),
            reaction_distance: Some(marker.distance_from(window)),
            speed: marker.speed,
        }
    }

    pub fn from_miss(marker: &Marker) -> Self {
        Self {
            outcome: Outcome::Miss,
            lane: marker.lane,
            reaction_time: None,
            reaction_distance: None,
            speed: marker.speed,
        }
    }
}

/// Live streak and press counters for one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub combo: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
    pub incorrect: u32,
    pub duplicates: u32,
    pub total_notes: u32,
}

/// Resolves lane presses against the marker field.
#[derive(Debug, Clone)]
pub struct JudgmentEngine {
    window: Window,
    duplicate_window: Duration,
    counters: Counters,
}

impl JudgmentEngine {
    pub fn new(window: Window, duplicate_window: Duration) -> Self {
        Self {
            window,
            duplicate_window,
            counters: Counters::default(),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Hit the first active marker of `lane` inside the window; otherwise a
    /// press right after a hit in the same lane is a duplicate; anything
    /// else is incorrect. The scan follows spawn order, so if two markers
    /// ever overlap in one lane's window only the older one is hit.
    pub fn resolve_press(
        &mut self,
        lane: usize,
        speed: f64,
        field: &mut MarkerField,
        now: Duration,
    ) -> Judgment {
        if let Some(marker) = field
            .first_hittable(lane, &self.window)
            .and_then(|idx| field.take_hit(idx, now))
        {
            self.counters.combo += 1;
            self.counters.max_combo = self.counters.max_combo.max(self.counters.combo);
            self.counters.hits += 1;
            self.counters.total_notes += 1;
            return Judgment::from_hit(&marker, &self.window);
        }

        if let Some(marker) = field.recent_hit(lane, now, self.duplicate_window) {
            self.counters.duplicates += 1;
            return Judgment {
                outcome: Outcome::Duplicate,
                lane,
                reaction_time: None,
                reaction_distance: None,
                speed: marker.speed,
            };
        }

        self.counters.combo = 0;
        self.counters.incorrect += 1;
        Judgment {
            outcome: Outcome::Incorrect,
            lane,
            reaction_time: None,
            reaction_distance: Some(0.0),
            speed,
        }
    }

    /// A marker crossed the line unanswered.
    pub fn register_miss(&mut self, marker: &Marker) -> Judgment {
        self.counters.combo = 0;
        self.counters.misses += 1;
        self.counters.total_notes += 1;
        Judgment::from_miss(marker)
    }
}
