use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Order in which the declared levels are played.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TraversalMode {
    /// Levels in construction order, slowest first.
    #[default]
    Sequential,
    /// Levels permuted once at session start.
    Shuffled,
}

/// One declared difficulty step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub speed: f64,
    /// Reserved for a per-tick speed ramp; the engine applies none.
    pub acceleration_hint: f64,
}

/// Fixed sequence of levels for one session.
#[derive(Debug, Clone)]
pub struct DifficultyProgram {
    levels: Vec<Level>,
    mode: TraversalMode,
}

impl DifficultyProgram {
    /// Level `i` runs at `base_speed + i * increment`. In shuffled mode the
    /// order is permuted exactly once, here.
    pub fn new<R: Rng + ?Sized>(
        count: usize,
        base_speed: f64,
        increment: f64,
        acceleration: f64,
        mode: TraversalMode,
        rng: &mut R,
    ) -> Self {
        let mut levels: Vec<Level> = (0..count)
            .map(|i| Level {
                speed: base_speed + i as f64 * increment,
                acceleration_hint: acceleration,
            })
            .collect();

        if mode == TraversalMode::Shuffled {
            levels.shuffle(rng);
        }

        Self { levels, mode }
    }

    pub fn from_config<R: Rng + ?Sized>(
        config: &EngineConfig,
        mode: TraversalMode,
        rng: &mut R,
    ) -> Self {
        Self::new(
            config.level_count,
            config.base_speed,
            config.speed_increment,
            config.acceleration,
            mode,
            rng,
        )
    }

    /// Pure lookup by zero-based position in the session order.
    pub fn level(&self, index: usize) -> Result<&Level, EngineError> {
        self.levels.get(index).ok_or(EngineError::LevelOutOfRange {
            index,
            count: self.levels.len(),
        })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn mode(&self) -> TraversalMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn sequential_speeds_increase_linearly() {
        let program =
            DifficultyProgram::new(5, 2.0, 3.5, 0.0, TraversalMode::Sequential, &mut rng());
        let speeds: Vec<f64> = program.levels().iter().map(|l| l.speed).collect();
        assert_eq!(speeds, vec![2.0, 5.5, 9.0, 12.5, 16.0]);
        assert!(program.levels().iter().all(|l| l.acceleration_hint == 0.0));
    }

    #[test]
    fn shuffled_is_a_permutation_of_sequential() {
        let sequential =
            DifficultyProgram::new(8, 1.0, 1.0, 0.0, TraversalMode::Sequential, &mut rng());
        let shuffled =
            DifficultyProgram::new(8, 1.0, 1.0, 0.0, TraversalMode::Shuffled, &mut rng());

        let mut a: Vec<f64> = sequential.levels().iter().map(|l| l.speed).collect();
        let mut b: Vec<f64> = shuffled.levels().iter().map(|l| l.speed).collect();
        a.sort_by(|x, y| x.partial_cmp(y).unwrap());
        b.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(a, b);
        assert_eq!(shuffled.mode(), TraversalMode::Shuffled);
    }

    #[test]
    fn shuffled_order_is_fixed_once_built() {
        let program =
            DifficultyProgram::new(6, 2.0, 3.5, 0.0, TraversalMode::Shuffled, &mut rng());
        let first: Vec<Level> = program.levels().to_vec();
        for (i, level) in first.iter().enumerate() {
            assert_eq!(program.level(i).unwrap(), level);
        }
    }

    #[test]
    fn same_seed_gives_same_shuffle() {
        let a = DifficultyProgram::new(6, 2.0, 3.5, 0.0, TraversalMode::Shuffled, &mut rng());
        let b = DifficultyProgram::new(6, 2.0, 3.5, 0.0, TraversalMode::Shuffled, &mut rng());
        assert_eq!(a.levels(), b.levels());
    }

    #[test]
    fn lookup_beyond_count_is_an_error() {
        let program =
            DifficultyProgram::new(3, 2.0, 1.0, 0.0, TraversalMode::Sequential, &mut rng());
        assert_matches!(
            program.level(3),
            Err(EngineError::LevelOutOfRange { index: 3, count: 3 })
        );
    }

    #[test]
    fn from_config_uses_declared_parameters() {
        let config = EngineConfig {
            level_count: 2,
            base_speed: 4.0,
            speed_increment: 1.5,
            ..EngineConfig::default()
        };
        let program = DifficultyProgram::from_config(&config, TraversalMode::Sequential, &mut rng());
        assert_eq!(program.len(), 2);
        assert_eq!(program.level(1).unwrap().speed, 5.5);
    }

    #[test]
    fn mode_displays_lowercase() {
        assert_eq!(TraversalMode::Sequential.to_string(), "sequential");
        assert_eq!(TraversalMode::Shuffled.to_string(), "shuffled");
    }
}
