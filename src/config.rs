use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Which clock marker timestamps are read from.
///
/// `Effective` excludes time spent paused, so a reaction that straddles a
/// pause is measured without the pause. `Wall` uses the raw session time and
/// reproduces the uncompensated measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionTimebase {
    #[default]
    Effective,
    Wall,
}

/// Immutable engine parameters, handed to every component at construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub lanes: usize,
    pub level_count: usize,
    pub level_duration_secs: f64,
    pub base_speed: f64,
    pub speed_increment: f64,
    pub acceleration: f64,
    pub spawn_interval_secs: f64,
    pub field_height: f64,
    pub judgment_line_y: f64,
    pub marker_height: f64,
    pub miss_grace_secs: f64,
    pub duplicate_window_secs: f64,
    pub flash_secs: f64,
    pub seed: Option<u64>,
    pub reaction_timebase: ReactionTimebase,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lanes: 4,
            level_count: 5,
            level_duration_secs: 70.0,
            base_speed: 2.0,
            speed_increment: 3.5,
            acceleration: 0.0,
            spawn_interval_secs: 0.6,
            field_height: 600.0,
            judgment_line_y: 500.0,
            marker_height: 40.0,
            miss_grace_secs: 0.5,
            duplicate_window_secs: 0.5,
            flash_secs: 0.2,
            seed: None,
            reaction_timebase: ReactionTimebase::Effective,
        }
    }
}

impl EngineConfig {
    /// Refuse configurations the engine cannot run in a defined state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 {
            return Err(ConfigError::NoLanes);
        }
        if self.level_count == 0 {
            return Err(ConfigError::NoLevels);
        }
        for (field, value) in [
            ("base_speed", self.base_speed),
            ("speed_increment", self.speed_increment),
            ("acceleration", self.acceleration),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
        }
        for (field, value) in [
            ("level_duration_secs", self.level_duration_secs),
            ("spawn_interval_secs", self.spawn_interval_secs),
            ("field_height", self.field_height),
            ("marker_height", self.marker_height),
            ("base_speed", self.base_speed),
        ] {
            // NaN fails this comparison too
            if !(value > 0.0) || !value.is_finite() {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [
            ("miss_grace_secs", self.miss_grace_secs),
            ("duplicate_window_secs", self.duplicate_window_secs),
            ("flash_secs", self.flash_secs),
        ] {
            if !(value >= 0.0) || !value.is_finite() {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.speed_increment < 0.0 {
            return Err(ConfigError::Negative {
                field: "speed_increment",
                value: self.speed_increment,
            });
        }
        for (field, value) in [
            ("level_duration_secs", self.level_duration_secs),
            ("spawn_interval_secs", self.spawn_interval_secs),
            ("miss_grace_secs", self.miss_grace_secs),
            ("duplicate_window_secs", self.duplicate_window_secs),
            ("flash_secs", self.flash_secs),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if !(self.judgment_line_y > self.marker_height)
            || self.judgment_line_y > self.field_height
        {
            return Err(ConfigError::LineOutsideField {
                line: self.judgment_line_y,
                height: self.field_height,
            });
        }
        Ok(())
    }

    pub fn level_duration(&self) -> Duration {
        Duration::from_secs_f64(self.level_duration_secs)
    }

    pub fn spawn_interval(&self) -> Duration {
        Duration::from_secs_f64(self.spawn_interval_secs)
    }

    pub fn miss_grace(&self) -> Duration {
        Duration::from_secs_f64(self.miss_grace_secs)
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs_f64(self.duplicate_window_secs)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_secs_f64(self.flash_secs)
    }
}

/// Concrete medium the binary persists records to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Csv,
    Sqlite,
}

/// Persisted application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub lane_keys: String,
    pub sink: SinkKind,
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            lane_keys: "dfjk".to_string(),
            sink: SinkKind::Csv,
            data_dir: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        let keys = self.lane_keys.chars().count();
        if keys != self.engine.lanes {
            return Err(ConfigError::KeyCountMismatch {
                keys,
                lanes: self.engine.lanes,
            });
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "lanetap") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("lanetap_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!(
                    "ignoring unreadable config {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
