use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

/// Environment variable naming an optional JSON config file.
pub const CONFIG_ENV: &str = "POSE_RUNNER_CONFIG";

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub field: FieldConfig,
    pub timing: TimingConfig,
    pub jump: JumpConfig,
    pub spawn: SpawnConfig,
    pub difficulty: DifficultyConfig,
    pub enemy: EnemyConfig,
    pub filter: FilterConfig,
    pub tracking: TrackingConfig,
    /// Fixed RNG seed for reproducible sessions. `None` draws from the OS.
    pub seed: Option<u64>,
}

/// Play field geometry, in abstract units. Every sprite shares one size.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub width: f64,
    pub height: f64,
    pub sprite_width: f64,
    pub sprite_height: f64,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            width: 900.0,
            height: 800.0,
            sprite_width: 100.0,
            sprite_height: 100.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub obstacle_tick_ms: u64,
    pub jump_tick_ms: u64,
    pub score_tick_ms: u64,
    pub enemy_tick_ms: u64,
    pub session_length_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            obstacle_tick_ms: 100,
            jump_tick_ms: 16,
            score_tick_ms: 1000,
            enemy_tick_ms: 50,
            session_length_secs: 300,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct JumpConfig {
    pub duration_ms: u64,
    pub height: f64,
}

impl Default for JumpConfig {
    fn default() -> Self {
        Self {
            duration_ms: 900,
            height: 220.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub base_probability: f64,
    pub probability_per_sec: f64,
    pub max_probability: f64,
    /// Vertical offset new obstacles appear at, above the visible field.
    pub spawn_y: f64,
    /// Minimum vertical distance between obstacles sharing a lane.
    pub min_spacing: f64,
    /// Pattern draws per spawn before giving up for the tick.
    pub max_attempts: u32,
}

impl Default for SpawnConfig {
    fn default() -> Self {
        Self {
            base_probability: 0.05,
            probability_per_sec: 0.01,
            max_probability: 0.35,
            spawn_y: -100.0,
            min_spacing: 200.0,
            max_attempts: 16,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    /// Obstacle step per tick at score zero.
    pub obstacle_step: f64,
    /// Speed multiplier gained per point of score.
    pub speed_per_point: f64,
    /// Obstacles are dropped once `y` reaches this fraction of the field height.
    pub despawn_factor: f64,
    /// Base of the exponential term in the score curve.
    pub score_growth: f64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            obstacle_step: 30.0,
            speed_per_point: 0.05,
            despawn_factor: 1.1,
            score_growth: 1.05,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EnemyConfig {
    /// Per-tick smoothing while the player idles.
    pub chase_smoothing: f64,
    /// Per-tick lateral smoothing while the player advances.
    pub block_smoothing: f64,
    /// Distance of the blocking station above the bottom edge.
    pub station_offset: f64,
}

impl Default for EnemyConfig {
    fn default() -> Self {
        Self {
            chase_smoothing: 0.05,
            block_smoothing: 0.1,
            station_offset: 100.0,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub history_len: usize,
    pub min_consistency: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            history_len: 2,
            min_consistency: 0.7,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Keypoints below this confidence count as absent.
    pub min_confidence: f32,
    /// Consecutive frames without signal before asking for another camera.
    pub lost_signal_frames: u32,
    /// Capture devices the tracker can rotate through.
    pub device_count: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            lost_signal_frames: 120,
            device_count: 1,
        }
    }
}

impl Config {
    /// Read a JSON config file. Missing sections and fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Config = serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    /// Load from the file named by `POSE_RUNNER_CONFIG`, or defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.obstacle_tick_ms == 0 || t.jump_tick_ms == 0 || t.score_tick_ms == 0 || t.enemy_tick_ms == 0 {
            return Err(Error::ConfigValue("tick periods must be positive".into()));
        }
        if self.jump.duration_ms == 0 {
            return Err(Error::ConfigValue("jump duration must be positive".into()));
        }
        if self.field.width <= 0.0 || self.field.height <= 0.0 {
            return Err(Error::ConfigValue("field dimensions must be positive".into()));
        }
        if self.filter.history_len == 0 {
            return Err(Error::ConfigValue("filter history must hold at least one code".into()));
        }
        let s = &self.spawn;
        if !(0.0..=1.0).contains(&s.max_probability) {
            return Err(Error::ConfigValue("spawn probability cap must lie in [0, 1]".into()));
        }
        if !(s.base_probability >= 0.0 && s.probability_per_sec >= 0.0) {
            return Err(Error::ConfigValue("spawn probabilities must be non-negative".into()));
        }
        let f = &self.filter;
        if !(f.min_consistency > 0.0 && f.min_consistency <= 1.0) {
            return Err(Error::ConfigValue("filter consistency must lie in (0, 1]".into()));
        }
        let e = &self.enemy;
        if !(0.0..=1.0).contains(&e.chase_smoothing) || !(0.0..=1.0).contains(&e.block_smoothing) {
            return Err(Error::ConfigValue("enemy smoothing must lie in [0, 1]".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"jump":{"height":180.0},"seed":7}"#).unwrap();
        assert_eq!(cfg.jump.height, 180.0);
        assert_eq!(cfg.jump.duration_ms, 900);
        assert_eq!(cfg.seed, Some(7));
        assert_eq!(cfg.spawn.min_spacing, 200.0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut cfg = Config::default();
        cfg.timing.enemy_tick_ms = 0;
        assert!(matches!(cfg.validate(), Err(Error::ConfigValue(_))));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases: [fn(&mut Config); 6] = [
            |c| c.spawn.max_probability = 1.5,
            |c| c.spawn.base_probability = -0.1,
            |c| c.spawn.probability_per_sec = f64::NAN,
            |c| c.filter.min_consistency = 0.0,
            |c| c.filter.min_consistency = 1.2,
            |c| c.enemy.block_smoothing = 2.0,
        ];
        for (i, tweak) in cases.iter().enumerate() {
            let mut cfg = Config::default();
            tweak(&mut cfg);
            assert!(matches!(cfg.validate(), Err(Error::ConfigValue(_))), "case {i}");
        }
        let mut cfg = Config::default();
        cfg.enemy.chase_smoothing = 1.0;
        cfg.filter.min_consistency = 1.0;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::from_file(Path::new("/nonexistent/pose-runner.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/pose-runner.json"));
    }
}
