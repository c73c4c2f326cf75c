// Engine Configuration
// Defaults mirror the visualizer's scene: AU-scaled markers, ~60 fps frames,
// and a 2,000,000x default time warp.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::error::ConfigError;

const ENV_PREFIX: &str = "NEO_ENGINE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on a single frame's wall-clock delta (seconds)
    pub max_frame_delta_secs: f64,
    /// Asteroid marker radius in scene units (AU)
    pub asteroid_marker_radius: f64,
    /// Earth marker radius in scene units (AU)
    pub earth_marker_radius: f64,
    /// Minimum wall-clock gap between countdown label refreshes
    pub countdown_refresh_interval_ms: u64,
    /// Target frame pacing of the background loop
    pub frame_interval_ms: u64,
    /// Number of samples in a rendered orbit path (361 = 1° steps, closed)
    pub path_samples: usize,
    pub default_time_scale: f64,
    pub min_time_scale: f64,
    pub max_time_scale: f64,
    pub max_speed_multiplier: f64,
    /// Eccentricities at or above 1 are clamped to this
    pub max_eccentricity: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frame_delta_secs: 0.1,
            asteroid_marker_radius: 0.025,
            earth_marker_radius: 0.03,
            countdown_refresh_interval_ms: 100,
            frame_interval_ms: 16,
            path_samples: 361,
            default_time_scale: 2_000_000.0,
            min_time_scale: 1_000.0,
            max_time_scale: 50_000_000.0,
            max_speed_multiplier: 5.0,
            max_eccentricity: 0.99,
        }
    }
}

impl EngineConfig {
    /// Load overrides from the process environment (and a `.env` file if one
    /// exists) on top of the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_field(&lookup, "MAX_FRAME_DELTA_SECS", &mut config.max_frame_delta_secs)?;
        override_field(&lookup, "ASTEROID_MARKER_RADIUS", &mut config.asteroid_marker_radius)?;
        override_field(&lookup, "EARTH_MARKER_RADIUS", &mut config.earth_marker_radius)?;
        override_field(
            &lookup,
            "COUNTDOWN_REFRESH_INTERVAL_MS",
            &mut config.countdown_refresh_interval_ms,
        )?;
        override_field(&lookup, "FRAME_INTERVAL_MS", &mut config.frame_interval_ms)?;
        override_field(&lookup, "PATH_SAMPLES", &mut config.path_samples)?;
        override_field(&lookup, "DEFAULT_TIME_SCALE", &mut config.default_time_scale)?;
        override_field(&lookup, "MIN_TIME_SCALE", &mut config.min_time_scale)?;
        override_field(&lookup, "MAX_TIME_SCALE", &mut config.max_time_scale)?;
        override_field(&lookup, "MAX_SPEED_MULTIPLIER", &mut config.max_speed_multiplier)?;
        override_field(&lookup, "MAX_ECCENTRICITY", &mut config.max_eccentricity)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_frame_delta_secs", self.max_frame_delta_secs),
            ("asteroid_marker_radius", self.asteroid_marker_radius),
            ("earth_marker_radius", self.earth_marker_radius),
            ("default_time_scale", self.default_time_scale),
            ("min_time_scale", self.min_time_scale),
            ("max_time_scale", self.max_time_scale),
            ("max_eccentricity", self.max_eccentricity),
        ];
        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { key, value });
            }
        }
        if self.min_time_scale > self.max_time_scale {
            return Err(ConfigError::TimeScaleRange {
                min: self.min_time_scale,
                max: self.max_time_scale,
            });
        }
        if self.max_eccentricity >= 1.0 {
            return Err(ConfigError::InvalidValue {
                key: "max_eccentricity",
                value: self.max_eccentricity.to_string(),
            });
        }
        if self.path_samples < 2 {
            return Err(ConfigError::InvalidValue {
                key: "path_samples",
                value: self.path_samples.to_string(),
            });
        }
        Ok(())
    }

    /// Distance at or below which the two markers are considered touching.
    pub fn proximity_threshold(&self) -> f64 {
        self.asteroid_marker_radius + self.earth_marker_radius
    }

    /// Clamp a requested time scale into the supported range.
    pub fn clamp_time_scale(&self, scale: f64) -> f64 {
        if scale.is_finite() {
            scale.clamp(self.min_time_scale, self.max_time_scale)
        } else {
            self.default_time_scale
        }
    }

    /// Clamp a per-body speed multiplier into `[0, max_speed_multiplier]`.
    pub fn clamp_speed(&self, speed: f64) -> f64 {
        if speed.is_finite() {
            speed.clamp(0.0, self.max_speed_multiplier)
        } else {
            1.0
        }
    }
}

/// Settings of the headless runner binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Id of the built-in scenario record to load
    pub scenario: String,
    /// How long to drive the frame loop before stopping
    pub run_seconds: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenario: "impactor-2025".to_string(),
            run_seconds: 10,
        }
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        override_field(&lookup, "SCENARIO", &mut config.scenario)?;
        override_field(&lookup, "RUN_SECONDS", &mut config.run_seconds)?;
        Ok(config)
    }
}

fn override_field<T, F>(lookup: &F, name: &'static str, field: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let key = format!("{ENV_PREFIX}{name}");
    if let Some(raw) = lookup(&key) {
        *field = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key: name, value: raw })?;
    }
    Ok(())
}
