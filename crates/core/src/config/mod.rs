use std::{collections::BTreeMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Category, DrumLightError, Percent, Result, Rgb};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timing: TimingConfig,
    pub queues: QueueConfig,
    pub brightness: BrightnessConfig,
    pub baseline: BaselineConfig,
    /// Per-category colour overrides. An entry replaces the built-in colour.
    pub colors: BTreeMap<Category, Rgb>,
}

impl AppConfig {
    /// Parses a (possibly partial) JSON document, filling gaps with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.timing.validate()?;
        self.queues.validate()?;
        self.brightness.validate()
    }
}

/// Timing knobs for the scheduling loop and animations, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub flash_duration_seconds: f64,
    pub max_event_age_seconds: f64,
    /// Bound on how long the loop waits on the normal lane before it
    /// rechecks the high lane.
    pub normal_wait_seconds: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            flash_duration_seconds: 0.1,
            max_event_age_seconds: 1.0,
            normal_wait_seconds: 0.01,
        }
    }
}

impl TimingConfig {
    pub fn flash_duration(&self) -> Duration {
        seconds(self.flash_duration_seconds)
    }

    pub fn max_event_age(&self) -> Duration {
        seconds(self.max_event_age_seconds)
    }

    pub fn normal_wait(&self) -> Duration {
        seconds(self.normal_wait_seconds)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("flash_duration_seconds", self.flash_duration_seconds),
            ("max_event_age_seconds", self.max_event_age_seconds),
            ("normal_wait_seconds", self.normal_wait_seconds),
        ] {
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(DrumLightError::config(format!(
                    "`{name}` must be a non-negative number of seconds within range, got {value}"
                )));
            }
        }
        if self.normal_wait_seconds == 0.0 {
            return Err(DrumLightError::config("`normal_wait_seconds` must be positive"));
        }
        Ok(())
    }
}

/// Saturating conversion: negative or NaN becomes zero, overflow becomes
/// [`Duration::MAX`].
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Capacities of the two event lanes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub high_priority_capacity: usize,
    pub normal_priority_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_priority_capacity: 5,
            normal_priority_capacity: 10,
        }
    }
}

impl QueueConfig {
    fn validate(&self) -> Result<()> {
        if self.high_priority_capacity == 0 || self.normal_priority_capacity == 0 {
            return Err(DrumLightError::config("queue capacities must be at least 1"));
        }
        if self.high_priority_capacity >= self.normal_priority_capacity {
            return Err(DrumLightError::config(format!(
                "high priority capacity ({}) must be smaller than normal priority capacity ({})",
                self.high_priority_capacity, self.normal_priority_capacity
            )));
        }
        Ok(())
    }
}

/// Intensity to brightness curve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessConfig {
    pub floor: Percent,
    pub ceiling: Percent,
    pub velocity_to_brightness: bool,
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            floor: Percent::saturating(30),
            ceiling: Percent::FULL,
            velocity_to_brightness: true,
        }
    }
}

impl BrightnessConfig {
    fn validate(&self) -> Result<()> {
        if self.floor > self.ceiling {
            return Err(DrumLightError::config(format!(
                "brightness floor ({}) exceeds ceiling ({})",
                self.floor, self.ceiling
            )));
        }
        Ok(())
    }
}

/// Resting colour and brightness, applied at startup, used as the fade
/// target and restored at shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineConfig {
    pub color: Rgb,
    pub brightness: Percent,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            color: Rgb::new(255, 255, 255),
            brightness: Percent::saturating(50),
        }
    }
}
