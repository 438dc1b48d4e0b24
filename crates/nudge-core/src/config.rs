//! Coaching engine configuration
//!
//! Config is loaded with a layered resolution:
//! 1. `NUDGE_CONFIG` environment variable, if set
//! 2. Override in data dir (~/.local/share/nudge/config.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! Every section is `#[serde(default)]`, so an override file only needs the
//! keys it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../config/coach.toml");

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "NUDGE_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CoachConfig {
    pub engine: EngineConfig,
    pub thresholds: Thresholds,
    pub behavior: BehaviorConfig,
    pub personas: PersonaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_insights: usize,
    pub default_cooldown_hours: i64,
    pub lookback_days: i64,
    pub trend_window_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_insights: 8,
            default_cooldown_hours: 72,
            lookback_days: 90,
            trend_window_days: 28,
        }
    }
}

/// Base rule thresholds, before behavioral adjustment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub budget_warning_ratio: f64,
    pub budget_exceeded_ratio: f64,
    pub burn_rate_ratio: f64,
    pub discretionary_share: f64,
    pub discretionary_min_amount: f64,
    pub category_spike_multiplier: f64,
    pub category_spike_min_amount: f64,
    pub weekend_skew_ratio: f64,
    pub late_night_min_count: usize,
    /// Savings rate, as a fraction of the goal, below which the goal counts as missed
    pub savings_missed_ratio: f64,
    pub default_savings_goal: f64,
    pub predicted_overrun_min_amount: f64,
    pub large_transaction_multiplier: f64,
    pub large_transaction_min_amount: f64,
    pub mood_trigger_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            budget_warning_ratio: 0.8,
            budget_exceeded_ratio: 1.0,
            burn_rate_ratio: 1.1,
            discretionary_share: 0.35,
            discretionary_min_amount: 150.0,
            category_spike_multiplier: 1.5,
            category_spike_min_amount: 75.0,
            weekend_skew_ratio: 1.6,
            late_night_min_count: 3,
            savings_missed_ratio: 0.5,
            default_savings_goal: 0.2,
            predicted_overrun_min_amount: 25.0,
            large_transaction_multiplier: 3.0,
            large_transaction_min_amount: 100.0,
            mood_trigger_ratio: 1.25,
        }
    }
}

/// Knobs for the behavior adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    pub min_samples: usize,
    pub ignore_cutoff: f64,
    pub accept_cutoff: f64,
    pub suppress_cutoff: f64,
    pub low_multiplier: f64,
    pub high_multiplier: f64,
    pub max_nudges_low: usize,
    pub max_nudges_normal: usize,
    pub max_nudges_high: usize,
    pub quiet_start_hour: u32,
    pub quiet_end_hour: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            ignore_cutoff: 0.6,
            accept_cutoff: 0.6,
            suppress_cutoff: 0.8,
            low_multiplier: 1.25,
            high_multiplier: 0.85,
            max_nudges_low: 2,
            max_nudges_normal: 4,
            max_nudges_high: 6,
            quiet_start_hour: 22,
            quiet_end_hour: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub directory: PathBuf,
    pub synthesize_missing: bool,
    pub seed: u64,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("personas"),
            synthesize_missing: false,
            seed: 42,
        }
    }
}

impl CoachConfig {
    /// Resolve config from env override, data dir override, or embedded defaults
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                info!(path = %path, "Loading coach config from {}", CONFIG_ENV);
                return Self::from_file(Path::new(&path));
            }
        }

        if let Some(path) = Self::override_path() {
            if path.exists() {
                info!(path = %path.display(), "Loading coach config override");
                return Self::from_file(&path);
            }
        }

        debug!("Using embedded coach config");
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Parse a config file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Location of the user override file (~/.local/share/nudge/config.toml)
    pub fn override_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("nudge").join("config.toml"))
    }
}
