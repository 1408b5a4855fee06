//! Analysis configuration
//!
//! [`EngineConfig`] is set at initialization and can be changed mid-life
//! through a partial [`ConfigUpdate`]. Both serialize to JSON; missing fields
//! fall back to their defaults.

use crate::error::{EngineError, Result};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_fft_size() -> usize {
    crate::DEFAULT_FFT_SIZE
}

fn default_smoothing() -> f32 {
    0.8
}

fn default_min_decibels() -> f32 {
    -100.0
}

fn default_max_decibels() -> f32 {
    -30.0
}

fn default_activity_threshold() -> f32 {
    0.1
}

fn default_band_count() -> usize {
    8
}

fn default_level_epsilon() -> f32 {
    0.001
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Transform size in samples (power of two)
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Time smoothing constant for magnitudes (0.0 = none, 1.0 = frozen)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
    /// Magnitude mapped to byte 0
    #[serde(default = "default_min_decibels")]
    pub min_decibels: f32,
    /// Magnitude mapped to byte 255
    #[serde(default = "default_max_decibels")]
    pub max_decibels: f32,
    /// Level above which audio counts as active
    #[serde(default = "default_activity_threshold")]
    pub activity_threshold: f32,
    /// Number of bands reported in per-tick metrics
    #[serde(default = "default_band_count")]
    pub band_count: usize,
    /// Minimum level change that triggers a level notification
    #[serde(default = "default_level_epsilon")]
    pub level_epsilon: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
            min_decibels: default_min_decibels(),
            max_decibels: default_max_decibels(),
            activity_threshold: default_activity_threshold(),
            band_count: default_band_count(),
            level_epsilon: default_level_epsilon(),
        }
    }
}

impl EngineConfig {
    /// Number of frequency bins produced per snapshot
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Check every field against its legal range
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two()
            || !(crate::MIN_FFT_SIZE..=crate::MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(EngineError::InvalidConfig(format!(
                "fft_size must be a power of two in {}..={}, got {}",
                crate::MIN_FFT_SIZE,
                crate::MAX_FFT_SIZE,
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(EngineError::InvalidConfig(format!(
                "smoothing must be within 0.0..=1.0, got {}",
                self.smoothing
            )));
        }
        if !self.min_decibels.is_finite()
            || !self.max_decibels.is_finite()
            || self.min_decibels >= self.max_decibels
        {
            return Err(EngineError::InvalidConfig(format!(
                "decibel range {}..{} is empty",
                self.min_decibels, self.max_decibels
            )));
        }
        if !self.activity_threshold.is_finite() {
            return Err(EngineError::InvalidConfig(
                "activity_threshold must be finite".to_string(),
            ));
        }
        if self.band_count == 0 {
            return Err(EngineError::InvalidConfig(
                "band_count must be at least 1".to_string(),
            ));
        }
        if self.level_epsilon.is_nan() || self.level_epsilon < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "level_epsilon must be non-negative, got {}",
                self.level_epsilon
            )));
        }
        Ok(())
    }

    /// Produce a new config with the update's fields applied
    pub fn merged(&self, update: &ConfigUpdate) -> Self {
        Self {
            fft_size: update.fft_size.unwrap_or(self.fft_size),
            smoothing: update.smoothing.unwrap_or(self.smoothing),
            min_decibels: update.min_decibels.unwrap_or(self.min_decibels),
            max_decibels: update.max_decibels.unwrap_or(self.max_decibels),
            activity_threshold: update
                .activity_threshold
                .unwrap_or(self.activity_threshold),
            band_count: update.band_count.unwrap_or(self.band_count),
            level_epsilon: update.level_epsilon.unwrap_or(self.level_epsilon),
        }
    }

    /// Load config from disk, falling back to defaults on any error
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        tracing::info!(path = %path.display(), "Loaded config from disk");
                        config
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Config rejected, using defaults");
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }
}

/// Partial configuration for mid-life updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub fft_size: Option<usize>,
    #[serde(default)]
    pub smoothing: Option<f32>,
    #[serde(default)]
    pub min_decibels: Option<f32>,
    #[serde(default)]
    pub max_decibels: Option<f32>,
    #[serde(default)]
    pub activity_threshold: Option<f32>,
    #[serde(default)]
    pub band_count: Option<usize>,
    #[serde(default)]
    pub level_epsilon: Option<f32>,
}

impl ConfigUpdate {
    /// Whether applying this update changes the transform size
    pub fn resizes(&self, current: &EngineConfig) -> bool {
        self.fft_size.is_some_and(|size| size != current.fft_size)
    }
}
