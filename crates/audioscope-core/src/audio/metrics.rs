//! Metric derivation from audio snapshots
//!
//! Stateless functions over a single [`AudioSnapshot`]. The only state kept
//! between ticks lives in [`ActivityTracker`] (previous activity flag) and in
//! the engine's last notified level.
//!
//! All bin values are normalized by dividing by 255. An empty snapshot yields
//! zero level, inactive, 0 Hz and all-zero bands.

use super::types::{AudioSnapshot, DerivedMetrics};
use serde::{Deserialize, Serialize};

/// Largest byte value a bin can hold
const BIN_MAX: f32 = 255.0;

/// Summary statistics over normalized bins
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioStats {
    /// Mean normalized magnitude
    pub average: f32,
    /// Largest normalized magnitude
    pub peak: f32,
    /// Population variance of normalized magnitudes
    pub variance: f32,
}

/// RMS of normalized frequency bins, in 0.0..=1.0
pub fn level(snapshot: &AudioSnapshot) -> f32 {
    let bins = &snapshot.frequency_bins;
    if bins.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = bins
        .iter()
        .map(|&b| {
            let v = b as f32 / BIN_MAX;
            v * v
        })
        .sum();
    (sum_sq / bins.len() as f32).sqrt().clamp(0.0, 1.0)
}

/// Whether a level counts as active audio
pub fn is_active(level: f32, threshold: f32) -> bool {
    level > threshold
}

/// Frequency of the strongest bin in Hz
///
/// Ties resolve to the lowest bin. Returns 0.0 for an empty snapshot or an
/// invalid transform size.
pub fn dominant_frequency_hz(snapshot: &AudioSnapshot, sample_rate: u32, fft_size: usize) -> f32 {
    if snapshot.frequency_bins.is_empty() || fft_size == 0 {
        return 0.0;
    }
    let mut max_idx = 0;
    let mut max_val = 0u8;
    for (i, &b) in snapshot.frequency_bins.iter().enumerate() {
        if b > max_val {
            max_val = b;
            max_idx = i;
        }
    }
    max_idx as f32 * sample_rate as f32 / fft_size as f32
}

/// Partition bins into `n` contiguous equal-width bands
///
/// Each band reports the normalized average of its bins. The last band
/// absorbs the remainder of the integer division. With more bands than bins
/// each bin gets its own band and the surplus bands read zero.
pub fn bands(snapshot: &AudioSnapshot, n: usize) -> Vec<f32> {
    let bins = &snapshot.frequency_bins;
    if n == 0 {
        return Vec::new();
    }
    if bins.is_empty() {
        return vec![0.0; n];
    }

    let width = (bins.len() / n).max(1);
    (0..n)
        .map(|band| {
            let start = band * width;
            let end = if band == n - 1 {
                bins.len()
            } else {
                (start + width).min(bins.len())
            };
            if start >= end {
                return 0.0;
            }
            let group = &bins[start..end];
            let sum: u32 = group.iter().map(|&b| b as u32).sum();
            sum as f32 / group.len() as f32 / BIN_MAX
        })
        .collect()
}

/// Average, peak and variance of normalized bins
pub fn stats(snapshot: &AudioSnapshot) -> AudioStats {
    let bins = &snapshot.frequency_bins;
    if bins.is_empty() {
        return AudioStats::default();
    }
    let count = bins.len() as f32;
    let values = bins.iter().map(|&b| b as f32 / BIN_MAX);

    let average = values.clone().sum::<f32>() / count;
    let peak = values.clone().fold(0.0f32, f32::max);
    let variance = values.map(|v| (v - average) * (v - average)).sum::<f32>() / count;

    AudioStats {
        average,
        peak,
        variance,
    }
}

/// Whether a level moved far enough from the last notified value
///
/// An epsilon of zero notifies on any change.
pub fn level_changed(previous: f32, current: f32, epsilon: f32) -> bool {
    if epsilon <= 0.0 {
        return previous != current;
    }
    (current - previous).abs() > epsilon
}

/// Edge detector for activity state
///
/// Reports a value only when the activity flag differs from the previous
/// update; repeated active or inactive updates stay silent.
#[derive(Debug, Clone, Default)]
pub struct ActivityTracker {
    active: bool,
}

impl ActivityTracker {
    /// Create a tracker starting in the inactive state
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the current activity flag, returning it on a transition
    pub fn update(&mut self, active: bool) -> Option<bool> {
        if active == self.active {
            return None;
        }
        self.active = active;
        Some(active)
    }

    /// Feed a level against a threshold, returning the new flag on a transition
    pub fn update_level(&mut self, level: f32, threshold: f32) -> Option<bool> {
        self.update(is_active(level, threshold))
    }

    /// Current activity flag
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Return to inactive without reporting a transition
    pub fn reset(&mut self) {
        self.active = false;
    }
}

impl DerivedMetrics {
    /// Compute all per-tick metrics for a snapshot
    pub fn derive(
        snapshot: &AudioSnapshot,
        sample_rate: u32,
        fft_size: usize,
        threshold: f32,
        band_count: usize,
    ) -> Self {
        if snapshot.is_empty() {
            return Self::zeroed(band_count);
        }
        let level = level(snapshot);
        Self {
            level,
            is_active: is_active(level, threshold),
            dominant_frequency_hz: dominant_frequency_hz(snapshot, sample_rate, fft_size),
            bands: bands(snapshot, band_count),
        }
    }
}
