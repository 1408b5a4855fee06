//! Snapshot and metric types shared across the pipeline

use serde::{Deserialize, Serialize};

/// Time-domain byte value representing silence
pub const SILENCE_BYTE: u8 = 128;

/// One capture of frequency and waveform data
///
/// Produced once per tick as an owned copy; callers may keep it after the
/// tick ends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSnapshot {
    /// Magnitude per frequency bin, mapped to 0-255 over the decibel range
    pub frequency_bins: Vec<u8>,
    /// Waveform samples, 128 = zero crossing
    pub time_domain: Vec<u8>,
}

impl AudioSnapshot {
    /// Create a snapshot from raw byte buffers
    pub fn new(frequency_bins: Vec<u8>, time_domain: Vec<u8>) -> Self {
        Self {
            frequency_bins,
            time_domain,
        }
    }

    /// A silent snapshot for the given transform size
    pub fn silent(fft_size: usize) -> Self {
        Self {
            frequency_bins: vec![0; fft_size / 2],
            time_domain: vec![SILENCE_BYTE; fft_size],
        }
    }

    /// Whether the snapshot carries no frequency data
    pub fn is_empty(&self) -> bool {
        self.frequency_bins.is_empty()
    }
}

/// Metrics derived from a single snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// RMS of normalized bins (0.0 to 1.0)
    pub level: f32,
    /// Whether level is above the activity threshold
    pub is_active: bool,
    /// Frequency of the strongest bin in Hz
    pub dominant_frequency_hz: f32,
    /// Normalized average magnitude per band (0.0 to 1.0)
    pub bands: Vec<f32>,
}

impl DerivedMetrics {
    /// Zeroed, inactive metrics with `band_count` empty bands
    pub fn zeroed(band_count: usize) -> Self {
        Self {
            level: 0.0,
            is_active: false,
            dominant_frequency_hz: 0.0,
            bands: vec![0.0; band_count],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_snapshot_sizes() {
        let snapshot = AudioSnapshot::silent(256);
        assert_eq!(snapshot.frequency_bins.len(), 128);
        assert_eq!(snapshot.time_domain.len(), 256);
        assert!(snapshot.frequency_bins.iter().all(|&b| b == 0));
        assert!(snapshot.time_domain.iter().all(|&b| b == SILENCE_BYTE));
    }

    #[test]
    fn test_zeroed_metrics() {
        let metrics = DerivedMetrics::zeroed(4);
        assert_eq!(metrics.bands, vec![0.0; 4]);
        assert!(!metrics.is_active);
        assert_eq!(metrics.level, 0.0);
    }

    #[test]
    fn test_metrics_serialize() {
        let metrics = DerivedMetrics {
            level: 0.5,
            is_active: true,
            dominant_frequency_hz: 440.0,
            bands: vec![0.25, 0.75],
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["is_active"], true);
        assert_eq!(json["bands"].as_array().map(|b| b.len()), Some(2));
    }
}
