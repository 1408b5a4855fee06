//! Time-series storage for level telemetry
//!
//! Keeps a bounded history of level measurements and activity transitions
//! with running statistics for meter trails and session summaries.

use crate::audio::types::DerivedMetrics;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Maximum number of level points to keep
const MAX_HISTORY_SIZE: usize = 3600; // 1 minute at 60 ticks/sec

/// A single level measurement
#[derive(Debug, Clone)]
pub struct LevelPoint {
    /// Timestamp of the measurement
    pub timestamp: DateTime<Utc>,
    /// RMS level (0.0 to 1.0)
    pub level: f32,
}

/// An activity edge
#[derive(Debug, Clone)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    /// New activity state
    pub active: bool,
}

/// Running statistics over recorded levels
#[derive(Debug, Default, Clone)]
pub struct MeterStats {
    /// Most recent level
    pub current_level: f32,
    /// Minimum level observed
    pub min_level: f32,
    /// Maximum level observed
    pub max_level: f32,
    /// Average level over the retained history
    pub avg_level: f32,
    /// Measurements flagged active
    pub active_count: u64,
    /// Recorded activity transitions
    pub transition_count: u64,
    /// Measurement count
    pub measurement_count: u64,
}

/// Bounded level history with running statistics
#[derive(Debug)]
pub struct MeterStore {
    levels: VecDeque<LevelPoint>,
    activity: VecDeque<ActivityEvent>,
    max_size: usize,
    stats: MeterStats,
}

impl MeterStore {
    /// Create a store with the default history size
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_SIZE)
    }

    /// Create a store retaining at most `max_size` points
    pub fn with_capacity(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            levels: VecDeque::with_capacity(max_size),
            activity: VecDeque::new(),
            max_size,
            stats: Self::empty_stats(),
        }
    }

    fn empty_stats() -> MeterStats {
        MeterStats {
            min_level: f32::MAX,
            ..Default::default()
        }
    }

    /// Record one tick's metrics
    pub fn record(&mut self, metrics: &DerivedMetrics) {
        if self.levels.len() >= self.max_size {
            self.levels.pop_front();
        }
        self.levels.push_back(LevelPoint {
            timestamp: Utc::now(),
            level: metrics.level,
        });

        self.stats.current_level = metrics.level;
        self.stats.min_level = self.stats.min_level.min(metrics.level);
        self.stats.max_level = self.stats.max_level.max(metrics.level);
        self.stats.measurement_count += 1;
        if metrics.is_active {
            self.stats.active_count += 1;
        }

        let sum: f32 = self.levels.iter().map(|p| p.level).sum();
        self.stats.avg_level = sum / self.levels.len() as f32;
    }

    /// Record an activity transition
    pub fn record_activity(&mut self, active: bool) {
        if self.activity.len() >= self.max_size {
            self.activity.pop_front();
        }
        self.activity.push_back(ActivityEvent {
            timestamp: Utc::now(),
            active,
        });
        self.stats.transition_count += 1;
    }

    /// Get level history
    pub fn levels(&self) -> &VecDeque<LevelPoint> {
        &self.levels
    }

    /// Get activity transitions
    pub fn activity(&self) -> &VecDeque<ActivityEvent> {
        &self.activity
    }

    /// Get running statistics
    pub fn stats(&self) -> &MeterStats {
        &self.stats
    }

    /// Fraction of measurements flagged active
    pub fn active_ratio(&self) -> f32 {
        if self.stats.measurement_count == 0 {
            return 0.0;
        }
        self.stats.active_count as f32 / self.stats.measurement_count as f32
    }

    /// Clear all history and reset statistics
    pub fn clear(&mut self) {
        self.levels.clear();
        self.activity.clear();
        self.stats = Self::empty_stats();
    }

    /// Get level values for plotting (last N points, newest first)
    ///
    /// # Returns
    /// Vector of (time_offset_seconds, level) pairs with non-positive offsets
    pub fn level_plot_data(&self, count: usize) -> Vec<(f64, f32)> {
        let now = Utc::now();
        self.levels
            .iter()
            .rev()
            .take(count)
            .map(|p| {
                let offset = (now - p.timestamp).num_milliseconds() as f64 / 1000.0;
                (-offset, p.level)
            })
            .collect()
    }
}

impl Default for MeterStore {
    fn default() -> Self {
        Self::new()
    }
}
