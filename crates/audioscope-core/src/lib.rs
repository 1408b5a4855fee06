//! Audioscope Core - Spectral analysis, metric derivation and processing loop
//!
//! This library turns a live audio stream into continuous spectral and level
//! telemetry for visualization and voice-activity gating. An [`AudioEngine`]
//! owns a spectral analyzer and drives it from a cooperative, frame-driven
//! scheduler, dispatching derived metrics to registered callbacks.

pub mod audio;
pub mod config;
pub mod error;
pub mod stats;

pub use audio::analyzer::{FftAnalyzer, SpectralAnalyzer};
pub use audio::engine::{AudioEngine, EngineHandle};
pub use audio::metrics::{ActivityTracker, AudioStats};
pub use audio::platform::{AudioPlatform, ProcessingContext, SoftwarePlatform};
pub use audio::scheduler::{FrameHandle, FrameQueue, FrameScheduler};
pub use audio::state::EngineState;
pub use audio::stream::{AudioStream, RingStream};
pub use audio::types::{AudioSnapshot, DerivedMetrics};
pub use config::{ConfigUpdate, EngineConfig};
pub use error::{ContextError, EngineError, Result};
pub use stats::store::MeterStore;

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date stamped by build.rs
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Default transform size (2048 samples, 1024 frequency bins)
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Smallest accepted transform size
pub const MIN_FFT_SIZE: usize = 32;

/// Largest accepted transform size
pub const MAX_FFT_SIZE: usize = 32768;

/// Sample rate assumed by synthetic sources when none is given
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
