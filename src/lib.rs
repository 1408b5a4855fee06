//! Audioscope - real-time audio stream analysis
//!
//! This library re-exports the analysis engine, metric derivation and
//! telemetry storage from `audioscope-core`.
//!
//! The `audioscope` binary drives the engine from a terminal frame clock.

pub use audioscope_core::audio;
pub use audioscope_core::config;
pub use audioscope_core::error;
pub use audioscope_core::stats;

pub use audioscope_core::{
    AudioEngine, AudioSnapshot, AudioStream, ConfigUpdate, DerivedMetrics, EngineConfig,
    EngineError, EngineHandle, EngineState, FftAnalyzer, FrameQueue, FrameScheduler, MeterStore,
    RingStream, SpectralAnalyzer,
};
pub use audioscope_core::{BUILD_DATE, DEFAULT_FFT_SIZE, DEFAULT_SAMPLE_RATE, VERSION};
