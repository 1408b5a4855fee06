//! Audio analysis module
//!
//! This module contains the analysis pipeline and its lifecycle:
//! - Snapshot and metric types ([`types`])
//! - Pure metric derivation ([`metrics`])
//! - FFT-based spectral analysis ([`analyzer`])
//! - Stream sources the analyzer reads from ([`stream`])
//! - Platform selection and processing contexts ([`platform`])
//! - Host frame scheduling ([`scheduler`])
//! - Lifecycle states and transition rules ([`state`])
//! - Cancellable tick bookkeeping ([`processing`])
//! - The engine tying it all together ([`engine`])

pub mod analyzer;
pub mod engine;
pub mod metrics;
pub mod platform;
pub mod processing;
pub mod scheduler;
pub mod state;
pub mod stream;
pub mod types;
