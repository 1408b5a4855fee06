//! Telemetry history
//!
//! Stores time-series level measurements and activity transitions for
//! level-meter trails and session summaries.

pub mod store;
