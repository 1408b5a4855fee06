//! Error types for the analysis engine
//!
//! Lifecycle misuse is reported synchronously through [`EngineError`].
//! Processing-context failures use [`ContextError`]; the engine logs them
//! and never converts them into an [`EngineError`].

use crate::audio::state::EngineState;
use thiserror::Error;

/// Errors returned by engine operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    #[error("A stream is already connected")]
    AlreadyConnected,

    #[error("No stream connected")]
    NotConnected,

    #[error("Failed to connect stream: {0}")]
    ConnectionError(String),

    #[error("Engine has been destroyed")]
    Destroyed,

    #[error("Cannot reconfigure while a processing tick is in flight")]
    ReconfigureWhileProcessing,

    #[error("Cannot {operation} while {state:?}")]
    InvalidTransition {
        state: EngineState,
        operation: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No supported audio platform: {0}")]
    UnsupportedPlatform(String),
}

/// Errors reported by a processing context
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Processing context is already closed")]
    AlreadyClosed,

    #[error("Processing context does not support suspension")]
    SuspendUnsupported,

    #[error("Processing context failure: {0}")]
    Backend(String),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
