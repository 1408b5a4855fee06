//! Platform selection and processing contexts
//!
//! An [`AudioPlatform`] supplies the two resources an engine owns: a
//! [`ProcessingContext`] allocated at initialization and closed exactly once
//! on stop, and the [`SpectralAnalyzer`] bound at connect time. Platforms are
//! chosen once at construction by [`select_platform`], which takes the first
//! supported candidate.

use super::analyzer::{FftAnalyzer, SpectralAnalyzer};
use crate::config::EngineConfig;
use crate::error::{ContextError, EngineError, Result};

/// Lifecycle of a processing context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Context is processing
    Running,
    /// Context is suspended
    Suspended,
    /// Context has been closed and cannot be reused
    Closed,
}

/// Resource the engine allocates per initialization
pub trait ProcessingContext {
    /// Current context state
    fn state(&self) -> ContextState;

    /// Suspend processing; platforms without suspension return an error
    fn suspend(&mut self) -> std::result::Result<(), ContextError>;

    /// Resume a suspended context
    fn resume(&mut self) -> std::result::Result<(), ContextError>;

    /// Release the context
    fn close(&mut self) -> std::result::Result<(), ContextError>;
}

/// Source of processing contexts and analyzers
pub trait AudioPlatform {
    /// Platform name for logging
    fn name(&self) -> &'static str;

    /// Whether this platform can run here
    fn is_supported(&self) -> bool {
        true
    }

    /// Allocate a processing context
    fn create_context(&self, config: &EngineConfig) -> Result<Box<dyn ProcessingContext>>;

    /// Construct an analyzer sized from `config`
    fn create_analyzer(&self, config: &EngineConfig) -> Box<dyn SpectralAnalyzer>;
}

/// Pick the first supported platform from `candidates`
pub fn select_platform(candidates: Vec<Box<dyn AudioPlatform>>) -> Result<Box<dyn AudioPlatform>> {
    let mut rejected = Vec::new();
    for candidate in candidates {
        if candidate.is_supported() {
            tracing::debug!("Selected audio platform: {}", candidate.name());
            return Ok(candidate);
        }
        rejected.push(candidate.name());
    }
    let reason = if rejected.is_empty() {
        "no candidates given".to_string()
    } else {
        format!("unsupported: {}", rejected.join(", "))
    };
    Err(EngineError::UnsupportedPlatform(reason))
}

/// Default platform for this build
pub fn default_platform() -> Result<Box<dyn AudioPlatform>> {
    select_platform(vec![Box::new(SoftwarePlatform)])
}

/// In-process context with suspension support
#[derive(Debug)]
pub struct SoftwareContext {
    state: ContextState,
}

impl SoftwareContext {
    /// Create a context in the running state
    pub fn new() -> Self {
        Self {
            state: ContextState::Running,
        }
    }
}

impl Default for SoftwareContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingContext for SoftwareContext {
    fn state(&self) -> ContextState {
        self.state
    }

    fn suspend(&mut self) -> std::result::Result<(), ContextError> {
        match self.state {
            ContextState::Closed => Err(ContextError::AlreadyClosed),
            _ => {
                self.state = ContextState::Suspended;
                Ok(())
            }
        }
    }

    fn resume(&mut self) -> std::result::Result<(), ContextError> {
        match self.state {
            ContextState::Closed => Err(ContextError::AlreadyClosed),
            _ => {
                self.state = ContextState::Running;
                Ok(())
            }
        }
    }

    fn close(&mut self) -> std::result::Result<(), ContextError> {
        if self.state == ContextState::Closed {
            return Err(ContextError::AlreadyClosed);
        }
        self.state = ContextState::Closed;
        Ok(())
    }
}

/// Pure-software platform backed by rustfft, available everywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwarePlatform;

impl AudioPlatform for SoftwarePlatform {
    fn name(&self) -> &'static str {
        "software"
    }

    fn create_context(&self, _config: &EngineConfig) -> Result<Box<dyn ProcessingContext>> {
        Ok(Box::new(SoftwareContext::new()))
    }

    fn create_analyzer(&self, config: &EngineConfig) -> Box<dyn SpectralAnalyzer> {
        Box::new(FftAnalyzer::new(config))
    }
}
