//! Engine lifecycle states and transition rules
//!
//! ```text
//! Uninitialized --initialize--> Initialized --connect--> Connected
//!                                    ^                       |
//!                               initialize                 start
//!                                    |                       v
//!                                 Stopped <--stop-- Processing <-> Paused
//!                                                    (pause / resume)
//! any --destroy--> Destroyed
//! ```
//!
//! [`EngineState::transition`] is the single table deciding whether an
//! operation moves the engine, is a documented no-op, or is misuse.

use crate::error::{EngineError, Result};

/// Audio engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// Created, no resources allocated
    Uninitialized,
    /// Processing context and buffers allocated
    Initialized,
    /// Analyzer bound to a stream
    Connected,
    /// Loop is running
    Processing,
    /// Loop halted, context suspended
    Paused,
    /// Resources released; may be initialized again
    Stopped,
    /// Permanently unusable
    Destroyed,
}

/// Operations subject to lifecycle rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    Connect,
    Start,
    Pause,
    Resume,
    Stop,
    Destroy,
    Reconfigure,
}

impl Operation {
    /// Name used in error messages
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Initialize => "initialize",
            Operation::Connect => "connect",
            Operation::Start => "start",
            Operation::Pause => "pause",
            Operation::Resume => "resume",
            Operation::Stop => "stop",
            Operation::Destroy => "destroy",
            Operation::Reconfigure => "reconfigure",
        }
    }
}

/// Outcome of a legal operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move to the given state
    To(EngineState),
    /// Leave the state unchanged without error
    Stay,
}

impl EngineState {
    /// Whether the engine currently holds a processing context
    pub fn holds_resources(&self) -> bool {
        matches!(
            self,
            EngineState::Initialized
                | EngineState::Connected
                | EngineState::Processing
                | EngineState::Paused
        )
    }

    /// Whether a stream is bound
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            EngineState::Connected | EngineState::Processing | EngineState::Paused
        )
    }

    /// Decide what `operation` does from this state
    pub fn transition(self, operation: Operation) -> Result<Transition> {
        use EngineState::*;

        if self == Destroyed {
            return match operation {
                Operation::Destroy => Ok(Transition::Stay),
                _ => Err(EngineError::Destroyed),
            };
        }

        match (operation, self) {
            (Operation::Initialize, Uninitialized | Stopped) => Ok(Transition::To(Initialized)),
            (Operation::Initialize, _) => Err(EngineError::AlreadyInitialized),

            (Operation::Connect, Initialized) => Ok(Transition::To(Connected)),
            (Operation::Connect, Uninitialized | Stopped) => Err(EngineError::NotInitialized),
            (Operation::Connect, _) => Err(EngineError::AlreadyConnected),

            (Operation::Start, Connected | Paused) => Ok(Transition::To(Processing)),
            (Operation::Start, Processing) => Ok(Transition::Stay),
            (Operation::Start, Initialized) => Err(EngineError::NotConnected),
            (Operation::Start, _) => Err(EngineError::NotInitialized),

            (Operation::Pause, Processing) => Ok(Transition::To(Paused)),
            (Operation::Pause, _) => Ok(Transition::Stay),

            (Operation::Resume, Paused) => Ok(Transition::To(Processing)),
            (Operation::Resume, Processing) => Ok(Transition::Stay),
            (Operation::Resume, state) => Err(EngineError::InvalidTransition {
                state,
                operation: operation.name(),
            }),

            (Operation::Stop, state) if state.holds_resources() => Ok(Transition::To(Stopped)),
            (Operation::Stop, _) => Ok(Transition::Stay),

            (Operation::Destroy, _) => Ok(Transition::To(Destroyed)),

            (Operation::Reconfigure, Uninitialized | Stopped) => Err(EngineError::NotInitialized),
            (Operation::Reconfigure, _) => Ok(Transition::Stay),
        }
    }
}
