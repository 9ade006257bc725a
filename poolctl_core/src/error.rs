use poolctl_traits::PortError;
use thiserror::Error;

use crate::events::DeviceId;

/// Synchronous rejection of a device command. Never retried automatically.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    /// Out-of-range user input, rejected before any actuation.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// A precondition device is not in the required state.
    #[error("interlock violation: {0}")]
    InterlockViolation(&'static str),
    #[error("{device} does not support {command}")]
    Unsupported {
        device: DeviceId,
        command: &'static str,
    },
    #[error("actuation failed: {0}")]
    Port(#[from] PortError),
}

impl CommandError {
    /// Stable failure code reported back to the command caller.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InterlockViolation(_) => "interlock_violation",
            Self::Unsupported { .. } => "unsupported_command",
            Self::Port(_) => "port_error",
        }
    }
}

/// Process-level fault. The control loop stops and runs the ordered shutdown.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Fault {
    #[error("actuation port unreachable after {failures} consecutive failed writes")]
    ActuationUnreachable { failures: u32 },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
