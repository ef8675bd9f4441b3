//! # Error Types
//!
//! Error handling for the opcode registry and dispatch core.
//!
//! ## Error Categories
//! - **Setup Errors**: duplicate bindings, duplicate handlers, reservations that
//!   collide or fall outside the opcode space. These abort protocol initialization.
//! - **Capacity Errors**: the opcode space is exhausted. Existing bindings stay usable.
//! - **Per-Message Errors**: unknown opcodes, missing handlers, codec failures.
//!   Recoverable; the caller drops the single message and the connection continues.
//! - **Handler Errors**: raised by application handlers and returned unchanged
//!   from dispatch.
//!
//! ## Example Usage
//! ```rust
//! use protocol_registry::error::{ProtocolError, Result};
//! use protocol_registry::registry::Opcode;
//!
//! fn check(opcode: Opcode, max: u32) -> Result<()> {
//!     if opcode.get() >= max {
//!         return Err(ProtocolError::OpcodeOutOfRange { opcode, max });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(Opcode::new(3), 4).is_ok());
//! assert!(check(Opcode::new(4), 4).is_err());
//! ```

use crate::registry::{MessageType, Opcode};
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Lock errors
    pub const ERR_CODEC_TABLE_WRITE_LOCK: &str = "Failed to acquire write lock on codec table";
    pub const ERR_CODEC_TABLE_READ_LOCK: &str = "Failed to acquire read lock on codec table";
}

// ProtocolError is the primary error type for all registry operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Opcode space exhausted (max opcode {max})")]
    CapacityExceeded { max: u32 },

    #[error("Opcode {opcode} or message type '{message_type}' is already reserved")]
    AlreadyReserved {
        opcode: Opcode,
        message_type: MessageType,
    },

    #[error("Conflicting codec binding for message type '{0}'")]
    DuplicateBinding(MessageType),

    #[error("Handler already registered for message type '{0}'")]
    DuplicateHandler(MessageType),

    #[error("Opcode {opcode} outside of opcode space [0, {max})")]
    OpcodeOutOfRange { opcode: Opcode, max: u32 },

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(Opcode),

    #[error("No codec known for message type '{0}'")]
    UnknownMessageType(MessageType),

    #[error("No handler registered for message type '{0}'")]
    NoHandler(MessageType),

    #[error("Dynamic opcode allocation is disabled (message type '{0}')")]
    DynamicDisabled(MessageType),

    #[error("Expected message type '{expected}', got '{actual}'")]
    MessageTypeMismatch {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Deserialize error: {0}")]
    DeserializeError(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Per-message failures leave the protocol and the connection usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::UnknownOpcode(_)
                | ProtocolError::NoHandler(_)
                | ProtocolError::MessageTypeMismatch { .. }
                | ProtocolError::SerializeError(_)
                | ProtocolError::DeserializeError(_)
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProtocolError::UnknownOpcode(Opcode::new(7));
        assert_eq!(err.to_string(), "Unknown opcode: 7");

        let err = ProtocolError::NoHandler(MessageType::from_static("pong"));
        assert_eq!(err.to_string(), "No handler registered for message type 'pong'");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ProtocolError::UnknownOpcode(Opcode::new(1)).is_recoverable());
        assert!(ProtocolError::NoHandler(MessageType::from_static("a")).is_recoverable());
        assert!(!ProtocolError::CapacityExceeded { max: 4 }.is_recoverable());
        assert!(!ProtocolError::DuplicateHandler(MessageType::from_static("a")).is_recoverable());
    }
}
