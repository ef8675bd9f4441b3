//! Event sink injected into a [`Protocol`](super::Protocol) at construction.
//!
//! Replaces a per-protocol global logger: every notable registry event is reported
//! to the observer, tagged with the protocol name. The default observer forwards
//! to `tracing`.

use crate::registry::{MessageType, Opcode};
use tracing::{debug, error, warn};

pub trait ProtocolObserver: Send + Sync {
    fn static_reserved(&self, _protocol: &str, _message_type: &MessageType, _opcode: Opcode) {}

    /// A first-use opcode was minted. Peers that do not rely on deterministic
    /// ordering can announce the binding from here.
    fn dynamic_allocated(&self, _protocol: &str, _message_type: &MessageType, _opcode: Opcode) {}

    fn capacity_exceeded(&self, _protocol: &str, _message_type: &MessageType, _max_opcode: u32) {}

    fn unknown_opcode(&self, _protocol: &str, _opcode: Opcode) {}

    fn missing_handler(&self, _protocol: &str, _message_type: &MessageType) {}
}

/// Forwards registry events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ProtocolObserver for TracingObserver {
    fn static_reserved(&self, protocol: &str, message_type: &MessageType, opcode: Opcode) {
        debug!(protocol, %message_type, %opcode, "Static opcode reserved");
    }

    fn dynamic_allocated(&self, protocol: &str, message_type: &MessageType, opcode: Opcode) {
        debug!(protocol, %message_type, %opcode, "Dynamic opcode bound");
    }

    fn capacity_exceeded(&self, protocol: &str, message_type: &MessageType, max_opcode: u32) {
        error!(protocol, %message_type, max_opcode, "Opcode space exhausted");
    }

    fn unknown_opcode(&self, protocol: &str, opcode: Opcode) {
        warn!(protocol, %opcode, "Dropping message with unknown opcode");
    }

    fn missing_handler(&self, protocol: &str, message_type: &MessageType) {
        warn!(protocol, %message_type, "Dropping message without handler");
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ProtocolObserver for NullObserver {}
