//! Dynamic opcode allocation for message types without a static reservation.

use super::{IdentifierSpace, MessageType, Opcode};
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Whether a protocol accepts message types that were not reserved up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DynamicPolicy {
    #[default]
    Enabled,
    /// Opcode-closed protocol: only static reservations are valid.
    Disabled,
}

/// Picks opcodes for first-use message types.
///
/// Allocation is ascending from the lowest free opcode. The allocator never
/// records the binding itself; the codec table does that under the same lock
/// that guarded the allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicAllocator {
    policy: DynamicPolicy,
}

impl DynamicAllocator {
    pub fn new(policy: DynamicPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DynamicPolicy {
        self.policy
    }

    pub fn is_enabled(&self) -> bool {
        self.policy == DynamicPolicy::Enabled
    }

    pub fn allocate_for(
        &self,
        space: &mut IdentifierSpace,
        message_type: &MessageType,
    ) -> Result<Opcode> {
        if !self.is_enabled() {
            return Err(ProtocolError::DynamicDisabled(message_type.clone()));
        }

        let opcode = space.allocate()?;
        debug!(%message_type, %opcode, remaining = space.remaining() - 1, "Allocated dynamic opcode");
        Ok(opcode)
    }
}
