//! Identifier space: the set of opcodes `[0, max_opcode)` and who holds them.
//!
//! Opcodes are never released; the space only grows.

use super::{MessageType, Opcode};
use crate::error::{ProtocolError, Result};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug)]
pub struct IdentifierSpace {
    max_opcode: u32,
    by_opcode: BTreeMap<Opcode, MessageType>,
    by_type: HashMap<MessageType, Opcode>,
    /// Every opcode below this one is taken.
    cursor: u32,
}

impl IdentifierSpace {
    /// `max_opcode` is one more than the largest usable opcode.
    pub fn new(max_opcode: u32) -> Self {
        Self {
            max_opcode,
            by_opcode: BTreeMap::new(),
            by_type: HashMap::new(),
            cursor: 0,
        }
    }

    pub fn max_opcode(&self) -> u32 {
        self.max_opcode
    }

    pub fn len(&self) -> usize {
        self.by_opcode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_opcode.is_empty()
    }

    pub fn remaining(&self) -> u32 {
        self.max_opcode.saturating_sub(self.by_opcode.len() as u32)
    }

    pub fn opcode_of(&self, message_type: &MessageType) -> Option<Opcode> {
        self.by_type.get(message_type).copied()
    }

    pub fn type_of(&self, opcode: Opcode) -> Option<&MessageType> {
        self.by_opcode.get(&opcode)
    }

    /// Lowest opcode not yet bound.
    ///
    /// Does not take the opcode; the caller binds it with [`bind`](Self::bind)
    /// while still holding exclusive access to the space.
    pub fn allocate(&mut self) -> Result<Opcode> {
        while self.cursor < self.max_opcode && self.by_opcode.contains_key(&Opcode::new(self.cursor)) {
            self.cursor += 1;
        }

        if self.cursor >= self.max_opcode {
            return Err(ProtocolError::CapacityExceeded {
                max: self.max_opcode,
            });
        }

        Ok(Opcode::new(self.cursor))
    }

    /// Permanently reserve `opcode` for `message_type`.
    pub fn reserve_static(&mut self, opcode: Opcode, message_type: MessageType) -> Result<()> {
        self.bind(opcode, message_type)
    }

    /// Record a binding. Fails if either side is already bound.
    pub fn bind(&mut self, opcode: Opcode, message_type: MessageType) -> Result<()> {
        if opcode.get() >= self.max_opcode {
            return Err(ProtocolError::OpcodeOutOfRange {
                opcode,
                max: self.max_opcode,
            });
        }

        if self.by_opcode.contains_key(&opcode) || self.by_type.contains_key(&message_type) {
            return Err(ProtocolError::AlreadyReserved {
                opcode,
                message_type,
            });
        }

        self.by_opcode.insert(opcode, message_type.clone());
        self.by_type.insert(message_type, opcode);
        Ok(())
    }
}
