//! Codec table: bidirectional mapping between message types and `(opcode, codec)`.
//!
//! Known bindings are resolved under a read lock. The write lock is taken only for
//! setup and for the check-allocate-register sequence of a first-use dynamic type,
//! so concurrent first uses of one type agree on a single opcode.

use super::{Codec, DynamicAllocator, IdentifierSpace, MessageType, Opcode};
use crate::error::{constants, ProtocolError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// How a binding came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Static,
    Dynamic,
}

/// A live `(message type <-> opcode)` reservation with its codec.
#[derive(Clone)]
pub struct Binding {
    message_type: MessageType,
    opcode: Opcode,
    origin: Origin,
    codec: Arc<dyn Codec>,
}

impl Binding {
    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_dynamic(&self) -> bool {
        self.origin == Origin::Dynamic
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("message_type", &self.message_type)
            .field("opcode", &self.opcode)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Result of resolving a message type for encoding.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub binding: Binding,
    /// True only for the caller whose lookup minted the opcode.
    pub allocated: bool,
}

#[derive(Default)]
struct Tables {
    by_type: HashMap<MessageType, Binding>,
    by_opcode: HashMap<Opcode, Binding>,
    /// Codecs known to the protocol but not yet given an opcode.
    declared: HashMap<MessageType, Arc<dyn Codec>>,
}

struct Inner {
    space: IdentifierSpace,
    tables: Tables,
}

impl Inner {
    fn is_known(&self, message_type: &MessageType) -> bool {
        self.tables.by_type.contains_key(message_type)
            || self.tables.declared.contains_key(message_type)
    }

    fn insert(&mut self, binding: Binding) -> Result<()> {
        self.space
            .bind(binding.opcode, binding.message_type.clone())?;
        self.tables.declared.remove(&binding.message_type);
        self.tables
            .by_opcode
            .insert(binding.opcode, binding.clone());
        self.tables
            .by_type
            .insert(binding.message_type.clone(), binding);
        Ok(())
    }
}

pub struct CodecTable {
    inner: RwLock<Inner>,
    allocator: DynamicAllocator,
}

impl CodecTable {
    pub fn new(max_opcode: u32, allocator: DynamicAllocator) -> Self {
        Self {
            inner: RwLock::new(Inner {
                space: IdentifierSpace::new(max_opcode),
                tables: Tables::default(),
            }),
            allocator,
        }
    }

    pub fn allocator(&self) -> &DynamicAllocator {
        &self.allocator
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| {
            ProtocolError::Custom(constants::ERR_CODEC_TABLE_READ_LOCK.to_string())
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| {
            ProtocolError::Custom(constants::ERR_CODEC_TABLE_WRITE_LOCK.to_string())
        })
    }

    /// Bind `codec` to an explicit opcode (static reservation).
    pub fn register(
        &self,
        message_type: MessageType,
        codec: Arc<dyn Codec>,
        opcode: Opcode,
    ) -> Result<()> {
        let mut inner = self.write()?;

        if inner.is_known(&message_type) || inner.tables.by_opcode.contains_key(&opcode) {
            return Err(ProtocolError::DuplicateBinding(message_type));
        }

        inner.insert(Binding {
            message_type,
            opcode,
            origin: Origin::Static,
            codec,
        })
    }

    /// Make a codec known without reserving an opcode for it yet.
    pub fn declare(&self, message_type: MessageType, codec: Arc<dyn Codec>) -> Result<()> {
        let mut inner = self.write()?;

        if inner.is_known(&message_type) {
            return Err(ProtocolError::DuplicateBinding(message_type));
        }

        inner.tables.declared.insert(message_type, codec);
        Ok(())
    }

    /// Resolve the binding used to encode `message_type`, allocating on first use.
    pub fn resolve_for_encode(&self, message_type: &MessageType) -> Result<Resolution> {
        if let Some(binding) = self.read()?.tables.by_type.get(message_type) {
            return Ok(Resolution {
                binding: binding.clone(),
                allocated: false,
            });
        }

        let mut inner = self.write()?;

        // Another caller may have won the race between the two locks.
        if let Some(binding) = inner.tables.by_type.get(message_type) {
            return Ok(Resolution {
                binding: binding.clone(),
                allocated: false,
            });
        }

        let codec = inner
            .tables
            .declared
            .get(message_type)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownMessageType(message_type.clone()))?;

        let opcode = self.allocator.allocate_for(&mut inner.space, message_type)?;
        let binding = Binding {
            message_type: message_type.clone(),
            opcode,
            origin: Origin::Dynamic,
            codec,
        };
        inner.insert(binding.clone())?;

        Ok(Resolution {
            binding,
            allocated: true,
        })
    }

    /// Resolve the binding for an inbound opcode. Never mutates the table.
    pub fn resolve_for_decode(&self, opcode: Opcode) -> Result<Binding> {
        self.read()?
            .tables
            .by_opcode
            .get(&opcode)
            .cloned()
            .ok_or(ProtocolError::UnknownOpcode(opcode))
    }

    /// Bind a declared type to an opcode chosen by a peer.
    ///
    /// Re-adopting an identical binding is a no-op.
    pub fn adopt(&self, message_type: &MessageType, opcode: Opcode) -> Result<Binding> {
        let mut inner = self.write()?;

        if let Some(existing) = inner.tables.by_type.get(message_type) {
            if existing.opcode == opcode {
                return Ok(existing.clone());
            }
            return Err(ProtocolError::AlreadyReserved {
                opcode,
                message_type: message_type.clone(),
            });
        }

        if !self.allocator.is_enabled() {
            return Err(ProtocolError::DynamicDisabled(message_type.clone()));
        }

        let codec = inner
            .tables
            .declared
            .get(message_type)
            .cloned()
            .ok_or_else(|| ProtocolError::UnknownMessageType(message_type.clone()))?;

        let binding = Binding {
            message_type: message_type.clone(),
            opcode,
            origin: Origin::Dynamic,
            codec,
        };
        inner.insert(binding.clone())?;
        Ok(binding)
    }

    pub fn opcode_of(&self, message_type: &MessageType) -> Result<Option<Opcode>> {
        Ok(self.read()?.space.opcode_of(message_type))
    }

    pub fn type_of(&self, opcode: Opcode) -> Result<Option<MessageType>> {
        Ok(self.read()?.space.type_of(opcode).cloned())
    }

    /// All live bindings, ordered by opcode.
    pub fn bindings(&self) -> Result<Vec<Binding>> {
        let inner = self.read()?;
        let mut bindings: Vec<Binding> = inner.tables.by_opcode.values().cloned().collect();
        bindings.sort_by_key(Binding::opcode);
        Ok(bindings)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.space.len())
    }

    pub fn remaining(&self) -> Result<u32> {
        Ok(self.read()?.space.remaining())
    }

    pub fn max_opcode(&self) -> Result<u32> {
        Ok(self.read()?.space.max_opcode())
    }
}

impl fmt::Debug for CodecTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecTable")
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}
