//! # Opcode Registry
//!
//! Wire identifiers, message type tags, and the tables binding them to codecs.
//!
//! ## Components
//! - **Identifier Space**: which opcodes in `[0, max_opcode)` are taken
//! - **Dynamic Allocator**: deterministic first-use opcode assignment
//! - **Codec Table**: `MessageType <-> (Opcode, Codec)` bindings
//!
//! ## Allocation Order
//! Dynamic opcodes are always the lowest free opcode at the time of first use.
//! Two protocols with the same static reservations that see the same sequence of
//! first uses end up with identical bindings, without a negotiation round trip.

pub mod allocator;
pub mod codec_table;
pub mod space;

pub use allocator::{DynamicAllocator, DynamicPolicy};
pub use codec_table::{Binding, CodecTable, Origin, Resolution};
pub use space::IdentifierSpace;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;

/// Numeric wire identifier of a message type within one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Opcode(u32);

impl Opcode {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Opcode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tag naming a logical message kind.
///
/// Uses `Cow<'static, str>` so tags declared in code never allocate, while tags
/// read from configuration can still be owned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageType(Cow<'static, str>);

impl MessageType {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for MessageType {
    fn from(name: &'static str) -> Self {
        Self::from_static(name)
    }
}

/// A message instance travelling through the protocol.
pub trait Message: Any + fmt::Debug + Send + Sync {
    fn message_type(&self) -> MessageType;

    fn as_any(&self) -> &dyn Any;
}

/// Messages whose type tag is known at compile time.
///
/// Every `TypedMessage` is a [`Message`].
pub trait TypedMessage: fmt::Debug + Send + Sync + 'static {
    const MESSAGE_TYPE: MessageType;
}

impl<T: TypedMessage> Message for T {
    fn message_type(&self) -> MessageType {
        T::MESSAGE_TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Borrow a concrete message out of a trait object.
pub fn downcast_ref<T: Message>(message: &dyn Message) -> Option<&T> {
    message.as_any().downcast_ref::<T>()
}

/// Stateless encode/decode pair for one message type.
pub trait Codec: Send + Sync {
    fn encode(&self, message: &dyn Message) -> Result<Vec<u8>>;

    fn decode(&self, payload: &[u8]) -> Result<Box<dyn Message>>;
}
