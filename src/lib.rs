//! # protocol-registry
//!
//! Opcode registry and message dispatch core for network protocols.
//!
//! A [`Protocol`](protocol::Protocol) names a protocol, records its default port,
//! and maps message types to wire opcodes, codecs and handlers. Message types with
//! a static reservation keep their opcode forever; the rest receive the lowest
//! free opcode on first use, safely under concurrent access.
//!
//! ## Example
//! ```rust
//! use protocol_registry::core::serialization::SerdeCodec;
//! use protocol_registry::protocol::{typed_handler, Protocol};
//! use protocol_registry::registry::{MessageType, Opcode, TypedMessage};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Ping;
//! impl TypedMessage for Ping {
//!     const MESSAGE_TYPE: MessageType = MessageType::from_static("ping");
//! }
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Pong;
//! impl TypedMessage for Pong {
//!     const MESSAGE_TYPE: MessageType = MessageType::from_static("pong");
//! }
//!
//! # fn main() -> protocol_registry::error::Result<()> {
//! let protocol = Protocol::builder("demo", 25565, 4)
//!     .reserve_static(Ping::MESSAGE_TYPE, Opcode::new(0), SerdeCodec::<Ping>::default())
//!     .codec(Pong::MESSAGE_TYPE, SerdeCodec::<Pong>::default())
//!     .handler(Pong::MESSAGE_TYPE, typed_handler(|_: &Pong| Ok(())))
//!     .build()?;
//!
//! assert_eq!(protocol.encode(&Ping)?.opcode, Opcode::new(0));
//! let pong = protocol.encode(&Pong)?;
//! assert_eq!(pong.opcode, Opcode::new(1));
//! protocol.receive(pong.opcode, &pong.payload)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//! - [`registry`]: opcodes, message types, identifier space, allocator, codec table
//! - [`protocol`]: protocol façade, handler registry, observers
//! - [`core`]: serde-backed codecs
//! - [`config`]: TOML configuration
//! - [`utils`]: logging and metrics

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod utils;

pub use error::{ProtocolError, Result};
pub use protocol::{EncodedMessage, Protocol, ProtocolBuilder};
pub use registry::{Codec, Message, MessageType, Opcode, TypedMessage};
