//! # Core Codec Support
//!
//! Payload serialization used by message codecs.
//!
//! The registry itself is format-agnostic: any [`Codec`](crate::registry::Codec)
//! implementation can be bound to an opcode. This module supplies the serde-backed
//! codec most protocols start with.
//!
//! ## Formats
//! - **Bincode**: default, compact binary
//! - **JSON**: human-readable, for debugging and interop
//! - **MessagePack**: compact, self-describing binary

pub mod serialization;
