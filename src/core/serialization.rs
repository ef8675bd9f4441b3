//! # Serialization Formats
//!
//! Serde-backed codecs for message payloads.
//! Supports bincode (default), JSON (debugging/interop), and MessagePack (compact encoding).
//!
//! ## Usage
//! ```rust
//! use protocol_registry::core::serialization::{SerdeCodec, SerializationFormat};
//! use protocol_registry::registry::{Codec, MessageType, TypedMessage};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Chat {
//!     text: String,
//! }
//!
//! impl TypedMessage for Chat {
//!     const MESSAGE_TYPE: MessageType = MessageType::from_static("chat");
//! }
//!
//! let codec = SerdeCodec::<Chat>::new(SerializationFormat::Json);
//! let bytes = codec.encode(&Chat { text: "hi".into() }).unwrap();
//! assert_eq!(bytes, br#"{"text":"hi"}"#);
//! ```

use crate::error::{ProtocolError, Result};
use crate::registry::{downcast_ref, Codec, Message, TypedMessage};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    MessagePack,
}

impl SerializationFormat {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }

    pub fn serialize<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            SerializationFormat::Bincode => bincode::serialize(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::Json => serde_json::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::to_vec(value)
                .map_err(|e| ProtocolError::SerializeError(e.to_string())),
        }
    }

    pub fn deserialize<T: DeserializeOwned>(self, data: &[u8]) -> Result<T> {
        match self {
            SerializationFormat::Bincode => bincode::deserialize(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| ProtocolError::DeserializeError(e.to_string())),
        }
    }
}

/// Codec for any serde-serializable [`TypedMessage`].
pub struct SerdeCodec<T> {
    format: SerializationFormat,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    pub fn new(format: SerializationFormat) -> Self {
        Self {
            format,
            _marker: PhantomData,
        }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }
}

impl<T> Default for SerdeCodec<T> {
    fn default() -> Self {
        Self::new(SerializationFormat::default())
    }
}

impl<T> fmt::Debug for SerdeCodec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeCodec")
            .field("format", &self.format)
            .finish()
    }
}

impl<T> Codec for SerdeCodec<T>
where
    T: TypedMessage + Serialize + DeserializeOwned,
{
    fn encode(&self, message: &dyn Message) -> Result<Vec<u8>> {
        let typed = downcast_ref::<T>(message).ok_or_else(|| {
            ProtocolError::MessageTypeMismatch {
                expected: T::MESSAGE_TYPE,
                actual: message.message_type(),
            }
        })?;
        self.format.serialize(typed)
    }

    fn decode(&self, payload: &[u8]) -> Result<Box<dyn Message>> {
        let value: T = self.format.deserialize(payload)?;
        Ok(Box::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MessageType;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Echo {
        text: String,
    }

    impl TypedMessage for Echo {
        const MESSAGE_TYPE: MessageType = MessageType::from_static("echo");
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Other;

    impl TypedMessage for Other {
        const MESSAGE_TYPE: MessageType = MessageType::from_static("other");
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SerializationFormat::Bincode.name(), "Bincode");
        assert_eq!(SerializationFormat::Json.name(), "JSON");
        assert_eq!(SerializationFormat::MessagePack.name(), "MessagePack");
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_codec_in_every_format() {
        let msg = Echo {
            text: "hello".to_string(),
        };

        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let codec = SerdeCodec::<Echo>::new(format);
            let bytes = codec.encode(&msg).expect("encode");
            let decoded = codec.decode(&bytes).expect("decode");
            assert_eq!(downcast_ref::<Echo>(decoded.as_ref()), Some(&msg));
        }
    }

    #[test]
    fn test_encode_rejects_foreign_message() {
        let codec = SerdeCodec::<Echo>::default();
        assert_eq!(
            codec.encode(&Other),
            Err(ProtocolError::MessageTypeMismatch {
                expected: Echo::MESSAGE_TYPE,
                actual: Other::MESSAGE_TYPE,
            })
        );
    }

    #[test]
    fn test_decode_garbage_is_error() {
        let codec = SerdeCodec::<Echo>::new(SerializationFormat::Json);
        assert!(matches!(
            codec.decode(b"{not json"),
            Err(ProtocolError::DeserializeError(_))
        ));
        assert!(matches!(
            codec.decode(&[]),
            Err(ProtocolError::DeserializeError(_))
        ));
    }
}
