//! # Protocol
//!
//! A named protocol with a default port, its codec table, and its handler registry.
//!
//! ## Outbound Flow
//! ```text
//! message -> resolve opcode (allocate on first use) -> wrap (dynamic only) -> encode
//! ```
//!
//! ## Inbound Flow
//! ```text
//! (opcode, bytes) -> resolve codec -> decode -> handler lookup -> handler
//! ```
//!
//! A `Protocol` is built once and then shared (typically behind an `Arc`) by every
//! connection task. Unknown opcodes and missing handlers are per-message errors:
//! they are reported to the observer and returned to the caller, never fatal.

pub mod dispatcher;
pub mod observer;


pub use dispatcher::{typed_handler, Handler, HandlerRegistry};
pub use observer::{NullObserver, ProtocolObserver, TracingObserver};

use crate::config::ProtocolConfig;
use crate::error::{ProtocolError, Result};
use crate::registry::{
    Binding, Codec, CodecTable, DynamicAllocator, DynamicPolicy, Message, MessageType, Opcode,
};
use crate::utils::metrics::RegistryMetrics;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

type WrapFn =
    dyn Fn(&Binding, &dyn Message) -> Result<Option<Box<dyn Message>>> + Send + Sync + 'static;

/// Transformation applied to outgoing messages whose opcode was assigned dynamically.
///
/// Returning `Ok(None)` sends the message unchanged. Returning a replacement
/// message sends the replacement instead, encoded with the replacement's own
/// binding (usually a static envelope type that carries the dynamic opcode).
#[derive(Clone, Default)]
pub struct WrapStrategy(Option<Arc<WrapFn>>);

impl WrapStrategy {
    pub fn identity() -> Self {
        Self(None)
    }

    pub fn new<F>(wrap: F) -> Self
    where
        F: Fn(&Binding, &dyn Message) -> Result<Option<Box<dyn Message>>> + Send + Sync + 'static,
    {
        Self(Some(Arc::new(wrap)))
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_none()
    }

    pub fn apply(&self, binding: &Binding, message: &dyn Message) -> Result<Option<Box<dyn Message>>> {
        match &self.0 {
            Some(wrap) => wrap(binding, message),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for WrapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_identity() {
            "WrapStrategy::Identity"
        } else {
            "WrapStrategy::Custom"
        })
    }
}

/// An outgoing message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    pub opcode: Opcode,
    pub message_type: MessageType,
    pub payload: Bytes,
}

pub struct Protocol {
    name: String,
    default_port: u16,
    max_opcode: u32,
    codecs: CodecTable,
    handlers: HandlerRegistry,
    wrap: WrapStrategy,
    observer: Arc<dyn ProtocolObserver>,
    metrics: RegistryMetrics,
}

impl Protocol {
    /// Protocol with dynamic allocation enabled, identity wrapping and a
    /// `tracing` observer.
    pub fn new(name: impl Into<String>, default_port: u16, max_opcode: u32) -> Self {
        Self::with_parts(
            name.into(),
            default_port,
            max_opcode,
            DynamicPolicy::Enabled,
            WrapStrategy::identity(),
            Arc::new(TracingObserver),
        )
    }

    pub fn builder(name: impl Into<String>, default_port: u16, max_opcode: u32) -> ProtocolBuilder {
        ProtocolBuilder::new(name, default_port, max_opcode)
    }

    fn with_parts(
        name: String,
        default_port: u16,
        max_opcode: u32,
        policy: DynamicPolicy,
        wrap: WrapStrategy,
        observer: Arc<dyn ProtocolObserver>,
    ) -> Self {
        Self {
            name,
            default_port,
            max_opcode,
            codecs: CodecTable::new(max_opcode, DynamicAllocator::new(policy)),
            handlers: HandlerRegistry::new(),
            wrap,
            observer,
            metrics: RegistryMetrics::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Port used when autogenerating bindings and by clients when no port is given.
    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn max_opcode(&self) -> u32 {
        self.max_opcode
    }

    pub fn dynamic_policy(&self) -> DynamicPolicy {
        self.codecs.allocator().policy()
    }

    pub fn wrap_strategy(&self) -> &WrapStrategy {
        &self.wrap
    }

    pub fn codecs(&self) -> &CodecTable {
        &self.codecs
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    /// Permanently bind `message_type` to `opcode`. Setup only.
    pub fn reserve_static(
        &self,
        message_type: MessageType,
        opcode: Opcode,
        codec: Arc<dyn Codec>,
    ) -> Result<()> {
        self.codecs.register(message_type.clone(), codec, opcode)?;
        self.observer
            .static_reserved(&self.name, &message_type, opcode);
        Ok(())
    }

    /// Make a codec known; its opcode is assigned on first use.
    pub fn declare(&self, message_type: MessageType, codec: Arc<dyn Codec>) -> Result<()> {
        self.codecs.declare(message_type, codec)
    }

    pub fn register_handler<H>(&mut self, message_type: MessageType, handler: H) -> Result<()>
    where
        H: Handler + 'static,
    {
        self.handlers.register(message_type, handler)
    }

    pub fn handler_for(&self, message_type: &MessageType) -> Result<&dyn Handler> {
        self.handlers.handler_for(message_type)
    }

    /// Binding used to send `message_type`, minting a dynamic opcode on first use.
    pub fn resolve_for_encode(&self, message_type: &MessageType) -> Result<Binding> {
        match self.codecs.resolve_for_encode(message_type) {
            Ok(resolution) => {
                if resolution.allocated {
                    self.metrics.dynamic_allocation();
                    self.observer.dynamic_allocated(
                        &self.name,
                        message_type,
                        resolution.binding.opcode(),
                    );
                }
                Ok(resolution.binding)
            }
            Err(ProtocolError::CapacityExceeded { max }) => {
                self.metrics.capacity_exceeded();
                self.observer
                    .capacity_exceeded(&self.name, message_type, max);
                Err(ProtocolError::CapacityExceeded { max })
            }
            Err(e) => Err(e),
        }
    }

    /// Binding for an inbound opcode.
    pub fn resolve_for_decode(&self, opcode: Opcode) -> Result<Binding> {
        self.codecs.resolve_for_decode(opcode).inspect_err(|e| {
            if matches!(e, ProtocolError::UnknownOpcode(_)) {
                self.metrics.unknown_opcode();
                self.observer.unknown_opcode(&self.name, opcode);
            }
        })
    }

    /// Opcode of `message_type`, assigning one if this is its first use.
    pub fn opcode_for(&self, message_type: &MessageType) -> Result<Opcode> {
        self.resolve_for_encode(message_type)
            .map(|binding| binding.opcode())
    }

    /// Accept a dynamic binding announced by a peer.
    pub fn adopt(&self, message_type: &MessageType, opcode: Opcode) -> Result<()> {
        self.codecs.adopt(message_type, opcode)?;
        debug!(protocol = %self.name, %message_type, %opcode, "Adopted peer opcode binding");
        Ok(())
    }

    /// Dynamic bindings ordered by opcode, suitable for announcing to a peer.
    pub fn dynamic_bindings(&self) -> Result<Vec<(MessageType, Opcode)>> {
        Ok(self
            .codecs
            .bindings()?
            .into_iter()
            .filter(Binding::is_dynamic)
            .map(|binding| (binding.message_type().clone(), binding.opcode()))
            .collect())
    }

    /// Resolve, wrap and encode an outgoing message.
    #[instrument(level = "trace", skip_all, fields(protocol = %self.name))]
    pub fn encode(&self, message: &dyn Message) -> Result<EncodedMessage> {
        let message_type = message.message_type();
        let binding = self.resolve_for_encode(&message_type)?;

        let (binding, payload) = if binding.is_dynamic() {
            match self.wrap.apply(&binding, message)? {
                Some(wrapped) => {
                    let wrapped_type = wrapped.message_type();
                    let target = if wrapped_type == message_type {
                        binding
                    } else {
                        self.resolve_for_encode(&wrapped_type)?
                    };
                    let payload = target.codec().encode(wrapped.as_ref())?;
                    (target, payload)
                }
                None => {
                    let payload = binding.codec().encode(message)?;
                    (binding, payload)
                }
            }
        } else {
            let payload = binding.codec().encode(message)?;
            (binding, payload)
        };

        self.metrics.message_encoded(payload.len() as u64);
        trace!(opcode = %binding.opcode(), message_type = %binding.message_type(), size = payload.len(), "Encoded message");

        Ok(EncodedMessage {
            opcode: binding.opcode(),
            message_type: binding.message_type().clone(),
            payload: Bytes::from(payload),
        })
    }

    /// Decode an inbound payload. Unknown opcodes leave every table untouched.
    pub fn decode(&self, opcode: Opcode, payload: &[u8]) -> Result<Box<dyn Message>> {
        let binding = self.resolve_for_decode(opcode)?;

        let message = binding.codec().decode(payload).inspect_err(|e| {
            warn!(protocol = %self.name, %opcode, error = %e, "Failed to decode message");
        })?;

        let decoded_type = message.message_type();
        if &decoded_type != binding.message_type() {
            return Err(ProtocolError::MessageTypeMismatch {
                expected: binding.message_type().clone(),
                actual: decoded_type,
            });
        }

        self.metrics.message_decoded(payload.len() as u64);
        Ok(message)
    }

    /// Hand a decoded message to its handler. Handler errors are returned unchanged.
    pub fn dispatch(&self, message: &dyn Message) -> Result<()> {
        match self.handlers.dispatch(message) {
            Ok(()) => {
                self.metrics.message_dispatched();
                Ok(())
            }
            Err(ProtocolError::NoHandler(message_type)) => {
                self.metrics.missing_handler();
                self.observer.missing_handler(&self.name, &message_type);
                Err(ProtocolError::NoHandler(message_type))
            }
            Err(e) => {
                self.metrics.handler_failure();
                Err(e)
            }
        }
    }

    /// Decode and dispatch one inbound message.
    pub fn receive(&self, opcode: Opcode, payload: &[u8]) -> Result<()> {
        let message = self.decode(opcode, payload)?;
        self.dispatch(message.as_ref())
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Protocol")
            .field("name", &self.name)
            .field("default_port", &self.default_port)
            .field("max_opcode", &self.max_opcode)
            .field("codecs", &self.codecs)
            .field("handlers", &self.handlers)
            .field("wrap", &self.wrap)
            .finish_non_exhaustive()
    }
}

/// Collects a protocol definition and validates it as a whole in [`build`](Self::build).
pub struct ProtocolBuilder {
    name: String,
    default_port: u16,
    max_opcode: u32,
    policy: DynamicPolicy,
    wrap: WrapStrategy,
    observer: Arc<dyn ProtocolObserver>,
    reservations: Vec<(MessageType, Opcode)>,
    statics: Vec<(MessageType, Opcode, Arc<dyn Codec>)>,
    codecs: Vec<(MessageType, Arc<dyn Codec>)>,
    handlers: Vec<(MessageType, Box<dyn Handler>)>,
}

impl ProtocolBuilder {
    pub fn new(name: impl Into<String>, default_port: u16, max_opcode: u32) -> Self {
        Self {
            name: name.into(),
            default_port,
            max_opcode,
            policy: DynamicPolicy::Enabled,
            wrap: WrapStrategy::identity(),
            observer: Arc::new(TracingObserver),
            reservations: Vec::new(),
            statics: Vec::new(),
            codecs: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Start from a configuration file's identity, opcode space and reservation list.
    ///
    /// Codecs passed to [`codec`](Self::codec) for a configured message type are
    /// bound statically to the configured opcode.
    pub fn from_config(config: &ProtocolConfig) -> Self {
        let mut builder = Self::new(config.name.clone(), config.default_port, config.max_opcode)
            .dynamic_policy(config.dynamic_allocation);
        builder.reservations = config
            .reservations
            .iter()
            .map(|reservation| (reservation.message_type(), reservation.opcode()))
            .collect();
        builder
    }

    pub fn dynamic_policy(mut self, policy: DynamicPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn wrap_outgoing(mut self, wrap: WrapStrategy) -> Self {
        self.wrap = wrap;
        self
    }

    pub fn observer<O>(mut self, observer: O) -> Self
    where
        O: ProtocolObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    pub fn shared_observer(mut self, observer: Arc<dyn ProtocolObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn reserve_static<C>(mut self, message_type: MessageType, opcode: Opcode, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        self.statics.push((message_type, opcode, Arc::new(codec)));
        self
    }

    /// Register a codec whose opcode comes from configuration or first use.
    pub fn codec<C>(mut self, message_type: MessageType, codec: C) -> Self
    where
        C: Codec + 'static,
    {
        self.codecs.push((message_type, Arc::new(codec)));
        self
    }

    pub fn handler<H>(mut self, message_type: MessageType, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handlers.push((message_type, Box::new(handler)));
        self
    }

    /// Install every reservation, codec and handler, failing on the first conflict.
    pub fn build(self) -> Result<Protocol> {
        let mut protocol = Protocol::with_parts(
            self.name,
            self.default_port,
            self.max_opcode,
            self.policy,
            self.wrap,
            self.observer,
        );

        for (message_type, opcode, codec) in self.statics {
            protocol.reserve_static(message_type, opcode, codec)?;
        }

        let mut codecs = self.codecs;
        for (message_type, opcode) in self.reservations {
            let Some(index) = codecs.iter().position(|(ty, _)| *ty == message_type) else {
                if protocol.codecs.opcode_of(&message_type)?.is_some() {
                    return Err(ProtocolError::DuplicateBinding(message_type));
                }
                return Err(ProtocolError::ConfigError(format!(
                    "Reservation for '{message_type}' has no codec"
                )));
            };
            let (message_type, codec) = codecs.remove(index);
            protocol.reserve_static(message_type, opcode, codec)?;
        }

        for (message_type, codec) in codecs {
            protocol.declare(message_type, codec)?;
        }

        for (message_type, handler) in self.handlers {
            protocol.handlers.register_boxed(message_type, handler)?;
        }

        debug!(
            protocol = %protocol.name,
            default_port = protocol.default_port,
            max_opcode = protocol.max_opcode,
            bindings = protocol.codecs.len()?,
            handlers = protocol.handlers.len(),
            "Protocol initialized"
        );

        Ok(protocol)
    }
}

impl fmt::Debug for ProtocolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolBuilder")
            .field("name", &self.name)
            .field("default_port", &self.default_port)
            .field("max_opcode", &self.max_opcode)
            .field("policy", &self.policy)
            .field("reservations", &self.reservations)
            .finish_non_exhaustive()
    }
}
