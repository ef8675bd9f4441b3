use crate::error::{ProtocolError, Result};
use crate::registry::{downcast_ref, Message, MessageType, TypedMessage};
use std::collections::HashMap;
use std::fmt;

/// Processing logic for decoded messages of one type.
pub trait Handler: Send + Sync {
    fn handle(&self, message: &dyn Message) -> Result<()>;
}

impl<F> Handler for F
where
    F: Fn(&dyn Message) -> Result<()> + Send + Sync,
{
    fn handle(&self, message: &dyn Message) -> Result<()> {
        self(message)
    }
}

/// Adapt a closure over a concrete message type into a [`Handler`].
pub fn typed_handler<T, F>(handler: F) -> impl Handler
where
    T: TypedMessage,
    F: Fn(&T) -> Result<()> + Send + Sync + 'static,
{
    move |message: &dyn Message| match downcast_ref::<T>(message) {
        Some(typed) => handler(typed),
        None => Err(ProtocolError::MessageTypeMismatch {
            expected: T::MESSAGE_TYPE,
            actual: message.message_type(),
        }),
    }
}

/// Message type to handler routing.
///
/// Populated during protocol setup and read-only afterwards, so lookups take no lock.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<MessageType, Box<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, message_type: MessageType, handler: H) -> Result<()>
    where
        H: Handler + 'static,
    {
        self.register_boxed(message_type, Box::new(handler))
    }

    pub fn register_boxed(&mut self, message_type: MessageType, handler: Box<dyn Handler>) -> Result<()> {
        if self.handlers.contains_key(&message_type) {
            return Err(ProtocolError::DuplicateHandler(message_type));
        }

        self.handlers.insert(message_type, handler);
        Ok(())
    }

    pub fn handler_for(&self, message_type: &MessageType) -> Result<&dyn Handler> {
        self.handlers
            .get(message_type)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| ProtocolError::NoHandler(message_type.clone()))
    }

    pub fn contains(&self, message_type: &MessageType) -> bool {
        self.handlers.contains_key(message_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `message`. Handler errors are returned untouched.
    pub fn dispatch(&self, message: &dyn Message) -> Result<()> {
        self.handler_for(&message.message_type())?.handle(message)
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.handlers.keys().map(MessageType::as_str).collect();
        types.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("message_types", &types)
            .finish()
    }
}
