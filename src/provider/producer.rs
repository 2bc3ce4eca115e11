//! Producer-level provider seam.

use crate::message::{Message, QosSettings};

use super::error::ProviderError;

/// Creation-time producer settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProducerOptions {
    /// Don't generate a message id on send (saves broker work when ids are
    /// unused).
    pub suppress_message_id: bool,
    /// Don't stamp a send timestamp.
    pub suppress_timestamp: bool,
}

/// A producer bound to a single destination.
pub trait Producer: Send {
    /// Send a message with the provider's default quality of service.
    fn send(&self, message: &Message) -> Result<(), ProviderError>;

    /// Send a message with explicit quality-of-service parameters.
    fn send_with(&self, message: &Message, qos: &QosSettings) -> Result<(), ProviderError>;

    /// Close the producer.
    fn close(&self) -> Result<(), ProviderError>;
}
