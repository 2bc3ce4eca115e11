//! Conversion between domain values and wire messages.

use std::any::Any;
use std::error::Error;
use std::fmt;

use crate::message::Message;
use crate::provider::Session;

/// Error type for message conversion.
#[derive(Debug)]
pub enum ConversionError {
    /// The converter does not handle this payload type.
    UnsupportedType(String),
    /// Encoding or decoding the payload failed.
    Codec(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnsupportedType(msg) => write!(f, "unsupported payload type: {}", msg),
            ConversionError::Codec(msg) => write!(f, "payload codec error: {}", msg),
        }
    }
}

impl Error for ConversionError {}

/// Converts domain values to messages and back.
///
/// `to_message` gets the open session so converters can resolve
/// provider-specific details while building the message. Payloads cross the
/// trait as `&dyn Any`; a converter that cannot downcast the value fails with
/// [`ConversionError::UnsupportedType`].
pub trait MessageConverter: Send + Sync {
    fn to_message(
        &self,
        value: &dyn Any,
        session: &dyn Session,
    ) -> Result<Message, ConversionError>;

    fn from_message(&self, message: &Message) -> Result<Box<dyn Any>, ConversionError>;
}

/// Converter for the basic payload shapes: `String`, `&str`, `Vec<u8>` and
/// pass-through `Message`.
///
/// Inbound, a UTF-8 body converts to `String`, anything else to `Vec<u8>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleMessageConverter;

impl MessageConverter for SimpleMessageConverter {
    fn to_message(
        &self,
        value: &dyn Any,
        _session: &dyn Session,
    ) -> Result<Message, ConversionError> {
        if let Some(message) = value.downcast_ref::<Message>() {
            return Ok(message.clone());
        }
        if let Some(text) = value.downcast_ref::<String>() {
            return Ok(Message::text(text.clone()));
        }
        if let Some(text) = value.downcast_ref::<&str>() {
            return Ok(Message::text(*text));
        }
        if let Some(bytes) = value.downcast_ref::<Vec<u8>>() {
            return Ok(Message::bytes(bytes.clone()));
        }
        Err(ConversionError::UnsupportedType(
            "expected String, &str, Vec<u8>, or Message".to_string(),
        ))
    }

    fn from_message(&self, message: &Message) -> Result<Box<dyn Any>, ConversionError> {
        match message.body_str() {
            Some(text) => Ok(Box::new(text.to_string())),
            None => Ok(Box::new(message.body.clone())),
        }
    }
}

/// Converter for `serde_json::Value` payloads carried as JSON text bodies.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonMessageConverter;

impl MessageConverter for JsonMessageConverter {
    fn to_message(
        &self,
        value: &dyn Any,
        _session: &dyn Session,
    ) -> Result<Message, ConversionError> {
        let value = value
            .downcast_ref::<serde_json::Value>()
            .ok_or_else(|| {
                ConversionError::UnsupportedType("expected serde_json::Value".to_string())
            })?;
        let body = serde_json::to_string(value)
            .map_err(|e| ConversionError::Codec(e.to_string()))?;
        Ok(Message::text(body).with_property("content-type", "application/json"))
    }

    fn from_message(&self, message: &Message) -> Result<Box<dyn Any>, ConversionError> {
        let value: serde_json::Value = serde_json::from_slice(&message.body)
            .map_err(|e| ConversionError::Codec(e.to_string()))?;
        Ok(Box::new(value))
    }
}
