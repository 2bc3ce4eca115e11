use std::error::Error;
use std::fmt;

use crate::converter::ConversionError;
use crate::provider::ProviderError;
use crate::transaction::ContextError;

/// Top-level error type for template operations.
///
/// Three classes, handled differently:
/// - `Configuration` fails fast, before any provider call is made.
/// - `Provider` propagates after guaranteed cleanup; never retried here.
/// - `Conversion` propagates unchanged from the converter.
///
/// Cleanup failures (a close failing after the operation already produced its
/// result) are not represented here; they are logged and swallowed.
#[derive(Debug)]
pub enum MessagingError {
    /// The template is not configured for the requested operation, or the
    /// transaction context was misused.
    Configuration(String),
    /// The messaging provider failed.
    Provider(ProviderError),
    /// The configured converter could not handle the payload.
    Conversion(ConversionError),
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            MessagingError::Provider(e) => write!(f, "provider error: {}", e),
            MessagingError::Conversion(e) => write!(f, "conversion error: {}", e),
        }
    }
}

impl Error for MessagingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MessagingError::Configuration(_) => None,
            MessagingError::Provider(e) => Some(e),
            MessagingError::Conversion(e) => Some(e),
        }
    }
}

impl From<ProviderError> for MessagingError {
    fn from(err: ProviderError) -> Self {
        MessagingError::Provider(err)
    }
}

impl From<ConversionError> for MessagingError {
    fn from(err: ConversionError) -> Self {
        MessagingError::Conversion(err)
    }
}

impl From<ContextError> for MessagingError {
    fn from(err: ContextError) -> Self {
        MessagingError::Configuration(err.to_string())
    }
}
