use std::error::Error;
use std::fmt;

/// Error type for provider-level operations.
///
/// Everything the underlying messaging provider can fail with (connection,
/// session, producer and consumer creation or use) surfaces as one of these.
/// The template never retries provider errors; they propagate to the caller
/// after guaranteed cleanup of any resource the template created.
#[derive(Debug)]
pub enum ProviderError {
    /// Connecting to the broker failed, or the broker handed back nothing.
    ConnectionFailed(String),
    /// The operation is not legal in the current state (e.g. committing a
    /// non-transacted session, or a no-local consumer on a queue).
    IllegalState(String),
    /// The resource has already been closed.
    Closed(String),
    /// The broker rejected the operation.
    Rejected(String),
    /// Any other provider error.
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            ProviderError::IllegalState(msg) => write!(f, "illegal state: {}", msg),
            ProviderError::Closed(msg) => write!(f, "resource closed: {}", msg),
            ProviderError::Rejected(msg) => write!(f, "rejected by provider: {}", msg),
            ProviderError::Other(e) => write!(f, "provider error: {}", e),
        }
    }
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ProviderError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
