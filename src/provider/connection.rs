//! Connection-level provider seams.

use std::sync::Arc;

use super::error::ProviderError;
use super::session::{AckMode, Session};

/// Factory for broker connections.
///
/// Implementations might include:
/// - `InMemoryBroker` - For testing and single-process scenarios (included)
/// - AMQP / MQTT / STOMP client adapters (external)
///
/// The factory's identity (the `Arc` it is held through) is what ambient
/// transactions are keyed by: one resource holder per factory per unit of
/// work.
pub trait ConnectionFactory: Send + Sync {
    /// Open a new connection to the broker.
    fn create_connection(&self) -> Result<Arc<dyn Connection>, ProviderError>;
}

/// An open broker connection.
///
/// Methods take `&self`; implementations use interior mutability so that
/// connections can be shared between a resource holder and the sessions
/// created from them.
pub trait Connection: Send + Sync {
    /// Create a session on this connection.
    ///
    /// A transacted session buffers work until `commit`; `ack_mode` only
    /// matters for non-transacted sessions.
    fn create_session(
        &self,
        transacted: bool,
        ack_mode: AckMode,
    ) -> Result<Arc<dyn Session>, ProviderError>;

    /// Start inbound delivery. Required before any consumer on this
    /// connection can receive a message; producers do not need it.
    fn start(&self) -> Result<(), ProviderError>;

    /// Close the connection and everything created from it.
    fn close(&self) -> Result<(), ProviderError>;
}
