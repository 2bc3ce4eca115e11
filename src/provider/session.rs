//! Session-level provider seam.

use crate::destination::Destination;
use crate::message::Message;

use super::consumer::{Consumer, ConsumerOptions};
use super::error::ProviderError;
use super::producer::{Producer, ProducerOptions};

/// How received messages are acknowledged on a non-transacted session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AckMode {
    /// The provider acknowledges automatically on delivery.
    Auto,
    /// The application must call [`Session::acknowledge`] explicitly.
    Client,
    /// Lazy automatic acknowledgement; duplicates are possible.
    DupsOk,
}

impl AckMode {
    /// Whether this mode requires an explicit acknowledge call.
    pub fn is_manual(self) -> bool {
        matches!(self, AckMode::Client)
    }
}

/// An open provider session: the unit of transactional work and the factory
/// for producers and consumers.
///
/// A session and the connection it came from are owned by exactly one unit of
/// work and must not be shared across concurrent units of work.
pub trait Session: Send + Sync {
    /// Create a producer for a destination.
    fn create_producer(
        &self,
        destination: &Destination,
        options: ProducerOptions,
    ) -> Result<Box<dyn Producer>, ProviderError>;

    /// Create a consumer for a destination.
    ///
    /// `options.no_local` is only legal for topic consumers; providers reject
    /// it on a queue with [`ProviderError::IllegalState`].
    fn create_consumer(
        &self,
        destination: &Destination,
        options: ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, ProviderError>;

    /// Whether this session is transacted.
    fn transacted(&self) -> bool;

    /// The acknowledgement mode this session was created with.
    fn ack_mode(&self) -> AckMode;

    /// Commit all work performed in the current transaction.
    ///
    /// Calling this on a non-transacted session is an
    /// [`ProviderError::IllegalState`].
    fn commit(&self) -> Result<(), ProviderError>;

    /// Discard all work performed in the current transaction.
    fn rollback(&self) -> Result<(), ProviderError>;

    /// Explicitly acknowledge a received message.
    ///
    /// Only meaningful in [`AckMode::Client`]; calling it on a transacted
    /// session is an [`ProviderError::IllegalState`].
    fn acknowledge(&self, message: &Message) -> Result<(), ProviderError>;

    /// Close the session.
    fn close(&self) -> Result<(), ProviderError>;
}
