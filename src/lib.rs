//! Transactional messaging template.
//!
//! A session-management layer between application code and a messaging
//! provider: callbacks perform send/receive operations while the layer
//! decides whether to open a brand-new connection/session or to reuse one
//! bound to an ambient transaction, and guarantees that every resource it
//! opens is committed/acknowledged and released correctly on every exit
//! path.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ MessagingTemplate                                           │
//! │  send / receive / receive_selected                          │
//! │  convert_and_send / receive_and_convert / execute           │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ acquire(ctx) / release
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │ ResourceCoordinator: ambient holder, or fresh               │
//! │ connection/session; Local vs External ownership tag         │
//! └──────────┬────────────────────────────────┬─────────────────┘
//!            │ lookup/bind                    │ create
//! ┌──────────▼──────────────┐   ┌─────────────▼─────────────────┐
//! │ TransactionContext      │   │ Provider seams                │
//! │  factory → holder, per  │   │  ConnectionFactory/Connection │
//! │  unit of work           │   │  Session/Producer/Consumer    │
//! └─────────────────────────┘   └───────────────────────────────┘
//! ```
//!
//! The ownership tag is the load-bearing rule: a transacted session is
//! committed by the template only when the template created it. Sessions
//! borrowed from an ambient unit of work are committed and closed by that
//! unit of work alone.

mod converter;
mod destination;
mod error;
mod message;
pub mod memory;
pub mod provider;
mod template;
pub mod transaction;

pub use converter::{
    ConversionError, JsonMessageConverter, MessageConverter, SimpleMessageConverter,
};
pub use destination::{Destination, DestinationResolver, DestinationSpec, NameResolver};
pub use error::MessagingError;
pub use memory::InMemoryBroker;
pub use message::{DeliveryMode, Message, QosSettings};
pub use provider::{
    AckMode, Connection, ConnectionFactory, Consumer, ConsumerOptions, Producer, ProducerOptions,
    ProviderError, ReceiveWait, Session,
};
pub use template::MessagingTemplate;
pub use transaction::{
    AcquiredSession, ContextError, FactoryKey, ResourceCoordinator, ResourceHolder,
    SessionOwnership, TransactionContext, TransactionOutcome,
};
