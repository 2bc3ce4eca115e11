//! Provider trait seams.
//!
//! This layer implements no wire protocol and no broker behavior: it
//! consumes these interfaces. Any messaging provider can be plugged in by
//! implementing the five traits here; [`crate::memory::InMemoryBroker`] is
//! the included reference implementation.
//!
//! ```text
//! ConnectionFactory ──create──▶ Connection ──create──▶ Session
//!                                                       │
//!                                 ┌─────────────────────┴──────┐
//!                                 ▼                            ▼
//!                              Producer                     Consumer
//!                            send / send_with            receive(wait)
//! ```

pub mod cleanup;
mod connection;
mod consumer;
mod error;
mod producer;
mod session;

pub use connection::{Connection, ConnectionFactory};
pub use consumer::{Consumer, ConsumerOptions, ReceiveWait};
pub use error::ProviderError;
pub use producer::{Producer, ProducerOptions};
pub use session::{AckMode, Session};
