//! Swallow-and-log close helpers.
//!
//! Cleanup runs after the primary operation has already produced its result
//! or error. A close failure at that point must never replace what the caller
//! already has a right to, so these helpers log at `warn` and return nothing.

use tracing::warn;

use super::connection::Connection;
use super::consumer::Consumer;
use super::producer::Producer;
use super::session::Session;

/// Close a producer, logging instead of propagating a failure.
pub fn close_producer(producer: &dyn Producer) {
    if let Err(err) = producer.close() {
        warn!(error = %err, "failed to close message producer");
    }
}

/// Close a consumer, logging instead of propagating a failure.
pub fn close_consumer(consumer: &dyn Consumer) {
    if let Err(err) = consumer.close() {
        warn!(error = %err, "failed to close message consumer");
    }
}

/// Close a session, logging instead of propagating a failure.
pub fn close_session(session: &dyn Session) {
    if let Err(err) = session.close() {
        warn!(error = %err, "failed to close session");
    }
}

/// Close a connection, logging instead of propagating a failure.
pub fn close_connection(connection: &dyn Connection) {
    if let Err(err) = connection.close() {
        warn!(error = %err, "failed to close connection");
    }
}
