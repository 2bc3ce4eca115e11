//! Per-unit-of-work resource container.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::provider::{Connection, Session};

/// Holds the connection/session pair bound to one unit of work.
///
/// A holder is owned exclusively by the unit of work that created it: it is
/// never shared across concurrent units of work, and within one unit of work
/// every re-entrant operation observes the same holder through the
/// transaction context.
///
/// A holder never carries more than one connection and one session at a time,
/// and once marked rollback-only it never transitions back.
pub struct ResourceHolder {
    connection: Option<Arc<dyn Connection>>,
    session: Option<Arc<dyn Session>>,
    synchronized_with_transaction: bool,
    deadline: Option<Instant>,
    rollback_only: bool,
}

impl Default for ResourceHolder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceHolder {
    /// Create an empty holder.
    pub fn new() -> Self {
        ResourceHolder {
            connection: None,
            session: None,
            synchronized_with_transaction: false,
            deadline: None,
            rollback_only: false,
        }
    }

    /// Create a holder already carrying a connection/session pair.
    pub fn with_resources(connection: Arc<dyn Connection>, session: Arc<dyn Session>) -> Self {
        let mut holder = Self::new();
        holder.bind_connection(connection);
        holder.bind_session(session);
        holder
    }

    /// Bind a connection. The holder must not already carry one.
    pub fn bind_connection(&mut self, connection: Arc<dyn Connection>) {
        debug_assert!(self.connection.is_none(), "holder already has a connection");
        self.connection = Some(connection);
    }

    /// Bind a session. The holder must not already carry one.
    pub fn bind_session(&mut self, session: Arc<dyn Session>) {
        debug_assert!(self.session.is_none(), "holder already has a session");
        self.session = Some(session);
    }

    pub fn connection(&self) -> Option<&Arc<dyn Connection>> {
        self.connection.as_ref()
    }

    pub fn session(&self) -> Option<&Arc<dyn Session>> {
        self.session.as_ref()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Mark the holder as registered with an ambient transaction.
    pub fn mark_synchronized(&mut self) {
        self.synchronized_with_transaction = true;
    }

    pub fn is_synchronized(&self) -> bool {
        self.synchronized_with_transaction
    }

    /// Set an absolute deadline after which operations must not block.
    pub fn set_deadline(&mut self, deadline: Instant) {
        self.deadline = Some(deadline);
    }

    /// Set the deadline relative to now.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.set_deadline(Instant::now() + timeout);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Mark the unit of work as doomed. One-way: there is no clearing it.
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }
}
