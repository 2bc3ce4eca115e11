//! Session acquisition and the commit/release policy.
//!
//! The coordinator decides, per operation, whether to bind to the resource
//! holder of an ambient transaction or to fabricate a new connection/session
//! pair, and tags the result with who owns it. That tag is the single most
//! important correctness rule in this layer: committing an externally owned
//! transacted session would corrupt the enclosing unit of work, so ownership
//! is carried explicitly and never inferred after the fact.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::MessagingError;
use crate::provider::cleanup;
use crate::provider::{AckMode, Connection, ConnectionFactory, ReceiveWait, Session};

use super::context::{FactoryKey, TransactionContext};
use super::holder::ResourceHolder;

/// Who owns an acquired session, and therefore who commits and closes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOwnership {
    /// Created by this call; this call commits (if transacted) and closes it.
    Local,
    /// Borrowed from an ambient unit of work; that unit of work commits and
    /// closes it. Never commit or close an external session here.
    External,
}

/// A session handed out by the coordinator, tagged with its ownership.
///
/// Scoped acquisition: dropping the value closes exactly the locally-owned
/// connection and session, on every exit path including panics. Externally
/// owned resources are left untouched.
pub struct AcquiredSession {
    session: Arc<dyn Session>,
    connection: Option<Arc<dyn Connection>>,
    ownership: SessionOwnership,
    deadline: Option<Instant>,
}

impl AcquiredSession {
    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn ownership(&self) -> SessionOwnership {
        self.ownership
    }

    pub fn is_locally_owned(&self) -> bool {
        self.ownership == SessionOwnership::Local
    }

    /// Deadline of the ambient unit of work this session was borrowed from.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Remaining bounded wait implied by the ambient deadline; see
    /// [`ReceiveWait::until`] for the rounding policy.
    pub fn remaining_wait(&self) -> Option<ReceiveWait> {
        self.deadline.map(ReceiveWait::until)
    }
}

impl Drop for AcquiredSession {
    fn drop(&mut self) {
        if self.ownership == SessionOwnership::Local {
            cleanup::close_session(self.session.as_ref());
            if let Some(connection) = &self.connection {
                cleanup::close_connection(connection.as_ref());
            }
        }
    }
}

/// How a unit of work ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionOutcome {
    Commit,
    Rollback,
}

/// Decides between joining an ambient transaction and creating fresh
/// resources, and owns the commit/acknowledge/release policy.
pub struct ResourceCoordinator {
    factory: Arc<dyn ConnectionFactory>,
    transacted: bool,
    ack_mode: AckMode,
}

impl ResourceCoordinator {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        ResourceCoordinator {
            factory,
            transacted: false,
            ack_mode: AckMode::Auto,
        }
    }

    /// Whether sessions created by this coordinator are transacted.
    pub fn with_transacted(mut self, transacted: bool) -> Self {
        self.transacted = transacted;
        self
    }

    /// Acknowledgement mode for non-transacted sessions.
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.ack_mode = ack_mode;
        self
    }

    pub fn transacted(&self) -> bool {
        self.transacted
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }

    pub fn factory(&self) -> &Arc<dyn ConnectionFactory> {
        &self.factory
    }

    pub fn factory_key(&self) -> FactoryKey {
        FactoryKey::of(&self.factory)
    }

    /// Obtain a session for one operation.
    ///
    /// An ambient holder already carrying a session wins; the result is then
    /// externally owned and the caller must neither commit nor close it.
    /// Otherwise a fresh connection/session pair is created and locally
    /// owned. `start_connection` starts a newly created connection (required
    /// before receives can deliver; producers don't need it); any failure
    /// after the connection exists releases the partially-created resources
    /// before propagating.
    pub fn acquire(
        &self,
        ctx: &TransactionContext,
        start_connection: bool,
    ) -> Result<AcquiredSession, MessagingError> {
        if let Some(holder) = ctx.lookup(self.factory_key()) {
            let holder = holder.lock().unwrap();
            if let Some(session) = holder.session() {
                debug!("joining ambient transactional session");
                return Ok(AcquiredSession {
                    session: Arc::clone(session),
                    connection: None,
                    ownership: SessionOwnership::External,
                    deadline: holder.deadline(),
                });
            }
        }

        let connection = self.factory.create_connection()?;
        let session = match connection.create_session(self.transacted, self.ack_mode) {
            Ok(session) => session,
            Err(err) => {
                cleanup::close_connection(connection.as_ref());
                return Err(err.into());
            }
        };
        if start_connection {
            if let Err(err) = connection.start() {
                cleanup::close_session(session.as_ref());
                cleanup::close_connection(connection.as_ref());
                return Err(err.into());
            }
        }
        debug!(transacted = self.transacted, "created local connection/session pair");
        Ok(AcquiredSession {
            session,
            connection: Some(connection),
            ownership: SessionOwnership::Local,
            deadline: None,
        })
    }

    /// A session is locally transacted only when this coordinator is
    /// transacted AND the session is locally owned. Externally coordinated
    /// sessions are committed by their own unit of work, never here.
    pub fn is_locally_transacted(&self, acquired: &AcquiredSession) -> bool {
        self.transacted && acquired.is_locally_owned()
    }

    /// Commit the session if, and only if, it is locally transacted.
    pub fn commit_if_locally_transacted(
        &self,
        acquired: &AcquiredSession,
    ) -> Result<(), MessagingError> {
        if self.is_locally_transacted(acquired) {
            acquired.session().commit()?;
        }
        Ok(())
    }

    /// Begin a unit of work: bind a synchronized, transacted holder for this
    /// coordinator's factory. If one is already bound the scope joins it
    /// (nesting); only the outermost [`complete`](Self::complete) finalizes.
    pub fn begin(&self, ctx: &TransactionContext) -> Result<(), MessagingError> {
        self.begin_holder(ctx, None)
    }

    /// Like [`begin`](Self::begin), with a deadline on the unit of work.
    /// Operations inside it never block past the deadline.
    pub fn begin_with_timeout(
        &self,
        ctx: &TransactionContext,
        timeout: Duration,
    ) -> Result<(), MessagingError> {
        self.begin_holder(ctx, Some(timeout))
    }

    fn begin_holder(
        &self,
        ctx: &TransactionContext,
        timeout: Option<Duration>,
    ) -> Result<(), MessagingError> {
        let key = self.factory_key();
        if ctx.join(key).is_some() {
            debug!("joining already-active unit of work");
            return Ok(());
        }

        let connection = self.factory.create_connection()?;
        let session = match connection.create_session(true, self.ack_mode) {
            Ok(session) => session,
            Err(err) => {
                cleanup::close_connection(connection.as_ref());
                return Err(err.into());
            }
        };
        // The unit of work owns the connection, so it starts delivery too:
        // receives inside the transaction need a started connection.
        if let Err(err) = connection.start() {
            cleanup::close_session(session.as_ref());
            cleanup::close_connection(connection.as_ref());
            return Err(err.into());
        }

        let mut holder =
            ResourceHolder::with_resources(Arc::clone(&connection), Arc::clone(&session));
        holder.mark_synchronized();
        if let Some(timeout) = timeout {
            holder.set_timeout(timeout);
        }
        if let Err(err) = ctx.bind(key, holder) {
            // Unreachable in single-owner use, but the freshly created
            // resources must still be released before propagating.
            cleanup::close_session(session.as_ref());
            cleanup::close_connection(connection.as_ref());
            return Err(err.into());
        }
        debug!("unit of work started");
        Ok(())
    }

    /// Complete a unit of work scope.
    ///
    /// A `Rollback` outcome dooms the whole unit of work even from a nested
    /// scope. The outermost completion finalizes: commit (unless doomed) or
    /// roll back the bound session, then release session and connection and
    /// remove the binding. Commit/rollback failures propagate; close failures
    /// are logged and swallowed so they never mask the primary result.
    pub fn complete(
        &self,
        ctx: &TransactionContext,
        outcome: TransactionOutcome,
    ) -> Result<(), MessagingError> {
        let key = self.factory_key();
        if outcome == TransactionOutcome::Rollback {
            if let Some(holder) = ctx.lookup(key) {
                holder.lock().unwrap().set_rollback_only();
            }
        }
        let Some(holder) = ctx.leave(key)? else {
            return Ok(()); // nested scope; the outer one finalizes
        };

        let holder = holder.lock().unwrap();
        let mut primary = Ok(());
        if let Some(session) = holder.session() {
            if session.transacted() {
                let result = if holder.is_rollback_only() {
                    session.rollback()
                } else {
                    session.commit()
                };
                if let Err(err) = result {
                    primary = Err(err.into());
                }
            }
            cleanup::close_session(session.as_ref());
        }
        if let Some(connection) = holder.connection() {
            cleanup::close_connection(connection.as_ref());
        }
        debug!(rolled_back = holder.is_rollback_only(), "unit of work completed");
        primary
    }
}
