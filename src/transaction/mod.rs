//! Transactional resource coordination.
//!
//! The protocol, bottom up:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ResourceCoordinator                                         │
//! │  acquire(): join the ambient holder or create fresh         │
//! │  begin()/complete(): run a unit of work                     │
//! │  commit policy: locally-owned + transacted only             │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │ lookup / bind / join / leave
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │ TransactionContext: factory key -> ResourceHolder, per      │
//! │ unit of work, explicit (no thread-locals)                   │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │
//! ┌──────────────────────────▼──────────────────────────────────┐
//! │ ResourceHolder: one connection + one session + deadline     │
//! │ + rollback-only flag for one unit of work                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod context;
mod coordinator;
mod holder;

pub use context::{ContextError, FactoryKey, TransactionContext};
pub use coordinator::{
    AcquiredSession, ResourceCoordinator, SessionOwnership, TransactionOutcome,
};
pub use holder::ResourceHolder;
