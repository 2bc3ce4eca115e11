//! Explicit ambient-transaction registry.
//!
//! The context maps a connection-factory identity to the resource holder
//! bound for the current unit of work. It is an explicit object threaded
//! through every coordinator call; there is no thread-local or global state.
//! One context represents one unit of work; re-entrant operations within it
//! observe the same holder, and nested scopes are tracked with a join/leave
//! depth count.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::provider::ConnectionFactory;

use super::holder::ResourceHolder;

/// Identity of a connection factory: the address of the `Arc` it is held
/// through. Two clones of the same `Arc` compare equal; two separately
/// constructed factories never do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FactoryKey(usize);

impl FactoryKey {
    pub fn of(factory: &Arc<dyn ConnectionFactory>) -> Self {
        FactoryKey(Arc::as_ptr(factory) as *const () as usize)
    }
}

/// Error type for context operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// A holder is already bound for this factory in this unit of work.
    AlreadyBound,
    /// No holder is bound for this factory in this unit of work.
    NotBound,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::AlreadyBound => {
                write!(f, "a resource holder is already bound for this connection factory")
            }
            ContextError::NotBound => {
                write!(f, "no resource holder is bound for this connection factory")
            }
        }
    }
}

impl std::error::Error for ContextError {}

struct BoundHolder {
    holder: Arc<Mutex<ResourceHolder>>,
    depth: usize,
}

/// Registry of resource holders for one unit of work.
///
/// At most one active holder per factory key. The internal mutex exists only
/// to make re-entrant lookup safe; holders and their resources are still
/// owned exclusively by this unit of work and must not be shared across
/// concurrent units of work.
pub struct TransactionContext {
    resources: Mutex<HashMap<FactoryKey, BoundHolder>>,
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionContext {
    /// Create an empty context (a fresh unit of work).
    pub fn new() -> Self {
        TransactionContext {
            resources: Mutex::new(HashMap::new()),
        }
    }

    /// Bind a holder for a factory. Fails if one is already bound: a holder
    /// is registered exactly once per unit of work.
    pub fn bind(
        &self,
        key: FactoryKey,
        holder: ResourceHolder,
    ) -> Result<Arc<Mutex<ResourceHolder>>, ContextError> {
        let mut resources = self.resources.lock().unwrap();
        if resources.contains_key(&key) {
            return Err(ContextError::AlreadyBound);
        }
        let holder = Arc::new(Mutex::new(holder));
        resources.insert(
            key,
            BoundHolder {
                holder: Arc::clone(&holder),
                depth: 1,
            },
        );
        Ok(holder)
    }

    /// Look up the holder bound for a factory, if any. Re-entrant: every
    /// lookup within the unit of work returns the same holder.
    pub fn lookup(&self, key: FactoryKey) -> Option<Arc<Mutex<ResourceHolder>>> {
        let resources = self.resources.lock().unwrap();
        resources.get(&key).map(|bound| Arc::clone(&bound.holder))
    }

    /// Join an existing binding from a nested scope, incrementing its depth.
    /// Returns `None` when nothing is bound.
    pub fn join(&self, key: FactoryKey) -> Option<Arc<Mutex<ResourceHolder>>> {
        let mut resources = self.resources.lock().unwrap();
        resources.get_mut(&key).map(|bound| {
            bound.depth += 1;
            Arc::clone(&bound.holder)
        })
    }

    /// Leave a scope, decrementing the binding's depth. When the outermost
    /// scope leaves (depth reaches zero) the holder is removed and returned
    /// for finalization; nested leaves return `None`.
    pub fn leave(&self, key: FactoryKey) -> Result<Option<Arc<Mutex<ResourceHolder>>>, ContextError> {
        let mut resources = self.resources.lock().unwrap();
        let bound = resources.get_mut(&key).ok_or(ContextError::NotBound)?;
        bound.depth -= 1;
        if bound.depth == 0 {
            let bound = resources.remove(&key).expect("binding present");
            Ok(Some(bound.holder))
        } else {
            Ok(None)
        }
    }

    /// Remove a binding outright, regardless of depth.
    pub fn unbind(&self, key: FactoryKey) -> Result<Arc<Mutex<ResourceHolder>>, ContextError> {
        let mut resources = self.resources.lock().unwrap();
        resources
            .remove(&key)
            .map(|bound| bound.holder)
            .ok_or(ContextError::NotBound)
    }

    pub fn is_bound(&self, key: FactoryKey) -> bool {
        self.resources.lock().unwrap().contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.resources.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.resources.lock().unwrap().len()
    }
}
