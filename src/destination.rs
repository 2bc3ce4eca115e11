//! Destinations and the lazy name-resolution seam.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::provider::{ProviderError, Session};

/// A resolved destination handle.
///
/// `Queue` is the point-to-point domain; `Topic` is publish/subscribe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Queue(String),
    Topic(String),
}

impl Destination {
    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, Destination::Topic(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Queue(name) => write!(f, "queue:{}", name),
            Destination::Topic(name) => write!(f, "topic:{}", name),
        }
    }
}

/// Either a resolved handle or a name to resolve lazily inside an open
/// session.
///
/// The template's default destination holds one of these; setting a handle
/// and setting a name are mutually exclusive, last write wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestinationSpec {
    Resolved(Destination),
    Named(String),
}

impl From<Destination> for DestinationSpec {
    fn from(destination: Destination) -> Self {
        DestinationSpec::Resolved(destination)
    }
}

impl From<&str> for DestinationSpec {
    fn from(name: &str) -> Self {
        DestinationSpec::Named(name.to_string())
    }
}

impl From<String> for DestinationSpec {
    fn from(name: String) -> Self {
        DestinationSpec::Named(name)
    }
}

/// Resolves a destination name to a handle.
///
/// Resolution may require a live session (e.g. looking the name up through
/// the provider), which is why the template only ever calls this once a
/// session is open, never earlier.
pub trait DestinationResolver: Send + Sync {
    fn resolve(
        &self,
        session: &dyn Session,
        name: &str,
        pub_sub: bool,
    ) -> Result<Destination, ProviderError>;
}

/// Default resolver: the name is the destination, domain chosen by flag.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameResolver;

impl DestinationResolver for NameResolver {
    fn resolve(
        &self,
        _session: &dyn Session,
        name: &str,
        pub_sub: bool,
    ) -> Result<Destination, ProviderError> {
        Ok(if pub_sub {
            Destination::Topic(name.to_string())
        } else {
            Destination::Queue(name.to_string())
        })
    }
}
