//! Consumer-level provider seam.

use std::time::{Duration, Instant};

use crate::message::Message;

use super::error::ProviderError;

/// Creation-time consumer settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsumerOptions {
    /// Provider-evaluated message selector; only matching messages are
    /// delivered.
    pub selector: Option<String>,
    /// Suppress delivery of messages published over this consumer's own
    /// connection. Only legal for topic consumers.
    pub no_local: bool,
}

/// How long a receive call may block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveWait {
    /// Block until a message arrives.
    Indefinite,
    /// Block for at most this long, then return `None`.
    Timeout(Duration),
    /// A single non-blocking attempt.
    NoWait,
}

impl ReceiveWait {
    /// Interpret a signed millisecond value: non-positive blocks
    /// indefinitely, positive bounds the wait.
    pub fn from_millis(millis: i64) -> Self {
        if millis <= 0 {
            ReceiveWait::Indefinite
        } else {
            ReceiveWait::Timeout(Duration::from_millis(millis as u64))
        }
    }

    /// The bounded wait remaining until an absolute deadline.
    ///
    /// Truncates to whole milliseconds (rounds down); an expired or
    /// sub-millisecond remainder becomes `NoWait` so a nearly-elapsed
    /// deadline never blocks.
    pub fn until(deadline: Instant) -> Self {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = remaining.as_millis();
        if millis == 0 {
            ReceiveWait::NoWait
        } else {
            ReceiveWait::Timeout(Duration::from_millis(millis as u64))
        }
    }

    /// The tighter of two waits. `Indefinite` never tightens anything;
    /// `NoWait` tightens everything.
    pub fn tightest(self, other: ReceiveWait) -> ReceiveWait {
        match (self, other) {
            (ReceiveWait::Indefinite, wait) | (wait, ReceiveWait::Indefinite) => wait,
            (ReceiveWait::NoWait, _) | (_, ReceiveWait::NoWait) => ReceiveWait::NoWait,
            (ReceiveWait::Timeout(a), ReceiveWait::Timeout(b)) => {
                ReceiveWait::Timeout(a.min(b))
            }
        }
    }
}

/// A consumer bound to a single destination.
pub trait Consumer: Send {
    /// Receive the next message, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` when the wait expires without a message; expiry is
    /// not an error.
    fn receive(&self, wait: ReceiveWait) -> Result<Option<Message>, ProviderError>;

    /// Close the consumer.
    fn close(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_millis_maps_non_positive_to_indefinite() {
        assert_eq!(ReceiveWait::from_millis(0), ReceiveWait::Indefinite);
        assert_eq!(ReceiveWait::from_millis(-5), ReceiveWait::Indefinite);
        assert_eq!(
            ReceiveWait::from_millis(250),
            ReceiveWait::Timeout(Duration::from_millis(250))
        );
    }

    #[test]
    fn until_an_expired_deadline_means_no_wait() {
        assert_eq!(ReceiveWait::until(Instant::now()), ReceiveWait::NoWait);
    }

    #[test]
    fn until_a_future_deadline_bounds_the_wait() {
        match ReceiveWait::until(Instant::now() + Duration::from_secs(5)) {
            ReceiveWait::Timeout(wait) => {
                assert!(wait <= Duration::from_secs(5));
                assert!(wait >= Duration::from_secs(4));
            }
            other => panic!("expected bounded wait, got {:?}", other),
        }
    }

    #[test]
    fn tightest_picks_the_shorter_bound() {
        let short = ReceiveWait::Timeout(Duration::from_millis(10));
        let long = ReceiveWait::Timeout(Duration::from_millis(500));

        assert_eq!(short.tightest(long), short);
        assert_eq!(ReceiveWait::Indefinite.tightest(long), long);
        assert_eq!(long.tightest(ReceiveWait::NoWait), ReceiveWait::NoWait);
        assert_eq!(
            ReceiveWait::Indefinite.tightest(ReceiveWait::Indefinite),
            ReceiveWait::Indefinite
        );
    }
}
