#![allow(dead_code)]

use std::thread;
use std::time::Duration;

use mq_template::{
    Destination, DestinationResolver, InMemoryBroker, Message, NameResolver, ProviderError,
    Session,
};

/// Resolver that records each resolution in the broker's operation log, so
/// call-sequence assertions can see where resolution happened relative to
/// the provider calls around it.
pub struct RecordingResolver {
    inner: NameResolver,
    broker: InMemoryBroker,
}

impl RecordingResolver {
    pub fn new(broker: InMemoryBroker) -> Self {
        RecordingResolver {
            inner: NameResolver,
            broker,
        }
    }
}

impl DestinationResolver for RecordingResolver {
    fn resolve(
        &self,
        session: &dyn Session,
        name: &str,
        pub_sub: bool,
    ) -> Result<Destination, ProviderError> {
        self.broker.record(format!("resolve:{}", name));
        self.inner.resolve(session, name, pub_sub)
    }
}

/// Deliver a message to the broker from another thread after a delay,
/// simulating a remote party producing while a receive is blocking.
pub fn enqueue_after(
    broker: &InMemoryBroker,
    destination: Destination,
    message: Message,
    delay: Duration,
) -> thread::JoinHandle<()> {
    let broker = broker.clone();
    thread::spawn(move || {
        thread::sleep(delay);
        broker.enqueue(&destination, message);
    })
}
