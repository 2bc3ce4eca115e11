//! In-memory messaging provider.
//!
//! This module provides a thread-safe in-memory broker that implements the
//! provider seams end to end, useful for:
//! - Unit and integration testing without external dependencies
//! - Single-process applications
//! - Development and prototyping
//!
//! Besides moving messages, the broker records an ordered operation log and
//! per-resource counters so tests can assert exactly which provider calls an
//! operation made, and in what order.

mod broker;
mod session;

pub use broker::InMemoryBroker;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::Destination;
    use crate::message::Message;
    use crate::provider::{
        AckMode, ConnectionFactory, ConsumerOptions, ProviderError, ReceiveWait, Session,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn queue(name: &str) -> Destination {
        Destination::Queue(name.to_string())
    }

    fn started_session(
        broker: &InMemoryBroker,
        transacted: bool,
        ack_mode: AckMode,
    ) -> Arc<dyn Session> {
        let connection = broker.create_connection().unwrap();
        connection.start().unwrap();
        connection.create_session(transacted, ack_mode).unwrap()
    }

    #[test]
    fn send_then_receive() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        let dest = queue("orders");

        let producer = session.create_producer(&dest, Default::default()).unwrap();
        producer.send(&Message::text("hello")).unwrap();

        let consumer = session
            .create_consumer(&dest, ConsumerOptions::default())
            .unwrap();
        let message = consumer.receive(ReceiveWait::NoWait).unwrap().unwrap();
        assert_eq!(message.body_str(), Some("hello"));
        assert!(message.id.is_some());
        assert!(message.timestamp.is_some());
    }

    #[test]
    fn producer_options_suppress_id_and_timestamp() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        let dest = queue("orders");

        let producer = session
            .create_producer(
                &dest,
                crate::provider::ProducerOptions {
                    suppress_message_id: true,
                    suppress_timestamp: true,
                },
            )
            .unwrap();
        producer.send(&Message::text("bare")).unwrap();

        let consumer = session.create_consumer(&dest, Default::default()).unwrap();
        let message = consumer.receive(ReceiveWait::NoWait).unwrap().unwrap();
        assert!(message.id.is_none());
        assert!(message.timestamp.is_none());
    }

    #[test]
    fn unstarted_connection_delivers_nothing() {
        let broker = InMemoryBroker::new();
        let connection = broker.create_connection().unwrap();
        let session = connection.create_session(false, AckMode::Auto).unwrap();
        let dest = queue("orders");
        broker.enqueue(&dest, Message::text("waiting"));

        let consumer = session.create_consumer(&dest, Default::default()).unwrap();
        assert!(consumer.receive(ReceiveWait::NoWait).unwrap().is_none());

        connection.start().unwrap();
        assert!(consumer.receive(ReceiveWait::NoWait).unwrap().is_some());
    }

    #[test]
    fn bounded_wait_returns_none_on_expiry() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        let consumer = session
            .create_consumer(&queue("empty"), Default::default())
            .unwrap();

        let received = consumer
            .receive(ReceiveWait::Timeout(Duration::from_millis(20)))
            .unwrap();
        assert!(received.is_none());
    }

    #[test]
    fn transacted_sends_are_invisible_until_commit() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, true, AckMode::Auto);
        let dest = queue("orders");

        let producer = session.create_producer(&dest, Default::default()).unwrap();
        producer.send(&Message::text("pending")).unwrap();
        assert_eq!(broker.queue_depth(&dest), 0);

        session.commit().unwrap();
        assert_eq!(broker.queue_depth(&dest), 1);
        assert_eq!(broker.commits(), 1);
    }

    #[test]
    fn rollback_discards_buffered_sends() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, true, AckMode::Auto);
        let dest = queue("orders");

        let producer = session.create_producer(&dest, Default::default()).unwrap();
        producer.send(&Message::text("doomed")).unwrap();
        session.rollback().unwrap();

        assert_eq!(broker.queue_depth(&dest), 0);
        assert_eq!(broker.rollbacks(), 1);
    }

    #[test]
    fn commit_on_non_transacted_session_is_illegal() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        assert!(matches!(
            session.commit().unwrap_err(),
            ProviderError::IllegalState(_)
        ));
    }

    #[test]
    fn acknowledge_on_transacted_session_is_illegal() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, true, AckMode::Auto);
        assert!(matches!(
            session.acknowledge(&Message::text("x")).unwrap_err(),
            ProviderError::IllegalState(_)
        ));
    }

    #[test]
    fn no_local_on_a_queue_is_illegal() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        let err = session
            .create_consumer(
                &queue("orders"),
                ConsumerOptions {
                    selector: None,
                    no_local: true,
                },
            )
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::IllegalState(_)));
    }

    #[test]
    fn no_local_on_a_topic_is_fine() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        session
            .create_consumer(
                &Destination::Topic("alerts".to_string()),
                ConsumerOptions {
                    selector: None,
                    no_local: true,
                },
            )
            .unwrap();
    }

    #[test]
    fn selector_skips_non_matching_messages() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Auto);
        let dest = queue("orders");
        broker.enqueue(&dest, Message::text("eu order").with_property("region", "eu"));
        broker.enqueue(&dest, Message::text("us order").with_property("region", "us"));

        let consumer = session
            .create_consumer(
                &dest,
                ConsumerOptions {
                    selector: Some("region=us".to_string()),
                    no_local: false,
                },
            )
            .unwrap();
        let message = consumer.receive(ReceiveWait::NoWait).unwrap().unwrap();
        assert_eq!(message.body_str(), Some("us order"));
        // The non-matching message stays queued.
        assert_eq!(broker.queue_depth(&dest), 1);
    }

    #[test]
    fn acknowledge_records_the_message_id() {
        let broker = InMemoryBroker::new();
        let session = started_session(&broker, false, AckMode::Client);
        let dest = queue("orders");
        broker.enqueue(&dest, Message::text("needs ack"));

        let consumer = session.create_consumer(&dest, Default::default()).unwrap();
        let message = consumer.receive(ReceiveWait::NoWait).unwrap().unwrap();
        session.acknowledge(&message).unwrap();

        assert_eq!(broker.acknowledged(), vec![message.id.unwrap()]);
    }

    #[test]
    fn closed_resources_reject_use_and_close_is_idempotent() {
        let broker = InMemoryBroker::new();
        let connection = broker.create_connection().unwrap();
        let session = connection.create_session(false, AckMode::Auto).unwrap();

        session.close().unwrap();
        session.close().unwrap();
        assert_eq!(broker.sessions_closed(), 1);

        assert!(matches!(
            session.create_producer(&queue("q"), Default::default()),
            Err(ProviderError::Closed(_))
        ));

        connection.close().unwrap();
        connection.close().unwrap();
        assert_eq!(broker.connections_closed(), 1);
        assert!(matches!(
            connection.create_session(false, AckMode::Auto),
            Err(ProviderError::Closed(_))
        ));
    }
}
