mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use mq_template::{
    ConnectionFactory, Destination, InMemoryBroker, Message, MessagingTemplate, ReceiveWait,
    TransactionContext, TransactionOutcome,
};

fn orders_queue() -> Destination {
    Destination::Queue("orders.queue".to_string())
}

fn transacted_template(broker: &InMemoryBroker) -> MessagingTemplate {
    let factory: Arc<dyn ConnectionFactory> = Arc::new(broker.clone());
    MessagingTemplate::new(factory)
        .with_transacted(true)
        .with_default_destination_name("orders.queue")
}

#[test]
fn ambient_operations_reuse_the_bound_session() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker).with_receive_timeout(ReceiveWait::NoWait);
    let ctx = TransactionContext::new();

    template.coordinator().begin(&ctx).unwrap();
    assert_eq!(broker.connections_created(), 1);
    assert_eq!(broker.sessions_created(), 1);

    broker.enqueue(&orders_queue(), Message::text("inbound"));
    for _ in 0..3 {
        template.send(&ctx, |_| Ok(Message::text("outbound"))).unwrap();
    }
    template.receive(&ctx).unwrap().unwrap();

    // No new connection or session, and nothing closed by the operations.
    assert_eq!(broker.connections_created(), 1);
    assert_eq!(broker.sessions_created(), 1);
    assert_eq!(broker.connections_closed(), 0);
    assert_eq!(broker.sessions_closed(), 0);

    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Commit)
        .unwrap();
    assert_eq!(broker.connections_closed(), 1);
    assert_eq!(broker.sessions_closed(), 1);
}

#[test]
fn commit_count_matches_locally_transacted_operations_exactly() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker);

    let mut local_sends = 0;
    for i in 0..100 {
        if i % 2 == 0 {
            // Locally owned: the template commits after the send.
            let ctx = TransactionContext::new();
            template.send(&ctx, |_| Ok(Message::text("local"))).unwrap();
            local_sends += 1;
        } else {
            // Ambient: the template must not commit; the unit of work rolls
            // back, so the only commits ever seen are the local ones.
            let ctx = TransactionContext::new();
            template.coordinator().begin(&ctx).unwrap();
            template.send(&ctx, |_| Ok(Message::text("ambient"))).unwrap();
            template
                .coordinator()
                .complete(&ctx, TransactionOutcome::Rollback)
                .unwrap();
        }
    }

    assert_eq!(local_sends, 50);
    assert_eq!(broker.commits(), 50);
    assert_eq!(broker.rollbacks(), 50);
    // Only committed sends are visible.
    assert_eq!(broker.queue_depth(&orders_queue()), 50);
}

#[test]
fn ambient_sends_are_published_on_commit() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker);
    let ctx = TransactionContext::new();

    template.coordinator().begin(&ctx).unwrap();
    template.send(&ctx, |_| Ok(Message::text("a"))).unwrap();
    template.send(&ctx, |_| Ok(Message::text("b"))).unwrap();
    assert_eq!(broker.queue_depth(&orders_queue()), 0);

    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Commit)
        .unwrap();
    assert_eq!(broker.queue_depth(&orders_queue()), 2);
    assert_eq!(broker.commits(), 1);
}

#[test]
fn ambient_rollback_discards_buffered_sends() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker);
    let ctx = TransactionContext::new();

    template.coordinator().begin(&ctx).unwrap();
    template.send(&ctx, |_| Ok(Message::text("doomed"))).unwrap();
    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Rollback)
        .unwrap();

    assert_eq!(broker.queue_depth(&orders_queue()), 0);
    assert_eq!(broker.commits(), 0);
    assert_eq!(broker.rollbacks(), 1);
}

#[test]
fn locally_transacted_send_commits_per_operation() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker);
    let ctx = TransactionContext::new();

    template.send(&ctx, |_| Ok(Message::text("now"))).unwrap();

    // The send committed its own session; the message is already visible.
    assert_eq!(broker.commits(), 1);
    assert_eq!(broker.queue_depth(&orders_queue()), 1);
}

#[test]
fn unit_of_work_deadline_overrides_a_longer_receive_timeout() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker); // receive timeout: indefinite
    let ctx = TransactionContext::new();

    template
        .coordinator()
        .begin_with_timeout(&ctx, Duration::from_millis(40))
        .unwrap();

    // Nothing queued: without the deadline this receive would block forever.
    let started = Instant::now();
    let received = template.receive(&ctx).unwrap();
    assert!(received.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));

    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Rollback)
        .unwrap();
}

#[test]
fn expired_deadline_degrades_to_a_non_blocking_receive() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker);
    let ctx = TransactionContext::new();

    template
        .coordinator()
        .begin_with_timeout(&ctx, Duration::from_millis(0))
        .unwrap();

    let started = Instant::now();
    assert!(template.receive(&ctx).unwrap().is_none());
    assert!(started.elapsed() < Duration::from_millis(500));

    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Rollback)
        .unwrap();
}

#[test]
fn separate_factories_do_not_share_holders() {
    let broker_a = InMemoryBroker::new();
    let broker_b = InMemoryBroker::new();
    let template_a = transacted_template(&broker_a);
    let template_b = transacted_template(&broker_b);
    let ctx = TransactionContext::new();

    template_a.coordinator().begin(&ctx).unwrap();

    // A unit of work for factory A says nothing about factory B: this send
    // creates (and closes) its own resources on B.
    template_b.send(&ctx, |_| Ok(Message::text("b"))).unwrap();
    assert_eq!(broker_b.connections_created(), 1);
    assert_eq!(broker_b.connections_closed(), 1);
    assert_eq!(broker_b.commits(), 1);

    template_a
        .coordinator()
        .complete(&ctx, TransactionOutcome::Commit)
        .unwrap();
    assert_eq!(broker_a.commits(), 1);
}

#[test]
fn transacted_receive_inside_unit_of_work_does_not_acknowledge() {
    let broker = InMemoryBroker::new();
    let template = transacted_template(&broker).with_receive_timeout(ReceiveWait::NoWait);
    let ctx = TransactionContext::new();

    template.coordinator().begin(&ctx).unwrap();
    broker.enqueue(&orders_queue(), Message::text("inbound"));

    template.receive(&ctx).unwrap().unwrap();
    // Transacted sessions never acknowledge explicitly, and the external
    // session is not committed by the operation either.
    assert!(broker.acknowledged().is_empty());
    assert_eq!(broker.commits(), 0);

    template
        .coordinator()
        .complete(&ctx, TransactionOutcome::Commit)
        .unwrap();
    assert_eq!(broker.commits(), 1);
}
