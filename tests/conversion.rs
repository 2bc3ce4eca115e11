mod support;

use std::sync::Arc;

use mq_template::{
    ConnectionFactory, Destination, InMemoryBroker, JsonMessageConverter, Message,
    MessagingError, MessagingTemplate, ReceiveWait, SimpleMessageConverter, TransactionContext,
};

fn orders_queue() -> Destination {
    Destination::Queue("orders.queue".to_string())
}

fn template(broker: &InMemoryBroker) -> MessagingTemplate {
    let factory: Arc<dyn ConnectionFactory> = Arc::new(broker.clone());
    MessagingTemplate::new(factory)
        .with_default_destination_name("orders.queue")
        .with_receive_timeout(ReceiveWait::NoWait)
}

#[test]
fn convert_and_send_without_a_converter_fails_before_any_provider_call() {
    let broker = InMemoryBroker::new();
    let template = template(&broker);
    let ctx = TransactionContext::new();

    let err = template
        .convert_and_send(&ctx, &"payload".to_string())
        .unwrap_err();
    assert!(matches!(err, MessagingError::Configuration(_)));
    assert_eq!(broker.connections_created(), 0);
}

#[test]
fn receive_and_convert_without_a_converter_fails_before_any_provider_call() {
    let broker = InMemoryBroker::new();
    let template = template(&broker);
    let ctx = TransactionContext::new();

    let err = template.receive_and_convert::<String>(&ctx).unwrap_err();
    assert!(matches!(err, MessagingError::Configuration(_)));
    assert_eq!(broker.connections_created(), 0);
}

#[test]
fn string_round_trip_through_the_simple_converter() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    template
        .convert_and_send(&ctx, &"order placed".to_string())
        .unwrap();
    let received = template.receive_and_convert::<String>(&ctx).unwrap();
    assert_eq!(received.as_deref(), Some("order placed"));
}

#[test]
fn bytes_round_trip_through_the_simple_converter() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    // Not valid UTF-8, so it comes back as bytes rather than a string.
    let payload: Vec<u8> = vec![0xff, 0x00, 0x7f];
    template.convert_and_send(&ctx, &payload).unwrap();
    let received = template.receive_and_convert::<Vec<u8>>(&ctx).unwrap();
    assert_eq!(received, Some(payload));
}

#[test]
fn json_round_trip_through_the_json_converter() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(JsonMessageConverter));
    let ctx = TransactionContext::new();

    let value = serde_json::json!({"order": 42, "items": ["a", "b"]});
    template.convert_and_send(&ctx, &value).unwrap();

    let received = template
        .receive_and_convert::<serde_json::Value>(&ctx)
        .unwrap();
    assert_eq!(received, Some(value));
}

#[test]
fn post_processor_runs_after_conversion_and_before_the_send() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    template
        .convert_and_send_with(&ctx, &"tagged".to_string(), |message| {
            Ok(message.with_property("origin", "billing"))
        })
        .unwrap();

    let received = template.receive(&ctx).unwrap().unwrap();
    assert_eq!(received.property("origin"), Some("billing"));
    assert_eq!(received.body_str(), Some("tagged"));
}

#[test]
fn failing_post_processor_sends_nothing() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    let err = template
        .convert_and_send_with(&ctx, &"dropped".to_string(), |_| {
            Err(MessagingError::Configuration("veto".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, MessagingError::Configuration(_)));
    assert_eq!(broker.queue_depth(&orders_queue()), 0);
    // The session had already been opened; it is still released.
    assert_eq!(broker.connections_closed(), 1);
}

#[test]
fn unsupported_outbound_type_is_a_conversion_error() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    let err = template.convert_and_send(&ctx, &3.14f64).unwrap_err();
    assert!(matches!(err, MessagingError::Conversion(_)));
    assert_eq!(broker.queue_depth(&orders_queue()), 0);
}

#[test]
fn payload_type_mismatch_is_a_conversion_error() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    // Text body converts to a String; asking for bytes is a mismatch.
    template
        .convert_and_send(&ctx, &"text".to_string())
        .unwrap();
    let err = template.receive_and_convert::<Vec<u8>>(&ctx).unwrap_err();
    assert!(matches!(err, MessagingError::Conversion(_)));
}

#[test]
fn receive_and_convert_is_none_when_nothing_is_queued() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    let received = template.receive_and_convert::<String>(&ctx).unwrap();
    assert!(received.is_none());
}

#[test]
fn selected_receive_converts_only_the_matching_message() {
    let broker = InMemoryBroker::new();
    let template = template(&broker).with_converter(Arc::new(SimpleMessageConverter));
    let ctx = TransactionContext::new();

    broker.enqueue(
        &orders_queue(),
        Message::text("low").with_property("tier", "basic"),
    );
    broker.enqueue(
        &orders_queue(),
        Message::text("high").with_property("tier", "premium"),
    );

    let received = template
        .receive_selected_and_convert::<String>(&ctx, "tier=premium")
        .unwrap();
    assert_eq!(received.as_deref(), Some("high"));
}
