//! The operation facade: send, receive, convert, and the raw session
//! callback escape hatch.
//!
//! Every operation runs through the same scoped-acquisition path: obtain a
//! session from the [`ResourceCoordinator`] (joining an ambient transaction
//! when one is bound for the template's connection factory, creating a fresh
//! connection/session pair otherwise), run the work, then release exactly
//! what was created locally, on every exit path. Resources borrowed from an
//! ambient unit of work are never committed or closed here; their owner does
//! that.

use std::any::Any;
use std::sync::Arc;

use crate::converter::MessageConverter;
use crate::destination::{Destination, DestinationResolver, DestinationSpec, NameResolver};
use crate::error::MessagingError;
use crate::message::{Message, QosSettings};
use crate::provider::cleanup;
use crate::provider::{
    AckMode, ConnectionFactory, Consumer, ConsumerOptions, Producer, ProducerOptions, ReceiveWait,
    Session,
};
use crate::transaction::{AcquiredSession, ResourceCoordinator, TransactionContext};

/// Synchronous messaging operations over a pluggable provider.
///
/// Configuration is set up front with the `with_*` builders and immutable
/// during an operation. The template itself holds no connection state (all
/// resources are per-operation or per-unit-of-work), so one template can be
/// shared freely.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use mq_template::{ConnectionFactory, InMemoryBroker, Message, MessagingTemplate, TransactionContext};
///
/// let broker = InMemoryBroker::new();
/// let factory: Arc<dyn ConnectionFactory> = Arc::new(broker.clone());
/// let template = MessagingTemplate::new(factory)
///     .with_default_destination_name("orders.queue");
///
/// let ctx = TransactionContext::new();
/// template.send(&ctx, |_session| Ok(Message::text("hello"))).unwrap();
///
/// let received = template.receive(&ctx).unwrap().unwrap();
/// assert_eq!(received.body_str(), Some("hello"));
/// ```
pub struct MessagingTemplate {
    coordinator: ResourceCoordinator,
    resolver: Arc<dyn DestinationResolver>,
    converter: Option<Arc<dyn MessageConverter>>,
    default_destination: Option<DestinationSpec>,
    receive_timeout: ReceiveWait,
    explicit_qos: bool,
    qos: QosSettings,
    suppress_message_id: bool,
    suppress_timestamp: bool,
    pub_sub_domain: bool,
    no_local: bool,
}

impl MessagingTemplate {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        MessagingTemplate {
            coordinator: ResourceCoordinator::new(factory),
            resolver: Arc::new(NameResolver),
            converter: None,
            default_destination: None,
            receive_timeout: ReceiveWait::Indefinite,
            explicit_qos: false,
            qos: QosSettings::default(),
            suppress_message_id: false,
            suppress_timestamp: false,
            pub_sub_domain: false,
            no_local: false,
        }
    }

    /// Use transacted sessions. Locally created sessions are then committed
    /// by the template after a successful send/receive; sessions borrowed
    /// from an ambient unit of work are left for their owner to commit.
    pub fn with_transacted(mut self, transacted: bool) -> Self {
        self.coordinator = self.coordinator.with_transacted(transacted);
        self
    }

    /// Acknowledgement mode for non-transacted sessions.
    pub fn with_ack_mode(mut self, ack_mode: AckMode) -> Self {
        self.coordinator = self.coordinator.with_ack_mode(ack_mode);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DestinationResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_converter(mut self, converter: Arc<dyn MessageConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Set a resolved default destination. Mutually exclusive with
    /// [`with_default_destination_name`](Self::with_default_destination_name);
    /// last write wins.
    pub fn with_default_destination(mut self, destination: Destination) -> Self {
        self.default_destination = Some(DestinationSpec::Resolved(destination));
        self
    }

    /// Set a default destination by name, resolved lazily inside the session
    /// scope of each operation. Last write wins over a resolved default.
    pub fn with_default_destination_name(mut self, name: impl Into<String>) -> Self {
        self.default_destination = Some(DestinationSpec::Named(name.into()));
        self
    }

    /// How long receive operations wait. An ambient unit of work with a
    /// tighter deadline overrides this per call.
    pub fn with_receive_timeout(mut self, timeout: ReceiveWait) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Receive timeout as a signed millisecond value: non-positive blocks
    /// indefinitely, positive bounds the wait.
    pub fn with_receive_timeout_millis(self, millis: i64) -> Self {
        self.with_receive_timeout(ReceiveWait::from_millis(millis))
    }

    /// Enable explicit quality of service: sends carry these parameters
    /// instead of the provider's defaults.
    pub fn with_qos(mut self, qos: QosSettings) -> Self {
        self.qos = qos;
        self.explicit_qos = true;
        self
    }

    /// Don't have the provider generate message ids.
    pub fn with_message_id_suppressed(mut self, suppress: bool) -> Self {
        self.suppress_message_id = suppress;
        self
    }

    /// Don't have the provider stamp send timestamps.
    pub fn with_timestamp_suppressed(mut self, suppress: bool) -> Self {
        self.suppress_timestamp = suppress;
        self
    }

    /// Resolve names into the publish/subscribe domain (topics) instead of
    /// the point-to-point domain (queues).
    pub fn with_pub_sub_domain(mut self, pub_sub: bool) -> Self {
        self.pub_sub_domain = pub_sub;
        self
    }

    /// Suppress delivery of messages published over the consumer's own
    /// connection. Only honored for topic consumers: a no-local queue
    /// consumer is a provider-level illegal state this template never
    /// requests.
    pub fn with_no_local(mut self, no_local: bool) -> Self {
        self.no_local = no_local;
        self
    }

    /// The coordinator driving session acquisition and unit-of-work
    /// begin/complete for this template's connection factory.
    pub fn coordinator(&self) -> &ResourceCoordinator {
        &self.coordinator
    }

    pub fn receive_timeout(&self) -> ReceiveWait {
        self.receive_timeout
    }

    // ------------------------------------------------------------------
    // Session runner
    // ------------------------------------------------------------------

    /// Run a callback against a session, without starting the connection.
    ///
    /// The raw escape hatch: the callback gets the open session and may do
    /// anything the provider allows. Locally created resources are released
    /// on every exit path; the callback's error propagates unchanged.
    pub fn execute<T, F>(&self, ctx: &TransactionContext, callback: F) -> Result<T, MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<T, MessagingError>,
    {
        self.with_session(ctx, false, |acquired| callback(acquired.session()))
    }

    /// Like [`execute`](Self::execute), but starts a locally created
    /// connection first so consumers can receive. Producers don't need this.
    pub fn execute_started<T, F>(
        &self,
        ctx: &TransactionContext,
        callback: F,
    ) -> Result<T, MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<T, MessagingError>,
    {
        self.with_session(ctx, true, |acquired| callback(acquired.session()))
    }

    fn with_session<T, F>(
        &self,
        ctx: &TransactionContext,
        start_connection: bool,
        f: F,
    ) -> Result<T, MessagingError>
    where
        F: FnOnce(&AcquiredSession) -> Result<T, MessagingError>,
    {
        let acquired = self.coordinator.acquire(ctx, start_connection)?;
        // `acquired` releases locally-owned resources when it drops, on
        // every exit path out of `f`.
        f(&acquired)
    }

    // ------------------------------------------------------------------
    // Send
    // ------------------------------------------------------------------

    /// Send to the default destination. The message factory runs inside the
    /// session scope and may use the session (e.g. for conversion).
    pub fn send<F>(&self, ctx: &TransactionContext, message_factory: F) -> Result<(), MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<Message, MessagingError>,
    {
        let spec = self.default_spec()?.clone();
        self.send_spec(ctx, &spec, message_factory)
    }

    /// Send to an explicit destination.
    pub fn send_to<F>(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
        message_factory: F,
    ) -> Result<(), MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<Message, MessagingError>,
    {
        self.send_spec(
            ctx,
            &DestinationSpec::Resolved(destination.clone()),
            message_factory,
        )
    }

    /// Send to a destination by name, resolved inside the session scope.
    pub fn send_to_name<F>(
        &self,
        ctx: &TransactionContext,
        name: &str,
        message_factory: F,
    ) -> Result<(), MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<Message, MessagingError>,
    {
        self.send_spec(ctx, &DestinationSpec::Named(name.to_string()), message_factory)
    }

    fn send_spec<F>(
        &self,
        ctx: &TransactionContext,
        spec: &DestinationSpec,
        message_factory: F,
    ) -> Result<(), MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<Message, MessagingError>,
    {
        self.with_session(ctx, false, |acquired| {
            let session = acquired.session();
            let destination = self.resolve_spec(session, spec)?;
            let producer = session.create_producer(&destination, self.producer_options())?;
            let outcome = self.do_send(acquired, producer.as_ref(), message_factory);
            cleanup::close_producer(producer.as_ref());
            outcome
        })
    }

    fn do_send<F>(
        &self,
        acquired: &AcquiredSession,
        producer: &dyn Producer,
        message_factory: F,
    ) -> Result<(), MessagingError>
    where
        F: FnOnce(&dyn Session) -> Result<Message, MessagingError>,
    {
        let message = message_factory(acquired.session())?;
        if self.explicit_qos {
            producer.send_with(&message, &self.qos)?;
        } else {
            producer.send(&message)?;
        }
        self.coordinator.commit_if_locally_transacted(acquired)
    }

    // ------------------------------------------------------------------
    // Receive
    // ------------------------------------------------------------------

    /// Receive from the default destination.
    pub fn receive(&self, ctx: &TransactionContext) -> Result<Option<Message>, MessagingError> {
        let spec = self.default_spec()?.clone();
        self.receive_spec(ctx, &spec, None)
    }

    /// Receive from an explicit destination.
    pub fn receive_from(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
    ) -> Result<Option<Message>, MessagingError> {
        self.receive_spec(ctx, &DestinationSpec::Resolved(destination.clone()), None)
    }

    /// Receive from a destination by name.
    pub fn receive_from_name(
        &self,
        ctx: &TransactionContext,
        name: &str,
    ) -> Result<Option<Message>, MessagingError> {
        self.receive_spec(ctx, &DestinationSpec::Named(name.to_string()), None)
    }

    /// Receive from the default destination, delivering only messages that
    /// match the selector.
    pub fn receive_selected(
        &self,
        ctx: &TransactionContext,
        selector: &str,
    ) -> Result<Option<Message>, MessagingError> {
        let spec = self.default_spec()?.clone();
        self.receive_spec(ctx, &spec, Some(selector))
    }

    /// Selector variant of [`receive_from`](Self::receive_from).
    pub fn receive_selected_from(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
        selector: &str,
    ) -> Result<Option<Message>, MessagingError> {
        self.receive_spec(
            ctx,
            &DestinationSpec::Resolved(destination.clone()),
            Some(selector),
        )
    }

    /// Selector variant of [`receive_from_name`](Self::receive_from_name).
    pub fn receive_selected_from_name(
        &self,
        ctx: &TransactionContext,
        name: &str,
        selector: &str,
    ) -> Result<Option<Message>, MessagingError> {
        self.receive_spec(ctx, &DestinationSpec::Named(name.to_string()), Some(selector))
    }

    fn receive_spec(
        &self,
        ctx: &TransactionContext,
        spec: &DestinationSpec,
        selector: Option<&str>,
    ) -> Result<Option<Message>, MessagingError> {
        self.with_session(ctx, true, |acquired| {
            let session = acquired.session();
            let destination = self.resolve_spec(session, spec)?;
            let options = ConsumerOptions {
                selector: selector.map(str::to_string),
                // no-local only ever goes to topic consumers; on a queue it
                // is a provider-level illegal state.
                no_local: self.no_local && destination.is_topic(),
            };
            let consumer = session.create_consumer(&destination, options)?;
            let outcome = self.do_receive(acquired, consumer.as_ref());
            cleanup::close_consumer(consumer.as_ref());
            outcome
        })
    }

    fn do_receive(
        &self,
        acquired: &AcquiredSession,
        consumer: &dyn Consumer,
    ) -> Result<Option<Message>, MessagingError> {
        let message = consumer.receive(self.effective_wait(acquired))?;
        let session = acquired.session();
        if session.transacted() {
            // Only a locally transacted session is ours to commit; an
            // external one is committed by its unit of work.
            self.coordinator.commit_if_locally_transacted(acquired)?;
        } else if session.ack_mode().is_manual() {
            if let Some(message) = &message {
                session.acknowledge(message)?;
            }
        }
        Ok(message)
    }

    /// The wait actually used for a receive: the configured timeout,
    /// tightened by the remaining deadline of the ambient unit of work when
    /// that is shorter.
    fn effective_wait(&self, acquired: &AcquiredSession) -> ReceiveWait {
        match acquired.remaining_wait() {
            Some(remaining) => self.receive_timeout.tightest(remaining),
            None => self.receive_timeout,
        }
    }

    // ------------------------------------------------------------------
    // Convert-and-send / receive-and-convert
    // ------------------------------------------------------------------

    /// Convert a value with the configured converter and send it to the
    /// default destination.
    pub fn convert_and_send<T: Any>(
        &self,
        ctx: &TransactionContext,
        value: &T,
    ) -> Result<(), MessagingError> {
        self.convert_and_send_with(ctx, value, Ok)
    }

    /// Convert and send to an explicit destination.
    pub fn convert_and_send_to<T: Any>(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
        value: &T,
    ) -> Result<(), MessagingError> {
        self.convert_and_send_to_with(ctx, destination, value, Ok)
    }

    /// Convert and send to a destination by name.
    pub fn convert_and_send_to_name<T: Any>(
        &self,
        ctx: &TransactionContext,
        name: &str,
        value: &T,
    ) -> Result<(), MessagingError> {
        let converter = self.required_converter()?;
        self.send_to_name(ctx, name, move |session| {
            Ok(converter.to_message(value as &dyn Any, session)?)
        })
    }

    /// Convert, post-process, then send to the default destination.
    ///
    /// The post-processor runs after conversion, inside the session scope,
    /// so it can still adjust message headers and properties before the send.
    pub fn convert_and_send_with<T, F>(
        &self,
        ctx: &TransactionContext,
        value: &T,
        post_process: F,
    ) -> Result<(), MessagingError>
    where
        T: Any,
        F: FnOnce(Message) -> Result<Message, MessagingError>,
    {
        let converter = self.required_converter()?;
        self.send(ctx, move |session| {
            let message = converter.to_message(value as &dyn Any, session)?;
            post_process(message)
        })
    }

    /// Post-processing variant of
    /// [`convert_and_send_to`](Self::convert_and_send_to).
    pub fn convert_and_send_to_with<T, F>(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
        value: &T,
        post_process: F,
    ) -> Result<(), MessagingError>
    where
        T: Any,
        F: FnOnce(Message) -> Result<Message, MessagingError>,
    {
        let converter = self.required_converter()?;
        self.send_to(ctx, destination, move |session| {
            let message = converter.to_message(value as &dyn Any, session)?;
            post_process(message)
        })
    }

    /// Receive from the default destination and convert the payload to `T`.
    ///
    /// `Ok(None)` on timeout, like [`receive`](Self::receive).
    pub fn receive_and_convert<T: Any>(
        &self,
        ctx: &TransactionContext,
    ) -> Result<Option<T>, MessagingError> {
        let converter = self.required_converter()?;
        let Some(message) = self.receive(ctx)? else {
            return Ok(None);
        };
        Self::downcast_payload(converter.from_message(&message)?)
    }

    /// Receive from an explicit destination and convert the payload to `T`.
    pub fn receive_and_convert_from<T: Any>(
        &self,
        ctx: &TransactionContext,
        destination: &Destination,
    ) -> Result<Option<T>, MessagingError> {
        let converter = self.required_converter()?;
        let Some(message) = self.receive_from(ctx, destination)? else {
            return Ok(None);
        };
        Self::downcast_payload(converter.from_message(&message)?)
    }

    /// Selector variant of [`receive_and_convert`](Self::receive_and_convert).
    pub fn receive_selected_and_convert<T: Any>(
        &self,
        ctx: &TransactionContext,
        selector: &str,
    ) -> Result<Option<T>, MessagingError> {
        let converter = self.required_converter()?;
        let Some(message) = self.receive_selected(ctx, selector)? else {
            return Ok(None);
        };
        Self::downcast_payload(converter.from_message(&message)?)
    }

    fn downcast_payload<T: Any>(payload: Box<dyn Any>) -> Result<Option<T>, MessagingError> {
        payload.downcast::<T>().map(|boxed| Some(*boxed)).map_err(|_| {
            MessagingError::Conversion(crate::converter::ConversionError::UnsupportedType(
                format!(
                    "converted payload is not a {}",
                    std::any::type_name::<T>()
                ),
            ))
        })
    }

    // ------------------------------------------------------------------
    // Shared plumbing
    // ------------------------------------------------------------------

    fn default_spec(&self) -> Result<&DestinationSpec, MessagingError> {
        self.default_destination.as_ref().ok_or_else(|| {
            MessagingError::Configuration("no default destination configured".to_string())
        })
    }

    fn required_converter(&self) -> Result<Arc<dyn MessageConverter>, MessagingError> {
        self.converter.clone().ok_or_else(|| {
            MessagingError::Configuration("no message converter configured".to_string())
        })
    }

    /// Resolution happens here, inside the session scope: a resolver may
    /// need the live session, so it is never invoked earlier.
    fn resolve_spec(
        &self,
        session: &dyn Session,
        spec: &DestinationSpec,
    ) -> Result<Destination, MessagingError> {
        match spec {
            DestinationSpec::Resolved(destination) => Ok(destination.clone()),
            DestinationSpec::Named(name) => {
                Ok(self.resolver.resolve(session, name, self.pub_sub_domain)?)
            }
        }
    }

    fn producer_options(&self) -> ProducerOptions {
        ProducerOptions {
            suppress_message_id: self.suppress_message_id,
            suppress_timestamp: self.suppress_timestamp,
        }
    }
}
