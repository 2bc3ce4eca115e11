use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::destination::Destination;
use crate::message::{Message, QosSettings};
use crate::provider::{
    AckMode, Connection, Consumer, ConsumerOptions, Producer, ProducerOptions, ProviderError,
    ReceiveWait, Session,
};

use super::broker::BrokerState;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

struct ConnectionShared {
    state: Arc<BrokerState>,
    started: AtomicBool,
    closed: AtomicBool,
}

pub(super) struct InMemoryConnection {
    shared: Arc<ConnectionShared>,
}

impl InMemoryConnection {
    pub(super) fn new(state: Arc<BrokerState>) -> Self {
        InMemoryConnection {
            shared: Arc::new(ConnectionShared {
                state,
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }
}

impl Connection for InMemoryConnection {
    fn create_session(
        &self,
        transacted: bool,
        ack_mode: AckMode,
    ) -> Result<Arc<dyn Session>, ProviderError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Closed("connection".to_string()));
        }
        self.shared
            .state
            .sessions_created
            .fetch_add(1, Ordering::SeqCst);
        self.shared.state.record("create_session");
        Ok(Arc::new(InMemorySession {
            shared: Arc::new(SessionShared {
                connection: Arc::clone(&self.shared),
                transacted,
                ack_mode,
                buffer: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        }))
    }

    fn start(&self) -> Result<(), ProviderError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Closed("connection".to_string()));
        }
        self.shared.state.record("start_connection");
        self.shared.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<(), ProviderError> {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.shared
                .state
                .connections_closed
                .fetch_add(1, Ordering::SeqCst);
            self.shared.state.record("close_connection");
        }
        Ok(())
    }
}

struct SessionShared {
    connection: Arc<ConnectionShared>,
    transacted: bool,
    ack_mode: AckMode,
    /// Sends buffered until commit (transacted sessions only).
    buffer: Mutex<Vec<(Destination, Message)>>,
    closed: AtomicBool,
}

impl SessionShared {
    fn state(&self) -> &BrokerState {
        &self.connection.state
    }

    fn ensure_open(&self) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ProviderError::Closed("session".to_string()))
        } else {
            Ok(())
        }
    }
}

pub(super) struct InMemorySession {
    shared: Arc<SessionShared>,
}

impl Session for InMemorySession {
    fn create_producer(
        &self,
        destination: &Destination,
        options: ProducerOptions,
    ) -> Result<Box<dyn Producer>, ProviderError> {
        self.shared.ensure_open()?;
        self.shared.state().record("create_producer");
        Ok(Box::new(InMemoryProducer {
            shared: Arc::clone(&self.shared),
            destination: destination.clone(),
            options,
            closed: AtomicBool::new(false),
        }))
    }

    fn create_consumer(
        &self,
        destination: &Destination,
        options: ConsumerOptions,
    ) -> Result<Box<dyn Consumer>, ProviderError> {
        self.shared.ensure_open()?;
        if options.no_local && !destination.is_topic() {
            return Err(ProviderError::IllegalState(
                "no-local is only valid for topic consumers".to_string(),
            ));
        }
        self.shared.state().record(if options.no_local {
            "create_consumer:no_local"
        } else {
            "create_consumer"
        });
        Ok(Box::new(InMemoryConsumer {
            shared: Arc::clone(&self.shared),
            destination: destination.clone(),
            selector: options.selector,
            closed: AtomicBool::new(false),
        }))
    }

    fn transacted(&self) -> bool {
        self.shared.transacted
    }

    fn ack_mode(&self) -> AckMode {
        self.shared.ack_mode
    }

    fn commit(&self) -> Result<(), ProviderError> {
        self.shared.ensure_open()?;
        if !self.shared.transacted {
            return Err(ProviderError::IllegalState(
                "commit on a non-transacted session".to_string(),
            ));
        }
        let buffered: Vec<_> = self.shared.buffer.lock().unwrap().drain(..).collect();
        for (destination, message) in buffered {
            self.shared.state().push(&destination, message);
        }
        self.shared.state().commits.fetch_add(1, Ordering::SeqCst);
        self.shared.state().record("commit");
        Ok(())
    }

    fn rollback(&self) -> Result<(), ProviderError> {
        self.shared.ensure_open()?;
        if !self.shared.transacted {
            return Err(ProviderError::IllegalState(
                "rollback on a non-transacted session".to_string(),
            ));
        }
        self.shared.buffer.lock().unwrap().clear();
        self.shared.state().rollbacks.fetch_add(1, Ordering::SeqCst);
        self.shared.state().record("rollback");
        Ok(())
    }

    fn acknowledge(&self, message: &Message) -> Result<(), ProviderError> {
        self.shared.ensure_open()?;
        if self.shared.transacted {
            return Err(ProviderError::IllegalState(
                "acknowledge on a transacted session".to_string(),
            ));
        }
        let id = message.id.as_deref().unwrap_or("<unidentified>");
        self.shared.state().record_ack(id);
        self.shared.state().record("acknowledge");
        Ok(())
    }

    fn close(&self) -> Result<(), ProviderError> {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            // Uncommitted transactional work dies with the session.
            self.shared.buffer.lock().unwrap().clear();
            self.shared
                .state()
                .sessions_closed
                .fetch_add(1, Ordering::SeqCst);
            self.shared.state().record("close_session");
        }
        Ok(())
    }
}

struct InMemoryProducer {
    shared: Arc<SessionShared>,
    destination: Destination,
    options: ProducerOptions,
    closed: AtomicBool,
}

impl InMemoryProducer {
    fn stamp(&self, message: &Message) -> Message {
        let mut stamped = message.clone();
        if stamped.id.is_none() && !self.options.suppress_message_id {
            stamped.id = Some(self.shared.state().next_message_id());
        }
        if stamped.timestamp.is_none() && !self.options.suppress_timestamp {
            stamped.timestamp = Some(now_millis());
        }
        stamped
    }

    fn deliver(&self, message: Message) -> Result<(), ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Closed("producer".to_string()));
        }
        self.shared.ensure_open()?;
        if self.shared.transacted {
            self.shared
                .buffer
                .lock()
                .unwrap()
                .push((self.destination.clone(), message));
        } else {
            self.shared.state().push(&self.destination, message);
        }
        Ok(())
    }
}

impl Producer for InMemoryProducer {
    fn send(&self, message: &Message) -> Result<(), ProviderError> {
        let stamped = self.stamp(message);
        self.shared.state().record(format!(
            "send:{}",
            stamped.body_str().unwrap_or("<binary>")
        ));
        self.deliver(stamped)
    }

    fn send_with(&self, message: &Message, qos: &QosSettings) -> Result<(), ProviderError> {
        let stamped = self.stamp(message);
        self.shared.state().record_qos(qos);
        self.shared.state().record(format!(
            "send_qos:{}:priority={}",
            stamped.body_str().unwrap_or("<binary>"),
            qos.priority
        ));
        self.deliver(stamped)
    }

    fn close(&self) -> Result<(), ProviderError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.state().record("close_producer");
        }
        Ok(())
    }
}

struct InMemoryConsumer {
    shared: Arc<SessionShared>,
    destination: Destination,
    selector: Option<String>,
    closed: AtomicBool,
}

impl InMemoryConsumer {
    fn try_receive(&self) -> Option<Message> {
        // Delivery only happens on a started connection.
        if !self.shared.connection.started.load(Ordering::SeqCst) {
            return None;
        }
        self.shared
            .state()
            .pop_matching(&self.destination, self.selector.as_deref())
    }
}

impl Consumer for InMemoryConsumer {
    fn receive(&self, wait: ReceiveWait) -> Result<Option<Message>, ProviderError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ProviderError::Closed("consumer".to_string()));
        }
        self.shared.ensure_open()?;

        let started = Instant::now();
        loop {
            if let Some(message) = self.try_receive() {
                self.shared.state().record(format!(
                    "receive:{}",
                    message.id.as_deref().unwrap_or("<unidentified>")
                ));
                return Ok(Some(message));
            }
            match wait {
                ReceiveWait::NoWait => return Ok(None),
                ReceiveWait::Timeout(timeout) => {
                    if started.elapsed() >= timeout {
                        return Ok(None);
                    }
                }
                ReceiveWait::Indefinite => {}
            }
            // Small sleep to avoid busy-waiting
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn close(&self) -> Result<(), ProviderError> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.shared.state().record("close_consumer");
        }
        Ok(())
    }
}
