use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::destination::Destination;
use crate::message::{Message, QosSettings};
use crate::provider::{Connection, ConnectionFactory, ProviderError};

use super::session::InMemoryConnection;

/// Shared broker state: destination queues plus the recording surface.
pub(super) struct BrokerState {
    queues: Mutex<HashMap<Destination, VecDeque<Message>>>,
    ops: Mutex<Vec<String>>,
    acked: Mutex<Vec<String>>,
    last_qos: Mutex<Option<QosSettings>>,
    pub(super) connections_created: AtomicUsize,
    pub(super) connections_closed: AtomicUsize,
    pub(super) sessions_created: AtomicUsize,
    pub(super) sessions_closed: AtomicUsize,
    pub(super) commits: AtomicUsize,
    pub(super) rollbacks: AtomicUsize,
    next_message_id: AtomicU64,
}

impl BrokerState {
    fn new() -> Self {
        BrokerState {
            queues: Mutex::new(HashMap::new()),
            ops: Mutex::new(Vec::new()),
            acked: Mutex::new(Vec::new()),
            last_qos: Mutex::new(None),
            connections_created: AtomicUsize::new(0),
            connections_closed: AtomicUsize::new(0),
            sessions_created: AtomicUsize::new(0),
            sessions_closed: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
            rollbacks: AtomicUsize::new(0),
            next_message_id: AtomicU64::new(1),
        }
    }

    pub(super) fn record(&self, op: impl Into<String>) {
        self.ops.lock().unwrap().push(op.into());
    }

    pub(super) fn record_ack(&self, message_id: &str) {
        self.acked.lock().unwrap().push(message_id.to_string());
    }

    pub(super) fn record_qos(&self, qos: &QosSettings) {
        *self.last_qos.lock().unwrap() = Some(*qos);
    }

    pub(super) fn next_message_id(&self) -> String {
        format!("mem-{}", self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(super) fn push(&self, destination: &Destination, message: Message) {
        self.queues
            .lock()
            .unwrap()
            .entry(destination.clone())
            .or_default()
            .push_back(message);
    }

    /// Remove and return the first queued message matching the selector.
    ///
    /// Selectors have the form `key=value` and match against message
    /// properties; non-matching messages stay queued.
    pub(super) fn pop_matching(
        &self,
        destination: &Destination,
        selector: Option<&str>,
    ) -> Option<Message> {
        let mut queues = self.queues.lock().unwrap();
        let queue = queues.get_mut(destination)?;
        let index = match selector {
            None => {
                if queue.is_empty() {
                    return None;
                }
                0
            }
            Some(selector) => {
                let (key, value) = selector.split_once('=')?;
                queue
                    .iter()
                    .position(|m| m.property(key.trim()) == Some(value.trim()))?
            }
        };
        queue.remove(index)
    }
}

/// In-memory broker for testing and single-process scenarios.
///
/// Implements [`ConnectionFactory`]; every connection, session, producer and
/// consumer created from it shares the same destination queues. Beyond moving
/// messages it records everything tests care about: an ordered operation log,
/// creation/close counters, commit/rollback counters, acknowledged message
/// ids and the QoS of the last explicit-QoS send.
///
/// Transacted sessions buffer sends until `commit`; `rollback` discards the
/// buffer. Consumers only see messages once their connection has been
/// started.
///
/// ## Example
///
/// ```
/// use mq_template::{Destination, InMemoryBroker, Message};
/// use mq_template::{AckMode, Connection, ConnectionFactory, Consumer, ReceiveWait, Session};
///
/// let broker = InMemoryBroker::new();
/// let orders = Destination::Queue("orders".to_string());
/// broker.enqueue(&orders, Message::text("hello"));
///
/// let connection = broker.create_connection().unwrap();
/// connection.start().unwrap();
/// let session = connection.create_session(false, AckMode::Auto).unwrap();
/// let consumer = session.create_consumer(&orders, Default::default()).unwrap();
///
/// let message = consumer.receive(ReceiveWait::NoWait).unwrap().unwrap();
/// assert_eq!(message.body_str(), Some("hello"));
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create an empty broker.
    pub fn new() -> Self {
        InMemoryBroker {
            state: Arc::new(BrokerState::new()),
        }
    }

    /// Deliver a message to a destination from outside any session: the
    /// test-double way to simulate another party producing.
    ///
    /// Assigns a broker message id when the message has none.
    pub fn enqueue(&self, destination: &Destination, message: Message) {
        let mut message = message;
        if message.id.is_none() {
            message.id = Some(self.state.next_message_id());
        }
        self.state.push(destination, message);
    }

    /// Number of messages currently queued on a destination.
    pub fn queue_depth(&self, destination: &Destination) -> usize {
        self.state
            .queues
            .lock()
            .unwrap()
            .get(destination)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// The ordered log of provider operations seen so far.
    pub fn operations(&self) -> Vec<String> {
        self.state.ops.lock().unwrap().clone()
    }

    /// Append an entry to the operation log.
    ///
    /// For collaborating test doubles (e.g. a recording destination
    /// resolver) that participate in call-sequence assertions.
    pub fn record(&self, entry: impl Into<String>) {
        self.state.record(entry);
    }

    pub fn connections_created(&self) -> usize {
        self.state.connections_created.load(Ordering::SeqCst)
    }

    pub fn connections_closed(&self) -> usize {
        self.state.connections_closed.load(Ordering::SeqCst)
    }

    pub fn sessions_created(&self) -> usize {
        self.state.sessions_created.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.state.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }

    /// Ids of explicitly acknowledged messages, in order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.state.acked.lock().unwrap().clone()
    }

    /// QoS parameters of the most recent explicit-QoS send, if any.
    pub fn last_qos(&self) -> Option<QosSettings> {
        *self.state.last_qos.lock().unwrap()
    }
}

impl ConnectionFactory for InMemoryBroker {
    fn create_connection(&self) -> Result<Arc<dyn Connection>, ProviderError> {
        self.state.connections_created.fetch_add(1, Ordering::SeqCst);
        self.state.record("create_connection");
        Ok(Arc::new(InMemoryConnection::new(Arc::clone(&self.state))))
    }
}
