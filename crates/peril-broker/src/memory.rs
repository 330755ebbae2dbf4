//! In-process broker with AMQP 0-9-1 semantics.
//!
//! The engine ([`BrokerState`]) is plain synchronous code held behind one
//! `tokio::sync::Mutex`; every channel operation takes the lock, mutates
//! state, and releases it without awaiting anything else. Deliveries are
//! pushed to consumers through unbounded mpsc channels, so a slow handler
//! never blocks the engine.
//!
//! What it models:
//! - direct / topic / fanout routing, plus the default (`""`) exchange
//!   that routes straight to the queue named by the routing key
//! - idempotent declarations and bindings; redeclaring with different
//!   parameters is a [`BrokerError::Conflict`]
//! - manual acknowledgment: ack, nack-with-requeue (back to the head of
//!   the queue, flagged `redelivered`), nack-without-requeue
//!   (dead-lettered through `x-dead-letter-exchange`, else dropped)
//! - closing a channel or connection returns its unsettled deliveries to
//!   their queues; auto-delete queues vanish with their last consumer
//! - channel exceptions close the channel that raised them
//! - [`MemoryBroker::restart`] keeps durable topology only

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::{Mutex, mpsc};

use crate::{
    Broker, BrokerChannel, BrokerError, Delivery, DeliveryStream, DeliveryTag,
    ExchangeSpec, QueueSpec, QueueStatus,
};

type ConnectionId = u64;
type ChannelId = u64;
type ConsumerId = u64;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Message {
    routing_key: String,
    payload: Vec<u8>,
    content_type: String,
    redelivered: bool,
}

struct ConsumerSlot {
    id: ConsumerId,
    channel: ChannelId,
    tag: String,
    /// The owning channel's closed flag, shared with every delivery.
    channel_closed: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<MemoryDelivery>,
}

/// A delivery handed to a consumer and not yet settled.
struct Outstanding {
    message: Message,
    consumer: ConsumerId,
}

struct QueueState {
    spec: QueueSpec,
    ready: VecDeque<Message>,
    unacked: HashMap<u64, Outstanding>,
    consumers: Vec<ConsumerSlot>,
    /// Round-robin position across `consumers`.
    cursor: usize,
}

impl QueueState {
    fn new(spec: QueueSpec) -> Self {
        Self {
            spec,
            ready: VecDeque::new(),
            unacked: HashMap::new(),
            consumers: Vec::new(),
            cursor: 0,
        }
    }

    fn status(&self) -> QueueStatus {
        QueueStatus {
            name: self.spec.name.clone(),
            message_count: self.ready.len() as u32,
            consumer_count: self.consumers.len() as u32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    queue: String,
    exchange: String,
    key: String,
}

struct ChannelEntry {
    connection: ConnectionId,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Clone, Copy)]
enum Settle {
    Ack,
    Requeue,
    Discard,
}

struct BrokerState {
    /// Back-reference handed to deliveries so they can settle themselves.
    this: Weak<Shared>,
    exchanges: HashMap<String, ExchangeSpec>,
    queues: HashMap<String, QueueState>,
    bindings: Vec<Binding>,
    connections: HashMap<ConnectionId, Arc<AtomicBool>>,
    channels: HashMap<ChannelId, ChannelEntry>,
    next_id: u64,
    next_tag: u64,
}

impl BrokerState {
    fn new(this: Weak<Shared>) -> Self {
        Self {
            this,
            exchanges: HashMap::new(),
            queues: HashMap::new(),
            bindings: Vec::new(),
            connections: HashMap::new(),
            channels: HashMap::new(),
            next_id: 0,
            next_tag: 0,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn open_connection(&mut self) -> (ConnectionId, Arc<AtomicBool>) {
        let id = self.next_id();
        let closed = Arc::new(AtomicBool::new(false));
        self.connections.insert(id, Arc::clone(&closed));
        (id, closed)
    }

    fn open_channel(
        &mut self,
        connection: ConnectionId,
    ) -> Result<(ChannelId, Arc<AtomicBool>), BrokerError> {
        if !self.connections.contains_key(&connection) {
            return Err(BrokerError::ConnectionClosed(
                "connection is closed".into(),
            ));
        }
        let id = self.next_id();
        let closed = Arc::new(AtomicBool::new(false));
        self.channels.insert(
            id,
            ChannelEntry {
                connection,
                closed: Arc::clone(&closed),
            },
        );
        Ok((id, closed))
    }

    fn close_channel(&mut self, channel: ChannelId) {
        if let Some(entry) = self.channels.remove(&channel) {
            entry.closed.store(true, Ordering::Release);
            self.drop_consumers(|slot| slot.channel == channel);
            tracing::debug!(channel, "memory channel closed");
        }
    }

    fn close_connection(&mut self, connection: ConnectionId) {
        if let Some(flag) = self.connections.remove(&connection) {
            flag.store(true, Ordering::Release);
        }
        let channels: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, entry)| entry.connection == connection)
            .map(|(id, _)| *id)
            .collect();
        for channel in channels {
            self.close_channel(channel);
        }
        tracing::debug!(connection, "memory connection closed");
    }

    fn declare_exchange(&mut self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        if spec.name.is_empty() {
            return Err(BrokerError::PreconditionFailed(
                "the default exchange cannot be declared".into(),
            ));
        }
        match self.exchanges.get(&spec.name) {
            Some(existing) if existing == spec => Ok(()),
            Some(existing) => Err(BrokerError::Conflict(format!(
                "exchange {} exists as {} (durable: {}), requested {} (durable: {})",
                spec.name, existing.kind, existing.durable, spec.kind, spec.durable
            ))),
            None => {
                self.exchanges.insert(spec.name.clone(), spec.clone());
                Ok(())
            }
        }
    }

    fn check_exchange(&self, name: &str) -> Result<(), BrokerError> {
        if name.is_empty() || self.exchanges.contains_key(name) {
            Ok(())
        } else {
            Err(BrokerError::NotFound(format!("exchange {name}")))
        }
    }

    fn check_queue(&self, name: &str) -> Result<QueueStatus, BrokerError> {
        self.queues
            .get(name)
            .map(QueueState::status)
            .ok_or_else(|| BrokerError::NotFound(format!("queue {name}")))
    }

    fn declare_queue(&mut self, spec: &QueueSpec) -> Result<QueueStatus, BrokerError> {
        if spec.name.is_empty() {
            return Err(BrokerError::PreconditionFailed(
                "queue name must not be empty".into(),
            ));
        }
        match self.queues.get(&spec.name) {
            Some(existing) if existing.spec == *spec => Ok(existing.status()),
            Some(existing) => Err(BrokerError::Conflict(format!(
                "queue {} exists with {:?}, requested {:?}",
                spec.name, existing.spec, spec
            ))),
            None => {
                let queue = QueueState::new(spec.clone());
                let status = queue.status();
                self.queues.insert(spec.name.clone(), queue);
                Ok(status)
            }
        }
    }

    fn bind_queue(
        &mut self,
        queue: &str,
        exchange: &str,
        key: &str,
    ) -> Result<(), BrokerError> {
        if exchange.is_empty() {
            return Err(BrokerError::PreconditionFailed(
                "queues cannot be bound to the default exchange".into(),
            ));
        }
        if !self.queues.contains_key(queue) {
            return Err(BrokerError::NotFound(format!("queue {queue}")));
        }
        self.check_exchange(exchange)?;

        let binding = Binding {
            queue: queue.to_string(),
            exchange: exchange.to_string(),
            key: key.to_string(),
        };
        if !self.bindings.contains(&binding) {
            self.bindings.push(binding);
        }
        Ok(())
    }

    fn delete_queue(
        &mut self,
        name: &str,
        if_unused: bool,
        if_empty: bool,
    ) -> Result<u32, BrokerError> {
        let Some(queue) = self.queues.get(name) else {
            return Ok(0);
        };
        if if_unused && !queue.consumers.is_empty() {
            return Err(BrokerError::PreconditionFailed(format!(
                "queue {name} has consumers"
            )));
        }
        if if_empty && !queue.ready.is_empty() {
            return Err(BrokerError::PreconditionFailed(format!(
                "queue {name} is not empty"
            )));
        }
        let dropped = queue.ready.len() as u32;
        self.remove_queue(name);
        Ok(dropped)
    }

    fn remove_queue(&mut self, name: &str) {
        // Dropping the queue drops its consumer senders, which ends their
        // delivery streams.
        self.queues.remove(name);
        self.bindings.retain(|b| b.queue != name);
        tracing::debug!(queue = name, "memory queue deleted");
    }

    fn publish(
        &mut self,
        exchange: &str,
        routing_key: &str,
        message: Message,
    ) -> Result<usize, BrokerError> {
        let targets: Vec<String> = if exchange.is_empty() {
            self.queues
                .contains_key(routing_key)
                .then(|| routing_key.to_string())
                .into_iter()
                .collect()
        } else {
            let spec = self
                .exchanges
                .get(exchange)
                .ok_or_else(|| BrokerError::NotFound(format!("exchange {exchange}")))?;
            let mut targets: Vec<String> = self
                .bindings
                .iter()
                .filter(|b| b.exchange == exchange && spec.kind.routes(&b.key, routing_key))
                .map(|b| b.queue.clone())
                .collect();
            targets.sort();
            targets.dedup();
            targets
        };

        if targets.is_empty() {
            tracing::debug!(exchange, routing_key, "message unroutable, dropped");
        }
        for name in &targets {
            if let Some(queue) = self.queues.get_mut(name) {
                queue.ready.push_back(message.clone());
            }
            self.dispatch(name);
        }
        Ok(targets.len())
    }

    fn consume(
        &mut self,
        queue_name: &str,
        channel: ChannelId,
        tag: &str,
    ) -> Result<(ConsumerId, mpsc::UnboundedReceiver<MemoryDelivery>), BrokerError> {
        let channel_closed = self
            .channels
            .get(&channel)
            .map(|entry| Arc::clone(&entry.closed))
            .ok_or(BrokerError::ChannelClosed)?;
        if !self.queues.contains_key(queue_name) {
            return Err(BrokerError::NotFound(format!("queue {queue_name}")));
        }

        let id = self.next_id();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(queue) = self.queues.get_mut(queue_name) {
            queue.consumers.push(ConsumerSlot {
                id,
                channel,
                tag: tag.to_string(),
                channel_closed,
                tx,
            });
        }
        tracing::debug!(queue = queue_name, consumer = tag, "memory consumer started");
        self.dispatch(queue_name);
        Ok((id, rx))
    }

    /// Pushes ready messages to the queue's consumers, round-robin.
    fn dispatch(&mut self, queue_name: &str) {
        let Some(queue) = self.queues.get_mut(queue_name) else {
            return;
        };

        let mut lost_consumer = false;
        while !queue.consumers.is_empty() {
            let Some(message) = queue.ready.pop_front() else {
                break;
            };
            let slot = &queue.consumers[queue.cursor % queue.consumers.len()];
            queue.cursor = queue.cursor.wrapping_add(1);

            self.next_tag += 1;
            let tag = self.next_tag;
            let delivery = MemoryDelivery {
                tag,
                queue: queue_name.to_string(),
                payload: message.payload.clone(),
                routing_key: message.routing_key.clone(),
                content_type: message.content_type.clone(),
                redelivered: message.redelivered,
                channel_closed: Arc::clone(&slot.channel_closed),
                shared: self.this.clone(),
            };

            let consumer = slot.id;
            if slot.tx.send(delivery).is_ok() {
                queue.unacked.insert(tag, Outstanding { message, consumer });
            } else {
                // Receiver is gone; put the message back and reap below.
                queue.ready.push_front(message);
                lost_consumer = true;
                break;
            }
        }

        if lost_consumer {
            self.drop_consumers(|slot| slot.tx.is_closed());
        }
    }

    /// Removes consumers matching `gone`, returns their unsettled deliveries
    /// to the head of their queues, and deletes auto-delete queues left
    /// without consumers.
    fn drop_consumers(&mut self, gone: impl Fn(&ConsumerSlot) -> bool) {
        let mut emptied = Vec::new();
        let mut touched = Vec::new();

        for (name, queue) in self.queues.iter_mut() {
            let removed: Vec<ConsumerId> = queue
                .consumers
                .iter()
                .filter(|slot| gone(slot))
                .map(|slot| slot.id)
                .collect();
            if removed.is_empty() {
                continue;
            }
            for slot in queue.consumers.iter().filter(|s| removed.contains(&s.id)) {
                tracing::debug!(queue = %name, consumer = %slot.tag, "memory consumer removed");
            }
            queue.consumers.retain(|slot| !removed.contains(&slot.id));

            let mut tags: Vec<u64> = queue
                .unacked
                .iter()
                .filter(|(_, outstanding)| removed.contains(&outstanding.consumer))
                .map(|(tag, _)| *tag)
                .collect();
            tags.sort_unstable();
            // Reverse so the oldest delivery ends up at the very front.
            for tag in tags.into_iter().rev() {
                if let Some(outstanding) = queue.unacked.remove(&tag) {
                    let mut message = outstanding.message;
                    message.redelivered = true;
                    queue.ready.push_front(message);
                }
            }

            if queue.consumers.is_empty() && queue.spec.auto_delete {
                emptied.push(name.clone());
            } else {
                touched.push(name.clone());
            }
        }

        for name in emptied {
            self.remove_queue(&name);
        }
        for name in touched {
            self.dispatch(&name);
        }
    }

    fn settle(&mut self, queue_name: &str, tag: u64, settle: Settle) -> Result<(), BrokerError> {
        let queue = self
            .queues
            .get_mut(queue_name)
            .ok_or(BrokerError::UnknownDeliveryTag(tag))?;
        let outstanding = queue
            .unacked
            .remove(&tag)
            .ok_or(BrokerError::UnknownDeliveryTag(tag))?;

        match settle {
            Settle::Ack => {}
            Settle::Requeue => {
                let mut message = outstanding.message;
                message.redelivered = true;
                queue.ready.push_front(message);
                self.dispatch(queue_name);
            }
            Settle::Discard => {
                if let Some(dlx) = queue.spec.dead_letter_exchange.clone() {
                    self.dead_letter(&dlx, queue_name, outstanding.message);
                }
            }
        }
        Ok(())
    }

    fn dead_letter(&mut self, exchange: &str, from_queue: &str, mut message: Message) {
        message.redelivered = false;
        let routing_key = message.routing_key.clone();
        match self.publish(exchange, &routing_key, message) {
            Ok(routed) => {
                tracing::debug!(queue = from_queue, exchange, routed, "message dead-lettered");
            }
            Err(e) => {
                // Missing dead-letter exchange: the broker drops the message.
                tracing::debug!(queue = from_queue, exchange, error = %e, "dead-letter target missing, dropped");
            }
        }
    }

    fn restart(&mut self) {
        let connections: Vec<ConnectionId> = self.connections.keys().copied().collect();
        for connection in connections {
            self.close_connection(connection);
        }
        self.exchanges.retain(|_, spec| spec.durable);
        self.queues.retain(|_, queue| queue.spec.durable);
        // Published messages are not persistent, so even durable queues
        // come back empty.
        for queue in self.queues.values_mut() {
            queue.ready.clear();
            queue.unacked.clear();
        }
        let (exchanges, queues) = (&self.exchanges, &self.queues);
        self.bindings
            .retain(|b| exchanges.contains_key(&b.exchange) && queues.contains_key(&b.queue));
        tracing::info!("memory broker restarted");
    }
}

struct Shared {
    state: Mutex<BrokerState>,
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// One connection to an in-process broker.
///
/// [`MemoryBroker::new`] creates a fresh broker and a first connection to
/// it; [`connect`](Self::connect) opens further connections to the same
/// broker, which is how tests model several processes.
pub struct MemoryBroker {
    shared: Arc<Shared>,
    connection: ConnectionId,
    closed: Arc<AtomicBool>,
}

impl MemoryBroker {
    /// Creates an empty broker and connects to it.
    pub fn new() -> Self {
        let mut first = (0, Arc::new(AtomicBool::new(false)));
        let shared = Arc::new_cyclic(|this| {
            let mut state = BrokerState::new(this.clone());
            first = state.open_connection();
            Shared {
                state: Mutex::new(state),
            }
        });
        let (connection, closed) = first;
        Self {
            shared,
            connection,
            closed,
        }
    }

    /// Opens another connection to the same broker.
    pub async fn connect(&self) -> MemoryBroker {
        let (connection, closed) = self.shared.state.lock().await.open_connection();
        MemoryBroker {
            shared: Arc::clone(&self.shared),
            connection,
            closed,
        }
    }

    /// Simulates a broker restart: every connection is dropped, only
    /// durable exchanges, durable queues and the bindings between them
    /// survive, and queued messages are lost.
    pub async fn restart(&self) {
        self.shared.state.lock().await.restart();
    }

    /// Returns `true` if this connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn exchange_exists(&self, name: &str) -> bool {
        self.shared.state.lock().await.exchanges.contains_key(name)
    }

    pub async fn queue_exists(&self, name: &str) -> bool {
        self.shared.state.lock().await.queues.contains_key(name)
    }

    /// The parameters a queue was declared with.
    pub async fn queue_spec(&self, name: &str) -> Option<QueueSpec> {
        let state = self.shared.state.lock().await;
        state.queues.get(name).map(|q| q.spec.clone())
    }

    /// Messages waiting in `queue` that have not been handed to a consumer.
    pub async fn ready_count(&self, queue: &str) -> Option<usize> {
        let state = self.shared.state.lock().await;
        state.queues.get(queue).map(|q| q.ready.len())
    }

    /// Messages delivered from `queue` and not yet settled.
    pub async fn unacked_count(&self, queue: &str) -> Option<usize> {
        let state = self.shared.state.lock().await;
        state.queues.get(queue).map(|q| q.unacked.len())
    }

    pub async fn consumer_count(&self, queue: &str) -> Option<usize> {
        let state = self.shared.state.lock().await;
        state.queues.get(queue).map(|q| q.consumers.len())
    }

    /// `(exchange, routing_key)` pairs `queue` is bound with.
    pub async fn bindings(&self, queue: &str) -> Vec<(String, String)> {
        let state = self.shared.state.lock().await;
        state
            .bindings
            .iter()
            .filter(|b| b.queue == queue)
            .map(|b| (b.exchange.clone(), b.key.clone()))
            .collect()
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker for MemoryBroker {
    type Channel = MemoryChannel;

    async fn open_channel(&self) -> Result<Self::Channel, BrokerError> {
        let (id, closed) = self.shared.state.lock().await.open_channel(self.connection)?;
        Ok(MemoryChannel {
            id,
            closed,
            connection_closed: Arc::clone(&self.closed),
            shared: Arc::clone(&self.shared),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        self.shared.state.lock().await.close_connection(self.connection);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryChannel
// ---------------------------------------------------------------------------

/// A channel on a [`MemoryBroker`] connection.
#[derive(Clone)]
pub struct MemoryChannel {
    id: ChannelId,
    closed: Arc<AtomicBool>,
    connection_closed: Arc<AtomicBool>,
    shared: Arc<Shared>,
}

impl MemoryChannel {
    /// Returns `true` once this channel is closed, including by a channel
    /// exception or by its connection closing.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Runs `op` against the engine. A channel exception closes this
    /// channel, as it would on a real broker.
    async fn run<T>(
        &self,
        op: impl FnOnce(&mut BrokerState) -> Result<T, BrokerError>,
    ) -> Result<T, BrokerError> {
        if self.connection_closed.load(Ordering::Acquire) {
            return Err(BrokerError::ConnectionClosed("connection is closed".into()));
        }
        if self.is_closed() {
            return Err(BrokerError::ChannelClosed);
        }
        let mut state = self.shared.state.lock().await;
        let result = op(&mut *state);
        if let Err(e) = &result {
            if e.is_channel_exception() {
                tracing::debug!(channel = self.id, error = %e, "channel exception");
                state.close_channel(self.id);
            }
        }
        result
    }
}

impl BrokerChannel for MemoryChannel {
    type Consumer = MemoryConsumer;

    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BrokerError> {
        self.run(|state| state.declare_exchange(spec)).await
    }

    async fn check_exchange(&self, name: &str) -> Result<(), BrokerError> {
        self.run(|state| state.check_exchange(name)).await
    }

    async fn check_queue(&self, name: &str) -> Result<QueueStatus, BrokerError> {
        self.run(|state| state.check_queue(name)).await
    }

    async fn declare_queue(&self, spec: &QueueSpec) -> Result<QueueStatus, BrokerError> {
        self.run(|state| state.declare_queue(spec)).await
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        self.run(|state| state.bind_queue(queue, exchange, routing_key))
            .await
    }

    async fn delete_queue(
        &self,
        queue: &str,
        if_unused: bool,
        if_empty: bool,
    ) -> Result<u32, BrokerError> {
        self.run(|state| state.delete_queue(queue, if_unused, if_empty))
            .await
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        content_type: &str,
    ) -> Result<(), BrokerError> {
        let message = Message {
            routing_key: routing_key.to_string(),
            payload: payload.to_vec(),
            content_type: content_type.to_string(),
            redelivered: false,
        };
        self.run(|state| state.publish(exchange, routing_key, message))
            .await
            .map(|_| ())
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<Self::Consumer, BrokerError> {
        let channel = self.id;
        let (id, rx) = self
            .run(|state| state.consume(queue, channel, consumer_tag))
            .await?;
        Ok(MemoryConsumer {
            id,
            rx,
            channel_closed: Arc::clone(&self.closed),
            shared: Arc::downgrade(&self.shared),
        })
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if self.connection_closed.load(Ordering::Acquire) {
            return Err(BrokerError::ConnectionClosed("connection is closed".into()));
        }
        self.shared.state.lock().await.close_channel(self.id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryConsumer
// ---------------------------------------------------------------------------

/// Push-based delivery stream from one [`MemoryBroker`] queue.
///
/// Dropping the consumer cancels it; its unsettled deliveries return to
/// the queue.
pub struct MemoryConsumer {
    id: ConsumerId,
    rx: mpsc::UnboundedReceiver<MemoryDelivery>,
    channel_closed: Arc<AtomicBool>,
    shared: Weak<Shared>,
}

impl DeliveryStream for MemoryConsumer {
    type Delivery = MemoryDelivery;

    async fn recv(&mut self) -> Result<Option<Self::Delivery>, BrokerError> {
        if self.channel_closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        let delivery = self.rx.recv().await;
        // A delivery still buffered when the channel closed has already
        // been returned to its queue.
        if self.channel_closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(delivery)
    }
}

impl Drop for MemoryConsumer {
    fn drop(&mut self) {
        // `Drop` is synchronous, so cancellation runs as a fire-and-forget
        // task. Without a runtime the slot is reaped on the next dispatch.
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let id = self.id;
        runtime.spawn(async move {
            shared.state.lock().await.drop_consumers(|slot| slot.id == id);
        });
    }
}

// ---------------------------------------------------------------------------
// MemoryDelivery
// ---------------------------------------------------------------------------

/// One message pushed by a [`MemoryBroker`] queue.
#[derive(Debug)]
pub struct MemoryDelivery {
    tag: u64,
    queue: String,
    payload: Vec<u8>,
    routing_key: String,
    content_type: String,
    redelivered: bool,
    channel_closed: Arc<AtomicBool>,
    shared: Weak<Shared>,
}

impl MemoryDelivery {
    /// The queue this delivery came from.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    async fn settle(self, settle: Settle) -> Result<(), BrokerError> {
        if self.channel_closed.load(Ordering::Acquire) {
            return Err(BrokerError::ChannelClosed);
        }
        let shared = self
            .shared
            .upgrade()
            .ok_or_else(|| BrokerError::ConnectionClosed("broker dropped".into()))?;
        let mut state = shared.state.lock().await;
        state.settle(&self.queue, self.tag, settle)
    }
}

impl Delivery for MemoryDelivery {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn routing_key(&self) -> &str {
        &self.routing_key
    }

    fn delivery_tag(&self) -> DeliveryTag {
        DeliveryTag::new(self.tag)
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(self) -> Result<(), BrokerError> {
        self.settle(Settle::Ack).await
    }

    async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        let settle = if requeue { Settle::Requeue } else { Settle::Discard };
        self.settle(settle).await
    }
}
