//! NotificationRouter: 按主题分发实时事件
//!
//! 主题固定三类：`kitchen:{restaurant_id}`、`cashier:{restaurant_id}`、`customer:{bill_id}`。
//! 只做尽力而为的在线推送，不持久化、不重放；断线重连后以数据库快照为准。
//!
//! ```text
//! Services (ingest / status / payment)
//!       │ DomainEvent
//!       ▼
//! NotificationRouter::dispatch ── event.topic()
//!   └── topics: Topic → TopicChannel
//!         ├── members: 当前订阅的连接 ID
//!         └── tx: broadcast::Sender<DomainEvent> (fan-out 到各个 WS 会话)
//!               │
//!               ▼
//!         WS session (recv → 推送；Lagged → 重新订阅 + 快照；drop → 退订)
//! ```

use dashmap::{DashMap, DashSet};
use shared::live::{DomainEvent, Topic};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Broadcast channel 容量默认值（可通过 LIVE_CHANNEL_CAPACITY 配置）
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("notification router is shutting down")]
    ShuttingDown,

    #[error("event for {event_topic} published on {topic}")]
    TopicMismatch { topic: Topic, event_topic: Topic },
}

/// 单个主题的订阅状态
struct TopicChannel {
    tx: broadcast::Sender<DomainEvent>,
    members: DashSet<Uuid>,
}

impl TopicChannel {
    fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            members: DashSet::new(),
        }
    }
}

/// Outcome of waiting on a subscription
#[derive(Debug)]
pub enum Delivery {
    Event(DomainEvent),
    /// Missed `skipped` events; caller should resend a snapshot
    Lagged(u64),
    Closed,
}

type TopicMap = Arc<DashMap<Topic, TopicChannel>>;

/// Remove `connection` from `topic`; the topic entry goes away with its last member
fn leave(topics: &TopicMap, topic: Topic, connection: Uuid) -> bool {
    let removed = topics
        .get(&topic)
        .is_some_and(|channel| channel.members.remove(&connection).is_some());
    topics.remove_if(&topic, |_, channel| channel.members.is_empty());
    removed
}

/// One connection's membership of one topic.
///
/// Dropping the subscription leaves the topic.
pub struct Subscription {
    topic: Topic,
    connection: Uuid,
    rx: broadcast::Receiver<DomainEvent>,
    topics: TopicMap,
}

impl Subscription {
    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn connection(&self) -> Uuid {
        self.connection
    }

    fn is_member(&self) -> bool {
        self.topics
            .get(&self.topic)
            .is_some_and(|channel| channel.members.contains(&self.connection))
    }

    /// Wait for the next event on this topic.
    ///
    /// After a `Lagged` result the receiver is already positioned at the newest event.
    /// Once the connection has been unsubscribed this returns `Closed`.
    pub async fn recv(&mut self) -> Delivery {
        if !self.is_member() {
            return Delivery::Closed;
        }
        match self.rx.recv().await {
            // 等待期间可能已退订
            Ok(_) if !self.is_member() => Delivery::Closed,
            Ok(event) => Delivery::Event(event),
            Err(RecvError::Lagged(skipped)) => {
                self.rx = self.rx.resubscribe();
                Delivery::Lagged(skipped)
            }
            Err(RecvError::Closed) => Delivery::Closed,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if leave(&self.topics, self.topic, self.connection) {
            tracing::debug!(topic = %self.topic, connection = %self.connection, "Live subscription dropped");
        }
    }
}

#[derive(Clone)]
pub struct NotificationRouter {
    topics: TopicMap,
    capacity: usize,
    shutdown: CancellationToken,
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl NotificationRouter {
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register `connection` as a member of `topic`
    pub fn subscribe(&self, topic: Topic, connection: Uuid) -> Subscription {
        let channel = self
            .topics
            .entry(topic)
            .or_insert_with(|| TopicChannel::new(self.capacity))
            .downgrade();
        channel.members.insert(connection);
        let rx = channel.tx.subscribe();

        tracing::debug!(%topic, %connection, "Live subscriber joined");
        Subscription {
            topic,
            connection,
            rx,
            topics: self.topics.clone(),
        }
    }

    /// Remove `connection` from `topic`.
    ///
    /// Its [`Subscription`] stops yielding events; the topic entry goes away with its last member.
    pub fn unsubscribe(&self, topic: Topic, connection: Uuid) {
        if leave(&self.topics, topic, connection) {
            tracing::debug!(%topic, %connection, "Live subscriber left");
        }
    }

    /// Deliver `event` to current members of `topic`.
    ///
    /// Returns the number of current members; zero subscribers means zero delivered and nothing queued.
    pub fn publish(&self, topic: Topic, event: DomainEvent) -> Result<usize, RouterError> {
        if self.shutdown.is_cancelled() {
            return Err(RouterError::ShuttingDown);
        }
        let event_topic = event.topic();
        if event_topic != topic {
            return Err(RouterError::TopicMismatch { topic, event_topic });
        }

        let Some(channel) = self.topics.get(&topic) else {
            return Ok(0);
        };
        let members = channel.members.len();
        if members == 0 {
            return Ok(0);
        }
        // 无接收者时 send 返回 Err，视为送达 0
        Ok(channel.tx.send(event).map_or(0, |_| members))
    }

    /// Route an event by its own topic
    pub fn dispatch(&self, event: DomainEvent) -> Result<usize, RouterError> {
        let topic = event.topic();
        let kind = event.kind();
        let delivered = self.publish(topic, event)?;
        tracing::debug!(%topic, kind, delivered, "Event dispatched");
        Ok(delivered)
    }

    /// Dispatch a batch, logging failures instead of returning them
    pub fn dispatch_all(&self, events: impl IntoIterator<Item = DomainEvent>) {
        for event in events {
            let topic = event.topic();
            let kind = event.kind();
            if let Err(e) = self.dispatch(event) {
                tracing::warn!(%topic, kind, error = %e, "Live event dispatch failed");
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topics
            .get(&topic)
            .map(|c| c.members.len())
            .unwrap_or(0)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Token cancelled when the process shuts down; live sessions select on it
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        tracing::info!(topics = self.topics.len(), "Notification router shutting down");
        self.shutdown.cancel();
    }
}
