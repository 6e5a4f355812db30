//! Connection contracts consumed by the monitor.
//!
//! The monitor never talks to the network directly. It asks a
//! `RedisConnector` for two handles against the same sentinel: a
//! `PubSubClient` that pushes `PubSubReply` values onto a channel, and a
//! `SentinelClient` for request/response discovery calls.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::{ClusterName, Sentinel};

/// Transport tuning shared by both connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// TCP keep-alive idle time in seconds. Zero disables keep-alive.
    pub tcp_keepalive_secs: u32,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            tcp_keepalive_secs: 30,
        }
    }
}

/// Kind of a subscription frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// A published message on a subscribed channel.
    Message,
    /// A subscribe acknowledgement; the body carries the subscription count.
    Confirmation,
    /// A transport failure; `PubSubReply::error` is set.
    Error,
    /// Anything else the feed chose to forward (unsubscribe, pong).
    Other,
}

/// One inbound unit from the subscription feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubReply {
    pub channel: String,
    pub kind: ReplyKind,
    pub body: String,
    pub error: Option<String>,
}

impl PubSubReply {
    pub fn message(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            kind: ReplyKind::Message,
            body: body.into(),
            error: None,
        }
    }

    pub fn confirmation(channel: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            kind: ReplyKind::Confirmation,
            body: body.into(),
            error: None,
        }
    }

    pub fn error(channel: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            kind: ReplyKind::Error,
            body: String::new(),
            error: Some(error.into()),
        }
    }
}

/// Push-based subscription connection.
#[async_trait]
pub trait PubSubClient: Send {
    /// Subscribe to `topic`. Replies are delivered on the sink given at open.
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Request/response connection used for liveness and discovery.
#[async_trait]
pub trait SentinelClient: Send {
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Names of the clusters the sentinel monitors, in server order.
    async fn find_known_clusters(&mut self) -> Result<Vec<ClusterName>, TransportError>;

    /// Peer sentinels monitoring `cluster`, in server order.
    async fn find_connected_sentinels(
        &mut self,
        cluster: &str,
    ) -> Result<Vec<Sentinel>, TransportError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Factory for the two connections a monitor owns.
#[async_trait]
pub trait RedisConnector: Send + Sync {
    async fn open_pubsub(
        &self,
        location: &str,
        sink: mpsc::Sender<PubSubReply>,
        options: ConnectOptions,
    ) -> Result<Box<dyn PubSubClient>, TransportError>;

    async fn open_sentinel_client(
        &self,
        sentinel: &Sentinel,
        options: ConnectOptions,
    ) -> Result<Box<dyn SentinelClient>, TransportError>;
}
