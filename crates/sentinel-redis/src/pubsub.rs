//! Subscription feed over a dedicated RESP connection.
//!
//! A reader task decodes push frames and forwards them to the monitor's
//! sink as `PubSubReply` values. The first read or decode failure is
//! forwarded as an error reply and ends the reader.

use async_trait::async_trait;
use bytes::BytesMut;
use sentinel_monitor::{ConnectOptions, PubSubClient, PubSubReply, ReplyKind, TransportError};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::connection::{dial, read_value};
use crate::resp::{self, RespValue};

/// Pub/sub connection to one sentinel.
pub struct RedisPubSubClient {
    location: String,
    writer: Option<OwnedWriteHalf>,
    reader: Option<JoinHandle<()>>,
}

impl RedisPubSubClient {
    /// Connect and start forwarding frames to `sink`.
    pub async fn open(
        location: &str,
        sink: mpsc::Sender<PubSubReply>,
        options: ConnectOptions,
    ) -> Result<Self, TransportError> {
        let stream = dial(location, options).await?;
        let (read_half, write_half) = stream.into_split();
        let reader = tokio::spawn(forward_frames(read_half, sink));

        Ok(Self {
            location: location.to_string(),
            writer: Some(write_half),
            reader: Some(reader),
        })
    }
}

#[async_trait]
impl PubSubClient for RedisPubSubClient {
    async fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        writer
            .write_all(&resp::encode_command(&["SUBSCRIBE", topic]))
            .await?;
        debug!(location = %self.location, %topic, "subscribe sent");
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.shutdown().await;
            debug!(location = %self.location, "pubsub connection closed");
        }
    }
}

impl Drop for RedisPubSubClient {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

async fn forward_frames(mut reader: OwnedReadHalf, sink: mpsc::Sender<PubSubReply>) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut channel = String::new();

    loop {
        let reply = match read_value(&mut reader, &mut buf).await {
            Ok(value) => to_reply(value),
            Err(e) => {
                let _ = sink.send(PubSubReply::error(channel.clone(), e.to_string())).await;
                return;
            }
        };

        trace!(channel = %reply.channel, kind = ?reply.kind, "pubsub frame");
        if !reply.channel.is_empty() {
            channel = reply.channel.clone();
        }
        if sink.send(reply).await.is_err() {
            return;
        }
    }
}

/// Map one decoded frame to a reply.
pub fn to_reply(value: RespValue) -> PubSubReply {
    match value {
        RespValue::Array(items) => {
            let mut fields = items.iter().map(RespValue::as_text);
            let kind = fields.next().flatten().unwrap_or_default();
            let channel = fields.next().flatten().unwrap_or_default();
            let body = fields.next().flatten().unwrap_or_default();

            let kind = match kind.to_ascii_lowercase().as_str() {
                "message" => ReplyKind::Message,
                "subscribe" => ReplyKind::Confirmation,
                _ => ReplyKind::Other,
            };
            PubSubReply {
                channel,
                kind,
                body,
                error: None,
            }
        }
        RespValue::Error(message) => PubSubReply::error(String::new(), message),
        other => PubSubReply {
            channel: String::new(),
            kind: ReplyKind::Other,
            body: other.as_text().unwrap_or_default(),
            error: None,
        },
    }
}
