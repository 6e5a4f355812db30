//! TCP implementation of the monitor's connection factory.

use async_trait::async_trait;
use sentinel_monitor::{
    ConnectOptions, PubSubClient, PubSubReply, RedisConnector, Sentinel, SentinelClient,
    TransportError,
};
use tokio::sync::mpsc;

use crate::pubsub::RedisPubSubClient;
use crate::sentinel::RedisSentinelClient;

/// Opens plain TCP RESP connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl RedisConnector for TcpConnector {
    async fn open_pubsub(
        &self,
        location: &str,
        sink: mpsc::Sender<PubSubReply>,
        options: ConnectOptions,
    ) -> Result<Box<dyn PubSubClient>, TransportError> {
        let client = RedisPubSubClient::open(location, sink, options).await?;
        Ok(Box::new(client))
    }

    async fn open_sentinel_client(
        &self,
        sentinel: &Sentinel,
        options: ConnectOptions,
    ) -> Result<Box<dyn SentinelClient>, TransportError> {
        let client = RedisSentinelClient::open(sentinel, options).await?;
        Ok(Box::new(client))
    }
}
