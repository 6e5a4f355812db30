//! sentinel-redis — RESP transport for the sentinel monitor.
//!
//! Implements the connection contracts from `sentinel-monitor` over
//! tokio TCP streams:
//!
//! - `RedisPubSubClient`: dedicated subscription connection with a reader
//!   task that forwards push frames as `PubSubReply` values.
//! - `RedisSentinelClient`: `PING`, `SENTINEL MASTERS` and
//!   `SENTINEL SENTINELS <name>` over a request/response connection.
//! - `TcpConnector`: the `RedisConnector` factory handing out both.
//!
//! Both connections apply TCP keep-alive from `ConnectOptions`.

pub mod connection;
pub mod connector;
pub mod pubsub;
pub mod resp;
pub mod sentinel;

pub use connector::TcpConnector;
pub use pubsub::RedisPubSubClient;
pub use resp::{RespError, RespValue};
pub use sentinel::RedisSentinelClient;
