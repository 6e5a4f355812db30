//! sentinel-monitor — watches one sentinel and reports topology changes.
//!
//! A `Monitor` owns two connections to a single sentinel: a subscription
//! feed on `+switch-master` and a command client for liveness and
//! discovery. Once started it runs as a background task until the first
//! fatal condition or an explicit stop.
//!
//! # Architecture
//!
//! ```text
//! Monitor (one tokio task per sentinel)
//!   ├── PubSubClient ──► PubSubReply ──► interpret()
//!   │                                     ├── MasterSwitchedEvent ──► switch channel
//!   │                                     └── ConnectionEvent     ──► connection channel
//!   ├── SentinelClient (every MONITOR_PING_INTERVAL)
//!   │   ├── ping               ──► Observer: Ping
//!   │   ├── find_known_clusters ──► Observer: ClustersMonitored
//!   │   └── find_connected_sentinels ──► Observer: Added (per peer)
//!   └── shutdown ──► Observer: Lost, close both connections
//! ```
//!
//! # Failure policy
//!
//! No failure is retried inside the monitor. Whoever supervises the fleet
//! reacts to `SentinelNotification::Lost` and builds a fresh monitor.

pub mod connection;
pub mod error;
pub mod message;
pub mod monitor;
pub mod observer;
pub mod types;

pub use connection::{
    ConnectOptions, PubSubClient, PubSubReply, RedisConnector, ReplyKind, SentinelClient,
};
pub use error::{MonitorError, MonitorResult, ParseError, TransportError};
pub use message::{
    interpret, parse_switch_master, Interpretation, SUBSCRIBE_CONFIRMED, SWITCH_MASTER_TOPIC,
};
pub use monitor::{Monitor, MonitorHandle, ShutdownReason, MONITOR_PING_INTERVAL};
pub use observer::{Observer, SharedObserver};
pub use types::*;
