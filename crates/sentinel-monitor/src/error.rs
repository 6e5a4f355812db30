//! Error types for the sentinel monitor.

use thiserror::Error;

/// Result type alias for monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors raised by the connection layer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out: {0}")]
    Timeout(&'static str),

    #[error("server error: {0}")]
    Server(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    Closed,
}

/// Errors from parsing a `+switch-master` body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),

    #[error("invalid port {0:?}")]
    Port(String),
}

/// Errors that terminate or prevent a monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("failed to connect to sentinel {location}: {source}")]
    Connect {
        location: String,
        #[source]
        source: TransportError,
    },

    #[error("failed to subscribe to {topic}: {source}")]
    Subscribe {
        topic: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("subscription error on {channel}: {message}")]
    Subscription { channel: String, message: String },

    #[error("unexpected subscription confirmation {0:?}")]
    Confirmation(String),

    #[error("malformed switch-master message {body:?}: {source}")]
    Parse {
        body: String,
        #[source]
        source: ParseError,
    },

    #[error("ping failed: {0}")]
    Ping(#[source] TransportError),

    #[error("cluster discovery failed: {0}")]
    Clusters(#[source] TransportError),

    #[error("peer discovery for {cluster} failed: {source}")]
    Peers {
        cluster: String,
        #[source]
        source: TransportError,
    },

    #[error("subscription feed closed")]
    FeedClosed,

    #[error("{0} consumer dropped")]
    ConsumerGone(&'static str),
}
