//! Domain types shared between the monitor and its consumers.
//!
//! A `Sentinel` identifies one failover coordinator. The event types are
//! what the monitor produces: master switches and connection
//! confirmations go to the topology channels, notifications go to the
//! observer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a replicated cluster as known to the sentinel network.
pub type ClusterName = String;

// ── Sentinel ───────────────────────────────────────────────────────

/// Network identity of a sentinel node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sentinel {
    pub host: String,
    pub port: u16,
}

impl Sentinel {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address in `host:port` form.
    pub fn location(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Topology events ────────────────────────────────────────────────

/// A cluster's primary moved from one address to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterSwitchedEvent {
    /// Cluster name as announced by the sentinel.
    pub name: ClusterName,
    pub old_master_ip: String,
    pub old_master_port: u16,
    pub new_master_ip: String,
    pub new_master_port: u16,
}

/// Emitted once the subscription to the switch-master topic is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub connected: bool,
}

// ── Notifications ──────────────────────────────────────────────────

/// Lifecycle facts delivered to the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelNotification {
    /// The sentinel answered a liveness ping.
    Ping(Sentinel),
    /// Full list of clusters this sentinel currently monitors.
    ClustersMonitored {
        sentinel: Sentinel,
        clusters: Vec<ClusterName>,
    },
    /// A peer sentinel was seen monitoring one of the clusters.
    Added(Sentinel),
    /// The monitor for this sentinel has shut down.
    Lost(Sentinel),
}

impl SentinelNotification {
    /// The sentinel this notification is about.
    pub fn sentinel(&self) -> &Sentinel {
        match self {
            Self::Ping(s) | Self::Added(s) | Self::Lost(s) => s,
            Self::ClustersMonitored { sentinel, .. } => sentinel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_location() {
        let s = Sentinel::new("10.0.0.5", 26379);
        assert_eq!(s.location(), "10.0.0.5:26379");
        assert_eq!(s.to_string(), "10.0.0.5:26379");
    }

    #[test]
    fn sentinel_deserializes_from_json() {
        let s: Sentinel = serde_json::from_str(r#"{"host":"sentinel-a","port":26379}"#).unwrap();
        assert_eq!(s, Sentinel::new("sentinel-a", 26379));
    }

    #[test]
    fn notification_sentinel_accessor() {
        let s = Sentinel::new("a", 1);
        let n = SentinelNotification::ClustersMonitored {
            sentinel: s.clone(),
            clusters: vec!["c1".into()],
        };
        assert_eq!(n.sentinel(), &s);
        assert_eq!(SentinelNotification::Lost(s.clone()).sentinel(), &s);
    }
}
