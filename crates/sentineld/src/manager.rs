//! Topology manager — supervises one monitor per known sentinel.
//!
//! The manager is the observer every monitor reports to. It keeps a view
//! of the sentinel fleet and its clusters, starts monitors for seeds and
//! newly discovered peers, and re-creates a monitor after its sentinel is
//! lost or fails to connect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use sentinel_monitor::{
    ClusterName, ConnectOptions, ConnectionEvent, MasterSwitchedEvent, Monitor, MonitorError,
    MonitorHandle, RedisConnector, Sentinel, SentinelNotification, SharedObserver,
};

/// Lifecycle of one tracked sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelStatus {
    /// A monitor is being created.
    Connecting,
    /// The monitor is running and the last ping succeeded.
    Monitoring,
    /// The monitor shut down; a restart is pending.
    Lost,
}

#[derive(Debug, Clone)]
pub struct SentinelRecord {
    pub status: SentinelStatus,
    pub clusters: Vec<ClusterName>,
    pub last_ping: Option<Instant>,
}

/// What the manager should do after a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Start(Sentinel),
    Restart(Sentinel),
}

/// Bookkeeping view of the sentinel fleet.
#[derive(Debug, Default)]
pub struct Topology {
    sentinels: HashMap<Sentinel, SentinelRecord>,
}

impl Topology {
    /// Start tracking `sentinel`. Returns false if it was already known.
    pub fn track(&mut self, sentinel: &Sentinel) -> bool {
        if self.sentinels.contains_key(sentinel) {
            return false;
        }
        self.sentinels.insert(
            sentinel.clone(),
            SentinelRecord {
                status: SentinelStatus::Connecting,
                clusters: Vec::new(),
                last_ping: None,
            },
        );
        true
    }

    pub fn apply(&mut self, notification: &SentinelNotification) -> Action {
        match notification {
            SentinelNotification::Ping(s) => {
                if let Some(record) = self.sentinels.get_mut(s) {
                    record.status = SentinelStatus::Monitoring;
                    record.last_ping = Some(Instant::now());
                }
                Action::None
            }
            SentinelNotification::ClustersMonitored { sentinel, clusters } => {
                if let Some(record) = self.sentinels.get_mut(sentinel) {
                    record.clusters = clusters.clone();
                }
                Action::None
            }
            SentinelNotification::Added(s) => {
                if self.track(s) {
                    Action::Start(s.clone())
                } else {
                    Action::None
                }
            }
            SentinelNotification::Lost(s) => match self.sentinels.get_mut(s) {
                Some(record) => {
                    record.status = SentinelStatus::Lost;
                    record.clusters.clear();
                    Action::Restart(s.clone())
                }
                None => Action::None,
            },
        }
    }

    /// A monitor could not be created; it will be retried.
    pub fn mark_lost(&mut self, sentinel: &Sentinel) {
        if let Some(record) = self.sentinels.get_mut(sentinel) {
            record.status = SentinelStatus::Lost;
        }
    }

    pub fn last_ping(&self, sentinel: &Sentinel) -> Option<Instant> {
        self.sentinels.get(sentinel).and_then(|r| r.last_ping)
    }

    pub fn len(&self) -> usize {
        self.sentinels.len()
    }

    /// Clusters known across all monitoring sentinels, sorted and deduplicated.
    pub fn clusters(&self) -> Vec<ClusterName> {
        let mut all: Vec<ClusterName> = self
            .sentinels
            .values()
            .filter(|r| r.status == SentinelStatus::Monitoring)
            .flat_map(|r| r.clusters.iter().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }
}

type StartOutcome = Result<MonitorHandle, (Sentinel, MonitorError)>;

/// Supervises monitors for the whole fleet.
pub struct TopologyManager {
    connector: Arc<dyn RedisConnector>,
    options: ConnectOptions,
    restart_delay: Duration,
    notify_tx: mpsc::UnboundedSender<SentinelNotification>,
    notifications: mpsc::UnboundedReceiver<SentinelNotification>,
    switch_tx: mpsc::Sender<MasterSwitchedEvent>,
    connection_tx: mpsc::Sender<ConnectionEvent>,
    topology: Topology,
    monitors: HashMap<Sentinel, MonitorHandle>,
    starting: JoinSet<StartOutcome>,
}

impl TopologyManager {
    pub fn new(
        connector: Arc<dyn RedisConnector>,
        options: ConnectOptions,
        switch_tx: mpsc::Sender<MasterSwitchedEvent>,
        connection_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        let (notify_tx, notifications) = mpsc::unbounded_channel();
        Self {
            connector,
            options,
            restart_delay: Duration::from_secs(5),
            notify_tx,
            notifications,
            switch_tx,
            connection_tx,
            topology: Topology::default(),
            monitors: HashMap::new(),
            starting: JoinSet::new(),
        }
    }

    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Run until `shutdown` fires, then stop every monitor.
    pub async fn run(mut self, seeds: Vec<Sentinel>, mut shutdown: watch::Receiver<bool>) -> Topology {
        for seed in seeds {
            if self.topology.track(&seed) {
                self.schedule(seed, Duration::ZERO);
            }
        }

        loop {
            tokio::select! {
                Some(notification) = self.notifications.recv() => {
                    self.handle_notification(notification);
                }
                Some(outcome) = self.starting.join_next() => {
                    match outcome {
                        Ok(outcome) => self.handle_start(outcome),
                        Err(e) => warn!(error = %e, "monitor start task failed"),
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        self.shutdown().await;
        self.topology
    }

    fn handle_notification(&mut self, notification: SentinelNotification) {
        match &notification {
            SentinelNotification::Ping(s) => debug!(sentinel = %s, "sentinel ping"),
            SentinelNotification::ClustersMonitored { sentinel, clusters } => {
                debug!(sentinel = %sentinel, clusters = ?clusters, "clusters monitored")
            }
            SentinelNotification::Added(s) => debug!(sentinel = %s, "sentinel seen"),
            SentinelNotification::Lost(s) => warn!(
                sentinel = %s,
                since_last_ping = ?self.topology.last_ping(s).map(|t| t.elapsed()),
                "sentinel lost"
            ),
        }

        match self.topology.apply(&notification) {
            Action::None => {}
            Action::Start(sentinel) => {
                info!(sentinel = %sentinel, "discovered new sentinel");
                self.schedule(sentinel, Duration::ZERO);
            }
            Action::Restart(sentinel) => {
                self.monitors.remove(&sentinel);
                self.schedule(sentinel, self.restart_delay);
            }
        }
    }

    fn handle_start(&mut self, outcome: StartOutcome) {
        match outcome {
            Ok(handle) => {
                info!(sentinel = %handle.sentinel(), "monitor running");
                self.monitors.insert(handle.sentinel().clone(), handle);
            }
            Err((sentinel, e)) => {
                warn!(sentinel = %sentinel, error = %e, delay = ?self.restart_delay, "monitor start failed, retrying");
                self.topology.mark_lost(&sentinel);
                self.schedule(sentinel, self.restart_delay);
            }
        }
    }

    /// Create and start a monitor for `sentinel` after `delay`.
    fn schedule(&mut self, sentinel: Sentinel, delay: Duration) {
        let connector = self.connector.clone();
        let options = self.options;
        let observer: SharedObserver = Arc::new(self.notify_tx.clone());
        let switch_tx = self.switch_tx.clone();
        let connection_tx = self.connection_tx.clone();

        self.starting.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let monitor = Monitor::connect(sentinel.clone(), observer, connector.as_ref(), options)
                .await
                .map_err(|e| (sentinel.clone(), e))?;
            debug!(sentinel = %monitor.sentinel(), "monitor connected, subscribing");
            monitor
                .start(switch_tx, connection_tx)
                .await
                .map_err(|e| (sentinel, e))
        });
    }

    /// Stop every running monitor, including ones whose start finished
    /// but was not yet collected.
    async fn shutdown(&mut self) {
        self.starting.abort_all();
        let mut handles: Vec<MonitorHandle> = self.monitors.drain().map(|(_, h)| h).collect();
        while let Some(outcome) = self.starting.join_next().await {
            if let Ok(Ok(handle)) = outcome {
                handles.push(handle);
            }
        }

        for handle in &handles {
            handle.stop();
        }
        for handle in handles {
            handle.join().await;
        }
        info!(sentinels = self.topology.len(), "topology manager stopped");
    }
}
