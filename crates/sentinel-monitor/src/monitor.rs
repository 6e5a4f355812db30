//! Sentinel monitor — one background task per watched sentinel.
//!
//! `Monitor::connect` opens both connections, `Monitor::start` subscribes
//! to the switch-master topic and spawns the event loop. The loop runs
//! until the first fatal condition or an explicit stop, then notifies the
//! observer that the sentinel is lost and closes both connections.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::connection::{ConnectOptions, PubSubClient, PubSubReply, RedisConnector, SentinelClient};
use crate::error::{MonitorError, MonitorResult};
use crate::message::{self, Interpretation, SWITCH_MASTER_TOPIC};
use crate::observer::SharedObserver;
use crate::types::{ConnectionEvent, MasterSwitchedEvent, Sentinel, SentinelNotification};

/// Period of the ping and discovery sequence.
pub const MONITOR_PING_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the channel between the subscription feed and the loop.
const FEED_BUFFER: usize = 16;

/// Why a monitor loop ended.
#[derive(Debug)]
pub enum ShutdownReason {
    /// `MonitorHandle::stop` was called.
    Stopped,
    /// A fatal condition was observed.
    Failed(MonitorError),
}

/// A connected, not yet started monitor.
pub struct Monitor {
    sentinel: Sentinel,
    observer: SharedObserver,
    pubsub: Box<dyn PubSubClient>,
    client: Box<dyn SentinelClient>,
    feed: mpsc::Receiver<PubSubReply>,
}

impl Monitor {
    /// Open the subscription feed and the command client for `sentinel`.
    ///
    /// Either both connections are open and a monitor is returned, or
    /// neither is left open.
    pub async fn connect(
        sentinel: Sentinel,
        observer: SharedObserver,
        connector: &dyn RedisConnector,
        options: ConnectOptions,
    ) -> MonitorResult<Self> {
        let location = sentinel.location();
        let (sink, feed) = mpsc::channel(FEED_BUFFER);

        let mut pubsub = connector
            .open_pubsub(&location, sink, options)
            .await
            .map_err(|source| MonitorError::Connect {
                location: location.clone(),
                source,
            })?;

        let client = match connector.open_sentinel_client(&sentinel, options).await {
            Ok(client) => client,
            Err(source) => {
                pubsub.close().await;
                return Err(MonitorError::Connect { location, source });
            }
        };

        debug!(sentinel = %location, "monitor connections open");

        Ok(Self {
            sentinel,
            observer,
            pubsub,
            client,
            feed,
        })
    }

    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// Subscribe to master-switch announcements and spawn the event loop.
    ///
    /// Returns as soon as the loop is spawned. Parsed master switches go
    /// to `switch_tx`, subscription confirmations to `connection_tx`.
    pub async fn start(
        mut self,
        switch_tx: mpsc::Sender<MasterSwitchedEvent>,
        connection_tx: mpsc::Sender<ConnectionEvent>,
    ) -> MonitorResult<MonitorHandle> {
        if let Err(source) = self.pubsub.subscribe(SWITCH_MASTER_TOPIC).await {
            error!(
                sentinel = %self.sentinel,
                error = %source,
                "failed to start monitoring master events"
            );
            self.pubsub.close().await;
            self.client.close().await;
            return Err(MonitorError::Subscribe {
                topic: SWITCH_MASTER_TOPIC,
                source,
            });
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sentinel = self.sentinel.clone();

        let event_loop = MonitorLoop {
            sentinel: self.sentinel,
            observer: self.observer,
            pubsub: self.pubsub,
            client: self.client,
            feed: self.feed,
            switch_tx,
            connection_tx,
        };
        let handle = tokio::spawn(event_loop.run(shutdown_rx));

        info!(sentinel = %sentinel, topic = SWITCH_MASTER_TOPIC, "sentinel monitor started");

        Ok(MonitorHandle {
            sentinel,
            shutdown_tx,
            handle,
        })
    }
}

/// Handle to a running monitor.
///
/// Dropping the handle detaches the monitor; it keeps running until a
/// fatal condition.
pub struct MonitorHandle {
    sentinel: Sentinel,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<ShutdownReason>,
}

impl MonitorHandle {
    pub fn sentinel(&self) -> &Sentinel {
        &self.sentinel
    }

    /// Ask the loop to run its shutdown sequence.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to end. `None` if the task panicked.
    pub async fn join(self) -> Option<ShutdownReason> {
        match self.handle.await {
            Ok(reason) => Some(reason),
            Err(e) => {
                error!(sentinel = %self.sentinel, error = %e, "monitor task failed");
                None
            }
        }
    }
}

/// State owned by the spawned task.
struct MonitorLoop {
    sentinel: Sentinel,
    observer: SharedObserver,
    pubsub: Box<dyn PubSubClient>,
    client: Box<dyn SentinelClient>,
    feed: mpsc::Receiver<PubSubReply>,
    switch_tx: mpsc::Sender<MasterSwitchedEvent>,
    connection_tx: mpsc::Sender<ConnectionEvent>,
}

impl MonitorLoop {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> ShutdownReason {
        let reason = self.watch(&mut shutdown).await;
        match &reason {
            ShutdownReason::Stopped => {
                info!(sentinel = %self.sentinel, "monitor stop requested");
            }
            ShutdownReason::Failed(e) => {
                warn!(sentinel = %self.sentinel, error = %e, "monitor failed");
            }
        }
        self.shut_down().await;
        reason
    }

    async fn watch(&mut self, shutdown: &mut watch::Receiver<bool>) -> ShutdownReason {
        let mut ticker = time::interval_at(
            Instant::now() + MONITOR_PING_INTERVAL,
            MONITOR_PING_INTERVAL,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                reply = self.feed.recv() => {
                    let Some(reply) = reply else {
                        return ShutdownReason::Failed(MonitorError::FeedClosed);
                    };
                    if let Err(reason) = self.handle_reply(reply, shutdown).await {
                        return reason;
                    }
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        checked = self.health_check() => {
                            if let Err(e) = checked {
                                return ShutdownReason::Failed(e);
                            }
                        }
                        _ = stop_requested(shutdown) => return ShutdownReason::Stopped,
                    }
                }
                _ = stop_requested(shutdown) => return ShutdownReason::Stopped,
            }
        }
    }

    async fn handle_reply(
        &mut self,
        reply: PubSubReply,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), ShutdownReason> {
        match message::interpret(&reply) {
            Interpretation::Ignore => Ok(()),
            Interpretation::Fatal(e) => Err(ShutdownReason::Failed(e)),
            Interpretation::Event(event) => {
                deliver(&self.switch_tx, event, shutdown, "master switch").await
            }
            Interpretation::Confirmed => {
                let event = ConnectionEvent { connected: true };
                deliver(&self.connection_tx, event, shutdown, "connection").await
            }
        }
    }

    /// Ping, then report clusters and their peer sentinels.
    async fn health_check(&mut self) -> Result<(), MonitorError> {
        self.client.ping().await.map_err(MonitorError::Ping)?;
        self.observer
            .notify(SentinelNotification::Ping(self.sentinel.clone()));

        let clusters = self
            .client
            .find_known_clusters()
            .await
            .map_err(MonitorError::Clusters)?;
        self.observer.notify(SentinelNotification::ClustersMonitored {
            sentinel: self.sentinel.clone(),
            clusters: clusters.clone(),
        });

        for cluster in &clusters {
            let peers = self
                .client
                .find_connected_sentinels(cluster)
                .await
                .map_err(|source| MonitorError::Peers {
                    cluster: cluster.clone(),
                    source,
                })?;

            for peer in peers {
                debug!(sentinel = %self.sentinel, peer = %peer, %cluster, "adding sentinel");
                self.observer.notify(SentinelNotification::Added(peer));
            }
        }

        Ok(())
    }

    async fn shut_down(mut self) {
        info!(sentinel = %self.sentinel, "shutting down monitor");
        self.observer
            .notify(SentinelNotification::Lost(self.sentinel.clone()));
        self.client.close().await;
        self.pubsub.close().await;
    }
}

/// Send `value`, waiting for the consumer, unless a stop arrives first.
async fn deliver<T>(
    tx: &mpsc::Sender<T>,
    value: T,
    shutdown: &mut watch::Receiver<bool>,
    consumer: &'static str,
) -> Result<(), ShutdownReason> {
    tokio::select! {
        sent = tx.send(value) => {
            sent.map_err(|_| ShutdownReason::Failed(MonitorError::ConsumerGone(consumer)))
        }
        _ = stop_requested(shutdown) => Err(ShutdownReason::Stopped),
    }
}

/// Resolves once a stop is requested. Never resolves if the handle is gone.
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
