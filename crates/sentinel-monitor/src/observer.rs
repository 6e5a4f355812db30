//! Observer seam for lifecycle notifications.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::SentinelNotification;

/// Receives notifications from any number of monitors.
///
/// Called from each monitor's own task; implementations must be cheap and
/// must not block.
pub trait Observer: Send + Sync {
    fn notify(&self, notification: SentinelNotification);
}

/// Shared observer handle passed to every monitor.
pub type SharedObserver = Arc<dyn Observer>;

impl Observer for mpsc::UnboundedSender<SentinelNotification> {
    fn notify(&self, notification: SentinelNotification) {
        if let Err(e) = self.send(notification) {
            debug!(sentinel = %e.0.sentinel(), "observer channel closed, notification dropped");
        }
    }
}

impl<F> Observer for F
where
    F: Fn(SentinelNotification) + Send + Sync,
{
    fn notify(&self, notification: SentinelNotification) {
        self(notification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sentinel;
    use std::sync::Mutex;

    #[test]
    fn channel_observer_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer: SharedObserver = Arc::new(tx);
        observer.notify(SentinelNotification::Ping(Sentinel::new("a", 1)));
        assert_eq!(
            rx.try_recv().unwrap(),
            SentinelNotification::Ping(Sentinel::new("a", 1))
        );
    }

    #[test]
    fn channel_observer_tolerates_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.notify(SentinelNotification::Lost(Sentinel::new("a", 1)));
    }

    #[test]
    fn closure_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer: SharedObserver = Arc::new(move |n: SentinelNotification| {
            sink.lock().unwrap().push(n);
        });
        observer.notify(SentinelNotification::Added(Sentinel::new("b", 2)));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
