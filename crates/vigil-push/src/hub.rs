use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use vigil_coord::CoordClient;

use crate::message::target_device;
use crate::relay;

/// Opaque handle identifying one registered socket.
pub type SocketId = u64;

/// Outbound capacity per socket. A client that cannot drain this many
/// pending kill-switch messages is effectively dead and gets dropped.
const SOCKET_BUFFER: usize = 32;

struct SocketEntry {
    device_id: String,
    sender: mpsc::Sender<String>,
}

struct RelayHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct HubInner {
    next_id: SocketId,
    sockets: HashMap<SocketId, SocketEntry>,
    relay: Option<RelayHandle>,
}

/// The socket registry plus the relay it owns.
///
/// All mutation is serialized through one async mutex. The relay task holds
/// only a weak reference back to the hub, so dropping the hub tears the
/// relay down even if a stop signal went missing.
pub struct PushHub {
    inner: Mutex<HubInner>,
}

impl PushHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HubInner {
                next_id: 1,
                sockets: HashMap::new(),
                relay: None,
            }),
        })
    }

    /// Register a socket for `device_id`. The returned receiver yields the
    /// messages this socket must forward to its client.
    pub async fn register(&self, device_id: &str) -> (SocketId, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SOCKET_BUFFER);
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.sockets.insert(id, SocketEntry { device_id: device_id.to_string(), sender: tx });
        debug!(socket_id = id, device_id, connections = inner.sockets.len(), "socket registered");
        (id, rx)
    }

    /// Start the shared relay if it is not already running. Idempotent;
    /// called by the socket handlers right after registration.
    pub async fn ensure_relay(self: &Arc<Self>, coord: &CoordClient) {
        let mut inner = self.inner.lock().await;
        if inner.relay.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(relay::relay_loop(
            Arc::downgrade(self),
            coord.clone(),
            stop_rx,
        ));
        inner.relay = Some(RelayHandle { stop: stop_tx, task });
        debug!("kill-switch relay started");
    }

    /// Remove a socket. When the set becomes empty the relay is signalled to
    /// stop and joined, so every start has a matching stop.
    pub async fn unregister(&self, id: SocketId) {
        let relay = {
            let mut inner = self.inner.lock().await;
            inner.sockets.remove(&id);
            if inner.sockets.is_empty() {
                inner.relay.take()
            } else {
                None
            }
        };
        if let Some(handle) = relay {
            let _ = handle.stop.send(true);
            if let Err(e) = handle.task.await {
                warn!(error = %e, "kill-switch relay join failed");
            }
            debug!("kill-switch relay stopped");
        }
    }

    /// Fan a raw channel message out to matching sockets. Sockets that
    /// cannot accept the message are dropped from the set.
    pub async fn broadcast(&self, message: &str) {
        let target = target_device(message);
        let mut inner = self.inner.lock().await;
        let mut dead: Vec<SocketId> = Vec::new();
        for (id, entry) in &inner.sockets {
            if target.is_some_and(|device| device != entry.device_id) {
                continue;
            }
            if entry.sender.try_send(message.to_string()).is_err() {
                dead.push(*id);
            }
        }
        for id in dead {
            inner.sockets.remove(&id);
            debug!(socket_id = id, "dropped unresponsive push socket");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.sockets.len()
    }

    /// Whether the relay is currently running (used by lifecycle tests and
    /// the health probe).
    pub async fn relay_running(&self) -> bool {
        self.inner.lock().await.relay.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn targeted_broadcast_reaches_only_matching_device() {
        let hub = PushHub::new();
        let (_id1, mut rx1) = hub.register("d1").await;
        let (_id2, mut rx2) = hub.register("d2").await;

        hub.broadcast("block:d1:logout").await;
        assert_eq!(rx1.recv().await.as_deref(), Some("block:d1:logout"));
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn untargeted_broadcast_reaches_everyone() {
        let hub = PushHub::new();
        let (_id1, mut rx1) = hub.register("d1").await;
        let (_id2, mut rx2) = hub.register("d2").await;

        hub.broadcast("maintenance").await;
        assert_eq!(rx1.recv().await.as_deref(), Some("maintenance"));
        assert_eq!(rx2.recv().await.as_deref(), Some("maintenance"));
    }

    #[tokio::test]
    async fn closed_sockets_are_dropped_on_send_failure() {
        let hub = PushHub::new();
        let (_id1, rx1) = hub.register("d1").await;
        let (_id2, _rx2) = hub.register("d2").await;
        assert_eq!(hub.connection_count().await, 2);

        drop(rx1);
        hub.broadcast("block:d1:logout").await;
        assert_eq!(hub.connection_count().await, 1);
    }

    #[tokio::test]
    async fn unregister_clears_the_set() {
        let hub = PushHub::new();
        let (id, _rx) = hub.register("d1").await;
        assert_eq!(hub.connection_count().await, 1);
        hub.unregister(id).await;
        assert_eq!(hub.connection_count().await, 0);
        assert!(!hub.relay_running().await);
    }
}
