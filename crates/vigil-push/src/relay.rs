use std::sync::Weak;
use std::time::Duration;

use futures::StreamExt;
use rand::Rng;
use tokio::sync::watch;
use tracing::{debug, warn};

use vigil_core::constants::KILL_SWITCH_CHANNEL;
use vigil_coord::CoordClient;

use crate::hub::PushHub;

/// Background relay: one pub/sub subscription feeding the hub's fan-out.
///
/// Runs until the stop signal flips or the hub is dropped. The subscription
/// is re-established with jittered backoff after connection loss; on exit
/// the channel is unsubscribed and the connection dropped.
pub async fn relay_loop(hub: Weak<PushHub>, coord: CoordClient, mut stop: watch::Receiver<bool>) {
    'reconnect: loop {
        if *stop.borrow() {
            break;
        }

        let mut pubsub = match coord.pubsub().await {
            Ok(pubsub) => pubsub,
            Err(e) => {
                warn!(error = %e, "kill-switch relay cannot reach pub/sub");
                if backoff_interrupted(&mut stop).await {
                    break;
                }
                continue;
            }
        };
        if let Err(e) = pubsub.subscribe(KILL_SWITCH_CHANNEL).await {
            warn!(error = %e, "kill-switch subscribe failed");
            if backoff_interrupted(&mut stop).await {
                break;
            }
            continue;
        }
        debug!(channel = KILL_SWITCH_CHANNEL, "relay subscribed");

        let mut stopping = false;
        {
            let mut messages = pubsub.on_message();
            loop {
                tokio::select! {
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow() {
                            stopping = true;
                            break;
                        }
                    }
                    msg = messages.next() => match msg {
                        Some(msg) => {
                            let payload: String = msg.get_payload().unwrap_or_default();
                            if payload.is_empty() {
                                continue;
                            }
                            let Some(hub) = hub.upgrade() else {
                                stopping = true;
                                break;
                            };
                            debug!(message = %payload, "relaying kill-switch message");
                            hub.broadcast(&payload).await;
                        }
                        // Stream ended: the connection is gone, resubscribe.
                        None => break,
                    },
                }
            }
        }

        if let Err(e) = pubsub.unsubscribe(KILL_SWITCH_CHANNEL).await {
            debug!(error = %e, "kill-switch unsubscribe failed");
        }
        if stopping {
            break 'reconnect;
        }
    }
    debug!("kill-switch relay exited");
}

/// Sleep ~1s with jitter; true when the stop signal fired during the wait.
async fn backoff_interrupted(stop: &mut watch::Receiver<bool>) -> bool {
    let jitter_ms = rand::thread_rng().gen_range(0..400);
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(1000 + jitter_ms)) => *stop.borrow(),
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
    }
}
