//! Rate event relay

use std::sync::Arc;
use tokio::sync::watch;
use vitalcast_transport::Subscription;

use crate::hub::Hub;

/// Forward every message on `sub` to the hub as a text frame, byte for byte.
///
/// Runs until shutdown is signalled or the subscription closes.
pub async fn relay_text(mut sub: Subscription, hub: Arc<Hub>, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("Relaying {} to viewers", sub.subject());

    loop {
        tokio::select! {
            msg = sub.recv() => match msg {
                Some(msg) => {
                    hub.broadcast_text(&msg.data).await;
                }
                None => {
                    tracing::warn!("Subscription {} closed", sub.subject());
                    break;
                }
            },
            _ = shutdown.changed() => break,
        }
    }

    tracing::info!("Relay for {} stopped", sub.subject());
}
