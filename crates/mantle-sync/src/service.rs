//! Embedding the controller in a host process.
//!
//! The host feeds inbound protocol messages through an mpsc channel and
//! provides a `Transport` over its RPC substrate. One task owns the
//! controller; a coarse interval tick drives the startup timers. This is
//! the only place the protocol touches an async runtime.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mantle_core::{PeerId, SyncMessage};
use tokio::sync::mpsc;

use crate::controller::SyncController;
use crate::send::{Outbound, SendTarget};

/// The host's RPC send primitives.
pub trait Transport: Send + Sync {
    fn send(&self, peer: PeerId, msg: &SyncMessage);
    fn broadcast(&self, msg: &SyncMessage);
}

/// Hand a batch of controller output to the transport.
pub fn deliver(transport: &dyn Transport, batch: Vec<Outbound>) {
    for out in batch {
        match out.target {
            SendTarget::Broadcast => transport.broadcast(&out.msg),
            SendTarget::Peer { peer } => transport.send(peer, &out.msg),
        }
    }
}

/// How often the startup timers are polled.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Run the protocol until the inbound channel closes.
pub async fn run(
    mut controller: SyncController,
    mut inbound: mpsc::Receiver<(PeerId, SyncMessage)>,
    transport: Arc<dyn Transport>,
) {
    let mut tick = tokio::time::interval(TICK_INTERVAL);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            inbound_msg = inbound.recv() => {
                match inbound_msg {
                    Some((from, msg)) => {
                        tracing::trace!(
                            %from,
                            asset = msg.asset_name().unwrap_or("-"),
                            "inbound sync message"
                        );
                        deliver(transport.as_ref(), controller.handle_message(from, msg));
                    }
                    None => {
                        tracing::info!("inbound channel closed, sync loop stopping");
                        break;
                    }
                }
            }
            _ = tick.tick() => {
                deliver(transport.as_ref(), controller.tick(Instant::now()));
            }
        }
    }
}
