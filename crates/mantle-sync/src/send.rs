//! Send targeting — broadcast vs peer targeting.

use mantle_core::{PeerId, SyncMessage};
use serde::{Deserialize, Serialize};

/// Target for an outbound protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SendTarget {
    /// Broadcast to every connected peer.
    #[default]
    Broadcast,

    /// Send to one peer.
    #[serde(rename = "peer")]
    Peer { peer: PeerId },
}

/// An outbound message with its target, produced by the controller and
/// handed to the host's RPC substrate.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub target: SendTarget,
    pub msg: SyncMessage,
}

impl Outbound {
    pub fn to_peer(peer: PeerId, msg: SyncMessage) -> Self {
        Self {
            target: SendTarget::Peer { peer },
            msg,
        }
    }

    pub fn broadcast(msg: SyncMessage) -> Self {
        Self {
            target: SendTarget::Broadcast,
            msg,
        }
    }
}
