//! Protocol messages carried over the host's RPC substrate.
//!
//! The substrate delivers small discrete messages point-to-point or by
//! broadcast, in order per peer pair. There is no large-payload primitive,
//! so asset content travels as a pull-driven sequence of `DataPacket`s:
//! the receiver acks each packet and the sender replies with the next one,
//! keeping exactly one packet in flight per (sender, asset) pair.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Default cap on a single `DataPacket` payload, in bytes.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 512_000;

/// Opaque peer identity assigned by the host's session layer.
///
/// Message provenance, not content: a controller compares the sender's
/// `PeerId` against its own to discard self-delivered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

/// Every message of the sync protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SyncMessage {
    /// Announce the current state of one asset.
    Hashes {
        name: String,
        content_hash: Digest,
        settings_hash: Digest,
    },

    /// "Tell me about every asset you know." Sent by a newly joined,
    /// non-authoritative participant to the authoritative one.
    QueryAll,

    /// "Send me packet 0 of this asset's content."
    QueryData { name: String },

    /// One content chunk. An empty payload signals end-of-stream;
    /// the terminal packet carries `index == total`.
    DataPacket {
        name: String,
        index: u32,
        total: u32,
        payload: Bytes,
    },

    /// "I have packet `index`, send `index + 1`."
    PacketAck { name: String, index: u32 },

    /// "Send me the settings delta for this asset."
    QuerySettings { name: String },

    /// Full settings delta, `key=value` lines. Settings text is small
    /// enough that it is never chunked.
    SendSettings { name: String, text: String },
}

impl SyncMessage {
    /// The asset name this message concerns, if any.
    pub fn asset_name(&self) -> Option<&str> {
        match self {
            SyncMessage::Hashes { name, .. }
            | SyncMessage::QueryData { name }
            | SyncMessage::DataPacket { name, .. }
            | SyncMessage::PacketAck { name, .. }
            | SyncMessage::QuerySettings { name }
            | SyncMessage::SendSettings { name, .. } => Some(name),
            SyncMessage::QueryAll => None,
        }
    }

    /// Serialize for transmission.
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("message serialization failed")
    }

    /// Deserialize a received message.
    pub fn from_bytes(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
