//! Peer-to-peer avatar asset synchronization.
//!
//! Each participant owns at most one avatar asset, keyed by its display
//! name. Assets are announced as digest pairs (content + settings), pulled
//! on mismatch as chunked byte streams with one chunk in flight, and
//! installed through a host-provided [`VisualBackend`]. The protocol logic
//! lives in a synchronous [`SyncController`]; [`service::run`] embeds it
//! in a tokio loop for hosts that want one.

pub mod chunker;
pub mod controller;
mod finalizer;
pub mod registry;
pub mod send;
pub mod service;
pub mod store;
pub mod tracker;
pub mod visual;

#[cfg(test)]
mod testutil;

pub use chunker::{assemble, chunk_at, split, total_chunks, Chunk};
pub use controller::SyncController;
pub use registry::{Asset, AssetRegistry, AssetSource};
pub use send::{Outbound, SendTarget};
pub use service::{deliver, run, Transport};
pub use store::AssetStore;
pub use tracker::TransferTracker;
pub use visual::{HostEnv, VisualBackend, VisualHandle};
