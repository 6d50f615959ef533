//! Host-facing seams — the visual backend and host environment.
//!
//! The sync protocol never touches the renderer or the session layer
//! directly. The host hands it these two traits; everything behind them
//! (model decoding, attachment to a live player, the peer list) is the
//! host's concern.

use mantle_core::settings::AvatarSettings;
use mantle_core::{PeerId, SyncError};

/// Opaque handle to a decoded, renderable avatar model.
///
/// Owned by the host's visual layer; the registry compares handles to
/// detect aliasing and asks the backend to release superseded ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualHandle(pub u64);

/// Decoding and installation of avatar visuals.
///
/// Intentionally minimal, mirroring what finalization needs and nothing
/// more. All methods are synchronous; they run on the protocol task.
pub trait VisualBackend: Send + Sync {
    /// Decode raw asset bytes into a renderable handle.
    fn import(&self, bytes: &[u8], scale: f32) -> Result<VisualHandle, SyncError>;

    /// Attach the visual to the live representation for `name`, if one is
    /// currently active. A no-op otherwise.
    fn install(&self, name: &str, handle: VisualHandle);

    /// Destroy a superseded visual and its resources.
    fn release(&self, handle: VisualHandle);

    /// Apply local presentation policy (brightness, shader selection) to a
    /// freshly registered visual.
    fn apply_presentation(&self, handle: VisualHandle, settings: &AvatarSettings);
}

/// The host's view of the session.
pub trait HostEnv: Send + Sync {
    /// This participant's own asset name.
    fn local_name(&self) -> String;

    /// Whether this participant is the authoritative relay.
    fn is_authoritative(&self) -> bool;

    /// The authoritative participant's peer id, when we are not it.
    fn authority(&self) -> Option<PeerId>;

    /// All currently connected peers (excluding ourselves).
    fn peers(&self) -> Vec<PeerId>;

    /// Display/asset name of a peer, if known.
    fn peer_name(&self, peer: PeerId) -> Option<String>;
}
