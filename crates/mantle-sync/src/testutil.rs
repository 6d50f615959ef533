//! Shared test doubles for the controller and finalizer tests.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use mantle_core::{AvatarSettings, PeerId, SyncError};

use crate::visual::{HostEnv, VisualBackend, VisualHandle};

/// Visual backend that hands out sequential handles and records calls.
pub(crate) struct StubBackend {
    next_handle: AtomicU64,
    pub fail_import: AtomicBool,
    pub installed: Mutex<Vec<(String, VisualHandle)>>,
    pub released: Mutex<Vec<VisualHandle>>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            fail_import: AtomicBool::new(false),
            installed: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }
}

impl VisualBackend for StubBackend {
    fn import(&self, bytes: &[u8], _scale: f32) -> Result<VisualHandle, SyncError> {
        if self.fail_import.load(Ordering::Relaxed) || bytes.is_empty() {
            return Err(SyncError::Decode {
                name: String::new(),
                reason: "stub decode failure".into(),
            });
        }
        Ok(VisualHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn install(&self, name: &str, handle: VisualHandle) {
        self.installed.lock().unwrap().push((name.to_string(), handle));
    }

    fn release(&self, handle: VisualHandle) {
        self.released.lock().unwrap().push(handle);
    }

    fn apply_presentation(&self, _handle: VisualHandle, _settings: &AvatarSettings) {}
}

/// Host environment with a scripted peer list.
pub(crate) struct StubEnv {
    pub local_name: String,
    pub authoritative: bool,
    pub authority: Option<PeerId>,
    pub peers: Mutex<Vec<(PeerId, String)>>,
}

impl StubEnv {
    /// A non-authoritative participant talking to `authority`.
    pub fn client(name: &str, authority: PeerId) -> Self {
        Self {
            local_name: name.to_string(),
            authoritative: false,
            authority: Some(authority),
            peers: Mutex::new(Vec::new()),
        }
    }

    /// The authoritative relay with a known peer list.
    pub fn server(name: &str, peers: Vec<(PeerId, String)>) -> Self {
        Self {
            local_name: name.to_string(),
            authoritative: true,
            authority: None,
            peers: Mutex::new(peers),
        }
    }
}

impl HostEnv for StubEnv {
    fn local_name(&self) -> String {
        self.local_name.clone()
    }

    fn is_authoritative(&self) -> bool {
        self.authoritative
    }

    fn authority(&self) -> Option<PeerId> {
        self.authority
    }

    fn peers(&self) -> Vec<PeerId> {
        self.peers.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    fn peer_name(&self, peer: PeerId) -> Option<String> {
        self.peers
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| *p == peer)
            .map(|(_, n)| n.clone())
    }
}
