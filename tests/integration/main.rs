//! Avatar sync integration harness.
//!
//! Runs several controllers against an in-memory message substrate: every
//! outbound message is serialized to wire bytes, routed by target, decoded
//! on the far side, and handed to the receiving controller. Tests drive
//! the exchange to quiescence and then inspect the hosts' registries,
//! settings, and visual backends. A drop rule lets fault tests lose
//! specific messages in flight.

mod faults;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use mantle_core::config::MantleConfig;
use mantle_core::{AvatarSettings, PeerId, SyncError, SyncMessage};
use mantle_sync::{
    HostEnv, Outbound, SendTarget, SyncController, VisualBackend, VisualHandle,
};

/// One routed message, recorded after delivery.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub from: PeerId,
    pub to: PeerId,
    pub msg: SyncMessage,
}

/// Visual backend that hands out sequential handles and records calls.
pub struct NetBackend {
    next_handle: AtomicU64,
    pub fail_import: AtomicBool,
    pub installed: Mutex<Vec<String>>,
    pub released: Mutex<Vec<VisualHandle>>,
}

impl Default for NetBackend {
    fn default() -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            fail_import: AtomicBool::new(false),
            installed: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }
}

impl NetBackend {
    pub fn installed_names(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }
}

impl VisualBackend for NetBackend {
    fn import(&self, bytes: &[u8], _scale: f32) -> Result<VisualHandle, SyncError> {
        if self.fail_import.load(Ordering::Relaxed) || bytes.is_empty() {
            return Err(SyncError::Decode {
                name: String::new(),
                reason: "backend rejected content".into(),
            });
        }
        Ok(VisualHandle(self.next_handle.fetch_add(1, Ordering::Relaxed)))
    }

    fn install(&self, name: &str, _handle: VisualHandle) {
        self.installed.lock().unwrap().push(name.to_string());
    }

    fn release(&self, handle: VisualHandle) {
        self.released.lock().unwrap().push(handle);
    }

    fn apply_presentation(&self, _handle: VisualHandle, _settings: &AvatarSettings) {}
}

/// Host environment backed by a roster shared across the whole net.
struct NetEnv {
    local_name: String,
    authoritative: bool,
    authority: Option<PeerId>,
    roster: Arc<Mutex<Vec<(PeerId, String)>>>,
}

impl HostEnv for NetEnv {
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
        self.roster.lock().unwrap().iter().map(|(p, _)| *p).collect()
    }

    fn peer_name(&self, peer: PeerId) -> Option<String> {
        self.roster
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| *p == peer)
            .map(|(_, n)| n.clone())
    }
}

pub struct Host {
    pub peer: PeerId,
    pub controller: SyncController,
    pub backend: Arc<NetBackend>,
}

type DropRule = Box<dyn FnMut(&Envelope) -> bool>;

pub struct TestNet {
    hosts: Vec<Host>,
    roster: Arc<Mutex<Vec<(PeerId, String)>>>,
    inbox: VecDeque<Envelope>,
    /// Messages actually handed to a controller, in delivery order.
    pub delivered: Vec<Envelope>,
    drop_rule: Option<DropRule>,
    chunk_size: Option<usize>,
    next_peer: u64,
}

impl TestNet {
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            roster: Arc::new(Mutex::new(Vec::new())),
            inbox: VecDeque::new(),
            delivered: Vec::new(),
            drop_rule: None,
            chunk_size: None,
            next_peer: 1,
        }
    }

    /// Cap content packets for hosts added after this call.
    pub fn set_chunk_size(&mut self, max: usize) {
        self.chunk_size = Some(max);
    }

    fn add_host(&mut self, name: &str, authoritative: bool, authority: Option<PeerId>) -> PeerId {
        let peer = PeerId(self.next_peer);
        self.next_peer += 1;

        let env = Arc::new(NetEnv {
            local_name: name.to_string(),
            authoritative,
            authority,
            roster: self.roster.clone(),
        });
        let backend = Arc::new(NetBackend::default());
        let mut config = MantleConfig::default();
        config.storage.data_dir = scratch_dir(name);
        if let Some(max) = self.chunk_size {
            config.transfer.max_chunk_size = max;
        }

        let controller = SyncController::new(peer, config, env, backend.clone());
        self.hosts.push(Host {
            peer,
            controller,
            backend,
        });
        if !authoritative {
            self.roster.lock().unwrap().push((peer, name.to_string()));
        }
        peer
    }

    /// The authoritative relay. Not listed in the roster: the roster is
    /// the relay's view of its clients.
    pub fn add_server(&mut self, name: &str) -> PeerId {
        self.add_host(name, true, None)
    }

    pub fn add_client(&mut self, name: &str, authority: PeerId) -> PeerId {
        self.add_host(name, false, Some(authority))
    }

    /// Lose every in-flight message the rule matches.
    pub fn drop_when(&mut self, rule: impl FnMut(&Envelope) -> bool + 'static) {
        self.drop_rule = Some(Box::new(rule));
    }

    pub fn host(&self, peer: PeerId) -> &Host {
        self.hosts.iter().find(|h| h.peer == peer).unwrap()
    }

    pub fn host_mut(&mut self, peer: PeerId) -> &mut Host {
        self.hosts.iter_mut().find(|h| h.peer == peer).unwrap()
    }

    /// Put a controller's output on the wire.
    pub fn send_from(&mut self, from: PeerId, batch: Vec<Outbound>) {
        for out in batch {
            match out.target {
                SendTarget::Peer { peer } => self.inbox.push_back(Envelope {
                    from,
                    to: peer,
                    msg: out.msg,
                }),
                // the substrate loops broadcasts back to the sender too
                SendTarget::Broadcast => {
                    for host in &self.hosts {
                        self.inbox.push_back(Envelope {
                            from,
                            to: host.peer,
                            msg: out.msg.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Deliver messages until the net goes quiet.
    pub fn run_until_idle(&mut self) {
        let mut budget = 10_000u32;
        while let Some(envelope) = self.inbox.pop_front() {
            budget = budget.checked_sub(1).expect("message storm, net never quiesced");

            if self.drop_rule.as_mut().is_some_and(|rule| rule(&envelope)) {
                continue;
            }

            // round-trip through the wire encoding, as the substrate would
            let bytes = envelope.msg.to_bytes();
            let msg = SyncMessage::from_bytes(&bytes).expect("wire roundtrip failed");

            let from = envelope.from;
            let to = envelope.to;
            let replies = {
                let host = self
                    .hosts
                    .iter_mut()
                    .find(|h| h.peer == to)
                    .unwrap_or_else(|| panic!("message addressed to unknown {to}"));
                host.controller.handle_message(from, msg)
            };
            self.delivered.push(envelope);
            self.send_from(to, replies);
        }
    }

    pub fn delivered_count(&self, mut pred: impl FnMut(&Envelope) -> bool) -> usize {
        self.delivered.iter().filter(|e| pred(e)).count()
    }
}

fn scratch_dir(name: &str) -> std::path::PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    std::env::temp_dir().join(format!(
        "mantle-it-{}-{}-{}",
        name,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Deterministic non-repeating content of the given length.
pub fn test_blob(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
}
