//! Per-sender transfer bookkeeping.
//!
//! One `TransferTracker` exists per (remote sender, asset name) with a
//! pull in flight. It is created lazily by the first relevant inbound
//! message and dropped as soon as finalization runs.

use bytes::Bytes;

use crate::chunker::{self, Chunk};

/// State of one in-flight asset pull.
///
/// Data and settings are independent dimensions. A dimension is satisfied
/// either by completing its transfer or by being marked as reusable when
/// the announced digest already matched the local copy.
#[derive(Debug, Default)]
pub struct TransferTracker {
    chunks: Vec<Chunk>,
    pub data_done: bool,
    pub reuse_existing_data: bool,

    pub settings_text: Option<String>,
    pub settings_done: bool,
    pub reuse_existing_settings: bool,
}

impl TransferTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both dimensions satisfied — ready for finalization.
    pub fn is_loaded(&self) -> bool {
        (self.reuse_existing_data || self.data_done)
            && (self.reuse_existing_settings || self.settings_done)
    }

    pub fn push_chunk(&mut self, chunk: Chunk) {
        self.chunks.push(chunk);
    }

    pub fn set_settings(&mut self, text: String) {
        self.settings_text = Some(text);
        self.settings_done = true;
    }

    pub fn chunks_received(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenate the received chunks into the full asset buffer.
    pub fn assembled_data(&self) -> Bytes {
        chunker::assemble(self.chunks.clone())
    }
}
