//! Error taxonomy for the sync protocol.
//!
//! All of these are local and non-fatal: a failure aborts at most the
//! current asset's installation and never blocks other participants'
//! transfers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The importer could not decode the assembled asset bytes.
    #[error("failed to decode asset for {name}: {reason}")]
    Decode { name: String, reason: String },

    /// A protocol message could not be decoded.
    #[error("malformed message: {0}")]
    Wire(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
