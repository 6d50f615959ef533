//! mantle-core — shared types, wire messages, settings schema, and config.
//! All other Mantle crates depend on this one.

pub mod config;
pub mod digest;
pub mod error;
pub mod settings;
pub mod wire;

pub use digest::Digest;
pub use error::SyncError;
pub use settings::{AvatarSettings, SettingsStore};
pub use config::MantleConfig;
pub use wire::{PeerId, SyncMessage};
