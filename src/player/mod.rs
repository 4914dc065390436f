//! Control channel to an already running mpv instance.
//!
//! - `protocol.rs` - JSON IPC request/reply framing
//! - `client.rs` - Unix socket client implementing [`PlayerControl`]

mod client;
mod protocol;

use anyhow::Result;
use thiserror::Error;

pub(crate) use client::MpvClient;

#[derive(Debug, Error)]
pub(crate) enum PlayerError {
    #[error("player channel I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("player sent an unreadable reply: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("player rejected {command}: {error}")]
    Rejected { command: String, error: String },
    #[error("player closed the control channel")]
    Closed,
}

/// What the playback loop needs from a player. Queries return `None` for any
/// failure so a player between items looks the same as one that is gone.
pub(crate) trait PlayerControl {
    fn load(&mut self, uri: &str) -> Result<()>;
    /// Absolute seek in seconds. Offsets `<= 0` send nothing.
    fn seek(&mut self, offset: i64) -> Result<()>;
    fn position(&mut self) -> Option<u64>;
    fn current_item(&mut self) -> Option<String>;
    fn close(&mut self);
}
