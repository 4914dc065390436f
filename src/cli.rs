use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "kiosk-resume",
    version,
    about = "Feed playlists to mpv and resume each one where it left off"
)]
pub struct Cli {
    /// mpv IPC socket (defaults to $XDG_RUNTIME_DIR/mpv.sock)
    #[arg(long, global = true)]
    pub socket: Option<PathBuf>,

    /// Position database file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub watch: WatchArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Read playlist URLs from stdin and play them in turn (default)
    Watch,
    /// Print stored positions, newest first
    List {
        #[arg(long)]
        playlist: Option<String>,
    },
}

#[derive(Debug, Clone, Args)]
pub struct WatchArgs {
    /// Seconds between position samples
    #[arg(long, global = true, default_value_t = 60)]
    pub poll_interval: u64,

    /// Seconds to wait after each load command
    #[arg(long, global = true, default_value_t = 1)]
    pub load_settle: u64,

    /// Seconds to wait after the start/resume sequence before polling
    #[arg(long, global = true, default_value_t = 10)]
    pub resume_settle: u64,

    /// Seconds before an unanswered player query counts as unavailable
    #[arg(long, global = true, default_value_t = 5)]
    pub query_timeout: u64,
}
