mod dispatch;
mod format;
mod playback;
mod signal;


use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{Cli, Command, WatchArgs};
use crate::db::Database;
use crate::paths::{database_file_path, socket_path};
use crate::player::{MpvClient, PlayerControl};

use self::dispatch::{DispatchSummary, dispatch};
use self::format::{format_position, format_updated_display, truncate};
use self::playback::{PlaybackLoop, Timings};
use self::signal::{InterruptibleStdin, Waiter, install_handlers};

pub fn run(cli: Cli) -> Result<()> {
    let db = open_db(cli.db)?;

    match cli.command {
        Some(Command::List { playlist }) => {
            let result = run_list(&db, playlist.as_deref());
            db.close()?;
            result
        }
        Some(Command::Watch) | None => run_watch(db, cli.socket, &cli.watch),
    }
}

fn run_watch(db: Database, socket: Option<PathBuf>, args: &WatchArgs) -> Result<()> {
    let interrupt = install_handlers()?;
    let socket = socket_path(socket);
    let query_timeout = Duration::from_secs(args.query_timeout);
    let mut player = MpvClient::connect(&socket, query_timeout)?;
    let input = BufReader::new(InterruptibleStdin::new(interrupt));

    let summary = watch(db, &mut player, &interrupt, input, Timings::from(args))?;
    if summary.interrupted {
        info!("interrupted by user");
    } else {
        info!(
            started = summary.started,
            failed = summary.failed,
            "input exhausted"
        );
    }
    Ok(())
}

/// Feeds `input` to the playback loop, then shuts down the player and the
/// store in that order however the input loop ended.
pub(crate) fn watch<R, P, W>(
    db: Database,
    player: &mut P,
    waiter: &W,
    input: R,
    timings: Timings,
) -> Result<DispatchSummary>
where
    R: BufRead,
    P: PlayerControl,
    W: Waiter,
{
    let outcome = {
        let mut session = PlaybackLoop::new(&db, player, waiter, timings);
        let outcome = dispatch(input, &mut session);
        if let Some(playlist) = session.current_playlist() {
            info!(playlist, "last playlist");
        }
        outcome
    };
    if let Err(err) = &outcome {
        warn!("input loop failed: {err:#}");
    }

    info!("shutting down");
    player.close();
    db.close()?;
    outcome
}

fn run_list(db: &Database, playlist: Option<&str>) -> Result<()> {
    let items = db.list(playlist)?;
    if items.is_empty() {
        println!("No saved positions yet. Pipe playlist URLs into `kiosk-resume watch` first.");
        return Ok(());
    }

    println!(
        "{:<40} {:<40} {:>10} {:<24}",
        "PLAYLIST", "ITEM", "POSITION", "UPDATED"
    );
    for item in items {
        println!(
            "{:<40} {:<40} {:>10} {:<24}",
            truncate(&item.playlist_url, 40),
            truncate(&item.item_url, 40),
            format_position(item.position),
            format_updated_display(&item.updated_at)
        );
    }
    Ok(())
}

fn open_db(cli_value: Option<PathBuf>) -> Result<Database> {
    let db_path = database_file_path(cli_value)?;
    let db = Database::open(&db_path)?;
    db.migrate()?;
    Ok(db)
}
