use std::convert::Infallible;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, info_span, warn};

use super::signal::Waiter;
use crate::cli::WatchArgs;
use crate::db::Database;
use crate::player::PlayerControl;

/// Fixed waits standing in for a "ready" signal mpv does not give on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Timings {
    pub(crate) load_settle: Duration,
    pub(crate) resume_settle: Duration,
    pub(crate) poll_interval: Duration,
}

impl From<&WatchArgs> for Timings {
    fn from(args: &WatchArgs) -> Self {
        Self {
            load_settle: Duration::from_secs(args.load_settle),
            resume_settle: Duration::from_secs(args.resume_settle),
            poll_interval: Duration::from_secs(args.poll_interval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Recorded {
        item: String,
        position: u64,
        created: bool,
    },
    Skipped {
        position: Option<u64>,
        item: Option<String>,
    },
}

pub(crate) struct PlaybackLoop<'a, P, W> {
    db: &'a Database,
    player: &'a mut P,
    waiter: &'a W,
    timings: Timings,
    current_playlist: Option<String>,
}

impl<'a, P, W> PlaybackLoop<'a, P, W>
where
    P: PlayerControl,
    W: Waiter,
{
    pub(crate) fn new(
        db: &'a Database,
        player: &'a mut P,
        waiter: &'a W,
        timings: Timings,
    ) -> Self {
        Self {
            db,
            player,
            waiter,
            timings,
            current_playlist: None,
        }
    }

    pub(crate) fn current_playlist(&self) -> Option<&str> {
        self.current_playlist.as_deref()
    }

    pub(crate) fn interrupted(&self) -> bool {
        self.waiter.interrupted()
    }

    /// Plays `playlist_url` and samples it until something stops the loop.
    /// Interrupts surface as [`super::signal::Interrupted`]; end of playlist,
    /// a dead player and storage failures are not told apart.
    pub(crate) fn play(&mut self, playlist_url: &str) -> Result<Infallible> {
        let span = info_span!("playlist", url = %playlist_url);
        let _guard = span.enter();

        self.start(playlist_url)?;
        info!("starting position polling");
        loop {
            self.poll_once(playlist_url)?;
            self.waiter.wait(self.timings.poll_interval)?;
        }
    }

    /// Loads the playlist, resumes the last watched item when one is stored
    /// and waits for the player to settle.
    pub(crate) fn start(&mut self, playlist_url: &str) -> Result<()> {
        self.current_playlist = Some(playlist_url.to_string());
        let last = self.db.get_latest(playlist_url)?;

        self.player.load(playlist_url)?;
        self.waiter.wait(self.timings.load_settle)?;

        if let Some(last) = last {
            self.player.load(&last.item_url)?;
            self.waiter.wait(self.timings.load_settle)?;
            let offset = i64::try_from(last.position).unwrap_or(i64::MAX);
            self.player.seek(offset)?;
            info!(
                item = %last.item_url,
                position = last.position,
                "resuming playlist"
            );
        }

        self.waiter.wait(self.timings.resume_settle)?;
        Ok(())
    }

    pub(crate) fn poll_once(&mut self, playlist_url: &str) -> Result<PollOutcome> {
        let position = self.player.position();
        let item = self.player.current_item();
        info!(?position, ?item, "poll");

        match (position, item) {
            (Some(position), Some(item)) => {
                let (mut record, created) = self.db.get_or_create(playlist_url, &item)?;
                self.db.update(&mut record, position)?;
                info!(item = %item, position, created, "position saved");
                Ok(PollOutcome::Recorded {
                    item,
                    position,
                    created,
                })
            }
            (position, item) => {
                warn!(?position, ?item, "player data missing, skipping tick");
                Ok(PollOutcome::Skipped { position, item })
            }
        }
    }
}
