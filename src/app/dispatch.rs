use std::io::BufRead;

use anyhow::{Context, Result};
use tracing::{error, info};

use super::playback::PlaybackLoop;
use super::signal::{Interrupted, Waiter};
use crate::player::PlayerControl;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DispatchSummary {
    pub(crate) started: usize,
    pub(crate) failed: usize,
    pub(crate) interrupted: bool,
}

/// Plays each non-blank input line as a playlist, one after another.
pub(crate) fn dispatch<R, P, W>(
    input: R,
    session: &mut PlaybackLoop<'_, P, W>,
) -> Result<DispatchSummary>
where
    R: BufRead,
    P: PlayerControl,
    W: Waiter,
{
    let mut summary = DispatchSummary::default();

    for line in input.lines() {
        let line = line.context("failed to read playlist input")?;
        let url = line.trim();
        if url.is_empty() {
            continue;
        }
        if session.interrupted() {
            break;
        }

        info!(url, "now playing");
        summary.started += 1;
        match session.play(url) {
            Ok(never) => match never {},
            Err(err) if err.is::<Interrupted>() => break,
            Err(err) => {
                summary.failed += 1;
                error!("playback of {url} stopped: {err:#}");
            }
        }
    }

    summary.interrupted = session.interrupted();
    Ok(summary)
}
