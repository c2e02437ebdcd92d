//! Detached player process entry point.
//!
//! Runs in the child spawned by `playd run`: loads the playlist, plays it
//! through the sequencer, and removes the daemon record on the way out. A
//! termination signal sets the cancellation token, so the current track
//! finishes before the process exits.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use playd_audio::sequencer::{self, SequenceOptions};

use crate::paths::Layout;
use crate::playlist::{Playlist, PlaylistError};
use crate::supervisor;

/// Removes the daemon record when the player exits, clean or not.
struct RecordGuard(PathBuf);

impl Drop for RecordGuard {
    fn drop(&mut self) {
        supervisor::clear_record(&self.0);
    }
}

/// Run the player to playlist exhaustion or until signalled.
pub fn run(layout: &Layout, opts: SequenceOptions) -> Result<()> {
    init_logging(layout)?;
    let _record = RecordGuard(layout.pid_file.clone());

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            tracing::info!("termination signal received; finishing current track");
            cancel.store(true, Ordering::Relaxed);
        })
        .context("install signal handler")?;
    }

    let playlist = match Playlist::load(&layout.playlist_file) {
        Ok(playlist) => playlist,
        Err(PlaylistError::NotFound(_)) => {
            tracing::warn!("no playlist; nothing to play");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if playlist.is_empty() {
        tracing::warn!("playlist is empty; nothing to play");
        return Ok(());
    }

    let summary = sequencer::run(&layout.music_dir, playlist.files(), &opts, &cancel)?;
    tracing::info!(
        played = summary.played,
        skipped = summary.skipped,
        "playback finished"
    );

    Ok(())
}

/// Log to a file; the player's stdio is detached from any terminal.
fn init_logging(layout: &Layout) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&layout.log_file)
        .with_context(|| format!("open {}", layout.log_file.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,playd=info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_guard_removes_the_record_on_drop() {
        let dir = std::env::temp_dir().join(format!(
            "playd-player-guard-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        let pid_file = dir.join("playd.pid");
        std::fs::write(&pid_file, b"123").unwrap();

        drop(RecordGuard(pid_file.clone()));
        assert!(!pid_file.exists());
    }

    #[test]
    fn record_guard_tolerates_a_missing_record() {
        let pid_file = std::env::temp_dir().join("playd-player-guard-absent.pid");
        let _ = std::fs::remove_file(&pid_file);
        drop(RecordGuard(pid_file));
    }
}
