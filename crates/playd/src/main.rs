//! playd — a background music player for a local playlist.
//!
//! The foreground command manages `playlist.json` and the `music/` directory
//! and controls a detached player process through a PID file:
//!
//! - `add` / `remove` / `playlist`: edit and inspect the playlist.
//! - `run`: spawn the player in the background (same binary, hidden
//!   `player` subcommand, stdio detached).
//! - `status` / `stop`: report or end the recorded player process; stop lets
//!   the current song finish.

mod cli;
mod paths;
mod player;
mod playlist;
mod store;
mod supervisor;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use playd_audio::config::PipelineTuning;
use playd_audio::sequencer::SequenceOptions;

use crate::cli::Command;
use crate::paths::Layout;
use crate::playlist::{Playlist, PlaylistError, Selector};
use crate::supervisor::{DaemonStatus, DetachedSpawner, PlayerOptions, SupervisorError};

fn main() -> Result<()> {
    let args = cli::Args::parse();
    let layout = Layout::current();

    match args.cmd {
        // The detached child: logging goes to a file, not a terminal.
        Command::Player { shuffle, device } => player::run(
            &layout,
            SequenceOptions {
                shuffle,
                device,
                tuning: PipelineTuning::default(),
            },
        ),
        cmd => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
                )
                .init();

            match cmd {
                Command::Add { source } => cmd_add(&layout, &source),
                Command::Remove { selector } => cmd_remove(&layout, &selector),
                Command::Playlist => cmd_playlist(&layout),
                Command::Run { shuffle, device } => cmd_run(&layout, shuffle, device),
                Command::Status => cmd_status(&layout),
                Command::Stop => cmd_stop(&layout),
                Command::Player { .. } => unreachable!("handled above"),
            }
        }
    }
}

fn cmd_add(layout: &Layout, source: &str) -> Result<()> {
    let added = if store::looks_like_url(source) {
        vec![store::download(source, &layout.music_dir)?]
    } else {
        store::ingest(Path::new(source), &layout.music_dir)?
    };

    if added.is_empty() {
        println!("No music files found in {source}.");
        return Ok(());
    }

    let mut playlist = Playlist::load_or_default(&layout.playlist_file);
    let new_entries = playlist.add(added.iter().cloned());
    playlist.save(&layout.playlist_file)?;

    println!(
        "Added {} music file(s) to the playlist ({} new).",
        added.len(),
        new_entries
    );
    Ok(())
}

fn cmd_remove(layout: &Layout, selector: &str) -> Result<()> {
    let mut playlist = match Playlist::load(&layout.playlist_file) {
        Ok(playlist) => playlist,
        Err(PlaylistError::NotFound(_)) => {
            println!("No playlist found. Use 'playd add' to add music files first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match playlist.remove(&Selector::parse(selector)) {
        Ok(removed) => {
            playlist.save(&layout.playlist_file)?;
            println!("Removed {removed}. {} song(s) remaining.", playlist.len());
        }
        Err(e @ (PlaylistError::IndexOutOfRange { .. } | PlaylistError::UnknownTrack(_))) => {
            println!("{e}");
            println!("Use 'playd playlist' to see the current songs.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn cmd_playlist(layout: &Layout) -> Result<()> {
    let playlist = match Playlist::load(&layout.playlist_file) {
        Ok(playlist) => playlist,
        Err(PlaylistError::NotFound(_)) => {
            println!("No playlist found. Use 'playd add' to add music files first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if playlist.is_empty() {
        println!("Playlist is empty. Use 'playd add' to add music files.");
        return Ok(());
    }

    println!("Playlist ({} songs):", playlist.len());
    println!("{}", "-".repeat(80));
    for (i, name) in playlist.files().iter().enumerate() {
        let path = layout.music_dir.join(name);
        match std::fs::metadata(&path) {
            Ok(meta) => {
                let ext = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_uppercase();
                println!(
                    "{:3}. {name} ({ext}, {})",
                    i + 1,
                    store::format_bytes(meta.len())
                );
            }
            Err(_) => println!("{:3}. {name} [file not found]", i + 1),
        }
    }
    println!("{}", "-".repeat(80));
    Ok(())
}

fn cmd_run(layout: &Layout, shuffle: bool, device: Option<String>) -> Result<()> {
    let playlist = match Playlist::load(&layout.playlist_file) {
        Ok(playlist) => playlist,
        Err(PlaylistError::NotFound(_)) => {
            println!("No playlist found. Use 'playd add' to add music files first.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if playlist.is_empty() {
        println!("Playlist is empty. Use 'playd add' to add music files.");
        return Ok(());
    }

    let opts = PlayerOptions { shuffle, device };
    match supervisor::start(&layout.pid_file, &DetachedSpawner, &opts) {
        Ok(pid) => {
            println!("Music player started in the background (PID {pid}).");
            println!("Use 'playd status' to check it or 'playd stop' to stop it.");
        }
        Err(SupervisorError::AlreadyRunning) => {
            println!("Music player is already running!");
            println!("Use 'playd status' to check it or 'playd stop' to stop it.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn cmd_status(layout: &Layout) -> Result<()> {
    match supervisor::status(&layout.pid_file)? {
        DaemonStatus::Stopped => {
            println!("Status: STOPPED");
            println!("Use 'playd run' to start playing music.");
        }
        DaemonStatus::Running(pid) => {
            println!("Status: RUNNING (PID {pid})");
            println!("Use 'playd stop' to stop the player.");
        }
    }
    Ok(())
}

fn cmd_stop(layout: &Layout) -> Result<()> {
    match supervisor::stop(&layout.pid_file) {
        Ok(pid) => {
            println!("Stopping music player (PID {pid})...");
            println!("The player will stop after the current song finishes.");
        }
        Err(SupervisorError::NotRunning) => {
            println!("No music player is currently running.");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
