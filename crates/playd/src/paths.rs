//! On-disk layout of the player's working directory.

use std::path::{Path, PathBuf};

/// Locations of everything playd persists, rooted at one directory.
///
/// All commands operate on the current working directory; tests point a
/// layout at a temp directory instead.
#[derive(Clone, Debug)]
pub struct Layout {
    /// Flat directory holding the audio files.
    pub music_dir: PathBuf,
    /// The playlist document.
    pub playlist_file: PathBuf,
    /// The daemon record: the player process PID as decimal text.
    pub pid_file: PathBuf,
    /// Player-process log (its stdio is detached).
    pub log_file: PathBuf,
}

impl Layout {
    pub fn in_dir(root: &Path) -> Self {
        Self {
            music_dir: root.join("music"),
            playlist_file: root.join("playlist.json"),
            pid_file: root.join("playd.pid"),
            log_file: root.join("playd.log"),
        }
    }

    /// Layout rooted at the current working directory.
    pub fn current() -> Self {
        Self::in_dir(Path::new("."))
    }
}
