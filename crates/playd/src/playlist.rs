//! Playlist persistence.
//!
//! The playlist is a single JSON document holding an ordered list of file
//! names under the music directory. It is read fully and rewritten fully on
//! every mutation; order is preserved across adds and removals.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("no playlist found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("playlist is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("number {given} is out of range (1..={len})")]
    IndexOutOfRange { given: usize, len: usize },

    #[error("'{0}' is not in the playlist")]
    UnknownTrack(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// How a `remove` target is addressed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selector {
    /// 1-based position in the playlist.
    Index(usize),
    /// Exact file name.
    Name(String),
}

impl Selector {
    /// Numbers select by position; anything else is a file name.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<usize>() {
            Ok(index) => Self::Index(index),
            Err(_) => Self::Name(raw.to_string()),
        }
    }
}

/// The ordered list of track file names.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    files: Vec<String>,
}

impl Playlist {
    /// Load the playlist, failing distinguishably when the file is missing.
    pub fn load(path: &Path) -> Result<Self, PlaylistError> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PlaylistError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    /// Load for ingest: a missing, empty, or corrupt playlist starts fresh.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read(path) {
            Ok(data) if !data.is_empty() => serde_json::from_slice(&data).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Rewrite the whole document, pretty-printed.
    pub fn save(&self, path: &Path) -> Result<(), PlaylistError> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Append names in order, ignoring ones already present.
    ///
    /// Returns how many were actually added.
    pub fn add<I, S>(&mut self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for name in names {
            let name = name.into();
            if !self.files.contains(&name) {
                self.files.push(name);
                added += 1;
            }
        }
        added
    }

    /// Remove one entry by selector, returning the removed file name.
    pub fn remove(&mut self, selector: &Selector) -> Result<String, PlaylistError> {
        match selector {
            Selector::Index(given) => {
                let len = self.files.len();
                if *given < 1 || *given > len {
                    return Err(PlaylistError::IndexOutOfRange { given: *given, len });
                }
                Ok(self.files.remove(given - 1))
            }
            Selector::Name(name) => {
                let pos = self
                    .files
                    .iter()
                    .position(|f| f == name)
                    .ok_or_else(|| PlaylistError::UnknownTrack(name.clone()))?;
                Ok(self.files.remove(pos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_playlist_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "playd-playlist-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("playlist.json")
    }

    fn playlist_of(names: &[&str]) -> Playlist {
        let mut pl = Playlist::default();
        pl.add(names.iter().copied());
        pl
    }

    #[test]
    fn load_reports_missing_file_distinctly() {
        let path = temp_playlist_path("missing");
        assert!(matches!(
            Playlist::load(&path),
            Err(PlaylistError::NotFound(_))
        ));
    }

    #[test]
    fn save_then_load_round_trips_order() {
        let path = temp_playlist_path("roundtrip");
        let pl = playlist_of(&["a.mp3", "b.wav", "c.mp3"]);
        pl.save(&path).unwrap();

        let loaded = Playlist::load(&path).unwrap();
        assert_eq!(loaded.files(), &["a.mp3", "b.wav", "c.mp3"]);
    }

    #[test]
    fn load_or_default_tolerates_corrupt_documents() {
        let path = temp_playlist_path("corrupt");
        std::fs::write(&path, b"{not json").unwrap();
        assert!(Playlist::load_or_default(&path).is_empty());
    }

    #[test]
    fn add_preserves_order_and_skips_duplicates() {
        let mut pl = playlist_of(&["a.mp3", "b.wav"]);
        let added = pl.add(["b.wav".to_string(), "c.mp3".to_string()]);
        assert_eq!(added, 1);
        assert_eq!(pl.files(), &["a.mp3", "b.wav", "c.mp3"]);
    }

    #[test]
    fn remove_by_index_is_one_based_and_keeps_order() {
        let mut pl = playlist_of(&["a.mp3", "b.wav", "c.mp3"]);
        let removed = pl.remove(&Selector::Index(2)).unwrap();
        assert_eq!(removed, "b.wav");
        assert_eq!(pl.files(), &["a.mp3", "c.mp3"]);
    }

    #[test]
    fn remove_by_index_rejects_out_of_range() {
        let mut pl = playlist_of(&["a.mp3"]);
        assert!(matches!(
            pl.remove(&Selector::Index(0)),
            Err(PlaylistError::IndexOutOfRange { given: 0, len: 1 })
        ));
        assert!(matches!(
            pl.remove(&Selector::Index(2)),
            Err(PlaylistError::IndexOutOfRange { given: 2, len: 1 })
        ));
    }

    #[test]
    fn remove_by_name_finds_exact_match() {
        let mut pl = playlist_of(&["a.mp3", "b.wav"]);
        let removed = pl.remove(&Selector::Name("a.mp3".into())).unwrap();
        assert_eq!(removed, "a.mp3");
        assert_eq!(pl.files(), &["b.wav"]);

        assert!(matches!(
            pl.remove(&Selector::Name("zzz.mp3".into())),
            Err(PlaylistError::UnknownTrack(_))
        ));
    }

    #[test]
    fn selector_parse_prefers_numbers() {
        assert_eq!(Selector::parse("3"), Selector::Index(3));
        assert_eq!(
            Selector::parse("song.mp3"),
            Selector::Name("song.mp3".into())
        );
    }
}
