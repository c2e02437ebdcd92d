//! Ordered/shuffled playback of a whole track list.
//!
//! The sequencer resolves each entry under the storage directory, skips
//! anything it cannot open or decode, and checks a cancellation token between
//! tracks so a stop request always lets the current track finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;

use crate::config::PipelineTuning;
use crate::device::Output;
use crate::pipeline;

/// Options for one playback run.
#[derive(Clone, Debug, Default)]
pub struct SequenceOptions {
    /// Play a shuffled copy of the list instead of the stored order.
    pub shuffle: bool,
    /// Output device substring match; `None` uses the default device.
    pub device: Option<String>,
    /// Stage tuning.
    pub tuning: PipelineTuning,
}

/// Cumulative outcome of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tracks rendered to completion.
    pub played: usize,
    /// Tracks skipped because they were missing or undecodable.
    pub skipped: usize,
}

/// The per-track play step, split out so ordering and skip semantics are
/// testable without an audio device.
pub trait TrackPlayer {
    fn play(&mut self, path: &Path) -> Result<()>;
}

struct PipelinePlayer {
    output: Output,
    tuning: PipelineTuning,
}

impl TrackPlayer for PipelinePlayer {
    fn play(&mut self, path: &Path) -> Result<()> {
        pipeline::play_track(&self.output, &self.tuning, path)
    }
}

/// Play `files` (names under `music_dir`) in order, or shuffled.
///
/// Opens the output device once for the whole run; failure to do so is the
/// only fatal error. Per-track failures are logged and skipped.
pub fn run(
    music_dir: &Path,
    files: &[String],
    opts: &SequenceOptions,
    cancel: &Arc<AtomicBool>,
) -> Result<RunSummary> {
    let output = Output::open(opts.device.as_deref())?;
    let mut player = PipelinePlayer {
        output,
        tuning: opts.tuning.clone(),
    };

    let order = plan_order(files, opts.shuffle, &mut rand::thread_rng());
    Ok(play_all(music_dir, &order, &mut player, cancel))
}

/// Build the working order for a run. The caller's list is never mutated.
fn plan_order<R: Rng>(files: &[String], shuffle: bool, rng: &mut R) -> Vec<String> {
    let mut order = files.to_vec();
    if shuffle {
        order.shuffle(rng);
    }
    order
}

fn play_all(
    music_dir: &Path,
    order: &[String],
    player: &mut dyn TrackPlayer,
    cancel: &Arc<AtomicBool>,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for name in order {
        if cancel.load(Ordering::Relaxed) {
            tracing::info!("stop requested; ending run");
            break;
        }

        let path: PathBuf = music_dir.join(name);
        if !path.is_file() {
            tracing::warn!(track = %path.display(), "track file missing; skipping");
            summary.skipped += 1;
            continue;
        }

        match player.play(&path) {
            Ok(()) => summary.played += 1,
            Err(e) => {
                tracing::warn!(track = %path.display(), "cannot play track: {e:#}");
                summary.skipped += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct RecordingPlayer {
        visited: Vec<String>,
        fail_on: Option<String>,
    }

    impl RecordingPlayer {
        fn new() -> Self {
            Self {
                visited: Vec::new(),
                fail_on: None,
            }
        }
    }

    impl TrackPlayer for RecordingPlayer {
        fn play(&mut self, path: &Path) -> Result<()> {
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            self.visited.push(name.clone());
            if self.fail_on.as_deref() == Some(name.as_str()) {
                return Err(anyhow!("decode failed"));
            }
            Ok(())
        }
    }

    fn temp_music_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "playd-sequencer-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plan_order_keeps_sequence_without_shuffle() {
        let files = names(&["a.mp3", "b.wav", "c.mp3"]);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(plan_order(&files, false, &mut rng), files);
    }

    #[test]
    fn plan_order_shuffled_is_a_permutation_and_leaves_input_alone() {
        let files = names(&["a.mp3", "b.wav", "c.mp3", "d.wav", "e.mp3"]);
        let before = files.clone();
        let mut rng = StdRng::seed_from_u64(7);

        let order = plan_order(&files, true, &mut rng);

        assert_eq!(files, before);
        let mut sorted = order.clone();
        sorted.sort();
        let mut expected = files.clone();
        expected.sort();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn play_all_visits_existing_tracks_in_order() {
        let dir = temp_music_dir("order");
        for name in ["a.mp3", "b.wav"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let order = names(&["a.mp3", "b.wav"]);
        let mut player = RecordingPlayer::new();
        let cancel = Arc::new(AtomicBool::new(false));

        let summary = play_all(&dir, &order, &mut player, &cancel);

        assert_eq!(player.visited, vec!["a.mp3", "b.wav"]);
        assert_eq!(summary, RunSummary { played: 2, skipped: 0 });
    }

    #[test]
    fn play_all_skips_missing_files_and_keeps_going() {
        let dir = temp_music_dir("missing");
        for name in ["a.mp3", "b.wav"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let order = names(&["a.mp3", "b.wav", "missing.mp3"]);
        let mut player = RecordingPlayer::new();
        let cancel = Arc::new(AtomicBool::new(false));

        let summary = play_all(&dir, &order, &mut player, &cancel);

        assert_eq!(player.visited, vec!["a.mp3", "b.wav"]);
        assert_eq!(summary, RunSummary { played: 2, skipped: 1 });
    }

    #[test]
    fn play_all_recovers_from_a_failing_track() {
        let dir = temp_music_dir("failing");
        for name in ["a.mp3", "bad.mp3", "c.wav"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let order = names(&["a.mp3", "bad.mp3", "c.wav"]);
        let mut player = RecordingPlayer::new();
        player.fail_on = Some("bad.mp3".to_string());
        let cancel = Arc::new(AtomicBool::new(false));

        let summary = play_all(&dir, &order, &mut player, &cancel);

        assert_eq!(player.visited, vec!["a.mp3", "bad.mp3", "c.wav"]);
        assert_eq!(summary, RunSummary { played: 2, skipped: 1 });
    }

    #[test]
    fn play_all_stops_at_the_track_boundary_when_cancelled() {
        let dir = temp_music_dir("cancel");
        for name in ["a.mp3", "b.wav"] {
            std::fs::write(dir.join(name), b"x").unwrap();
        }

        let order = names(&["a.mp3", "b.wav"]);
        let mut player = RecordingPlayer::new();
        let cancel = Arc::new(AtomicBool::new(true));

        let summary = play_all(&dir, &order, &mut player, &cancel);

        assert!(player.visited.is_empty());
        assert_eq!(summary, RunSummary::default());
    }
}
