//! Per-track pipeline wiring.
//!
//! Connects decode → (resample) → output for a single track and blocks the
//! caller until the last frame has been handed to the device. Tracks are
//! therefore strictly ordered and never overlap.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use cpal::traits::StreamTrait;

use crate::config::PipelineTuning;
use crate::device::Output;
use crate::queue::SampleQueue;
use crate::{decode, playback, resample};

/// Decode and play one track, blocking until it has fully rendered.
///
/// Any error closes the stage queues so background threads shut down and the
/// file handle is released.
pub fn play_track(output: &Output, tuning: &PipelineTuning, path: &Path) -> Result<()> {
    let track = decode::start_decode(path, tuning.buffer_seconds)?;
    tracing::info!(
        track = %path.display(),
        rate_hz = track.spec.rate,
        channels = track.spec.channels.count(),
        duration_ms = track.duration_ms,
        "playing"
    );

    let source = track.samples.clone();
    let result = render(output, tuning, &track);
    if result.is_err() {
        source.close();
    }
    result
}

fn render(output: &Output, tuning: &PipelineTuning, track: &decode::DecodedTrack) -> Result<()> {
    let renderq: Arc<SampleQueue> = if track.spec.rate == output.rate() {
        track.samples.clone()
    } else {
        tracing::debug!(
            from_hz = track.spec.rate,
            to_hz = output.rate(),
            "resampling"
        );
        resample::start_resampler(track.samples.clone(), track.spec, output.rate(), tuning)?
    };

    let stream = playback::build_output_stream(
        output.device(),
        output.stream_config(),
        output.sample_format(),
        &renderq,
        tuning.refill_max_frames,
    );
    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            renderq.close();
            return Err(e);
        }
    };
    if let Err(e) = stream.play() {
        renderq.close();
        return Err(e.into());
    }

    renderq.wait_drained();

    // Give the device a moment to render the final callback buffer before the
    // stream is dropped.
    thread::sleep(Duration::from_millis(100));
    Ok(())
}
