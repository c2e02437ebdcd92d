//! Streaming resample stage.
//!
//! Uses Rubato to convert decoded interleaved `f32` audio from the track's
//! native rate to the output rate. Runs in a background thread between two
//! bounded [`SampleQueue`]s; the output queue closes once the input queue is
//! closed and its tail has been flushed.

use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use audioadapter_buffers::direct::InterleavedSlice;
use rubato::{
    Async, FixedAsync, Indexing, Resampler, SincInterpolationParameters, SincInterpolationType,
    WindowFunction, calculate_cutoff,
};
use symphonia::core::audio::SignalSpec;

use crate::config::PipelineTuning;
use crate::queue::{SampleQueue, max_samples_for};

/// Start a background thread resampling `source` (at `src_spec.rate`) to
/// `dst_rate`, returning the queue the playback stage should drain.
pub fn start_resampler(
    source: Arc<SampleQueue>,
    src_spec: SignalSpec,
    dst_rate: u32,
    tuning: &PipelineTuning,
) -> Result<Arc<SampleQueue>> {
    let channels = src_spec.channels.count();
    let chunk_frames = tuning.chunk_frames.max(1);

    let sinc_len = 128;
    let window = WindowFunction::BlackmanHarris2;
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff: calculate_cutoff(sinc_len, window),
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window,
    };

    let ratio = dst_rate as f64 / src_spec.rate as f64;
    let mut resampler = Async::<f32>::new_sinc(
        ratio,
        1.1,
        &params,
        chunk_frames,
        channels,
        FixedAsync::Input,
    )
    .with_context(|| format!("resampler init {} -> {} Hz", src_spec.rate, dst_rate))?;

    let resampled = Arc::new(SampleQueue::new(
        channels,
        max_samples_for(dst_rate, channels, tuning.buffer_seconds),
    ));

    let sink = resampled.clone();
    thread::spawn(move || {
        let mut out = vec![0.0f32; channels * chunk_frames * 3];

        // Steady state: full chunks while the decoder keeps up.
        while let Some(block) = source.pop_exact(chunk_frames) {
            match push_resampled(&mut resampler, &block, channels, None, &mut out, &sink) {
                Ok(()) => {}
                Err(e) => {
                    tracing::warn!("resampler error: {e:#}");
                    source.close();
                    sink.close();
                    return;
                }
            }
        }

        // The source closed; flush whatever partial chunks remain.
        while let Some(tail) = source.pop_tail(chunk_frames) {
            let tail_frames = tail.len() / channels;
            if tail_frames == 0 {
                continue;
            }
            if let Err(e) = push_resampled(
                &mut resampler,
                &tail,
                channels,
                Some(tail_frames),
                &mut out,
                &sink,
            ) {
                tracing::warn!("resampler tail error: {e:#}");
                break;
            }
        }

        sink.close();
    });

    Ok(resampled)
}

/// Run one block through the resampler and push the produced samples.
///
/// `partial_frames` is set for the final short block of a stream.
fn push_resampled(
    resampler: &mut Async<f32>,
    input: &[f32],
    channels: usize,
    partial_frames: Option<usize>,
    out: &mut [f32],
    sink: &Arc<SampleQueue>,
) -> Result<()> {
    let in_frames = input.len() / channels;
    let input_adapter = InterleavedSlice::new(input, channels, in_frames)
        .map_err(|e| anyhow!("resampler input adapter: {e}"))?;

    let out_capacity_frames = out.len() / channels;
    let mut output_adapter = InterleavedSlice::new_mut(out, channels, out_capacity_frames)
        .map_err(|e| anyhow!("resampler output adapter: {e}"))?;

    let indexing = Indexing {
        input_offset: 0,
        output_offset: 0,
        active_channels_mask: None,
        partial_len: partial_frames,
    };

    let (_consumed, produced) = resampler
        .process_into_buffer(&input_adapter, &mut output_adapter, Some(&indexing))
        .context("resampler process")?;

    let produced_samples = produced * channels;
    if produced_samples > 0 {
        sink.push_blocking(&out[..produced_samples]);
    }
    Ok(())
}
