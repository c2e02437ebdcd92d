//! Playback stage (CPAL output stream).
//!
//! Builds the output stream for one track. The real-time callback:
//! - refills a small local buffer from the sample queue without blocking
//! - applies basic channel mapping (mono↔stereo, best-effort otherwise)
//! - converts `f32` samples to the device sample format
//!
//! Underruns are filled with silence; the callback never blocks.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use cpal::traits::DeviceTrait;

use crate::queue::SampleQueue;

/// Build a CPAL output stream that drains `source`.
///
/// `source` must carry interleaved `f32` samples already at the device sample
/// rate. `refill_max_frames` caps how many frames one callback pulls from the
/// queue; larger values reduce lock churn at the cost of latency.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    source: &Arc<SampleQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, source, refill_max_frames),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, source, refill_max_frames),
        cpal::SampleFormat::I32 => build_stream::<i32>(device, config, source, refill_max_frames),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, source, refill_max_frames),
        other => Err(anyhow!("unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source: &Arc<SampleQueue>,
    refill_max_frames: usize,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = config.channels as usize;
    let refill_max_frames = refill_max_frames.max(1);
    let source = source.clone();

    let mut refill = Refill {
        pending: Vec::new(),
        pos: 0,
        src_channels: source.channels(),
    };

    let err_fn = |err| tracing::warn!("output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            let frames = data.len() / channels_out;
            for frame in 0..frames {
                if refill.exhausted() && !refill.refetch(&source, refill_max_frames) {
                    // Nothing buffered; emit silence for the rest of the cycle.
                    for slot in &mut data[frame * channels_out..] {
                        *slot = <T as cpal::Sample>::from_sample::<f32>(0.0);
                    }
                    break;
                }
                for ch in 0..channels_out {
                    let sample = refill.next_mapped(channels_out, ch);
                    data[frame * channels_out + ch] = <T as cpal::Sample>::from_sample::<f32>(sample);
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Local buffer between the queue and the device so the callback touches the
/// queue lock at most once per cycle.
struct Refill {
    pending: Vec<f32>,
    pos: usize,
    src_channels: usize,
}

impl Refill {
    fn exhausted(&self) -> bool {
        self.pos >= self.pending.len()
    }

    fn refetch(&mut self, source: &SampleQueue, max_frames: usize) -> bool {
        self.pos = 0;
        self.pending.clear();
        match source.pop_now(max_frames) {
            Some(samples) => {
                self.pending = samples;
                true
            }
            None => false,
        }
    }

    /// Next output sample for destination channel `dst_ch`.
    ///
    /// Mapping: mono→stereo duplicates, stereo→mono averages, other layouts
    /// clamp to the available source channels. The read position advances one
    /// source frame after the last destination channel.
    fn next_mapped(&mut self, dst_channels: usize, dst_ch: usize) -> f32 {
        let frame = self.pos;
        let src = |ch: usize| -> f32 {
            if ch < self.src_channels && frame + ch < self.pending.len() {
                self.pending[frame + ch]
            } else {
                0.0
            }
        };

        let out = match (self.src_channels, dst_channels) {
            (1, 1) => src(0),
            (1, 2) => src(0),
            (2, 1) => 0.5 * (src(0) + src(1)),
            (2, 2) => src(dst_ch.min(1)),
            _ => src(dst_ch.min(self.src_channels.saturating_sub(1))),
        };

        if dst_ch + 1 == dst_channels {
            self.pos += self.src_channels;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refill_with(samples: Vec<f32>, src_channels: usize) -> Refill {
        Refill {
            pending: samples,
            pos: 0,
            src_channels,
        }
    }

    #[test]
    fn mono_to_stereo_duplicates_each_sample() {
        let mut refill = refill_with(vec![0.25, 0.5], 1);
        assert_eq!(refill.next_mapped(2, 0), 0.25);
        assert_eq!(refill.next_mapped(2, 1), 0.25);
        assert_eq!(refill.next_mapped(2, 0), 0.5);
        assert_eq!(refill.next_mapped(2, 1), 0.5);
        assert!(refill.exhausted());
    }

    #[test]
    fn stereo_to_mono_averages_the_pair() {
        let mut refill = refill_with(vec![1.0, 0.0, 0.5, 0.5], 2);
        assert_eq!(refill.next_mapped(1, 0), 0.5);
        assert_eq!(refill.next_mapped(1, 0), 0.5);
        assert!(refill.exhausted());
    }

    #[test]
    fn stereo_passthrough_keeps_channel_order() {
        let mut refill = refill_with(vec![0.1, 0.2, 0.3, 0.4], 2);
        assert_eq!(refill.next_mapped(2, 0), 0.1);
        assert_eq!(refill.next_mapped(2, 1), 0.2);
        assert_eq!(refill.next_mapped(2, 0), 0.3);
        assert_eq!(refill.next_mapped(2, 1), 0.4);
    }

    #[test]
    fn refetch_reports_empty_queue() {
        let queue = SampleQueue::new(2, 16);
        let mut refill = refill_with(Vec::new(), 2);
        assert!(!refill.refetch(&queue, 8));

        queue.push_blocking(&[0.1, 0.2]);
        assert!(refill.refetch(&queue, 8));
        assert_eq!(refill.pending, vec![0.1, 0.2]);
    }
}
