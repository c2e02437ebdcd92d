//! Output device selection.
//!
//! Thin wrappers around CPAL that pick an output device (default or by
//! substring match) and a stream config targeting the fixed output rate the
//! whole run plays at.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Every run renders at this rate; tracks at other rates are resampled.
pub const OUTPUT_RATE_HZ: u32 = 44_100;

/// Output buffer of roughly a tenth of a second of audio.
pub fn output_buffer_frames(rate_hz: u32) -> u32 {
    (rate_hz / 10).max(1)
}

/// The audio sink for one playback run.
///
/// Opened exactly once per run; per-track output streams are built against
/// its device and config.
pub struct Output {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
    stream_config: cpal::StreamConfig,
}

impl Output {
    /// Open the output device, preferring the fixed output rate and a small
    /// fixed buffer. Failure here means there is nothing to play through.
    pub fn open(needle: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, needle)?;
        let config = pick_output_config(&device, OUTPUT_RATE_HZ)?;

        let mut stream_config: cpal::StreamConfig = config.clone().into();
        stream_config.buffer_size = pick_buffer_size(
            config.buffer_size(),
            output_buffer_frames(stream_config.sample_rate),
        );

        tracing::info!(
            device = %device.description()?,
            rate_hz = stream_config.sample_rate,
            channels = stream_config.channels,
            buffer = ?stream_config.buffer_size,
            "output device ready"
        );

        Ok(Self {
            device,
            config,
            stream_config,
        })
    }

    pub fn device(&self) -> &cpal::Device {
        &self.device
    }

    pub fn sample_format(&self) -> cpal::SampleFormat {
        self.config.sample_format()
    }

    pub fn stream_config(&self) -> &cpal::StreamConfig {
        &self.stream_config
    }

    /// Effective output sample rate.
    pub fn rate(&self) -> u32 {
        self.stream_config.sample_rate
    }
}

/// Pick the first output device whose name contains `needle`
/// (case-insensitive), or the host default device.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("no output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .map(|desc| matches_device_name(&desc.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("no output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device"))
}

/// Choose the output config closest to `target_rate`.
///
/// Exact-rate support wins; otherwise the supported rate nearest the target.
/// `f32` output is preferred over integer formats at equal rates.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> =
        device.supported_output_configs()?.collect();
    if ranges.is_empty() {
        return Err(anyhow!("no supported output configs"));
    }

    let mut best: Option<(u32, u8, cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let rate = clamp_rate(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let distance = rate.abs_diff(target_rate);
        let rank = sample_format_rank(range.sample_format());
        let replace = match &best {
            None => true,
            Some((best_distance, best_rank, _)) => {
                distance < *best_distance || (distance == *best_distance && rank < *best_rank)
            }
        };
        if replace {
            best = Some((distance, rank, range.with_sample_rate(rate)));
        }
    }

    Ok(best.unwrap().2)
}

/// Request a fixed buffer of `desired` frames, clamped to what the device
/// supports. Falls back to the device default when no range is advertised.
pub fn pick_buffer_size(supported: &cpal::SupportedBufferSize, desired: u32) -> cpal::BufferSize {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            cpal::BufferSize::Fixed(desired.clamp(*min, *max))
        }
        cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
    }
}

fn clamp_rate(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max)
}

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I32 => 1,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 3,
        _ => 10,
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_buffer_frames_is_a_tenth_of_a_second() {
        assert_eq!(output_buffer_frames(OUTPUT_RATE_HZ), 4_410);
        assert_eq!(output_buffer_frames(48_000), 4_800);
    }

    #[test]
    fn clamp_rate_prefers_target_when_supported() {
        assert_eq!(clamp_rate(8_000, 96_000, 44_100), 44_100);
    }

    #[test]
    fn clamp_rate_clamps_to_range_edges() {
        assert_eq!(clamp_rate(48_000, 96_000, 44_100), 48_000);
        assert_eq!(clamp_rate(8_000, 22_050, 44_100), 22_050);
    }

    #[test]
    fn pick_buffer_size_clamps_into_supported_range() {
        let supported = cpal::SupportedBufferSize::Range { min: 64, max: 2_048 };
        assert_eq!(
            pick_buffer_size(&supported, 4_410),
            cpal::BufferSize::Fixed(2_048)
        );
        assert_eq!(
            pick_buffer_size(&supported, 1_024),
            cpal::BufferSize::Fixed(1_024)
        );
    }

    #[test]
    fn pick_buffer_size_defaults_when_unknown() {
        assert_eq!(
            pick_buffer_size(&cpal::SupportedBufferSize::Unknown, 4_410),
            cpal::BufferSize::Default
        );
    }

    #[test]
    fn matches_device_name_is_case_insensitive() {
        assert!(matches_device_name("USB DAC", "dac"));
        assert!(matches_device_name("usb dac", "USB"));
        assert!(!matches_device_name("USB DAC", "speaker"));
        assert!(!matches_device_name("USB DAC", ""));
    }
}
