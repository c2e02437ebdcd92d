//! Streaming decode stage.
//!
//! Dispatches on the file extension, then uses Symphonia to:
//! - probe the container/codec
//! - decode packets into interleaved `f32` samples
//! - push samples into a bounded [`SampleQueue`] from a background thread
//!
//! The queue is closed on EOF or error.

use std::ffi::OsStr;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{CodecParameters, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::queue::{SampleQueue, max_samples_for};

/// Formats the player knows how to decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackFormat {
    Mp3,
    Wav,
}

impl TrackFormat {
    /// Classify a track by its file extension.
    ///
    /// FLAC is recognized but rejected up front so we never hand it to the
    /// decoder; everything else unknown fails as unsupported.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(OsStr::to_str)
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "flac" => bail!("FLAC playback is not supported yet"),
            "" => bail!("no file extension: {}", path.display()),
            other => bail!("unsupported audio format: .{other}"),
        }
    }

    fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
        }
    }
}

/// A track opened for playback: its native format plus the sample stream.
pub struct DecodedTrack {
    /// Native sample rate and channel layout.
    pub spec: SignalSpec,
    /// Queue filled by the background decode thread.
    pub samples: Arc<SampleQueue>,
    /// Best-effort track duration.
    pub duration_ms: Option<u64>,
}

/// Open `path` and start a background thread decoding it into a bounded queue.
pub fn start_decode(path: &Path, buffer_seconds: f32) -> Result<DecodedTrack> {
    let format = TrackFormat::from_path(path)?;

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    hint.with_extension(format.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("probe {}", path.display()))?;

    let reader = probed.format;
    let track = reader
        .default_track()
        .ok_or_else(|| anyhow!("no audio track in {}", path.display()))?;

    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| anyhow!("unknown channel layout"))?;
    let rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("unknown sample rate"))?;
    let spec = SignalSpec::new(rate, channels);

    let codec_params = track.codec_params.clone();
    let duration_ms = duration_ms_from_params(&codec_params);

    let samples = Arc::new(SampleQueue::new(
        channels.count(),
        max_samples_for(rate, channels.count(), buffer_seconds),
    ));

    let queue = samples.clone();
    thread::spawn(move || {
        if let Err(e) = decode_loop(reader, codec_params, &queue) {
            tracing::warn!("decode thread error: {e:#}");
        }
        queue.close();
    });

    Ok(DecodedTrack {
        spec,
        samples,
        duration_ms,
    })
}

/// Decode packets from a probed reader and push interleaved `f32` into `queue`.
fn decode_loop(
    mut reader: Box<dyn symphonia::core::formats::FormatReader>,
    codec_params: CodecParameters,
    queue: &Arc<SampleQueue>,
) -> Result<()> {
    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(_) => break, // EOF
        };

        // Corrupt packets are recoverable; skip them.
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(_) => continue,
        };

        let mut buf = SampleBuffer::<f32>::new(decoded.frames() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);

        queue.push_blocking(buf.samples());
    }

    Ok(())
}

/// Best-effort duration in milliseconds from codec metadata.
fn duration_ms_from_params(params: &CodecParameters) -> Option<u64> {
    let frames = params.n_frames?;
    let rate = params.sample_rate? as u64;
    if rate == 0 {
        return None;
    }
    Some(frames.saturating_mul(1000) / rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_path_accepts_decodable_formats() {
        assert_eq!(
            TrackFormat::from_path(Path::new("music/song.mp3")).unwrap(),
            TrackFormat::Mp3
        );
        assert_eq!(
            TrackFormat::from_path(Path::new("music/Song.WAV")).unwrap(),
            TrackFormat::Wav
        );
    }

    #[test]
    fn from_path_rejects_flac_without_probing() {
        let err = TrackFormat::from_path(Path::new("song.flac")).unwrap_err();
        assert!(err.to_string().contains("FLAC"));
    }

    #[test]
    fn from_path_rejects_unknown_and_missing_extensions() {
        let err = TrackFormat::from_path(Path::new("song.ogg")).unwrap_err();
        assert!(err.to_string().contains("unsupported"));
        assert!(TrackFormat::from_path(Path::new("song")).is_err());
    }

    #[test]
    fn duration_ms_from_params_computes() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(44_100);
        params.n_frames = Some(88_200);
        assert_eq!(duration_ms_from_params(&params), Some(2000));
    }

    #[test]
    fn duration_ms_from_params_handles_zero_rate() {
        let mut params = CodecParameters::new();
        params.sample_rate = Some(0);
        params.n_frames = Some(100);
        assert!(duration_ms_from_params(&params).is_none());
    }
}
