//! Playback engine for the playd daemon.
//!
//! ## Pipeline
//! 1. **Decode**: a background thread uses Symphonia to decode one track into
//!    interleaved `f32` samples.
//! 2. **Resample**: when the track's native rate differs from the output rate,
//!    a background thread uses Rubato to convert it.
//! 3. **Playback**: the CPAL callback pulls samples without blocking and writes
//!    them to the device.
//!
//! Stages communicate via bounded queues ([`queue::SampleQueue`]); the caller
//! that submits a track blocks until the final queue is closed and drained,
//! which keeps tracks strictly ordered and non-overlapping.
//!
//! [`sequencer`] drives the pipeline over a whole track list, skipping files
//! it cannot open and honoring a cancellation token between tracks.

pub mod config;
pub mod decode;
pub mod device;
pub mod pipeline;
pub mod playback;
pub mod queue;
pub mod resample;
pub mod sequencer;
