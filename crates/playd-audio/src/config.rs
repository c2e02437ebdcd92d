/// Tuning parameters shared by the decode/resample/playback stages.
#[derive(Clone, Debug)]
pub struct PipelineTuning {
    /// Resampler input chunk size in frames.
    pub chunk_frames: usize,
    /// Max frames pulled from the queue per output callback refill.
    pub refill_max_frames: usize,
    /// Target buffer duration used to size the stage queues.
    pub buffer_seconds: f32,
}

impl Default for PipelineTuning {
    fn default() -> Self {
        Self {
            chunk_frames: 1024,
            refill_max_frames: 4096,
            buffer_seconds: 2.0,
        }
    }
}
