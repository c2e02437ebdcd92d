//! Bounded queue for interleaved audio samples.
//!
//! Stages hand audio to each other through [`SampleQueue`]:
//! - the decode thread pushes into one,
//! - the resampler (when active) drains one and fills another,
//! - the CPAL callback drains the final queue without blocking.
//!
//! A queue is closed by its producer when the stream ends; consumers observe
//! the close once the remaining samples are drained, which makes shutdown
//! deterministic.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// Samples are stored interleaved (`frame0[ch0], frame0[ch1], frame1[ch0], ...`)
/// and the channel count is fixed for the queue's lifetime. The capacity bounds
/// memory and end-to-end latency.
pub struct SampleQueue {
    channels: usize,
    max_samples: usize,
    inner: Mutex<Inner>,
    cv: Condvar,
}

struct Inner {
    buf: VecDeque<f32>,
    closed: bool,
}

/// Queue capacity in samples for `seconds` of audio at `rate_hz`/`channels`.
///
/// Non-finite or non-positive durations fall back to a safe default.
pub fn max_samples_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * seconds).ceil() as usize;
    frames.saturating_mul(channels)
}

impl SampleQueue {
    pub fn new(channels: usize, max_samples: usize) -> Self {
        Self {
            channels,
            max_samples,
            inner: Mutex::new(Inner {
                buf: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Channel count of the interleaved stream carried by this queue.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Whether the producer has closed the queue.
    ///
    /// A closed queue may still hold samples until drained.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Mark the stream as finished and wake all waiters. Idempotent.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early, dropping the remainder, if the queue is closed while
    /// waiting; producers use this as their shutdown signal.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;
        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.buf.len() >= self.max_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }

            while offset < samples.len() && g.buf.len() < self.max_samples {
                g.buf.push_back(samples[offset]);
                offset += 1;
            }

            drop(g);
            self.cv.notify_all();
        }
    }

    /// Block until exactly `frames` whole frames are available and pop them.
    ///
    /// Returns `None` if the queue closes before enough data arrives.
    pub fn pop_exact(&self, frames: usize) -> Option<Vec<f32>> {
        let want = frames * self.channels;
        let mut g = self.inner.lock().unwrap();
        while g.buf.len() < want && !g.closed {
            g = self.cv.wait(g).unwrap();
        }
        if g.buf.len() < want {
            return None;
        }
        let out: Vec<f32> = g.buf.drain(..want).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until at least one frame is available, then pop up to
    /// `max_frames` whole frames.
    ///
    /// Returns `None` once the queue is closed and empty. Used to drain the
    /// partial tail of a stream.
    pub fn pop_tail(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        loop {
            let take = (g.buf.len() / self.channels).min(max_frames) * self.channels;
            if take > 0 {
                let out: Vec<f32> = g.buf.drain(..take).collect();
                drop(g);
                self.cv.notify_all();
                return Some(out);
            }
            if g.closed {
                // A ragged partial frame can be left behind; discard it.
                let had_leftover = !g.buf.is_empty();
                g.buf.clear();
                if had_leftover {
                    drop(g);
                    self.cv.notify_all();
                }
                return None;
            }
            g = self.cv.wait(g).unwrap();
        }
    }

    /// Pop up to `max_frames` whole frames without blocking.
    ///
    /// Returns `None` when no whole frame is currently buffered. Safe to call
    /// from the real-time audio callback.
    pub fn pop_now(&self, max_frames: usize) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();
        let take = (g.buf.len() / self.channels).min(max_frames) * self.channels;
        if take == 0 {
            return None;
        }
        let out: Vec<f32> = g.buf.drain(..take).collect();
        drop(g);
        self.cv.notify_all();
        Some(out)
    }

    /// Block until the queue is closed and fully drained.
    ///
    /// The sequencer calls this after submitting a track; returning means the
    /// last frame has been handed to the output callback.
    pub fn wait_drained(&self) {
        let mut g = self.inner.lock().unwrap();
        while !(g.closed && g.buf.is_empty()) {
            g = self.cv.wait(g).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn max_samples_for_sizes_and_fallbacks() {
        assert_eq!(max_samples_for(44_100, 2, 2.0), 176_400);
        assert_eq!(max_samples_for(44_100, 2, -1.0), 176_400);
        assert_eq!(max_samples_for(44_100, 2, f32::NAN), 176_400);
    }

    #[test]
    fn pop_now_returns_none_when_empty() {
        let q = SampleQueue::new(2, 16);
        assert!(q.pop_now(4).is_none());
    }

    #[test]
    fn pop_now_returns_whole_frames_only() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0, 3.0]);
        let out = q.pop_now(4).unwrap();
        assert_eq!(out, vec![1.0, 2.0]);
    }

    #[test]
    fn pop_exact_waits_for_enough_frames() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let producer = q.clone();

        let consumer = thread::spawn(move || {
            let out = q.pop_exact(3).unwrap();
            assert_eq!(out.len(), 6);
        });

        producer.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
        producer.push_blocking(&[0.5, 0.6]);
        consumer.join().unwrap();
    }

    #[test]
    fn pop_exact_returns_none_when_closed_short() {
        let q = SampleQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop_exact(2).is_none());
    }

    #[test]
    fn pop_tail_drains_then_observes_close() {
        let q = Arc::new(SampleQueue::new(2, 64));
        let producer = q.clone();

        let consumer = thread::spawn(move || {
            let out = q.pop_tail(8).unwrap();
            assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
            assert!(q.pop_tail(8).is_none());
        });

        producer.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        producer.close();
        consumer.join().unwrap();
    }

    #[test]
    fn push_blocking_returns_early_after_close() {
        let q = Arc::new(SampleQueue::new(1, 2));
        q.push_blocking(&[1.0, 2.0]);

        let producer = q.clone();
        let blocked = thread::spawn(move || {
            // Queue is full; this blocks until close() wakes it.
            producer.push_blocking(&[3.0, 4.0]);
        });

        q.close();
        blocked.join().unwrap();
    }

    #[test]
    fn wait_drained_returns_once_closed_and_empty() {
        let q = Arc::new(SampleQueue::new(2, 64));
        q.push_blocking(&[1.0, 2.0]);

        let drainer = q.clone();
        let handle = thread::spawn(move || {
            drainer.pop_now(1);
            drainer.close();
        });

        handle.join().unwrap();
        q.wait_drained();
        assert!(q.is_closed());
    }
}
