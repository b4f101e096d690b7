// SPDX-License-Identifier: MPL-2.0
//! The pull-source contract consumed by the decoder thread.
//!
//! A [`FrameSource`] is a synchronous, single-threaded producer of decoded
//! frames: the fill loop is its only caller once started, serialized behind
//! the decoder's source lock. Implementations wrap whatever actually
//! demuxes and decodes (a codec binding, a raw-frame pipe, the built-in
//! [`SyntheticSource`](crate::synthetic::SyntheticSource) test pattern).

use std::path::Path;

use crate::error::Result;
use crate::frame::DecodedFrame;

/// One decoded audio frame: interleaved `f32` samples plus timing.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: usize,
    pts_secs: f64,
}

impl AudioFrame {
    /// Creates an audio frame from interleaved samples.
    ///
    /// `samples.len()` must be a multiple of `channels`.
    #[must_use]
    pub fn new(samples: Vec<f32>, channels: usize, sample_rate: usize, pts_secs: f64) -> Self {
        debug_assert!(channels > 0 && samples.len() % channels == 0);
        Self {
            samples,
            channels,
            sample_rate,
            pts_secs,
        }
    }

    /// Interleaved sample data.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[must_use]
    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    #[must_use]
    pub fn pts_secs(&self) -> f64 {
        self.pts_secs
    }

    /// Samples per channel.
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Playable length in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn length_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.sample_count() as f64 / self.sample_rate as f64
    }
}

/// Consumer of audio frames drained by the fill loop.
///
/// Attached to the decoder with
/// [`set_audio_sink`](crate::decoder::DecoderThread::set_audio_sink); when no
/// sink is attached, drained audio frames are dropped.
pub trait AudioSink: Send {
    fn push_frame(&mut self, frame: AudioFrame);
}

/// Synchronous pull-source of decoded video (and optionally audio) frames.
///
/// All methods are called with the decoder's source lock held, so
/// implementations need no internal synchronization.
pub trait FrameSource: Send {
    /// Opens a media source. Errors are reported synchronously to the
    /// caller; this is the only fatal failure path in the crate.
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Closes the source. The fill loop exits once the source reports
    /// not-ready.
    fn close(&mut self);

    /// Whether a source is open and able to decode.
    fn is_ready(&self) -> bool;

    /// Seeks to the given second.
    fn seek_second(&mut self, secs: f64) -> Result<()>;

    /// Seeks to the first keyframe at or after the given second.
    fn seek_keyframe(&mut self, secs: f64) -> Result<()>;

    /// Seeks back to the beginning.
    fn rewind(&mut self) -> Result<()> {
        self.seek_second(0.0)
    }

    /// Pulls the next video frame.
    ///
    /// `Ok(None)` means no frame is available right now (end of stream or a
    /// stall); the fill loop treats it as transient and retries. `Err` is a
    /// decode failure, logged and likewise retried.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;

    /// Whether a decoded audio frame is queued.
    fn has_audio_frame(&self) -> bool {
        false
    }

    /// Pops the next queued audio frame, if any.
    fn next_audio_frame(&mut self) -> Option<AudioFrame> {
        None
    }

    /// Seconds of audio currently queued; the fill loop only drains once
    /// this exceeds its threshold.
    fn buffered_audio_seconds(&self) -> f64 {
        0.0
    }

    fn has_audio_track(&self) -> bool {
        false
    }

    /// Frames per second of the open stream, or 0 if not yet known.
    fn frames_per_second(&self) -> f64;

    /// Estimated stream length in seconds, or 0 if not yet known.
    fn length_in_seconds(&self) -> f64;

    /// Number of decode threads to use; 0 means automatic. Only honored
    /// before [`open`](Self::open).
    fn set_thread_count(&mut self, _threads: usize) {}
}
