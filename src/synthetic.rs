// SPDX-License-Identifier: MPL-2.0
//! A procedural frame source for tests and benchmarks.
//!
//! [`SyntheticSource`] produces a deterministic moving-gradient pattern at a
//! configurable size, rate and duration, with exact seek semantics and an
//! optional silent audio track. It lets the decode/buffer/lookup pipeline be
//! exercised end to end without media files or a codec binding.

use std::collections::VecDeque;
use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::frame::DecodedFrame;
use crate::source::{AudioFrame, FrameSource};

/// Procedural [`FrameSource`] implementation.
///
/// Frame numbers equal the frame's index on the presentation timeline
/// (`pts * fps`), so they stay aligned with presentation order across seeks.
#[derive(Debug)]
pub struct SyntheticSource {
    width: usize,
    height: usize,
    fps: f64,
    length_secs: f64,
    keyframe_interval: i64,
    audio_rate: Option<usize>,
    ready: bool,
    cursor: i64,
    last_pts: f64,
    audio_queue: VecDeque<AudioFrame>,
    buffered_audio_secs: f64,
}

impl SyntheticSource {
    /// Creates a source producing `length_secs * fps` frames of
    /// `width`×`height` video.
    #[must_use]
    pub fn new(width: usize, height: usize, fps: f64, length_secs: f64) -> Self {
        Self {
            width,
            height,
            fps,
            length_secs,
            keyframe_interval: 30,
            audio_rate: None,
            ready: false,
            cursor: 0,
            last_pts: -1.0,
            audio_queue: VecDeque::new(),
            buffered_audio_secs: 0.0,
        }
    }

    /// Sets the spacing of seekable keyframes, in frames.
    #[must_use]
    pub fn with_keyframe_interval(mut self, frames: i64) -> Self {
        self.keyframe_interval = frames.max(1);
        self
    }

    /// Adds a silent stereo audio track at the given sample rate.
    #[must_use]
    pub fn with_audio(mut self, sample_rate: usize) -> Self {
        self.audio_rate = Some(sample_rate);
        self
    }

    #[allow(clippy::cast_possible_truncation)]
    fn total_frames(&self) -> i64 {
        (self.length_secs * self.fps).round() as i64
    }

    #[allow(clippy::cast_precision_loss)]
    fn pts_of(&self, frame: i64) -> f64 {
        frame as f64 / self.fps
    }

    fn fill_pattern(&self, frame: &mut DecodedFrame, number: i64) {
        let shift = (number % 256) as u8;
        let luma: Vec<u8> = (0..self.height)
            .flat_map(|row| {
                (0..self.width).map(move |col| (((row + col) % 256) as u8).wrapping_add(shift))
            })
            .collect();
        frame.fill_plane_y(&luma);

        let chroma_len = self.width * self.height / 4;
        let src_u = vec![128u8.wrapping_add(shift); chroma_len];
        let src_v = vec![128u8.wrapping_sub(shift); chroma_len];
        frame.fill_plane_uv(&src_u, &src_v);
    }

    fn push_audio(&mut self, pts: f64) {
        let Some(rate) = self.audio_rate else { return };
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let samples_per_frame = (rate as f64 / self.fps).round() as usize;
        let frame = AudioFrame::new(vec![0.0; samples_per_frame * 2], 2, rate, pts);
        self.buffered_audio_secs += frame.length_seconds();
        self.audio_queue.push_back(frame);
    }

    fn clear_audio(&mut self) {
        self.audio_queue.clear();
        self.buffered_audio_secs = 0.0;
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self, path: &Path) -> Result<()> {
        debug!(?path, fps = self.fps, length = self.length_secs, "opening synthetic source");
        self.ready = true;
        self.cursor = 0;
        self.last_pts = -1.0;
        self.clear_audio();
        Ok(())
    }

    fn close(&mut self) {
        self.ready = false;
        self.clear_audio();
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn seek_second(&mut self, secs: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let target = (secs * self.fps).round() as i64;
        self.cursor = target.clamp(0, self.total_frames());
        self.clear_audio();
        debug!(secs, frame = self.cursor, "synthetic seek");
        Ok(())
    }

    fn seek_keyframe(&mut self, secs: f64) -> Result<()> {
        #[allow(clippy::cast_possible_truncation)]
        let frame = (secs * self.fps).ceil() as i64;
        // `i64::div_ceil` is unstable; `div_euclid` floors for a positive
        // divisor, so this computes the same ceiling division.
        let snapped =
            (frame + self.keyframe_interval - 1).div_euclid(self.keyframe_interval)
                * self.keyframe_interval;
        self.cursor = snapped.clamp(0, self.total_frames());
        self.clear_audio();
        debug!(secs, frame = self.cursor, "synthetic keyframe seek");
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if !self.ready || self.cursor >= self.total_frames() {
            return Ok(None);
        }

        let number = self.cursor;
        let pts = self.pts_of(number);
        let consecutive = self.last_pts < 0.0 || (pts - self.last_pts).abs() < 1.1 / self.fps;

        let mut frame = DecodedFrame::new(self.width, self.height, number, pts, consecutive);
        self.fill_pattern(&mut frame, number);
        self.push_audio(pts);

        self.cursor += 1;
        self.last_pts = pts;
        Ok(Some(frame))
    }

    fn has_audio_frame(&self) -> bool {
        !self.audio_queue.is_empty()
    }

    fn next_audio_frame(&mut self) -> Option<AudioFrame> {
        let frame = self.audio_queue.pop_front()?;
        self.buffered_audio_secs -= frame.length_seconds();
        Some(frame)
    }

    fn buffered_audio_seconds(&self) -> f64 {
        self.buffered_audio_secs
    }

    fn has_audio_track(&self) -> bool {
        self.audio_rate.is_some()
    }

    fn frames_per_second(&self) -> f64 {
        self.fps
    }

    fn length_in_seconds(&self) -> f64 {
        self.length_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn open_source(fps: f64, secs: f64) -> SyntheticSource {
        let mut source = SyntheticSource::new(8, 8, fps, secs);
        source.open(&PathBuf::from("synthetic")).expect("open");
        source
    }

    #[test]
    fn produces_expected_frame_count_then_ends() {
        let mut source = open_source(10.0, 1.0);
        let mut count = 0;
        while let Some(frame) = source.next_frame().expect("decode") {
            assert_eq!(frame.frame_number(), count);
            count += 1;
        }
        assert_eq!(count, 10);
        assert!(source.next_frame().expect("decode").is_none());
    }

    #[test]
    fn pattern_is_deterministic() {
        let mut a = open_source(10.0, 1.0);
        let mut b = open_source(10.0, 1.0);
        let fa = a.next_frame().expect("decode").expect("frame");
        let fb = b.next_frame().expect("decode").expect("frame");
        assert_eq!(fa.plane_y(), fb.plane_y());
        assert_eq!(fa.plane_uv(), fb.plane_uv());
    }

    #[test]
    fn first_frame_after_open_is_consecutive() {
        let mut source = open_source(30.0, 1.0);
        let frame = source.next_frame().expect("decode").expect("frame");
        assert!(frame.is_consecutive());
    }

    #[test]
    fn frame_after_far_seek_is_not_consecutive() {
        let mut source = open_source(30.0, 10.0);
        source.next_frame().expect("decode").expect("frame");
        source.seek_second(5.0).expect("seek");
        let frame = source.next_frame().expect("decode").expect("frame");
        assert!(!frame.is_consecutive());
        assert!((frame.pts_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn frame_after_adjacent_seek_stays_consecutive() {
        let mut source = open_source(30.0, 10.0);
        source.next_frame().expect("decode").expect("frame"); // frame 0
        source.seek_second(1.0 / 30.0).expect("seek"); // frame 1, one step ahead
        let frame = source.next_frame().expect("decode").expect("frame");
        assert!(frame.is_consecutive());
    }

    #[test]
    fn keyframe_seek_snaps_forward() {
        let mut source = open_source(30.0, 10.0);
        // Keyframes every 30 frames = every second.
        source.seek_keyframe(1.4).expect("seek");
        let frame = source.next_frame().expect("decode").expect("frame");
        assert_eq!(frame.frame_number(), 60);
    }

    #[test]
    fn audio_track_queues_alongside_video() {
        let mut source = SyntheticSource::new(8, 8, 10.0, 1.0).with_audio(48_000);
        source.open(&PathBuf::from("synthetic")).expect("open");
        assert!(source.has_audio_track());
        assert!(!source.has_audio_frame());

        source.next_frame().expect("decode").expect("frame");
        assert!(source.has_audio_frame());
        assert!(source.buffered_audio_seconds() > 0.0);

        let audio = source.next_audio_frame().expect("audio frame");
        assert_eq!(audio.channels(), 2);
        assert!(source.buffered_audio_seconds().abs() < 1e-9);
    }

    #[test]
    fn seek_discards_queued_audio() {
        let mut source = SyntheticSource::new(8, 8, 10.0, 1.0).with_audio(48_000);
        source.open(&PathBuf::from("synthetic")).expect("open");
        source.next_frame().expect("decode").expect("frame");
        assert!(source.has_audio_frame());
        source.seek_second(0.5).expect("seek");
        assert!(!source.has_audio_frame());
    }
}
