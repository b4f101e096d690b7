// SPDX-License-Identifier: MPL-2.0
//! The background decoding thread.
//!
//! [`DecoderThread`] owns a [`FrameSource`] and a [`FrameCache`] and runs a
//! fill loop on a worker thread: pull a frame from the source, expand it,
//! store it in the cache, repeat, throttled by the cache's capacity bounds.
//! Caller threads read frames out through [`get_frames`] and steer the
//! source through the seek and dispose operations.
//!
//! The fill loop never holds the source lock and the cache lock at the same
//! time, so a caller blocked on one never waits on a decode in the other.
//!
//! [`get_frames`]: DecoderThread::get_frames

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::{Bracket, CacheConfig, EntrySnapshot, FrameCache};
use crate::error::Result;
use crate::source::{AudioFrame, AudioSink, FrameSource};
use crate::sync::AtomicSeconds;

/// Sleep between fill-loop passes when the buffer is full or the source has
/// nothing to give.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Byte headroom required below the cache's byte bound before decoding
/// another frame (1 MiB).
const EVICT_BYTES_HEADROOM: usize = 1024 * 1024;

/// Queued audio is drained to the sink once it exceeds this many seconds.
const AUDIO_DRAIN_THRESHOLD_SECS: f64 = 1.0;

/// IIR smoothing factor for the average decoding rate.
const FPS_SMOOTHING: f64 = 1.0 / 60.0;

struct Shared {
    source: Mutex<Box<dyn FrameSource>>,
    cache: Mutex<FrameCache>,
    audio_sink: Mutex<Option<Box<dyn AudioSink>>>,
    config: CacheConfig,
    running: AtomicBool,
    stop_requested: AtomicBool,
    video_ended: AtomicBool,
    video_fps: AtomicSeconds,
    video_length: AtomicSeconds,
    /// Presentation time of the first frame delivered after a seek.
    seek_available: AtomicSeconds,
    decoding_fps: AtomicSeconds,
    decoding_fps_avg: AtomicSeconds,
    current_width: AtomicUsize,
    current_height: AtomicUsize,
}

/// Handle to the background decoder. All methods are callable from any
/// thread; dropping the handle stops the worker and waits for it.
pub struct DecoderThread {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DecoderThread {
    /// Creates a decoder over the given source. The worker does not start
    /// until [`start`](Self::start).
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>, config: CacheConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                source: Mutex::new(source),
                cache: Mutex::new(FrameCache::new()),
                audio_sink: Mutex::new(None),
                config,
                running: AtomicBool::new(false),
                stop_requested: AtomicBool::new(false),
                video_ended: AtomicBool::new(false),
                video_fps: AtomicSeconds::unset(),
                video_length: AtomicSeconds::unset(),
                seek_available: AtomicSeconds::unset(),
                decoding_fps: AtomicSeconds::unset(),
                decoding_fps_avg: AtomicSeconds::unset(),
                current_width: AtomicUsize::new(0),
                current_height: AtomicUsize::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Opens a media source and resets the buffer. The worker may already be
    /// running; it picks up the new stream on its next pass.
    pub fn open(&self, path: &Path) -> Result<()> {
        {
            let mut source = self.shared.source.lock();
            source.open(path)?;
            self.shared.video_fps.store(source.frames_per_second());
            self.shared.video_length.store(source.length_in_seconds());
        }
        self.shared.video_ended.store(false, Ordering::SeqCst);
        self.shared.cache.lock().clear();
        self.shared.seek_available.clear();
        Ok(())
    }

    /// Stops the worker and closes the source.
    pub fn close(&self) {
        self.stop(true);
        self.shared.source.lock().close();
        self.shared.cache.lock().clear();
        self.shared.seek_available.clear();
        self.shared.video_fps.clear();
        self.shared.video_length.clear();
        self.shared.current_width.store(0, Ordering::SeqCst);
        self.shared.current_height.store(0, Ordering::SeqCst);
    }

    /// Starts the fill loop. A no-op while it is already running.
    pub fn start(&self) -> Result<()> {
        if self.shared.running.load(Ordering::SeqCst)
            && !self.shared.stop_requested.load(Ordering::SeqCst)
        {
            return Ok(());
        }
        // Collect a previous worker that was asked to stop.
        self.stop(true);

        self.shared.cache.lock().clear();
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.video_ended.store(false, Ordering::SeqCst);
        self.shared.running.store(true, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name("framewell-decoder".into())
            .spawn(move || fill_loop(&shared));
        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.running.store(false, Ordering::SeqCst);
                Err(err.into())
            }
        }
    }

    /// Asks the fill loop to exit; with `blocking`, also waits for it.
    pub fn stop(&self, blocking: bool) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        if blocking {
            if let Some(handle) = self.worker.lock().take() {
                let _ = handle.join();
            }
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether the source reported end of stream on its last pull.
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.shared.video_ended.load(Ordering::SeqCst)
    }

    /// Whether a source is open and able to decode.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.source.lock().is_ready()
    }

    /// Seeks the source to the given second. The next decoded frame is
    /// flagged non-consecutive and publishes
    /// [`seek_available_time`](Self::seek_available_time).
    pub fn seek(&self, secs: f64) {
        self.shared.seek_available.clear();
        let mut source = self.shared.source.lock();
        if let Err(err) = source.seek_second(secs) {
            warn!(%err, secs, "seek failed");
        }
        self.shared.video_ended.store(false, Ordering::SeqCst);
    }

    /// Seeks the source to the first keyframe at or after the given second.
    pub fn seek_keyframe(&self, secs: f64) {
        self.shared.seek_available.clear();
        let mut source = self.shared.source.lock();
        if let Err(err) = source.seek_keyframe(secs) {
            warn!(%err, secs, "keyframe seek failed");
        }
        self.shared.video_ended.store(false, Ordering::SeqCst);
    }

    /// Seeks back to the beginning of the stream.
    pub fn rewind(&self) {
        self.shared.seek_available.clear();
        let mut source = self.shared.source.lock();
        if let Err(err) = source.rewind() {
            warn!(%err, "rewind failed");
        }
        self.shared.video_ended.store(false, Ordering::SeqCst);
    }

    /// Looks up the two buffered frames bracketing `pts_secs`.
    ///
    /// Returns the unavailable sentinel when the time is not buffered. The
    /// returned frames stay alive, and exempt from eviction, until the
    /// caller drops the result.
    #[must_use]
    pub fn get_frames(&self, pts_secs: f64) -> Bracket {
        let fps = self.shared.video_fps.get().unwrap_or(0.0);
        self.shared.cache.lock().bracket(pts_secs, fps)
    }

    /// Marks every buffered frame as no longer needed.
    pub fn done_frames(&self) {
        self.shared.cache.lock().dispose_all();
    }

    /// Marks buffered frames before `pts_secs` as no longer needed.
    pub fn done_frames_before(&self, pts_secs: f64) {
        self.shared.cache.lock().dispose_before(pts_secs);
    }

    /// Frames per second of the open stream.
    #[must_use]
    pub fn frames_per_second(&self) -> Option<f64> {
        self.shared.video_fps.get()
    }

    /// Estimated stream length in seconds.
    #[must_use]
    pub fn length_in_seconds(&self) -> Option<f64> {
        self.shared.video_length.get()
    }

    /// Presentation time of the first frame decoded after the last seek, or
    /// `None` while it has not arrived yet.
    #[must_use]
    pub fn seek_available_time(&self) -> Option<f64> {
        self.shared.seek_available.get()
    }

    /// Acknowledges a published landing time, returning
    /// [`seek_available_time`](Self::seek_available_time) to `None` until
    /// the next seek lands.
    pub fn clear_seek_available_time(&self) {
        self.shared.seek_available.clear();
    }

    /// Instantaneous decoding rate, frames per second.
    #[must_use]
    pub fn decoding_fps(&self) -> Option<f64> {
        self.shared.decoding_fps.get()
    }

    /// Smoothed decoding rate, frames per second.
    #[must_use]
    pub fn decoding_fps_average(&self) -> Option<f64> {
        self.shared.decoding_fps_avg.get()
    }

    /// Dimensions of the most recently decoded frame.
    #[must_use]
    pub fn frame_size(&self) -> Option<(usize, usize)> {
        let width = self.shared.current_width.load(Ordering::SeqCst);
        let height = self.shared.current_height.load(Ordering::SeqCst);
        (width > 0 && height > 0).then_some((width, height))
    }

    /// Number of buffered frames.
    #[must_use]
    pub fn buffered_frames(&self) -> usize {
        self.shared.cache.lock().len()
    }

    /// Bytes of buffered frame memory.
    #[must_use]
    pub fn buffered_bytes(&self) -> usize {
        self.shared.cache.lock().total_bytes()
    }

    /// Earliest buffered presentation time.
    #[must_use]
    pub fn min_buffer_time(&self) -> Option<f64> {
        self.shared.cache.lock().min_time()
    }

    /// Latest buffered presentation time.
    #[must_use]
    pub fn max_buffer_time(&self) -> Option<f64> {
        self.shared.cache.lock().max_time()
    }

    /// Whether the buffered set changed since the last call.
    #[must_use]
    pub fn take_changed(&self) -> bool {
        self.shared.cache.lock().take_changed()
    }

    /// Attaches the sink that receives drained audio frames.
    pub fn set_audio_sink(&self, sink: Box<dyn AudioSink>) {
        *self.shared.audio_sink.lock() = Some(sink);
    }

    pub fn clear_audio_sink(&self) {
        *self.shared.audio_sink.lock() = None;
    }

    /// Snapshot of the buffer, logged entry by entry for diagnostics.
    #[must_use]
    pub fn dump_frames(&self) -> Vec<EntrySnapshot> {
        let snapshots = self.shared.cache.lock().dump();
        for entry in &snapshots {
            debug!(
                frame = entry.frame_number,
                pts = entry.pts_secs,
                refs = entry.ref_count,
                disposable = entry.disposable,
                "buffered frame"
            );
        }
        snapshots
    }
}

impl Drop for DecoderThread {
    fn drop(&mut self) {
        self.stop(true);
    }
}

/// One frame per pass: make room, pull, expand, store, drain audio.
fn fill_loop(shared: &Shared) {
    debug!("fill loop starting");

    loop {
        if shared.stop_requested.load(Ordering::SeqCst) {
            break;
        }

        let full = {
            let mut cache = shared.cache.lock();
            while is_full(&cache, &shared.config) && cache.evict_one() {}
            is_full(&cache, &shared.config)
        };
        if full {
            thread::sleep(POLL_INTERVAL);
            continue;
        }

        // Timed from here so the decode rate reflects the pull itself,
        // not buffer-full or end-of-stream idling.
        let pull_started = Instant::now();
        let frame = {
            let mut source = shared.source.lock();
            if !source.is_ready() {
                break;
            }
            match source.next_frame() {
                Ok(Some(frame)) => {
                    // Stream estimates can firm up as decoding progresses.
                    shared.video_fps.store(source.frames_per_second());
                    shared.video_length.store(source.length_in_seconds());
                    Some(frame)
                }
                Ok(None) => {
                    shared.video_ended.store(true, Ordering::SeqCst);
                    None
                }
                Err(err) => {
                    warn!(%err, "decode failed, retrying");
                    None
                }
            }
        };
        let Some(frame) = frame else {
            thread::sleep(POLL_INTERVAL);
            continue;
        };
        if shared.stop_requested.load(Ordering::SeqCst) {
            break;
        }

        // Expand off the cache lock so lookups never pay for it.
        frame.expand();
        shared.video_ended.store(false, Ordering::SeqCst);
        shared
            .current_width
            .store(frame.width(), Ordering::SeqCst);
        shared
            .current_height
            .store(frame.height(), Ordering::SeqCst);

        let elapsed = pull_started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            let instant_fps = 1.0 / elapsed;
            shared.decoding_fps.store(instant_fps);
            let average = match shared.decoding_fps_avg.get() {
                Some(avg) => avg + (instant_fps - avg) * FPS_SMOOTHING,
                None => instant_fps,
            };
            shared.decoding_fps_avg.store(average);
        }

        let pts = frame.pts_secs();
        let consecutive = frame.is_consecutive();
        let inserted = shared.cache.lock().insert(frame);
        if inserted && !consecutive {
            debug!(pts, "seek landed");
            shared.seek_available.store(pts);
        }

        drain_audio(shared);
    }

    shared.running.store(false, Ordering::SeqCst);
    debug!("fill loop exiting");
}

fn is_full(cache: &FrameCache, config: &CacheConfig) -> bool {
    cache.len() + 1 >= config.max_frames
        || cache.total_bytes() + EVICT_BYTES_HEADROOM >= config.max_bytes
}

/// Moves queued audio to the sink once enough has accumulated.
fn drain_audio(shared: &Shared) {
    let drained: Vec<AudioFrame> = {
        let mut source = shared.source.lock();
        if source.buffered_audio_seconds() <= AUDIO_DRAIN_THRESHOLD_SECS {
            return;
        }
        let mut drained = Vec::new();
        while let Some(frame) = source.next_audio_frame() {
            drained.push(frame);
        }
        drained
    };

    let mut sink = shared.audio_sink.lock();
    if let Some(sink) = sink.as_mut() {
        for frame in drained {
            sink.push_frame(frame);
        }
    }
}
