// SPDX-License-Identifier: MPL-2.0
//! Time-indexed cache of decoded frames.
//!
//! Frames live in an ordered map keyed by quantized presentation time, so
//! iteration order equals chronological order and near-identical timestamps
//! deduplicate. Consumers mark entries disposable through the `dispose_*`
//! operations; the fill loop reclaims marked entries when the buffer reaches
//! its capacity bounds. An entry that a consumer still references (it holds
//! a clone of the entry's `Arc`) is never reclaimed.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::frame::DecodedFrame;
use crate::time_units::pts_to_key;

/// Default maximum number of buffered frames.
pub const DEFAULT_MAX_FRAMES: usize = 1000;

/// Default maximum bytes of buffered frame memory (1 GiB).
pub const DEFAULT_MAX_BYTES: usize = 1024 * 1024 * 1024;

/// Minimum frame-count bound.
pub const MIN_MAX_FRAMES: usize = 4;

/// Minimum byte bound (1 MiB).
pub const MIN_MAX_BYTES: usize = 1024 * 1024;

/// Slack below the requested time still considered a hit, in seconds.
const LOOKUP_EPSILON_SECS: f64 = 1.0 / 1000.0;

/// Capacity bounds for the frame buffer.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Maximum number of buffered frames.
    pub max_frames: usize,

    /// Maximum bytes of buffered frame memory.
    pub max_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration, clamping the bounds to workable minimums.
    #[must_use]
    pub fn new(max_frames: usize, max_bytes: usize) -> Self {
        Self {
            max_frames: max_frames.max(MIN_MAX_FRAMES),
            max_bytes: max_bytes.max(MIN_MAX_BYTES),
        }
    }
}

/// The two frames bracketing a requested presentation time.
///
/// `frame_a` is the frame at or before the requested time; `frame_b`, when
/// present, is its chronological successor; `blend` is the interpolation
/// fraction between them. When the requested time is outside the buffered
/// range both frames are `None` and `blend` is 0.
///
/// The returned `Arc`s keep the frames alive independently of the cache;
/// drop them when done so the fill loop can reclaim the entries.
#[derive(Debug, Clone, Default)]
pub struct Bracket {
    pub frame_a: Option<Arc<DecodedFrame>>,
    pub frame_b: Option<Arc<DecodedFrame>>,
    pub blend: f64,
}

impl Bracket {
    /// The unavailable sentinel: no frames, blend 0.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.frame_a.is_none()
    }
}

/// Diagnostic view of one cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot {
    pub frame_number: i64,
    pub pts_secs: f64,
    /// Outstanding consumer references to this entry's frame.
    pub ref_count: usize,
    pub disposable: bool,
}

struct CacheEntry {
    frame: Arc<DecodedFrame>,
    disposable: bool,
}

impl CacheEntry {
    /// Consumer references beyond the cache's own.
    fn ref_count(&self) -> usize {
        Arc::strong_count(&self.frame) - 1
    }

    fn evictable(&self) -> bool {
        self.disposable && self.ref_count() == 0
    }
}

/// Ordered store of decoded frames keyed by quantized presentation time.
pub struct FrameCache {
    entries: BTreeMap<i64, CacheEntry>,
    total_bytes: usize,
    min_time: Option<f64>,
    max_time: Option<f64>,
    changed: bool,
    any_referenced: bool,
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            total_bytes: 0,
            min_time: None,
            max_time: None,
            changed: false,
            any_referenced: false,
        }
    }

    /// Number of buffered frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of buffered frame memory.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    /// Earliest buffered presentation time, or `None` when empty.
    #[must_use]
    pub fn min_time(&self) -> Option<f64> {
        self.min_time
    }

    /// Latest buffered presentation time, or `None` when empty.
    #[must_use]
    pub fn max_time(&self) -> Option<f64> {
        self.max_time
    }

    /// Whether any lookup has handed out a frame since the last reset.
    #[must_use]
    pub fn any_referenced(&self) -> bool {
        self.any_referenced
    }

    /// Returns whether the buffered set changed since the last call, and
    /// clears the flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Inserts a frame, keyed by its quantized presentation time.
    ///
    /// Returns false and discards the frame when an entry with the same key
    /// already exists.
    pub fn insert(&mut self, frame: DecodedFrame) -> bool {
        let key = pts_to_key(frame.pts_secs());
        if self.entries.contains_key(&key) {
            return false;
        }

        let pts = frame.pts_secs();
        self.total_bytes += frame.memory();
        self.min_time = Some(self.min_time.map_or(pts, |t| t.min(pts)));
        self.max_time = Some(self.max_time.map_or(pts, |t| t.max(pts)));
        self.changed = true;
        self.entries.insert(
            key,
            CacheEntry {
                frame: Arc::new(frame),
                disposable: false,
            },
        );
        true
    }

    /// Marks every entry disposable. Used for full buffer resets.
    pub fn dispose_all(&mut self) {
        for entry in self.entries.values_mut() {
            entry.disposable = true;
        }
    }

    /// Marks entries strictly before `pts_secs` disposable. Used during
    /// steady-state playback as the consumer moves forward.
    pub fn dispose_before(&mut self, pts_secs: f64) {
        for entry in self.entries.values_mut() {
            if entry.frame.pts_secs() >= pts_secs {
                break;
            }
            entry.disposable = true;
        }
    }

    /// Removes the first disposable, unreferenced entry.
    ///
    /// Returns false when nothing is evictable.
    pub fn evict_one(&mut self) -> bool {
        let Some(key) = self
            .entries
            .iter()
            .find(|(_, entry)| entry.evictable())
            .map(|(&key, _)| key)
        else {
            return false;
        };

        if let Some(entry) = self.entries.remove(&key) {
            debug!(
                frame = entry.frame.frame_number(),
                pts = entry.frame.pts_secs(),
                "evicting frame"
            );
            self.total_bytes -= entry.frame.memory();
        }
        self.refresh_bounds();
        self.changed = true;
        true
    }

    /// Removes every disposable, unreferenced entry in one pass.
    ///
    /// Returns the number of entries removed.
    pub fn evict_disposed(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.evictable());
        let removed = before - self.entries.len();
        if removed > 0 {
            self.total_bytes = self
                .entries
                .values()
                .map(|entry| entry.frame.memory())
                .sum();
            self.refresh_bounds();
            self.changed = true;
        }
        removed
    }

    /// Drops every entry regardless of flags. Outstanding consumer
    /// references keep their frames alive; the entries are gone.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_bytes = 0;
        self.min_time = None;
        self.max_time = None;
        self.changed = true;
        self.any_referenced = false;
    }

    fn refresh_bounds(&mut self) {
        self.min_time = self
            .entries
            .values()
            .next()
            .map(|entry| entry.frame.pts_secs());
        self.max_time = self
            .entries
            .values()
            .next_back()
            .map(|entry| entry.frame.pts_secs());
    }

    fn miss(&self, pts_secs: f64) -> Bracket {
        debug!(
            pts = pts_secs,
            frames = self.entries.len(),
            min = ?self.min_time,
            max = ?self.max_time,
            "requested time not buffered"
        );
        Bracket::unavailable()
    }

    /// Marks the entry referenced and returns a handle to its frame.
    fn reference(&mut self, key: i64) -> Option<Arc<DecodedFrame>> {
        let entry = self.entries.get_mut(&key)?;
        entry.disposable = false;
        self.any_referenced = true;
        Some(Arc::clone(&entry.frame))
    }

    /// Finds the two frames bracketing `pts_secs` and the blend fraction
    /// between them.
    ///
    /// `fps` is the stream rate used for the discontinuity gap test
    /// (`1.1 / fps`); 0 disables the test. Returned frames have their
    /// disposable flags cleared so they survive until released again.
    pub fn bracket(&mut self, pts_secs: f64, fps: f64) -> Bracket {
        let max_gap = if fps > 0.0 { 1.1 / fps } else { f64::INFINITY };
        let key = pts_to_key(pts_secs);

        let Some((found_key, found_pts)) = self
            .entries
            .range(key..)
            .next()
            .map(|(&k, entry)| (k, entry.frame.pts_secs()))
        else {
            return self.miss(pts_secs);
        };
        if found_pts < pts_secs - LOOKUP_EPSILON_SECS {
            return self.miss(pts_secs);
        }

        // Decide which entry is frame A and which, if any, is frame B.
        let (key_a, key_b) = if found_pts > pts_secs {
            // The requested time falls between the previous entry and the
            // found one, provided the previous entry exists and is close
            // enough to belong to the same run of frames.
            let previous = self
                .entries
                .range(..found_key)
                .next_back()
                .map(|(&k, entry)| (k, entry.frame.pts_secs()));
            match previous {
                Some((prev_key, prev_pts)) if (found_pts - prev_pts).abs() <= max_gap => {
                    (prev_key, Some(found_key))
                }
                _ => return self.miss(pts_secs),
            }
        } else {
            let successor = self
                .entries
                .range((Bound::Excluded(found_key), Bound::Unbounded))
                .next()
                .map(|(&k, _)| k);
            (found_key, successor)
        };

        let Some(frame_a) = self.reference(key_a) else {
            return self.miss(pts_secs);
        };

        let successor_pts = key_b.and_then(|k| {
            self.entries
                .get(&k)
                .map(|entry| entry.frame.pts_secs())
        });
        let key_b = match (key_b, successor_pts) {
            (Some(k), Some(pts_b)) if (pts_b - frame_a.pts_secs()).abs() <= max_gap => Some(k),
            // No successor, or a gap signaling dropped frames or a seek.
            _ => None,
        };
        let Some(key_b) = key_b else {
            return Bracket {
                frame_a: Some(frame_a),
                frame_b: None,
                blend: 0.0,
            };
        };
        let Some(frame_b) = self.reference(key_b) else {
            return Bracket {
                frame_a: Some(frame_a),
                frame_b: None,
                blend: 0.0,
            };
        };

        let mut blend = (pts_secs - frame_a.pts_secs()) * fps;
        let number_gap = frame_b.frame_number() - frame_a.frame_number();
        if number_gap > 1 {
            // Frames were dropped between A and B; widen the blend span.
            debug!(
                from = frame_a.frame_number(),
                to = frame_b.frame_number(),
                pts = pts_secs,
                "buffer has hole"
            );
            #[allow(clippy::cast_precision_loss)]
            {
                blend /= number_gap as f64;
            }
        }
        if !(0.0..=1.0).contains(&blend) {
            warn!(
                blend,
                pts = pts_secs,
                frame_a = frame_a.pts_secs(),
                frame_b = frame_b.pts_secs(),
                "blend outside range, clamping"
            );
            blend = blend.clamp(0.0, 1.0);
        }

        Bracket {
            frame_a: Some(frame_a),
            frame_b: Some(frame_b),
            blend,
        }
    }

    /// Snapshot of every entry, in presentation-time order.
    #[must_use]
    pub fn dump(&self) -> Vec<EntrySnapshot> {
        self.entries
            .values()
            .map(|entry| EntrySnapshot {
                frame_number: entry.frame.frame_number(),
                pts_secs: entry.frame.pts_secs(),
                ref_count: entry.ref_count(),
                disposable: entry.disposable,
            })
            .collect()
    }
}
