// SPDX-License-Identifier: MPL-2.0
//! Decoded video frames in 4:2:0 planar layout.
//!
//! A [`DecodedFrame`] owns one contiguous byte buffer holding a
//! full-resolution luma plane followed by a half-resolution interleaved
//! chroma-pair plane, `width * height * 3 / 2` bytes in total, with the luma
//! plane aligned to 16 bytes for upload-friendly copies. Frames are immutable
//! after the fill loop constructs them, except for the one-time expansion
//! into a per-pixel YUV buffer.

use std::sync::OnceLock;

/// Alignment of the luma plane within the backing buffer.
pub const PLANE_ALIGN: usize = 16;

/// One decoded video frame with timing information.
///
/// Dimensions are assumed even, as required by 4:2:0 subsampling.
#[derive(Debug)]
pub struct DecodedFrame {
    width: usize,
    height: usize,
    frame_number: i64,
    pts_secs: f64,
    consecutive: bool,
    /// Over-allocated by `PLANE_ALIGN - 1` so the luma plane can start on an
    /// aligned address; `offset` points at it.
    data: Vec<u8>,
    offset: usize,
    /// Per-pixel Y,U,V triplets, filled at most once.
    expanded: OnceLock<Vec<u8>>,
}

impl DecodedFrame {
    /// Creates a frame with zeroed plane memory.
    ///
    /// `consecutive` is false for the first frame delivered after a seek.
    #[must_use]
    pub fn new(
        width: usize,
        height: usize,
        frame_number: i64,
        pts_secs: f64,
        consecutive: bool,
    ) -> Self {
        let size = width * height * 3 / 2;
        let data = vec![0u8; if size == 0 { 0 } else { size + PLANE_ALIGN - 1 }];
        let offset = if data.is_empty() {
            0
        } else {
            data.as_ptr().align_offset(PLANE_ALIGN)
        };
        Self {
            width,
            height,
            frame_number,
            pts_secs,
            consecutive,
            data,
            offset,
            expanded: OnceLock::new(),
        }
    }

    /// Creates an invalid placeholder frame without memory.
    #[must_use]
    pub fn invalid() -> Self {
        Self::new(0, 0, -1, 0.0, false)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Whether this frame directly follows the previously decoded one,
    /// rather than being the first frame after a seek.
    #[must_use]
    pub fn is_consecutive(&self) -> bool {
        self.consecutive
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn frame_number(&self) -> i64 {
        self.frame_number
    }

    /// Presentation time in seconds.
    #[must_use]
    pub fn pts_secs(&self) -> f64 {
        self.pts_secs
    }

    #[must_use]
    pub fn plane_y_len(&self) -> usize {
        self.width * self.height
    }

    #[must_use]
    pub fn plane_uv_len(&self) -> usize {
        self.width * self.height / 2
    }

    /// Total plane memory in bytes (`width * height * 3 / 2`).
    #[must_use]
    pub fn memory(&self) -> usize {
        self.width * self.height * 3 / 2
    }

    #[must_use]
    pub fn plane_y(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.plane_y_len()]
    }

    /// The interleaved U,V plane at half resolution in both dimensions.
    #[must_use]
    pub fn plane_uv(&self) -> &[u8] {
        let start = self.offset + self.plane_y_len();
        &self.data[start..start + self.plane_uv_len()]
    }

    fn plane_y_mut(&mut self) -> &mut [u8] {
        let (offset, len) = (self.offset, self.plane_y_len());
        &mut self.data[offset..offset + len]
    }

    fn plane_uv_mut(&mut self) -> &mut [u8] {
        let start = self.offset + self.plane_y_len();
        let len = self.plane_uv_len();
        &mut self.data[start..start + len]
    }

    /// Sets all plane bytes to zero.
    pub fn clear(&mut self) {
        let (offset, size) = (self.offset, self.memory());
        self.data[offset..offset + size].fill(0);
    }

    /// Copies a tightly packed luma plane.
    pub fn fill_plane_y(&mut self, src: &[u8]) {
        let len = self.plane_y_len();
        self.plane_y_mut().copy_from_slice(&src[..len]);
    }

    /// Copies a luma plane whose source rows are `linesize` bytes apart.
    pub fn fill_plane_y_strided(&mut self, src: &[u8], linesize: usize) {
        let (width, height) = (self.width, self.height);
        let dst = self.plane_y_mut();
        for row in 0..height {
            dst[row * width..(row + 1) * width]
                .copy_from_slice(&src[row * linesize..row * linesize + width]);
        }
    }

    /// Interleaves two tightly packed chroma planes into the U,V pair plane.
    pub fn fill_plane_uv(&mut self, src_u: &[u8], src_v: &[u8]) {
        let count = self.plane_uv_len() / 2;
        let dst = self.plane_uv_mut();
        for i in 0..count {
            dst[2 * i] = src_u[i];
            dst[2 * i + 1] = src_v[i];
        }
    }

    /// Interleaves two strided chroma planes into the U,V pair plane.
    pub fn fill_plane_uv_strided(
        &mut self,
        src_u: &[u8],
        src_v: &[u8],
        linesize_u: usize,
        linesize_v: usize,
    ) {
        let (cw, ch) = (self.width / 2, self.height / 2);
        let dst = self.plane_uv_mut();
        for row in 0..ch {
            for col in 0..cw {
                dst[(row * cw + col) * 2] = src_u[row * linesize_u + col];
                dst[(row * cw + col) * 2 + 1] = src_v[row * linesize_v + col];
            }
        }
    }

    /// Whether the expanded buffer has been computed.
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.expanded
            .get()
            .is_some_and(|buf| buf.len() == self.width * self.height * 3)
    }

    /// The expanded buffer, if [`expand`](Self::expand) ran already.
    #[must_use]
    pub fn expanded(&self) -> Option<&[u8]> {
        self.expanded.get().map(Vec::as_slice)
    }

    /// Expands the packed 4:2:0 planes into interleaved Y,U,V bytes per
    /// pixel, upsampling chroma by nearest neighbor.
    ///
    /// Computed at most once; subsequent calls return the same buffer.
    pub fn expand(&self) -> &[u8] {
        self.expanded.get_or_init(|| {
            let mut out = vec![0u8; self.width * self.height * 3];
            let y = self.plane_y();
            let uv = self.plane_uv();
            let cw = self.width / 2;
            for row in 0..self.height {
                for col in 0..self.width {
                    let chroma = ((row / 2) * cw + col / 2) * 2;
                    let px = (row * self.width + col) * 3;
                    out[px] = y[row * self.width + col];
                    out[px + 1] = uv[chroma];
                    out[px + 2] = uv[chroma + 1];
                }
            }
            out
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_size_matches_420_layout() {
        let frame = DecodedFrame::new(320, 240, 0, 0.0, true);
        assert_eq!(frame.memory(), 320 * 240 * 3 / 2);
        assert_eq!(frame.plane_y().len(), 320 * 240);
        assert_eq!(frame.plane_uv().len(), 320 * 240 / 2);
    }

    #[test]
    fn luma_plane_is_aligned() {
        for _ in 0..8 {
            let frame = DecodedFrame::new(6, 4, 0, 0.0, true);
            assert_eq!(frame.plane_y().as_ptr() as usize % PLANE_ALIGN, 0);
        }
    }

    #[test]
    fn invalid_frame_has_no_memory() {
        let frame = DecodedFrame::invalid();
        assert!(!frame.is_valid());
        assert_eq!(frame.frame_number(), -1);
        assert_eq!(frame.memory(), 0);
        assert!(frame.plane_y().is_empty());
    }

    #[test]
    fn fill_plane_y_copies_packed_rows() {
        let mut frame = DecodedFrame::new(4, 2, 0, 0.0, true);
        let src: Vec<u8> = (0..8).collect();
        frame.fill_plane_y(&src);
        assert_eq!(frame.plane_y(), &src[..]);
    }

    #[test]
    fn fill_plane_y_strided_skips_padding() {
        let mut frame = DecodedFrame::new(4, 2, 0, 0.0, true);
        // Rows of 4 pixels inside lines of 6 bytes.
        let src = [1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0];
        frame.fill_plane_y_strided(&src, 6);
        assert_eq!(frame.plane_y(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn fill_plane_uv_interleaves() {
        let mut frame = DecodedFrame::new(4, 2, 0, 0.0, true);
        frame.fill_plane_uv(&[10, 11], &[20, 21]);
        assert_eq!(frame.plane_uv(), &[10, 20, 11, 21]);
    }

    #[test]
    fn fill_plane_uv_strided_skips_padding() {
        let mut frame = DecodedFrame::new(4, 4, 0, 0.0, true);
        // 2x2 chroma planes with a linesize of 3.
        let src_u = [10, 11, 0, 12, 13, 0];
        let src_v = [20, 21, 0, 22, 23, 0];
        frame.fill_plane_uv_strided(&src_u, &src_v, 3, 3);
        assert_eq!(frame.plane_uv(), &[10, 20, 11, 21, 12, 22, 13, 23]);
    }

    #[test]
    fn expand_upsamples_chroma_nearest_neighbor() {
        let mut frame = DecodedFrame::new(2, 2, 0, 0.0, true);
        frame.fill_plane_y(&[1, 2, 3, 4]);
        frame.fill_plane_uv(&[50], &[60]);

        let out = frame.expand();
        assert_eq!(out.len(), 2 * 2 * 3);
        // All four pixels share the single chroma sample.
        assert_eq!(out, &[1, 50, 60, 2, 50, 60, 3, 50, 60, 4, 50, 60]);
    }

    #[test]
    fn expand_is_idempotent() {
        let mut frame = DecodedFrame::new(2, 2, 0, 0.0, true);
        frame.fill_plane_y(&[9, 9, 9, 9]);
        frame.fill_plane_uv(&[128], &[128]);

        assert!(!frame.is_expanded());
        let first = frame.expand().to_vec();
        assert!(frame.is_expanded());
        let second = frame.expand().to_vec();
        assert_eq!(first, second);
        assert_eq!(frame.expanded(), Some(&first[..]));
    }

    #[test]
    fn metadata_is_preserved() {
        let frame = DecodedFrame::new(16, 8, 42, 1.4, false);
        assert_eq!(frame.frame_number(), 42);
        assert_eq!(frame.pts_secs(), 1.4);
        assert!(!frame.is_consecutive());
        assert!(frame.is_valid());
    }

    #[test]
    fn clear_zeroes_all_planes() {
        let mut frame = DecodedFrame::new(2, 2, 0, 0.0, true);
        frame.fill_plane_y(&[1, 2, 3, 4]);
        frame.fill_plane_uv(&[5], &[6]);
        frame.clear();
        assert!(frame.plane_y().iter().all(|&b| b == 0));
        assert!(frame.plane_uv().iter().all(|&b| b == 0));
    }
}
