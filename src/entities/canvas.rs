//! RGBA8 canvas buffer: one per (structural layer, frame, color) triple.
//!
//! **Why**: every paintable cel slot is a fixed-size raster. Compositing and
//! the fill engine only care whether a slot has any visible pixel, so the
//! buffer caches that answer and recomputes it lazily after writes.
//!
//! # Content flag
//!
//! `has_content()` scans alpha on first call after a mutation and caches the
//! result. Any `pixels_mut()` / `set_pixel()` / `clear_alpha()` invalidates it.

use std::cell::Cell;
use std::fmt;

/// Canvas buffer errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
    /// Raw pixel data doesn't match `width * height * 4`.
    SizeMismatch { expected: usize, actual: usize },
    /// Buffer dimensions differ from the project's content size.
    DimensionMismatch { expected: (usize, usize), actual: (usize, usize) },
    /// Frame index outside the timeline.
    FrameOutOfRange { frame: usize, total: usize },
}

impl fmt::Display for CanvasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanvasError::SizeMismatch { expected, actual } => {
                write!(f, "Pixel data size mismatch: expected {} bytes, got {}", expected, actual)
            }
            CanvasError::DimensionMismatch { expected, actual } => write!(
                f,
                "Canvas dimension mismatch: expected {}x{}, got {}x{}",
                expected.0, expected.1, actual.0, actual.1
            ),
            CanvasError::FrameOutOfRange { frame, total } => {
                write!(f, "Frame {} out of range (total {})", frame, total)
            }
        }
    }
}

impl std::error::Error for CanvasError {}

/// Fixed-size RGBA8 raster (straight alpha).
#[derive(Debug, Clone)]
pub struct CanvasBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
    /// Cached "any alpha > 0". None = stale.
    content: Cell<Option<bool>>,
}

impl CanvasBuffer {
    /// Create a fully transparent buffer.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width * height * 4],
            content: Cell::new(Some(false)),
        }
    }

    /// Wrap raw RGBA8 bytes.
    pub fn from_rgba(width: usize, height: usize, data: Vec<u8>) -> Result<Self, CanvasError> {
        let expected = width * height * 4;
        if data.len() != expected {
            return Err(CanvasError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            content: Cell::new(None),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Mutable pixel access. Invalidates the content flag.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.content.set(None);
        &mut self.data
    }

    /// Pixels only if this buffer matches the expected size.
    ///
    /// A mismatched buffer is a read fault: callers treat it as empty.
    pub fn checked_pixels(&self, width: usize, height: usize) -> Option<&[u8]> {
        if self.width == width && self.height == height && self.data.len() == width * height * 4 {
            Some(&self.data)
        } else {
            None
        }
    }

    /// True if any pixel has non-zero alpha.
    pub fn has_content(&self) -> bool {
        if let Some(cached) = self.content.get() {
            return cached;
        }
        let found = self.data.chunks_exact(4).any(|px| px[3] != 0);
        self.content.set(Some(found));
        found
    }

    /// Force the content flag (used after a paint that is known to be visible).
    pub fn mark_content(&mut self, has_content: bool) {
        self.content.set(Some(has_content));
    }

    pub fn alpha(&self, idx: usize) -> u8 {
        self.data[idx * 4 + 3]
    }

    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let i = (y * self.width + x) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Write one pixel by linear index.
    pub fn set_pixel(&mut self, idx: usize, rgba: [u8; 4]) {
        self.content.set(None);
        self.data[idx * 4..idx * 4 + 4].copy_from_slice(&rgba);
    }

    /// Zero the alpha of one pixel. Returns true if it was visible before.
    pub fn clear_alpha(&mut self, idx: usize) -> bool {
        let a = &mut self.data[idx * 4 + 3];
        if *a == 0 {
            return false;
        }
        *a = 0;
        self.content.set(None);
        true
    }

    /// Clear to transparent.
    pub fn clear(&mut self) {
        self.data.fill(0);
        self.content.set(Some(false));
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }
}

impl PartialEq for CanvasBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }
}

impl Eq for CanvasBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = CanvasBuffer::new(4, 3);
        assert_eq!(buf.pixels().len(), 4 * 3 * 4);
        assert!(!buf.has_content());
    }

    #[test]
    fn test_content_flag_tracks_writes() {
        let mut buf = CanvasBuffer::new(4, 4);
        buf.set_pixel(5, [10, 20, 30, 255]);
        assert!(buf.has_content());
        assert_eq!(buf.pixel(1, 1), [10, 20, 30, 255]);

        assert!(buf.clear_alpha(5));
        assert!(!buf.clear_alpha(5));
        assert!(!buf.has_content());

        buf.pixels_mut()[3] = 1;
        assert!(buf.has_content());
    }

    #[test]
    fn test_from_rgba_size_mismatch() {
        let err = CanvasBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(err, CanvasError::SizeMismatch { expected: 16, actual: 15 });
    }

    #[test]
    fn test_checked_pixels_rejects_other_size() {
        let buf = CanvasBuffer::new(2, 2);
        assert!(buf.checked_pixels(2, 2).is_some());
        assert!(buf.checked_pixels(3, 2).is_none());
    }
}
