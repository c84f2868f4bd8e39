//! Boundary masks for fill and erase.
//!
//! For one frame the builder derives three bitmaps from the line art:
//!
//! - `ink` - pixels with alpha > 10 in any contributing sublayer
//! - `closed` - ink after morphological closing by the gap radius
//! - `outside` - 4-connected flood from the canvas border over non-closed pixels
//!
//! A pixel is *inside* (fillable) iff it is neither closed nor outside.
//!
//! # Cost
//!
//! Closing is `2 * reps` full-image passes, the outside flood one more.
//! Masks are ephemeral: rebuilt per edit, never cached or persisted.

use log::debug;

use crate::entities::{Project, StructuralLayer};

/// Alpha above which a pixel counts as ink.
pub const INK_ALPHA_THRESHOLD: u8 = 10;

/// Which structural layers contribute ink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InkSource {
    LineOnly,
    LineAndColor,
}

impl InkSource {
    /// Ink used when filling or erasing on `target`.
    ///
    /// COLOR targets ignore their own layer, otherwise a color fill would be
    /// blocked by the color strokes it is meant to sit under.
    pub fn for_target(target: StructuralLayer) -> Self {
        match target {
            StructuralLayer::Color => InkSource::LineOnly,
            _ => InkSource::LineAndColor,
        }
    }

    fn layers(self) -> &'static [StructuralLayer] {
        match self {
            InkSource::LineOnly => &[StructuralLayer::Line],
            InkSource::LineAndColor => &[StructuralLayer::Line, StructuralLayer::Color],
        }
    }
}

/// Same-size binary bitmap over the content area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mask {
    width: usize,
    height: usize,
    bits: Vec<bool>,
}

impl Mask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            bits: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> bool {
        self.bits[idx]
    }

    #[inline]
    pub fn set(&mut self, idx: usize, value: bool) {
        self.bits[idx] = value;
    }

    pub fn get_xy(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height && self.bits[y * self.width + x]
    }

    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Indices of set bits.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter().enumerate().filter(|(_, b)| **b).map(|(i, _)| i)
    }

    /// Any 8-neighbor of (x, y) equal to `value`. Off-canvas neighbors count
    /// as `false`.
    fn any_neighbor(&self, x: usize, y: usize, value: bool) -> bool {
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                let bit = if nx < 0 || ny < 0 || nx >= self.width as i64 || ny >= self.height as i64 {
                    false
                } else {
                    self.bits[ny as usize * self.width + nx as usize]
                };
                if bit == value {
                    return true;
                }
            }
        }
        false
    }

    /// One round of 8-neighbor dilation.
    fn dilate(&self) -> Mask {
        let mut out = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                if !self.bits[i] && self.any_neighbor(x, y, true) {
                    out.bits[i] = true;
                }
            }
        }
        out
    }

    /// One round of 8-neighbor erosion (off-canvas counts as unset).
    fn erode(&self) -> Mask {
        let mut out = self.clone();
        for y in 0..self.height {
            for x in 0..self.width {
                let i = y * self.width + x;
                if self.bits[i] && self.any_neighbor(x, y, false) {
                    out.bits[i] = false;
                }
            }
        }
        out
    }
}

/// Union of opaque pixels over the ink layers at `frame`.
pub fn build_ink_mask(project: &Project, frame: usize, source: InkSource) -> Mask {
    let mut mask = Mask::new(project.width(), project.height());

    for &layer in source.layers() {
        let state = project.layer(layer);
        for key in state.suborder() {
            let Some(buf) = state.get(*key).and_then(|s| s.frame(frame)) else {
                continue;
            };
            if !buf.has_content() {
                continue;
            }
            let Some(pixels) = project.readable(buf) else { continue };
            for (i, px) in pixels.chunks_exact(4).enumerate() {
                if px[3] > INK_ALPHA_THRESHOLD {
                    mask.bits[i] = true;
                }
            }
        }
    }
    mask
}

/// Close gaps of roughly `radius` pixels: dilate then erode `reps` times,
/// `reps = max(1, round(radius / 2))`. `radius == 0` returns the mask as is.
pub fn morphological_close(mask: &Mask, radius: u32) -> Mask {
    if radius == 0 {
        return mask.clone();
    }
    let reps = ((radius as f32 / 2.0).round() as u32).max(1);

    let mut out = mask.clone();
    for _ in 0..reps {
        out = out.dilate();
    }
    for _ in 0..reps {
        out = out.erode();
    }
    out
}

/// 4-connected flood from every border pixel that isn't in `closed`.
pub fn flood_outside(closed: &Mask) -> Mask {
    let (w, h) = (closed.width, closed.height);
    let mut outside = Mask::new(w, h);
    if w == 0 || h == 0 {
        return outside;
    }

    let mut stack: Vec<usize> = Vec::new();
    let push = |i: usize, outside: &mut Mask, stack: &mut Vec<usize>| {
        if !closed.bits[i] && !outside.bits[i] {
            outside.bits[i] = true;
            stack.push(i);
        }
    };

    for x in 0..w {
        push(x, &mut outside, &mut stack);
        push((h - 1) * w + x, &mut outside, &mut stack);
    }
    for y in 0..h {
        push(y * w, &mut outside, &mut stack);
        push(y * w + w - 1, &mut outside, &mut stack);
    }

    while let Some(i) = stack.pop() {
        let (x, y) = (i % w, i / w);
        if x > 0 {
            push(i - 1, &mut outside, &mut stack);
        }
        if x + 1 < w {
            push(i + 1, &mut outside, &mut stack);
        }
        if y > 0 {
            push(i - w, &mut outside, &mut stack);
        }
        if y + 1 < h {
            push(i + w, &mut outside, &mut stack);
        }
    }
    outside
}

/// Ink, closed and outside bitmaps for one frame.
#[derive(Clone, Debug)]
pub struct BoundaryMask {
    pub ink: Mask,
    pub closed: Mask,
    pub outside: Mask,
}

impl BoundaryMask {
    pub fn build(project: &Project, frame: usize, source: InkSource, gap_px: u32) -> Self {
        let ink = build_ink_mask(project, frame, source);
        Self::from_ink(ink, gap_px)
    }

    pub fn from_ink(ink: Mask, gap_px: u32) -> Self {
        let closed = morphological_close(&ink, gap_px);
        let outside = flood_outside(&closed);
        debug!(
            "Boundary mask: ink={} closed={} outside={} (gap {})",
            ink.count(),
            closed.count(),
            outside.count(),
            gap_px
        );
        Self { ink, closed, outside }
    }

    pub fn width(&self) -> usize {
        self.closed.width
    }

    pub fn height(&self) -> usize {
        self.closed.height
    }

    #[inline]
    pub fn is_inside_idx(&self, idx: usize) -> bool {
        !self.closed.bits[idx] && !self.outside.bits[idx]
    }

    pub fn is_inside(&self, x: usize, y: usize) -> bool {
        x < self.width() && y < self.height() && self.is_inside_idx(y * self.width() + x)
    }

    /// Every inside pixel as a mask.
    pub fn inside(&self) -> Mask {
        let mut out = Mask::new(self.width(), self.height());
        for i in 0..out.bits.len() {
            out.bits[i] = self.is_inside_idx(i);
        }
        out
    }
}
