//! Cel compositor - flattens structural layers and sublayers into one image.
//!
//! Draw order: structural layers bottom-to-top per `CompositingOrder`, and
//! inside each layer the sublayers in `suborder` (later = on top). Layers with
//! opacity <= 0 are skipped, others multiply every source alpha by opacity.
//!
//! Held frames: a frame without any content borrows the nearest earlier frame
//! that has some. The same neighbor search drives ghost (onion skin) previews.

use log::trace;

use super::canvas::CanvasBuffer;
use super::project::Project;

/// Neighbor search direction for held frames and ghosts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Before,
    After,
}

/// Result of a composite that may have borrowed another frame.
#[derive(Debug, Clone)]
pub struct Composited {
    pub image: CanvasBuffer,
    /// Frame whose content was drawn.
    pub source_frame: usize,
    /// True if `source_frame` differs from the requested frame.
    pub held: bool,
}

/// CPU compositor - straight-alpha "over" on RGBA8.
#[derive(Clone, Debug, Default)]
pub struct CpuCompositor;

impl CpuCompositor {
    /// Blend `top` over `bottom` in place with extra opacity.
    pub fn blend_u8(bottom: &mut [u8], top: &[u8], opacity: f32) {
        debug_assert_eq!(bottom.len(), top.len());

        for (b, t) in bottom.chunks_exact_mut(4).zip(top.chunks_exact(4)) {
            if t[3] == 0 {
                continue;
            }
            let top_alpha = (t[3] as f32 / 255.0) * opacity;
            if top_alpha <= 0.0 {
                continue;
            }
            let bottom_alpha = b[3] as f32 / 255.0;
            let out_a = top_alpha + bottom_alpha * (1.0 - top_alpha);

            for c in 0..3 {
                let tc = t[c] as f32 / 255.0;
                let bc = b[c] as f32 / 255.0;
                let out = (tc * top_alpha + bc * bottom_alpha * (1.0 - top_alpha)) / out_a;
                b[c] = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
            }
            b[3] = (out_a.clamp(0.0, 1.0) * 255.0).round() as u8;
        }
    }

    /// Scale every alpha by `alpha` (for held frames and ghosts).
    pub fn fade(buffer: &mut CanvasBuffer, alpha: f32) {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha >= 1.0 {
            return;
        }
        for px in buffer.pixels_mut().chunks_exact_mut(4) {
            px[3] = (px[3] as f32 * alpha).round() as u8;
        }
    }
}

impl Project {
    /// Flatten all visible content at `frame`. Transparent where nothing is.
    pub fn composite(&self, frame: usize) -> CanvasBuffer {
        let mut out = CanvasBuffer::new(self.width(), self.height());

        for layer in self.order.bottom_to_top() {
            let state = self.layer(layer);
            let opacity = state.opacity();
            if opacity <= 0.0 {
                continue;
            }
            for key in state.suborder() {
                let Some(buf) = state.get(*key).and_then(|s| s.frame(frame)) else {
                    continue;
                };
                if !buf.has_content() {
                    continue;
                }
                let Some(src) = self.readable(buf) else { continue };
                trace!("composite f{}: {} {}", frame, layer, key);
                CpuCompositor::blend_u8(out.pixels_mut(), src, opacity);
            }
        }
        out
    }

    /// Nearest frame strictly before/after `frame` with visible content.
    pub fn nearest_content_frame(&self, frame: usize, direction: Direction) -> Option<usize> {
        match direction {
            Direction::Before => (0..frame.min(self.total_frames()))
                .rev()
                .find(|&f| self.frame_has_visible_content(f)),
            Direction::After => {
                (frame + 1..self.total_frames()).find(|&f| self.frame_has_visible_content(f))
            }
        }
    }

    /// Composite `frame`, or the held predecessor at `held_alpha` if `frame`
    /// draws nothing of its own. Content on hidden layers doesn't count.
    pub fn composite_held(&self, frame: usize, held_alpha: f32) -> Composited {
        if !self.frame_has_visible_content(frame) {
            if let Some(source) = self.nearest_content_frame(frame, Direction::Before) {
                let mut image = self.composite(source);
                CpuCompositor::fade(&mut image, held_alpha);
                return Composited {
                    image,
                    source_frame: source,
                    held: true,
                };
            }
        }
        Composited {
            image: self.composite(frame),
            source_frame: frame,
            held: false,
        }
    }

    /// Faded composite of the nearest neighbor with content, for onion skin.
    pub fn composite_ghost(&self, frame: usize, direction: Direction, alpha: f32) -> Option<Composited> {
        let source = self.nearest_content_frame(frame, direction)?;
        let mut image = self.composite(source);
        CpuCompositor::fade(&mut image, alpha);
        Some(Composited {
            image,
            source_frame: source,
            held: true,
        })
    }
}
