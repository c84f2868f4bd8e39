//! Seeded fill, seeded erase and whole-cel fill.
//!
//! Every operation builds a [`BoundaryMask`] for the frame, floods the inside
//! region 4-connected from the seeds and then paints or clears exactly the
//! visited pixels. Nothing is mutated until the region is known, so an edit
//! either applies fully or is a no-op (`false`).
//!
//! # Observers
//!
//! Each individual buffer mutation is bracketed by
//! [`EditObserver::before_edit`] / [`EditObserver::after_edit`]. History
//! implements the trait to snapshot precisely the touched buffers; `()` is the
//! no-op observer.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::mask::{BoundaryMask, InkSource, Mask};
use crate::entities::{ColorKey, Project, StructuralLayer};

/// Seed point in content-space coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Which structural layers an erase touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EraseScope {
    Layer(StructuralLayer),
    All,
}

impl EraseScope {
    pub fn layers(self) -> Vec<StructuralLayer> {
        match self {
            EraseScope::Layer(l) => vec![l],
            EraseScope::All => StructuralLayer::ALL.to_vec(),
        }
    }
}

/// The single buffer an edit mutates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EditTarget {
    pub layer: StructuralLayer,
    pub frame: usize,
    pub key: ColorKey,
}

/// Hook around every buffer mutation made by the engine.
pub trait EditObserver {
    /// Called right before `target` is written.
    fn before_edit(&mut self, _project: &Project, _target: EditTarget) {}

    /// Called right after; `changed` is false if no byte was modified.
    fn after_edit(&mut self, _project: &Project, _target: EditTarget, _changed: bool) {}
}

impl EditObserver for () {}

/// Pixel index of a seed, if it rounds onto the canvas.
fn seed_index(boundary: &BoundaryMask, seed: Point) -> Option<usize> {
    if !seed.x.is_finite() || !seed.y.is_finite() {
        return None;
    }
    let x = seed.x.round();
    let y = seed.y.round();
    if x < 0.0 || y < 0.0 || x >= boundary.width() as f32 || y >= boundary.height() as f32 {
        return None;
    }
    Some(y as usize * boundary.width() + x as usize)
}

/// Union of the inside components touched by `seeds`.
///
/// Seeds off-canvas, on closed ink or in the outside region are skipped.
pub fn flood_region(boundary: &BoundaryMask, seeds: &[Point]) -> Mask {
    let (w, h) = (boundary.width(), boundary.height());
    let mut visited = Mask::new(w, h);
    let mut stack: Vec<usize> = Vec::new();

    for &seed in seeds {
        let Some(start) = seed_index(boundary, seed) else {
            continue;
        };
        if !boundary.is_inside_idx(start) || visited.get(start) {
            continue;
        }

        visited.set(start, true);
        stack.push(start);
        while let Some(i) = stack.pop() {
            let (x, y) = (i % w, i / w);
            let mut visit = |n: usize| {
                if boundary.is_inside_idx(n) && !visited.get(n) {
                    visited.set(n, true);
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - w);
            }
            if y + 1 < h {
                visit(i + w);
            }
        }
    }
    visited
}

/// True if an existing buffer at `target` can't be read at project size.
fn target_unreadable(project: &Project, target: EditTarget) -> bool {
    match project.buffer(target.layer, target.frame, target.key) {
        Some(buf) if buf.resolution() != project.resolution() => {
            warn!(
                "{} {} f{}: buffer is {}x{}, skipping",
                target.layer,
                target.key,
                target.frame,
                buf.width(),
                buf.height()
            );
            true
        }
        _ => false,
    }
}

/// Paint every pixel of `region` opaque `target.key`.
fn paint_region(
    project: &mut Project,
    target: EditTarget,
    region: &Mask,
    observer: &mut dyn EditObserver,
) -> bool {
    if target_unreadable(project, target) {
        return false;
    }
    observer.before_edit(project, target);
    let Some(buf) = project.get_frame_buffer(target.layer, target.frame, target.key) else {
        observer.after_edit(project, target, false);
        return false;
    };
    let rgba = target.key.to_rgba();
    for i in region.iter_set() {
        buf.set_pixel(i, rgba);
    }
    buf.mark_content(true);
    observer.after_edit(project, target, true);
    true
}

/// Flood from `seeds` inside the line art and paint into `layer`/`color`.
///
/// Returns true iff at least one pixel was painted. On false nothing changed,
/// not even a sublayer or buffer allocation.
///
/// A seed in a region that leaks to the canvas border is outside, not inside:
/// with an open outline and too small a `gap_px` the fill returns false
/// instead of flooding the whole canvas.
pub fn fill_from_seeds(
    project: &mut Project,
    frame: usize,
    seeds: &[Point],
    layer: StructuralLayer,
    color: ColorKey,
    gap_px: u32,
    observer: &mut dyn EditObserver,
) -> bool {
    if frame >= project.total_frames() || seeds.is_empty() {
        return false;
    }
    let boundary = BoundaryMask::build(project, frame, InkSource::for_target(layer), gap_px);
    let region = flood_region(&boundary, seeds);
    let count = region.count();
    if count == 0 {
        debug!("Fill f{} {}: no seed inside a closed region", frame, layer);
        return false;
    }

    let target = EditTarget { layer, frame, key: color };
    let painted = paint_region(project, target, &region, observer);
    if painted {
        debug!("Fill f{} {} {}: {} px", frame, layer, color, count);
    }
    painted
}

/// Clear the seeded inside region in every sublayer under `scope`.
///
/// With `color_filter` only that key is touched. Each structural layer uses
/// its own ink choice and visited set; all regions are computed before the
/// first pixel is cleared. True iff some visible pixel was cleared.
pub fn erase_from_seeds(
    project: &mut Project,
    frame: usize,
    seeds: &[Point],
    scope: EraseScope,
    color_filter: Option<ColorKey>,
    gap_px: u32,
    observer: &mut dyn EditObserver,
) -> bool {
    if frame >= project.total_frames() || seeds.is_empty() {
        return false;
    }

    let mut plans: Vec<(StructuralLayer, Vec<ColorKey>, Mask)> = Vec::new();
    for layer in scope.layers() {
        let keys: Vec<ColorKey> = project
            .layer(layer)
            .suborder()
            .iter()
            .copied()
            .filter(|k| color_filter.is_none_or(|f| f == *k))
            .filter(|k| project.buffer(layer, frame, *k).is_some())
            .collect();
        if keys.is_empty() {
            continue;
        }
        let boundary = BoundaryMask::build(project, frame, InkSource::for_target(layer), gap_px);
        let region = flood_region(&boundary, seeds);
        if region.count() > 0 {
            plans.push((layer, keys, region));
        }
    }

    let mut did_any = false;
    for (layer, keys, region) in plans {
        let mut layer_changed = false;
        for key in keys {
            let target = EditTarget { layer, frame, key };
            if target_unreadable(project, target) {
                continue;
            }
            observer.before_edit(project, target);
            let mut changed = false;
            if let Some(buf) = project.buffer_mut(layer, frame, key) {
                for i in region.iter_set() {
                    changed |= buf.clear_alpha(i);
                }
            }
            observer.after_edit(project, target, changed);
            layer_changed |= changed;
        }
        if layer_changed {
            debug!("Erase f{} {}: cleared", frame, layer);
        }
        did_any |= layer_changed;
    }
    did_any
}

/// Paint the whole inside region (LINE ink only, no seeds) into FILL.
pub fn fill_whole_cel(
    project: &mut Project,
    frame: usize,
    color: ColorKey,
    gap_px: u32,
    observer: &mut dyn EditObserver,
) -> bool {
    if frame >= project.total_frames() {
        return false;
    }
    let boundary = BoundaryMask::build(project, frame, InkSource::LineOnly, gap_px);
    let region = boundary.inside();
    if region.count() == 0 {
        return false;
    }
    let target = EditTarget {
        layer: StructuralLayer::Fill,
        frame,
        key: color,
    };
    paint_region(project, target, &region, observer)
}
