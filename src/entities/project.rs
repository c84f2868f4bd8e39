//! Project: sublayer registry for every structural layer and frame.
//!
//! Owns the five `LayerState`s, the layer compositing order and the project
//! wide content size / timeline length. Every buffer access from the fill
//! engine, history and persistence goes through here, so lazily created
//! sublayers and slots look the same no matter who created them.
//!
//! Persistence itself is external. It uses `cels()` to enumerate content,
//! `meta()` / `apply_meta()` for layer metadata and `load_cel()` to populate
//! slots exactly like live painting would.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::canvas::{CanvasBuffer, CanvasError};
use super::color::ColorKey;
use super::layer::{LayerState, StructuralLayer, Sublayer};
use super::order::CompositingOrder;

/// Reference to one populated cel slot.
#[derive(Debug, Clone, Copy)]
pub struct CelRef<'a> {
    pub layer: StructuralLayer,
    pub key: ColorKey,
    pub frame: usize,
    pub buffer: &'a CanvasBuffer,
}

/// Serializable per-layer metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMeta {
    pub layer: StructuralLayer,
    pub opacity: f32,
    #[serde(default = "default_opacity")]
    pub previous_opacity: f32,
    #[serde(default)]
    pub suborder: Vec<ColorKey>,
    /// (child, parent) pairs.
    #[serde(default)]
    pub pairs: Vec<(ColorKey, ColorKey)>,
    #[serde(default)]
    pub collapsed: Vec<ColorKey>,
}

fn default_opacity() -> f32 {
    1.0
}

/// Serializable project metadata (everything except pixels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub width: usize,
    pub height: usize,
    pub total_frames: usize,
    #[serde(default)]
    pub order: CompositingOrder,
    #[serde(default)]
    pub layers: Vec<LayerMeta>,
}

impl ProjectMeta {
    /// Save metadata as pretty JSON (adds `.json` extension if missing).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Serialize project metadata")?;

        let path = path.as_ref();
        let path = if path.extension().and_then(|s| s.to_str()) != Some("json") {
            path.with_extension("json")
        } else {
            path.to_path_buf()
        };

        fs::write(&path, json).with_context(|| format!("Write project metadata: {}", path.display()))?;
        Ok(())
    }

    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Read project metadata: {}", path.display()))?;
        serde_json::from_str(&json).context("Parse project metadata")
    }
}

/// Sublayer registry for one animation project.
#[derive(Debug, Clone)]
pub struct Project {
    width: usize,
    height: usize,
    total_frames: usize,
    /// Indexed by `StructuralLayer::ordinal()`.
    layers: Vec<LayerState>,
    pub order: CompositingOrder,
}

impl Project {
    pub fn new(width: usize, height: usize, total_frames: usize) -> Self {
        info!("Project: {}x{}, {} frames", width, height, total_frames);
        Self {
            width,
            height,
            total_frames,
            layers: StructuralLayer::ALL.iter().map(|&l| LayerState::new(l)).collect(),
            order: CompositingOrder::default(),
        }
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

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn layer(&self, layer: StructuralLayer) -> &LayerState {
        &self.layers[layer.ordinal()]
    }

    pub fn layer_mut(&mut self, layer: StructuralLayer) -> &mut LayerState {
        &mut self.layers[layer.ordinal()]
    }

    pub fn sublayer(&self, layer: StructuralLayer, key: ColorKey) -> Option<&Sublayer> {
        self.layer(layer).get(key)
    }

    /// Get or create the sublayer for `key` on `layer`.
    pub fn ensure_sublayer(&mut self, layer: StructuralLayer, key: ColorKey) -> &mut Sublayer {
        let total = self.total_frames;
        self.layer_mut(layer).ensure(key, total)
    }

    /// Buffer at (layer, frame, key), allocating a transparent one if the slot
    /// is empty. None only if `frame` is outside the timeline.
    pub fn get_frame_buffer(
        &mut self,
        layer: StructuralLayer,
        frame: usize,
        key: ColorKey,
    ) -> Option<&mut CanvasBuffer> {
        if frame >= self.total_frames {
            return None;
        }
        let (w, h) = (self.width, self.height);
        let sub = self.ensure_sublayer(layer, key);
        let slot = &mut sub.frames[frame];
        Some(slot.get_or_insert_with(|| CanvasBuffer::new(w, h)))
    }

    /// Existing buffer, no allocation.
    pub fn buffer(&self, layer: StructuralLayer, frame: usize, key: ColorKey) -> Option<&CanvasBuffer> {
        self.sublayer(layer, key).and_then(|s| s.frame(frame))
    }

    pub fn buffer_mut(
        &mut self,
        layer: StructuralLayer,
        frame: usize,
        key: ColorKey,
    ) -> Option<&mut CanvasBuffer> {
        self.layer_mut(layer).get_mut(key).and_then(|s| s.frame_mut(frame))
    }

    /// Pixels of `buffer` if it matches the project size, else None (logged).
    pub fn readable<'a>(&self, buffer: &'a CanvasBuffer) -> Option<&'a [u8]> {
        let pixels = buffer.checked_pixels(self.width, self.height);
        if pixels.is_none() {
            warn!(
                "Skipping {}x{} buffer in {}x{} project",
                buffer.width(),
                buffer.height(),
                self.width,
                self.height
            );
        }
        pixels
    }

    /// Replace the slot at (layer, frame, key). `None` frees the buffer.
    ///
    /// A sublayer is created for `Some`, never for `None`.
    pub fn set_slot(
        &mut self,
        layer: StructuralLayer,
        frame: usize,
        key: ColorKey,
        buffer: Option<CanvasBuffer>,
    ) {
        if frame >= self.total_frames {
            return;
        }
        match buffer {
            Some(buf) => self.ensure_sublayer(layer, key).frames[frame] = Some(buf),
            None => {
                if let Some(sub) = self.layer_mut(layer).get_mut(key) {
                    sub.frames[frame] = None;
                }
            }
        }
    }

    /// Resize every sublayer's frame array. Slots within range are kept.
    pub fn resize_timeline(&mut self, total_frames: usize) {
        let total_frames = total_frames.max(1);
        if total_frames == self.total_frames {
            return;
        }
        debug!("Timeline resize: {} -> {}", self.total_frames, total_frames);
        self.total_frames = total_frames;
        for state in &mut self.layers {
            for sub in state.sublayers_mut() {
                sub.resize(total_frames);
            }
        }
    }

    /// True if any sublayer of any layer has a visible pixel at `frame`.
    pub fn frame_has_content(&self, frame: usize) -> bool {
        self.layers
            .iter()
            .flat_map(|s| s.sublayers())
            .any(|sub| sub.has_content_at(frame))
    }

    /// Like `frame_has_content`, but only counts what `composite` would draw:
    /// layers with opacity above zero and buffers of project size.
    pub fn frame_has_visible_content(&self, frame: usize) -> bool {
        self.layers
            .iter()
            .filter(|s| s.is_visible())
            .flat_map(|s| s.sublayers())
            .filter_map(|sub| sub.frame(frame))
            .any(|buf| buf.resolution() == self.resolution() && buf.has_content())
    }

    /// Move a whole sublayer to another structural layer.
    ///
    /// Rejected (false, nothing changed) when `to` already owns `key`.
    pub fn move_sublayer(&mut self, from: StructuralLayer, to: StructuralLayer, key: ColorKey) -> bool {
        if from == to || !self.layer(from).contains(key) || self.layer(to).contains(key) {
            return false;
        }
        let Some(sub) = self.layer_mut(from).remove(key) else {
            return false;
        };
        let inserted = self.layer_mut(to).insert(sub);
        debug!("Moved sublayer {} from {} to {}", key, from, to);
        inserted
    }

    pub fn pair_sublayers(&mut self, layer: StructuralLayer, child: ColorKey, parent: ColorKey) -> bool {
        self.layer_mut(layer).pair(child, parent)
    }

    pub fn unpair_sublayer(&mut self, layer: StructuralLayer, child: ColorKey) -> bool {
        self.layer_mut(layer).unpair(child)
    }

    pub fn reorder_sublayer(&mut self, layer: StructuralLayer, key: ColorKey, index: usize) -> bool {
        self.layer_mut(layer).reorder(key, index)
    }

    /// Drop a sublayer with all its frames. Children are unpaired, not removed.
    pub fn remove_sublayer(&mut self, layer: StructuralLayer, key: ColorKey) -> Option<Sublayer> {
        self.layer_mut(layer).remove(key)
    }

    pub fn set_collapsed(&mut self, layer: StructuralLayer, key: ColorKey, collapsed: bool) -> bool {
        match self.layer_mut(layer).get_mut(key) {
            Some(sub) => {
                sub.collapsed = collapsed;
                true
            }
            None => false,
        }
    }

    /// Populate a slot from decoded pixels (persistence ingress).
    pub fn load_cel(
        &mut self,
        layer: StructuralLayer,
        key: ColorKey,
        frame: usize,
        width: usize,
        height: usize,
        rgba: Vec<u8>,
    ) -> Result<(), CanvasError> {
        if (width, height) != (self.width, self.height) {
            return Err(CanvasError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (width, height),
            });
        }
        if frame >= self.total_frames {
            return Err(CanvasError::FrameOutOfRange {
                frame,
                total: self.total_frames,
            });
        }
        let source = CanvasBuffer::from_rgba(width, height, rgba)?;
        if let Some(buf) = self.get_frame_buffer(layer, frame, key) {
            *buf = source;
        }
        Ok(())
    }

    /// Every populated slot with visible content.
    pub fn cels(&self) -> Vec<CelRef<'_>> {
        let mut out = Vec::new();
        for state in &self.layers {
            for key in state.suborder() {
                let Some(sub) = state.get(*key) else { continue };
                for (frame, slot) in sub.frames.iter().enumerate() {
                    if let Some(buffer) = slot.as_ref().filter(|b| b.has_content()) {
                        out.push(CelRef {
                            layer: state.layer,
                            key: *key,
                            frame,
                            buffer,
                        });
                    }
                }
            }
        }
        out
    }

    pub fn meta(&self) -> ProjectMeta {
        let layers = self
            .layers
            .iter()
            .map(|state| LayerMeta {
                layer: state.layer,
                opacity: state.opacity(),
                previous_opacity: state.previous_opacity(),
                suborder: state.suborder().to_vec(),
                pairs: state
                    .sublayers()
                    .filter_map(|s| s.parent().map(|p| (s.key, p)))
                    .collect(),
                collapsed: state.sublayers().filter(|s| s.collapsed).map(|s| s.key).collect(),
            })
            .collect();
        ProjectMeta {
            width: self.width,
            height: self.height,
            total_frames: self.total_frames,
            order: self.order.clone(),
            layers,
        }
    }

    /// Apply saved metadata: timeline length, order, opacity, suborder and
    /// pairing. Sublayers named in a suborder are created if missing.
    pub fn apply_meta(&mut self, meta: &ProjectMeta) -> Result<(), CanvasError> {
        if (meta.width, meta.height) != (self.width, self.height) {
            return Err(CanvasError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (meta.width, meta.height),
            });
        }
        self.resize_timeline(meta.total_frames);
        self.order = meta.order.clone();

        for lm in &meta.layers {
            for key in &lm.suborder {
                self.ensure_sublayer(lm.layer, *key);
            }
            let state = self.layer_mut(lm.layer);
            state.restore_opacity(lm.opacity, lm.previous_opacity);
            state.set_suborder(&lm.suborder);
            for (child, parent) in &lm.pairs {
                if !state.pair(*child, *parent) {
                    warn!("{}: dropped invalid pairing {} -> {}", lm.layer, child, parent);
                }
            }
            for key in &lm.collapsed {
                if let Some(sub) = state.get_mut(*key) {
                    sub.collapsed = true;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> ColorKey {
        ColorKey::parse("#FF0000").unwrap()
    }

    #[test]
    fn test_get_frame_buffer_allocates_lazily() {
        let mut project = Project::new(8, 8, 3);
        assert!(project.buffer(StructuralLayer::Fill, 1, red()).is_none());

        let buf = project.get_frame_buffer(StructuralLayer::Fill, 1, red()).unwrap();
        assert_eq!(buf.resolution(), (8, 8));
        assert!(!buf.has_content());

        let sub = project.sublayer(StructuralLayer::Fill, red()).unwrap();
        assert!(sub.frames[0].is_none());
        assert!(sub.frames[1].is_some());
        assert!(project.get_frame_buffer(StructuralLayer::Fill, 3, red()).is_none());
    }

    #[test]
    fn test_resize_timeline_preserves_slots() {
        let mut project = Project::new(4, 4, 3);
        project
            .get_frame_buffer(StructuralLayer::Line, 1, ColorKey::BLACK)
            .unwrap()
            .set_pixel(0, [0, 0, 0, 255]);

        project.resize_timeline(6);
        project.resize_timeline(6);
        let sub = project.sublayer(StructuralLayer::Line, ColorKey::BLACK).unwrap();
        assert_eq!(sub.frames.len(), 6);
        assert!(sub.has_content_at(1));

        project.resize_timeline(2);
        let sub = project.sublayer(StructuralLayer::Line, ColorKey::BLACK).unwrap();
        assert_eq!(sub.frames.len(), 2);
        assert!(sub.has_content_at(1));

        project.resize_timeline(1);
        assert!(!project.frame_has_content(0));
        assert_eq!(project.total_frames(), 1);
    }

    #[test]
    fn test_move_sublayer_collision_rejected() {
        let mut project = Project::new(4, 4, 1);
        project.ensure_sublayer(StructuralLayer::Fill, red());
        project.ensure_sublayer(StructuralLayer::Color, red());

        assert!(!project.move_sublayer(StructuralLayer::Fill, StructuralLayer::Color, red()));
        assert!(project.layer(StructuralLayer::Fill).contains(red()));
        assert_eq!(project.layer(StructuralLayer::Color).suborder(), &[red()]);

        assert!(project.move_sublayer(StructuralLayer::Fill, StructuralLayer::Shade, red()));
        assert!(!project.layer(StructuralLayer::Fill).contains(red()));
        assert_eq!(project.layer(StructuralLayer::Shade).suborder(), &[red()]);
    }

    #[test]
    fn test_remove_sublayer_unpairs_children() {
        let mut project = Project::new(4, 4, 1);
        let blue = ColorKey::parse("#0000ff").unwrap();
        project.ensure_sublayer(StructuralLayer::Shade, red());
        project.ensure_sublayer(StructuralLayer::Shade, blue);
        assert!(project.pair_sublayers(StructuralLayer::Shade, blue, red()));
        assert!(project.set_collapsed(StructuralLayer::Shade, red(), true));
        assert!(project.reorder_sublayer(StructuralLayer::Shade, blue, 0));
        assert_eq!(project.layer(StructuralLayer::Shade).suborder(), &[blue, red()]);

        let removed = project.remove_sublayer(StructuralLayer::Shade, red()).unwrap();
        assert!(removed.collapsed);
        assert_eq!(project.sublayer(StructuralLayer::Shade, blue).unwrap().parent(), None);
        assert_eq!(project.layer(StructuralLayer::Shade).suborder(), &[blue]);
        assert!(!project.set_collapsed(StructuralLayer::Shade, red(), false));
    }

    #[test]
    fn test_load_cel_validates_size() {
        let mut project = Project::new(2, 2, 2);
        assert!(
            project
                .load_cel(StructuralLayer::Line, ColorKey::BLACK, 0, 3, 2, vec![0; 24])
                .is_err()
        );
        assert!(
            project
                .load_cel(StructuralLayer::Line, ColorKey::BLACK, 5, 2, 2, vec![0; 16])
                .is_err()
        );
        assert!(project.layer(StructuralLayer::Line).is_empty());

        let mut px = vec![0u8; 16];
        px[3] = 255;
        project
            .load_cel(StructuralLayer::Line, ColorKey::BLACK, 1, 2, 2, px)
            .unwrap();
        let cels = project.cels();
        assert_eq!(cels.len(), 1);
        assert_eq!((cels[0].layer, cels[0].frame), (StructuralLayer::Line, 1));
    }

    #[test]
    fn test_meta_roundtrip_through_json() {
        let mut project = Project::new(4, 4, 2);
        let blue = ColorKey::parse("#0000ff").unwrap();
        project.ensure_sublayer(StructuralLayer::Color, red());
        project.ensure_sublayer(StructuralLayer::Color, blue);
        project.pair_sublayers(StructuralLayer::Color, blue, red());
        project.layer_mut(StructuralLayer::Color).reorder(blue, 0);
        project.layer_mut(StructuralLayer::Shade).set_opacity(0.25);
        project.order.move_layer(StructuralLayer::Fill, 0);

        let json = serde_json::to_string(&project.meta()).unwrap();
        let meta: ProjectMeta = serde_json::from_str(&json).unwrap();

        let mut restored = Project::new(4, 4, 1);
        restored.apply_meta(&meta).unwrap();
        assert_eq!(restored.total_frames(), 2);
        assert_eq!(restored.meta(), project.meta());
        assert_eq!(
            restored.sublayer(StructuralLayer::Color, blue).unwrap().parent(),
            Some(red())
        );
    }

    #[test]
    fn test_apply_meta_rejects_other_size() {
        let meta = Project::new(8, 8, 1).meta();
        let mut project = Project::new(4, 4, 1);
        assert!(project.apply_meta(&meta).is_err());
    }
}
