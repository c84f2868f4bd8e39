//! Structural layers and their per-color sublayers.
//!
//! # Architecture
//!
//! - `StructuralLayer` - one of the five fixed painting layers
//! - `Sublayer` - one color's ink on one structural layer, one slot per frame
//! - `LayerState` - a structural layer's opacity, sublayers and suborder
//!
//! # Invariants
//!
//! - `suborder` holds every key of `sublayers` exactly once, nothing else
//! - pairing is a forest of depth <= 1: a parent never has a parent, a child
//!   never has children. `pair()` is the only function that links sublayers.
//! - `children` is kept in lock-step with the children's `parent` fields

use indexmap::{IndexMap, IndexSet};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::canvas::CanvasBuffer;
use super::color::ColorKey;

/// The five fixed painting layers of a cel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StructuralLayer {
    Fill,
    Color,
    Shade,
    Line,
    Sketch,
}

impl StructuralLayer {
    pub const COUNT: usize = 5;

    /// All layers in ordinal order.
    pub const ALL: [StructuralLayer; 5] = [
        StructuralLayer::Fill,
        StructuralLayer::Color,
        StructuralLayer::Shade,
        StructuralLayer::Line,
        StructuralLayer::Sketch,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_ordinal(ordinal: usize) -> Option<Self> {
        Self::ALL.get(ordinal).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            StructuralLayer::Fill => "Fill",
            StructuralLayer::Color => "Color",
            StructuralLayer::Shade => "Shade",
            StructuralLayer::Line => "Line",
            StructuralLayer::Sketch => "Sketch",
        }
    }

    /// Color used when a layer has no sublayer left to select.
    pub fn default_color(self) -> ColorKey {
        match self {
            StructuralLayer::Fill => ColorKey::WHITE,
            StructuralLayer::Color => ColorKey::new(0xC8, 0xC8, 0xC8),
            StructuralLayer::Shade => ColorKey::new(0x40, 0x40, 0x40),
            StructuralLayer::Line => ColorKey::BLACK,
            StructuralLayer::Sketch => ColorKey::new(0x33, 0x66, 0xCC),
        }
    }

    /// Case-insensitive lookup by name or ordinal digit.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(n) = s.parse::<usize>() {
            return Self::from_ordinal(n);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.name().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for StructuralLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Edit target as selected in the layer panel.
///
/// `Backdrop` is the paper under all layers; it can't be painted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerTarget {
    Backdrop,
    Layer(StructuralLayer),
}

impl LayerTarget {
    pub fn layer(self) -> Option<StructuralLayer> {
        match self {
            LayerTarget::Backdrop => None,
            LayerTarget::Layer(l) => Some(l),
        }
    }
}

impl From<StructuralLayer> for LayerTarget {
    fn from(layer: StructuralLayer) -> Self {
        LayerTarget::Layer(layer)
    }
}

/// One color's paint data inside a structural layer.
#[derive(Clone, Debug)]
pub struct Sublayer {
    pub key: ColorKey,
    /// One slot per timeline frame. None = never painted.
    pub frames: Vec<Option<CanvasBuffer>>,
    parent: Option<ColorKey>,
    children: IndexSet<ColorKey>,
    pub collapsed: bool,
}

impl Sublayer {
    pub fn new(key: ColorKey, total_frames: usize) -> Self {
        Self {
            key,
            frames: vec![None; total_frames],
            parent: None,
            children: IndexSet::new(),
            collapsed: false,
        }
    }

    pub fn frame(&self, frame: usize) -> Option<&CanvasBuffer> {
        self.frames.get(frame).and_then(|slot| slot.as_ref())
    }

    pub fn frame_mut(&mut self, frame: usize) -> Option<&mut CanvasBuffer> {
        self.frames.get_mut(frame).and_then(|slot| slot.as_mut())
    }

    /// True if the slot at `frame` holds a visible pixel.
    pub fn has_content_at(&self, frame: usize) -> bool {
        self.frame(frame).is_some_and(|b| b.has_content())
    }

    /// True if any frame holds a visible pixel.
    pub fn has_any_content(&self) -> bool {
        self.frames.iter().flatten().any(|b| b.has_content())
    }

    /// Resize the frame array, keeping slots by index.
    pub fn resize(&mut self, total_frames: usize) {
        self.frames.resize(total_frames, None);
    }

    pub fn parent(&self) -> Option<ColorKey> {
        self.parent
    }

    pub fn children(&self) -> impl Iterator<Item = &ColorKey> {
        self.children.iter()
    }

    pub fn is_parent(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Where a sublayer sat inside its layer: suborder slot, pairing, panel state.
///
/// Captured before a sublayer is removed so it can be put back exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SublayerPlacement {
    pub index: usize,
    pub parent: Option<ColorKey>,
    pub children: Vec<ColorKey>,
    pub collapsed: bool,
}

/// Opacity, sublayers and compositing order of one structural layer.
#[derive(Clone, Debug)]
pub struct LayerState {
    pub layer: StructuralLayer,
    pub name: String,
    opacity: f32,
    previous_opacity: f32,
    sublayers: IndexMap<ColorKey, Sublayer>,
    suborder: Vec<ColorKey>,
}

impl LayerState {
    pub fn new(layer: StructuralLayer) -> Self {
        Self {
            layer,
            name: layer.name().to_string(),
            opacity: 1.0,
            previous_opacity: 1.0,
            sublayers: IndexMap::new(),
            suborder: Vec::new(),
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn previous_opacity(&self) -> f32 {
        self.previous_opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 1.0 };
        if opacity > 0.0 {
            self.previous_opacity = opacity;
        }
        self.opacity = opacity;
    }

    /// Restore both opacity values verbatim (persistence ingress).
    pub fn restore_opacity(&mut self, opacity: f32, previous_opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.previous_opacity = previous_opacity.clamp(0.0, 1.0);
    }

    /// Hide (opacity 0) or show again at the remembered opacity.
    pub fn toggle_visibility(&mut self) {
        if self.opacity > 0.0 {
            self.previous_opacity = self.opacity;
            self.opacity = 0.0;
        } else {
            self.opacity = if self.previous_opacity > 0.0 { self.previous_opacity } else { 1.0 };
        }
    }

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }

    /// Compositing order, bottom first.
    pub fn suborder(&self) -> &[ColorKey] {
        &self.suborder
    }

    pub fn get(&self, key: ColorKey) -> Option<&Sublayer> {
        self.sublayers.get(&key)
    }

    pub fn get_mut(&mut self, key: ColorKey) -> Option<&mut Sublayer> {
        self.sublayers.get_mut(&key)
    }

    pub fn contains(&self, key: ColorKey) -> bool {
        self.sublayers.contains_key(&key)
    }

    pub fn sublayers(&self) -> impl Iterator<Item = &Sublayer> {
        self.sublayers.values()
    }

    pub fn sublayers_mut(&mut self) -> impl Iterator<Item = &mut Sublayer> {
        self.sublayers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.sublayers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sublayers.is_empty()
    }

    /// Get or create the sublayer for `key`.
    pub fn ensure(&mut self, key: ColorKey, total_frames: usize) -> &mut Sublayer {
        if !self.suborder.contains(&key) {
            self.suborder.push(key);
        }
        let layer = self.layer;
        self.sublayers.entry(key).or_insert_with(|| {
            debug!("{}: new sublayer {}", layer, key);
            Sublayer::new(key, total_frames)
        })
    }

    /// Insert a whole sublayer (used when moving between layers).
    /// Pairing is reset. Returns false if the key already exists.
    pub(crate) fn insert(&mut self, mut sub: Sublayer) -> bool {
        if self.sublayers.contains_key(&sub.key) {
            return false;
        }
        sub.parent = None;
        sub.children.clear();
        self.suborder.retain(|k| *k != sub.key);
        self.suborder.push(sub.key);
        self.sublayers.insert(sub.key, sub);
        true
    }

    /// Remove a sublayer, unlinking it from the pairing forest.
    pub fn remove(&mut self, key: ColorKey) -> Option<Sublayer> {
        self.unpair(key);
        let children: Vec<ColorKey> = self
            .sublayers
            .get(&key)
            .map(|s| s.children.iter().copied().collect())
            .unwrap_or_default();
        for child in children {
            self.unpair(child);
        }
        self.suborder.retain(|k| *k != key);
        let removed = self.sublayers.shift_remove(&key);
        if removed.is_some() {
            debug!("{}: removed sublayer {}", self.layer, key);
        }
        removed
    }

    /// Move `key` to position `index` in the suborder (clamped).
    pub fn reorder(&mut self, key: ColorKey, index: usize) -> bool {
        let Some(pos) = self.suborder.iter().position(|k| *k == key) else {
            return false;
        };
        let key = self.suborder.remove(pos);
        let index = index.min(self.suborder.len());
        self.suborder.insert(index, key);
        true
    }

    /// Replace the suborder with `order`, keeping only known keys once and
    /// appending any keys `order` forgot.
    pub fn set_suborder(&mut self, order: &[ColorKey]) {
        let mut next: IndexSet<ColorKey> = order
            .iter()
            .copied()
            .filter(|k| self.sublayers.contains_key(k))
            .collect();
        next.extend(self.sublayers.keys().copied());
        self.suborder = next.into_iter().collect();
    }

    pub fn placement(&self, key: ColorKey) -> Option<SublayerPlacement> {
        let sub = self.sublayers.get(&key)?;
        let index = self.suborder.iter().position(|k| *k == key)?;
        Some(SublayerPlacement {
            index,
            parent: sub.parent,
            children: sub.children.iter().copied().collect(),
            collapsed: sub.collapsed,
        })
    }

    /// Put an existing sublayer back where `placement` says. Links to keys
    /// that no longer exist, or that the forest rule rejects, are skipped.
    pub fn restore_placement(&mut self, key: ColorKey, placement: &SublayerPlacement) -> bool {
        if !self.reorder(key, placement.index) {
            return false;
        }
        if let Some(parent) = placement.parent {
            self.pair(key, parent);
        }
        for child in &placement.children {
            let free = self.sublayers.get(child).is_some_and(|c| c.parent.is_none());
            if free {
                self.pair(*child, key);
            }
        }
        if let Some(sub) = self.sublayers.get_mut(&key) {
            sub.collapsed = placement.collapsed;
        }
        true
    }

    /// Link `child` under `parent`.
    ///
    /// Rejected when either key is missing, they're equal, `parent` is itself
    /// a child, or `child` already has children. An existing parent of
    /// `child` is replaced.
    pub fn pair(&mut self, child: ColorKey, parent: ColorKey) -> bool {
        if child == parent {
            return false;
        }
        let (Some(c), Some(p)) = (self.sublayers.get(&child), self.sublayers.get(&parent)) else {
            return false;
        };
        if p.parent.is_some() || c.is_parent() {
            return false;
        }

        self.unpair(child);
        if let Some(c) = self.sublayers.get_mut(&child) {
            c.parent = Some(parent);
        }
        if let Some(p) = self.sublayers.get_mut(&parent) {
            p.children.insert(child);
        }
        debug!("{}: paired {} under {}", self.layer, child, parent);
        true
    }

    /// Detach `child` from its parent. Returns false if it had none.
    pub fn unpair(&mut self, child: ColorKey) -> bool {
        let Some(parent) = self.sublayers.get_mut(&child).and_then(|c| c.parent.take()) else {
            return false;
        };
        if let Some(p) = self.sublayers.get_mut(&parent) {
            p.children.shift_remove(&child);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> ColorKey {
        ColorKey::parse(s).unwrap()
    }

    fn layer_with(keys: &[&str]) -> LayerState {
        let mut state = LayerState::new(StructuralLayer::Color);
        for k in keys {
            state.ensure(key(k), 3);
        }
        state
    }

    #[test]
    fn test_ensure_dedups_suborder() {
        let mut state = layer_with(&["#ff0000", "#00ff00"]);
        state.ensure(key("FF0000"), 3);
        assert_eq!(state.suborder(), &[key("ff0000"), key("00ff00")]);
        assert_eq!(state.len(), 2);
        assert_eq!(state.get(key("ff0000")).unwrap().frames.len(), 3);
    }

    #[test]
    fn test_pairing_forest_depth_one() {
        let mut state = layer_with(&["#111111", "#222222", "#333333"]);
        let (a, b, c) = (key("111111"), key("222222"), key("333333"));

        assert!(state.pair(b, a));
        // a is a parent, can't become a child
        assert!(!state.pair(a, c));
        // b is a child, can't become a parent
        assert!(!state.pair(c, b));
        assert!(!state.pair(a, a));

        assert_eq!(state.get(b).unwrap().parent(), Some(a));
        assert_eq!(state.get(a).unwrap().children().copied().collect::<Vec<_>>(), vec![b]);

        // re-pairing moves the child
        assert!(state.pair(b, c));
        assert!(!state.get(a).unwrap().is_parent());
        assert_eq!(state.get(b).unwrap().parent(), Some(c));
    }

    #[test]
    fn test_remove_orphans_children() {
        let mut state = layer_with(&["#111111", "#222222"]);
        let (a, b) = (key("111111"), key("222222"));
        assert!(state.pair(b, a));
        state.remove(a);
        assert_eq!(state.get(b).unwrap().parent(), None);
        assert_eq!(state.suborder(), &[b]);
    }

    #[test]
    fn test_placement_round_trip_after_remove() {
        let mut state = layer_with(&["#111111", "#222222", "#333333"]);
        let (a, b, c) = (key("111111"), key("222222"), key("333333"));
        assert!(state.pair(b, a));
        state.get_mut(a).unwrap().collapsed = true;

        let placement = state.placement(a).unwrap();
        assert_eq!(placement.index, 0);
        assert_eq!(placement.children, vec![b]);
        state.remove(a);

        state.ensure(a, 3);
        assert_eq!(state.suborder(), &[b, c, a]);
        assert!(state.restore_placement(a, &placement));
        assert_eq!(state.suborder(), &[a, b, c]);
        assert_eq!(state.get(b).unwrap().parent(), Some(a));
        assert!(state.get(a).unwrap().collapsed);
        assert!(!state.restore_placement(key("444444"), &placement));
    }

    #[test]
    fn test_toggle_visibility_restores_opacity() {
        let mut state = LayerState::new(StructuralLayer::Fill);
        state.set_opacity(0.6);
        state.toggle_visibility();
        assert_eq!(state.opacity(), 0.0);
        state.toggle_visibility();
        assert!((state.opacity() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_reorder_and_set_suborder() {
        let mut state = layer_with(&["#111111", "#222222", "#333333"]);
        assert!(state.reorder(key("333333"), 0));
        assert_eq!(state.suborder()[0], key("333333"));
        assert!(!state.reorder(key("444444"), 0));

        state.set_suborder(&[key("222222"), key("222222"), key("999999")]);
        assert_eq!(state.suborder(), &[key("222222"), key("111111"), key("333333")]);
    }

    #[test]
    fn test_parse_layer_names() {
        assert_eq!(StructuralLayer::parse("line"), Some(StructuralLayer::Line));
        assert_eq!(StructuralLayer::parse("0"), Some(StructuralLayer::Fill));
        assert_eq!(StructuralLayer::parse("paper"), None);
    }
}
