//! Editing context: what the user is pointing their tools at.
//!
//! The UI owns this state in a full application; history reads and writes it
//! when undo/redo jumps to another layer or frame, and pruning redirects the
//! active color when its sublayer disappears.

use crate::entities::{ColorKey, LayerTarget, StructuralLayer};

/// Most-recently-used colors kept per structural layer.
pub const RECENT_COLORS_MAX: usize = 16;

#[derive(Debug, Clone)]
pub struct EditContext {
    pub active_target: LayerTarget,
    pub current_frame: usize,
    /// Indexed by `StructuralLayer::ordinal()`.
    active_color: [ColorKey; StructuralLayer::COUNT],
    /// Per layer, most recent first.
    recent: [Vec<ColorKey>; StructuralLayer::COUNT],
}

impl Default for EditContext {
    fn default() -> Self {
        Self {
            active_target: LayerTarget::Layer(StructuralLayer::Fill),
            current_frame: 0,
            active_color: StructuralLayer::ALL.map(|l| l.default_color()),
            recent: Default::default(),
        }
    }
}

impl EditContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_color(&self, layer: StructuralLayer) -> ColorKey {
        self.active_color[layer.ordinal()]
    }

    pub fn set_active_color(&mut self, layer: StructuralLayer, key: ColorKey) {
        self.active_color[layer.ordinal()] = key;
    }

    /// Record a use of `key` on `layer` and make it the active color.
    pub fn use_color(&mut self, layer: StructuralLayer, key: ColorKey) {
        self.set_active_color(layer, key);
        let recent = &mut self.recent[layer.ordinal()];
        recent.retain(|k| *k != key);
        recent.insert(0, key);
        recent.truncate(RECENT_COLORS_MAX);
    }

    pub fn recent_colors(&self, layer: StructuralLayer) -> &[ColorKey] {
        &self.recent[layer.ordinal()]
    }

    /// Drop `key` from the recent list of `layer`.
    pub fn forget_color(&mut self, layer: StructuralLayer, key: ColorKey) {
        self.recent[layer.ordinal()].retain(|k| *k != key);
    }

    /// Jump to an edit location (undo/redo).
    pub fn focus(&mut self, layer: StructuralLayer, frame: usize) {
        self.active_target = LayerTarget::Layer(layer);
        self.current_frame = frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_color_is_mru() {
        let mut ctx = EditContext::new();
        let a = ColorKey::new(1, 0, 0);
        let b = ColorKey::new(2, 0, 0);
        ctx.use_color(StructuralLayer::Fill, a);
        ctx.use_color(StructuralLayer::Fill, b);
        ctx.use_color(StructuralLayer::Fill, a);
        assert_eq!(ctx.recent_colors(StructuralLayer::Fill), &[a, b]);
        assert_eq!(ctx.active_color(StructuralLayer::Fill), a);
        assert!(ctx.recent_colors(StructuralLayer::Line).is_empty());
        assert_eq!(ctx.active_color(StructuralLayer::Line), ColorKey::BLACK);
    }
}
