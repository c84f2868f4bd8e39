//! Top-to-bottom draw order of the structural layers.

use serde::{Deserialize, Serialize};

use super::layer::StructuralLayer;

/// Permutation of the five structural layers, top first.
///
/// Always total and duplicate-free: anything else fed in (bad ordinals,
/// duplicates, wrong length) is replaced by [`CompositingOrder::default`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct CompositingOrder([StructuralLayer; 5]);

impl Default for CompositingOrder {
    fn default() -> Self {
        Self([
            StructuralLayer::Sketch,
            StructuralLayer::Line,
            StructuralLayer::Shade,
            StructuralLayer::Color,
            StructuralLayer::Fill,
        ])
    }
}

impl CompositingOrder {
    /// Build from ordinals (top first), repairing to default if invalid.
    pub fn from_ordinals(ordinals: &[usize]) -> Self {
        if ordinals.len() != StructuralLayer::COUNT {
            return Self::default();
        }
        let mut seen = [false; StructuralLayer::COUNT];
        let mut out = Self::default().0;
        for (slot, &n) in out.iter_mut().zip(ordinals) {
            match StructuralLayer::from_ordinal(n) {
                Some(layer) if !seen[n] => {
                    seen[n] = true;
                    *slot = layer;
                }
                _ => return Self::default(),
            }
        }
        Self(out)
    }

    pub fn ordinals(&self) -> Vec<usize> {
        self.0.iter().map(|l| l.ordinal()).collect()
    }

    pub fn top_to_bottom(&self) -> impl Iterator<Item = StructuralLayer> + '_ {
        self.0.iter().copied()
    }

    /// Draw order for compositing.
    pub fn bottom_to_top(&self) -> impl Iterator<Item = StructuralLayer> + '_ {
        self.0.iter().rev().copied()
    }

    pub fn position(&self, layer: StructuralLayer) -> usize {
        self.0.iter().position(|l| *l == layer).unwrap_or(0)
    }

    /// Move `layer` to `index` (0 = top), shifting the others.
    pub fn move_layer(&mut self, layer: StructuralLayer, index: usize) {
        let mut v: Vec<StructuralLayer> = self.0.to_vec();
        v.retain(|l| *l != layer);
        v.insert(index.min(v.len()), layer);
        for (slot, l) in self.0.iter_mut().zip(v) {
            *slot = l;
        }
    }
}

impl From<Vec<usize>> for CompositingOrder {
    fn from(v: Vec<usize>) -> Self {
        Self::from_ordinals(&v)
    }
}

impl From<CompositingOrder> for Vec<usize> {
    fn from(order: CompositingOrder) -> Self {
        order.ordinals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_orders_repair_to_default() {
        assert_eq!(CompositingOrder::from_ordinals(&[0, 1, 2]), CompositingOrder::default());
        assert_eq!(CompositingOrder::from_ordinals(&[0, 0, 1, 2, 3]), CompositingOrder::default());
        assert_eq!(CompositingOrder::from_ordinals(&[0, 1, 2, 3, 9]), CompositingOrder::default());
    }

    #[test]
    fn test_valid_order_kept() {
        let order = CompositingOrder::from_ordinals(&[0, 1, 2, 3, 4]);
        assert_eq!(order.ordinals(), vec![0, 1, 2, 3, 4]);
        assert_eq!(order.bottom_to_top().next(), Some(StructuralLayer::Sketch));
    }

    #[test]
    fn test_move_layer() {
        let mut order = CompositingOrder::default();
        order.move_layer(StructuralLayer::Fill, 0);
        assert_eq!(order.position(StructuralLayer::Fill), 0);
        assert_eq!(order.position(StructuralLayer::Sketch), 1);
        assert_eq!(order.ordinals().len(), 5);
    }

    #[test]
    fn test_serde_repairs() {
        let order: CompositingOrder = serde_json::from_str("[4, 4, 4, 4, 4]").unwrap();
        assert_eq!(order, CompositingOrder::default());
        let json = serde_json::to_string(&CompositingOrder::default()).unwrap();
        assert_eq!(json, "[4,3,2,1,0]");
    }
}
