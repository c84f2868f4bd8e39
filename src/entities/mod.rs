//! Entities module - the paint document and its pieces
//!
//! Pure data plus the read-side operations on it (compositing). Editing
//! lives in `core`.

pub mod canvas;
pub mod color;
pub mod compositor;
pub mod layer;
pub mod order;
pub mod project;

pub use canvas::{CanvasBuffer, CanvasError};
pub use color::ColorKey;
pub use compositor::{Composited, CpuCompositor, Direction};
pub use layer::{LayerState, LayerTarget, StructuralLayer, Sublayer, SublayerPlacement};
pub use order::CompositingOrder;
pub use project::{CelRef, LayerMeta, Project, ProjectMeta};
