//! CELPAINT - gap-tolerant flood fill engine for layered cel animation
//!
//! Re-exports all modules for use by the binary target.

// Core engine (masks, fill, history, session)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;

pub use core::{EditContext, History, Session};
pub use entities::{CanvasBuffer, ColorKey, LayerTarget, Project, StructuralLayer};
