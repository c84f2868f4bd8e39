//! Core engine: boundary masks, fill/erase, undo history and the session
//! that wires them to a project.

pub mod context;
pub mod fill;
pub mod history;
pub mod mask;
pub mod session;

pub use context::EditContext;
pub use fill::{EditObserver, EditTarget, EraseScope, Point};
pub use history::{BeginOutcome, History, HistoryAction, Snapshot};
pub use mask::{BoundaryMask, InkSource, Mask};
pub use session::Session;

/// Line art fixtures shared by the engine tests.
#[cfg(test)]
pub(crate) mod testkit {
    use crate::entities::{ColorKey, Project, StructuralLayer};

    /// 64x64, one frame, LINE ring of width 2 (19 <= d < 21) around (32, 32).
    pub fn circle_project() -> Project {
        circle_project_frames(1)
    }

    pub fn circle_project_frames(frames: usize) -> Project {
        let mut project = Project::new(64, 64, frames);
        for f in 0..frames {
            let buf = project
                .get_frame_buffer(StructuralLayer::Line, f, ColorKey::BLACK)
                .unwrap();
            for y in 0..64 {
                for x in 0..64 {
                    let dx = x as f32 - 32.0;
                    let dy = y as f32 - 32.0;
                    let d = (dx * dx + dy * dy).sqrt();
                    if (19.0..21.0).contains(&d) {
                        buf.set_pixel(y * 64 + x, [0, 0, 0, 255]);
                    }
                }
            }
        }
        project
    }

    /// 64x64, one frame, 1 px LINE rectangle with corners (10, 10)-(50, 50),
    /// optionally leaving one pixel out.
    pub fn rect_outline_project(gap: Option<(usize, usize)>) -> Project {
        let mut project = Project::new(64, 64, 1);
        let buf = project
            .get_frame_buffer(StructuralLayer::Line, 0, ColorKey::BLACK)
            .unwrap();
        for i in 10..=50 {
            for (x, y) in [(i, 10), (i, 50), (10, i), (50, i)] {
                if Some((x, y)) != gap {
                    buf.set_pixel(y * 64 + x, [0, 0, 0, 255]);
                }
            }
        }
        project
    }
}
