//! Session: one open project with its history, editing context and config.
//!
//! **Why**: the input layer speaks in "fill here with this color", not in
//! observers and transactions. Session runs the engine with history as the
//! observer, keeps the recent-color bookkeeping in step and prunes emptied
//! sublayers after erases.
//!
//! **Used by**: the CLI runner, and any host UI in place of calling the engine
//! functions directly.

use log::{debug, info};

use super::context::EditContext;
use super::fill::{self, EraseScope, Point};
use super::history::History;
use crate::config::EngineConfig;
use crate::entities::{CanvasBuffer, ColorKey, Composited, LayerTarget, Project, StructuralLayer};

#[derive(Debug)]
pub struct Session {
    pub project: Project,
    pub history: History,
    pub context: EditContext,
    pub config: EngineConfig,
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.validated();
        let project = Project::new(config.content_width, config.content_height, config.total_frames);
        info!(
            "Session: {}x{}, {} frames, gap {} px",
            config.content_width, config.content_height, config.total_frames, config.gap_px
        );
        Self {
            project,
            history: History::new(config.history_capacity),
            context: EditContext::new(),
            config,
        }
    }

    /// Seeded fill on the active frame of `target` with `color`.
    ///
    /// Backdrop targets and unresolved colors are no-ops.
    pub fn fill(&mut self, frame: usize, seeds: &[Point], target: LayerTarget, color: Option<ColorKey>) -> bool {
        let (Some(layer), Some(color)) = (target.layer(), color) else {
            debug!("Fill ignored: target {:?}, color {:?}", target, color);
            return false;
        };
        let done = fill::fill_from_seeds(
            &mut self.project,
            frame,
            seeds,
            layer,
            color,
            self.config.gap_px,
            &mut self.history,
        );
        if done {
            self.context.use_color(layer, color);
        }
        done
    }

    /// Seeded erase; prunes sublayers left empty in every touched layer.
    pub fn erase(&mut self, frame: usize, seeds: &[Point], scope: EraseScope, color_filter: Option<ColorKey>) -> bool {
        let done = fill::erase_from_seeds(
            &mut self.project,
            frame,
            seeds,
            scope,
            color_filter,
            self.config.gap_px,
            &mut self.history,
        );
        if done {
            for layer in scope.layers() {
                self.history
                    .prune_unused_sublayers(&mut self.project, layer, &mut self.context);
            }
        }
        done
    }

    /// Flood every enclosed region of `frame` into FILL with the configured
    /// whole-cel color.
    pub fn fill_whole_cel(&mut self, frame: usize) -> bool {
        let color = self.config.whole_cel_color;
        let done = fill::fill_whole_cel(
            &mut self.project,
            frame,
            color,
            self.config.gap_px,
            &mut self.history,
        );
        if done {
            self.context.use_color(StructuralLayer::Fill, color);
        }
        done
    }

    /// Whole-cel fill over several frames. `between` runs after each frame so
    /// the host can yield, report progress or stop caring about the result.
    /// Returns the number of frames that changed.
    pub fn fill_whole_cel_frames<I, F>(&mut self, frames: I, mut between: F) -> usize
    where
        I: IntoIterator<Item = usize>,
        F: FnMut(usize, bool),
    {
        let mut changed = 0;
        for frame in frames {
            let done = self.fill_whole_cel(frame);
            if done {
                changed += 1;
            }
            between(frame, done);
        }
        changed
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.project, &mut self.context)
    }

    /// Redo, then prune the redone layer again so an erase that emptied a
    /// sublayer leaves no empty sublayer behind.
    pub fn redo(&mut self) -> bool {
        let done = self.history.redo(&mut self.project, &mut self.context);
        if done {
            if let Some(layer) = self.context.active_target.layer() {
                self.history
                    .prune_unused_sublayers(&mut self.project, layer, &mut self.context);
            }
        }
        done
    }

    pub fn resize_timeline(&mut self, total_frames: usize) {
        self.project.resize_timeline(total_frames);
        self.config.total_frames = self.project.total_frames();
        if self.context.current_frame >= self.config.total_frames {
            self.context.current_frame = self.config.total_frames - 1;
        }
    }

    pub fn composite(&self, frame: usize) -> CanvasBuffer {
        self.project.composite(frame)
    }

    /// Composite with held-frame fallback at the configured alpha.
    pub fn composite_held(&self, frame: usize) -> Composited {
        self.project.composite_held(frame, self.config.held_frame_alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn circle_session(frames: usize) -> Session {
        let mut session = Session::new(EngineConfig {
            content_width: 64,
            content_height: 64,
            total_frames: frames,
            gap_px: 0,
            ..EngineConfig::default()
        });
        session.project = crate::core::testkit::circle_project_frames(frames);
        session
    }

    fn red() -> Option<ColorKey> {
        ColorKey::parse("#FF0000")
    }

    #[test]
    fn test_fill_erase_prune_scenario() {
        let mut session = circle_session(1);
        let seeds = [Point::new(32.0, 32.0)];
        let red = red().unwrap();

        assert!(session.fill(0, &seeds, StructuralLayer::Fill.into(), Some(red)));
        assert_eq!(session.context.active_color(StructuralLayer::Fill), red);
        assert_eq!(session.composite(0).pixel(32, 32), [255, 0, 0, 255]);
        assert_eq!(session.composite(0).pixel(0, 0), [0, 0, 0, 0]);

        assert!(session.erase(0, &seeds, EraseScope::Layer(StructuralLayer::Fill), None));
        let fill = session.project.layer(StructuralLayer::Fill);
        assert!(!fill.contains(red));
        assert!(fill.suborder().is_empty());
        assert_eq!(
            session.context.active_color(StructuralLayer::Fill),
            StructuralLayer::Fill.default_color()
        );

        // erase then fill are both undoable
        assert!(session.undo());
        assert_eq!(session.composite(0).pixel(32, 32), [255, 0, 0, 255]);
        assert!(session.undo());
        assert_eq!(session.composite(0).pixel(32, 32)[3], 0);
        assert!(session.redo());
        assert_eq!(session.composite(0).pixel(32, 32), [255, 0, 0, 255]);
    }

    #[test]
    fn test_undo_of_pruning_erase_restores_placement() {
        let mut session = circle_session(1);
        let seeds = [Point::new(32.0, 32.0)];
        let red = red().unwrap();
        let blue = ColorKey::new(0, 0, 255);
        let fill = StructuralLayer::Fill;

        assert!(session.fill(0, &seeds, fill.into(), Some(red)));
        assert!(session.fill(0, &seeds, fill.into(), Some(blue)));
        assert!(session.project.pair_sublayers(fill, blue, red));
        assert!(session.project.set_collapsed(fill, red, true));
        assert_eq!(session.project.layer(fill).suborder(), &[red, blue]);
        let before = session.composite(0);
        assert_eq!(before.pixel(32, 32), [0, 0, 255, 255]);

        assert!(session.erase(0, &seeds, EraseScope::Layer(fill), Some(red)));
        assert!(!session.project.layer(fill).contains(red));
        assert_eq!(session.project.sublayer(fill, blue).unwrap().parent(), None);

        assert!(session.undo());
        let state = session.project.layer(fill);
        assert_eq!(state.suborder(), &[red, blue]);
        assert_eq!(state.get(blue).unwrap().parent(), Some(red));
        assert!(state.get(red).unwrap().collapsed);
        assert_eq!(session.composite(0), before);

        assert!(session.redo());
        assert!(!session.project.layer(fill).contains(red));
        assert!(session.project.layer(fill).sublayers().all(|s| s.has_any_content()));

        // and once more, now through the placement recorded on redo
        assert!(session.undo());
        assert_eq!(session.project.layer(fill).suborder(), &[red, blue]);
        assert_eq!(session.composite(0), before);
    }

    #[test]
    fn test_noop_conditions_record_nothing() {
        let mut session = circle_session(1);
        let seeds = [Point::new(32.0, 32.0)];
        assert!(!session.fill(0, &seeds, LayerTarget::Backdrop, red()));
        assert!(!session.fill(0, &seeds, StructuralLayer::Fill.into(), ColorKey::parse("#xyz")));
        assert!(!session.fill(0, &[Point::new(0.0, 0.0)], StructuralLayer::Fill.into(), red()));
        assert!(!session.erase(0, &seeds, EraseScope::All, None));
        assert!(!session.history.can_undo());
        assert!(!session.undo());
    }

    #[test]
    fn test_fill_whole_cel_frames_calls_between() {
        let mut session = circle_session(3);
        session.project.resize_timeline(4);
        let mut seen = Vec::new();
        let changed = session.fill_whole_cel_frames(0..4, |f, done| seen.push((f, done)));
        assert_eq!(changed, 3);
        assert_eq!(seen, vec![(0, true), (1, true), (2, true), (3, false)]);

        let white = session.config.whole_cel_color;
        assert_eq!(session.project.buffer(StructuralLayer::Fill, 2, white).unwrap().pixel(32, 32)[3], 255);
        assert_eq!(session.history.undo_len(), 3);
    }

    #[test]
    fn test_held_frame_uses_config_alpha() {
        let mut session = circle_session(2);
        session.project.resize_timeline(3);
        session.config.held_frame_alpha = 0.5;
        let held = session.composite_held(2);
        assert!(held.held);
        assert_eq!(held.source_frame, 1);
    }

    #[test]
    fn test_resize_timeline_clamps_current_frame() {
        let mut session = circle_session(4);
        session.context.current_frame = 3;
        session.resize_timeline(2);
        assert_eq!(session.context.current_frame, 1);
        assert_eq!(session.config.total_frames, 2);
    }
}
