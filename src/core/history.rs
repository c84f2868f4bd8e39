//! Scoped undo/redo over individual cel buffers.
//!
//! One logical edit is a transaction on exactly one (layer, frame, color)
//! buffer:
//!
//! ```text
//! Idle --begin--> Pending{before, dirty=false} --mark_dirty--> dirty=true
//!      <--commit-- (push {before, after} if dirty and something existed)
//! ```
//!
//! Snapshots are full copies of the buffer pixels or `None` when the slot
//! did not exist. Undo restores `before`, redo restores `after`; `None` frees
//! the slot again. Both stacks are bounded and evict the oldest entry.
//!
//! The engine drives transactions through [`EditObserver`], so a multi-buffer
//! erase records one action per touched buffer.
//!
//! Pruning is not an action of its own. A pruned sublayer's placement is
//! stored on the newest action for that buffer, and undoing that action puts
//! the sublayer back in its suborder slot with its pairing and collapsed flag.

use std::collections::VecDeque;

use log::{debug, warn};

use super::context::EditContext;
use super::fill::{EditObserver, EditTarget};
use crate::entities::{CanvasBuffer, ColorKey, LayerTarget, Project, StructuralLayer, SublayerPlacement};

/// Default undo depth.
pub const HISTORY_CAPACITY: usize = 50;

/// Pixel copy of one buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Snapshot {
    pub fn capture(buffer: &CanvasBuffer) -> Self {
        Self {
            width: buffer.width(),
            height: buffer.height(),
            pixels: buffer.pixels().to_vec(),
        }
    }

    pub fn to_buffer(&self) -> Option<CanvasBuffer> {
        CanvasBuffer::from_rgba(self.width, self.height, self.pixels.clone()).ok()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// One committed edit.
#[derive(Clone, Debug)]
pub struct HistoryAction {
    pub layer: StructuralLayer,
    pub frame: usize,
    pub key: ColorKey,
    pub before: Option<Snapshot>,
    pub after: Option<Snapshot>,
    /// Set when the sublayer was pruned after this action emptied it.
    pub pruned: Option<SublayerPlacement>,
}

/// Result of [`History::begin`].
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BeginOutcome {
    /// Transaction is pending.
    Started,
    /// Nothing to track (backdrop target or no resolvable color).
    Ignored,
    /// A previous transaction was still pending and has been dropped.
    /// The new one is pending unless its target was ignorable.
    DiscardedPending,
}

#[derive(Clone, Debug)]
struct PendingEdit {
    layer: StructuralLayer,
    frame: usize,
    key: ColorKey,
    before: Option<Snapshot>,
    dirty: bool,
}

#[derive(Clone, Debug, Default)]
enum Transaction {
    #[default]
    Idle,
    Pending(PendingEdit),
}

/// Undo/redo stacks plus the single pending transaction.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<HistoryAction>,
    redo: VecDeque<HistoryAction>,
    capacity: usize,
    state: Transaction,
}

impl Default for History {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

fn snapshot_of(project: &Project, layer: StructuralLayer, frame: usize, key: ColorKey) -> Option<Snapshot> {
    project.buffer(layer, frame, key).map(Snapshot::capture)
}

fn push_bounded(stack: &mut VecDeque<HistoryAction>, action: HistoryAction, capacity: usize) {
    stack.push_back(action);
    while stack.len() > capacity {
        stack.pop_front();
    }
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: VecDeque::new(),
            capacity: capacity.max(1),
            state: Transaction::Idle,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, Transaction::Pending(_))
    }

    pub fn is_dirty(&self) -> bool {
        matches!(&self.state, Transaction::Pending(p) if p.dirty)
    }

    /// Last committed action.
    pub fn last(&self) -> Option<&HistoryAction> {
        self.undo.back()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.state = Transaction::Idle;
    }

    /// Open a transaction on (target, frame, color) and snapshot `before`.
    pub fn begin(
        &mut self,
        target: LayerTarget,
        frame: usize,
        color: Option<ColorKey>,
        project: &Project,
    ) -> BeginOutcome {
        let discarded = match std::mem::take(&mut self.state) {
            Transaction::Pending(old) => {
                warn!(
                    "History: begin while {} {} f{} pending, discarding it",
                    old.layer, old.key, old.frame
                );
                true
            }
            Transaction::Idle => false,
        };

        let (Some(layer), Some(key)) = (target.layer(), color) else {
            return if discarded { BeginOutcome::DiscardedPending } else { BeginOutcome::Ignored };
        };

        self.state = Transaction::Pending(PendingEdit {
            layer,
            frame,
            key,
            before: snapshot_of(project, layer, frame, key),
            dirty: false,
        });
        if discarded { BeginOutcome::DiscardedPending } else { BeginOutcome::Started }
    }

    pub fn mark_dirty(&mut self) {
        if let Transaction::Pending(p) = &mut self.state {
            p.dirty = true;
        }
    }

    /// Drop the pending transaction without recording it.
    pub fn discard(&mut self) {
        self.state = Transaction::Idle;
    }

    /// Close the pending transaction. Returns true if an action was recorded.
    pub fn commit(&mut self, project: &Project) -> bool {
        let Transaction::Pending(p) = std::mem::take(&mut self.state) else {
            return false;
        };
        if !p.dirty {
            return false;
        }
        let after = snapshot_of(project, p.layer, p.frame, p.key);
        if p.before.is_none() && after.is_none() {
            return false;
        }

        debug!("History: commit {} {} f{}", p.layer, p.key, p.frame);
        push_bounded(
            &mut self.undo,
            HistoryAction {
                layer: p.layer,
                frame: p.frame,
                key: p.key,
                before: p.before,
                after,
                pruned: None,
            },
            self.capacity,
        );
        self.redo.clear();
        true
    }

    fn restore(project: &mut Project, action: &HistoryAction, snapshot: Option<&Snapshot>) {
        let buffer = snapshot.and_then(Snapshot::to_buffer);
        project.set_slot(action.layer, action.frame, action.key, buffer);
    }

    /// Revert the last action and focus its layer/frame.
    pub fn undo(&mut self, project: &mut Project, context: &mut EditContext) -> bool {
        if self.is_pending() {
            warn!("History: undo with pending transaction, discarding it");
            self.discard();
        }
        let Some(mut action) = self.undo.pop_back() else {
            return false;
        };
        context.focus(action.layer, action.frame);
        Self::restore(project, &action, action.before.as_ref());
        if let Some(placement) = action.pruned.take() {
            project
                .layer_mut(action.layer)
                .restore_placement(action.key, &placement);
        }
        debug!("History: undo {} {} f{}", action.layer, action.key, action.frame);
        push_bounded(&mut self.redo, action, self.capacity);
        true
    }

    /// Re-apply the last undone action and focus its layer/frame.
    pub fn redo(&mut self, project: &mut Project, context: &mut EditContext) -> bool {
        if self.is_pending() {
            warn!("History: redo with pending transaction, discarding it");
            self.discard();
        }
        let Some(action) = self.redo.pop_back() else {
            return false;
        };
        context.focus(action.layer, action.frame);
        Self::restore(project, &action, action.after.as_ref());
        debug!("History: redo {} {} f{}", action.layer, action.key, action.frame);
        push_bounded(&mut self.undo, action, self.capacity);
        true
    }

    /// Remove every sublayer of `layer` without a visible pixel in any frame.
    ///
    /// Removed keys are forgotten from the recent colors; if the active color
    /// of `layer` was removed it moves to the most recent remaining key or the
    /// layer default. The placement of each removed sublayer is kept on the
    /// newest undoable action for it. Returns the removed keys.
    pub fn prune_unused_sublayers(
        &mut self,
        project: &mut Project,
        layer: StructuralLayer,
        context: &mut EditContext,
    ) -> Vec<ColorKey> {
        let empty: Vec<ColorKey> = project
            .layer(layer)
            .sublayers()
            .filter(|s| !s.has_any_content())
            .map(|s| s.key)
            .collect();

        for key in &empty {
            let placement = project.layer(layer).placement(*key);
            project.layer_mut(layer).remove(*key);
            context.forget_color(layer, *key);
            if let Some(action) = self
                .undo
                .iter_mut()
                .rev()
                .find(|a| a.layer == layer && a.key == *key)
            {
                action.pruned = placement;
            }
        }

        if empty.contains(&context.active_color(layer)) {
            let state = project.layer(layer);
            let next = context
                .recent_colors(layer)
                .iter()
                .copied()
                .find(|k| state.contains(*k))
                .unwrap_or_else(|| layer.default_color());
            debug!("{}: active color -> {}", layer, next);
            context.set_active_color(layer, next);
        }

        if !empty.is_empty() {
            debug!("{}: pruned {} empty sublayer(s)", layer, empty.len());
        }
        empty
    }
}

impl EditObserver for History {
    fn before_edit(&mut self, project: &Project, target: EditTarget) {
        let _ = self.begin(LayerTarget::Layer(target.layer), target.frame, Some(target.key), project);
    }

    fn after_edit(&mut self, project: &Project, _target: EditTarget, changed: bool) {
        if changed {
            self.mark_dirty();
        }
        self.commit(project);
    }
}
