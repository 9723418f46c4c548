//! Snapshot-and-replay undo
//!
//! The manager keeps a clone of the document tree taken at
//! [`TrivialUndoManager::save_initial_state`] plus the grouped operation
//! log executed since. Undo rewinds by restoring the snapshot and
//! replaying everything except the undone states; redo replays the undone
//! states directly. Simple, and always consistent with what execution
//! would have produced.

use dom::Tree;
use ops::{Document, EventNotifier, OpSpec, SubscriptionId};
use tracing::debug;

use crate::rules::UndoStateRules;

/// Emitted whenever the undo or redo stack availability changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoStackEvent {
    pub undo_available: bool,
    pub redo_available: bool,
}

/// Undo manager for a single local editing history
pub struct TrivialUndoManager {
    rules: UndoStateRules,
    /// Tree as it looked when the initial state was saved
    initial_snapshot: Option<Tree>,
    /// Operations that precede every undoable state (cursor setup and the
    /// like); replayed first after a snapshot restore
    initial_state: Vec<OpSpec>,
    undo_states: Vec<Vec<OpSpec>>,
    redo_states: Vec<Vec<OpSpec>>,
    /// Open state still accepting operations; starts with an edit
    current: Vec<OpSpec>,
    /// Until the first edit arrives, executed operations extend the
    /// initial state instead of forming an undoable one
    collecting_initial: bool,
    /// Number of times editing discarded a pending redo history
    branches: u64,
    is_executing_ops: bool,
    notifier: EventNotifier<UndoStackEvent>,
    /// (branches, undo depth, open-state edit count) at the last
    /// unmodified mark
    unmodified: (u64, usize, usize),
}

impl Default for TrivialUndoManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TrivialUndoManager {
    pub fn new() -> Self {
        Self {
            rules: UndoStateRules::new(),
            initial_snapshot: None,
            initial_state: Vec::new(),
            undo_states: Vec::new(),
            redo_states: Vec::new(),
            current: Vec::new(),
            collecting_initial: true,
            branches: 0,
            is_executing_ops: false,
            notifier: EventNotifier::new(),
            unmodified: (0, 0, 0),
        }
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&UndoStackEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    pub fn has_undo_states(&self) -> bool {
        !self.undo_states.is_empty() || !self.current.is_empty()
    }

    pub fn has_redo_states(&self) -> bool {
        !self.redo_states.is_empty()
    }

    pub fn branches(&self) -> u64 {
        self.branches
    }

    /// True while the manager itself is replaying operations; execution
    /// reported during this window is ignored
    pub fn is_executing_ops(&self) -> bool {
        self.is_executing_ops
    }

    /// Captures the earliest point the document can be rewound to.
    ///
    /// Operations executed before this call (initial cursor adds and the
    /// like) fold into the initial state and are replayed after every
    /// snapshot restore. Clears both stacks.
    pub fn save_initial_state(&mut self, doc: &Document) {
        self.initial_state.extend(self.undo_states.drain(..).flatten());
        self.initial_state.append(&mut self.current);
        self.redo_states.clear();
        self.initial_snapshot = Some(doc.tree().clone());
        self.collecting_initial = true;
        self.unmodified = self.fingerprint();
        self.emit_stack_change();
    }

    /// Forgets the snapshot and all recorded history
    pub fn reset_initial_state(&mut self) {
        self.initial_snapshot = None;
        self.initial_state.clear();
        self.undo_states.clear();
        self.redo_states.clear();
        self.current.clear();
        self.collecting_initial = true;
        self.unmodified = self.fingerprint();
        self.emit_stack_change();
    }

    /// Records an executed operation into the open undo state
    pub fn on_operation_executed(&mut self, spec: &OpSpec) {
        if self.is_executing_ops {
            return;
        }
        let is_edit = self.rules.is_edit_operation(spec);
        if is_edit && !self.redo_states.is_empty() {
            // editing after undo abandons the redone branch
            self.redo_states.clear();
            self.branches += 1;
        }
        if self.collecting_initial {
            if is_edit {
                self.collecting_initial = false;
                self.current.push(spec.clone());
            } else {
                self.initial_state.push(spec.clone());
            }
        } else if self.rules.is_part_of_operation_set(spec, &self.current) {
            self.current.push(spec.clone());
        } else {
            self.complete_current_state();
            self.current.push(spec.clone());
        }
        self.emit_stack_change();
    }

    /// Rewinds up to `states` undo states, returning how many were undone
    pub fn move_backward(&mut self, doc: &mut Document, states: usize) -> usize {
        let snapshot = match &self.initial_snapshot {
            Some(snapshot) => snapshot.clone(),
            None => return 0,
        };
        self.complete_current_state();
        let mut moved = 0;
        while moved < states {
            match self.undo_states.pop() {
                Some(state) => {
                    self.redo_states.push(state);
                    moved += 1;
                }
                None => break,
            }
        }
        if moved == 0 {
            return 0;
        }
        debug!(moved, remaining = self.undo_states.len(), "undo");
        self.is_executing_ops = true;
        doc.reset_tree(snapshot);
        // cursor-add operations in the replayed log re-register everyone
        doc.remove_all_cursors();
        for spec in &self.initial_state {
            spec.execute(doc);
        }
        for state in &self.undo_states {
            for spec in state {
                spec.execute(doc);
            }
        }
        self.is_executing_ops = false;
        self.emit_stack_change();
        moved
    }

    /// Replays up to `states` redo states, returning how many were redone
    pub fn move_forward(&mut self, doc: &mut Document, states: usize) -> usize {
        let mut moved = 0;
        self.is_executing_ops = true;
        while moved < states {
            match self.redo_states.pop() {
                Some(state) => {
                    for spec in &state {
                        spec.execute(doc);
                    }
                    self.undo_states.push(state);
                    moved += 1;
                }
                None => break,
            }
        }
        self.is_executing_ops = false;
        if moved > 0 {
            debug!(moved, "redo");
            self.emit_stack_change();
        }
        moved
    }

    /// True when the recorded history differs from the last
    /// [`mark_unmodified`](Self::mark_unmodified) point
    pub fn is_modified(&self) -> bool {
        self.fingerprint() != self.unmodified
    }

    pub fn mark_unmodified(&mut self) {
        self.unmodified = self.fingerprint();
    }

    fn fingerprint(&self) -> (u64, usize, usize) {
        (
            self.branches,
            self.undo_states.len(),
            self.current.iter().filter(|spec| spec.is_edit()).count(),
        )
    }

    fn complete_current_state(&mut self) {
        if self.current.is_empty() {
            return;
        }
        // a state is only worth keeping when it contains an edit
        if self.current.iter().any(|spec| spec.is_edit()) {
            self.undo_states.push(std::mem::take(&mut self.current));
        } else {
            self.current.clear();
        }
    }

    fn emit_stack_change(&mut self) {
        let event = UndoStackEvent {
            undo_available: self.has_undo_states(),
            redo_available: self.has_redo_states(),
        };
        self.notifier.emit(&event);
    }
}

impl std::fmt::Debug for TrivialUndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrivialUndoManager")
            .field("undo_states", &self.undo_states.len())
            .field("redo_states", &self.redo_states.len())
            .field("current", &self.current.len())
            .field("branches", &self.branches)
            .finish()
    }
}
