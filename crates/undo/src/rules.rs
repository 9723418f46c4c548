//! Undo state grouping rules
//!
//! Decides whether a newly executed operation belongs to the open undo
//! state or begins a new one. The grouping mirrors how word processors
//! batch keystrokes: a typing run is one state, a backspace run is one
//! state, and cursor movement never breaks a state on its own.

use ops::OpSpec;

/// Grouping policy for undo states.
///
/// An operation joins the open state when any of these hold, checked in
/// order:
/// 1. it is not an edit operation (cursor and member traffic always joins),
/// 2. the state is empty,
/// 3. it carries the same explicit `group` id as the previous operation,
/// 4. it aggregates with the state's edit run: same member and aggregable
///    type as the last edit, adjacent to it for the first continuation, and
///    keeping the run's direction of travel afterwards.
#[derive(Debug, Default)]
pub struct UndoStateRules;

/// Only plain typing and deleting aggregate across operations
fn can_aggregate(optype: &str) -> bool {
    matches!(optype, "InsertText" | "RemoveText")
}

fn op_position(spec: &OpSpec) -> Option<i64> {
    match &spec.body {
        ops::OpBody::InsertText { position, .. } | ops::OpBody::RemoveText { position, .. } => {
            Some(*position as i64)
        }
        _ => None,
    }
}

impl UndoStateRules {
    pub fn new() -> Self {
        Self
    }

    pub fn is_edit_operation(&self, spec: &OpSpec) -> bool {
        spec.is_edit()
    }

    /// True if `spec` belongs to the state holding `last_operations`
    pub fn is_part_of_operation_set(&self, spec: &OpSpec, last_operations: &[OpSpec]) -> bool {
        if !self.is_edit_operation(spec) {
            return true;
        }
        let last = match last_operations.last() {
            Some(last) => last,
            None => return true,
        };
        if spec.group.is_some() && spec.group == last.group {
            return true;
        }
        if !self.is_edit_operation(last) {
            // an edit may not resume a state that already trails off into
            // cursor movement
            return false;
        }
        let edits: Vec<&OpSpec> = last_operations
            .iter()
            .filter(|op| self.is_edit_operation(op))
            .collect();
        self.is_continuous(&edits, spec)
    }

    fn is_continuous(&self, recent_edits: &[&OpSpec], spec: &OpSpec) -> bool {
        let last = match recent_edits.last() {
            Some(last) => last,
            None => return true,
        };
        if spec.memberid != last.memberid {
            // a typing run belongs to a single member
            return false;
        }
        if !can_aggregate(spec.optype()) || spec.optype() != last.optype() {
            return false;
        }
        let this_position = match op_position(spec) {
            Some(position) => position,
            None => return false,
        };
        let last_position = match op_position(last) {
            Some(position) => position,
            None => return false,
        };
        if recent_edits.len() == 1 {
            // direction is not established yet, any adjacent op continues.
            // Typing forward moves by +1, backspacing by -1 and the delete
            // key stays in place.
            return (this_position - last_position).abs() <= 1;
        }
        let previous_position = match op_position(recent_edits[recent_edits.len() - 2]) {
            Some(position) => position,
            None => return false,
        };
        let direction = last_position - previous_position;
        this_position - last_position == direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops::OpBody;

    fn insert(position: usize) -> OpSpec {
        OpSpec::new(
            "m",
            OpBody::InsertText {
                position,
                text: "x".into(),
            },
        )
    }

    fn remove(position: usize) -> OpSpec {
        OpSpec::new("m", OpBody::RemoveText { position, length: 1 })
    }

    fn move_cursor(position: usize) -> OpSpec {
        OpSpec::new(
            "m",
            OpBody::MoveCursor {
                position,
                length: 0,
                selection_type: Default::default(),
            },
        )
    }

    #[test]
    fn test_non_edit_always_joins() {
        let rules = UndoStateRules::new();
        assert!(rules.is_part_of_operation_set(&move_cursor(9), &[insert(1), insert(2)]));
        assert!(rules.is_part_of_operation_set(&move_cursor(9), &[]));
    }

    #[test]
    fn test_edit_starts_empty_state() {
        let rules = UndoStateRules::new();
        assert!(rules.is_part_of_operation_set(&insert(5), &[]));
    }

    #[test]
    fn test_typing_run_aggregates_forward() {
        let rules = UndoStateRules::new();
        assert!(rules.is_part_of_operation_set(&insert(2), &[insert(1)]));
        assert!(rules.is_part_of_operation_set(&insert(3), &[insert(1), insert(2)]));
        // reversing direction breaks the run
        assert!(!rules.is_part_of_operation_set(&insert(1), &[insert(1), insert(2)]));
    }

    #[test]
    fn test_backspace_and_delete_runs() {
        let rules = UndoStateRules::new();
        // backspace walks backwards
        assert!(rules.is_part_of_operation_set(&remove(3), &[remove(5), remove(4)]));
        // delete key stays in place
        assert!(rules.is_part_of_operation_set(&remove(5), &[remove(5), remove(5)]));
        assert!(!rules.is_part_of_operation_set(&remove(2), &[remove(5), remove(4)]));
    }

    #[test]
    fn test_first_continuation_must_be_adjacent() {
        let rules = UndoStateRules::new();
        assert!(!rules.is_part_of_operation_set(&insert(9), &[insert(1)]));
    }

    #[test]
    fn test_type_change_breaks_run() {
        let rules = UndoStateRules::new();
        assert!(!rules.is_part_of_operation_set(&remove(2), &[insert(1), insert(2)]));
    }

    #[test]
    fn test_edit_after_trailing_cursor_move_starts_new_state() {
        let rules = UndoStateRules::new();
        assert!(!rules.is_part_of_operation_set(&insert(3), &[insert(1), insert(2), move_cursor(7)]));
    }

    #[test]
    fn test_members_never_share_a_run() {
        let rules = UndoStateRules::new();
        let mut remote = insert(2);
        remote.memberid = "other".into();
        assert!(!rules.is_part_of_operation_set(&remote, &[insert(1)]));
        assert!(!rules.is_part_of_operation_set(&insert(3), &[remote]));
    }

    #[test]
    fn test_explicit_group_joins() {
        let rules = UndoStateRules::new();
        let mut split = OpSpec::new(
            "m",
            OpBody::SplitParagraph {
                position: 2,
                move_cursor: false,
            },
        );
        split.group = Some("g1".into());
        let mut style = OpSpec::new(
            "m",
            OpBody::SetParagraphStyle {
                position: 3,
                style_name: "P1".into(),
            },
        );
        style.group = Some("g1".into());
        assert!(rules.is_part_of_operation_set(&style, &[split]));
    }
}
