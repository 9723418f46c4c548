//! Pairwise operation transformation
//!
//! The matrix is symmetric, so only pairs in alphabetical optype order are
//! implemented; [`transform_op_vs_op`] reorders its arguments and swaps the
//! result back. In a tie the second operation wins, which lets the caller
//! give server-originated operations priority over local ones.
//!
//! A `None` return means the pair cannot be reconciled and synchronization
//! must stop.

use ops::{OpBody, OpSpec};

/// Both operations rewritten to apply after the other
#[derive(Debug, Clone, PartialEq)]
pub struct PairResult {
    /// Replacement for the first operation; empty when it became a no-op
    pub ops_a: Vec<OpSpec>,
    /// Replacement for the second operation
    pub ops_b: Vec<OpSpec>,
}

fn pair(ops_a: Vec<OpSpec>, ops_b: Vec<OpSpec>) -> Option<PairResult> {
    Some(PairResult { ops_a, ops_b })
}

fn pass_unchanged(a: OpSpec, b: OpSpec) -> Option<PairResult> {
    pair(vec![a], vec![b])
}

pub fn transform_op_vs_op(a: OpSpec, b: OpSpec) -> Option<PairResult> {
    let a_first = a.optype() <= b.optype();
    if a_first {
        transform_ordered(a, b, false)
    } else {
        transform_ordered(b, a, true).map(|result| PairResult {
            ops_a: result.ops_b,
            ops_b: result.ops_a,
        })
    }
}

/// `a.optype() <= b.optype()` holds here; `a_has_priority` breaks ties
fn transform_ordered(a: OpSpec, b: OpSpec, a_has_priority: bool) -> Option<PairResult> {
    match (a.optype(), b.optype()) {
        ("AddStyle", "RemoveStyle") => add_style_vs_remove_style(a, b),
        ("InsertText", "InsertText") => insert_vs_insert(a, b, a_has_priority),
        ("InsertText", "MergeParagraph") => insert_vs_merge(a, b),
        ("InsertText", "MoveCursor") => insert_vs_move_cursor(a, b),
        ("InsertText", "RemoveText") => insert_vs_remove_text(a, b),
        ("InsertText", "SplitParagraph") => insert_vs_split(a, b),
        ("MergeParagraph", "MergeParagraph") => merge_vs_merge(a, b),
        ("MergeParagraph", "MoveCursor") => merge_vs_move_cursor(a, b),
        ("MergeParagraph", "RemoveText") => merge_vs_remove_text(a, b),
        ("MergeParagraph", "SetParagraphStyle") => merge_vs_set_paragraph_style(a, b),
        ("MergeParagraph", "SplitParagraph") => merge_vs_split(a, b),
        ("MoveCursor", "RemoveCursor") => move_cursor_vs_remove_cursor(a, b),
        ("MoveCursor", "RemoveText") => move_cursor_vs_remove_text(a, b),
        ("MoveCursor", "SplitParagraph") => move_cursor_vs_split(a, b),
        ("RemoveCursor", "RemoveCursor") => remove_cursor_vs_remove_cursor(a, b),
        ("RemoveStyle", "RemoveStyle") => remove_style_vs_remove_style(a, b),
        ("RemoveStyle", "SetParagraphStyle") => remove_style_vs_set_paragraph_style(a, b),
        ("RemoveText", "RemoveText") => remove_text_vs_remove_text(a, b),
        ("RemoveText", "SplitParagraph") => remove_text_vs_split(a, b),
        ("SplitParagraph", "SplitParagraph") => split_vs_split(a, b, a_has_priority),
        ("UpdateMetadata", "UpdateMetadata") => {
            update_metadata_vs_update_metadata(a, b, a_has_priority)
        }
        // member management comes from the server only and is never
        // transformed against itself
        ("AddMember", "AddMember")
        | ("AddMember", "RemoveMember")
        | ("RemoveMember", "RemoveMember") => None,
        // paragraph style assignment against content edits is not
        // reconciled; the conflict is surfaced instead
        ("InsertText", "SetParagraphStyle")
        | ("RemoveText", "SetParagraphStyle")
        | ("SetParagraphStyle", "SetParagraphStyle")
        | ("SetParagraphStyle", "SplitParagraph") => None,
        _ => pass_unchanged(a, b),
    }
}

// ── selection range helpers ──────────────────────────────────────────

fn invert_range_on_negative_length(position: &mut usize, length: &mut i64) -> bool {
    if *length < 0 {
        *position = (*position as i64 + *length) as usize;
        *length = -*length;
        true
    } else {
        false
    }
}

fn invert_range(position: &mut usize, length: &mut i64) {
    *position = (*position as i64 + *length) as usize;
    *length = -*length;
}

// ── text pairs ───────────────────────────────────────────────────────

fn insert_vs_insert(mut a: OpSpec, mut b: OpSpec, a_has_priority: bool) -> Option<PairResult> {
    if let (
        OpBody::InsertText {
            position: position_a,
            text: text_a,
        },
        OpBody::InsertText {
            position: position_b,
            text: text_b,
        },
    ) = (&mut a.body, &mut b.body)
    {
        let length_a = text_a.chars().count();
        let length_b = text_b.chars().count();
        if *position_a < *position_b {
            *position_b += length_a;
        } else if *position_a > *position_b {
            *position_a += length_b;
        } else if a_has_priority {
            *position_b += length_a;
        } else {
            *position_a += length_b;
        }
    }
    pair(vec![a], vec![b])
}

fn insert_vs_move_cursor(a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::InsertText { position, text },
        OpBody::MoveCursor {
            position: cursor_position,
            length: cursor_length,
            ..
        },
    ) = (&a.body, &mut b.body)
    {
        let inverted = invert_range_on_negative_length(cursor_position, cursor_length);
        let length = text.chars().count();
        if *position < *cursor_position {
            *cursor_position += length;
        } else if *position < *cursor_position + *cursor_length as usize {
            *cursor_length += length as i64;
        }
        if inverted {
            invert_range(cursor_position, cursor_length);
        }
    }
    pair(vec![a], vec![b])
}

fn insert_vs_remove_text(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    let remove_member = b.memberid.clone();
    let remove_timestamp = b.timestamp;
    let mut helper = None;
    if let (
        OpBody::InsertText {
            position: insert_position,
            text,
        },
        OpBody::RemoveText { position, length },
    ) = (&mut a.body, &mut b.body)
    {
        let insert_length = text.chars().count();
        let remove_end = *position + *length;
        if remove_end <= *insert_position {
            *insert_position -= *length;
        } else if *insert_position <= *position {
            *position += insert_length;
        } else {
            // the insertion falls inside the removed range: split the
            // removal around it
            *length = *insert_position - *position;
            let mut helper_spec = OpSpec::new(
                remove_member,
                OpBody::RemoveText {
                    position: *insert_position + insert_length,
                    length: remove_end - *insert_position,
                },
            );
            helper_spec.timestamp = remove_timestamp;
            helper = Some(helper_spec);
            *insert_position = *position;
        }
    }
    let ops_b = match helper {
        // helper first, so its position is unaffected by the shortened op
        Some(helper_spec) => vec![helper_spec, b],
        None => vec![b],
    };
    pair(vec![a], ops_b)
}

fn insert_vs_split(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::InsertText { position, text },
        OpBody::SplitParagraph {
            position: split_position,
            ..
        },
    ) = (&mut a.body, &mut b.body)
    {
        if *position < *split_position {
            *split_position += text.chars().count();
        } else if *position > *split_position {
            *position += 1;
        } else {
            // inserting exactly at the split point leaves cursors in
            // diverging places, surface the conflict instead
            return None;
        }
    }
    pair(vec![a], vec![b])
}

fn remove_text_vs_remove_text(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    let mut a_result = true;
    let mut b_result = true;
    if let (
        OpBody::RemoveText {
            position: position_a,
            length: length_a,
        },
        OpBody::RemoveText {
            position: position_b,
            length: length_b,
        },
    ) = (&mut a.body, &mut b.body)
    {
        let end_a = *position_a + *length_a;
        let end_b = *position_b + *length_b;
        if end_b <= *position_a {
            *position_a -= *length_b;
        } else if end_a <= *position_b {
            *position_b -= *length_a;
        } else if *position_b < end_a {
            // overlapping ranges
            if *position_a < *position_b {
                if end_b < end_a {
                    *length_a -= *length_b;
                } else {
                    *length_a = *position_b - *position_a;
                }
                if end_a < end_b {
                    *position_b = *position_a;
                    *length_b = end_b - end_a;
                } else {
                    b_result = false;
                }
            } else {
                if end_a < end_b {
                    *length_b -= *length_a;
                } else if *position_b < *position_a {
                    *length_b = *position_a - *position_b;
                } else {
                    b_result = false;
                }
                if end_b < end_a {
                    *position_a = *position_b;
                    *length_a = end_a - end_b;
                } else {
                    a_result = false;
                }
            }
        }
    }
    pair(
        if a_result { vec![a] } else { vec![] },
        if b_result { vec![b] } else { vec![] },
    )
}

fn remove_text_vs_split(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    let remove_member = a.memberid.clone();
    let remove_timestamp = a.timestamp;
    let mut helper = None;
    if let (
        OpBody::RemoveText { position, length },
        OpBody::SplitParagraph {
            position: split_position,
            ..
        },
    ) = (&mut a.body, &mut b.body)
    {
        let remove_end = *position + *length;
        if *split_position <= *position {
            *position += 1;
        } else if *split_position < remove_end {
            // the split lands inside the removed range: remove each side
            // of the new paragraph boundary separately
            *length = *split_position - *position;
            let mut helper_spec = OpSpec::new(
                remove_member,
                OpBody::RemoveText {
                    position: *split_position + 1,
                    length: remove_end - *split_position,
                },
            );
            helper_spec.timestamp = remove_timestamp;
            helper = Some(helper_spec);
        }
        if *position + *length <= *split_position {
            *split_position -= *length;
        } else if *position < *split_position {
            *split_position = *position;
        }
    }
    let ops_a = match helper {
        Some(helper_spec) => vec![helper_spec, a],
        None => vec![a],
    };
    pair(ops_a, vec![b])
}

fn split_vs_split(mut a: OpSpec, mut b: OpSpec, a_has_priority: bool) -> Option<PairResult> {
    if let (
        OpBody::SplitParagraph {
            position: position_a,
            ..
        },
        OpBody::SplitParagraph {
            position: position_b,
            ..
        },
    ) = (&mut a.body, &mut b.body)
    {
        if *position_a < *position_b {
            *position_b += 1;
        } else if *position_a > *position_b {
            *position_a += 1;
        } else if a_has_priority {
            *position_b += 1;
        } else {
            *position_a += 1;
        }
    }
    pair(vec![a], vec![b])
}

// ── paragraph merge pairs ────────────────────────────────────────────
//
// A merge consumes exactly one step: the paragraph boundary at
// `source_start_position - 1`. Operations coinciding with that boundary
// are not reconciled.

fn insert_vs_merge(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::InsertText { position, text },
        OpBody::MergeParagraph {
            source_start_position,
            destination_start_position,
            ..
        },
    ) = (&mut a.body, &mut b.body)
    {
        let boundary = *source_start_position - 1;
        if *position == boundary {
            return None;
        }
        let length = text.chars().count();
        let insert_position = *position;
        if insert_position < *destination_start_position {
            *destination_start_position += length;
        }
        if insert_position < *source_start_position {
            *source_start_position += length;
        } else {
            *position -= 1;
        }
    }
    pair(vec![a], vec![b])
}

fn merge_vs_merge(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    let mut a_result = true;
    let mut b_result = true;
    if let (
        OpBody::MergeParagraph {
            source_start_position: source_a,
            destination_start_position: destination_a,
            ..
        },
        OpBody::MergeParagraph {
            source_start_position: source_b,
            destination_start_position: destination_b,
            ..
        },
    ) = (&mut a.body, &mut b.body)
    {
        if *source_a == *source_b && *destination_a == *destination_b {
            // the same boundary was merged twice
            a_result = false;
            b_result = false;
        } else if *source_a == *source_b
            || *destination_a == *destination_b
            || *destination_a == *source_b
            || *source_a == *destination_b
        {
            // the merges share a paragraph
            return None;
        } else if *source_a < *source_b {
            *source_b -= 1;
            *destination_b -= 1;
        } else {
            *source_a -= 1;
            *destination_a -= 1;
        }
    }
    pair(
        if a_result { vec![a] } else { vec![] },
        if b_result { vec![b] } else { vec![] },
    )
}

fn merge_vs_move_cursor(a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MergeParagraph {
            source_start_position,
            ..
        },
        OpBody::MoveCursor {
            position, length, ..
        },
    ) = (&a.body, &mut b.body)
    {
        let boundary = *source_start_position - 1;
        let inverted = invert_range_on_negative_length(position, length);
        if boundary < *position {
            *position -= 1;
        } else if boundary < *position + *length as usize {
            *length -= 1;
        }
        if inverted {
            invert_range(position, length);
        }
    }
    pair(vec![a], vec![b])
}

fn merge_vs_remove_text(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MergeParagraph {
            source_start_position,
            destination_start_position,
            ..
        },
        OpBody::RemoveText { position, length },
    ) = (&mut a.body, &mut b.body)
    {
        let remove_end = *position + *length;
        if remove_end <= *destination_start_position {
            *destination_start_position -= *length;
            *source_start_position -= *length;
        } else if *position >= *source_start_position {
            *position -= 1;
        } else if remove_end < *source_start_position {
            // removal inside the destination paragraph
            *source_start_position -= *length;
        } else {
            // a removal touching the merge boundary cannot happen through
            // the editor; treat stray wire data as a conflict
            return None;
        }
    }
    pair(vec![a], vec![b])
}

fn merge_vs_set_paragraph_style(a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MergeParagraph {
            source_start_position,
            ..
        },
        OpBody::SetParagraphStyle { position, .. },
    ) = (&a.body, &mut b.body)
    {
        if *position >= *source_start_position {
            *position -= 1;
        }
    }
    pair(vec![a], vec![b])
}

fn merge_vs_split(mut a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MergeParagraph {
            source_start_position,
            destination_start_position,
            ..
        },
        OpBody::SplitParagraph { position, .. },
    ) = (&mut a.body, &mut b.body)
    {
        if *position < *destination_start_position {
            *destination_start_position += 1;
            *source_start_position += 1;
        } else if *position >= *source_start_position {
            *position -= 1;
        } else {
            // splitting inside the destination, or re-creating the merged
            // boundary, leaves the paragraphs in diverging shapes
            return None;
        }
    }
    pair(vec![a], vec![b])
}

// ── cursor pairs ─────────────────────────────────────────────────────

fn move_cursor_vs_remove_cursor(a: OpSpec, b: OpSpec) -> Option<PairResult> {
    let same_cursor = a.memberid == b.memberid;
    pair(if same_cursor { vec![] } else { vec![a] }, vec![b])
}

fn move_cursor_vs_remove_text(mut a: OpSpec, b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MoveCursor {
            position: cursor_position,
            length: cursor_length,
            ..
        },
        OpBody::RemoveText { position, length },
    ) = (&mut a.body, &b.body)
    {
        let inverted = invert_range_on_negative_length(cursor_position, cursor_length);
        let cursor_end = *cursor_position + *cursor_length as usize;
        let remove_end = *position + *length;
        if remove_end <= *cursor_position {
            *cursor_position -= *length;
        } else if *position < cursor_end {
            if *cursor_position < *position {
                if remove_end < cursor_end {
                    *cursor_length -= *length as i64;
                } else {
                    *cursor_length = (*position - *cursor_position) as i64;
                }
            } else {
                *cursor_position = *position;
                if remove_end < cursor_end {
                    *cursor_length = (cursor_end - remove_end) as i64;
                } else {
                    // the selection was removed entirely
                    *cursor_length = 0;
                }
            }
        }
        if inverted {
            invert_range(cursor_position, cursor_length);
        }
    }
    pair(vec![a], vec![b])
}

fn move_cursor_vs_split(mut a: OpSpec, b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::MoveCursor {
            position: cursor_position,
            length: cursor_length,
            ..
        },
        OpBody::SplitParagraph { position, .. },
    ) = (&mut a.body, &b.body)
    {
        let inverted = invert_range_on_negative_length(cursor_position, cursor_length);
        if *position < *cursor_position {
            *cursor_position += 1;
        } else if *position < *cursor_position + *cursor_length as usize {
            *cursor_length += 1;
        }
        if inverted {
            invert_range(cursor_position, cursor_length);
        }
    }
    pair(vec![a], vec![b])
}

fn remove_cursor_vs_remove_cursor(a: OpSpec, b: OpSpec) -> Option<PairResult> {
    if a.memberid == b.memberid {
        pair(vec![], vec![])
    } else {
        pair(vec![a], vec![b])
    }
}

// ── style pairs ──────────────────────────────────────────────────────

/// Attributes through which one style can refer to another
const STYLE_REFERENCE_ATTRIBUTES: [&str; 2] = ["style:parent-style-name", "style:next-style-name"];

fn drop_style_referencing_attributes(properties: &mut Option<serde_json::Value>, style_name: &str) {
    if let Some(serde_json::Value::Object(map)) = properties {
        for attribute in STYLE_REFERENCE_ATTRIBUTES {
            if map.get(attribute).and_then(|v| v.as_str()) == Some(style_name) {
                map.remove(attribute);
            }
        }
    }
}

fn add_style_vs_remove_style(mut a: OpSpec, b: OpSpec) -> Option<PairResult> {
    if let (
        OpBody::AddStyle {
            style_family,
            set_properties,
            ..
        },
        OpBody::RemoveStyle {
            style_name: removed_name,
            style_family: removed_family,
        },
    ) = (&mut a.body, &b.body)
    {
        if style_family == removed_family {
            // the new style may not refer to the deleted one
            drop_style_referencing_attributes(set_properties, removed_name);
        }
    }
    pair(vec![a], vec![b])
}

fn remove_style_vs_remove_style(a: OpSpec, b: OpSpec) -> Option<PairResult> {
    let same_style = match (&a.body, &b.body) {
        (
            OpBody::RemoveStyle {
                style_name: name_a,
                style_family: family_a,
            },
            OpBody::RemoveStyle {
                style_name: name_b,
                style_family: family_b,
            },
        ) => name_a == name_b && family_a == family_b,
        _ => false,
    };
    if same_style {
        pair(vec![], vec![])
    } else {
        pair(vec![a], vec![b])
    }
}

fn remove_style_vs_set_paragraph_style(a: OpSpec, mut b: OpSpec) -> Option<PairResult> {
    let mut helper = None;
    if let (
        OpBody::RemoveStyle {
            style_name,
            style_family,
        },
        OpBody::SetParagraphStyle {
            position,
            style_name: set_name,
        },
    ) = (&a.body, &mut b.body)
    {
        if style_family == "paragraph" && style_name == set_name {
            // clear the dangling assignment before the style is removed,
            // and turn the assignment itself into a clear
            let mut helper_spec = OpSpec::new(
                a.memberid.clone(),
                OpBody::SetParagraphStyle {
                    position: *position,
                    style_name: String::new(),
                },
            );
            helper_spec.timestamp = a.timestamp;
            helper = Some(helper_spec);
            set_name.clear();
        }
    }
    let ops_a = match helper {
        Some(helper_spec) => vec![helper_spec, a],
        None => vec![a],
    };
    pair(ops_a, vec![b])
}

// ── metadata pair ────────────────────────────────────────────────────

fn update_metadata_vs_update_metadata(
    mut a: OpSpec,
    mut b: OpSpec,
    a_has_priority: bool,
) -> Option<PairResult> {
    let (major, minor) = if a_has_priority {
        (&mut a, &mut b)
    } else {
        (&mut b, &mut a)
    };
    let mut major_empty = false;
    let mut minor_empty = false;
    if let (
        OpBody::UpdateMetadata {
            set_properties: major_set,
            removed_properties: major_removed,
        },
        OpBody::UpdateMetadata {
            set_properties: minor_set,
            removed_properties: minor_removed,
        },
    ) = (&mut major.body, &mut minor.body)
    {
        // anything the major op touches is dropped from the minor op; a
        // matching set collapses out of the major op too
        if let Some(minor_map) = minor_set {
            minor_map.retain(|key, value| {
                if let Some(major_map) = major_set {
                    if let Some(major_value) = major_map.get(key) {
                        if *major_value == *value {
                            let key = key.clone();
                            major_map.remove(&key);
                        }
                        return false;
                    }
                }
                !major_removed
                    .as_ref()
                    .map(|removed| removed.contains(key))
                    .unwrap_or(false)
            });
        }
        if let Some(minor_names) = minor_removed {
            minor_names.retain(|name| {
                let in_major_set = major_set
                    .as_ref()
                    .map(|map| map.contains_key(name))
                    .unwrap_or(false);
                let in_major_removed = major_removed
                    .as_ref()
                    .map(|removed| removed.contains(name))
                    .unwrap_or(false);
                !in_major_set && !in_major_removed
            });
        }
        major_empty = major_set.as_ref().map(|m| m.is_empty()).unwrap_or(true)
            && major_removed.as_ref().map(|r| r.is_empty()).unwrap_or(true);
        minor_empty = minor_set.as_ref().map(|m| m.is_empty()).unwrap_or(true)
            && minor_removed.as_ref().map(|r| r.is_empty()).unwrap_or(true);
    }
    let (a_empty, b_empty) = if a_has_priority {
        (major_empty, minor_empty)
    } else {
        (minor_empty, major_empty)
    };
    pair(
        if a_empty { vec![] } else { vec![a] },
        if b_empty { vec![] } else { vec![b] },
    )
}
