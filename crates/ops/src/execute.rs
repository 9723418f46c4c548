//! Operation execution
//!
//! Each operation validates its preconditions before touching the tree, so
//! a `false` return always means the document is unchanged. Structural
//! edits route their step events through [`Document::emit`] before any
//! further step translation happens.

use dom::{is_grouping_name, DomPoint, NodeId, QName, Tree};
use steps::filter::{is_character_element, paragraph_at};
use steps::{StepIterator, TextPositionFilter};
use tracing::debug;

use crate::document::Document;
use crate::events::DocumentEvent;
use crate::{OpBody, OpSpec, SelectionType};

/// Metadata properties that only the system may write
const BLOCKED_METADATA: [&str; 3] = ["dc:date", "dc:creator", "meta:editing-cycles"];

impl OpSpec {
    /// Apply this operation to the document. Returns `false` when a
    /// precondition fails; the document is untouched in that case.
    pub fn execute(&self, doc: &mut Document) -> bool {
        let member = self.memberid.as_str();
        let applied = match &self.body {
            OpBody::AddCursor => execute_add_cursor(doc, member),
            OpBody::RemoveCursor => execute_remove_cursor(doc, member),
            OpBody::MoveCursor {
                position,
                length,
                selection_type,
            } => execute_move_cursor(doc, member, *position, *length, *selection_type),
            OpBody::AddMember { set_properties } => {
                execute_add_member(doc, member, set_properties.clone())
            }
            OpBody::RemoveMember => execute_remove_member(doc, member),
            OpBody::InsertText { position, text } => {
                execute_insert_text(doc, member, *position, text)
            }
            OpBody::RemoveText { position, length } => {
                execute_remove_text(doc, member, *position, *length)
            }
            OpBody::SplitParagraph {
                position,
                move_cursor,
            } => execute_split_paragraph(doc, member, *position, *move_cursor),
            OpBody::MergeParagraph {
                source_start_position,
                destination_start_position,
                move_cursor,
                paragraph_style_name,
            } => execute_merge_paragraph(
                doc,
                member,
                *source_start_position,
                *destination_start_position,
                *move_cursor,
                paragraph_style_name.as_deref(),
            ),
            OpBody::SetParagraphStyle {
                position,
                style_name,
            } => execute_set_paragraph_style(doc, member, *position, style_name),
            OpBody::AddStyle {
                style_name,
                style_family,
                is_automatic_style,
                set_properties,
            } => execute_add_style(
                doc,
                style_name,
                style_family,
                *is_automatic_style,
                set_properties.clone(),
            ),
            OpBody::RemoveStyle {
                style_name,
                style_family,
            } => execute_remove_style(doc, style_name, style_family),
            OpBody::UpdateMetadata {
                set_properties,
                removed_properties,
            } => execute_update_metadata(doc, set_properties.as_ref(), removed_properties.as_deref()),
        };
        if !applied {
            debug!(optype = self.optype(), memberid = member, "operation rejected");
        }
        applied
    }
}

// ── cursor and member operations ─────────────────────────────────────

fn execute_add_cursor(doc: &mut Document, member: &str) -> bool {
    if !doc.add_cursor(member) {
        return false;
    }
    doc.emit(DocumentEvent::CursorAdded {
        member_id: member.to_string(),
    });
    true
}

fn execute_remove_cursor(doc: &mut Document, member: &str) -> bool {
    if doc.cursors.remove(member).is_none() {
        return false;
    }
    doc.emit(DocumentEvent::CursorRemoved {
        member_id: member.to_string(),
    });
    true
}

fn execute_move_cursor(
    doc: &mut Document,
    member: &str,
    position: usize,
    length: i64,
    selection_type: SelectionType,
) -> bool {
    if !doc.cursors.contains_key(member) {
        return false;
    }
    let max = doc.step_count() as i64;
    let focus = position as i64 + length;
    if position as i64 > max || focus < 0 || focus > max {
        return false;
    }
    doc.move_cursor(member, position, length, selection_type);
    doc.emit(DocumentEvent::CursorMoved {
        member_id: member.to_string(),
    });
    true
}

fn execute_add_member(doc: &mut Document, member: &str, properties: crate::MemberProperties) -> bool {
    if doc.members.contains_key(member) {
        return false;
    }
    doc.members.insert(member.to_string(), properties);
    doc.emit(DocumentEvent::MemberAdded {
        member_id: member.to_string(),
    });
    true
}

fn execute_remove_member(doc: &mut Document, member: &str) -> bool {
    if doc.members.remove(member).is_none() {
        return false;
    }
    doc.emit(DocumentEvent::MemberRemoved {
        member_id: member.to_string(),
    });
    true
}

// ── text operations ──────────────────────────────────────────────────

fn execute_insert_text(doc: &mut Document, member: &str, position: usize, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let (text_node, offset) = match doc.text_node_at_step(position) {
        Some(found) => found,
        None => return false,
    };
    let paragraph = match paragraph_at(&doc.tree, text_node) {
        Some(paragraph) => paragraph,
        None => return false,
    };

    if text.contains('\t') {
        let parent = match doc.tree.parent(text_node) {
            Some(parent) => parent,
            None => return false,
        };
        // tabs become explicit tab elements; split the target so the
        // pieces land in between
        let rest = doc.tree.split_text(text_node, offset);
        for (i, segment) in text.split('\t').enumerate() {
            if i > 0 {
                let tab = doc.tree.create_element(QName::text("tab"));
                doc.tree.insert_before(parent, tab, Some(rest));
            }
            if !segment.is_empty() {
                let piece = doc.tree.create_text(segment);
                doc.tree.insert_before(parent, piece, Some(rest));
            }
        }
        if doc.tree.text_len(rest) == 0 {
            doc.tree.detach(rest);
        }
        if doc.tree.text_len(text_node) == 0 {
            doc.tree.detach(text_node);
        }
        doc.tree.normalize_text(parent);
    } else {
        doc.tree.insert_text(text_node, offset, text);
    }

    let length = text.chars().count();
    doc.emit(DocumentEvent::StepsInserted { position });
    doc.shift_cursors_on_insert(position, length, Some(member));
    doc.upgrade_whitespaces_at_position(position);
    doc.upgrade_whitespaces_at_position(position + length);
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph,
        member_id: member.to_string(),
    });
    true
}

/// One removable unit: a single text character or a character element
enum Removal {
    TextChar { node: NodeId, offset: usize },
    Element(NodeId),
}

fn char_right_of(tree: &Tree, point: DomPoint) -> Option<Removal> {
    if tree.is_text(point.node) {
        return Some(Removal::TextChar {
            node: point.node,
            offset: point.offset,
        });
    }
    let mut node = tree.children(point.node).get(point.offset).copied()?;
    loop {
        if tree.is_text(node) {
            if tree.text_len(node) > 0 {
                return Some(Removal::TextChar { node, offset: 0 });
            }
            node = tree.next_sibling(node)?;
        } else if is_character_element(tree, node) {
            return Some(Removal::Element(node));
        } else if tree.name(node).map(is_grouping_name).unwrap_or(false) {
            node = tree.first_child(node)?;
        } else {
            return None;
        }
    }
}

fn execute_remove_text(doc: &mut Document, member: &str, position: usize, length: usize) -> bool {
    if length == 0 {
        return false;
    }
    // removal never crosses a paragraph boundary; merges handle that
    let start_paragraph = match doc.paragraph_at_step(position) {
        Some(paragraph) => paragraph,
        None => return false,
    };
    match doc.paragraph_at_step(position + length) {
        Some(end_paragraph) if end_paragraph == start_paragraph => {}
        _ => return false,
    }

    // map every step in the range to its character before mutating
    let start = match doc.translator.convert_steps_to_dom_point(&doc.tree, position) {
        Ok(point) => point,
        Err(_) => return false,
    };
    let filter = TextPositionFilter::new();
    let mut iter = StepIterator::new(&filter, doc.tree.root());
    if !iter.set_position(&doc.tree, start.node, start.offset) {
        return false;
    }
    let mut removals = Vec::with_capacity(length);
    for i in 0..length {
        match char_right_of(&doc.tree, iter.point()) {
            Some(removal) => removals.push(removal),
            None => return false,
        }
        if i + 1 < length && !iter.next_step(&doc.tree) {
            return false;
        }
    }

    // delete from the back so earlier offsets stay valid
    for removal in removals.iter().rev() {
        match removal {
            Removal::TextChar { node, offset } => {
                doc.tree.delete_text(*node, *offset, 1);
                if doc.tree.text_len(*node) == 0 {
                    doc.tree.detach(*node);
                }
            }
            Removal::Element(node) => doc.tree.detach(*node),
        }
    }
    cleanup_empty_groups(&mut doc.tree, start_paragraph);
    doc.tree.normalize_text(start_paragraph);

    doc.emit(DocumentEvent::StepsRemoved { position });
    doc.shift_cursors_on_remove(position, length);
    doc.fix_cursor_positions();
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph: start_paragraph,
        member_id: member.to_string(),
    });
    true
}

// ── paragraph structure operations ───────────────────────────────────

fn execute_split_paragraph(
    doc: &mut Document,
    member: &str,
    position: usize,
    move_cursor: bool,
) -> bool {
    doc.upgrade_whitespaces_at_position(position);
    let (text_node, offset) = match doc.text_node_at_step(position) {
        Some(found) => found,
        None => return false,
    };
    let paragraph = match paragraph_at(&doc.tree, text_node) {
        Some(paragraph) => paragraph,
        None => return false,
    };

    // There can be a chain of nodes (spans) between the text node and the
    // paragraph. Each level is cloned; the clone takes the content after
    // the split point plus everything built up from the level below.
    let mut kept_child: Option<NodeId>;
    let mut split_child: Option<NodeId>;
    if offset == 0 {
        kept_child = doc.tree.prev_sibling(text_node);
        split_child = None;
    } else {
        kept_child = Some(text_node);
        split_child = if offset >= doc.tree.text_len(text_node) {
            None
        } else {
            Some(doc.tree.split_text(text_node, offset))
        };
    }

    let mut node = text_node;
    let mut split_paragraph = paragraph;
    while node != paragraph {
        node = match doc.tree.parent(node) {
            Some(parent) => parent,
            None => return false,
        };
        let split_node = doc.tree.clone_shallow(node);
        if let Some(child) = split_child {
            doc.tree.append_child(split_node, child);
        }
        if let Some(child) = kept_child {
            while let Some(next) = doc.tree.next_sibling(child) {
                doc.tree.append_child(split_node, next);
            }
        } else {
            while let Some(first) = doc.tree.first_child(node) {
                doc.tree.append_child(split_node, first);
            }
        }
        let parent = match doc.tree.parent(node) {
            Some(parent) => parent,
            None => return false,
        };
        let after = doc.tree.next_sibling(node);
        doc.tree.insert_before(parent, split_node, after);
        kept_child = Some(node);
        split_child = Some(split_node);
        split_paragraph = split_node;
    }

    // clean up any empty text node created by text_node_at_step
    if doc.tree.text_len(text_node) == 0 {
        doc.tree.detach(text_node);
    }

    doc.emit(DocumentEvent::StepsInserted { position });
    doc.shift_cursors_on_insert(position, 1, None);
    if move_cursor && doc.cursors.contains_key(member) {
        doc.move_cursor(member, position + 1, 0, SelectionType::Range);
        doc.emit(DocumentEvent::CursorMoved {
            member_id: member.to_string(),
        });
    }
    doc.fix_cursor_positions();
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph,
        member_id: member.to_string(),
    });
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph: split_paragraph,
        member_id: member.to_string(),
    });
    true
}

fn is_empty_grouping(tree: &Tree, node: NodeId) -> bool {
    let name = match tree.name(node) {
        Some(name) => name,
        None => return false,
    };
    if !is_grouping_name(name) {
        return false;
    }
    tree.children(node)
        .iter()
        .all(|&c| tree.is_text(c) && tree.text_len(c) == 0)
}

/// Move any remaining children of `node` up, remove `node`, and collapse
/// ancestors the removal emptied (never the root).
fn merge_children_into_parent(tree: &mut Tree, node: NodeId) {
    let root = tree.root();
    let mut parent = match tree.parent(node) {
        Some(parent) => parent,
        None => return,
    };
    while let Some(child) = tree.first_child(node) {
        tree.insert_before(parent, child, Some(node));
    }
    tree.detach(node);
    while parent != root && tree.child_count(parent) == 0 {
        let grand = match tree.parent(parent) {
            Some(grand) => grand,
            None => break,
        };
        tree.detach(parent);
        parent = grand;
    }
}

fn cleanup_empty_groups(tree: &mut Tree, paragraph: NodeId) {
    loop {
        let mut empties = Vec::new();
        let mut stack = vec![paragraph];
        while let Some(node) = stack.pop() {
            for &child in tree.children(node) {
                if tree.is_element(child) {
                    if is_empty_grouping(tree, child) {
                        empties.push(child);
                    } else {
                        stack.push(child);
                    }
                }
            }
        }
        if empties.is_empty() {
            break;
        }
        for node in empties {
            tree.detach(node);
        }
    }
}

fn execute_merge_paragraph(
    doc: &mut Document,
    member: &str,
    source_start: usize,
    destination_start: usize,
    move_cursor: bool,
    paragraph_style_name: Option<&str>,
) -> bool {
    // destination before source keeps the transform rules one-directional
    if destination_start >= source_start {
        return false;
    }
    let destination = match doc.paragraph_at_step(destination_start) {
        Some(paragraph) => paragraph,
        None => return false,
    };
    let source = match doc.paragraph_at_step(source_start) {
        Some(paragraph) => paragraph,
        None => return false,
    };
    if destination == source {
        return false;
    }

    // the step before the source start must land inside the destination,
    // so a merge only ever undoes one paragraph split
    let filter = TextPositionFilter::new();
    let mut iter = StepIterator::new(&filter, doc.tree.root());
    iter.set_position(&doc.tree, source, 0);
    if !iter.previous_step(&doc.tree) {
        return false;
    }
    if !doc.tree.contains(destination, iter.container()) {
        return false;
    }

    let downgrade_offset = doc.tree.child_count(destination);

    while let Some(child) = doc.tree.first_child(source) {
        if is_empty_grouping(&doc.tree, child) {
            doc.tree.detach(child);
        } else {
            doc.tree.append_child(destination, child);
        }
    }
    merge_children_into_parent(&mut doc.tree, source);
    doc.tree.normalize_text(destination);

    // exactly one step is consumed: the paragraph boundary
    doc.emit(DocumentEvent::StepsRemoved {
        position: source_start - 1,
    });
    doc.shift_cursors_on_remove(source_start - 1, 1);

    doc.downgrade_whitespaces_near(destination, downgrade_offset);

    match paragraph_style_name {
        Some(name) if !name.is_empty() => {
            doc.tree
                .set_attribute(destination, QName::text("style-name"), name);
        }
        _ => {
            doc.tree
                .remove_attribute(destination, &QName::text("style-name"));
        }
    }

    if move_cursor && doc.cursors.contains_key(member) {
        doc.move_cursor(member, source_start - 1, 0, SelectionType::Range);
        doc.emit(DocumentEvent::CursorMoved {
            member_id: member.to_string(),
        });
    }
    doc.fix_cursor_positions();
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph: destination,
        member_id: member.to_string(),
    });
    true
}

// ── style and metadata operations ────────────────────────────────────

fn execute_set_paragraph_style(
    doc: &mut Document,
    member: &str,
    position: usize,
    style_name: &str,
) -> bool {
    let paragraph = match doc.paragraph_at_step(position) {
        Some(paragraph) => paragraph,
        None => return false,
    };
    if style_name.is_empty() {
        doc.tree
            .remove_attribute(paragraph, &QName::text("style-name"));
    } else {
        doc.tree
            .set_attribute(paragraph, QName::text("style-name"), style_name);
    }
    doc.emit(DocumentEvent::ParagraphChanged {
        paragraph,
        member_id: member.to_string(),
    });
    true
}

fn execute_add_style(
    doc: &mut Document,
    style_name: &str,
    style_family: &str,
    is_automatic: bool,
    properties: Option<serde_json::Value>,
) -> bool {
    let key = (style_family.to_string(), style_name.to_string());
    if doc.styles.contains_key(&key) {
        return false;
    }
    doc.styles.insert(
        key,
        crate::StyleDefinition {
            is_automatic,
            properties,
        },
    );
    doc.emit(DocumentEvent::StyleCreated {
        name: style_name.to_string(),
        family: style_family.to_string(),
    });
    true
}

fn execute_remove_style(doc: &mut Document, style_name: &str, style_family: &str) -> bool {
    let key = (style_family.to_string(), style_name.to_string());
    if doc.styles.remove(&key).is_none() {
        return false;
    }
    doc.emit(DocumentEvent::StyleDeleted {
        name: style_name.to_string(),
        family: style_family.to_string(),
    });
    true
}

fn execute_update_metadata(
    doc: &mut Document,
    set_properties: Option<&std::collections::BTreeMap<String, String>>,
    removed_properties: Option<&[String]>,
) -> bool {
    let touches_blocked = set_properties
        .map(|set| set.keys().any(|k| BLOCKED_METADATA.contains(&k.as_str())))
        .unwrap_or(false)
        || removed_properties
            .map(|removed| removed.iter().any(|k| BLOCKED_METADATA.contains(&k.as_str())))
            .unwrap_or(false);
    if touches_blocked {
        return false;
    }
    if let Some(set) = set_properties {
        for (key, value) in set {
            doc.metadata.insert(key.clone(), value.clone());
        }
    }
    if let Some(removed) = removed_properties {
        for key in removed {
            doc.metadata.remove(key);
        }
    }
    doc.emit(DocumentEvent::MetadataUpdated);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemberProperties, OpSpec};
    use std::sync::{Arc, Mutex};

    fn spec(member: &str, body: OpBody) -> OpSpec {
        OpSpec::new(member, body)
    }

    fn record_events(doc: &mut Document) -> Arc<Mutex<Vec<DocumentEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        doc.subscribe(move |event| sink.lock().unwrap().push(event.clone()));
        events
    }

    #[test]
    fn test_insert_text_into_paragraph() {
        let mut doc = Document::with_paragraphs(&["AD"], 10);
        assert!(spec("m", OpBody::InsertText { position: 1, text: "BC".into() }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["ABCD"]);
        assert_eq!(doc.step_count(), 5);
    }

    #[test]
    fn test_insert_text_shifts_cursors() {
        let mut doc = Document::with_paragraphs(&["AD"], 10);
        assert!(spec("m", OpBody::AddCursor).execute(&mut doc));
        assert!(spec("other", OpBody::AddCursor).execute(&mut doc));
        assert!(spec("m", OpBody::MoveCursor { position: 1, length: 0, selection_type: SelectionType::Range }).execute(&mut doc));
        assert!(spec("other", OpBody::MoveCursor { position: 1, length: 0, selection_type: SelectionType::Range }).execute(&mut doc));
        assert!(spec("m", OpBody::InsertText { position: 1, text: "X".into() }).execute(&mut doc));
        // the author's cursor follows the typed text, bystanders stay put
        assert_eq!(doc.cursor("m").unwrap().position, 2);
        assert_eq!(doc.cursor("other").unwrap().position, 1);
    }

    #[test]
    fn test_insert_text_with_tab() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        assert!(spec("m", OpBody::InsertText { position: 1, text: "x\ty".into() }).execute(&mut doc));
        // the tab element holds a step just like a character
        assert_eq!(doc.step_count(), 6);
        assert_eq!(doc.paragraph_texts(), vec!["AxyB"]);
    }

    #[test]
    fn test_remove_text_middle() {
        let mut doc = Document::with_paragraphs(&["ABCD"], 10);
        let events = record_events(&mut doc);
        assert!(spec("m", OpBody::RemoveText { position: 1, length: 2 }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["AD"]);
        assert_eq!(doc.step_count(), 3);
        assert!(events
            .lock()
            .unwrap()
            .contains(&DocumentEvent::StepsRemoved { position: 1 }));
    }

    #[test]
    fn test_remove_text_rejects_paragraph_crossing() {
        let mut doc = Document::with_paragraphs(&["AB", "CD"], 10);
        assert!(!spec("m", OpBody::RemoveText { position: 1, length: 3 }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["AB", "CD"]);
        assert_eq!(doc.step_count(), 6);
    }

    #[test]
    fn test_split_paragraph() {
        let mut doc = Document::with_paragraphs(&["ABCD"], 10);
        let events = record_events(&mut doc);
        assert!(spec("m", OpBody::SplitParagraph { position: 2, move_cursor: false }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["AB", "CD"]);
        assert_eq!(doc.step_count(), 6);
        assert!(events
            .lock()
            .unwrap()
            .contains(&DocumentEvent::StepsInserted { position: 2 }));
    }

    #[test]
    fn test_split_at_paragraph_start_moves_everything() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        assert!(spec("m", OpBody::SplitParagraph { position: 0, move_cursor: false }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["", "AB"]);
    }

    #[test]
    fn test_merge_paragraph_scenario() {
        // <p>ab</p><p>cd</p> + merge(source 3, destination 1) = <p>abcd</p>
        let mut doc = Document::with_paragraphs(&["ab", "cd"], 10);
        let events = record_events(&mut doc);
        assert!(spec(
            "m",
            OpBody::MergeParagraph {
                source_start_position: 3,
                destination_start_position: 1,
                move_cursor: false,
                paragraph_style_name: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["abcd"]);
        assert_eq!(doc.step_count(), 5);
        assert!(events
            .lock()
            .unwrap()
            .contains(&DocumentEvent::StepsRemoved { position: 2 }));
    }

    #[test]
    fn test_merge_requires_destination_before_source() {
        let mut doc = Document::with_paragraphs(&["ab", "cd"], 10);
        assert!(!spec(
            "m",
            OpBody::MergeParagraph {
                source_start_position: 1,
                destination_start_position: 3,
                move_cursor: false,
                paragraph_style_name: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["ab", "cd"]);
    }

    #[test]
    fn test_merge_rejects_non_adjacent_paragraphs() {
        let mut doc = Document::with_paragraphs(&["ab", "cd", "ef"], 10);
        assert!(!spec(
            "m",
            OpBody::MergeParagraph {
                source_start_position: 6,
                destination_start_position: 0,
                move_cursor: false,
                paragraph_style_name: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["ab", "cd", "ef"]);
    }

    #[test]
    fn test_split_then_merge_round_trip() {
        let mut doc = Document::with_paragraphs(&["ABCD"], 10);
        assert!(spec("m", OpBody::SplitParagraph { position: 2, move_cursor: false }).execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["AB", "CD"]);
        assert!(spec(
            "m",
            OpBody::MergeParagraph {
                source_start_position: 3,
                destination_start_position: 0,
                move_cursor: false,
                paragraph_style_name: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.paragraph_texts(), vec!["ABCD"]);
        assert_eq!(doc.step_count(), 5);
    }

    #[test]
    fn test_set_paragraph_style_and_clear() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        let p = doc.tree().first_child(doc.root()).unwrap();
        assert!(spec("m", OpBody::SetParagraphStyle { position: 0, style_name: "Heading".into() })
            .execute(&mut doc));
        assert_eq!(
            doc.tree().attribute(p, &QName::text("style-name")),
            Some("Heading")
        );
        // an empty style name clears the attribute
        assert!(spec("m", OpBody::SetParagraphStyle { position: 0, style_name: String::new() })
            .execute(&mut doc));
        assert_eq!(doc.tree().attribute(p, &QName::text("style-name")), None);
    }

    #[test]
    fn test_style_lifecycle() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        let add = spec(
            "m",
            OpBody::AddStyle {
                style_name: "S1".into(),
                style_family: "paragraph".into(),
                is_automatic_style: false,
                set_properties: None,
            },
        );
        assert!(add.execute(&mut doc));
        assert!(!add.execute(&mut doc));
        assert!(doc.style("paragraph", "S1").is_some());
        assert!(spec(
            "m",
            OpBody::RemoveStyle {
                style_name: "S1".into(),
                style_family: "paragraph".into(),
            }
        )
        .execute(&mut doc));
        assert!(doc.style("paragraph", "S1").is_none());
    }

    #[test]
    fn test_update_metadata_blocks_system_fields() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        assert!(!spec(
            "m",
            OpBody::UpdateMetadata {
                set_properties: Some([("dc:creator".to_string(), "me".to_string())].into()),
                removed_properties: None,
            }
        )
        .execute(&mut doc));
        assert!(spec(
            "m",
            OpBody::UpdateMetadata {
                set_properties: Some([("dc:title".to_string(), "Notes".to_string())].into()),
                removed_properties: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.metadata().get("dc:title").unwrap(), "Notes");
    }

    #[test]
    fn test_member_lifecycle() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        let add = spec(
            "alice",
            OpBody::AddMember {
                set_properties: MemberProperties {
                    full_name: Some("Alice".into()),
                    color: Some("#336699".into()),
                    image_url: None,
                },
            },
        );
        assert!(add.execute(&mut doc));
        assert!(!add.execute(&mut doc));
        assert!(spec("alice", OpBody::AddCursor).execute(&mut doc));
        assert!(!spec("alice", OpBody::AddCursor).execute(&mut doc));
        assert!(spec("alice", OpBody::RemoveCursor).execute(&mut doc));
        assert!(spec("alice", OpBody::RemoveMember).execute(&mut doc));
        assert!(doc.member("alice").is_none());
    }

    #[test]
    fn test_move_cursor_validates_range() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        assert!(spec("m", OpBody::AddCursor).execute(&mut doc));
        assert!(spec("m", OpBody::MoveCursor { position: 3, length: 0, selection_type: SelectionType::Range }).execute(&mut doc));
        assert!(!spec("m", OpBody::MoveCursor { position: 4, length: 0, selection_type: SelectionType::Range }).execute(&mut doc));
        assert!(!spec("m", OpBody::MoveCursor { position: 1, length: -2, selection_type: SelectionType::Range }).execute(&mut doc));
        assert_eq!(doc.cursor("m").unwrap().position, 3);
    }

    #[test]
    fn test_merge_moves_author_cursor() {
        let mut doc = Document::with_paragraphs(&["ab", "cd"], 10);
        assert!(spec("m", OpBody::AddCursor).execute(&mut doc));
        assert!(spec("m", OpBody::MoveCursor { position: 4, length: 0, selection_type: SelectionType::Range }).execute(&mut doc));
        assert!(spec(
            "m",
            OpBody::MergeParagraph {
                source_start_position: 3,
                destination_start_position: 1,
                move_cursor: true,
                paragraph_style_name: None,
            }
        )
        .execute(&mut doc));
        assert_eq!(doc.cursor("m").unwrap().position, 2);
    }
}
