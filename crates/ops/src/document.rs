//! The live document: tree, translator, cursors, members, styles
//!
//! Operation execution (in [`crate::execute`]) mutates the document only
//! through this type, so translator damage notifications always precede
//! any later step translation.

use std::collections::{BTreeMap, HashMap};

use dom::{DomPoint, NodeId, PositionIterator, QName, Tree, TEXT_NS};
use steps::filter::{is_significant_whitespace, paragraph_at};
use steps::{StepError, StepIterator, StepsTranslator, TextPositionFilter};

use crate::events::{DocumentEvent, EventNotifier, SubscriptionId};
use crate::{MemberProperties, SelectionType};

/// A member's cursor, expressed in steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub position: usize,
    /// Selection extent; negative selects backwards from `position`
    pub length: i64,
    pub selection_type: SelectionType,
}

impl Cursor {
    fn collapsed(position: usize) -> Self {
        Self {
            position,
            length: 0,
            selection_type: SelectionType::Range,
        }
    }
}

/// A named style record
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDefinition {
    pub is_automatic: bool,
    pub properties: Option<serde_json::Value>,
}

pub struct Document {
    pub(crate) tree: Tree,
    pub(crate) translator: StepsTranslator,
    pub(crate) cursors: HashMap<String, Cursor>,
    pub(crate) members: HashMap<String, MemberProperties>,
    /// Keyed by (family, name)
    pub(crate) styles: HashMap<(String, String), StyleDefinition>,
    pub(crate) metadata: BTreeMap<String, String>,
    pub(crate) notifier: EventNotifier<DocumentEvent>,
    bucket_size: usize,
}

impl Document {
    pub fn new(bucket_size: usize) -> Self {
        let tree = Tree::new(QName::office("text"));
        Self::from_tree(tree, bucket_size)
    }

    pub fn from_tree(tree: Tree, bucket_size: usize) -> Self {
        let root = tree.root();
        Self {
            tree,
            translator: StepsTranslator::new(root, Box::new(TextPositionFilter::new()), bucket_size),
            cursors: HashMap::new(),
            members: HashMap::new(),
            styles: HashMap::new(),
            metadata: BTreeMap::new(),
            notifier: EventNotifier::new(),
            bucket_size,
        }
    }

    /// Build a document with one paragraph per entry
    pub fn with_paragraphs(paragraphs: &[&str], bucket_size: usize) -> Self {
        let mut tree = Tree::new(QName::office("text"));
        let root = tree.root();
        for text in paragraphs {
            let p = tree.create_element(QName::text("p"));
            tree.append_child(root, p);
            if !text.is_empty() {
                let t = tree.create_text(text);
                tree.append_child(p, t);
            }
        }
        Self::from_tree(tree, bucket_size)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&DocumentEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    pub fn cursor(&self, member_id: &str) -> Option<&Cursor> {
        self.cursors.get(member_id)
    }

    pub fn cursors(&self) -> &HashMap<String, Cursor> {
        &self.cursors
    }

    pub fn member(&self, member_id: &str) -> Option<&MemberProperties> {
        self.members.get(member_id)
    }

    pub fn style(&self, family: &str, name: &str) -> Option<&StyleDefinition> {
        self.styles.get(&(family.to_string(), name.to_string()))
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Total number of walkable steps in the document
    pub fn step_count(&mut self) -> usize {
        let root = self.tree.root();
        let end = self.tree.child_count(root);
        self.translator
            .convert_dom_point_to_steps(&self.tree, root, end, None)
    }

    pub fn convert_steps_to_dom_point(&mut self, steps: usize) -> Result<DomPoint, StepError> {
        self.translator.convert_steps_to_dom_point(&self.tree, steps)
    }

    /// Text content of each top-level paragraph, in document order
    pub fn paragraph_texts(&self) -> Vec<String> {
        let root = self.tree.root();
        self.tree
            .children(root)
            .iter()
            .filter(|&&c| {
                self.tree
                    .name(c)
                    .map(dom::is_paragraph_name)
                    .unwrap_or(false)
            })
            .map(|&c| self.tree.text_content(c))
            .collect()
    }

    pub(crate) fn paragraph_at_step(&mut self, steps: usize) -> Option<NodeId> {
        let point = self
            .translator
            .convert_steps_to_dom_point(&self.tree, steps)
            .ok()?;
        paragraph_at(&self.tree, point.node)
    }

    /// Resolve a step to a concrete text node and character offset,
    /// creating an empty text node when the step sits on an element
    /// boundary with no text neighbour.
    pub(crate) fn text_node_at_step(&mut self, steps: usize) -> Option<(NodeId, usize)> {
        let point = self
            .translator
            .convert_steps_to_dom_point(&self.tree, steps)
            .ok()?;
        if self.tree.is_text(point.node) {
            return Some((point.node, point.offset));
        }
        let container = point.node;
        if point.offset > 0 {
            if let Some(&left) = self.tree.children(container).get(point.offset - 1) {
                if self.tree.is_text(left) {
                    return Some((left, self.tree.text_len(left)));
                }
            }
        }
        if let Some(&right) = self.tree.children(container).get(point.offset) {
            if self.tree.is_text(right) {
                return Some((right, 0));
            }
        }
        let text = self.tree.create_text("");
        let before = self.tree.children(container).get(point.offset).copied();
        self.tree.insert_before(container, text, before);
        Some((text, 0))
    }

    /// Route an event: translator damage first, observers second
    pub(crate) fn emit(&mut self, event: DocumentEvent) {
        match &event {
            DocumentEvent::StepsInserted { position } => {
                self.translator.handle_steps_inserted(*position);
            }
            DocumentEvent::StepsRemoved { position } => {
                self.translator.handle_steps_removed(*position);
            }
            _ => {}
        }
        self.notifier.emit(&event);
    }

    // ── cursor maintenance ───────────────────────────────────────────

    pub(crate) fn add_cursor(&mut self, member_id: &str) -> bool {
        if self.cursors.contains_key(member_id) {
            return false;
        }
        self.cursors.insert(member_id.to_string(), Cursor::collapsed(0));
        true
    }

    pub(crate) fn move_cursor(
        &mut self,
        member_id: &str,
        position: usize,
        length: i64,
        selection_type: SelectionType,
    ) -> bool {
        match self.cursors.get_mut(member_id) {
            Some(cursor) => {
                cursor.position = position;
                cursor.length = length;
                cursor.selection_type = selection_type;
                true
            }
            None => false,
        }
    }

    /// Drop every registered cursor, as happens before an undo snapshot
    /// restore where cursor-add operations are replayed from scratch
    pub fn remove_all_cursors(&mut self) {
        let members: Vec<String> = self.cursors.keys().cloned().collect();
        self.cursors.clear();
        for member_id in members {
            self.emit(DocumentEvent::CursorRemoved { member_id });
        }
    }

    /// New steps appeared at `position`: cursors at or beyond it slide
    /// right. The author's own cursor slides even when exactly at the
    /// insertion point, so typed text appears before it.
    pub(crate) fn shift_cursors_on_insert(
        &mut self,
        position: usize,
        length: usize,
        author: Option<&str>,
    ) {
        for (member_id, cursor) in self.cursors.iter_mut() {
            if cursor.position > position
                || (cursor.position == position && Some(member_id.as_str()) == author)
            {
                cursor.position += length;
            }
        }
    }

    /// Steps in `position..position + length` are gone: cursors inside the
    /// range collapse to its start, later cursors slide left.
    pub(crate) fn shift_cursors_on_remove(&mut self, position: usize, length: usize) {
        let end = position + length;
        for cursor in self.cursors.values_mut() {
            if cursor.position > end {
                cursor.position -= length;
            } else if cursor.position > position {
                cursor.position = position;
            }
        }
    }

    /// Clamp every cursor back into the valid step range
    pub(crate) fn fix_cursor_positions(&mut self) {
        let max = self.step_count();
        let mut moved = Vec::new();
        for (member_id, cursor) in self.cursors.iter_mut() {
            let position = cursor.position.min(max);
            let focus = (position as i64 + cursor.length).clamp(0, max as i64);
            let length = focus - position as i64;
            if position != cursor.position || length != cursor.length {
                cursor.position = position;
                cursor.length = length;
                moved.push(member_id.clone());
            }
        }
        for member_id in moved {
            self.emit(DocumentEvent::CursorMoved { member_id });
        }
    }

    /// Replace the tree wholesale (undo snapshot restore). Translator
    /// bookmarks hold ids from the old arena, so the translator is rebuilt.
    pub fn reset_tree(&mut self, tree: Tree) {
        let root = tree.root();
        self.tree = tree;
        self.translator = StepsTranslator::new(
            root,
            Box::new(TextPositionFilter::new()),
            self.bucket_size,
        );
    }

    // ── whitespace representation ────────────────────────────────────

    /// Convert significant literal spaces around `position` into explicit
    /// space elements so later edits cannot collapse them.
    pub(crate) fn upgrade_whitespaces_at_position(&mut self, position: usize) {
        let point = match self.translator.convert_steps_to_dom_point(&self.tree, position) {
            Ok(point) => point,
            Err(_) => return,
        };
        let mut iterator = PositionIterator::new(self.tree.root());
        iterator.set_unfiltered_position(&self.tree, point.node, point.offset);
        iterator.previous_position(&self.tree);
        let mut candidates = Vec::new();
        for _ in 0..3 {
            let container = iterator.container();
            let offset = iterator.unfiltered_dom_offset();
            if self.tree.is_text(container)
                && self.tree.text(container).and_then(|t| t.chars().nth(offset)) == Some(' ')
                && is_significant_whitespace(&self.tree, container, offset)
            {
                candidates.push((container, offset));
            }
            if !iterator.next_position(&self.tree) {
                break;
            }
        }
        // later offsets first, so earlier (node, offset) pairs stay valid
        for (node, offset) in candidates.into_iter().rev() {
            self.upgrade_whitespace_to_element(node, offset);
        }
    }

    fn upgrade_whitespace_to_element(&mut self, text_node: NodeId, offset: usize) {
        let parent = match self.tree.parent(text_node) {
            Some(parent) => parent,
            None => return,
        };
        self.tree.delete_text(text_node, offset, 1);
        let rest = self.tree.split_text(text_node, offset);
        let space = self.tree.create_element(QName::text("s"));
        self.tree.insert_before(parent, space, Some(rest));
        if self.tree.text_len(rest) == 0 {
            self.tree.detach(rest);
        }
        if self.tree.text_len(text_node) == 0 {
            self.tree.detach(text_node);
        }
    }

    /// Replace explicit space elements near the given point with literal
    /// spaces where the literal form stays significant. Checks the closest
    /// step and the two following it.
    pub(crate) fn downgrade_whitespaces_near(&mut self, node: NodeId, offset: usize) {
        let filter = TextPositionFilter::new();
        let mut iter = StepIterator::new(&filter, self.tree.root());
        iter.set_position(&self.tree, node, offset);
        if !iter.round_to_closest_step(&self.tree) {
            return;
        }
        if !iter.previous_step(&self.tree) {
            iter.set_position(&self.tree, node, offset);
            if !iter.round_to_next_step(&self.tree) {
                return;
            }
        }
        let mut touched_parents = Vec::new();
        for _ in 0..3 {
            let point = iter.point();
            for candidate in [self.space_element_at(point, true), self.space_element_at(point, false)]
            {
                if let Some(space) = candidate {
                    if let Some(parent) = self.try_downgrade_space(space) {
                        touched_parents.push(parent);
                    }
                }
            }
            if !iter.next_step(&self.tree) {
                break;
            }
        }
        for parent in touched_parents {
            self.tree.normalize_text(parent);
        }
    }

    fn space_element_at(&self, point: DomPoint, left: bool) -> Option<NodeId> {
        if self.tree.is_text(point.node) {
            return None;
        }
        let index = if left {
            point.offset.checked_sub(1)?
        } else {
            point.offset
        };
        let child = self.tree.children(point.node).get(index).copied()?;
        let name = self.tree.name(child)?;
        name.is(TEXT_NS, "s").then_some(child)
    }

    /// Returns the parent to normalize when the downgrade stuck
    fn try_downgrade_space(&mut self, space: NodeId) -> Option<NodeId> {
        let parent = self.tree.parent(space)?;
        let text = self.tree.create_text(" ");
        self.tree.insert_before(parent, text, Some(space));
        self.tree.detach(space);
        if is_significant_whitespace(&self.tree, text, 0) {
            Some(parent)
        } else {
            // the literal space would collapse here, keep the element
            self.tree.insert_before(parent, space, Some(text));
            self.tree.detach(text);
            None
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("paragraphs", &self.paragraph_texts())
            .field("cursors", &self.cursors)
            .field("members", &self.members.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_paragraphs_step_count() {
        let mut doc = Document::with_paragraphs(&["AB", "EF"], 10);
        assert_eq!(doc.step_count(), 6);
        assert_eq!(doc.paragraph_texts(), vec!["AB", "EF"]);
    }

    #[test]
    fn test_text_node_at_step_reuses_neighbours() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        // step 1 is inside the text node
        let (node, offset) = doc.text_node_at_step(1).unwrap();
        assert!(doc.tree.is_text(node));
        assert_eq!(offset, 1);
        // step 0 is the paragraph start; the text node head is reused
        let (node, offset) = doc.text_node_at_step(0).unwrap();
        assert!(doc.tree.is_text(node));
        assert_eq!(offset, 0);
    }

    #[test]
    fn test_text_node_at_step_creates_in_empty_paragraph() {
        let mut doc = Document::with_paragraphs(&[""], 10);
        let (node, offset) = doc.text_node_at_step(0).unwrap();
        assert!(doc.tree.is_text(node));
        assert_eq!(offset, 0);
        assert_eq!(doc.tree.text_len(node), 0);
    }

    #[test]
    fn test_cursor_shifting() {
        let mut doc = Document::with_paragraphs(&["ABCD"], 10);
        doc.add_cursor("alice");
        doc.add_cursor("bob");
        doc.move_cursor("alice", 2, 0, SelectionType::Range);
        doc.move_cursor("bob", 4, 0, SelectionType::Range);
        doc.shift_cursors_on_insert(2, 3, Some("alice"));
        assert_eq!(doc.cursor("alice").unwrap().position, 5);
        assert_eq!(doc.cursor("bob").unwrap().position, 7);
        doc.shift_cursors_on_remove(1, 5);
        assert_eq!(doc.cursor("alice").unwrap().position, 1);
        assert_eq!(doc.cursor("bob").unwrap().position, 2);
    }

    #[test]
    fn test_fix_cursor_positions_clamps() {
        let mut doc = Document::with_paragraphs(&["AB"], 10);
        doc.add_cursor("alice");
        doc.move_cursor("alice", 9, 4, SelectionType::Range);
        doc.fix_cursor_positions();
        let cursor = *doc.cursor("alice").unwrap();
        assert_eq!(cursor.position, 3);
        assert_eq!(cursor.length, 0);
    }
}
