//! Text position acceptance rules
//!
//! A point is a step when it sits directly to the right of a character, at
//! the first position of a paragraph, or at the single significant position
//! inside a whitespace run. Runs of whitespace collapse: only the first
//! space after a character is walkable, and a trailing whitespace run
//! offers no positions beyond the first space.

use dom::{is_grouping_name, is_paragraph_name, NodeId, PositionIterator, Tree, TEXT_NS};

use crate::{FilterResult, PositionFilter};

/// The four characters ODF treats as collapsible whitespace
pub fn is_whitespace_char(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// True if `text` is non-empty and consists entirely of whitespace
pub fn is_odf_whitespace(text: &str) -> bool {
    !text.is_empty() && text.chars().all(is_whitespace_char)
}

/// `text:s`, `text:tab` and `text:line-break` stand in for a character
pub fn is_character_element(tree: &Tree, id: NodeId) -> bool {
    tree.name(id).is_some_and(|name| {
        name.ns == TEXT_NS && matches!(name.local.as_str(), "s" | "tab" | "line-break")
    })
}

fn is_paragraph(tree: &Tree, id: NodeId) -> bool {
    tree.name(id).is_some_and(is_paragraph_name)
}

fn is_grouping(tree: &Tree, id: NodeId) -> bool {
    tree.name(id).is_some_and(is_grouping_name)
}

/// The closest `text:p`/`text:h` containing `node`, if any
pub fn paragraph_at(tree: &Tree, node: NodeId) -> Option<NodeId> {
    let mut current = Some(node);
    while let Some(n) = current {
        if is_paragraph(tree, n) {
            return Some(n);
        }
        current = tree.parent(n);
    }
    None
}

/// Deepest last descendant reachable through grouping elements
fn last_child_in_group(tree: &Tree, mut node: NodeId) -> NodeId {
    while is_grouping(tree, node) {
        match tree.last_child(node) {
            Some(child) => node = child,
            None => break,
        }
    }
    node
}

/// Previous node in document order, stopping at the paragraph boundary
pub fn previous_node(tree: &Tree, mut node: NodeId) -> Option<NodeId> {
    loop {
        if let Some(sibling) = tree.prev_sibling(node) {
            return Some(last_child_in_group(tree, sibling));
        }
        node = tree.parent(node)?;
        if is_paragraph(tree, node) {
            return None;
        }
    }
}

/// Next node in document order, stopping at the paragraph boundary
pub fn next_node(tree: &Tree, mut node: NodeId) -> Option<NodeId> {
    if is_grouping(tree, node) {
        if let Some(first) = tree.first_child(node) {
            return Some(first);
        }
    }
    loop {
        if let Some(sibling) = tree.next_sibling(node) {
            return Some(sibling);
        }
        node = tree.parent(node)?;
        if is_paragraph(tree, node) {
            return None;
        }
    }
}

fn char_at(text: &str, index: usize) -> Option<char> {
    text.chars().nth(index)
}

/// Walk left and report whether the first thing met is a non-whitespace
/// character or a character element
fn scan_left_for_non_whitespace(tree: &Tree, start: Option<NodeId>) -> bool {
    let mut node = start;
    while let Some(n) = node {
        if tree.is_text(n) {
            if tree.text_len(n) == 0 {
                node = previous_node(tree, n);
            } else {
                let last = tree.text(n).and_then(|t| t.chars().last());
                return last.is_some_and(|c| !is_whitespace_char(c));
            }
        } else if is_character_element(tree, n) {
            return true;
        } else {
            node = previous_node(tree, n);
        }
    }
    false
}

/// What sits directly to the left of a point
enum LeftEdge {
    Nothing,
    /// Non-whitespace character or character element
    Character,
    /// Whitespace that is itself preceded by a character
    SignificantWhitespace,
}

fn look_left_for_character(tree: &Tree, node: NodeId) -> LeftEdge {
    if tree.is_text(node) && tree.text_len(node) > 0 {
        let text = tree.text(node).unwrap_or("");
        let len = tree.text_len(node);
        let last = char_at(text, len - 1).unwrap_or(' ');
        if !is_whitespace_char(last) {
            return LeftEdge::Character;
        }
        if len == 1 {
            return if scan_left_for_non_whitespace(tree, previous_node(tree, node)) {
                LeftEdge::SignificantWhitespace
            } else {
                LeftEdge::Nothing
            };
        }
        let before_last = char_at(text, len - 2).unwrap_or(' ');
        return if is_whitespace_char(before_last) {
            LeftEdge::Nothing
        } else {
            LeftEdge::SignificantWhitespace
        };
    }
    if is_character_element(tree, node) {
        LeftEdge::Character
    } else {
        LeftEdge::Nothing
    }
}

fn look_right_for_character(tree: &Tree, node: Option<NodeId>) -> bool {
    match node {
        Some(n) if tree.is_text(n) && tree.text_len(n) > 0 => {
            let first = tree.text(n).and_then(|t| t.chars().next());
            first.is_some_and(|c| !is_whitespace_char(c))
        }
        Some(n) => is_character_element(tree, n),
        None => false,
    }
}

/// Walk left and report whether any character (or character element) exists
pub fn scan_left_for_any_character(tree: &Tree, start: Option<NodeId>) -> bool {
    let mut node = start.map(|n| last_child_in_group(tree, n));
    while let Some(n) = node {
        if tree.is_text(n) && tree.text_len(n) > 0 {
            if !is_odf_whitespace(tree.text(n).unwrap_or("")) {
                return true;
            }
        } else if is_character_element(tree, n) {
            return true;
        }
        node = previous_node(tree, n);
    }
    false
}

/// Walk right and report whether any character (or character element) exists
pub fn scan_right_for_any_character(tree: &Tree, start: Option<NodeId>) -> bool {
    let mut node = start;
    while let Some(n) = node {
        if tree.is_text(n) && tree.text_len(n) > 0 {
            if !is_odf_whitespace(tree.text(n).unwrap_or("")) {
                return true;
            }
        } else if is_character_element(tree, n) {
            return true;
        }
        node = next_node(tree, n);
    }
    false
}

/// True if everything from `offset` to the end of the paragraph is whitespace
pub fn is_trailing_whitespace(tree: &Tree, text_node: NodeId, offset: usize) -> bool {
    let text = tree.text(text_node).unwrap_or("");
    let tail: String = text.chars().skip(offset).collect();
    if !tail.is_empty() && !is_odf_whitespace(&tail) {
        return false;
    }
    !scan_right_for_any_character(tree, next_node(tree, text_node))
}

/// True if the whitespace character at `offset` is rendered (the first space
/// of a run following a character, and not in trailing position)
pub fn is_significant_whitespace(tree: &Tree, text_node: NodeId, offset: usize) -> bool {
    let text = tree.text(text_node).unwrap_or("");
    let chars: Vec<char> = text.chars().collect();
    match chars.get(offset) {
        Some(c) if is_whitespace_char(*c) => {}
        _ => return false,
    }
    if offset == 0 {
        return false;
    }
    if !is_whitespace_char(chars[offset - 1]) {
        return true;
    }
    let mut preceded_by_character = false;
    if offset > 1 {
        if !is_whitespace_char(chars[offset - 2]) {
            preceded_by_character = true;
        } else if !chars[..offset].iter().all(|c| is_whitespace_char(*c)) {
            return false;
        }
    } else if scan_left_for_non_whitespace(tree, previous_node(tree, text_node)) {
        preceded_by_character = true;
    }
    if preceded_by_character {
        return !is_trailing_whitespace(tree, text_node, offset);
    }
    match chars.get(offset + 1) {
        Some(c) if is_whitespace_char(*c) => false,
        Some(_) => !scan_left_for_any_character(tree, previous_node(tree, text_node)),
        None => false,
    }
}

/// The standard text-editing position filter
#[derive(Debug, Default)]
pub struct TextPositionFilter;

impl TextPositionFilter {
    pub fn new() -> Self {
        Self
    }
}

fn check_left_right(
    tree: &Tree,
    container: NodeId,
    left: Option<NodeId>,
    right: Option<NodeId>,
) -> FilterResult {
    if let Some(left_node) = left {
        match look_left_for_character(tree, left_node) {
            LeftEdge::Character => return FilterResult::Accept,
            LeftEdge::SignificantWhitespace => {
                // significant whitespace is walkable unless it trails
                if scan_right_for_any_character(tree, right)
                    || scan_right_for_any_character(tree, next_node(tree, container))
                {
                    return FilterResult::Accept;
                }
            }
            LeftEdge::Nothing => {}
        }
    }
    // Not directly right of a character. Acceptable only as the first
    // position of a paragraph or to the left of the first character.
    let first_position = left.is_none() && is_paragraph(tree, container);
    let right_of_point_is_char = look_right_for_character(tree, right);
    if first_position {
        if right_of_point_is_char {
            return FilterResult::Accept;
        }
        return if scan_right_for_any_character(tree, right) {
            FilterResult::Reject
        } else {
            // first position in an empty paragraph
            FilterResult::Accept
        };
    }
    if !right_of_point_is_char {
        return FilterResult::Reject;
    }
    let left = left.or_else(|| previous_node(tree, container));
    if scan_left_for_any_character(tree, left) {
        FilterResult::Reject
    } else {
        FilterResult::Accept
    }
}

impl PositionFilter for TextPositionFilter {
    fn accept_position(&self, tree: &Tree, iterator: &PositionIterator) -> FilterResult {
        let container = iterator.container();
        if tree.is_text(container) {
            match tree.parent(container) {
                Some(p) if is_grouping(tree, p) => {}
                _ => return FilterResult::Reject,
            }
            // Text points are strictly interior, so a character exists on
            // both sides of the offset.
            let offset = iterator.unfiltered_dom_offset();
            let text = tree.text(container).unwrap_or("");
            let chars: Vec<char> = text.chars().collect();
            debug_assert!(offset > 0 && offset < chars.len(), "unexpected offset");
            if !is_whitespace_char(chars[offset - 1]) {
                return FilterResult::Accept;
            }
            // A whitespace to the left is walkable if it is the first of
            // its run and does not trail the paragraph.
            let mut accepted = false;
            if offset > 1 {
                if !is_whitespace_char(chars[offset - 2]) {
                    accepted = true;
                } else if !chars[..offset].iter().all(|c| is_whitespace_char(*c)) {
                    return FilterResult::Reject;
                }
            } else if scan_left_for_non_whitespace(tree, previous_node(tree, container)) {
                accepted = true;
            }
            if accepted {
                return if is_trailing_whitespace(tree, container, offset) {
                    FilterResult::Reject
                } else {
                    FilterResult::Accept
                };
            }
            if is_whitespace_char(chars[offset]) {
                return FilterResult::Reject;
            }
            // leading paragraph whitespace: walkable only before the first
            // character
            return if scan_left_for_any_character(tree, previous_node(tree, container)) {
                FilterResult::Reject
            } else {
                FilterResult::Accept
            };
        }
        if !is_grouping(tree, container) {
            return FilterResult::Reject;
        }
        let left = iterator.left_node(tree);
        let right = iterator.right_node(tree);
        check_left_right(tree, container, left, right)
    }
}
