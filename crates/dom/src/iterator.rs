//! Unfiltered position iteration over the document tree
//!
//! A point is a `(container, offset)` pair. Element points sit between
//! children (`offset` in `0..=child_count`); text points sit strictly
//! inside a text node (`offset` in `1..char_len`); the boundary offsets 0
//! and `len` are canonically represented as points of the parent element.

use std::cmp::Ordering;

use crate::tree::{NodeId, Tree};

/// A concrete position in the document tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPoint {
    pub node: NodeId,
    pub offset: usize,
}

impl DomPoint {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// Compare two points in document order
pub fn compare_points(tree: &Tree, a: DomPoint, b: DomPoint) -> Ordering {
    path_of(tree, a).cmp(&path_of(tree, b))
}

fn path_of(tree: &Tree, point: DomPoint) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = point.node;
    while let Some(parent) = tree.parent(current) {
        if let Some(idx) = tree.index_in_parent(current) {
            path.push(idx);
        }
        current = parent;
    }
    path.reverse();
    path.push(point.offset);
    path
}

/// Walks every unfiltered point beneath a root node, in document order.
///
/// This is a value type; all movement takes the tree as a parameter so the
/// iterator never borrows the document across mutations.
#[derive(Debug, Clone)]
pub struct PositionIterator {
    root: NodeId,
    container: NodeId,
    offset: usize,
}

impl PositionIterator {
    /// Iterator positioned at the first point beneath `root`
    pub fn new(root: NodeId) -> Self {
        Self {
            root,
            container: root,
            offset: 0,
        }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn unfiltered_dom_offset(&self) -> usize {
        self.offset
    }

    pub fn point(&self) -> DomPoint {
        DomPoint::new(self.container, self.offset)
    }

    /// The child immediately after the current point, if any
    pub fn right_node(&self, tree: &Tree) -> Option<NodeId> {
        if tree.is_element(self.container) {
            tree.children(self.container).get(self.offset).copied()
        } else {
            None
        }
    }

    /// The child immediately before the current point, if any
    pub fn left_node(&self, tree: &Tree) -> Option<NodeId> {
        if tree.is_element(self.container) && self.offset > 0 {
            tree.children(self.container).get(self.offset - 1).copied()
        } else {
            None
        }
    }

    /// Place the iterator at an arbitrary point, normalizing text-boundary
    /// offsets to the equivalent element point.
    pub fn set_unfiltered_position(&mut self, tree: &Tree, node: NodeId, offset: usize) {
        if tree.is_text(node) {
            let len = tree.text_len(node);
            if offset == 0 || len == 0 {
                let parent = tree.parent(node).unwrap_or(self.root);
                let idx = tree.index_in_parent(node).unwrap_or(0);
                self.container = parent;
                self.offset = idx;
            } else if offset >= len {
                let parent = tree.parent(node).unwrap_or(self.root);
                let idx = tree.index_in_parent(node).unwrap_or(0);
                self.container = parent;
                self.offset = idx + 1;
            } else {
                self.container = node;
                self.offset = offset;
            }
        } else {
            self.container = node;
            self.offset = offset.min(tree.child_count(node));
        }
    }

    /// Place the iterator immediately before `node`
    pub fn set_position_before(&mut self, tree: &Tree, node: NodeId) {
        if node == self.root {
            self.container = self.root;
            self.offset = 0;
            return;
        }
        let parent = tree.parent(node).expect("node is detached");
        let idx = tree.index_in_parent(node).expect("node is detached");
        self.container = parent;
        self.offset = idx;
    }

    /// Advance to the next point. Returns false at the end of the subtree.
    pub fn next_position(&mut self, tree: &Tree) -> bool {
        if tree.is_text(self.container) {
            let len = tree.text_len(self.container);
            if self.offset + 1 < len {
                self.offset += 1;
                return true;
            }
            return self.move_to_after(tree, self.container);
        }
        match tree.children(self.container).get(self.offset).copied() {
            Some(child) => {
                if tree.is_text(child) {
                    if tree.text_len(child) >= 2 {
                        self.container = child;
                        self.offset = 1;
                        true
                    } else {
                        self.offset += 1;
                        true
                    }
                } else {
                    self.container = child;
                    self.offset = 0;
                    true
                }
            }
            None => {
                if self.container == self.root {
                    false
                } else {
                    self.move_to_after(tree, self.container)
                }
            }
        }
    }

    fn move_to_after(&mut self, tree: &Tree, node: NodeId) -> bool {
        match (tree.parent(node), tree.index_in_parent(node)) {
            (Some(parent), Some(idx)) => {
                self.container = parent;
                self.offset = idx + 1;
                true
            }
            _ => false,
        }
    }

    /// Step back to the previous point. Returns false at the start.
    pub fn previous_position(&mut self, tree: &Tree) -> bool {
        if tree.is_text(self.container) {
            if self.offset > 1 {
                self.offset -= 1;
                return true;
            }
            return self.move_to_before(tree, self.container);
        }
        if self.offset == 0 {
            if self.container == self.root {
                return false;
            }
            return self.move_to_before(tree, self.container);
        }
        let child = tree.children(self.container)[self.offset - 1];
        if tree.is_text(child) {
            let len = tree.text_len(child);
            if len >= 2 {
                self.container = child;
                self.offset = len - 1;
            } else {
                self.offset -= 1;
            }
            true
        } else {
            self.offset = tree.child_count(child);
            self.container = child;
            true
        }
    }

    fn move_to_before(&mut self, tree: &Tree, node: NodeId) -> bool {
        match (tree.parent(node), tree.index_in_parent(node)) {
            (Some(parent), Some(idx)) => {
                self.container = parent;
                self.offset = idx;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QName;

    /// <office:text><text:p>AB</text:p><text:p>EF</text:p></office:text>
    fn two_paragraphs() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new(QName::office("text"));
        let root = tree.root();
        let p1 = tree.create_element(QName::text("p"));
        let t1 = tree.create_text("AB");
        let p2 = tree.create_element(QName::text("p"));
        let t2 = tree.create_text("EF");
        tree.append_child(root, p1);
        tree.append_child(p1, t1);
        tree.append_child(root, p2);
        tree.append_child(p2, t2);
        (tree, p1, p2)
    }

    #[test]
    fn test_forward_walk() {
        let (tree, p1, p2) = two_paragraphs();
        let mut iter = PositionIterator::new(tree.root());
        let mut points = vec![iter.point()];
        while iter.next_position(&tree) {
            points.push(iter.point());
        }
        // (root,0) (p1,0) (t1,1) (p1,1) (root,1) (p2,0) (t2,1) (p2,1) (root,2)
        assert_eq!(points.len(), 9);
        assert_eq!(points[1], DomPoint::new(p1, 0));
        assert_eq!(points[5], DomPoint::new(p2, 0));
        assert_eq!(points[8], DomPoint::new(tree.root(), 2));
    }

    #[test]
    fn test_backward_walk_mirrors_forward() {
        let (tree, _, _) = two_paragraphs();
        let mut iter = PositionIterator::new(tree.root());
        let mut forward = vec![iter.point()];
        while iter.next_position(&tree) {
            forward.push(iter.point());
        }
        let mut backward = vec![iter.point()];
        while iter.previous_position(&tree) {
            backward.push(iter.point());
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_points_are_ordered() {
        let (tree, _, _) = two_paragraphs();
        let mut iter = PositionIterator::new(tree.root());
        let mut prev = iter.point();
        while iter.next_position(&tree) {
            let current = iter.point();
            assert_eq!(compare_points(&tree, prev, current), Ordering::Less);
            prev = current;
        }
    }

    #[test]
    fn test_set_position_normalizes_text_boundaries() {
        let (tree, p1, _) = two_paragraphs();
        let t1 = tree.first_child(p1).unwrap();
        let mut iter = PositionIterator::new(tree.root());
        iter.set_unfiltered_position(&tree, t1, 0);
        assert_eq!(iter.point(), DomPoint::new(p1, 0));
        iter.set_unfiltered_position(&tree, t1, 2);
        assert_eq!(iter.point(), DomPoint::new(p1, 1));
        iter.set_unfiltered_position(&tree, t1, 1);
        assert_eq!(iter.point(), DomPoint::new(t1, 1));
    }
}
