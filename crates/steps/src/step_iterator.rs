//! Filter-aware movement over the document tree
//!
//! Wraps a [`PositionIterator`] so callers only ever land on accepted
//! steps. Used by structural operations to find and round cursor
//! positions without counting steps from the root.

use dom::{DomPoint, NodeId, PositionIterator, Tree};

use crate::{FilterResult, PositionFilter};

pub struct StepIterator<'a> {
    filter: &'a dyn PositionFilter,
    iterator: PositionIterator,
}

impl<'a> StepIterator<'a> {
    pub fn new(filter: &'a dyn PositionFilter, root: NodeId) -> Self {
        Self {
            filter,
            iterator: PositionIterator::new(root),
        }
    }

    pub fn container(&self) -> NodeId {
        self.iterator.container()
    }

    pub fn offset(&self) -> usize {
        self.iterator.unfiltered_dom_offset()
    }

    pub fn point(&self) -> DomPoint {
        self.iterator.point()
    }

    /// True if the current position is an accepted step
    pub fn is_step(&self, tree: &Tree) -> bool {
        self.filter.accept_position(tree, &self.iterator) == FilterResult::Accept
    }

    /// Move to an arbitrary point; returns whether that point is a step
    pub fn set_position(&mut self, tree: &Tree, node: NodeId, offset: usize) -> bool {
        self.iterator.set_unfiltered_position(tree, node, offset);
        self.is_step(tree)
    }

    /// Advance to the next accepted step
    pub fn next_step(&mut self, tree: &Tree) -> bool {
        while self.iterator.next_position(tree) {
            if self.is_step(tree) {
                return true;
            }
        }
        false
    }

    /// Retreat to the previous accepted step
    pub fn previous_step(&mut self, tree: &Tree) -> bool {
        while self.iterator.previous_position(tree) {
            if self.is_step(tree) {
                return true;
            }
        }
        false
    }

    /// If not on a step, move to the previous one, or failing that the next
    pub fn round_to_closest_step(&mut self, tree: &Tree) -> bool {
        let saved = self.iterator.clone();
        if self.round_to_previous_step(tree) {
            return true;
        }
        self.iterator = saved;
        self.next_step(tree)
    }

    /// If not on a step, move to the next one
    pub fn round_to_next_step(&mut self, tree: &Tree) -> bool {
        if self.is_step(tree) {
            return true;
        }
        self.next_step(tree)
    }

    /// If not on a step, move to the previous one
    pub fn round_to_previous_step(&mut self, tree: &Tree) -> bool {
        if self.is_step(tree) {
            return true;
        }
        self.previous_step(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::TextPositionFilter;
    use dom::QName;

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
    fn test_walks_only_steps() {
        let (tree, _, _) = two_paragraphs();
        let filter = TextPositionFilter::new();
        let mut iter = StepIterator::new(&filter, tree.root());
        let mut count = if iter.is_step(&tree) { 1 } else { 0 };
        while iter.next_step(&tree) {
            assert!(iter.is_step(&tree));
            count += 1;
        }
        // three steps per two-character paragraph
        assert_eq!(count, 6);
    }

    #[test]
    fn test_round_to_closest_prefers_previous() {
        let (tree, _, p2) = two_paragraphs();
        let filter = TextPositionFilter::new();
        let mut iter = StepIterator::new(&filter, tree.root());
        // the point between the two paragraphs is not a step
        assert!(!iter.set_position(&tree, tree.root(), 1));
        assert!(iter.round_to_closest_step(&tree));
        // rounded down into the first paragraph, not forward into p2
        assert!(!tree.contains(p2, iter.container()));
    }

    #[test]
    fn test_round_to_previous_step() {
        let (tree, p1, _) = two_paragraphs();
        let filter = TextPositionFilter::new();
        let mut iter = StepIterator::new(&filter, tree.root());
        assert!(!iter.set_position(&tree, tree.root(), 1));
        assert!(iter.round_to_previous_step(&tree));
        assert!(tree.contains(p1, iter.container()));

        // nothing precedes the first step
        let mut front = StepIterator::new(&filter, tree.root());
        assert!(!front.set_position(&tree, tree.root(), 0));
        assert!(!front.round_to_previous_step(&tree));
    }

    #[test]
    fn test_round_to_next_step() {
        let (tree, _, p2) = two_paragraphs();
        let filter = TextPositionFilter::new();
        let mut iter = StepIterator::new(&filter, tree.root());
        assert!(!iter.set_position(&tree, tree.root(), 1));
        assert!(iter.round_to_next_step(&tree));
        assert_eq!(iter.point(), DomPoint::new(p2, 0));
    }
}
