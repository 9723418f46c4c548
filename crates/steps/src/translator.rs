//! Bidirectional step to tree-point translation
//!
//! Lookups seek to the closest cached bookmark and walk forward from there,
//! feeding every paragraph passed on the way back into the cache. Structural
//! edits must report their position through [`StepsTranslator::handle_steps_inserted`]
//! or [`StepsTranslator::handle_steps_removed`] before the next translation,
//! otherwise stale bookmarks would resolve against nodes that moved.

use std::cmp::Ordering;

use thiserror::Error;
use tracing::debug;

use dom::iterator::compare_points;
use dom::{is_paragraph_name, DomPoint, NodeId, PositionIterator, Tree};

use crate::cache::{CacheAnchor, CachePoint, StepsCache};
use crate::{FilterResult, PositionFilter, StepDirection};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StepError {
    #[error("requested steps ({requested}) exceeds available steps ({available})")]
    OutOfRange { requested: usize, available: usize },
}

/// Chooses whether a rounded position in the given direction is acceptable
pub type RoundDirection<'a> = &'a dyn Fn(StepDirection, DomPoint) -> bool;

pub struct StepsTranslator {
    root: NodeId,
    filter: Box<dyn PositionFilter>,
    cache: StepsCache,
}

impl StepsTranslator {
    pub fn new(root: NodeId, filter: Box<dyn PositionFilter>, bucket_size: usize) -> Self {
        Self {
            root,
            filter,
            cache: StepsCache::new(root, bucket_size),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    fn is_step(&self, tree: &Tree, iterator: &PositionIterator) -> bool {
        self.filter.accept_position(tree, iterator) == FilterResult::Accept
    }

    /// Feed the current position into the cache if it sits before a
    /// paragraph node. `bookmark_steps` must be the first step inside that
    /// paragraph.
    fn update_cache(&mut self, tree: &Tree, iterator: &PositionIterator, bookmark_steps: usize) {
        if let Some(node) = iterator.right_node(tree) {
            if tree.name(node).is_some_and(is_paragraph_name) {
                self.cache.update_bookmark(tree, bookmark_steps, node);
            }
        }
    }

    /// Record a position passed during a forward walk. A paragraph bookmark
    /// names the first step inside the paragraph, so when the walk rests
    /// just before that step the running count is one behind.
    fn note_walk_position(
        &mut self,
        tree: &Tree,
        iterator: &PositionIterator,
        steps_from_root: usize,
        is_step: bool,
    ) {
        let bookmark_steps = if is_step {
            steps_from_root
        } else {
            steps_from_root + 1
        };
        self.update_cache(tree, iterator, bookmark_steps);
    }

    /// Advance the iterator to the first accepted position at or after the
    /// anchor. Every pre-step position still maps to the bookmarked count.
    fn round_up_to_step(&mut self, tree: &Tree, steps: usize, iterator: &mut PositionIterator) {
        loop {
            let accepted = self.is_step(tree, iterator);
            self.update_cache(tree, iterator, steps);
            if accepted || !iterator.next_position(tree) {
                break;
            }
        }
    }

    fn seek_to(&mut self, tree: &Tree, point: CachePoint, iterator: &mut PositionIterator) {
        match point.anchor {
            CacheAnchor::DocumentStart => iterator.set_unfiltered_position(tree, self.root, 0),
            CacheAnchor::BeforeParagraph(node) => iterator.set_position_before(tree, node),
        }
        self.round_up_to_step(tree, point.steps, iterator);
    }

    /// Resolve a step count to its tree point. Errs if `steps` walks past
    /// the end of the document.
    pub fn convert_steps_to_dom_point(
        &mut self,
        tree: &Tree,
        steps: usize,
    ) -> Result<DomPoint, StepError> {
        let mut iterator = PositionIterator::new(self.root);
        let point = self.cache.set_to_closest_step(steps);
        self.seek_to(tree, point, &mut iterator);
        let mut steps_from_root = point.steps;
        while steps_from_root < steps {
            if !iterator.next_position(tree) {
                return Err(StepError::OutOfRange {
                    requested: steps,
                    available: steps_from_root,
                });
            }
            let is_step = self.is_step(tree, &iterator);
            if is_step {
                steps_from_root += 1;
            }
            self.note_walk_position(tree, &iterator, steps_from_root, is_step);
        }
        Ok(iterator.point())
    }

    fn round_to_preferred_step(
        &self,
        tree: &Tree,
        iterator: &mut PositionIterator,
        round_direction: Option<RoundDirection>,
    ) -> bool {
        let choose = match round_direction {
            Some(choose) => choose,
            None => return true,
        };
        if self.is_step(tree, iterator) {
            return true;
        }
        while iterator.previous_position(tree) {
            if self.is_step(tree, iterator) {
                if choose(StepDirection::Previous, iterator.point()) {
                    return true;
                }
                break;
            }
        }
        while iterator.next_position(tree) {
            if self.is_step(tree, iterator) {
                if choose(StepDirection::Next, iterator.point()) {
                    return true;
                }
                break;
            }
        }
        false
    }

    /// Resolve a tree point to its step count. Points that are not steps
    /// are rounded by `round_direction` if provided, otherwise downwards.
    pub fn convert_dom_point_to_steps(
        &mut self,
        tree: &Tree,
        node: NodeId,
        offset: usize,
        round_direction: Option<RoundDirection>,
    ) -> usize {
        let (node, offset) = if tree.contains(self.root, node) {
            (node, offset)
        } else {
            // clamp points outside the walkable root to its edges
            let before_root = compare_points(
                tree,
                DomPoint::new(node, offset),
                DomPoint::new(self.root, 0),
            ) == Ordering::Less;
            let offset = if before_root {
                0
            } else {
                tree.child_count(self.root)
            };
            (self.root, offset)
        };

        let mut iterator = PositionIterator::new(self.root);
        iterator.set_unfiltered_position(tree, node, offset);
        if !self.round_to_preferred_step(tree, &mut iterator, round_direction) {
            // the delegate rejected both candidates; keep the raw point
            iterator.set_unfiltered_position(tree, node, offset);
        }
        let destination = iterator.point();

        let point = self
            .cache
            .set_to_closest_dom_point(tree, destination.node, destination.offset);
        self.seek_to(tree, point, &mut iterator);
        let mut steps_from_root = point.steps;
        if compare_points(tree, destination, iterator.point()) == Ordering::Less {
            // the requested point lies between the bookmarked node and the
            // first step it names
            return steps_from_root.saturating_sub(1);
        }

        while iterator.point() != destination {
            if !iterator.next_position(tree) {
                break;
            }
            let is_step = self.is_step(tree, &iterator);
            if is_step {
                steps_from_root += 1;
            }
            self.note_walk_position(tree, &iterator, steps_from_root, is_step);
        }
        steps_from_root
    }

    /// Walk the whole document once, populating the cache bucket by bucket
    pub fn prime(&mut self, tree: &Tree) {
        let mut iterator = PositionIterator::new(self.root);
        let point = self.cache.set_to_closest_step(0);
        self.seek_to(tree, point, &mut iterator);
        let mut steps_from_root = point.steps;
        while iterator.next_position(tree) {
            let is_step = self.is_step(tree, &iterator);
            if is_step {
                steps_from_root += 1;
            }
            self.note_walk_position(tree, &iterator, steps_from_root, is_step);
        }
    }

    /// Steps were inserted at `position`: every cached step at or beyond it
    /// is no longer trustworthy.
    pub fn handle_steps_inserted(&mut self, position: usize) {
        debug!(position, "steps inserted, damaging cache");
        self.cache.damage_cache_after_step(position);
    }

    /// Steps were removed at `position`. Text removal reports the position
    /// one step late when a paragraph merge replaces the node at that
    /// position, so damage starts one step earlier.
    pub fn handle_steps_removed(&mut self, position: usize) {
        debug!(position, "steps removed, damaging cache");
        self.cache.damage_cache_after_step(position.saturating_sub(1));
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

    fn translator(tree: &Tree, bucket_size: usize) -> StepsTranslator {
        StepsTranslator::new(tree.root(), Box::new(TextPositionFilter::new()), bucket_size)
    }

    #[test]
    fn test_step_round_trip() {
        let (tree, _, _) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        for step in 0..=5 {
            let point = translator.convert_steps_to_dom_point(&tree, step).unwrap();
            let back = translator.convert_dom_point_to_steps(&tree, point.node, point.offset, None);
            assert_eq!(back, step, "round trip failed for step {step}");
        }
    }

    #[test]
    fn test_step_monotonicity() {
        let (tree, _, _) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        let mut previous = None;
        for step in 0..=5 {
            let point = translator.convert_steps_to_dom_point(&tree, step).unwrap();
            if let Some(prev) = previous {
                assert_eq!(compare_points(&tree, prev, point), Ordering::Less);
            }
            previous = Some(point);
        }
    }

    #[test]
    fn test_past_end_is_an_error() {
        let (tree, _, _) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 6),
            Err(StepError::OutOfRange {
                requested: 6,
                available: 5
            })
        );
    }

    #[test]
    fn test_paragraph_steps() {
        let (tree, p1, p2) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 0).unwrap(),
            DomPoint::new(p1, 0)
        );
        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 3).unwrap(),
            DomPoint::new(p2, 0)
        );
    }

    #[test]
    fn test_prime_is_idempotent() {
        let (tree, _, _) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        translator.prime(&tree);
        let first: Vec<DomPoint> = (0..=5)
            .map(|s| translator.convert_steps_to_dom_point(&tree, s).unwrap())
            .collect();
        translator.prime(&tree);
        let second: Vec<DomPoint> = (0..=5)
            .map(|s| translator.convert_steps_to_dom_point(&tree, s).unwrap())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rounding_delegate_chooses_direction() {
        let (tree, p1, p2) = two_paragraphs();
        let mut translator = translator(&tree, 2);
        // the point between the paragraphs is not a step
        let down =
            translator.convert_dom_point_to_steps(&tree, tree.root(), 1, None);
        assert_eq!(down, 2);
        let up = translator.convert_dom_point_to_steps(
            &tree,
            tree.root(),
            1,
            Some(&|direction, _point| direction == StepDirection::Next),
        );
        assert_eq!(up, 3);
        let _ = (p1, p2);
    }

    #[test]
    fn test_cache_coherence_after_insert() {
        let (mut tree, p1, p2) = two_paragraphs();
        let t1 = tree.first_child(p1).unwrap();
        let mut translator = translator(&tree, 2);
        translator.prime(&tree);
        let step_zero = translator.convert_steps_to_dom_point(&tree, 0).unwrap();

        // insert a character after 'A' (one new step at position 2)
        tree.insert_text(t1, 1, "X");
        translator.handle_steps_inserted(1);

        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 0).unwrap(),
            step_zero
        );
        // first step of the second paragraph moved from 3 to 4
        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 4).unwrap(),
            DomPoint::new(p2, 0)
        );
    }

    #[test]
    fn test_cache_coherence_after_remove() {
        let (mut tree, p1, p2) = two_paragraphs();
        let t1 = tree.first_child(p1).unwrap();
        let mut translator = translator(&tree, 2);
        translator.prime(&tree);

        // remove 'B' (the step at position 2 disappears)
        tree.delete_text(t1, 1, 1);
        translator.handle_steps_removed(2);

        assert_eq!(
            translator.convert_steps_to_dom_point(&tree, 2).unwrap(),
            DomPoint::new(p2, 0)
        );
        assert_eq!(
            translator
                .convert_dom_point_to_steps(&tree, tree.first_child(p2).unwrap(), 1, None),
            3
        );
    }
}
