//! # Vellum steps
//!
//! Translation between the linear "step" position space and concrete tree
//! points. A step is the n-th tree point accepted by a [`PositionFilter`],
//! counted from the document root; every cursor and operation position in
//! the system is expressed in steps.

pub mod cache;
pub mod filter;
pub mod step_iterator;
pub mod translator;

use dom::{PositionIterator, Tree};

pub use cache::StepsCache;
pub use filter::TextPositionFilter;
pub use step_iterator::StepIterator;
pub use translator::{StepError, StepsTranslator};

/// Verdict of a [`PositionFilter`] for a single tree point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterResult {
    /// The point is a valid cursor position
    Accept,
    /// The point is not a valid cursor position
    Reject,
    /// The point and everything below its container can be ignored
    Skip,
}

/// Predicate deciding which raw tree points count as steps
pub trait PositionFilter {
    fn accept_position(&self, tree: &Tree, iterator: &PositionIterator) -> FilterResult;
}

/// Direction hint passed to step rounding delegates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Previous,
    Next,
}
