//! # Vellum undo
//!
//! Local undo/redo for an edited document. [`UndoStateRules`] groups
//! executed operations into undoable states the way word processors batch
//! keystrokes, and [`TrivialUndoManager`] rewinds by restoring a tree
//! snapshot and replaying the remaining history.

pub mod manager;
pub mod rules;

pub use manager::{TrivialUndoManager, UndoStackEvent};
pub use rules::UndoStateRules;
