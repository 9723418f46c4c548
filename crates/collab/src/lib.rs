//! # Vellum collaboration
//!
//! Concurrent editing support: a pairwise transformation matrix over
//! operation specs, a list-vs-list transformer built on top of it, and a
//! sync router that keeps a local document converged with a shared server
//! log.
//!
//! Ties between concurrent operations are broken in favour of the server
//! side, so every client resolves the same race the same way.

pub mod matrix;
pub mod router;
pub mod server;
pub mod transformer;

pub use matrix::{transform_op_vs_op, PairResult};
pub use router::{ReplayBatch, RouterError, SyncRouter, TrivialRouter};
pub use server::{RemoteChanges, ServerError, SyncServer};
pub use transformer::{transform, TransformError, TransformResult};
