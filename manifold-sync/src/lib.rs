//! # manifold-sync
//!
//! Digest-gated rendering of an application document tree.
//!
//! [`pipeline::run`] opens the configured hash store, walks the root
//! document directory with a [`Walker`], re-renders every node whose
//! [`ContentHasher`] digest moved, and prunes outputs nothing claimed.

pub mod error;
pub mod hash_store;
pub mod hasher;
pub mod pipeline;
pub mod prune;
pub mod walker;

pub use error::SyncError;
pub use hash_store::{
    open_store, HashStore, HashStoreKind, HashStrategy, JsonHashStore, SumFileStore,
};
pub use hasher::{ContentHasher, Fingerprint};
pub use pipeline::{run, run_with, RunConfig};
pub use prune::{prune_unvisited, VisitedSet};
pub use walker::{NodeResult, WalkReport, Walker, WalkerConfig};
