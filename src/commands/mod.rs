//! Command implementations
//!
//! Commands are thin `impl Repository` blocks, organized the way git splits
//! them:
//!
//! - `plumbing`: direct object and index inspection (hash-object, cat-file, ls-files)
//! - `porcelain`: user-facing staging workflows (init, add, rm)
//!
//! Every command that changes the index holds the repository lock and runs
//! rehydrate, mutate, write_updates in that order.

pub mod plumbing;
pub mod porcelain;
