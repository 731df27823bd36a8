//! Domain model for transcripts, ledger entries and collaborator responses.
//!
//! # Responsibility
//! - Define the data structures shared by codec and service layers.
//!
//! # Invariants
//! - Source items are read-only inputs.
//! - Entries are only produced by the ledger merge engine.

pub mod entry;
pub mod source_item;
pub mod summary;
