//! Text codecs for ledger entry blocks.
//!
//! # Responsibility
//! - Render and parse per-item entry blocks inside the ledger managed region.
//! - Project entry blocks into condensation records for the journal.

pub mod condense;
pub mod entry;
