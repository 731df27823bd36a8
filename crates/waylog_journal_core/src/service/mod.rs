//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate documents, codecs and the collaborator into the ledger
//!   merge and journal condensation steps.
//! - Keep the CLI decoupled from document and collaborator details.

pub mod journal_service;
pub mod ledger_service;
