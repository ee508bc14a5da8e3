//! DARC programmable token ledger
//!
//! This crate re-exports the ledger types and the runtime that executes
//! programs against them.

pub use darc_core::*;
pub use darc_runtime::*;
