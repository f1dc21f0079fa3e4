//! pystage-lib: Import analysis and external-dependency staging
//!
//! This crate provides the engine behind pystage:
//! - `scan`: deterministic enumeration of Python source files
//! - `parse`: syntax-aware extraction of import declarations
//! - `classify`: five-way origin classification of each declaration
//! - `resolve`: filesystem resolution of external imports
//! - `stage`: ledger-tracked copying of external dependencies into the
//!   source tree, and its exact reversal
//! - `prepare`: the coordinator tying the phases together

pub mod classify;
pub mod consts;
pub mod parse;
pub mod prepare;
pub mod project;
pub mod resolve;
pub mod scan;
pub mod stage;
pub mod types;
pub mod util;
