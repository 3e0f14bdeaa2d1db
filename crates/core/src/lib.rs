//! Evolv Core - Loyalty domain types and rules.
//!
//! This crate provides the types and pure rules shared by the loyalty service
//! and the CLI:
//! - `types` - Newtype IDs, order amounts and order statuses
//! - `loyalty` - Points calculator, tier evaluator, ledger and read projections
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no clocks. Callers pass the current time in, which keeps every rule
//! deterministic and testable.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod loyalty;
pub mod types;

pub use loyalty::*;
pub use types::*;
