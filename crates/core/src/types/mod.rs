//! Core types for Evolv.
//!
//! This module provides type-safe wrappers for the concepts the loyalty
//! program exchanges with the order system.

pub mod id;
pub mod money;
pub mod order;
pub mod status;

pub use id::*;
pub use money::{AmountError, OrderAmount};
pub use order::{EventKey, OrderEvent};
pub use status::*;
