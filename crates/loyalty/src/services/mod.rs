//! Business logic services for the loyalty program.
//!
//! # Services
//!
//! - `loyalty` - Order-event trigger, enrollment, redemption and read models
//! - `locks` - Per-customer mutexes serializing mutations within the process

pub mod locks;
pub mod loyalty;

pub use locks::{CustomerLockGuard, CustomerLocks};
pub use loyalty::{
    HistoryQuery, LoyaltyError, LoyaltyService, LoyaltySettings, TriggerOutcome,
};
