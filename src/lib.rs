//! Rental lifecycle and pricing engine for a car-rental back office.
//!
//! One [`engine::Engine`] owns the fleet: cars with their rentals, the
//! categories that set discounts, and the customers that rent. Every change
//! is a single event, written to the WAL before it touches memory.

pub mod clock;
pub mod config;
pub mod engine;
pub mod late_fee;
pub mod limits;
pub mod model;
pub mod money;
pub mod notify;
pub mod observability;
pub mod pricing;
pub mod wal;
