//! HTTP handlers for the Storefront Backend

pub mod health;
pub mod inventory;

pub use health::*;
pub use inventory::*;
