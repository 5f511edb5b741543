//! API handlers for the loan broker

pub mod admin;
pub mod application;
pub mod market;
pub mod offer;
pub mod rate_card;

pub use admin::*;
pub use application::*;
pub use market::*;
pub use offer::*;
pub use rate_card::*;
