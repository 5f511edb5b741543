//! Rate card domain module
//!
//! Contains the versioned rate card models and the service that keeps exactly
//! one active version per bank, loan type and currency.

mod model;
mod service;

pub use model::*;
pub use service::RateCardService;
