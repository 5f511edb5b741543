//! Middleware for the loan broker API

mod tracing;

pub use tracing::request_tracing;
