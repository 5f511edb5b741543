//! Loan broker library
//!
//! Rate cards, offer pricing, offer lifecycle, background expiration and
//! market analysis for a multi-bank loan marketplace.

pub mod amortization;
pub mod application;
pub mod audit;
pub mod bank;
pub mod config;
pub mod db;
pub mod error;
pub mod expiration;
pub mod handlers;
pub mod lifecycle;
pub mod market;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod offer;
pub mod rate_card;
pub mod routes;
pub mod state;
pub mod store;
