//! HTTP API layer for Reputation Core.
//!
//! Provides REST endpoints for flag evaluation, scoring and risk assessment.

pub mod handlers;
mod routes;
mod types;

pub use routes::build_router;
