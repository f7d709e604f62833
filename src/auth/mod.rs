//! Authentication module for Reputation Core.
//!
//! Scoring and administration routes are protected by static API keys.

mod api_key;
mod middleware;

pub use api_key::*;
pub use middleware::*;
