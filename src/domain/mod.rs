//! Domain types for Reputation Core.
//!
//! This module contains the core business entities and value objects.

mod flag;
mod risk;
mod score;
mod value;

pub use flag::*;
pub use risk::*;
pub use score::*;
pub use value::*;
