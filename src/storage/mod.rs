//! Storage layer for Reputation Core.
//!
//! Provides database access via SQLx with SQLite.

mod models;
mod repository;

pub use repository::ReputationRepository;
