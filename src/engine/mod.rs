//! Evaluation engine for Reputation Core.
//!
//! This module contains the scoring pipeline:
//! - Rule Evaluator: tests one rule against metadata
//! - Flag Engine: applies flag definitions to metadata
//! - Score Aggregator: combines active flags into P(x)
//! - Risk Assessor: classifies a score against risk triggers
//! - Reputation Coordinator: connects the pipeline to storage

mod coordinator;
mod flags;
mod risk;
mod rule;
mod scoring;

pub use coordinator::*;
pub use flags::*;
pub use risk::*;
pub use rule::*;
pub use scoring::*;
