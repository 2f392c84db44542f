//! Rego policy-based readiness.
//!
//! The ready condition serializes a system's state to JSON, feeds it as
//! `input` to a Rego policy and expects the configured query to bind a
//! single boolean. Evaluator failures, missing results and non-boolean
//! bindings are errors, never "not ready".

mod parser;
mod ready;

pub use parser::RegoReadyParser;
pub use ready::RegoReady;

/// Ready-section kind this plugin registers under.
pub const READY_KIND: &str = "rego";

/// Registers the rego ready parser with the havoc registry. Called once
/// during program bootstrap.
pub fn register() {
    havoc_core::register_ready_parser(READY_KIND, RegoReadyParser);
}
