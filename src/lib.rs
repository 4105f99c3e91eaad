//! querylite: an embeddable query, expression, and aggregation evaluator for
//! JSON-shaped documents held in memory.
//!
//! Queries, expressions, and pipelines are plain `serde_json::Value` data in
//! their structured form; the engine interprets them against documents and
//! never parses a textual query language. Operator behavior is open: the
//! filter, expression, and stage tables accept runtime registration through
//! [`registry`].

pub mod errors;
pub mod expr;
pub mod filter;
pub mod logger;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod value;

pub use errors::EngineError;
pub use expr::{evaluate, expression};
pub use filter::{filter, matches, register_predicate};
pub use path::{get_path, set_path, unset_path};
pub use pipeline::aggregate;
pub use registry::{StageOp, register_expression, register_filter, register_stage};
pub use value::deep_eq;

/// Initializes the logging system.
///
/// This function should be called once by hosts that want engine logs; it is
/// never required for evaluation.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
