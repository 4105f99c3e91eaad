use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde_json::Value;

use crate::errors::EngineError;

/// A filter operator: `(operand, current value) -> bool`. The current value
/// is `None` when the path the query descended through is absent.
pub type FilterOp =
    Arc<dyn Fn(&Value, Option<&Value>) -> Result<bool, EngineError> + Send + Sync>;

/// An expression operator: `(args, context) -> value`. Arguments arrive
/// un-evaluated so operators control evaluation order (`$cond` is lazy).
pub type ExprOp = Arc<dyn Fn(&[Value], &Value) -> Result<Value, EngineError> + Send + Sync>;

type PerDocFn = Arc<dyn Fn(&Value, &Value) -> Result<Option<Value>, EngineError> + Send + Sync>;
type SequenceFn =
    Arc<dyn Fn(&Value, Vec<Value>) -> Result<Vec<Value>, EngineError> + Send + Sync>;

/// A stage operator together with its dispatch shape.
#[derive(Clone)]
pub enum StageOp {
    /// Mapped over each document independently; `None` drops the document.
    PerDoc(PerDocFn),
    /// Invoked once with the whole current sequence; its return value
    /// replaces the sequence.
    Sequence(SequenceFn),
}

impl StageOp {
    pub fn per_doc<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Option<Value>, EngineError> + Send + Sync + 'static,
    {
        Self::PerDoc(Arc::new(f))
    }

    pub fn sequence<F>(f: F) -> Self
    where
        F: Fn(&Value, Vec<Value>) -> Result<Vec<Value>, EngineError> + Send + Sync + 'static,
    {
        Self::Sequence(Arc::new(f))
    }
}

// The three operator tables are process-wide and consulted on every
// evaluation; registrations take effect immediately, last one wins.
static FILTER_OPS: Lazy<RwLock<HashMap<String, FilterOp>>> =
    Lazy::new(|| RwLock::new(crate::filter::builtin_ops()));
static EXPR_OPS: Lazy<RwLock<HashMap<String, ExprOp>>> =
    Lazy::new(|| RwLock::new(crate::expr::builtin_ops()));
static STAGE_OPS: Lazy<RwLock<HashMap<String, StageOp>>> =
    Lazy::new(|| RwLock::new(crate::pipeline::builtin_stages()));

/// Install or override a filter operator for all subsequent evaluations.
pub fn register_filter<F>(name: &str, op: F)
where
    F: Fn(&Value, Option<&Value>) -> Result<bool, EngineError> + Send + Sync + 'static,
{
    log::info!("registering filter operator {name}");
    FILTER_OPS.write().insert(name.to_string(), Arc::new(op));
}

/// Install or override an expression operator for all subsequent evaluations.
pub fn register_expression<F>(name: &str, op: F)
where
    F: Fn(&[Value], &Value) -> Result<Value, EngineError> + Send + Sync + 'static,
{
    log::info!("registering expression operator {name}");
    EXPR_OPS.write().insert(name.to_string(), Arc::new(op));
}

/// Install or override a stage operator for all subsequent evaluations.
pub fn register_stage(name: &str, op: StageOp) {
    log::info!("registering stage operator {name}");
    STAGE_OPS.write().insert(name.to_string(), op);
}

// Lookups clone the handle out and release the lock before the operator runs,
// so operator bodies may recurse into the engines (and even re-register)
// without holding a guard.
pub(crate) fn filter_op(name: &str) -> Option<FilterOp> {
    FILTER_OPS.read().get(name).cloned()
}

pub(crate) fn expr_op(name: &str) -> Option<ExprOp> {
    EXPR_OPS.read().get(name).cloned()
}

pub(crate) fn stage_op(name: &str) -> Option<StageOp> {
    STAGE_OPS.read().get(name).cloned()
}
