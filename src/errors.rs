use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown filter operator: {0}")]
    UnknownFilterOperator(String),

    #[error("unknown stage operator: {0}")]
    UnknownStageOperator(String),

    #[error("unknown $where predicate: {0}")]
    UnknownPredicate(String),

    #[error("bad argument: {0}")]
    BadArgument(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}
