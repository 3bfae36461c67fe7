use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model not found: {0}")]
    ModelNotFound(i64),

    #[error("Forecast precondition failed: {0}")]
    ForecastPrecondition(String),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}
