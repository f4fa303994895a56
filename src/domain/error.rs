use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("amount too low: {amount} < {minimum}")]
    AmountTooLow { amount: i64, minimum: i64 },

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("provider: {0}")]
    Provider(String),

    #[error("webhook signature: {0}")]
    WebhookSignature(String),

    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
