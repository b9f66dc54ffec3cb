use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuoteError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Session context error: {0}")]
    Context(String),

    #[error("Adapter call failed: {0}")]
    Adapter(String),

    /// The pricing provider answered but no entry qualified. Carries the
    /// aggregated business diagnostics, in encounter order.
    #[error("No qualifying offer: {0}")]
    NoQualifyingOffer(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, QuoteError>;
