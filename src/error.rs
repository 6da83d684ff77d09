use thiserror::Error;

/// Errors produced by the card issuance and ledger engine.
///
/// Every variant carries enough context (entity id/name, offending value)
/// for the caller to render a precise message.
#[derive(Error, Debug)]
pub enum CardError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CardError>;
