use thiserror::Error;

/// Main error type for Ecograph
#[derive(Error, Debug)]
pub enum EcographError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Product not found in the store
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Parse errors (payloads, stored JSON columns)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for EcographError {
    fn from(err: serde_json::Error) -> Self {
        EcographError::Parse(err.to_string())
    }
}

/// Convenient Result type using EcographError
pub type Result<T> = std::result::Result<T, EcographError>;
