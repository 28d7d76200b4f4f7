use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("Malformed record id: {0}")]
    Malformed(String),

    #[error("Invalid type prefix: {0}")]
    InvalidTypePrefix(String),
}
