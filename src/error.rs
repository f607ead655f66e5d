use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnchorError {
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data-carrier field {index} is {len} bytes (maximum 255)")]
    FieldTooLarge { index: usize, len: usize },

    #[error("Invalid script: {0}")]
    InvalidScript(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Network mismatch: {0}")]
    NetworkMismatch(String),

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Explorer lookup failed: {0}")]
    Lookup(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnchorError>;
