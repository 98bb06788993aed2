//! Error types for the wallet engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Network operation {operation} failed after exhausting all options: {last_error}")]
    NetworkExhausted {
        operation: &'static str,
        last_error: String,
    },

    #[error("Invalid state: {0}")]
    StateInvariant(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Shield error: {0}")]
    Shield(String),

    #[error("Key error: {0}")]
    Key(String),
}

/// Failure of a single backend call. The network manager swallows these
/// and fails over; callers only ever see [`WalletError::NetworkExhausted`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("{0} is not supported by this backend")]
    Unsupported(&'static str),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Request(e.to_string())
    }
}

impl From<hex::FromHexError> for WalletError {
    fn from(e: hex::FromHexError) -> Self {
        WalletError::Parse(format!("invalid hex: {}", e))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Parse(format!("invalid json: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
