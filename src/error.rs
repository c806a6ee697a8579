use crate::domain::auth::{AuthMethod, VerifyState};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AtmError {
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Remote write failed at {path}: {reason}")]
    RemoteWriteFailed { path: String, reason: String },
    #[error("Remote read failed at {path}: {reason}")]
    RemoteReadFailed { path: String, reason: String },
    #[error("Account {0} not found")]
    AccountNotFound(String),
    #[error("{method:?} verification failed after {attempts} attempts")]
    VerificationExhausted { method: AuthMethod, attempts: u32 },
    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: u64, available: u64 },
    #[error("Input source closed")]
    InputClosed,
    #[error("Invalid verification transition from {from:?} to {to:?}")]
    InvalidTransition { from: VerifyState, to: VerifyState },
    #[error("Actuator error: {0}")]
    Actuator(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, AtmError>;
