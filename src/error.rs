use crate::crypto::hash::Hash256;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Blockchain already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("No existing blockchain found at {0}, create one first")]
    NotFound(PathBuf),

    #[error("Corrupt chain: {0}")]
    CorruptChain(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Mining exhausted after {attempts} nonces at difficulty {difficulty}")]
    MiningExhausted { attempts: u64, difficulty: u32 },

    #[error("Mining cancelled at nonce {0}")]
    MiningCancelled(u64),

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Output values locked to {0} overflow a 64-bit amount")]
    ValueOverflow(String),

    #[error("Chain tip moved: expected {expected}, found {found}")]
    TipMismatch { expected: Hash256, found: Hash256 },

    #[error("Invalid difficulty {0}: must be between 1 and 255")]
    InvalidDifficulty(u32),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Encoding(err.to_string())
    }
}
