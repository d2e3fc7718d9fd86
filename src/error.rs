use thiserror::Error;

use crate::ledger::Domain;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Not in a dayledger project. Run 'dayledger init' first.")]
    NotInitialized,

    #[error("Already initialized. Remove .dayledger/ to reinitialize.")]
    AlreadyInitialized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Domain '{domain}' does not own tag '{tag}'")]
    OwnershipViolation { domain: Domain, tag: String },

    #[error("Document {collection}/{key} changed since it was read")]
    StaleWrite { collection: String, key: String },

    #[error("Gave up on {collection}/{key} after {attempts} conflicting attempts, retry the save")]
    ConflictRetry {
        collection: String,
        key: String,
        attempts: u32,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Loro error: {0}")]
    Loro(#[from] loro::LoroError),

    #[error("Loro encode error: {0}")]
    LoroEncode(#[from] loro::LoroEncodeError),
}

impl LedgerError {
    /// Whether resubmitting the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::WriteFailure(_)
                | LedgerError::StaleWrite { .. }
                | LedgerError::ConflictRetry { .. }
                | LedgerError::Storage(_)
                | LedgerError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
