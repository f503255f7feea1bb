//! Error types and handling for membank

use crate::bank::BankId;

/// Result type alias for membank operations
pub type Result<T> = std::result::Result<T, MemBankError>;

/// Error types for the multi-bank block allocator
#[derive(Debug, thiserror::Error)]
pub enum MemBankError {
    /// Bank index outside the configured set
    #[error("Invalid bank: index {index} is outside the configured set")]
    InvalidBank { index: usize },

    /// Operation attempted before the bank was initialized
    #[error("Bank not ready: {bank:?} has not been initialized")]
    NotReady { bank: BankId },

    /// Invalid parameters or configuration
    #[error("Invalid argument: {parameter} - {message}")]
    InvalidArgument { parameter: String, message: String },

    /// No sufficiently long run of free blocks in the bank
    #[error("Out of memory: no free run of {requested_blocks} blocks in {bank:?}")]
    OutOfMemory { bank: BankId, requested_blocks: usize },
}

impl MemBankError {
    /// Create an invalid bank error
    pub fn invalid_bank(index: usize) -> Self {
        Self::InvalidBank { index }
    }

    /// Create a not-ready error
    pub fn not_ready(bank: BankId) -> Self {
        Self::NotReady { bank }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Create an out-of-memory error
    pub fn out_of_memory(bank: BankId, requested_blocks: usize) -> Self {
        Self::OutOfMemory {
            bank,
            requested_blocks,
        }
    }
}
