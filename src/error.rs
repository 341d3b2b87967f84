//! Error types for BellDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BellError
pub type Result<T> = std::result::Result<T, BellError>;

/// Unified error type for BellDB operations
#[derive(Debug, Error)]
pub enum BellError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    /// An append or fsync on the log failed; the mutation is not durable.
    #[error("WAL write failed: {0}")]
    WalWrite(#[source] std::io::Error),

    /// A WAL or checkpoint frame that does not decode.
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Invalid operation code: {0}")]
    InvalidOperation(u8),

    #[error("Invalid transaction status: {0}")]
    InvalidStatus(u8),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    /// SSTable bytes that violate the on-disk format.
    #[error("Corruption: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<bincode::Error> for BellError {
    fn from(e: bincode::Error) -> Self {
        BellError::Serialization(e.to_string())
    }
}
