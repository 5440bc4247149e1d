//! Crypto error types.

use thiserror::Error;

/// Errors raised by the LE security primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("malformed device address: {0}")]
    MalformedAddress(String),

    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("peer public key is not a valid P-256 point")]
    InvalidPublicKey,
}
