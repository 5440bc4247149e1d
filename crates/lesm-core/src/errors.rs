//! Error types for the security engine.
//!
//! `SecurityError` is returned synchronously by every public operation.
//! `FailureReason` describes why a pairing attempt failed, as reported by the
//! link layer, and is what the application receives in `Outcome::PairingError`.

use std::fmt;

use thiserror::Error;

use crate::stack::StackError;

// ============================================================================
// Error Taxonomy
// ============================================================================

/// Coarse error category shared by local errors and pairing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidParameter,
    InvalidState,
    NotFound,
    CapacityExceeded,
    Unsupported,
    StackBusy,
    StackFailure,
}

/// Unified error type for engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// Malformed input to a public operation
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not permitted in the current module or connection state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Lookup failed
    #[error("not found: {0}")]
    NotFound(String),

    /// Pool or list is full
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// Feature not available on this build or stack
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The link layer is transiently overloaded; the caller may retry
    #[error("link layer busy")]
    StackBusy,

    /// Unrecoverable link layer error
    #[error("link layer failure: {0}")]
    StackFailure(String),
}

impl SecurityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecurityError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            SecurityError::InvalidState(_) => ErrorKind::InvalidState,
            SecurityError::NotFound(_) => ErrorKind::NotFound,
            SecurityError::CapacityExceeded(_) => ErrorKind::CapacityExceeded,
            SecurityError::Unsupported(_) => ErrorKind::Unsupported,
            SecurityError::StackBusy => ErrorKind::StackBusy,
            SecurityError::StackFailure(_) => ErrorKind::StackFailure,
        }
    }
}

impl From<StackError> for SecurityError {
    fn from(e: StackError) -> Self {
        match e {
            StackError::Busy => SecurityError::StackBusy,
            StackError::InvalidState(s) => SecurityError::InvalidState(s),
            StackError::Failure(s) => SecurityError::StackFailure(s),
        }
    }
}

impl From<lesm_crypto::CryptoError> for SecurityError {
    fn from(e: lesm_crypto::CryptoError) -> Self {
        SecurityError::InvalidParameter(e.to_string())
    }
}

// ============================================================================
// Pairing Failure Reasons
// ============================================================================

/// Why a pairing attempt failed.
///
/// Values mirror the Pairing Failed reason codes of the Security Manager
/// Protocol; anything the engine does not recognise maps to `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    PasskeyEntryFailed,
    OobNotAvailable,
    AuthenticationRequirements,
    ConfirmValueFailed,
    PairingNotSupported,
    EncryptionKeySize,
    CommandNotSupported,
    Unspecified,
    RepeatedAttempts,
    InvalidParameters,
    DhKeyCheckFailed,
    NumericComparisonFailed,
    KeyRejected,
}

impl FailureReason {
    /// Map a raw failure code reported by the link layer.
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => FailureReason::PasskeyEntryFailed,
            0x02 => FailureReason::OobNotAvailable,
            0x03 => FailureReason::AuthenticationRequirements,
            0x04 => FailureReason::ConfirmValueFailed,
            0x05 => FailureReason::PairingNotSupported,
            0x06 => FailureReason::EncryptionKeySize,
            0x07 => FailureReason::CommandNotSupported,
            0x09 => FailureReason::RepeatedAttempts,
            0x0A => FailureReason::InvalidParameters,
            0x0B => FailureReason::DhKeyCheckFailed,
            0x0C => FailureReason::NumericComparisonFailed,
            0x0F => FailureReason::KeyRejected,
            _ => FailureReason::Unspecified,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            FailureReason::PasskeyEntryFailed => 0x01,
            FailureReason::OobNotAvailable => 0x02,
            FailureReason::AuthenticationRequirements => 0x03,
            FailureReason::ConfirmValueFailed => 0x04,
            FailureReason::PairingNotSupported => 0x05,
            FailureReason::EncryptionKeySize => 0x06,
            FailureReason::CommandNotSupported => 0x07,
            FailureReason::Unspecified => 0x08,
            FailureReason::RepeatedAttempts => 0x09,
            FailureReason::InvalidParameters => 0x0A,
            FailureReason::DhKeyCheckFailed => 0x0B,
            FailureReason::NumericComparisonFailed => 0x0C,
            FailureReason::KeyRejected => 0x0F,
        }
    }

    /// Category of this failure in the engine's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FailureReason::InvalidParameters | FailureReason::EncryptionKeySize => {
                ErrorKind::InvalidParameter
            }
            FailureReason::OobNotAvailable
            | FailureReason::PairingNotSupported
            | FailureReason::CommandNotSupported
            | FailureReason::AuthenticationRequirements => ErrorKind::Unsupported,
            FailureReason::RepeatedAttempts => ErrorKind::StackBusy,
            FailureReason::PasskeyEntryFailed
            | FailureReason::ConfirmValueFailed
            | FailureReason::DhKeyCheckFailed
            | FailureReason::NumericComparisonFailed
            | FailureReason::KeyRejected
            | FailureReason::Unspecified => ErrorKind::StackFailure,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::PasskeyEntryFailed => "passkey entry failed",
            FailureReason::OobNotAvailable => "OOB data not available",
            FailureReason::AuthenticationRequirements => "authentication requirements not met",
            FailureReason::ConfirmValueFailed => "confirm value failed",
            FailureReason::PairingNotSupported => "pairing not supported",
            FailureReason::EncryptionKeySize => "encryption key size too short",
            FailureReason::CommandNotSupported => "command not supported",
            FailureReason::Unspecified => "unspecified reason",
            FailureReason::RepeatedAttempts => "repeated attempts",
            FailureReason::InvalidParameters => "invalid parameters",
            FailureReason::DhKeyCheckFailed => "DHKey check failed",
            FailureReason::NumericComparisonFailed => "numeric comparison failed",
            FailureReason::KeyRejected => "key rejected",
        };
        write!(f, "{} (0x{:02x})", text, self.code())
    }
}

impl From<&SecurityError> for FailureReason {
    /// Failure reported upward when a local error aborts a session.
    fn from(e: &SecurityError) -> Self {
        match e {
            SecurityError::InvalidParameter(_) => FailureReason::InvalidParameters,
            SecurityError::Unsupported(_) => FailureReason::PairingNotSupported,
            _ => FailureReason::Unspecified,
        }
    }
}
