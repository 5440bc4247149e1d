//! Value types shared by the engine, the link-layer interface and the
//! application.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::errors::SecurityError;

/// Smallest encryption key size the engine negotiates, in bytes.
pub const MIN_KEY_SIZE: u8 = 7;
/// Largest encryption key size, in bytes.
pub const MAX_KEY_SIZE: u8 = 16;
/// Largest value a six-digit passkey can take.
pub const MAX_PASSKEY: u32 = 999_999;

/// Identifier of a link, unique while the link exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u16);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Pairing role of the local device on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Central; sends the pairing request.
    Initiator,
    /// Peripheral; answers the pairing request.
    Responder,
}

impl Role {
    pub fn peer(self) -> Role {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }
}

bitflags! {
    /// Key types a device distributes during pairing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct KeyDistribution: u8 {
        /// LTK with EDIV and Rand
        const ENC_KEY = 1 << 0;
        /// IRK with identity address
        const ID_KEY = 1 << 1;
        /// CSRK
        const SIGN_KEY = 1 << 2;
        /// Derive a BR/EDR link key from the LTK
        const LINK_KEY = 1 << 3;
    }
}

/// Input/output capabilities of the local device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoCapability {
    DisplayOnly,
    DisplayYesNo,
    KeyboardOnly,
    NoInputNoOutput,
    KeyboardDisplay,
}

/// Authentication requirements exchanged at the start of pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRequirements {
    pub bonding: bool,
    /// Man-in-the-middle protection
    pub mitm: bool,
    pub secure_connections: bool,
    pub keypress: bool,
    pub min_key_size: u8,
    pub max_key_size: u8,
}

impl Default for AuthRequirements {
    fn default() -> Self {
        Self {
            bonding: true,
            mitm: false,
            secure_connections: true,
            keypress: false,
            min_key_size: MIN_KEY_SIZE,
            max_key_size: MAX_KEY_SIZE,
        }
    }
}

impl AuthRequirements {
    /// Check the key size range: both ends within 7..=16 and min <= max.
    pub fn validate(&self) -> Result<(), SecurityError> {
        validate_key_sizes(self.min_key_size, self.max_key_size)
    }
}

pub(crate) fn validate_key_sizes(min: u8, max: u8) -> Result<(), SecurityError> {
    let range = MIN_KEY_SIZE..=MAX_KEY_SIZE;
    if !range.contains(&min) || !range.contains(&max) {
        return Err(SecurityError::InvalidParameter(format!(
            "encryption key size must be within {}..={}, got {}..={}",
            MIN_KEY_SIZE, MAX_KEY_SIZE, min, max
        )));
    }
    if min > max {
        return Err(SecurityError::InvalidParameter(format!(
            "minimum key size {} exceeds maximum {}",
            min, max
        )));
    }
    Ok(())
}

/// Parameters a peer offers in its pairing request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingParams {
    pub auth: AuthRequirements,
    pub io_capability: IoCapability,
    pub oob_present: bool,
    /// Keys the initiator will distribute
    pub initiator_keys: KeyDistribution,
    /// Keys the responder will distribute
    pub responder_keys: KeyDistribution,
}

/// Kind of authentication key the link layer asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Passkey,
    OutOfBand,
    None,
}

/// Keypress notification kinds sent by a peer during passkey entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypressKind {
    EntryStarted,
    DigitEntered,
    DigitErased,
    Cleared,
    EntryCompleted,
}

/// LE security mode of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityMode {
    /// Mode 1: encryption based
    Encryption,
    /// Mode 2: data signing
    Signing,
}

/// Security level reached within a security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoSecurity,
    /// Encrypted, keys not authenticated
    Unauthenticated,
    /// Encrypted with MITM-protected keys
    Authenticated,
    /// Encrypted with authenticated LE Secure Connections keys
    AuthenticatedSecureConnections,
}

/// Which device produced a distributed key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    Local,
    Peer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_auth_requirements_are_valid() {
        assert!(AuthRequirements::default().validate().is_ok());
    }

    #[test]
    fn test_key_size_bounds() {
        let mut auth = AuthRequirements::default();

        auth.min_key_size = 6;
        assert!(auth.validate().is_err());

        auth.min_key_size = 7;
        auth.max_key_size = 17;
        assert!(auth.validate().is_err());

        auth.min_key_size = 12;
        auth.max_key_size = 10;
        assert!(matches!(
            auth.validate(),
            Err(SecurityError::InvalidParameter(_))
        ));

        auth.min_key_size = 16;
        auth.max_key_size = 16;
        assert!(auth.validate().is_ok());
    }

    #[test]
    fn test_role_peer() {
        assert_eq!(Role::Initiator.peer(), Role::Responder);
        assert_eq!(Role::Responder.peer(), Role::Initiator);
    }
}
