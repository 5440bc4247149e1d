//! Interface to the link-layer security stack.
//!
//! Commands are fire-and-forget: a successful return only means the stack
//! accepted the command. Results arrive later as `LinkEvent`s correlated by
//! connection.

use std::time::Duration;

use lesm_crypto::ecdh::EcdhKeyPair;
use lesm_crypto::{DhKey, EncryptionInfo, Irk, PublicKeyShare};
use thiserror::Error;

use crate::errors::FailureReason;
use crate::keydist::KeySet;
use crate::types::{AuthRequirements, ConnId, IoCapability};

/// Synchronous command rejection by the link layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StackError {
    #[error("link layer busy")]
    Busy,

    #[error("link layer rejected command in current state: {0}")]
    InvalidState(String),

    #[error("link layer failure: {0}")]
    Failure(String),
}

/// Answer to a pairing parameters request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamsReply {
    Accept,
    Reject(FailureReason),
}

/// Answer to an authentication key request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthKeyReply {
    /// Six-digit passkey typed by the user
    Passkey(u32),
    /// 128-bit legacy OOB temporary key, least significant byte first
    OutOfBand([u8; 16]),
    /// Numeric comparison confirmed or refused
    NumericComparison(bool),
    /// Abort the pairing
    Reject,
}

/// Outbound commands to the link layer.
pub trait LinkLayer {
    /// Start pairing as initiator.
    fn authenticate(&mut self, conn: ConnId, auth: &AuthRequirements) -> Result<(), StackError>;

    fn reply_security_params(
        &mut self,
        conn: ConnId,
        reply: ParamsReply,
        auth: Option<&AuthRequirements>,
        keys: Option<&KeySet>,
    ) -> Result<(), StackError>;

    fn reply_auth_key(&mut self, conn: ConnId, reply: AuthKeyReply) -> Result<(), StackError>;

    /// Answer an LTK request; `None` means no key is known.
    fn reply_ltk(&mut self, conn: ConnId, ltk: Option<&EncryptionInfo>) -> Result<(), StackError>;

    /// Hand the local public key and computed DHKey back to the stack. `None`
    /// for the DHKey aborts secure-connections pairing.
    fn reply_key_agreement(
        &mut self,
        conn: ConnId,
        own_public_key: &PublicKeyShare,
        dhkey: Option<&DhKey>,
    ) -> Result<(), StackError>;

    /// Local input/output capabilities advertised in pairing exchanges.
    fn set_io_capability(&mut self, io_capability: IoCapability) -> Result<(), StackError>;

    /// Install the local IRK used for address generation and resolution.
    fn set_irk(&mut self, irk: &Irk) -> Result<(), StackError>;

    fn set_private_address_timeout(&mut self, timeout: Duration) -> Result<(), StackError>;

    /// Fixed passkey to display instead of a random one; `None` restores
    /// random passkeys.
    fn set_display_passkey(&mut self, passkey: Option<u32>) -> Result<(), StackError>;
}

// ============================================================================
// Key Agreement
// ============================================================================

/// Error from a key agreement collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("key agreement failed: {0}")]
pub struct KeyAgreementError(pub String);

/// Secure-connections key agreement.
pub trait KeyAgreement {
    /// Produce the local public key and the DHKey for `peer`.
    fn agree(&mut self, peer: &PublicKeyShare) -> Result<(PublicKeyShare, DhKey), KeyAgreementError>;
}

/// P-256 ECDH with a fresh key pair per pairing.
#[derive(Debug, Default)]
pub struct P256KeyAgreement;

impl KeyAgreement for P256KeyAgreement {
    fn agree(&mut self, peer: &PublicKeyShare) -> Result<(PublicKeyShare, DhKey), KeyAgreementError> {
        let pair = EcdhKeyPair::generate();
        let dhkey = pair
            .diffie_hellman(peer)
            .map_err(|e| KeyAgreementError(e.to_string()))?;
        Ok((pair.public_key().clone(), dhkey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_p256_agreement_matches_peer() {
        let peer = EcdhKeyPair::generate();
        let mut agreement = P256KeyAgreement;

        let (own_public, dhkey) = agreement.agree(peer.public_key()).unwrap();
        assert_eq!(peer.diffie_hellman(&own_public).unwrap(), dhkey);
    }

    #[test]
    fn test_p256_agreement_rejects_invalid_point() {
        let mut agreement = P256KeyAgreement;
        let err = agreement.agree(&PublicKeyShare::new([0xFF; 64])).unwrap_err();
        assert!(err.to_string().contains("P-256"));
    }
}
