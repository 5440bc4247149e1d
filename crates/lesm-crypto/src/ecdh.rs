//! P-256 key agreement for LE Secure Connections.
//!
//! Public keys and the DHKey are exchanged least significant byte first per
//! coordinate; `p256` works on SEC1 big-endian encodings.

use p256::ecdh::EphemeralSecret;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use rand_core::OsRng;

use crate::error::CryptoError;
use crate::keys::{DhKey, PublicKeyShare, PUBLIC_KEY_LEN};

/// An ephemeral P-256 key pair used for one pairing.
pub struct EcdhKeyPair {
    secret: EphemeralSecret,
    public: PublicKeyShare,
}

impl EcdhKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = encode_public_key(&secret.public_key());
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKeyShare {
        &self.public
    }

    /// Compute the DHKey with the peer's public key.
    pub fn diffie_hellman(&self, peer: &PublicKeyShare) -> Result<DhKey, CryptoError> {
        let peer = decode_public_key(peer)?;
        let shared = self.secret.diffie_hellman(&peer);

        let mut dhkey = [0u8; 32];
        dhkey.copy_from_slice(shared.raw_secret_bytes().as_slice());
        dhkey.reverse();
        Ok(DhKey::new(dhkey))
    }
}

fn encode_public_key(key: &PublicKey) -> PublicKeyShare {
    let point = key.to_encoded_point(false);
    let mut out = [0u8; PUBLIC_KEY_LEN];

    // Uncompressed SEC1: 0x04 || X || Y, big-endian.
    let sec1 = point.as_bytes();
    out[..32].copy_from_slice(&sec1[1..33]);
    out[32..].copy_from_slice(&sec1[33..65]);
    out[..32].reverse();
    out[32..].reverse();
    PublicKeyShare::new(out)
}

fn decode_public_key(share: &PublicKeyShare) -> Result<PublicKey, CryptoError> {
    let mut sec1 = [0u8; 1 + PUBLIC_KEY_LEN];
    sec1[0] = 0x04;
    sec1[1..33].copy_from_slice(share.x());
    sec1[33..].copy_from_slice(share.y());
    sec1[1..33].reverse();
    sec1[33..].reverse();

    PublicKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)
}
