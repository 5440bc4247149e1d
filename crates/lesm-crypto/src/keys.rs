//! Key material exchanged during pairing.
//!
//! All keys are kept least-significant byte first, as carried by the link
//! layer. Secret keys are zeroized on drop, compare in constant time and never
//! print their contents.

use std::fmt;

use rand_core::{OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::address::{AddressType, BdAddr};
use crate::error::CryptoError;
use crate::utils::constant_time_compare_array;

/// Length of LTK / IRK / CSRK values.
pub const KEY_LEN: usize = 16;

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
        pub struct $name([u8; KEY_LEN]);

        impl $name {
            /// Wrap key bytes, least significant byte first.
            pub const fn from_le_bytes(bytes: [u8; KEY_LEN]) -> Self {
                Self(bytes)
            }

            /// Parse a key from a byte slice, least significant byte first.
            pub fn from_le_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
                let arr: [u8; KEY_LEN] =
                    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                        expected: KEY_LEN,
                        got: bytes.len(),
                    })?;
                Ok(Self(arr))
            }

            /// Build a key from its most-significant-first representation, the
            /// order test vectors and printed keys use.
            pub fn from_be_bytes(mut bytes: [u8; KEY_LEN]) -> Self {
                bytes.reverse();
                Self(bytes)
            }

            /// Generate a key from the OS random number generator.
            pub fn random() -> Self {
                let mut bytes = [0u8; KEY_LEN];
                OsRng.fill_bytes(&mut bytes);
                Self(bytes)
            }

            pub fn as_le_bytes(&self) -> &[u8; KEY_LEN] {
                &self.0
            }

            /// Whether every byte is zero (an unpopulated key buffer).
            pub fn is_zero(&self) -> bool {
                constant_time_compare_array(&self.0, &[0u8; KEY_LEN])
            }
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                constant_time_compare_array(&self.0, &other.0)
            }
        }

        impl Eq for $name {}

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "(..)"))
            }
        }
    };
}

secret_key!(
    /// Long Term Key.
    Ltk
);

secret_key!(
    /// Identity Resolving Key.
    Irk
);

secret_key!(
    /// Connection Signature Resolving Key.
    Csrk
);

/// Long-term key plus the diversifier material used to look it up again.
#[derive(Clone, Default, PartialEq, Eq, Debug, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionInfo {
    pub ltk: Ltk,
    /// Encrypted diversifier.
    pub ediv: u16,
    /// Random number paired with `ediv`.
    pub rand: [u8; 8],
    /// Negotiated encryption key size in bytes.
    pub key_size: u8,
}

/// Identity resolving key and the identity address it belongs to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IdentityInfo {
    pub irk: Irk,
    pub address_type: AddressType,
    pub address: BdAddr,
}

impl Default for IdentityInfo {
    fn default() -> Self {
        Self {
            irk: Irk::default(),
            address_type: AddressType::Public,
            address: BdAddr::default(),
        }
    }
}

/// Connection signature key.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct SigningInfo {
    pub csrk: Csrk,
}

/// Length of an uncompressed P-256 public key (X || Y).
pub const PUBLIC_KEY_LEN: usize = 64;

/// P-256 public key share, X then Y, each coordinate least significant byte
/// first.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKeyShare([u8; PUBLIC_KEY_LEN]);

impl PublicKeyShare {
    pub const fn new(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn x(&self) -> &[u8] {
        &self.0[..32]
    }

    pub fn y(&self) -> &[u8] {
        &self.0[32..]
    }
}

impl fmt::Debug for PublicKeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyShare(x[31]={:02x}..)", self.0[31])
    }
}

/// Diffie-Hellman shared secret, least significant byte first.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DhKey([u8; 32]);

impl DhKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_le_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl PartialEq for DhKey {
    fn eq(&self, other: &Self) -> bool {
        constant_time_compare_array(&self.0, &other.0)
    }
}

impl Eq for DhKey {}

impl fmt::Debug for DhKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DhKey(..)")
    }
}
