//! LE security primitives.
//!
//! - Random address hash function `ah` and resolvable private address
//!   generation/resolution
//! - Device addresses and identity address types
//! - Key material exchanged during pairing (LTK, IRK, CSRK)
//! - P-256 key agreement for LE Secure Connections
//! - Constant-time comparison helpers

#![forbid(unsafe_code)]

pub mod address;
pub mod ah;
pub mod ecdh;
pub mod error;
pub mod keys;
pub mod utils;

#[cfg(test)]
mod proptests;

pub use address::{AddressType, BdAddr};
pub use error::CryptoError;
pub use keys::{Csrk, DhKey, EncryptionInfo, IdentityInfo, Irk, Ltk, PublicKeyShare, SigningInfo};
