//! Device addresses.
//!
//! Addresses are stored least-significant byte first, the order used on the
//! wire and by the controller interface. `Display` and `FromStr` use the
//! conventional most-significant-first `AA:BB:CC:DD:EE:FF` notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Length of a device address in bytes.
pub const ADDR_LEN: usize = 6;

/// Two most significant bits of a resolvable private address.
const RPA_MARKER_MASK: u8 = 0b1100_0000;
const RPA_MARKER: u8 = 0b0100_0000;

/// Identity address type of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    Public,
    RandomStatic,
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressType::Public => write!(f, "public"),
            AddressType::RandomStatic => write!(f, "random-static"),
        }
    }
}

/// A 48-bit device address, least significant byte first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BdAddr([u8; ADDR_LEN]);

impl BdAddr {
    /// Wrap raw little-endian address bytes.
    pub const fn new(raw: [u8; ADDR_LEN]) -> Self {
        Self(raw)
    }

    /// Join a 24-bit hash and a 24-bit prand into an address (`prand || hash`,
    /// with the hash in the least significant half).
    pub fn from_parts(hash: [u8; 3], prand: [u8; 3]) -> Self {
        let mut raw = [0u8; ADDR_LEN];
        raw[..3].copy_from_slice(&hash);
        raw[3..].copy_from_slice(&prand);
        Self(raw)
    }

    pub const fn raw(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }

    /// The least significant 24 bits (the hash of a resolvable private address).
    pub fn hash_part(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// The most significant 24 bits (the prand of a resolvable private address).
    pub fn prand_part(&self) -> [u8; 3] {
        [self.0[3], self.0[4], self.0[5]]
    }

    /// Whether the two most significant bits mark a resolvable private address.
    pub fn is_resolvable_private(&self) -> bool {
        self.0[5] & RPA_MARKER_MASK == RPA_MARKER
    }
}

/// Force the resolvable-private marker (`0b01`) into the top bits of a prand.
pub(crate) fn mark_resolvable(prand: &mut [u8; 3]) {
    prand[2] = (prand[2] & !RPA_MARKER_MASK) | RPA_MARKER;
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[5], b[4], b[3], b[2], b[1], b[0]
        )
    }
}

impl fmt::Debug for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BdAddr({})", self)
    }
}

impl FromStr for BdAddr {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != ADDR_LEN {
            return Err(CryptoError::MalformedAddress(s.to_string()));
        }

        let mut raw = [0u8; ADDR_LEN];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 || !part.bytes().all(|c| c.is_ascii_hexdigit()) {
                return Err(CryptoError::MalformedAddress(s.to_string()));
            }
            raw[ADDR_LEN - 1 - i] = u8::from_str_radix(part, 16)
                .map_err(|_| CryptoError::MalformedAddress(s.to_string()))?;
        }
        Ok(Self(raw))
    }
}

impl TryFrom<String> for BdAddr {
    type Error = CryptoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BdAddr> for String {
    fn from(addr: BdAddr) -> Self {
        addr.to_string()
    }
}

impl From<[u8; ADDR_LEN]> for BdAddr {
    fn from(raw: [u8; ADDR_LEN]) -> Self {
        Self(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_msb_first() {
        let addr = BdAddr::new([0x92, 0xF2, 0x8F, 0x84, 0x72, 0x4F]);
        assert_eq!(addr.to_string(), "4F:72:84:8F:F2:92");
    }

    #[test]
    fn test_parse_round_trips_display() {
        let addr: BdAddr = "4F:72:84:8F:F2:92".parse().unwrap();
        assert_eq!(addr.raw(), &[0x92, 0xF2, 0x8F, 0x84, 0x72, 0x4F]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("4F:72:84".parse::<BdAddr>().is_err());
        assert!("4F:72:84:8F:F2:ZZ".parse::<BdAddr>().is_err());
        assert!("4F:72:84:8F:F2:920".parse::<BdAddr>().is_err());
    }

    #[test]
    fn test_parts_split() {
        let addr = BdAddr::new([0x92, 0xF2, 0x8F, 0x84, 0x72, 0x4F]);
        assert_eq!(addr.hash_part(), [0x92, 0xF2, 0x8F]);
        assert_eq!(addr.prand_part(), [0x84, 0x72, 0x4F]);
        assert!(addr.is_resolvable_private());
        assert_eq!(BdAddr::from_parts(addr.hash_part(), addr.prand_part()), addr);
    }

    #[test]
    fn test_mark_resolvable() {
        let mut prand = [0xFF, 0xFF, 0xFF];
        mark_resolvable(&mut prand);
        assert_eq!(prand, [0xFF, 0xFF, 0x7F]);

        let mut prand = [0x00, 0x00, 0x00];
        mark_resolvable(&mut prand);
        assert_eq!(prand, [0x00, 0x00, 0x40]);
    }
}
