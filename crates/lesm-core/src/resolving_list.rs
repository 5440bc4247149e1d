//! Resolving list: known peer identities used to recognise resolvable
//! private addresses.

use lesm_crypto::ah;
use lesm_crypto::{AddressType, BdAddr, Irk};
use tracing::debug;

use crate::errors::SecurityError;

/// One known peer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvingListEntry {
    pub peer_identity_address_type: AddressType,
    pub peer_identity_address: BdAddr,
    pub peer_irk: Irk,
}

/// Capacity-bounded list of peer identities.
///
/// Entries keep insertion order; removal compacts the remainder in place.
#[derive(Debug)]
pub struct ResolvingList {
    entries: Vec<ResolvingListEntry>,
    capacity: u8,
}

impl ResolvingList {
    pub fn new(capacity: u8) -> Self {
        Self {
            entries: Vec::with_capacity(capacity as usize),
            capacity,
        }
    }

    pub fn capacity(&self) -> u8 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ResolvingListEntry] {
        &self.entries
    }

    /// Append an identity. Fails when the list is full.
    pub fn add(
        &mut self,
        address_type: AddressType,
        address: BdAddr,
        irk: Irk,
    ) -> Result<(), SecurityError> {
        if self.entries.len() >= self.capacity as usize {
            return Err(SecurityError::CapacityExceeded(format!(
                "resolving list holds {} entries",
                self.capacity
            )));
        }

        debug!(%address, %address_type, "adding resolving list entry");
        self.entries.push(ResolvingListEntry {
            peer_identity_address_type: address_type,
            peer_identity_address: address,
            peer_irk: irk,
        });
        Ok(())
    }

    /// Remove the first entry with this identity.
    pub fn remove(&mut self, address_type: AddressType, address: &BdAddr) -> Result<(), SecurityError> {
        let index = self
            .entries
            .iter()
            .position(|e| {
                e.peer_identity_address_type == address_type && e.peer_identity_address == *address
            })
            .ok_or_else(|| {
                SecurityError::NotFound(format!("resolving list entry {} ({})", address, address_type))
            })?;

        // Vec::remove shifts the tail down, keeping the remaining order.
        self.entries.remove(index);
        debug!(%address, %address_type, "removed resolving list entry");
        Ok(())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Find the first entry whose IRK resolves `observed`.
    pub fn find_match(&self, observed: &BdAddr) -> Option<&ResolvingListEntry> {
        self.entries
            .iter()
            .find(|e| ah::resolve(observed, &e.peer_irk))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> BdAddr {
        BdAddr::new([n, 0x11, 0x22, 0x33, 0x44, 0xC0])
    }

    fn irk(n: u8) -> Irk {
        Irk::from_le_bytes([n; 16])
    }

    #[test]
    fn test_add_up_to_capacity() {
        let mut list = ResolvingList::new(3);
        for n in 1..=3 {
            list.add(AddressType::Public, addr(n), irk(n)).unwrap();
        }
        assert_eq!(list.len(), 3);

        let err = list.add(AddressType::Public, addr(4), irk(4)).unwrap_err();
        assert!(matches!(err, SecurityError::CapacityExceeded(_)));
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut list = ResolvingList::new(4);
        for n in 1..=3 {
            list.add(AddressType::RandomStatic, addr(n), irk(n)).unwrap();
        }

        list.remove(AddressType::RandomStatic, &addr(2)).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list.entries()[0].peer_identity_address, addr(1));
        assert_eq!(list.entries()[1].peer_identity_address, addr(3));
    }

    #[test]
    fn test_remove_requires_matching_type() {
        let mut list = ResolvingList::new(2);
        list.add(AddressType::Public, addr(1), irk(1)).unwrap();

        let err = list.remove(AddressType::RandomStatic, &addr(1)).unwrap_err();
        assert!(matches!(err, SecurityError::NotFound(_)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut list = ResolvingList::new(2);
        list.add(AddressType::Public, addr(1), irk(1)).unwrap();
        list.clear();
        assert!(list.is_empty());
        list.add(AddressType::Public, addr(2), irk(2)).unwrap();
        list.add(AddressType::Public, addr(3), irk(3)).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_find_match_picks_owner() {
        let mut list = ResolvingList::new(3);
        for n in 1..=3 {
            list.add(AddressType::Public, addr(n), irk(n)).unwrap();
        }

        let rpa = ah::generate(&irk(3));
        let entry = list.find_match(&rpa).expect("entry 3 should resolve");
        assert_eq!(entry.peer_identity_address, addr(3));

        list.remove(AddressType::Public, &addr(3)).unwrap();
        assert!(list.find_match(&rpa).is_none());
    }
}
