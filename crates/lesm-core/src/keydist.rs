//! Key distribution assembly.
//!
//! Builds the key buffers a session offers and accepts, based on the
//! negotiated distribution flags. Only flagged slots exist; unflagged slots are
//! `None` so the link layer neither fills nor transmits them.

use lesm_crypto::{EncryptionInfo, IdentityInfo, SigningInfo};
use tracing::debug;

use crate::session::PairingSession;
use crate::types::{KeyDistribution, Role};

/// Key buffers for one side of a pairing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySlots {
    pub enc: Option<EncryptionInfo>,
    pub id: Option<IdentityInfo>,
    pub sign: Option<SigningInfo>,
}

impl KeySlots {
    /// Empty buffers for every key type in `flags`.
    pub fn for_flags(flags: KeyDistribution) -> Self {
        Self {
            enc: flags
                .contains(KeyDistribution::ENC_KEY)
                .then(EncryptionInfo::default),
            id: flags
                .contains(KeyDistribution::ID_KEY)
                .then(IdentityInfo::default),
            sign: flags
                .contains(KeyDistribution::SIGN_KEY)
                .then(SigningInfo::default),
        }
    }

    /// Flags matching the slots that exist.
    pub fn flags(&self) -> KeyDistribution {
        let mut flags = KeyDistribution::empty();
        flags.set(KeyDistribution::ENC_KEY, self.enc.is_some());
        flags.set(KeyDistribution::ID_KEY, self.id.is_some());
        flags.set(KeyDistribution::SIGN_KEY, self.sign.is_some());
        flags
    }

    /// Store a key into its slot. Returns `false` when the slot was never
    /// assembled, in which case the key is dropped.
    pub fn store(&mut self, key: DistributedKey) -> bool {
        match key {
            DistributedKey::Encryption(info) => fill(&mut self.enc, info),
            DistributedKey::Identity(info) => fill(&mut self.id, info),
            DistributedKey::Signing(info) => fill(&mut self.sign, info),
        }
    }
}

fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    match slot {
        Some(existing) => {
            *existing = value;
            true
        }
        None => false,
    }
}

/// A key reported by the link layer during key distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributedKey {
    Encryption(EncryptionInfo),
    Identity(IdentityInfo),
    Signing(SigningInfo),
}

impl DistributedKey {
    pub fn flag(&self) -> KeyDistribution {
        match self {
            DistributedKey::Encryption(_) => KeyDistribution::ENC_KEY,
            DistributedKey::Identity(_) => KeyDistribution::ID_KEY,
            DistributedKey::Signing(_) => KeyDistribution::SIGN_KEY,
        }
    }
}

/// Key buffers handed to the link layer, split by who distributes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    /// Keys the local device distributes
    pub own: KeySlots,
    /// Keys the peer distributes
    pub peer: KeySlots,
}

impl KeySet {
    pub fn is_empty(&self) -> bool {
        self.own.flags().is_empty() && self.peer.flags().is_empty()
    }
}

/// Options that shape assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions<'a> {
    /// Keep CSRK distribution instead of forcing it off.
    pub allow_signing: bool,
    /// Local identity to pre-fill into the own identity slot.
    pub local_identity: Option<&'a IdentityInfo>,
}

/// Flags the engine never lets through unless explicitly allowed.
pub fn mask_flags(flags: KeyDistribution, allow_signing: bool) -> KeyDistribution {
    let mut masked = flags - KeyDistribution::LINK_KEY;
    if !allow_signing {
        masked -= KeyDistribution::SIGN_KEY;
    }
    masked
}

/// Assemble key buffers for `session` from the negotiated flags.
///
/// Signing and link-key derivation are forced off before assembly (signing
/// can be re-enabled through `AssembleOptions::allow_signing`). The masked
/// flags are recorded on the session as the negotiated distribution.
pub fn assemble(
    session: &mut PairingSession,
    initiator_flags: KeyDistribution,
    responder_flags: KeyDistribution,
    options: &AssembleOptions<'_>,
) -> KeySet {
    let initiator_flags = mask_flags(initiator_flags, options.allow_signing);
    let responder_flags = mask_flags(responder_flags, options.allow_signing);

    let mut initiator = KeySlots::for_flags(initiator_flags);
    let mut responder = KeySlots::for_flags(responder_flags);

    let own = match session.role() {
        Role::Initiator => &mut initiator,
        Role::Responder => &mut responder,
    };
    if let (Some(slot), Some(identity)) = (own.id.as_mut(), options.local_identity) {
        *slot = identity.clone();
    }

    debug!(
        conn = %session.conn(),
        role = ?session.role(),
        initiator = ?initiator_flags,
        responder = ?responder_flags,
        "assembled key distribution"
    );

    session.set_negotiated(initiator_flags, responder_flags, initiator, responder);
    KeySet {
        own: session.own_slots().clone(),
        peer: session.peer_slots().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnId;
    use lesm_crypto::{AddressType, BdAddr, Irk};

    fn all() -> KeyDistribution {
        KeyDistribution::all()
    }

    #[test]
    fn test_signing_and_link_forced_off() {
        let mut session = PairingSession::new(ConnId(1), Role::Responder);
        let set = assemble(&mut session, all(), all(), &AssembleOptions::default());

        assert!(set.own.sign.is_none());
        assert!(set.peer.sign.is_none());
        assert_eq!(
            session.negotiated(),
            Some((
                KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
                KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY
            ))
        );
    }

    #[test]
    fn test_signing_can_be_lifted() {
        let mut session = PairingSession::new(ConnId(1), Role::Initiator);
        let options = AssembleOptions {
            allow_signing: true,
            local_identity: None,
        };
        let set = assemble(
            &mut session,
            KeyDistribution::SIGN_KEY,
            KeyDistribution::SIGN_KEY | KeyDistribution::LINK_KEY,
            &options,
        );

        assert!(set.own.sign.is_some());
        assert!(set.peer.sign.is_some());
        assert_eq!(session.negotiated().map(|(_, r)| r), Some(KeyDistribution::SIGN_KEY));
    }

    #[test]
    fn test_unflagged_slots_are_absent() {
        let mut session = PairingSession::new(ConnId(7), Role::Responder);
        let set = assemble(
            &mut session,
            KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
            KeyDistribution::ENC_KEY,
            &AssembleOptions::default(),
        );

        // Responder: own = responder flags, peer = initiator flags.
        assert!(set.own.enc.is_some());
        assert!(set.own.id.is_none());
        assert!(set.peer.enc.is_some());
        assert!(set.peer.id.is_some());
    }

    #[test]
    fn test_role_decides_own_side() {
        let mut session = PairingSession::new(ConnId(2), Role::Initiator);
        let set = assemble(
            &mut session,
            KeyDistribution::ID_KEY,
            KeyDistribution::ENC_KEY,
            &AssembleOptions::default(),
        );

        assert_eq!(set.own.flags(), KeyDistribution::ID_KEY);
        assert_eq!(set.peer.flags(), KeyDistribution::ENC_KEY);
    }

    #[test]
    fn test_local_identity_prefilled() {
        let identity = IdentityInfo {
            irk: Irk::from_le_bytes([9; 16]),
            address_type: AddressType::RandomStatic,
            address: BdAddr::new([1, 2, 3, 4, 5, 0xC6]),
        };
        let mut session = PairingSession::new(ConnId(3), Role::Responder);
        let options = AssembleOptions {
            allow_signing: false,
            local_identity: Some(&identity),
        };
        let set = assemble(&mut session, KeyDistribution::ID_KEY, KeyDistribution::ID_KEY, &options);

        assert_eq!(set.own.id.as_ref(), Some(&identity));
        assert_eq!(set.peer.id, Some(IdentityInfo::default()));
    }

    #[test]
    fn test_store_into_missing_slot_is_dropped() {
        let mut slots = KeySlots::for_flags(KeyDistribution::ENC_KEY);
        assert!(!slots.store(DistributedKey::Signing(SigningInfo::default())));
        assert!(slots.sign.is_none());

        let mut info = EncryptionInfo::default();
        info.ediv = 0x1234;
        assert!(slots.store(DistributedKey::Encryption(info.clone())));
        assert_eq!(slots.enc, Some(info));
    }
}
