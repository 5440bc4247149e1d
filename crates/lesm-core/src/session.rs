//! Pairing sessions and the bounded pool that holds them.
//!
//! A session exists from the first pairing event on a connection until the
//! pairing completes, fails or times out. The pool is a fixed arena sized to
//! the maximum number of simultaneous connections.

use lesm_crypto::PublicKeyShare;
use tracing::debug;

use crate::errors::SecurityError;
use crate::keydist::{DistributedKey, KeySet, KeySlots};
use crate::types::{AuthRequirements, ConnId, KeyDistribution, KeyOrigin, PairingParams, Role};

// ============================================================================
// Pairing Session
// ============================================================================

/// Progress of a live session. Terminal states are not stored: the session is
/// released as soon as the outcome is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Pairing parameters have been offered or requested
    ParamsExchanged,
    /// Authentication or key distribution is under way
    KeyExchangeInProgress,
}

/// Out-of-band data availability on each side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OobFlags {
    pub local: bool,
    pub peer: bool,
}

impl OobFlags {
    pub fn any(&self) -> bool {
        self.local || self.peer
    }
}

/// Requirements and key buffers the local side committed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub auth: AuthRequirements,
    pub keys: KeySet,
}

/// Local bookkeeping for one pairing attempt.
///
/// Key storage is kept per initiator/responder; "own" and "peer" are derived
/// from the role when asked for.
#[derive(Debug)]
pub struct PairingSession {
    conn: ConnId,
    role: Role,
    state: SessionState,
    peer_params: Option<PairingParams>,
    commitment: Option<Commitment>,
    negotiated: Option<(KeyDistribution, KeyDistribution)>,
    initiator_keys: KeySlots,
    responder_keys: KeySlots,
    initiator_public_key: Option<PublicKeyShare>,
    responder_public_key: Option<PublicKeyShare>,
    oob: OobFlags,
}

impl PairingSession {
    pub fn new(conn: ConnId, role: Role) -> Self {
        Self {
            conn,
            role,
            state: SessionState::ParamsExchanged,
            peer_params: None,
            commitment: None,
            negotiated: None,
            initiator_keys: KeySlots::default(),
            responder_keys: KeySlots::default(),
            initiator_public_key: None,
            responder_public_key: None,
            oob: OobFlags::default(),
        }
    }

    pub fn conn(&self) -> ConnId {
        self.conn
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(conn = %self.conn, from = ?self.state, to = ?state, "session state change");
            self.state = state;
        }
    }

    pub fn peer_params(&self) -> Option<&PairingParams> {
        self.peer_params.as_ref()
    }

    pub fn set_peer_params(&mut self, params: PairingParams) {
        self.oob.peer = params.oob_present;
        self.peer_params = Some(params);
    }

    pub fn commitment(&self) -> Option<&Commitment> {
        self.commitment.as_ref()
    }

    pub fn commit(&mut self, auth: AuthRequirements, keys: KeySet) {
        self.commitment = Some(Commitment { auth, keys });
    }

    /// Negotiated `(initiator, responder)` distribution flags, if assembled.
    pub fn negotiated(&self) -> Option<(KeyDistribution, KeyDistribution)> {
        self.negotiated
    }

    pub(crate) fn set_negotiated(
        &mut self,
        initiator: KeyDistribution,
        responder: KeyDistribution,
        initiator_keys: KeySlots,
        responder_keys: KeySlots,
    ) {
        self.negotiated = Some((initiator, responder));
        self.initiator_keys = initiator_keys;
        self.responder_keys = responder_keys;
    }

    pub fn keys(&self, role: Role) -> &KeySlots {
        match role {
            Role::Initiator => &self.initiator_keys,
            Role::Responder => &self.responder_keys,
        }
    }

    fn keys_mut(&mut self, role: Role) -> &mut KeySlots {
        match role {
            Role::Initiator => &mut self.initiator_keys,
            Role::Responder => &mut self.responder_keys,
        }
    }

    /// Keys the local device distributes.
    pub fn own_slots(&self) -> &KeySlots {
        self.keys(self.role)
    }

    /// Keys the peer distributes.
    pub fn peer_slots(&self) -> &KeySlots {
        self.keys(self.role.peer())
    }

    /// Role that produced keys from `origin`.
    pub fn role_of(&self, origin: KeyOrigin) -> Role {
        match origin {
            KeyOrigin::Local => self.role,
            KeyOrigin::Peer => self.role.peer(),
        }
    }

    /// Store a distributed key into its assembled slot.
    pub fn store_key(&mut self, origin: KeyOrigin, key: DistributedKey) -> bool {
        let role = self.role_of(origin);
        self.keys_mut(role).store(key)
    }

    pub fn set_public_keys(&mut self, own: PublicKeyShare, peer: PublicKeyShare) {
        let (initiator, responder) = match self.role {
            Role::Initiator => (own, peer),
            Role::Responder => (peer, own),
        };
        self.initiator_public_key = Some(initiator);
        self.responder_public_key = Some(responder);
    }

    pub fn own_public_key(&self) -> Option<&PublicKeyShare> {
        match self.role {
            Role::Initiator => self.initiator_public_key.as_ref(),
            Role::Responder => self.responder_public_key.as_ref(),
        }
    }

    pub fn peer_public_key(&self) -> Option<&PublicKeyShare> {
        match self.role {
            Role::Initiator => self.responder_public_key.as_ref(),
            Role::Responder => self.initiator_public_key.as_ref(),
        }
    }

    pub fn oob(&self) -> OobFlags {
        self.oob
    }

    pub fn set_local_oob(&mut self, present: bool) {
        self.oob.local = present;
    }
}

// ============================================================================
// Session Pool
// ============================================================================

/// Fixed-capacity arena of pairing sessions keyed by connection.
#[derive(Debug)]
pub struct SessionPool {
    slots: Vec<Option<PairingSession>>,
}

impl SessionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.get(conn).is_some()
    }

    /// Create a session for `conn` in the first free slot.
    ///
    /// Fails if the pool is full or `conn` already has a session; a live
    /// session is never overwritten.
    pub fn allocate(&mut self, conn: ConnId, role: Role) -> Result<&mut PairingSession, SecurityError> {
        if self.contains(conn) {
            return Err(SecurityError::InvalidState(format!(
                "pairing session for {} already exists",
                conn
            )));
        }

        let capacity = self.capacity();
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or_else(|| {
                SecurityError::CapacityExceeded(format!(
                    "all {} pairing sessions in use",
                    capacity
                ))
            })?;

        debug!(%conn, ?role, "allocated pairing session");
        Ok(slot.insert(PairingSession::new(conn, role)))
    }

    pub fn get(&self, conn: ConnId) -> Option<&PairingSession> {
        self.slots
            .iter()
            .flatten()
            .find(|s| s.conn == conn)
    }

    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut PairingSession> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|s| s.conn == conn)
    }

    /// Drop the session for `conn`. Releasing an absent session is a no-op;
    /// the return value says whether one existed.
    pub fn release(&mut self, conn: ConnId) -> bool {
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|s| s.conn == conn) {
                *slot = None;
                debug!(%conn, "released pairing session");
                return true;
            }
        }
        false
    }

    /// Drop every session. Returns how many were live.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for slot in self.slots.iter_mut() {
            if slot.take().is_some() {
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "released all pairing sessions");
        }
        released
    }

    pub fn iter(&self) -> impl Iterator<Item = &PairingSession> {
        self.slots.iter().flatten()
    }
}
