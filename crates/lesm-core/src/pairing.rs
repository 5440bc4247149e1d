//! Pairing state machine.
//!
//! `SecurityEngine` owns the session pool, the resolving list and the
//! per-link context. Link-layer events are fed in through `handle_event` and
//! processed to completion before the call returns; application decisions
//! come back through the reply methods. Commands to the link layer are
//! fire-and-forget and their results arrive as later events for the same
//! connection.
//!
//! A terminal pairing outcome is reported exactly once. When the engine
//! rejects a pairing towards the link layer, the link layer reports the
//! terminal `AuthStatus`; only when a command fails synchronously on the
//! event path does the engine report the failure itself.

use std::collections::{HashMap, HashSet};

use lesm_crypto::{AddressType, BdAddr, EncryptionInfo, IdentityInfo, PublicKeyShare};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::errors::{FailureReason, SecurityError};
use crate::events::{AuthResult, LinkEvent, Outcome, OutcomeSink, TimeoutSource};
use crate::keydist::{assemble, AssembleOptions, DistributedKey};
use crate::privacy::LocalPrivacy;
use crate::resolving_list::{ResolvingList, ResolvingListEntry};
use crate::session::{PairingSession, SessionPool, SessionState};
use crate::stack::{AuthKeyReply, KeyAgreement, LinkLayer, ParamsReply, StackError};
use crate::types::{
    AuthRequirements, ConnId, KeyDistribution, KeyKind, KeyOrigin, PairingParams, Role,
    SecurityLevel, SecurityMode, MAX_PASSKEY,
};

// ============================================================================
// Link Context
// ============================================================================

/// What the engine knows about a live link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkContext {
    /// Local role on the link
    pub role: Role,
    /// Peer address as seen on the air
    pub peer: BdAddr,
    /// A bond with the peer is stored
    pub bonded: bool,
    /// Cached service discovery results for the peer may be reused
    pub service_cache_valid: bool,
}

// ============================================================================
// Security Engine
// ============================================================================

pub struct SecurityEngine<L: LinkLayer, K: KeyAgreement> {
    config: EngineConfig,
    stack: L,
    key_agreement: K,
    sessions: SessionPool,
    resolving_list: ResolvingList,
    links: HashMap<ConnId, LinkContext>,
    /// Connections whose pairing was cut short by a disconnect and whose
    /// terminal status is still outstanding
    interrupted: HashSet<ConnId>,
    privacy: Option<LocalPrivacy>,
    static_passkey: Option<u32>,
}

impl<L: LinkLayer, K: KeyAgreement> SecurityEngine<L, K> {
    /// Build an engine from a validated configuration.
    ///
    /// A configured static passkey is pushed to the link layer immediately.
    pub fn new(config: EngineConfig, stack: L, key_agreement: K) -> Result<Self, SecurityError> {
        config
            .validate()
            .map_err(|e| SecurityError::InvalidParameter(e.to_string()))?;

        let mut engine = Self {
            sessions: SessionPool::new(usize::from(config.max_connections)),
            resolving_list: ResolvingList::new(config.resolving_list_capacity),
            links: HashMap::new(),
            interrupted: HashSet::new(),
            privacy: None,
            static_passkey: None,
            config,
            stack,
            key_agreement,
        };

        engine.stack.set_io_capability(engine.config.io_capability)?;
        if let Some(passkey) = engine.config.static_passkey {
            engine.set_static_passkey(Some(passkey))?;
        }

        info!(
            sessions = engine.sessions.capacity(),
            resolving_list = engine.resolving_list.capacity(),
            "security engine ready"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stack(&self) -> &L {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut L {
        &mut self.stack
    }

    pub fn sessions(&self) -> &SessionPool {
        &self.sessions
    }

    pub fn session(&self, conn: ConnId) -> Option<&PairingSession> {
        self.sessions.get(conn)
    }

    pub fn link(&self, conn: ConnId) -> Option<&LinkContext> {
        self.links.get(&conn)
    }

    pub fn resolving_list(&self) -> &ResolvingList {
        &self.resolving_list
    }

    pub fn resolving_list_mut(&mut self) -> &mut ResolvingList {
        &mut self.resolving_list
    }

    pub fn privacy(&self) -> Option<&LocalPrivacy> {
        self.privacy.as_ref()
    }

    /// Find the known peer behind `address`: a resolvable private address is
    /// resolved against every IRK in the list, any other address is matched
    /// against the stored identity addresses.
    pub fn resolve_peer(&self, address: &BdAddr) -> Option<&ResolvingListEntry> {
        if address.is_resolvable_private() {
            self.resolving_list.find_match(address)
        } else {
            self.resolving_list
                .entries()
                .iter()
                .find(|e| e.peer_identity_address == *address)
        }
    }

    /// Drop every session and link context.
    pub fn reset(&mut self) {
        let released = self.sessions.release_all();
        self.links.clear();
        self.interrupted.clear();
        info!("Security engine reset, {} sessions released", released);
    }

    // ========================================================================
    // Event Handling
    // ========================================================================

    /// Process one link-layer event, reporting outcomes to `sink`.
    pub fn handle_event(&mut self, event: LinkEvent, sink: &mut dyn OutcomeSink) {
        match event {
            LinkEvent::Connected {
                conn,
                role,
                peer,
                bonded,
            } => self.on_connected(conn, role, peer, bonded),
            LinkEvent::Disconnected { conn } => self.on_disconnected(conn),
            LinkEvent::SecurityParamsRequested { conn, params } => {
                self.on_security_params_requested(conn, params, sink)
            }
            LinkEvent::KeyRequest { conn, kind } => self.on_key_request(conn, kind, sink),
            LinkEvent::PasskeyDisplay {
                conn,
                passkey,
                requires_confirmation,
            } => {
                self.advance(conn);
                sink.emit(Outcome::PasskeyDisplay { conn, passkey });
                if requires_confirmation {
                    sink.emit(Outcome::ConfirmationRequested { conn, passkey });
                }
            }
            LinkEvent::KeypressNotification { conn, kind } => {
                sink.emit(Outcome::KeypressNotification { conn, kind });
            }
            LinkEvent::KeyAgreementRequested {
                conn,
                peer_public_key,
            } => self.on_key_agreement(conn, peer_public_key, sink),
            LinkEvent::KeyDistributed { conn, origin, key } => {
                self.on_key_distributed(conn, origin, key)
            }
            LinkEvent::LtkRequested { conn, ediv, rand } => {
                sink.emit(Outcome::LtkRequested { conn, ediv, rand });
            }
            LinkEvent::AuthStatus {
                conn,
                result,
                initiator_keys,
                responder_keys,
            } => self.on_auth_status(conn, result, initiator_keys, responder_keys, sink),
            LinkEvent::LinkSecurityChanged { conn, mode, level } => {
                self.on_link_security_changed(conn, mode, level, sink)
            }
            LinkEvent::PeripheralSecurityRequest { conn, auth } => {
                debug!(%conn, "peripheral requested security");
                sink.emit(Outcome::PeripheralSecurityRequest { conn, auth });
            }
        }
    }

    fn on_connected(&mut self, conn: ConnId, role: Role, peer: BdAddr, bonded: bool) {
        if self.sessions.release(conn) {
            warn!(%conn, "dropped stale pairing session on new connection");
        }
        self.interrupted.remove(&conn);
        let context = LinkContext {
            role,
            peer,
            bonded,
            service_cache_valid: bonded,
        };
        if self.links.insert(conn, context).is_some() {
            warn!(%conn, "replaced link context for reused connection id");
        }
        debug!(%conn, ?role, %peer, bonded, "link up");
    }

    fn on_disconnected(&mut self, conn: ConnId) {
        self.links.remove(&conn);
        if self.sessions.release(conn) {
            debug!(%conn, "link down with pairing in progress");
            self.interrupted.insert(conn);
        }
    }

    fn on_security_params_requested(
        &mut self,
        conn: ConnId,
        params: PairingParams,
        sink: &mut dyn OutcomeSink,
    ) {
        // The peer's response to our own pairing request: answer with what was
        // already committed instead of asking the application again.
        if let Some(session) = self.sessions.get_mut(conn) {
            if session.role() == Role::Initiator && session.state() == SessionState::ParamsExchanged {
                if let Some(commitment) = session.commitment().cloned() {
                    session.set_peer_params(params);
                    debug!(%conn, "answering renegotiation with committed key set");
                    let result = self.stack.reply_security_params(
                        conn,
                        ParamsReply::Accept,
                        Some(&commitment.auth),
                        Some(&commitment.keys),
                    );
                    if let Err(e) = result {
                        self.abort_session(conn, e, sink);
                    }
                    return;
                }
            }
        }

        if !self.sessions.contains(conn) {
            let role = self
                .links
                .get(&conn)
                .map(|link| link.role)
                .unwrap_or(Role::Responder);
            if let Err(e) = self.sessions.allocate(conn, role) {
                warn!(%conn, error = %e, "cannot track pairing request, rejecting");
                let reply = ParamsReply::Reject(FailureReason::Unspecified);
                if let Err(stack_err) = self.stack.reply_security_params(conn, reply, None, None) {
                    warn!(%conn, error = %stack_err, "pairing rejection not accepted");
                    sink.emit(Outcome::PairingError {
                        conn,
                        reason: FailureReason::from(&e),
                    });
                }
                return;
            }
        }

        if let Some(session) = self.sessions.get_mut(conn) {
            session.set_peer_params(params);
        }
        info!(%conn, "pairing requested by peer");
        sink.emit(Outcome::PairingRequested { conn, params });
    }

    fn on_key_request(&mut self, conn: ConnId, kind: KeyKind, sink: &mut dyn OutcomeSink) {
        let outcome = match kind {
            KeyKind::Passkey => Outcome::PasskeyRequested { conn },
            KeyKind::OutOfBand => Outcome::OobRequested {
                conn,
                secure_connections: false,
            },
            KeyKind::None => {
                warn!(%conn, "ignoring key request without a key kind");
                return;
            }
        };

        if !self.advance(conn) {
            warn!(%conn, ?kind, "key requested without a pairing session, rejecting");
            if let Err(e) = self.stack.reply_auth_key(conn, AuthKeyReply::Reject) {
                warn!(%conn, error = %e, "key rejection not accepted");
            }
            return;
        }
        sink.emit(outcome);
    }

    fn on_key_agreement(
        &mut self,
        conn: ConnId,
        peer_public_key: PublicKeyShare,
        sink: &mut dyn OutcomeSink,
    ) {
        if !self.advance(conn) {
            warn!(%conn, "key agreement requested without a pairing session, rejecting");
            if let Err(e) = self.stack.reply_auth_key(conn, AuthKeyReply::Reject) {
                warn!(%conn, error = %e, "key rejection not accepted");
            }
            return;
        }

        let (own_public_key, dhkey) = match self.key_agreement.agree(&peer_public_key) {
            Ok(agreed) => agreed,
            Err(e) => {
                warn!(%conn, error = %e, "aborting pairing");
                if let Err(stack_err) = self.stack.reply_auth_key(conn, AuthKeyReply::Reject) {
                    self.abort_session(conn, stack_err, sink);
                }
                return;
            }
        };

        let oob = match self.sessions.get_mut(conn) {
            Some(session) => {
                session.set_public_keys(own_public_key.clone(), peer_public_key);
                session.oob()
            }
            None => Default::default(),
        };

        if let Err(e) = self
            .stack
            .reply_key_agreement(conn, &own_public_key, Some(&dhkey))
        {
            self.abort_session(conn, e, sink);
            return;
        }
        debug!(%conn, "key agreement answered");

        if oob.any() {
            sink.emit(Outcome::OobRequested {
                conn,
                secure_connections: true,
            });
        }
    }

    fn on_key_distributed(&mut self, conn: ConnId, origin: KeyOrigin, key: DistributedKey) {
        let flag = key.flag();
        let Some(session) = self.sessions.get_mut(conn) else {
            warn!(%conn, ?flag, "dropping key distributed without a pairing session");
            return;
        };
        session.set_state(SessionState::KeyExchangeInProgress);
        if session.store_key(origin, key) {
            debug!(%conn, ?origin, ?flag, "stored distributed key");
        } else {
            warn!(%conn, ?origin, ?flag, "dropping key that was not negotiated");
        }
    }

    fn on_auth_status(
        &mut self,
        conn: ConnId,
        result: AuthResult,
        initiator_keys: KeyDistribution,
        responder_keys: KeyDistribution,
        sink: &mut dyn OutcomeSink,
    ) {
        let interrupted = self.interrupted.remove(&conn);
        match result {
            AuthResult::Success if interrupted => {
                warn!(%conn, "ignoring pairing success after the link went down");
            }
            AuthResult::Success => self.complete_pairing(conn, initiator_keys, responder_keys, sink),
            AuthResult::Timeout(source) => {
                let had_session = self.sessions.release(conn) || interrupted;
                let source = source.unwrap_or(if had_session {
                    TimeoutSource::Pairing
                } else {
                    TimeoutSource::SecurityRequest
                });
                match source {
                    TimeoutSource::SecurityRequest => {
                        info!(%conn, "security request timed out");
                        sink.emit(Outcome::SecurityRequestTimedOut { conn });
                    }
                    TimeoutSource::Pairing => {
                        info!(%conn, "pairing timed out");
                        sink.emit(Outcome::PairingTimedOut { conn });
                    }
                }
            }
            AuthResult::Failed(code) => {
                self.sessions.release(conn);
                let reason = FailureReason::from_code(code);
                info!(%conn, %reason, "pairing failed");
                sink.emit(Outcome::PairingError { conn, reason });
            }
        }
    }

    fn complete_pairing(
        &mut self,
        conn: ConnId,
        initiator_keys: KeyDistribution,
        responder_keys: KeyDistribution,
        sink: &mut dyn OutcomeSink,
    ) {
        let Some(session) = self.sessions.get(conn) else {
            warn!(%conn, "ignoring pairing success without a pairing session");
            return;
        };

        let role = session.role();
        // Keys are reported from what was negotiated at assembly, not from
        // the flags in the status event.
        let (initiator_flags, responder_flags) = session
            .negotiated()
            .unwrap_or((initiator_keys, responder_keys));
        let (own_flags, peer_flags) = match role {
            Role::Initiator => (initiator_flags, responder_flags),
            Role::Responder => (responder_flags, initiator_flags),
        };
        let bonded = session.commitment().is_some_and(|c| c.auth.bonding)
            && session.peer_params().map_or(true, |p| p.auth.bonding);

        let own = session.own_slots();
        let peer = session.peer_slots();

        if own_flags.contains(KeyDistribution::ENC_KEY) {
            if let Some(enc) = &own.enc {
                sink.emit(Outcome::LocalLtkDistributed {
                    conn,
                    key: enc.clone(),
                });
            }
        }
        if peer_flags.contains(KeyDistribution::ENC_KEY) {
            if let Some(enc) = &peer.enc {
                sink.emit(Outcome::PeerLtkDistributed {
                    conn,
                    key: enc.clone(),
                });
            }
        }
        let mut peer_identity = None;
        if peer_flags.contains(KeyDistribution::ID_KEY) {
            if let Some(id) = &peer.id {
                sink.emit(Outcome::PeerIrkDistributed {
                    conn,
                    irk: id.irk.clone(),
                    address_type: id.address_type,
                    address: id.address,
                });
                peer_identity = Some(id.clone());
            }
        }
        if peer_flags.contains(KeyDistribution::SIGN_KEY) {
            if let Some(sign) = &peer.sign {
                sink.emit(Outcome::PeerCsrkDistributed {
                    conn,
                    csrk: sign.csrk.clone(),
                });
            }
        }

        if let Some(identity) = peer_identity {
            if self.config.register_peer_identities {
                self.register_identity(conn, identity);
            }
        }

        self.sessions.release(conn);
        if let Some(link) = self.links.get_mut(&conn) {
            if bonded {
                link.bonded = true;
                link.service_cache_valid = true;
            }
        }

        info!(%conn, ?role, bonded, "pairing completed");
        sink.emit(Outcome::PairingCompleted { conn, role, bonded });
    }

    fn register_identity(&mut self, conn: ConnId, identity: IdentityInfo) {
        if identity.irk.is_zero() {
            debug!(%conn, "peer distributed an empty IRK, not registering");
            return;
        }
        // A re-pairing peer replaces its previous entry.
        match self
            .resolving_list
            .remove(identity.address_type, &identity.address)
        {
            Ok(()) => debug!(%conn, address = %identity.address, "replacing previous peer identity"),
            Err(_) => debug!(%conn, address = %identity.address, "registering new peer identity"),
        }
        if let Err(e) = self
            .resolving_list
            .add(identity.address_type, identity.address, identity.irk.clone())
        {
            warn!(%conn, error = %e, "peer identity not registered");
        }
    }

    fn on_link_security_changed(
        &mut self,
        conn: ConnId,
        mode: SecurityMode,
        level: SecurityLevel,
        sink: &mut dyn OutcomeSink,
    ) {
        let lost_bond = mode == SecurityMode::Encryption
            && level == SecurityLevel::Unauthenticated
            && self.links.get(&conn).is_some_and(|link| link.bonded);

        if lost_bond {
            if let Some(link) = self.links.get_mut(&conn) {
                link.service_cache_valid = false;
            }
            warn!(%conn, "peer lost its bond, pairing must be refreshed");
            sink.emit(Outcome::PairingRefreshRequired { conn });
        } else {
            debug!(%conn, ?mode, ?level, "link security changed");
            sink.emit(Outcome::LinkEncryptionResult { conn, mode, level });
        }
    }

    /// Move the session to key exchange. Returns `false` when there is none.
    fn advance(&mut self, conn: ConnId) -> bool {
        match self.sessions.get_mut(conn) {
            Some(session) => {
                session.set_state(SessionState::KeyExchangeInProgress);
                true
            }
            None => false,
        }
    }

    /// A command failed synchronously while handling an event: the link layer
    /// will not report a terminal status, so the engine does.
    fn abort_session(&mut self, conn: ConnId, error: StackError, sink: &mut dyn OutcomeSink) {
        let error = SecurityError::from(error);
        warn!(%conn, error = %error, "link layer rejected command, aborting pairing");
        self.sessions.release(conn);
        sink.emit(Outcome::PairingError {
            conn,
            reason: FailureReason::from(&error),
        });
    }

    // ========================================================================
    // Application Operations
    // ========================================================================

    /// Start pairing on `conn`, using the configured requirements when `auth`
    /// is `None`.
    ///
    /// As central this sends a pairing request and tracks a session. As
    /// peripheral the link layer sends a security request instead and no
    /// session exists until the central starts pairing.
    pub fn authenticate(
        &mut self,
        conn: ConnId,
        auth: Option<AuthRequirements>,
    ) -> Result<(), SecurityError> {
        let auth = auth.unwrap_or_else(|| self.config.auth_requirements());
        auth.validate()?;

        let role = self
            .links
            .get(&conn)
            .map(|link| link.role)
            .unwrap_or(Role::Initiator);
        if role == Role::Responder {
            self.stack.authenticate(conn, &auth)?;
            info!(%conn, "security request sent");
            return Ok(());
        }

        let local_identity = self.privacy.as_ref().map(LocalPrivacy::identity);
        let options = AssembleOptions {
            allow_signing: self.config.distribute_signing_keys,
            local_identity: local_identity.as_ref(),
        };
        let session = self.sessions.allocate(conn, Role::Initiator)?;
        let keys = assemble(
            session,
            self.config.initiator_keys,
            self.config.responder_keys,
            &options,
        );
        session.commit(auth, keys);

        if let Err(e) = self.stack.authenticate(conn, &auth) {
            self.sessions.release(conn);
            warn!(%conn, error = %e, "pairing request not accepted by link layer");
            return Err(e.into());
        }
        info!(%conn, "pairing started");
        Ok(())
    }

    /// Answer a `PairingRequested` outcome.
    ///
    /// Accepting commits `auth` (or the configured requirements) and the key
    /// set the peer offered, narrowed to the locally accepted keys.
    /// Rejecting releases the session.
    pub fn reply_security_params(
        &mut self,
        conn: ConnId,
        accept: bool,
        auth: Option<AuthRequirements>,
    ) -> Result<(), SecurityError> {
        if !self.sessions.contains(conn) {
            return Err(SecurityError::InvalidState(format!(
                "no pairing request pending on {}",
                conn
            )));
        }

        if !accept {
            self.sessions.release(conn);
            info!(%conn, "pairing rejected");
            let reply = ParamsReply::Reject(FailureReason::PairingNotSupported);
            self.stack.reply_security_params(conn, reply, None, None)?;
            return Ok(());
        }

        let auth = auth.unwrap_or_else(|| self.config.auth_requirements());
        auth.validate()?;

        let local_identity = self.privacy.as_ref().map(LocalPrivacy::identity);
        let options = AssembleOptions {
            allow_signing: self.config.distribute_signing_keys,
            local_identity: local_identity.as_ref(),
        };
        let session = self
            .sessions
            .get_mut(conn)
            .ok_or_else(|| SecurityError::NotFound(format!("pairing session for {}", conn)))?;
        let (initiator_flags, responder_flags) = match session.peer_params() {
            Some(params) => (
                params.initiator_keys & self.config.initiator_keys,
                params.responder_keys & self.config.responder_keys,
            ),
            None => (self.config.initiator_keys, self.config.responder_keys),
        };
        let keys = assemble(session, initiator_flags, responder_flags, &options);
        session.commit(auth, keys.clone());

        self.stack
            .reply_security_params(conn, ParamsReply::Accept, Some(&auth), Some(&keys))?;
        info!(%conn, "pairing accepted");
        Ok(())
    }

    /// Answer a `PasskeyRequested` outcome.
    pub fn reply_passkey(&mut self, conn: ConnId, passkey: u32) -> Result<(), SecurityError> {
        if passkey > MAX_PASSKEY {
            return Err(SecurityError::InvalidParameter(format!(
                "passkey must be at most {}",
                MAX_PASSKEY
            )));
        }
        self.require_session(conn)?;
        self.stack
            .reply_auth_key(conn, AuthKeyReply::Passkey(passkey))?;
        Ok(())
    }

    /// Answer an `OobRequested` outcome with the 128-bit temporary key.
    pub fn reply_oob(&mut self, conn: ConnId, data: [u8; 16]) -> Result<(), SecurityError> {
        self.require_session(conn)?;
        self.stack
            .reply_auth_key(conn, AuthKeyReply::OutOfBand(data))?;
        Ok(())
    }

    /// Answer a `ConfirmationRequested` outcome.
    pub fn confirm_passkey(&mut self, conn: ConnId, confirmed: bool) -> Result<(), SecurityError> {
        self.require_session(conn)?;
        self.stack
            .reply_auth_key(conn, AuthKeyReply::NumericComparison(confirmed))?;
        Ok(())
    }

    /// Answer an `LtkRequested` outcome from the application's bond store.
    /// `None` tells the peer no key is known.
    pub fn reply_ltk(
        &mut self,
        conn: ConnId,
        ltk: Option<&EncryptionInfo>,
    ) -> Result<(), SecurityError> {
        self.stack.reply_ltk(conn, ltk)?;
        Ok(())
    }

    /// Record that local out-of-band data exists for the pairing on `conn`.
    pub fn set_local_oob(&mut self, conn: ConnId, present: bool) -> Result<(), SecurityError> {
        let session = self
            .sessions
            .get_mut(conn)
            .ok_or_else(|| SecurityError::NotFound(format!("pairing session for {}", conn)))?;
        session.set_local_oob(present);
        Ok(())
    }

    /// Abort pairing on `conn`. Always accepted; link-layer errors are only
    /// logged.
    pub fn cancel_pairing(&mut self, conn: ConnId, reason: FailureReason) {
        let result = if self.sessions.release(conn) {
            self.stack.reply_auth_key(conn, AuthKeyReply::Reject)
        } else {
            self.stack
                .reply_security_params(conn, ParamsReply::Reject(reason), None, None)
        };
        match result {
            Ok(()) => info!(%conn, %reason, "pairing cancelled"),
            Err(e) => warn!(%conn, error = %e, "pairing cancelled, link layer did not accept rejection"),
        }
    }

    fn require_session(&mut self, conn: ConnId) -> Result<&mut PairingSession, SecurityError> {
        let session = self.sessions.get_mut(conn).ok_or_else(|| {
            SecurityError::InvalidState(format!("no pairing in progress on {}", conn))
        })?;
        session.set_state(SessionState::KeyExchangeInProgress);
        Ok(session)
    }

    // ========================================================================
    // Privacy
    // ========================================================================

    /// Install the local identity: the IRK and address rotation interval go
    /// to the link layer, and the identity is distributed in later pairings.
    pub fn enable_privacy(&mut self, privacy: LocalPrivacy) -> Result<(), SecurityError> {
        privacy.validate()?;
        self.stack.set_irk(&privacy.irk)?;
        self.stack
            .set_private_address_timeout(privacy.address_timeout)?;
        info!(
            identity = %privacy.identity_address,
            "Privacy enabled, address rotates every {}s",
            privacy.address_timeout.as_secs()
        );
        self.privacy = Some(privacy);
        Ok(())
    }

    /// A fresh resolvable private address for the local device.
    pub fn local_resolvable_address(&self) -> Result<BdAddr, SecurityError> {
        self.privacy
            .as_ref()
            .map(LocalPrivacy::resolvable_address)
            .ok_or_else(|| SecurityError::InvalidState("privacy is not enabled".to_string()))
    }

    /// Local identity address type, when privacy is enabled.
    pub fn identity_address_type(&self) -> Option<AddressType> {
        self.privacy.as_ref().map(|p| p.identity_type)
    }

    /// Display a fixed passkey instead of a random one; `None` restores
    /// random passkeys.
    pub fn set_static_passkey(&mut self, passkey: Option<u32>) -> Result<(), SecurityError> {
        if passkey.is_some_and(|p| p > MAX_PASSKEY) {
            return Err(SecurityError::InvalidParameter(format!(
                "passkey must be at most {}",
                MAX_PASSKEY
            )));
        }
        self.stack.set_display_passkey(passkey)?;
        self.static_passkey = passkey;
        Ok(())
    }

    pub fn static_passkey(&self) -> Option<u32> {
        self.static_passkey
    }
}
