//! Inbound link-layer events and outbound application outcomes.

use lesm_crypto::{AddressType, BdAddr, Csrk, EncryptionInfo, Irk, PublicKeyShare};

use crate::errors::FailureReason;
use crate::keydist::DistributedKey;
use crate::types::{
    AuthRequirements, ConnId, KeyDistribution, KeyKind, KeyOrigin, KeypressKind, PairingParams,
    Role, SecurityLevel, SecurityMode,
};

// ============================================================================
// Link Events
// ============================================================================

/// Where a timeout came from, when the link layer says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutSource {
    /// A peripheral security request was never followed by pairing
    SecurityRequest,
    /// The pairing procedure itself timed out
    Pairing,
}

/// Result carried by the terminal authentication event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Success,
    /// Timed out; `None` when the stack does not report the source
    Timeout(Option<TimeoutSource>),
    /// Failed with a raw reason code
    Failed(u8),
}

/// Security events raised by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected {
        conn: ConnId,
        role: Role,
        peer: BdAddr,
        /// Whether a bond with this peer is already stored
        bonded: bool,
    },
    Disconnected {
        conn: ConnId,
    },
    SecurityParamsRequested {
        conn: ConnId,
        params: PairingParams,
    },
    KeyRequest {
        conn: ConnId,
        kind: KeyKind,
    },
    PasskeyDisplay {
        conn: ConnId,
        passkey: u32,
        requires_confirmation: bool,
    },
    KeypressNotification {
        conn: ConnId,
        kind: KeypressKind,
    },
    KeyAgreementRequested {
        conn: ConnId,
        peer_public_key: PublicKeyShare,
    },
    KeyDistributed {
        conn: ConnId,
        origin: KeyOrigin,
        key: DistributedKey,
    },
    LtkRequested {
        conn: ConnId,
        ediv: u16,
        rand: [u8; 8],
    },
    AuthStatus {
        conn: ConnId,
        result: AuthResult,
        initiator_keys: KeyDistribution,
        responder_keys: KeyDistribution,
    },
    LinkSecurityChanged {
        conn: ConnId,
        mode: SecurityMode,
        level: SecurityLevel,
    },
    PeripheralSecurityRequest {
        conn: ConnId,
        auth: AuthRequirements,
    },
}

impl LinkEvent {
    pub fn conn(&self) -> ConnId {
        match self {
            LinkEvent::Connected { conn, .. }
            | LinkEvent::Disconnected { conn }
            | LinkEvent::SecurityParamsRequested { conn, .. }
            | LinkEvent::KeyRequest { conn, .. }
            | LinkEvent::PasskeyDisplay { conn, .. }
            | LinkEvent::KeypressNotification { conn, .. }
            | LinkEvent::KeyAgreementRequested { conn, .. }
            | LinkEvent::KeyDistributed { conn, .. }
            | LinkEvent::LtkRequested { conn, .. }
            | LinkEvent::AuthStatus { conn, .. }
            | LinkEvent::LinkSecurityChanged { conn, .. }
            | LinkEvent::PeripheralSecurityRequest { conn, .. } => *conn,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// What the engine reports to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The peer wants to pair; answer with `reply_security_params`
    PairingRequested { conn: ConnId, params: PairingParams },
    PasskeyRequested { conn: ConnId },
    PasskeyDisplay { conn: ConnId, passkey: u32 },
    /// Numeric comparison; answer with `confirm_passkey`
    ConfirmationRequested { conn: ConnId, passkey: u32 },
    OobRequested { conn: ConnId, secure_connections: bool },
    KeypressNotification { conn: ConnId, kind: KeypressKind },
    LocalLtkDistributed { conn: ConnId, key: EncryptionInfo },
    PeerLtkDistributed { conn: ConnId, key: EncryptionInfo },
    PeerIrkDistributed {
        conn: ConnId,
        irk: Irk,
        address_type: AddressType,
        address: BdAddr,
    },
    PeerCsrkDistributed { conn: ConnId, csrk: Csrk },
    PairingCompleted { conn: ConnId, role: Role, bonded: bool },
    PairingTimedOut { conn: ConnId },
    PairingError { conn: ConnId, reason: FailureReason },
    SecurityRequestTimedOut { conn: ConnId },
    LinkEncryptionResult {
        conn: ConnId,
        mode: SecurityMode,
        level: SecurityLevel,
    },
    /// The peer lost its bond; it must pair again
    PairingRefreshRequired { conn: ConnId },
    /// The peripheral asked for security; start pairing with `authenticate`
    PeripheralSecurityRequest { conn: ConnId, auth: AuthRequirements },
    /// The peer wants to resume encryption; answer with `reply_ltk`
    LtkRequested { conn: ConnId, ediv: u16, rand: [u8; 8] },
}

impl Outcome {
    pub fn conn(&self) -> ConnId {
        match self {
            Outcome::PairingRequested { conn, .. }
            | Outcome::PasskeyRequested { conn }
            | Outcome::PasskeyDisplay { conn, .. }
            | Outcome::ConfirmationRequested { conn, .. }
            | Outcome::OobRequested { conn, .. }
            | Outcome::KeypressNotification { conn, .. }
            | Outcome::LocalLtkDistributed { conn, .. }
            | Outcome::PeerLtkDistributed { conn, .. }
            | Outcome::PeerIrkDistributed { conn, .. }
            | Outcome::PeerCsrkDistributed { conn, .. }
            | Outcome::PairingCompleted { conn, .. }
            | Outcome::PairingTimedOut { conn }
            | Outcome::PairingError { conn, .. }
            | Outcome::SecurityRequestTimedOut { conn }
            | Outcome::LinkEncryptionResult { conn, .. }
            | Outcome::PairingRefreshRequired { conn }
            | Outcome::PeripheralSecurityRequest { conn, .. }
            | Outcome::LtkRequested { conn, .. } => *conn,
        }
    }

    /// Whether this outcome ends a pairing attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Outcome::PairingCompleted { .. }
                | Outcome::PairingTimedOut { .. }
                | Outcome::PairingError { .. }
                | Outcome::SecurityRequestTimedOut { .. }
        )
    }
}

/// Receiver of engine outcomes, called synchronously during event handling.
pub trait OutcomeSink {
    fn emit(&mut self, outcome: Outcome);
}

impl OutcomeSink for Vec<Outcome> {
    fn emit(&mut self, outcome: Outcome) {
        self.push(outcome);
    }
}
