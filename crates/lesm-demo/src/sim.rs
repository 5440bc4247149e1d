//! Simulated link layer and peer device.
//!
//! The engine's commands travel to the peer task over one channel, and the
//! peer's security events come back over another.

use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use lesm_core::harness::StackCommand;
use lesm_core::{
    AuthKeyReply, AuthRequirements, AuthResult, ConnId, DistributedKey, IoCapability,
    KeyDistribution, KeyOrigin, KeySet, LinkEvent, LinkLayer, PairingParams, ParamsReply, Role,
    SecurityLevel, SecurityMode, StackError,
};
use lesm_crypto::ecdh::EcdhKeyPair;
use lesm_crypto::{
    ah, AddressType, BdAddr, DhKey, EncryptionInfo, IdentityInfo, Irk, Ltk, PublicKeyShare,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Link Layer
// ============================================================================

/// Link layer that forwards every command to the simulated peer.
pub struct ChannelLink {
    tx: mpsc::UnboundedSender<StackCommand>,
}

impl ChannelLink {
    pub fn new(tx: mpsc::UnboundedSender<StackCommand>) -> Self {
        Self { tx }
    }

    fn send(&self, command: StackCommand) -> Result<(), StackError> {
        self.tx
            .send(command)
            .map_err(|_| StackError::Failure("peer is gone".to_string()))
    }
}

impl LinkLayer for ChannelLink {
    fn authenticate(&mut self, conn: ConnId, auth: &AuthRequirements) -> Result<(), StackError> {
        self.send(StackCommand::Authenticate { conn, auth: *auth })
    }

    fn reply_security_params(
        &mut self,
        conn: ConnId,
        reply: ParamsReply,
        auth: Option<&AuthRequirements>,
        keys: Option<&KeySet>,
    ) -> Result<(), StackError> {
        self.send(StackCommand::ReplySecurityParams {
            conn,
            reply,
            auth: auth.copied(),
            keys: keys.cloned(),
        })
    }

    fn reply_auth_key(&mut self, conn: ConnId, reply: AuthKeyReply) -> Result<(), StackError> {
        self.send(StackCommand::ReplyAuthKey { conn, reply })
    }

    fn reply_ltk(&mut self, conn: ConnId, ltk: Option<&EncryptionInfo>) -> Result<(), StackError> {
        self.send(StackCommand::ReplyLtk {
            conn,
            ltk: ltk.cloned(),
        })
    }

    fn reply_key_agreement(
        &mut self,
        conn: ConnId,
        own_public_key: &PublicKeyShare,
        dhkey: Option<&DhKey>,
    ) -> Result<(), StackError> {
        self.send(StackCommand::ReplyKeyAgreement {
            conn,
            own_public_key: own_public_key.clone(),
            dhkey: dhkey.cloned(),
        })
    }

    fn set_io_capability(&mut self, io_capability: IoCapability) -> Result<(), StackError> {
        self.send(StackCommand::SetIoCapability(io_capability))
    }

    fn set_irk(&mut self, irk: &Irk) -> Result<(), StackError> {
        self.send(StackCommand::SetIrk(irk.clone()))
    }

    fn set_private_address_timeout(&mut self, timeout: Duration) -> Result<(), StackError> {
        self.send(StackCommand::SetPrivateAddressTimeout(timeout))
    }

    fn set_display_passkey(&mut self, passkey: Option<u32>) -> Result<(), StackError> {
        self.send(StackCommand::SetDisplayPasskey(passkey))
    }
}

// ============================================================================
// Simulated Peer
// ============================================================================

/// A central that pairs with the local device using LE Secure Connections and
/// numeric comparison, then reconnects from a resolvable private address.
pub struct SimulatedPeer {
    conn: ConnId,
    identity: IdentityInfo,
    commands: mpsc::UnboundedReceiver<StackCommand>,
    events: mpsc::UnboundedSender<LinkEvent>,
}

impl SimulatedPeer {
    pub fn new(
        conn: ConnId,
        commands: mpsc::UnboundedReceiver<StackCommand>,
        events: mpsc::UnboundedSender<LinkEvent>,
    ) -> Self {
        let identity = IdentityInfo {
            irk: Irk::random(),
            address_type: AddressType::Public,
            address: BdAddr::new([0x5E, 0x4D, 0x3C, 0x2B, 0x1A, 0x00]),
        };
        Self {
            conn,
            identity,
            commands,
            events,
        }
    }

    /// Run one pairing and return the private address the peer would use to
    /// reconnect.
    pub async fn run(mut self) -> anyhow::Result<BdAddr> {
        let conn = self.conn;
        let keys = KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY;

        self.emit(LinkEvent::Connected {
            conn,
            role: Role::Responder,
            peer: self.identity.address,
            bonded: false,
        })?;
        self.emit(LinkEvent::SecurityParamsRequested {
            conn,
            params: PairingParams {
                auth: AuthRequirements {
                    mitm: true,
                    ..Default::default()
                },
                io_capability: IoCapability::DisplayYesNo,
                oob_present: false,
                initiator_keys: keys,
                responder_keys: KeyDistribution::ENC_KEY,
            },
        })?;

        match self.next_command().await? {
            StackCommand::ReplySecurityParams {
                reply: ParamsReply::Accept,
                keys: Some(set),
                ..
            } => debug!(own = ?set.own.flags(), peer = ?set.peer.flags(), "peer: pairing accepted"),
            other => bail!("expected pairing acceptance, got {:?}", other),
        }

        // Public key exchange.
        let pair = EcdhKeyPair::generate();
        self.emit(LinkEvent::KeyAgreementRequested {
            conn,
            peer_public_key: pair.public_key().clone(),
        })?;
        match self.next_command().await? {
            StackCommand::ReplyKeyAgreement {
                own_public_key,
                dhkey: Some(dhkey),
                ..
            } => {
                let expected = pair.diffie_hellman(&own_public_key)?;
                if expected != dhkey {
                    bail!("DHKey mismatch");
                }
                info!("peer: DHKey check passed");
            }
            other => bail!("expected key agreement reply, got {:?}", other),
        }

        // Numeric comparison.
        self.emit(LinkEvent::PasskeyDisplay {
            conn,
            passkey: 314_159,
            requires_confirmation: true,
        })?;
        match self.next_command().await? {
            StackCommand::ReplyAuthKey {
                reply: AuthKeyReply::NumericComparison(true),
                ..
            } => {}
            other => bail!("expected numeric comparison, got {:?}", other),
        }

        self.emit(LinkEvent::LinkSecurityChanged {
            conn,
            mode: SecurityMode::Encryption,
            level: SecurityLevel::AuthenticatedSecureConnections,
        })?;

        // Key distribution: the responder's LTK first, then the initiator's.
        let mut local = EncryptionInfo::default();
        local.ltk = Ltk::random();
        local.key_size = 16;
        self.emit(LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Local,
            key: DistributedKey::Encryption(local),
        })?;
        let mut remote = EncryptionInfo::default();
        remote.ltk = Ltk::random();
        remote.key_size = 16;
        self.emit(LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Peer,
            key: DistributedKey::Encryption(remote),
        })?;
        self.emit(LinkEvent::KeyDistributed {
            conn,
            origin: KeyOrigin::Peer,
            key: DistributedKey::Identity(self.identity.clone()),
        })?;

        self.emit(LinkEvent::AuthStatus {
            conn,
            result: AuthResult::Success,
            initiator_keys: keys,
            responder_keys: KeyDistribution::ENC_KEY,
        })?;
        self.emit(LinkEvent::Disconnected { conn })?;

        Ok(ah::generate(&self.identity.irk))
    }

    fn emit(&self, event: LinkEvent) -> anyhow::Result<()> {
        self.events
            .send(event)
            .map_err(|_| anyhow!("engine stopped listening"))
    }

    /// Next pairing command, skipping controller configuration.
    async fn next_command(&mut self) -> anyhow::Result<StackCommand> {
        loop {
            let command = timeout(COMMAND_TIMEOUT, self.commands.recv())
                .await
                .context("timed out waiting for the engine")?
                .ok_or_else(|| anyhow!("engine closed the command channel"))?;
            match command {
                StackCommand::SetIoCapability(_)
                | StackCommand::SetIrk(_)
                | StackCommand::SetPrivateAddressTimeout(_)
                | StackCommand::SetDisplayPasskey(_) => {
                    debug!(?command, "peer: controller configured");
                }
                command => return Ok(command),
            }
        }
    }
}
