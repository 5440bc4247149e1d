//! Test harness for the security engine.
//!
//! A recording link layer, a deterministic key agreement and helpers for
//! building events, shared by unit and integration tests.

use std::time::Duration;

use getrandom::getrandom;
use lesm_crypto::{AddressType, BdAddr, DhKey, EncryptionInfo, IdentityInfo, Irk, PublicKeyShare};

use crate::keydist::KeySet;
use crate::stack::{
    AuthKeyReply, KeyAgreement, KeyAgreementError, LinkLayer, ParamsReply, StackError,
};
use crate::types::{AuthRequirements, ConnId, IoCapability, KeyDistribution, PairingParams};

/// A command the engine issued to the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCommand {
    Authenticate {
        conn: ConnId,
        auth: AuthRequirements,
    },
    ReplySecurityParams {
        conn: ConnId,
        reply: ParamsReply,
        auth: Option<AuthRequirements>,
        keys: Option<KeySet>,
    },
    ReplyAuthKey {
        conn: ConnId,
        reply: AuthKeyReply,
    },
    ReplyLtk {
        conn: ConnId,
        ltk: Option<EncryptionInfo>,
    },
    ReplyKeyAgreement {
        conn: ConnId,
        own_public_key: PublicKeyShare,
        dhkey: Option<DhKey>,
    },
    SetIoCapability(IoCapability),
    SetIrk(Irk),
    SetPrivateAddressTimeout(Duration),
    SetDisplayPasskey(Option<u32>),
}

/// Link layer that records accepted commands.
///
/// `fail_next` makes the next command fail synchronously; a failed command
/// is not recorded.
#[derive(Debug, Default)]
pub struct RecordingStack {
    commands: Vec<StackCommand>,
    fail_next: Option<StackError>,
}

impl RecordingStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[StackCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<StackCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn fail_next(&mut self, error: StackError) {
        self.fail_next = Some(error);
    }

    fn record(&mut self, command: StackCommand) -> Result<(), StackError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        self.commands.push(command);
        Ok(())
    }
}

impl LinkLayer for RecordingStack {
    fn authenticate(&mut self, conn: ConnId, auth: &AuthRequirements) -> Result<(), StackError> {
        self.record(StackCommand::Authenticate { conn, auth: *auth })
    }

    fn reply_security_params(
        &mut self,
        conn: ConnId,
        reply: ParamsReply,
        auth: Option<&AuthRequirements>,
        keys: Option<&KeySet>,
    ) -> Result<(), StackError> {
        self.record(StackCommand::ReplySecurityParams {
            conn,
            reply,
            auth: auth.copied(),
            keys: keys.cloned(),
        })
    }

    fn reply_auth_key(&mut self, conn: ConnId, reply: AuthKeyReply) -> Result<(), StackError> {
        self.record(StackCommand::ReplyAuthKey { conn, reply })
    }

    fn reply_ltk(&mut self, conn: ConnId, ltk: Option<&EncryptionInfo>) -> Result<(), StackError> {
        self.record(StackCommand::ReplyLtk {
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
        self.record(StackCommand::ReplyKeyAgreement {
            conn,
            own_public_key: own_public_key.clone(),
            dhkey: dhkey.cloned(),
        })
    }

    fn set_io_capability(&mut self, io_capability: IoCapability) -> Result<(), StackError> {
        self.record(StackCommand::SetIoCapability(io_capability))
    }

    fn set_irk(&mut self, irk: &Irk) -> Result<(), StackError> {
        self.record(StackCommand::SetIrk(irk.clone()))
    }

    fn set_private_address_timeout(&mut self, timeout: Duration) -> Result<(), StackError> {
        self.record(StackCommand::SetPrivateAddressTimeout(timeout))
    }

    fn set_display_passkey(&mut self, passkey: Option<u32>) -> Result<(), StackError> {
        self.record(StackCommand::SetDisplayPasskey(passkey))
    }
}

/// Key agreement with a fixed public key and DHKey.
#[derive(Debug, Clone)]
pub struct StaticKeyAgreement {
    public_key: PublicKeyShare,
    dhkey: DhKey,
    fail: bool,
}

impl StaticKeyAgreement {
    pub fn new() -> Self {
        Self {
            public_key: PublicKeyShare::new([0x11; 64]),
            dhkey: DhKey::new([0x22; 32]),
            fail: false,
        }
    }

    /// An agreement that always fails, as with an off-curve peer key.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn public_key(&self) -> &PublicKeyShare {
        &self.public_key
    }

    pub fn dhkey(&self) -> &DhKey {
        &self.dhkey
    }
}

impl Default for StaticKeyAgreement {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyAgreement for StaticKeyAgreement {
    fn agree(&mut self, _peer: &PublicKeyShare) -> Result<(PublicKeyShare, DhKey), KeyAgreementError> {
        if self.fail {
            return Err(KeyAgreementError("peer public key rejected".into()));
        }
        Ok((self.public_key.clone(), self.dhkey.clone()))
    }
}

/// Pairing parameters a peer would send, offering `keys` on both sides.
pub fn responder_params(keys: KeyDistribution) -> PairingParams {
    PairingParams {
        auth: AuthRequirements::default(),
        io_capability: IoCapability::NoInputNoOutput,
        oob_present: false,
        initiator_keys: keys,
        responder_keys: keys,
    }
}

/// Generate a random 16-byte array.
pub fn rand16() -> [u8; 16] {
    let mut b = [0u8; 16];
    getrandom(&mut b).expect("rng");
    b
}

/// Generate a random IRK.
pub fn random_irk() -> Irk {
    Irk::from_le_bytes(rand16())
}

/// Identity of a peer with a random IRK and a public identity address.
pub fn random_identity(address: [u8; 6]) -> IdentityInfo {
    IdentityInfo {
        irk: random_irk(),
        address_type: AddressType::Public,
        address: BdAddr::new(address),
    }
}
