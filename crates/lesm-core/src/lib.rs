//! LE Security Manager core - pairing and bonding for LE links.
//!
//! This crate implements:
//! - Pairing state machine driven by link-layer security events
//! - Bounded pairing session pool, one session per connection
//! - Key distribution assembly with per-role key slots
//! - Resolving list of known peer identities
//! - Local privacy (identity distribution, resolvable private addresses)
//! - Engine configuration

#![forbid(unsafe_code)]

// Core state machine
pub mod pairing;
pub mod session;

// Key handling
pub mod keydist;
pub mod privacy;
pub mod resolving_list;

// Link-layer boundary
pub mod events;
pub mod stack;

// Supporting modules
pub mod config;
pub mod errors;
pub mod types;
pub mod harness;

#[cfg(test)]
mod proptests;

pub use config::{ConfigError, EngineConfig};
pub use errors::{ErrorKind, FailureReason, SecurityError};
pub use events::{AuthResult, LinkEvent, Outcome, OutcomeSink, TimeoutSource};
pub use keydist::{DistributedKey, KeySet, KeySlots};
pub use pairing::{LinkContext, SecurityEngine};
pub use privacy::LocalPrivacy;
pub use resolving_list::{ResolvingList, ResolvingListEntry};
pub use session::{PairingSession, SessionPool, SessionState};
pub use stack::{
    AuthKeyReply, KeyAgreement, KeyAgreementError, LinkLayer, P256KeyAgreement, ParamsReply,
    StackError,
};
pub use types::{
    AuthRequirements, ConnId, IoCapability, KeyDistribution, KeyKind, KeyOrigin, KeypressKind,
    PairingParams, Role, SecurityLevel, SecurityMode,
};
