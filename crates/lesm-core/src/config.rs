//! Engine configuration.
//!
//! Loaded from a TOML file or from `LESM_*` environment variables layered
//! over the defaults, then validated before the engine is built.

use std::path::Path;
use std::time::Duration;

use lesm_crypto::Irk;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::types::{
    validate_key_sizes, AuthRequirements, IoCapability, KeyDistribution, MAX_KEY_SIZE,
    MAX_PASSKEY, MIN_KEY_SIZE,
};

/// Longest private address rotation interval the controller accepts (0xA1B8 s).
pub const MAX_PRIVATE_ADDRESS_TIMEOUT_SECS: u32 = 41_400;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(String),
    #[error("config parse error: {0}")]
    ParseError(String),
    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // Key size negotiation
    pub min_key_size: u8,
    pub max_key_size: u8,

    // Capacities
    /// Pairing session pool size; equals the maximum concurrent connections
    pub max_connections: u8,
    pub resolving_list_capacity: u8,

    // Local pairing features
    pub io_capability: IoCapability,
    pub bonding: bool,
    pub mitm: bool,
    pub secure_connections: bool,
    pub keypress: bool,
    /// Keys accepted for distribution by the initiator
    pub initiator_keys: KeyDistribution,
    /// Keys accepted for distribution by the responder
    pub responder_keys: KeyDistribution,
    /// Allow CSRK distribution; off unless explicitly lifted
    pub distribute_signing_keys: bool,

    // Privacy
    pub private_address_timeout_secs: u32,
    /// Local IRK, 32 hex digits most significant byte first
    pub local_irk: Option<String>,
    pub static_passkey: Option<u32>,

    /// Add distributed peer identities to the resolving list automatically
    pub register_peer_identities: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_key_size: MIN_KEY_SIZE,
            max_key_size: MAX_KEY_SIZE,
            max_connections: 4,
            resolving_list_capacity: 8,
            io_capability: IoCapability::NoInputNoOutput,
            bonding: true,
            mitm: false,
            secure_connections: true,
            keypress: false,
            initiator_keys: KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
            responder_keys: KeyDistribution::ENC_KEY | KeyDistribution::ID_KEY,
            distribute_signing_keys: false,
            private_address_timeout_secs: 900,
            local_irk: None,
            static_passkey: None,
            register_peer_identities: false,
        }
    }
}

impl EngineConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileNotFound(format!("{}: {}", path.display(), e)))?;

        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `LESM_*` environment variables. Unparseable
    /// values are ignored with a warning.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        override_from_env("LESM_MIN_KEY_SIZE", &mut config.min_key_size);
        override_from_env("LESM_MAX_KEY_SIZE", &mut config.max_key_size);
        override_from_env("LESM_MAX_CONNECTIONS", &mut config.max_connections);
        override_from_env("LESM_RESOLVING_LIST_CAPACITY", &mut config.resolving_list_capacity);
        override_from_env("LESM_BONDING", &mut config.bonding);
        override_from_env("LESM_MITM", &mut config.mitm);
        override_from_env("LESM_SECURE_CONNECTIONS", &mut config.secure_connections);
        override_from_env(
            "LESM_PRIVATE_ADDRESS_TIMEOUT_SECS",
            &mut config.private_address_timeout_secs,
        );
        if let Ok(irk) = std::env::var("LESM_LOCAL_IRK") {
            config.local_irk = Some(irk);
        }
        if let Ok(passkey) = std::env::var("LESM_STATIC_PASSKEY") {
            match passkey.parse::<u32>() {
                Ok(value) => config.static_passkey = Some(value),
                Err(_) => warn!(value = %passkey, "ignoring unparseable LESM_STATIC_PASSKEY"),
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_key_sizes(self.min_key_size, self.max_key_size)
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "max_connections must be at least 1".to_string(),
            ));
        }
        if self.resolving_list_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "resolving_list_capacity must be at least 1".to_string(),
            ));
        }
        if self.private_address_timeout_secs == 0
            || self.private_address_timeout_secs > MAX_PRIVATE_ADDRESS_TIMEOUT_SECS
        {
            return Err(ConfigError::ValidationError(format!(
                "private_address_timeout_secs must be between 1 and {}",
                MAX_PRIVATE_ADDRESS_TIMEOUT_SECS
            )));
        }
        if let Some(passkey) = self.static_passkey {
            if passkey > MAX_PASSKEY {
                return Err(ConfigError::ValidationError(format!(
                    "static_passkey must be at most {}",
                    MAX_PASSKEY
                )));
            }
        }
        self.local_irk()?;
        Ok(())
    }

    /// Authentication requirements the local device offers.
    pub fn auth_requirements(&self) -> AuthRequirements {
        AuthRequirements {
            bonding: self.bonding,
            mitm: self.mitm,
            secure_connections: self.secure_connections,
            keypress: self.keypress,
            min_key_size: self.min_key_size,
            max_key_size: self.max_key_size,
        }
    }

    pub fn private_address_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.private_address_timeout_secs))
    }

    /// Decode the configured local IRK.
    pub fn local_irk(&self) -> Result<Option<Irk>, ConfigError> {
        let Some(text) = self.local_irk.as_deref() else {
            return Ok(None);
        };

        let bytes = Zeroizing::new(hex::decode(text.trim()).map_err(|_| {
            ConfigError::ValidationError("local_irk must be hex encoded".to_string())
        })?);
        let mut be: [u8; 16] = bytes.as_slice().try_into().map_err(|_| {
            ConfigError::ValidationError(format!(
                "local_irk must be 16 bytes, got {}",
                bytes.len()
            ))
        })?;
        let irk = Irk::from_be_bytes(be);
        be.iter_mut().for_each(|b| *b = 0);
        Ok(Some(irk))
    }
}

fn override_from_env<T: std::str::FromStr>(name: &str, target: &mut T) {
    if let Ok(value) = std::env::var(name) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(variable = name, value = %value, "ignoring unparseable environment override"),
        }
    }
}
