//! Local device privacy: the identity distributed to peers and the
//! resolvable private addresses generated from it.

use std::time::Duration;

use lesm_crypto::{ah, AddressType, BdAddr, IdentityInfo, Irk};

use crate::config::{EngineConfig, MAX_PRIVATE_ADDRESS_TIMEOUT_SECS};
use crate::errors::SecurityError;

/// Local identity and address rotation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPrivacy {
    pub irk: Irk,
    pub identity_type: AddressType,
    pub identity_address: BdAddr,
    /// Interval at which the controller rotates the private address
    pub address_timeout: Duration,
}

impl LocalPrivacy {
    /// Privacy settings from the configured IRK and address timeout, or
    /// `None` when no local IRK is configured.
    pub fn from_config(
        config: &EngineConfig,
        identity_type: AddressType,
        identity_address: BdAddr,
    ) -> Result<Option<Self>, SecurityError> {
        let irk = config
            .local_irk()
            .map_err(|e| SecurityError::InvalidParameter(e.to_string()))?;

        Ok(irk.map(|irk| Self {
            irk,
            identity_type,
            identity_address,
            address_timeout: config.private_address_timeout(),
        }))
    }

    pub fn validate(&self) -> Result<(), SecurityError> {
        let secs = self.address_timeout.as_secs();
        if secs == 0 || secs > u64::from(MAX_PRIVATE_ADDRESS_TIMEOUT_SECS) {
            return Err(SecurityError::InvalidParameter(format!(
                "private address timeout must be between 1 and {} seconds",
                MAX_PRIVATE_ADDRESS_TIMEOUT_SECS
            )));
        }
        if self.irk.is_zero() {
            return Err(SecurityError::InvalidParameter(
                "local IRK must not be all zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Identity information handed to peers during key distribution.
    pub fn identity(&self) -> IdentityInfo {
        IdentityInfo {
            irk: self.irk.clone(),
            address_type: self.identity_type,
            address: self.identity_address,
        }
    }

    /// Fresh resolvable private address for the local device.
    pub fn resolvable_address(&self) -> BdAddr {
        ah::generate(&self.irk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn privacy() -> LocalPrivacy {
        LocalPrivacy {
            irk: Irk::from_le_bytes([0x42; 16]),
            identity_type: AddressType::RandomStatic,
            identity_address: BdAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0xC6]),
            address_timeout: Duration::from_secs(900),
        }
    }

    #[test]
    fn test_resolvable_address_resolves_with_own_irk() {
        let privacy = privacy();
        let address = privacy.resolvable_address();

        assert!(address.is_resolvable_private());
        assert!(ah::resolve(&address, &privacy.irk));
    }

    #[test]
    fn test_identity_carries_address() {
        let identity = privacy().identity();
        assert_eq!(identity.address_type, AddressType::RandomStatic);
        assert_eq!(identity.address.raw()[5], 0xC6);
        assert_eq!(identity.irk, Irk::from_le_bytes([0x42; 16]));
    }

    #[test]
    fn test_validate() {
        assert!(privacy().validate().is_ok());

        let mut bad = privacy();
        bad.address_timeout = Duration::ZERO;
        assert!(bad.validate().is_err());

        let mut bad = privacy();
        bad.irk = Irk::default();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_from_config() {
        let address = BdAddr::new([0; 6]);
        assert!(LocalPrivacy::from_config(&EngineConfig::default(), AddressType::Public, address)
            .unwrap()
            .is_none());

        let config = EngineConfig {
            local_irk: Some("ec0234a357c8ad05341010a60a397d9b".to_string()),
            private_address_timeout_secs: 60,
            ..Default::default()
        };
        let privacy = LocalPrivacy::from_config(&config, AddressType::Public, address)
            .unwrap()
            .unwrap();
        assert_eq!(privacy.address_timeout, Duration::from_secs(60));
        assert_eq!(privacy.irk.as_le_bytes()[0], 0x9b);
    }
}
