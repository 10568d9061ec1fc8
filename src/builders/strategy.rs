//! Builder pattern for StrategyContext

use crate::actions::names;
use crate::config::DeploymentConfig;
use crate::errors::{ConfigError, Result};
use crate::operations::strategies::{FlashloanSource, StrategyContext};
use crate::protocols::ProtocolVersion;
use crate::utils::Network;
use alloy::primitives::Address;

/// Resolves a `StrategyContext` from deployment records.
///
/// The proxy and user are per position and always given explicitly; WETH, the
/// lending pool and the flashloan asset come from the deployment file unless
/// overridden.
pub struct StrategyContextBuilder<'a> {
    deployment: &'a DeploymentConfig,
    network: Network,
    protocol: ProtocolVersion,
    proxy: Option<Address>,
    user: Option<Address>,
    flashloan_asset: Option<Address>,
    flashloan_fee_bps: Option<u32>,
}

impl<'a> StrategyContextBuilder<'a> {
    pub fn new(deployment: &'a DeploymentConfig, network: Network, protocol: ProtocolVersion) -> Self {
        Self {
            deployment,
            network,
            protocol,
            proxy: None,
            user: None,
            flashloan_asset: None,
            flashloan_fee_bps: None,
        }
    }

    pub fn proxy(mut self, proxy: Address) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn user(mut self, user: Address) -> Self {
        self.user = Some(user);
        self
    }

    /// Flashloan another asset than DAI.
    pub fn flashloan_asset(mut self, asset: Address) -> Self {
        self.flashloan_asset = Some(asset);
        self
    }

    pub fn flashloan_fee_bps(mut self, fee_bps: u32) -> Self {
        self.flashloan_fee_bps = Some(fee_bps);
        self
    }

    /// Build the StrategyContext
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Incomplete` without proxy or user, and
    /// `ConfigError::MissingContract` / `MissingNetwork` when a required
    /// record is absent from the deployment file.
    pub fn build(self) -> Result<StrategyContext> {
        let proxy = self.proxy.ok_or_else(|| ConfigError::Incomplete {
            message: "proxy address is required to build StrategyContext".to_string(),
        })?;
        let user = self.user.ok_or_else(|| ConfigError::Incomplete {
            message: "user address is required to build StrategyContext".to_string(),
        })?;

        let weth = self.deployment.address(self.network, names::WETH)?;
        let lending_pool = self
            .deployment
            .address(self.network, self.protocol.lending_pool_service())?;
        let flashloan_asset = match self.flashloan_asset {
            Some(asset) => asset,
            None => self.deployment.address(self.network, names::DAI)?,
        };

        let mut flashloan = FlashloanSource::default_for(self.network, flashloan_asset);
        if let Some(fee_bps) = self.flashloan_fee_bps {
            flashloan.fee_bps = fee_bps;
        }

        tracing::debug!(
            network = %self.network,
            protocol = %self.protocol,
            proxy = %proxy,
            lending_pool = %lending_pool,
            flashloan_provider = ?flashloan.provider,
            "Resolved strategy context"
        );

        Ok(StrategyContext {
            proxy,
            user,
            weth,
            lending_pool,
            flashloan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::FlashloanProvider;

    const DEPLOYMENT: &str = r#"{
        "mainnet": {
            "WETH": { "name": "WETH", "address": "0x0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e", "deploy": false, "serviceRegistryName": "WETH" },
            "DAI": { "name": "DAI", "address": "0xdadadadadadadadadadadadadadadadadadadada", "deploy": false, "serviceRegistryName": "DAI" },
            "AavePool": { "name": "AavePool", "address": "0x3333333333333333333333333333333333333333", "deploy": false, "serviceRegistryName": "AavePool" }
        },
        "base": {
            "WETH": { "name": "WETH", "address": "0x0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e0e", "deploy": false }
        }
    }"#;

    #[test]
    fn test_context_from_deployment() {
        let deployment = DeploymentConfig::from_json(DEPLOYMENT).unwrap();
        let ctx = StrategyContextBuilder::new(&deployment, Network::Mainnet, ProtocolVersion::AaveV3)
            .proxy(Address::repeat_byte(0x11))
            .user(Address::repeat_byte(0x22))
            .build()
            .unwrap();

        assert_eq!(ctx.weth, Address::repeat_byte(0x0e));
        assert_eq!(ctx.lending_pool, Address::repeat_byte(0x33));
        assert_eq!(ctx.flashloan.asset, Address::repeat_byte(0xda));
        assert_eq!(ctx.flashloan.provider, FlashloanProvider::DssFlash);
    }

    #[test]
    fn test_missing_records_and_fields() {
        let deployment = DeploymentConfig::from_json(DEPLOYMENT).unwrap();

        let no_user = StrategyContextBuilder::new(&deployment, Network::Mainnet, ProtocolVersion::AaveV3)
            .proxy(Address::repeat_byte(0x11))
            .build();
        assert!(no_user.is_err());

        // Base has no AAVE pool record.
        let no_pool = StrategyContextBuilder::new(&deployment, Network::Base, ProtocolVersion::AaveV3)
            .proxy(Address::repeat_byte(0x11))
            .user(Address::repeat_byte(0x22))
            .flashloan_asset(Address::repeat_byte(0xc0))
            .build();
        assert!(matches!(
            no_pool,
            Err(crate::errors::OpsError::Config(ConfigError::MissingContract { .. }))
        ));
    }
}
