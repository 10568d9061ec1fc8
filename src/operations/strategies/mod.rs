//! Strategies: one composer per transaction a user can send.
//!
//! Each strategy turns numeric arguments into the step tree of one registered
//! operation and builds it against the database. Conditions that depend on the
//! arguments (no top-up, no borrow, ETH instead of WETH) never change the shape
//! of the call list; they mark optional steps skipped instead, so every result
//! matches its static definition position for position.

pub mod borrow;
pub mod multiply;

pub use borrow::{
    deposit_borrow, open_deposit_borrow, payback_withdraw, DepositBorrowArgs, PaybackWithdrawArgs,
};
pub use multiply::{
    adjust_risk_down, adjust_risk_up, close_multiply, open_multiply, MultiplyDecreaseArgs,
    MultiplyIncreaseArgs, SwapQuote,
};

use crate::actions::{FlashloanParams, FlashloanProvider};
use crate::errors::{BuildError, OpsError, ResolverError, Result};
use crate::operations::OperationKind;
use crate::protocols::ProtocolVersion;
use crate::registry::OperationsDatabase;
use crate::utils::Network;
use alloy::primitives::{Address, U256};

/// Where multiply strategies borrow their flashloan from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashloanSource {
    pub provider: FlashloanProvider,
    pub asset: Address,
    pub fee_bps: u32,
}

impl FlashloanSource {
    /// Maker's flash mint on mainnet, Balancer everywhere else.
    pub fn default_for(network: Network, asset: Address) -> Self {
        let provider = match network {
            Network::Mainnet => FlashloanProvider::DssFlash,
            _ => FlashloanProvider::Balancer,
        };
        Self {
            provider,
            asset,
            fee_bps: provider.default_fee_bps(),
        }
    }

    pub fn params(&self, amount: U256) -> FlashloanParams {
        FlashloanParams::new(self.provider, self.asset, amount).with_fee_bps(self.fee_bps)
    }
}

/// Addresses every strategy needs, for one user position on one protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyContext {
    /// DPM proxy that executes the operation and owns the position.
    pub proxy: Address,
    /// Owner of the proxy; pulls come from and returns go to this address.
    pub user: Address,
    pub weth: Address,
    /// Lending pool the deposit and payback approvals are granted to.
    pub lending_pool: Address,
    pub flashloan: FlashloanSource,
}

impl StrategyContext {
    /// Address that receives funds handed back to the user: the ETH sentinel
    /// when the asset was unwrapped, the token otherwise.
    pub(crate) fn returned_asset(&self, asset: Address, unwrapped: bool) -> Address {
        if unwrapped && asset == self.weth {
            crate::utils::ETH_ADDRESS
        } else {
            asset
        }
    }
}

/// Registry name of `kind` for `protocol`, provided the protocol is deployed
/// on the database's network.
pub(crate) fn operation_name(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    kind: OperationKind,
) -> Result<&'static str> {
    if !protocol.is_deployed_on(database.network()) {
        return Err(ResolverError::NoOperationsForCategory {
            protocol: format!("{} on {}", protocol, database.network()),
            category: kind.to_string(),
        }
        .into());
    }
    Ok(kind.operation_name(protocol))
}

pub(crate) fn invalid(operation: &str, reason: &str) -> OpsError {
    BuildError::InvalidArguments {
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) const DAI: Address = Address::repeat_byte(0xda);
    pub(crate) const WETH: Address = Address::repeat_byte(0x0e);
    pub(crate) const USDC: Address = Address::repeat_byte(0xc0);

    pub(crate) fn context(network: Network) -> StrategyContext {
        StrategyContext {
            proxy: Address::repeat_byte(0x11),
            user: Address::repeat_byte(0x22),
            weth: WETH,
            lending_pool: Address::repeat_byte(0x33),
            flashloan: FlashloanSource::default_for(network, DAI),
        }
    }
}
