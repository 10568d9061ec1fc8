//! Flashloan wrapper parameters and repayment accounting.

use crate::actions::{abi, ActionCall, BalanceFlow};
use alloy::primitives::{Address, U256};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

/// Basis point denominator for flashloan fees.
const BPS: u64 = 10_000;

/// Lender the `TakeFlashloan` action borrows from.
///
/// The discriminant is the `uint8 provider` value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashloanProvider {
    /// Maker's flash mint module (DAI only, mainnet).
    DssFlash = 0,
    Balancer = 1,
}

impl FlashloanProvider {
    /// Fee charged by the provider, in basis points of the borrowed amount.
    pub fn default_fee_bps(self) -> u32 {
        match self {
            FlashloanProvider::DssFlash => 0,
            FlashloanProvider::Balancer => 0,
        }
    }
}

/// Parameters of one flashloan wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashloanParams {
    pub asset: Address,
    pub amount: U256,
    pub provider: FlashloanProvider,
    pub is_proxy_flashloan: bool,
    pub is_dpm_proxy: bool,
    pub fee_bps: u32,
}

impl FlashloanParams {
    /// Flashloan through a DPM proxy, charged the provider's default fee.
    pub fn new(provider: FlashloanProvider, asset: Address, amount: U256) -> Self {
        Self {
            asset,
            amount,
            provider,
            is_proxy_flashloan: true,
            is_dpm_proxy: true,
            fee_bps: provider.default_fee_bps(),
        }
    }

    /// Override the fee, for providers whose fee is set on chain.
    pub fn with_fee_bps(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    /// Fee owed on top of the principal, rounded up.
    pub fn fee(&self) -> U256 {
        let numerator = self.amount.saturating_mul(U256::from(self.fee_bps));
        let denominator = U256::from(BPS);
        numerator.saturating_add(denominator - U256::from(1)) / denominator
    }

    /// Principal plus fee: what the nested calls must hand back.
    pub fn required_repayment(&self) -> U256 {
        self.amount.saturating_add(self.fee())
    }

    /// Wire struct embedding the already-encoded nested calls.
    pub(crate) fn to_data(&self, calls: &[ActionCall]) -> abi::FlashloanData {
        abi::FlashloanData {
            amount: self.amount,
            asset: self.asset,
            isProxyFlashloan: self.is_proxy_flashloan,
            isDPMProxy: self.is_dpm_proxy,
            provider: self.provider as u8,
            calls: calls.iter().map(abi::Call::from).collect(),
        }
    }
}

/// Running balance of one asset while nested calls execute.
///
/// Signed, since an intermediate step may spend more than was borrowed before
/// a later step brings funds back.
#[derive(Debug, Clone)]
pub(crate) struct RepaymentLedger {
    asset: Address,
    balance: BigInt,
}

impl RepaymentLedger {
    /// Start with the borrowed principal on hand.
    pub(crate) fn new(params: &FlashloanParams) -> Self {
        Self {
            asset: params.asset,
            balance: BigInt::from(crate::utils::u256_to_biguint(params.amount)),
        }
    }

    pub(crate) fn apply(&mut self, flow: &BalanceFlow) {
        if flow.asset() != self.asset {
            return;
        }
        match flow {
            BalanceFlow::Inflow { amount, .. } => {
                self.balance += BigInt::from(crate::utils::u256_to_biguint(*amount));
            }
            BalanceFlow::Outflow { amount, .. } => {
                self.balance -= BigInt::from(crate::utils::u256_to_biguint(*amount));
            }
            BalanceFlow::Drain { .. } => {
                if self.balance.is_positive() {
                    self.balance.set_zero();
                }
            }
        }
    }

    pub(crate) fn balance(&self) -> &BigInt {
        &self.balance
    }

    pub(crate) fn covers(&self, required: U256) -> bool {
        self.balance >= BigInt::from(crate::utils::u256_to_biguint(required))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_rounds_up() {
        let params = FlashloanParams::new(FlashloanProvider::Balancer, Address::ZERO, U256::from(10_001))
            .with_fee_bps(5);
        // 10_001 * 5 / 10_000 = 5.0005 -> 6
        assert_eq!(params.fee(), U256::from(6));
        assert_eq!(params.required_repayment(), U256::from(10_007));
    }

    #[test]
    fn test_default_provider_fee_is_zero() {
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, Address::ZERO, U256::from(1_000));
        assert_eq!(params.fee(), U256::ZERO);
        assert_eq!(params.required_repayment(), U256::from(1_000));
    }

    #[test]
    fn test_ledger_tracks_only_loaned_asset() {
        let dai = Address::repeat_byte(0xda);
        let weth = Address::repeat_byte(0x0e);
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai, U256::from(100));
        let mut ledger = RepaymentLedger::new(&params);

        ledger.apply(&BalanceFlow::Outflow { asset: dai, amount: U256::from(100) });
        ledger.apply(&BalanceFlow::Inflow { asset: weth, amount: U256::from(5) });
        assert!(!ledger.covers(params.required_repayment()));

        ledger.apply(&BalanceFlow::Inflow { asset: dai, amount: U256::from(100) });
        assert!(ledger.covers(params.required_repayment()));

        ledger.apply(&BalanceFlow::Drain { asset: dai });
        assert!(ledger.balance().is_zero());
    }

    #[test]
    fn test_wire_provider_discriminant() {
        let params = FlashloanParams::new(FlashloanProvider::Balancer, Address::ZERO, U256::from(1));
        let data = params.to_data(&[]);
        assert_eq!(data.provider, 1);
        assert!(data.isDPMProxy);
        assert!(data.calls.is_empty());
    }
}
