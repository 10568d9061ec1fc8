//! Typed constructors for the executor's actions.
//!
//! Each constructor returns an `ActionStep`: the registry name, the encoded
//! arguments, the expected balance flows and an all-literal parameter mapping
//! that callers override slot by slot with `map_slot`.
//!
//! Flows that depend on the amount slot are kept as `Movement`s and settled
//! by the builder once the mapping is known, so a mapped amount is charged
//! at the value the referenced step stores rather than at the literal.

use crate::actions::abi::{
    BorrowData, DepositData, PaybackData, PositionCreatedData, PullTokenData, ReturnFundsData,
    SendTokenData, SetApprovalData, SetEModeData, SwapData, UnwrapEthData, WithdrawData,
    WrapEthData,
};
use crate::actions::encoder::{ActionData, ActionEncoder, ActionResolver};
use crate::actions::{names, ActionCall, BalanceFlow, Movement, ParamSource, StepOutput};
use crate::errors::{ResolverError, Result};
use crate::protocols::ProtocolVersion;
use crate::utils::ETH_ADDRESS;
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolValue;

/// Encoded arguments of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepArgs {
    /// ABI-encoded from a `sol!` struct.
    Typed { encoded: Bytes, slots: usize },
    /// Runtime-typed arguments, checked when encoded.
    Dynamic {
        types: Vec<DynSolType>,
        values: Vec<DynSolValue>,
    },
}

impl StepArgs {
    pub fn slots(&self) -> usize {
        match self {
            StepArgs::Typed { slots, .. } => *slots,
            StepArgs::Dynamic { types, .. } => types.len(),
        }
    }
}

/// The input slot carrying the amount a step moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountSlot {
    pub slot: usize,
    pub literal: U256,
    pub movements: Vec<Movement>,
}

/// One action ready to be placed in an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStep {
    pub name: String,
    pub args: StepArgs,
    pub amount: Option<AmountSlot>,
    /// Balance changes independent of the amount slot.
    pub flows: Vec<BalanceFlow>,
    pub output: StepOutput,
    pub mapping: Vec<ParamSource>,
}

impl ActionStep {
    /// Step from a typed argument struct, with the struct's balance flows.
    pub fn typed<D: ActionData>(name: impl Into<String>, data: D) -> Self {
        let amount = D::AMOUNT_SLOT.map(|slot| AmountSlot {
            slot,
            literal: data.amount(),
            movements: data.movements(),
        });
        let flows = data.flows();
        let output = data.output();
        Self {
            name: name.into(),
            args: StepArgs::Typed {
                encoded: Bytes::from(data.abi_encode()),
                slots: D::SLOTS,
            },
            amount,
            flows,
            output,
            mapping: vec![ParamSource::Literal; D::SLOTS],
        }
    }

    /// Step from runtime-typed arguments. Balance flows must be declared with
    /// `with_flows` when the step moves the loaned asset.
    pub fn dynamic(name: impl Into<String>, types: Vec<DynSolType>, values: Vec<DynSolValue>) -> Self {
        let slots = types.len();
        Self {
            name: name.into(),
            args: StepArgs::Dynamic { types, values },
            amount: None,
            flows: Vec::new(),
            output: StepOutput::Nothing,
            mapping: vec![ParamSource::Literal; slots],
        }
    }

    pub fn with_flows(mut self, flows: Vec<BalanceFlow>) -> Self {
        self.flows = flows;
        self
    }

    /// Replace the assets moved by the amount slot. No-op for steps without one.
    pub fn with_movements(mut self, movements: Vec<Movement>) -> Self {
        if let Some(amount) = &mut self.amount {
            amount.movements = movements;
        }
        self
    }

    /// Amount the step moves under `mapping`, given the outputs stored by
    /// earlier positions (index `n - 1` for position `n`).
    ///
    /// `None` when the amount is only known on chain: an unknown output, or
    /// `U256::MAX`, which the executor reads as "everything".
    pub(crate) fn settled_amount(&self, mapping: &[u8], outputs: &[Option<U256>]) -> Option<U256> {
        let amount = self.amount.as_ref()?;
        let value = match mapping.get(amount.slot).copied().unwrap_or(0) {
            0 => Some(amount.literal),
            reference => outputs.get(usize::from(reference) - 1).copied().flatten(),
        }?;
        (value != U256::MAX).then_some(value)
    }

    pub(crate) fn flows_for(&self, amount: Option<U256>) -> Vec<BalanceFlow> {
        self.amount
            .iter()
            .flat_map(|slot| slot.movements.iter().filter_map(move |movement| movement.settle(amount)))
            .chain(self.flows.iter().copied())
            .collect()
    }

    pub(crate) fn output_for(&self, amount: Option<U256>) -> Option<U256> {
        match self.output {
            StepOutput::Nothing => None,
            StepOutput::Amount => amount,
            StepOutput::Fixed(value) => Some(value),
        }
    }

    /// Balance changes with every slot at its literal value.
    pub fn literal_flows(&self) -> Vec<BalanceFlow> {
        self.flows_for(self.settled_amount(&[], &[]))
    }

    /// Take input slot `slot` from `source` instead of the literal value.
    ///
    /// A slot past the end grows the mapping, which the encoder then rejects.
    pub fn map_slot(mut self, slot: usize, source: ParamSource) -> Self {
        if slot >= self.mapping.len() {
            self.mapping.resize(slot + 1, ParamSource::Literal);
        }
        self.mapping[slot] = source;
        self
    }

    pub(crate) fn encode<R: ActionResolver + ?Sized>(
        &self,
        encoder: &ActionEncoder<'_, R>,
        mapping: &[u8],
    ) -> Result<ActionCall> {
        match &self.args {
            StepArgs::Typed { encoded, slots } => {
                encoder.encode_prepared(&self.name, encoded, *slots, Some(mapping))
            }
            StepArgs::Dynamic { types, values } => {
                encoder.encode(&self.name, types, values, Some(mapping))
            }
        }
    }
}

impl ActionData for PullTokenData {
    const SLOTS: usize = 3;
    const AMOUNT_SLOT: Option<usize> = Some(2);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::In(self.asset)]
    }
}

impl ActionData for SendTokenData {
    const SLOTS: usize = 3;
    const AMOUNT_SLOT: Option<usize> = Some(2);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::Out(self.asset)]
    }
}

impl ActionData for SetApprovalData {
    const SLOTS: usize = 4;
}

impl ActionData for SwapData {
    const SLOTS: usize = 7;
    const AMOUNT_SLOT: Option<usize> = Some(2);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::Out(self.fromAsset)]
    }

    fn flows(&self) -> Vec<BalanceFlow> {
        vec![BalanceFlow::Inflow {
            asset: self.toAsset,
            amount: self.receiveAtLeast,
        }]
    }

    /// Only the minimum received is known before execution.
    fn output(&self) -> StepOutput {
        StepOutput::Fixed(self.receiveAtLeast)
    }
}

impl ActionData for WrapEthData {
    const SLOTS: usize = 1;
    const AMOUNT_SLOT: Option<usize> = Some(0);

    fn amount(&self) -> U256 {
        self.amount
    }
}

impl ActionData for UnwrapEthData {
    const SLOTS: usize = 1;
    const AMOUNT_SLOT: Option<usize> = Some(0);

    fn amount(&self) -> U256 {
        self.amount
    }
}

impl ActionData for ReturnFundsData {
    const SLOTS: usize = 1;

    fn flows(&self) -> Vec<BalanceFlow> {
        vec![BalanceFlow::Drain { asset: self.asset }]
    }
}

impl ActionData for PositionCreatedData {
    const SLOTS: usize = 4;
}

impl ActionData for DepositData {
    const SLOTS: usize = 4;
    const AMOUNT_SLOT: Option<usize> = Some(1);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::Out(self.asset)]
    }
}

impl ActionData for BorrowData {
    const SLOTS: usize = 3;
    const AMOUNT_SLOT: Option<usize> = Some(1);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::In(self.asset)]
    }
}

impl ActionData for WithdrawData {
    const SLOTS: usize = 3;
    const AMOUNT_SLOT: Option<usize> = Some(1);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::In(self.asset)]
    }
}

impl ActionData for PaybackData {
    const SLOTS: usize = 4;
    const AMOUNT_SLOT: Option<usize> = Some(1);

    fn amount(&self) -> U256 {
        self.amount
    }

    fn movements(&self) -> Vec<Movement> {
        vec![Movement::Out(self.asset)]
    }
}

impl ActionData for SetEModeData {
    const SLOTS: usize = 1;
}

impl ActionData for crate::actions::abi::FlashloanData {
    const SLOTS: usize = 6;
}

pub fn pull_token(asset: Address, from: Address, amount: U256) -> ActionStep {
    ActionStep::typed(names::PULL_TOKEN, PullTokenData { asset, from, amount })
}

pub fn send_token(asset: Address, to: Address, amount: U256) -> ActionStep {
    ActionStep::typed(names::SEND_TOKEN, SendTokenData { asset, to, amount })
}

pub fn set_approval(asset: Address, delegate: Address, amount: U256, sum_amounts: bool) -> ActionStep {
    ActionStep::typed(
        names::SET_APPROVAL,
        SetApprovalData {
            asset,
            delegate,
            amount,
            sumAmounts: sum_amounts,
        },
    )
}

/// Swap parameters; `receive_at_least` is what the balance check credits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapParams {
    pub from_asset: Address,
    pub to_asset: Address,
    pub amount: U256,
    pub receive_at_least: U256,
    /// Fee in basis points charged by the swap contract.
    pub fee: U256,
    /// Aggregator calldata.
    pub with_data: Bytes,
    pub collect_fee_in_from_token: bool,
}

pub fn swap(params: SwapParams) -> ActionStep {
    ActionStep::typed(
        names::SWAP,
        SwapData {
            fromAsset: params.from_asset,
            toAsset: params.to_asset,
            amount: params.amount,
            receiveAtLeast: params.receive_at_least,
            fee: params.fee,
            withData: params.with_data,
            collectFeeInFromToken: params.collect_fee_in_from_token,
        },
    )
}

pub fn wrap_eth(weth: Address, amount: U256) -> ActionStep {
    ActionStep::typed(names::WRAP_ETH, WrapEthData { amount })
        .with_movements(vec![Movement::Out(ETH_ADDRESS), Movement::In(weth)])
}

pub fn unwrap_eth(weth: Address, amount: U256) -> ActionStep {
    ActionStep::typed(names::UNWRAP_ETH, UnwrapEthData { amount })
        .with_movements(vec![Movement::Out(weth), Movement::In(ETH_ADDRESS)])
}

pub fn return_funds(asset: Address) -> ActionStep {
    ActionStep::typed(names::RETURN_FUNDS, ReturnFundsData { asset })
}

pub fn position_created(
    protocol: ProtocolVersion,
    position_type: &str,
    collateral_token: Address,
    debt_token: Address,
) -> ActionStep {
    ActionStep::typed(
        names::POSITION_CREATED,
        PositionCreatedData {
            protocol: protocol.event_name().to_string(),
            positionType: position_type.to_string(),
            collateralToken: collateral_token,
            debtToken: debt_token,
        },
    )
}

pub fn deposit(
    protocol: ProtocolVersion,
    asset: Address,
    amount: U256,
    sum_amounts: bool,
    set_as_collateral: bool,
) -> ActionStep {
    ActionStep::typed(
        protocol.lending_actions().deposit,
        DepositData {
            asset,
            amount,
            sumAmounts: sum_amounts,
            setAsCollateral: set_as_collateral,
        },
    )
}

pub fn borrow(protocol: ProtocolVersion, asset: Address, amount: U256, to: Address) -> ActionStep {
    ActionStep::typed(
        protocol.lending_actions().borrow,
        BorrowData { asset, amount, to },
    )
}

pub fn withdraw(protocol: ProtocolVersion, asset: Address, amount: U256, to: Address) -> ActionStep {
    ActionStep::typed(
        protocol.lending_actions().withdraw,
        WithdrawData { asset, amount, to },
    )
}

pub fn payback(
    protocol: ProtocolVersion,
    asset: Address,
    amount: U256,
    payback_all: bool,
    on_behalf: Address,
) -> ActionStep {
    ActionStep::typed(
        protocol.lending_actions().payback,
        PaybackData {
            asset,
            amount,
            paybackAll: payback_all,
            onBehalf: on_behalf,
        },
    )
}

/// # Errors
///
/// Returns `ResolverError::UnsupportedVersion` for protocols without
/// efficiency mode.
pub fn set_emode(protocol: ProtocolVersion, category_id: u8) -> Result<ActionStep> {
    let name = protocol
        .lending_actions()
        .set_emode
        .ok_or_else(|| ResolverError::UnsupportedVersion {
            protocol: protocol.to_string(),
            version: "emode".to_string(),
        })?;
    Ok(ActionStep::typed(name, SetEModeData { categoryId: category_id }))
}
