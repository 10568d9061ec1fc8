//! Multiply strategies: flashloan-backed leverage changes.
//!
//! Increasing leverage flashloans the flashloan asset, parks it as collateral,
//! borrows the debt token against it, swaps the debt into collateral, deposits
//! the proceeds and finally withdraws the parked flashloan to repay it.
//! Decreasing runs the same loop backwards: park, withdraw collateral, swap it
//! into debt, pay the debt back, withdraw the park.

use super::{invalid, operation_name, StrategyContext};
use crate::actions::library::{self, SwapParams};
use crate::actions::ParamSource;
use crate::errors::Result;
use crate::operations::{BuiltOperation, OperationBuilder, OperationKind, StepSpec};
use crate::protocols::{PositionType, ProtocolVersion};
use crate::registry::OperationsDatabase;
use alloy::primitives::{Address, Bytes, U256};

const SWAP: &str = "swap";
const WITHDRAWN_COLLATERAL: &str = "withdrawn-collateral";

/// Input slot of `amount` in the swap, approval and deposit arguments.
const SWAP_AMOUNT_SLOT: usize = 2;
const APPROVAL_AMOUNT_SLOT: usize = 2;
const DEPOSIT_AMOUNT_SLOT: usize = 1;
const PAYBACK_AMOUNT_SLOT: usize = 1;

/// Aggregator quote for the swap inside a multiply operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub receive_at_least: U256,
    /// Swap fee in basis points.
    pub fee: U256,
    pub calldata: Bytes,
    pub collect_fee_in_from_token: bool,
}

impl SwapQuote {
    fn params(&self, from_asset: Address, to_asset: Address, amount: U256) -> SwapParams {
        SwapParams {
            from_asset,
            to_asset,
            amount,
            receive_at_least: self.receive_at_least,
            fee: self.fee,
            with_data: self.calldata.clone(),
            collect_fee_in_from_token: self.collect_fee_in_from_token,
        }
    }
}

/// Arguments of `open_multiply` and `adjust_risk_up`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplyIncreaseArgs {
    pub collateral: Address,
    pub debt: Address,
    /// Collateral the user adds on top of the swap proceeds.
    pub collateral_top_up: U256,
    /// Debt token the user adds to the swap input.
    pub debt_top_up: U256,
    /// The collateral top-up is sent as ETH and wrapped first.
    pub deposit_eth: bool,
    pub flashloan_amount: U256,
    pub borrow_amount: U256,
    pub swap: SwapQuote,
    /// Efficiency mode category to enter after opening, where supported.
    pub emode_category: Option<u8>,
}

/// Arguments of `close_multiply` and `adjust_risk_down`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplyDecreaseArgs {
    pub collateral: Address,
    pub debt: Address,
    pub flashloan_amount: U256,
    /// Collateral sold for debt. Closing withdraws everything and sells this
    /// much; adjusting withdraws exactly this much.
    pub collateral_amount: U256,
    pub swap: SwapQuote,
    /// Hand remaining WETH collateral back as ETH.
    pub receive_eth: bool,
}

pub fn open_multiply(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyIncreaseArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::OpenMultiply)?;
    let steps = increase_steps(name, protocol, ctx, args, true)?;
    OperationBuilder::new(database, name).steps(steps).build()
}

pub fn adjust_risk_up(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyIncreaseArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::AdjustRiskUp)?;
    let steps = increase_steps(name, protocol, ctx, args, false)?;
    OperationBuilder::new(database, name).steps(steps).build()
}

pub fn close_multiply(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyDecreaseArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::CloseMultiply)?;
    let steps = decrease_steps(name, protocol, ctx, args, true)?;
    OperationBuilder::new(database, name).steps(steps).build()
}

pub fn adjust_risk_down(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyDecreaseArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::AdjustRiskDown)?;
    let steps = decrease_steps(name, protocol, ctx, args, false)?;
    OperationBuilder::new(database, name).steps(steps).build()
}

fn increase_steps(
    name: &str,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyIncreaseArgs,
    open: bool,
) -> Result<Vec<StepSpec>> {
    if args.flashloan_amount.is_zero() {
        return Err(invalid(name, "flashloan amount must be positive"));
    }
    if args.borrow_amount.is_zero() {
        return Err(invalid(name, "borrow amount must be positive"));
    }
    if args.deposit_eth && args.collateral != ctx.weth {
        return Err(invalid(name, "only WETH collateral can be deposited as ETH"));
    }

    let flashloan = ctx.flashloan.params(args.flashloan_amount);
    let no_top_up = args.collateral_top_up.is_zero();
    let swap_amount = args.borrow_amount.saturating_add(args.debt_top_up);

    let mut children = vec![
        StepSpec::action(library::pull_token(args.debt, ctx.user, args.debt_top_up))
            .optional()
            .skip_if(args.debt_top_up.is_zero()),
        StepSpec::action(library::set_approval(
            flashloan.asset,
            ctx.lending_pool,
            flashloan.amount,
            false,
        )),
        StepSpec::action(library::deposit(protocol, flashloan.asset, flashloan.amount, false, true)),
        StepSpec::action(library::borrow(protocol, args.debt, args.borrow_amount, ctx.proxy)),
        StepSpec::action(library::swap(args.swap.params(args.debt, args.collateral, swap_amount)))
            .label(SWAP),
        StepSpec::action(
            library::set_approval(args.collateral, ctx.lending_pool, args.collateral_top_up, true)
                .map_slot(APPROVAL_AMOUNT_SLOT, ParamSource::label(SWAP)),
        ),
        StepSpec::action(
            library::deposit(protocol, args.collateral, args.collateral_top_up, true, true)
                .map_slot(DEPOSIT_AMOUNT_SLOT, ParamSource::label(SWAP)),
        ),
    ];

    if open {
        match (protocol.lending_actions().set_emode, args.emode_category) {
            (Some(_), category) => children.push(
                StepSpec::action(library::set_emode(protocol, category.unwrap_or_default())?)
                    .optional()
                    .skip_if(category.is_none()),
            ),
            (None, Some(category)) => {
                library::set_emode(protocol, category)?;
            }
            (None, None) => {}
        }
    }

    children.push(StepSpec::action(library::withdraw(
        protocol,
        flashloan.asset,
        flashloan.required_repayment(),
        ctx.proxy,
    )));

    let mut steps = vec![
        StepSpec::action(library::pull_token(args.collateral, ctx.user, args.collateral_top_up))
            .optional()
            .skip_if(no_top_up || args.deposit_eth),
        StepSpec::action(library::wrap_eth(ctx.weth, args.collateral_top_up))
            .optional()
            .skip_if(no_top_up || !args.deposit_eth),
        StepSpec::flashloan(flashloan, children),
    ];

    if open {
        steps.push(StepSpec::action(library::position_created(
            protocol,
            PositionType::Multiply.name(),
            args.collateral,
            args.debt,
        )));
    }

    Ok(steps)
}

fn decrease_steps(
    name: &str,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &MultiplyDecreaseArgs,
    close: bool,
) -> Result<Vec<StepSpec>> {
    if args.flashloan_amount.is_zero() {
        return Err(invalid(name, "flashloan amount must be positive"));
    }
    if args.collateral_amount.is_zero() {
        return Err(invalid(name, "collateral amount must be positive"));
    }
    if args.receive_eth && args.collateral != ctx.weth {
        return Err(invalid(name, "only WETH collateral can be returned as ETH"));
    }

    let flashloan = ctx.flashloan.params(args.flashloan_amount);
    let receive_at_least = args.swap.receive_at_least;

    let (withdraw_collateral, sell) = if close {
        (
            library::withdraw(protocol, args.collateral, U256::MAX, ctx.proxy),
            library::swap(args.swap.params(args.collateral, args.debt, args.collateral_amount)),
        )
    } else {
        (
            library::withdraw(protocol, args.collateral, args.collateral_amount, ctx.proxy),
            library::swap(args.swap.params(args.collateral, args.debt, args.collateral_amount))
                .map_slot(SWAP_AMOUNT_SLOT, ParamSource::label(WITHDRAWN_COLLATERAL)),
        )
    };

    let payback = if close {
        library::payback(protocol, args.debt, U256::MAX, true, ctx.proxy)
    } else {
        library::payback(protocol, args.debt, receive_at_least, false, ctx.proxy)
            .map_slot(PAYBACK_AMOUNT_SLOT, ParamSource::label(SWAP))
    };

    let children = vec![
        StepSpec::action(library::set_approval(
            flashloan.asset,
            ctx.lending_pool,
            flashloan.amount,
            false,
        )),
        StepSpec::action(library::deposit(protocol, flashloan.asset, flashloan.amount, false, true)),
        StepSpec::action(withdraw_collateral).label(WITHDRAWN_COLLATERAL),
        StepSpec::action(sell).label(SWAP),
        StepSpec::action(
            library::set_approval(args.debt, ctx.lending_pool, receive_at_least, false)
                .map_slot(APPROVAL_AMOUNT_SLOT, ParamSource::label(SWAP)),
        ),
        StepSpec::action(payback),
        StepSpec::action(library::withdraw(
            protocol,
            flashloan.asset,
            flashloan.required_repayment(),
            ctx.proxy,
        )),
    ];

    let returns = |step: StepSpec| if close { step } else { step.optional() };

    Ok(vec![
        StepSpec::flashloan(flashloan, children),
        StepSpec::action(library::unwrap_eth(ctx.weth, U256::MAX))
            .optional()
            .skip_if(!args.receive_eth),
        returns(StepSpec::action(library::return_funds(args.debt))),
        returns(StepSpec::action(library::return_funds(
            ctx.returned_asset(args.collateral, args.receive_eth),
        ))),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{abi, names};
    use crate::errors::{BuildError, OpsError, ResolverError};
    use crate::operations::strategies::fixtures::{context, DAI, USDC, WETH};
    use crate::utils::Network;
    use alloy::sol_types::{SolCall, SolValue};

    fn quote(receive_at_least: u64) -> SwapQuote {
        SwapQuote {
            receive_at_least: U256::from(receive_at_least),
            fee: U256::from(20),
            calldata: Bytes::from(vec![0xab; 8]),
            collect_fee_in_from_token: true,
        }
    }

    fn increase_args() -> MultiplyIncreaseArgs {
        MultiplyIncreaseArgs {
            collateral: WETH,
            debt: USDC,
            collateral_top_up: U256::from(10u64),
            debt_top_up: U256::ZERO,
            deposit_eth: false,
            flashloan_amount: U256::from(20_000u64),
            borrow_amount: U256::from(15_000u64),
            swap: quote(7),
            emode_category: None,
        }
    }

    fn decrease_args() -> MultiplyDecreaseArgs {
        MultiplyDecreaseArgs {
            collateral: WETH,
            debt: USDC,
            flashloan_amount: U256::from(20_000u64),
            collateral_amount: U256::from(5u64),
            swap: quote(9_000),
            receive_eth: false,
        }
    }

    fn skipped_names(built: &BuiltOperation) -> Vec<&str> {
        built
            .flat()
            .into_iter()
            .filter(|action| action.is_skipped())
            .map(|action| action.name())
            .collect()
    }

    #[test]
    fn test_every_multiply_strategy_matches_its_definition() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        for protocol in ProtocolVersion::ALL {
            let built = [
                open_multiply(&db, protocol, &ctx, &increase_args()).unwrap(),
                adjust_risk_up(&db, protocol, &ctx, &increase_args()).unwrap(),
                close_multiply(&db, protocol, &ctx, &decrease_args()).unwrap(),
                adjust_risk_down(&db, protocol, &ctx, &decrease_args()).unwrap(),
            ];
            for operation in built {
                let expected = db.operation_definition(&operation.name).unwrap();
                assert_eq!(&operation.definition, expected);
                assert_eq!(operation.fingerprint(), expected.fingerprint());
                assert_eq!(
                    expected.verify_calls(&operation.flat_calls()).unwrap(),
                    operation.executed_count()
                );
            }
        }
    }

    #[test]
    fn test_open_skips_unused_top_ups() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        let built = open_multiply(&db, ProtocolVersion::AaveV3, &ctx, &increase_args()).unwrap();
        assert_eq!(
            skipped_names(&built),
            vec![names::WRAP_ETH, names::PULL_TOKEN, names::AAVE_V3_SET_EMODE]
        );
        assert_eq!(built.executed_count(), built.definition.actions.len() - 3);

        let eth = MultiplyIncreaseArgs {
            deposit_eth: true,
            emode_category: Some(1),
            ..increase_args()
        };
        let built = open_multiply(&db, ProtocolVersion::AaveV3, &ctx, &eth).unwrap();
        assert_eq!(skipped_names(&built), vec![names::PULL_TOKEN, names::PULL_TOKEN]);
    }

    #[test]
    fn test_emode_rejected_on_aave_v2() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let args = MultiplyIncreaseArgs {
            emode_category: Some(1),
            ..increase_args()
        };

        assert!(matches!(
            open_multiply(&db, ProtocolVersion::AaveV2, &ctx, &args),
            Err(OpsError::Resolver(ResolverError::UnsupportedVersion { .. }))
        ));
    }

    #[test]
    fn test_flashloan_children_are_numbered_after_wrapper() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let built = adjust_risk_up(&db, ProtocolVersion::Spark, &ctx, &increase_args()).unwrap();

        let flat = built.flat();
        assert_eq!(flat[2].name(), names::TAKE_FLASHLOAN);
        assert_eq!(flat[2].children().len(), flat.len() - 3);
        assert_eq!(flat.last().unwrap().name(), names::SPARK_WITHDRAW);
    }

    #[test]
    fn test_debt_in_flashloan_asset_stays_balanced() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let args = MultiplyIncreaseArgs {
            debt: DAI,
            debt_top_up: U256::from(500u64),
            ..increase_args()
        };

        let built = open_multiply(&db, ProtocolVersion::AaveV3, &ctx, &args).unwrap();
        assert_eq!(built.flat()[3].name(), names::PULL_TOKEN);
        assert!(!built.flat()[3].is_skipped());
    }

    #[test]
    fn test_flashloan_fee_repaid_when_debt_is_loaned_asset() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let mut ctx = context(Network::Mainnet);
        ctx.flashloan.fee_bps = 9;
        // The close path drains the debt token, which is also the loaned asset,
        // so the repayment must come from the final withdraw alone.
        let args = MultiplyDecreaseArgs {
            debt: DAI,
            ..decrease_args()
        };

        let built = close_multiply(&db, ProtocolVersion::AaveV2, &ctx, &args).unwrap();
        assert_eq!(built.name, "CloseAAVEPosition");

        let mut broken = args.clone();
        broken.flashloan_amount = U256::ZERO;
        assert!(matches!(
            close_multiply(&db, ProtocolVersion::AaveV2, &ctx, &broken),
            Err(OpsError::Build(BuildError::InvalidArguments { .. }))
        ));
    }

    #[test]
    fn test_close_returns_eth() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let args = MultiplyDecreaseArgs {
            receive_eth: true,
            ..decrease_args()
        };

        let built = close_multiply(&db, ProtocolVersion::AaveV3, &ctx, &args).unwrap();
        assert!(skipped_names(&built).is_empty());
        assert_eq!(built.executed_count(), built.definition.actions.len());

        let usdc_collateral = MultiplyDecreaseArgs {
            collateral: USDC,
            debt: WETH,
            ..args
        };
        assert!(matches!(
            close_multiply(&db, ProtocolVersion::AaveV3, &ctx, &usdc_collateral),
            Err(OpsError::Build(BuildError::InvalidArguments { .. }))
        ));
    }

    #[test]
    fn test_protocols_not_deployed_are_rejected() {
        let db = OperationsDatabase::for_network(Network::Arbitrum);
        let ctx = context(Network::Arbitrum);

        assert!(open_multiply(&db, ProtocolVersion::AaveV3, &ctx, &increase_args()).is_ok());
        assert!(matches!(
            open_multiply(&db, ProtocolVersion::Spark, &ctx, &increase_args()),
            Err(OpsError::Resolver(ResolverError::NoOperationsForCategory { .. }))
        ));
    }

    fn params_map(action: &crate::actions::Action) -> Vec<u8> {
        abi::executeCall::abi_decode(&action.call().call_data)
            .unwrap()
            .paramsMap
    }

    #[test]
    fn test_open_maps_swap_output_into_collateral_deposit() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let built = open_multiply(&db, ProtocolVersion::AaveV3, &ctx, &increase_args()).unwrap();
        let flat = built.flat();

        assert_eq!(flat[7].name(), names::SWAP);
        assert_eq!(params_map(flat[7]), vec![0; 7]);
        assert_eq!(flat[8].name(), names::SET_APPROVAL);
        assert_eq!(params_map(flat[8]), vec![0, 0, 8, 0]);
        assert_eq!(flat[9].name(), names::AAVE_V3_DEPOSIT);
        assert_eq!(params_map(flat[9]), vec![0, 8, 0, 0]);

        // The wrapper carries the same call data for its children.
        let wrapper = abi::executeCall::abi_decode(&flat[2].call().call_data).unwrap();
        let data = abi::FlashloanData::abi_decode(&wrapper.data).unwrap();
        assert_eq!(data.calls[6].callData, flat[9].call().call_data);
    }

    #[test]
    fn test_adjust_down_maps_withdrawn_and_swapped_amounts() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let built = adjust_risk_down(&db, ProtocolVersion::AaveV3, &ctx, &decrease_args()).unwrap();
        let flat = built.flat();

        assert_eq!(flat[3].name(), names::AAVE_V3_WITHDRAW);
        assert_eq!(flat[4].name(), names::SWAP);
        assert_eq!(params_map(flat[4]), vec![0, 0, 4, 0, 0, 0, 0]);
        assert_eq!(params_map(flat[5]), vec![0, 0, 5, 0]);
        assert_eq!(flat[6].name(), names::AAVE_V3_PAYBACK);
        assert_eq!(params_map(flat[6]), vec![0, 5, 0, 0]);
        assert_eq!(params_map(flat[7]), vec![0, 0, 0]);
    }

    #[test]
    fn test_building_is_deterministic() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        let first = adjust_risk_down(&db, ProtocolVersion::AaveV3, &ctx, &decrease_args()).unwrap();
        let second = adjust_risk_down(&db, ProtocolVersion::AaveV3, &ctx, &decrease_args()).unwrap();
        assert_eq!(first.flat_calls(), second.flat_calls());
        assert_eq!(first.encode_execute_op(), second.encode_execute_op());
    }
}
