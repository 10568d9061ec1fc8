//! Borrow strategies: plain deposit/borrow and payback/withdraw, no flashloan.

use super::{invalid, operation_name, StrategyContext};
use crate::actions::library;
use crate::errors::Result;
use crate::operations::{BuiltOperation, OperationBuilder, OperationKind, StepSpec};
use crate::protocols::{PositionType, ProtocolVersion};
use crate::registry::OperationsDatabase;
use alloy::primitives::{Address, U256};

/// Arguments of `open_deposit_borrow` and `deposit_borrow`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositBorrowArgs {
    pub collateral: Address,
    pub debt: Address,
    pub deposit_amount: U256,
    pub borrow_amount: U256,
    /// The deposit is sent as ETH and wrapped first.
    pub deposit_eth: bool,
    /// Borrowed WETH is unwrapped and handed out as ETH.
    pub receive_eth: bool,
}

/// Arguments of `payback_withdraw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaybackWithdrawArgs {
    pub collateral: Address,
    pub debt: Address,
    pub payback_amount: U256,
    /// Repay the whole debt; `payback_amount` must cover it.
    pub payback_all: bool,
    pub withdraw_amount: U256,
    /// The payback is sent as ETH and wrapped first.
    pub payback_eth: bool,
    /// Withdrawn WETH is unwrapped and handed out as ETH.
    pub receive_eth: bool,
}

/// Open a borrow position. The deposit is mandatory; a zero borrow skips the
/// borrow stage and its hand-out.
pub fn open_deposit_borrow(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &DepositBorrowArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::OpenDepositBorrow)?;
    if args.deposit_amount.is_zero() {
        return Err(invalid(name, "opening a position requires a deposit"));
    }

    let mut steps = deposit_borrow_steps(name, protocol, ctx, args)?;
    steps.push(StepSpec::action(library::position_created(
        protocol,
        PositionType::Borrow.name(),
        args.collateral,
        args.debt,
    )));

    OperationBuilder::new(database, name).steps(steps).build()
}

/// Add collateral, borrow more, or both, on an existing position.
pub fn deposit_borrow(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &DepositBorrowArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::DepositBorrow)?;
    if args.deposit_amount.is_zero() && args.borrow_amount.is_zero() {
        return Err(invalid(name, "nothing to deposit or borrow"));
    }

    let steps = deposit_borrow_steps(name, protocol, ctx, args)?
        .into_iter()
        .map(StepSpec::optional)
        .collect::<Vec<_>>();

    OperationBuilder::new(database, name).steps(steps).build()
}

/// Repay debt, withdraw collateral, or both.
pub fn payback_withdraw(
    database: &OperationsDatabase,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &PaybackWithdrawArgs,
) -> Result<BuiltOperation> {
    let name = operation_name(database, protocol, OperationKind::PaybackWithdraw)?;
    if args.payback_amount.is_zero() && args.withdraw_amount.is_zero() {
        return Err(invalid(name, "nothing to pay back or withdraw"));
    }
    if args.payback_eth && args.debt != ctx.weth {
        return Err(invalid(name, "only WETH debt can be paid back with ETH"));
    }
    if args.receive_eth && args.collateral != ctx.weth {
        return Err(invalid(name, "only WETH collateral can be returned as ETH"));
    }

    let paying = !args.payback_amount.is_zero();
    let withdrawing = !args.withdraw_amount.is_zero();
    let unwrapping = withdrawing && args.receive_eth;
    // The pool only takes what is owed; a full payback hands the rest back.
    let payback_amount = if args.payback_all {
        U256::MAX
    } else {
        args.payback_amount
    };

    let steps = vec![
        StepSpec::action(library::pull_token(args.debt, ctx.user, args.payback_amount))
            .skip_if(!paying || args.payback_eth),
        StepSpec::action(library::wrap_eth(ctx.weth, args.payback_amount))
            .skip_if(!paying || !args.payback_eth),
        StepSpec::action(library::set_approval(
            args.debt,
            ctx.lending_pool,
            args.payback_amount,
            false,
        ))
        .skip_if(!paying),
        StepSpec::action(library::payback(
            protocol,
            args.debt,
            payback_amount,
            args.payback_all,
            ctx.proxy,
        ))
        .skip_if(!paying),
        StepSpec::action(library::withdraw(
            protocol,
            args.collateral,
            args.withdraw_amount,
            ctx.proxy,
        ))
        .skip_if(!withdrawing),
        StepSpec::action(library::unwrap_eth(ctx.weth, U256::MAX)).skip_if(!unwrapping),
        StepSpec::action(library::return_funds(args.debt)).skip_if(!args.payback_all),
        StepSpec::action(library::return_funds(
            ctx.returned_asset(args.collateral, unwrapping),
        ))
        .skip_if(!withdrawing),
    ]
    .into_iter()
    .map(StepSpec::optional)
    .collect::<Vec<_>>();

    OperationBuilder::new(database, name).steps(steps).build()
}

/// Pull or wrap, approve, deposit, borrow, unwrap, return. The deposit and
/// approval are left mandatory; `deposit_borrow` relaxes them.
fn deposit_borrow_steps(
    name: &str,
    protocol: ProtocolVersion,
    ctx: &StrategyContext,
    args: &DepositBorrowArgs,
) -> Result<Vec<StepSpec>> {
    if args.deposit_eth && args.collateral != ctx.weth {
        return Err(invalid(name, "only WETH collateral can be deposited as ETH"));
    }
    if args.receive_eth && args.debt != ctx.weth {
        return Err(invalid(name, "only WETH debt can be received as ETH"));
    }

    let depositing = !args.deposit_amount.is_zero();
    let borrowing = !args.borrow_amount.is_zero();
    let unwrapping = borrowing && args.receive_eth;

    Ok(vec![
        StepSpec::action(library::pull_token(args.collateral, ctx.user, args.deposit_amount))
            .optional()
            .skip_if(!depositing || args.deposit_eth),
        StepSpec::action(library::wrap_eth(ctx.weth, args.deposit_amount))
            .optional()
            .skip_if(!depositing || !args.deposit_eth),
        StepSpec::action(library::set_approval(
            args.collateral,
            ctx.lending_pool,
            args.deposit_amount,
            false,
        ))
        .skip_if(!depositing),
        StepSpec::action(library::deposit(
            protocol,
            args.collateral,
            args.deposit_amount,
            false,
            true,
        ))
        .skip_if(!depositing),
        StepSpec::action(library::borrow(protocol, args.debt, args.borrow_amount, ctx.proxy))
            .optional()
            .skip_if(!borrowing),
        StepSpec::action(library::unwrap_eth(ctx.weth, args.borrow_amount))
            .optional()
            .skip_if(!unwrapping),
        StepSpec::action(library::return_funds(
            ctx.returned_asset(args.debt, unwrapping),
        ))
        .optional()
        .skip_if(!borrowing),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::names;
    use crate::errors::{BuildError, OpsError};
    use crate::operations::strategies::fixtures::{context, DAI, USDC, WETH};
    use crate::utils::Network;

    fn deposit_args(borrow_amount: u64) -> DepositBorrowArgs {
        DepositBorrowArgs {
            collateral: WETH,
            debt: DAI,
            deposit_amount: U256::from(2_000_000_000_000_000_000u128),
            borrow_amount: U256::from(borrow_amount),
            deposit_eth: false,
            receive_eth: false,
        }
    }

    fn payback_args() -> PaybackWithdrawArgs {
        PaybackWithdrawArgs {
            collateral: WETH,
            debt: USDC,
            payback_amount: U256::from(1_000u64),
            payback_all: false,
            withdraw_amount: U256::from(3u64),
            payback_eth: false,
            receive_eth: false,
        }
    }

    fn stages(built: &BuiltOperation) -> Vec<(&str, bool)> {
        built
            .flat()
            .into_iter()
            .map(|action| (action.name(), action.is_skipped()))
            .collect()
    }

    #[test]
    fn test_every_borrow_strategy_matches_its_definition() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        for protocol in ProtocolVersion::ALL {
            let built = [
                open_deposit_borrow(&db, protocol, &ctx, &deposit_args(500)).unwrap(),
                deposit_borrow(&db, protocol, &ctx, &deposit_args(500)).unwrap(),
                payback_withdraw(&db, protocol, &ctx, &payback_args()).unwrap(),
            ];
            for operation in built {
                let expected = db.operation_definition(&operation.name).unwrap();
                assert_eq!(&operation.definition, expected);
                assert_eq!(operation.fingerprint(), expected.fingerprint());
            }
        }
    }

    #[test]
    fn test_open_deposit_borrow_with_zero_borrow() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        let built = open_deposit_borrow(&db, ProtocolVersion::AaveV3, &ctx, &deposit_args(0)).unwrap();

        assert_eq!(built.name, "AAVEV3OpenDepositBorrow");
        assert_eq!(
            stages(&built),
            vec![
                (names::PULL_TOKEN, false),
                (names::WRAP_ETH, true),
                (names::SET_APPROVAL, false),
                (names::AAVE_V3_DEPOSIT, false),
                (names::AAVE_V3_BORROW, true),
                (names::UNWRAP_ETH, true),
                (names::RETURN_FUNDS, true),
                (names::POSITION_CREATED, false),
            ]
        );
        assert_eq!(built.executed_count(), 4);
        assert_eq!(built.definition.verify_calls(&built.flat_calls()).unwrap(), 4);
    }

    #[test]
    fn test_open_requires_deposit() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let args = DepositBorrowArgs {
            deposit_amount: U256::ZERO,
            ..deposit_args(500)
        };

        assert!(matches!(
            open_deposit_borrow(&db, ProtocolVersion::Spark, &ctx, &args),
            Err(OpsError::Build(BuildError::InvalidArguments { .. }))
        ));
        // An existing position may borrow without depositing.
        let built = deposit_borrow(&db, ProtocolVersion::Spark, &ctx, &args).unwrap();
        assert_eq!(built.executed_count(), 2);
    }

    #[test]
    fn test_eth_in_and_out() {
        let db = OperationsDatabase::for_network(Network::Base);
        let ctx = context(Network::Base);
        let args = DepositBorrowArgs {
            collateral: WETH,
            debt: WETH,
            deposit_eth: true,
            receive_eth: true,
            ..deposit_args(100)
        };

        let built = deposit_borrow(&db, ProtocolVersion::AaveV3, &ctx, &args).unwrap();
        let skipped: Vec<_> = stages(&built)
            .into_iter()
            .filter(|(_, skipped)| *skipped)
            .map(|(name, _)| name)
            .collect();
        assert_eq!(skipped, vec![names::PULL_TOKEN]);
    }

    #[test]
    fn test_payback_only() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);
        let args = PaybackWithdrawArgs {
            withdraw_amount: U256::ZERO,
            payback_all: true,
            ..payback_args()
        };

        let built = payback_withdraw(&db, ProtocolVersion::AaveV2, &ctx, &args).unwrap();
        assert_eq!(
            stages(&built),
            vec![
                (names::PULL_TOKEN, false),
                (names::WRAP_ETH, true),
                (names::SET_APPROVAL, false),
                (names::AAVE_V2_PAYBACK, false),
                (names::AAVE_V2_WITHDRAW, true),
                (names::UNWRAP_ETH, true),
                (names::RETURN_FUNDS, false),
                (names::RETURN_FUNDS, true),
            ]
        );
    }

    #[test]
    fn test_payback_withdraw_rejects_empty_and_bad_eth() {
        let db = OperationsDatabase::for_network(Network::Mainnet);
        let ctx = context(Network::Mainnet);

        let empty = PaybackWithdrawArgs {
            payback_amount: U256::ZERO,
            withdraw_amount: U256::ZERO,
            ..payback_args()
        };
        assert!(payback_withdraw(&db, ProtocolVersion::AaveV3, &ctx, &empty).is_err());

        let eth_for_usdc = PaybackWithdrawArgs {
            payback_eth: true,
            ..payback_args()
        };
        assert!(matches!(
            payback_withdraw(&db, ProtocolVersion::AaveV3, &ctx, &eth_for_usdc),
            Err(OpsError::Build(BuildError::InvalidArguments { .. }))
        ));
    }
}
