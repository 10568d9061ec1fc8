//! Leverage parameter solver.
//!
//! Closed-form amounts for moving a collateral/debt position to a target
//! collateralization ratio in one flashloan-backed swap. Prices are debt
//! token per collateral token; all arithmetic is `Decimal`, never float.
//!
//! Increasing leverage borrows `X` debt tokens, sells them for collateral at
//! `MP = market·(1 + slippage)` after the swap fee, and charges the flashloan
//! fee on top of `X`. The target ratio `R` must hold afterwards at the oracle
//! price `P`:
//!
//! ```text
//! (OC + X·(1 − swapFee)/MP)·P = R·(D + X·(1 + flashloanFee))
//! X = MP·(OC·P − R·D) / (R·MP·(1 + flashloanFee) − P·(1 − swapFee))
//! ```
//!
//! Decreasing sells collateral at `MP' = market·(1 − slippage)` to repay `X`
//! debt tokens, with the flashloan fee paid from the swap proceeds.

use crate::errors::{LeverageError, Result};
use rust_decimal::Decimal;

/// Inputs of `solve_increase_position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreasePositionInput {
    pub oracle_price: Decimal,
    pub market_price: Decimal,
    /// Swap fee as a fraction of the swapped amount.
    pub oazo_fee: Decimal,
    pub flashloan_fee: Decimal,
    pub current_collateral: Decimal,
    pub current_debt: Decimal,
    pub required_coll_ratio: Decimal,
    pub slippage: Decimal,
    /// Debt tokens the user adds; they are swapped into collateral.
    pub debt_top_up: Decimal,
    pub collateral_top_up: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreasePositionOutput {
    /// New debt, flashloan fee included.
    pub required_debt: Decimal,
    /// Collateral bought with the borrowed amount.
    pub additional_collateral: Decimal,
    /// Collateral the top-ups add before the leverage swap.
    pub pre_increase_top_up: Decimal,
}

/// Inputs of `solve_decrease_position`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecreasePositionInput {
    pub oracle_price: Decimal,
    pub market_price: Decimal,
    pub oazo_fee: Decimal,
    pub flashloan_fee: Decimal,
    pub current_collateral: Decimal,
    pub current_debt: Decimal,
    pub required_coll_ratio: Decimal,
    pub slippage: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecreasePositionOutput {
    /// Debt repaid.
    pub debt_to_repay: Decimal,
    /// Collateral sold to fund the repayment and the flashloan fee.
    pub collateral_to_sell: Decimal,
}

fn invalid(field: &'static str, reason: &str) -> LeverageError {
    LeverageError::InvalidInput {
        field,
        reason: reason.to_string(),
    }
}

fn infeasible(reason: impl Into<String>) -> LeverageError {
    LeverageError::InfeasibleTarget {
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: Decimal) -> std::result::Result<(), LeverageError> {
    if value <= Decimal::ZERO {
        return Err(invalid(field, "must be positive"));
    }
    Ok(())
}

fn non_negative(field: &'static str, value: Decimal) -> std::result::Result<(), LeverageError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(invalid(field, "must not be negative"));
    }
    Ok(())
}

fn fraction(field: &'static str, value: Decimal) -> std::result::Result<(), LeverageError> {
    non_negative(field, value)?;
    if value >= Decimal::ONE {
        return Err(invalid(field, "must be below 1"));
    }
    Ok(())
}

fn mul(a: Decimal, b: Decimal) -> std::result::Result<Decimal, LeverageError> {
    a.checked_mul(b)
        .ok_or_else(|| infeasible("intermediate value overflows"))
}

fn div(a: Decimal, b: Decimal) -> std::result::Result<Decimal, LeverageError> {
    a.checked_div(b)
        .ok_or_else(|| infeasible("division by zero or overflow"))
}

/// Debt to draw and collateral to buy so the position ends at
/// `required_coll_ratio`.
///
/// # Errors
///
/// - `LeverageError::InvalidInput` for non-positive prices or ratio, negative
///   amounts, or fees and slippage outside `[0, 1)`
/// - `LeverageError::InfeasibleTarget` when the denominator is not positive
///   (no amount of debt reaches the ratio) or the target is above the current
///   ratio (the position must be decreased instead)
pub fn solve_increase_position(input: &IncreasePositionInput) -> Result<IncreasePositionOutput> {
    positive("oracle_price", input.oracle_price)?;
    positive("market_price", input.market_price)?;
    positive("required_coll_ratio", input.required_coll_ratio)?;
    fraction("oazo_fee", input.oazo_fee)?;
    fraction("flashloan_fee", input.flashloan_fee)?;
    fraction("slippage", input.slippage)?;
    non_negative("current_collateral", input.current_collateral)?;
    non_negative("current_debt", input.current_debt)?;
    non_negative("debt_top_up", input.debt_top_up)?;
    non_negative("collateral_top_up", input.collateral_top_up)?;

    let price = input.oracle_price;
    let ratio = input.required_coll_ratio;
    let market_price = mul(input.market_price, Decimal::ONE + input.slippage)?;
    let owned_collateral = input.current_collateral
        + input.collateral_top_up
        + div(input.debt_top_up, market_price)?;

    let numerator = mul(
        market_price,
        mul(owned_collateral, price)? - mul(ratio, input.current_debt)?,
    )?;
    let denominator = mul(mul(ratio, market_price)?, Decimal::ONE + input.flashloan_fee)?
        - mul(price, Decimal::ONE - input.oazo_fee)?;

    if denominator <= Decimal::ZERO {
        return Err(infeasible(format!(
            "ratio {ratio} cannot be reached: every unit of debt lowers it (denominator {denominator})"
        ))
        .into());
    }

    let borrow = div(numerator, denominator)?;
    if borrow.is_sign_negative() && !borrow.is_zero() {
        return Err(infeasible(format!(
            "ratio {ratio} is above the current ratio; decrease the position instead"
        ))
        .into());
    }

    let output = IncreasePositionOutput {
        required_debt: mul(borrow, Decimal::ONE + input.flashloan_fee)?,
        additional_collateral: div(mul(borrow, Decimal::ONE - input.oazo_fee)?, market_price)?,
        pre_increase_top_up: owned_collateral - input.current_collateral,
    };

    tracing::debug!(
        required_coll_ratio = %ratio,
        required_debt = %output.required_debt,
        additional_collateral = %output.additional_collateral,
        pre_increase_top_up = %output.pre_increase_top_up,
        "Solved position increase"
    );

    Ok(output)
}

/// Debt to repay and collateral to sell so the position ends at
/// `required_coll_ratio`.
///
/// # Errors
///
/// - `LeverageError::InvalidInput` as for `solve_increase_position`, plus a
///   zero debt
/// - `LeverageError::InfeasibleTarget` when the target is not above the
///   current ratio or would need more debt repaid than is owed
pub fn solve_decrease_position(input: &DecreasePositionInput) -> Result<DecreasePositionOutput> {
    positive("oracle_price", input.oracle_price)?;
    positive("market_price", input.market_price)?;
    positive("required_coll_ratio", input.required_coll_ratio)?;
    positive("current_debt", input.current_debt)?;
    fraction("oazo_fee", input.oazo_fee)?;
    fraction("flashloan_fee", input.flashloan_fee)?;
    fraction("slippage", input.slippage)?;
    non_negative("current_collateral", input.current_collateral)?;

    let price = input.oracle_price;
    let ratio = input.required_coll_ratio;
    let effective_price = mul(
        mul(input.market_price, Decimal::ONE - input.slippage)?,
        Decimal::ONE - input.oazo_fee,
    )?;

    let numerator = mul(
        mul(input.current_collateral, price)? - mul(ratio, input.current_debt)?,
        effective_price,
    )?;
    let denominator = mul(Decimal::ONE + input.flashloan_fee, price)? - mul(ratio, effective_price)?;

    if denominator.is_zero() {
        return Err(infeasible(format!("ratio {ratio} is not changed by repaying debt")).into());
    }

    let repay = div(numerator, denominator)?;
    if repay <= Decimal::ZERO {
        return Err(infeasible(format!(
            "ratio {ratio} is not above the current ratio; increase the position instead"
        ))
        .into());
    }
    if repay > input.current_debt {
        return Err(infeasible(format!(
            "ratio {ratio} needs {repay} repaid but only {} is owed; close the position instead",
            input.current_debt
        ))
        .into());
    }

    let sell = div(mul(repay, Decimal::ONE + input.flashloan_fee)?, effective_price)?;
    if sell > input.current_collateral {
        return Err(infeasible(format!(
            "selling {sell} exceeds the {} collateral held",
            input.current_collateral
        ))
        .into());
    }

    tracing::debug!(
        required_coll_ratio = %ratio,
        debt_to_repay = %repay,
        collateral_to_sell = %sell,
        "Solved position decrease"
    );

    Ok(DecreasePositionOutput {
        debt_to_repay: repay,
        collateral_to_sell: sell,
    })
}
