//! Utility functions, network identity and numeric conversions.
//!
//! This module bridges the numeric types used across the crate: solver output
//! is computed in `rust_decimal::Decimal`, balance accounting uses `BigInt`, and
//! everything that reaches the wire is an alloy `U256`.
//!
//! # Core Functionality
//!
//! - **Network identity**: the closed `Network` enum selecting per-network tables
//! - **Type Conversions**: `Decimal` → base units, `U256` ↔ `BigUint`
//! - **Address Handling**: parsing and validation of Ethereum addresses

use crate::errors::{Result, UtilityError};
use alloy::primitives::{Address, U256};
use num_bigint::BigUint;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Networks the operation tables are defined for.
///
/// Per-network differences (deployed protocols, registered services) are
/// resolved by matching on this enum, never by loading modules by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Optimism,
    Arbitrum,
    Base,
}

impl Network {
    /// Every supported network, in a stable order.
    pub const ALL: [Network; 4] = [
        Network::Mainnet,
        Network::Optimism,
        Network::Arbitrum,
        Network::Base,
    ];

    /// EIP-155 chain id of the network.
    pub fn chain_id(self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Optimism => 10,
            Network::Arbitrum => 42161,
            Network::Base => 8453,
        }
    }

    /// Lowercase name used in configuration files and on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Optimism => "optimism",
            Network::Arbitrum => "arbitrum",
            Network::Base => "base",
        }
    }

    /// Look a network up by chain id.
    ///
    /// # Errors
    ///
    /// Returns `UtilityError::UnsupportedNetwork` for unknown chain ids.
    pub fn from_chain_id(chain_id: u64) -> Result<Self> {
        Network::ALL
            .into_iter()
            .find(|network| network.chain_id() == chain_id)
            .ok_or_else(|| {
                UtilityError::UnsupportedNetwork {
                    network: chain_id.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Network {
    type Err = UtilityError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" | "ethereum" => Ok(Network::Mainnet),
            "optimism" => Ok(Network::Optimism),
            "arbitrum" => Ok(Network::Arbitrum),
            "base" => Ok(Network::Base),
            _ => Err(UtilityError::UnsupportedNetwork {
                network: s.to_string(),
            }),
        }
    }
}

/// Pseudo address the executor uses for native ETH.
pub const ETH_ADDRESS: Address = Address::new([0xee; 20]);

/// Parse a string representation of an Ethereum address.
///
/// Accepts addresses with or without the "0x" prefix.
///
/// # Errors
///
/// Returns an error when the string is not 40 hex characters after the prefix.
pub fn string_to_h160(s: &str) -> Result<Address> {
    Address::from_str(s.trim_start_matches("0x")).map_err(|source| {
        UtilityError::AddressParsingFailed {
            input: s.to_string(),
            source: alloy::primitives::AddressError::Hex(source),
        }
        .into()
    })
}

/// Convert a U256 value to a BigUint.
pub fn u256_to_biguint(val: U256) -> BigUint {
    BigUint::from_bytes_be(&val.to_be_bytes::<32>())
}

/// Convert a BigUint to a U256 value.
///
/// # Errors
///
/// Returns `UtilityError::ValueTooLarge` when the value exceeds 2^256 - 1.
pub fn biguint_to_u256(val: &BigUint) -> Result<U256> {
    let bytes = val.to_bytes_be();
    if bytes.len() > 32 {
        return Err(UtilityError::ValueTooLarge.into());
    }
    let mut u256_bytes = [0u8; 32];
    u256_bytes[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(U256::from_be_bytes(u256_bytes))
}

/// Convert a token amount to integer base units, truncating extra precision.
///
/// The conversion goes through the decimal's mantissa so that 18-decimal
/// tokens cannot overflow the 96-bit `Decimal` range.
///
/// # Errors
///
/// Returns `UtilityError::NegativeAmount` for negative inputs.
pub fn to_base_units(value: Decimal, decimals: u32) -> Result<U256> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(UtilityError::NegativeAmount {
            value: value.to_string(),
        }
        .into());
    }

    let mantissa = BigUint::from(value.mantissa().unsigned_abs());
    let scaled = mantissa * BigUint::from(10u32).pow(decimals);
    let base_units = scaled / BigUint::from(10u32).pow(value.scale());

    biguint_to_u256(&base_units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_network_round_trip() {
        for network in Network::ALL {
            assert_eq!(Network::from_str(network.name()).unwrap(), network);
            assert_eq!(Network::from_chain_id(network.chain_id()).unwrap(), network);
        }
        assert_eq!(Network::from_str("ethereum").unwrap(), Network::Mainnet);
        assert!(Network::from_str("goerli").is_err());
        assert!(Network::from_chain_id(5).is_err());
    }

    #[test]
    fn test_to_base_units() {
        assert_eq!(to_base_units(dec!(1.5), 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            to_base_units(dec!(10.3126), 18).unwrap(),
            U256::from(10_312_600_000_000_000_000u128)
        );
        // truncates below the token's precision
        assert_eq!(to_base_units(dec!(0.0000009), 6).unwrap(), U256::ZERO);
        assert!(to_base_units(dec!(-1), 18).is_err());
    }

    #[test]
    fn test_biguint_conversions() {
        let value = U256::from(123_456_789u64);
        assert_eq!(biguint_to_u256(&u256_to_biguint(value)).unwrap(), value);

        let too_large = BigUint::from(1u8) << 256;
        assert!(biguint_to_u256(&too_large).is_err());
    }

    #[test]
    fn test_string_to_h160() {
        let parsed = string_to_h160("0x6B175474E89094C44Da98b954EedeAC495271d0F").unwrap();
        assert_eq!(
            parsed,
            Address::from_str("6B175474E89094C44Da98b954EedeAC495271d0F").unwrap()
        );
        assert!(string_to_h160("0x1234").is_err());
    }
}
