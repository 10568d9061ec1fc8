//! Protocol resolution: `(protocol, version)` × position type → operations.
//!
//! The dispatch table is closed. Supporting a new lending protocol means adding
//! a `ProtocolVersion` variant; every `match` below then fails to compile until
//! the new case is handled.

use crate::actions::names;
use crate::errors::{ResolverError, Result};
use crate::operations::definitions::{self, OperationKind};
use crate::operations::OperationDefinition;
use crate::utils::Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A lending protocol at a specific version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolVersion {
    AaveV2,
    AaveV3,
    Spark,
}

/// Registry names of the lending actions of one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingActions {
    pub deposit: &'static str,
    pub borrow: &'static str,
    pub withdraw: &'static str,
    pub payback: &'static str,
    /// `None` for protocols without efficiency mode.
    pub set_emode: Option<&'static str>,
}

impl ProtocolVersion {
    pub const ALL: [ProtocolVersion; 3] = [
        ProtocolVersion::AaveV2,
        ProtocolVersion::AaveV3,
        ProtocolVersion::Spark,
    ];

    /// Label accepted by `ProtocolLabel::from_str`.
    pub fn label(self) -> &'static str {
        match self {
            ProtocolVersion::AaveV2 => "aave-v2",
            ProtocolVersion::AaveV3 => "aave-v3",
            ProtocolVersion::Spark => "spark",
        }
    }

    /// Protocol name emitted in `PositionCreated` events.
    pub fn event_name(self) -> &'static str {
        match self {
            ProtocolVersion::AaveV2 => "AAVE",
            ProtocolVersion::AaveV3 => "AAVE_V3",
            ProtocolVersion::Spark => "Spark",
        }
    }

    pub fn lending_actions(self) -> LendingActions {
        match self {
            ProtocolVersion::AaveV2 => LendingActions {
                deposit: names::AAVE_V2_DEPOSIT,
                borrow: names::AAVE_V2_BORROW,
                withdraw: names::AAVE_V2_WITHDRAW,
                payback: names::AAVE_V2_PAYBACK,
                set_emode: None,
            },
            ProtocolVersion::AaveV3 => LendingActions {
                deposit: names::AAVE_V3_DEPOSIT,
                borrow: names::AAVE_V3_BORROW,
                withdraw: names::AAVE_V3_WITHDRAW,
                payback: names::AAVE_V3_PAYBACK,
                set_emode: Some(names::AAVE_V3_SET_EMODE),
            },
            ProtocolVersion::Spark => LendingActions {
                deposit: names::SPARK_DEPOSIT,
                borrow: names::SPARK_BORROW,
                withdraw: names::SPARK_WITHDRAW,
                payback: names::SPARK_PAYBACK,
                set_emode: Some(names::SPARK_SET_EMODE),
            },
        }
    }

    /// Service name of the protocol's lending pool.
    pub fn lending_pool_service(self) -> &'static str {
        match self {
            ProtocolVersion::AaveV2 => names::AAVE_V2_LENDING_POOL,
            ProtocolVersion::AaveV3 => names::AAVE_V3_POOL,
            ProtocolVersion::Spark => names::SPARK_LENDING_POOL,
        }
    }

    /// Whether the protocol's actions are registered on `network`.
    pub fn is_deployed_on(self, network: Network) -> bool {
        match self {
            ProtocolVersion::AaveV2 | ProtocolVersion::Spark => network == Network::Mainnet,
            ProtocolVersion::AaveV3 => true,
        }
    }

    /// Operation kinds available for a position type. Empty when the protocol
    /// offers no product in that category.
    pub fn operation_kinds(self, position_type: PositionType) -> &'static [OperationKind] {
        use OperationKind::*;

        const MULTIPLY: &[OperationKind] =
            &[OpenMultiply, CloseMultiply, AdjustRiskUp, AdjustRiskDown];
        const BORROW: &[OperationKind] = &[OpenDepositBorrow, DepositBorrow, PaybackWithdraw];

        match (self, position_type) {
            (ProtocolVersion::AaveV2, PositionType::Borrow) => BORROW,
            (ProtocolVersion::AaveV2, PositionType::Multiply) => MULTIPLY,
            (ProtocolVersion::AaveV2, PositionType::Earn) => MULTIPLY,
            (ProtocolVersion::AaveV3, PositionType::Borrow) => BORROW,
            (ProtocolVersion::AaveV3, PositionType::Multiply) => MULTIPLY,
            (ProtocolVersion::AaveV3, PositionType::Earn) => MULTIPLY,
            (ProtocolVersion::Spark, PositionType::Borrow) => BORROW,
            (ProtocolVersion::Spark, PositionType::Multiply) => MULTIPLY,
            (ProtocolVersion::Spark, PositionType::Earn) => &[],
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed `protocol[-version]` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolLabel(pub ProtocolVersion);

impl FromStr for ProtocolLabel {
    type Err = ResolverError;

    fn from_str(label: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = label.trim().to_ascii_lowercase().replace('_', "-");
        let (protocol, version) = match normalized.split_once('-') {
            Some((protocol, version)) => (protocol, Some(version)),
            None => (normalized.as_str(), None),
        };

        let version_of = |version: Option<&str>| -> std::result::Result<ProtocolVersion, ResolverError> {
            match version {
                None => Err(ResolverError::MissingVersion {
                    protocol: protocol.to_string(),
                }),
                Some("v2") => Ok(ProtocolVersion::AaveV2),
                Some("v3") => Ok(ProtocolVersion::AaveV3),
                Some(other) => Err(ResolverError::UnsupportedVersion {
                    protocol: protocol.to_string(),
                    version: other.to_string(),
                }),
            }
        };

        match protocol {
            "aave" => version_of(version).map(ProtocolLabel),
            "spark" => match version {
                None => Ok(ProtocolLabel(ProtocolVersion::Spark)),
                Some(other) => Err(ResolverError::UnsupportedVersion {
                    protocol: protocol.to_string(),
                    version: other.to_string(),
                }),
            },
            _ => Err(ResolverError::UnknownProtocol {
                label: label.to_string(),
            }),
        }
    }
}

/// Product category of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionType {
    Borrow,
    Multiply,
    Earn,
}

impl PositionType {
    pub fn name(self) -> &'static str {
        match self {
            PositionType::Borrow => "Borrow",
            PositionType::Multiply => "Multiply",
            PositionType::Earn => "Earn",
        }
    }
}

impl fmt::Display for PositionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PositionType {
    type Err = ResolverError;

    fn from_str(label: &str) -> std::result::Result<Self, Self::Err> {
        match label.trim().to_ascii_lowercase().as_str() {
            "borrow" => Ok(PositionType::Borrow),
            "multiply" => Ok(PositionType::Multiply),
            "earn" => Ok(PositionType::Earn),
            _ => Err(ResolverError::UnknownPositionType {
                label: label.to_string(),
            }),
        }
    }
}

/// The operations a protocol offers for one position type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSet {
    pub protocol: ProtocolVersion,
    pub position_type: PositionType,
    pub kinds: Vec<OperationKind>,
}

impl OperationSet {
    /// Registry names of the operations in the set.
    pub fn operation_names(&self) -> Vec<&'static str> {
        self.kinds
            .iter()
            .map(|kind| kind.operation_name(self.protocol))
            .collect()
    }

    /// Static definitions of the set on `network`.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::NoOperationsForCategory` when the protocol is not
    /// deployed on the network.
    pub fn definitions(&self, network: Network) -> Result<Vec<OperationDefinition>> {
        if !self.protocol.is_deployed_on(network) {
            return Err(ResolverError::NoOperationsForCategory {
                protocol: format!("{} on {}", self.protocol, network),
                category: self.position_type.to_string(),
            }
            .into());
        }

        Ok(self
            .kinds
            .iter()
            .map(|kind| definitions::definition(self.protocol, *kind))
            .collect())
    }
}

/// Resolve a protocol label and position type to the protocol's operations.
///
/// # Errors
///
/// - `ResolverError::MissingVersion` for a versioned protocol without version
/// - `ResolverError::UnknownProtocol` / `UnsupportedVersion` for bad labels
/// - `ResolverError::NoOperationsForCategory` when the protocol offers nothing
///   for the position type
pub fn resolve(label: &str, position_type: PositionType) -> Result<OperationSet> {
    let ProtocolLabel(protocol) = label.parse::<ProtocolLabel>()?;
    let kinds = protocol.operation_kinds(position_type);

    if kinds.is_empty() {
        return Err(ResolverError::NoOperationsForCategory {
            protocol: protocol.to_string(),
            category: position_type.to_string(),
        }
        .into());
    }

    tracing::debug!(
        protocol = %protocol,
        position_type = %position_type,
        operations = kinds.len(),
        "Resolved protocol operations"
    );

    Ok(OperationSet {
        protocol,
        position_type,
        kinds: kinds.to_vec(),
    })
}
