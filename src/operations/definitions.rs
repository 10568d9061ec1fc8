//! Static operation definitions.
//!
//! Every operation the registry stores is listed here as an ordered sequence of
//! action names with their optional flags. The strategies in
//! `operations::strategies` build transactions whose flat call list must match
//! these sequences exactly; the builder enforces it.

use crate::actions::names;
use crate::operations::{ActionEntry, OperationDefinition};
use crate::protocols::ProtocolVersion;
use crate::utils::Network;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of operation every lending protocol offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    OpenMultiply,
    CloseMultiply,
    AdjustRiskUp,
    AdjustRiskDown,
    OpenDepositBorrow,
    DepositBorrow,
    PaybackWithdraw,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::OpenMultiply,
        OperationKind::CloseMultiply,
        OperationKind::AdjustRiskUp,
        OperationKind::AdjustRiskDown,
        OperationKind::OpenDepositBorrow,
        OperationKind::DepositBorrow,
        OperationKind::PaybackWithdraw,
    ];

    /// Registry name of this operation for `protocol`.
    pub fn operation_name(self, protocol: ProtocolVersion) -> &'static str {
        use OperationKind::*;

        match (protocol, self) {
            (ProtocolVersion::AaveV2, OpenMultiply) => "OpenAAVEPosition",
            (ProtocolVersion::AaveV2, CloseMultiply) => "CloseAAVEPosition",
            (ProtocolVersion::AaveV2, AdjustRiskUp) => "IncreaseAAVEPosition",
            (ProtocolVersion::AaveV2, AdjustRiskDown) => "DecreaseAAVEPosition",
            (ProtocolVersion::AaveV2, OpenDepositBorrow) => "AAVEOpenDepositBorrow",
            (ProtocolVersion::AaveV2, DepositBorrow) => "AAVEDepositBorrow",
            (ProtocolVersion::AaveV2, PaybackWithdraw) => "AAVEPaybackWithdraw",

            (ProtocolVersion::AaveV3, OpenMultiply) => "OpenAAVEV3Position",
            (ProtocolVersion::AaveV3, CloseMultiply) => "CloseAAVEV3Position",
            (ProtocolVersion::AaveV3, AdjustRiskUp) => "AdjustRiskUpAAVEV3Position",
            (ProtocolVersion::AaveV3, AdjustRiskDown) => "AdjustRiskDownAAVEV3Position",
            (ProtocolVersion::AaveV3, OpenDepositBorrow) => "AAVEV3OpenDepositBorrow",
            (ProtocolVersion::AaveV3, DepositBorrow) => "AAVEV3DepositBorrow",
            (ProtocolVersion::AaveV3, PaybackWithdraw) => "AAVEV3PaybackWithdraw",

            (ProtocolVersion::Spark, OpenMultiply) => "SparkOpenPosition",
            (ProtocolVersion::Spark, CloseMultiply) => "SparkClosePosition",
            (ProtocolVersion::Spark, AdjustRiskUp) => "SparkAdjustRiskUp",
            (ProtocolVersion::Spark, AdjustRiskDown) => "SparkAdjustRiskDown",
            (ProtocolVersion::Spark, OpenDepositBorrow) => "SparkOpenDepositBorrow",
            (ProtocolVersion::Spark, DepositBorrow) => "SparkDepositBorrow",
            (ProtocolVersion::Spark, PaybackWithdraw) => "SparkPaybackWithdraw",
        }
    }

    /// Find the protocol and kind behind a registry operation name.
    pub fn from_operation_name(name: &str) -> Option<(ProtocolVersion, OperationKind)> {
        ProtocolVersion::ALL.into_iter().find_map(|protocol| {
            OperationKind::ALL
                .into_iter()
                .find(|kind| kind.operation_name(protocol) == name)
                .map(|kind| (protocol, kind))
        })
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationKind::OpenMultiply => "open-multiply",
            OperationKind::CloseMultiply => "close-multiply",
            OperationKind::AdjustRiskUp => "adjust-risk-up",
            OperationKind::AdjustRiskDown => "adjust-risk-down",
            OperationKind::OpenDepositBorrow => "open-deposit-borrow",
            OperationKind::DepositBorrow => "deposit-borrow",
            OperationKind::PaybackWithdraw => "payback-withdraw",
        };
        f.write_str(label)
    }
}

/// Static definition of one operation.
pub fn definition(protocol: ProtocolVersion, kind: OperationKind) -> OperationDefinition {
    let lending = protocol.lending_actions();
    let name = kind.operation_name(protocol);

    let actions = match kind {
        OperationKind::OpenMultiply | OperationKind::AdjustRiskUp => {
            let mut actions = vec![
                ActionEntry::optional(names::PULL_TOKEN),
                ActionEntry::optional(names::WRAP_ETH),
                ActionEntry::mandatory(names::TAKE_FLASHLOAN),
                ActionEntry::optional(names::PULL_TOKEN),
                ActionEntry::mandatory(names::SET_APPROVAL),
                ActionEntry::mandatory(lending.deposit),
                ActionEntry::mandatory(lending.borrow),
                ActionEntry::mandatory(names::SWAP),
                ActionEntry::mandatory(names::SET_APPROVAL),
                ActionEntry::mandatory(lending.deposit),
            ];
            if kind == OperationKind::OpenMultiply {
                if let Some(set_emode) = lending.set_emode {
                    actions.push(ActionEntry::optional(set_emode));
                }
            }
            actions.push(ActionEntry::mandatory(lending.withdraw));
            if kind == OperationKind::OpenMultiply {
                actions.push(ActionEntry::mandatory(names::POSITION_CREATED));
            }
            actions
        }
        OperationKind::CloseMultiply | OperationKind::AdjustRiskDown => {
            // Closing always hands every remaining balance back.
            let returns_optional = kind == OperationKind::AdjustRiskDown;
            vec![
                ActionEntry::mandatory(names::TAKE_FLASHLOAN),
                ActionEntry::mandatory(names::SET_APPROVAL),
                ActionEntry::mandatory(lending.deposit),
                ActionEntry::mandatory(lending.withdraw),
                ActionEntry::mandatory(names::SWAP),
                ActionEntry::mandatory(names::SET_APPROVAL),
                ActionEntry::mandatory(lending.payback),
                ActionEntry::mandatory(lending.withdraw),
                ActionEntry::optional(names::UNWRAP_ETH),
                ActionEntry::new(names::RETURN_FUNDS, returns_optional),
                ActionEntry::new(names::RETURN_FUNDS, returns_optional),
            ]
        }
        OperationKind::OpenDepositBorrow => vec![
            ActionEntry::optional(names::PULL_TOKEN),
            ActionEntry::optional(names::WRAP_ETH),
            ActionEntry::mandatory(names::SET_APPROVAL),
            ActionEntry::mandatory(lending.deposit),
            ActionEntry::optional(lending.borrow),
            ActionEntry::optional(names::UNWRAP_ETH),
            ActionEntry::optional(names::RETURN_FUNDS),
            ActionEntry::mandatory(names::POSITION_CREATED),
        ],
        OperationKind::DepositBorrow => vec![
            ActionEntry::optional(names::PULL_TOKEN),
            ActionEntry::optional(names::WRAP_ETH),
            ActionEntry::optional(names::SET_APPROVAL),
            ActionEntry::optional(lending.deposit),
            ActionEntry::optional(lending.borrow),
            ActionEntry::optional(names::UNWRAP_ETH),
            ActionEntry::optional(names::RETURN_FUNDS),
        ],
        OperationKind::PaybackWithdraw => vec![
            ActionEntry::optional(names::PULL_TOKEN),
            ActionEntry::optional(names::WRAP_ETH),
            ActionEntry::optional(names::SET_APPROVAL),
            ActionEntry::optional(lending.payback),
            ActionEntry::optional(lending.withdraw),
            ActionEntry::optional(names::UNWRAP_ETH),
            ActionEntry::optional(names::RETURN_FUNDS),
            ActionEntry::optional(names::RETURN_FUNDS),
        ],
    };

    OperationDefinition::new(name, actions)
}

/// Every operation deployed on `network`, in a stable order.
pub fn for_network(network: Network) -> Vec<OperationDefinition> {
    ProtocolVersion::ALL
        .into_iter()
        .filter(|protocol| protocol.is_deployed_on(network))
        .flat_map(|protocol| {
            OperationKind::ALL
                .into_iter()
                .map(move |kind| definition(protocol, kind))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_operation_names_are_unique() {
        let names: Vec<_> = ProtocolVersion::ALL
            .into_iter()
            .flat_map(|protocol| OperationKind::ALL.map(|kind| kind.operation_name(protocol)))
            .collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(
            OperationKind::from_operation_name("AAVEV3OpenDepositBorrow"),
            Some((ProtocolVersion::AaveV3, OperationKind::OpenDepositBorrow))
        );
        assert_eq!(OperationKind::from_operation_name("NotAnOperation"), None);
    }

    #[test]
    fn test_networks_get_deployed_protocols_only() {
        assert_eq!(for_network(Network::Mainnet).len(), 21);
        let base = for_network(Network::Base);
        assert_eq!(base.len(), 7);
        assert!(base.iter().all(|definition| definition.name.contains("AAVEV3")));
    }

    #[test]
    fn test_emode_only_where_supported() {
        let v2 = definition(ProtocolVersion::AaveV2, OperationKind::OpenMultiply);
        let v3 = definition(ProtocolVersion::AaveV3, OperationKind::OpenMultiply);
        assert_eq!(v3.actions.len(), v2.actions.len() + 1);
        assert!(v3
            .actions
            .iter()
            .any(|entry| entry.name == names::AAVE_V3_SET_EMODE && entry.optional));
    }

    #[test]
    fn test_definitions_are_pure() {
        for kind in OperationKind::ALL {
            let first = definition(ProtocolVersion::Spark, kind);
            let second = definition(ProtocolVersion::Spark, kind);
            assert_eq!(first, second);
            assert_eq!(first.fingerprint(), second.fingerprint());
        }
    }
}
