//! Per-network name tree of everything registered in the service registry.
//!
//! Actions are services too: the executor looks an action's contract up by the
//! hash of its name. The tree is static and selected by matching on `Network`.

use crate::actions::names;
use crate::protocols::ProtocolVersion;
use crate::utils::Network;

/// A named group of registry entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceGroup {
    pub group: &'static str,
    pub names: Vec<&'static str>,
}

const COMMON_ACTIONS: &[&str] = &[
    names::PULL_TOKEN,
    names::SEND_TOKEN,
    names::SET_APPROVAL,
    names::SWAP,
    names::TAKE_FLASHLOAN,
    names::WRAP_ETH,
    names::UNWRAP_ETH,
    names::RETURN_FUNDS,
    names::POSITION_CREATED,
];

const CORE_SERVICES: &[&str] = &[
    names::OPERATION_EXECUTOR,
    names::OPERATION_STORAGE,
    names::OPERATIONS_REGISTRY,
    names::ACCOUNT_GUARD,
    names::ACCOUNT_FACTORY,
    names::SWAP_CONTRACT,
];

/// The registry tree for `network`.
pub fn service_tree(network: Network) -> Vec<ServiceGroup> {
    let mut tree = vec![
        ServiceGroup {
            group: "core",
            names: CORE_SERVICES.to_vec(),
        },
        ServiceGroup {
            group: "common",
            names: COMMON_ACTIONS.to_vec(),
        },
    ];

    let flashloan_providers = match network {
        Network::Mainnet => vec![names::MCD_FLASH, names::BALANCER_VAULT],
        Network::Optimism | Network::Arbitrum | Network::Base => vec![names::BALANCER_VAULT],
    };
    tree.push(ServiceGroup {
        group: "flashloan",
        names: flashloan_providers,
    });

    tree.push(ServiceGroup {
        group: "tokens",
        names: vec![names::WETH, names::DAI],
    });

    for protocol in ProtocolVersion::ALL {
        if !protocol.is_deployed_on(network) {
            continue;
        }
        let lending = protocol.lending_actions();
        let mut entries = vec![
            protocol.lending_pool_service(),
            lending.deposit,
            lending.borrow,
            lending.withdraw,
            lending.payback,
        ];
        entries.extend(lending.set_emode);
        tree.push(ServiceGroup {
            group: protocol.label(),
            names: entries,
        });
    }

    tree
}

/// Every registered name on `network`, in tree order.
pub fn service_names(network: Network) -> Vec<&'static str> {
    service_tree(network)
        .into_iter()
        .flat_map(|group| group.names)
        .collect()
}
