//! Local database: the expected shadow of a network's deployed registries.
//!
//! Built once per network from the static name tree and operation
//! definitions. Construction is pure, so `build_all` builds every network in
//! parallel.

use crate::actions::{action_hash, ActionHash, ActionResolver};
use crate::operations::{definitions, OperationDefinition};
use crate::registry::names;
use crate::utils::Network;
use alloy::primitives::B256;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Name ↔ hash tables and operation definitions for one network.
#[derive(Debug, Clone)]
pub struct OperationsDatabase {
    network: Network,
    /// Registered names in tree order.
    names: Vec<&'static str>,
    hash_by_name: HashMap<&'static str, ActionHash>,
    name_by_hash: HashMap<ActionHash, &'static str>,
    operations: BTreeMap<String, OperationDefinition>,
}

impl OperationsDatabase {
    pub fn for_network(network: Network) -> Self {
        let names = names::service_names(network);

        let mut hash_by_name = HashMap::with_capacity(names.len());
        let mut name_by_hash = HashMap::with_capacity(names.len());
        for name in &names {
            let hash = action_hash(name);
            hash_by_name.insert(*name, hash);
            name_by_hash.insert(hash, *name);
        }

        let operations: BTreeMap<_, _> = definitions::for_network(network)
            .into_iter()
            .map(|definition| (definition.name.clone(), definition))
            .collect();

        tracing::debug!(
            network = %network,
            names = names.len(),
            operations = operations.len(),
            "Built operations database"
        );

        Self {
            network,
            names,
            hash_by_name,
            name_by_hash,
            operations,
        }
    }

    /// Databases for every supported network, built in parallel.
    pub fn build_all() -> Vec<OperationsDatabase> {
        Network::ALL
            .par_iter()
            .map(|network| OperationsDatabase::for_network(*network))
            .collect()
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Hash of any name. Pure; does not require the name to be registered.
    pub fn action_hash(&self, name: &str) -> ActionHash {
        action_hash(name)
    }

    /// Reverse lookup. `None` means the hash is not one of this network's names.
    pub fn action_name(&self, hash: &ActionHash) -> Option<&'static str> {
        self.name_by_hash.get(hash).copied()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.hash_by_name.contains_key(name)
    }

    pub fn operation_definition(&self, name: &str) -> Option<&OperationDefinition> {
        self.operations.get(name)
    }

    pub fn operation_fingerprint(&self, name: &str) -> Option<B256> {
        self.operations.get(name).map(OperationDefinition::fingerprint)
    }

    pub fn service_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Operation names in lexical order.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.values()
    }
}

impl ActionResolver for OperationsDatabase {
    fn resolve_action(&self, name: &str) -> Option<ActionHash> {
        self.hash_by_name.get(name).copied()
    }
}
