//! Operations: named, ordered sequences of actions executed atomically.
//!
//! - `OperationDefinition`: the static shape of an operation, what the
//!   registry stores (action hashes and optional flags, in order)
//! - `OperationBuilder`: composes `StepSpec`s into a `BuiltOperation`
//! - `definitions`: the static definition of every operation per protocol
//! - `strategies`: per-transaction composers for multiply and borrow products

pub mod builder;
pub mod definitions;
pub mod strategies;

pub use builder::{OperationBuilder, StepSpec};
pub use definitions::OperationKind;

use crate::actions::{abi, action_hash, names, Action, ActionCall, ActionHash};
use crate::errors::{BuildError, Result};
use crate::utils::Network;
use alloy::primitives::{keccak256, Bytes, B256};
use alloy::sol_types::{SolCall, SolValue};
use serde::Serialize;

/// One entry of an operation definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ActionEntry {
    pub name: String,
    pub hash: ActionHash,
    pub optional: bool,
}

impl ActionEntry {
    pub fn new(name: &str, optional: bool) -> Self {
        Self {
            name: name.to_string(),
            hash: action_hash(name),
            optional,
        }
    }

    pub fn mandatory(name: &str) -> Self {
        Self::new(name, false)
    }

    pub fn optional(name: &str) -> Self {
        Self::new(name, true)
    }
}

/// The static shape of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDefinition {
    pub name: String,
    pub actions: Vec<ActionEntry>,
}

impl OperationDefinition {
    pub fn new(name: impl Into<String>, actions: Vec<ActionEntry>) -> Self {
        Self {
            name: name.into(),
            actions,
        }
    }

    pub fn hashes(&self) -> Vec<ActionHash> {
        self.actions.iter().map(|entry| entry.hash).collect()
    }

    pub fn optional_flags(&self) -> Vec<bool> {
        self.actions.iter().map(|entry| entry.optional).collect()
    }

    /// `keccak256` over the concatenated action hashes, in order.
    pub fn fingerprint(&self) -> B256 {
        let mut buffer = Vec::with_capacity(self.actions.len() * 32);
        for entry in &self.actions {
            buffer.extend_from_slice(entry.hash.as_slice());
        }
        keccak256(&buffer)
    }

    /// Check a flat call list the way the executor does before running it.
    ///
    /// Returns the number of calls that would execute.
    ///
    /// # Errors
    ///
    /// - `BuildError::SequenceMismatch` when the list is longer or shorter than
    ///   the definition, or a hash differs
    /// - `BuildError::MandatoryActionSkipped` when a non-optional call is
    ///   marked skipped outside a skipped flashloan
    pub fn verify_calls(&self, calls: &[ActionCall]) -> Result<usize> {
        let mismatch = |index: usize| BuildError::SequenceMismatch {
            operation: self.name.clone(),
            index,
        };

        if calls.len() != self.actions.len() {
            return Err(mismatch(calls.len().min(self.actions.len())).into());
        }

        let flashloan = action_hash(names::TAKE_FLASHLOAN);
        let mut executed = 0;
        // Calls before this index belong to a skipped flashloan.
        let mut skipped_until = 0;
        for (index, (entry, call)) in self.actions.iter().zip(calls).enumerate() {
            if entry.hash != call.target_hash {
                return Err(mismatch(index).into());
            }
            if index < skipped_until {
                continue;
            }
            if call.skipped {
                if !entry.optional {
                    return Err(BuildError::MandatoryActionSkipped {
                        position: index + 1,
                        name: entry.name.clone(),
                    }
                    .into());
                }
                if call.target_hash == flashloan {
                    skipped_until = nested_len(&call.call_data)
                        .map(|nested| index + 1 + nested)
                        .filter(|end| *end <= calls.len())
                        .ok_or_else(|| mismatch(index))?;
                }
                continue;
            }
            executed += 1;
        }

        Ok(executed)
    }
}

/// Number of flat positions embedded in a flashloan call, nested wrappers
/// included. `None` when the call data is not a flashloan payload.
fn nested_len(call_data: &[u8]) -> Option<usize> {
    let execute = abi::executeCall::abi_decode(call_data).ok()?;
    let data = abi::FlashloanData::abi_decode(&execute.data).ok()?;
    let flashloan = action_hash(names::TAKE_FLASHLOAN);
    data.calls.iter().try_fold(0, |total, call| {
        let nested = if call.targetHash == flashloan {
            nested_len(&call.callData)?
        } else {
            0
        };
        Some(total + 1 + nested)
    })
}

/// An operation composed for one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltOperation {
    pub name: String,
    pub network: Network,
    /// Top-level steps; flashloan children are embedded in their wrapper.
    pub actions: Vec<Action>,
    /// Definition derived from the built steps.
    pub definition: OperationDefinition,
}

impl BuiltOperation {
    /// Pre-order flat view, the numbering used by parameter mappings.
    pub fn flat(&self) -> Vec<&Action> {
        Action::flatten(&self.actions)
    }

    pub fn flat_calls(&self) -> Vec<ActionCall> {
        self.flat().into_iter().map(|action| action.call().clone()).collect()
    }

    /// Top-level calls as handed to the executor.
    pub fn calls(&self) -> Vec<abi::Call> {
        self.actions
            .iter()
            .map(|action| abi::Call::from(action.call()))
            .collect()
    }

    pub fn fingerprint(&self) -> B256 {
        self.definition.fingerprint()
    }

    /// Number of calls the executor will run. A skipped flashloan takes its
    /// children with it.
    pub fn executed_count(&self) -> usize {
        fn count(actions: &[Action]) -> usize {
            actions
                .iter()
                .filter(|action| !action.is_skipped())
                .map(|action| 1 + count(action.children()))
                .sum()
        }
        count(&self.actions)
    }

    /// `executeOp(Call[], string)` calldata for the operation executor.
    pub fn encode_execute_op(&self) -> Bytes {
        let call = abi::executeOpCall {
            calls: self.calls(),
            operationName: self.name.clone(),
        };
        Bytes::from(call.abi_encode())
    }
}
