//! Action encoding: name + arguments + mapping → `ActionCall`.
//!
//! The call data of every action is `execute(bytes data, uint8[] paramsMap)`,
//! where `data` is the argument tuple ABI-encoded as a single value
//! (`abi.encode(args)`) and `paramsMap` has one entry per tuple field.
//!
//! Two entry points produce the same wire format:
//!
//! - `encode` takes runtime type descriptors (`DynSolType`) and values, and
//!   checks arity and types before encoding
//! - `encode_typed` takes one of the `sol!` argument structs from `abi`, whose
//!   shape is checked at compile time

use crate::actions::{abi, ActionCall, ActionHash, BalanceFlow, Movement, StepOutput};
use crate::errors::{ActionError, Result};
use alloy::dyn_abi::{DynSolType, DynSolValue};
use alloy::primitives::{Bytes, U256};
use alloy::sol_types::{SolCall, SolValue};

/// Looks action names up in the registry namespace of one network.
pub trait ActionResolver {
    /// Hash of a registered action, `None` when the name is not registered.
    fn resolve_action(&self, name: &str) -> Option<ActionHash>;
}

/// Typed argument bundle of an action.
pub trait ActionData: SolValue {
    /// Number of input slots, i.e. the length of the parameter mapping.
    const SLOTS: usize;

    /// Input slot holding the amount the action moves, if any. A mapping may
    /// replace it with an earlier step's output.
    const AMOUNT_SLOT: Option<usize> = None;

    /// Literal value of the amount slot.
    fn amount(&self) -> U256 {
        U256::ZERO
    }

    /// Assets moved by whatever value the amount slot takes.
    fn movements(&self) -> Vec<Movement> {
        Vec::new()
    }

    /// Balance changes that do not depend on the amount slot.
    fn flows(&self) -> Vec<BalanceFlow> {
        Vec::new()
    }

    fn output(&self) -> StepOutput {
        if Self::AMOUNT_SLOT.is_some() {
            StepOutput::Amount
        } else {
            StepOutput::Nothing
        }
    }
}

/// Encodes actions against one network's registry namespace.
pub struct ActionEncoder<'a, R: ActionResolver + ?Sized> {
    resolver: &'a R,
}

impl<'a, R: ActionResolver + ?Sized> ActionEncoder<'a, R> {
    pub fn new(resolver: &'a R) -> Self {
        Self { resolver }
    }

    /// Encode an action from runtime type descriptors.
    ///
    /// # Arguments
    ///
    /// * `name` - Registered action name
    /// * `arg_types` - One descriptor per input slot
    /// * `args` - One value per input slot
    /// * `mapping` - Parameter mapping, all literal when `None`
    ///
    /// # Errors
    ///
    /// - `ActionError::UnknownAction` when the name is not registered
    /// - `ActionError::Encoding` on arity or type mismatch, or a mapping whose
    ///   length differs from the number of slots
    pub fn encode(
        &self,
        name: &str,
        arg_types: &[DynSolType],
        args: &[DynSolValue],
        mapping: Option<&[u8]>,
    ) -> Result<ActionCall> {
        let target_hash = self.target_hash(name)?;

        if arg_types.len() != args.len() {
            return Err(ActionError::Encoding {
                name: name.to_string(),
                reason: format!("expected {} arguments, got {}", arg_types.len(), args.len()),
            }
            .into());
        }

        if let Some(index) = arg_types
            .iter()
            .zip(args)
            .position(|(ty, value)| !ty.matches(value))
        {
            return Err(ActionError::Encoding {
                name: name.to_string(),
                reason: format!("argument {} does not match type {}", index, arg_types[index]),
            }
            .into());
        }

        let encoded = DynSolValue::Tuple(args.to_vec()).abi_encode();
        self.finish(name, target_hash, encoded, arg_types.len(), mapping)
    }

    /// Encode an action from a typed argument struct.
    ///
    /// # Errors
    ///
    /// Same as `encode`, except that type mismatches cannot occur.
    pub fn encode_typed<D: ActionData>(
        &self,
        name: &str,
        data: &D,
        mapping: Option<&[u8]>,
    ) -> Result<ActionCall> {
        let target_hash = self.target_hash(name)?;
        self.finish(name, target_hash, data.abi_encode(), D::SLOTS, mapping)
    }

    /// Encode arguments that were ABI-encoded ahead of time.
    pub(crate) fn encode_prepared(
        &self,
        name: &str,
        encoded: &[u8],
        slots: usize,
        mapping: Option<&[u8]>,
    ) -> Result<ActionCall> {
        let target_hash = self.target_hash(name)?;
        self.finish(name, target_hash, encoded.to_vec(), slots, mapping)
    }

    fn target_hash(&self, name: &str) -> Result<ActionHash> {
        self.resolver.resolve_action(name).ok_or_else(|| {
            ActionError::UnknownAction {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn finish(
        &self,
        name: &str,
        target_hash: ActionHash,
        encoded: Vec<u8>,
        slots: usize,
        mapping: Option<&[u8]>,
    ) -> Result<ActionCall> {
        let params_map = match mapping {
            Some(mapping) if mapping.len() != slots => {
                return Err(ActionError::Encoding {
                    name: name.to_string(),
                    reason: format!(
                        "parameter mapping has {} entries for {} input slots",
                        mapping.len(),
                        slots
                    ),
                }
                .into());
            }
            Some(mapping) => mapping.to_vec(),
            None => vec![0u8; slots],
        };

        tracing::trace!(
            action = name,
            target_hash = %target_hash,
            args_len = encoded.len(),
            params_map = ?params_map,
            "Encoded action"
        );

        let call_data = abi::executeCall {
            data: Bytes::from(encoded),
            paramsMap: params_map,
        }
        .abi_encode();

        Ok(ActionCall {
            target_hash,
            call_data: Bytes::from(call_data),
            skipped: false,
        })
    }
}
