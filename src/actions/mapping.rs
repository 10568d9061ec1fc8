//! Positional parameter mapping between the steps of one operation.
//!
//! Each action receives a `uint8[]` next to its encoded arguments, one entry
//! per input slot. `0` tells the executor to use the literal value from the
//! encoded arguments; `n > 0` tells it to overwrite the slot with the output
//! stored by the action at flat position `n` (1-indexed, pre-order over the
//! action tree, so a flashloan's children are numbered after the wrapper).
//!
//! References must point strictly backward. This module only prevents an
//! invalid payload from being constructed; it has no on-chain behavior.

use crate::errors::{MappingError, Result};
use std::collections::{HashMap, HashSet};

/// Where one input slot of an action takes its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamSource {
    /// Use the value embedded in the action's own arguments.
    Literal,
    /// Use the output of the action at this flat 1-indexed position.
    FromAction(usize),
    /// Use the output of the step carrying this label.
    FromLabel(String),
}

impl ParamSource {
    /// Shorthand for `ParamSource::FromLabel`.
    pub fn label(label: impl Into<String>) -> Self {
        ParamSource::FromLabel(label.into())
    }
}

/// Validate a reference from the action at `position` to the action at
/// `reference` within a flat list of `list_len` actions.
///
/// Returns the wire value for the slot.
///
/// # Errors
///
/// Returns `MappingError::InvalidReference` when the reference is zero, points
/// at the consumer itself or forward, lies outside the list, or does not fit
/// in a `uint8`.
pub fn resolve_reference(position: usize, list_len: usize, reference: usize) -> Result<u8> {
    let invalid = |reason: &str| -> crate::errors::OpsError {
        MappingError::InvalidReference {
            position,
            reference,
            reason: reason.to_string(),
        }
        .into()
    };

    if reference == 0 {
        return Err(invalid("positions are 1-indexed; use a literal instead"));
    }
    if reference > list_len {
        return Err(invalid("reference lies outside the call list"));
    }
    if reference == position {
        return Err(invalid("an action cannot consume its own output"));
    }
    if reference > position {
        return Err(invalid("forward references are not allowed"));
    }

    u8::try_from(reference).map_err(|_| invalid("reference does not fit in uint8"))
}

/// Resolves every slot of every action in one flat call list.
///
/// Labels are turned into positions first, then each reference is checked with
/// `resolve_reference`. References to skipped actions are rejected too: a
/// skipped action stores no output.
#[derive(Debug, Clone)]
pub struct ParamsMappingResolver {
    list_len: usize,
    labels: HashMap<String, usize>,
    skipped: HashSet<usize>,
}

impl ParamsMappingResolver {
    pub fn new(list_len: usize) -> Self {
        Self {
            list_len,
            labels: HashMap::new(),
            skipped: HashSet::new(),
        }
    }

    /// Register the flat position of a labelled step.
    pub fn with_labels(mut self, labels: HashMap<String, usize>) -> Self {
        self.labels = labels;
        self
    }

    /// Register the flat positions of skipped steps.
    pub fn with_skipped(mut self, skipped: HashSet<usize>) -> Self {
        self.skipped = skipped;
        self
    }

    /// Resolve one slot of the action at `position`.
    pub fn resolve(&self, position: usize, source: &ParamSource) -> Result<u8> {
        let reference = match source {
            ParamSource::Literal => return Ok(0),
            ParamSource::FromAction(reference) => *reference,
            ParamSource::FromLabel(label) => {
                *self.labels.get(label).ok_or_else(|| MappingError::UnknownLabel {
                    position,
                    label: label.clone(),
                })?
            }
        };

        let value = resolve_reference(position, self.list_len, reference)?;

        // A skipped consumer reads nothing.
        if self.skipped.contains(&reference) && !self.skipped.contains(&position) {
            return Err(MappingError::InvalidReference {
                position,
                reference,
                reason: "referenced action is skipped and stores no output".to_string(),
            }
            .into());
        }

        Ok(value)
    }

    /// Resolve all slots of the action at `position`.
    pub fn resolve_all(&self, position: usize, sources: &[ParamSource]) -> Result<Vec<u8>> {
        sources
            .iter()
            .map(|source| self.resolve(position, source))
            .collect()
    }
}
