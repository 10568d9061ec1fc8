//! Actions: the atomic steps an operation is composed of.
//!
//! - `ActionCall`: the wire descriptor the executor consumes
//! - `Action`: a built step, either a leaf call or a flashloan wrapping children
//! - `ActionEncoder`: name + arguments → `ActionCall`
//! - `mapping`: positional parameter mapping between steps
//! - `library`: typed constructors for every executor action

pub mod abi;
pub mod encoder;
pub mod flashloan;
pub mod library;
pub mod mapping;
pub mod names;

pub use encoder::{ActionData, ActionEncoder, ActionResolver};
pub use flashloan::{FlashloanParams, FlashloanProvider};
pub use library::{ActionStep, AmountSlot, StepArgs};
pub use mapping::{resolve_reference, ParamSource, ParamsMappingResolver};

use alloy::primitives::{keccak256, Address, Bytes, B256, U256};

/// Registry key of an action: `keccak256` of its stable name.
pub type ActionHash = B256;

/// Hash an action or service name.
///
/// Pure function of the name bytes; two computations over the same name are
/// always identical.
pub fn action_hash(name: &str) -> ActionHash {
    keccak256(name.as_bytes())
}

/// The wire descriptor of one step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionCall {
    /// Which registered action to invoke.
    pub target_hash: ActionHash,
    /// `execute(bytes, uint8[])` calldata: encoded arguments plus parameter mapping.
    pub call_data: Bytes,
    /// Whether the executor should step over this action.
    pub skipped: bool,
}

impl ActionCall {
    /// Mark the call as skipped.
    pub fn skip(mut self, skipped: bool) -> Self {
        self.skipped = skipped;
        self
    }
}

impl From<&ActionCall> for abi::Call {
    fn from(call: &ActionCall) -> Self {
        abi::Call {
            targetHash: call.target_hash,
            callData: call.call_data.clone(),
            skipped: call.skipped,
        }
    }
}

/// Expected effect of a step on the executor's token balances.
///
/// Used at build time to check that a flashloan's nested calls repay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceFlow {
    Inflow { asset: Address, amount: U256 },
    Outflow { asset: Address, amount: U256 },
    /// Sends the whole balance of `asset` away.
    Drain { asset: Address },
}

impl BalanceFlow {
    /// The asset the flow applies to.
    pub fn asset(&self) -> Address {
        match self {
            BalanceFlow::Inflow { asset, .. }
            | BalanceFlow::Outflow { asset, .. }
            | BalanceFlow::Drain { asset } => *asset,
        }
    }
}

/// Direction in which the amount slot of a step moves an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    In(Address),
    Out(Address),
}

impl Movement {
    /// The flow once the amount is settled. An amount only known on chain
    /// spends the whole balance going out and is not credited coming in.
    pub fn settle(self, amount: Option<U256>) -> Option<BalanceFlow> {
        match (self, amount) {
            (Movement::In(asset), Some(amount)) => Some(BalanceFlow::Inflow { asset, amount }),
            (Movement::Out(asset), Some(amount)) => Some(BalanceFlow::Outflow { asset, amount }),
            (Movement::In(_), None) => None,
            (Movement::Out(asset), None) => Some(BalanceFlow::Drain { asset }),
        }
    }
}

/// What a step stores for later steps to read through the parameter mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutput {
    Nothing,
    /// The amount the step moved.
    Amount,
    /// A value fixed at build time, e.g. a swap's minimum received.
    Fixed(U256),
}

/// A leaf step of a built operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafAction {
    pub name: String,
    pub optional: bool,
    pub call: ActionCall,
}

/// A flashloan step; its call data embeds the encoded `children`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashloanAction {
    pub name: String,
    pub optional: bool,
    pub call: ActionCall,
    pub params: FlashloanParams,
    pub children: Vec<Action>,
}

/// A built step: actions form a tree because flashloans nest sub-sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Leaf(LeafAction),
    Flashloan(FlashloanAction),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Leaf(leaf) => &leaf.name,
            Action::Flashloan(flashloan) => &flashloan.name,
        }
    }

    pub fn call(&self) -> &ActionCall {
        match self {
            Action::Leaf(leaf) => &leaf.call,
            Action::Flashloan(flashloan) => &flashloan.call,
        }
    }

    pub fn is_optional(&self) -> bool {
        match self {
            Action::Leaf(leaf) => leaf.optional,
            Action::Flashloan(flashloan) => flashloan.optional,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.call().skipped
    }

    /// Nested steps, empty for leaves.
    pub fn children(&self) -> &[Action] {
        match self {
            Action::Leaf(_) => &[],
            Action::Flashloan(flashloan) => &flashloan.children,
        }
    }

    /// Pre-order walk: the wrapper comes before its children.
    ///
    /// Index `i` of the result is flat position `i + 1`, the numbering used by
    /// parameter mappings.
    pub fn flatten(actions: &[Action]) -> Vec<&Action> {
        let mut flat = Vec::new();
        for action in actions {
            Self::push_flat(action, &mut flat);
        }
        flat
    }

    fn push_flat<'a>(action: &'a Action, flat: &mut Vec<&'a Action>) {
        flat.push(action);
        for child in action.children() {
            Self::push_flat(child, flat);
        }
    }
}
