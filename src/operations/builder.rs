//! Operation builder: step specs → encoded, verified `BuiltOperation`.
//!
//! Building runs in two passes over the step tree:
//!
//! 1. **Plan**: walk the tree pre-order, assign every step its flat 1-indexed
//!    position, collect labels and skipped positions, and reject mandatory
//!    steps that are marked skipped.
//! 2. **Encode**: resolve parameter mappings against the plan, encode every
//!    leaf and settle its balance flows (a mapped amount takes the value the
//!    referenced step stores), check each flashloan's repayment against the
//!    flows of its descendants, then encode the wrapper around its children's
//!    calls. Children of a skipped wrapper are marked skipped too.
//!
//! The result is compared against the database's static definition of the
//! same name, when one exists. Building is pure: identical inputs give
//! byte-identical calls.

use crate::actions::flashloan::RepaymentLedger;
use crate::actions::{
    names, Action, ActionEncoder, ActionStep, BalanceFlow, FlashloanAction, FlashloanParams,
    LeafAction, ParamsMappingResolver,
};
use crate::errors::{BuildError, Result};
use crate::operations::{ActionEntry, BuiltOperation, OperationDefinition};
use crate::registry::OperationsDatabase;
use alloy::primitives::U256;
use itertools::{EitherOrBoth, Itertools};
use std::collections::{HashMap, HashSet};

/// Parameter mappings address positions with a `uint8`.
const MAX_FLAT_ACTIONS: usize = u8::MAX as usize;

#[derive(Debug, Clone, PartialEq)]
enum StepKind {
    Action(ActionStep),
    Flashloan {
        params: FlashloanParams,
        children: Vec<StepSpec>,
    },
}

/// One step of an operation under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    kind: StepKind,
    optional: bool,
    skipped: bool,
    label: Option<String>,
}

impl StepSpec {
    /// A mandatory leaf step.
    pub fn action(step: ActionStep) -> Self {
        Self {
            kind: StepKind::Action(step),
            optional: false,
            skipped: false,
            label: None,
        }
    }

    /// A mandatory flashloan wrapping `children`.
    pub fn flashloan(params: FlashloanParams, children: Vec<StepSpec>) -> Self {
        Self {
            kind: StepKind::Flashloan { params, children },
            optional: false,
            skipped: false,
            label: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark the step skipped when `condition` holds.
    pub fn skip_if(mut self, condition: bool) -> Self {
        self.skipped = condition;
        self
    }

    /// Name the step so later steps can map its output with
    /// `ParamSource::FromLabel`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn name(&self) -> &str {
        match &self.kind {
            StepKind::Action(step) => &step.name,
            StepKind::Flashloan { .. } => names::TAKE_FLASHLOAN,
        }
    }
}

#[derive(Default)]
struct Plan {
    labels: HashMap<String, usize>,
    skipped: HashSet<usize>,
    entries: Vec<ActionEntry>,
}

/// What the encode pass learned about each flat position, indexed by
/// position - 1.
#[derive(Default)]
struct Settled {
    outputs: Vec<Option<U256>>,
    flows: Vec<Vec<BalanceFlow>>,
}

impl Settled {
    fn push(&mut self, flows: Vec<BalanceFlow>, output: Option<U256>) {
        self.flows.push(flows);
        self.outputs.push(output);
    }
}

/// Composes steps into an operation for the database's network.
pub struct OperationBuilder<'a> {
    database: &'a OperationsDatabase,
    name: String,
    steps: Vec<StepSpec>,
}

impl<'a> OperationBuilder<'a> {
    pub fn new(database: &'a OperationsDatabase, name: impl Into<String>) -> Self {
        Self {
            database,
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = StepSpec>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Build the operation.
    ///
    /// # Errors
    ///
    /// - `BuildError::EmptyOperation` / `TooManyActions` for bad sizes
    /// - `BuildError::DuplicateLabel` when two steps share a label
    /// - `BuildError::MandatoryActionSkipped` when a mandatory step is skipped
    /// - `MappingError` for references that are not strictly backward
    /// - `ActionError` for unknown actions or bad arguments
    /// - `BuildError::UnbalancedFlashloan` when a flashloan is not repaid
    /// - `BuildError::DefinitionMismatch` when the result differs from the
    ///   static definition of the same name
    pub fn build(self) -> Result<BuiltOperation> {
        if self.steps.is_empty() {
            return Err(BuildError::EmptyOperation {
                operation: self.name,
            }
            .into());
        }

        let mut plan = Plan::default();
        let mut position = 0;
        plan_steps(&self.steps, &mut position, false, &mut plan)?;

        if plan.entries.len() > MAX_FLAT_ACTIONS {
            return Err(BuildError::TooManyActions {
                operation: self.name,
                max: MAX_FLAT_ACTIONS,
            }
            .into());
        }

        let resolver = ParamsMappingResolver::new(plan.entries.len())
            .with_labels(plan.labels)
            .with_skipped(plan.skipped);
        let encoder = ActionEncoder::new(self.database);

        let mut position = 0;
        let mut settled = Settled::default();
        let actions = encode_steps(
            &self.steps,
            &mut position,
            false,
            &resolver,
            &encoder,
            &mut settled,
        )?;

        let definition = OperationDefinition::new(self.name.clone(), plan.entries);
        if let Some(expected) = self.database.operation_definition(&self.name) {
            check_definition(expected, &definition)?;
        }

        let built = BuiltOperation {
            name: self.name,
            network: self.database.network(),
            actions,
            definition,
        };

        tracing::debug!(
            operation = %built.name,
            network = %built.network,
            actions = built.definition.actions.len(),
            executed = built.executed_count(),
            fingerprint = %built.fingerprint(),
            "Built operation"
        );

        Ok(built)
    }
}

fn plan_steps(
    steps: &[StepSpec],
    position: &mut usize,
    parent_skipped: bool,
    plan: &mut Plan,
) -> Result<()> {
    for step in steps {
        *position += 1;
        let current = *position;

        if step.skipped && !step.optional {
            return Err(BuildError::MandatoryActionSkipped {
                position: current,
                name: step.name().to_string(),
            }
            .into());
        }

        let skipped = step.skipped || parent_skipped;
        if skipped {
            plan.skipped.insert(current);
        }

        if let Some(label) = &step.label {
            if plan.labels.insert(label.clone(), current).is_some() {
                return Err(BuildError::DuplicateLabel {
                    label: label.clone(),
                }
                .into());
            }
        }

        plan.entries.push(ActionEntry::new(step.name(), step.optional));

        if let StepKind::Flashloan { children, .. } = &step.kind {
            plan_steps(children, position, skipped, plan)?;
        }
    }
    Ok(())
}

fn encode_steps(
    steps: &[StepSpec],
    position: &mut usize,
    parent_skipped: bool,
    resolver: &ParamsMappingResolver,
    encoder: &ActionEncoder<'_, OperationsDatabase>,
    settled: &mut Settled,
) -> Result<Vec<Action>> {
    let mut actions = Vec::with_capacity(steps.len());

    for step in steps {
        *position += 1;
        let current = *position;
        let skipped = step.skipped || parent_skipped;

        let action = match &step.kind {
            StepKind::Action(action_step) => {
                let mapping = resolver.resolve_all(current, &action_step.mapping)?;
                let call = action_step.encode(encoder, &mapping)?.skip(skipped);

                if skipped {
                    settled.push(Vec::new(), None);
                } else {
                    let amount = action_step.settled_amount(&mapping, &settled.outputs);
                    settled.push(action_step.flows_for(amount), action_step.output_for(amount));
                }

                Action::Leaf(LeafAction {
                    name: action_step.name.clone(),
                    optional: step.optional,
                    call,
                })
            }
            StepKind::Flashloan { params, children } => {
                // The nested principal comes in and goes back out; only its fee
                // lands on an enclosing loan of the same asset.
                if skipped {
                    settled.push(Vec::new(), None);
                } else {
                    settled.push(
                        vec![BalanceFlow::Outflow {
                            asset: params.asset,
                            amount: params.fee(),
                        }],
                        None,
                    );
                }

                let built_children =
                    encode_steps(children, position, skipped, resolver, encoder, settled)?;
                if !skipped {
                    check_repayment(params, &settled.flows[current..*position])?;
                }

                let child_calls: Vec<_> = built_children
                    .iter()
                    .map(|child| child.call().clone())
                    .collect();
                let call = encoder
                    .encode_typed(names::TAKE_FLASHLOAN, &params.to_data(&child_calls), None)?
                    .skip(skipped);

                Action::Flashloan(FlashloanAction {
                    name: names::TAKE_FLASHLOAN.to_string(),
                    optional: step.optional,
                    call,
                    params: params.clone(),
                    children: built_children,
                })
            }
        };

        actions.push(action);
    }

    Ok(actions)
}

/// Run the settled flows of a flashloan's descendants for the loaned asset
/// and require the principal plus fee to be back by the end.
fn check_repayment(params: &FlashloanParams, descendants: &[Vec<BalanceFlow>]) -> Result<()> {
    let mut ledger = RepaymentLedger::new(params);
    for flow in descendants.iter().flatten() {
        ledger.apply(flow);
    }

    let required = params.required_repayment();
    if !ledger.covers(required) {
        tracing::warn!(
            asset = %params.asset,
            amount = %params.amount,
            required = %required,
            available = %ledger.balance(),
            "Flashloan not repaid by nested calls"
        );
        return Err(BuildError::UnbalancedFlashloan {
            asset: params.asset,
            amount: params.amount.to_string(),
            required: required.to_string(),
            available: ledger.balance().to_string(),
        }
        .into());
    }
    Ok(())
}

fn check_definition(expected: &OperationDefinition, built: &OperationDefinition) -> Result<()> {
    let describe =
        |entry: &ActionEntry| format!("{}{}", entry.name, if entry.optional { " (optional)" } else { "" });

    for (index, pair) in expected.actions.iter().zip_longest(&built.actions).enumerate() {
        let (expected_entry, built_entry) = match pair {
            EitherOrBoth::Both(left, right) if left.hash == right.hash && left.optional == right.optional => {
                continue
            }
            EitherOrBoth::Both(left, right) => (Some(describe(left)), Some(describe(right))),
            EitherOrBoth::Left(left) => (Some(describe(left)), None),
            EitherOrBoth::Right(right) => (None, Some(describe(right))),
        };

        return Err(BuildError::DefinitionMismatch {
            operation: expected.name.clone(),
            index,
            expected: expected_entry,
            built: built_entry,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::abi::{self, FlashloanData};
    use crate::actions::library;
    use crate::actions::{FlashloanProvider, ParamSource};
    use crate::errors::{MappingError, OpsError};
    use crate::utils::Network;
    use alloy::primitives::{Address, Bytes, U256};
    use alloy::sol_types::{SolCall, SolValue};

    fn dai() -> Address {
        Address::repeat_byte(0xda)
    }

    fn weth() -> Address {
        Address::repeat_byte(0x0e)
    }

    fn executor() -> Address {
        Address::repeat_byte(0x77)
    }

    fn database() -> OperationsDatabase {
        OperationsDatabase::for_network(Network::Mainnet)
    }

    fn swap_dai_for_weth(amount: u64, receive: u64) -> ActionStep {
        library::swap(library::SwapParams {
            from_asset: dai(),
            to_asset: weth(),
            amount: U256::from(amount),
            receive_at_least: U256::from(receive),
            fee: U256::from(20),
            with_data: Bytes::new(),
            collect_fee_in_from_token: true,
        })
    }

    /// Flashloan DAI, swap part of it and bring `returned` DAI back.
    fn flashloan_children(borrowed: u64, returned: u64) -> Vec<StepSpec> {
        vec![
            StepSpec::action(swap_dai_for_weth(borrowed, 1)).label("swap"),
            StepSpec::action(library::pull_token(dai(), executor(), U256::from(returned))),
        ]
    }

    #[test]
    fn test_balanced_flashloan_embeds_children() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let built = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(params, flashloan_children(1_000, 1_000)))
            .step(StepSpec::action(library::return_funds(weth())))
            .build()
            .unwrap();

        let names: Vec<_> = built.flat().iter().map(|action| action.name().to_string()).collect();
        assert_eq!(
            names,
            vec![names::TAKE_FLASHLOAN, names::SWAP, names::PULL_TOKEN, names::RETURN_FUNDS]
        );

        let wrapper = abi::executeCall::abi_decode(&built.actions[0].call().call_data).unwrap();
        let data = FlashloanData::abi_decode(&wrapper.data).unwrap();
        assert_eq!(data.amount, U256::from(1_000));
        assert_eq!(data.calls.len(), 2);
        assert_eq!(data.calls[0].targetHash, built.flat()[1].call().target_hash);
    }

    #[test]
    fn test_unbalanced_flashloan_is_rejected() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(params, flashloan_children(1_000, 999)))
            .build();

        assert!(matches!(
            result,
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { .. }))
        ));
    }

    #[test]
    fn test_fee_must_be_repaid() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::Balancer, dai(), U256::from(10_000))
            .with_fee_bps(9);

        let short = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(params.clone(), flashloan_children(10_000, 10_008)))
            .build();
        assert!(matches!(
            short,
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { .. }))
        ));

        let repaid = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(params, flashloan_children(10_000, 10_009)))
            .build();
        assert!(repaid.is_ok());
    }

    #[test]
    fn test_drain_inside_flashloan_is_rejected() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(
                params,
                vec![StepSpec::action(library::return_funds(dai()))],
            ))
            .build();

        assert!(matches!(
            result,
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { .. }))
        ));
    }

    #[test]
    fn test_skipped_steps_do_not_count_toward_repayment() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(
                params,
                vec![
                    StepSpec::action(swap_dai_for_weth(1_000, 1)),
                    StepSpec::action(library::pull_token(dai(), executor(), U256::from(1_000)))
                        .optional()
                        .skip_if(true),
                ],
            ))
            .build();

        assert!(matches!(
            result,
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { .. }))
        ));
    }

    #[test]
    fn test_mapped_amount_is_charged_at_referenced_output() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));

        // The deposit's literal is zero, but its amount slot reads the
        // wrapper's position, which stores nothing known before execution.
        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(
                params.clone(),
                vec![StepSpec::action(
                    library::deposit(crate::protocols::ProtocolVersion::AaveV3, dai(), U256::ZERO, true, true)
                        .map_slot(1, ParamSource::FromAction(1)),
                )],
            ))
            .build();
        assert!(matches!(
            result,
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { .. }))
        ));

        // Sending on what a swap brought back is charged at the swap's
        // minimum received, not at the zero literal.
        let spent = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(
                params,
                vec![
                    StepSpec::action(swap_dai_for_weth(1_000, 3)),
                    StepSpec::action(library::swap(library::SwapParams {
                        from_asset: weth(),
                        to_asset: dai(),
                        amount: U256::from(3),
                        receive_at_least: U256::from(1_000),
                        fee: U256::ZERO,
                        with_data: Bytes::new(),
                        collect_fee_in_from_token: false,
                    }))
                    .label("back"),
                    StepSpec::action(
                        library::send_token(dai(), executor(), U256::ZERO)
                            .map_slot(2, ParamSource::label("back")),
                    ),
                ],
            ))
            .build();
        match spent {
            Err(OpsError::Build(BuildError::UnbalancedFlashloan { available, .. })) => {
                assert_eq!(available, "0");
            }
            other => panic!("expected UnbalancedFlashloan, got {:?}", other),
        }
    }

    #[test]
    fn test_skipped_flashloan_skips_its_children() {
        let db = database();
        let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let built = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(library::return_funds(dai())))
            .step(
                StepSpec::flashloan(
                    params,
                    vec![
                        StepSpec::action(library::pull_token(dai(), executor(), U256::from(1)))
                            .label("pull"),
                        StepSpec::action(
                            library::send_token(dai(), executor(), U256::ZERO)
                                .map_slot(2, ParamSource::label("pull")),
                        ),
                    ],
                )
                .optional()
                .skip_if(true),
            )
            .build()
            .unwrap();

        let flat = built.flat();
        assert!(flat[1].is_skipped());
        assert!(flat[2].is_skipped());
        assert!(flat[3].is_skipped());
        assert!(!flat[2].is_optional());

        assert_eq!(built.executed_count(), 1);
        assert_eq!(built.definition.verify_calls(&built.flat_calls()).unwrap(), 1);

        let wrapper = abi::executeCall::abi_decode(&flat[1].call().call_data).unwrap();
        let data = FlashloanData::abi_decode(&wrapper.data).unwrap();
        assert!(data.calls.iter().all(|call| call.skipped));
    }

    #[test]
    fn test_nested_flashloan_fee_is_charged() {
        let db = database();
        let outer = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
        let inner = FlashloanParams::new(FlashloanProvider::Balancer, dai(), U256::from(500))
            .with_fee_bps(100);

        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::flashloan(
                outer,
                vec![StepSpec::flashloan(
                    inner,
                    vec![StepSpec::action(library::pull_token(
                        dai(),
                        executor(),
                        U256::from(5),
                    ))],
                )],
            ))
            .build()
            .unwrap();

        // Inner fee 5 is covered by the pull, so the outer loan nets to zero.
        assert_eq!(result.flat().len(), 3);
    }

    #[test]
    fn test_label_mapping_resolves_backward() {
        let db = database();
        let built = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(swap_dai_for_weth(10, 1)).label("swap"))
            .step(StepSpec::action(
                library::deposit(
                    crate::protocols::ProtocolVersion::AaveV3,
                    weth(),
                    U256::ZERO,
                    true,
                    true,
                )
                .map_slot(1, ParamSource::label("swap")),
            ))
            .build()
            .unwrap();

        let deposit = abi::executeCall::abi_decode(&built.flat()[1].call().call_data).unwrap();
        assert_eq!(deposit.paramsMap, vec![0, 1, 0, 0]);
    }

    #[test]
    fn test_forward_and_self_references_fail() {
        let db = database();

        let forward = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(
                library::return_funds(weth()).map_slot(0, ParamSource::label("later")),
            ))
            .step(StepSpec::action(swap_dai_for_weth(10, 1)).label("later"))
            .build();
        assert!(matches!(
            forward,
            Err(OpsError::Mapping(MappingError::InvalidReference { position: 1, reference: 2, .. }))
        ));

        let own = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(
                library::return_funds(weth()).map_slot(0, ParamSource::FromAction(1)),
            ))
            .build();
        assert!(matches!(
            own,
            Err(OpsError::Mapping(MappingError::InvalidReference { .. }))
        ));
    }

    #[test]
    fn test_mandatory_step_cannot_be_skipped() {
        let db = database();
        let result = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(library::return_funds(dai())))
            .step(StepSpec::action(library::return_funds(weth())).skip_if(true))
            .build();

        assert!(matches!(
            result,
            Err(OpsError::Build(BuildError::MandatoryActionSkipped { position: 2, .. }))
        ));
    }

    #[test]
    fn test_duplicate_labels_and_empty_operations() {
        let db = database();
        let duplicate = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(library::return_funds(dai())).label("ret"))
            .step(StepSpec::action(library::return_funds(weth())).label("ret"))
            .build();
        assert!(matches!(
            duplicate,
            Err(OpsError::Build(BuildError::DuplicateLabel { .. }))
        ));

        assert!(matches!(
            OperationBuilder::new(&db, "CustomOperation").build(),
            Err(OpsError::Build(BuildError::EmptyOperation { .. }))
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let db = database();
        let build = || {
            let params = FlashloanParams::new(FlashloanProvider::DssFlash, dai(), U256::from(1_000));
            OperationBuilder::new(&db, "CustomOperation")
                .step(StepSpec::flashloan(params, flashloan_children(1_000, 1_000)))
                .step(StepSpec::action(library::return_funds(weth())))
                .build()
                .unwrap()
        };

        let first = build();
        let second = build();
        assert_eq!(first, second);
        assert_eq!(first.encode_execute_op(), second.encode_execute_op());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_drift_from_static_definition_is_rejected() {
        let db = database();
        let result = OperationBuilder::new(&db, "AAVEV3DepositBorrow")
            .step(StepSpec::action(library::return_funds(dai())).optional())
            .build();

        match result {
            Err(OpsError::Build(BuildError::DefinitionMismatch { index, expected, built, .. })) => {
                assert_eq!(index, 0);
                assert_eq!(expected.as_deref(), Some("PullToken_3 (optional)"));
                assert_eq!(built.as_deref(), Some("ReturnFunds_3 (optional)"));
            }
            other => panic!("expected DefinitionMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_op_payload() {
        let db = database();
        let built = OperationBuilder::new(&db, "CustomOperation")
            .step(StepSpec::action(library::return_funds(dai())))
            .build()
            .unwrap();

        let decoded = abi::executeOpCall::abi_decode(&built.encode_execute_op()).unwrap();
        assert_eq!(decoded.operationName, "CustomOperation");
        assert_eq!(decoded.calls.len(), 1);
        assert_eq!(
            decoded.calls[0].abi_encode(),
            abi::Call::from(built.actions[0].call()).abi_encode()
        );
    }
}
