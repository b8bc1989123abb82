//! Runs an [`ExecutionPlan`] against individual records.
use crate::ast::{Expression, is_truthy, type_name};
use crate::compiler::guards::BranchIndex;
use crate::compiler::nodes::CompiledStep;
use crate::error::{EvaluationError, StepFailure};
use crate::graph::NodeIndex;
use crate::plan::{ExecutionPlan, PlanEntry};
use crate::trace::{ExecutionTrace, StepOutcome, StepTrace};
use serde_json::{Map, Value};
use tracing::trace;

mod engine;
pub mod merge;

use engine::AstEngine;
use merge::{merge, set_by_path};

/// The evolving state of one record: its JSON data and the branch each switch chose.
#[derive(Debug, Clone)]
pub struct RecordContext {
    /// Always a JSON object.
    data: Value,
    choices: Vec<Option<BranchIndex>>,
}

impl RecordContext {
    pub fn new(record: &Value, node_count: usize) -> Result<Self, EvaluationError> {
        if !record.is_object() {
            return Err(EvaluationError::NonObjectRecord(
                type_name(record).to_string(),
            ));
        }
        Ok(Self {
            data: record.clone(),
            choices: vec![None; node_count],
        })
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// The branch a switch node chose for this record, if it ran and matched.
    pub fn choice(&self, switch: NodeIndex) -> Option<BranchIndex> {
        self.choices.get(switch).copied().flatten()
    }

    fn fields(&self) -> Map<String, Value> {
        self.data.as_object().cloned().unwrap_or_default()
    }

    fn absorb(&mut self, contribution: Map<String, Value>) {
        if let Value::Object(fields) = &mut self.data {
            merge(fields, contribution);
        }
    }
}

/// The result of running one step: what it contributes, and for switches, which branch.
struct StepResult {
    contribution: Map<String, Value>,
    choice: Option<BranchIndex>,
}

impl ExecutionPlan {
    /// Evaluates one record. The record must be a JSON object.
    pub fn evaluate(&self, record: &Value) -> Result<Value, StepFailure> {
        self.run(record, None)
    }

    /// Evaluates one record and reports what every planned node did.
    pub fn evaluate_traced(&self, record: &Value) -> (Result<Value, StepFailure>, ExecutionTrace) {
        let mut trace = ExecutionTrace::default();
        let result = self.run(record, Some(&mut trace));
        (result, trace)
    }

    fn run(
        &self,
        record: &Value,
        mut trace: Option<&mut ExecutionTrace>,
    ) -> Result<Value, StepFailure> {
        let mut context =
            RecordContext::new(record, self.node_count()).map_err(|error| StepFailure {
                node_id: self.node_id(self.input()).unwrap_or_default().to_string(),
                error,
                partial: Value::Object(Map::new()),
            })?;

        let mut output = Map::new();
        if self.input_feeds_output() {
            merge(&mut output, context.fields());
        }

        for entry in self.entries() {
            if let Some((switch, branch)) = entry.guard.first_unmet(&context.choices) {
                trace!(
                    node_id = %entry.node_id,
                    switch = self.node_id(switch).unwrap_or_default(),
                    "guard not met, skipping"
                );
                if let Some(trace) = trace.as_deref_mut() {
                    trace.steps.push(self.step_trace(
                        entry,
                        StepOutcome::Skipped {
                            switch_id: self.node_id(switch).unwrap_or_default().to_string(),
                            branch: self.branch_id(switch, branch),
                        },
                    ));
                }
                continue;
            }

            let result = match run_step(&entry.step, &context) {
                Ok(result) => result,
                Err(error) => {
                    if let Some(trace) = trace.as_deref_mut() {
                        trace.steps.push(self.step_trace(
                            entry,
                            StepOutcome::Failed {
                                error: error.to_string(),
                            },
                        ));
                    }
                    return Err(StepFailure {
                        node_id: entry.node_id.clone(),
                        error,
                        partial: Value::Object(output),
                    });
                }
            };

            if let (Some(choice), Some(slot)) =
                (result.choice, context.choices.get_mut(entry.node))
            {
                *slot = Some(choice);
            }
            if let Some(trace) = trace.as_deref_mut() {
                trace.steps.push(self.step_trace(
                    entry,
                    StepOutcome::Ran {
                        contribution: Value::Object(result.contribution.clone()),
                        branch: result.choice.map(|choice| self.branch_id(entry.node, choice)),
                    },
                ));
            }
            if entry.feeds_output {
                merge(&mut output, result.contribution.clone());
            }
            context.absorb(result.contribution);
        }

        Ok(Value::Object(output))
    }

    fn step_trace(&self, entry: &PlanEntry, outcome: StepOutcome) -> StepTrace {
        StepTrace {
            node_id: entry.node_id.clone(),
            name: entry.name.clone(),
            kind: entry.step.kind_name(),
            outcome,
        }
    }

    /// Statement id of `branch` on the switch at `switch`.
    fn branch_id(&self, switch: NodeIndex, branch: BranchIndex) -> String {
        self.entries()
            .iter()
            .find(|entry| entry.node == switch)
            .and_then(|entry| match &entry.step {
                CompiledStep::Switch(step) => step.branches.get(branch),
                _ => None,
            })
            .map(|found| found.id.clone())
            .unwrap_or_else(|| format!("#{}", branch))
    }
}

fn run_step(step: &CompiledStep, context: &RecordContext) -> Result<StepResult, EvaluationError> {
    let data = context.data();
    let mut choice = None;
    let contribution = match step {
        CompiledStep::Expression(step) => {
            let mut engine = AstEngine::new(data);
            let mut result = Map::new();
            for assignment in &step.assignments {
                let value = engine.evaluate(&assignment.expression)?;
                set_by_path(&mut result, &assignment.path, value);
            }
            if step.pass_through {
                let mut full = context.fields();
                merge(&mut full, result);
                full
            } else {
                result
            }
        }

        CompiledStep::DecisionTable(step) => {
            let mut engine = AstEngine::new(data);
            let mut result = Map::new();
            for rule in &step.rules {
                if matches_all(&mut engine, rule.conditions.iter())? {
                    for assignment in &rule.outputs {
                        let value = engine.evaluate(&assignment.expression)?;
                        set_by_path(&mut result, &assignment.path, value);
                    }
                    break;
                }
            }
            result
        }

        CompiledStep::Switch(step) => {
            let mut engine = AstEngine::new(data);
            let mut result = Map::new();
            for (index, branch) in step.branches.iter().enumerate() {
                if matches_all(&mut engine, branch.condition.iter())? {
                    choice = Some(index);
                    if branch.feeds_output {
                        result = context.fields();
                    }
                    break;
                }
            }
            result
        }

        CompiledStep::Function(step) => match AstEngine::run_handler(&step.handler, data)? {
            Value::Object(result) => result,
            // Non-object results contribute nothing.
            _ => Map::new(),
        },
    };
    Ok(StepResult {
        contribution,
        choice,
    })
}

fn matches_all<'a>(
    engine: &mut AstEngine<'a>,
    conditions: impl Iterator<Item = &'a Expression>,
) -> Result<bool, EvaluationError> {
    for condition in conditions {
        if !is_truthy(&engine.evaluate(condition)?) {
            return Ok(false);
        }
    }
    Ok(true)
}
