//! Per-record execution traces.
use serde::Serialize;
use serde_json::Value;

mod formatter;

pub use formatter::TraceFormatter;

/// What happened to every planned node while one record was evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionTrace {
    pub steps: Vec<StepTrace>,
}

impl ExecutionTrace {
    pub fn executed(&self) -> impl Iterator<Item = &StepTrace> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Ran { .. }))
    }

    pub fn skipped(&self) -> impl Iterator<Item = &StepTrace> {
        self.steps
            .iter()
            .filter(|step| matches!(step.outcome, StepOutcome::Skipped { .. }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepTrace {
    pub node_id: String,
    pub name: String,
    pub kind: &'static str,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Ran {
        contribution: Value,
        /// Statement id chosen by a switch node.
        branch: Option<String>,
    },
    /// The node's guard required `switch_id` to take `branch`, and it did not.
    Skipped { switch_id: String, branch: String },
    Failed { error: String },
}
