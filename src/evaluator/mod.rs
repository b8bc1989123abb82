use crate::error::StepFailure;
use crate::plan::ExecutionPlan;
use crate::trace::ExecutionTrace;
use rayon::prelude::*;
use serde_json::Value;
use tracing::debug;

/// The result for one record of a batch. Failures stay attached to their record.
pub type RecordOutcome = Result<Value, StepFailure>;

/// How a batch of records is spread over threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Parallelism {
    #[default]
    Sequential,
    /// Records are distributed over the rayon thread pool.
    Parallel,
}

/// Evaluates records against a compiled [`ExecutionPlan`].
///
/// An `Evaluator` can be used repeatedly and safely across multiple threads; every record
/// is evaluated in a fresh context, so a failing record never affects the others.
pub struct Evaluator {
    plan: ExecutionPlan,
    parallelism: Parallelism,
}

impl Evaluator {
    pub fn new(plan: ExecutionPlan) -> Self {
        Self {
            plan,
            parallelism: Parallelism::default(),
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn eval(&self, record: &Value) -> RecordOutcome {
        self.plan.evaluate(record)
    }

    pub fn eval_traced(&self, record: &Value) -> (RecordOutcome, ExecutionTrace) {
        self.plan.evaluate_traced(record)
    }

    /// Evaluates every record. Outcomes are returned in input order.
    pub fn eval_batch(&self, records: &[Value]) -> Vec<RecordOutcome> {
        debug!(
            records = records.len(),
            parallelism = ?self.parallelism,
            "evaluating batch"
        );
        match self.parallelism {
            Parallelism::Sequential => records.iter().map(|r| self.plan.evaluate(r)).collect(),
            Parallelism::Parallel => records.par_iter().map(|r| self.plan.evaluate(r)).collect(),
        }
    }
}
