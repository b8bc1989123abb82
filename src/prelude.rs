//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the kagami crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use kagami::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let plan = Compiler::from_json(&std::fs::read_to_string("path/to/graph.json")?)?;
//! let records = RecordSet::from_file("path/to/records.json")?;
//!
//! for record in records.records() {
//!     println!("{:?}", plan.evaluate(record));
//! }
//! # Ok(())
//! # }
//! ```

// Core compilation and evaluation
pub use crate::compiler::{Compiler, CompilerBuilder};
pub use crate::evaluator::{Evaluator, Parallelism, RecordOutcome};
pub use crate::plan::{ExecutionPlan, PlanEntry};

// Graph model
pub use crate::graph::{JdmDocument, NodeKind};

// Comparison
pub use crate::compare::{ComparisonReport, Oracle, RecordedOracle, canonical_json, compare};

// Data structures
pub use crate::data::RecordSet;

// Error types
pub use crate::error::{BuildError, EvaluationError, GraphStructureError, StepFailure};

// Trace formatting
pub use crate::trace::{ExecutionTrace, TraceFormatter};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
