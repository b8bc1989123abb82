//! # Kagami - Reference Interpreter for JDM Decision Graphs
//!
//! **Kagami** evaluates JSON decision models (JDM): graphs of expression, decision-table,
//! switch and function nodes between one input and any number of output nodes. It
//! reproduces what a native decision engine computes so that the two can be compared
//! record by record and benchmarked against each other.
//!
//! ## Core Workflow
//!
//! 1.  **Load**: Parse the JDM document (`JdmDocument::from_json`).
//! 2.  **Compile**: Use `Compiler::builder` to validate the graph, derive each node's
//!     guard (the switch branches it depends on), order the nodes and compile every
//!     expression, cell and handler into an AST. The result is an immutable
//!     `ExecutionPlan` that can be shared across threads or saved to disk.
//! 3.  **Evaluate**: Run records through `ExecutionPlan::evaluate`, or a whole batch
//!     through an `Evaluator`, optionally in parallel.
//! 4.  **Compare**: Check the results against an `Oracle` with `compare::compare`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kagami::prelude::*;
//! use serde_json::json;
//!
//! fn main() -> Result<()> {
//!     let json = std::fs::read_to_string("path/to/graph.json")?;
//!     let document = JdmDocument::from_json(&json)?;
//!
//!     let plan = Compiler::builder(document)
//!         .with_type_mapping("customExpressionNode", NodeKind::Expression)
//!         .build()
//!         .compile()?;
//!
//!     let evaluator = Evaluator::new(plan).with_parallelism(Parallelism::Parallel);
//!     let records = vec![json!({"weight": 7, "origin_country": "CN"})];
//!     for outcome in evaluator.eval_batch(&records) {
//!         match outcome {
//!             Ok(output) => println!("-> {}", output),
//!             Err(failure) => println!("-> failed at node '{}': {}", failure.node_id, failure.error),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod ast;
pub mod compare;
pub mod compiler;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod graph;
pub mod interpreter;
pub mod plan;
pub mod prelude;
pub mod trace;
