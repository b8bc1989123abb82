use std::fmt;
use thiserror::Error;

/// A syntax error inside a single expression, cell or handler source.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {position} in `{source_text}`")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
    pub source_text: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: usize, source_text: &str) -> Self {
        Self {
            message: message.into(),
            position,
            source_text: source_text.to_string(),
        }
    }
}

/// Violations of the graph's structural invariants.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphStructureError {
    #[error("The graph has no input node")]
    MissingInputNode,

    #[error("The graph has more than one input node ('{first}' and '{second}')")]
    MultipleInputNodes { first: String, second: String },

    #[error("Node id '{0}' is used by more than one node")]
    DuplicateNode(String),

    #[error("Edge '{edge_id}' references node '{node_id}', which does not exist")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("The graph contains a cycle; nodes left unscheduled: {}", .nodes.join(", "))]
    Cycle { nodes: Vec<String> },

    #[error("Edge '{edge_id}' leaves switch '{switch_id}' through unknown branch '{handle}'")]
    UnknownBranch {
        edge_id: String,
        switch_id: String,
        handle: String,
    },
}

/// Identifies the piece of node content a compile error originated from.
#[derive(Debug, Clone, PartialEq)]
pub enum CellLocation {
    Expression { key: String },
    Condition { row: usize, column: String },
    Output { row: usize, column: String },
    Statement { id: String },
    Handler,
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellLocation::Expression { key } => write!(f, "expression '{}'", key),
            CellLocation::Condition { row, column } => {
                write!(f, "condition cell (row {}, column '{}')", row, column)
            }
            CellLocation::Output { row, column } => {
                write!(f, "output cell (row {}, column '{}')", row, column)
            }
            CellLocation::Statement { id } => write!(f, "switch statement '{}'", id),
            CellLocation::Handler => write!(f, "function handler"),
        }
    }
}

/// Errors that abort plan construction. A graph that produces one of these cannot be
/// mirrored by this interpreter and should be skipped by comparison callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Failed to parse JDM document: {0}")]
    JsonParseError(String),

    #[error(transparent)]
    Structure(#[from] GraphStructureError),

    #[error("Node '{node_id}' has an unsupported node type: '{type_name}'")]
    UnsupportedNode { node_id: String, type_name: String },

    #[error("Decision table '{node_id}' uses unsupported hit policy '{policy}'")]
    UnsupportedHitPolicy { node_id: String, policy: String },

    #[error("Node '{node_id}' has invalid content: {message}")]
    InvalidContent { node_id: String, message: String },

    #[error("Node '{node_id}' failed to compile its {location}: {source}")]
    ExpressionCompile {
        node_id: String,
        location: CellLocation,
        source: ParseError,
    },

    #[error("Node '{node_id}' is reachable under more than one distinct guard")]
    AmbiguousGuard { node_id: String },
}

/// Errors raised while a compiled step processes a single record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: String,
    },

    #[error("Identifier '{0}' is not defined in the handler scope")]
    UnknownIdentifier(String),

    #[error("Callback for '{function}' declares {expected} parameter(s), but only {found} are supplied")]
    ArityMismatch {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("Value of '{0}' is a function and cannot be used as data")]
    NotCallable(String),

    #[error("Records must be JSON objects, but found {0}")]
    NonObjectRecord(String),
}

/// A per-record failure: the node that failed, why, and what had been produced so far.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Node '{node_id}' failed: {error}")]
pub struct StepFailure {
    pub node_id: String,
    pub error: EvaluationError,
    pub partial: serde_json::Value,
}

/// Errors raised when saving or loading a compiled plan.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Plan serialization failed: {0}")]
    Encode(String),

    #[error("Plan deserialization failed: {0}")]
    Decode(String),

    #[error("Plan file '{path}' could not be accessed: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// A failure reported by the oracle for a single record.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Oracle failed: {0}")]
pub struct OracleError(pub String);
