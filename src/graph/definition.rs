//! Wire-format types for JDM documents and the typed content of each node kind.
use crate::error::BuildError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A JDM document exactly as it arrives from storage or the graph editor.
/// Editor-only fields such as `position` are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JdmDocument {
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
}

impl JdmDocument {
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::JsonParseError(e.to_string()))
    }

    pub fn from_value(value: Value) -> Result<Self, BuildError> {
        serde_json::from_value(value).map_err(|e| BuildError::JsonParseError(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub content: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEdge {
    #[serde(default)]
    pub id: Option<String>,
    pub source_id: String,
    pub target_id: String,
    #[serde(default)]
    pub source_handle: Option<String>,
}

/// The node kinds this interpreter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Input,
    Expression,
    DecisionTable,
    Switch,
    Function,
    Output,
}

impl NodeKind {
    /// Resolves a raw JDM `type` string.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "inputNode" => NodeKind::Input,
            "expressionNode" => NodeKind::Expression,
            "decisionTableNode" => NodeKind::DecisionTable,
            "switchNode" => NodeKind::Switch,
            "functionNode" => NodeKind::Function,
            "outputNode" => NodeKind::Output,
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Input => "inputNode",
            NodeKind::Expression => "expressionNode",
            NodeKind::DecisionTable => "decisionTableNode",
            NodeKind::Switch => "switchNode",
            NodeKind::Function => "functionNode",
            NodeKind::Output => "outputNode",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Strongly-typed node payload, one variant per kind.
#[derive(Debug, Clone)]
pub enum NodeContent {
    Input,
    Output,
    Expression(ExpressionContent),
    DecisionTable(DecisionTableContent),
    Switch(SwitchContent),
    Function(FunctionContent),
}

impl NodeContent {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeContent::Input => NodeKind::Input,
            NodeContent::Output => NodeKind::Output,
            NodeContent::Expression(_) => NodeKind::Expression,
            NodeContent::DecisionTable(_) => NodeKind::DecisionTable,
            NodeContent::Switch(_) => NodeKind::Switch,
            NodeContent::Function(_) => NodeKind::Function,
        }
    }

    /// Interprets raw JSON content according to `kind`.
    pub fn parse(kind: NodeKind, content: Value) -> Result<Self, serde_json::Error> {
        let content = match kind {
            NodeKind::Input => NodeContent::Input,
            NodeKind::Output => NodeContent::Output,
            NodeKind::Expression => NodeContent::Expression(from_content(content)?),
            NodeKind::DecisionTable => NodeContent::DecisionTable(from_content(content)?),
            NodeKind::Switch => NodeContent::Switch(from_content(content)?),
            NodeKind::Function => NodeContent::Function(serde_json::from_value(content)?),
        };
        Ok(content)
    }
}

/// A missing or `null` content block is read as an empty object.
fn from_content<T: serde::de::DeserializeOwned>(content: Value) -> Result<T, serde_json::Error> {
    match content {
        Value::Null => serde_json::from_value(Value::Object(Map::new())),
        other => serde_json::from_value(other),
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionContent {
    #[serde(default)]
    pub expressions: Vec<ExpressionEntry>,
    #[serde(default)]
    pub pass_through: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpressionEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionTableContent {
    #[serde(default)]
    pub inputs: Vec<TableColumn>,
    #[serde(default)]
    pub outputs: Vec<TableColumn>,
    /// Each row maps a column id to its cell. Editor bookkeeping keys such as `_id`
    /// are carried along and ignored.
    #[serde(default)]
    pub rules: Vec<Map<String, Value>>,
    #[serde(default = "default_hit_policy")]
    pub hit_policy: String,
}

fn default_hit_policy() -> String {
    "first".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableColumn {
    pub id: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SwitchContent {
    #[serde(default)]
    pub statements: Vec<SwitchStatement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwitchStatement {
    pub id: String,
    #[serde(default)]
    pub condition: Option<String>,
}

impl SwitchStatement {
    pub fn is_default(&self) -> bool {
        self.condition
            .as_deref()
            .is_none_or(|condition| condition.trim().is_empty())
    }
}

/// Function source is stored either inline or wrapped as `{ "source": "..." }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FunctionContent {
    Inline(String),
    Wrapped { source: String },
}

impl FunctionContent {
    pub fn source(&self) -> &str {
        match self {
            FunctionContent::Inline(source) => source,
            FunctionContent::Wrapped { source } => source,
        }
    }
}
