use super::Literal;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The Abstract Syntax Tree of a compiled expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    // Leaf nodes
    Literal(Literal),
    Identifier(String),

    /// Member access chain, e.g. `order.items[0].price`.
    FieldPath {
        base: Box<Expression>,
        segments: Vec<PathSegment>,
    },

    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then: Box<Expression>,
        otherwise: Box<Expression>,
    },

    /// A call into the fixed helper library. Arity is checked at parse time.
    Call {
        function: Builtin,
        args: Vec<Expression>,
    },

    // Constructors
    Array(Vec<Expression>),
    Object(Vec<ObjectEntry>),

    /// An explicit closure. Implicit-item shorthand (`#`) is expanded into one of these.
    Lambda {
        params: Vec<String>,
        body: Box<Expression>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectEntry {
    Property { key: String, value: Expression },
    /// `...expr`: copies the keys of an object value.
    Spread(Expression),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathSegment {
    Field(String),
    Index(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,

    // Comparison
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    SmallerThan,
    SmallerThanOrEqual,
    In,
    NotIn,

    // Logical
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::SmallerThan => "<",
            BinaryOp::SmallerThanOrEqual => "<=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// Helper functions available to every expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Builtin {
    Sum,
    Filter,
    Map,
    Reduce,
    Count,
    Any,
    All,
    Len,
    Keys,
    Values,
    Min,
    Max,
    Avg,
    Abs,
    Round,
    Floor,
    Ceil,
    Upper,
    Lower,
    Contains,
    StartsWith,
    EndsWith,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name {
            "sum" => Builtin::Sum,
            "filter" => Builtin::Filter,
            "map" => Builtin::Map,
            "reduce" => Builtin::Reduce,
            "count" => Builtin::Count,
            "some" => Builtin::Any,
            "all" => Builtin::All,
            "len" => Builtin::Len,
            "keys" => Builtin::Keys,
            "values" => Builtin::Values,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "avg" => Builtin::Avg,
            "abs" => Builtin::Abs,
            "round" => Builtin::Round,
            "floor" => Builtin::Floor,
            "ceil" => Builtin::Ceil,
            "upper" => Builtin::Upper,
            "lower" => Builtin::Lower,
            "contains" => Builtin::Contains,
            "startsWith" => Builtin::StartsWith,
            "endsWith" => Builtin::EndsWith,
            _ => return None,
        };
        Some(builtin)
    }

    /// Maps a JavaScript-style method name onto the helper it is sugar for.
    /// The receiver becomes the helper's first argument.
    pub fn from_method(name: &str) -> Option<Self> {
        let builtin = match name {
            "filter" => Builtin::Filter,
            "map" => Builtin::Map,
            "reduce" => Builtin::Reduce,
            "some" => Builtin::Any,
            "every" => Builtin::All,
            "includes" => Builtin::Contains,
            "startsWith" => Builtin::StartsWith,
            "endsWith" => Builtin::EndsWith,
            "toUpperCase" => Builtin::Upper,
            "toLowerCase" => Builtin::Lower,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Sum => "sum",
            Builtin::Filter => "filter",
            Builtin::Map => "map",
            Builtin::Reduce => "reduce",
            Builtin::Count => "count",
            Builtin::Any => "some",
            Builtin::All => "all",
            Builtin::Len => "len",
            Builtin::Keys => "keys",
            Builtin::Values => "values",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Avg => "avg",
            Builtin::Abs => "abs",
            Builtin::Round => "round",
            Builtin::Floor => "floor",
            Builtin::Ceil => "ceil",
            Builtin::Upper => "upper",
            Builtin::Lower => "lower",
            Builtin::Contains => "contains",
            Builtin::StartsWith => "startsWith",
            Builtin::EndsWith => "endsWith",
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Builtin::Reduce => 3,
            Builtin::Filter
            | Builtin::Map
            | Builtin::Count
            | Builtin::Any
            | Builtin::All
            | Builtin::Contains
            | Builtin::StartsWith
            | Builtin::EndsWith => 2,
            _ => 1,
        }
    }

    /// Parameters of the implicit closure for helpers whose second argument is a callback.
    pub fn callback_params(&self) -> Option<&'static [&'static str]> {
        match self {
            Builtin::Filter | Builtin::Map | Builtin::Count | Builtin::Any | Builtin::All => {
                Some(&["#"])
            }
            Builtin::Reduce => Some(&["acc", "#"]),
            _ => None,
        }
    }
}

impl Expression {
    /// Builds the expression for a dotted field reference such as `customer.address.city`.
    pub fn field_path(path: &str) -> Expression {
        let mut parts = path.split('.').map(str::trim);
        let base = Expression::Identifier(parts.next().unwrap_or_default().to_string());
        let segments: Vec<PathSegment> = parts
            .map(|p| PathSegment::Field(p.to_string()))
            .collect();
        if segments.is_empty() {
            base
        } else {
            Expression::FieldPath {
                base: Box::new(base),
                segments,
            }
        }
    }

    pub fn binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Replaces every free occurrence of identifier `from` with identifier `to`.
    /// Lambdas that rebind `from` are left untouched.
    pub fn rename_identifier(&mut self, from: &str, to: &str) {
        match self {
            Expression::Identifier(name) if name == from => *name = to.to_string(),
            Expression::Literal(_) | Expression::Identifier(_) => {}
            Expression::FieldPath { base, segments } => {
                base.rename_identifier(from, to);
                for segment in segments {
                    if let PathSegment::Index(index) = segment {
                        index.rename_identifier(from, to);
                    }
                }
            }
            Expression::Unary { operand, .. } => operand.rename_identifier(from, to),
            Expression::Binary { left, right, .. } => {
                left.rename_identifier(from, to);
                right.rename_identifier(from, to);
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.rename_identifier(from, to);
                then.rename_identifier(from, to);
                otherwise.rename_identifier(from, to);
            }
            Expression::Call { args, .. } | Expression::Array(args) => {
                for arg in args {
                    arg.rename_identifier(from, to);
                }
            }
            Expression::Object(entries) => {
                for entry in entries {
                    match entry {
                        ObjectEntry::Property { value, .. } | ObjectEntry::Spread(value) => {
                            value.rename_identifier(from, to)
                        }
                    }
                }
            }
            Expression::Lambda { params, body } => {
                if !params.iter().any(|p| p == from) {
                    body.rename_identifier(from, to);
                }
            }
        }
    }
}

/// Renders an expression back into source form. Used by plan dumps and traces.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(lit) => write!(f, "{}", lit),
            Expression::Identifier(name) => write!(f, "{}", name),
            Expression::FieldPath { base, segments } => {
                write!(f, "{}", base)?;
                for segment in segments {
                    match segment {
                        PathSegment::Field(name) => write!(f, ".{}", name)?,
                        PathSegment::Index(index) => write!(f, "[{}]", index)?,
                    }
                }
                Ok(())
            }
            Expression::Unary { op, operand } => match op {
                UnaryOp::Negate => write!(f, "-{}", operand),
                UnaryOp::Not => write!(f, "!{}", operand),
            },
            Expression::Binary { op, left, right } => {
                write!(f, "({} {} {})", left, op.symbol(), right)
            }
            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => write!(f, "({} ? {} : {})", condition, then, otherwise),
            Expression::Call { function, args } => {
                write!(f, "{}({})", function.name(), args.iter().join(", "))
            }
            Expression::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
            Expression::Object(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|entry| match entry {
                        ObjectEntry::Property { key, value } => format!("{:?}: {}", key, value),
                        ObjectEntry::Spread(value) => format!("...{}", value),
                    })
                    .join(", ")
            ),
            Expression::Lambda { params, body } => {
                write!(f, "({}) => {}", params.join(", "), body)
            }
        }
    }
}
