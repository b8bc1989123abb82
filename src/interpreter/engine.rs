use crate::ast::{
    BinaryOp, Builtin, Expression, Handler, ObjectEntry, PathSegment, UnaryOp, compare_values,
    is_truthy, number, to_display_string, type_name, values_equal,
};
use crate::error::EvaluationError;
use serde_json::{Map, Value};
use std::cmp::Ordering;

// Generates the match arm body for a numeric binary operation.
macro_rules! arithmetic {
    ($self:ident, $l:ident, $r:ident, $op:expr, $f:expr) => {{
        let left = $self.evaluate($l)?;
        let right = $self.evaluate($r)?;
        let (a, b) = (
            $self.expect_number($op, &left)?,
            $self.expect_number($op, &right)?,
        );
        Ok(number($f(a, b)))
    }};
}

/// How free identifiers are resolved.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
    /// Expression nodes, table cells and switch conditions: context keys, then `input`.
    Expression,
    /// Function handlers: only declared parameters and local bindings are visible.
    Handler { params: &'a [String] },
}

/// Recursive evaluator for one expression tree against one record context.
pub(crate) struct AstEngine<'a> {
    context: &'a Value,
    scope: Scope<'a>,
    /// Lambda parameters and handler bindings, innermost last.
    locals: Vec<(&'a str, Value)>,
}

impl<'a> AstEngine<'a> {
    pub(crate) fn new(context: &'a Value) -> Self {
        Self {
            context,
            scope: Scope::Expression,
            locals: Vec::new(),
        }
    }

    /// Runs a function handler: evaluates its bindings in order, then its result.
    pub(crate) fn run_handler(
        handler: &'a Handler,
        context: &'a Value,
    ) -> Result<Value, EvaluationError> {
        let mut engine = Self {
            context,
            scope: Scope::Handler {
                params: &handler.params,
            },
            locals: Vec::with_capacity(handler.bindings.len()),
        };
        for (name, expression) in &handler.bindings {
            let value = engine.evaluate(expression)?;
            engine.locals.push((name.as_str(), value));
        }
        engine.evaluate(&handler.result)
    }

    pub(crate) fn evaluate(&mut self, expr: &'a Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(literal) => Ok(literal.to_value()),
            Expression::Identifier(name) => self.lookup(name),
            Expression::FieldPath { base, segments } => self.eval_path(base, segments),

            Expression::Unary { op, operand } => {
                let value = self.evaluate(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!is_truthy(&value))),
                    UnaryOp::Negate => Ok(number(-self.expect_number("-", &value)?)),
                }
            }

            // --- Arithmetic ---
            Expression::Binary {
                op: BinaryOp::Add,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                if left.is_string() || right.is_string() {
                    let mut text = to_display_string(&left);
                    text.push_str(&to_display_string(&right));
                    return Ok(Value::String(text));
                }
                let a = self.expect_number("+", &left)?;
                let b = self.expect_number("+", &right)?;
                Ok(number(a + b))
            }
            Expression::Binary {
                op: BinaryOp::Subtract,
                left,
                right,
            } => arithmetic!(self, left, right, "-", |a: f64, b: f64| a - b),
            Expression::Binary {
                op: BinaryOp::Multiply,
                left,
                right,
            } => arithmetic!(self, left, right, "*", |a: f64, b: f64| a * b),
            Expression::Binary {
                op: BinaryOp::Divide,
                left,
                right,
            } => arithmetic!(self, left, right, "/", |a: f64, b: f64| a / b),
            Expression::Binary {
                op: BinaryOp::Modulo,
                left,
                right,
            } => arithmetic!(self, left, right, "%", |a: f64, b: f64| a % b),

            // --- Logical (operand-returning, short-circuit) ---
            Expression::Binary {
                op: BinaryOp::And,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                if !is_truthy(&left) {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expression::Binary {
                op: BinaryOp::Or,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                if is_truthy(&left) {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expression::Binary {
                op: BinaryOp::Coalesce,
                left,
                right,
            } => {
                let left = self.evaluate(left)?;
                if !left.is_null() {
                    return Ok(left);
                }
                self.evaluate(right)
            }

            // --- Comparison ---
            Expression::Binary { op, left, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                let outcome = match op {
                    BinaryOp::Equal => values_equal(&left, &right),
                    BinaryOp::NotEqual => !values_equal(&left, &right),
                    BinaryOp::GreaterThan => compare_values(&left, &right) == Some(Ordering::Greater),
                    BinaryOp::SmallerThan => compare_values(&left, &right) == Some(Ordering::Less),
                    BinaryOp::GreaterThanOrEqual => matches!(
                        compare_values(&left, &right),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    BinaryOp::SmallerThanOrEqual => matches!(
                        compare_values(&left, &right),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    BinaryOp::In => self.membership(&left, &right)?,
                    BinaryOp::NotIn => !self.membership(&left, &right)?,
                    // Arithmetic and logical operators are matched above.
                    _ => unreachable!("operator {} handled earlier", op.symbol()),
                };
                Ok(Value::Bool(outcome))
            }

            Expression::Conditional {
                condition,
                then,
                otherwise,
            } => {
                if is_truthy(&self.evaluate(condition)?) {
                    self.evaluate(then)
                } else {
                    self.evaluate(otherwise)
                }
            }

            Expression::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expression::Object(entries) => {
                let mut object = Map::new();
                for entry in entries {
                    match entry {
                        ObjectEntry::Property { key, value } => {
                            object.insert(key.clone(), self.evaluate(value)?);
                        }
                        ObjectEntry::Spread(source) => match self.evaluate(source)? {
                            Value::Object(fields) => object.extend(fields),
                            Value::Null => {}
                            other => return Err(self.type_mismatch("...", "object", &other)),
                        },
                    }
                }
                Ok(Value::Object(object))
            }

            Expression::Lambda { .. } => Err(EvaluationError::NotCallable(expr.to_string())),
            Expression::Call { function, args } => self.eval_call(*function, args),
        }
    }

    // --- Identifiers and member access ---

    fn lookup_ref(&self, name: &str) -> Result<Option<&Value>, EvaluationError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| *local == name) {
            return Ok(Some(value));
        }
        match self.scope {
            Scope::Expression => Ok(match self.context.get(name) {
                Some(value) => Some(value),
                None if name == "input" => Some(self.context),
                None => None,
            }),
            Scope::Handler { params } => match params.iter().position(|p| p == name) {
                Some(0) => Ok(Some(self.context)),
                Some(_) => Ok(None),
                None => Err(EvaluationError::UnknownIdentifier(name.to_string())),
            },
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        Ok(self.lookup_ref(name)?.cloned().unwrap_or(Value::Null))
    }

    fn eval_path(
        &mut self,
        base: &'a Expression,
        segments: &'a [PathSegment],
    ) -> Result<Value, EvaluationError> {
        // Index expressions are evaluated up front so the walk itself can borrow.
        let mut keys = Vec::with_capacity(segments.len());
        for segment in segments {
            keys.push(match segment {
                PathSegment::Field(name) => PathKey::Field(name),
                PathSegment::Index(index) => PathKey::Index(self.evaluate(index)?),
            });
        }

        let owned;
        let root = match base {
            Expression::Identifier(name) => match self.lookup_ref(name)? {
                Some(value) => value,
                None => return Ok(Value::Null),
            },
            other => {
                owned = self.evaluate(other)?;
                &owned
            }
        };

        let mut current = root;
        for (position, key) in keys.iter().enumerate() {
            let last = position + 1 == keys.len();
            current = match (current, key) {
                (Value::Object(map), PathKey::Field(name)) => match map.get(*name) {
                    Some(value) => value,
                    None => return Ok(Value::Null),
                },
                (Value::Array(items), PathKey::Field("length")) if last => {
                    return Ok(number(items.len() as f64));
                }
                (Value::String(text), PathKey::Field("length")) if last => {
                    return Ok(number(text.chars().count() as f64));
                }
                (Value::Array(items), PathKey::Index(Value::Number(n))) => {
                    match n.as_f64().filter(|i| *i >= 0.0 && i.fract() == 0.0) {
                        Some(i) => match items.get(i as usize) {
                            Some(value) => value,
                            None => return Ok(Value::Null),
                        },
                        None => return Ok(Value::Null),
                    }
                }
                (Value::Object(map), PathKey::Index(index)) => {
                    match map.get(&to_display_string(index)) {
                        Some(value) => value,
                        None => return Ok(Value::Null),
                    }
                }
                (Value::String(text), PathKey::Index(Value::Number(n))) if last => {
                    let found = n
                        .as_f64()
                        .filter(|i| *i >= 0.0 && i.fract() == 0.0)
                        .and_then(|i| text.chars().nth(i as usize));
                    return Ok(found.map_or(Value::Null, |c| Value::String(c.to_string())));
                }
                _ => return Ok(Value::Null),
            };
        }
        Ok(current.clone())
    }

    fn membership(&self, needle: &Value, haystack: &Value) -> Result<bool, EvaluationError> {
        match haystack {
            Value::Array(items) => Ok(items.iter().any(|item| values_equal(item, needle))),
            Value::Object(map) => Ok(map.contains_key(&to_display_string(needle))),
            Value::String(text) => Ok(text.contains(&to_display_string(needle))),
            Value::Null => Ok(false),
            other => Err(self.type_mismatch("in", "array, object or string", other)),
        }
    }

    // --- Helper library ---

    fn eval_call(
        &mut self,
        function: Builtin,
        args: &'a [Expression],
    ) -> Result<Value, EvaluationError> {
        let name = function.name();
        match function {
            Builtin::Filter | Builtin::Map | Builtin::Count | Builtin::Any | Builtin::All => {
                let items = self.evaluate(&args[0])?;
                let items = self.expect_array(name, items)?;
                let mut kept = Vec::new();
                let mut matched = 0usize;
                for (index, item) in items.into_iter().enumerate() {
                    let index = number(index as f64);
                    let result = self.call(name, &args[1], vec![item.clone(), index])?;
                    match function {
                        Builtin::Map => kept.push(result),
                        Builtin::Filter if is_truthy(&result) => kept.push(item),
                        Builtin::Any if is_truthy(&result) => return Ok(Value::Bool(true)),
                        Builtin::All if !is_truthy(&result) => return Ok(Value::Bool(false)),
                        Builtin::Count if is_truthy(&result) => matched += 1,
                        _ => {}
                    }
                }
                Ok(match function {
                    Builtin::Any => Value::Bool(false),
                    Builtin::All => Value::Bool(true),
                    Builtin::Count => number(matched as f64),
                    _ => Value::Array(kept),
                })
            }
            Builtin::Reduce => {
                let items = self.evaluate(&args[0])?;
                let items = self.expect_array(name, items)?;
                let mut accumulator = self.evaluate(&args[2])?;
                for (index, item) in items.into_iter().enumerate() {
                    let index = number(index as f64);
                    accumulator = self.call(name, &args[1], vec![accumulator, item, index])?;
                }
                Ok(accumulator)
            }

            Builtin::Sum | Builtin::Min | Builtin::Max | Builtin::Avg => {
                let items = self.evaluate(&args[0])?;
                let items = self.expect_array(name, items)?;
                let numbers = items
                    .iter()
                    .map(|item| self.expect_number(name, item))
                    .collect::<Result<Vec<_>, _>>()?;
                let result = match function {
                    Builtin::Sum => Some(numbers.iter().sum()),
                    Builtin::Min => numbers.iter().copied().reduce(f64::min),
                    Builtin::Max => numbers.iter().copied().reduce(f64::max),
                    _ => (!numbers.is_empty())
                        .then(|| numbers.iter().sum::<f64>() / numbers.len() as f64),
                };
                Ok(result.map_or(Value::Null, number))
            }

            Builtin::Len => match self.evaluate(&args[0])? {
                Value::Array(items) => Ok(number(items.len() as f64)),
                Value::String(text) => Ok(number(text.chars().count() as f64)),
                Value::Object(map) => Ok(number(map.len() as f64)),
                other => Err(self.type_mismatch(name, "array, string or object", &other)),
            },
            Builtin::Keys | Builtin::Values => match self.evaluate(&args[0])? {
                Value::Object(map) if function == Builtin::Keys => {
                    Ok(Value::Array(map.into_iter().map(|(k, _)| Value::String(k)).collect()))
                }
                Value::Object(map) => Ok(Value::Array(map.into_iter().map(|(_, v)| v).collect())),
                other => Err(self.type_mismatch(name, "object", &other)),
            },

            Builtin::Abs | Builtin::Round | Builtin::Floor | Builtin::Ceil => {
                let value = self.evaluate(&args[0])?;
                let n = self.expect_number(name, &value)?;
                Ok(number(match function {
                    Builtin::Abs => n.abs(),
                    Builtin::Round => {
                        // `f64::round` takes halves away from zero; negative halves go up.
                        let rounded = n.round();
                        if n - rounded == 0.5 { rounded + 1.0 } else { rounded }
                    }
                    Builtin::Floor => n.floor(),
                    _ => n.ceil(),
                }))
            }
            Builtin::Upper | Builtin::Lower => match self.evaluate(&args[0])? {
                Value::String(text) if function == Builtin::Upper => {
                    Ok(Value::String(text.to_uppercase()))
                }
                Value::String(text) => Ok(Value::String(text.to_lowercase())),
                other => Err(self.type_mismatch(name, "string", &other)),
            },

            Builtin::Contains => {
                let haystack = self.evaluate(&args[0])?;
                let needle = self.evaluate(&args[1])?;
                match haystack {
                    Value::Array(items) => Ok(Value::Bool(
                        items.iter().any(|item| values_equal(item, &needle)),
                    )),
                    Value::String(text) => {
                        Ok(Value::Bool(text.contains(&to_display_string(&needle))))
                    }
                    Value::Null => Ok(Value::Bool(false)),
                    other => Err(self.type_mismatch(name, "array or string", &other)),
                }
            }
            Builtin::StartsWith | Builtin::EndsWith => {
                let subject = self.evaluate(&args[0])?;
                let affix = self.evaluate(&args[1])?;
                // A missing or non-string subject never matches.
                let Value::String(subject) = subject else {
                    return Ok(Value::Bool(false));
                };
                let affix = to_display_string(&affix);
                Ok(Value::Bool(if function == Builtin::StartsWith {
                    subject.starts_with(&affix)
                } else {
                    subject.ends_with(&affix)
                }))
            }
        }
    }

    /// Invokes a callback argument. Parameters the caller does not supply are an error;
    /// supplied arguments without a parameter are dropped.
    fn call(
        &mut self,
        function: &str,
        callback: &'a Expression,
        args: Vec<Value>,
    ) -> Result<Value, EvaluationError> {
        let Expression::Lambda { params, body } = callback else {
            return Err(EvaluationError::NotCallable(callback.to_string()));
        };
        if params.len() > args.len() {
            return Err(EvaluationError::ArityMismatch {
                function: function.to_string(),
                expected: params.len(),
                found: args.len(),
            });
        }
        let depth = self.locals.len();
        self.locals
            .extend(params.iter().map(String::as_str).zip(args));
        let result = self.evaluate(body);
        self.locals.truncate(depth);
        result
    }

    // --- Type helpers ---

    fn expect_number(&self, operation: &str, value: &Value) -> Result<f64, EvaluationError> {
        value
            .as_f64()
            .ok_or_else(|| self.type_mismatch(operation, "number", value))
    }

    fn expect_array(&self, operation: &str, value: Value) -> Result<Vec<Value>, EvaluationError> {
        match value {
            Value::Array(items) => Ok(items),
            other => Err(self.type_mismatch(operation, "array", &other)),
        }
    }

    fn type_mismatch(&self, operation: &str, expected: &str, found: &Value) -> EvaluationError {
        EvaluationError::TypeMismatch {
            operation: operation.to_string(),
            expected: expected.to_string(),
            found: format!("{} ({})", found, type_name(found)),
        }
    }
}

enum PathKey<'a> {
    Field(&'a str),
    Index(Value),
}
