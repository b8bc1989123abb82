//! The decision-table cell grammar.
//!
//! A condition cell is shorthand for a predicate over its column's field. The forms are
//! tried in this order against the trimmed cell text:
//!
//! 1. `[a..b]`: inclusive range, `field >= a && field <= b`
//! 2. a comma-separated list of scalar literals: `field in [..]`
//! 3. `startsWith($, "x")` / `endsWith($, "x")`
//! 4. a lone quoted literal: `field == literal`
//! 5. any text containing `$`: a free expression with `$` bound to the field
//! 6. anything else is an operator suffix: `field <cell>`, e.g. `< 5`
//!
//! Empty cells carry no condition.
use crate::ast::{
    BinaryOp, Builtin, Expression, Literal, parse_cell_expression, parse_expression,
};
use crate::error::ParseError;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[(.+)\.\.(.+)\]$").expect("range pattern is valid"));
static STARTS_WITH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^startsWith\(\$,\s*(.+)\)$").expect("startsWith pattern is valid")
});
static ENDS_WITH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^endsWith\(\$,\s*(.+)\)$").expect("endsWith pattern is valid"));
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^['"].*['"]$"#).expect("quoted pattern is valid"));
static NUMERIC_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9_.,\s+-]+$").expect("numeric list pattern is valid"));

/// Renders a raw cell as text. Non-string scalars use their JSON form; `null` is empty.
pub fn cell_text(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Compiles a condition cell for a column whose field is `field`.
///
/// Returns `Ok(None)` for an empty cell. Without a field the cell is read as a standalone
/// expression and its truthiness decides the match.
pub fn compile_condition(
    cell: &Value,
    field: Option<&str>,
) -> Result<Option<Expression>, ParseError> {
    let text = cell_text(cell);
    if text.is_empty() {
        return Ok(None);
    }
    let Some(field) = field.map(str::trim).filter(|f| !f.is_empty()) else {
        return parse_expression(&text).map(Some);
    };
    let field = parse_expression(field)?;
    condition_for(&text, &field).map(Some)
}

fn condition_for(text: &str, field: &Expression) -> Result<Expression, ParseError> {
    if let Some(range) = RANGE.captures(text) {
        let low = parse_expression(range[1].trim())?;
        let high = parse_expression(range[2].trim())?;
        return Ok(Expression::binary(
            BinaryOp::And,
            Expression::binary(BinaryOp::GreaterThanOrEqual, field.clone(), low),
            Expression::binary(BinaryOp::SmallerThanOrEqual, field.clone(), high),
        ));
    }

    if let Some(items) = scalar_list(text) {
        let items = items
            .into_iter()
            .map(Expression::Literal)
            .collect::<Vec<_>>();
        return Ok(Expression::binary(
            BinaryOp::In,
            field.clone(),
            Expression::Array(items),
        ));
    }

    for (pattern, function) in [
        (&*STARTS_WITH, Builtin::StartsWith),
        (&*ENDS_WITH, Builtin::EndsWith),
    ] {
        if let Some(found) = pattern.captures(text) {
            let argument = parse_expression(found[1].trim())?;
            return Ok(Expression::Call {
                function,
                args: vec![field.clone(), argument],
            });
        }
    }

    if QUOTED.is_match(text) {
        let literal = parse_expression(text)?;
        return Ok(Expression::binary(BinaryOp::Equal, field.clone(), literal));
    }

    if text.contains('$') {
        return parse_cell_expression(text, field);
    }

    parse_cell_expression(&format!("$ {}", text), field)
}

/// Reads the cell as the body of a JSON array: `"a", "b"`, `1, 2`, `'x'` and `true` all
/// qualify, as long as every item is a string, number or boolean.
fn scalar_list(text: &str) -> Option<Vec<Literal>> {
    let normalized = text.replace('\'', "\"");
    let parsed = serde_json::from_str::<Vec<Value>>(&format!("[{}]", normalized))
        .ok()
        .or_else(|| {
            // `1_000, 2_000`: digit separators are not JSON.
            NUMERIC_LIST.is_match(&normalized).then(|| {
                serde_json::from_str::<Vec<Value>>(&format!("[{}]", normalized.replace('_', "")))
                    .ok()
            })?
        })?;
    if parsed.is_empty() {
        return None;
    }
    parsed
        .iter()
        .map(|item| match item {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Literal::from_scalar(item),
            _ => None,
        })
        .collect()
}

/// Compiles an output cell. Missing and empty cells produce no assignment.
pub fn compile_output(cell: Option<&Value>) -> Result<Option<Expression>, ParseError> {
    let Some(cell) = cell else {
        return Ok(None);
    };
    if let Some(literal) = match cell {
        Value::Number(_) | Value::Bool(_) => Literal::from_scalar(cell),
        _ => None,
    } {
        return Ok(Some(Expression::Literal(literal)));
    }
    let text = cell_text(cell);
    if text.is_empty() {
        return Ok(None);
    }
    parse_expression(&text).map(Some)
}
