use super::{Assignment, CompiledStep, ExpressionStep, compile_error};
use crate::ast::parse_expression;
use crate::error::{BuildError, CellLocation};
use crate::graph::ExpressionContent;

pub(super) fn compile(node_id: &str, content: &ExpressionContent) -> Result<CompiledStep, BuildError> {
    let assignments = content
        .expressions
        .iter()
        .map(|entry| {
            let location = CellLocation::Expression {
                key: entry.key.clone(),
            };
            parse_expression(&entry.value)
                .map(|expression| Assignment {
                    path: entry.key.clone(),
                    expression,
                })
                .map_err(compile_error(node_id, location))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledStep::Expression(ExpressionStep {
        assignments,
        pass_through: content.pass_through,
    }))
}
