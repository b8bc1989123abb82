use super::{Assignment, CompiledStep, DecisionTableStep, TableRule, compile_error};
use crate::compiler::cells::{compile_condition, compile_output};
use crate::error::{BuildError, CellLocation};
use crate::graph::DecisionTableContent;

pub(super) fn compile(
    node_id: &str,
    content: &DecisionTableContent,
) -> Result<CompiledStep, BuildError> {
    if content.hit_policy != "first" {
        return Err(BuildError::UnsupportedHitPolicy {
            node_id: node_id.to_string(),
            policy: content.hit_policy.clone(),
        });
    }

    let mut output_fields = Vec::with_capacity(content.outputs.len());
    for column in &content.outputs {
        let field = column
            .field
            .as_deref()
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .ok_or_else(|| BuildError::InvalidContent {
                node_id: node_id.to_string(),
                message: format!("output column '{}' has no field", column.id),
            })?;
        output_fields.push(field);
    }

    let mut rules = Vec::with_capacity(content.rules.len());
    for (row, cells) in content.rules.iter().enumerate() {
        let mut conditions = Vec::new();
        for column in &content.inputs {
            let Some(cell) = cells.get(&column.id) else {
                continue;
            };
            let location = CellLocation::Condition {
                row,
                column: column.id.clone(),
            };
            if let Some(condition) = compile_condition(cell, column.field.as_deref())
                .map_err(compile_error(node_id, location))?
            {
                conditions.push(condition);
            }
        }

        let mut outputs = Vec::new();
        for (column, field) in content.outputs.iter().zip(&output_fields) {
            let location = CellLocation::Output {
                row,
                column: column.id.clone(),
            };
            if let Some(expression) =
                compile_output(cells.get(&column.id)).map_err(compile_error(node_id, location))?
            {
                outputs.push(Assignment {
                    path: field.to_string(),
                    expression,
                });
            }
        }

        rules.push(TableRule {
            conditions,
            outputs,
        });
    }

    Ok(CompiledStep::DecisionTable(DecisionTableStep { rules }))
}
