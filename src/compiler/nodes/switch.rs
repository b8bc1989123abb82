use super::{CompiledStep, SwitchBranch, SwitchStep, compile_error};
use crate::ast::parse_expression;
use crate::error::{BuildError, CellLocation};
use crate::graph::{Graph, NodeIndex, SwitchContent};

pub(super) fn compile(
    graph: &Graph,
    index: NodeIndex,
    content: &SwitchContent,
) -> Result<CompiledStep, BuildError> {
    let node_id = &graph.node(index).id;
    let branches = content
        .statements
        .iter()
        .map(|statement| {
            let condition = match statement.condition.as_deref() {
                Some(source) if !statement.is_default() => {
                    let location = CellLocation::Statement {
                        id: statement.id.clone(),
                    };
                    Some(parse_expression(source).map_err(compile_error(node_id, location))?)
                }
                _ => None,
            };
            Ok(SwitchBranch {
                id: statement.id.clone(),
                condition,
                feeds_output: graph.handle_feeds_output(index, &statement.id),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    Ok(CompiledStep::Switch(SwitchStep { branches }))
}
