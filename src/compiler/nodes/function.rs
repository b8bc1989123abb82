use super::{CompiledStep, FunctionStep, compile_error};
use crate::ast::parse_handler;
use crate::error::{BuildError, CellLocation};
use crate::graph::FunctionContent;

pub(super) fn compile(node_id: &str, content: &FunctionContent) -> Result<CompiledStep, BuildError> {
    let handler =
        parse_handler(content.source()).map_err(compile_error(node_id, CellLocation::Handler))?;
    Ok(CompiledStep::Function(FunctionStep { handler }))
}
