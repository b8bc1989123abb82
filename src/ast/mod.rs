pub mod expression;
pub(crate) mod lexer;
pub mod parser;
pub mod value;

pub use expression::*;
pub use parser::{Handler, parse_cell_expression, parse_expression, parse_handler};
pub use value::*;
