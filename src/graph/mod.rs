//! The decision graph: wire format, typed node content and the validated graph model.
pub mod definition;
pub mod model;

pub use definition::*;
pub use model::*;
