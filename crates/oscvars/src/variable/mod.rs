mod directory;
mod kind;
mod value;

pub use directory::{Variable, VariableDirectory, VariableError, VariableSpec};
pub use kind::{KindSpec, UnknownKind, VariableKind};
pub use value::{Bounds, Value};
