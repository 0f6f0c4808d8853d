//! Backend failure values.
//!
//! The first group is fatal: generation stops and the error is returned.
//! The rest record constructs the generator skips best-effort; they are
//! collected as diagnostics while emission continues, so a unit containing
//! them comes out partially compiled rather than not at all.

use frontend::hir::Type;
use snafu::Snafu;

#[derive(Debug, Clone, PartialEq, Snafu)]
pub enum CodegenError {
  #[snafu(display("scratch register pool exhausted"))]
  RegisterPoolExhausted,

  #[snafu(display("unresolved {what} reference reached code generation"))]
  UnresolvedReference { what: &'static str },

  #[snafu(display("no storage size for type {ty:?}"))]
  UnsizedType { ty: Type },

  #[snafu(display("variable '{name}' has no frame slot"))]
  MissingFrameSlot { name: String },

  #[snafu(display("floating-point literal '{text}' is not supported yet"))]
  FloatLiteral { text: String },

  #[snafu(display("call to '{name}' passes {count} arguments but only {slots} argument registers exist"))]
  ArgumentOverflow { name: String, count: usize, slots: usize },

  #[snafu(display("function '{name}' declares {count} parameters but only {slots} argument registers exist"))]
  ParameterOverflow { name: String, count: usize, slots: usize },

  #[snafu(display("element size {size} is not a hardware addressing scale"))]
  BadScale { size: usize },

  #[snafu(display("cannot store a {size}-byte value in a single move"))]
  BadStoreWidth { size: usize },

  #[snafu(display("a void value cannot be used here"))]
  VoidValue,
}
