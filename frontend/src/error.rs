//! Diagnostics reported while lowering a source tree.
//!
//! Lowering never aborts on these: each one is pushed onto the output's
//! diagnostics list and the walk continues, so a single bad identifier does
//! not hide the rest of the program's problems.

use snafu::Snafu;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum LowerError {
  #[snafu(display("unresolved identifier '{name}'"))]
  UnresolvedIdentifier { name: String },

  #[snafu(display("call to undeclared function '{name}'"))]
  UnresolvedCall { name: String },

  #[snafu(display("'{name}' is already declared in this scope"))]
  DuplicateDeclaration { name: String },

  #[snafu(display("unsupported construct '{kind}'"))]
  UnsupportedConstruct { kind: String },

  #[snafu(display("array '{name}' needs a literal, non-zero integer length"))]
  BadArrayLength { name: String },

  #[snafu(display("variable '{name}' cannot have type void"))]
  VoidVariable { name: String },

  #[snafu(display("unknown operator '{op}'"))]
  UnknownOperator { op: String },
}

/// Failures of the external parser itself, before lowering starts.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseError {
  #[snafu(display("tree-sitter rejected the C grammar: {source}"))]
  Language { source: tree_sitter::LanguageError },

  #[snafu(display("parser produced no syntax tree"))]
  NoTree,
}
