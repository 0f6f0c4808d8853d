//! Front end of the compiler.
//!
//! Parsing is delegated to the bundled tree-sitter C grammar; this crate's
//! own work starts at the syntax tree. `hir` holds the resolved program
//! representation and the lowering pass that builds it, `error` the
//! diagnostics lowering can report.

pub mod error;
pub mod hir;

pub use error::{LowerError, ParseError};
pub use hir::lower::{lower, LowerOutput};

use snafu::ResultExt;
use tree_sitter::{Parser, Tree};

/// Parse C source text into a tree-sitter syntax tree.
pub fn parse(source: &str) -> Result<Tree, ParseError> {
  let mut parser = Parser::new();
  parser
    .set_language(&tree_sitter_c::LANGUAGE.into())
    .context(error::LanguageSnafu)?;
  parser.parse(source, None).ok_or(ParseError::NoTree)
}

/// Run the whole front end: parse, then lower the tree into a `Unit`.
pub fn front_end(source: &str) -> Result<LowerOutput, ParseError> {
  let tree = parse(source)?;
  Ok(lower(tree.root_node(), source))
}
