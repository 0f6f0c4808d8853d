//! Backend of the compiler: register allocation, stack frame layout, and
//! single-pass code generation from the HIR into AT&T x86-64 assembly text.

pub mod codegen;
pub mod emit;
pub mod error;
pub mod frame;
pub mod regs;

pub use codegen::{generate, GenOutput};
pub use error::CodegenError;
