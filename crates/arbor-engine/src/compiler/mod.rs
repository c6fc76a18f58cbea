//! Expression-tree compiler
//!
//! Lowers typed expression trees to stack-machine bytecode:
//! - **ir**: the tree surface the backend consumes
//! - **types**: the semantic type model and type table
//! - **bytecode**: instruction records, label table, constant pool
//! - **codegen**: emitters, variable allocator, unary lowering
//! - **runtime**: registry of well-known runtime helpers

pub mod bytecode;
pub mod codegen;
pub mod error;
pub mod ir;
pub mod runtime;
pub mod types;

pub use codegen::{CodeGen, CompiledUnit, HoistedLocals};
pub use error::{CompileError, CompileResult};
