//! Arbor Expression Engine
//!
//! This crate lowers typed expression trees to bytecode for a simple
//! stack machine:
//! - **Compiler**: emitters, conversions, unary lowering, variable
//!   allocation (`compiler` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use arbor_engine::compiler::{CodeGen, ir::node::{Expr, ResultUse}};
//! use arbor_engine::compiler::ir::value::ConstValue;
//! use arbor_engine::compiler::types::{SemType, TypeTable};
//!
//! let types = TypeTable::new();
//! let mut gen = CodeGen::new(&types);
//! let expr = Expr::Constant(ConstValue::I32(42), SemType::I32);
//! gen.emit_expr(&expr, ResultUse::Value).unwrap();
//! let unit = gen.finish();
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![cfg_attr(test, allow(clippy::approx_constant))]
#![cfg_attr(test, allow(clippy::identity_op))]

/// Compiler module: tree surface, type model, emitters, bytecode
pub mod compiler;

pub use compiler::{CodeGen, CompileError, CompileResult, CompiledUnit, HoistedLocals};
