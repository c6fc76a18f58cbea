//! Typed expression-tree IR consumed by the backend
//!
//! - `node` - expression nodes (constants, variable reads, unary ops)
//! - `value` - constant values, the decimal layout, variable identity

pub mod node;
pub mod value;

pub use node::{Expr, ResultUse, UnaryExpr, UnaryOp};
pub use value::{ConstValue, Dec, VarId};
