//! Expression-tree surface consumed by the backend
//!
//! The tree-building API lives outside this crate; the backend only
//! sees the narrow shape below: a node's operation kind, its static
//! result type, an operand (absent only for rethrow), an optional
//! user-defined operator method, and the lifted flag.

use crate::compiler::ir::value::{ConstValue, VarId};
use crate::compiler::types::{MethodRef, SemType};

/// Unary operation kinds.
///
/// Closed enum: adding a kind without a lowering case fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Arithmetic negation
    Negate,
    /// Arithmetic negation with overflow detection
    NegateChecked,
    /// Logical not on bool, bitwise complement otherwise
    Not,
    /// Bitwise complement
    OnesComplement,
    /// Compare equal to false
    IsFalse,
    /// Compare equal to true
    IsTrue,
    /// Identity on numeric operands
    UnaryPlus,
    /// Add one
    Increment,
    /// Subtract one
    Decrement,
    /// Runtime type-test cast (`as`)
    TypeAs,
    /// Unbox a reference to a non-nullable value type
    Unbox,
    /// Array length
    ArrayLength,
    /// Type conversion
    Convert,
    /// Type conversion with overflow detection
    ConvertChecked,
    /// Capture the operand sub-tree as a runtime value
    Quote,
    /// Throw (operand present) or rethrow (operand absent)
    Throw,
}

/// A typed unary-operation node
#[derive(Debug, Clone)]
pub struct UnaryExpr {
    /// Operation kind
    pub op: UnaryOp,
    /// Operand; `None` only for rethrow
    pub operand: Option<Box<Expr>>,
    /// Static result type of the node
    pub ty: SemType,
    /// User-defined operator method, if any
    pub method: Option<MethodRef>,
    /// Declared over nullable operand/result while the method itself
    /// operates on non-nullable types
    pub lifted: bool,
}

impl UnaryExpr {
    /// Node without a user-defined method
    pub fn new(op: UnaryOp, operand: Expr, ty: SemType) -> Self {
        Self {
            op,
            operand: Some(Box::new(operand)),
            ty,
            method: None,
            lifted: false,
        }
    }

    /// Rethrow node (no operand)
    pub fn rethrow(ty: SemType) -> Self {
        Self {
            op: UnaryOp::Throw,
            operand: None,
            ty,
            method: None,
            lifted: false,
        }
    }

    /// Attach a user-defined operator method
    pub fn with_method(mut self, method: MethodRef, lifted: bool) -> Self {
        self.method = Some(method);
        self.lifted = lifted;
        self
    }
}

/// The expression nodes the backend drives itself: constants, variable
/// reads, and unary operations. Everything richer is lowered by
/// external collaborators before reaching this core.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A constant with its static type
    Constant(ConstValue, SemType),
    /// A variable read
    Local(VarId, SemType),
    /// A unary operation
    Unary(UnaryExpr),
}

impl Expr {
    /// Static type of the expression
    pub fn ty(&self) -> &SemType {
        match self {
            Expr::Constant(_, ty) => ty,
            Expr::Local(_, ty) => ty,
            Expr::Unary(u) => &u.ty,
        }
    }
}

/// How the surrounding context consumes an expression's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultUse {
    /// A value must be left on the stack
    Value,
    /// The result is discarded
    Void,
}
