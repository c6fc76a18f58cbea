//! Error types for bytecode emission
//!
//! Every failure here is fatal for the current compilation unit: the
//! transform is pure and deterministic, so there is no retry or partial
//! result. Authoring bugs in the tree producer (stale local handles,
//! lookups of undefined variables) panic instead of returning an error.

use thiserror::Error;

/// Errors that can occur while lowering an expression tree to bytecode
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// No conversion rule matches the (from, to) pair
    #[error("no conversion from '{from}' to '{to}'")]
    UnsupportedConversion {
        /// Rendered source type
        from: String,
        /// Rendered destination type
        to: String,
    },

    /// The numeric conversion switch has no case for the destination
    #[error("unhandled convert to '{ty}'")]
    UnhandledConvert {
        /// Rendered destination type
        ty: String,
    },

    /// A cast between two value types that are not identical
    #[error("invalid cast from '{from}' to '{to}'")]
    InvalidCast {
        /// Rendered source type
        from: String,
        /// Rendered destination type
        to: String,
    },

    /// The unary operator has no lowering for the operand type
    #[error("unhandled unary operator '{op}'")]
    UnhandledUnary {
        /// Operator name
        op: String,
    },

    /// `emit_array` was asked for a negative element count
    #[error("array element count cannot be negative (got {count})")]
    NegativeArrayCount {
        /// The offending count
        count: i32,
    },

    /// An array-typed operand was required (e.g. for ArrayLength)
    #[error("expected an array type, got '{ty}'")]
    ArrayTypeRequired {
        /// Rendered operand type
        ty: String,
    },

    /// A generic type with unbound parameters used as a `new` target
    #[error("cannot instantiate open generic type '{ty}'")]
    IllegalNewGenericParams {
        /// Rendered target type
        ty: String,
    },

    /// A rethrow expression outside of any exception handler
    #[error("rethrow is only valid inside an exception handler")]
    RethrowOutsideHandler,
}

/// Result type for compilation operations
pub type CompileResult<T> = Result<T, CompileError>;
