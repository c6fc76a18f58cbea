//! Process-wide registry of runtime helpers
//!
//! The emitter refers to runtime helper functions and well-known
//! constructors by closed-enum handles; their signatures are resolved
//! once into a read-only registry at first use and never mutated
//! afterwards.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Well-known runtime helper functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    /// Resolve a type token to a runtime type object
    TypeFromHandle,
    /// Resolve a method token to a runtime method object
    MethodFromHandle,
    /// Resolve a method token declared on a generic type (takes the
    /// declaring type token as a second argument)
    MethodFromHandleGeneric,
    /// Rebind a quoted expression tree against the live closure frame
    QuoteRehydrate,
}

/// Well-known runtime constructors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeCtor {
    /// `decimal(i32)`
    DecimalFromI32,
    /// `decimal(i64)`
    DecimalFromI64,
    /// `decimal(lo, mid, high, sign, scale)` bit-pattern form
    DecimalFromBits,
}

/// Signature of a registered helper: name and argument count as seen
/// by the stack machine.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeSig {
    /// Helper name (disassembly, diagnostics)
    pub name: &'static str,
    /// Number of stack arguments popped
    pub arity: usize,
}

static RUNTIME_FNS: Lazy<FxHashMap<RuntimeFn, RuntimeSig>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert(
        RuntimeFn::TypeFromHandle,
        RuntimeSig {
            name: "rt.type_from_handle",
            arity: 1,
        },
    );
    m.insert(
        RuntimeFn::MethodFromHandle,
        RuntimeSig {
            name: "rt.method_from_handle",
            arity: 1,
        },
    );
    m.insert(
        RuntimeFn::MethodFromHandleGeneric,
        RuntimeSig {
            name: "rt.method_from_handle_generic",
            arity: 2,
        },
    );
    m.insert(
        RuntimeFn::QuoteRehydrate,
        RuntimeSig {
            name: "rt.quote",
            arity: 3,
        },
    );
    m
});

static RUNTIME_CTORS: Lazy<FxHashMap<RuntimeCtor, RuntimeSig>> = Lazy::new(|| {
    let mut m = FxHashMap::default();
    m.insert(
        RuntimeCtor::DecimalFromI32,
        RuntimeSig {
            name: "decimal(i32)",
            arity: 1,
        },
    );
    m.insert(
        RuntimeCtor::DecimalFromI64,
        RuntimeSig {
            name: "decimal(i64)",
            arity: 1,
        },
    );
    m.insert(
        RuntimeCtor::DecimalFromBits,
        RuntimeSig {
            name: "decimal(lo, mid, hi, sign, scale)",
            arity: 5,
        },
    );
    m
});

impl RuntimeFn {
    /// Resolved signature of this helper
    pub fn sig(self) -> RuntimeSig {
        RUNTIME_FNS[&self]
    }
}

impl RuntimeCtor {
    /// Resolved signature of this constructor
    pub fn sig(self) -> RuntimeSig {
        RUNTIME_CTORS[&self]
    }
}
