//! Instruction records for the target stack machine
//!
//! Instructions are records in an index-addressable arena (see
//! `builder::InstructionList`), not an encoded byte stream: the scope
//! allocator patches already-emitted records in place when a variable
//! is promoted to a boxed cell, so positions must stay stable and
//! operands must stay structured.

use crate::compiler::runtime::{RuntimeCtor, RuntimeFn};
use crate::compiler::types::{FieldRef, MethodRef, NumKind, SemType};

/// Branch target; resolved through the instruction list's label table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Metadata token operand for `LoadToken`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A type handle
    Type(crate::compiler::types::TypeRef),
    /// A method handle
    Method(MethodRef),
}

/// Element-access kind for array load/store.
///
/// Loads distinguish signed from unsigned 8/16-bit kinds (the loaded
/// value is extended to 32 bits); stores collapse them since store
/// sign-extension does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElemKind {
    /// Signed 8-bit element
    I1,
    /// Unsigned 8-bit element (load only)
    U1,
    /// Signed 16-bit element
    I2,
    /// Unsigned 16-bit element (load only)
    U2,
    /// Signed 32-bit element
    I4,
    /// Unsigned 32-bit element (load only)
    U4,
    /// 64-bit element
    I8,
    /// 32-bit float element
    R4,
    /// 64-bit float element
    R8,
    /// Reference element
    Ref,
    /// Generic typed element (enums, structs, decimals, nullables)
    Value(SemType),
}

/// A stack-machine instruction.
///
/// Immutable once appended, except that the scope allocator may rewrite
/// `LoadLocal`/`StoreLocal` into their boxed forms for a promoted slot.
///
/// Stack effects are written `[before] -> [after]`, top on the right.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    // ===== Stack manipulation =====
    /// No operation
    Nop,
    /// Duplicate top value: `[a] -> [a, a]`
    Dup,
    /// Discard top value: `[a] -> []`
    Pop,

    // ===== Constants =====
    /// Push null reference
    ConstNull,
    /// Push -1 (dedicated compact form)
    ConstM1,
    /// Push 0 (dedicated compact form)
    Const0,
    /// Push 1 (dedicated compact form)
    Const1,
    /// Push 2 (dedicated compact form)
    Const2,
    /// Push 3 (dedicated compact form)
    Const3,
    /// Push 4 (dedicated compact form)
    Const4,
    /// Push 5 (dedicated compact form)
    Const5,
    /// Push 6 (dedicated compact form)
    Const6,
    /// Push 7 (dedicated compact form)
    Const7,
    /// Push 8 (dedicated compact form)
    Const8,
    /// Push a signed-byte-range integer (short form)
    ConstI8(i8),
    /// Push a 32-bit integer (full-width form)
    ConstI32(i32),
    /// Push a 64-bit integer
    ConstI64(i64),
    /// Push a 32-bit float
    ConstF32(f32),
    /// Push a 64-bit float
    ConstF64(f64),
    /// Push a string from the constant pool (operand: pool index)
    ConstStr(u32),
    /// Push a non-primitive constant from the pool (operand: pool index)
    LoadConst(u32),

    // ===== Conversions =====
    /// Narrow/widen to the numeric kind: `[a] -> [conv(a)]`
    Conv(NumKind),
    /// Overflow-checked conversion from a signed source
    ConvOvf(NumKind),
    /// Overflow-checked conversion from an unsigned source
    ConvOvfUn(NumKind),
    /// Reinterpret an unsigned source for a float conversion
    ConvRUn,

    // ===== Object model =====
    /// Box a value: `[v] -> [ref]`. Boxing a nullable encodes its
    /// empty state as a null reference.
    Box(SemType),
    /// Unbox to a value type, faulting on mismatch: `[ref] -> [v]`
    Unbox(SemType),
    /// Checked reference cast, faulting on mismatch
    CastClass(SemType),
    /// Runtime type test: `[ref] -> [ref-or-null]`
    IsInst(SemType),
    /// Invoke a well-known runtime constructor; pops its arguments and
    /// pushes the new value
    NewObj(RuntimeCtor),
    /// Allocate a new instance of a class: `[] -> [obj]`
    New(crate::compiler::types::TypeRef),
    /// Push the default value of a value type
    DefaultInit(SemType),

    // ===== Nullable intrinsics =====
    /// Wrap the top value in the given nullable type: `[v] -> [v?]`
    WrapNullable(SemType),
    /// `[v?] -> [bool]`
    NullableHasValue,
    /// Extract the value, faulting when empty: `[v?] -> [v]`
    NullableValue,
    /// Extract the value or the default when empty: `[v?] -> [v]`
    NullableValueOrDefault,

    // ===== Metadata =====
    /// Push a raw metadata token
    LoadToken(Token),
    /// Call a well-known runtime helper
    CallRuntime(RuntimeFn),
    /// Call a user method; pops its arguments, pushes the result
    CallMethod(MethodRef),

    // ===== Arrays =====
    /// Allocate an array: `[len] -> [array]`
    NewArray(SemType),
    /// Load an element: `[array, index] -> [elem]`
    LoadElem(ElemKind),
    /// Store an element: `[array, index, value] -> []`
    StoreElem(ElemKind),
    /// Array length: `[array] -> [len]`
    ArrayLen,

    // ===== Fields =====
    /// Load an instance field: `[obj] -> [value]`
    LoadField(FieldRef),
    /// Store an instance field: `[obj, value] -> []`
    StoreField(FieldRef),
    /// Load a static field: `[] -> [value]`
    LoadStatic(FieldRef),
    /// Store a static field: `[value] -> []`
    StoreStatic(FieldRef),

    // ===== Locals =====
    /// Load a local slot (operand: slot index)
    LoadLocal(u16),
    /// Store to a local slot
    StoreLocal(u16),
    /// Load through the heap cell in a local slot
    LoadLocalBoxed(u16),
    /// Store through the heap cell in a local slot
    StoreLocalBoxed(u16),
    /// Load from the captured frame (operand: closure index)
    LoadCaptured(u16),
    /// Store to the captured frame
    StoreCaptured(u16),

    // ===== Arithmetic & comparison =====
    /// `[a, b] -> [a + b]`
    Add,
    /// `[a, b] -> [a - b]`
    Sub,
    /// Overflow-checked subtract, signed
    SubOvf,
    /// Overflow-checked subtract, unsigned
    SubOvfUn,
    /// `[a] -> [-a]`
    Neg,
    /// `[a] -> [~a]`
    BitNot,
    /// `[a, b] -> [a == b]`
    Ceq,

    // ===== Control flow =====
    /// Unconditional branch
    Branch(Label),
    /// Pop a value, branch when zero/false
    BranchIfFalse(Label),
    /// Pop a value and raise it as an exception
    Throw,
    /// Re-raise the exception of the enclosing handler
    Rethrow,
}

impl Instr {
    /// Slot index referenced by a plain or boxed local access, if any
    pub fn local_slot(&self) -> Option<u16> {
        match self {
            Instr::LoadLocal(i)
            | Instr::StoreLocal(i)
            | Instr::LoadLocalBoxed(i)
            | Instr::StoreLocalBoxed(i) => Some(*i),
            _ => None,
        }
    }
}
