//! Shared test harness: a reference interpreter for compiled units
//!
//! Executes the instruction records directly, with IL-style stack
//! typing: sub-32-bit integers, booleans and chars live as `I32`,
//! 64-bit integers as `I64`. Only the instructions the tests exercise
//! are modeled; anything else is an immediate panic so a gap in the
//! model cannot masquerade as a pass.
#![allow(dead_code)]

use arbor_engine::compiler::bytecode::{ElemKind, Instr};
use arbor_engine::compiler::ir::value::Dec;
use arbor_engine::compiler::runtime::RuntimeCtor;
use arbor_engine::compiler::types::{NumKind, SemType, TypeRef};
use arbor_engine::CompiledUnit;

/// A runtime value on the simulated stack
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null reference
    Null,
    /// 32-bit integer slot (also bools, chars, small ints)
    I32(i32),
    /// 64-bit integer slot (signedness is in the instruction, not here)
    I64(i64),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// String reference
    Str(String),
    /// Decimal value
    Dec(Dec),
    /// Nullable wrapper
    Nullable(Option<Box<Value>>),
    /// Boxed value with its boxed-from type
    Boxed(Box<Value>, SemType),
    /// Array of values
    Array(Vec<Value>),
    /// Plain object instance
    Obj(TypeRef),
    /// Pooled constant reference (quoted trees, hoisted descriptors)
    Pooled(u32),
}

impl Value {
    /// Shorthand for a present nullable
    pub fn some(v: Value) -> Value {
        Value::Nullable(Some(Box::new(v)))
    }

    /// Shorthand for the empty nullable
    pub fn none() -> Value {
        Value::Nullable(None)
    }
}

/// Why execution stopped abnormally
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// A checked conversion or checked arithmetic overflowed
    Overflow,
    /// The empty nullable was unwrapped
    NullValue,
    /// A cast or unbox found the wrong type
    InvalidCast,
    /// A `Throw` instruction fired, carrying the thrown value
    Thrown(Box<Value>),
}

/// Reference interpreter over one compiled unit
pub struct Machine<'a> {
    unit: &'a CompiledUnit,
    stack: Vec<Value>,
    locals: Vec<Value>,
    captured: Vec<Value>,
}

impl<'a> Machine<'a> {
    /// Machine with zeroed locals and no captured frame
    pub fn new(unit: &'a CompiledUnit) -> Self {
        Self {
            unit,
            stack: Vec::new(),
            locals: vec![Value::Null; unit.local_count() as usize],
            captured: Vec::new(),
        }
    }

    /// Attach a captured frame for `LoadCaptured`/`StoreCaptured`
    pub fn with_captured(mut self, captured: Vec<Value>) -> Self {
        self.captured = captured;
        self
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow")
    }

    fn pop_i32(&mut self) -> i32 {
        match self.pop() {
            Value::I32(v) => v,
            other => panic!("expected an i32 slot, got {other:?}"),
        }
    }

    /// Execute to the end of the stream; returns the stack top, if any
    pub fn run(mut self) -> Result<Option<Value>, Fault> {
        let instrs = self.unit.instrs();
        let mut pc = 0usize;
        while pc < instrs.len() {
            let mut next = pc + 1;
            match &instrs[pc] {
                Instr::Nop => {}
                Instr::Dup => {
                    let top = self.stack.last().expect("stack underflow").clone();
                    self.stack.push(top);
                }
                Instr::Pop => {
                    self.pop();
                }

                Instr::ConstNull => self.stack.push(Value::Null),
                Instr::ConstM1 => self.stack.push(Value::I32(-1)),
                Instr::Const0 => self.stack.push(Value::I32(0)),
                Instr::Const1 => self.stack.push(Value::I32(1)),
                Instr::Const2 => self.stack.push(Value::I32(2)),
                Instr::Const3 => self.stack.push(Value::I32(3)),
                Instr::Const4 => self.stack.push(Value::I32(4)),
                Instr::Const5 => self.stack.push(Value::I32(5)),
                Instr::Const6 => self.stack.push(Value::I32(6)),
                Instr::Const7 => self.stack.push(Value::I32(7)),
                Instr::Const8 => self.stack.push(Value::I32(8)),
                Instr::ConstI8(v) => self.stack.push(Value::I32(*v as i32)),
                Instr::ConstI32(v) => self.stack.push(Value::I32(*v)),
                Instr::ConstI64(v) => self.stack.push(Value::I64(*v)),
                Instr::ConstF32(v) => self.stack.push(Value::F32(*v)),
                Instr::ConstF64(v) => self.stack.push(Value::F64(*v)),
                Instr::ConstStr(i) => {
                    let s = self
                        .unit
                        .pool()
                        .get_string(*i)
                        .expect("dangling string index");
                    self.stack.push(Value::Str(s.to_string()));
                }
                Instr::LoadConst(i) => self.stack.push(Value::Pooled(*i)),

                Instr::Conv(kind) => {
                    let v = self.pop();
                    self.stack.push(convert(&v, *kind));
                }
                Instr::ConvRUn => {
                    let v = self.pop();
                    let f = match v {
                        Value::I32(x) => (x as u32) as f64,
                        Value::I64(x) => (x as u64) as f64,
                        other => panic!("conv.r.un on {other:?}"),
                    };
                    self.stack.push(Value::F64(f));
                }
                Instr::ConvOvf(kind) => {
                    let wide = self.pop_signed_wide();
                    self.stack.push(convert_checked(wide, *kind)?);
                }
                Instr::ConvOvfUn(kind) => {
                    let wide = self.pop_unsigned_wide();
                    self.stack.push(convert_checked(wide, *kind)?);
                }

                Instr::Box(ty) => {
                    let v = self.pop();
                    let boxed = match v {
                        Value::Nullable(None) => Value::Null,
                        Value::Nullable(Some(inner)) => {
                            Value::Boxed(inner, ty.non_nullable().clone())
                        }
                        other => Value::Boxed(Box::new(other), ty.clone()),
                    };
                    self.stack.push(boxed);
                }
                Instr::Unbox(ty) => {
                    let v = self.pop();
                    let unboxed = if ty.is_nullable() {
                        match v {
                            Value::Null => Value::Nullable(None),
                            Value::Boxed(inner, bty) if bty == *ty.non_nullable() => {
                                Value::Nullable(Some(inner))
                            }
                            _ => return Err(Fault::InvalidCast),
                        }
                    } else {
                        match v {
                            Value::Null => return Err(Fault::NullValue),
                            Value::Boxed(inner, bty) if bty == *ty => *inner,
                            _ => return Err(Fault::InvalidCast),
                        }
                    };
                    self.stack.push(unboxed);
                }
                Instr::CastClass(ty) => {
                    let v = self.pop();
                    let ok = match &v {
                        Value::Null => true,
                        Value::Boxed(_, bty) => *ty == SemType::Object || bty == ty.non_nullable(),
                        Value::Str(_) => *ty == SemType::Str || *ty == SemType::Object,
                        Value::Array(_) => {
                            matches!(ty, SemType::Array(_)) || *ty == SemType::Object
                        }
                        _ => *ty == SemType::Object,
                    };
                    if !ok {
                        return Err(Fault::InvalidCast);
                    }
                    self.stack.push(v);
                }
                Instr::IsInst(ty) => {
                    let v = self.pop();
                    let matched = match &v {
                        Value::Null => false,
                        Value::Boxed(_, bty) => bty == ty.non_nullable(),
                        Value::Str(_) => *ty == SemType::Str,
                        _ => false,
                    };
                    self.stack.push(if matched { v } else { Value::Null });
                }
                Instr::NewObj(ctor) => {
                    let dec = match ctor {
                        RuntimeCtor::DecimalFromI32 => Dec::from_i32(self.pop_i32()),
                        RuntimeCtor::DecimalFromI64 => match self.pop() {
                            Value::I64(v) => Dec::from_i64(v),
                            other => panic!("decimal(i64) on {other:?}"),
                        },
                        RuntimeCtor::DecimalFromBits => {
                            let scale = self.pop_i32() as u8;
                            let negative = self.pop_i32() != 0;
                            let hi = self.pop_i32() as u32;
                            let mid = self.pop_i32() as u32;
                            let lo = self.pop_i32() as u32;
                            Dec::from_parts(lo, mid, hi, negative, scale)
                        }
                    };
                    self.stack.push(Value::Dec(dec));
                }
                Instr::New(t) => self.stack.push(Value::Obj(*t)),
                Instr::DefaultInit(ty) => {
                    let v = match ty {
                        SemType::Nullable(_) => Value::Nullable(None),
                        other => panic!("default-init of {other:?} not modeled"),
                    };
                    self.stack.push(v);
                }

                Instr::WrapNullable(_) => {
                    let v = self.pop();
                    self.stack.push(Value::some(v));
                }
                Instr::NullableHasValue => {
                    let v = self.pop();
                    let has = match v {
                        Value::Nullable(opt) => opt.is_some(),
                        other => panic!("has-value on {other:?}"),
                    };
                    self.stack.push(Value::I32(has as i32));
                }
                Instr::NullableValue => {
                    let v = self.pop();
                    match v {
                        Value::Nullable(Some(inner)) => self.stack.push(*inner),
                        Value::Nullable(None) => return Err(Fault::NullValue),
                        other => panic!("nullable unwrap on {other:?}"),
                    }
                }
                Instr::NullableValueOrDefault => {
                    let v = self.pop();
                    match v {
                        Value::Nullable(Some(inner)) => self.stack.push(*inner),
                        // the emitters only reach this behind a
                        // has-value guard
                        Value::Nullable(None) => panic!("unguarded value-or-default on empty"),
                        other => panic!("nullable unwrap on {other:?}"),
                    }
                }

                Instr::NewArray(_) => {
                    let len = self.pop_i32();
                    assert!(len >= 0, "negative allocation survived emission");
                    self.stack.push(Value::Array(vec![Value::Null; len as usize]));
                }
                Instr::LoadElem(_) => {
                    let index = self.pop_i32() as usize;
                    match self.pop() {
                        Value::Array(items) => self.stack.push(items[index].clone()),
                        other => panic!("element load on {other:?}"),
                    }
                }
                Instr::StoreElem(kind) => {
                    let value = self.pop();
                    let index = self.pop_i32() as usize;
                    let value = store_narrow(value, kind);
                    match self.pop() {
                        Value::Array(mut items) => {
                            items[index] = value;
                            // arrays are values in this model; put the
                            // updated one back for the next Dup'd use
                            if let Some(Value::Array(top)) = self.stack.last_mut() {
                                *top = items;
                            }
                        }
                        other => panic!("element store on {other:?}"),
                    }
                }
                Instr::ArrayLen => match self.pop() {
                    Value::Array(items) => self.stack.push(Value::I32(items.len() as i32)),
                    other => panic!("array length on {other:?}"),
                },

                Instr::LoadLocal(i) | Instr::LoadLocalBoxed(i) => {
                    self.stack.push(self.locals[*i as usize].clone());
                }
                Instr::StoreLocal(i) | Instr::StoreLocalBoxed(i) => {
                    let v = self.pop();
                    self.locals[*i as usize] = v;
                }
                Instr::LoadCaptured(i) => {
                    self.stack.push(self.captured[*i as usize].clone());
                }
                Instr::StoreCaptured(i) => {
                    let v = self.pop();
                    self.captured[*i as usize] = v;
                }

                Instr::Add => self.binary_arith(|a, b| a.wrapping_add(b), |a, b| a + b)?,
                Instr::Sub => self.binary_arith(|a, b| a.wrapping_sub(b), |a, b| a - b)?,
                Instr::SubOvf => {
                    let b = self.pop();
                    let a = self.pop();
                    let r = match (a, b) {
                        (Value::I32(x), Value::I32(y)) => {
                            Value::I32(x.checked_sub(y).ok_or(Fault::Overflow)?)
                        }
                        (Value::I64(x), Value::I64(y)) => {
                            Value::I64(x.checked_sub(y).ok_or(Fault::Overflow)?)
                        }
                        (x, y) => panic!("checked sub on {x:?}, {y:?}"),
                    };
                    self.stack.push(r);
                }
                Instr::SubOvfUn => {
                    let b = self.pop();
                    let a = self.pop();
                    let r = match (a, b) {
                        (Value::I32(x), Value::I32(y)) => Value::I32(
                            (x as u32).checked_sub(y as u32).ok_or(Fault::Overflow)? as i32,
                        ),
                        (Value::I64(x), Value::I64(y)) => Value::I64(
                            (x as u64).checked_sub(y as u64).ok_or(Fault::Overflow)? as i64,
                        ),
                        (x, y) => panic!("checked sub on {x:?}, {y:?}"),
                    };
                    self.stack.push(r);
                }
                Instr::Neg => {
                    let v = self.pop();
                    let r = match v {
                        Value::I32(x) => Value::I32(x.wrapping_neg()),
                        Value::I64(x) => Value::I64(x.wrapping_neg()),
                        Value::F32(x) => Value::F32(-x),
                        Value::F64(x) => Value::F64(-x),
                        other => panic!("negate on {other:?}"),
                    };
                    self.stack.push(r);
                }
                Instr::BitNot => {
                    let v = self.pop();
                    let r = match v {
                        Value::I32(x) => Value::I32(!x),
                        Value::I64(x) => Value::I64(!x),
                        other => panic!("complement on {other:?}"),
                    };
                    self.stack.push(r);
                }
                Instr::Ceq => {
                    let b = self.pop();
                    let a = self.pop();
                    self.stack.push(Value::I32((a == b) as i32));
                }

                Instr::Branch(label) => {
                    next = self.unit.label_target(*label);
                }
                Instr::BranchIfFalse(label) => {
                    if self.pop_i32() == 0 {
                        next = self.unit.label_target(*label);
                    }
                }
                Instr::Throw => {
                    let v = self.pop();
                    return Err(Fault::Thrown(Box::new(v)));
                }

                other => panic!("instruction {other:?} not modeled by the harness"),
            }
            pc = next;
        }
        Ok(self.stack.pop())
    }

    fn binary_arith(
        &mut self,
        int_op: impl Fn(i64, i64) -> i64,
        float_op: impl Fn(f64, f64) -> f64,
    ) -> Result<(), Fault> {
        let b = self.pop();
        let a = self.pop();
        let r = match (a, b) {
            (Value::I32(x), Value::I32(y)) => Value::I32(int_op(x as i64, y as i64) as i32),
            (Value::I64(x), Value::I64(y)) => Value::I64(int_op(x, y)),
            (Value::F32(x), Value::F32(y)) => Value::F32(float_op(x as f64, y as f64) as f32),
            (Value::F64(x), Value::F64(y)) => Value::F64(float_op(x, y)),
            (x, y) => panic!("arithmetic on {x:?}, {y:?}"),
        };
        self.stack.push(r);
        Ok(())
    }

    fn pop_signed_wide(&mut self) -> i128 {
        match self.pop() {
            Value::I32(v) => v as i128,
            Value::I64(v) => v as i128,
            Value::F32(v) => v as i128,
            Value::F64(v) => v as i128,
            other => panic!("numeric conversion on {other:?}"),
        }
    }

    fn pop_unsigned_wide(&mut self) -> i128 {
        match self.pop() {
            Value::I32(v) => (v as u32) as i128,
            Value::I64(v) => (v as u64) as i128,
            other => panic!("unsigned conversion on {other:?}"),
        }
    }
}

/// Unchecked IL-style conversion
fn convert(v: &Value, kind: NumKind) -> Value {
    match kind {
        NumKind::R4 => Value::F32(to_f64(v) as f32),
        NumKind::R8 => Value::F64(to_f64(v)),
        NumKind::I1 => Value::I32((to_i64(v) as i8) as i32),
        NumKind::U1 => Value::I32((to_i64(v) as u8) as i32),
        NumKind::I2 => Value::I32((to_i64(v) as i16) as i32),
        NumKind::U2 => Value::I32((to_i64(v) as u16) as i32),
        NumKind::I4 => Value::I32(to_i64(v) as i32),
        NumKind::U4 => Value::I32((to_i64(v) as u32) as i32),
        NumKind::I8 => Value::I64(match v {
            // sign-extend from 32 bits
            Value::I32(x) => *x as i64,
            _ => to_i64(v),
        }),
        NumKind::U8 => Value::I64(match v {
            // zero-extend from 32 bits
            Value::I32(x) => ((*x as u32) as u64) as i64,
            Value::F32(x) => (*x as u64) as i64,
            Value::F64(x) => (*x as u64) as i64,
            _ => to_i64(v),
        }),
    }
}

/// Range-checked conversion of a widened source
fn convert_checked(wide: i128, kind: NumKind) -> Result<Value, Fault> {
    let (lo, hi): (i128, i128) = match kind {
        NumKind::I1 => (i8::MIN as i128, i8::MAX as i128),
        NumKind::U1 => (0, u8::MAX as i128),
        NumKind::I2 => (i16::MIN as i128, i16::MAX as i128),
        NumKind::U2 => (0, u16::MAX as i128),
        NumKind::I4 => (i32::MIN as i128, i32::MAX as i128),
        NumKind::U4 => (0, u32::MAX as i128),
        NumKind::I8 => (i64::MIN as i128, i64::MAX as i128),
        NumKind::U8 => (0, u64::MAX as i128),
        NumKind::R4 | NumKind::R8 => panic!("float destinations are never checked"),
    };
    if wide < lo || wide > hi {
        return Err(Fault::Overflow);
    }
    Ok(match kind {
        NumKind::I8 => Value::I64(wide as i64),
        NumKind::U8 => Value::I64((wide as u64) as i64),
        _ => Value::I32(wide as i32),
    })
}

/// Element stores truncate to the element width
fn store_narrow(value: Value, kind: &ElemKind) -> Value {
    match (kind, &value) {
        (ElemKind::I1, Value::I32(v)) => Value::I32((*v as i8) as i32),
        (ElemKind::I2, Value::I32(v)) => Value::I32((*v as i16) as i32),
        _ => value,
    }
}

fn to_i64(v: &Value) -> i64 {
    match v {
        Value::I32(x) => *x as i64,
        Value::I64(x) => *x,
        Value::F32(x) => *x as i64,
        Value::F64(x) => *x as i64,
        other => panic!("numeric conversion on {other:?}"),
    }
}

fn to_f64(v: &Value) -> f64 {
    match v {
        Value::I32(x) => *x as f64,
        Value::I64(x) => *x as f64,
        Value::F32(x) => *x as f64,
        Value::F64(x) => *x,
        other => panic!("numeric conversion on {other:?}"),
    }
}

/// Compile-and-run helper: runs the unit and unwraps a value result
pub fn run_value(unit: &CompiledUnit) -> Value {
    Machine::new(unit)
        .run()
        .expect("execution faulted")
        .expect("no value left on the stack")
}

/// Compile-and-run helper for the faulting paths
pub fn run_fault(unit: &CompiledUnit) -> Fault {
    match Machine::new(unit).run() {
        Err(fault) => fault,
        Ok(v) => panic!("expected a fault, finished with {v:?}"),
    }
}
