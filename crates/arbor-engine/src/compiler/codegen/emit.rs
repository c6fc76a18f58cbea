//! Instruction emitters: constants, conversions, arrays, fields
//!
//! Every emitter picks the most compact instruction that preserves the
//! value, and pairs wide constants with an explicit width/signedness
//! conversion so the stack state is unambiguous to a verifier.

use crate::compiler::bytecode::{ElemKind, Instr, Token};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::value::{ConstValue, Dec};
use crate::compiler::runtime::{RuntimeCtor, RuntimeFn};
use crate::compiler::types::{FieldRef, NumKind, SemType, TypeRef, TypeTable};

use super::CodeGen;

impl<'t> CodeGen<'t> {
    // ===== Constants =====

    /// Emit `value` as a constant of static type `ty`.
    ///
    /// Callers must gate with [`Self::can_emit_constant`]; reaching an
    /// unemittable constant here is a walk bug and panics.
    pub fn emit_constant(&mut self, value: &ConstValue, ty: &SemType) -> CompileResult<()> {
        if matches!(value, ConstValue::Null) {
            self.emit_default(ty);
            return Ok(());
        }
        if self.try_emit_primitive(value, ty) {
            return Ok(());
        }
        match value {
            ConstValue::Type(t) if self.types().should_load_token(*t) => {
                self.emit_type_token(*t);
                if *ty != SemType::Class(TypeTable::TYPE) {
                    self.emit(Instr::CastClass(ty.clone()));
                }
                Ok(())
            }
            ConstValue::Method(m) if self.types().should_load_method_token(*m) => {
                self.emit(Instr::LoadToken(Token::Method(*m)));
                if self.types().method_declaring_is_generic(*m) {
                    let declaring = self
                        .types()
                        .method_declaring(*m)
                        .unwrap_or_else(|| panic!("method {m:?} has no declaring type"));
                    self.emit(Instr::LoadToken(Token::Type(declaring)));
                    self.emit(Instr::CallRuntime(RuntimeFn::MethodFromHandleGeneric));
                } else {
                    self.emit(Instr::CallRuntime(RuntimeFn::MethodFromHandle));
                }
                if *ty != SemType::Class(TypeTable::METHOD_BASE) {
                    self.emit(Instr::CastClass(ty.clone()));
                }
                Ok(())
            }
            _ => panic!(
                "constant of type '{}' is not emittable; gate with can_emit_constant",
                self.types().display(ty)
            ),
        }
    }

    /// Whether `value` can be emitted inline as a constant of `ty`
    pub fn can_emit_constant(&self, value: &ConstValue, ty: &SemType) -> bool {
        if matches!(value, ConstValue::Null) || is_primitive_constant_type(ty) {
            return true;
        }
        match value {
            ConstValue::Type(t) => self.types().should_load_token(*t),
            ConstValue::Method(m) => self.types().should_load_method_token(*m),
            _ => false,
        }
    }

    fn try_emit_primitive(&mut self, value: &ConstValue, ty: &SemType) -> bool {
        match ty {
            SemType::Bool => self.emit_bool(expect_bool(value, ty)),
            SemType::Char => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::U2));
            }
            SemType::I8 => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::I1));
            }
            SemType::I16 => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::I2));
            }
            SemType::I32 => self.emit_int(int_value(value, ty) as i32),
            SemType::I64 => self.emit_i64(int_value(value, ty)),
            SemType::U8 => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::U1));
            }
            SemType::U16 => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::U2));
            }
            SemType::U32 => {
                self.emit_int(int_value(value, ty) as i32);
                self.emit(Instr::Conv(NumKind::U4));
            }
            SemType::U64 => self.emit_u64(int_value(value, ty) as u64),
            SemType::F32 => match value {
                ConstValue::F32(v) => {
                    self.emit(Instr::ConstF32(*v));
                }
                _ => mismatch(value, ty),
            },
            SemType::F64 => match value {
                ConstValue::F64(v) => {
                    self.emit(Instr::ConstF64(*v));
                }
                _ => mismatch(value, ty),
            },
            SemType::Decimal => match value {
                ConstValue::Decimal(d) => self.emit_decimal(d),
                _ => mismatch(value, ty),
            },
            SemType::Str => match value {
                ConstValue::Str(s) => self.emit_string(s),
                _ => mismatch(value, ty),
            },
            // Enum constants emit as their underlying kind
            SemType::Enum(_, kind) => {
                let raw = int_value(value, ty);
                match kind {
                    NumKind::I8 => self.emit_i64(raw),
                    NumKind::U8 => self.emit_u64(raw as u64),
                    k => {
                        self.emit_int(raw as i32);
                        self.emit(Instr::Conv(*k));
                    }
                }
            }
            _ => return false,
        }
        true
    }

    /// Push a 32-bit integer in the most compact form
    pub fn emit_int(&mut self, value: i32) {
        let instr = match value {
            -1 => Instr::ConstM1,
            0 => Instr::Const0,
            1 => Instr::Const1,
            2 => Instr::Const2,
            3 => Instr::Const3,
            4 => Instr::Const4,
            5 => Instr::Const5,
            6 => Instr::Const6,
            7 => Instr::Const7,
            8 => Instr::Const8,
            v if v >= i8::MIN as i32 && v <= i8::MAX as i32 => Instr::ConstI8(v as i8),
            v => Instr::ConstI32(v),
        };
        self.emit(instr);
    }

    /// Push a signed 64-bit constant; the conversion pins signedness
    /// for a verifier
    pub fn emit_i64(&mut self, value: i64) {
        self.emit(Instr::ConstI64(value));
        self.emit(Instr::Conv(NumKind::I8));
    }

    /// Push an unsigned 64-bit constant
    pub fn emit_u64(&mut self, value: u64) {
        self.emit(Instr::ConstI64(value as i64));
        self.emit(Instr::Conv(NumKind::U8));
    }

    /// Push a boolean (booleans are 32-bit integers on the stack)
    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value { Instr::Const1 } else { Instr::Const0 });
    }

    /// Push an interned string from the constant pool
    pub fn emit_string(&mut self, value: &str) {
        let index = self.instructions.pool_mut().add_string(value);
        self.emit(Instr::ConstStr(index));
    }

    /// Push a decimal, choosing the narrowest constructor that
    /// round-trips the value: i32, then i64, then the bit-pattern form.
    pub fn emit_decimal(&mut self, value: &Dec) {
        if value.is_integral() {
            if let Some(i) = value.to_i32_exact() {
                self.emit_int(i);
                self.emit(Instr::NewObj(RuntimeCtor::DecimalFromI32));
                return;
            }
            if let Some(i) = value.to_i64_exact() {
                self.emit_i64(i);
                self.emit(Instr::NewObj(RuntimeCtor::DecimalFromI64));
                return;
            }
        }
        self.emit_int(value.lo as i32);
        self.emit_int(value.mid as i32);
        self.emit_int(value.hi as i32);
        self.emit_bool(value.negative);
        self.emit_int(value.scale as i32);
        self.emit(Instr::Conv(NumKind::U1));
        self.emit(Instr::NewObj(RuntimeCtor::DecimalFromBits));
    }

    /// Push the default value of `ty`.
    ///
    /// Panics on void; a default-valued void is a malformed tree.
    pub fn emit_default(&mut self, ty: &SemType) {
        match ty {
            SemType::Void => panic!("default value of void"),
            SemType::Object
            | SemType::Str
            | SemType::Class(_)
            | SemType::Interface(_)
            | SemType::Delegate(_)
            | SemType::Array(_)
            | SemType::EnumBase
            | SemType::ValueTypeBase => {
                self.emit(Instr::ConstNull);
            }
            SemType::Bool
            | SemType::Char
            | SemType::I8
            | SemType::I16
            | SemType::I32
            | SemType::U8
            | SemType::U16
            | SemType::U32 => {
                self.emit(Instr::Const0);
            }
            SemType::I64 | SemType::U64 => {
                self.emit(Instr::Const0);
                self.emit(Instr::Conv(NumKind::I8));
            }
            SemType::Enum(_, kind) => {
                self.emit(Instr::Const0);
                if matches!(kind, NumKind::I8 | NumKind::U8) {
                    self.emit(Instr::Conv(NumKind::I8));
                }
            }
            SemType::F32 => {
                self.emit(Instr::ConstF32(0.0));
            }
            SemType::F64 => {
                self.emit(Instr::ConstF64(0.0));
            }
            SemType::Decimal => {
                self.emit(Instr::Const0);
                self.emit(Instr::NewObj(RuntimeCtor::DecimalFromI32));
            }
            SemType::Nullable(_) | SemType::Struct(_) => {
                self.emit(Instr::DefaultInit(ty.clone()));
            }
        }
    }

    // ===== Conversions =====

    /// Convert the stack top from `from` to `to`.
    ///
    /// Resolution order: reference casts for interface/root/abstract-
    /// base/variant-delegate pairs, then nullable lifting, then casts
    /// between assignable non-convertibles, then array covariance,
    /// then the numeric switch. Panics when either side is void.
    pub fn emit_convert(&mut self, from: &SemType, to: &SemType, checked: bool) -> CompileResult<()> {
        if from == to {
            return Ok(());
        }
        assert!(
            *from != SemType::Void && *to != SemType::Void,
            "conversion to or from void"
        );

        if from.is_interface()
            || to.is_interface()
            || *from == SemType::Object
            || *to == SemType::Object
            || *from == SemType::EnumBase
            || *from == SemType::ValueTypeBase
            || self.types().is_legal_variant_delegate_conversion(from, to)
        {
            return self.emit_cast(from, to);
        }
        if from.is_nullable() || to.is_nullable() {
            return self.emit_nullable_conversion(from, to, checked);
        }
        if !(from.is_convertible() && to.is_convertible())
            && (self.types().is_assignable_from(from, to)
                || self.types().is_assignable_from(to, from))
        {
            return self.emit_cast(from, to);
        }
        if matches!(from, SemType::Array(_)) && matches!(to, SemType::Array(_)) {
            return self.emit_cast(from, to);
        }
        if !from.is_convertible() || !to.is_convertible() {
            return Err(CompileError::UnsupportedConversion {
                from: self.types().display(from),
                to: self.types().display(to),
            });
        }
        self.emit_numeric_conversion(from, to, checked)
    }

    /// Cast across the value/reference boundary or between reference
    /// types. Value-to-value casts of distinct types are invalid.
    pub(crate) fn emit_cast(&mut self, from: &SemType, to: &SemType) -> CompileResult<()> {
        match (from.is_value_type(), to.is_value_type()) {
            (false, true) => {
                self.emit(Instr::Unbox(to.clone()));
                Ok(())
            }
            (true, false) => {
                self.emit(Instr::Box(from.clone()));
                if *to != SemType::Object {
                    self.emit(Instr::CastClass(to.clone()));
                }
                Ok(())
            }
            (false, false) => {
                self.emit(Instr::CastClass(to.clone()));
                Ok(())
            }
            (true, true) => Err(CompileError::InvalidCast {
                from: self.types().display(from),
                to: self.types().display(to),
            }),
        }
    }

    fn emit_numeric_conversion(
        &mut self,
        from: &SemType,
        to: &SemType,
        checked: bool,
    ) -> CompileResult<()> {
        let from_unsigned = from.is_unsigned();
        let from_float = from.is_floating_point();
        let Some(kind) = to.num_kind() else {
            return Err(CompileError::UnhandledConvert {
                ty: self.types().display(to),
            });
        };
        match kind {
            // Float destinations never overflow-check; an unsigned
            // source is reinterpreted first
            NumKind::R4 | NumKind::R8 => {
                if from_unsigned {
                    self.emit(Instr::ConvRUn);
                }
                self.emit(Instr::Conv(kind));
            }
            _ if checked => {
                if from_unsigned {
                    self.emit(Instr::ConvOvfUn(kind));
                } else {
                    self.emit(Instr::ConvOvf(kind));
                }
            }
            // 64-bit destinations pick the widening by source
            // signedness (and, for u64, floatness)
            NumKind::I8 => {
                if from_unsigned {
                    self.emit(Instr::Conv(NumKind::U8));
                } else {
                    self.emit(Instr::Conv(NumKind::I8));
                }
            }
            NumKind::U8 => {
                if from_unsigned || from_float {
                    self.emit(Instr::Conv(NumKind::U8));
                } else {
                    self.emit(Instr::Conv(NumKind::I8));
                }
            }
            k => {
                self.emit(Instr::Conv(k));
            }
        }
        Ok(())
    }

    fn emit_nullable_conversion(
        &mut self,
        from: &SemType,
        to: &SemType,
        checked: bool,
    ) -> CompileResult<()> {
        match (from.is_nullable(), to.is_nullable()) {
            (true, true) => self.emit_nullable_to_nullable(from, to, checked),
            (false, true) => {
                self.emit_convert(from, to.non_nullable(), checked)?;
                self.emit(Instr::WrapNullable(to.clone()));
                Ok(())
            }
            (true, false) => {
                if to.is_value_type() {
                    // unwrap faults on the empty nullable
                    self.emit(Instr::NullableValue);
                    self.emit_convert(from.non_nullable(), to, checked)
                } else {
                    // boxing a nullable encodes its empty state as null
                    self.emit(Instr::Box(from.clone()));
                    Ok(())
                }
            }
            (false, false) => unreachable!("nullable conversion with no nullable side"),
        }
    }

    fn emit_nullable_to_nullable(
        &mut self,
        from: &SemType,
        to: &SemType,
        checked: bool,
    ) -> CompileResult<()> {
        let lab_null = self.define_label();
        let lab_end = self.define_label();
        let loc_from = self.get_temp();
        let loc_to = self.get_temp();

        self.emit(Instr::StoreLocal(loc_from.index));
        self.emit(Instr::LoadLocal(loc_from.index));
        self.emit(Instr::NullableHasValue);
        self.emit(Instr::BranchIfFalse(lab_null));
        self.emit(Instr::LoadLocal(loc_from.index));
        self.emit(Instr::NullableValueOrDefault);
        self.emit_convert(from.non_nullable(), to.non_nullable(), checked)?;
        self.emit(Instr::WrapNullable(to.clone()));
        self.emit(Instr::StoreLocal(loc_to.index));
        self.emit(Instr::Branch(lab_end));
        self.mark_label(lab_null);
        self.emit(Instr::DefaultInit(to.clone()));
        self.emit(Instr::StoreLocal(loc_to.index));
        self.mark_label(lab_end);
        self.emit(Instr::LoadLocal(loc_to.index));

        self.free_temp(loc_from);
        self.free_temp(loc_to);
        Ok(())
    }

    // ===== Arrays =====

    /// Allocate a `count`-element array of `elem` and fill it, calling
    /// `emit_element` to push each element's value.
    pub fn emit_array<F>(&mut self, elem: &SemType, count: i32, mut emit_element: F) -> CompileResult<()>
    where
        F: FnMut(&mut Self, i32) -> CompileResult<()>,
    {
        if count < 0 {
            return Err(CompileError::NegativeArrayCount { count });
        }
        self.emit_int(count);
        self.emit(Instr::NewArray(elem.clone()));
        for i in 0..count {
            self.emit(Instr::Dup);
            self.emit_int(i);
            emit_element(self, i)?;
            self.emit_store_element(elem);
        }
        Ok(())
    }

    /// Load an array element of type `ty` (array and index on the stack)
    pub fn emit_load_element(&mut self, ty: &SemType) {
        let kind = if !ty.is_value_type() {
            ElemKind::Ref
        } else {
            match ty {
                SemType::Bool | SemType::I8 => ElemKind::I1,
                SemType::U8 => ElemKind::U1,
                SemType::I16 => ElemKind::I2,
                SemType::Char | SemType::U16 => ElemKind::U2,
                SemType::I32 => ElemKind::I4,
                SemType::U32 => ElemKind::U4,
                SemType::I64 | SemType::U64 => ElemKind::I8,
                SemType::F32 => ElemKind::R4,
                SemType::F64 => ElemKind::R8,
                _ => ElemKind::Value(ty.clone()),
            }
        };
        self.emit(Instr::LoadElem(kind));
    }

    /// Store an array element of type `ty` (array, index and value on
    /// the stack). Stores collapse signedness: sign-extension only
    /// matters on loads.
    pub fn emit_store_element(&mut self, ty: &SemType) {
        if matches!(ty, SemType::Enum(..)) {
            self.emit(Instr::StoreElem(ElemKind::Value(ty.clone())));
            return;
        }
        let kind = match ty {
            SemType::Bool | SemType::I8 | SemType::U8 => ElemKind::I1,
            SemType::Char | SemType::I16 | SemType::U16 => ElemKind::I2,
            SemType::I32 | SemType::U32 => ElemKind::I4,
            SemType::I64 | SemType::U64 => ElemKind::I8,
            SemType::F32 => ElemKind::R4,
            SemType::F64 => ElemKind::R8,
            _ if ty.is_value_type() => ElemKind::Value(ty.clone()),
            _ => ElemKind::Ref,
        };
        self.emit(Instr::StoreElem(kind));
    }

    // ===== Fields and objects =====

    /// Load a field's value; statics take no receiver
    pub fn emit_field_get(&mut self, field: FieldRef) {
        if self.types().field_is_static(field) {
            self.emit(Instr::LoadStatic(field));
        } else {
            self.emit(Instr::LoadField(field));
        }
    }

    /// Store a field's value
    pub fn emit_field_set(&mut self, field: FieldRef) {
        if self.types().field_is_static(field) {
            self.emit(Instr::StoreStatic(field));
        } else {
            self.emit(Instr::StoreField(field));
        }
    }

    /// Allocate an instance of `class`; an open generic type is not a
    /// legal allocation target
    pub fn emit_new(&mut self, class: TypeRef) -> CompileResult<()> {
        if self.types().is_open_generic(class) {
            return Err(CompileError::IllegalNewGenericParams {
                ty: self.types().name(class).to_string(),
            });
        }
        self.emit(Instr::New(class));
        Ok(())
    }

    /// Push the runtime type object for `t`
    pub fn emit_type_token(&mut self, t: TypeRef) {
        self.emit(Instr::LoadToken(Token::Type(t)));
        self.emit(Instr::CallRuntime(RuntimeFn::TypeFromHandle));
    }
}

/// Types whose constants emit inline without the pool or token paths
fn is_primitive_constant_type(ty: &SemType) -> bool {
    matches!(
        ty,
        SemType::Bool
            | SemType::Char
            | SemType::I8
            | SemType::I16
            | SemType::I32
            | SemType::I64
            | SemType::U8
            | SemType::U16
            | SemType::U32
            | SemType::U64
            | SemType::F32
            | SemType::F64
            | SemType::Decimal
            | SemType::Str
            | SemType::Enum(..)
    )
}

fn expect_bool(value: &ConstValue, ty: &SemType) -> bool {
    match value {
        ConstValue::Bool(b) => *b,
        _ => mismatch(value, ty),
    }
}

/// Integer payload of an integral constant, widened to i64
fn int_value(value: &ConstValue, ty: &SemType) -> i64 {
    match value {
        ConstValue::Bool(b) => *b as i64,
        ConstValue::Char(c) => *c as i64,
        ConstValue::I8(v) => *v as i64,
        ConstValue::I16(v) => *v as i64,
        ConstValue::I32(v) => *v as i64,
        ConstValue::I64(v) => *v,
        ConstValue::U8(v) => *v as i64,
        ConstValue::U16(v) => *v as i64,
        ConstValue::U32(v) => *v as i64,
        ConstValue::U64(v) => *v as i64,
        _ => mismatch(value, ty),
    }
}

fn mismatch(value: &ConstValue, ty: &SemType) -> ! {
    panic!("constant {value:?} does not match its static type {ty:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::ir::value::VarId;

    fn gen(types: &TypeTable) -> CodeGen<'_> {
        CodeGen::new(types)
    }

    #[test]
    fn compact_int_selection() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_int(-1);
        g.emit_int(0);
        g.emit_int(8);
        g.emit_int(9);
        g.emit_int(-128);
        g.emit_int(129);
        g.emit_int(i32::MIN);
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstM1,
                Instr::Const0,
                Instr::Const8,
                Instr::ConstI8(9),
                Instr::ConstI8(-128),
                Instr::ConstI32(129),
                Instr::ConstI32(i32::MIN),
            ]
        );
    }

    #[test]
    fn wide_constants_pin_signedness() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_constant(&ConstValue::I64(5), &SemType::I64).unwrap();
        g.emit_constant(&ConstValue::U64(u64::MAX), &SemType::U64)
            .unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstI64(5),
                Instr::Conv(NumKind::I8),
                Instr::ConstI64(-1),
                Instr::Conv(NumKind::U8),
            ]
        );
    }

    #[test]
    fn small_int_constants_narrow_after_push() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_constant(&ConstValue::U8(200), &SemType::U8).unwrap();
        g.emit_constant(&ConstValue::Char(b'A' as u16), &SemType::Char)
            .unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstI32(200), // outside the short form's range
                Instr::Conv(NumKind::U1),
                Instr::ConstI8(65),
                Instr::Conv(NumKind::U2),
            ]
        );
    }

    #[test]
    fn strings_are_pooled_and_interned() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_string("abc");
        g.emit_string("def");
        g.emit_string("abc");
        assert_eq!(
            g.instructions().instrs(),
            &[Instr::ConstStr(0), Instr::ConstStr(1), Instr::ConstStr(0)]
        );
        assert_eq!(g.instructions().pool().string_count(), 2);
    }

    #[test]
    fn decimal_picks_narrowest_ctor() {
        let types = TypeTable::new();

        let mut g = gen(&types);
        g.emit_decimal(&Dec::from_i32(7));
        assert_eq!(
            g.instructions().instrs(),
            &[Instr::Const7, Instr::NewObj(RuntimeCtor::DecimalFromI32)]
        );

        let mut g = gen(&types);
        g.emit_decimal(&Dec::from_i64(1 << 40));
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstI64(1 << 40),
                Instr::Conv(NumKind::I8),
                Instr::NewObj(RuntimeCtor::DecimalFromI64),
            ]
        );

        // 12.5 has no integral form; falls back to the bit pattern
        let mut g = gen(&types);
        g.emit_decimal(&Dec::from_parts(125, 0, 0, false, 1));
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstI8(125),
                Instr::Const0,
                Instr::Const0,
                Instr::Const0,
                Instr::Const1,
                Instr::Conv(NumKind::U1),
                Instr::NewObj(RuntimeCtor::DecimalFromBits),
            ]
        );
    }

    #[test]
    fn default_values_by_type() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_default(&SemType::Object);
        g.emit_default(&SemType::I32);
        g.emit_default(&SemType::I64);
        g.emit_default(&SemType::F64);
        g.emit_default(&SemType::Decimal);
        g.emit_default(&SemType::nullable(SemType::I32));
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConstNull,
                Instr::Const0,
                Instr::Const0,
                Instr::Conv(NumKind::I8),
                Instr::ConstF64(0.0),
                Instr::Const0,
                Instr::NewObj(RuntimeCtor::DecimalFromI32),
                Instr::DefaultInit(SemType::nullable(SemType::I32)),
            ]
        );
    }

    #[test]
    fn unsigned_to_float_reinterprets_first() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_convert(&SemType::U32, &SemType::F64, false).unwrap();
        g.emit_convert(&SemType::I32, &SemType::F32, false).unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConvRUn,
                Instr::Conv(NumKind::R8),
                Instr::Conv(NumKind::R4),
            ]
        );
    }

    #[test]
    fn checked_conversions_pick_signedness_family() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_convert(&SemType::I32, &SemType::U8, true).unwrap();
        g.emit_convert(&SemType::U32, &SemType::I8, true).unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::ConvOvf(NumKind::U1),
                Instr::ConvOvfUn(NumKind::I1),
            ]
        );
    }

    #[test]
    fn sixty_four_bit_destinations_widen_by_source_sign() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_convert(&SemType::U32, &SemType::I64, false).unwrap();
        g.emit_convert(&SemType::I32, &SemType::I64, false).unwrap();
        g.emit_convert(&SemType::F64, &SemType::U64, false).unwrap();
        g.emit_convert(&SemType::I32, &SemType::U64, false).unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::Conv(NumKind::U8),
                Instr::Conv(NumKind::I8),
                Instr::Conv(NumKind::U8),
                Instr::Conv(NumKind::I8),
            ]
        );
    }

    #[test]
    fn unrelated_struct_conversion_is_rejected() {
        let mut types = TypeTable::new();
        let a = types.register_struct("Point");
        let b = types.register_struct("Size");
        let mut g = CodeGen::new(&types);
        let err = g
            .emit_convert(&SemType::Struct(a), &SemType::Struct(b), false)
            .unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedConversion { .. }));
    }

    #[test]
    fn conversion_to_bool_is_rejected() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        let err = g.emit_convert(&SemType::I32, &SemType::Bool, false).unwrap_err();
        assert!(matches!(err, CompileError::UnhandledConvert { .. }));
    }

    #[test]
    fn value_to_object_boxes_without_cast() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_convert(&SemType::I32, &SemType::Object, false).unwrap();
        g.emit_convert(&SemType::Object, &SemType::I32, false).unwrap();
        assert_eq!(
            g.instructions().instrs(),
            &[Instr::Box(SemType::I32), Instr::Unbox(SemType::I32)]
        );
    }

    #[test]
    fn negative_array_count_is_an_error() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        let err = g
            .emit_array(&SemType::I32, -3, |_, _| Ok(()))
            .unwrap_err();
        assert_eq!(err, CompileError::NegativeArrayCount { count: -3 });
    }

    #[test]
    fn open_generic_new_is_an_error() {
        let mut types = TypeTable::new();
        let open = types.register_open_generic_class("List`1");
        let closed = types.register_class("Widget", None, true);

        let mut g = CodeGen::new(&types);
        let err = g.emit_new(open).unwrap_err();
        assert!(matches!(err, CompileError::IllegalNewGenericParams { .. }));
        g.emit_new(closed).unwrap();
        assert_eq!(g.instructions().instrs(), &[Instr::New(closed)]);
    }

    #[test]
    fn field_access_distinguishes_statics() {
        let mut types = TypeTable::new();
        let widget = types.register_class("Widget", None, true);
        let count = types.add_field("count", widget, SemType::I32, false);
        let total = types.add_field("total", widget, SemType::I32, true);

        let mut g = CodeGen::new(&types);
        g.emit_field_get(count);
        g.emit_field_get(total);
        g.emit_field_set(count);
        g.emit_field_set(total);
        assert_eq!(
            g.instructions().instrs(),
            &[
                Instr::LoadField(count),
                Instr::LoadStatic(total),
                Instr::StoreField(count),
                Instr::StoreStatic(total),
            ]
        );
    }

    #[test]
    fn element_kind_tables() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_load_element(&SemType::U8);
        g.emit_store_element(&SemType::U8);
        g.emit_load_element(&SemType::Str);
        g.emit_store_element(&SemType::Str);
        assert_eq!(
            g.instructions().instrs(),
            &[
                // loads keep signedness, stores collapse it
                Instr::LoadElem(ElemKind::U1),
                Instr::StoreElem(ElemKind::I1),
                Instr::LoadElem(ElemKind::Ref),
                Instr::StoreElem(ElemKind::Ref),
            ]
        );
    }

    #[test]
    fn null_constant_takes_the_default_path() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        g.emit_constant(&ConstValue::Null, &SemType::Str).unwrap();
        assert_eq!(g.instructions().instrs(), &[Instr::ConstNull]);
    }

    #[test]
    fn temp_slots_are_reused() {
        let types = TypeTable::new();
        let mut g = gen(&types);
        let a = g.get_temp();
        let b = g.get_temp();
        assert_ne!(a.index, b.index);
        assert!(a.var.0 >= VarId::TEMP_BASE);
        g.free_temp(a);
        let c = g.get_temp();
        assert_eq!(c.index, 0);
        g.free_temp(b);
        g.free_temp(c);
    }
}
