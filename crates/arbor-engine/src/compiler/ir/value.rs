//! Constant values and variable identities

use crate::compiler::types::{MethodRef, TypeRef};

/// Canonical 128-bit decimal layout: 96-bit magnitude in three 32-bit
/// words, a sign flag, and a scale byte (number of base-10 fraction
/// digits, 0..=28).
///
/// The backend only needs enough arithmetic to pick the most compact
/// constructor for a constant: an integral test and exact narrowing to
/// the 32- and 64-bit integer ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dec {
    /// Low 32 bits of the magnitude
    pub lo: u32,
    /// Middle 32 bits of the magnitude
    pub mid: u32,
    /// High 32 bits of the magnitude
    pub hi: u32,
    /// Sign flag (true = negative)
    pub negative: bool,
    /// Base-10 scale, 0..=28
    pub scale: u8,
}

impl Dec {
    /// Decimal from a 32-bit integer
    pub fn from_i32(value: i32) -> Self {
        Self::from_i64(value as i64)
    }

    /// Decimal from a 64-bit integer
    pub fn from_i64(value: i64) -> Self {
        let negative = value < 0;
        let mag = value.unsigned_abs();
        Self {
            lo: mag as u32,
            mid: (mag >> 32) as u32,
            hi: 0,
            negative,
            scale: 0,
        }
    }

    /// Decimal from the raw bit-pattern parts
    pub fn from_parts(lo: u32, mid: u32, hi: u32, negative: bool, scale: u8) -> Self {
        debug_assert!(scale <= 28);
        Self {
            lo,
            mid,
            hi,
            negative,
            scale,
        }
    }

    /// The 96-bit magnitude widened to u128
    pub fn magnitude(&self) -> u128 {
        (self.lo as u128) | ((self.mid as u128) << 32) | ((self.hi as u128) << 64)
    }

    /// True when the value has no fractional part
    pub fn is_integral(&self) -> bool {
        self.scale == 0 || self.magnitude() % 10u128.pow(self.scale as u32) == 0
    }

    /// The integral value as i128, if the value is integral
    fn integral_value(&self) -> Option<i128> {
        if !self.is_integral() {
            return None;
        }
        let whole = self.magnitude() / 10u128.pow(self.scale as u32);
        let signed = whole as i128;
        Some(if self.negative { -signed } else { signed })
    }

    /// Exact narrowing to i32, when integral and in range
    pub fn to_i32_exact(&self) -> Option<i32> {
        self.integral_value().and_then(|v| i32::try_from(v).ok())
    }

    /// Exact narrowing to i64, when integral and in range
    pub fn to_i64_exact(&self) -> Option<i64> {
        self.integral_value().and_then(|v| i64::try_from(v).ok())
    }
}

/// A constant value carried by a tree node.
///
/// `Type` and `Method` constants are metadata handles; whether they can
/// actually be emitted depends on token visibility (see
/// `CodeGen::can_emit_constant`).
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    /// The null / default constant
    Null,
    /// Boolean constant
    Bool(bool),
    /// UTF-16 code unit constant
    Char(u16),
    /// Signed 8-bit constant
    I8(i8),
    /// Signed 16-bit constant
    I16(i16),
    /// Signed 32-bit constant
    I32(i32),
    /// Signed 64-bit constant
    I64(i64),
    /// Unsigned 8-bit constant
    U8(u8),
    /// Unsigned 16-bit constant
    U16(u16),
    /// Unsigned 32-bit constant
    U32(u32),
    /// Unsigned 64-bit constant
    U64(u64),
    /// 32-bit float constant
    F32(f32),
    /// 64-bit float constant
    F64(f64),
    /// Decimal constant
    Decimal(Dec),
    /// String constant
    Str(String),
    /// Runtime type handle constant
    Type(TypeRef),
    /// Runtime method handle constant
    Method(MethodRef),
}

/// Opaque reference-identity key for a variable, minted once per
/// variable by the tree producer.
///
/// Ids at and above [`VarId::TEMP_BASE`] are reserved for compiler
/// temporaries; the tree producer must stay below that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(pub u32);

impl VarId {
    /// First id reserved for compiler-minted temporaries
    pub const TEMP_BASE: u32 = 0x8000_0000;
}
