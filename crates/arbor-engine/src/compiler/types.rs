//! Semantic type descriptors and the type table
//!
//! `SemType` classifies every value the backend can see; it drives each
//! branch of the conversion and lowering logic. Named kinds (classes,
//! interfaces, structs, enums, delegates) are handles into a `TypeTable`
//! arena, so type identity is handle identity rather than structural or
//! name equality. The table also mints method and field handles, which
//! is how the emitter refers to metadata without owning any reflection
//! machinery of its own.

use rustc_hash::FxHashMap;

/// Numeric kind for conversion opcodes, named by width in bytes
/// (`I4` = signed 32-bit, `U2` = unsigned 16-bit, `R8` = 64-bit float).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumKind {
    /// Signed 8-bit
    I1,
    /// Unsigned 8-bit
    U1,
    /// Signed 16-bit
    I2,
    /// Unsigned 16-bit
    U2,
    /// Signed 32-bit
    I4,
    /// Unsigned 32-bit
    U4,
    /// Signed 64-bit
    I8,
    /// Unsigned 64-bit
    U8,
    /// 32-bit float
    R4,
    /// 64-bit float
    R8,
}

/// Handle to a named type definition in the [`TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef(pub u32);

/// Handle to a method definition in the [`TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef(pub u32);

/// Handle to a field definition in the [`TypeTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef(pub u32);

/// Semantic classification of a value's type.
///
/// Two descriptors are compatible for direct stack transfer only if
/// they are identical (derived equality; named kinds compare by
/// handle).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SemType {
    /// The empty type; no value. Fatal on either side of a conversion.
    Void,
    /// Boolean (lives on the stack as a 32-bit integer)
    Bool,
    /// UTF-16 code unit (unsigned 16-bit on the stack)
    Char,
    /// Signed 8-bit integer
    I8,
    /// Signed 16-bit integer
    I16,
    /// Signed 32-bit integer
    I32,
    /// Signed 64-bit integer
    I64,
    /// Unsigned 8-bit integer
    U8,
    /// Unsigned 16-bit integer
    U16,
    /// Unsigned 32-bit integer
    U32,
    /// Unsigned 64-bit integer
    U64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 128-bit decimal
    Decimal,
    /// Immutable string reference
    Str,
    /// Nullable wrapper over a value type
    Nullable(Box<SemType>),
    /// User-defined value struct
    Struct(TypeRef),
    /// User-defined enum with its underlying numeric kind
    Enum(TypeRef, NumKind),
    /// The root reference type
    Object,
    /// The abstract base of all enums
    EnumBase,
    /// The abstract base of all value types
    ValueTypeBase,
    /// Interface reference
    Interface(TypeRef),
    /// Class reference
    Class(TypeRef),
    /// Delegate reference (signature lives in the table)
    Delegate(TypeRef),
    /// Single-dimensional array of an element type
    Array(Box<SemType>),
}

impl SemType {
    /// Wrap a value type in a nullable
    pub fn nullable(inner: SemType) -> Self {
        SemType::Nullable(Box::new(inner))
    }

    /// Array of an element type
    pub fn array(elem: SemType) -> Self {
        SemType::Array(Box::new(elem))
    }

    /// Is this a nullable wrapper?
    pub fn is_nullable(&self) -> bool {
        matches!(self, SemType::Nullable(_))
    }

    /// Strip one nullable wrapper, if present
    pub fn non_nullable(&self) -> &SemType {
        match self {
            SemType::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Value types live directly on the stack / in slots; everything
    /// else is a reference.
    pub fn is_value_type(&self) -> bool {
        matches!(
            self,
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
                | SemType::Nullable(_)
                | SemType::Struct(_)
                | SemType::Enum(..)
        )
    }

    /// Unsigned integer kinds (char counts: it is an unsigned 16-bit
    /// code unit for conversion purposes).
    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            SemType::U8 | SemType::U16 | SemType::U32 | SemType::U64 | SemType::Char
        ) || matches!(self, SemType::Enum(_, k) if matches!(k, NumKind::U1 | NumKind::U2 | NumKind::U4 | NumKind::U8))
    }

    /// Floating-point kinds
    pub fn is_floating_point(&self) -> bool {
        matches!(self, SemType::F32 | SemType::F64)
    }

    /// Primitive-convertible kinds: the numeric primitives, bool, char
    /// and enums. Decimal is deliberately excluded; decimal
    /// conversions are user-defined operators, not primitive
    /// conversions.
    pub fn is_convertible(&self) -> bool {
        matches!(
            self,
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
                | SemType::Enum(..)
        )
    }

    /// Non-nullable integer kinds (excludes bool, char, enums, floats)
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SemType::I8
                | SemType::I16
                | SemType::I32
                | SemType::I64
                | SemType::U8
                | SemType::U16
                | SemType::U32
                | SemType::U64
        )
    }

    /// Is this an interface reference?
    pub fn is_interface(&self) -> bool {
        matches!(self, SemType::Interface(_))
    }

    /// Destination numeric kind for the conversion switch. Enums use
    /// their underlying kind; bool and decimal have none.
    pub fn num_kind(&self) -> Option<NumKind> {
        match self {
            SemType::I8 => Some(NumKind::I1),
            SemType::U8 => Some(NumKind::U1),
            SemType::I16 => Some(NumKind::I2),
            SemType::U16 | SemType::Char => Some(NumKind::U2),
            SemType::I32 => Some(NumKind::I4),
            SemType::U32 => Some(NumKind::U4),
            SemType::I64 => Some(NumKind::I8),
            SemType::U64 => Some(NumKind::U8),
            SemType::F32 => Some(NumKind::R4),
            SemType::F64 => Some(NumKind::R8),
            SemType::Enum(_, k) => Some(*k),
            _ => None,
        }
    }
}

/// Kind payload of a named type definition
#[derive(Debug, Clone)]
enum TypeDefKind {
    Class { base: Option<TypeRef> },
    Interface,
    Struct,
    Enum { underlying: NumKind },
    Delegate { params: Vec<SemType>, ret: SemType },
}

#[derive(Debug, Clone)]
struct TypeDef {
    name: String,
    kind: TypeDefKind,
    /// A type must be visibly nameable for a metadata-token load
    visible: bool,
    /// Generic definition with unbound parameters; illegal `new` target
    open_generic: bool,
}

#[derive(Debug, Clone)]
struct MethodDef {
    name: String,
    declaring: Option<TypeRef>,
    #[allow(dead_code)]
    params: Vec<SemType>,
    #[allow(dead_code)]
    ret: SemType,
    /// Dynamically-generated methods cannot be token-loaded
    synthetic: bool,
}

#[derive(Debug, Clone)]
struct FieldDef {
    name: String,
    #[allow(dead_code)]
    declaring: TypeRef,
    #[allow(dead_code)]
    ty: SemType,
    is_static: bool,
}

/// Arena of named type, method, and field definitions.
///
/// Handles minted here are the identity keys the rest of the backend
/// uses; the table is append-only.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<TypeDef>,
    methods: Vec<MethodDef>,
    fields: Vec<FieldDef>,
    by_name: FxHashMap<String, TypeRef>,
}

impl TypeTable {
    /// The reflection class for runtime type handles
    pub const TYPE: TypeRef = TypeRef(0);
    /// The reflection class for runtime method handles
    pub const METHOD_BASE: TypeRef = TypeRef(1);
    /// The expression-tree reference type (quote constants)
    pub const EXPR: TypeRef = TypeRef(2);

    /// Create a table with the well-known reflection and expression
    /// classes pre-registered.
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            by_name: FxHashMap::default(),
        };
        let t = table.register_class("Type", None, true);
        debug_assert_eq!(t, Self::TYPE);
        let m = table.register_class("MethodBase", None, true);
        debug_assert_eq!(m, Self::METHOD_BASE);
        let e = table.register_class("Expr", None, true);
        debug_assert_eq!(e, Self::EXPR);
        table
    }

    fn push(&mut self, def: TypeDef) -> TypeRef {
        let r = TypeRef(self.types.len() as u32);
        self.by_name.insert(def.name.clone(), r);
        self.types.push(def);
        r
    }

    /// Register a class with an optional base class
    pub fn register_class(&mut self, name: &str, base: Option<TypeRef>, visible: bool) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Class { base },
            visible,
            open_generic: false,
        })
    }

    /// Register a generic class definition with unbound parameters
    pub fn register_open_generic_class(&mut self, name: &str) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Class { base: None },
            visible: true,
            open_generic: true,
        })
    }

    /// Register an interface
    pub fn register_interface(&mut self, name: &str) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Interface,
            visible: true,
            open_generic: false,
        })
    }

    /// Register a user value struct
    pub fn register_struct(&mut self, name: &str) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Struct,
            visible: true,
            open_generic: false,
        })
    }

    /// Register an enum with its underlying numeric kind
    pub fn register_enum(&mut self, name: &str, underlying: NumKind) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Enum { underlying },
            visible: true,
            open_generic: false,
        })
    }

    /// Register a delegate type with its signature
    pub fn register_delegate(&mut self, name: &str, params: Vec<SemType>, ret: SemType) -> TypeRef {
        self.push(TypeDef {
            name: name.to_string(),
            kind: TypeDefKind::Delegate { params, ret },
            visible: true,
            open_generic: false,
        })
    }

    /// Mint a method handle
    pub fn add_method(
        &mut self,
        name: &str,
        declaring: Option<TypeRef>,
        params: Vec<SemType>,
        ret: SemType,
    ) -> MethodRef {
        let r = MethodRef(self.methods.len() as u32);
        self.methods.push(MethodDef {
            name: name.to_string(),
            declaring,
            params,
            ret,
            synthetic: false,
        });
        r
    }

    /// Mint a handle for a dynamically-generated method (no token)
    pub fn add_synthetic_method(
        &mut self,
        name: &str,
        params: Vec<SemType>,
        ret: SemType,
    ) -> MethodRef {
        let r = MethodRef(self.methods.len() as u32);
        self.methods.push(MethodDef {
            name: name.to_string(),
            declaring: None,
            params,
            ret,
            synthetic: true,
        });
        r
    }

    /// Mint a field handle
    pub fn add_field(
        &mut self,
        name: &str,
        declaring: TypeRef,
        ty: SemType,
        is_static: bool,
    ) -> FieldRef {
        let r = FieldRef(self.fields.len() as u32);
        self.fields.push(FieldDef {
            name: name.to_string(),
            declaring,
            ty,
            is_static,
        });
        r
    }

    /// Parameter type of a method
    pub fn method_param(&self, m: MethodRef, index: usize) -> &SemType {
        &self.methods[m.0 as usize].params[index]
    }

    /// Number of parameters of a method
    pub fn method_param_count(&self, m: MethodRef) -> usize {
        self.methods[m.0 as usize].params.len()
    }

    /// Return type of a method
    pub fn method_return(&self, m: MethodRef) -> &SemType {
        &self.methods[m.0 as usize].ret
    }

    /// Method name (diagnostics, disassembly)
    pub fn method_name(&self, m: MethodRef) -> &str {
        &self.methods[m.0 as usize].name
    }

    /// Declaring type of a method, if any
    pub fn method_declaring(&self, m: MethodRef) -> Option<TypeRef> {
        self.methods[m.0 as usize].declaring
    }

    /// Whether a field is static
    pub fn field_is_static(&self, f: FieldRef) -> bool {
        self.fields[f.0 as usize].is_static
    }

    /// Field name (diagnostics, disassembly)
    pub fn field_name(&self, f: FieldRef) -> &str {
        &self.fields[f.0 as usize].name
    }

    /// Whether the type has unbound generic parameters
    pub fn is_open_generic(&self, t: TypeRef) -> bool {
        self.types[t.0 as usize].open_generic
    }

    /// A type token may be loaded only if the type is visibly nameable
    /// at the point of execution.
    pub fn should_load_token(&self, t: TypeRef) -> bool {
        self.types[t.0 as usize].visible
    }

    /// A method token may be loaded unless the method is synthetic or
    /// its declaring type cannot itself be token-loaded.
    pub fn should_load_method_token(&self, m: MethodRef) -> bool {
        let def = &self.methods[m.0 as usize];
        if def.synthetic {
            return false;
        }
        match def.declaring {
            Some(d) => self.should_load_token(d),
            None => true,
        }
    }

    /// Whether the declaring type of a method is an open generic, which
    /// changes the handle-resolution helper the emitter calls.
    pub fn method_declaring_is_generic(&self, m: MethodRef) -> bool {
        match self.methods[m.0 as usize].declaring {
            Some(d) => self.types[d.0 as usize].open_generic,
            None => false,
        }
    }

    /// `target.is_assignable_from(source)`: identity, boxing to
    /// `Object`/`ValueType`/`Enum`, or a class base-chain walk.
    pub fn is_assignable_from(&self, target: &SemType, source: &SemType) -> bool {
        if target == source {
            return true;
        }
        match target {
            SemType::Object => true,
            SemType::ValueTypeBase => source.is_value_type(),
            SemType::EnumBase => matches!(source, SemType::Enum(..)),
            SemType::Class(t) => {
                let mut cur = match source {
                    SemType::Class(s) => Some(*s),
                    _ => return false,
                };
                while let Some(c) = cur {
                    if c == *t {
                        return true;
                    }
                    cur = match &self.types[c.0 as usize].kind {
                        TypeDefKind::Class { base } => *base,
                        _ => None,
                    };
                }
                false
            }
            _ => false,
        }
    }

    /// Explicit variant delegate conversion: same arity, and each
    /// parameter/return pair either identical or both reference types.
    pub fn is_legal_variant_delegate_conversion(&self, from: &SemType, to: &SemType) -> bool {
        let (f, t) = match (from, to) {
            (SemType::Delegate(f), SemType::Delegate(t)) => (*f, *t),
            _ => return false,
        };
        if f == t {
            return false;
        }
        let (fp, fr) = match &self.types[f.0 as usize].kind {
            TypeDefKind::Delegate { params, ret } => (params.clone(), ret.clone()),
            _ => return false,
        };
        let (tp, tr) = match &self.types[t.0 as usize].kind {
            TypeDefKind::Delegate { params, ret } => (params.clone(), ret.clone()),
            _ => return false,
        };
        if fp.len() != tp.len() {
            return false;
        }
        let variant_ok =
            |a: &SemType, b: &SemType| a == b || (!a.is_value_type() && !b.is_value_type());
        fp.iter().zip(tp.iter()).all(|(a, b)| variant_ok(a, b)) && variant_ok(&fr, &tr)
    }

    /// Render a type for diagnostics
    pub fn display(&self, ty: &SemType) -> String {
        match ty {
            SemType::Void => "void".to_string(),
            SemType::Bool => "bool".to_string(),
            SemType::Char => "char".to_string(),
            SemType::I8 => "i8".to_string(),
            SemType::I16 => "i16".to_string(),
            SemType::I32 => "i32".to_string(),
            SemType::I64 => "i64".to_string(),
            SemType::U8 => "u8".to_string(),
            SemType::U16 => "u16".to_string(),
            SemType::U32 => "u32".to_string(),
            SemType::U64 => "u64".to_string(),
            SemType::F32 => "f32".to_string(),
            SemType::F64 => "f64".to_string(),
            SemType::Decimal => "decimal".to_string(),
            SemType::Str => "string".to_string(),
            SemType::Object => "object".to_string(),
            SemType::EnumBase => "Enum".to_string(),
            SemType::ValueTypeBase => "ValueType".to_string(),
            SemType::Nullable(inner) => format!("{}?", self.display(inner)),
            SemType::Array(elem) => format!("{}[]", self.display(elem)),
            SemType::Struct(t)
            | SemType::Enum(t, _)
            | SemType::Interface(t)
            | SemType::Class(t)
            | SemType::Delegate(t) => self.types[t.0 as usize].name.clone(),
        }
    }

    /// Look up a previously registered type by name
    pub fn lookup(&self, name: &str) -> Option<TypeRef> {
        self.by_name.get(name).copied()
    }

    /// Type name by handle
    pub fn name(&self, t: TypeRef) -> &str {
        &self.types[t.0 as usize].name
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}
