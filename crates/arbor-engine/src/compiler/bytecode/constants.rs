//! Constant pool for compiled units

use crate::compiler::ir::node::Expr;
use crate::compiler::ir::value::VarId;
use rustc_hash::FxHashMap;

/// A non-primitive pooled constant, pushed by `LoadConst`.
#[derive(Debug, Clone)]
pub enum PoolObject {
    /// A quoted expression sub-tree, materialized as a runtime value
    Expr(Expr),
    /// Hoisted-state description: variable identity to closure index,
    /// consumed by the quote rehydration helper
    Hoisted(Vec<(VarId, u16)>),
}

/// Constant pool containing string and object constants
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// String constants (`ConstStr` operand space)
    strings: Vec<String>,
    /// Object constants (`LoadConst` operand space)
    objects: Vec<PoolObject>,
    interned: FxHashMap<String, u32>,
}

impl ConstantPool {
    /// Create a new empty constant pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string constant and return its index; identical strings
    /// share one entry.
    pub fn add_string(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.interned.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        self.strings.push(s.to_string());
        self.interned.insert(s.to_string(), index);
        index
    }

    /// Add an object constant and return its index
    pub fn add_object(&mut self, obj: PoolObject) -> u32 {
        let index = self.objects.len() as u32;
        self.objects.push(obj);
        index
    }

    /// Get a string constant by index
    pub fn get_string(&self, index: u32) -> Option<&str> {
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Get an object constant by index
    pub fn get_object(&self, index: u32) -> Option<&PoolObject> {
        self.objects.get(index as usize)
    }

    /// Number of string constants
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// Number of object constants
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }
}
