//! Bytecode layer: instruction records, stream builder, constant pool

pub mod builder;
pub mod constants;
pub mod opcode;

pub use builder::InstructionList;
pub use constants::{ConstantPool, PoolObject};
pub use opcode::{ElemKind, Instr, Label, Token};
