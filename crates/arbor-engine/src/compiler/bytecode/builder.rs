//! Instruction stream builder
//!
//! `InstructionList` owns the instruction arena for one compilation
//! unit. Emission is append-only; the single retroactive operation is
//! `switch_to_boxed`, used by the scope allocator when a variable is
//! promoted to a heap cell after some of its accesses were already
//! emitted.

use super::constants::ConstantPool;
use super::opcode::{Instr, Label};

/// Index-addressable instruction stream plus label table and pool
#[derive(Debug, Default)]
pub struct InstructionList {
    instrs: Vec<Instr>,
    /// Label id to instruction index; `None` until marked
    labels: Vec<Option<usize>>,
    pool: ConstantPool,
}

impl InstructionList {
    /// Create an empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, returning its position
    pub fn emit(&mut self, instr: Instr) -> usize {
        let pos = self.instrs.len();
        self.instrs.push(instr);
        pos
    }

    /// Current stream length (the position the next emit will take)
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Whether the stream is empty
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// The instruction records
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Allocate a fresh, unmarked label
    pub fn define_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(None);
        label
    }

    /// Mark a label at the current stream position.
    ///
    /// Marking the same label twice is a programming error.
    pub fn mark_label(&mut self, label: Label) {
        let slot = &mut self.labels[label.0 as usize];
        assert!(slot.is_none(), "label {:?} marked twice", label);
        *slot = Some(self.instrs.len());
    }

    /// Resolved target of a label, if marked
    pub fn label_target(&self, label: Label) -> Option<usize> {
        self.labels[label.0 as usize]
    }

    /// Rewrite a plain local access at `pos` into the boxed form when
    /// it references `slot`. Instructions referencing other slots, or
    /// not referencing locals at all, are left untouched; already-boxed
    /// accesses stay boxed.
    pub fn switch_to_boxed(&mut self, slot: u16, pos: usize) {
        match self.instrs[pos] {
            Instr::LoadLocal(s) if s == slot => self.instrs[pos] = Instr::LoadLocalBoxed(slot),
            Instr::StoreLocal(s) if s == slot => self.instrs[pos] = Instr::StoreLocalBoxed(slot),
            _ => {}
        }
    }

    /// Constant pool
    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// Constant pool, mutable
    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    /// Split into parts for the compiled unit
    pub(crate) fn into_parts(self) -> (Vec<Instr>, Vec<Option<usize>>, ConstantPool) {
        (self.instrs, self.labels, self.pool)
    }
}
