//! Expression-to-bytecode lowering
//!
//! `CodeGen` drives one compilation unit: it owns the instruction
//! stream, the variable allocator and the temp-local free list, and
//! exposes the emitters the tree walk calls into. The walk itself is
//! minimal (constants, variable reads, unary operations); richer node
//! kinds are lowered by external collaborators before reaching this
//! core.

pub mod locals;

mod emit;
mod unary;

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::{ConstantPool, Instr, InstructionList, Label};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::node::{Expr, ResultUse};
use crate::compiler::ir::value::VarId;
use crate::compiler::types::TypeTable;

use self::locals::{LocalDefinition, LocalVariable, LocalVariables};

/// Hoisted-variable record for a unit whose variables live in a
/// closure frame. `vars` maps each hoisted variable to its index in
/// the frame; `self_var` is the variable holding the frame reference
/// itself.
#[derive(Debug, Clone)]
pub struct HoistedLocals {
    /// Variable bound to the live frame reference
    pub self_var: VarId,
    /// Hoisted variables and their frame indices
    pub vars: Vec<(VarId, u16)>,
}

/// Bytecode generator for a single compilation unit
pub struct CodeGen<'t> {
    types: &'t TypeTable,
    instructions: InstructionList,
    locals: LocalVariables,
    /// Released temp definitions available for reuse. Temp scopes stay
    /// open for the whole unit so freed temps keep their slots.
    free_temps: Vec<LocalDefinition>,
    next_temp: u32,
    handler_depth: u32,
    hoisted: Option<HoistedLocals>,
}

impl<'t> CodeGen<'t> {
    /// Create a generator for one unit against the given type table
    pub fn new(types: &'t TypeTable) -> Self {
        Self {
            types,
            instructions: InstructionList::new(),
            locals: LocalVariables::new(),
            free_temps: Vec::new(),
            next_temp: 0,
            handler_depth: 0,
            hoisted: None,
        }
    }

    /// The type table this unit compiles against
    pub fn types(&self) -> &'t TypeTable {
        self.types
    }

    /// The instruction stream built so far
    pub fn instructions(&self) -> &InstructionList {
        &self.instructions
    }

    /// Record that this unit's variables live in a closure frame.
    /// Quoting consults this even when the quoted sub-tree references
    /// none of the hoisted variables.
    pub fn set_hoisted_locals(&mut self, hoisted: HoistedLocals) {
        self.hoisted = Some(hoisted);
    }

    pub(crate) fn emit(&mut self, instr: Instr) -> usize {
        self.instructions.emit(instr)
    }

    pub(crate) fn define_label(&mut self) -> Label {
        self.instructions.define_label()
    }

    pub(crate) fn mark_label(&mut self, label: Label) {
        self.instructions.mark_label(label);
    }

    // ===== Variables =====

    /// Open a local binding for `var` at the current stream position
    pub fn define_local(&mut self, var: VarId) -> LocalDefinition {
        let start = self.instructions.len();
        self.locals.define_local(var, start)
    }

    /// Close the binding opened by `definition` at the current position
    pub fn undefine_local(&mut self, definition: LocalDefinition) {
        let end = self.instructions.len();
        self.locals.undefine_local(definition, end);
    }

    /// Promote `var`'s active binding to a heap cell, rewriting its
    /// already-emitted accesses
    pub fn box_local(&mut self, var: VarId) {
        self.locals.box_local(var, &mut self.instructions);
    }

    /// Record `var` as captured from an enclosing frame
    pub fn add_closure_variable(&mut self, var: VarId) -> LocalVariable {
        self.locals.add_closure_variable(var)
    }

    /// The variable allocator
    pub fn locals(&self) -> &LocalVariables {
        &self.locals
    }

    /// Emit a read of `var`, choosing the captured, boxed or plain
    /// form from the allocator's answer.
    ///
    /// Panics when `var` has no binding: the tree producer referenced
    /// a variable it never declared.
    pub fn emit_load_var(&mut self, var: VarId) {
        let local = self
            .locals
            .try_get_local_or_closure(var)
            .unwrap_or_else(|| panic!("read of undefined variable {var:?}"));
        if local.in_closure() {
            self.emit(Instr::LoadCaptured(local.index));
        } else if local.is_boxed() {
            self.emit(Instr::LoadLocalBoxed(local.index));
        } else {
            self.emit(Instr::LoadLocal(local.index));
        }
    }

    /// Emit a write to `var`; same selection as [`Self::emit_load_var`]
    pub fn emit_store_var(&mut self, var: VarId) {
        let local = self
            .locals
            .try_get_local_or_closure(var)
            .unwrap_or_else(|| panic!("write to undefined variable {var:?}"));
        if local.in_closure() {
            self.emit(Instr::StoreCaptured(local.index));
        } else if local.is_boxed() {
            self.emit(Instr::StoreLocalBoxed(local.index));
        } else {
            self.emit(Instr::StoreLocal(local.index));
        }
    }

    // ===== Temporaries =====

    /// Borrow a temp slot, reusing a released one when available.
    /// Temps use variable ids from the reserved range so they can
    /// never collide with tree-producer variables.
    pub(crate) fn get_temp(&mut self) -> LocalDefinition {
        if let Some(def) = self.free_temps.pop() {
            return def;
        }
        let var = VarId(VarId::TEMP_BASE + self.next_temp);
        self.next_temp += 1;
        let start = self.instructions.len();
        self.locals.define_local(var, start)
    }

    /// Release a temp slot for reuse
    pub(crate) fn free_temp(&mut self, def: LocalDefinition) {
        self.free_temps.push(def);
    }

    // ===== Exception handlers =====

    /// Note entry into an exception handler's body
    pub fn enter_handler(&mut self) {
        self.handler_depth += 1;
    }

    /// Note exit from an exception handler's body
    pub fn exit_handler(&mut self) {
        debug_assert!(self.handler_depth > 0, "unbalanced handler exit");
        self.handler_depth -= 1;
    }

    pub(crate) fn check_rethrow(&self) -> CompileResult<()> {
        if self.handler_depth == 0 {
            return Err(CompileError::RethrowOutsideHandler);
        }
        Ok(())
    }

    // ===== Tree walk =====

    /// Lower `expr`, leaving a value on the stack or discarding it per
    /// `usage`.
    pub fn emit_expr(&mut self, expr: &Expr, usage: ResultUse) -> CompileResult<()> {
        match expr {
            Expr::Constant(value, ty) => {
                // A constant used for effect emits nothing
                if usage == ResultUse::Value {
                    self.emit_constant(value, ty)?;
                }
            }
            Expr::Local(var, _) => {
                // A read used for effect emits nothing
                if usage == ResultUse::Value {
                    self.emit_load_var(*var);
                }
            }
            Expr::Unary(node) => self.emit_unary(node, usage)?,
        }
        Ok(())
    }

    pub(crate) fn emit_expr_value(&mut self, expr: &Expr) -> CompileResult<()> {
        self.emit_expr(expr, ResultUse::Value)
    }

    /// Seal the unit and hand back its product
    pub fn finish(self) -> CompiledUnit {
        let local_map = self.locals.copy_locals();
        let closure_map = self.locals.closure_variables().clone();
        let local_count = self.locals.local_count();
        let (instrs, labels, pool) = self.instructions.into_parts();
        CompiledUnit {
            instrs,
            labels,
            pool,
            local_count,
            local_map,
            closure_map,
        }
    }
}

/// The sealed product of one compilation unit
#[derive(Debug)]
pub struct CompiledUnit {
    instrs: Vec<Instr>,
    labels: Vec<Option<usize>>,
    pool: ConstantPool,
    local_count: u16,
    local_map: FxHashMap<VarId, LocalVariable>,
    closure_map: FxHashMap<VarId, LocalVariable>,
}

impl CompiledUnit {
    /// The instruction records
    pub fn instrs(&self) -> &[Instr] {
        &self.instrs
    }

    /// Resolved target of `label`.
    ///
    /// Panics when the label was never marked; an unmarked label in a
    /// sealed unit is an emitter bug.
    pub fn label_target(&self, label: Label) -> usize {
        self.labels[label.0 as usize]
            .unwrap_or_else(|| panic!("label {label:?} never marked"))
    }

    /// The constant pool
    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    /// Frame size in slots (high-water mark)
    pub fn local_count(&self) -> u16 {
        self.local_count
    }

    /// Slot record of a variable still in scope when the unit was
    /// sealed, or its closure record
    pub fn local(&self, var: VarId) -> Option<LocalVariable> {
        self.local_map
            .get(&var)
            .or_else(|| self.closure_map.get(&var))
            .copied()
    }
}
