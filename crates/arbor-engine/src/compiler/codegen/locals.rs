//! Local variable slots, lexical scopes, and closure capture
//!
//! Tracks one compilation unit's variables during the single
//! left-to-right pass: slot assignment with reuse-by-count, shadowing
//! through nested scopes, closure capture in a separate index space,
//! and retroactive promotion of a variable to a heap-boxed cell after
//! some of its accesses were already emitted.

use crate::compiler::bytecode::InstructionList;
use crate::compiler::ir::value::VarId;
use rustc_hash::FxHashMap;

/// Storage record for one variable binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    /// Slot index (local space) or closure index (captured space)
    pub index: u16,
    is_boxed: bool,
    in_closure: bool,
}

impl LocalVariable {
    fn new(index: u16, in_closure: bool, is_boxed: bool) -> Self {
        Self {
            index,
            is_boxed,
            in_closure,
        }
    }

    /// Stored in a heap cell rather than directly in the slot
    pub fn is_boxed(&self) -> bool {
        self.is_boxed
    }

    /// Read through the enclosing captured frame, not a local slot
    pub fn in_closure(&self) -> bool {
        self.in_closure
    }

    /// Either boxed or captured: accesses go through a cell
    pub fn in_closure_or_boxed(&self) -> bool {
        self.in_closure || self.is_boxed
    }
}

/// Handle returned when a variable scope opens; the only valid key for
/// closing that specific scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalDefinition {
    /// Assigned slot index
    pub index: u16,
    /// The variable this definition binds
    pub var: VarId,
}

/// Scope arena index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScopeId(u32);

/// Tracks where a binding is defined and what instruction range it
/// covers. Children are re-declarations (shadows) of the same variable
/// nested inside this one's range.
#[derive(Debug)]
struct VariableScope {
    start: usize,
    stop: usize,
    variable: LocalVariable,
    parent: Option<ScopeId>,
    children: Vec<ScopeId>,
}

/// Per-unit variable allocator
#[derive(Debug, Default)]
pub struct LocalVariables {
    scopes: Vec<VariableScope>,
    /// The currently active scope for each visible variable
    active: FxHashMap<VarId, ScopeId>,
    /// Variables captured from enclosing frames; separate index space
    closure_vars: FxHashMap<VarId, LocalVariable>,
    local_count: u16,
    max_local_count: u16,
}

impl LocalVariables {
    /// Create an empty allocator
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for `var` at instruction position `start` and
    /// assign it the next free slot. If `var` already has an active
    /// scope the new one shadows it.
    pub fn define_local(&mut self, var: VarId, start: usize) -> LocalDefinition {
        let variable = LocalVariable::new(self.local_count, false, false);
        self.local_count += 1;
        self.max_local_count = self.max_local_count.max(self.local_count);

        let id = ScopeId(self.scopes.len() as u32);
        let parent = self.active.get(&var).copied();
        self.scopes.push(VariableScope {
            start,
            stop: usize::MAX,
            variable,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.scopes[p.0 as usize].children.push(id);
        }
        self.active.insert(var, id);

        LocalDefinition {
            index: variable.index,
            var,
        }
    }

    /// Close the scope opened by `definition` at position `end`. The
    /// shadowed binding, if any, becomes active again; the slot is
    /// freed for reuse.
    ///
    /// Panics on a stale handle: that is an authoring bug in the tree
    /// producer, not a recoverable condition.
    pub fn undefine_local(&mut self, definition: LocalDefinition, end: usize) {
        let id = *self
            .active
            .get(&definition.var)
            .unwrap_or_else(|| panic!("undefine of stale local {:?}", definition.var));
        let scope = &mut self.scopes[id.0 as usize];
        assert_eq!(
            scope.variable.index, definition.index,
            "undefine of stale local {:?}: active binding has a different slot",
            definition.var
        );
        scope.stop = end;

        match scope.parent {
            Some(p) => {
                self.active.insert(definition.var, p);
            }
            None => {
                self.active.remove(&definition.var);
            }
        }
        self.local_count -= 1;
    }

    /// Promote the currently active binding of `var` to a heap-boxed
    /// cell and rewrite every already-emitted plain access to it.
    ///
    /// Sub-ranges owned by child (shadowing) scopes are skipped
    /// wholesale: the nested binding makes its own slot and boxing
    /// decisions for the same variable.
    pub fn box_local(&mut self, var: VarId, instructions: &mut InstructionList) {
        let id = *self
            .active
            .get(&var)
            .unwrap_or_else(|| panic!("boxing undefined local {:?}", var));

        let (start, stop, slot, children) = {
            let scope = &self.scopes[id.0 as usize];
            debug_assert!(
                !scope.variable.is_boxed && !scope.variable.in_closure,
                "local {:?} already boxed or captured",
                var
            );
            (
                scope.start,
                scope.stop,
                scope.variable.index,
                scope.children.clone(),
            )
        };
        self.scopes[id.0 as usize].variable.is_boxed = true;

        let mut cur_child = 0;
        let mut i = start;
        while i < stop && i < instructions.len() {
            if cur_child < children.len() {
                let child = &self.scopes[children[cur_child].0 as usize];
                if child.start == i {
                    // resume past the child's range; it resolves its
                    // own binding independently
                    i = child.stop;
                    cur_child += 1;
                    continue;
                }
            }
            instructions.switch_to_boxed(slot, i);
            i += 1;
        }
    }

    /// Slot index of the active binding, or `None` if not defined here
    pub fn get_local_index(&self, var: VarId) -> Option<u16> {
        self.active
            .get(&var)
            .map(|id| self.scopes[id.0 as usize].variable.index)
    }

    /// Slot index of the active binding, defining it at position 0
    /// when absent.
    pub fn get_or_define_local(&mut self, var: VarId) -> u16 {
        match self.get_local_index(var) {
            Some(index) => index,
            None => self.define_local(var, 0).index,
        }
    }

    /// The active local binding or the closure record for `var`
    pub fn try_get_local_or_closure(&self, var: VarId) -> Option<LocalVariable> {
        if let Some(id) = self.active.get(&var) {
            return Some(self.scopes[id.0 as usize].variable);
        }
        self.closure_vars.get(&var).copied()
    }

    /// Whether `var` has an active local binding
    pub fn contains_variable(&self, var: VarId) -> bool {
        self.active.contains_key(&var)
    }

    /// Record `var` as captured from an enclosing frame; closure
    /// variables number independently of local slots.
    pub fn add_closure_variable(&mut self, var: VarId) -> LocalVariable {
        let result = LocalVariable::new(self.closure_vars.len() as u16, true, false);
        let prev = self.closure_vars.insert(var, result);
        debug_assert!(prev.is_none(), "closure variable {:?} added twice", var);
        result
    }

    /// Variables captured from enclosing frames
    pub fn closure_variables(&self) -> &FxHashMap<VarId, LocalVariable> {
        &self.closure_vars
    }

    /// Snapshot of the variables visible in the current scope
    pub fn copy_locals(&self) -> FxHashMap<VarId, LocalVariable> {
        self.active
            .iter()
            .map(|(&var, &id)| (var, self.scopes[id.0 as usize].variable))
            .collect()
    }

    /// High-water slot count for the unit (frame size)
    pub fn local_count(&self) -> u16 {
        self.max_local_count
    }
}
