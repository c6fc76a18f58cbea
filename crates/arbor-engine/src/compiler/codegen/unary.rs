//! Unary operator lowering
//!
//! Conversions, negation and complement, boolean tests, type tests,
//! throw/rethrow and quoting. Operators over nullable operands are
//! lifted: the value is unwrapped, the non-nullable operator applied,
//! and the result re-wrapped, with the empty operand short-circuiting
//! to the empty result.

use crate::compiler::bytecode::{Instr, PoolObject};
use crate::compiler::error::{CompileError, CompileResult};
use crate::compiler::ir::node::{Expr, ResultUse, UnaryExpr, UnaryOp};
use crate::compiler::runtime::RuntimeFn;
use crate::compiler::types::{NumKind, SemType, TypeTable};

use super::CodeGen;

fn operand(node: &UnaryExpr) -> &Expr {
    node.operand
        .as_deref()
        .unwrap_or_else(|| panic!("unary {:?} without an operand", node.op))
}

impl<'t> CodeGen<'t> {
    /// Lower a unary node per `usage`
    pub fn emit_unary(&mut self, node: &UnaryExpr, usage: ResultUse) -> CompileResult<()> {
        match node.op {
            UnaryOp::Quote => {
                self.emit_quote(node)?;
                self.discard_if_void(usage, &node.ty);
            }
            UnaryOp::Throw => self.emit_throw(node, usage)?,
            UnaryOp::Unbox => {
                self.emit_expr_value(operand(node))?;
                self.emit(Instr::Unbox(node.ty.clone()));
                self.discard_if_void(usage, &node.ty);
            }
            UnaryOp::Convert | UnaryOp::ConvertChecked => self.emit_convert_expr(node, usage)?,
            _ => {
                self.emit_unary_value(node)?;
                self.discard_if_void(usage, &node.ty);
            }
        }
        Ok(())
    }

    fn discard_if_void(&mut self, usage: ResultUse, ty: &SemType) {
        if usage == ResultUse::Void && *ty != SemType::Void {
            self.emit(Instr::Pop);
        }
    }

    fn emit_unary_value(&mut self, node: &UnaryExpr) -> CompileResult<()> {
        if node.method.is_some() {
            return self.emit_unary_method(node);
        }
        let operand = operand(node);
        let operand_ty = operand.ty().clone();

        // Checked negation of an integer has no dedicated instruction;
        // it is a checked subtraction from zero, lifted when the
        // operand is nullable
        if node.op == UnaryOp::NegateChecked && operand_ty.non_nullable().is_integer() {
            if operand_ty.is_nullable() {
                return self.emit_lifted_checked_negate(operand, &operand_ty, &node.ty);
            }
            self.emit_expr_value(operand)?;
            let loc = self.get_temp();
            self.emit(Instr::StoreLocal(loc.index));
            self.emit_int(0);
            self.emit_convert(&SemType::I32, &operand_ty, false)?;
            self.emit(Instr::LoadLocal(loc.index));
            self.free_temp(loc);
            if operand_ty.is_unsigned() {
                self.emit(Instr::SubOvfUn);
            } else {
                self.emit(Instr::SubOvf);
            }
            self.emit_convert_arithmetic_result(true, &node.ty);
            return Ok(());
        }

        self.emit_expr_value(operand)?;
        self.emit_unary_operator(node.op, &operand_ty, &node.ty)
    }

    // The checked subtraction from zero, guarded by the usual
    // has-value test so an empty operand stays empty
    fn emit_lifted_checked_negate(
        &mut self,
        operand: &Expr,
        operand_ty: &SemType,
        result_ty: &SemType,
    ) -> CompileResult<()> {
        let inner = operand_ty.non_nullable().clone();
        self.emit_expr_value(operand)?;
        let lab_null = self.define_label();
        let lab_end = self.define_label();
        let loc = self.get_temp();
        self.emit(Instr::StoreLocal(loc.index));
        self.emit(Instr::LoadLocal(loc.index));
        self.emit(Instr::NullableHasValue);
        self.emit(Instr::BranchIfFalse(lab_null));
        self.emit_int(0);
        self.emit_convert(&SemType::I32, &inner, false)?;
        self.emit(Instr::LoadLocal(loc.index));
        self.emit(Instr::NullableValueOrDefault);
        if inner.is_unsigned() {
            self.emit(Instr::SubOvfUn);
        } else {
            self.emit(Instr::SubOvf);
        }
        self.emit_convert_arithmetic_result(true, &inner);
        self.emit(Instr::WrapNullable(result_ty.clone()));
        self.emit(Instr::StoreLocal(loc.index));
        self.emit(Instr::Branch(lab_end));
        self.mark_label(lab_null);
        self.emit(Instr::DefaultInit(result_ty.clone()));
        self.emit(Instr::StoreLocal(loc.index));
        self.mark_label(lab_end);
        self.emit(Instr::LoadLocal(loc.index));
        self.free_temp(loc);
        Ok(())
    }

    /// Apply `op` to the value on the stack
    pub fn emit_unary_operator(
        &mut self,
        op: UnaryOp,
        operand_ty: &SemType,
        result_ty: &SemType,
    ) -> CompileResult<()> {
        if operand_ty.is_nullable() {
            return self.emit_lifted_unary_operator(op, operand_ty, result_ty);
        }
        match op {
            UnaryOp::Not => {
                if *operand_ty == SemType::Bool {
                    // booleans are integers on the stack: not == (x == 0)
                    self.emit(Instr::Const0);
                    self.emit(Instr::Ceq);
                } else {
                    self.emit(Instr::BitNot);
                }
            }
            UnaryOp::OnesComplement => {
                self.emit(Instr::BitNot);
            }
            UnaryOp::IsFalse => {
                self.emit(Instr::Const0);
                self.emit(Instr::Ceq);
                // no arithmetic narrowing on a comparison result
                return Ok(());
            }
            UnaryOp::IsTrue => {
                self.emit(Instr::Const1);
                self.emit(Instr::Ceq);
                return Ok(());
            }
            UnaryOp::UnaryPlus => {
                self.emit(Instr::Nop);
            }
            UnaryOp::Negate | UnaryOp::NegateChecked => {
                self.emit(Instr::Neg);
            }
            UnaryOp::Increment => {
                self.emit_constant_one(result_ty);
                self.emit(Instr::Add);
            }
            UnaryOp::Decrement => {
                self.emit_constant_one(result_ty);
                self.emit(Instr::Sub);
            }
            UnaryOp::TypeAs => {
                if operand_ty.is_value_type() {
                    self.emit(Instr::Box(operand_ty.clone()));
                }
                self.emit(Instr::IsInst(result_ty.clone()));
                if result_ty.is_nullable() {
                    self.emit(Instr::Unbox(result_ty.clone()));
                }
                return Ok(());
            }
            UnaryOp::ArrayLength => {
                if !matches!(operand_ty, SemType::Array(_)) {
                    return Err(CompileError::ArrayTypeRequired {
                        ty: self.types().display(operand_ty),
                    });
                }
                self.emit(Instr::ArrayLen);
                return Ok(());
            }
            _ => {
                return Err(CompileError::UnhandledUnary {
                    op: format!("{op:?}"),
                });
            }
        }
        self.emit_convert_arithmetic_result(op == UnaryOp::NegateChecked, result_ty);
        Ok(())
    }

    fn emit_lifted_unary_operator(
        &mut self,
        op: UnaryOp,
        operand_ty: &SemType,
        result_ty: &SemType,
    ) -> CompileResult<()> {
        match op {
            // Three-valued boolean not: the empty operand stays empty,
            // so the temp doubles as the result
            UnaryOp::Not if *operand_ty == SemType::nullable(SemType::Bool) => {
                let lab_end = self.define_label();
                let loc = self.get_temp();
                self.emit(Instr::StoreLocal(loc.index));
                self.emit(Instr::LoadLocal(loc.index));
                self.emit(Instr::NullableHasValue);
                self.emit(Instr::BranchIfFalse(lab_end));
                self.emit(Instr::LoadLocal(loc.index));
                self.emit(Instr::NullableValueOrDefault);
                self.emit_unary_operator(UnaryOp::Not, &SemType::Bool, &SemType::Bool)?;
                self.emit(Instr::WrapNullable(result_ty.clone()));
                self.emit(Instr::StoreLocal(loc.index));
                self.mark_label(lab_end);
                self.emit(Instr::LoadLocal(loc.index));
                self.free_temp(loc);
                Ok(())
            }
            UnaryOp::Not
            | UnaryOp::Negate
            | UnaryOp::NegateChecked
            | UnaryOp::UnaryPlus
            | UnaryOp::Increment
            | UnaryOp::Decrement
            | UnaryOp::OnesComplement
            | UnaryOp::IsFalse
            | UnaryOp::IsTrue => {
                debug_assert_eq!(
                    operand_ty, result_ty,
                    "a lifted arithmetic unary keeps its operand type"
                );
                let lab_null = self.define_label();
                let lab_end = self.define_label();
                let loc = self.get_temp();
                self.emit(Instr::StoreLocal(loc.index));
                self.emit(Instr::LoadLocal(loc.index));
                self.emit(Instr::NullableHasValue);
                self.emit(Instr::BranchIfFalse(lab_null));
                self.emit(Instr::LoadLocal(loc.index));
                self.emit(Instr::NullableValueOrDefault);
                let inner = result_ty.non_nullable().clone();
                self.emit_unary_operator(op, &inner, &inner)?;
                self.emit(Instr::WrapNullable(result_ty.clone()));
                self.emit(Instr::StoreLocal(loc.index));
                self.emit(Instr::Branch(lab_end));
                self.mark_label(lab_null);
                self.emit(Instr::DefaultInit(result_ty.clone()));
                self.emit(Instr::StoreLocal(loc.index));
                self.mark_label(lab_end);
                self.emit(Instr::LoadLocal(loc.index));
                self.free_temp(loc);
                Ok(())
            }
            UnaryOp::TypeAs => {
                self.emit(Instr::Box(operand_ty.clone()));
                self.emit(Instr::IsInst(result_ty.clone()));
                if result_ty.is_nullable() {
                    self.emit(Instr::Unbox(result_ty.clone()));
                }
                Ok(())
            }
            _ => Err(CompileError::UnhandledUnary {
                op: format!("{op:?}"),
            }),
        }
    }

    /// Narrow an arithmetic result back to a sub-32-bit type; wider
    /// results need no correction
    pub(crate) fn emit_convert_arithmetic_result(&mut self, checked: bool, ty: &SemType) {
        let kind = match ty {
            SemType::I8 => NumKind::I1,
            SemType::U8 => NumKind::U1,
            SemType::I16 => NumKind::I2,
            SemType::U16 => NumKind::U2,
            _ => return,
        };
        self.emit(if checked {
            Instr::ConvOvf(kind)
        } else {
            Instr::Conv(kind)
        });
    }

    /// Push the unit value for increment/decrement.
    ///
    /// Panics on types with no unit constant; the tree producer only
    /// builds these operators over numerics.
    fn emit_constant_one(&mut self, ty: &SemType) {
        match ty {
            SemType::I16 | SemType::I32 | SemType::U16 | SemType::U32 => {
                self.emit(Instr::Const1);
            }
            SemType::I64 | SemType::U64 => {
                self.emit(Instr::ConstI64(1));
            }
            SemType::F32 => {
                self.emit(Instr::ConstF32(1.0));
            }
            SemType::F64 => {
                self.emit(Instr::ConstF64(1.0));
            }
            _ => panic!("no unit constant for '{}'", self.types().display(ty)),
        }
    }

    fn emit_unary_method(&mut self, node: &UnaryExpr) -> CompileResult<()> {
        let method = node
            .method
            .unwrap_or_else(|| panic!("unary method lowering without a method"));
        let operand = operand(node);
        let operand_ty = operand.ty().clone();
        let param = self.types().method_param(method, 0).clone();
        let ret = self.types().method_return(method).clone();

        if !node.lifted {
            self.emit_expr_value(operand)?;
            self.emit_convert(&operand_ty, &param, false)?;
            self.emit(Instr::CallMethod(method));
            return self.emit_convert(&ret, &node.ty, false);
        }

        // The method takes the non-nullable operand; wrap its call in
        // the lifting pattern and convert the nullable result to the
        // node's type
        let result_ty = if ret.is_value_type() && !ret.is_nullable() {
            SemType::nullable(ret.clone())
        } else {
            ret.clone()
        };
        self.emit_expr_value(operand)?;
        let lab_null = self.define_label();
        let lab_end = self.define_label();
        let loc = self.get_temp();
        self.emit(Instr::StoreLocal(loc.index));
        self.emit(Instr::LoadLocal(loc.index));
        self.emit(Instr::NullableHasValue);
        self.emit(Instr::BranchIfFalse(lab_null));
        self.emit(Instr::LoadLocal(loc.index));
        self.emit(Instr::NullableValueOrDefault);
        self.emit_convert(operand_ty.non_nullable(), &param, false)?;
        self.emit(Instr::CallMethod(method));
        if result_ty.is_nullable() && result_ty != ret {
            self.emit(Instr::WrapNullable(result_ty.clone()));
        }
        self.emit(Instr::StoreLocal(loc.index));
        self.emit(Instr::Branch(lab_end));
        self.mark_label(lab_null);
        self.emit_default(&result_ty);
        self.emit(Instr::StoreLocal(loc.index));
        self.mark_label(lab_end);
        self.emit(Instr::LoadLocal(loc.index));
        self.free_temp(loc);
        self.emit_convert(&result_ty, &node.ty, false)
    }

    fn emit_convert_expr(&mut self, node: &UnaryExpr, usage: ResultUse) -> CompileResult<()> {
        if let Some(method) = node.method {
            if node.lifted && (!node.ty.is_value_type() || !operand(node).ty().is_value_type()) {
                // A conversion is only truly lifted when both sides are
                // value types; otherwise rewrite it as
                // convert(call(m, convert(operand, param)))
                let operand_ty = operand(node).ty().clone();
                let param = self.types().method_param(method, 0).clone();
                let ret = self.types().method_return(method).clone();
                self.emit_expr_value(operand(node))?;
                self.emit_convert(&operand_ty, &param, false)?;
                self.emit(Instr::CallMethod(method));
                self.emit_convert(&ret, &node.ty, false)?;
            } else {
                self.emit_unary_method(node)?;
            }
            self.discard_if_void(usage, &node.ty);
            return Ok(());
        }
        if node.ty == SemType::Void {
            return self.emit_expr(operand(node), ResultUse::Void);
        }
        let operand_ty = operand(node).ty().clone();
        self.emit_expr_value(operand(node))?;
        if operand_ty != node.ty {
            let checked = node.op == UnaryOp::ConvertChecked;
            self.emit_convert(&operand_ty, &node.ty, checked)?;
        }
        self.discard_if_void(usage, &node.ty);
        Ok(())
    }

    fn emit_throw(&mut self, node: &UnaryExpr, usage: ResultUse) -> CompileResult<()> {
        match &node.operand {
            None => {
                self.check_rethrow()?;
                self.emit(Instr::Rethrow);
            }
            Some(exception) => {
                self.emit_expr_value(exception)?;
                self.emit(Instr::Throw);
            }
        }
        self.emit_unreachable(&node.ty, usage);
        Ok(())
    }

    /// Keep the stack shape coherent after a throw when the
    /// surrounding context still expects a value
    fn emit_unreachable(&mut self, ty: &SemType, usage: ResultUse) {
        if usage == ResultUse::Value && *ty != SemType::Void {
            self.emit_default(ty);
        }
    }

    fn emit_quote(&mut self, node: &UnaryExpr) -> CompileResult<()> {
        let quoted = operand(node).clone();
        let index = self
            .instructions
            .pool_mut()
            .add_object(PoolObject::Expr(quoted));
        self.emit(Instr::LoadConst(index));

        // Rebind against the live frame whenever this unit hoists any
        // variable, even if the quoted tree references none of them
        if let Some(hoisted) = self.hoisted.clone() {
            let descriptor = self
                .instructions
                .pool_mut()
                .add_object(PoolObject::Hoisted(hoisted.vars.clone()));
            self.emit(Instr::LoadConst(descriptor));
            self.emit_load_var(hoisted.self_var);
            self.emit(Instr::CallRuntime(RuntimeFn::QuoteRehydrate));
            if node.ty != SemType::Class(TypeTable::EXPR) {
                self.emit(Instr::CastClass(node.ty.clone()));
            }
        }
        Ok(())
    }
}
