//! Expression lowering
//!
//! Every expression leaves exactly one value on the stack.

use crate::compiler::bytecode::{Opcode, Value};
use crate::compiler::optimize::{const_condition, eval_const_expr};
use crate::parser::ast::*;
use crate::parser::types::Type;

use super::Emitter;

/// Opcode of a binary operator; short-circuit operators have none
fn binary_opcode(op: BinaryOp) -> Option<Opcode> {
    Some(match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Sub,
        BinaryOp::Mul => Opcode::Mul,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::BitAnd => Opcode::BitAnd,
        BinaryOp::BitOr => Opcode::BitOr,
        BinaryOp::BitXor => Opcode::BitXor,
        BinaryOp::Shl => Opcode::Shl,
        BinaryOp::Shr => Opcode::Shr,
        BinaryOp::Eq | BinaryOp::Identical => Opcode::Eq,
        BinaryOp::Ne | BinaryOp::NotIdentical => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => return None,
    })
}

impl<'a> Emitter<'a> {
    pub(super) fn emit_expression(&mut self, expr: &Expression) {
        self.pos = expr.pos().clone();

        if let Some(slot) = self.cached_slot(expr) {
            self.emit_u16(Opcode::LoadLocal, slot);
            return;
        }
        if self.options.constant_folding
            && matches!(
                expr,
                Expression::Binary(_) | Expression::Unary(_) | Expression::Ternary(_) | Expression::Interpolated(_)
            )
        {
            if let Some(value) = eval_const_expr(expr) {
                self.emit_value(value);
                return;
            }
        }

        match expr {
            Expression::IntLiteral(lit) => self.emit_value(Value::Int(lit.value)),
            Expression::FloatLiteral(lit) => self.emit_value(Value::Float(lit.value)),
            Expression::StringLiteral(lit) => self.emit_value(Value::string(lit.value.as_str())),
            Expression::BoolLiteral(lit) => self.emit_value(Value::Bool(lit.value)),
            Expression::NullLiteral(_) => self.emit(Opcode::Null),
            Expression::Interpolated(s) => self.emit_interpolated(s),
            Expression::ClassName(c) => {
                let class = self.resolve_class_name(&c.class);
                self.emit_value(Value::string(class));
            }
            Expression::Array(a) => {
                for element in &a.elements {
                    self.emit_expression(element);
                }
                let count = a.elements.len();
                self.emit_counted(Opcode::NewArray, count, 1 - count as i32);
            }
            Expression::Map(m) => {
                for (key, value) in &m.entries {
                    self.emit_expression(key);
                    self.emit_expression(value);
                }
                let count = m.entries.len();
                self.emit_counted(Opcode::NewMap, count, 1 - 2 * count as i32);
            }
            Expression::SuperArray(s) => self.emit_super_array(s),
            Expression::Variable(v) => self.emit_load_variable(&v.name),
            Expression::Identifier(id) => self.emit_function_ref(&id.name),
            Expression::This(_) => self.emit_this(),
            Expression::Binary(b) => self.emit_binary(expr, b),
            Expression::Unary(u) => {
                self.emit_expression(&u.operand);
                self.emit(match u.op {
                    UnaryOp::Neg => Opcode::Neg,
                    UnaryOp::Not => Opcode::Not,
                    UnaryOp::BitNot => Opcode::BitNot,
                });
            }
            Expression::Increment(inc) => self.emit_increment(inc),
            Expression::Assign(assign) => self.emit_assign(assign),
            Expression::Call(call) => self.emit_call(call),
            Expression::MethodCall(call) => self.emit_method_call(call),
            Expression::StaticCall(call) => self.emit_static_call(call),
            Expression::New(new) => self.emit_new(new),
            Expression::StaticProperty(sp) => self.emit_static_property(sp),
            Expression::Property(p) => self.emit_property(p),
            Expression::Index(ix) => self.emit_index(ix),
            Expression::Ternary(t) => self.emit_ternary(t),
            Expression::Cast(cast) => {
                self.emit_expression(&cast.value);
                let target = self.type_operand(&cast.target);
                let index = self.name_constant(&target);
                let op = if cast.safe { Opcode::CastSafe } else { Opcode::Cast };
                self.emit_u16(op, index);
            }
            Expression::Is(is) => {
                self.emit_expression(&is.value);
                let target = self.type_operand(&is.target);
                let index = self.name_constant(&target);
                self.emit_u16(Opcode::CheckType, index);
                self.emit(Opcode::Swap);
                self.emit(Opcode::Pop);
            }
            Expression::Closure(c) => self.emit_closure(c),
            Expression::Arrow(a) => self.emit_arrow(a),
            Expression::Match(m) => self.emit_match(m),
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn emit_interpolated(&mut self, s: &InterpolatedString) {
        let mut first = true;
        if !matches!(s.parts.first(), Some(InterpolationPart::Literal(_))) {
            self.emit_value(Value::string(""));
            first = false;
        }
        for part in &s.parts {
            match part {
                InterpolationPart::Literal(text) => self.emit_value(Value::string(text.as_str())),
                InterpolationPart::Expression(e) => self.emit_expression(e),
            }
            if !first {
                self.emit(Opcode::Concat);
            }
            first = false;
        }
    }

    /// Entries without a key take the next integer index
    fn emit_super_array(&mut self, s: &SuperArrayLiteral) {
        let mut next_index: i64 = 0;
        for entry in &s.entries {
            match &entry.key {
                Some(key) => {
                    if let Some(Value::Int(k)) = eval_const_expr(key) {
                        next_index = next_index.max(k.saturating_add(1));
                    }
                    self.emit_expression(key);
                }
                None => {
                    self.emit_value(Value::Int(next_index));
                    next_index += 1;
                }
            }
            self.emit_expression(&entry.value);
        }
        let count = s.entries.len();
        self.emit_counted(Opcode::NewSuperArray, count, 1 - 2 * count as i32);
    }

    // ========================================================================
    // Names
    // ========================================================================

    pub(super) fn emit_load_variable(&mut self, name: &str) {
        match self.current.resolve_local(name).map(|l| l.slot) {
            Some(slot) => self.emit_u16(Opcode::LoadLocal, slot),
            None => {
                let index = self.name_constant(name);
                self.emit_u16(Opcode::LoadGlobal, index);
            }
        }
    }

    /// Store the value on top of the stack into a variable, leaving it there
    pub(super) fn emit_store_variable(&mut self, name: &str) {
        self.current.cse.invalidate(name);
        match self.current.resolve_local(name).map(|l| l.slot) {
            Some(slot) => self.emit_u16(Opcode::StoreLocal, slot),
            None => {
                let index = self.name_constant(name);
                self.emit_u16(Opcode::StoreGlobal, index);
            }
        }
    }

    pub(super) fn emit_this(&mut self) {
        // Closures inside methods receive `$this` as a capture
        let slot = self.current.resolve_local("$this").map_or(0, |l| l.slot);
        self.emit_u16(Opcode::LoadLocal, slot);
    }

    /// A bare function name used as a value or callee
    pub(super) fn emit_function_ref(&mut self, name: &str) {
        if let Some(slot) = self.current.resolve_function(name).map(|l| l.slot) {
            self.emit_u16(Opcode::LoadLocal, slot);
            return;
        }
        if self.current.self_name.as_deref() == Some(name) {
            self.emit_u16(Opcode::LoadLocal, 0);
            return;
        }
        let global = self.function_global(name);
        let index = self.name_constant(&global);
        self.emit_u16(Opcode::LoadGlobal, index);
    }

    /// Global name a function is stored under
    pub(super) fn function_global(&self, name: &str) -> String {
        if let Some(global) = self.function_globals.get(name) {
            return global.clone();
        }
        name.trim_start_matches('\\').to_string()
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn emit_binary(&mut self, expr: &Expression, b: &BinaryExpr) {
        match b.op {
            BinaryOp::And => {
                self.emit_expression(&b.left);
                let end = self.emit_jump(Opcode::JumpIfFalse);
                self.emit(Opcode::Pop);
                self.emit_expression(&b.right);
                self.patch_jump(end);
            }
            BinaryOp::Or => {
                self.emit_expression(&b.left);
                let else_jump = self.emit_jump(Opcode::JumpIfFalse);
                let end = self.emit_jump(Opcode::Jump);
                self.patch_jump(else_jump);
                self.emit(Opcode::Pop);
                self.emit_expression(&b.right);
                self.patch_jump(end);
            }
            BinaryOp::Coalesce => {
                self.emit_expression(&b.left);
                self.emit_coalesce_rest(&b.right);
            }
            BinaryOp::Add if self.is_string_operation(expr, &b.left, &b.right) => {
                self.emit_expression(&b.left);
                self.emit_expression(&b.right);
                self.emit(Opcode::Concat);
            }
            op => {
                self.emit_expression(&b.left);
                self.emit_expression(&b.right);
                if let Some(opcode) = binary_opcode(op) {
                    self.emit(opcode);
                }
            }
        }
    }

    fn is_string_operation(&self, expr: &Expression, left: &Expression, right: &Expression) -> bool {
        self.type_of(expr).is_string() || self.type_of(left).is_string() || self.type_of(right).is_string()
    }

    /// With the left operand on the stack, replace it by `right` when null
    fn emit_coalesce_rest(&mut self, right: &Expression) {
        let height = self.height();
        self.emit(Opcode::Dup);
        self.emit(Opcode::Null);
        self.emit(Opcode::Ne);
        let is_null = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);
        let end = self.emit_jump(Opcode::Jump);
        self.patch_jump(is_null);
        self.set_height(height + 1);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Pop);
        self.emit_expression(right);
        self.patch_jump(end);
        self.set_height(height);
    }

    fn emit_ternary(&mut self, t: &TernaryExpr) {
        if self.options.constant_folding {
            match const_condition(&t.condition) {
                Some(true) => return self.emit_expression(&t.then_branch),
                Some(false) => return self.emit_expression(&t.else_branch),
                None => {}
            }
        }
        let height = self.height();
        self.emit_expression(&t.condition);
        let else_jump = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);
        self.emit_expression(&t.then_branch);
        let end = self.emit_jump(Opcode::Jump);
        self.patch_jump(else_jump);
        self.set_height(height + 1);
        self.emit(Opcode::Pop);
        self.emit_expression(&t.else_branch);
        self.patch_jump(end);
        self.set_height(height + 1);
    }

    /// Compound operator applied to the two values on top of the stack
    fn emit_compound_op(&mut self, op: BinaryOp, target: &Expression) {
        if op == BinaryOp::Add && self.type_of(target).is_string() {
            self.emit(Opcode::Concat);
        } else if let Some(opcode) = binary_opcode(op) {
            self.emit(opcode);
        }
    }

    // ========================================================================
    // Increment and decrement
    // ========================================================================

    fn emit_increment(&mut self, inc: &IncrementExpr) {
        let (step, undo) = if inc.is_increment {
            (Opcode::Add, Opcode::Sub)
        } else {
            (Opcode::Sub, Opcode::Add)
        };

        match inc.target.as_ref() {
            Expression::Variable(v) => {
                self.emit_load_variable(&v.name);
                if !inc.is_prefix {
                    self.emit(Opcode::Dup);
                }
                self.emit(Opcode::One);
                self.emit(step);
                self.emit_store_variable(&v.name);
                if !inc.is_prefix {
                    self.emit(Opcode::Pop);
                }
            }
            Expression::Property(p) => {
                let name = self.name_constant(&p.property);
                self.emit_expression(&p.object);
                self.emit(Opcode::Dup);
                self.emit_u16(Opcode::GetField, name);
                self.emit(Opcode::One);
                self.emit(step);
                self.emit_u16(Opcode::SetField, name);
                if !inc.is_prefix {
                    self.emit(Opcode::One);
                    self.emit(undo);
                }
                self.invalidate_root(&p.object);
            }
            Expression::Index(ix) => {
                let Some(index) = &ix.index else {
                    self.emit(Opcode::Null);
                    return;
                };
                // Object and index live in unnamed slots for the duration
                self.emit_expression(&ix.object);
                let object = self.top_slot();
                self.emit_expression(index);
                let key = self.top_slot();
                self.emit_u16(Opcode::LoadLocal, object);
                self.emit_u16(Opcode::LoadLocal, key);
                self.emit_u16(Opcode::LoadLocal, object);
                self.emit_u16(Opcode::LoadLocal, key);
                self.emit(Opcode::ArrayGet);
                self.emit(Opcode::One);
                self.emit(step);
                self.emit(Opcode::ArraySet);
                if !inc.is_prefix {
                    self.emit(Opcode::One);
                    self.emit(undo);
                }
                self.emit(Opcode::Swap);
                self.emit(Opcode::Pop);
                self.emit(Opcode::Swap);
                self.emit(Opcode::Pop);
                self.invalidate_root(&ix.object);
            }
            Expression::StaticProperty(sp) => {
                let class = self.resolve_class_name(&sp.class);
                let class = self.name_constant(&class);
                let name = self.name_constant(&sp.property);
                self.emit_u16_pair(Opcode::GetStatic, class, name, 1);
                if !inc.is_prefix {
                    self.emit(Opcode::Dup);
                }
                self.emit(Opcode::One);
                self.emit(step);
                self.emit_u16_pair(Opcode::SetStatic, class, name, 0);
                if !inc.is_prefix {
                    self.emit(Opcode::Pop);
                }
            }
            // Rejected by the checker
            _ => self.emit(Opcode::Null),
        }
    }

    fn invalidate_root(&mut self, object: &Expression) {
        if let Some(root) = root_variable(object) {
            self.current.cse.invalidate(root);
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn emit_assign(&mut self, assign: &AssignExpr) {
        let compound = assign.op.binary_op();
        let coalesce = assign.op == AssignOp::Coalesce;

        match assign.target.as_ref() {
            Expression::Variable(v) => {
                if coalesce {
                    self.emit_load_variable(&v.name);
                    self.emit_coalesce_rest(&assign.value);
                } else if let Some(op) = compound {
                    self.emit_load_variable(&v.name);
                    self.emit_expression(&assign.value);
                    self.emit_compound_op(op, &assign.target);
                } else {
                    self.emit_expression(&assign.value);
                }
                self.emit_store_variable(&v.name);
            }
            Expression::Property(p) => {
                let name = self.name_constant(&p.property);
                self.emit_expression(&p.object);
                if coalesce || compound.is_some() {
                    self.emit(Opcode::Dup);
                    self.emit_u16(Opcode::GetField, name);
                }
                if coalesce {
                    self.emit_coalesce_rest(&assign.value);
                } else {
                    self.emit_expression(&assign.value);
                    if let Some(op) = compound {
                        self.emit_compound_op(op, &assign.target);
                    }
                }
                self.emit_u16(Opcode::SetField, name);
                self.invalidate_root(&p.object);
            }
            Expression::Index(ix) => {
                self.emit_expression(&ix.object);
                match &ix.index {
                    Some(index) => {
                        self.emit_expression(index);
                        self.emit_expression(&assign.value);
                        self.emit(Opcode::ArraySet);
                    }
                    None => {
                        self.emit_expression(&assign.value);
                        self.emit(Opcode::ArrayPush);
                    }
                }
                self.invalidate_root(&ix.object);
            }
            Expression::StaticProperty(sp) => {
                let class = self.resolve_class_name(&sp.class);
                let class = self.name_constant(&class);
                let name = self.name_constant(&sp.property);
                if coalesce {
                    self.emit_u16_pair(Opcode::GetStatic, class, name, 1);
                    self.emit_coalesce_rest(&assign.value);
                } else if let Some(op) = compound {
                    self.emit_u16_pair(Opcode::GetStatic, class, name, 1);
                    self.emit_expression(&assign.value);
                    self.emit_compound_op(op, &assign.target);
                } else {
                    self.emit_expression(&assign.value);
                }
                self.emit_u16_pair(Opcode::SetStatic, class, name, 0);
            }
            // Rejected by the checker
            _ => self.emit_expression(&assign.value),
        }
    }

    // ========================================================================
    // Member and element access
    // ========================================================================

    /// `Enum::Member` is a constant; anything else reads a static property
    fn emit_static_property(&mut self, sp: &StaticPropertyExpr) {
        let class = self.resolve_class_name(&sp.class);
        if self.symbols.is_enum(&class) {
            self.emit_value(Value::Enum {
                name: class,
                member: sp.property.clone(),
            });
            return;
        }
        let class = self.name_constant(&class);
        let name = self.name_constant(&sp.property);
        self.emit_u16_pair(Opcode::GetStatic, class, name, 1);
    }

    fn emit_property(&mut self, p: &PropertyExpr) {
        let object_ty = self.type_of(&p.object);
        let object_ty = object_ty.without_null();
        if p.property == "length" && (object_ty.is_array_like() || object_ty.is_string()) {
            self.emit_expression(&p.object);
            let end = self.emit_nullsafe_guard(p.nullsafe);
            self.emit(Opcode::ArrayLen);
            self.close_nullsafe_guard(end);
            return;
        }
        let name = self.name_constant(&p.property);
        self.emit_expression(&p.object);
        let end = self.emit_nullsafe_guard(p.nullsafe);
        self.emit_u16(Opcode::GetField, name);
        self.close_nullsafe_guard(end);
    }

    /// With the receiver on the stack, short-circuit to `null` when it is
    /// null. Returns the jump to patch after the member access.
    pub(super) fn emit_nullsafe_guard(&mut self, nullsafe: bool) -> Option<usize> {
        if !nullsafe {
            return None;
        }
        let height = self.height();
        self.emit(Opcode::Dup);
        self.emit(Opcode::Null);
        self.emit(Opcode::Eq);
        let not_null = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);
        let end = self.emit_jump(Opcode::Jump);
        self.patch_jump(not_null);
        self.set_height(height + 1);
        self.emit(Opcode::Pop);
        self.set_height(height);
        Some(end)
    }

    pub(super) fn close_nullsafe_guard(&mut self, end: Option<usize>) {
        if let Some(end) = end {
            self.patch_jump(end);
        }
    }

    fn emit_index(&mut self, ix: &IndexExpr) {
        let Some(index) = &ix.index else {
            // `$a[]` outside an assignment was reported by the checker
            self.emit(Opcode::Null);
            return;
        };
        self.emit_expression(&ix.object);
        self.emit_expression(index);
        if self.current.bounds_checked(&ix.object, index) {
            self.emit(Opcode::ArrayGetUnchecked);
        } else {
            self.emit(Opcode::ArrayGet);
        }
    }

    // ========================================================================
    // Types
    // ========================================================================

    /// Type name operand of `CAST`, `CAST_SAFE` and `CHECK_TYPE`
    pub(super) fn type_operand(&self, node: &TypeNode) -> String {
        match node {
            TypeNode::Class(name) => self.resolve_class_name(name),
            TypeNode::Nullable(inner) => format!("?{}", self.type_operand(inner)),
            other => other.type_name(),
        }
    }

    // ========================================================================
    // Match
    // ========================================================================

    /// Arms are tried in order against the subject kept on the stack; a
    /// value without a matching arm evaluates to `null`.
    fn emit_match(&mut self, m: &MatchExpr) {
        let height = self.height();
        self.emit_expression(&m.subject);
        let subject = height + 1;
        let mut end_jumps = Vec::new();

        for arm in &m.arms {
            self.pos = arm.pos.clone();
            self.set_height(subject);

            let pattern_fail = match &arm.pattern {
                MatchPattern::Wildcard => None,
                MatchPattern::Value(value) => {
                    self.emit(Opcode::Dup);
                    self.emit_expression(value);
                    self.emit(Opcode::Eq);
                    let fail = self.emit_jump(Opcode::JumpIfFalse);
                    self.emit(Opcode::Pop);
                    Some(fail)
                }
                MatchPattern::Type { ty, .. } => {
                    let target = self.type_operand(ty);
                    let index = self.name_constant(&target);
                    self.emit_u16(Opcode::CheckType, index);
                    let fail = self.emit_jump(Opcode::JumpIfFalse);
                    self.emit(Opcode::Pop);
                    Some(fail)
                }
            };

            let binding = match &arm.pattern {
                MatchPattern::Type {
                    ty,
                    binding: Some(name),
                } => Some((name, Type::from_node(ty))),
                _ => None,
            };
            if let Some((name, ty)) = &binding {
                self.emit(Opcode::Dup);
                self.begin_scope();
                self.declare_local(name.as_str(), ty.clone());
            }

            let guard_fail = arm.guard.as_ref().map(|guard| {
                self.emit_expression(guard);
                let fail = self.emit_jump(Opcode::JumpIfFalse);
                self.emit(Opcode::Pop);
                fail
            });

            self.emit_expression(&arm.body);
            if binding.is_some() {
                self.emit(Opcode::Swap);
                self.emit(Opcode::Pop);
                self.discard_scope();
            }
            self.emit(Opcode::Swap);
            self.emit(Opcode::Pop);
            end_jumps.push(self.emit_jump(Opcode::Jump));

            let mut next_jump = None;
            if let Some(fail) = guard_fail {
                self.patch_jump(fail);
                let bound = usize::from(binding.is_some());
                self.set_height(subject + bound + 1);
                self.emit(Opcode::Pop);
                if bound == 1 {
                    self.emit(Opcode::Pop);
                }
                if pattern_fail.is_some() {
                    next_jump = Some(self.emit_jump(Opcode::Jump));
                }
            }
            if let Some(fail) = pattern_fail {
                self.patch_jump(fail);
                self.set_height(subject + 1);
                self.emit(Opcode::Pop);
            }
            if let Some(jump) = next_jump {
                self.patch_jump(jump);
            }
        }

        // No arm matched
        self.set_height(subject);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Null);
        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.set_height(height + 1);
    }
}
