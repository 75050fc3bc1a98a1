//! Statement lowering

use crate::compiler::bytecode::{Opcode, Value};
use crate::compiler::optimize::{bounds, const_condition, eval_const_expr, signature};
use crate::parser::ast::*;
use crate::parser::types::Type;

use super::context::{CallShape, FunctionKind};
use super::Emitter;

impl<'a> Emitter<'a> {
    /// Emit statements in order; anything after a terminator is unreachable
    /// and skipped.
    pub(super) fn emit_block(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.emit_statement(stmt);
            if stmt.is_terminator() {
                break;
            }
        }
    }

    pub(super) fn emit_scoped_block(&mut self, stmts: &[Statement]) {
        self.begin_scope();
        self.emit_block(stmts);
        self.end_scope();
    }

    /// Function body followed by `RETURN_NULL` unless it already ends in a
    /// terminator
    pub(super) fn emit_function_body(&mut self, body: &[Statement]) {
        self.emit_block(body);
        if !body.last().is_some_and(Statement::is_terminator) {
            self.emit(Opcode::ReturnNull);
        }
    }

    pub(super) fn emit_statement(&mut self, stmt: &Statement) {
        self.pos = stmt.pos().clone();
        match stmt {
            Statement::Expression(s) => self.emit_expression_statement(&s.expr),
            Statement::VarDecl(decl) => self.emit_var_decl(decl),
            Statement::MultiAssign(m) => self.emit_multi_assign(m),
            Statement::If(s) => self.emit_if(s),
            Statement::While(s) => self.emit_while(s),
            Statement::For(s) => self.emit_for(s),
            Statement::Foreach(s) => self.emit_foreach(s),
            Statement::Switch(s) => self.emit_switch(s),
            Statement::Break(_) => self.emit_break(),
            Statement::Continue(_) => self.emit_continue(),
            Statement::Return(s) => self.emit_return(s),
            Statement::Echo(s) => {
                self.emit_root_expression(&s.value);
                self.emit(Opcode::DebugPrint);
            }
            Statement::Try(s) => self.emit_try(s),
            Statement::Throw(s) => {
                self.emit_expression(&s.value);
                self.emit(Opcode::Throw);
            }
            Statement::Block(b) => self.emit_scoped_block(&b.body),
            Statement::Function(decl) => self.emit_nested_function(decl),
            Statement::Unset(s) => self.emit_unset(&s.target),
        }
    }

    /// Whether file-level variables are being written
    pub(super) fn at_global_scope(&self) -> bool {
        self.current.kind == FunctionKind::Main && self.current.scope_depth == 0
    }

    // ========================================================================
    // Expressions as statements
    // ========================================================================

    fn emit_expression_statement(&mut self, expr: &Expression) {
        // `$x = v;` on an unknown name introduces a local inside functions,
        // and so does every unknown name in `$a = $b = v;`
        if self.current.kind != FunctionKind::Main {
            let (targets, value) = assignment_chain(expr);
            if targets.iter().any(|name| self.current.resolve_local(name).is_none()) {
                self.emit_assignment_chain(&targets, value);
                return;
            }
        }
        self.emit_root_expression(expr);
        self.emit(Opcode::Pop);
    }

    /// Assign `value` to `targets`, innermost first. Unknown names become
    /// locals holding their own copy of the value.
    fn emit_assignment_chain(&mut self, targets: &[&str], value: &Expression) {
        self.emit_root_expression(value);
        let ty = self.type_of(value);
        let mut declared: Option<u16> = None;
        for name in targets.iter().rev() {
            if let Some(slot) = declared.take() {
                self.emit_u16(Opcode::LoadLocal, slot);
            }
            if self.current.resolve_local(name).is_some() {
                self.emit_store_variable(name);
            } else {
                declared = Some(self.declare_local(*name, ty.clone()));
            }
        }
        if declared.is_none() {
            self.emit(Opcode::Pop);
        }
    }

    /// Emit the root expression of a statement. Inside loops a pure
    /// expression seen for the first time is kept in a `$__cse_<n>` local so
    /// later occurrences reload it.
    pub(super) fn emit_root_expression(&mut self, expr: &Expression) {
        let reusable = self.options.cse
            && self.current.in_loop()
            && !(self.options.constant_folding && eval_const_expr(expr).is_some());
        let sig = if reusable { signature(expr) } else { None };
        let Some(sig) = sig.filter(|s| self.current.cse.lookup(s).is_none()) else {
            self.emit_expression(expr);
            return;
        };

        self.emit_expression(expr);
        self.emit(Opcode::Dup);
        let name = self.current.cse.fresh_name("cse");
        let ty = self.type_of(expr);
        let slot = self.height().saturating_sub(2);
        let slot = self.declare_local_at(name, ty, slot);
        self.register_cse(sig, slot, expr);
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn emit_var_decl(&mut self, decl: &VarDecl) {
        let node = decl.ty.as_ref();
        let ty = match (node, &decl.init) {
            (Some(node), _) => Type::from_node(node),
            (None, Some(init)) => self.type_of(init),
            (None, None) => Type::Dynamic,
        };

        match (node, &decl.init) {
            (Some(node), init) if node.fixed_size().is_some() => {
                let capacity = node.fixed_size().unwrap_or(0);
                self.emit_fixed_array(capacity, init.as_ref());
            }
            (Some(node), init) if node.is_bytes() => match init {
                Some(Expression::Array(literal)) => {
                    for element in &literal.elements {
                        self.emit_expression(element);
                    }
                    let count = literal.elements.len();
                    self.emit_counted(Opcode::NewBytes, count, 1 - count as i32);
                }
                Some(other) => self.emit_expression(other),
                None => self.emit_counted(Opcode::NewBytes, 0, 1),
            },
            (_, Some(init)) => self.emit_root_expression(init),
            (_, None) => self.emit(Opcode::Null),
        }

        if self.at_global_scope() {
            self.current.cse.invalidate(&decl.name);
            let index = self.name_constant(&decl.name);
            self.emit_u16(Opcode::StoreGlobal, index);
            self.emit(Opcode::Pop);
        } else {
            self.declare_local(decl.name.clone(), ty);
        }
    }

    /// `NEW_FIXED_ARRAY capacity, len` over the literal's elements
    fn emit_fixed_array(&mut self, capacity: usize, init: Option<&Expression>) {
        let elements: &[Expression] = match init {
            Some(Expression::Array(literal)) => &literal.elements,
            Some(other) => {
                self.emit_expression(other);
                return;
            }
            None => &[],
        };
        for element in elements {
            self.emit_expression(element);
        }
        let capacity = u16::try_from(capacity).unwrap_or(u16::MAX);
        let len = elements.len();
        self.emit_u16_pair(
            Opcode::NewFixedArray,
            capacity,
            u16::try_from(len).unwrap_or(u16::MAX),
            1 - len as i32,
        );
    }

    /// `($a, $b) = value;` unpacks through a hidden local
    fn emit_multi_assign(&mut self, multi: &MultiAssign) {
        self.emit_expression(&multi.value);
        let tuple_ty = self.type_of(&multi.value);
        let element_ty = tuple_ty.element_type().cloned().unwrap_or(Type::Dynamic);
        let tuple = self.declare_local("$__tuple", tuple_ty.clone());
        let global = self.at_global_scope();

        for (i, name) in multi.names.iter().enumerate() {
            self.emit_u16(Opcode::LoadLocal, tuple);
            self.emit_value(Value::Int(i as i64));
            self.emit(Opcode::ArrayGet);
            let ty = match &tuple_ty {
                Type::Tuple(members) => members.get(i).cloned().unwrap_or(Type::Dynamic),
                _ => element_ty.clone(),
            };
            if let Some(slot) = self.current.resolve_local(name).map(|l| l.slot) {
                self.current.cse.invalidate(name);
                self.emit_u16(Opcode::StoreLocal, slot);
                self.emit(Opcode::Pop);
            } else if global {
                self.current.cse.invalidate(name);
                let index = self.name_constant(name);
                self.emit_u16(Opcode::StoreGlobal, index);
                self.emit(Opcode::Pop);
            } else {
                self.declare_local(name.clone(), ty);
            }
        }

        // At file level nothing was declared above the tuple
        if global {
            self.current.locals.pop();
            self.emit(Opcode::Pop);
        }
    }

    /// A function declared inside a body becomes a callable local
    fn emit_nested_function(&mut self, decl: &FunctionDecl) {
        if self.at_global_scope() {
            // Hoisted ahead of the file's statements
            return;
        }
        self.pos = decl.pos.clone();
        self.push_function(
            &decl.name,
            FunctionKind::Function,
            &decl.params,
            &[],
            Some(decl.name.clone()),
        );
        self.emit_function_body(&decl.body);
        let function = self.pop_function();
        self.emit_value(Value::Function(Box::new(function)));
        self.declare_function_local(
            &decl.name,
            CallShape {
                param_names: decl.params.iter().map(|p| p.name.clone()).collect(),
                min_arity: min_arity(&decl.params),
            },
        );
    }

    fn emit_unset(&mut self, target: &Expression) {
        match target {
            Expression::Index(ix) => {
                let Some(index) = &ix.index else {
                    return;
                };
                self.emit_expression(&ix.object);
                self.emit_expression(index);
                self.emit(Opcode::Unset);
            }
            Expression::Property(p) => {
                self.emit_expression(&p.object);
                self.emit_value(Value::string(p.property.as_str()));
                self.emit(Opcode::Unset);
            }
            _ => {}
        }
        if let Some(root) = root_variable(target) {
            self.current.cse.invalidate(root);
        }
    }

    // ========================================================================
    // Conditionals
    // ========================================================================

    fn fold_condition(&self, cond: &Expression) -> Option<bool> {
        if self.options.constant_folding {
            const_condition(cond)
        } else {
            None
        }
    }

    fn emit_if(&mut self, stmt: &IfStmt) {
        let height = self.height();
        let mut end_jumps = Vec::new();
        let branches = std::iter::once((&stmt.condition, &stmt.then_branch))
            .chain(stmt.else_ifs.iter().map(|e| (&e.condition, &e.body)));

        let mut taken = false;
        for (cond, body) in branches {
            match self.fold_condition(cond) {
                Some(false) => continue,
                Some(true) => {
                    self.emit_scoped_block(body);
                    taken = true;
                    break;
                }
                None => {}
            }
            self.emit_expression(cond);
            let next = self.emit_jump(Opcode::JumpIfFalse);
            self.emit(Opcode::Pop);
            self.emit_scoped_block(body);
            end_jumps.push(self.emit_jump(Opcode::Jump));
            self.patch_jump(next);
            self.set_height(height + 1);
            self.emit(Opcode::Pop);
        }

        if !taken {
            if let Some(else_branch) = &stmt.else_branch {
                self.emit_scoped_block(else_branch);
            }
        }
        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.set_height(height);
    }

    fn emit_switch(&mut self, stmt: &SwitchStmt) {
        self.begin_scope();
        self.emit_expression(&stmt.subject);
        let ty = self.type_of(&stmt.subject);
        self.declare_local("$__switch", ty);
        let height = self.height();
        self.enter_loop(0, true);

        let mut end_jumps = Vec::new();
        for case in &stmt.cases {
            self.pos = case.pos.clone();
            self.emit(Opcode::Dup);
            self.emit_expression(&case.value);
            self.emit(Opcode::Eq);
            let next = self.emit_jump(Opcode::JumpIfFalse);
            self.emit(Opcode::Pop);
            self.emit_scoped_block(&case.body);
            end_jumps.push(self.emit_jump(Opcode::Jump));
            self.patch_jump(next);
            self.set_height(height + 1);
            self.emit(Opcode::Pop);
        }
        if let Some(default) = &stmt.default {
            self.emit_scoped_block(default);
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.set_height(height);
        self.leave_loop();
        self.end_scope();
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn emit_while(&mut self, stmt: &WhileStmt) {
        let cond = self.fold_condition(&stmt.condition);
        if cond == Some(false) {
            return;
        }

        self.begin_scope();
        self.prepare_loop(&stmt.body, &[&stmt.condition], &[]);
        let height = self.height();
        let start = self.code_len();
        self.enter_loop(start, false);

        let exit = if cond == Some(true) {
            None
        } else {
            self.emit_expression(&stmt.condition);
            let exit = self.emit_jump(Opcode::JumpIfFalse);
            self.emit(Opcode::Pop);
            Some(exit)
        };

        self.emit_scoped_block(&stmt.body);
        self.emit_loop(start);

        if let Some(exit) = exit {
            self.patch_jump(exit);
            self.set_height(height + 1);
            self.emit(Opcode::Pop);
        }
        self.set_height(height);
        self.leave_loop();
        self.end_scope();
    }

    fn emit_for(&mut self, stmt: &ForStmt) {
        self.begin_scope();
        if let Some(init) = &stmt.init {
            self.emit_statement(init);
        }
        let cond = match &stmt.condition {
            Some(c) => self.fold_condition(c),
            None => Some(true),
        };
        if cond == Some(false) {
            self.end_scope();
            return;
        }

        let header: Vec<&Expression> = stmt.condition.iter().chain(stmt.update.iter()).collect();
        self.prepare_loop(&stmt.body, &header, &[]);
        let pattern = if self.options.bounds_check_elision {
            bounds::recognize(stmt, |e| self.type_of(e).is_array_like())
        } else {
            None
        };

        let height = self.height();
        // The update sits first so `continue` can jump back to it
        let skip_update = stmt.update.as_ref().map(|_| self.emit_jump(Opcode::Jump));
        let start = self.code_len();
        self.enter_loop(start, false);
        if let Some(update) = &stmt.update {
            self.emit_expression(update);
            self.emit(Opcode::Pop);
        }
        if let Some(jump) = skip_update {
            self.patch_jump(jump);
        }

        let exit = match (&stmt.condition, cond) {
            (Some(condition), None) => {
                self.emit_expression(condition);
                let exit = self.emit_jump(Opcode::JumpIfFalse);
                self.emit(Opcode::Pop);
                Some(exit)
            }
            _ => None,
        };

        let has_pattern = pattern.is_some();
        if let Some(pattern) = pattern {
            log::trace!(
                "eliding bounds checks on ${}[${}] in {}",
                pattern.array,
                pattern.index,
                self.current.function.name
            );
            self.current.bounds.push(pattern);
        }
        self.emit_scoped_block(&stmt.body);
        if has_pattern {
            self.current.bounds.pop();
        }
        self.emit_loop(start);

        if let Some(exit) = exit {
            self.patch_jump(exit);
            self.set_height(height + 1);
            self.emit(Opcode::Pop);
        }
        self.set_height(height);
        self.leave_loop();
        self.end_scope();
    }

    /// `foreach` keeps the iterator in a hidden local; key and value are
    /// fresh locals each iteration
    fn emit_foreach(&mut self, stmt: &ForeachStmt) {
        self.begin_scope();
        let mut bindings = vec![stmt.value.as_str()];
        bindings.extend(stmt.key.as_deref());
        self.prepare_loop(&stmt.body, &[], &bindings);

        let iterable_ty = self.type_of(&stmt.iterable);
        let (key_ty, value_ty) = match &iterable_ty {
            Type::Map(k, v) => ((**k).clone(), (**v).clone()),
            other => (
                Type::Int,
                other.element_type().cloned().unwrap_or(Type::Dynamic),
            ),
        };

        self.emit_expression(&stmt.iterable);
        self.emit(Opcode::IterInit);
        let iterator = self.declare_local("$__iter", Type::Dynamic);
        let height = self.height();
        let start = self.code_len();
        self.enter_loop(start, false);

        self.emit_u16(Opcode::LoadLocal, iterator);
        self.emit(Opcode::IterNext);
        let exit = self.emit_jump(Opcode::JumpIfFalse);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Pop);

        self.begin_scope();
        if let Some(key) = &stmt.key {
            self.emit_u16(Opcode::LoadLocal, iterator);
            self.emit(Opcode::IterKey);
            self.emit(Opcode::Swap);
            self.emit(Opcode::Pop);
            self.declare_local(key.clone(), key_ty);
        }
        self.emit_u16(Opcode::LoadLocal, iterator);
        self.emit(Opcode::IterValue);
        self.emit(Opcode::Swap);
        self.emit(Opcode::Pop);
        self.declare_local(stmt.value.clone(), value_ty);
        self.emit_block(&stmt.body);
        self.end_scope();
        self.emit_loop(start);

        self.patch_jump(exit);
        self.set_height(height + 2);
        self.emit(Opcode::Pop);
        self.emit(Opcode::Pop);
        self.set_height(height);
        self.leave_loop();
        self.end_scope();
    }

    fn emit_break(&mut self) {
        // Outside a loop the checker already reported it
        let Some(ctx) = self.current.loops.last() else {
            return;
        };
        let pops = self.height().saturating_sub(ctx.break_height);
        let leaves = self.current.try_depth.saturating_sub(ctx.try_depth);
        let height = self.height();
        for _ in 0..leaves {
            self.emit(Opcode::LeaveTry);
        }
        for _ in 0..pops {
            self.emit(Opcode::Pop);
        }
        let jump = self.emit_jump(Opcode::Jump);
        if let Some(ctx) = self.current.loops.last_mut() {
            ctx.break_jumps.push(jump);
        }
        self.set_height(height);
    }

    fn emit_continue(&mut self) {
        let Some(ctx) = self.current.loops.iter().rev().find(|l| !l.is_switch) else {
            return;
        };
        let (start, target_height, target_try) = (ctx.start, ctx.continue_height, ctx.try_depth);
        let pops = self.height().saturating_sub(target_height);
        let leaves = self.current.try_depth.saturating_sub(target_try);
        let height = self.height();
        for _ in 0..leaves {
            self.emit(Opcode::LeaveTry);
        }
        for _ in 0..pops {
            self.emit(Opcode::Pop);
        }
        self.emit_loop(start);
        self.set_height(height);
    }

    // ========================================================================
    // Returns and exceptions
    // ========================================================================

    fn emit_return(&mut self, stmt: &ReturnStmt) {
        let height = self.height();
        match stmt.values.as_slice() {
            [] => self.emit(Opcode::ReturnNull),
            [value] => {
                if let Some(call) = self.tail_call_target(value) {
                    self.emit_tail_call(call);
                } else {
                    self.emit_expression(value);
                    self.emit(Opcode::Return);
                }
            }
            values => {
                for value in values {
                    self.emit_expression(value);
                }
                let count = values.len();
                self.emit_counted(Opcode::NewArray, count, 1 - count as i32);
                self.emit(Opcode::Return);
            }
        }
        self.set_height(height);
    }

    /// `ENTER_TRY` with a handler table whose offsets are relative to the
    /// instruction itself
    fn emit_try(&mut self, stmt: &TryStmt) {
        let height = self.height();
        let line = self.pos.line;
        let try_start = self.code_len();

        let type_constants: Vec<u16> = stmt
            .catches
            .iter()
            .map(|c| {
                let class = self.resolve_class_name(&c.class);
                self.name_constant(&class)
            })
            .collect();
        let count = u8::try_from(stmt.catches.len()).unwrap_or(u8::MAX);
        let chunk = &mut self.current.function.chunk;
        chunk.emit_u8(Opcode::EnterTry, count, line);
        let finally_at = chunk.len();
        chunk.write_u16(crate::compiler::bytecode::JUMP_PLACEHOLDER, line);
        let mut catch_at = Vec::with_capacity(type_constants.len());
        for constant in &type_constants {
            chunk.write_u16(*constant, line);
            catch_at.push(chunk.len());
            chunk.write_u16(crate::compiler::bytecode::JUMP_PLACEHOLDER, line);
        }

        self.current.try_depth += 1;
        self.emit_scoped_block(&stmt.body);
        self.current.try_depth -= 1;
        self.emit(Opcode::LeaveTry);
        let mut after = vec![self.emit_jump(Opcode::Jump)];

        for ((clause, at), constant) in stmt.catches.iter().zip(catch_at).zip(type_constants) {
            self.pos = clause.pos.clone();
            self.patch_handler(at, try_start);
            self.set_height(height);
            self.emit_u16(Opcode::EnterCatch, constant);
            self.begin_scope();
            match &clause.var {
                Some(var) => {
                    let class = self.resolve_class_name(&clause.class);
                    self.declare_local(var.clone(), Type::named(class));
                }
                None => self.emit(Opcode::Pop),
            }
            self.emit_block(&clause.body);
            self.end_scope();
            after.push(self.emit_jump(Opcode::Jump));
        }

        if let Some(finally) = &stmt.finally {
            self.patch_handler(finally_at, try_start);
            for jump in after {
                self.patch_jump(jump);
            }
            self.set_height(height);
            self.emit(Opcode::EnterFinally);
            self.emit_scoped_block(finally);
            self.emit(Opcode::LeaveFinally);
        } else {
            for jump in after {
                self.patch_jump(jump);
            }
        }
        self.set_height(height);
    }

    fn patch_handler(&mut self, at: usize, try_start: usize) {
        let delta = self.code_len() - try_start;
        match i16::try_from(delta) {
            Ok(delta) => self.current.function.chunk.patch_i16(at, delta),
            Err(_) => {
                let pos = self.pos.clone();
                self.error(crate::parser::checker::CompileError::LimitExceeded {
                    what: format!("handler {} bytes past its try", delta),
                    pos,
                });
            }
        }
    }
}

/// Variable targets of a chain of plain assignments, outermost first, and
/// the value assigned to all of them
fn assignment_chain(expr: &Expression) -> (Vec<&str>, &Expression) {
    let mut targets = Vec::new();
    let mut current = expr;
    while let Expression::Assign(assign) = current {
        if assign.op != AssignOp::Assign {
            break;
        }
        let Some(name) = assign.target.as_variable() else {
            break;
        };
        targets.push(name);
        current = &assign.value;
    }
    (targets, current)
}
