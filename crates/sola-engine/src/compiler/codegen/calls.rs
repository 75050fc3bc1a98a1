//! Calls, inlining and closures

use rustc_hash::FxHashSet;

use crate::compiler::bytecode::{Opcode, Value};
use crate::compiler::optimize::inline::referenced_functions;
use crate::compiler::optimize::InlineCandidate;
use crate::parser::ast::*;
use crate::parser::checker::{bind_arguments, has_named};
use crate::parser::types::Type;

use super::context::FunctionKind;
use super::Emitter;

/// Parameter names and required count used to place named arguments
type ParamShape = (Vec<String>, usize);

impl<'a> Emitter<'a> {
    // ========================================================================
    // Arguments
    // ========================================================================

    /// Push call arguments in parameter order and return how many were
    /// pushed. Named arguments are placed by `shape`; skipped optional
    /// parameters receive `null`.
    fn emit_arguments(&mut self, args: &[Argument], shape: Option<ParamShape>) -> usize {
        if has_named(args) {
            if let Some((names, min_arity)) = shape {
                if let Ok(slots) = bind_arguments(args, &names, min_arity) {
                    for slot in &slots {
                        match slot {
                            Some(value) => self.emit_expression(value),
                            None => self.emit(Opcode::Null),
                        }
                    }
                    return slots.len();
                }
            }
        }
        // Binding errors were reported by the checker; keep source order
        for arg in args {
            self.emit_expression(&arg.value);
        }
        args.len()
    }

    fn function_shape(&self, callee: &Expression) -> Option<ParamShape> {
        let Expression::Identifier(id) = callee else {
            return None;
        };
        if let Some(local) = self.current.resolve_function(&id.name) {
            return local
                .function
                .as_ref()
                .map(|f| (f.param_names.clone(), f.min_arity));
        }
        let sig = self
            .symbols
            .function(&self.function_global(&id.name))
            .or_else(|| self.symbols.function(&id.name))?;
        Some((sig.param_names.clone(), sig.min_arity))
    }

    fn method_shape(&self, class: Option<&str>, method: &str, argc: usize) -> Option<ParamShape> {
        let sig = self.symbols.get_method(class?, method, argc)?;
        Some((sig.signature.param_names.clone(), sig.signature.min_arity))
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub(super) fn emit_call(&mut self, call: &CallExpr) {
        if let Some(candidate) = self.inline_target(call) {
            self.emit_inline(candidate, call);
            return;
        }
        self.emit_callee(&call.callee);
        let shape = self.function_shape(&call.callee);
        let argc = self.emit_arguments(&call.args, shape);
        self.emit_call_op(Opcode::Call, argc);
        self.current.cse.invalidate_globals();
    }

    fn emit_callee(&mut self, callee: &Expression) {
        match callee {
            Expression::Identifier(id) => self.emit_function_ref(&id.name),
            other => self.emit_expression(other),
        }
    }

    pub(super) fn emit_method_call(&mut self, call: &MethodCallExpr) {
        let receiver_ty = self.type_of(&call.object).without_null();
        let class = receiver_ty.nominal_name().map(str::to_string);
        self.emit_expression(&call.object);
        let end = self.emit_nullsafe_guard(call.nullsafe);
        let shape = self.method_shape(class.as_deref(), &call.method, call.args.len());
        let argc = self.emit_arguments(&call.args, shape);
        self.emit_call_method(&call.method, argc);
        self.close_nullsafe_guard(end);
        self.current.cse.invalidate_globals();
    }

    pub(super) fn emit_static_call(&mut self, call: &StaticCallExpr) {
        let class = self.resolve_class_name(&call.class);
        let shape = self.method_shape(Some(&class), &call.method, call.args.len());
        let argc = self.emit_arguments(&call.args, shape);
        self.emit_call_static(&class, &call.method, argc);
        self.current.cse.invalidate_globals();
    }

    /// `NEW_OBJECT`, then `__construct` when the class declares one
    pub(super) fn emit_new(&mut self, new: &NewExpr) {
        let class = self.resolve_class_name(&new.class);
        let index = self.name_constant(&class);
        self.emit_u16(Opcode::NewObject, index);
        let has_constructor = self.symbols.get_method(&class, "__construct", new.args.len()).is_some();
        if has_constructor || !new.args.is_empty() {
            let shape = self.method_shape(Some(&class), "__construct", new.args.len());
            let argc = self.emit_arguments(&new.args, shape);
            self.emit_call_method("__construct", argc);
        }
        self.current.cse.invalidate_globals();
    }

    // ========================================================================
    // Tail calls
    // ========================================================================

    /// The call in `return <call>;` when it can reuse the current frame
    pub(super) fn tail_call_target<'e>(&self, value: &'e Expression) -> Option<&'e CallExpr> {
        if !self.options.tail_calls || self.current.try_depth > 0 {
            return None;
        }
        let Expression::Call(call) = value else {
            return None;
        };
        if !matches!(call.callee.as_ref(), Expression::Identifier(_) | Expression::Variable(_)) {
            return None;
        }
        if self.inline_target(call).is_some() {
            return None;
        }
        Some(call)
    }

    pub(super) fn emit_tail_call(&mut self, call: &CallExpr) {
        log::trace!("tail call in {}", self.current.function.name);
        self.emit_callee(&call.callee);
        let shape = self.function_shape(&call.callee);
        let argc = self.emit_arguments(&call.args, shape);
        self.emit_call_op(Opcode::TailCall, argc);
    }

    // ========================================================================
    // Inlining
    // ========================================================================

    fn inline_target(&self, call: &CallExpr) -> Option<InlineCandidate<'a>> {
        if !self.options.inlining || has_named(&call.args) {
            return None;
        }
        let Expression::Identifier(id) = call.callee.as_ref() else {
            return None;
        };
        // A nested function of the same name shadows the global one
        if self.current.resolve_function(&id.name).is_some() {
            return None;
        }
        let candidate = self.inline_candidates.get(&id.name)?;
        if candidate.arity() != call.args.len()
            || self.inline_stack.contains(&candidate.name)
            || self.current.function.name == candidate.name
        {
            return None;
        }
        let shadowed = referenced_functions(candidate.body)
            .iter()
            .any(|name| self.current.resolve_function(name).is_some());
        if shadowed {
            return None;
        }
        Some(candidate.clone())
    }

    /// Evaluate the arguments into fresh locals, emit the body with the
    /// parameters bound to them, then drop the locals from under the result
    fn emit_inline(&mut self, candidate: InlineCandidate<'a>, call: &CallExpr) {
        log::trace!(
            "inlining {} into {}",
            candidate.name,
            self.current.function.name
        );
        for arg in &call.args {
            self.emit_expression(&arg.value);
        }
        let arity = candidate.arity();
        let base = self.height() - arity;
        self.begin_scope();
        for (i, (param, arg)) in candidate.params.iter().zip(&call.args).enumerate() {
            let ty = self.type_of(&arg.value);
            self.declare_local_at(*param, ty, base + i);
        }

        self.inline_stack.push(candidate.name.clone());
        self.emit_expression(candidate.body);
        self.inline_stack.pop();

        for _ in 0..arity {
            self.emit(Opcode::Swap);
            self.emit(Opcode::Pop);
        }
        self.discard_scope();
    }

    // ========================================================================
    // Closures
    // ========================================================================

    /// Captured names and their types as seen from the enclosing function
    fn captures_of(&self, names: Vec<String>, uses_this: bool) -> Vec<(String, Type)> {
        let mut captures: Vec<(String, Type)> = names
            .into_iter()
            .map(|name| {
                let ty = self
                    .current
                    .resolve_local(&name)
                    .map_or(Type::Dynamic, |l| l.ty.clone());
                (name, ty)
            })
            .collect();
        let has_receiver = matches!(self.current.kind, FunctionKind::Method { is_static: false })
            || self.current.resolve_local("$this").is_some();
        if uses_this && has_receiver {
            let ty = self
                .class
                .as_ref()
                .map_or(Type::Dynamic, |c| Type::named(c.name.clone()));
            captures.push(("$this".to_string(), ty));
        }
        captures
    }

    /// Push the function constant and its captured values, then `CLOSURE`
    fn finish_closure(&mut self, function: crate::compiler::bytecode::Function, captures: &[(String, Type)]) {
        self.emit_value(Value::Function(Box::new(function)));
        for (name, _) in captures {
            if name == "$this" {
                self.emit_this();
            } else {
                self.emit_load_variable(name);
            }
        }
        let count = captures.len();
        self.emit_counted(Opcode::Closure, count, -(count as i32));
    }

    pub(super) fn emit_closure(&mut self, closure: &ClosureExpr) {
        let mut uses_this = UsesThis::default();
        walk_block(&mut uses_this, &closure.body);
        let captures = self.captures_of(closure.uses.clone(), uses_this.found);

        self.push_function("{closure}", FunctionKind::Closure, &closure.params, &captures, None);
        self.emit_function_body(&closure.body);
        let function = self.pop_function();
        self.finish_closure(function, &captures);
    }

    /// Arrow functions capture every free variable that is a local of the
    /// enclosing function
    pub(super) fn emit_arrow(&mut self, arrow: &ArrowFnExpr) {
        let params: FxHashSet<&str> = arrow.params.iter().map(|p| p.name.as_str()).collect();
        let mut names: Vec<String> = Vec::new();
        for name in variables_in(&arrow.body) {
            if !params.contains(name)
                && self.current.resolve_local(name).is_some()
                && !names.iter().any(|n| n == name)
            {
                names.push(name.to_string());
            }
        }
        let mut uses_this = UsesThis::default();
        uses_this.visit_expression(&arrow.body);
        let captures = self.captures_of(names, uses_this.found);

        self.push_function("{closure}", FunctionKind::Closure, &arrow.params, &captures, None);
        self.emit_expression(&arrow.body);
        self.emit(Opcode::Return);
        let function = self.pop_function();
        self.finish_closure(function, &captures);
    }
}

#[derive(Default)]
struct UsesThis {
    found: bool,
}

impl<'v> Visitor<'v> for UsesThis {
    fn visit_expression(&mut self, expr: &'v Expression) {
        if matches!(expr, Expression::This(_)) {
            self.found = true;
        }
        walk_expression(self, expr);
    }
}
