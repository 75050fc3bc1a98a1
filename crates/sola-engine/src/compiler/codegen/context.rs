//! Emitter Context
//!
//! Per-function emission state (locals, scopes, loops, operand-stack height)
//! and the low-level helpers every statement and expression goes through.

use std::mem;

use crate::compiler::bytecode::{ChunkError, Function, Opcode, Value};
use crate::compiler::optimize::{
    eval_const_expr, hoist_candidates, is_inlinable, loop_effects, signature, BoundsPattern,
    CseCache, CseEntry,
};
use crate::parser::ast::*;
use crate::parser::checker::CompileError;
use crate::parser::types::Type;

use super::Emitter;

/// Slots available to one frame, slot 0 included
pub const MAX_LOCALS: usize = 256;

/// What kind of body is being emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FunctionKind {
    /// File-level code; depth-0 variables are globals
    Main,
    Function,
    Method { is_static: bool },
    Closure,
}

/// Parameter layout of a function held in a local
#[derive(Debug, Clone)]
pub(super) struct CallShape {
    pub param_names: Vec<String>,
    pub min_arity: usize,
}

/// A named stack slot
#[derive(Debug, Clone)]
pub(super) struct Local {
    pub name: String,
    pub depth: usize,
    pub slot: u16,
    pub ty: Type,
    /// Set for nested named functions
    pub function: Option<CallShape>,
}

/// An enclosing loop or switch
#[derive(Debug)]
pub(super) struct LoopContext {
    /// `continue` target
    pub start: usize,
    pub break_jumps: Vec<usize>,
    /// Stack height `break` unwinds to
    pub break_height: usize,
    /// Stack height `continue` unwinds to
    pub continue_height: usize,
    /// Handlers installed outside the loop
    pub try_depth: usize,
    pub is_switch: bool,
}

/// State of the function whose chunk is being written
pub(super) struct FunctionState {
    pub function: Function,
    pub kind: FunctionKind,
    /// Name a nested function uses to call itself
    pub self_name: Option<String>,
    pub locals: Vec<Local>,
    pub scope_depth: usize,
    /// Operand-stack height, slot 0 included
    pub height: usize,
    pub max_slots: usize,
    pub loops: Vec<LoopContext>,
    pub cse: CseCache,
    pub try_depth: usize,
    pub bounds: Vec<BoundsPattern>,
    overflowed: bool,
}

impl FunctionState {
    pub fn new(function: Function, kind: FunctionKind, self_name: Option<String>) -> Self {
        Self {
            function,
            kind,
            self_name,
            locals: Vec::new(),
            scope_depth: 0,
            height: 1,
            max_slots: 1,
            loops: Vec::new(),
            cse: CseCache::default(),
            try_depth: 0,
            bounds: Vec::new(),
            overflowed: false,
        }
    }

    /// Innermost variable named `name`
    pub fn resolve_local(&self, name: &str) -> Option<&Local> {
        self.locals
            .iter()
            .rev()
            .find(|l| l.function.is_none() && l.name == name)
    }

    /// Innermost nested function named `name`
    pub fn resolve_function(&self, name: &str) -> Option<&Local> {
        self.locals
            .iter()
            .rev()
            .find(|l| l.function.is_some() && l.name == name)
    }

    /// Whether emission is inside a loop body (switches do not count)
    pub fn in_loop(&self) -> bool {
        self.loops.iter().any(|l| !l.is_switch)
    }

    /// Whether `object[index]` is known to be in bounds
    pub fn bounds_checked(&self, object: &Expression, index: &Expression) -> bool {
        self.bounds.iter().any(|b| b.covers(object, index))
    }
}

/// Turn a finished state into its function
pub(super) fn finish(state: FunctionState) -> Function {
    let mut function = state.function;
    function.local_count = state.max_slots;
    function.is_inlinable = is_inlinable(&function);
    function
}

/// Stack effect of opcodes whose effect does not depend on operands
fn fixed_effect(op: Opcode) -> i32 {
    match op {
        Opcode::Return => -1,
        Opcode::EnterCatch => 1,
        _ => op.stack_effect().unwrap_or(0),
    }
}

impl<'a> Emitter<'a> {
    // ========================================================================
    // Stack height
    // ========================================================================

    pub(super) fn height(&self) -> usize {
        self.current.height
    }

    pub(super) fn set_height(&mut self, height: usize) {
        self.current.height = height;
    }

    fn adjust(&mut self, effect: i32) {
        let height = self.current.height as i64 + effect as i64;
        self.current.height = height.max(0) as usize;
    }

    // ========================================================================
    // Raw emission
    // ========================================================================

    pub(super) fn emit(&mut self, op: Opcode) {
        let line = self.pos.line;
        self.current.function.chunk.emit(op, line);
        self.adjust(fixed_effect(op));
    }

    pub(super) fn emit_u16(&mut self, op: Opcode, operand: u16) {
        let line = self.pos.line;
        self.current.function.chunk.emit_u16(op, operand, line);
        self.adjust(fixed_effect(op));
    }

    /// Two u16 operands (`NEW_FIXED_ARRAY`, `GET_STATIC`, `SET_STATIC`)
    pub(super) fn emit_u16_pair(&mut self, op: Opcode, first: u16, second: u16, effect: i32) {
        let line = self.pos.line;
        let chunk = &mut self.current.function.chunk;
        chunk.emit_u16(op, first, line);
        chunk.write_u16(second, line);
        self.adjust(effect);
    }

    /// Instruction with a u16 element count and a count-dependent effect
    pub(super) fn emit_counted(&mut self, op: Opcode, count: usize, effect: i32) {
        let count = self.u16_operand(count, "element count");
        let line = self.pos.line;
        self.current.function.chunk.emit_u16(op, count, line);
        self.adjust(effect);
    }

    /// `CALL` or `TAIL_CALL` with `argc` arguments
    pub(super) fn emit_call_op(&mut self, op: Opcode, argc: usize) {
        let count = self.argument_count(argc);
        let line = self.pos.line;
        self.current.function.chunk.emit_u8(op, count, line);
        let effect = match op {
            Opcode::TailCall => -(argc as i32) - 1,
            _ => -(argc as i32),
        };
        self.adjust(effect);
    }

    /// `CALL_METHOD name, argc`
    pub(super) fn emit_call_method(&mut self, name: &str, argc: usize) {
        let name = self.name_constant(name);
        let count = self.argument_count(argc);
        let line = self.pos.line;
        let chunk = &mut self.current.function.chunk;
        chunk.emit_u16(Opcode::CallMethod, name, line);
        chunk.write_u8(count, line);
        self.adjust(-(argc as i32));
    }

    /// `CALL_STATIC class, name, argc`
    pub(super) fn emit_call_static(&mut self, class: &str, name: &str, argc: usize) {
        let class = self.name_constant(class);
        let name = self.name_constant(name);
        let count = self.argument_count(argc);
        let line = self.pos.line;
        let chunk = &mut self.current.function.chunk;
        chunk.emit_u16(Opcode::CallStatic, class, line);
        chunk.write_u16(name, line);
        chunk.write_u8(count, line);
        self.adjust(1 - argc as i32);
    }

    fn argument_count(&mut self, argc: usize) -> u8 {
        u8::try_from(argc).unwrap_or_else(|_| {
            self.limit_exceeded(format!("{} arguments in one call (limit 255)", argc));
            u8::MAX
        })
    }

    fn u16_operand(&mut self, value: usize, what: &str) -> u16 {
        u16::try_from(value).unwrap_or_else(|_| {
            self.limit_exceeded(format!("{} {} does not fit in 16 bits", what, value));
            u16::MAX
        })
    }

    // ========================================================================
    // Constants
    // ========================================================================

    pub(super) fn constant(&mut self, value: Value) -> u16 {
        match self.current.function.chunk.add_constant(value) {
            Ok(index) => index,
            Err(err) => {
                self.chunk_error(err);
                0
            }
        }
    }

    /// Pool index of a name operand
    pub(super) fn name_constant(&mut self, name: &str) -> u16 {
        self.constant(Value::string(name))
    }

    /// `PUSH` a constant; scalar literals use their dedicated opcodes
    pub(super) fn emit_value(&mut self, value: Value) {
        match value {
            Value::Null => self.emit(Opcode::Null),
            Value::Bool(true) => self.emit(Opcode::True),
            Value::Bool(false) => self.emit(Opcode::False),
            Value::Array(items) => {
                let count = items.len();
                for item in items {
                    self.emit_value(item);
                }
                self.emit_counted(Opcode::NewArray, count, 1 - count as i32);
            }
            other => {
                let index = self.constant(other);
                self.emit_u16(Opcode::Push, index);
            }
        }
    }

    // ========================================================================
    // Jumps
    // ========================================================================

    pub(super) fn emit_jump(&mut self, op: Opcode) -> usize {
        let line = self.pos.line;
        self.current.function.chunk.emit_jump(op, line)
    }

    pub(super) fn patch_jump(&mut self, offset: usize) {
        if let Err(err) = self.current.function.chunk.patch_jump(offset) {
            self.chunk_error(err);
        }
    }

    pub(super) fn emit_loop(&mut self, start: usize) {
        let line = self.pos.line;
        if let Err(err) = self.current.function.chunk.emit_loop(start, line) {
            self.chunk_error(err);
        }
    }

    pub(super) fn code_len(&self) -> usize {
        self.current.function.chunk.len()
    }

    // ========================================================================
    // Errors
    // ========================================================================

    pub(super) fn error(&mut self, err: CompileError) {
        self.errors.push(err);
    }

    fn chunk_error(&mut self, err: ChunkError) {
        self.limit_exceeded(err.to_string());
    }

    fn limit_exceeded(&mut self, what: String) {
        let pos = self.pos.clone();
        self.error(CompileError::LimitExceeded { what, pos });
    }

    // ========================================================================
    // Scopes and locals
    // ========================================================================

    pub(super) fn begin_scope(&mut self) {
        self.current.scope_depth += 1;
    }

    /// Leave a scope, popping its locals
    pub(super) fn end_scope(&mut self) {
        let depth = self.current.scope_depth.saturating_sub(1);
        self.current.scope_depth = depth;
        while self.current.locals.last().is_some_and(|l| l.depth > depth) {
            self.current.locals.pop();
            self.emit(Opcode::Pop);
        }
        self.current.cse.prune(depth);
    }

    /// Leave a scope whose values the caller already removed from the stack
    pub(super) fn discard_scope(&mut self) {
        let depth = self.current.scope_depth.saturating_sub(1);
        self.current.scope_depth = depth;
        self.current.locals.retain(|l| l.depth <= depth);
        self.current.cse.prune(depth);
    }

    /// Turn the value on top of the stack into a local
    pub(super) fn declare_local(&mut self, name: impl Into<String>, ty: Type) -> u16 {
        let slot = self.current.height.saturating_sub(1);
        self.declare_local_at(name, ty, slot)
    }

    pub(super) fn declare_local_at(&mut self, name: impl Into<String>, ty: Type, slot: usize) -> u16 {
        let name = name.into();
        self.current.cse.invalidate(&name);
        let slot = self.checked_slot(slot);
        let depth = self.current.scope_depth;
        self.current.locals.push(Local {
            name,
            depth,
            slot,
            ty,
            function: None,
        });
        slot
    }

    /// Declare the function on top of the stack as a callable local
    pub(super) fn declare_function_local(&mut self, name: &str, shape: CallShape) -> u16 {
        let slot = self.current.height.saturating_sub(1);
        let slot = self.checked_slot(slot);
        let depth = self.current.scope_depth;
        self.current.locals.push(Local {
            name: name.to_string(),
            depth,
            slot,
            ty: Type::Dynamic,
            function: Some(shape),
        });
        slot
    }

    /// Slot of the value on top of the stack, for unnamed temporaries
    pub(super) fn top_slot(&mut self) -> u16 {
        let slot = self.current.height.saturating_sub(1);
        self.checked_slot(slot)
    }

    fn checked_slot(&mut self, slot: usize) -> u16 {
        if slot >= MAX_LOCALS {
            if !self.current.overflowed {
                self.current.overflowed = true;
                let pos = self.pos.clone();
                self.error(CompileError::TooManyLocals {
                    limit: MAX_LOCALS,
                    pos,
                });
            }
            return (MAX_LOCALS - 1) as u16;
        }
        self.current.max_slots = self.current.max_slots.max(slot + 1);
        slot as u16
    }

    /// Inferred type of an expression, `dynamic` when unknown
    pub(super) fn type_of(&self, expr: &Expression) -> Type {
        self.types
            .get(&expr.node_id())
            .cloned()
            .unwrap_or(Type::Dynamic)
    }

    // ========================================================================
    // Functions
    // ========================================================================

    /// Start emitting a new function; parameters and captures become the
    /// first locals.
    pub(super) fn push_function(
        &mut self,
        name: &str,
        kind: FunctionKind,
        params: &[Param],
        captures: &[(String, Type)],
        self_name: Option<String>,
    ) {
        let mut function = Function::new(name, self.source_file.clone());
        function.arity = params.len();
        function.min_arity = min_arity(params);
        function.is_variadic = params.last().is_some_and(|p| p.variadic);
        function.upvalue_count = captures.len();
        function.default_values = params[function.min_arity..]
            .iter()
            .filter(|p| !p.variadic)
            .map(|p| self.default_value(p))
            .collect();

        let state = FunctionState::new(function, kind, self_name);
        let outer = mem::replace(&mut self.current, state);
        self.enclosing.push(outer);

        for param in params {
            let ty = param.ty.as_ref().map(Type::from_node).unwrap_or(Type::Dynamic);
            let ty = if param.variadic { Type::array(ty) } else { ty };
            self.current.height += 1;
            self.declare_local(param.name.clone(), ty);
        }
        for (name, ty) in captures {
            self.current.height += 1;
            self.declare_local(name.clone(), ty.clone());
        }
    }

    /// Finish the current function and return to the enclosing one
    pub(super) fn pop_function(&mut self) -> Function {
        let outer = self.enclosing.pop().unwrap_or_else(|| {
            FunctionState::new(
                Function::new("<main>", self.source_file.clone()),
                FunctionKind::Main,
                None,
            )
        });
        let finished = mem::replace(&mut self.current, outer);
        finish(finished)
    }

    fn default_value(&mut self, param: &Param) -> Value {
        let Some(default) = &param.default else {
            return Value::Null;
        };
        self.constant_value(default).unwrap_or_else(|| {
            self.error(CompileError::ConstantRequired {
                context: format!("default value of parameter ${}", param.name),
                pos: default.pos().clone(),
            });
            Value::Null
        })
    }

    /// Compile-time value of a default initialiser: folded scalars, literal
    /// arrays and maps of constants, enum members and `::class`
    pub(super) fn constant_value(&self, expr: &Expression) -> Option<Value> {
        if let Some(value) = eval_const_expr(expr) {
            return Some(value);
        }
        match expr {
            Expression::Array(a) => a
                .elements
                .iter()
                .map(|e| self.constant_value(e))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Expression::Map(m) => m
                .entries
                .iter()
                .map(|(k, v)| Some((self.constant_value(k)?, self.constant_value(v)?)))
                .collect::<Option<Vec<_>>>()
                .map(Value::Map),
            Expression::StaticProperty(sp) => {
                let class = self.resolve_class_name(&sp.class);
                self.symbols.is_enum(&class).then(|| Value::Enum {
                    name: class,
                    member: sp.property.clone(),
                })
            }
            Expression::ClassName(c) => Some(Value::string(self.resolve_class_name(&c.class))),
            _ => None,
        }
    }

    // ========================================================================
    // Loops
    // ========================================================================

    pub(super) fn enter_loop(&mut self, start: usize, is_switch: bool) {
        let height = self.current.height;
        let try_depth = self.current.try_depth;
        self.current.loops.push(LoopContext {
            start,
            break_jumps: Vec::new(),
            break_height: height,
            continue_height: height,
            try_depth,
            is_switch,
        });
    }

    /// Pop the innermost loop and point its `break`s here
    pub(super) fn leave_loop(&mut self) {
        if let Some(ctx) = self.current.loops.pop() {
            for jump in ctx.break_jumps {
                self.patch_jump(jump);
            }
        }
    }

    /// Loop-entry optimiser work: forget cached values the loop writes and
    /// hoist its invariant expressions into `$__licm_<n>` locals.
    pub(super) fn prepare_loop(&mut self, body: &[Statement], header: &[&Expression], bindings: &[&str]) {
        if !self.options.cse && !self.options.licm {
            return;
        }
        let effects = loop_effects(body, header, bindings);
        self.current.cse.invalidate_all(&effects.mutated);
        if effects.has_calls {
            self.current.cse.invalidate_globals();
        }
        if !self.options.licm {
            return;
        }

        let state = &self.current;
        let candidates = hoist_candidates(body, &effects, &|v| {
            state.resolve_local(v).is_some() || !effects.has_calls
        });
        for expr in candidates {
            let Some(sig) = signature(expr) else {
                continue;
            };
            log::trace!("hoisting {} out of a loop in {}", sig, self.current.function.name);
            self.emit_expression(expr);
            let name = self.current.cse.fresh_name("licm");
            let ty = self.type_of(expr);
            let slot = self.declare_local(name, ty);
            self.register_cse(sig, slot, expr);
        }
    }

    pub(super) fn register_cse(&mut self, signature: String, slot: u16, expr: &Expression) {
        let vars: Vec<String> = variables_in(expr).into_iter().map(str::to_string).collect();
        let reads_globals = vars.iter().any(|v| self.current.resolve_local(v).is_none());
        let depth = self.current.scope_depth;
        self.current.cse.insert(CseEntry {
            signature,
            slot,
            depth,
            vars,
            reads_globals,
        });
    }

    /// Slot caching the value of `expr`, when one is live
    pub(super) fn cached_slot(&self, expr: &Expression) -> Option<u16> {
        if self.current.cse.is_empty() || !self.current.in_loop() {
            return None;
        }
        let sig = signature(expr)?;
        self.current.cse.lookup(&sig)
    }
}
