//! Type checker - validates types for expressions and statements
//!
//! The checker walks every top-level statement, class method and function
//! body after the binder has filled the symbol table. It keeps a stack of
//! lexical scopes, each with its declared variables and a narrowing overlay,
//! records the inferred type of every expression, and runs the dataflow
//! analyses once per function body. Diagnostics accumulate; checking never
//! stops at the first error.

use rustc_hash::{FxHashMap, FxHashSet};

use super::binder::function_signature;
use super::error::{CheckWarning, CompileError};
use super::exhaustiveness::{check_switch, ExhaustivenessResult};
use super::symbols::{FunctionSig, SymbolTable};
use super::type_guards::extract_guards;
use crate::parser::ast::*;
use crate::parser::flow::analyze_function;
use crate::parser::types::{base_name, Type, TypeGuard, TypeRelation};

/// Inferred type of every checked expression, keyed by [`Expression::node_id`]
pub type InferredTypes = FxHashMap<usize, Type>;

/// Result of checking one file
#[derive(Debug, Default)]
pub struct CheckResult {
    /// Expression types for the emitter
    pub expr_types: InferredTypes,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<CheckWarning>,
}

impl CheckResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Inferred type of `expr`, if it was checked
    pub fn type_of(&self, expr: &Expression) -> Option<&Type> {
        self.expr_types.get(&expr.node_id())
    }
}

/// One lexical scope
#[derive(Debug, Default)]
pub(super) struct Scope {
    pub(super) vars: FxHashMap<String, Type>,
    pub(super) narrowed: FxHashMap<String, Type>,
}

/// The function whose body is being checked
#[derive(Debug)]
pub(super) struct FunctionContext {
    /// `None` while collecting the returns of an unannotated closure
    pub(super) return_type: Option<Type>,
    pub(super) returns: Vec<Type>,
}

/// The class whose methods are being checked
#[derive(Debug, Clone)]
pub(super) struct ClassContext {
    pub(super) name: String,
    pub(super) type_params: Vec<String>,
}

impl ClassContext {
    /// Type of `$this`
    pub(super) fn self_type(&self) -> Type {
        if self.type_params.is_empty() {
            Type::named(self.name.clone())
        } else {
            Type::Generic {
                base: self.name.clone(),
                args: self.type_params.iter().cloned().map(Type::Param).collect(),
            }
        }
    }
}

/// Saved state around a nested function body
struct SavedFrame {
    scopes: Vec<Scope>,
    function: Option<FunctionContext>,
    loop_depth: usize,
    switch_depth: usize,
    type_params_len: usize,
}

/// Type checker
///
/// Borrows the symbol table read-only; the binder has already run.
pub struct TypeChecker<'a> {
    pub(super) symbols: &'a SymbolTable,
    pub(super) relation: TypeRelation<'a>,
    pub(super) scopes: Vec<Scope>,
    pub(super) class: Option<ClassContext>,
    pub(super) function: Option<FunctionContext>,
    /// Type parameters visible to annotations
    pub(super) type_params: Vec<String>,
    /// Functions declared inside function bodies
    pub(super) local_functions: FxHashMap<String, FunctionSig>,
    loop_depth: usize,
    switch_depth: usize,
    pub(super) expr_types: InferredTypes,
    pub(super) errors: Vec<CompileError>,
    pub(super) warnings: Vec<CheckWarning>,
}

impl<'a> TypeChecker<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            relation: TypeRelation::new(symbols),
            scopes: vec![Scope::default()],
            class: None,
            function: None,
            type_params: Vec::new(),
            local_functions: FxHashMap::default(),
            loop_depth: 0,
            switch_depth: 0,
            expr_types: InferredTypes::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Check a whole file: declarations first, then the top-level code
    pub fn check_file(mut self, file: &File) -> CheckResult {
        log::trace!("checking {}", file.path);
        for decl in &file.declarations {
            match decl {
                Declaration::Class(class) => self.check_class(class),
                Declaration::Interface(iface) => self.check_interface(iface),
                Declaration::Enum(_) | Declaration::TypeAlias(_) | Declaration::NewType(_) => {}
            }
        }

        self.check_block(&file.statements);
        self.run_flow(&file.statements, &[], &FxHashSet::default());

        CheckResult {
            expr_types: self.expr_types,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    // ========================================================================
    // Diagnostics and scopes
    // ========================================================================

    pub(super) fn error(&mut self, err: CompileError) {
        self.errors.push(err);
    }

    pub(super) fn compatible(&self, actual: &Type, expected: &Type) -> bool {
        self.relation.is_compatible(actual, expected)
    }

    /// Convert an annotation with the visible type parameters
    pub(super) fn resolve_node(&self, node: &TypeNode) -> Type {
        Type::from_node_with(node, &self.type_params)
    }

    pub(super) fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub(super) fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn current_scope(&mut self) -> &mut Scope {
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }

    pub(super) fn declare(&mut self, name: &str, ty: Type) {
        let scope = self.current_scope();
        scope.narrowed.remove(name);
        scope.vars.insert(name.to_string(), ty);
    }

    /// Type of `$name` as seen here: narrowed, then local, then global
    pub(super) fn lookup_var(&self, name: &str) -> Option<Type> {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.narrowed.get(name) {
                return Some(ty.clone());
            }
            if let Some(ty) = scope.vars.get(name) {
                return Some(ty.clone());
            }
        }
        self.symbols.global(name).cloned()
    }

    /// Declared type of `$name`, ignoring narrowing
    pub(super) fn declared_var(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|s| s.vars.get(name).cloned())
            .or_else(|| self.symbols.global(name).cloned())
    }

    /// Drop every narrowing of `$name` after it is reassigned
    pub(super) fn clear_narrowing(&mut self, name: &str) {
        for scope in &mut self.scopes {
            scope.narrowed.remove(name);
        }
    }

    /// Apply guards to the innermost scope
    pub(super) fn apply_guards(&mut self, guards: &[TypeGuard]) {
        for guard in guards {
            let Some(original) = self.lookup_var(&guard.var) else {
                continue;
            };
            let narrowed = self.symbols.narrow(&original, &guard.ty, guard.positive);
            self.current_scope().narrowed.insert(guard.var.clone(), narrowed);
        }
    }

    pub(super) fn guards_of(&self, cond: &Expression, positive: bool) -> Vec<TypeGuard> {
        let mut out = Vec::new();
        let resolve = |node: &TypeNode| self.resolve_node(node);
        extract_guards(cond, positive, &resolve, &mut out);
        out
    }

    /// Enter a nested function body with a fresh scope stack
    fn enter_function(&mut self, return_type: Option<Type>, type_params: &[String]) -> SavedFrame {
        let saved = SavedFrame {
            scopes: std::mem::replace(&mut self.scopes, vec![Scope::default()]),
            function: self.function.replace(FunctionContext {
                return_type,
                returns: Vec::new(),
            }),
            loop_depth: std::mem::take(&mut self.loop_depth),
            switch_depth: std::mem::take(&mut self.switch_depth),
            type_params_len: self.type_params.len(),
        };
        self.type_params.extend(type_params.iter().cloned());
        saved
    }

    /// Leave a nested function body; returns the collected return types
    fn leave_function(&mut self, saved: SavedFrame) -> Vec<Type> {
        self.scopes = saved.scopes;
        self.loop_depth = saved.loop_depth;
        self.switch_depth = saved.switch_depth;
        self.type_params.truncate(saved.type_params_len);
        let finished = std::mem::replace(&mut self.function, saved.function);
        finished.map(|f| f.returns).unwrap_or_default()
    }

    fn declare_params(&mut self, params: &[Param]) {
        for param in params {
            let mut ty = param
                .ty
                .as_ref()
                .map(|t| self.resolve_node(t))
                .unwrap_or(Type::Dynamic);
            if param.variadic {
                ty = Type::array(ty);
            }
            if let Some(default) = &param.default {
                let actual = self.infer(default);
                if !self.compatible(&actual, &ty) {
                    self.error(CompileError::AssignMismatch {
                        expected: ty.to_string(),
                        actual: actual.to_string(),
                        pos: default.pos().clone(),
                    });
                }
            }
            self.declare(&param.name, ty);
        }
    }

    // ========================================================================
    // Functions, closures and classes
    // ========================================================================

    /// Check a function body: parameters, statements, dataflow
    pub(super) fn check_function_body(
        &mut self,
        name: &str,
        type_params: &[TypeParam],
        params: &[Param],
        return_type: Option<&TypeNode>,
        body: &[Statement],
        pos: &Pos,
    ) {
        let generic_names: Vec<String> = type_params.iter().map(|p| p.name.clone()).collect();
        let saved = self.enter_function(None, &generic_names);
        let declared = return_type
            .map(|t| self.resolve_node(t))
            .unwrap_or(Type::Void);
        if let Some(function) = self.function.as_mut() {
            function.return_type = Some(declared.clone());
        }
        self.declare_params(params);
        self.check_block(body);

        let param_names: Vec<&str> = params.iter().map(|p| p.name.as_str()).collect();
        let exempt: FxHashSet<String> = mutated_variables(body)
            .into_iter()
            .filter(|n| self.symbols.global(n).is_some() && self.declared_var(n).is_none())
            .collect();
        let all_return = self.run_flow(body, &param_names, &exempt);
        if !declared.is_void() && !declared.is_error() && !all_return {
            self.error(CompileError::MissingReturn {
                function: name.to_string(),
                pos: pos.clone(),
            });
        }
        self.leave_function(saved);
    }

    /// Check a closure body; returns its function type
    pub(super) fn check_closure(&mut self, closure: &ClosureExpr) -> Type {
        let mut captured = Vec::with_capacity(closure.uses.len());
        for name in &closure.uses {
            match self.lookup_var(name) {
                Some(ty) => captured.push((name.clone(), ty)),
                None => {
                    self.error(CompileError::UndefinedVariable {
                        name: name.clone(),
                        pos: closure.pos.clone(),
                    });
                    captured.push((name.clone(), Type::Error));
                }
            }
        }
        let declared = closure.return_type.as_ref().map(|t| self.resolve_node(t));
        let saved = self.enter_function(declared.clone(), &[]);
        for (name, ty) in captured {
            self.declare(&name, ty);
        }
        self.declare_params(&closure.params);
        let param_types: Vec<Type> = closure
            .params
            .iter()
            .map(|p| p.ty.as_ref().map(|t| self.resolve_node(t)).unwrap_or(Type::Dynamic))
            .collect();
        self.check_block(&closure.body);

        let param_names: Vec<&str> = closure.params.iter().map(|p| p.name.as_str()).collect();
        let exempt: FxHashSet<String> = closure.uses.iter().cloned().collect();
        let all_return = self.run_flow(&closure.body, &param_names, &exempt);
        if let Some(ret) = &declared {
            if !ret.is_void() && !ret.is_error() && !all_return {
                self.error(CompileError::MissingReturn {
                    function: "{closure}".to_string(),
                    pos: closure.pos.clone(),
                });
            }
        }
        let returns = self.leave_function(saved);
        let ret = match declared {
            Some(ret) => ret,
            None if returns.is_empty() => Type::Void,
            None => self.join_types(returns),
        };
        Type::func(param_types, ret)
    }

    fn check_nested_function(&mut self, decl: &FunctionDecl) {
        let sig = function_signature(
            &decl.type_params,
            &decl.params,
            decl.return_type.as_ref(),
            &self.type_params,
        );
        self.local_functions.insert(decl.name.clone(), sig);
        self.check_function_body(
            &decl.name,
            &decl.type_params,
            &decl.params,
            decl.return_type.as_ref(),
            &decl.body,
            &decl.pos,
        );
    }

    fn check_class(&mut self, class: &ClassDecl) {
        let name = self.symbols.qualify(&class.name);

        if let Some(parent) = &class.parent {
            let parent_name = parent.type_name();
            let parent_base = base_name(&parent_name);
            if !self.symbols.class_exists(parent_base) {
                self.error(CompileError::UndefinedClass {
                    name: parent_base.to_string(),
                    pos: class.pos.clone(),
                });
            } else if self.symbols.is_final(parent_base) {
                self.error(CompileError::FinalClassExtended {
                    class: class.name.clone(),
                    parent: parent_base.to_string(),
                    pos: class.pos.clone(),
                });
            }
        }
        for iface in &class.interfaces {
            if let Err(message) = self.symbols.validate_implements(&name, iface) {
                self.error(CompileError::InterfaceConformance {
                    message,
                    pos: class.pos.clone(),
                });
            }
        }

        let mut type_params: Vec<String> = class.type_params.iter().map(|p| p.name.clone()).collect();
        for bound in &class.where_clause {
            if !type_params.contains(&bound.name) {
                type_params.push(bound.name.clone());
            }
        }
        let saved_class = self.class.replace(ClassContext {
            name: name.clone(),
            type_params: type_params.clone(),
        });
        let saved_len = self.type_params.len();
        self.type_params.extend(type_params);

        for prop in &class.properties {
            let (Some(ty), Some(default)) = (&prop.ty, &prop.default) else {
                if let Some(default) = &prop.default {
                    self.infer(default);
                }
                continue;
            };
            let expected = self.resolve_node(ty);
            let actual = self.infer(default);
            if !self.compatible(&actual, &expected) {
                self.error(CompileError::PropertyMismatch {
                    class: class.name.clone(),
                    property: prop.name.clone(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                    pos: default.pos().clone(),
                });
            }
        }

        for method in &class.methods {
            if let Some(body) = &method.body {
                let qualified = format!("{}::{}", class.name, method.name);
                self.check_function_body(
                    &qualified,
                    &method.type_params,
                    &method.params,
                    method.return_type.as_ref(),
                    body,
                    &method.pos,
                );
            }
        }

        self.type_params.truncate(saved_len);
        self.class = saved_class;
    }

    fn check_interface(&mut self, iface: &InterfaceDecl) {
        for parent in &iface.parents {
            if !self.symbols.is_interface(parent) {
                self.error(CompileError::UndefinedClass {
                    name: parent.clone(),
                    pos: iface.pos.clone(),
                });
            }
        }
    }

    /// Run the dataflow analyses over one body; returns whether every path
    /// returns
    fn run_flow(&mut self, body: &[Statement], params: &[&str], exempt: &FxHashSet<String>) -> bool {
        let report = analyze_function(body, params, exempt);
        for pos in report.unreachable {
            self.warnings.push(CheckWarning::UnreachableCode { pos: pos.clone() });
        }
        for (name, pos) in report.uninitialized {
            self.warnings.push(CheckWarning::UninitializedVariable {
                name,
                pos: pos.clone(),
            });
        }
        report.all_paths_return
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(super) fn check_block(&mut self, stmts: &[Statement]) {
        for stmt in stmts {
            self.check_statement(stmt);
        }
    }

    fn check_scoped_block(&mut self, stmts: &[Statement], guards: &[TypeGuard]) {
        self.push_scope();
        self.apply_guards(guards);
        self.check_block(stmts);
        self.pop_scope();
    }

    fn check_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Expression(s) => {
                self.infer(&s.expr);
            }
            Statement::VarDecl(decl) => self.check_var_decl(decl),
            Statement::MultiAssign(m) => self.check_multi_assign(m),
            Statement::If(s) => self.check_if(s),
            Statement::While(s) => {
                self.infer(&s.condition);
                let guards = self.guards_of(&s.condition, true);
                self.loop_depth += 1;
                self.check_scoped_block(&s.body, &guards);
                self.loop_depth -= 1;
            }
            Statement::For(s) => {
                self.push_scope();
                if let Some(init) = &s.init {
                    self.check_statement(init);
                }
                let mut guards = Vec::new();
                if let Some(cond) = &s.condition {
                    self.infer(cond);
                    guards = self.guards_of(cond, true);
                }
                self.loop_depth += 1;
                self.check_scoped_block(&s.body, &guards);
                self.loop_depth -= 1;
                if let Some(update) = &s.update {
                    self.infer(update);
                }
                self.pop_scope();
            }
            Statement::Foreach(s) => self.check_foreach(s),
            Statement::Switch(s) => self.check_switch_stmt(s),
            Statement::Break(pos) => {
                if self.loop_depth == 0 && self.switch_depth == 0 {
                    self.error(CompileError::BreakOutsideLoop { pos: pos.clone() });
                }
            }
            Statement::Continue(pos) => {
                if self.loop_depth == 0 {
                    self.error(CompileError::ContinueOutsideLoop { pos: pos.clone() });
                }
            }
            Statement::Return(s) => self.check_return(s),
            Statement::Echo(s) => {
                self.infer(&s.value);
            }
            Statement::Try(s) => self.check_try(s),
            Statement::Throw(s) => {
                let ty = self.infer(&s.value);
                if !self.is_throwable(&ty) {
                    self.error(CompileError::InvalidThrow {
                        ty: ty.to_string(),
                        pos: s.value.pos().clone(),
                    });
                }
            }
            Statement::Block(b) => self.check_scoped_block(&b.body, &[]),
            Statement::Function(decl) => {
                if self.function.is_some() {
                    self.check_nested_function(decl);
                } else {
                    self.check_function_body(
                        &decl.name,
                        &decl.type_params,
                        &decl.params,
                        decl.return_type.as_ref(),
                        &decl.body,
                        &decl.pos,
                    );
                }
            }
            Statement::Unset(s) => {
                self.infer(&s.target);
                if !matches!(s.target, Expression::Index(_) | Expression::Property(_)) {
                    self.error(CompileError::InvalidAssignTarget {
                        pos: s.target.pos().clone(),
                    });
                }
            }
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) {
        let redeclared = self
            .scopes
            .last()
            .map_or(false, |scope| scope.vars.contains_key(&decl.name));
        if redeclared {
            self.error(CompileError::Redeclaration {
                name: decl.name.clone(),
                pos: decl.pos.clone(),
            });
        }

        let ty = match (&decl.ty, &decl.init) {
            (Some(node), Some(init)) => {
                let expected = self.resolve_node(node);
                self.check_initializer(&expected, init);
                expected
            }
            (Some(node), None) => self.resolve_node(node),
            (None, Some(init)) => {
                let actual = self.infer(init);
                if decl.is_short && actual.is_error() {
                    Type::Error
                } else if decl.is_short && (actual.is_void() || actual.is_null()) {
                    self.error(CompileError::CannotInfer {
                        name: decl.name.clone(),
                        actual: actual.to_string(),
                        pos: init.pos().clone(),
                    });
                    Type::Error
                } else {
                    widen_inferred(actual)
                }
            }
            (None, None) => Type::Dynamic,
        };
        self.declare(&decl.name, ty);
    }

    /// Check an initialiser against a declared type. Array literals for
    /// fixed-size arrays and `byte[]` are checked element by element.
    fn check_initializer(&mut self, expected: &Type, init: &Expression) {
        if let (Expression::Array(lit), Some(element)) = (init, expected.element_type()) {
            let element = element.clone();
            for item in &lit.elements {
                let actual = self.infer(item);
                if !self.compatible(&actual, &element) {
                    self.error(CompileError::AssignMismatch {
                        expected: element.to_string(),
                        actual: actual.to_string(),
                        pos: item.pos().clone(),
                    });
                }
            }
            if let Type::FixedArray(_, size) = expected {
                if lit.elements.len() > *size {
                    self.error(CompileError::AssignMismatch {
                        expected: expected.to_string(),
                        actual: Type::FixedArray(Box::new(element), lit.elements.len()).to_string(),
                        pos: init.pos().clone(),
                    });
                }
            }
            self.expr_types.insert(init.node_id(), expected.clone());
            return;
        }
        let actual = self.infer(init);
        if !self.compatible(&actual, expected) {
            self.error(CompileError::AssignMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
                pos: init.pos().clone(),
            });
        }
    }

    fn check_multi_assign(&mut self, m: &MultiAssign) {
        let value = self.infer(&m.value);
        let resolved = self.symbols.resolve_alias(&value);
        let types: Vec<Type> = match &resolved {
            Type::Tuple(members) if members.len() == m.names.len() => members.clone(),
            Type::Array(el) | Type::FixedArray(el, _) => vec![(**el).clone(); m.names.len()],
            Type::AnyArray | Type::Dynamic | Type::Param(_) => vec![Type::Dynamic; m.names.len()],
            Type::Error => vec![Type::Error; m.names.len()],
            _ => {
                self.error(CompileError::DestructureCount {
                    expected: m.names.len(),
                    actual: value.to_string(),
                    pos: m.value.pos().clone(),
                });
                vec![Type::Error; m.names.len()]
            }
        };
        for (name, ty) in m.names.iter().zip(types) {
            self.assign_variable(name, ty, &m.pos);
        }
    }

    /// Assign `ty` to `$name`, declaring it implicitly when unknown
    pub(super) fn assign_variable(&mut self, name: &str, ty: Type, pos: &Pos) {
        match self.declared_var(name) {
            Some(expected) => {
                if !self.compatible(&ty, &expected) {
                    self.error(CompileError::AssignMismatch {
                        expected: expected.to_string(),
                        actual: ty.to_string(),
                        pos: pos.clone(),
                    });
                }
                self.clear_narrowing(name);
            }
            None => self.declare(name, widen_inferred(ty)),
        }
    }

    fn check_if(&mut self, s: &IfStmt) {
        self.infer(&s.condition);
        let positive = self.guards_of(&s.condition, true);
        let mut negatives = self.guards_of(&s.condition, false);
        self.check_scoped_block(&s.then_branch, &positive);

        for elseif in &s.else_ifs {
            self.push_scope();
            self.apply_guards(&negatives);
            self.infer(&elseif.condition);
            let guards = self.guards_of(&elseif.condition, true);
            self.check_scoped_block(&elseif.body, &guards);
            self.pop_scope();
            negatives.extend(self.guards_of(&elseif.condition, false));
        }

        match &s.else_branch {
            Some(body) => self.check_scoped_block(body, &negatives),
            None => {
                // `if ($x === null) { return; }` narrows what follows
                let exits = s.then_branch.last().map_or(false, Statement::is_terminator);
                if exits && s.else_ifs.is_empty() {
                    self.apply_guards(&negatives);
                }
            }
        }
    }

    fn check_foreach(&mut self, s: &ForeachStmt) {
        let iterable = self.infer(&s.iterable);
        let resolved = self.symbols.resolve_alias(&iterable);
        let (key, value) = match &resolved {
            Type::Array(el) | Type::FixedArray(el, _) => (Type::Int, (**el).clone()),
            Type::Map(k, v) => ((**k).clone(), (**v).clone()),
            Type::AnyArray => (Type::Int, Type::Dynamic),
            Type::AnyMap | Type::SuperArray | Type::Dynamic | Type::Param(_) => {
                (Type::Dynamic, Type::Dynamic)
            }
            Type::Error => (Type::Error, Type::Error),
            _ => {
                self.error(CompileError::NotIterable {
                    ty: iterable.to_string(),
                    pos: s.iterable.pos().clone(),
                });
                (Type::Error, Type::Error)
            }
        };
        self.push_scope();
        if let Some(k) = &s.key {
            self.declare(k, key);
        }
        self.declare(&s.value, value);
        self.loop_depth += 1;
        self.check_scoped_block(&s.body, &[]);
        self.loop_depth -= 1;
        self.pop_scope();
    }

    fn check_switch_stmt(&mut self, s: &SwitchStmt) {
        let subject = self.infer(&s.subject);
        if let Type::Named(name) = self.symbols.resolve_alias(&subject) {
            if self.symbols.is_enum(&name) {
                if let ExhaustivenessResult::Missing(missing) = check_switch(s, &name, self.symbols) {
                    self.error(CompileError::NonExhaustiveSwitch {
                        enum_name: name.clone(),
                        missing,
                        pos: s.subject.pos().clone(),
                    });
                }
            }
        }
        self.switch_depth += 1;
        for case in &s.cases {
            let value = self.infer(&case.value);
            let comparable = subject.is_null()
                || value.is_null()
                || self.compatible(&value, &subject)
                || self.compatible(&subject, &value);
            if !comparable {
                self.error(CompileError::InvalidBinaryOp {
                    op: "==".to_string(),
                    left: subject.to_string(),
                    right: value.to_string(),
                    pos: case.value.pos().clone(),
                });
            }
            self.check_scoped_block(&case.body, &[]);
        }
        if let Some(default) = &s.default {
            self.check_scoped_block(default, &[]);
        }
        self.switch_depth -= 1;
    }

    fn check_return(&mut self, s: &ReturnStmt) {
        let actual: Vec<Type> = s.values.iter().map(|v| self.infer(v)).collect();
        let Some(function) = &self.function else {
            return;
        };
        let Some(expected) = function.return_type.clone() else {
            let ty = match actual.len() {
                0 => Type::Void,
                1 => actual[0].clone(),
                _ => Type::Tuple(actual),
            };
            if let Some(function) = self.function.as_mut() {
                function.returns.push(ty);
            }
            return;
        };

        if expected.is_error() {
            return;
        }
        let expected_values: Vec<Type> = match self.symbols.resolve_alias(&expected) {
            Type::Void => Vec::new(),
            Type::Tuple(members) if actual.len() > 1 => members,
            _ => vec![expected.clone()],
        };
        if expected_values.len() != actual.len() {
            // `return;` is fine wherever null is
            let bare_null = actual.is_empty() && (expected.is_nullable() || expected.is_dynamic());
            if !bare_null {
                self.error(CompileError::ReturnCount {
                    expected: expected_values.len(),
                    actual: actual.len(),
                    pos: s.pos.clone(),
                });
            }
            return;
        }
        for ((value, actual), expected) in s.values.iter().zip(&actual).zip(&expected_values) {
            if !self.compatible(actual, expected) {
                self.error(CompileError::ReturnMismatch {
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                    pos: value.pos().clone(),
                });
            }
        }
    }

    fn check_try(&mut self, s: &TryStmt) {
        self.check_scoped_block(&s.body, &[]);
        for catch in &s.catches {
            if !self.symbols.class_exists(&catch.class) {
                self.error(CompileError::UndefinedClass {
                    name: catch.class.clone(),
                    pos: catch.pos.clone(),
                });
            }
            self.push_scope();
            if let Some(var) = &catch.var {
                self.declare(var, Type::named(catch.class.clone()));
            }
            self.check_block(&catch.body);
            self.pop_scope();
        }
        if let Some(finally) = &s.finally {
            self.check_scoped_block(finally, &[]);
        }
    }

    fn is_throwable(&self, ty: &Type) -> bool {
        match ty {
            Type::Error | Type::Dynamic | Type::Param(_) => true,
            Type::Named(_) | Type::Generic { .. } => ty.nominal_name().map_or(false, |name| {
                let name = base_name(name);
                name == "Exception" || self.symbols.is_subclass_of(name, "Exception")
            }),
            _ => false,
        }
    }

    /// Common type of several types, falling back to their union
    pub(super) fn join_types(&self, types: impl IntoIterator<Item = Type>) -> Type {
        let mut iter = types.into_iter();
        let Some(first) = iter.next() else {
            return Type::Void;
        };
        iter.fold(first, |acc, ty| {
            self.relation
                .common_type(&acc, &ty)
                .unwrap_or_else(|| Type::union([acc, ty]))
        })
    }
}

/// Variables inferred as `null` or `void` become `dynamic`
fn widen_inferred(ty: Type) -> Type {
    match ty {
        Type::Null | Type::Void => Type::Dynamic,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::binder::Binder;

    pub(crate) fn pos(line: u32, column: u32) -> Pos {
        Pos::new("main.sola", line, column)
    }

    pub(crate) fn check(file: &File) -> CheckResult {
        let mut symbols = SymbolTable::new();
        Binder::new(&mut symbols).bind_file(file);
        TypeChecker::new(&symbols).check_file(file)
    }

    fn file(statements: Vec<Statement>) -> File {
        let mut f = File::new("main.sola");
        f.statements = statements;
        f
    }

    fn var(name: &str, ty: &str, init: Expression, line: u32) -> Statement {
        Statement::VarDecl(VarDecl::new(name, Some(TypeNode::simple(ty)), Some(init), pos(line, 1)))
    }

    fn codes(result: &CheckResult) -> Vec<&'static str> {
        result.errors.iter().map(CompileError::code).collect()
    }

    // ── Declarations ────────────────────────────────────────────────────

    #[test]
    fn test_var_decl_mismatch_reported_at_initialiser() {
        let result = check(&file(vec![var("a", "string", Expression::int(1, pos(1, 18)), 1)]));
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].to_string(), "cannot assign int to variable of type string");
        assert_eq!(result.errors[0].pos(), &pos(1, 18));
    }

    #[test]
    fn test_folded_initialiser_is_int() {
        let init = Expression::binary(
            BinaryOp::Add,
            Expression::int(1, pos(1, 15)),
            Expression::binary(
                BinaryOp::Mul,
                Expression::int(2, pos(1, 19)),
                Expression::int(3, pos(1, 23)),
                pos(1, 21),
            ),
            pos(1, 17),
        );
        let result = check(&file(vec![var("x", "int", init, 1)]));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let result = check(&file(vec![
            var("x", "int", Expression::int(1, pos(1, 1)), 1),
            var("x", "int", Expression::int(2, pos(2, 1)), 2),
        ]));
        assert_eq!(codes(&result), vec!["E0038"]);
    }

    #[test]
    fn test_short_decl_from_void_call() {
        let mut decl = VarDecl::new(
            "x",
            None,
            Some(Expression::call(
                Expression::ident("print", pos(1, 7)),
                vec![],
                pos(1, 7),
            )),
            pos(1, 1),
        );
        decl.is_short = true;
        let result = check(&file(vec![Statement::VarDecl(decl)]));
        assert_eq!(codes(&result), vec!["E0020"]);
    }

    #[test]
    fn test_short_decl_from_null() {
        let mut decl = VarDecl::new("x", None, Some(Expression::NullLiteral(pos(1, 7))), pos(1, 1));
        decl.is_short = true;
        let assign = Statement::expr(Expression::assign(
            Expression::var("x", pos(2, 1)),
            Expression::int(5, pos(2, 6)),
            pos(2, 1),
        ));
        let result = check(&file(vec![Statement::VarDecl(decl), assign]));
        // The later assignment is not reported against an unusable type
        assert_eq!(codes(&result), vec!["E0020"]);
        assert_eq!(result.errors[0].pos(), &pos(1, 7));
    }

    // ── Functions ───────────────────────────────────────────────────────

    fn function(name: &str, params: Vec<Param>, ret: &str, body: Vec<Statement>) -> Statement {
        Statement::Function(FunctionDecl {
            name: name.into(),
            type_params: vec![],
            params,
            return_type: Some(TypeNode::simple(ret)),
            body,
            pos: pos(1, 1),
        })
    }

    fn ret(value: Expression) -> Statement {
        let pos = value.pos().clone();
        Statement::Return(ReturnStmt {
            values: vec![value],
            pos,
        })
    }

    #[test]
    fn test_default_parameter_call() {
        let mut b = Param::new("b", Some(TypeNode::simple("int")), pos(1, 20));
        b.default = Some(Expression::int(10, pos(1, 30)));
        let body = vec![ret(Expression::binary(
            BinaryOp::Add,
            Expression::var("a", pos(1, 50)),
            Expression::var("b", pos(1, 55)),
            pos(1, 53),
        ))];
        let f = function(
            "f",
            vec![Param::new("a", Some(TypeNode::simple("int")), pos(1, 12)), b],
            "int",
            body,
        );
        let call = Statement::expr(Expression::call(
            Expression::ident("f", pos(2, 1)),
            vec![Argument::positional(Expression::int(1, pos(2, 3)))],
            pos(2, 1),
        ));
        let result = check(&file(vec![f, call]));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    #[test]
    fn test_missing_return() {
        let result = check(&file(vec![function("f", vec![], "int", vec![])]));
        assert_eq!(codes(&result), vec!["E0011"]);
    }

    #[test]
    fn test_return_mismatch_and_void_value() {
        let result = check(&file(vec![
            function("f", vec![], "int", vec![ret(Expression::string("x", pos(2, 8)))]),
            function("g", vec![], "void", vec![ret(Expression::int(1, pos(3, 8)))]),
        ]));
        assert_eq!(codes(&result), vec!["E0009", "E0010"]);
    }

    #[test]
    fn test_break_outside_loop() {
        let result = check(&file(vec![Statement::Break(pos(1, 1))]));
        assert_eq!(codes(&result), vec!["E0036"]);
    }

    // ── Narrowing ───────────────────────────────────────────────────────

    #[test]
    fn test_null_check_narrows_branch() {
        // var $s: ?string = null; if ($s !== null) { var $n: int = strlen($s); }
        let decl = Statement::VarDecl(VarDecl::new(
            "s",
            Some(TypeNode::Nullable(Box::new(TypeNode::simple("string")))),
            Some(Expression::NullLiteral(pos(1, 20))),
            pos(1, 1),
        ));
        let cond = Expression::binary(
            BinaryOp::NotIdentical,
            Expression::var("s", pos(2, 5)),
            Expression::NullLiteral(pos(2, 12)),
            pos(2, 8),
        );
        let call = Expression::call(
            Expression::ident("strlen", pos(3, 16)),
            vec![Argument::positional(Expression::var("s", pos(3, 23)))],
            pos(3, 16),
        );
        let stmt = Statement::If(IfStmt {
            condition: cond,
            then_branch: vec![var("n", "int", call, 3)],
            else_ifs: vec![],
            else_branch: None,
            pos: pos(2, 1),
        });
        let result = check(&file(vec![decl, stmt]));
        assert!(result.errors.is_empty(), "{:?}", result.errors);
    }

    // ── Switch exhaustiveness ───────────────────────────────────────────

    #[test]
    fn test_switch_exhaustiveness_reported_at_subject() {
        let mut f = File::new("main.sola");
        f.declarations.push(Declaration::Enum(EnumDecl {
            name: "Colour".into(),
            members: vec!["Red".into(), "Green".into(), "Blue".into()],
            pos: pos(1, 1),
        }));
        let case = |member: &str, line: u32| SwitchCase {
            value: Expression::StaticProperty(StaticPropertyExpr {
                class: "Colour".into(),
                property: member.into(),
                pos: pos(line, 6),
            }),
            body: vec![Statement::Break(pos(line, 20))],
            pos: pos(line, 1),
        };
        f.statements = vec![
            Statement::VarDecl(VarDecl::new(
                "colour",
                Some(TypeNode::class("Colour")),
                Some(Expression::StaticProperty(StaticPropertyExpr {
                    class: "Colour".into(),
                    property: "Red".into(),
                    pos: pos(2, 20),
                })),
                pos(2, 1),
            )),
            Statement::Switch(SwitchStmt {
                subject: Expression::var("colour", pos(3, 8)),
                cases: vec![case("Red", 4), case("Green", 5)],
                default: None,
                pos: pos(3, 1),
            }),
        ];
        let result = check(&f);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            result.errors[0].to_string(),
            "switch over Colour is not exhaustive, missing: Blue"
        );
        assert_eq!(result.errors[0].pos(), &pos(3, 8));
    }

    // ── Dataflow warnings ───────────────────────────────────────────────

    #[test]
    fn test_dataflow_warnings() {
        let body = vec![
            Statement::VarDecl(VarDecl::new("x", Some(TypeNode::simple("int")), None, pos(2, 1))),
            Statement::Echo(EchoStmt {
                value: Expression::var("x", pos(3, 6)),
                pos: pos(3, 1),
            }),
            Statement::Return(ReturnStmt {
                values: vec![],
                pos: pos(4, 1),
            }),
            Statement::Echo(EchoStmt {
                value: Expression::int(1, pos(5, 6)),
                pos: pos(5, 1),
            }),
        ];
        let result = check(&file(vec![function("f", vec![], "void", body)]));
        assert!(result.errors.is_empty());
        let codes: Vec<_> = result.warnings.iter().map(|w| w.code().as_str()).collect();
        assert!(codes.contains(&"W1001"));
        assert!(codes.contains(&"W1002"));
    }
}
