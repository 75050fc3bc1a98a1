//! Read-only AST traversal
//!
//! Implementors override the `visit_*` hooks they care about and call the
//! matching `walk_*` function to continue into children.

use super::*;

pub trait Visitor<'a>: Sized {
    fn visit_statement(&mut self, stmt: &'a Statement) {
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &'a Expression) {
        walk_expression(self, expr);
    }

    /// Called for closure and arrow-function bodies; skip to stay intra-procedural
    fn visit_nested_function(&mut self, expr: &'a Expression) {
        walk_expression(self, expr);
    }

    /// Nested `function` declarations are not walked by default
    fn visit_function_decl(&mut self, _decl: &'a FunctionDecl) {}
}

pub fn walk_block<'a, V: Visitor<'a>>(visitor: &mut V, stmts: &'a [Statement]) {
    for stmt in stmts {
        visitor.visit_statement(stmt);
    }
}

pub fn walk_statement<'a, V: Visitor<'a>>(visitor: &mut V, stmt: &'a Statement) {
    match stmt {
        Statement::Expression(s) => visitor.visit_expression(&s.expr),
        Statement::VarDecl(s) => {
            if let Some(init) = &s.init {
                visitor.visit_expression(init);
            }
        }
        Statement::MultiAssign(s) => visitor.visit_expression(&s.value),
        Statement::If(s) => {
            visitor.visit_expression(&s.condition);
            walk_block(visitor, &s.then_branch);
            for elif in &s.else_ifs {
                visitor.visit_expression(&elif.condition);
                walk_block(visitor, &elif.body);
            }
            if let Some(else_branch) = &s.else_branch {
                walk_block(visitor, else_branch);
            }
        }
        Statement::While(s) => {
            visitor.visit_expression(&s.condition);
            walk_block(visitor, &s.body);
        }
        Statement::For(s) => {
            if let Some(init) = &s.init {
                visitor.visit_statement(init);
            }
            if let Some(cond) = &s.condition {
                visitor.visit_expression(cond);
            }
            if let Some(update) = &s.update {
                visitor.visit_expression(update);
            }
            walk_block(visitor, &s.body);
        }
        Statement::Foreach(s) => {
            visitor.visit_expression(&s.iterable);
            walk_block(visitor, &s.body);
        }
        Statement::Switch(s) => {
            visitor.visit_expression(&s.subject);
            for case in &s.cases {
                visitor.visit_expression(&case.value);
                walk_block(visitor, &case.body);
            }
            if let Some(default) = &s.default {
                walk_block(visitor, default);
            }
        }
        Statement::Break(_) | Statement::Continue(_) => {}
        Statement::Return(s) => {
            for value in &s.values {
                visitor.visit_expression(value);
            }
        }
        Statement::Echo(s) => visitor.visit_expression(&s.value),
        Statement::Try(s) => {
            walk_block(visitor, &s.body);
            for catch in &s.catches {
                walk_block(visitor, &catch.body);
            }
            if let Some(finally) = &s.finally {
                walk_block(visitor, finally);
            }
        }
        Statement::Throw(s) => visitor.visit_expression(&s.value),
        Statement::Block(s) => walk_block(visitor, &s.body),
        Statement::Function(decl) => visitor.visit_function_decl(decl),
        Statement::Unset(s) => visitor.visit_expression(&s.target),
    }
}

fn walk_args<'a, V: Visitor<'a>>(visitor: &mut V, args: &'a [Argument]) {
    for arg in args {
        visitor.visit_expression(&arg.value);
    }
}

pub fn walk_expression<'a, V: Visitor<'a>>(visitor: &mut V, expr: &'a Expression) {
    match expr {
        Expression::IntLiteral(_)
        | Expression::FloatLiteral(_)
        | Expression::StringLiteral(_)
        | Expression::BoolLiteral(_)
        | Expression::NullLiteral(_)
        | Expression::ClassName(_)
        | Expression::Variable(_)
        | Expression::Identifier(_)
        | Expression::This(_)
        | Expression::StaticProperty(_) => {}
        Expression::Interpolated(e) => {
            for part in &e.parts {
                if let InterpolationPart::Expression(inner) = part {
                    visitor.visit_expression(inner);
                }
            }
        }
        Expression::Array(e) => {
            for element in &e.elements {
                visitor.visit_expression(element);
            }
        }
        Expression::Map(e) => {
            for (k, v) in &e.entries {
                visitor.visit_expression(k);
                visitor.visit_expression(v);
            }
        }
        Expression::SuperArray(e) => {
            for entry in &e.entries {
                if let Some(key) = &entry.key {
                    visitor.visit_expression(key);
                }
                visitor.visit_expression(&entry.value);
            }
        }
        Expression::Binary(e) => {
            visitor.visit_expression(&e.left);
            visitor.visit_expression(&e.right);
        }
        Expression::Unary(e) => visitor.visit_expression(&e.operand),
        Expression::Increment(e) => visitor.visit_expression(&e.target),
        Expression::Assign(e) => {
            visitor.visit_expression(&e.target);
            visitor.visit_expression(&e.value);
        }
        Expression::Call(e) => {
            visitor.visit_expression(&e.callee);
            walk_args(visitor, &e.args);
        }
        Expression::MethodCall(e) => {
            visitor.visit_expression(&e.object);
            walk_args(visitor, &e.args);
        }
        Expression::StaticCall(e) => walk_args(visitor, &e.args),
        Expression::Property(e) => visitor.visit_expression(&e.object),
        Expression::Index(e) => {
            visitor.visit_expression(&e.object);
            if let Some(index) = &e.index {
                visitor.visit_expression(index);
            }
        }
        Expression::New(e) => walk_args(visitor, &e.args),
        Expression::Ternary(e) => {
            visitor.visit_expression(&e.condition);
            visitor.visit_expression(&e.then_branch);
            visitor.visit_expression(&e.else_branch);
        }
        Expression::Cast(e) => visitor.visit_expression(&e.value),
        Expression::Is(e) => visitor.visit_expression(&e.value),
        Expression::Closure(_) | Expression::Arrow(_) => visitor.visit_nested_function(expr),
        Expression::Match(e) => {
            visitor.visit_expression(&e.subject);
            for arm in &e.arms {
                if let MatchPattern::Value(value) = &arm.pattern {
                    visitor.visit_expression(value);
                }
                if let Some(guard) = &arm.guard {
                    visitor.visit_expression(guard);
                }
                visitor.visit_expression(&arm.body);
            }
        }
    }
}

/// Walk into the body of a closure or arrow function
pub fn walk_nested_function<'a, V: Visitor<'a>>(visitor: &mut V, expr: &'a Expression) {
    match expr {
        Expression::Closure(c) => walk_block(visitor, &c.body),
        Expression::Arrow(a) => visitor.visit_expression(&a.body),
        _ => {}
    }
}

// ============================================================================
// Common collectors
// ============================================================================

/// Collects every `$variable` read or written, skipping nested function bodies
/// (but counting a closure's `use` captures as reads).
#[derive(Default)]
pub struct VariableCollector<'a> {
    pub names: Vec<&'a str>,
}

impl<'a> Visitor<'a> for VariableCollector<'a> {
    fn visit_expression(&mut self, expr: &'a Expression) {
        if let Expression::Variable(v) = expr {
            self.names.push(&v.name);
        }
        walk_expression(self, expr);
    }

    fn visit_nested_function(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Closure(c) => {
                self.names.extend(c.uses.iter().map(String::as_str));
            }
            Expression::Arrow(a) => {
                let mut inner = VariableCollector::default();
                inner.visit_expression(&a.body);
                for name in inner.names {
                    if !a.params.iter().any(|p| p.name == name) {
                        self.names.push(name);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Variables referenced by an expression, in first-occurrence order
pub fn variables_in(expr: &Expression) -> Vec<&str> {
    let mut collector = VariableCollector::default();
    collector.visit_expression(expr);
    let mut seen = Vec::new();
    for name in collector.names {
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// Collects variables that a statement list assigns: plain and compound
/// assignment targets, increments, declarations, destructuring, foreach
/// bindings and catch variables.
#[derive(Default)]
pub struct MutationCollector {
    pub names: rustc_hash::FxHashSet<String>,
}

impl<'a> Visitor<'a> for MutationCollector {
    fn visit_statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::VarDecl(d) => {
                self.names.insert(d.name.clone());
            }
            Statement::MultiAssign(m) => {
                self.names.extend(m.names.iter().cloned());
            }
            Statement::Foreach(f) => {
                self.names.insert(f.value.clone());
                if let Some(key) = &f.key {
                    self.names.insert(key.clone());
                }
            }
            Statement::Try(t) => {
                for catch in &t.catches {
                    if let Some(var) = &catch.var {
                        self.names.insert(var.clone());
                    }
                }
            }
            Statement::Unset(u) => {
                if let Some(root) = root_variable(&u.target) {
                    self.names.insert(root.to_string());
                }
            }
            _ => {}
        }
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Assign(a) => {
                if let Some(root) = root_variable(&a.target) {
                    self.names.insert(root.to_string());
                }
            }
            Expression::Increment(i) => {
                if let Some(root) = root_variable(&i.target) {
                    self.names.insert(root.to_string());
                }
            }
            _ => {}
        }
        walk_expression(self, expr);
    }

    fn visit_nested_function(&mut self, _expr: &'a Expression) {}
}

/// The variable at the root of an lvalue chain: `$a` for `$a[1]->b`
pub fn root_variable(expr: &Expression) -> Option<&str> {
    match expr {
        Expression::Variable(v) => Some(&v.name),
        Expression::Index(i) => root_variable(&i.object),
        Expression::Property(p) => root_variable(&p.object),
        _ => None,
    }
}

/// Variables mutated anywhere in `stmts`
pub fn mutated_variables(stmts: &[Statement]) -> rustc_hash::FxHashSet<String> {
    let mut collector = MutationCollector::default();
    walk_block(&mut collector, stmts);
    collector.names
}
