//! Expression type inference
//!
//! Every expression gets a type; every unresolved case reports a diagnostic
//! and yields [`Type::Error`], which silences diagnostics on its parents.

use super::builtins::{NATIVE_PREFIX, RESERVED_NAMESPACE};
use super::calls::{bind_arguments, has_named};
use super::checker::TypeChecker;
use super::error::{CheckWarning, CompileError};
use super::symbols::FunctionSig;
use super::type_guards::null_comparison;
use crate::parser::ast::*;
use crate::parser::types::{
    base_name, bind_params, infer_type_args, last_segment, substitute, type_args, Substitution,
    Type,
};

/// Operand types that defer every operator check to runtime
fn is_open(ty: &Type) -> bool {
    matches!(ty, Type::Dynamic | Type::Param(_))
}

impl<'a> TypeChecker<'a> {
    /// Infer and record the type of `expr`
    pub fn infer(&mut self, expr: &Expression) -> Type {
        let ty = self.infer_inner(expr);
        self.expr_types.insert(expr.node_id(), ty.clone());
        ty
    }

    fn infer_args(&mut self, args: &[Argument]) -> Vec<Type> {
        args.iter().map(|a| self.infer(&a.value)).collect()
    }

    fn infer_inner(&mut self, expr: &Expression) -> Type {
        match expr {
            Expression::IntLiteral(_) => Type::Int,
            Expression::FloatLiteral(_) => Type::Float,
            Expression::StringLiteral(_) | Expression::ClassName(_) => Type::String,
            Expression::BoolLiteral(_) => Type::Bool,
            Expression::NullLiteral(_) => Type::Null,
            Expression::Interpolated(s) => {
                for part in &s.parts {
                    if let InterpolationPart::Expression(e) = part {
                        self.infer(e);
                    }
                }
                Type::String
            }

            Expression::Array(lit) => {
                let elements: Vec<Type> = lit.elements.iter().map(|e| self.infer(e)).collect();
                if elements.is_empty() {
                    return Type::AnyArray;
                }
                let mut common = elements[0].clone();
                for ty in &elements[1..] {
                    match self.relation.common_type(&common, ty) {
                        Some(joined) => common = joined,
                        None => return Type::AnyArray,
                    }
                }
                Type::array(common)
            }
            Expression::Map(lit) => self.infer_map(lit),
            Expression::SuperArray(lit) => {
                for entry in &lit.entries {
                    if let Some(key) = &entry.key {
                        self.infer(key);
                    }
                    self.infer(&entry.value);
                }
                Type::SuperArray
            }

            Expression::Variable(v) => match self.lookup_var(&v.name) {
                Some(ty) => ty,
                None => {
                    self.error(CompileError::UndefinedVariable {
                        name: v.name.clone(),
                        pos: v.pos.clone(),
                    });
                    Type::Error
                }
            },
            Expression::Identifier(id) => match self.lookup_function(&id.name) {
                Some(sig) => Type::func(sig.param_types.clone(), sig.return_type.clone()),
                None => {
                    self.error(CompileError::UndefinedFunction {
                        name: id.name.clone(),
                        pos: id.pos.clone(),
                    });
                    Type::Error
                }
            },
            Expression::This(_) => match &self.class {
                Some(class) => class.self_type(),
                None => Type::Unknown,
            },

            Expression::Binary(b) => self.infer_binary(b),
            Expression::Unary(u) => self.infer_unary(u),
            Expression::Increment(i) => {
                let ty = self.infer(&i.target);
                if !matches!(
                    i.target.as_ref(),
                    Expression::Variable(_)
                        | Expression::Index(_)
                        | Expression::Property(_)
                        | Expression::StaticProperty(_)
                ) {
                    self.error(CompileError::InvalidAssignTarget {
                        pos: i.target.pos().clone(),
                    });
                    return Type::Error;
                }
                if !ty.is_error() && !is_open(&ty) && !self.numeric_base(&ty) {
                    self.error(CompileError::InvalidUnaryOp {
                        op: if i.is_increment { "++" } else { "--" }.to_string(),
                        operand: ty.to_string(),
                        pos: i.pos.clone(),
                    });
                    return Type::Error;
                }
                ty
            }
            Expression::Assign(a) => self.infer_assign(a),

            Expression::Call(c) => self.infer_call(c),
            Expression::MethodCall(m) => self.infer_method_call(m),
            Expression::StaticCall(s) => self.infer_static_call(s),
            Expression::StaticProperty(s) => self.infer_static_property(s),
            Expression::Property(p) => self.infer_property(p),
            Expression::Index(i) => self.infer_index(i),
            Expression::New(n) => self.infer_new(n),

            Expression::Ternary(t) => {
                self.style_hints(t);
                self.infer(&t.condition);
                let positive = self.guards_of(&t.condition, true);
                let negative = self.guards_of(&t.condition, false);
                self.push_scope();
                self.apply_guards(&positive);
                let then_ty = self.infer(&t.then_branch);
                self.pop_scope();
                self.push_scope();
                self.apply_guards(&negative);
                let else_ty = self.infer(&t.else_branch);
                self.pop_scope();
                self.join_types([then_ty, else_ty])
            }
            Expression::Cast(c) => self.infer_cast(c),
            Expression::Is(is) => {
                self.infer(&is.value);
                Type::Bool
            }
            Expression::Closure(c) => self.check_closure(c),
            Expression::Arrow(a) => {
                self.push_scope();
                let mut params = Vec::with_capacity(a.params.len());
                for p in &a.params {
                    let ty = p.ty.as_ref().map(|t| self.resolve_node(t)).unwrap_or(Type::Dynamic);
                    self.declare(&p.name, ty.clone());
                    params.push(ty);
                }
                let body = self.infer(&a.body);
                self.pop_scope();
                let ret = match &a.return_type {
                    Some(node) => {
                        let declared = self.resolve_node(node);
                        if !self.compatible(&body, &declared) {
                            self.error(CompileError::ReturnMismatch {
                                expected: declared.to_string(),
                                actual: body.to_string(),
                                pos: a.body.pos().clone(),
                            });
                        }
                        declared
                    }
                    None => body,
                };
                Type::func(params, ret)
            }
            Expression::Match(m) => self.infer_match(m),
        }
    }

    // ========================================================================
    // Literals
    // ========================================================================

    fn infer_map(&mut self, lit: &MapLiteral) -> Type {
        let mut key_ty: Option<Type> = None;
        let mut value_ty: Option<Type> = None;
        for (k, v) in &lit.entries {
            let kt = self.infer(k);
            let vt = self.infer(v);
            for (part, slot, actual, at) in [("key", &mut key_ty, kt, k), ("value", &mut value_ty, vt, v)] {
                match slot {
                    None => *slot = Some(actual),
                    Some(expected) => {
                        if !self.relation.is_compatible(&actual, expected) {
                            self.errors.push(CompileError::MapEntryMismatch {
                                part,
                                expected: expected.to_string(),
                                actual: actual.to_string(),
                                pos: at.pos().clone(),
                            });
                        }
                    }
                }
            }
        }
        match (key_ty, value_ty) {
            (Some(k), Some(v)) => Type::map(k, v),
            _ => Type::AnyMap,
        }
    }

    // ========================================================================
    // Operators
    // ========================================================================

    /// Whether `ty` is numeric once aliases and new-types are unwrapped
    fn numeric_base(&self, ty: &Type) -> bool {
        self.symbols.resolve_to_base_type(ty).is_numeric()
    }

    fn int_base(&self, ty: &Type) -> bool {
        self.symbols.resolve_to_base_type(ty).is_int_family()
    }

    fn is_new_type(&self, ty: &Type) -> bool {
        matches!(ty, Type::Named(name) if self.symbols.is_new_type(name))
    }

    /// Result of `+ - * / %` on two numeric operands, if allowed.
    ///
    /// Identical types always combine; otherwise both sides must be plain
    /// members of the same numeric family.
    fn arithmetic_result(&self, left: &Type, right: &Type) -> Option<Type> {
        let l = self.symbols.resolve_alias(left);
        let r = self.symbols.resolve_alias(right);
        if l == r {
            return self.numeric_base(&l).then_some(l);
        }
        if self.is_new_type(&l) || self.is_new_type(&r) {
            return None;
        }
        let same_family = (l.is_int_family() && r.is_int_family())
            || (l.is_float_family() && r.is_float_family());
        if !same_family {
            return None;
        }
        Some(if matches!(l, Type::Int | Type::Float) { r } else { l })
    }

    /// Result of an arithmetic operator when one side is open
    fn open_arithmetic(&self, left: &Type, right: &Type) -> Type {
        let known = if is_open(left) { right } else { left };
        if known.is_string() || known.is_numeric() {
            known.clone()
        } else {
            Type::Dynamic
        }
    }

    fn invalid_binary(&mut self, op: BinaryOp, left: &Type, right: &Type, pos: &Pos) -> Type {
        self.error(CompileError::InvalidBinaryOp {
            op: op.symbol().to_string(),
            left: left.to_string(),
            right: right.to_string(),
            pos: pos.clone(),
        });
        Type::Error
    }

    fn infer_binary(&mut self, b: &BinaryExpr) -> Type {
        match b.op {
            BinaryOp::And | BinaryOp::Or => {
                self.infer(&b.left);
                // The right side runs only when the left side passed (or failed)
                let guards = self.guards_of(&b.left, b.op == BinaryOp::And);
                self.push_scope();
                self.apply_guards(&guards);
                self.infer(&b.right);
                self.pop_scope();
                return Type::Bool;
            }
            BinaryOp::Coalesce => {
                let left = self.infer(&b.left);
                let right = self.infer(&b.right);
                if left.is_error() || right.is_error() {
                    return Type::Error;
                }
                let present = left.without_null();
                return self.join_types([present, right]);
            }
            _ => {}
        }

        let left = self.infer(&b.left);
        let right = self.infer(&b.right);
        self.binary_result(b.op, &left, &right, &b.pos)
    }

    /// Type of `left op right`, reporting invalid combinations
    pub(super) fn binary_result(&mut self, op: BinaryOp, left: &Type, right: &Type, pos: &Pos) -> Type {
        if left.is_error() || right.is_error() {
            return if op.is_equality() || op.is_ordering() || op.is_logical() {
                Type::Bool
            } else {
                Type::Error
            };
        }
        let open = is_open(left) || is_open(right);

        match op {
            BinaryOp::And | BinaryOp::Or => Type::Bool,
            BinaryOp::Coalesce => self.join_types([left.without_null(), right.clone()]),

            _ if op.is_equality() => {
                let ok = open
                    || left.is_null()
                    || right.is_null()
                    || (self.numeric_base(left) && self.numeric_base(right))
                    || self.compatible(left, right)
                    || self.compatible(right, left);
                if !ok {
                    self.invalid_binary(op, left, right, pos);
                }
                Type::Bool
            }
            _ if op.is_ordering() => {
                let ok = open
                    || (self.numeric_base(left) && self.numeric_base(right))
                    || (left.is_string() && right.is_string());
                if !ok {
                    self.invalid_binary(op, left, right, pos);
                }
                Type::Bool
            }

            BinaryOp::Add if left.is_string() && right.is_string() => Type::String,
            BinaryOp::Add if open && (left.is_string() || right.is_string()) => Type::String,

            _ if op.is_arithmetic() => {
                if open {
                    return self.open_arithmetic(left, right);
                }
                match self.arithmetic_result(left, right) {
                    Some(ty) => ty,
                    None => self.invalid_binary(op, left, right, pos),
                }
            }

            _ => {
                // Bitwise and shifts
                if open {
                    return if is_open(left) { right.clone() } else { left.clone() };
                }
                if self.int_base(left) && self.int_base(right) {
                    left.clone()
                } else {
                    self.invalid_binary(op, left, right, pos)
                }
            }
        }
    }

    fn infer_unary(&mut self, u: &UnaryExpr) -> Type {
        let operand = self.infer(&u.operand);
        if operand.is_error() {
            return if u.op == UnaryOp::Not { Type::Bool } else { Type::Error };
        }
        let ok = match u.op {
            UnaryOp::Not => return Type::Bool,
            UnaryOp::Neg => is_open(&operand) || self.numeric_base(&operand),
            UnaryOp::BitNot => is_open(&operand) || self.int_base(&operand),
        };
        if ok {
            operand
        } else {
            self.error(CompileError::InvalidUnaryOp {
                op: u.op.symbol().to_string(),
                operand: operand.to_string(),
                pos: u.pos.clone(),
            });
            Type::Error
        }
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn infer_assign(&mut self, a: &AssignExpr) -> Type {
        match a.target.as_ref() {
            Expression::Variable(v) => {
                let value = self.infer(&a.value);
                match a.op.binary_op() {
                    None => {
                        self.assign_variable(&v.name, value.clone(), a.value.pos());
                        let declared = self.declared_var(&v.name).unwrap_or(Type::Error);
                        self.expr_types.insert(a.target.node_id(), declared);
                        value
                    }
                    Some(op) => {
                        let current = self.infer(&a.target);
                        if current.is_error() {
                            return Type::Error;
                        }
                        let result = self.binary_result(op, &current, &value, &a.pos);
                        let declared = self.declared_var(&v.name).unwrap_or(Type::Error);
                        if !result.is_error() && !self.compatible(&result, &declared) {
                            self.error(CompileError::AssignMismatch {
                                expected: declared.to_string(),
                                actual: result.to_string(),
                                pos: a.value.pos().clone(),
                            });
                        }
                        self.clear_narrowing(&v.name);
                        declared
                    }
                }
            }
            Expression::Index(index) => {
                if a.op != AssignOp::Assign {
                    self.infer(&a.value);
                    self.error(CompileError::CompoundIndexAssignment { pos: a.pos.clone() });
                    return Type::Error;
                }
                let container = self.infer(&index.object);
                if let Some(i) = &index.index {
                    self.infer(i);
                }
                let element = self.element_type(&container, index.object.pos());
                self.expr_types.insert(a.target.node_id(), element.clone());
                let value = self.infer(&a.value);
                if !self.compatible(&value, &element) {
                    self.error(CompileError::AssignMismatch {
                        expected: element.to_string(),
                        actual: value.to_string(),
                        pos: a.value.pos().clone(),
                    });
                }
                if let Some(root) = root_variable(&index.object) {
                    self.clear_narrowing(root);
                }
                value
            }
            Expression::Property(p) => {
                let expected = self.infer(&a.target);
                let value = self.infer(&a.value);
                let result = match a.op.binary_op() {
                    Some(op) => self.binary_result(op, &expected, &value, &a.pos),
                    None => value,
                };
                if !self.compatible(&result, &expected) {
                    let class = self
                        .expr_types
                        .get(&p.object.node_id())
                        .map(ToString::to_string)
                        .unwrap_or_default();
                    self.error(CompileError::PropertyMismatch {
                        class,
                        property: p.property.clone(),
                        expected: expected.to_string(),
                        actual: result.to_string(),
                        pos: a.value.pos().clone(),
                    });
                }
                expected
            }
            Expression::StaticProperty(sp) => {
                let expected = self.infer(&a.target);
                let value = self.infer(&a.value);
                if !self.compatible(&value, &expected) {
                    self.error(CompileError::PropertyMismatch {
                        class: sp.class.clone(),
                        property: sp.property.clone(),
                        expected: expected.to_string(),
                        actual: value.to_string(),
                        pos: a.value.pos().clone(),
                    });
                }
                expected
            }
            other => {
                self.infer(&a.value);
                self.error(CompileError::InvalidAssignTarget {
                    pos: other.pos().clone(),
                });
                Type::Error
            }
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn lookup_function(&self, name: &str) -> Option<FunctionSig> {
        self.local_functions
            .get(name)
            .or_else(|| self.symbols.function(name))
            .cloned()
    }

    fn class_ref(&self, name: &str) -> String {
        match name {
            "self" | "static" => self
                .class
                .as_ref()
                .map(|c| c.name.clone())
                .unwrap_or_else(|| name.to_string()),
            "parent" => self
                .class
                .as_ref()
                .and_then(|c| self.symbols.parent_of(&c.name))
                .map(|p| base_name(p).to_string())
                .unwrap_or_else(|| name.to_string()),
            other => other.to_string(),
        }
    }

    fn check_call(
        &mut self,
        callee: &str,
        sig: &FunctionSig,
        args: &[Argument],
        outer: Substitution,
        pos: &Pos,
    ) -> Type {
        self.check_call_with(callee, sig, args, outer, pos).0
    }

    /// Check arguments against `sig`, returning the call's result type and
    /// the final type-parameter bindings.
    ///
    /// `outer` binds the receiver's type parameters; the function's own
    /// parameters are inferred from the arguments.
    fn check_call_with(
        &mut self,
        callee: &str,
        sig: &FunctionSig,
        args: &[Argument],
        outer: Substitution,
        pos: &Pos,
    ) -> (Type, Substitution) {
        let slots = match bind_arguments(args, &sig.param_names, sig.min_arity) {
            Ok(slots) => slots,
            Err(issues) => {
                self.infer_args(args);
                for issue in issues {
                    let err = issue.into_error(callee, pos);
                    self.error(err);
                }
                return (substitute(&sig.return_type, &outer), outer);
            }
        };

        if !has_named(args) && !sig.accepts_arity(args.len()) {
            self.error(CompileError::ArgumentCount {
                callee: callee.to_string(),
                min: sig.min_arity,
                max: sig.max_arity(),
                actual: args.len(),
                pos: pos.clone(),
            });
        }

        let mut provided: Vec<(usize, &Expression, Type)> = Vec::with_capacity(slots.len());
        for (i, slot) in slots.into_iter().enumerate() {
            if let Some(expr) = slot {
                let ty = self.infer(expr);
                provided.push((i, expr, ty));
            }
        }

        let mut subst = outer;
        if !sig.type_params.is_empty() {
            let patterns: Vec<Type> = provided
                .iter()
                .filter_map(|(i, _, _)| sig.param_type(*i).cloned())
                .collect();
            let actuals: Vec<Type> = provided.iter().map(|(_, _, t)| t.clone()).collect();
            for (name, ty) in infer_type_args(&patterns, &actuals) {
                subst.entry(name).or_insert(ty);
            }
            self.check_bounds(sig, &subst, pos);
        }

        for (i, expr, actual) in &provided {
            let Some(param) = sig.param_type(*i) else {
                continue;
            };
            let expected = substitute(param, &subst);
            if !self.compatible(actual, &expected) {
                self.error(CompileError::ArgumentMismatch {
                    callee: callee.to_string(),
                    index: i + 1,
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                    pos: expr.pos().clone(),
                });
            }
        }

        (substitute(&sig.return_type, &subst), subst)
    }

    /// Validate inferred type arguments against their bounds
    fn check_bounds(&mut self, sig: &FunctionSig, subst: &Substitution, pos: &Pos) {
        for param in &sig.type_params {
            let Some(arg) = subst.get(&param.name).and_then(Type::nominal_name) else {
                continue;
            };
            if let Some(extends) = &param.extends {
                if !self.symbols.validate_type_constraint(arg, extends) {
                    self.error(CompileError::ConstraintViolation {
                        message: format!("{} does not extend {} (type parameter {})", arg, extends, param.name),
                        pos: pos.clone(),
                    });
                }
            }
            for iface in &param.implements {
                if let Err(message) = self.symbols.validate_implements(arg, iface) {
                    self.error(CompileError::ConstraintViolation {
                        message,
                        pos: pos.clone(),
                    });
                }
            }
        }
    }

    fn infer_call(&mut self, c: &CallExpr) -> Type {
        if let Expression::Identifier(id) = c.callee.as_ref() {
            if last_segment(&id.name).starts_with(NATIVE_PREFIX) {
                let allowed = self
                    .symbols
                    .namespace()
                    .map_or(false, |ns| ns.starts_with(RESERVED_NAMESPACE));
                if !allowed {
                    self.error(CompileError::RestrictedFunction {
                        name: id.name.clone(),
                        pos: id.pos.clone(),
                    });
                }
            }
            let Some(sig) = self.lookup_function(&id.name) else {
                self.infer_args(&c.args);
                self.error(CompileError::UndefinedFunction {
                    name: id.name.clone(),
                    pos: id.pos.clone(),
                });
                return Type::Error;
            };
            self.expr_types.insert(
                c.callee.node_id(),
                Type::func(sig.param_types.clone(), sig.return_type.clone()),
            );
            return self.check_call(&id.name, &sig, &c.args, Substitution::default(), &c.pos);
        }

        let callee = self.infer(&c.callee);
        match self.symbols.resolve_alias(&callee) {
            Type::Func { params, ret } => {
                let sig = FunctionSig {
                    type_params: Vec::new(),
                    param_names: (0..params.len()).map(|i| format!("arg{}", i)).collect(),
                    min_arity: params.len(),
                    param_types: params,
                    return_type: *ret,
                    is_variadic: false,
                };
                self.check_call("closure", &sig, &c.args, Substitution::default(), &c.pos)
            }
            Type::Error => {
                self.infer_args(&c.args);
                Type::Error
            }
            Type::Dynamic | Type::Param(_) => {
                self.infer_args(&c.args);
                Type::Dynamic
            }
            _ => {
                self.infer_args(&c.args);
                self.error(CompileError::NotCallable {
                    ty: callee.to_string(),
                    pos: c.callee.pos().clone(),
                });
                Type::Error
            }
        }
    }

    /// Substitution binding a class's type parameters to `ty`'s arguments
    fn receiver_subst(&self, ty: &Type) -> Substitution {
        let Some(name) = ty.nominal_name() else {
            return Substitution::default();
        };
        match self.symbols.class_signature(name) {
            Some(sig) => {
                let names: Vec<String> = sig.type_params.iter().map(|p| p.name.clone()).collect();
                bind_params(&names, type_args(ty))
            }
            None => Substitution::default(),
        }
    }

    fn infer_method_call(&mut self, m: &MethodCallExpr) -> Type {
        let object = self.infer(&m.object);
        let receiver = self.symbols.resolve_alias(&object.without_null());
        let result = match &receiver {
            Type::Error => {
                self.infer_args(&m.args);
                return Type::Error;
            }
            Type::Dynamic | Type::Param(_) | Type::Union(_) => {
                self.infer_args(&m.args);
                Type::Dynamic
            }
            ty if ty.is_array_like() && m.method == "length" && m.args.is_empty() => Type::Int,
            Type::SuperArray => self.method_on("SuperArray", &receiver, m),
            Type::Named(_) | Type::Generic { .. } => {
                let class = receiver.nominal_name().unwrap_or_default().to_string();
                self.method_on(&class, &receiver, m)
            }
            _ => {
                self.infer_args(&m.args);
                self.error(CompileError::UndefinedMethod {
                    class: object.to_string(),
                    method: m.method.clone(),
                    pos: m.pos.clone(),
                });
                Type::Error
            }
        };
        if m.nullsafe && object.is_nullable() && !result.is_error() {
            result.nullable()
        } else {
            result
        }
    }

    fn method_on(&mut self, class: &str, receiver: &Type, m: &MethodCallExpr) -> Type {
        let Some(method) = self.symbols.get_method(class, &m.method, m.args.len()).cloned() else {
            self.infer_args(&m.args);
            self.error(CompileError::UndefinedMethod {
                class: class.to_string(),
                method: m.method.clone(),
                pos: m.pos.clone(),
            });
            return Type::Error;
        };
        let subst = self.receiver_subst(receiver);
        let callee = format!("{}::{}", class, m.method);
        self.check_call(&callee, &method.signature, &m.args, subst, &m.pos)
    }

    fn infer_static_call(&mut self, s: &StaticCallExpr) -> Type {
        let class = self.class_ref(&s.class);
        if !self.symbols.class_exists(&class) {
            self.infer_args(&s.args);
            self.error(CompileError::UndefinedClass {
                name: s.class.clone(),
                pos: s.pos.clone(),
            });
            return Type::Error;
        }
        let Some(method) = self.symbols.get_method(&class, &s.method, s.args.len()).cloned() else {
            self.infer_args(&s.args);
            self.error(CompileError::UndefinedMethod {
                class: s.class.clone(),
                method: s.method.clone(),
                pos: s.pos.clone(),
            });
            return Type::Error;
        };
        let callee = format!("{}::{}", s.class, s.method);
        self.check_call(&callee, &method.signature, &s.args, Substitution::default(), &s.pos)
    }

    // ========================================================================
    // Member access
    // ========================================================================

    fn infer_static_property(&mut self, s: &StaticPropertyExpr) -> Type {
        let class = self.class_ref(&s.class);
        if let Some(members) = self.symbols.enum_members(&class) {
            if members.iter().any(|m| *m == s.property) {
                return Type::named(class);
            }
            self.error(CompileError::UndefinedEnumMember {
                enum_name: s.class.clone(),
                member: s.property.clone(),
                pos: s.pos.clone(),
            });
            return Type::Error;
        }
        if !self.symbols.class_exists(&class) {
            self.error(CompileError::UndefinedClass {
                name: s.class.clone(),
                pos: s.pos.clone(),
            });
            return Type::Error;
        }
        match self.symbols.get_property(&class, &s.property) {
            Some(prop) => prop.ty.clone(),
            None => {
                self.error(CompileError::UndefinedProperty {
                    class: s.class.clone(),
                    property: s.property.clone(),
                    pos: s.pos.clone(),
                });
                Type::Error
            }
        }
    }

    fn infer_property(&mut self, p: &PropertyExpr) -> Type {
        let object = self.infer(&p.object);
        let receiver = self.symbols.resolve_alias(&object.without_null());
        let result = match &receiver {
            Type::Error => return Type::Error,
            Type::Dynamic | Type::Param(_) | Type::Union(_) => Type::Dynamic,
            ty if (ty.is_array_like() || ty.is_string() || matches!(ty, Type::SuperArray))
                && p.property == "length" =>
            {
                Type::Int
            }
            Type::Named(_) | Type::Generic { .. } => {
                let class = receiver.nominal_name().unwrap_or_default().to_string();
                match self.symbols.get_property(&class, &p.property) {
                    Some(prop) => substitute(&prop.ty, &self.receiver_subst(&receiver)),
                    None => {
                        self.error(CompileError::UndefinedProperty {
                            class,
                            property: p.property.clone(),
                            pos: p.pos.clone(),
                        });
                        return Type::Error;
                    }
                }
            }
            _ => {
                self.error(CompileError::UndefinedProperty {
                    class: object.to_string(),
                    property: p.property.clone(),
                    pos: p.pos.clone(),
                });
                return Type::Error;
            }
        };
        if p.nullsafe && object.is_nullable() {
            result.nullable()
        } else {
            result
        }
    }

    /// Element type stored in `container`, reporting non-indexable types
    fn element_type(&mut self, container: &Type, pos: &Pos) -> Type {
        match self.symbols.resolve_alias(container) {
            Type::Array(el) | Type::FixedArray(el, _) => *el,
            Type::Map(_, v) => *v,
            Type::String => Type::String,
            Type::AnyArray | Type::AnyMap | Type::SuperArray | Type::Dynamic | Type::Param(_) => {
                Type::Dynamic
            }
            Type::Error => Type::Error,
            _ => {
                self.error(CompileError::NotIndexable {
                    ty: container.to_string(),
                    pos: pos.clone(),
                });
                Type::Error
            }
        }
    }

    fn infer_index(&mut self, i: &IndexExpr) -> Type {
        let container = self.infer(&i.object);
        if let Some(index) = &i.index {
            self.infer(index);
        }
        self.element_type(&container, i.object.pos())
    }

    fn infer_new(&mut self, n: &NewExpr) -> Type {
        let class = self.class_ref(&n.class);
        if self.symbols.is_interface(&class) {
            self.infer_args(&n.args);
            self.error(CompileError::InterfaceInstantiation {
                name: n.class.clone(),
                pos: n.pos.clone(),
            });
            return Type::Error;
        }
        if !self.symbols.class_exists(&class) {
            self.infer_args(&n.args);
            self.error(CompileError::UndefinedClass {
                name: n.class.clone(),
                pos: n.pos.clone(),
            });
            return Type::Error;
        }

        let params = self
            .symbols
            .class_signature(&class)
            .map(|sig| sig.type_params.clone())
            .unwrap_or_default();
        let names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
        let explicit: Vec<Type> = n.type_args.iter().map(|t| self.resolve_node(t)).collect();

        if !explicit.is_empty() {
            if explicit.len() != params.len() {
                self.error(CompileError::TypeArgumentCount {
                    class: n.class.clone(),
                    expected: params.len(),
                    actual: explicit.len(),
                    pos: n.pos.clone(),
                });
            }
            for (param, arg) in params.iter().zip(&explicit) {
                let Some(arg_name) = arg.nominal_name() else {
                    continue;
                };
                if let Some(extends) = &param.extends {
                    if !self.symbols.validate_type_constraint(arg_name, extends) {
                        self.error(CompileError::ConstraintViolation {
                            message: format!(
                                "{} does not extend {} (type parameter {} of {})",
                                arg_name, extends, param.name, n.class
                            ),
                            pos: n.pos.clone(),
                        });
                    }
                }
                for iface in &param.implements {
                    if let Err(message) = self.symbols.validate_implements(arg_name, iface) {
                        self.error(CompileError::ConstraintViolation {
                            message,
                            pos: n.pos.clone(),
                        });
                    }
                }
            }
        }

        let callee = format!("{}::__construct", n.class);
        let ctor = self
            .symbols
            .get_method(&class, "__construct", n.args.len())
            .map(|m| m.signature.clone());
        let mut subst = bind_params(&names, &explicit);
        match ctor {
            Some(sig) => {
                if explicit.is_empty() && !names.is_empty() {
                    // Infer class parameters from the constructor arguments
                    let generic = FunctionSig {
                        type_params: params.clone(),
                        ..sig
                    };
                    let (_, inferred) =
                        self.check_call_with(&callee, &generic, &n.args, Substitution::default(), &n.pos);
                    subst = inferred;
                } else {
                    self.check_call(&callee, &sig, &n.args, subst.clone(), &n.pos);
                }
            }
            None if !n.args.is_empty() => {
                self.infer_args(&n.args);
                self.error(CompileError::ArgumentCount {
                    callee,
                    min: 0,
                    max: Some(0),
                    actual: n.args.len(),
                    pos: n.pos.clone(),
                });
            }
            None => {}
        }

        if names.is_empty() {
            Type::named(class)
        } else {
            Type::Generic {
                base: class,
                args: names
                    .iter()
                    .map(|p| subst.get(p).cloned().unwrap_or(Type::Dynamic))
                    .collect(),
            }
        }
    }

    // ========================================================================
    // Casts, match and hints
    // ========================================================================

    fn infer_cast(&mut self, c: &CastExpr) -> Type {
        let value = self.infer(&c.value);
        let target = self.resolve_node(&c.target);
        let from = self.symbols.resolve_to_base_type(&value);
        let to = self.symbols.resolve_to_base_type(&target);
        let scalar = |t: &Type| t.is_numeric() || t.is_string() || matches!(t, Type::Bool);
        let ok = value.is_error()
            || is_open(&from)
            || is_open(&to)
            || from.is_null()
            || (scalar(&from) && scalar(&to))
            || self.compatible(&from, &to)
            || self.compatible(&to, &from);
        if !ok {
            self.error(CompileError::InvalidCast {
                from: value.to_string(),
                to: target.to_string(),
                pos: c.pos.clone(),
            });
        }
        if c.safe {
            target.nullable()
        } else {
            target
        }
    }

    fn infer_match(&mut self, m: &MatchExpr) -> Type {
        let subject = self.infer(&m.subject);
        let mut arms = Vec::with_capacity(m.arms.len());
        for arm in &m.arms {
            self.push_scope();
            match &arm.pattern {
                MatchPattern::Wildcard => {}
                MatchPattern::Value(value) => {
                    self.infer(value);
                }
                MatchPattern::Type { ty, binding } => {
                    let check = self.resolve_node(ty);
                    if let Some(name) = binding {
                        let narrowed = self.symbols.narrow(&subject, &check, true);
                        self.declare(name, narrowed);
                    }
                }
            }
            if let Some(guard) = &arm.guard {
                self.infer(guard);
                let guards = self.guards_of(guard, true);
                self.apply_guards(&guards);
            }
            arms.push(self.infer(&arm.body));
            self.pop_scope();
        }
        if arms.is_empty() {
            Type::Null
        } else {
            self.join_types(arms)
        }
    }

    /// Suggest `??` and `?->` for null-check ternaries
    fn style_hints(&mut self, t: &TernaryExpr) {
        let Expression::Binary(cond) = t.condition.as_ref() else {
            return;
        };
        if !matches!(cond.op, BinaryOp::NotIdentical | BinaryOp::Ne) {
            return;
        }
        let Some(var) = null_comparison(&cond.left, &cond.right) else {
            return;
        };
        let message = match (t.then_branch.as_ref(), t.else_branch.as_ref()) {
            (Expression::Variable(v), _) if v.name == var => {
                format!("`${var} !== null ? ${var} : ...` can be written with `??`")
            }
            (Expression::Property(p), Expression::NullLiteral(_))
                if !p.nullsafe && p.object.as_variable() == Some(var) =>
            {
                format!("use `${var}?->{}` instead of a null-check ternary", p.property)
            }
            (Expression::MethodCall(mc), Expression::NullLiteral(_))
                if !mc.nullsafe && mc.object.as_variable() == Some(var) =>
            {
                format!("use `${var}?->{}()` instead of a null-check ternary", mc.method)
            }
            _ => return,
        };
        self.warnings.push(CheckWarning::StyleHint {
            message,
            pos: t.pos.clone(),
        });
    }
}
