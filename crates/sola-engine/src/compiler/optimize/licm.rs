//! Loop-invariant code motion analysis
//!
//! Before a loop is emitted, its body is scanned for small pure expressions
//! whose variables the loop never writes. The emitter evaluates each of them
//! once ahead of the loop header into a `$__licm_<n>` local and registers it
//! in the CSE cache so the body reloads the slot.

use rustc_hash::FxHashSet;

use super::constant_fold::eval_const_expr;
use super::cse::signature;
use crate::parser::ast::*;

/// What a loop writes and whether it calls out
#[derive(Debug, Default)]
pub struct LoopEffects {
    pub mutated: FxHashSet<String>,
    /// Calls may change globals
    pub has_calls: bool,
}

/// Collect the effects of a loop: its body plus header expressions
pub fn loop_effects(body: &[Statement], header: &[&Expression], bindings: &[&str]) -> LoopEffects {
    let mut collector = EffectCollector {
        effects: LoopEffects {
            mutated: mutated_variables(body),
            has_calls: false,
        },
    };
    walk_block(&mut collector, body);
    for expr in header {
        let mut mutations = MutationCollector::default();
        mutations.visit_expression(expr);
        collector.effects.mutated.extend(mutations.names);
        collector.visit_expression(expr);
    }
    collector
        .effects
        .mutated
        .extend(bindings.iter().map(|b| b.to_string()));
    collector.effects
}

struct EffectCollector {
    effects: LoopEffects,
}

impl<'a> Visitor<'a> for EffectCollector {
    fn visit_expression(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Call(_)
            | Expression::MethodCall(_)
            | Expression::StaticCall(_)
            | Expression::New(_) => self.effects.has_calls = true,
            Expression::Match(m) => {
                for arm in &m.arms {
                    if let MatchPattern::Type {
                        binding: Some(name),
                        ..
                    } = &arm.pattern
                    {
                        self.effects.mutated.insert(name.clone());
                    }
                }
            }
            _ => {}
        }
        walk_expression(self, expr);
    }

    fn visit_nested_function(&mut self, _expr: &'a Expression) {}
}

/// Hoistable expressions of a loop body, deduplicated by signature, in
/// source order. `stable` says whether a variable not written by the loop
/// keeps its value across iterations.
pub fn hoist_candidates<'a>(
    body: &'a [Statement],
    effects: &LoopEffects,
    stable: &dyn Fn(&str) -> bool,
) -> Vec<&'a Expression> {
    let mut finder = CandidateFinder {
        effects,
        stable,
        seen: FxHashSet::default(),
        found: Vec::new(),
    };
    walk_block(&mut finder, body);
    finder.found
}

struct CandidateFinder<'e, 'a> {
    effects: &'e LoopEffects,
    stable: &'e dyn Fn(&str) -> bool,
    seen: FxHashSet<String>,
    found: Vec<&'a Expression>,
}

impl<'e, 'a> CandidateFinder<'e, 'a> {
    fn invariant(&self, expr: &Expression) -> bool {
        variables_in(expr)
            .iter()
            .all(|v| !self.effects.mutated.contains(*v) && (self.stable)(v))
    }
}

impl<'e, 'a> Visitor<'a> for CandidateFinder<'e, 'a> {
    fn visit_expression(&mut self, expr: &'a Expression) {
        if is_simple(expr)
            && !variables_in(expr).is_empty()
            && eval_const_expr(expr).is_none()
            && self.invariant(expr)
        {
            if let Some(sig) = signature(expr) {
                if self.seen.insert(sig) {
                    self.found.push(expr);
                }
                return;
            }
        }
        walk_expression(self, expr);
    }

    fn visit_nested_function(&mut self, _expr: &'a Expression) {}
}

fn is_operand(expr: &Expression) -> bool {
    expr.is_literal() || matches!(expr, Expression::Variable(_))
}

fn hoistable_op(op: BinaryOp) -> bool {
    !matches!(
        op,
        BinaryOp::Div | BinaryOp::Mod | BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce
    )
}

/// One operator over variables and literals
fn is_single_level(expr: &Expression) -> bool {
    match expr {
        Expression::Binary(b) => hoistable_op(b.op) && is_operand(&b.left) && is_operand(&b.right),
        Expression::Unary(u) => is_operand(&u.operand),
        _ => false,
    }
}

/// A single-level operation, or one operator over single-level operations
pub fn is_simple(expr: &Expression) -> bool {
    let part = |e: &Expression| is_operand(e) || is_single_level(e);
    match expr {
        Expression::Binary(b) => hoistable_op(b.op) && part(&b.left) && part(&b.right),
        Expression::Unary(u) => part(&u.operand),
        _ => false,
    }
}
