//! Common sub-expression elimination
//!
//! Pure expressions get a signature string built from literal values,
//! operator spellings and variable names. Inside loops the first evaluation
//! at a statement root is kept in a synthetic `$__cse_<n>` local; later
//! occurrences of the same signature reload that slot.

use std::fmt::Write;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::parser::ast::*;

/// Signature of a cacheable expression.
///
/// Bare variables and scalar literals are never cached; neither is anything
/// that may have side effects or read mutable heap state.
pub fn signature(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Variable(_) => None,
        e if e.is_literal() => None,
        Expression::Binary(_) | Expression::Unary(_) => {
            let mut out = String::new();
            write_signature(expr, &mut out).then_some(out)
        }
        _ => None,
    }
}

fn write_signature(expr: &Expression, out: &mut String) -> bool {
    match expr {
        Expression::IntLiteral(i) => {
            let _ = write!(out, "i{}", i.value);
        }
        Expression::FloatLiteral(f) => {
            let _ = write!(out, "f{:x}", f.value.to_bits());
        }
        Expression::StringLiteral(s) => {
            let _ = write!(out, "s{:?}", s.value);
        }
        Expression::BoolLiteral(b) => {
            let _ = write!(out, "b{}", b.value);
        }
        Expression::NullLiteral(_) => out.push_str("null"),
        Expression::Variable(v) => {
            let _ = write!(out, "${}", v.name);
        }
        Expression::Binary(b) => {
            out.push('(');
            if !write_signature(&b.left, out) {
                return false;
            }
            let _ = write!(out, " {} ", b.op.symbol());
            if !write_signature(&b.right, out) {
                return false;
            }
            out.push(')');
        }
        Expression::Unary(u) => {
            out.push('(');
            out.push_str(u.op.symbol());
            if !write_signature(&u.operand, out) {
                return false;
            }
            out.push(')');
        }
        _ => return false,
    }
    true
}

/// One cached value
#[derive(Debug, Clone)]
pub struct CseEntry {
    pub signature: String,
    pub slot: u16,
    /// Scope depth of the holding local
    pub depth: usize,
    /// Variables the value was computed from
    pub vars: Vec<String>,
    /// Whether any of `vars` is a global, which calls may change
    pub reads_globals: bool,
}

/// Per-function cache of available expressions
#[derive(Debug, Default)]
pub struct CseCache {
    entries: Vec<CseEntry>,
    next_ids: FxHashMap<&'static str, usize>,
}

impl CseCache {
    pub fn lookup(&self, signature: &str) -> Option<u16> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.signature == signature)
            .map(|e| e.slot)
    }

    pub fn insert(&mut self, entry: CseEntry) {
        self.entries.push(entry);
    }

    /// Fresh local name with the given prefix; each prefix counts from 0
    pub fn fresh_name(&mut self, prefix: &'static str) -> String {
        let id = self.next_ids.entry(prefix).or_insert(0);
        let name = format!("$__{}_{}", prefix, id);
        *id += 1;
        name
    }

    /// Forget every value computed from `var`
    pub fn invalidate(&mut self, var: &str) {
        self.entries.retain(|e| !e.vars.iter().any(|v| v == var));
    }

    /// Forget every value computed from any variable in `vars`
    pub fn invalidate_all(&mut self, vars: &FxHashSet<String>) {
        self.entries.retain(|e| !e.vars.iter().any(|v| vars.contains(v)));
    }

    /// Forget values read from globals
    pub fn invalidate_globals(&mut self) {
        self.entries.retain(|e| !e.reads_globals);
    }

    /// Drop entries whose local went out of scope
    pub fn prune(&mut self, depth: usize) {
        self.entries.retain(|e| e.depth <= depth);
    }

    /// Drop entries held in slots at or above `slot`
    pub fn prune_slots(&mut self, slot: u16) {
        self.entries.retain(|e| e.slot < slot);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
