//! Intra-procedural dataflow analyses
//!
//! Reachability, definite assignment (a forward union-lattice fixed point)
//! and the all-paths-return check, all over a [`Cfg`].

use rustc_hash::FxHashSet;

use super::cfg::{BlockId, Cfg, CfgItem};
use crate::parser::ast::*;

// ============================================================================
// Uses and definitions
// ============================================================================

/// Variables read and written by one item, in evaluation order
#[derive(Debug, Default)]
pub struct UseDef<'a> {
    pub uses: Vec<(&'a str, &'a Pos)>,
    pub defs: Vec<&'a str>,
}

impl<'a> UseDef<'a> {
    pub fn of_item(item: &CfgItem<'a>) -> Self {
        let mut ud = UseDef::default();
        match *item {
            CfgItem::Stmt(stmt) => ud.statement(stmt),
            CfgItem::Expr(expr) => ud.expression(expr),
            CfgItem::Bind(values, key, _) => {
                ud.defs.extend(values.iter().map(String::as_str));
                ud.defs.extend(key);
            }
        }
        ud
    }

    fn statement(&mut self, stmt: &'a Statement) {
        match stmt {
            Statement::Expression(s) => self.expression(&s.expr),
            Statement::VarDecl(d) => {
                if let Some(init) = &d.init {
                    self.expression(init);
                    self.defs.push(&d.name);
                }
            }
            Statement::MultiAssign(m) => {
                self.expression(&m.value);
                self.defs.extend(m.names.iter().map(String::as_str));
            }
            Statement::Echo(s) => self.expression(&s.value),
            Statement::Throw(s) => self.expression(&s.value),
            Statement::Return(s) => {
                for value in &s.values {
                    self.expression(value);
                }
            }
            Statement::Unset(s) => self.expression(&s.target),
            _ => {}
        }
    }

    fn args(&mut self, args: &'a [Argument]) {
        for arg in args {
            self.expression(&arg.value);
        }
    }

    /// Uses of a nested scope with `bound` names removed
    fn scoped(&mut self, bound: &[&str], f: impl FnOnce(&mut UseDef<'a>)) {
        let mut inner = UseDef::default();
        f(&mut inner);
        self.uses
            .extend(inner.uses.into_iter().filter(|(name, _)| !bound.contains(name)));
    }

    fn expression(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Variable(v) => self.uses.push((&v.name, &v.pos)),
            Expression::Assign(a) => match (a.target.as_ref(), a.op) {
                (Expression::Variable(v), AssignOp::Assign) => {
                    self.expression(&a.value);
                    self.defs.push(&v.name);
                }
                (Expression::Variable(v), _) => {
                    self.uses.push((&v.name, &v.pos));
                    self.expression(&a.value);
                    self.defs.push(&v.name);
                }
                (target, _) => {
                    self.expression(target);
                    self.expression(&a.value);
                }
            },
            Expression::Increment(i) => {
                self.expression(&i.target);
                if let Expression::Variable(v) = i.target.as_ref() {
                    self.defs.push(&v.name);
                }
            }
            Expression::Closure(c) => {
                for name in &c.uses {
                    self.uses.push((name, &c.pos));
                }
            }
            Expression::Arrow(a) => {
                let params: Vec<&str> = a.params.iter().map(|p| p.name.as_str()).collect();
                self.scoped(&params, |inner| inner.expression(&a.body));
            }
            Expression::Match(m) => {
                self.expression(&m.subject);
                for arm in &m.arms {
                    let bound: Vec<&str> = match &arm.pattern {
                        MatchPattern::Type {
                            binding: Some(name),
                            ..
                        } => vec![name.as_str()],
                        MatchPattern::Value(value) => {
                            self.expression(value);
                            vec![]
                        }
                        _ => vec![],
                    };
                    self.scoped(&bound, |inner| {
                        if let Some(guard) = &arm.guard {
                            inner.expression(guard);
                        }
                        inner.expression(&arm.body);
                    });
                }
            }
            Expression::IntLiteral(_)
            | Expression::FloatLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::BoolLiteral(_)
            | Expression::NullLiteral(_)
            | Expression::ClassName(_)
            | Expression::Identifier(_)
            | Expression::This(_)
            | Expression::StaticProperty(_) => {}
            Expression::Interpolated(e) => {
                for part in &e.parts {
                    if let InterpolationPart::Expression(inner) = part {
                        self.expression(inner);
                    }
                }
            }
            Expression::Array(e) => {
                for element in &e.elements {
                    self.expression(element);
                }
            }
            Expression::Map(e) => {
                for (k, v) in &e.entries {
                    self.expression(k);
                    self.expression(v);
                }
            }
            Expression::SuperArray(e) => {
                for entry in &e.entries {
                    if let Some(key) = &entry.key {
                        self.expression(key);
                    }
                    self.expression(&entry.value);
                }
            }
            Expression::Binary(e) => {
                self.expression(&e.left);
                self.expression(&e.right);
            }
            Expression::Unary(e) => self.expression(&e.operand),
            Expression::Call(e) => {
                self.expression(&e.callee);
                self.args(&e.args);
            }
            Expression::MethodCall(e) => {
                self.expression(&e.object);
                self.args(&e.args);
            }
            Expression::StaticCall(e) => self.args(&e.args),
            Expression::Property(e) => self.expression(&e.object),
            Expression::Index(e) => {
                self.expression(&e.object);
                if let Some(index) = &e.index {
                    self.expression(index);
                }
            }
            Expression::New(e) => self.args(&e.args),
            Expression::Ternary(e) => {
                self.expression(&e.condition);
                self.expression(&e.then_branch);
                self.expression(&e.else_branch);
            }
            Expression::Cast(e) => self.expression(&e.value),
            Expression::Is(e) => self.expression(&e.value),
        }
    }
}

/// Every variable a function body declares or assigns
fn declared_variables<'a>(cfg: &Cfg<'a>) -> FxHashSet<String> {
    let mut names = FxHashSet::default();
    for block in &cfg.blocks {
        for item in &block.items {
            if let CfgItem::Stmt(Statement::VarDecl(d)) = item {
                names.insert(d.name.clone());
            }
            names.extend(UseDef::of_item(item).defs.into_iter().map(str::to_string));
        }
    }
    names
}

// ============================================================================
// Analyses
// ============================================================================

/// Blocks reachable from the entry
pub fn reachable(cfg: &Cfg<'_>) -> Vec<bool> {
    let mut seen = vec![false; cfg.len()];
    let mut stack = vec![cfg.entry];
    while let Some(id) = stack.pop() {
        if std::mem::replace(&mut seen[id], true) {
            continue;
        }
        stack.extend(cfg.block(id).successors.iter().copied());
    }
    seen
}

/// First position of each unreachable region that contains code
pub fn unreachable_code<'a>(cfg: &Cfg<'a>) -> Vec<&'a Pos> {
    let live = reachable(cfg);
    cfg.blocks
        .iter()
        .filter(|b| !live[b.id] && !b.items.is_empty())
        // Only the head of a dead region; its dead successors stay silent
        .filter(|b| b.predecessors.iter().all(|&p| live[p]))
        .map(|b| b.items[0].pos())
        .collect()
}

/// Solve `In`/`Out` sets to a least fixed point and store them on the blocks
pub fn solve_assignments(cfg: &mut Cfg<'_>, params: &[&str]) {
    for block in &mut cfg.blocks {
        let mut gen = FxHashSet::default();
        for item in &block.items {
            gen.extend(UseDef::of_item(item).defs.into_iter().map(str::to_string));
        }
        block.vars_defined = gen;
        block.vars_live_in.clear();
        block.vars_live_out.clear();
    }
    let seed: FxHashSet<String> = params.iter().map(|p| p.to_string()).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for id in 0..cfg.len() {
            let mut input = if id == cfg.entry { seed.clone() } else { FxHashSet::default() };
            for &pred in &cfg.blocks[id].predecessors {
                input.extend(cfg.blocks[pred].vars_live_out.iter().cloned());
            }
            let mut output = input.clone();
            output.extend(cfg.blocks[id].vars_defined.iter().cloned());

            let block = &mut cfg.blocks[id];
            if output != block.vars_live_out || input != block.vars_live_in {
                block.vars_live_in = input;
                block.vars_live_out = output;
                changed = true;
            }
        }
    }
}

/// Reads of a variable on a path where it is never assigned.
///
/// Only variables the body itself declares or assigns are considered;
/// names in `exempt` (globals, captured variables) are never reported.
pub fn uninitialized_uses<'a>(
    cfg: &mut Cfg<'a>,
    params: &[&str],
    exempt: &FxHashSet<String>,
) -> Vec<(String, &'a Pos)> {
    solve_assignments(cfg, params);
    let tracked = declared_variables(cfg);
    let live = reachable(cfg);
    let mut reported: FxHashSet<(String, &'a Pos)> = FxHashSet::default();
    let mut out = Vec::new();

    for block in cfg.blocks.iter().filter(|b| live[b.id]) {
        let mut defined = block.vars_live_in.clone();
        for item in &block.items {
            let ud = UseDef::of_item(item);
            for (name, pos) in ud.uses {
                if defined.contains(name)
                    || params.contains(&name)
                    || exempt.contains(name)
                    || !tracked.contains(name)
                {
                    continue;
                }
                if reported.insert((name.to_string(), pos)) {
                    out.push((name.to_string(), pos));
                }
            }
            defined.extend(ud.defs.into_iter().map(str::to_string));
        }
    }
    out
}

/// Whether every path from entry to exit passes a returning block
pub fn all_paths_return(cfg: &Cfg<'_>) -> bool {
    let mut seen = vec![false; cfg.len()];
    let mut stack: Vec<BlockId> = vec![cfg.entry];
    while let Some(id) = stack.pop() {
        if id == cfg.exit {
            return false;
        }
        if std::mem::replace(&mut seen[id], true) || cfg.block(id).has_return {
            continue;
        }
        stack.extend(cfg.block(id).successors.iter().copied());
    }
    true
}

/// Results of running every analysis over one function
#[derive(Debug, Default)]
pub struct FlowReport<'a> {
    pub unreachable: Vec<&'a Pos>,
    pub uninitialized: Vec<(String, &'a Pos)>,
    pub all_paths_return: bool,
}

/// Run reachability, definite assignment and the return check over `body`
pub fn analyze_function<'a>(
    body: &'a [Statement],
    params: &[&str],
    exempt: &FxHashSet<String>,
) -> FlowReport<'a> {
    let mut cfg = Cfg::build(body);
    FlowReport {
        unreachable: unreachable_code(&cfg),
        all_paths_return: all_paths_return(&cfg),
        uninitialized: uninitialized_uses(&mut cfg, params, exempt),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: u32) -> Pos {
        Pos::new("t.sola", line, 1)
    }

    fn declare(name: &str, init: Option<Expression>, line: u32) -> Statement {
        Statement::VarDecl(VarDecl::new(name, Some(TypeNode::simple("int")), init, pos(line)))
    }

    fn echo_var(name: &str, line: u32) -> Statement {
        Statement::Echo(EchoStmt {
            value: Expression::var(name, pos(line)),
            pos: pos(line),
        })
    }

    fn assign(name: &str, line: u32) -> Statement {
        Statement::expr(Expression::assign(
            Expression::var(name, pos(line)),
            Expression::int(1, pos(line)),
            pos(line),
        ))
    }

    fn ret_value(line: u32) -> Statement {
        Statement::Return(ReturnStmt {
            values: vec![Expression::int(0, pos(line))],
            pos: pos(line),
        })
    }

    fn if_stmt(then: Vec<Statement>, otherwise: Option<Vec<Statement>>) -> Statement {
        Statement::If(IfStmt {
            condition: Expression::var("c", pos(1)),
            then_branch: then,
            else_ifs: vec![],
            else_branch: otherwise,
            pos: pos(1),
        })
    }

    // ── Reachability ──

    #[test]
    fn test_unreachable_after_return() {
        let body = vec![ret_value(1), echo_var("c", 2), echo_var("c", 3)];
        let report = analyze_function(&body, &["c"], &FxHashSet::default());
        assert_eq!(report.unreachable.len(), 1);
        assert_eq!(report.unreachable[0].line, 2);
    }

    #[test]
    fn test_dead_region_reported_once() {
        let body = vec![ret_value(1), if_stmt(vec![echo_var("c", 3)], None), echo_var("c", 4)];
        let report = analyze_function(&body, &["c"], &FxHashSet::default());
        assert_eq!(report.unreachable.len(), 1);
    }

    // ── Definite assignment ──

    #[test]
    fn test_use_before_assignment() {
        let body = vec![declare("x", None, 1), echo_var("x", 2)];
        let report = analyze_function(&body, &[], &FxHashSet::default());
        assert_eq!(report.uninitialized.len(), 1);
        assert_eq!(report.uninitialized[0].0, "x");
        assert_eq!(report.uninitialized[0].1.line, 2);
    }

    #[test]
    fn test_assignment_on_some_path_counts() {
        let body = vec![
            declare("x", None, 1),
            if_stmt(vec![assign("x", 2)], None),
            echo_var("x", 3),
        ];
        let report = analyze_function(&body, &["c"], &FxHashSet::default());
        assert!(report.uninitialized.is_empty());
    }

    #[test]
    fn test_params_and_exempt_names() {
        let body = vec![echo_var("p", 1), echo_var("g", 2), assign("g", 3)];
        let exempt: FxHashSet<String> = ["g".to_string()].into_iter().collect();
        let report = analyze_function(&body, &["p"], &exempt);
        assert!(report.uninitialized.is_empty());
    }

    #[test]
    fn test_self_referencing_assignment() {
        let body = vec![
            declare("x", None, 1),
            Statement::expr(Expression::Assign(AssignExpr {
                target: Box::new(Expression::var("x", pos(2))),
                op: AssignOp::Add,
                value: Box::new(Expression::int(1, pos(2))),
                pos: pos(2),
            })),
        ];
        let report = analyze_function(&body, &[], &FxHashSet::default());
        assert_eq!(report.uninitialized.len(), 1);
    }

    // ── All paths return ──

    #[test]
    fn test_all_paths_return() {
        let both = vec![if_stmt(vec![ret_value(2)], Some(vec![ret_value(3)]))];
        assert!(analyze_function(&both, &["c"], &FxHashSet::default()).all_paths_return);

        let one = vec![if_stmt(vec![ret_value(2)], None)];
        assert!(!analyze_function(&one, &["c"], &FxHashSet::default()).all_paths_return);

        let empty: Vec<Statement> = vec![];
        assert!(!analyze_function(&empty, &[], &FxHashSet::default()).all_paths_return);
    }

    #[test]
    fn test_throw_counts_as_exit() {
        let body = vec![Statement::Throw(ThrowStmt {
            value: Expression::var("e", pos(1)),
            pos: pos(1),
        })];
        assert!(analyze_function(&body, &["e"], &FxHashSet::default()).all_paths_return);
    }
}
