//! Array bounds-check elision
//!
//! Recognises the counting loop
//! `for (var $i = 0; $i < $a->length; ++$i)` (or `count($a)` as the bound)
//! where the body writes neither `$a` nor `$i`. Inside such a loop `$a[$i]`
//! is always in range and reads can use `ARRAY_GET_UNCHECKED`.

use crate::parser::ast::*;

/// A loop whose `array[index]` reads are known to be in bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundsPattern {
    pub array: String,
    pub index: String,
}

impl BoundsPattern {
    /// Whether `object[index]` is a read this pattern covers
    pub fn covers(&self, object: &Expression, index: &Expression) -> bool {
        object.as_variable() == Some(self.array.as_str())
            && index.as_variable() == Some(self.index.as_str())
    }
}

/// Match a `for` loop against the counting pattern. `is_array` is asked
/// about the bound's array expression.
pub fn recognize(stmt: &ForStmt, is_array: impl Fn(&Expression) -> bool) -> Option<BoundsPattern> {
    let index = zero_init(stmt.init.as_deref()?)?;

    let Some(Expression::Binary(cond)) = &stmt.condition else {
        return None;
    };
    if cond.op != BinaryOp::Lt || cond.left.as_variable() != Some(index) {
        return None;
    }
    let array_expr = length_of(&cond.right)?;
    let array = array_expr.as_variable()?;
    if !is_array(array_expr) {
        return None;
    }

    if !is_step(stmt.update.as_ref()?, index) {
        return None;
    }

    let mutated = mutated_variables(&stmt.body);
    if mutated.contains(index) || mutated.contains(array) {
        return None;
    }

    Some(BoundsPattern {
        array: array.to_string(),
        index: index.to_string(),
    })
}

/// `var $i = 0` or `$i = 0`
fn zero_init(init: &Statement) -> Option<&str> {
    let is_zero = |e: &Expression| matches!(e, Expression::IntLiteral(i) if i.value == 0);
    match init {
        Statement::VarDecl(d) if d.init.as_ref().is_some_and(is_zero) => Some(&d.name),
        Statement::Expression(s) => match &s.expr {
            Expression::Assign(a) if a.op == AssignOp::Assign && is_zero(&a.value) => {
                a.target.as_variable()
            }
            _ => None,
        },
        _ => None,
    }
}

/// The array in `$a->length` or `count($a)`
fn length_of(bound: &Expression) -> Option<&Expression> {
    match bound {
        Expression::Property(p) if p.property == "length" && !p.nullsafe => Some(&p.object),
        Expression::Call(c) => match (c.callee.as_ref(), c.args.as_slice()) {
            (Expression::Identifier(id), [arg]) if id.name == "count" && arg.name.is_none() => {
                Some(&arg.value)
            }
            _ => None,
        },
        _ => None,
    }
}

/// `++$i`, `$i++`, `$i += 1` or `$i = $i + 1`
fn is_step(update: &Expression, index: &str) -> bool {
    let is_one = |e: &Expression| matches!(e, Expression::IntLiteral(i) if i.value == 1);
    match update {
        Expression::Increment(inc) => inc.is_increment && inc.target.as_variable() == Some(index),
        Expression::Assign(a) if a.target.as_variable() == Some(index) => match a.op {
            AssignOp::Add => is_one(&a.value),
            AssignOp::Assign => matches!(
                a.value.as_ref(),
                Expression::Binary(b)
                    if b.op == BinaryOp::Add && b.left.as_variable() == Some(index) && is_one(&b.right)
            ),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new("t.sola", 1, 1)
    }

    fn var(name: &str) -> Expression {
        Expression::var(name, pos())
    }

    fn counting_loop(bound: Expression, body: Vec<Statement>) -> ForStmt {
        ForStmt {
            init: Some(Box::new(Statement::VarDecl(VarDecl::new(
                "i",
                None,
                Some(Expression::int(0, pos())),
                pos(),
            )))),
            condition: Some(Expression::binary(BinaryOp::Lt, var("i"), bound, pos())),
            update: Some(Expression::Increment(IncrementExpr {
                target: Box::new(var("i")),
                is_increment: true,
                is_prefix: true,
                pos: pos(),
            })),
            body,
            pos: pos(),
        }
    }

    fn length(name: &str) -> Expression {
        Expression::Property(PropertyExpr {
            object: Box::new(var(name)),
            property: "length".into(),
            nullsafe: false,
            pos: pos(),
        })
    }

    #[test]
    fn test_length_loop_recognised() {
        let stmt = counting_loop(length("a"), vec![]);
        let pattern = recognize(&stmt, |_| true).unwrap();
        assert_eq!(pattern.array, "a");
        assert_eq!(pattern.index, "i");
        let read_index = var("i");
        assert!(pattern.covers(&var("a"), &read_index));
        assert!(!pattern.covers(&var("b"), &read_index));
    }

    #[test]
    fn test_count_call_recognised() {
        let bound = Expression::call(
            Expression::ident("count", pos()),
            vec![Argument::positional(var("a"))],
            pos(),
        );
        assert!(recognize(&counting_loop(bound, vec![]), |_| true).is_some());
    }

    #[test]
    fn test_non_array_rejected() {
        assert!(recognize(&counting_loop(length("a"), vec![]), |_| false).is_none());
    }

    #[test]
    fn test_array_write_in_body_rejected() {
        let write = Expression::assign(
            Expression::Index(IndexExpr {
                object: Box::new(var("a")),
                index: None,
                pos: pos(),
            }),
            Expression::int(1, pos()),
            pos(),
        );
        let stmt = counting_loop(length("a"), vec![Statement::expr(write)]);
        assert!(recognize(&stmt, |_| true).is_none());
    }

    #[test]
    fn test_index_write_in_body_rejected() {
        let bump = Expression::assign(var("i"), Expression::int(5, pos()), pos());
        let stmt = counting_loop(length("a"), vec![Statement::expr(bump)]);
        assert!(recognize(&stmt, |_| true).is_none());
    }
}
