//! Type guard extraction
//!
//! Recognises the conditions that narrow a variable: `$x is T`, comparisons
//! with `null`, and their combinations through `!`, `&&` and `||`.

use crate::parser::ast::{BinaryOp, Expression, TypeNode, UnaryOp};
use crate::parser::types::{Type, TypeGuard};

/// Collect the guards that hold when `cond` evaluates to `positive`.
///
/// `a && b` contributes both sides only when true, `a || b` only when
/// false; anything else contributes nothing.
pub fn extract_guards(
    cond: &Expression,
    positive: bool,
    resolve: &dyn Fn(&TypeNode) -> Type,
    out: &mut Vec<TypeGuard>,
) {
    match cond {
        Expression::Is(is) => {
            if let Some(var) = is.value.as_variable() {
                out.push(TypeGuard {
                    var: var.to_string(),
                    ty: resolve(&is.target),
                    positive,
                });
            }
        }
        Expression::Unary(u) if u.op == UnaryOp::Not => {
            extract_guards(&u.operand, !positive, resolve, out)
        }
        Expression::Binary(b) => match b.op {
            BinaryOp::And if positive => {
                extract_guards(&b.left, true, resolve, out);
                extract_guards(&b.right, true, resolve, out);
            }
            BinaryOp::Or if !positive => {
                extract_guards(&b.left, false, resolve, out);
                extract_guards(&b.right, false, resolve, out);
            }
            BinaryOp::Identical | BinaryOp::Eq | BinaryOp::NotIdentical | BinaryOp::Ne => {
                if let Some(var) = null_comparison(&b.left, &b.right) {
                    let equal = matches!(b.op, BinaryOp::Identical | BinaryOp::Eq);
                    out.push(TypeGuard {
                        var: var.to_string(),
                        ty: Type::Null,
                        positive: equal == positive,
                    });
                }
            }
            _ => {}
        },
        _ => {}
    }
}

/// `$x` from `$x <op> null` or `null <op> $x`
pub fn null_comparison<'e>(left: &'e Expression, right: &'e Expression) -> Option<&'e str> {
    match (left, right) {
        (Expression::NullLiteral(_), other) | (other, Expression::NullLiteral(_)) => other.as_variable(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::{IsExpr, Pos, UnaryExpr};

    fn pos() -> Pos {
        Pos::new("t.sola", 1, 1)
    }

    fn resolve(node: &TypeNode) -> Type {
        Type::from_node(node)
    }

    fn is(var: &str, class: &str) -> Expression {
        Expression::Is(IsExpr {
            value: Box::new(Expression::var(var, pos())),
            target: TypeNode::class(class),
            pos: pos(),
        })
    }

    fn guards(cond: &Expression, positive: bool) -> Vec<TypeGuard> {
        let mut out = Vec::new();
        extract_guards(cond, positive, &resolve, &mut out);
        out
    }

    #[test]
    fn test_is_guard() {
        let g = guards(&is("x", "Dog"), true);
        assert_eq!(g.len(), 1);
        assert_eq!(g[0].ty, Type::named("Dog"));
        assert!(g[0].positive);
    }

    #[test]
    fn test_not_inverts() {
        let cond = Expression::Unary(UnaryExpr {
            op: UnaryOp::Not,
            operand: Box::new(is("x", "Dog")),
            pos: pos(),
        });
        assert!(!guards(&cond, true)[0].positive);
    }

    #[test]
    fn test_and_or_positions() {
        let and = Expression::binary(BinaryOp::And, is("x", "A"), is("y", "B"), pos());
        assert_eq!(guards(&and, true).len(), 2);
        assert!(guards(&and, false).is_empty());

        let or = Expression::binary(BinaryOp::Or, is("x", "A"), is("y", "B"), pos());
        assert!(guards(&or, true).is_empty());
        let negated = guards(&or, false);
        assert_eq!(negated.len(), 2);
        assert!(negated.iter().all(|g| !g.positive));
    }

    #[test]
    fn test_not_null_comparison() {
        let cond = Expression::binary(
            BinaryOp::NotIdentical,
            Expression::var("x", pos()),
            Expression::NullLiteral(pos()),
            pos(),
        );
        let g = guards(&cond, true);
        assert_eq!(g[0].ty, Type::Null);
        assert!(!g[0].positive);
        assert!(guards(&cond, false)[0].positive);
    }
}
