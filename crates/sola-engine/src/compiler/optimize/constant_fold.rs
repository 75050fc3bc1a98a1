//! Constant Folding
//!
//! Evaluates literal-only expression trees at compile time. Anything that
//! could behave differently at runtime (division by zero, integer overflow,
//! out-of-range shifts, mixed-type operands) is left for the VM.

use crate::compiler::bytecode::Value;
use crate::parser::ast::*;

/// Reduce `expr` to a value, or `None` when it is not a compile-time constant
pub fn eval_const_expr(expr: &Expression) -> Option<Value> {
    match expr {
        Expression::IntLiteral(i) => Some(Value::Int(i.value)),
        Expression::FloatLiteral(f) => Some(Value::Float(f.value)),
        Expression::StringLiteral(s) => Some(Value::String(s.value.clone())),
        Expression::BoolLiteral(b) => Some(Value::Bool(b.value)),
        Expression::NullLiteral(_) => Some(Value::Null),
        Expression::Interpolated(s) => {
            let mut out = String::new();
            for part in &s.parts {
                match part {
                    InterpolationPart::Literal(text) => out.push_str(text),
                    InterpolationPart::Expression(_) => return None,
                }
            }
            Some(Value::String(out))
        }
        Expression::Binary(b) => {
            let left = eval_const_expr(&b.left)?;
            match b.op {
                BinaryOp::And if !left.is_truthy() => Some(left),
                BinaryOp::Or if left.is_truthy() => Some(left),
                BinaryOp::Coalesce if !left.is_null() => Some(left),
                BinaryOp::And | BinaryOp::Or | BinaryOp::Coalesce => eval_const_expr(&b.right),
                op => eval_binary(op, &left, &eval_const_expr(&b.right)?),
            }
        }
        Expression::Unary(u) => eval_unary(u.op, &eval_const_expr(&u.operand)?),
        Expression::Ternary(t) => {
            let cond = eval_const_expr(&t.condition)?;
            if cond.is_truthy() {
                eval_const_expr(&t.then_branch)
            } else {
                eval_const_expr(&t.else_branch)
            }
        }
        _ => None,
    }
}

/// Truthiness of a constant condition
pub fn const_condition(expr: &Expression) -> Option<bool> {
    eval_const_expr(expr).map(|v| v.is_truthy())
}

/// Evaluate a binary operator on two constants
pub fn eval_binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    use BinaryOp::*;
    match (op, left, right) {
        // Strings
        (Add, Value::String(a), Value::String(b)) => Some(Value::String(format!("{}{}", a, b))),

        // Integer arithmetic
        (Add, Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int),
        (Sub, Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int),
        (Mul, Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int),
        (Div, Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int),
        (Mod, Value::Int(a), Value::Int(b)) => a.checked_rem(*b).map(Value::Int),

        // Float arithmetic, ints promote
        (Add | Sub | Mul | Div | Mod, a, b) if a.is_number() && b.is_number() => {
            let (x, y) = (a.to_float()?, b.to_float()?);
            let result = match op {
                Add => x + y,
                Sub => x - y,
                Mul => x * y,
                Div if y == 0.0 => return None,
                Div => x / y,
                Mod if y == 0.0 => return None,
                _ => x % y,
            };
            Some(Value::Float(result))
        }

        // Bitwise
        (BitAnd, Value::Int(a), Value::Int(b)) => Some(Value::Int(a & b)),
        (BitOr, Value::Int(a), Value::Int(b)) => Some(Value::Int(a | b)),
        (BitXor, Value::Int(a), Value::Int(b)) => Some(Value::Int(a ^ b)),
        (Shl, Value::Int(a), Value::Int(b)) if (0..64).contains(b) => Some(Value::Int(a << b)),
        (Shr, Value::Int(a), Value::Int(b)) if (0..64).contains(b) => Some(Value::Int(a >> b)),

        // Equality: numbers compare by value, everything else structurally
        (Eq | Ne, a, b) => {
            let equal = loose_equals(a, b);
            Some(Value::Bool(if op == Eq { equal } else { !equal }))
        }
        (Identical, a, b) => Some(Value::Bool(a == b)),
        (NotIdentical, a, b) => Some(Value::Bool(a != b)),

        // Ordering
        (Lt | Le | Gt | Ge, a, b) => {
            let ord = a.compare(b)?;
            Some(Value::Bool(match op {
                Lt => ord < 0,
                Le => ord <= 0,
                Gt => ord > 0,
                _ => ord >= 0,
            }))
        }

        _ => None,
    }
}

/// Evaluate a unary operator on a constant
pub fn eval_unary(op: UnaryOp, operand: &Value) -> Option<Value> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Int(n)) => n.checked_neg().map(Value::Int),
        (UnaryOp::Neg, Value::Float(f)) => Some(Value::Float(-f)),
        (UnaryOp::Not, v) => Some(Value::Bool(!v.is_truthy())),
        (UnaryOp::BitNot, Value::Int(n)) => Some(Value::Int(!n)),
        _ => None,
    }
}

fn loose_equals(a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return a.compare(b) == Some(0);
    }
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new("t.sola", 1, 1)
    }

    fn int(n: i64) -> Expression {
        Expression::int(n, pos())
    }

    fn bin(op: BinaryOp, l: Expression, r: Expression) -> Expression {
        Expression::binary(op, l, r, pos())
    }

    #[test]
    fn test_fold_nested_arithmetic() {
        let expr = bin(BinaryOp::Add, int(1), bin(BinaryOp::Mul, int(2), int(3)));
        assert_eq!(eval_const_expr(&expr), Some(Value::Int(7)));
    }

    #[test]
    fn test_mixed_promotes_to_float() {
        let expr = bin(BinaryOp::Add, int(1), Expression::float(0.5, pos()));
        assert_eq!(eval_const_expr(&expr), Some(Value::Float(1.5)));
    }

    #[test]
    fn test_division_by_zero_not_folded() {
        assert_eq!(eval_const_expr(&bin(BinaryOp::Div, int(1), int(0))), None);
        assert_eq!(eval_const_expr(&bin(BinaryOp::Mod, int(1), int(0))), None);
        let float_div = bin(BinaryOp::Div, Expression::float(1.0, pos()), int(0));
        assert_eq!(eval_const_expr(&float_div), None);
        assert_eq!(eval_const_expr(&bin(BinaryOp::Div, int(7), int(2))), Some(Value::Int(3)));
    }

    #[test]
    fn test_overflow_not_folded() {
        let expr = bin(BinaryOp::Add, int(i64::MAX), int(1));
        assert_eq!(eval_const_expr(&expr), None);
        assert_eq!(eval_const_expr(&bin(BinaryOp::Shl, int(1), int(64))), None);
    }

    #[test]
    fn test_string_concat_and_compare() {
        let s = |v: &str| Expression::string(v, pos());
        assert_eq!(
            eval_const_expr(&bin(BinaryOp::Add, s("a"), s("b"))),
            Some(Value::string("ab"))
        );
        assert_eq!(
            eval_const_expr(&bin(BinaryOp::Lt, s("a"), s("b"))),
            Some(Value::Bool(true))
        );
        assert_eq!(eval_const_expr(&bin(BinaryOp::Add, s("a"), int(1))), None);
    }

    #[test]
    fn test_logical_keeps_last_value() {
        let and = bin(BinaryOp::And, int(0), int(5));
        assert_eq!(eval_const_expr(&and), Some(Value::Int(0)));
        let or = bin(BinaryOp::Or, int(0), int(5));
        assert_eq!(eval_const_expr(&or), Some(Value::Int(5)));
        let coalesce = bin(BinaryOp::Coalesce, Expression::NullLiteral(pos()), int(2));
        assert_eq!(eval_const_expr(&coalesce), Some(Value::Int(2)));
    }

    #[test]
    fn test_equality_rules() {
        let f = Expression::float(1.0, pos());
        assert_eq!(
            eval_const_expr(&bin(BinaryOp::Eq, int(1), f.clone())),
            Some(Value::Bool(true))
        );
        assert_eq!(
            eval_const_expr(&bin(BinaryOp::Identical, int(1), f)),
            Some(Value::Bool(false))
        );
    }

    #[test]
    fn test_unary_and_variables() {
        let neg = Expression::Unary(UnaryExpr {
            op: UnaryOp::Neg,
            operand: Box::new(int(4)),
            pos: pos(),
        });
        assert_eq!(eval_const_expr(&neg), Some(Value::Int(-4)));
        let with_var = bin(BinaryOp::Add, int(1), Expression::var("x", pos()));
        assert_eq!(eval_const_expr(&with_var), None);
        assert_eq!(const_condition(&Expression::boolean(false, pos())), Some(false));
    }
}
