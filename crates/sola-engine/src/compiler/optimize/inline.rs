//! Small-function inlining
//!
//! A function qualifies when its compiled chunk is tiny and its body is a
//! single `return <expr>;` over its own parameters. Call sites passing exactly
//! one positional argument per parameter re-emit that expression with the
//! parameters bound to fresh locals holding the arguments.

use crate::compiler::bytecode::Function;
use crate::parser::ast::*;

/// Largest chunk, in bytes, that may be inlined
pub const MAX_INLINE_BYTES: usize = 20;

/// Whether a compiled function is small and simple enough to inline
pub fn is_inlinable(function: &Function) -> bool {
    !function.is_builtin
        && !function.is_variadic
        && function.upvalue_count == 0
        && function.chunk.len() <= MAX_INLINE_BYTES
}

/// Source-level view of an inlinable function
#[derive(Debug, Clone)]
pub struct InlineCandidate<'a> {
    pub name: String,
    pub params: Vec<&'a str>,
    pub body: &'a Expression,
}

impl<'a> InlineCandidate<'a> {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Inspect a declaration; `None` unless its body is one `return` of an
/// expression that only reads its parameters
pub fn inline_candidate<'a>(name: &str, decl: &'a FunctionDecl) -> Option<InlineCandidate<'a>> {
    if decl.params.iter().any(|p| p.variadic) {
        return None;
    }
    let [Statement::Return(ret)] = decl.body.as_slice() else {
        return None;
    };
    let [body] = ret.values.as_slice() else {
        return None;
    };

    let params: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
    if !variables_in(body).iter().all(|v| params.contains(v)) {
        return None;
    }

    let mut check = BodyCheck {
        name: &decl.name,
        ok: true,
    };
    check.visit_expression(body);
    if !check.ok {
        return None;
    }

    Some(InlineCandidate {
        name: name.to_string(),
        params,
        body,
    })
}

/// Rejects self-reference, `$this` and nested functions
struct BodyCheck<'n> {
    name: &'n str,
    ok: bool,
}

impl<'n, 'a> Visitor<'a> for BodyCheck<'n> {
    fn visit_expression(&mut self, expr: &'a Expression) {
        match expr {
            Expression::Identifier(id) if id.name == self.name => self.ok = false,
            Expression::This(_) => self.ok = false,
            _ => walk_expression(self, expr),
        }
    }

    fn visit_nested_function(&mut self, _expr: &'a Expression) {
        self.ok = false;
    }
}

/// Function identifiers an inlined body refers to
pub fn referenced_functions(body: &Expression) -> Vec<&str> {
    struct Names<'a> {
        names: Vec<&'a str>,
    }
    impl<'a> Visitor<'a> for Names<'a> {
        fn visit_expression(&mut self, expr: &'a Expression) {
            if let Expression::Identifier(id) = expr {
                self.names.push(&id.name);
            }
            walk_expression(self, expr);
        }
    }
    let mut names = Names { names: Vec::new() };
    names.visit_expression(body);
    names.names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::new("t.sola", 1, 1)
    }

    fn func(name: &str, params: &[&str], body: Vec<Statement>) -> FunctionDecl {
        FunctionDecl {
            name: name.into(),
            type_params: Vec::new(),
            params: params.iter().map(|p| Param::new(*p, None, pos())).collect(),
            return_type: None,
            body,
            pos: pos(),
        }
    }

    fn ret(value: Expression) -> Statement {
        Statement::Return(ReturnStmt {
            values: vec![value],
            pos: pos(),
        })
    }

    #[test]
    fn test_single_return_over_params() {
        let body = Expression::binary(
            BinaryOp::Mul,
            Expression::var("x", pos()),
            Expression::int(2, pos()),
            pos(),
        );
        let decl = func("double", &["x"], vec![ret(body)]);
        let candidate = inline_candidate("double", &decl).unwrap();
        assert_eq!(candidate.arity(), 1);
        assert_eq!(candidate.params, vec!["x"]);
    }

    #[test]
    fn test_free_variables_rejected() {
        let decl = func("f", &["x"], vec![ret(Expression::var("y", pos()))]);
        assert!(inline_candidate("f", &decl).is_none());
    }

    #[test]
    fn test_recursion_rejected() {
        let call = Expression::call(
            Expression::ident("f", pos()),
            vec![Argument::positional(Expression::var("x", pos()))],
            pos(),
        );
        let decl = func("f", &["x"], vec![ret(call)]);
        assert!(inline_candidate("f", &decl).is_none());
    }

    #[test]
    fn test_multi_statement_rejected() {
        let decl = func(
            "f",
            &[],
            vec![
                Statement::Echo(EchoStmt {
                    value: Expression::int(1, pos()),
                    pos: pos(),
                }),
                ret(Expression::int(1, pos())),
            ],
        );
        assert!(inline_candidate("f", &decl).is_none());
    }

    #[test]
    fn test_inlinable_heuristic() {
        let mut f = Function::new("f", "t.sola");
        assert!(is_inlinable(&f));
        f.chunk.code = vec![0; MAX_INLINE_BYTES + 1];
        assert!(!is_inlinable(&f));
        f.chunk.code.clear();
        f.upvalue_count = 1;
        assert!(!is_inlinable(&f));
    }
}
