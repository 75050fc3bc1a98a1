//! Shared helpers for the integration tests
//!
//! Builds syntax trees directly and provides a one-statement-per-line front
//! end for the incremental driver:
//!
//! ```text
//! use b;
//! function answer() = 42;
//! var x = answer();
//! var s: string = 1;
//! ```

#![allow(dead_code)]

use std::path::Path;

use sola_engine::ast::*;
use sola_engine::ParseError;

pub fn pos(line: u32, column: u32) -> Pos {
    Pos::new("main.sola", line, column)
}

pub fn int(value: i64, line: u32, column: u32) -> Expression {
    Expression::int(value, pos(line, column))
}

pub fn var(name: &str, line: u32, column: u32) -> Expression {
    Expression::var(name, pos(line, column))
}

pub fn bin(op: BinaryOp, left: Expression, right: Expression) -> Expression {
    let at = left.pos().clone();
    Expression::binary(op, left, right, at)
}

pub fn typed_param(name: &str, ty: &str, default: Option<Expression>) -> Param {
    let mut param = Param::new(name, Some(TypeNode::simple(ty)), pos(1, 1));
    param.default = default;
    param
}

pub fn file(statements: Vec<Statement>) -> File {
    let mut f = File::new("main.sola");
    f.statements = statements;
    f
}

// ============================================================================
// Line front end
// ============================================================================

fn error(line: u32, message: &str) -> ParseError {
    ParseError {
        message: message.to_string(),
        line,
        column: 1,
    }
}

fn value(text: &str, at: Pos) -> Result<Expression, ParseError> {
    if let Some(name) = text.strip_suffix("()") {
        return Ok(Expression::call(Expression::ident(name, at.clone()), Vec::new(), at));
    }
    if let Some(name) = text.strip_prefix('$') {
        return Ok(Expression::var(name, at));
    }
    text.parse::<i64>()
        .map(|v| Expression::int(v, at.clone()))
        .map_err(|_| error(at.line, "expected a value"))
}

pub fn parse_lines(path: &Path, source: &str) -> Result<File, ParseError> {
    let filename = path.to_string_lossy().into_owned();
    let mut file = File::new(filename.clone());

    for (index, raw) in source.lines().enumerate() {
        let line = index as u32 + 1;
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let at = Pos::new(filename.as_str(), line, 1);
        let body = text
            .strip_suffix(';')
            .ok_or_else(|| error(line, "expected `;`"))?;
        let words: Vec<&str> = body.split_whitespace().collect();

        match words.as_slice() {
            ["use", name] => file.uses.push(UseDecl {
                path: name.to_string(),
                pos: at,
            }),
            ["function", signature, "=", result] => {
                let name = signature
                    .strip_suffix("()")
                    .ok_or_else(|| error(line, "expected `()`"))?;
                let result = value(result, at.clone())?;
                file.statements.push(Statement::Function(FunctionDecl {
                    name: name.to_string(),
                    type_params: Vec::new(),
                    params: Vec::new(),
                    return_type: Some(TypeNode::simple("int")),
                    body: vec![Statement::Return(ReturnStmt {
                        values: vec![result],
                        pos: at.clone(),
                    })],
                    pos: at,
                }));
            }
            ["var", name, "=", init] => {
                let init = value(init, at.clone())?;
                file.statements
                    .push(Statement::VarDecl(VarDecl::new(*name, None, Some(init), at)));
            }
            ["var", name, ty, "=", init] => {
                let name = name
                    .strip_suffix(':')
                    .ok_or_else(|| error(line, "expected `:`"))?;
                let init = value(init, at.clone())?;
                file.statements.push(Statement::VarDecl(VarDecl::new(
                    name,
                    Some(TypeNode::simple(*ty)),
                    Some(init),
                    at,
                )));
            }
            _ => return Err(error(line, "unrecognised statement")),
        }
    }
    Ok(file)
}
