//! Named-argument binding
//!
//! Maps a call's positional and named arguments onto parameter slots. Shared
//! by the checker (for diagnostics) and the emitter (for argument order).

use crate::parser::ast::{Argument, Expression, Pos};

use super::error::CompileError;

/// Why an argument list could not be bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingIssue {
    UnknownName(String),
    Duplicate(String),
    Missing(String),
    PositionalAfterNamed,
}

impl BindingIssue {
    pub fn into_error(self, callee: &str, pos: &Pos) -> CompileError {
        let callee = callee.to_string();
        let pos = pos.clone();
        match self {
            BindingIssue::UnknownName(name) => CompileError::UnknownNamedArgument { callee, name, pos },
            BindingIssue::Duplicate(name) => CompileError::DuplicateNamedArgument { callee, name, pos },
            BindingIssue::Missing(name) => CompileError::MissingArgument { callee, name, pos },
            BindingIssue::PositionalAfterNamed => CompileError::PositionalAfterNamed { callee, pos },
        }
    }
}

/// Whether any argument is passed by name
pub fn has_named(args: &[Argument]) -> bool {
    args.iter().any(|a| a.name.is_some())
}

/// Bind `args` to parameter slots.
///
/// Without named arguments every argument keeps its position. Otherwise each
/// slot holds the argument passed for it; trailing unfilled slots are cut
/// off and interior holes stay `None`.
pub fn bind_arguments<'e>(
    args: &'e [Argument],
    param_names: &[String],
    min_arity: usize,
) -> Result<Vec<Option<&'e Expression>>, Vec<BindingIssue>> {
    if !has_named(args) {
        return Ok(args.iter().map(|a| Some(&a.value)).collect());
    }

    let mut slots: Vec<Option<&'e Expression>> = vec![None; param_names.len()];
    let mut issues = Vec::new();
    let mut seen_named = false;

    for (i, arg) in args.iter().enumerate() {
        match &arg.name {
            None if seen_named => issues.push(BindingIssue::PositionalAfterNamed),
            None => {
                if i < slots.len() {
                    slots[i] = Some(&arg.value);
                } else {
                    slots.push(Some(&arg.value));
                }
            }
            Some(name) => {
                seen_named = true;
                match param_names.iter().position(|p| p == name) {
                    None => issues.push(BindingIssue::UnknownName(name.clone())),
                    Some(idx) if slots[idx].is_some() => {
                        issues.push(BindingIssue::Duplicate(name.clone()))
                    }
                    Some(idx) => slots[idx] = Some(&arg.value),
                }
            }
        }
    }

    for (idx, name) in param_names.iter().enumerate().take(min_arity) {
        if slots[idx].is_none() {
            issues.push(BindingIssue::Missing(name.clone()));
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    while matches!(slots.last(), Some(None)) {
        slots.pop();
    }
    Ok(slots)
}
