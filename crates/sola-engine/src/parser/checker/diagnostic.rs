//! Flat diagnostic records
//!
//! Errors and warnings from every phase are converted into [`Diagnostic`]s,
//! filtered through the [`WarningConfig`], deduplicated and sorted by source
//! position before they reach the caller.

use std::fmt;

use super::error::{CheckWarning, CompileError, WarningConfig};
use crate::parser::ast::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// One reported problem
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub pos: Pos,
    pub code: &'static str,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn error(err: &CompileError) -> Self {
        Self {
            pos: err.pos().clone(),
            code: err.code(),
            message: err.to_string(),
            severity: Severity::Error,
        }
    }

    pub fn warning(warning: &CheckWarning) -> Self {
        Self {
            pos: warning.pos().clone(),
            code: warning.code().as_str(),
            message: warning.message(),
            severity: Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}[{}]: {}", self.pos, kind, self.code, self.message)
    }
}

/// Build the final diagnostic list.
///
/// Disabled warnings are dropped, denied ones become errors. The result is
/// sorted by `(filename, line, column)` with exact duplicates removed.
pub fn collect_diagnostics(
    errors: &[CompileError],
    warnings: &[CheckWarning],
    config: &WarningConfig,
) -> Vec<Diagnostic> {
    let mut out: Vec<Diagnostic> = errors.iter().map(Diagnostic::error).collect();
    for warning in warnings {
        let code = warning.code();
        if !config.is_enabled(code) {
            continue;
        }
        let mut diag = Diagnostic::warning(warning);
        if config.is_denied(code) {
            diag.severity = Severity::Error;
        }
        out.push(diag);
    }
    sort_diagnostics(&mut out);
    out
}

/// Sort by position, then severity and code; drop exact duplicates
pub fn sort_diagnostics(diags: &mut Vec<Diagnostic>) {
    diags.sort_by(|a, b| {
        a.pos
            .cmp(&b.pos)
            .then(a.severity.cmp(&b.severity))
            .then(a.code.cmp(b.code))
            .then(a.message.cmp(&b.message))
    });
    diags.dedup();
}

pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}
