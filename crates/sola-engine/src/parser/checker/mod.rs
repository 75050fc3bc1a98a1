//! Sola Type Checker
//!
//! Declaration binding, expression and statement checking, and the
//! diagnostics they produce.
//!
//! This module provides:
//! - Symbol tables for functions, classes, interfaces, enums and aliases
//! - Name binding (AST → Symbol Table)
//! - Type checking for expressions and statements
//! - Guard-based type narrowing
//! - Exhaustiveness checking for switches over enums
//! - Named-argument binding shared with the emitter

pub mod symbols;
pub mod binder;
pub mod builtins;
pub mod calls;
pub mod checker;
mod infer;
pub mod error;
pub mod type_guards;
pub mod exhaustiveness;
pub mod diagnostic;

// Re-export main types
pub use symbols::{
    ClassSignature, FunctionSig, GenericParam, MethodSig, NewTypeInfo, PropertySig, SymbolTable,
};
pub use binder::Binder;
pub use builtins::{builtin_table, NATIVE_PREFIX, RESERVED_NAMESPACE};
pub use calls::{bind_arguments, has_named, BindingIssue};
pub use checker::{CheckResult, InferredTypes, TypeChecker};
pub use error::{CheckWarning, CompileError, WarningCode, WarningConfig};
pub use exhaustiveness::ExhaustivenessResult;
pub use diagnostic::{collect_diagnostics, has_errors, sort_diagnostics, Diagnostic, Severity};
