//! Sola front half: syntax tree, types, checking and flow analysis.
//!
//! The lexer and parser are external; they produce an [`ast::File`] which
//! the [`checker::Binder`] indexes and the [`checker::TypeChecker`] checks.

pub mod ast;

// Type system
pub mod types;

// Type checker
pub mod checker;

// Control-flow graph and dataflow
pub mod flow;

pub use ast::{File, Pos};
pub use types::Type;
pub use checker::{Binder, CheckResult, CompileError, SymbolTable, TypeChecker};
