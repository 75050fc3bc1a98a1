//! Sola Language Engine
//!
//! This crate provides the compile-time half of the Sola language:
//! - **Parser**: syntax tree, type system, type checker and flow analysis
//!   (`parser` module). Lexing and parsing are done by an external front end.
//! - **Compiler**: bytecode, emission with its optimisations, and the
//!   incremental build cache (`compiler` module)
//! - **Config**: compiler options and cache limits from `sola.toml`
//!
//! # Example
//!
//! ```rust,ignore
//! use sola_engine::{ast::File, Compiler};
//!
//! let file: File = front_end.parse("main.sola", source)?;
//!
//! let mut compiler = Compiler::new();
//! let (main, diagnostics) = compiler.compile_file(&file);
//! for d in &diagnostics {
//!     eprintln!("{}", d);
//! }
//! println!("{}", sola_engine::disassemble(&main));
//! ```

#![warn(rust_2018_idioms)]

// ============================================================================
// Core Modules
// ============================================================================

/// Parser module: AST, types, type checker and dataflow
pub mod parser;

/// Compiler module: bytecode, code generation, optimisation and caching
pub mod compiler;

/// Compiler and cache configuration
pub mod config;

// ============================================================================
// Re-exports from Parser
// ============================================================================

pub use parser::{
    // AST
    ast, File, Pos,
    // Types
    Type,
    // Checker
    Binder, CheckResult, CompileError, SymbolTable, TypeChecker,
};
pub use parser::checker::{Diagnostic, Severity, WarningCode, WarningConfig};

// ============================================================================
// Re-exports from Compiler
// ============================================================================

pub use compiler::{
    // Bytecode
    ClassDef, CompiledUnit, EnumDef, Function, Opcode, Value,
    // Compiler
    Compiler, MAX_LOCALS,
    // Incremental builds
    CacheManager, CacheStats, DependencyGraph, ImportResolver, IncrementalCompiler,
    IncrementalError, IncrementalStats, SourceParser,
};
pub use compiler::bytecode::{deserialize_from_bytes, disassemble, serialize_to_bytes};
pub use compiler::module::ParseError;

pub use config::{CacheConfig, CompilerOptions, SolaConfig};
