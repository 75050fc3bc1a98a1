//! Sola back half: bytecode, emission, optimisation and incremental builds.
//!
//! [`Compiler`] turns one checked file into a [`CompiledUnit`];
//! [`IncrementalCompiler`] drives it across files with an on-disk cache.

pub mod bytecode;
pub mod codegen;
pub mod module;
pub mod optimize;

pub use bytecode::{ClassDef, CompiledUnit, EnumDef, Function, Opcode, Value};
pub use codegen::{Compiler, MAX_LOCALS};
pub use module::{
    CacheManager, CacheStats, DependencyGraph, ImportResolver, IncrementalCompiler,
    IncrementalError, IncrementalStats, SourceParser,
};
