//! Incremental multi-file compilation
//!
//! This module provides:
//! - Content hashing of source files
//! - The on-disk build cache with LRU and size eviction
//! - The import dependency graph and compile ordering
//! - `use` path resolution
//! - The incremental driver tying them together

mod cache;
mod graph;
mod hash;
mod incremental;
mod resolver;

pub use cache::{blob_name, CacheEntry, CacheError, CacheIndex, CacheManager, CacheStats, INDEX_FILE, INDEX_VERSION};
pub use graph::{DependencyGraph, FileNode, GraphError};
pub use hash::{hash_bytes, hash_file, hash_string};
pub use incremental::{IncrementalCompiler, IncrementalError, IncrementalStats, ParseError, SourceParser};
pub use resolver::{ImportResolver, LIB_DIR, SOURCE_EXTENSION};
