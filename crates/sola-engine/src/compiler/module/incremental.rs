//! Incremental compilation driver
//!
//! Compiles a source file together with everything it imports, reusing the
//! build cache for files whose contents and dependencies are unchanged.
//!
//! For each request the driver:
//! 1. Parses the file and, following `use` directives, every file it reaches
//! 2. Updates the dependency graph with the resolved imports
//! 3. Orders the reached files dependencies first
//! 4. Takes each file from the cache, or compiles it against the
//!    declarations of its dependencies and caches the result
//!
//! Parsing is supplied by the caller through [`SourceParser`].

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use super::cache::{CacheError, CacheManager, CacheStats};
use super::graph::{DependencyGraph, GraphError};
use super::resolver::ImportResolver;
use crate::compiler::bytecode::CompiledUnit;
use crate::compiler::codegen::Compiler;
use crate::config::{CompilerOptions, ConfigError, SolaConfig};
use crate::parser::ast::File;
use crate::parser::checker::{has_errors, Diagnostic};

/// Syntax error reported by a [`SourceParser`]
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Front end turning source text into a syntax tree
pub trait SourceParser {
    fn parse(&self, path: &Path, source: &str) -> Result<File, ParseError>;
}

impl<F> SourceParser for F
where
    F: Fn(&Path, &str) -> Result<File, ParseError>,
{
    fn parse(&self, path: &Path, source: &str) -> Result<File, ParseError> {
        self(path, source)
    }
}

/// Errors that stop an incremental build
#[derive(Debug, Error)]
pub enum IncrementalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    /// The file has errors; its diagnostics are sorted by position
    #[error("{} error(s) in {path}", .diagnostics.iter().filter(|d| d.is_error()).count())]
    Compile {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Counters of an incremental compiler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncrementalStats {
    /// Files compiled from source
    pub files_compiled: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Files compiled from source by the last request, in compile order
    pub last_order: Vec<PathBuf>,
    pub cache: CacheStats,
}

/// Compiles source files on demand, caching compiled units on disk
pub struct IncrementalCompiler<P: SourceParser> {
    parser: P,
    options: CompilerOptions,
    resolver: ImportResolver,
    graph: DependencyGraph,
    cache: CacheManager,
    watched: FxHashSet<PathBuf>,
    /// Warnings of the last compile of each file
    warnings: FxHashMap<PathBuf, Vec<Diagnostic>>,
    files_compiled: usize,
    cache_hits: usize,
    cache_misses: usize,
    last_order: Vec<PathBuf>,
}

impl<P: SourceParser> IncrementalCompiler<P> {
    /// Create a compiler for `work_dir`, configured from its `sola.toml`
    pub fn new(work_dir: &Path, parser: P) -> Result<Self, IncrementalError> {
        let config = SolaConfig::load(work_dir)?;
        Self::with_config(work_dir, parser, config)
    }

    pub fn with_config(
        work_dir: &Path,
        parser: P,
        config: SolaConfig,
    ) -> Result<Self, IncrementalError> {
        let work_dir = work_dir.canonicalize()?;
        let cache = CacheManager::open(&work_dir, config.cache)?;
        Ok(Self {
            parser,
            options: config.compiler,
            resolver: ImportResolver::new(work_dir),
            graph: DependencyGraph::new(),
            cache,
            watched: FxHashSet::default(),
            warnings: FxHashMap::default(),
            files_compiled: 0,
            cache_hits: 0,
            cache_misses: 0,
            last_order: Vec::new(),
        })
    }

    pub fn work_dir(&self) -> &Path {
        self.resolver.work_dir()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Warnings reported the last time `path` was compiled from source
    pub fn warnings(&self, path: &Path) -> &[Diagnostic] {
        self.warnings.get(path).map_or(&[], Vec::as_slice)
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf, IncrementalError> {
        let path = if path.is_relative() {
            self.work_dir().join(path)
        } else {
            path.to_path_buf()
        };
        path.canonicalize()
            .map_err(|source| IncrementalError::Read { path, source })
    }

    // ========================================================================
    // Compilation
    // ========================================================================

    /// Compile `source` and everything it imports
    pub fn compile(&mut self, source: &Path) -> Result<CompiledUnit, IncrementalError> {
        let path = self.absolute(source)?;
        let mut units = self.build(&[path.clone()])?;
        units
            .remove(&path)
            .ok_or(IncrementalError::Graph(GraphError::UnknownFile(path)))
    }

    /// Recompile every tracked file changed on disk since it was last
    /// compiled, along with the files importing it
    pub fn compile_changed(&mut self) -> Result<FxHashMap<PathBuf, CompiledUnit>, IncrementalError> {
        let changed = self.graph.detect_changes();
        if changed.is_empty() {
            self.last_order.clear();
            return Ok(FxHashMap::default());
        }

        // Importers of a deleted file still need rebuilding
        let rebuild = self.graph.rebuild_set(&changed);
        for path in changed.iter().filter(|p| !p.is_file()) {
            log::debug!("{} was deleted", path.display());
            self.cache.invalidate(path)?;
            self.cache.invalidate_dependents(path)?;
            self.graph.remove_file(path);
            self.watched.remove(path);
        }

        let mut targets: Vec<PathBuf> = rebuild.iter().filter(|p| p.is_file()).cloned().collect();
        targets.sort();
        log::debug!("{} changed files, {} to rebuild", changed.len(), targets.len());

        let mut units = self.build(&targets)?;
        units.retain(|path, _| rebuild.contains(path));
        Ok(units)
    }

    /// Load, order and compile `targets` with their dependencies
    fn build(&mut self, targets: &[PathBuf]) -> Result<FxHashMap<PathBuf, CompiledUnit>, IncrementalError> {
        let files = self.load(targets)?;
        let reached: FxHashSet<PathBuf> = files.keys().cloned().collect();
        let order = self.graph.topological_order(&reached);
        log::debug!("compile order: {:?}", order);

        self.last_order.clear();
        let mut units = FxHashMap::default();
        for path in order {
            let unit = match self.cache.get(&path)? {
                Some(unit) => {
                    self.cache_hits += 1;
                    self.graph.track(&path);
                    unit
                }
                None => {
                    self.cache_misses += 1;
                    self.compile_one(&path, &files)?
                }
            };
            units.insert(path, unit);
        }
        Ok(units)
    }

    /// Parse `targets` and every file they reach through `use` directives
    fn load(&mut self, targets: &[PathBuf]) -> Result<FxHashMap<PathBuf, File>, IncrementalError> {
        let mut files: FxHashMap<PathBuf, File> = FxHashMap::default();
        let mut to_visit: Vec<PathBuf> = targets.to_vec();

        while let Some(path) = to_visit.pop() {
            if files.contains_key(&path) {
                continue;
            }
            let source = fs::read_to_string(&path).map_err(|source| IncrementalError::Read {
                path: path.clone(),
                source,
            })?;
            let file = self
                .parser
                .parse(&path, &source)
                .map_err(|source| IncrementalError::Parse {
                    path: path.clone(),
                    source,
                })?;

            let mut imports = Vec::with_capacity(file.uses.len());
            for import in &file.uses {
                if let Some(resolved) = self.resolver.resolve(&import.path, &path) {
                    if !imports.contains(&resolved) {
                        imports.push(resolved);
                    }
                }
            }
            to_visit.extend(imports.iter().cloned());
            self.graph.update_dependencies(&path, imports);
            files.insert(path, file);
        }
        Ok(files)
    }

    /// Compile one file from source against its dependencies' declarations
    fn compile_one(
        &mut self,
        path: &Path,
        files: &FxHashMap<PathBuf, File>,
    ) -> Result<CompiledUnit, IncrementalError> {
        let file = files
            .get(path)
            .ok_or_else(|| GraphError::UnknownFile(path.to_path_buf()))?;
        let dependencies = self.graph.transitive_dependencies(path)?;

        let mut compiler = Compiler::with_options(self.options.clone());
        for dependency in &dependencies {
            if let Some(dep) = files.get(dependency) {
                compiler.bind_dependency(dep);
            }
        }
        let (unit, diagnostics) = compiler.compile_unit(file);

        if has_errors(&diagnostics) {
            log::debug!("{} failed to compile", path.display());
            self.cache.invalidate(path)?;
            self.cache.invalidate_dependents(path)?;
            return Err(IncrementalError::Compile {
                path: path.to_path_buf(),
                diagnostics,
            });
        }

        let direct = self.graph.imports(path).to_vec();
        self.cache.put(path, &unit, &direct)?;
        self.graph.track(path);
        self.warnings.insert(path.to_path_buf(), diagnostics);
        self.files_compiled += 1;
        self.last_order.push(path.to_path_buf());
        log::debug!("compiled {}", path.display());
        Ok(unit)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Track `path` so `compile_changed` picks up edits to it
    pub fn watch_file(&mut self, path: &Path) -> Result<(), IncrementalError> {
        let path = self.absolute(path)?;
        self.graph.track(&path);
        self.watched.insert(path);
        Ok(())
    }

    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.watched.iter().cloned().collect();
        files.sort();
        files
    }

    pub fn clear_cache(&mut self) -> Result<(), IncrementalError> {
        self.cache.clear()?;
        Ok(())
    }

    pub fn stats(&self) -> IncrementalStats {
        IncrementalStats {
            files_compiled: self.files_compiled,
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            last_order: self.last_order.clone(),
            cache: self.cache.stats(),
        }
    }
}
