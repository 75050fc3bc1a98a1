//! File dependency graph
//!
//! Tracks which files each source imports and, in reverse, which files
//! import it. Provides:
//! - Change detection from modification times
//! - The rebuild set of a change (the file plus its transitive importers)
//! - Compilation order, dependencies first
//!
//! Import cycles are allowed: files left over once the acyclic part has been
//! ordered are appended in path order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Errors related to dependency graph queries
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// File not found in graph
    #[error("File not tracked by the dependency graph: {0}")]
    UnknownFile(PathBuf),
}

/// A node in the dependency graph
#[derive(Debug, Clone, Default)]
pub struct FileNode {
    /// Files this file imports
    pub imports: Vec<PathBuf>,
    /// Files that import this file
    pub importers: FxHashSet<PathBuf>,
}

/// Modification time recorded for a tracked file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileState {
    mtime: Option<SystemTime>,
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Import graph of every file seen by the incremental compiler
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: FxHashMap<PathBuf, FileNode>,
    files: FxHashMap<PathBuf, FileState>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &Path) {
        self.nodes.entry(path.to_path_buf()).or_default();
    }

    /// Replace the imports of `path`
    pub fn update_dependencies(&mut self, path: &Path, imports: Vec<PathBuf>) {
        let previous = self
            .nodes
            .get_mut(path)
            .map(|node| std::mem::take(&mut node.imports))
            .unwrap_or_default();
        for old in &previous {
            if let Some(node) = self.nodes.get_mut(old) {
                node.importers.remove(path);
            }
        }

        for import in &imports {
            self.nodes
                .entry(import.clone())
                .or_default()
                .importers
                .insert(path.to_path_buf());
        }
        self.nodes.entry(path.to_path_buf()).or_default().imports = imports;
    }

    /// Forget `path` and every edge touching it
    pub fn remove_file(&mut self, path: &Path) {
        self.update_dependencies(path, Vec::new());
        if let Some(node) = self.nodes.remove(path) {
            for importer in &node.importers {
                if let Some(importer) = self.nodes.get_mut(importer) {
                    importer.imports.retain(|p| p != path);
                }
            }
        }
        self.files.remove(path);
    }

    pub fn get(&self, path: &Path) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn imports(&self, path: &Path) -> &[PathBuf] {
        self.nodes.get(path).map_or(&[], |n| n.imports.as_slice())
    }

    /// Direct importers of `path`, sorted
    pub fn importers(&self, path: &Path) -> Vec<PathBuf> {
        let mut importers: Vec<PathBuf> = self
            .nodes
            .get(path)
            .map(|n| n.importers.iter().cloned().collect())
            .unwrap_or_default();
        importers.sort();
        importers
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ========================================================================
    // Change Detection
    // ========================================================================

    /// Record the current modification time of `path`
    pub fn track(&mut self, path: &Path) {
        self.add_file(path);
        self.files.insert(
            path.to_path_buf(),
            FileState {
                mtime: modified(path),
            },
        );
    }

    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Tracked files modified since they were recorded, or deleted, sorted
    pub fn detect_changes(&self) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(path, state)| match (modified(path), state.mtime) {
                (None, _) => true,
                (Some(now), Some(then)) => now > then,
                (Some(_), None) => true,
            })
            .map(|(path, _)| path.clone())
            .collect();
        changed.sort();
        changed
    }

    /// Every file that imports `path`, directly or not
    pub fn transitive_importers(&self, path: &Path) -> FxHashSet<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<&Path> = VecDeque::from([path]);
        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(current) {
                for importer in &node.importers {
                    if importer != path && seen.insert(importer.clone()) {
                        queue.push_back(importer);
                    }
                }
            }
        }
        seen
    }

    /// Every file `path` imports, directly or not, dependencies first
    pub fn transitive_dependencies(&self, path: &Path) -> Result<Vec<PathBuf>, GraphError> {
        if !self.nodes.contains_key(path) {
            return Err(GraphError::UnknownFile(path.to_path_buf()));
        }
        let mut seen: FxHashSet<PathBuf> = FxHashSet::default();
        let mut queue: VecDeque<&Path> = VecDeque::from([path]);
        while let Some(current) = queue.pop_front() {
            for import in self.imports(current) {
                if import != path && seen.insert(import.clone()) {
                    queue.push_back(import);
                }
            }
        }
        Ok(self.topological_order(&seen))
    }

    /// Changed files plus everything that transitively imports them
    pub fn rebuild_set(&self, changed: &[PathBuf]) -> FxHashSet<PathBuf> {
        let mut set: FxHashSet<PathBuf> = changed.iter().cloned().collect();
        for path in changed {
            set.extend(self.transitive_importers(path));
        }
        set
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    /// Order `files` so each comes after the files it imports.
    ///
    /// Only edges inside `files` count. Files caught in a cycle follow the
    /// rest in path order.
    pub fn topological_order(&self, files: &FxHashSet<PathBuf>) -> Vec<PathBuf> {
        let mut pending: FxHashMap<&Path, usize> = files
            .iter()
            .map(|path| {
                let degree = self
                    .imports(path)
                    .iter()
                    .filter(|import| *import != path && files.contains(*import))
                    .count();
                (path.as_path(), degree)
            })
            .collect();

        let mut ready: Vec<&Path> = pending
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(path, _)| *path)
            .collect();
        ready.sort();
        let mut queue: VecDeque<&Path> = ready.into();

        let mut order = Vec::with_capacity(files.len());
        while let Some(path) = queue.pop_front() {
            pending.remove(path);
            order.push(path.to_path_buf());

            for importer in self.importers(path) {
                if importer == path {
                    continue;
                }
                if let Some(degree) = pending.get_mut(importer.as_path()) {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some(key) = files.get(&importer) {
                            queue.push_back(key.as_path());
                        }
                    }
                }
            }
        }

        if !pending.is_empty() {
            let mut rest: Vec<&Path> = pending.into_keys().collect();
            rest.sort();
            log::debug!("import cycle among {} files; appending in path order", rest.len());
            order.extend(rest.into_iter().map(Path::to_path_buf));
        }
        order
    }
}
