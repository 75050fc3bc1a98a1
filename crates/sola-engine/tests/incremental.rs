//! Integration tests for the incremental driver
//!
//! Source files are written to a temporary work directory and parsed with
//! the line front end from `common`.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use common::parse_lines;
use sola_engine::ast::File;
use sola_engine::{IncrementalCompiler, IncrementalError, ParseError, Value};
use tempfile::TempDir;

type Parser = fn(&Path, &str) -> Result<File, ParseError>;

struct Project {
    _dir: TempDir,
    root: PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        Self { _dir: dir, root }
    }

    fn write(&self, name: &str, source: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        path
    }

    fn compiler(&self) -> IncrementalCompiler<Parser> {
        IncrementalCompiler::new(&self.root, parse_lines as Parser).unwrap()
    }
}

/// Wait long enough for the next write to get a newer modification time
fn tick() {
    sleep(Duration::from_millis(20));
}

fn returns(unit_main: &sola_engine::Function, value: i64) -> bool {
    unit_main.chunk.constants.iter().any(|c| match c {
        Value::Function(f) => f.chunk.constants.contains(&Value::Int(value)),
        _ => false,
    })
}

#[test]
fn test_edit_dependency_recompiles_importer() {
    let project = Project::new();
    let a = project.write("a.sola", "use b;\nvar x = answer();\n");
    let b = project.write("b.sola", "function answer() = 42;\n");
    let mut compiler = project.compiler();

    let unit = compiler.compile(&a).unwrap();
    assert!(unit.source_file.ends_with("a.sola"));
    let stats = compiler.stats();
    assert_eq!(stats.cache_misses, 2);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.last_order, vec![b.clone(), a.clone()]);

    tick();
    project.write("b.sola", "function answer() = 43;\n");
    compiler.compile(&a).unwrap();
    let stats = compiler.stats();
    assert_eq!(stats.cache_misses, 4);
    assert_eq!(stats.cache_hits, 0);
    assert_eq!(stats.files_compiled, 4);
    assert_eq!(stats.last_order, vec![b.clone(), a.clone()]);

    compiler.compile(&a).unwrap();
    let stats = compiler.stats();
    assert_eq!(stats.cache_hits, 2);
    assert!(stats.last_order.is_empty());
    assert_eq!(stats.cache.entries, 2);
}

#[test]
fn test_cache_shared_across_compilers() {
    let project = Project::new();
    let a = project.write("a.sola", "use b;\nvar x = answer();\n");
    project.write("b.sola", "function answer() = 42;\n");

    project.compiler().compile(&a).unwrap();
    let mut second = project.compiler();
    second.compile(&a).unwrap();
    assert_eq!(second.stats().cache_hits, 2);
    assert_eq!(second.stats().files_compiled, 0);
    assert!(project.root.join(".sola-cache").join("index.json").exists());
}

#[test]
fn test_compile_changed_rebuilds_importers() {
    let project = Project::new();
    let a = project.write("a.sola", "use b;\nvar x = answer();\n");
    let b = project.write("b.sola", "function answer() = 1;\n");
    let c = project.write("c.sola", "var unrelated = 3;\n");
    let mut compiler = project.compiler();
    compiler.compile(&a).unwrap();
    compiler.compile(&c).unwrap();

    assert!(compiler.compile_changed().unwrap().is_empty());

    tick();
    project.write("b.sola", "function answer() = 2;\n");
    let units = compiler.compile_changed().unwrap();
    let mut rebuilt: Vec<&PathBuf> = units.keys().collect();
    rebuilt.sort();
    assert_eq!(rebuilt, vec![&a, &b]);
    assert!(returns(&units[&b].main_function, 2));
    assert_eq!(compiler.stats().last_order, vec![b, a]);
}

#[test]
fn test_watched_file_picked_up() {
    let project = Project::new();
    let w = project.write("w.sola", "var x = 1;\n");
    let mut compiler = project.compiler();
    compiler.watch_file(Path::new("w.sola")).unwrap();
    assert_eq!(compiler.watched_files(), vec![w.clone()]);

    tick();
    project.write("w.sola", "var x = 2;\n");
    let units = compiler.compile_changed().unwrap();
    assert!(units[&w].main_function.chunk.constants.contains(&Value::Int(2)));
}

#[test]
fn test_import_cycle_compiles() {
    let project = Project::new();
    let a = project.write("a.sola", "use b;\nfunction fa() = 1;\n");
    let b = project.write("b.sola", "use a;\nfunction fb() = 2;\n");
    let mut compiler = project.compiler();

    compiler.compile(&a).unwrap();
    assert_eq!(compiler.stats().last_order, vec![a.clone(), b.clone()]);
    assert_eq!(compiler.graph().imports(&a), &[b.clone()]);
    assert_eq!(compiler.graph().importers(&a), vec![b]);
}

#[test]
fn test_library_import_resolved() {
    let project = Project::new();
    let main = project.write("src/main.sola", "use util;\nvar x = helper();\n");
    let util = project.write("lib/util.sola", "function helper() = 5;\n");
    let mut compiler = project.compiler();

    compiler.compile(&main).unwrap();
    assert_eq!(compiler.graph().imports(&main), &[util.clone()]);
    assert_eq!(compiler.stats().last_order, vec![util, main]);
}

#[test]
fn test_failing_file_not_cached() {
    let project = Project::new();
    let bad = project.write("bad.sola", "var s: string = 1;\n");
    let mut compiler = project.compiler();

    match compiler.compile(&bad) {
        Err(IncrementalError::Compile { path, diagnostics }) => {
            assert_eq!(path, bad);
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].message, "cannot assign int to variable of type string");
        }
        other => panic!("expected a compile error, got {:?}", other.map(|_| ())),
    }
    assert!(!compiler.cache().contains(&bad));
}

#[test]
fn test_parse_error_reported() {
    let project = Project::new();
    let broken = project.write("broken.sola", "var x = 1\n");
    let mut compiler = project.compiler();

    let err = compiler.compile(&broken).unwrap_err();
    assert!(matches!(err, IncrementalError::Parse { ref path, .. } if *path == broken));
    assert!(err.to_string().contains("expected `;`"));
}

#[test]
fn test_missing_file_is_read_error() {
    let project = Project::new();
    let mut compiler = project.compiler();
    let err = compiler.compile(Path::new("nowhere.sola")).unwrap_err();
    assert!(matches!(err, IncrementalError::Read { .. }));
}

#[test]
fn test_clear_cache() {
    let project = Project::new();
    let a = project.write("a.sola", "var x = 1;\n");
    let mut compiler = project.compiler();
    compiler.compile(&a).unwrap();
    compiler.clear_cache().unwrap();
    assert_eq!(compiler.stats().cache.entries, 0);

    compiler.compile(&a).unwrap();
    assert_eq!(compiler.stats().cache_misses, 2);
}

#[test]
fn test_cache_disabled_by_config() {
    let project = Project::new();
    project.write("sola.toml", "[cache]\nenabled = false\n");
    let a = project.write("a.sola", "var x = 1;\n");
    let mut compiler = project.compiler();

    compiler.compile(&a).unwrap();
    compiler.compile(&a).unwrap();
    assert_eq!(compiler.stats().cache_hits, 0);
    assert_eq!(compiler.stats().files_compiled, 2);
    assert!(!project.root.join(".sola-cache").exists());
}
