//! Import path resolution
//!
//! A `use Path;` directive names a file without its extension. Resolution
//! probes, in order:
//! 1. `<dir of importing file>/<Path>.sola`
//! 2. `<work_dir>/<Path>.sola`
//! 3. `<work_dir>/lib/<Path>.sola`
//!
//! The first existing file wins. Namespace separators (`\`) in the path
//! map to directory separators.

use std::path::{Path, PathBuf};

/// Source file extension
pub const SOURCE_EXTENSION: &str = "sola";

/// Library directory under the work directory
pub const LIB_DIR: &str = "lib";

/// Resolves `use` paths to source files
#[derive(Debug, Clone)]
pub struct ImportResolver {
    work_dir: PathBuf,
}

impl ImportResolver {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Paths probed for `import` from `from_file`, in order
    pub fn candidates(&self, import: &str, from_file: &Path) -> Vec<PathBuf> {
        let relative = relative_path(import);
        let mut candidates = Vec::with_capacity(3);
        if let Some(dir) = from_file.parent() {
            candidates.push(dir.join(&relative));
        }
        candidates.push(self.work_dir.join(&relative));
        candidates.push(self.work_dir.join(LIB_DIR).join(&relative));
        candidates
    }

    /// The file `import` refers to, or `None` when no candidate exists
    pub fn resolve(&self, import: &str, from_file: &Path) -> Option<PathBuf> {
        let found = self
            .candidates(import, from_file)
            .into_iter()
            .find(|candidate| candidate.is_file());
        match found {
            Some(path) => Some(path.canonicalize().unwrap_or(path)),
            None => {
                log::debug!("unresolved import {} in {}", import, from_file.display());
                None
            }
        }
    }
}

/// `Lib\Strings` becomes `Lib/Strings.sola`
fn relative_path(import: &str) -> PathBuf {
    let mut path: PathBuf = import
        .trim_start_matches('\\')
        .split(['\\', '/'])
        .filter(|part| !part.is_empty())
        .collect();
    if path.extension().map_or(true, |ext| ext != SOURCE_EXTENSION) {
        let mut name = path.into_os_string();
        name.push(".");
        name.push(SOURCE_EXTENSION);
        path = PathBuf::from(name);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("util"), PathBuf::from("util.sola"));
        assert_eq!(relative_path("Lib\\Strings"), PathBuf::from("Lib/Strings.sola"));
        assert_eq!(relative_path("\\app\\main"), PathBuf::from("app/main.sola"));
        assert_eq!(relative_path("b.sola"), PathBuf::from("b.sola"));
    }

    #[test]
    fn test_probe_order() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let from = root.join("src").join("main.sola");
        touch(&from);
        let resolver = ImportResolver::new(&root);

        assert_eq!(
            resolver.candidates("util", &from),
            vec![
                root.join("src").join("util.sola"),
                root.join("util.sola"),
                root.join("lib").join("util.sola"),
            ]
        );

        assert_eq!(resolver.resolve("util", &from), None);

        touch(&root.join("lib").join("util.sola"));
        assert_eq!(resolver.resolve("util", &from), Some(root.join("lib").join("util.sola")));

        touch(&root.join("util.sola"));
        assert_eq!(resolver.resolve("util", &from), Some(root.join("util.sola")));

        touch(&root.join("src").join("util.sola"));
        assert_eq!(resolver.resolve("util", &from), Some(root.join("src").join("util.sola")));
    }
}
