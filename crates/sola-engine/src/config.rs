//! Compiler and cache configuration
//!
//! Options come from an optional `sola.toml` in the work directory:
//!
//! ```toml
//! [compiler]
//! licm = false
//! bounds_check_elision = true
//!
//! [compiler.warnings]
//! disabled = ["style-hint"]
//! deny = ["unreachable-code"]
//!
//! [cache]
//! max_entries = 500
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::parser::checker::WarningConfig;

/// Name of the configuration file looked up in the work directory
pub const CONFIG_FILE: &str = "sola.toml";

/// Errors loading `sola.toml`
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Optimiser switches and warning policy for one compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    pub constant_folding: bool,
    pub cse: bool,
    pub licm: bool,
    pub inlining: bool,
    pub tail_calls: bool,
    /// Use unchecked array reads in recognised counting loops
    pub bounds_check_elision: bool,
    pub warnings: WarningConfig,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            constant_folding: true,
            cse: true,
            licm: true,
            inlining: true,
            tail_calls: true,
            bounds_check_elision: false,
            warnings: WarningConfig::default(),
        }
    }
}

impl CompilerOptions {
    /// Every optimisation off; used to compare against optimised output
    pub fn unoptimized() -> Self {
        Self {
            constant_folding: false,
            cse: false,
            licm: false,
            inlining: false,
            tail_calls: false,
            bounds_check_elision: false,
            warnings: WarningConfig::default(),
        }
    }
}

/// Build cache limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
    /// Bytes
    pub max_size: u64,
    /// Directory under the work directory
    pub dir_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1000,
            max_size: 100 * 1024 * 1024,
            dir_name: ".sola-cache".to_string(),
        }
    }
}

/// Contents of `sola.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolaConfig {
    pub compiler: CompilerOptions,
    pub cache: CacheConfig,
}

impl SolaConfig {
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `sola.toml` from `work_dir`; a missing file yields the defaults
    pub fn load(work_dir: &Path) -> Result<Self, ConfigError> {
        let path = work_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        log::debug!("loaded {}", path.display());
        Self::from_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::checker::WarningCode;

    #[test]
    fn test_defaults() {
        let config = SolaConfig::default();
        assert!(config.compiler.licm);
        assert!(!config.compiler.bounds_check_elision);
        assert_eq!(config.cache.max_entries, 1000);
        assert_eq!(config.cache.max_size, 100 * 1024 * 1024);
        assert_eq!(config.cache.dir_name, ".sola-cache");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = SolaConfig::from_str(
            r#"
            [compiler]
            licm = false

            [compiler.warnings]
            disabled = ["style-hint"]

            [cache]
            max_entries = 5
            "#,
        )
        .unwrap();
        assert!(!config.compiler.licm);
        assert!(config.compiler.cse);
        assert!(config.compiler.warnings.disabled.contains(&WarningCode::StyleHint));
        assert_eq!(config.cache.max_entries, 5);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::TempDir::new().unwrap();
        assert_eq!(SolaConfig::load(dir.path()).unwrap(), SolaConfig::default());

        std::fs::write(dir.path().join(CONFIG_FILE), "[compiler\nlicm = ").unwrap();
        assert!(matches!(
            SolaConfig::load(dir.path()),
            Err(ConfigError::ParseError(_))
        ));
    }
}
