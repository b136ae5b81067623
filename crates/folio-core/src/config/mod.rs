use std::path::PathBuf;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{FolioError, Result};

mod env;

const ENV_ROOT: &str = "FOLIO_ROOT";
const ENV_HOST: &str = "FOLIO_HOST";
const ENV_PORT: &str = "FOLIO_PORT";
const ENV_ROOT_FILES: &str = "FOLIO_ROOT_FILES";
const ENV_UPLOAD_LIMIT_BYTES: &str = "FOLIO_UPLOAD_LIMIT_BYTES";
const ENV_INDEX_MAX_FILE_BYTES: &str = "FOLIO_INDEX_MAX_FILE_BYTES";
const ENV_IGNORE: &str = "FOLIO_IGNORE";
const ENV_SEARCH_LIMIT: &str = "FOLIO_SEARCH_LIMIT";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8642;
pub const DEFAULT_ROOT_FILES: [&str; 3] = ["index.md", "README.md", "readme.md"];
const DEFAULT_UPLOAD_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_INDEX_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
const DEFAULT_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioConfig {
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Tried in order when a directory route has no explicit file.
    pub root_files: Vec<String>,
    pub upload_limit_bytes: u64,
    pub index_max_file_bytes: u64,
    /// Globs over root-relative paths that are never indexed.
    pub ignore_globs: Vec<String>,
    pub search_limit: usize,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            root_files: DEFAULT_ROOT_FILES.iter().map(ToString::to_string).collect(),
            upload_limit_bytes: DEFAULT_UPLOAD_LIMIT_BYTES,
            index_max_file_bytes: DEFAULT_INDEX_MAX_FILE_BYTES,
            ignore_globs: Vec::new(),
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl FolioConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            root: env::read_non_empty_env(ENV_ROOT).map_or(defaults.root, PathBuf::from),
            host: env::read_non_empty_env(ENV_HOST).unwrap_or(defaults.host),
            port: env::read_env_u16(ENV_PORT).unwrap_or(defaults.port),
            root_files: env::read_env_list(ENV_ROOT_FILES)
                .filter(|files| !files.is_empty())
                .unwrap_or(defaults.root_files),
            upload_limit_bytes: env::read_env_u64(
                ENV_UPLOAD_LIMIT_BYTES,
                defaults.upload_limit_bytes,
                1,
            ),
            index_max_file_bytes: env::read_env_u64(
                ENV_INDEX_MAX_FILE_BYTES,
                defaults.index_max_file_bytes,
                1,
            ),
            ignore_globs: env::read_env_list(ENV_IGNORE).unwrap_or_default(),
            search_limit: env::read_env_usize(ENV_SEARCH_LIMIT, defaults.search_limit, 1),
        }
    }

    /// Root files must be single plain file names.
    pub fn validate(&self) -> Result<()> {
        if self.root_files.is_empty() {
            return Err(FolioError::Validation(
                "at least one root file name is required".to_string(),
            ));
        }
        for name in &self.root_files {
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(FolioError::Validation(format!(
                    "root file must be a plain file name: {name}"
                )));
            }
        }
        self.ignore_set().map(|_| ())
    }

    pub fn ignore_set(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.ignore_globs {
            builder.add(Glob::new(pattern).map_err(|e| FolioError::Validation(e.to_string()))?);
        }
        builder
            .build()
            .map_err(|e| FolioError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_list_root_files_in_fallback_order() {
        let config = FolioConfig::default();
        assert_eq!(config.root_files, vec!["index.md", "README.md", "readme.md"]);
        assert_eq!(config.port, DEFAULT_PORT);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn validate_rejects_nested_root_files() {
        let config = FolioConfig {
            root_files: vec!["docs/index.md".to_string()],
            ..FolioConfig::default()
        };
        assert!(matches!(
            config.validate().expect_err("must fail"),
            FolioError::Validation(_)
        ));
        let empty = FolioConfig {
            root_files: Vec::new(),
            ..FolioConfig::default()
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn ignore_set_matches_relative_paths() {
        let config = FolioConfig {
            ignore_globs: vec!["target/**".to_string(), "*.lock".to_string()],
            ..FolioConfig::default()
        };
        let set = config.ignore_set().expect("globs");
        assert!(set.is_match("target/debug/out.rs"));
        assert!(set.is_match("Cargo.lock"));
        assert!(!set.is_match("src/main.rs"));
    }

    #[test]
    fn invalid_glob_is_a_validation_error() {
        let config = FolioConfig {
            ignore_globs: vec!["[".to_string()],
            ..FolioConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
