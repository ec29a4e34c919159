//! Runtime configuration.

use std::env;
use std::ffi::OsStr;
use std::path::PathBuf;

/// Environment variable holding extra script search paths.
pub const PATH_ENV_VAR: &str = "DYNWRAP_PATH";

/// Settings consulted by the runtime and its default script loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Directories searched, in order, when a script path is not found as-is.
    pub search_paths: Vec<PathBuf>,
    /// Extension tried when a script path has none, without the leading dot.
    pub script_extension: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            script_extension: "toml".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with search paths taken from `DYNWRAP_PATH`.
    ///
    /// The variable uses the platform's path list separator.
    pub fn from_env() -> Self {
        match env::var_os(PATH_ENV_VAR) {
            Some(paths) => Self::from_paths(&paths),
            None => Self::default(),
        }
    }

    /// Default configuration with search paths split from a platform path
    /// list. Empty entries are skipped.
    pub fn from_paths(paths: &OsStr) -> Self {
        Self {
            search_paths: env::split_paths(paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    pub fn with_script_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.script_extension = extension.trim_start_matches('.').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::default();
        assert!(config.search_paths.is_empty());
        assert_eq!(config.script_extension, "toml");
    }

    #[test]
    fn builder_methods() {
        let config = RuntimeConfig::new()
            .with_search_path("/a")
            .with_search_path("/b")
            .with_script_extension(".cfg");

        assert_eq!(
            config.search_paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
        assert_eq!(config.script_extension, "cfg");
    }

    #[test]
    fn path_lists_are_split_in_order() {
        let joined = env::join_paths(["/scripts", "relative/dir", "/more"]).unwrap();
        let config = RuntimeConfig::from_paths(&joined);

        assert_eq!(
            config.search_paths,
            vec![
                PathBuf::from("/scripts"),
                PathBuf::from("relative/dir"),
                PathBuf::from("/more"),
            ]
        );
        assert_eq!(config.script_extension, "toml");
    }

    #[test]
    fn empty_path_entries_are_skipped() {
        let joined = env::join_paths(["", "/a", "", "/b", ""]).unwrap();
        let config = RuntimeConfig::from_paths(&joined);
        assert_eq!(
            config.search_paths,
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );

        assert!(RuntimeConfig::from_paths(OsStr::new("")).search_paths.is_empty());
    }

    #[test]
    fn from_env_matches_the_variable() {
        let expected = match env::var_os(PATH_ENV_VAR) {
            Some(paths) => RuntimeConfig::from_paths(&paths),
            None => RuntimeConfig::default(),
        };
        assert_eq!(RuntimeConfig::from_env(), expected);
    }
}
