/// Centralized platform-specific path computation and lexical path helpers
///
/// Provides consistent path handling across Windows, macOS, and Linux following
/// XDG Base Directory specification on Unix-like systems.
use std::path::{Component, Path, PathBuf};

const APP_DIR_NAME: &str = "goto-usage";

/// Platform-agnostic path utilities
pub struct PlatformPaths;

impl PlatformPaths {
    /// Get the appropriate cache directory for the current platform
    ///
    /// - Windows: %LOCALAPPDATA%
    /// - macOS: ~/Library/Caches
    /// - Linux/Unix: $XDG_CACHE_HOME or ~/.cache
    pub fn cache_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("LOCALAPPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir()
                .map(|home| home.join("Library/Caches"))
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            std::env::var("XDG_CACHE_HOME")
                .map(PathBuf::from)
                .ok()
                .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Get the appropriate config directory for the current platform
    ///
    /// - Windows: %APPDATA%
    /// - macOS: ~/Library/Application Support
    /// - Linux/Unix: $XDG_CONFIG_HOME or ~/.config
    pub fn config_dir() -> PathBuf {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir()
                .map(|home| home.join("Library/Application Support"))
                .unwrap_or_else(|| PathBuf::from("."))
        } else {
            std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .ok()
                .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Returns: {cache_dir}/goto-usage
    pub fn project_cache_dir() -> PathBuf {
        Self::cache_dir().join(APP_DIR_NAME)
    }

    /// Returns: {config_dir}/goto-usage
    pub fn project_config_dir() -> PathBuf {
        Self::config_dir().join(APP_DIR_NAME)
    }

    /// Directory holding persisted dependency graphs
    ///
    /// Returns: {cache_dir}/goto-usage/graphs
    pub fn default_graph_cache_dir() -> PathBuf {
        Self::project_cache_dir().join("graphs")
    }

    /// Get default config file path
    ///
    /// Returns: {config_dir}/goto-usage/config.toml
    pub fn default_config_path() -> PathBuf {
        Self::project_config_dir().join("config.toml")
    }
}

/// Lexically normalize a path: make it absolute against the current directory,
/// fold `.` and `..` components. Symlinks are not resolved and the path does not
/// need to exist.
pub fn normalize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `pop` refuses to remove the root, so `/..` stays `/`
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Path rendered with `/` separators, the form excluded-folder substrings are
/// matched against.
pub fn to_match_string(path: &Path) -> String {
    let s = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        s.into_owned()
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

/// Display form of a file: relative to the first folder containing it,
/// otherwise the full path.
pub fn display_path(path: &Path, folders: &[PathBuf]) -> String {
    folders
        .iter()
        .find_map(|folder| path.strip_prefix(folder).ok())
        .filter(|rel| !rel.as_os_str().is_empty())
        .map(to_match_string)
        .unwrap_or_else(|| to_match_string(path))
}

/// True when the final component starts with a dot.
pub fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_cache_dir_not_empty() {
        let dir = PlatformPaths::cache_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_config_dir_not_empty() {
        let dir = PlatformPaths::config_dir();
        assert!(!dir.as_os_str().is_empty());
    }

    #[test]
    fn test_default_paths_contain_app_name() {
        for path in [
            PlatformPaths::default_graph_cache_dir(),
            PlatformPaths::default_config_path(),
        ] {
            assert!(
                path.to_string_lossy().contains("goto-usage"),
                "Path {:?} should contain 'goto-usage'",
                path
            );
        }
        assert!(PlatformPaths::default_graph_cache_dir().ends_with("graphs"));
        assert!(PlatformPaths::default_config_path().ends_with("config.toml"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_cache_dir_with_xdg_cache_home() {
        let original = env::var("XDG_CACHE_HOME").ok();
        unsafe {
            env::set_var("XDG_CACHE_HOME", "/custom/cache");
        }

        let dir = PlatformPaths::cache_dir();
        assert_eq!(dir, PathBuf::from("/custom/cache"));

        unsafe {
            match original {
                Some(val) => env::set_var("XDG_CACHE_HOME", val),
                None => env::remove_var("XDG_CACHE_HOME"),
            }
        }
    }

    #[test]
    fn test_normalize_folds_dots() {
        let path = normalize(Path::new("/proj/src/./lib/../util.js"));
        assert_eq!(path, PathBuf::from("/proj/src/util.js"));
    }

    #[test]
    fn test_normalize_parent_of_root() {
        assert_eq!(normalize(Path::new("/../a.js")), PathBuf::from("/a.js"));
    }

    #[test]
    fn test_normalize_relative_becomes_absolute() {
        let path = normalize(Path::new("some/file.js"));
        assert!(path.is_absolute());
        assert!(path.ends_with("some/file.js"));
    }

    #[test]
    fn test_display_path_strips_folder() {
        let folders = vec![PathBuf::from("/proj")];
        assert_eq!(
            display_path(Path::new("/proj/src/a.js"), &folders),
            "src/a.js"
        );
        assert_eq!(
            display_path(Path::new("/other/b.js"), &folders),
            "/other/b.js"
        );
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(Path::new("/proj/.cache")));
        assert!(!is_hidden(Path::new("/proj/src")));
    }
}
