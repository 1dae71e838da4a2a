/// Configuration system for goto-usage
///
/// Supports loading from multiple sources with priority:
/// CLI args > Environment variables > Config file > Defaults
///
/// Project settings are layered: the `[defaults]` table holds the global values and
/// `[projects.<name>]` tables override individual fields for one project.
use crate::error::{ConfigError, GotoUsageError};
use crate::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

mod project;

pub use project::ProjectConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Global project settings
    #[serde(default)]
    pub defaults: ProjectSettings,

    /// Per-project overrides keyed by project identity
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectOverrides>,

    /// Graph cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Graph build configuration
    #[serde(default)]
    pub build: BuildConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings that describe how a project's files are discovered and resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Extensions of files that take part in the graph and in searches
    #[serde(default = "default_file_extensions")]
    pub file_extensions: Vec<String>,

    /// Substrings that exclude any path containing them
    #[serde(default = "default_excluded_folders")]
    pub excluded_folders: Vec<String>,

    /// Search every eligible file instead of walking the dependency graph
    #[serde(default)]
    pub disable_dep_graph: bool,

    /// Absolute search roots for non-relative import specifiers, tried in order
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Import prefix aliases mapped to absolute paths
    #[serde(default)]
    pub aliases: BTreeMap<String, PathBuf>,
}

/// Project-scoped overrides; a `None` field keeps the global value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extensions: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_folders: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_dep_graph: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<Vec<PathBuf>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aliases: Option<BTreeMap<String, PathBuf>>,
}

/// Graph cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory where dependency graphs are persisted
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,

    /// Persist graphs to disk so later processes can reuse them
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Persisted graphs older than this are rebuilt instead of loaded
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: u64,
}

/// Graph build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// A full build running longer than this is cancelled
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log per-file decisions at debug level
    #[serde(default)]
    pub verbose: bool,
}

// Default value functions
fn default_file_extensions() -> Vec<String> {
    vec![".js".to_string(), ".coffee".to_string(), ".jsx".to_string()]
}

fn default_excluded_folders() -> Vec<String> {
    vec![
        "node_modules/".to_string(),
        "dist/".to_string(),
        "build/".to_string(),
        "tmp/".to_string(),
        ".tmp/".to_string(),
    ]
}

fn default_cache_directory() -> PathBuf {
    crate::paths::PlatformPaths::default_graph_cache_dir()
}

fn default_persist() -> bool {
    true
}

fn default_max_age_hours() -> u64 {
    24
}

fn default_build_timeout() -> u64 {
    60
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            file_extensions: default_file_extensions(),
            excluded_folders: default_excluded_folders(),
            disable_dep_graph: false,
            roots: Vec::new(),
            aliases: BTreeMap::new(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: default_cache_directory(),
            persist: default_persist(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_build_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> Result<Self, GotoUsageError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()).into());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseFailed(format!("Invalid TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default location or create default
    pub fn load_or_default() -> Result<Self, GotoUsageError> {
        let config_path = crate::paths::PlatformPaths::default_config_path();

        if config_path.exists() {
            tracing::info!("Loading config from: {}", config_path.display());
            Self::from_file(&config_path)
        } else {
            tracing::info!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), GotoUsageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::SaveFailed(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::SaveFailed(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Merge the global defaults with the overrides registered for `project`.
    ///
    /// Fields the project does not override keep their global values.
    pub fn project_config(&self, project: &ProjectId) -> ProjectConfig {
        let base = ProjectConfig::from_settings(&self.defaults);
        match self.projects.get(project.as_str()) {
            Some(overrides) => base.with_overrides(overrides),
            None => base,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), GotoUsageError> {
        validate_settings(
            "defaults",
            Some(&self.defaults.file_extensions),
            Some(&self.defaults.excluded_folders),
            Some(&self.defaults.roots),
            Some(&self.defaults.aliases),
        )?;

        for (name, overrides) in &self.projects {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "projects".to_string(),
                    reason: "project name cannot be empty".to_string(),
                }
                .into());
            }
            validate_settings(
                &format!("projects.{}", name),
                overrides.file_extensions.as_ref(),
                overrides.excluded_folders.as_ref(),
                overrides.roots.as_ref(),
                overrides.aliases.as_ref(),
            )?;
        }

        if self.cache.max_age_hours == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.max_age_hours".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        if self.build.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "build.timeout_secs".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("GOTO_USAGE_DISABLE_DEP_GRAPH")
            && let Some(flag) = parse_bool(&value)
        {
            self.defaults.disable_dep_graph = flag;
        }

        if let Ok(dir) = std::env::var("GOTO_USAGE_CACHE_DIR") {
            self.cache.directory = PathBuf::from(dir);
        }

        if let Ok(value) = std::env::var("GOTO_USAGE_PERSIST_CACHE")
            && let Some(flag) = parse_bool(&value)
        {
            self.cache.persist = flag;
        }

        if let Ok(timeout) = std::env::var("GOTO_USAGE_BUILD_TIMEOUT")
            && let Ok(secs) = timeout.parse()
        {
            self.build.timeout_secs = secs;
        }

        if let Ok(value) = std::env::var("GOTO_USAGE_VERBOSE")
            && let Some(flag) = parse_bool(&value)
        {
            self.logging.verbose = flag;
        }
    }

    /// Load from `path` (or the default location), apply environment overrides and validate
    pub fn load(path: Option<&Path>) -> Result<Self, GotoUsageError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::load_or_default()?,
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Create a new Config with defaults and environment overrides
    pub fn new() -> Result<Self, GotoUsageError> {
        Self::load(None)
    }
}

fn validate_settings(
    section: &str,
    file_extensions: Option<&Vec<String>>,
    excluded_folders: Option<&Vec<String>>,
    roots: Option<&Vec<PathBuf>>,
    aliases: Option<&BTreeMap<String, PathBuf>>,
) -> Result<(), GotoUsageError> {
    let invalid = |field: &str, reason: String| -> GotoUsageError {
        ConfigError::InvalidValue {
            key: format!("{}.{}", section, field),
            reason,
        }
        .into()
    };

    if let Some(extensions) = file_extensions
        && extensions.iter().any(|ext| ext.trim_start_matches('.').is_empty())
    {
        return Err(invalid(
            "file_extensions",
            "extensions cannot be empty".to_string(),
        ));
    }

    // An empty substring would exclude every path
    if let Some(excluded) = excluded_folders
        && excluded.iter().any(|folder| folder.is_empty())
    {
        return Err(invalid(
            "excluded_folders",
            "entries cannot be empty".to_string(),
        ));
    }

    if let Some(roots) = roots
        && let Some(root) = roots.iter().find(|root| !root.is_absolute())
    {
        return Err(invalid(
            "roots",
            format!("must be absolute, got '{}'", root.display()),
        ));
    }

    if let Some(aliases) = aliases {
        for (alias, target) in aliases {
            if alias.is_empty() {
                return Err(invalid("aliases", "alias names cannot be empty".to_string()));
            }
            if !target.is_absolute() {
                return Err(invalid(
                    "aliases",
                    format!(
                        "alias '{}' must map to an absolute path, got '{}'",
                        alias,
                        target.display()
                    ),
                ));
            }
        }
    }

    Ok(())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
