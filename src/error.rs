/// Centralized error types for goto-usage using thiserror
///
/// Unresolvable imports and unreadable files are expected steady-state input and
/// never surface here; they are counted in build reports instead.
use thiserror::Error;

/// Main error type for the usage finder
#[derive(Error, Debug)]
pub enum GotoUsageError {
    #[error("Dependency graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Errors related to building or updating a dependency graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Failed to walk directory: {0}")]
    WalkFailed(String),

    #[error("Project '{0}' has no cached dependency graph")]
    ProjectNotCached(String),

    #[error("Dependency graph build timed out after {0} seconds")]
    TimedOut(u64),

    #[error("Dependency graph build was cancelled")]
    Cancelled,
}

/// Errors related to usage searches
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Symbol name cannot be empty")]
    EmptySymbol,

    #[error("Line {line} is out of range ({total} lines)")]
    LineOutOfRange { line: usize, total: usize },

    #[error("Failed to read file '{file}': {reason}")]
    FileReadFailed { file: String, reason: String },
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {0}")]
    LoadFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    #[error("Invalid configuration value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
}

/// Errors related to input validation
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A request failed its own `validate()` check
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Cannot determine project identity: {0}")]
    UnknownProject(String),
}

/// Errors related to the graph cache and its persisted copies
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to load cache from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("Failed to save cache to '{path}': {reason}")]
    SaveFailed { path: String, reason: String },

    #[error("Failed to parse cache file: {0}")]
    ParseFailed(String),

    #[error("Unsupported cache format version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Failed to create cache directory: {0}")]
    DirectoryCreationFailed(String),

    #[error("Cache lock was poisoned: {0}")]
    LockPoisoned(String),
}

// Conversion from anyhow::Error to GotoUsageError
impl From<anyhow::Error> for GotoUsageError {
    fn from(err: anyhow::Error) -> Self {
        GotoUsageError::Other(format!("{:#}", err))
    }
}

impl GotoUsageError {
    /// Check if this is a user error (validation, bad input) vs system error
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            GotoUsageError::Validation(_)
                | GotoUsageError::Config(ConfigError::InvalidValue { .. })
                | GotoUsageError::Search(SearchError::EmptySymbol)
                | GotoUsageError::Search(SearchError::LineOutOfRange { .. })
        )
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GotoUsageError::Graph(GraphError::TimedOut(_))
                | GotoUsageError::Graph(GraphError::Cancelled)
                | GotoUsageError::Cache(CacheError::LockPoisoned(_))
                | GotoUsageError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GotoUsageError::Validation(ValidationError::InvalidRequest(
            "line must be 1-based".to_string(),
        ));
        assert_eq!(err.to_string(), "Validation error: line must be 1-based");
        assert!(err.is_user_error());
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GotoUsageError = io_err.into();
        assert!(matches!(err, GotoUsageError::Io(_)));
    }

    #[test]
    fn test_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("test error");
        let err: GotoUsageError = anyhow_err.into();
        assert!(matches!(err, GotoUsageError::Other(_)));
        assert_eq!(err.to_string(), "test error");
    }

    #[test]
    fn test_is_user_error() {
        let user_err = GotoUsageError::Search(SearchError::EmptySymbol);
        assert!(user_err.is_user_error());

        let system_err =
            GotoUsageError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "test"));
        assert!(!system_err.is_user_error());
    }

    #[test]
    fn test_is_retryable() {
        assert!(GotoUsageError::Graph(GraphError::TimedOut(60)).is_retryable());
        assert!(
            !GotoUsageError::Validation(ValidationError::UnknownProject("x".to_string()))
                .is_retryable()
        );
    }

    #[test]
    fn test_graph_error_timed_out() {
        assert_eq!(
            GraphError::TimedOut(60).to_string(),
            "Dependency graph build timed out after 60 seconds"
        );
    }

    #[test]
    fn test_search_error_line_out_of_range() {
        let err = SearchError::LineOutOfRange { line: 40, total: 12 };
        assert_eq!(err.to_string(), "Line 40 is out of range (12 lines)");
    }


    #[test]
    fn test_cache_error_version_mismatch() {
        let err = CacheError::VersionMismatch {
            found: 0,
            expected: 1,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported cache format version 0 (expected 1)"
        );
    }

    #[test]
    fn test_config_error_invalid_value() {
        let err = ConfigError::InvalidValue {
            key: "defaults.roots".to_string(),
            reason: "must be absolute".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration value for 'defaults.roots': must be absolute"
        );
    }

    #[test]
    fn test_error_chain() {
        let err: GotoUsageError = GraphError::Cancelled.into();
        assert!(matches!(err, GotoUsageError::Graph(_)));
        assert_eq!(
            err.to_string(),
            "Dependency graph error: Dependency graph build was cancelled"
        );
    }
}
