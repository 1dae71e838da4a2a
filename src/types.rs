use crate::cache::{FileSavedOutcome, GraphSource};
use crate::project::{Project, ProjectId};
use crate::search::{SearchMode, SearchResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MAX_PROJECT_NAME_LEN: usize = 255;
const MAX_SYMBOL_LEN: usize = 1024;

/// Identifies the project a request is about
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProjectRef {
    /// Project name; project-scoped settings are looked up under it
    #[serde(default)]
    pub project: Option<String>,
    /// Host project file (e.g. "shop.sublime-project"); its file stem names the project
    #[serde(default)]
    pub project_file: Option<String>,
    /// Absolute project folders, walked for graph builds and naive searches
    #[serde(default)]
    pub folders: Vec<String>,
}

impl ProjectRef {
    pub fn new(project: Option<String>, folders: Vec<String>) -> Self {
        Self {
            project,
            project_file: None,
            folders,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.project {
            if name.trim().is_empty() {
                return Err("project name cannot be empty".to_string());
            }
            if name.len() > MAX_PROJECT_NAME_LEN {
                return Err(format!(
                    "project name too long ({} characters, max {})",
                    name.len(),
                    MAX_PROJECT_NAME_LEN
                ));
            }
        }
        for folder in &self.folders {
            validate_existing_path("folder", folder)?;
            if !Path::new(folder).is_dir() {
                return Err(format!("folder is not a directory: {}", folder));
            }
        }
        if self.id().is_none() {
            return Err("either project, project_file or folders must be given".to_string());
        }
        Ok(())
    }

    /// Name first, then the project file, then the first folder
    pub fn id(&self) -> Option<ProjectId> {
        if let Some(name) = &self.project
            && !name.trim().is_empty()
        {
            return Some(ProjectId::new(name.trim()));
        }
        if let Some(file) = &self.project_file
            && let Some(id) = ProjectId::from_project_file(Path::new(file))
        {
            return Some(id);
        }
        self.folders
            .first()
            .and_then(|folder| ProjectId::from_folder(Path::new(folder)))
    }

    /// The project, or an error when it has no folders to walk
    pub fn to_project(&self) -> Result<Project, String> {
        let id = self
            .id()
            .ok_or_else(|| "cannot determine project identity".to_string())?;
        if self.folders.is_empty() {
            return Err(format!("project '{}' has no folders", id));
        }
        Ok(Project::new(id, &self.folders))
    }
}

fn validate_absolute_path(field: &str, path: &str) -> Result<(), String> {
    if path.trim().is_empty() {
        return Err(format!("{} cannot be empty", field));
    }
    if !Path::new(path).is_absolute() {
        return Err(format!("{} must be an absolute path: {}", field, path));
    }
    Ok(())
}

fn validate_existing_path(field: &str, path: &str) -> Result<(), String> {
    validate_absolute_path(field, path)?;
    if !Path::new(path).exists() {
        return Err(format!("{} does not exist: {}", field, path));
    }
    Ok(())
}

/// Request to find the usages of the symbol at a cursor position
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GotoUsageRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
    /// Absolute path of the active file
    pub file_path: String,
    /// 1-based cursor line
    pub line: usize,
}

impl GotoUsageRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        validate_existing_path("file_path", &self.file_path)?;
        if self.line == 0 {
            return Err("line is 1-based and must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Request to find the usages of a named symbol
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FindUsagesRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
    /// Name of the class, function or variable
    pub symbol: String,
    /// Absolute path of the file that defines the symbol
    pub defining_file: String,
}

impl FindUsagesRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        if self.symbol.trim().is_empty() {
            return Err("symbol cannot be empty".to_string());
        }
        if self.symbol.len() > MAX_SYMBOL_LEN {
            return Err(format!(
                "symbol too long ({} characters, max {})",
                self.symbol.len(),
                MAX_SYMBOL_LEN
            ));
        }
        validate_existing_path("defining_file", &self.defining_file)
    }
}

/// Request to rebuild a project's dependency graph from scratch
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RebuildRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
}

impl RebuildRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        if self.project.folders.is_empty() {
            return Err("folders cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Notification that a file was saved (or deleted)
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileSavedRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
    /// Absolute path of the saved file; it may no longer exist
    pub file_path: String,
}

impl FileSavedRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        validate_absolute_path("file_path", &self.file_path)
    }
}

/// Request to drop a project's cached graph, e.g. when the project closes
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
}

impl InvalidateRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()
    }
}

/// Request to drop every cached graph
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClearRequest {}

/// Request for the graph neighbourhood of one file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileDependenciesRequest {
    #[serde(flatten)]
    pub project: ProjectRef,
    /// Absolute path of the file
    pub file_path: String,
}

impl FileDependenciesRequest {
    pub fn validate(&self) -> Result<(), String> {
        self.project.validate()?;
        validate_absolute_path("file_path", &self.file_path)
    }
}

/// Request for statistics about cached graphs
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatisticsRequest {
    /// Only report this project; all loaded graphs when omitted
    #[serde(default)]
    pub project: Option<String>,
}

/// Usages of a symbol
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsageResponse {
    pub project: String,
    /// The searched symbol; absent when none was found at the cursor
    pub symbol: Option<String>,
    pub mode: Option<SearchMode>,
    /// Where the dependency graph came from (graph mode only)
    pub graph_source: Option<GraphSource>,
    pub results: Vec<SearchResult>,
    pub files_scanned: usize,
    /// Candidate files that could not be read
    pub files_skipped: usize,
    pub duration_ms: u64,
    /// Human readable note for empty outcomes
    #[serde(default)]
    pub message: Option<String>,
}

impl UsageResponse {
    /// Response for a cursor position with no recognizable definition
    pub fn no_symbol(project: &ProjectId, file_path: &str, line: usize) -> Self {
        Self {
            project: project.to_string(),
            symbol: None,
            mode: None,
            graph_source: None,
            results: Vec::new(),
            files_scanned: 0,
            files_skipped: 0,
            duration_ms: 0,
            message: Some(format!("No symbol found at {}:{}", file_path, line)),
        }
    }
}

/// Result of a full graph rebuild
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RebuildResponse {
    pub project: String,
    pub files_indexed: usize,
    /// Eligible files that could not be read
    pub files_skipped: usize,
    pub dependencies: usize,
    /// Import specifiers that resolved to no file
    pub unresolved_imports: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileSavedResponse {
    pub project: String,
    pub file_path: String,
    pub outcome: FileSavedOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InvalidateResponse {
    pub project: String,
    /// False when there was nothing cached
    pub invalidated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClearResponse {
    /// Number of in-memory graphs dropped
    pub cleared: usize,
}

/// Graph neighbourhood of one file
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileDependenciesResponse {
    pub project: String,
    pub file_path: String,
    /// False when the file is not part of the graph
    pub in_graph: bool,
    /// Raw import specifiers found in the file
    pub imports: Vec<String>,
    /// Files this file imports directly
    pub dependencies: Vec<String>,
    /// Files that import this file directly
    pub dependents: Vec<String>,
    /// Files this file imports, directly or not
    pub transitive_dependencies: Vec<String>,
    /// Files that import this file, directly or not
    pub transitive_dependents: Vec<String>,
}

/// Summary of one cached graph
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphStatistics {
    pub project: String,
    pub folders: Vec<String>,
    pub files: usize,
    pub dependencies: usize,
    pub dep_graph_disabled: bool,
    /// RFC 3339 timestamp of the last full build
    pub built_at: String,
    /// RFC 3339 timestamp of the last incremental update
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StatisticsResponse {
    pub graphs: Vec<GraphStatistics>,
    /// Directory persisted graphs are written to, if persistence is on
    pub cache_directory: Option<String>,
    /// Graph documents in the cache directory, loaded or not
    #[serde(default)]
    pub persisted_graphs: usize,
}

#[cfg(test)]
mod tests;
