//! On-disk copies of cached graphs, one JSON document per project.

use super::GraphCacheEntry;
use crate::error::CacheError;
use crate::project::ProjectId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Bumped whenever the document shape changes; older documents are rebuilt
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    #[serde(flatten)]
    entry: &'a GraphCacheEntry,
}

#[derive(Deserialize)]
struct Document {
    #[allow(dead_code)]
    version: u32,
    #[serde(flatten)]
    entry: GraphCacheEntry,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u32,
}

#[derive(Debug, Clone)]
pub struct GraphStore {
    dir: PathBuf,
}

impl GraphStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, project: &ProjectId) -> PathBuf {
        self.dir.join(format!("{}.json", project.cache_key()))
    }

    /// Load the persisted graph of `project`; `Ok(None)` when there is none
    pub fn load(&self, project: &ProjectId) -> Result<Option<GraphCacheEntry>, CacheError> {
        let path = self.path_for(project);
        if !path.exists() {
            tracing::debug!("No persisted graph for project {}", project);
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| CacheError::LoadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let probe: VersionProbe =
            serde_json::from_str(&content).map_err(|e| CacheError::ParseFailed(e.to_string()))?;
        if probe.version != FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                found: probe.version,
                expected: FORMAT_VERSION,
            });
        }

        let document: Document =
            serde_json::from_str(&content).map_err(|e| CacheError::ParseFailed(e.to_string()))?;

        tracing::info!(
            "Loaded persisted graph for {} ({} files) from {:?}",
            project,
            document.entry.graph.file_count(),
            path
        );
        Ok(Some(document.entry))
    }

    /// Write atomically: temp file first, then rename over the old copy
    pub fn save(&self, entry: &GraphCacheEntry) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| CacheError::DirectoryCreationFailed(format!("{:?}: {}", self.dir, e)))?;

        let path = self.path_for(&entry.project);
        let save_failed = |reason: String| CacheError::SaveFailed {
            path: path.display().to_string(),
            reason,
        };

        let content = serde_json::to_string(&DocumentRef {
            version: FORMAT_VERSION,
            entry,
        })
        .map_err(|e| save_failed(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| save_failed(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| save_failed(e.to_string()))?;

        tracing::debug!("Saved graph for {} to {:?}", entry.project, path);
        Ok(())
    }

    /// Returns true when a persisted copy existed
    pub fn remove(&self, project: &ProjectId) -> Result<bool, CacheError> {
        let path = self.path_for(project);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::SaveFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Number of persisted graph documents
    pub fn count(&self) -> Result<usize, CacheError> {
        match fs::read_dir(&self.dir) {
            Ok(entries) => Ok(entries
                .flatten()
                .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
                .count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(CacheError::LoadFailed {
                path: self.dir.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Delete every persisted graph. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CacheError::LoadFailed {
                    path: self.dir.display().to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
                }
            }
        }
        Ok(removed)
    }
}
