//! Process-wide registry of dependency graphs, one per project.
//!
//! Entries are created on demand (first graph-mode search or explicit rebuild),
//! updated on file saves, and dropped only by `invalidate` or `clear_all`.
//! There is no automatic eviction.
//!
//! Each project has its own slot, kept for the life of the cache. Builds,
//! incremental updates, invalidation and clearing all hold the slot's writer
//! lock, so they are serialized per project: a clear waits for an in-flight
//! build instead of racing its publish and persist. The current entry is
//! published as an `Arc` snapshot. A save updates it under the entry's write
//! lock, so readers wait for the single-file update and never observe it half
//! applied; the graph is only copied when a reader still holds the previous
//! snapshot.
//!
//! Config changes are not detected. A graph keeps the settings it was built
//! with until it is rebuilt or invalidated.

pub mod store;

pub use store::GraphStore;

use crate::config::{CacheConfig, ProjectConfig};
use crate::error::{CacheError, GotoUsageError};
use crate::graph::{BuildReport, DependencyGraph, DependencyGraphBuilder, FileUpdate};
use crate::paths;
use crate::project::{Project, ProjectId};
use chrono::{DateTime, Duration, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// A cached graph plus everything needed to keep it current
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphCacheEntry {
    pub project: ProjectId,
    pub folders: Vec<PathBuf>,
    /// Settings the graph was built with
    pub config: ProjectConfig,
    pub graph: DependencyGraph,
    pub built_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphCacheEntry {
    /// True when `path` lies inside one of the project folders
    pub fn contains(&self, path: &Path) -> bool {
        self.folders.iter().any(|folder| path.starts_with(folder))
    }
}

/// Where `get_or_build` found its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GraphSource {
    Memory,
    Disk,
    Built,
}

/// Result of a file-save notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileSavedOutcome {
    /// No graph for the project is loaded; nothing to update
    NotCached,
    /// The file lies outside every project folder
    OutsideProject,
    /// Extension or excluded-folder rules leave the file out
    Ineligible,
    Updated {
        dependencies_changed: bool,
    },
    /// The file no longer exists and was dropped from the graph
    Removed,
    /// The file could not be read; its previous edges were kept
    Unreadable,
}

#[derive(Default)]
struct ProjectSlot {
    writer: Mutex<()>,
    entry: RwLock<Option<Arc<GraphCacheEntry>>>,
}

impl ProjectSlot {
    fn current(&self) -> Result<Option<Arc<GraphCacheEntry>>, CacheError> {
        self.entry
            .read()
            .map(|entry| entry.clone())
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))
    }

    fn publish(&self, entry: Arc<GraphCacheEntry>) -> Result<(), CacheError> {
        let mut slot = self
            .entry
            .write()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;
        *slot = Some(entry);
        Ok(())
    }

    /// Drop the published entry; the caller holds the writer lock
    fn take(&self) -> Result<Option<Arc<GraphCacheEntry>>, CacheError> {
        self.entry
            .write()
            .map(|mut entry| entry.take())
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))
    }
}

pub struct GraphCache {
    slots: RwLock<HashMap<ProjectId, Arc<ProjectSlot>>>,
    store: Option<GraphStore>,
    max_age: Duration,
}

impl Default for GraphCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphCache {
    /// In-memory cache without persistence
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            store: None,
            max_age: Duration::hours(24),
        }
    }

    /// Cache backed by `store`; persisted graphs older than `max_age_hours`
    /// are rebuilt instead of loaded
    pub fn with_store(store: GraphStore, max_age_hours: u64) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            store: Some(store),
            max_age: Duration::hours(max_age_hours.min(i64::MAX as u64 / 3600) as i64),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        if config.persist {
            Self::with_store(GraphStore::new(&config.directory), config.max_age_hours)
        } else {
            Self::new()
        }
    }

    pub fn store(&self) -> Option<&GraphStore> {
        self.store.as_ref()
    }

    fn slot(&self, project: &ProjectId) -> Result<Arc<ProjectSlot>, CacheError> {
        if let Some(slot) = self.existing_slot(project)? {
            return Ok(slot);
        }
        let mut slots = self
            .slots
            .write()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;
        Ok(slots.entry(project.clone()).or_default().clone())
    }

    fn existing_slot(&self, project: &ProjectId) -> Result<Option<Arc<ProjectSlot>>, CacheError> {
        let slots = self
            .slots
            .read()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;
        Ok(slots.get(project).cloned())
    }

    /// Current in-memory graph of `project`, if any
    pub fn get(&self, project: &ProjectId) -> Result<Option<Arc<GraphCacheEntry>>, GotoUsageError> {
        match self.existing_slot(project)? {
            Some(slot) => Ok(slot.current()?),
            None => Ok(None),
        }
    }

    /// Every graph currently held in memory
    pub fn entries(&self) -> Result<Vec<Arc<GraphCacheEntry>>, GotoUsageError> {
        let slots: Vec<Arc<ProjectSlot>> = self
            .slots
            .read()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?
            .values()
            .cloned()
            .collect();

        let mut entries = Vec::new();
        for slot in slots {
            if let Some(entry) = slot.current()? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.project.cmp(&b.project));
        Ok(entries)
    }

    /// Return the graph of `project`, building it once if needed.
    ///
    /// Memory is consulted first, then a persisted copy younger than the
    /// configured maximum age, and only then is a full build started.
    pub fn get_or_build(
        &self,
        project: &Project,
        config: &ProjectConfig,
        cancel: &CancellationToken,
    ) -> Result<(Arc<GraphCacheEntry>, GraphSource), GotoUsageError> {
        let slot = self.slot(&project.id)?;
        if let Some(entry) = slot.current()? {
            return Ok((entry, GraphSource::Memory));
        }

        let _writer = slot
            .writer
            .lock()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;

        // Another caller may have finished a build while we waited
        if let Some(entry) = slot.current()? {
            return Ok((entry, GraphSource::Memory));
        }

        if let Some(entry) = self.load_from_store(project, cancel)? {
            let entry = Arc::new(entry);
            slot.publish(entry.clone())?;
            return Ok((entry, GraphSource::Disk));
        }

        let (entry, _) = self.build_entry(project, config, cancel)?;
        let entry = Arc::new(entry);
        slot.publish(entry.clone())?;
        self.persist(&entry);
        Ok((entry, GraphSource::Built))
    }

    /// Full rebuild replacing any cached entry
    pub fn rebuild(
        &self,
        project: &Project,
        config: &ProjectConfig,
        cancel: &CancellationToken,
    ) -> Result<(Arc<GraphCacheEntry>, BuildReport), GotoUsageError> {
        let slot = self.slot(&project.id)?;
        let _writer = slot
            .writer
            .lock()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;

        let (entry, report) = self.build_entry(project, config, cancel)?;
        let entry = Arc::new(entry);
        slot.publish(entry.clone())?;
        self.persist(&entry);
        Ok((entry, report))
    }

    /// Load a persisted graph into memory unless one is already loaded.
    ///
    /// Returns `None` when nothing usable is persisted.
    pub fn load_persisted(
        &self,
        project: &Project,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<GraphCacheEntry>>, GotoUsageError> {
        let slot = self.slot(&project.id)?;
        let _writer = slot
            .writer
            .lock()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;

        if let Some(entry) = slot.current()? {
            return Ok(Some(entry));
        }

        match self.load_from_store(project, cancel)? {
            Some(entry) => {
                let entry = Arc::new(entry);
                slot.publish(entry.clone())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Re-extract `file` in the cached graph of `project`.
    ///
    /// A no-op unless the project is loaded and the file is inside it and
    /// eligible under the settings the graph was built with.
    pub fn on_file_saved(
        &self,
        project: &ProjectId,
        file: &Path,
    ) -> Result<FileSavedOutcome, GotoUsageError> {
        let Some(slot) = self.existing_slot(project)? else {
            return Ok(FileSavedOutcome::NotCached);
        };
        let _writer = slot
            .writer
            .lock()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;

        let Some(current) = slot.current()? else {
            return Ok(FileSavedOutcome::NotCached);
        };

        let path = paths::normalize(file);
        if !current.contains(&path) {
            return Ok(FileSavedOutcome::OutsideProject);
        }
        if !current.config.is_eligible(&path) {
            return Ok(FileSavedOutcome::Ineligible);
        }

        drop(current);
        let (update, next) = {
            let mut published = slot
                .entry
                .write()
                .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;
            let Some(current) = published.take() else {
                return Ok(FileSavedOutcome::NotCached);
            };
            let mut entry = Arc::unwrap_or_clone(current);
            let update = DependencyGraphBuilder::new(&entry.config).rebuild(&mut entry.graph, &path);
            if matches!(update, FileUpdate::Updated { .. } | FileUpdate::Removed) {
                entry.updated_at = Utc::now();
            }
            let next = Arc::new(entry);
            *published = Some(next.clone());
            (update, next)
        };

        let outcome = match update {
            FileUpdate::Updated {
                dependencies_changed,
            } => FileSavedOutcome::Updated {
                dependencies_changed,
            },
            FileUpdate::Removed => FileSavedOutcome::Removed,
            FileUpdate::Unreadable => return Ok(FileSavedOutcome::Unreadable),
            FileUpdate::Ineligible => return Ok(FileSavedOutcome::Ineligible),
        };

        let changed = matches!(
            outcome,
            FileSavedOutcome::Removed
                | FileSavedOutcome::Updated {
                    dependencies_changed: true
                }
        );
        if changed {
            self.persist(&next);
        }

        tracing::debug!("File saved in {}: {:?} -> {:?}", project, path, outcome);
        Ok(outcome)
    }

    /// Drop the entry of `project`, including its persisted copy.
    ///
    /// Waits for a build or update in flight for the project, so nothing it
    /// publishes or persists survives the call. Returns true when anything
    /// was dropped.
    pub fn invalidate(&self, project: &ProjectId) -> Result<bool, GotoUsageError> {
        let dropped = match self.existing_slot(project)? {
            Some(slot) => {
                let _writer = slot
                    .writer
                    .lock()
                    .map_err(|e| CacheError::LockPoisoned(e.to_string()))?;
                let had_memory = slot.take()?.is_some();
                // Removed while the writer is held so a finishing build cannot rewrite it
                self.remove_persisted(project)? || had_memory
            }
            None => self.remove_persisted(project)?,
        };

        tracing::info!("Invalidated dependency graph for {}", project);
        Ok(dropped)
    }

    /// Drop every entry and every persisted copy.
    ///
    /// Waits for builds and updates in flight, as `invalidate` does. Returns
    /// the number of in-memory graphs dropped.
    pub fn clear_all(&self) -> Result<usize, GotoUsageError> {
        let mut slots: Vec<(ProjectId, Arc<ProjectSlot>)> = self
            .slots
            .read()
            .map_err(|e| CacheError::LockPoisoned(e.to_string()))?
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();
        // Fixed order, so two concurrent clears cannot deadlock
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let mut writers = Vec::with_capacity(slots.len());
        for (_, slot) in &slots {
            writers.push(
                slot.writer
                    .lock()
                    .map_err(|e| CacheError::LockPoisoned(e.to_string()))?,
            );
        }

        let mut cleared = 0;
        for (_, slot) in &slots {
            if slot.take()?.is_some() {
                cleared += 1;
            }
        }

        if let Some(store) = &self.store {
            let removed = store.clear()?;
            tracing::debug!("Removed {} persisted graphs", removed);
        }
        drop(writers);

        tracing::info!("Cleared {} dependency graphs", cleared);
        Ok(cleared)
    }

    fn remove_persisted(&self, project: &ProjectId) -> Result<bool, GotoUsageError> {
        match &self.store {
            Some(store) => Ok(store.remove(project)?),
            None => Ok(false),
        }
    }

    fn build_entry(
        &self,
        project: &Project,
        config: &ProjectConfig,
        cancel: &CancellationToken,
    ) -> Result<(GraphCacheEntry, BuildReport), GotoUsageError> {
        let builder = DependencyGraphBuilder::new(config).with_cancellation(cancel.clone());
        let (graph, report) = builder.build_project(&project.folders)?;
        let now = Utc::now();
        let entry = GraphCacheEntry {
            project: project.id.clone(),
            folders: project.folders.clone(),
            config: config.clone(),
            graph,
            built_at: now,
            updated_at: now,
        };
        Ok((entry, report))
    }

    /// Persisted copy of `project`, refreshed against the current files.
    ///
    /// Unusable or expired copies count as missing.
    fn load_from_store(
        &self,
        project: &Project,
        cancel: &CancellationToken,
    ) -> Result<Option<GraphCacheEntry>, GotoUsageError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };

        let mut entry = match store.load(&project.id) {
            Ok(Some(entry)) => entry,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!("Ignoring persisted graph for {}: {}", project.id, e);
                return Ok(None);
            }
        };

        let age = Utc::now() - entry.built_at;
        if age > self.max_age {
            tracing::info!(
                "Persisted graph for {} is {}h old, rebuilding",
                project.id,
                age.num_hours()
            );
            return Ok(None);
        }

        entry.folders = project.folders.clone();
        let builder = DependencyGraphBuilder::new(&entry.config).with_cancellation(cancel.clone());
        let files = builder.collect_files(&entry.folders)?;
        let report = builder.refresh(&mut entry.graph, &files)?;

        if report.files_indexed > 0 || report.files_removed > 0 {
            entry.updated_at = Utc::now();
            self.persist(&entry);
        }
        Ok(Some(entry))
    }

    /// Best effort; a failed write only costs a rebuild later
    fn persist(&self, entry: &GraphCacheEntry) {
        if let Some(store) = &self.store
            && let Err(e) = store.save(entry)
        {
            tracing::warn!("Failed to persist graph for {}: {}", entry.project, e);
        }
    }
}
