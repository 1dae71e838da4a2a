//! Core library client for goto-usage
//!
//! `GotoUsageClient` is the surface hosts talk to: editor plugins, the MCP
//! server and the CLI all go through it. Host events (command invocations,
//! file saves, project closes) map onto explicit method calls, so the core
//! carries no assumptions about any editor's event loop.

mod build_lock;
mod fs_lock;

pub use fs_lock::FsLockGuard;

use crate::cache::{GraphCache, GraphCacheEntry, GraphSource};
use crate::config::{Config, ProjectConfig};
use crate::error::{GotoUsageError, GraphError, SearchError, ValidationError};
use crate::paths;
use crate::project::{Project, ProjectId};
use crate::search::{SymbolLocator, UsageSearchEngine};
use crate::types::*;
use anyhow::{Context, Result};
use build_lock::{BuildLockResult, BuildOps, SharedBuildResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

fn invalid_request(reason: String) -> anyhow::Error {
    GotoUsageError::from(ValidationError::InvalidRequest(reason)).into()
}

fn unknown_project(project: &ProjectRef) -> anyhow::Error {
    GotoUsageError::from(ValidationError::UnknownProject(format!("{:?}", project))).into()
}

/// Commands a host exposes to its users
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", content = "args")]
pub enum HostCommand {
    /// Find usages of the symbol at or above the cursor
    #[serde(rename = "GotoUsage")]
    GotoUsage(GotoUsageRequest),
    /// Rebuild the active project's dependency graph from scratch
    #[serde(rename = "GotoUsage.RebuildDependencyGraph")]
    RebuildDependencyGraph(RebuildRequest),
    /// Drop every cached dependency graph
    #[serde(rename = "GotoUsage.ClearDependencyGraphs")]
    ClearDependencyGraphs,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::GotoUsage(_) => "GotoUsage",
            HostCommand::RebuildDependencyGraph(_) => "GotoUsage.RebuildDependencyGraph",
            HostCommand::ClearDependencyGraphs => "GotoUsage.ClearDependencyGraphs",
        }
    }
}

/// What a host command produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Usages(UsageResponse),
    Rebuilt(RebuildResponse),
    Cleared(ClearResponse),
}

/// Main client for usage searches and dependency graph upkeep
///
/// Cloning is cheap; clones share the graph cache and the in-flight build
/// registry.
///
/// # Example
///
/// ```no_run
/// use goto_usage::{GotoUsageClient, FindUsagesRequest, ProjectRef};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = GotoUsageClient::new()?;
///
///     let response = client
///         .find_usages(FindUsagesRequest {
///             project: ProjectRef::new(None, vec!["/path/to/shop".to_string()]),
///             symbol: "Cart".to_string(),
///             defining_file: "/path/to/shop/cart.js".to_string(),
///         })
///         .await?;
///
///     for usage in response.results {
///         println!("{}:{}: {}", usage.display_path, usage.line, usage.line_text);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct GotoUsageClient {
    pub(crate) config: Arc<Config>,
    pub(crate) cache: Arc<GraphCache>,
    // In-progress rebuilds, so concurrent requests share one build
    pub(crate) build_ops: BuildOps,
    pub(crate) lock_dir: PathBuf,
}

impl GotoUsageClient {
    /// Create a client from the default configuration file and environment
    pub fn new() -> Result<Self> {
        let config = Config::new().context("Failed to load configuration")?;
        Self::with_config(config)
    }

    /// Create a client with a custom configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        tracing::info!("Initializing goto-usage client");
        tracing::debug!(
            "Graph cache: persist={}, directory={:?}, max_age={}h",
            config.cache.persist,
            config.cache.directory,
            config.cache.max_age_hours
        );

        let cache = Arc::new(GraphCache::from_config(&config.cache));
        let lock_dir = config.cache.directory.join("locks");

        Ok(Self {
            config: Arc::new(config),
            cache,
            build_ops: Arc::new(RwLock::new(HashMap::new())),
            lock_dir,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<GraphCache> {
        &self.cache
    }

    /// Settings for `project`: global defaults overlaid by its overrides
    pub fn project_config(&self, project: &ProjectId) -> ProjectConfig {
        self.config.project_config(project)
    }

    /// Dispatch a host command
    pub async fn run_command(&self, command: HostCommand) -> Result<CommandOutput> {
        tracing::debug!("Running command {}", command.name());
        match command {
            HostCommand::GotoUsage(request) => {
                self.goto_usage(request).await.map(CommandOutput::Usages)
            }
            HostCommand::RebuildDependencyGraph(request) => self
                .rebuild_dependency_graph(request)
                .await
                .map(CommandOutput::Rebuilt),
            HostCommand::ClearDependencyGraphs => self
                .clear_dependency_graphs()
                .await
                .map(CommandOutput::Cleared),
        }
    }

    /// Find usages of the class, function or variable at (or above) the cursor
    pub async fn goto_usage(&self, request: GotoUsageRequest) -> Result<UsageResponse> {
        request.validate().map_err(invalid_request)?;
        let project = request.project.to_project().map_err(invalid_request)?;

        let file = paths::normalize(Path::new(&request.file_path));
        let content = tokio::fs::read_to_string(&file).await.map_err(|e| {
            GotoUsageError::from(SearchError::FileReadFailed {
                file: request.file_path.clone(),
                reason: e.to_string(),
            })
        })?;

        // The line after a trailing newline is a valid cursor position
        let total = content.lines().count();
        if request.line > total + 1 {
            return Err(GotoUsageError::from(SearchError::LineOutOfRange {
                line: request.line,
                total,
            })
            .into());
        }

        let Some(symbol) = SymbolLocator::new().find_at(&content, request.line) else {
            tracing::info!(
                "No symbol found at {}:{}",
                request.file_path,
                request.line
            );
            return Ok(UsageResponse::no_symbol(
                &project.id,
                &request.file_path,
                request.line,
            ));
        };

        tracing::info!("Finding usages of {:?} defined in {:?}", symbol, file);
        self.search(project, symbol, file).await
    }

    /// Find usages of a named symbol defined in a given file
    pub async fn find_usages(&self, request: FindUsagesRequest) -> Result<UsageResponse> {
        request.validate().map_err(invalid_request)?;
        let project = request.project.to_project().map_err(invalid_request)?;
        let defining_file = paths::normalize(Path::new(&request.defining_file));
        self.search(project, request.symbol.trim().to_string(), defining_file)
            .await
    }

    async fn search(
        &self,
        project: Project,
        symbol: String,
        defining_file: PathBuf,
    ) -> Result<UsageResponse> {
        let config = self.project_config(&project.id);

        let graph = if config.disable_dep_graph {
            None
        } else {
            match self.graph_for(&project, &config).await {
                Ok(found) => Some(found),
                Err(e) => {
                    tracing::warn!(
                        "Dependency graph unavailable for {}, scanning every file: {:#}",
                        project.id,
                        e
                    );
                    None
                }
            }
        };

        let project_name = project.id.to_string();
        let graph_source = graph.as_ref().map(|(_, source)| *source);
        let search = tokio::task::spawn_blocking(move || {
            let engine = UsageSearchEngine::new(&config, &project.folders);
            engine.find_usages(
                &symbol,
                &defining_file,
                graph.as_ref().map(|(entry, _)| &entry.graph),
            )
        })
        .await
        .context("Usage search task panicked")??;

        let message = search
            .results
            .is_empty()
            .then(|| format!("No usages of {} found", search.symbol));

        Ok(UsageResponse {
            project: project_name,
            symbol: Some(search.symbol),
            mode: Some(search.mode),
            graph_source,
            results: search.results,
            files_scanned: search.files_scanned,
            files_skipped: search.files_skipped,
            duration_ms: search.duration_ms,
            message,
        })
    }

    /// Cached graph of `project`, building it first when there is none.
    ///
    /// The first build goes through the same build locks as
    /// `rebuild_dependency_graph`, so concurrent searches in this process share
    /// it and other processes wait for it and load the persisted copy.
    async fn graph_for(
        &self,
        project: &Project,
        config: &ProjectConfig,
    ) -> Result<(Arc<GraphCacheEntry>, GraphSource)> {
        let key = project.id.cache_key();
        loop {
            if let Some(entry) = self.cache.get(&project.id)? {
                return Ok((entry, GraphSource::Memory));
            }

            match build_lock::try_acquire(&self.build_ops, &self.lock_dir, &key).await? {
                BuildLockResult::Acquired(guard) => {
                    let result = self.load_or_build(project, config).await;
                    let shared: SharedBuildResult = match &result {
                        Ok(_) => Ok(None),
                        Err(e) => Err(format!("{:#}", e)),
                    };
                    guard.broadcast_result(&shared).await;
                    guard.release().await;
                    return result;
                }
                BuildLockResult::WaitForResult(mut receiver) => match receiver.recv().await {
                    Ok(Ok(_)) => continue,
                    Ok(Err(e)) => return Err(anyhow::anyhow!(e)),
                    Err(e) => {
                        return Err(anyhow::anyhow!(
                            "Dependency graph build failed or was cancelled: {}",
                            e
                        ));
                    }
                },
                BuildLockResult::WaitForFilesystemLock(key) => {
                    tracing::info!(
                        "Another process is building {}, waiting for it to finish",
                        project.id
                    );
                    let _lock = self.wait_for_filesystem_lock(key).await?;
                    return self.load_or_build(project, config).await;
                }
            }
        }
    }

    async fn load_or_build(
        &self,
        project: &Project,
        config: &ProjectConfig,
    ) -> Result<(Arc<GraphCacheEntry>, GraphSource)> {
        let cache = self.cache.clone();
        let project = project.clone();
        let config = config.clone();
        self.run_with_timeout(move |cancel| cache.get_or_build(&project, &config, &cancel))
            .await
    }

    /// Block until the other process holding `key` releases it
    async fn wait_for_filesystem_lock(&self, key: String) -> Result<FsLockGuard> {
        let lock_dir = self.lock_dir.clone();
        let timeout = Duration::from_secs(self.config.build.timeout_secs);
        let lock = tokio::task::spawn_blocking(move || {
            FsLockGuard::acquire_blocking(&lock_dir, &key, timeout)
        })
        .await
        .context("Filesystem lock task panicked")??;

        lock.ok_or_else(|| {
            GotoUsageError::from(GraphError::TimedOut(self.config.build.timeout_secs)).into()
        })
    }

    /// Run a blocking graph operation, cancelling it once the build timeout
    /// passes
    async fn run_with_timeout<T, F>(&self, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(CancellationToken) -> Result<T, GotoUsageError> + Send + 'static,
    {
        let secs = self.config.build.timeout_secs;
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::task::spawn_blocking(move || operation(task_cancel));

        match tokio::time::timeout(Duration::from_secs(secs), handle).await {
            Ok(joined) => Ok(joined.context("Graph task panicked")??),
            Err(_) => {
                cancel.cancel();
                tracing::warn!("Graph build exceeded {}s, cancelling", secs);
                Err(GotoUsageError::from(GraphError::TimedOut(secs)).into())
            }
        }
    }

    /// Rebuild a project's dependency graph from scratch, replacing any cached
    /// copy. Concurrent requests for the same project share one build.
    pub async fn rebuild_dependency_graph(&self, request: RebuildRequest) -> Result<RebuildResponse> {
        request.validate().map_err(invalid_request)?;
        let project = request.project.to_project().map_err(invalid_request)?;
        let key = project.id.cache_key();

        loop {
            match build_lock::try_acquire(&self.build_ops, &self.lock_dir, &key).await? {
                BuildLockResult::Acquired(guard) => {
                    let result = self.do_rebuild(project).await;
                    let shared: SharedBuildResult = match &result {
                        Ok(response) => Ok(Some(response.clone())),
                        Err(e) => Err(format!("{:#}", e)),
                    };
                    guard.broadcast_result(&shared).await;
                    guard.release().await;
                    return result;
                }
                BuildLockResult::WaitForResult(mut receiver) => match receiver.recv().await {
                    Ok(Ok(Some(response))) => {
                        tracing::info!("Received result from existing build of {}", project.id);
                        return Ok(response);
                    }
                    // A search's first build finished; a rebuild still has to run
                    Ok(Ok(None)) => continue,
                    Ok(Err(e)) => return Err(anyhow::anyhow!(e)),
                    Err(e) => {
                        return Err(anyhow::anyhow!(
                            "Dependency graph build failed or was cancelled: {}",
                            e
                        ));
                    }
                },
                BuildLockResult::WaitForFilesystemLock(key) => {
                    tracing::info!(
                        "Another process is building {}, waiting for it to finish",
                        project.id
                    );
                    let _lock = self.wait_for_filesystem_lock(key).await?;
                    return self.do_rebuild(project).await;
                }
            }
        }
    }

    async fn do_rebuild(&self, project: Project) -> Result<RebuildResponse> {
        let config = self.project_config(&project.id);
        let cache = self.cache.clone();
        let (entry, report) = self
            .run_with_timeout(move |cancel| cache.rebuild(&project, &config, &cancel))
            .await?;

        Ok(RebuildResponse {
            project: entry.project.to_string(),
            files_indexed: report.files_indexed,
            files_skipped: report.files_skipped,
            dependencies: report.dependencies,
            unresolved_imports: report.unresolved_imports,
            duration_ms: report.duration_ms,
        })
    }

    /// Drop every cached graph, in memory and on disk
    pub async fn clear_dependency_graphs(&self) -> Result<ClearResponse> {
        let cache = self.cache.clone();
        let cleared = tokio::task::spawn_blocking(move || cache.clear_all())
            .await
            .context("Cache clear task panicked")??;
        Ok(ClearResponse { cleared })
    }

    /// Drop one project's graph; hosts call this when a project closes
    pub async fn invalidate_dependency_graph(
        &self,
        request: InvalidateRequest,
    ) -> Result<InvalidateResponse> {
        request.validate().map_err(invalid_request)?;
        let id = request
            .project
            .id()
            .ok_or_else(|| unknown_project(&request.project))?;

        let cache = self.cache.clone();
        let target = id.clone();
        let invalidated = tokio::task::spawn_blocking(move || cache.invalidate(&target))
            .await
            .context("Cache invalidate task panicked")??;

        Ok(InvalidateResponse {
            project: id.to_string(),
            invalidated,
        })
    }

    /// Keep the cached graph current after a file was saved or deleted
    ///
    /// A graph that is persisted but not loaded yet is loaded first, so saves
    /// made right after startup are not lost.
    pub async fn file_saved(&self, request: FileSavedRequest) -> Result<FileSavedResponse> {
        request.validate().map_err(invalid_request)?;
        let id = request
            .project
            .id()
            .ok_or_else(|| unknown_project(&request.project))?;
        let file = paths::normalize(Path::new(&request.file_path));

        let project = request.project.to_project().ok();
        let cache = self.cache.clone();
        let target = id.clone();
        let saved = file.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            if cache.get(&target)?.is_none()
                && let Some(project) = &project
            {
                cache.load_persisted(project, &CancellationToken::new())?;
            }
            cache.on_file_saved(&target, &saved)
        })
        .await
        .context("File save task panicked")??;

        Ok(FileSavedResponse {
            project: id.to_string(),
            file_path: paths::to_match_string(&file),
            outcome,
        })
    }

    /// Direct and transitive neighbours of a file in its project's graph
    ///
    /// The graph is built first when the request names project folders and no
    /// graph is cached yet.
    pub async fn file_dependencies(
        &self,
        request: FileDependenciesRequest,
    ) -> Result<FileDependenciesResponse> {
        request.validate().map_err(invalid_request)?;
        let id = request
            .project
            .id()
            .ok_or_else(|| unknown_project(&request.project))?;

        let entry = match self.cache.get(&id)? {
            Some(entry) => entry,
            None => {
                let project = request.project.to_project().map_err(|_| {
                    GotoUsageError::from(GraphError::ProjectNotCached(id.to_string()))
                })?;
                let config = self.project_config(&id);
                self.graph_for(&project, &config).await?.0
            }
        };

        let file = paths::normalize(Path::new(&request.file_path));
        let graph = &entry.graph;
        let render = |set: BTreeSet<PathBuf>| -> Vec<String> {
            set.iter().map(|p| paths::to_match_string(p)).collect()
        };

        Ok(FileDependenciesResponse {
            project: id.to_string(),
            file_path: paths::to_match_string(&file),
            in_graph: graph.contains_file(&file),
            imports: graph
                .node(&file)
                .map(|node| node.imports.clone())
                .unwrap_or_default(),
            dependencies: render(graph.dependencies(&file)),
            dependents: render(graph.dependents(&file)),
            transitive_dependencies: render(graph.forward_reachable(&file)),
            transitive_dependents: render(graph.reverse_reachable(&file)),
        })
    }

    /// Statistics about the graphs currently held in memory
    pub async fn graph_statistics(&self, request: StatisticsRequest) -> Result<StatisticsResponse> {
        let graphs = self
            .cache
            .entries()?
            .into_iter()
            .filter(|entry| {
                request
                    .project
                    .as_deref()
                    .is_none_or(|name| entry.project.as_str() == name)
            })
            .map(|entry| {
                let stats = entry.graph.stats();
                GraphStatistics {
                    project: entry.project.to_string(),
                    folders: entry
                        .folders
                        .iter()
                        .map(|f| paths::to_match_string(f))
                        .collect(),
                    files: stats.files,
                    dependencies: stats.dependencies,
                    dep_graph_disabled: self.project_config(&entry.project).disable_dep_graph,
                    built_at: entry.built_at.to_rfc3339(),
                    updated_at: entry.updated_at.to_rfc3339(),
                }
            })
            .collect();

        let persisted_graphs = match self.cache.store() {
            Some(store) => store.count().map_err(GotoUsageError::from)?,
            None => 0,
        };

        Ok(StatisticsResponse {
            graphs,
            cache_directory: self
                .cache
                .store()
                .map(|store| store.dir().display().to_string()),
            persisted_graphs,
        })
    }
}
