//! Builds dependency graphs from project files.
//!
//! Files are filtered by extension and exclusion before anything is read.
//! Unreadable files are logged and skipped; they never abort a build.

use super::{DependencyGraph, FileNode};
use crate::config::ProjectConfig;
use crate::error::GraphError;
use crate::indexer::{FileWalker, ImportExtractor};
use crate::paths;
use crate::resolver::PathResolver;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Summary of a full build or refresh
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Files read and added to the graph
    pub files_indexed: usize,
    /// Eligible files that could not be read
    pub files_skipped: usize,
    /// Files dropped because they no longer exist (refresh only)
    pub files_removed: usize,
    /// Edges in the resulting graph
    pub dependencies: usize,
    /// Specifiers that resolved to nothing
    pub unresolved_imports: usize,
    pub duration_ms: u64,
}

/// Everything extracted from one file
#[derive(Debug, Clone)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub node: FileNode,
    pub targets: BTreeSet<PathBuf>,
    pub unresolved: usize,
}

/// Outcome of re-extracting a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum FileUpdate {
    Updated { dependencies_changed: bool },
    Removed,
    /// The file exists but could not be read; its previous edges are kept
    Unreadable,
    Ineligible,
}

pub struct DependencyGraphBuilder<'a> {
    config: &'a ProjectConfig,
    extractor: ImportExtractor,
    cancel: Option<CancellationToken>,
}

impl<'a> DependencyGraphBuilder<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self {
            config,
            extractor: ImportExtractor::new(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn check_cancelled(&self) -> Result<(), GraphError> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            Err(GraphError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Eligible files under the project folders
    pub fn collect_files(&self, folders: &[PathBuf]) -> Result<Vec<PathBuf>, GraphError> {
        let mut walker = FileWalker::new(folders, self.config);
        if let Some(cancel) = &self.cancel {
            walker = walker.with_cancellation(cancel.clone());
        }
        walker.walk().map_err(|e| {
            if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
                GraphError::Cancelled
            } else {
                GraphError::WalkFailed(format!("{:#}", e))
            }
        })
    }

    /// Walk `folders` and build a graph over everything found
    pub fn build_project(
        &self,
        folders: &[PathBuf],
    ) -> Result<(DependencyGraph, BuildReport), GraphError> {
        let files = self.collect_files(folders)?;
        self.build(&files)
    }

    /// Build a fresh graph over `files`. Ineligible entries are ignored.
    pub fn build(&self, files: &[PathBuf]) -> Result<(DependencyGraph, BuildReport), GraphError> {
        let start = Instant::now();

        let mut eligible: Vec<PathBuf> = files
            .iter()
            .map(|f| paths::normalize(f))
            .filter(|f| self.config.is_eligible(f))
            .collect();
        eligible.sort();
        eligible.dedup();

        tracing::info!("Building dependency graph over {} files", eligible.len());

        let analyses = self.analyze_all(&eligible)?;

        let mut graph = DependencyGraph::new();
        let mut report = BuildReport::default();
        for analysis in analyses {
            match analysis {
                Some(analysis) => {
                    report.files_indexed += 1;
                    report.unresolved_imports += analysis.unresolved;
                    Self::apply(&mut graph, analysis);
                }
                None => report.files_skipped += 1,
            }
        }

        report.dependencies = graph.dependency_count();
        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Dependency graph built: {} files, {} dependencies, {} skipped, {} unresolved imports in {}ms",
            report.files_indexed,
            report.dependencies,
            report.files_skipped,
            report.unresolved_imports,
            report.duration_ms
        );
        Ok((graph, report))
    }

    /// Bring a previously built graph up to date with `files`, the current
    /// listing of eligible files: vanished files are removed, new files and
    /// files whose modification time changed are re-extracted.
    pub fn refresh(
        &self,
        graph: &mut DependencyGraph,
        files: &[PathBuf],
    ) -> Result<BuildReport, GraphError> {
        let start = Instant::now();
        let current: BTreeSet<PathBuf> = files
            .iter()
            .map(|f| paths::normalize(f))
            .filter(|f| self.config.is_eligible(f))
            .collect();

        let vanished: Vec<PathBuf> = graph
            .files()
            .filter(|f| !current.contains(*f))
            .map(Path::to_path_buf)
            .collect();

        let stale: Vec<PathBuf> = current
            .iter()
            .filter(|f| match graph.node(f) {
                Some(node) => node.modified != modified_time(f),
                None => true,
            })
            .cloned()
            .collect();

        let mut report = BuildReport::default();
        for path in &vanished {
            graph.remove_file(path);
            report.files_removed += 1;
        }

        for analysis in self.analyze_all(&stale)? {
            match analysis {
                Some(analysis) => {
                    report.files_indexed += 1;
                    report.unresolved_imports += analysis.unresolved;
                    Self::apply(graph, analysis);
                }
                None => report.files_skipped += 1,
            }
        }

        report.dependencies = graph.dependency_count();
        report.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Refreshed dependency graph: {} re-extracted, {} removed, {} skipped",
            report.files_indexed,
            report.files_removed,
            report.files_skipped
        );
        Ok(report)
    }

    /// Re-extract one file's outgoing edges after it changed on disk.
    ///
    /// Inbound edges are keyed by other files' content and stay as they are.
    pub fn rebuild(&self, graph: &mut DependencyGraph, file: &Path) -> FileUpdate {
        let path = paths::normalize(file);
        if !self.config.is_eligible(&path) {
            return FileUpdate::Ineligible;
        }

        match self.analyze_file(&path) {
            Ok(analysis) => {
                graph.upsert_node(path.clone(), analysis.node);
                let changed = graph.set_dependencies(&path, analysis.targets);
                tracing::debug!("Re-extracted {:?} (dependencies changed: {})", path, changed);
                FileUpdate::Updated {
                    dependencies_changed: changed,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                graph.remove_file(&path);
                tracing::debug!("Removed vanished file {:?} from graph", path);
                FileUpdate::Removed
            }
            Err(e) => {
                tracing::warn!("Cannot re-read {:?}, keeping previous edges: {}", path, e);
                FileUpdate::Unreadable
            }
        }
    }

    /// Read one file, extract its specifiers and resolve them
    pub fn analyze_file(&self, path: &Path) -> std::io::Result<FileAnalysis> {
        // Taken before reading so a concurrent write shows up as stale later
        let modified = modified_time(path);
        let content = fs::read_to_string(path)?;

        let imports = self.extractor.extract(&content);
        let resolver = PathResolver::new(self.config);

        let mut targets = BTreeSet::new();
        let mut unresolved = 0;
        for specifier in &imports {
            let resolved = resolver.resolve(specifier, path);
            if resolved.is_empty() {
                unresolved += 1;
                tracing::debug!("Unresolved import {:?} in {:?}", specifier, path);
            }
            targets.extend(resolved);
        }
        targets.remove(path);

        Ok(FileAnalysis {
            path: path.to_path_buf(),
            node: FileNode { modified, imports },
            targets,
            unresolved,
        })
    }

    fn analyze_all(&self, files: &[PathBuf]) -> Result<Vec<Option<FileAnalysis>>, GraphError> {
        files
            .par_iter()
            .map(|path| {
                self.check_cancelled()?;
                match self.analyze_file(path) {
                    Ok(analysis) => Ok(Some(analysis)),
                    Err(e) => {
                        tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                        Ok(None)
                    }
                }
            })
            .collect()
    }

    fn apply(graph: &mut DependencyGraph, analysis: FileAnalysis) {
        let FileAnalysis {
            path, node, targets, ..
        } = analysis;
        graph.set_dependencies(&path, targets);
        graph.upsert_node(path, node);
    }
}

/// Modification time as recorded in file nodes
pub(crate) fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{FileTime, set_file_mtime};
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn config() -> ProjectConfig {
        ProjectConfig::default().with_excluded_folders(["node_modules/"])
    }

    fn project() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = paths::normalize(temp_dir.path());
        write(&root.join("a.js"), "import B from './b'\nB()\n");
        write(&root.join("b.js"), "const C = require('./c')\nmodule.exports = C\n");
        write(&root.join("c.js"), "export class C {}\n");
        write(&root.join("d.coffee"), "C = require './c'\nUnknown = require 'nowhere'\n");
        write(&root.join("node_modules/x.js"), "require('../a')\n");
        (temp_dir, root)
    }

    fn edge_set(graph: &DependencyGraph) -> Vec<(PathBuf, PathBuf)> {
        graph
            .edges()
            .map(|(a, b)| (a.to_path_buf(), b.to_path_buf()))
            .collect()
    }

    #[test]
    fn test_build_project() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);

        let (graph, report) = builder.build_project(&[root.clone()]).unwrap();

        assert_eq!(report.files_indexed, 4);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.dependencies, 3);
        assert_eq!(report.unresolved_imports, 1);
        assert!(!graph.contains_file(&root.join("node_modules/x.js")));

        assert_eq!(
            graph.reverse_reachable(&root.join("c.js")),
            [root.join("a.js"), root.join("b.js"), root.join("d.coffee")]
                .into_iter()
                .collect()
        );
        let node = graph.node(&root.join("d.coffee")).unwrap();
        assert_eq!(node.imports, vec!["./c", "nowhere"]);
        assert!(node.modified.is_some());
    }

    #[test]
    fn test_build_filters_before_reading() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);

        let files = vec![
            root.join("a.js"),
            root.join("node_modules/x.js"),
            root.join("notes.txt"),
        ];
        let (graph, report) = builder.build(&files).unwrap();
        assert_eq!(report.files_indexed, 1);
        assert_eq!(graph.file_count(), 1);
    }

    #[test]
    fn test_build_skips_unreadable_files() {
        let (_tmp, root) = project();
        fs::write(root.join("bad.js"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);

        let (graph, report) = builder.build_project(&[root.clone()]).unwrap();
        assert_eq!(report.files_indexed, 4);
        assert_eq!(report.files_skipped, 1);
        assert!(!graph.contains_file(&root.join("bad.js")));
    }

    #[test]
    fn test_rebuild_twice_is_idempotent() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);

        let (first, _) = builder.build_project(&[root.clone()]).unwrap();
        let (second, _) = builder.build_project(&[root.clone()]).unwrap();
        assert_eq!(edge_set(&first), edge_set(&second));
    }

    #[test]
    fn test_build_cancelled() {
        let (_tmp, root) = project();
        let config = config();
        let token = CancellationToken::new();
        token.cancel();
        let builder = DependencyGraphBuilder::new(&config).with_cancellation(token);

        let result = builder.build(&[root.join("a.js"), root.join("b.js")]);
        assert!(matches!(result, Err(GraphError::Cancelled)));
        assert!(matches!(
            builder.build_project(&[root]),
            Err(GraphError::Cancelled)
        ));
    }

    #[test]
    fn test_rebuild_single_file() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);
        let (mut graph, _) = builder.build_project(&[root.clone()]).unwrap();
        let before_b = graph.dependencies(&root.join("b.js"));

        write(&root.join("a.js"), "import C from './c'\n");
        let update = builder.rebuild(&mut graph, &root.join("a.js"));

        assert_eq!(
            update,
            FileUpdate::Updated {
                dependencies_changed: true
            }
        );
        assert_eq!(
            graph.dependencies(&root.join("a.js")),
            [root.join("c.js")].into_iter().collect()
        );
        assert_eq!(graph.dependencies(&root.join("b.js")), before_b);

        let again = builder.rebuild(&mut graph, &root.join("a.js"));
        assert_eq!(
            again,
            FileUpdate::Updated {
                dependencies_changed: false
            }
        );
    }

    #[test]
    fn test_rebuild_preserves_inbound_edges() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);
        let (mut graph, _) = builder.build_project(&[root.clone()]).unwrap();

        write(&root.join("b.js"), "// nothing imported any more\n");
        builder.rebuild(&mut graph, &root.join("b.js"));

        assert!(graph.dependencies(&root.join("b.js")).is_empty());
        assert_eq!(
            graph.dependents(&root.join("b.js")),
            [root.join("a.js")].into_iter().collect()
        );
    }

    #[test]
    fn test_rebuild_removed_and_ineligible() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);
        let (mut graph, _) = builder.build_project(&[root.clone()]).unwrap();

        fs::remove_file(root.join("b.js")).unwrap();
        assert_eq!(
            builder.rebuild(&mut graph, &root.join("b.js")),
            FileUpdate::Removed
        );
        assert!(!graph.contains_file(&root.join("b.js")));
        assert!(graph.dependents(&root.join("c.js")).len() == 1);

        assert_eq!(
            builder.rebuild(&mut graph, &root.join("notes.txt")),
            FileUpdate::Ineligible
        );
        assert_eq!(
            builder.rebuild(&mut graph, &root.join("node_modules/x.js")),
            FileUpdate::Ineligible
        );
    }

    #[test]
    fn test_refresh_reextracts_changed_files() {
        let (_tmp, root) = project();
        let config = config();
        let builder = DependencyGraphBuilder::new(&config);
        let (mut graph, _) = builder.build_project(&[root.clone()]).unwrap();

        // unchanged mtime: nothing to do
        let files = builder.collect_files(&[root.clone()]).unwrap();
        let report = builder.refresh(&mut graph, &files).unwrap();
        assert_eq!(report.files_indexed, 0);
        assert_eq!(report.files_removed, 0);

        write(&root.join("c.js"), "import A from './a'\n");
        set_file_mtime(root.join("c.js"), FileTime::from_unix_time(1_000_000, 0)).unwrap();
        fs::remove_file(root.join("d.coffee")).unwrap();
        write(&root.join("e.js"), "require('./a')\n");

        let files = builder.collect_files(&[root.clone()]).unwrap();
        let report = builder.refresh(&mut graph, &files).unwrap();
        assert_eq!(report.files_indexed, 2);
        assert_eq!(report.files_removed, 1);
        assert!(!graph.contains_file(&root.join("d.coffee")));
        assert_eq!(
            graph.dependencies(&root.join("c.js")),
            [root.join("a.js")].into_iter().collect()
        );
        assert_eq!(
            graph.dependents(&root.join("a.js")),
            [root.join("c.js"), root.join("e.js")].into_iter().collect()
        );
    }
}
