//! Usage search over a project.
//!
//! With a dependency graph only the files that transitively import the
//! defining file (plus the defining file itself) are scanned. Without one, or
//! when the graph is disabled for the project, every eligible file is.

pub mod definition;
pub mod usage_finder;

pub use definition::SymbolLocator;
pub use usage_finder::{Occurrence, UsageFinder, UsageKind};

use crate::config::ProjectConfig;
use crate::error::{GotoUsageError, GraphError, SearchError};
use crate::graph::DependencyGraph;
use crate::indexer::FileWalker;
use crate::paths;
use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// How the candidate files of a search were chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    DependencyGraph,
    Naive,
}

/// A single usage of the searched symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResult {
    /// Absolute path of the file
    pub file_path: String,
    /// Path relative to the project folder containing the file
    pub display_path: String,
    /// 1-based line number
    pub line: usize,
    /// 0-based byte offset of the usage in the line
    pub column: usize,
    pub line_text: String,
    pub kind: UsageKind,
}

/// Results of one search together with what it cost
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UsageSearch {
    pub symbol: String,
    pub mode: SearchMode,
    pub results: Vec<SearchResult>,
    pub files_scanned: usize,
    /// Candidates that could not be read
    pub files_skipped: usize,
    pub duration_ms: u64,
}

pub struct UsageSearchEngine<'a> {
    config: &'a ProjectConfig,
    folders: Vec<PathBuf>,
}

impl<'a> UsageSearchEngine<'a> {
    pub fn new<I, P>(config: &'a ProjectConfig, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            config,
            folders: folders
                .into_iter()
                .map(|f| paths::normalize(f.as_ref()))
                .collect(),
        }
    }

    pub fn mode(&self, graph: Option<&DependencyGraph>) -> SearchMode {
        if self.config.disable_dep_graph || graph.is_none() {
            SearchMode::Naive
        } else {
            SearchMode::DependencyGraph
        }
    }

    /// Files a search for a symbol defined in `defining_file` has to scan, sorted
    pub fn candidates(
        &self,
        defining_file: &Path,
        graph: Option<&DependencyGraph>,
    ) -> Result<Vec<PathBuf>, GraphError> {
        match graph {
            Some(graph) if !self.config.disable_dep_graph => {
                let defining_file = paths::normalize(defining_file);
                let mut files = graph.reverse_reachable(&defining_file);
                files.insert(defining_file);
                Ok(files.into_iter().collect())
            }
            _ => FileWalker::new(&self.folders, self.config)
                .walk()
                .map_err(|e| GraphError::WalkFailed(format!("{:#}", e))),
        }
    }

    /// Find every usage of `symbol`, defined in `defining_file`
    pub fn find_usages(
        &self,
        symbol: &str,
        defining_file: &Path,
        graph: Option<&DependencyGraph>,
    ) -> Result<UsageSearch, GotoUsageError> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(SearchError::EmptySymbol.into());
        }

        let start = Instant::now();
        let mode = self.mode(graph);
        let candidates = self.candidates(defining_file, graph)?;
        tracing::debug!(
            "Searching {} candidate files for {:?} ({:?})",
            candidates.len(),
            symbol,
            mode
        );

        let finder = UsageFinder::new(symbol);
        let scanned: Vec<Option<Vec<SearchResult>>> = candidates
            .par_iter()
            .map(|path| self.scan_file(&finder, path))
            .collect();

        let files_scanned = scanned.iter().filter(|s| s.is_some()).count();
        let files_skipped = scanned.len() - files_scanned;
        let mut results: Vec<SearchResult> = scanned.into_iter().flatten().flatten().collect();
        results.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line.cmp(&b.line))
                .then(a.column.cmp(&b.column))
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Found {} usages of {:?} in {} files ({:?}, {} unreadable) in {}ms",
            results.len(),
            symbol,
            files_scanned,
            mode,
            files_skipped,
            duration_ms
        );

        Ok(UsageSearch {
            symbol: symbol.to_string(),
            mode,
            results,
            files_scanned,
            files_skipped,
            duration_ms,
        })
    }

    /// `None` when the file cannot be read
    fn scan_file(&self, finder: &UsageFinder, path: &Path) -> Option<Vec<SearchResult>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Skipping unreadable file {:?}: {}", path, e);
                return None;
            }
        };

        let file_path = paths::to_match_string(path);
        let display_path = paths::display_path(path, &self.folders);
        Some(
            finder
                .find_in(&content)
                .into_iter()
                .map(|occurrence| SearchResult {
                    file_path: file_path.clone(),
                    display_path: display_path.clone(),
                    line: occurrence.line,
                    column: occurrence.column,
                    line_text: occurrence.line_text,
                    kind: occurrence.kind,
                })
                .collect(),
        )
    }
}
