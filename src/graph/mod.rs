//! Per-project import dependency graph.
//!
//! Edge `A -> B` means "A's content imports something that resolves to B".
//! The reverse index is derived from the forward edges and rebuilt whenever a
//! graph is deserialized, so it is never persisted.

mod builder;

pub use builder::{BuildReport, DependencyGraphBuilder, FileAnalysis, FileUpdate};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// A source file known to the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Last-known modification time, `None` when the file system did not report one
    pub modified: Option<DateTime<Utc>>,
    /// Raw specifiers extracted from the file, in order of appearance
    pub imports: Vec<String>,
}

/// Graph sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub files: usize,
    pub dependencies: usize,
}

/// Persisted shape of a graph: nodes and forward edges only
#[derive(Serialize, Deserialize)]
struct GraphData {
    nodes: BTreeMap<PathBuf, FileNode>,
    edges: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "GraphData", into = "GraphData")]
pub struct DependencyGraph {
    nodes: BTreeMap<PathBuf, FileNode>,
    forward: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    backward: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
}

impl From<GraphData> for DependencyGraph {
    fn from(data: GraphData) -> Self {
        let mut graph = DependencyGraph {
            nodes: data.nodes,
            forward: BTreeMap::new(),
            backward: BTreeMap::new(),
        };
        for (from, targets) in data.edges {
            graph.set_dependencies(&from, targets);
        }
        graph
    }
}

impl From<DependencyGraph> for GraphData {
    fn from(graph: DependencyGraph) -> Self {
        GraphData {
            nodes: graph.nodes,
            edges: graph.forward,
        }
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record or replace the node for `path`. Edges are untouched.
    pub fn upsert_node(&mut self, path: PathBuf, node: FileNode) {
        self.nodes.insert(path, node);
    }

    pub fn node(&self, path: &Path) -> Option<&FileNode> {
        self.nodes.get(path)
    }

    pub fn contains_file(&self, path: &Path) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.nodes.keys().map(PathBuf::as_path)
    }

    /// Add `from -> to`. Returns false for self-loops and existing edges.
    pub fn add_dependency(&mut self, from: &Path, to: &Path) -> bool {
        if from == to {
            return false;
        }
        let inserted = self
            .forward
            .entry(from.to_path_buf())
            .or_default()
            .insert(to.to_path_buf());
        if inserted {
            self.backward
                .entry(to.to_path_buf())
                .or_default()
                .insert(from.to_path_buf());
        }
        inserted
    }

    /// Replace every outgoing edge of `from`. Inbound edges are not touched.
    ///
    /// Returns true when the outgoing edge set changed.
    pub fn set_dependencies<I>(&mut self, from: &Path, targets: I) -> bool
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let new_targets: BTreeSet<PathBuf> =
            targets.into_iter().filter(|target| target != from).collect();

        let old_targets = self.forward.remove(from).unwrap_or_default();
        if old_targets == new_targets {
            if !new_targets.is_empty() {
                self.forward.insert(from.to_path_buf(), new_targets);
            }
            return false;
        }

        for target in old_targets.difference(&new_targets) {
            self.unlink_backward(target, from);
        }
        for target in new_targets.difference(&old_targets) {
            self.backward
                .entry(target.clone())
                .or_default()
                .insert(from.to_path_buf());
        }
        if !new_targets.is_empty() {
            self.forward.insert(from.to_path_buf(), new_targets);
        }
        true
    }

    /// Drop a file's node and outgoing edges.
    ///
    /// Edges other files hold into it stay until those files are re-extracted.
    pub fn remove_file(&mut self, path: &Path) -> bool {
        let had_node = self.nodes.remove(path).is_some();
        let had_edges = self.set_dependencies(path, std::iter::empty());
        had_node || had_edges
    }

    fn unlink_backward(&mut self, target: &Path, from: &Path) {
        if let Some(sources) = self.backward.get_mut(target) {
            sources.remove(from);
            if sources.is_empty() {
                self.backward.remove(target);
            }
        }
    }

    /// Files `path` imports directly
    pub fn dependencies(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.forward.get(path).cloned().unwrap_or_default()
    }

    /// Files importing `path` directly
    pub fn dependents(&self, path: &Path) -> BTreeSet<PathBuf> {
        self.backward.get(path).cloned().unwrap_or_default()
    }

    /// Every file with an import path to `target`, i.e. who transitively
    /// depends on it. `target` itself is never part of the result, even when
    /// it sits on a cycle.
    pub fn reverse_reachable(&self, target: &Path) -> BTreeSet<PathBuf> {
        Self::reachable(&self.backward, target)
    }

    /// Every file `source` transitively imports, excluding `source`.
    pub fn forward_reachable(&self, source: &Path) -> BTreeSet<PathBuf> {
        Self::reachable(&self.forward, source)
    }

    fn reachable(
        adjacency: &BTreeMap<PathBuf, BTreeSet<PathBuf>>,
        start: &Path,
    ) -> BTreeSet<PathBuf> {
        let mut seen: BTreeSet<PathBuf> = BTreeSet::new();
        let mut queue: VecDeque<&Path> = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            let Some(next) = adjacency.get(current) else {
                continue;
            };
            for neighbour in next {
                if neighbour.as_path() != start && seen.insert(neighbour.clone()) {
                    queue.push_back(neighbour.as_path());
                }
            }
        }

        seen
    }

    /// All `(from, to)` edges in sorted order
    pub fn edges(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.forward.iter().flat_map(|(from, targets)| {
            targets
                .iter()
                .map(move |to| (from.as_path(), to.as_path()))
        })
    }

    pub fn file_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            files: self.file_count(),
            dependencies: self.dependency_count(),
        }
    }
}

#[cfg(test)]
mod tests;
