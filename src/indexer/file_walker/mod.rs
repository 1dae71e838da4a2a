//! File walking functionality for project traversal

use crate::config::ProjectConfig;
use crate::paths;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Enumerates the eligible files under a set of project folders.
///
/// Excluded directories are pruned before they are entered and no file content
/// is read. Dot-prefixed files and folders below each folder are skipped.
pub struct FileWalker {
    pub(crate) folders: Vec<PathBuf>,
    pub(crate) config: ProjectConfig,
    /// Optional cancellation token - once cancelled, walk() exits early
    cancel: Option<CancellationToken>,
}

impl FileWalker {
    pub fn new<I, P>(folders: I, config: &ProjectConfig) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        Self {
            folders: folders
                .into_iter()
                .map(|f| paths::normalize(f.as_ref()))
                .collect(),
            config: config.clone(),
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// Walk every folder and collect eligible files, sorted and de-duplicated
    pub fn walk(&self) -> Result<Vec<PathBuf>> {
        let Some(first) = self.folders.first() else {
            return Ok(Vec::new());
        };

        for folder in &self.folders {
            if !folder.exists() {
                anyhow::bail!("Project folder does not exist: {:?}", folder);
            }
            if !folder.is_dir() {
                anyhow::bail!("Project folder is not a directory: {:?}", folder);
            }
        }

        let mut builder = WalkBuilder::new(first);
        for folder in &self.folders[1..] {
            builder.add(folder);
        }

        let prune = self.config.clone();
        let walker = builder
            .standard_filters(false) // eligibility is decided by the project settings alone
            .hidden(true) // skip dot files and dot folders
            .follow_links(false)
            .filter_entry(move |entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                !(is_dir && entry.depth() > 0 && prune.is_excluded_dir(entry.path()))
            })
            .build();

        let mut files = Vec::new();
        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", files.len());
                anyhow::bail!("File walk was cancelled");
            }

            let entry = match entry.context("Failed to read directory entry") {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    continue;
                }
            };

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            let path = paths::normalize(entry.path());
            if !self.config.is_eligible(&path) {
                tracing::debug!("Skipping ineligible file: {:?}", path);
                continue;
            }
            files.push(path);
        }

        files.sort();
        files.dedup();
        tracing::info!(
            "Found {} eligible files in {} folder(s)",
            files.len(),
            self.folders.len()
        );
        Ok(files)
    }
}
