use super::{ProjectOverrides, ProjectSettings};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Effective settings for one project: global defaults overlaid with the
/// project's overrides.
///
/// A snapshot of this value is stored next to every cached graph. Changing the
/// configuration does not invalidate cached graphs; callers rebuild explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Always dot-prefixed
    pub file_extensions: BTreeSet<String>,
    pub excluded_folders: BTreeSet<String>,
    pub roots: Vec<PathBuf>,
    pub aliases: BTreeMap<String, PathBuf>,
    pub disable_dep_graph: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::from_settings(&ProjectSettings::default())
    }
}

impl ProjectConfig {
    pub fn from_settings(settings: &ProjectSettings) -> Self {
        Self {
            file_extensions: normalize_extensions(&settings.file_extensions),
            excluded_folders: settings.excluded_folders.iter().cloned().collect(),
            roots: settings.roots.clone(),
            aliases: settings.aliases.clone(),
            disable_dep_graph: settings.disable_dep_graph,
        }
    }

    /// Replace every field the overrides specify.
    pub fn with_overrides(mut self, overrides: &ProjectOverrides) -> Self {
        if let Some(extensions) = &overrides.file_extensions {
            self.file_extensions = normalize_extensions(extensions);
        }
        if let Some(excluded) = &overrides.excluded_folders {
            self.excluded_folders = excluded.iter().cloned().collect();
        }
        if let Some(flag) = overrides.disable_dep_graph {
            self.disable_dep_graph = flag;
        }
        if let Some(roots) = &overrides.roots {
            self.roots = roots.clone();
        }
        if let Some(aliases) = &overrides.aliases {
            self.aliases = aliases.clone();
        }
        self
    }

    /// Builder-style helpers, mostly for hosts that assemble settings in code
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.file_extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();
        self
    }

    pub fn with_excluded_folders<I, S>(mut self, folders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_folders = folders.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.roots = roots.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.aliases.insert(alias.into(), target.into());
        self
    }

    pub fn with_dep_graph_disabled(mut self, disabled: bool) -> Self {
        self.disable_dep_graph = disabled;
        self
    }

    /// True when the file name ends with one of the configured extensions.
    pub fn has_recognized_extension(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy();
        self.file_extensions
            .iter()
            .any(|ext| name.len() > ext.len() && name.ends_with(ext.as_str()))
    }

    /// Raw substring test against the full normalized path.
    ///
    /// `"tmp"` therefore also excludes `attempt/`; that looseness is kept as is.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let haystack = paths::to_match_string(&paths::normalize(path));
        self.excluded_folders
            .iter()
            .any(|folder| haystack.contains(folder.as_str()))
    }

    /// Directories are matched with a trailing `/` so that `node_modules/`
    /// prunes the directory itself during walks.
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        let mut haystack = paths::to_match_string(&paths::normalize(dir));
        if !haystack.ends_with('/') {
            haystack.push('/');
        }
        self.excluded_folders
            .iter()
            .any(|folder| haystack.contains(folder.as_str()))
    }

    /// Eligible files take part in graph builds and usage searches.
    pub fn is_eligible(&self, path: &Path) -> bool {
        self.has_recognized_extension(path) && !self.is_excluded(path)
    }
}

fn normalize_extensions(extensions: &[String]) -> BTreeSet<String> {
    extensions
        .iter()
        .filter_map(|ext| normalize_extension(ext))
        .collect()
}

fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim();
    if trimmed.trim_start_matches('.').is_empty() {
        return None;
    }
    if trimmed.starts_with('.') {
        Some(trimmed.to_string())
    } else {
        Some(format!(".{}", trimmed))
    }
}
