//! Import specifier resolution.
//!
//! Maps a raw specifier and the importing file onto the set of files it may
//! refer to. Resolution is best effort: an unresolvable specifier yields an
//! empty set, and a resolvable one may expand to several files.

use crate::config::ProjectConfig;
use crate::paths;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub struct PathResolver<'a> {
    config: &'a ProjectConfig,
}

impl<'a> PathResolver<'a> {
    pub fn new(config: &'a ProjectConfig) -> Self {
        Self { config }
    }

    /// Resolve `specifier` as written in `importing_file`.
    ///
    /// Order of attempts:
    /// 1. alias substitution (longest matching alias wins)
    /// 2. `.`-prefixed specifiers against the importing file's directory,
    ///    absolute ones as they are
    /// 3. every configured root in order; the first root with a match wins
    ///
    /// Each candidate base is then expanded: a directory to its eligible files,
    /// a path without a known extension to `base + ext` for every configured
    /// extension that exists, a path with a known extension to itself.
    pub fn resolve(&self, specifier: &str, importing_file: &Path) -> BTreeSet<PathBuf> {
        let specifier = specifier.trim();
        if specifier.is_empty() || specifier.contains("://") || specifier.contains("${") {
            return BTreeSet::new();
        }

        let candidate = self
            .expand_alias(specifier)
            .unwrap_or_else(|| PathBuf::from(specifier));

        if candidate.to_string_lossy().starts_with('.') {
            let dir = importing_file.parent().unwrap_or_else(|| Path::new("/"));
            return self.expand(&paths::normalize(&dir.join(&candidate)));
        }

        if candidate.is_absolute() {
            return self.expand(&paths::normalize(&candidate));
        }

        for root in &self.config.roots {
            let found = self.expand(&paths::normalize(&root.join(&candidate)));
            if !found.is_empty() {
                return found;
            }
        }

        BTreeSet::new()
    }

    /// Substitute the alias prefix of `specifier`, if any.
    ///
    /// `components` matches `components` and `components/x` but not
    /// `componentsX`; an alias ending in `/` matches as a plain prefix.
    pub fn expand_alias(&self, specifier: &str) -> Option<PathBuf> {
        let mut best: Option<(&str, &Path, &str)> = None;

        for (alias, target) in &self.config.aliases {
            let rest = if alias.ends_with('/') {
                specifier.strip_prefix(alias.as_str())
            } else if specifier == alias {
                Some("")
            } else {
                specifier
                    .strip_prefix(alias.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
            };

            if let Some(rest) = rest
                && best.is_none_or(|(current, _, _)| alias.len() > current.len())
            {
                best = Some((alias.as_str(), target.as_path(), rest));
            }
        }

        best.map(|(_, target, rest)| {
            if rest.is_empty() {
                target.to_path_buf()
            } else {
                target.join(rest)
            }
        })
    }

    /// Concrete files named by a candidate base path.
    pub fn expand(&self, base: &Path) -> BTreeSet<PathBuf> {
        let mut files = BTreeSet::new();

        if base.is_dir() {
            files.extend(self.eligible_files_in(base));
        }

        if self.config.has_recognized_extension(base) {
            if base.is_file() {
                files.insert(base.to_path_buf());
            }
        } else {
            for ext in &self.config.file_extensions {
                let mut with_ext = base.as_os_str().to_os_string();
                with_ext.push(ext);
                let candidate = PathBuf::from(with_ext);
                if candidate.is_file() {
                    files.insert(candidate);
                }
            }
        }

        files
    }

    fn eligible_files_in(&self, dir: &Path) -> Vec<PathBuf> {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 {
                    return true;
                }
                if paths::is_hidden(entry.path()) {
                    return false;
                }
                !(entry.file_type().is_dir() && self.config.is_excluded_dir(entry.path()))
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry under {:?}: {}", dir, e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| self.config.is_eligible(path))
            .collect()
    }
}

#[cfg(test)]
mod tests;
