//! Project identity and the folders a project spans.

use crate::paths;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity string that keys cached graphs and project-scoped settings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Identity from a host project file: `shop.sublime-project` becomes `shop`.
    pub fn from_project_file(path: &Path) -> Option<Self> {
        let stem = path.file_stem()?.to_string_lossy();
        if stem.is_empty() {
            None
        } else {
            Some(Self(stem.into_owned()))
        }
    }

    /// Identity from a project folder's own name.
    pub fn from_folder(folder: &Path) -> Option<Self> {
        let name = paths::normalize(folder).file_name()?.to_string_lossy().into_owned();
        if name.is_empty() { None } else { Some(Self(name)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe key, unique per identity string.
    pub fn cache_key(&self) -> String {
        let sanitized: String = self
            .0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .take(48)
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        format!("{}-{}", sanitized, &digest[..12])
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A project as the host sees it: an identity plus the folders it has open.
///
/// Folders are walked for graph builds and naive searches. They are unrelated
/// to the `roots` used for import resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub folders: Vec<PathBuf>,
}

impl Project {
    pub fn new<I, P>(id: ProjectId, folders: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut normalized: Vec<PathBuf> = Vec::new();
        for folder in folders {
            let folder = paths::normalize(folder.as_ref());
            if !normalized.contains(&folder) {
                normalized.push(folder);
            }
        }
        Self {
            id,
            folders: normalized,
        }
    }

    /// Project named after its first folder.
    pub fn from_folders<I, P>(folders: I) -> Option<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let folders: Vec<PathBuf> = folders
            .into_iter()
            .map(|f| f.as_ref().to_path_buf())
            .collect();
        let id = ProjectId::from_folder(folders.first()?)?;
        Some(Self::new(id, folders))
    }

    /// True when `path` lies inside one of the project folders.
    pub fn contains(&self, path: &Path) -> bool {
        let path = paths::normalize(path);
        self.folders.iter().any(|folder| path.starts_with(folder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_project_file() {
        let id = ProjectId::from_project_file(Path::new("/home/me/shop.sublime-project")).unwrap();
        assert_eq!(id.as_str(), "shop");
    }

    #[test]
    fn test_from_folder() {
        let id = ProjectId::from_folder(Path::new("/home/me/shop/")).unwrap();
        assert_eq!(id.as_str(), "shop");
        assert!(ProjectId::from_folder(Path::new("/")).is_none());
    }

    #[test]
    fn test_cache_key_is_stable_and_safe() {
        let id = ProjectId::new("my shop/v2");
        let key = id.cache_key();
        assert_eq!(key, ProjectId::new("my shop/v2").cache_key());
        assert!(key.starts_with("my_shop_v2-"));
        assert!(!key.contains('/'));
        assert_ne!(key, ProjectId::new("my_shop_v2").cache_key());
    }

    #[test]
    fn test_project_dedups_and_contains() {
        let project = Project::new(ProjectId::new("p"), ["/proj", "/proj/", "/other"]);
        assert_eq!(project.folders.len(), 2);
        assert!(project.contains(Path::new("/proj/src/a.js")));
        assert!(!project.contains(Path::new("/projection/a.js")));
    }

    #[test]
    fn test_from_folders_uses_first_folder_name() {
        let project = Project::from_folders(["/work/shop", "/work/lib"]).unwrap();
        assert_eq!(project.id.as_str(), "shop");
        assert!(Project::from_folders(Vec::<PathBuf>::new()).is_none());
    }
}
