//! Engine profiles and the catalog they are read from.
//!
//! Profiles are authored and persisted elsewhere; this module only reads
//! them. The catalog is a trait so callers can back it with anything.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A named, ordered set of engine arguments. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Profile {
    #[serde(default, alias = "id")]
    pub id: String,
    #[serde(alias = "name")]
    pub name: String,
    #[serde(default, alias = "description")]
    pub description: String,
    #[serde(default, alias = "arguments")]
    pub arguments: Vec<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, arguments: Vec<String>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            description: String::new(),
            name,
            arguments,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Errors raised while enumerating profiles.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read profile catalog at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse profile {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read-only source of profiles.
#[async_trait::async_trait]
pub trait ProfileCatalog: Send + Sync {
    /// All profiles, sorted by name.
    async fn list_available_profiles(&self) -> Result<Vec<Profile>, CatalogError>;

    /// Case-insensitive lookup by display name.
    async fn get_profile_by_name(&self, name: &str) -> Result<Option<Profile>, CatalogError> {
        let profiles = self.list_available_profiles().await?;
        Ok(profiles.into_iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    profiles: Vec<Profile>,
}

impl StaticCatalog {
    pub fn new(mut profiles: Vec<Profile>) -> Self {
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Self { profiles }
    }
}

#[async_trait::async_trait]
impl ProfileCatalog for StaticCatalog {
    async fn list_available_profiles(&self) -> Result<Vec<Profile>, CatalogError> {
        Ok(self.profiles.clone())
    }
}

/// Catalog backed by a directory of `*.json` profile files.
///
/// A missing directory is an empty catalog. A file that fails to parse is
/// skipped with a warning so one bad profile cannot hide the rest.
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    dir: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn read_profile(path: &Path) -> Result<Profile, CatalogError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
        serde_json::from_str(&raw)
            .map_err(|source| CatalogError::Parse { path: path.to_path_buf(), source })
    }
}

#[async_trait::async_trait]
impl ProfileCatalog for DirectoryCatalog {
    async fn list_available_profiles(&self) -> Result<Vec<Profile>, CatalogError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(dir = %self.dir.display(), "profile directory does not exist");
                return Ok(Vec::new());
            }
            Err(source) => return Err(CatalogError::Io { path: self.dir.clone(), source }),
        };

        let mut profiles = Vec::new();
        loop {
            let entry = entries
                .next_entry()
                .await
                .map_err(|source| CatalogError::Io { path: self.dir.clone(), source })?;
            let Some(entry) = entry else { break };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_profile(&path).await {
                Ok(profile) => profiles.push(profile),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable profile"),
            }
        }

        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::debug!(count = profiles.len(), dir = %self.dir.display(), "loaded profiles");
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_deserializes_from_pascal_case() {
        let json = r#"{
            "Id": "b1",
            "Name": "ALT 2",
            "Description": "Profile from 'general (ALT2).bat'",
            "Arguments": ["--wf-tcp=80,443", "--dpi-desync=fake"]
        }"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "ALT 2");
        assert_eq!(profile.arguments.len(), 2);
    }

    #[test]
    fn profile_accepts_lowercase_keys() {
        let json = r#"{"name": "Default"}"#;
        let profile: Profile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.name, "Default");
        assert!(profile.arguments.is_empty());
    }

    #[tokio::test]
    async fn static_catalog_sorts_and_finds_case_insensitively() {
        let catalog = StaticCatalog::new(vec![
            Profile::new("zeta", vec![]),
            Profile::new("Alpha", vec![]),
        ]);
        let names: Vec<_> = catalog
            .list_available_profiles()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "zeta"]);

        let found = catalog.get_profile_by_name("ALPHA").await.unwrap();
        assert_eq!(found.map(|p| p.name), Some("Alpha".to_string()));
        assert!(catalog.get_profile_by_name("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn directory_catalog_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"{"Name": "A", "Arguments": ["-x"]}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let catalog = DirectoryCatalog::new(dir.path());
        let profiles = catalog.list_available_profiles().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "A");
    }

    #[tokio::test]
    async fn directory_catalog_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new(dir.path().join("nope"));
        assert!(catalog.list_available_profiles().await.unwrap().is_empty());
    }
}
