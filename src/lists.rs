//! Host-list file management.
//!
//! The engine scopes most strategies to the domains listed in plain-text
//! host lists. Edits are serialized per file through a keyed lock map owned
//! by [`HostLists`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;

/// Host list consulted by the default strategies.
pub const GENERAL_LIST: &str = "list-general.txt";

const MAX_DOMAIN_LEN: usize = 253;
const MIN_DOMAIN_LEN: usize = 3;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum ListError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),
    #[error("Host list I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Serialized access to host-list files.
#[derive(Debug, Default)]
pub struct HostLists {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl HostLists {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Domains in `path`. A missing file is an empty list.
    pub async fn domains(&self, path: &Path) -> Result<Vec<String>, ListError> {
        let lock = self.lock_for(path);
        let _held = lock.lock().await;
        read_entries(path).await
    }

    /// Append `domain` unless it is already listed. Returns whether the file changed.
    pub async fn add_domain(&self, path: &Path, domain: &str) -> Result<bool, ListError> {
        let domain = normalize(domain);
        if !is_valid_domain(&domain) {
            return Err(ListError::InvalidDomain(domain));
        }

        let lock = self.lock_for(path);
        let _held = lock.lock().await;

        let mut entries = read_entries(path).await?;
        if entries.iter().any(|e| e.eq_ignore_ascii_case(&domain)) {
            tracing::debug!(%domain, path = %path.display(), "domain already listed");
            return Ok(false);
        }
        entries.push(domain.clone());
        write_entries(path, &entries).await?;
        tracing::info!(%domain, path = %path.display(), "domain added to host list");
        Ok(true)
    }

    /// Remove `domain`. Returns whether it was present.
    pub async fn remove_domain(&self, path: &Path, domain: &str) -> Result<bool, ListError> {
        let domain = normalize(domain);
        let lock = self.lock_for(path);
        let _held = lock.lock().await;

        let mut entries = read_entries(path).await?;
        let before = entries.len();
        entries.retain(|e| !e.eq_ignore_ascii_case(&domain));
        if entries.len() == before {
            return Ok(false);
        }
        write_entries(path, &entries).await?;
        tracing::info!(%domain, path = %path.display(), "domain removed from host list");
        Ok(true)
    }
}

fn normalize(domain: &str) -> String {
    domain.trim().to_ascii_lowercase()
}

/// Hostname syntax check used before a domain is written to a list.
pub fn is_valid_domain(domain: &str) -> bool {
    let domain = normalize(domain);
    if domain.len() < MIN_DOMAIN_LEN || domain.len() > MAX_DOMAIN_LEN {
        return false;
    }
    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

async fn read_entries(path: &Path) -> Result<Vec<String>, ListError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(ListError::Io { path: path.to_path_buf(), source }),
    };

    let mut seen = HashSet::new();
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter(|l| seen.insert(l.to_ascii_lowercase()))
        .map(str::to_string)
        .collect())
}

async fn write_entries(path: &Path, entries: &[String]) -> Result<(), ListError> {
    let io_err = |source| ListError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    let mut content = entries.join("\n");
    content.push('\n');
    tokio::fs::write(path, content).await.map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_validation() {
        assert!(is_valid_domain("example.com"));
        assert!(is_valid_domain("  Sub.Example.COM "));
        assert!(!is_valid_domain("a"));
        assert!(!is_valid_domain("bad..com"));
        assert!(!is_valid_domain("-lead.com"));
        assert!(!is_valid_domain("under_score.com"));
        assert!(!is_valid_domain(&format!("{}.com", "x".repeat(64))));
    }

    #[tokio::test]
    async fn add_creates_file_and_deduplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lists").join(GENERAL_LIST);
        let lists = HostLists::new();

        assert!(lists.add_domain(&path, "example.com").await.unwrap());
        assert!(!lists.add_domain(&path, "EXAMPLE.com").await.unwrap());
        assert_eq!(lists.domains(&path).await.unwrap(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn read_skips_comments_and_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GENERAL_LIST);
        std::fs::write(&path, "# header\nyoutube.com\n\nYouTube.com\n discord.gg \n").unwrap();

        let lists = HostLists::new();
        assert_eq!(lists.domains(&path).await.unwrap(), vec!["youtube.com", "discord.gg"]);
    }

    #[tokio::test]
    async fn remove_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GENERAL_LIST);
        std::fs::write(&path, "a.com\nb.com\n").unwrap();

        let lists = HostLists::new();
        assert!(lists.remove_domain(&path, "A.com").await.unwrap());
        assert!(!lists.remove_domain(&path, "a.com").await.unwrap());
        assert_eq!(lists.domains(&path).await.unwrap(), vec!["b.com"]);
    }

    #[tokio::test]
    async fn invalid_domain_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lists = HostLists::new();
        let err = lists.add_domain(&dir.path().join("x.txt"), "not a domain").await;
        assert!(matches!(err, Err(ListError::InvalidDomain(_))));
    }

    #[tokio::test]
    async fn concurrent_adds_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(GENERAL_LIST);
        let lists = Arc::new(HostLists::new());

        let mut tasks = Vec::new();
        for i in 0..16 {
            let lists = lists.clone();
            let path = path.clone();
            tasks.push(tokio::spawn(async move {
                lists.add_domain(&path, &format!("host{i}.example.com")).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(lists.domains(&path).await.unwrap().len(), 16);
    }
}
