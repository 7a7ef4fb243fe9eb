// Copyright 2024-2026 dpi-verify Contributors
// SPDX-License-Identifier: Apache-2.0

//! `lists show|add|remove` subcommand.

use std::path::{Component, Path, PathBuf};

use crate::lists::{HostLists, ListError};

use super::{EXIT_FAILURE, EXIT_SUCCESS, EXIT_USAGE};

pub const LISTS_USAGE: &str = "Usage:
    dpi-verify-cli lists show <FILE>
    dpi-verify-cli lists add <FILE> <DOMAIN>
    dpi-verify-cli lists remove <FILE> <DOMAIN>";

/// Resolve a list file name inside `lists_dir`. Only bare file names are accepted.
fn list_path(lists_dir: &Path, file: &str) -> Option<PathBuf> {
    let mut components = Path::new(file).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => Some(lists_dir.join(name)),
        _ => None,
    }
}

/// Run a `lists` subcommand. `args` starts after `lists`.
pub async fn run_lists(args: &[String], lists_dir: &Path) -> i32 {
    let (sub, file) = match (args.first(), args.get(1)) {
        (Some(sub), Some(file)) => (sub.as_str(), file.as_str()),
        _ => {
            eprintln!("{LISTS_USAGE}");
            return EXIT_USAGE;
        }
    };
    let Some(path) = list_path(lists_dir, file) else {
        eprintln!("List file must be a plain file name: {file}");
        return EXIT_USAGE;
    };
    let lists = HostLists::new();

    let result = match (sub, args.get(2)) {
        ("show", None) => lists.domains(&path).await.map(|domains| {
            if domains.is_empty() {
                println!("{} is empty.", path.display());
            }
            for d in domains {
                println!("{d}");
            }
        }),
        ("add", Some(domain)) => lists.add_domain(&path, domain).await.map(|added| {
            if added {
                println!("Added {domain} to {}", path.display());
            } else {
                println!("{domain} is already listed in {}", path.display());
            }
        }),
        ("remove", Some(domain)) => lists.remove_domain(&path, domain).await.map(|removed| {
            if removed {
                println!("Removed {domain} from {}", path.display());
            } else {
                println!("{domain} is not listed in {}", path.display());
            }
        }),
        _ => {
            eprintln!("{LISTS_USAGE}");
            return EXIT_USAGE;
        }
    };

    match result {
        Ok(()) => EXIT_SUCCESS,
        Err(e @ ListError::InvalidDomain(_)) => {
            eprintln!("Error: {e}");
            EXIT_USAGE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn list_path_rejects_traversal() {
        let dir = Path::new("/srv/lists");
        assert_eq!(list_path(dir, "list-general.txt"), Some(dir.join("list-general.txt")));
        assert_eq!(list_path(dir, "../secret.txt"), None);
        assert_eq!(list_path(dir, "/etc/hosts"), None);
        assert_eq!(list_path(dir, "sub/list.txt"), None);
    }

    #[tokio::test]
    async fn add_show_remove_round() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_lists(&args(&["add", "custom.txt", "Example.org"]), dir.path()).await, EXIT_SUCCESS);
        let text = std::fs::read_to_string(dir.path().join("custom.txt")).unwrap();
        assert_eq!(text.trim(), "example.org");
        assert_eq!(run_lists(&args(&["show", "custom.txt"]), dir.path()).await, EXIT_SUCCESS);
        assert_eq!(run_lists(&args(&["remove", "custom.txt", "example.org"]), dir.path()).await, EXIT_SUCCESS);
        let text = std::fs::read_to_string(dir.path().join("custom.txt")).unwrap();
        assert!(text.trim().is_empty());
    }

    #[tokio::test]
    async fn usage_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run_lists(&args(&["show"]), dir.path()).await, EXIT_USAGE);
        assert_eq!(run_lists(&args(&["add", "a.txt"]), dir.path()).await, EXIT_USAGE);
        assert_eq!(run_lists(&args(&["add", "a.txt", "not a domain"]), dir.path()).await, EXIT_USAGE);
        assert_eq!(run_lists(&args(&["purge", "a.txt"]), dir.path()).await, EXIT_USAGE);
    }
}
