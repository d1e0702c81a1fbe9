//! Directory listing
//!
//! Lists the immediate children of a resolved directory. Children whose
//! metadata cannot be read are skipped and counted rather than failing the
//! listing.

use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::sandbox::{ResolvedPath, Sandbox};
use crate::types::{DirectoryEntry, FsError, FsResult};

/// Leading character that marks a hidden entry
pub const HIDDEN_PREFIX: char = '.';

/// Result of listing one directory
#[derive(Debug, Default)]
pub struct Listing {
    /// Entries sorted by name
    pub entries: Vec<DirectoryEntry>,
    /// Children dropped because their metadata was unreadable or their
    /// link target left the sandbox
    pub skipped: usize,
    /// More entries existed than `max_entries`
    pub truncated: bool,
}

pub fn is_hidden(name: &str) -> bool {
    name.starts_with(HIDDEN_PREFIX)
}

/// List `dir`, optionally including dot-files
pub async fn list(
    sandbox: &Sandbox,
    dir: &ResolvedPath,
    include_hidden: bool,
    max_entries: usize,
) -> FsResult<Listing> {
    let metadata = fs::metadata(dir.as_path())
        .await
        .map_err(|e| FsError::from_io(&e, dir.relative()))?;
    if !metadata.is_dir() {
        return Err(FsError::NotADirectory(dir.relative().to_string()));
    }

    let mut read_dir = fs::read_dir(dir.as_path())
        .await
        .map_err(|e| FsError::from_io(&e, dir.relative()))?;

    let mut listing = Listing::default();

    loop {
        let entry = match read_dir.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(dir = %dir, error = %e, "Failed to read directory entry");
                listing.skipped += 1;
                continue;
            }
        };

        let name = entry.file_name().to_string_lossy().to_string();
        let hidden = is_hidden(&name);
        if hidden && !include_hidden {
            continue;
        }

        match entry_metadata(sandbox, &entry.path(), name, hidden).await {
            Some(dir_entry) => listing.entries.push(dir_entry),
            None => listing.skipped += 1,
        }
    }

    listing.entries.sort_by(|a, b| a.name.cmp(&b.name));
    if listing.entries.len() > max_entries {
        listing.entries.truncate(max_entries);
        listing.truncated = true;
    }

    Ok(listing)
}

async fn entry_metadata(
    sandbox: &Sandbox,
    path: &Path,
    name: String,
    is_hidden: bool,
) -> Option<DirectoryEntry> {
    let link_meta = fs::symlink_metadata(path).await.ok()?;

    // A link's metadata describes its target; only report it if the target
    // is still inside the sandbox
    if link_meta.file_type().is_symlink() && sandbox.revalidate(path).is_none() {
        tracing::debug!(name = %name, "Skipping link that leaves the sandbox");
        return None;
    }

    let metadata = fs::metadata(path).await.ok()?;
    let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(|t| t.into());

    Some(DirectoryEntry {
        name,
        is_directory: metadata.is_dir(),
        size_bytes: metadata.is_file().then(|| metadata.len()),
        modified_time: modified,
        is_hidden,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Sandbox) {
        let dir = TempDir::new().unwrap();
        stdfs::create_dir(dir.path().join("sub")).unwrap();
        stdfs::write(dir.path().join("b.txt"), "hello").unwrap();
        stdfs::write(dir.path().join("a.md"), "").unwrap();
        stdfs::write(dir.path().join(".env"), "SECRET=1").unwrap();
        let sandbox = Sandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    fn names(listing: &Listing) -> Vec<&str> {
        listing.entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_hidden_excluded_by_default() {
        let (_dir, sandbox) = setup();
        let base = sandbox.resolve(".").unwrap();
        let listing = list(&sandbox, &base, false, 100).await.unwrap();
        assert_eq!(names(&listing), vec!["a.md", "b.txt", "sub"]);
        assert!(listing.entries.iter().all(|e| !e.is_hidden));
    }

    #[tokio::test]
    async fn test_hidden_included_on_request() {
        let (_dir, sandbox) = setup();
        let base = sandbox.resolve(".").unwrap();
        let listing = list(&sandbox, &base, true, 100).await.unwrap();
        assert_eq!(names(&listing), vec![".env", "a.md", "b.txt", "sub"]);
        assert!(listing.entries[0].is_hidden);
    }

    #[tokio::test]
    async fn test_entry_metadata() {
        let (_dir, sandbox) = setup();
        let base = sandbox.resolve(".").unwrap();
        let listing = list(&sandbox, &base, false, 100).await.unwrap();

        let file = listing.entries.iter().find(|e| e.name == "b.txt").unwrap();
        assert!(!file.is_directory);
        assert_eq!(file.size_bytes, Some(5));
        assert!(file.modified_time.is_some());

        let sub = listing.entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub.is_directory);
        assert_eq!(sub.size_bytes, None);
    }

    #[tokio::test]
    async fn test_file_is_not_a_directory() {
        let (_dir, sandbox) = setup();
        let file = sandbox.resolve("b.txt").unwrap();
        assert!(matches!(
            list(&sandbox, &file, false, 100).await,
            Err(FsError::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn test_truncation() {
        let (_dir, sandbox) = setup();
        let base = sandbox.resolve(".").unwrap();
        let listing = list(&sandbox, &base, false, 2).await.unwrap();
        assert_eq!(names(&listing), vec!["a.md", "b.txt"]);
        assert!(listing.truncated);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_broken_and_escaping_links_are_skipped() {
        let (dir, sandbox) = setup();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone"), dir.path().join("broken")).unwrap();

        let base = sandbox.resolve(".").unwrap();
        let listing = list(&sandbox, &base, false, 100).await.unwrap();
        assert_eq!(names(&listing), vec!["a.md", "b.txt", "sub"]);
        assert_eq!(listing.skipped, 2);
    }
}
