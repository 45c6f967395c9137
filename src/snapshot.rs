// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Crawler snapshots in, map document out
//!
//! A data directory holds `cached_repos.json` and `cached_users.json`, either
//! plain or gzip-compressed with a `.gz` suffix. The compressed file wins when
//! both exist.

use crate::corpus::Corpus;
use crate::error::{GitmapError, Result};
use crate::types::GitMap;
use flate2::read::GzDecoder;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::info;

/// Repository snapshot file stem
pub const REPOS_FILE: &str = "cached_repos.json";
/// User snapshot file stem
pub const USERS_FILE: &str = "cached_users.json";

/// Load both collections from `dir`
///
/// # Errors
///
/// Fails if either snapshot is missing, unreadable, or malformed.
pub fn load_corpus(dir: &Path) -> Result<Corpus> {
    let repos = load_collection(dir, REPOS_FILE)?;
    let users = load_collection(dir, USERS_FILE)?;
    let corpus = Corpus::new(repos, users);
    info!(
        repos = corpus.repos.len(),
        users = corpus.users.len(),
        "Loaded snapshot from {}",
        dir.display()
    );
    Ok(corpus)
}

/// Path of the snapshot named `stem` inside `dir`, preferring the gzip form
#[must_use]
pub fn resolve(dir: &Path, stem: &str) -> PathBuf {
    let gz = dir.join(format!("{stem}.gz"));
    if gz.exists() {
        gz
    } else {
        dir.join(stem)
    }
}

fn load_collection<T: DeserializeOwned>(dir: &Path, stem: &str) -> Result<BTreeMap<String, T>> {
    read_document(&resolve(dir, stem))
}

/// Decode one JSON document, gunzipping when the extension is `gz`
///
/// # Errors
///
/// Returns [`GitmapError::Io`] when the file cannot be opened and
/// [`GitmapError::Snapshot`] when it does not decode.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|source| GitmapError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    let reader: Box<dyn Read> = if path.extension().is_some_and(|e| e == "gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    serde_json::from_reader(BufReader::new(reader)).map_err(|source| GitmapError::Snapshot {
        source,
        path: path.to_path_buf(),
    })
}

/// Serialize `map` in memory, then write it to `path`
///
/// # Errors
///
/// Returns [`GitmapError::Io`] when the file cannot be written.
pub fn write_gitmap(path: &Path, map: &GitMap) -> Result<()> {
    let json = serde_json::to_string_pretty(map).map_err(|source| GitmapError::Snapshot {
        source,
        path: path.to_path_buf(),
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| GitmapError::Io {
            source,
            path: parent.to_path_buf(),
        })?;
    }
    fs::write(path, json).map_err(|source| GitmapError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    info!("Wrote map to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::ClusterNode;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const REPOS: &str = r#"{
        "acme/a": {"stargazers_count": 3, "crawled": true,
                   "contributors": {"alice": {"log1p_contributions": 1.5}},
                   "total_log1p_contribs": 1.5},
        "acme/b": {"stargazers_count": 0, "crawled": false}
    }"#;
    const USERS: &str = r#"{"alice": {"starweight": 1.0, "crawled": true, "stars": {"acme/a": 1}}}"#;

    #[test]
    fn test_load_plain() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPOS_FILE), REPOS).unwrap();
        fs::write(dir.path().join(USERS_FILE), USERS).unwrap();

        let c = load_corpus(dir.path()).unwrap();
        assert_eq!(c.repos.len(), 2);
        assert_eq!(c.num_usable_repos(), 1);
        assert!(c.usable_user("alice").is_some());
    }

    #[test]
    fn test_load_gzip_preferred() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPOS_FILE), "not json").unwrap();
        let gz = File::create(dir.path().join(format!("{REPOS_FILE}.gz"))).unwrap();
        let mut enc = GzEncoder::new(gz, Compression::default());
        enc.write_all(REPOS.as_bytes()).unwrap();
        enc.finish().unwrap();
        fs::write(dir.path().join(USERS_FILE), USERS).unwrap();

        let c = load_corpus(dir.path()).unwrap();
        assert!(c.repos.contains_key("acme/a"));
    }

    #[test]
    fn test_missing_field_fails_fast() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(REPOS_FILE), r#"{"acme/a": {"crawled": true}}"#).unwrap();
        fs::write(dir.path().join(USERS_FILE), "{}").unwrap();
        let err = load_corpus(dir.path()).unwrap_err();
        assert!(matches!(err, GitmapError::Snapshot { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_corpus(dir.path()).unwrap_err();
        assert!(matches!(err, GitmapError::Io { .. }));
    }

    #[test]
    fn test_write_gitmap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("gitmap.json");
        let map = GitMap {
            tree: ClusterNode::branch("github", vec![ClusterNode::leaf("acme/a")]),
            links: vec![("acme/a".into(), "acme/b".into())],
        };
        write_gitmap(&path, &map).unwrap();
        let back: GitMap = read_document(&path).unwrap();
        assert_eq!(back, map);
    }
}
