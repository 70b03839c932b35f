use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use futures_util::{Stream, TryStreamExt};
use walkdir::WalkDir;

use super::paths::sync_key_for;
use super::remote::RemoteFileEntry;
use super::transfer::is_partial;

pub type SyncKey = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileEntry {
    pub key: SyncKey,
    pub path: PathBuf,
    pub modified_ms: i64,
    pub size: u64,
}

/// Collects a remote listing into a key→entry map.
///
/// Entries without a sync key are not managed by us and are dropped. When the
/// backend returns the same key twice the later entry wins.
pub async fn build_remote_index<S, E>(entries: S) -> Result<HashMap<SyncKey, RemoteFileEntry>, E>
where
    S: Stream<Item = Result<RemoteFileEntry, E>>,
{
    let mut entries = std::pin::pin!(entries);
    let mut index = HashMap::new();
    while let Some(entry) = entries.try_next().await? {
        if let Some(key) = entry.sync_key.clone() {
            index.insert(key, entry);
        }
    }
    Ok(index)
}

/// Walks `root` bottom-up and indexes every non-empty regular file by its
/// POSIX path relative to `root`. Leftover `.partial` downloads are skipped.
/// A missing root is an empty index.
pub fn build_local_index(root: &Path) -> io::Result<HashMap<SyncKey, LocalFileEntry>> {
    let mut index = HashMap::new();
    if !root.exists() {
        return Ok(index);
    }

    for entry in WalkDir::new(root).contents_first(true) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() || is_partial(entry.path()) {
            continue;
        }
        let meta = entry.metadata().map_err(io::Error::from)?;
        if meta.len() == 0 {
            continue;
        }
        let key = match sync_key_for(root, entry.path()) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(path = %entry.path().display(), "skipping local file: {err}");
                continue;
            }
        };
        index.insert(
            key.clone(),
            LocalFileEntry {
                key,
                path: entry.into_path(),
                modified_ms: modified_ms(&meta),
                size: meta.len(),
            },
        );
    }
    Ok(index)
}

pub fn modified_ms(meta: &std::fs::Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
