use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use futures_util::{Stream, StreamExt};
use md5::Context;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum TransferError<E: std::error::Error + 'static> {
    #[error("stream failed: {0}")]
    Stream(#[source] E),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("download integrity check failed: expected {expected_md5}, got {actual_md5}")]
    IntegrityMismatch {
        expected_md5: String,
        actual_md5: String,
    },
}

/// Suffix of in-flight downloads; such files are never indexed.
pub const PARTIAL_SUFFIX: &str = ".partial";

pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with(PARTIAL_SUFFIX))
}

/// Removes the partial file when dropped, unless it was renamed into place.
struct PartialFile {
    path: PathBuf,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if self.armed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Streams `chunks` into `target` through a `.partial` sibling.
///
/// The target is replaced only after the whole body arrived and, when
/// `expected_md5` is given, its digest matched. On any error, or when the
/// future is dropped mid-transfer, the partial file is removed. Returns the
/// byte count.
pub async fn write_stream_to_path<S, E>(
    chunks: S,
    target: &Path,
    expected_md5: Option<&str>,
) -> Result<u64, TransferError<E>>
where
    S: Stream<Item = Result<Vec<u8>, E>>,
    E: std::error::Error + 'static,
{
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut partial = PartialFile::new(partial_path(target));
    let mut file = tokio::fs::File::create(&partial.path).await?;
    let mut chunks = std::pin::pin!(chunks);
    let mut md5 = Context::new();
    let mut written = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(TransferError::Stream)?;
        file.write_all(&chunk).await?;
        md5.consume(&chunk);
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    if let Some(expected_md5) = expected_md5 {
        let actual_md5 = format!("{:x}", md5.compute());
        if !actual_md5.eq_ignore_ascii_case(expected_md5) {
            return Err(TransferError::IntegrityMismatch {
                expected_md5: expected_md5.to_ascii_lowercase(),
                actual_md5,
            });
        }
    }

    tokio::fs::rename(&partial.path, target).await?;
    partial.disarm();
    Ok(written)
}

pub fn set_modified_ms(path: &Path, modified_ms: i64) -> io::Result<()> {
    let secs = modified_ms.div_euclid(1000);
    let nanos = (modified_ms.rem_euclid(1000) * 1_000_000) as u32;
    filetime::set_file_mtime(path, FileTime::from_unix_time(secs, nanos))
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
