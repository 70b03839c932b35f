use super::index::LocalFileEntry;
use super::remote::RemoteFileEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    NoOp,
    UploadNew,
    DownloadNew,
    UploadUpdate,
    DownloadUpdate,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::NoOp => "no-op",
            SyncAction::UploadNew => "upload-new",
            SyncAction::DownloadNew => "download-new",
            SyncAction::UploadUpdate => "upload-update",
            SyncAction::DownloadUpdate => "download-update",
        }
    }
}

/// What can be said about a key from metadata alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    LocalOnly,
    RemoteOnly,
    Identical,
    Divergent,
    /// Timestamps differ but sizes match; only the content hash can tell.
    NeedsFingerprint,
}

pub fn compare(local: Option<&LocalFileEntry>, remote: Option<&RemoteFileEntry>) -> Comparison {
    match (local, remote) {
        (None, None) => Comparison::Identical,
        (Some(_), None) => Comparison::LocalOnly,
        (None, Some(_)) => Comparison::RemoteOnly,
        (Some(local), Some(remote)) => {
            if local.modified_ms == remote.modified_ms {
                Comparison::Identical
            } else if local.size != remote.size {
                Comparison::Divergent
            } else {
                Comparison::NeedsFingerprint
            }
        }
    }
}

/// Content equality once the local file has been hashed. A missing remote
/// checksum never counts as a match.
pub fn content_matches(local_digest: &str, remote_checksum: Option<&str>) -> bool {
    remote_checksum.is_some_and(|remote| remote.eq_ignore_ascii_case(local_digest))
}

/// Last-writer-wins between two diverged copies.
pub fn resolve_divergent(local_ms: i64, remote_ms: i64) -> SyncAction {
    match local_ms.cmp(&remote_ms) {
        std::cmp::Ordering::Greater => SyncAction::UploadUpdate,
        std::cmp::Ordering::Less => SyncAction::DownloadUpdate,
        std::cmp::Ordering::Equal => SyncAction::NoOp,
    }
}

/// Full decision for a key. `local_digest` is consulted only for
/// [`Comparison::NeedsFingerprint`].
pub fn decide(
    local: Option<&LocalFileEntry>,
    remote: Option<&RemoteFileEntry>,
    local_digest: Option<&str>,
) -> SyncAction {
    match compare(local, remote) {
        Comparison::Identical => SyncAction::NoOp,
        Comparison::LocalOnly => SyncAction::UploadNew,
        Comparison::RemoteOnly => SyncAction::DownloadNew,
        Comparison::Divergent => divergent(local, remote),
        Comparison::NeedsFingerprint => {
            let checksum = remote.and_then(|r| r.checksum.as_deref());
            match local_digest {
                Some(digest) if content_matches(digest, checksum) => SyncAction::NoOp,
                _ => divergent(local, remote),
            }
        }
    }
}

fn divergent(local: Option<&LocalFileEntry>, remote: Option<&RemoteFileEntry>) -> SyncAction {
    match (local, remote) {
        (Some(local), Some(remote)) => resolve_divergent(local.modified_ms, remote.modified_ms),
        _ => SyncAction::NoOp,
    }
}
