use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::Path;

use thiserror::Error;

use super::catalog::list_folder;
use super::decision::{Comparison, SyncAction, compare, decide};
use super::fingerprint::fingerprint;
use super::index::{LocalFileEntry, SyncKey, build_local_index, build_remote_index};
use super::paths::{PathError, local_path_for};
use super::remote::{BINARY_MIME_TYPE, NewObject, RemoteFileEntry, RemoteStorage};
use super::transfer::{TransferError, set_modified_ms, write_stream_to_path};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("remote error: {0}")]
    Remote(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("path error: {0}")]
    Path(#[from] PathError),
    #[error("download integrity check failed: expected {expected_md5}, got {actual_md5}")]
    IntegrityMismatch {
        expected_md5: String,
        actual_md5: String,
    },
    #[error("local indexing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl EngineError {
    pub fn remote(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EngineError::Remote(Box::new(err))
    }
}

impl<E> From<TransferError<E>> for EngineError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: TransferError<E>) -> Self {
        match err {
            TransferError::Stream(err) => EngineError::remote(err),
            TransferError::Io(err) => EngineError::Io(err),
            TransferError::IntegrityMismatch {
                expected_md5,
                actual_md5,
            } => EngineError::IntegrityMismatch {
                expected_md5,
                actual_md5,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// The action ran and its transfer completed.
    Applied,
    /// Nothing to do for this key.
    Unchanged,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyOutcome {
    pub key: SyncKey,
    /// `None` when the decision itself could not be made.
    pub action: Option<SyncAction>,
    pub status: ActionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub outcomes: Vec<KeyOutcome>,
}

impl CategoryReport {
    pub fn applied(&self, action: SyncAction) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.action == Some(action) && o.status == ActionStatus::Applied)
            .count()
    }

    pub fn transfers(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ActionStatus::Applied)
            .count()
    }

    pub fn unchanged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == ActionStatus::Unchanged)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ActionStatus::Skipped(_)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &KeyOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ActionStatus::Failed(_)))
    }

    pub fn outcome(&self, key: &str) -> Option<&KeyOutcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }
}

/// Reconciles one remote folder with one local directory.
pub struct Reconciler<'a, R> {
    remote: &'a R,
    folder_id: &'a str,
    local_root: &'a Path,
}

pub async fn reconcile<R: RemoteStorage>(
    remote: &R,
    folder_id: &str,
    local_root: &Path,
) -> Result<CategoryReport, EngineError> {
    Reconciler::new(remote, folder_id, local_root).run().await
}

impl<'a, R: RemoteStorage> Reconciler<'a, R> {
    pub fn new(remote: &'a R, folder_id: &'a str, local_root: &'a Path) -> Self {
        Self {
            remote,
            folder_id,
            local_root,
        }
    }

    /// Builds both indexes, then settles every key in their union.
    ///
    /// Only index construction can fail the pass; per-key failures end up in
    /// the report.
    pub async fn run(&self) -> Result<CategoryReport, EngineError> {
        let remote_index = build_remote_index(list_folder(self.remote, self.folder_id))
            .await
            .map_err(EngineError::remote)?;
        let root = self.local_root.to_path_buf();
        let local_index = tokio::task::spawn_blocking(move || build_local_index(&root)).await??;

        let keys: BTreeSet<&SyncKey> = remote_index.keys().chain(local_index.keys()).collect();
        tracing::debug!(
            folder = self.folder_id,
            local = local_index.len(),
            remote = remote_index.len(),
            keys = keys.len(),
            "reconciling folder"
        );

        let mut report = CategoryReport::default();
        for key in keys {
            let outcome = self
                .handle_key(key, local_index.get(key), remote_index.get(key))
                .await;
            report.outcomes.push(outcome);
        }
        Ok(report)
    }

    async fn handle_key(
        &self,
        key: &str,
        local: Option<&LocalFileEntry>,
        remote: Option<&RemoteFileEntry>,
    ) -> KeyOutcome {
        tracing::debug!(
            key,
            local_ms = local.map(|l| l.modified_ms),
            remote_ms = remote.map(|r| r.modified_ms),
            "handling file pair"
        );

        let action = match self.plan(local, remote).await {
            Ok(action) => action,
            Err(err) => {
                tracing::warn!(key, "could not compare copies: {err}");
                return KeyOutcome {
                    key: key.to_string(),
                    action: None,
                    status: ActionStatus::Failed(err.to_string()),
                };
            }
        };

        let status = match self.apply(action, key, local, remote).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(key, action = action.as_str(), "sync action failed: {err}");
                ActionStatus::Failed(err.to_string())
            }
        };
        KeyOutcome {
            key: key.to_string(),
            action: Some(action),
            status,
        }
    }

    async fn plan(
        &self,
        local: Option<&LocalFileEntry>,
        remote: Option<&RemoteFileEntry>,
    ) -> Result<SyncAction, EngineError> {
        let digest = match (compare(local, remote), local) {
            (Comparison::NeedsFingerprint, Some(local)) => Some(fingerprint(&local.path).await?),
            _ => None,
        };
        Ok(decide(local, remote, digest.as_deref()))
    }

    async fn apply(
        &self,
        action: SyncAction,
        key: &str,
        local: Option<&LocalFileEntry>,
        remote: Option<&RemoteFileEntry>,
    ) -> Result<ActionStatus, EngineError> {
        match (action, local, remote) {
            (SyncAction::NoOp, _, _) => Ok(ActionStatus::Unchanged),
            (SyncAction::UploadNew, Some(local), _) => {
                tracing::info!(key, "local-only file, uploading");
                self.upload_new(key, local).await
            }
            (SyncAction::UploadUpdate, Some(local), Some(remote)) => {
                tracing::info!(key, "local copy is newer, updating remote");
                self.remote
                    .update_object(&remote.id, local.modified_ms, &local.path)
                    .await
                    .map_err(EngineError::remote)?;
                Ok(ActionStatus::Applied)
            }
            (SyncAction::DownloadNew, _, Some(remote)) => {
                tracing::info!(key, "remote-only file, downloading");
                let target = local_path_for(self.local_root, key)?;
                self.download_to(remote, &target).await
            }
            (SyncAction::DownloadUpdate, Some(local), Some(remote)) => {
                tracing::info!(key, "remote copy is newer, downloading");
                self.download_to(remote, &local.path).await
            }
            _ => Ok(ActionStatus::Unchanged),
        }
    }

    async fn upload_new(
        &self,
        key: &str,
        local: &LocalFileEntry,
    ) -> Result<ActionStatus, EngineError> {
        let name = local
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| key.to_string());
        let object = NewObject {
            parent_id: self.folder_id.to_string(),
            name,
            sync_key: key.to_string(),
            mime_type: BINARY_MIME_TYPE.to_string(),
            modified_ms: local.modified_ms,
        };
        self.remote
            .create_object(&object, &local.path)
            .await
            .map_err(EngineError::remote)?;
        Ok(ActionStatus::Applied)
    }

    async fn download_to(
        &self,
        remote: &RemoteFileEntry,
        target: &Path,
    ) -> Result<ActionStatus, EngineError> {
        if remote.size == 0 {
            tracing::debug!(id = %remote.id, "remote object is empty, not downloading");
            return Ok(ActionStatus::Skipped("remote object is empty".to_string()));
        }
        tracing::debug!(target = %target.display(), "downloading");
        let body = self
            .remote
            .download_object(&remote.id)
            .await
            .map_err(EngineError::remote)?;
        write_stream_to_path(body, target, remote.checksum.as_deref()).await?;
        set_modified_ms(target, remote.modified_ms)?;
        Ok(ActionStatus::Applied)
    }
}

/// Count of outcomes by action, for log summaries.
pub fn summarize(report: &CategoryReport) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for outcome in &report.outcomes {
        let label = match (&outcome.action, &outcome.status) {
            (_, ActionStatus::Failed(_)) => "failed",
            (_, ActionStatus::Skipped(_)) => "skipped",
            (_, ActionStatus::Unchanged) => "unchanged",
            (Some(action), ActionStatus::Applied) => action.as_str(),
            (None, ActionStatus::Applied) => "unknown",
        };
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
