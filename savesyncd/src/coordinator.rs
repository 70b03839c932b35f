use std::sync::{Arc, LazyLock};

use anyhow::Context;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::category::{Category, CategoryRoots};
use crate::session::SessionProvider;
use crate::space::{directory_size, format_size};
use crate::state::{SyncStateStore, now_ms};
use crate::sync::engine::{CategoryReport, reconcile, summarize};
use crate::sync::provision::resolve_or_create_folder;

/// Serializes sync passes across every coordinator in the process.
static SYNC_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResult {
    pub category: Category,
    /// `Err` carries the message of a provisioning or listing failure.
    pub outcome: Result<CategoryReport, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub categories: Vec<CategoryResult>,
    pub completed_at_ms: i64,
}

impl SyncReport {
    pub fn category(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.iter().find(|c| c.category == category)
    }
}

pub struct SyncCoordinator<P> {
    session: P,
    roots: CategoryRoots,
    state: SyncStateStore,
}

impl<P: SessionProvider> SyncCoordinator<P> {
    pub fn new(session: P, roots: CategoryRoots, state: SyncStateStore) -> Self {
        Self {
            session,
            roots,
            state,
        }
    }

    pub fn session(&self) -> &P {
        &self.session
    }

    /// Runs one pass over the saves and, when asked, the state categories.
    ///
    /// Returns `Ok(None)` without touching anything when no account is signed
    /// in or the session cannot be connected. Category failures are reported,
    /// not returned.
    pub async fn sync(&self, include_auxiliary: bool) -> anyhow::Result<Option<SyncReport>> {
        let _guard = SYNC_LOCK.lock().await;

        let remote = match self.session.connect().await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                tracing::debug!("not signed in, skipping sync");
                return Ok(None);
            }
            Err(err) => {
                tracing::warn!("could not connect, skipping sync: {err:#}");
                return Ok(None);
            }
        };

        let mut report = SyncReport::default();
        for &category in Category::requested(include_auxiliary) {
            let result = self.sync_category(&remote, category).await;
            report.categories.push(result);
        }

        report.completed_at_ms = now_ms();
        self.state
            .record_sync(report.completed_at_ms)
            .context("failed to record sync time")?;
        tracing::info!(categories = report.categories.len(), "sync completed");
        Ok(Some(report))
    }

    async fn sync_category(&self, remote: &P::Remote, category: Category) -> CategoryResult {
        let name = category.remote_name();
        let root = self.roots.root(category);

        let outcome = match resolve_or_create_folder(remote, name).await {
            Ok(folder_id) => reconcile(remote, &folder_id, root)
                .await
                .map_err(|err| err.to_string()),
            Err(err) => Err(format!("could not resolve remote folder: {err}")),
        };

        match &outcome {
            Ok(report) => {
                let mut counts: Vec<_> = summarize(report).into_iter().collect();
                counts.sort();
                tracing::info!(category = name, ?counts, "category synced");
            }
            Err(err) => tracing::warn!(category = name, "category sync failed: {err}"),
        }
        CategoryResult { category, outcome }
    }

    pub fn spawn_sync(
        self: Arc<Self>,
        include_auxiliary: bool,
    ) -> JoinHandle<anyhow::Result<Option<SyncReport>>>
    where
        P: 'static,
    {
        tokio::spawn(async move { self.sync(include_auxiliary).await })
    }

    pub fn last_sync_info(&self) -> String {
        let last = match self.state.load() {
            Ok(state) => state.last_sync_ms,
            Err(err) => {
                tracing::warn!("could not read sync state: {err}");
                0
            }
        };
        format_last_sync(last)
    }

    pub fn config_info(&self) -> String {
        match self.session.account_email() {
            Some(email) => format!("Connected as {email}"),
            None => "Not connected".to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.session.is_configured()
    }

    pub async fn saves_space(&self) -> String {
        self.space_of(Category::Saves).await
    }

    pub async fn states_space(&self) -> String {
        self.space_of(Category::States).await
    }

    async fn space_of(&self, category: Category) -> String {
        let root = self.roots.root(category).to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || directory_size(&root))
            .await
            .unwrap_or_default();
        format_size(bytes)
    }
}

fn format_last_sync(last_sync_ms: i64) -> String {
    if last_sync_ms <= 0 {
        return "Never synced".to_string();
    }
    let Ok(at) = OffsetDateTime::from_unix_timestamp_nanos(last_sync_ms as i128 * 1_000_000) else {
        return "Never synced".to_string();
    };
    format!(
        "Last sync completed: {:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
