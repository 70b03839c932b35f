use savesync_core::{APP_DATA_SPACE, FOLDER_MIME_TYPE};

use super::catalog::escape_query_value;
use super::remote::{ListRequest, RemoteStorage};

pub fn folder_lookup_query(name: &str) -> String {
    format!(
        "name = '{}' and mimeType = '{FOLDER_MIME_TYPE}'",
        escape_query_value(name)
    )
}

/// Returns the id of the app-private folder called `name`, creating it when absent.
///
/// If the backend holds several folders with that name the first one listed is used.
pub async fn resolve_or_create_folder<R: RemoteStorage>(
    remote: &R,
    name: &str,
) -> Result<String, R::Error> {
    let page = remote
        .list(&ListRequest {
            query: folder_lookup_query(name),
            fields: "files(id)".to_string(),
            page_token: None,
        })
        .await?;
    if let Some(existing) = page.files.into_iter().next() {
        tracing::debug!(folder = name, id = %existing.id, "using existing remote folder");
        return Ok(existing.id);
    }

    let id = remote.create_folder(APP_DATA_SPACE, name).await?;
    tracing::info!(folder = name, %id, "created remote folder");
    Ok(id)
}
