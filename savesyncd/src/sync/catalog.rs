use futures_util::stream::{self, Stream, StreamExt, TryStreamExt};

use super::remote::{BINARY_MIME_TYPE, ListRequest, RemoteFileEntry, RemoteStorage};

pub const FOLDER_LIST_FIELDS: &str =
    "nextPageToken, files(id, name, size, appProperties, modifiedTime, parents, md5Checksum)";

enum Cursor {
    Start,
    Next(String),
    Done,
}

pub fn folder_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed = false and mimeType = '{BINARY_MIME_TYPE}'",
        escape_query_value(folder_id)
    )
}

/// Escapes a value for use inside a single-quoted Drive query literal.
pub fn escape_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Lists every synced object directly under `folder_id`.
///
/// Pages are fetched on demand: the next request goes out only once the
/// consumer has drained the current batch. A failed page is yielded as an
/// error and ends the stream.
pub fn list_folder<'a, R: RemoteStorage>(
    remote: &'a R,
    folder_id: &'a str,
) -> impl Stream<Item = Result<RemoteFileEntry, R::Error>> + Send + 'a {
    let query = folder_query(folder_id);
    stream::try_unfold(Cursor::Start, move |cursor| {
        let query = query.clone();
        async move {
            let page_token = match cursor {
                Cursor::Done => return Ok(None),
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };
            let page = remote
                .list(&ListRequest {
                    query,
                    fields: FOLDER_LIST_FIELDS.to_string(),
                    page_token,
                })
                .await?;
            let next = match page.next_page_token {
                Some(token) if !token.is_empty() => Cursor::Next(token),
                _ => Cursor::Done,
            };
            Ok::<_, R::Error>(Some((page.files, next)))
        }
    })
    .map_ok(|files| stream::iter(files.into_iter().map(Ok::<_, R::Error>)))
    .try_flatten()
    .boxed()
}
