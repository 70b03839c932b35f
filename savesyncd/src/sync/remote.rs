use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures_util::stream::BoxStream;
use savesync_core::{DriveClient, DriveError, DriveFile, FileMetadataPatch, NewFile};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Custom object property holding the sync key.
pub const LOCAL_PATH_PROPERTY: &str = "localPath";
/// Content type of every synced object.
pub const BINARY_MIME_TYPE: &str = "application/x-binary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileEntry {
    pub id: String,
    pub name: String,
    pub sync_key: Option<String>,
    pub modified_ms: i64,
    pub size: u64,
    pub checksum: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RemotePage {
    pub files: Vec<RemoteFileEntry>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub query: String,
    pub fields: String,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewObject {
    pub parent_id: String,
    pub name: String,
    pub sync_key: String,
    pub mime_type: String,
    pub modified_ms: i64,
}

/// Remote storage scoped to the application-private space.
pub trait RemoteStorage: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn list(
        &self,
        request: &ListRequest,
    ) -> impl Future<Output = Result<RemotePage, Self::Error>> + Send;

    fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Creates an object carrying the sync key and uploads `source` as its content.
    fn create_object(
        &self,
        object: &NewObject,
        source: &Path,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send;

    /// Replaces content and modification time of an existing object.
    fn update_object(
        &self,
        id: &str,
        modified_ms: i64,
        source: &Path,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn download_object(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Vec<u8>, Self::Error>>, Self::Error>>
    + Send;
}

impl<T: RemoteStorage> RemoteStorage for Arc<T> {
    type Error = T::Error;

    fn list(
        &self,
        request: &ListRequest,
    ) -> impl Future<Output = Result<RemotePage, Self::Error>> + Send {
        (**self).list(request)
    }

    fn create_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send {
        (**self).create_folder(parent_id, name)
    }

    fn create_object(
        &self,
        object: &NewObject,
        source: &Path,
    ) -> impl Future<Output = Result<String, Self::Error>> + Send {
        (**self).create_object(object, source)
    }

    fn update_object(
        &self,
        id: &str,
        modified_ms: i64,
        source: &Path,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        (**self).update_object(id, modified_ms, source)
    }

    fn download_object(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<BoxStream<'static, Result<Vec<u8>, Self::Error>>, Self::Error>>
    + Send {
        (**self).download_object(id)
    }
}

#[derive(Debug, Error)]
pub enum DriveRemoteError {
    #[error("api error: {0}")]
    Api(#[from] DriveError),
    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("timestamp out of range: {0}")]
    TimestampRange(i64),
    #[error("timestamp formatting failed: {0}")]
    Format(#[from] time::error::Format),
}

impl RemoteStorage for DriveClient {
    type Error = DriveRemoteError;

    async fn list(&self, request: &ListRequest) -> Result<RemotePage, Self::Error> {
        let page = self
            .list_files(
                &request.query,
                &request.fields,
                request.page_token.as_deref(),
            )
            .await?;
        let files = page
            .files
            .into_iter()
            .map(remote_entry_from_drive)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RemotePage {
            files,
            next_page_token: page.next_page_token,
        })
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<String, Self::Error> {
        let created = self
            .create_file(&NewFile {
                name: name.to_string(),
                mime_type: savesync_core::FOLDER_MIME_TYPE.to_string(),
                parents: vec![parent_id.to_string()],
                ..NewFile::default()
            })
            .await?;
        Ok(created.id)
    }

    async fn create_object(
        &self,
        object: &NewObject,
        source: &Path,
    ) -> Result<String, Self::Error> {
        let created = self
            .create_file_with_content(
                &NewFile {
                    name: object.name.clone(),
                    mime_type: object.mime_type.clone(),
                    parents: vec![object.parent_id.clone()],
                    app_properties: Some(HashMap::from([(
                        LOCAL_PATH_PROPERTY.to_string(),
                        object.sync_key.clone(),
                    )])),
                    modified_time: Some(format_modified(object.modified_ms)?),
                },
                source,
            )
            .await?;
        Ok(created.id)
    }

    async fn update_object(
        &self,
        id: &str,
        modified_ms: i64,
        source: &Path,
    ) -> Result<(), Self::Error> {
        let patch = FileMetadataPatch {
            modified_time: Some(format_modified(modified_ms)?),
        };
        self.update_file_with_content(id, &patch, source, BINARY_MIME_TYPE)
            .await?;
        Ok(())
    }

    async fn download_object(
        &self,
        id: &str,
    ) -> Result<BoxStream<'static, Result<Vec<u8>, Self::Error>>, Self::Error> {
        use futures_util::{StreamExt, TryStreamExt};

        let stream = self.download(id).await?;
        Ok(stream.map_err(DriveRemoteError::from).boxed())
    }
}

fn remote_entry_from_drive(file: DriveFile) -> Result<RemoteFileEntry, DriveRemoteError> {
    let modified_ms = match file.modified_time.as_deref() {
        Some(value) => parse_modified(value)?,
        None => 0,
    };
    let sync_key = file
        .app_properties
        .and_then(|mut props| props.remove(LOCAL_PATH_PROPERTY));
    Ok(RemoteFileEntry {
        name: file.name.unwrap_or_else(|| file.id.clone()),
        id: file.id,
        sync_key,
        modified_ms,
        size: file.size.unwrap_or(0),
        checksum: file.md5_checksum,
        parent_id: file.parents.and_then(|parents| parents.into_iter().next()),
    })
}

pub fn parse_modified(value: &str) -> Result<i64, DriveRemoteError> {
    let parsed =
        OffsetDateTime::parse(value, &Rfc3339).map_err(|source| DriveRemoteError::Timestamp {
            value: value.to_string(),
            source,
        })?;
    Ok((parsed.unix_timestamp_nanos() / 1_000_000) as i64)
}

pub fn format_modified(modified_ms: i64) -> Result<String, DriveRemoteError> {
    let stamp = OffsetDateTime::from_unix_timestamp_nanos(i128::from(modified_ms) * 1_000_000)
        .map_err(|_| DriveRemoteError::TimestampRange(modified_ms))?;
    Ok(stamp.format(&Rfc3339)?)
}
