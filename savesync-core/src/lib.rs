mod client;
mod oauth;

pub use client::{
    APP_DATA_SPACE, About, ApiErrorClass, DriveClient, DriveError, DriveFile, DriveUser,
    FileList, FileMetadataPatch, FOLDER_MIME_TYPE, NewFile,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
