use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use savesync_core::OAuthToken;

use crate::state::{StateError, read_json, write_json_atomic};

/// Stored account session for the cloud backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds; `None` means the token never expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
}

impl Credentials {
    pub fn from_oauth_token(token: &OAuthToken, now_secs: i64) -> Self {
        Self {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token
                .expires_in
                .map(|secs| now_secs.saturating_add(secs as i64)),
            email: None,
        }
    }

    /// Whether the access token expires within `margin_secs` of `now_secs`.
    pub fn expires_within(&self, now_secs: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now_secs.saturating_add(margin_secs))
    }

    /// The session after a refresh grant. A grant that omits the refresh token
    /// keeps the current one; the account email carries over.
    pub fn renewed_with(&self, grant: &OAuthToken, now_secs: i64) -> Self {
        let mut renewed = Self::from_oauth_token(grant, now_secs);
        if renewed.refresh_token.is_none() {
            renewed.refresh_token = self.refresh_token.clone();
        }
        renewed.email = self.email.clone();
        renewed
    }
}

#[derive(Debug, Clone)]
pub struct CredentialsStore {
    path: PathBuf,
}

impl CredentialsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Option<Credentials>, StateError> {
        read_json(&self.path)
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), StateError> {
        write_json_atomic(&self.path, credentials, true)
    }

    /// Removes the stored session. Returns whether anything was removed.
    pub fn delete(&self) -> Result<bool, StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
