//! Keeps a stored session's access token usable for the next pass.

use savesync_core::{OAuthClient, OAuthError};
use thiserror::Error;

use crate::credentials::Credentials;

/// A token this close to expiry is renewed before use.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("access token expired and the session has no refresh token")]
    NoRefreshToken,
    #[error("access token expired and no oauth client is configured")]
    NoOAuthClient,
    #[error("token endpoint rejected the refresh: {0}")]
    Rejected(#[from] OAuthError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionToken {
    Current(Credentials),
    /// Replaced by a refresh grant; the stored session is out of date.
    Renewed(Credentials),
}

impl SessionToken {
    pub fn is_renewed(&self) -> bool {
        matches!(self, SessionToken::Renewed(_))
    }

    pub fn into_credentials(self) -> Credentials {
        match self {
            SessionToken::Current(credentials) | SessionToken::Renewed(credentials) => credentials,
        }
    }
}

/// Returns `credentials` unchanged while the access token is good, otherwise
/// trades the refresh token for a new one.
pub async fn ensure_fresh(
    credentials: Credentials,
    oauth: Option<&OAuthClient>,
    now_secs: i64,
) -> Result<SessionToken, RefreshError> {
    if !credentials.expires_within(now_secs, EXPIRY_MARGIN_SECS) {
        return Ok(SessionToken::Current(credentials));
    }
    let refresh_token = credentials
        .refresh_token
        .as_deref()
        .ok_or(RefreshError::NoRefreshToken)?;
    let oauth = oauth.ok_or(RefreshError::NoOAuthClient)?;

    let grant = oauth.refresh_token(refresh_token).await?;
    tracing::debug!(expires_in = ?grant.expires_in, "access token renewed");
    Ok(SessionToken::Renewed(credentials.renewed_with(&grant, now_secs)))
}
