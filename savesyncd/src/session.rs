use std::future::Future;
use std::sync::Mutex;

use anyhow::Context;
use savesync_core::{DriveClient, OAuthClient};

use crate::config::SyncConfig;
use crate::credentials::{Credentials, CredentialsStore};
use crate::refresh::ensure_fresh;
use crate::state::now_ms;
use crate::sync::remote::RemoteStorage;

/// Source of an authenticated remote for one sync pass.
pub trait SessionProvider: Send + Sync {
    type Remote: RemoteStorage;

    /// `Ok(None)` when no account is signed in.
    fn connect(&self) -> impl Future<Output = anyhow::Result<Option<Self::Remote>>> + Send;

    fn account_email(&self) -> Option<String>;

    fn is_configured(&self) -> bool;
}

pub struct DriveSession {
    store: CredentialsStore,
    env_token: Option<String>,
    api_base_url: Option<String>,
    oauth_client: Option<OAuthClient>,
    email: Mutex<Option<String>>,
}

impl DriveSession {
    pub fn new(
        store: CredentialsStore,
        env_token: Option<String>,
        api_base_url: Option<String>,
        oauth_client: Option<OAuthClient>,
    ) -> Self {
        Self {
            store,
            env_token,
            api_base_url,
            oauth_client,
            email: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SyncConfig) -> anyhow::Result<Self> {
        let oauth_client = match (&config.client_id, &config.client_secret) {
            (Some(id), Some(secret)) => Some(
                OAuthClient::new(id.clone(), secret.clone())
                    .context("failed to build oauth client")?,
            ),
            _ => None,
        };
        Ok(Self::new(
            CredentialsStore::new(&config.credentials_file),
            config.access_token.clone(),
            config.api_base_url.clone(),
            oauth_client,
        ))
    }

    pub fn store(&self) -> &CredentialsStore {
        &self.store
    }

    fn client(&self, token: String) -> anyhow::Result<DriveClient> {
        let client = match &self.api_base_url {
            Some(base) => DriveClient::with_base_url(base, token),
            None => DriveClient::new(token),
        };
        client.context("failed to build drive client")
    }

    fn remember_email(&self, email: Option<String>) {
        if let Ok(mut cached) = self.email.lock() {
            *cached = email;
        }
    }

    async fn lookup_email(&self, client: &DriveClient) -> Option<String> {
        match client.about().await {
            Ok(about) => about.user.email_address,
            Err(err) => {
                tracing::warn!("could not look up account email: {err}");
                None
            }
        }
    }

    async fn connect_stored(&self, credentials: Credentials) -> anyhow::Result<DriveClient> {
        let token = ensure_fresh(credentials, self.oauth_client.as_ref(), now_ms() / 1000)
            .await
            .context("failed to obtain access token")?;
        let mut dirty = token.is_renewed();
        let mut credentials = token.into_credentials();
        let client = self.client(credentials.access_token.clone())?;

        if credentials.email.is_none() {
            credentials.email = self.lookup_email(&client).await;
            dirty |= credentials.email.is_some();
        }
        if dirty {
            self.store
                .save(&credentials)
                .context("failed to persist refreshed credentials")?;
        }
        self.remember_email(credentials.email);
        Ok(client)
    }
}

impl SessionProvider for DriveSession {
    type Remote = DriveClient;

    async fn connect(&self) -> anyhow::Result<Option<DriveClient>> {
        if let Some(token) = &self.env_token {
            let client = self.client(token.clone())?;
            let email = self.lookup_email(&client).await;
            self.remember_email(email);
            return Ok(Some(client));
        }

        let Some(credentials) = self.store.load().context("failed to read credentials")? else {
            tracing::debug!("no stored credentials");
            return Ok(None);
        };
        self.connect_stored(credentials).await.map(Some)
    }

    fn account_email(&self) -> Option<String> {
        if let Some(email) = self.email.lock().ok().and_then(|cached| cached.clone()) {
            return Some(email);
        }
        self.store
            .load()
            .ok()
            .flatten()
            .and_then(|credentials| credentials.email)
    }

    fn is_configured(&self) -> bool {
        self.env_token.is_some() || self.store.exists()
    }
}
