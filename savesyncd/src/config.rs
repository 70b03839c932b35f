use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::category::{Category, CategoryRoots};

const APP_DIR_NAME: &str = "savesync";
const STATE_FILE_NAME: &str = "state.json";
const CREDENTIALS_FILE_NAME: &str = "credentials.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    pub roots: CategoryRoots,
    pub state_file: PathBuf,
    pub credentials_file: PathBuf,
    pub include_states: bool,
    pub api_base_url: Option<String>,
    pub access_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let home = dirs::home_dir().context("home directory is unavailable")?;
        let data_dir = dirs::data_dir().unwrap_or_else(|| home.join(".local/share"));
        let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        Ok(Self::from_lookup(&home, &data_dir, &config_dir, |name| {
            std::env::var(name).ok()
        }))
    }

    pub fn from_lookup<F>(home: &Path, data_dir: &Path, config_dir: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path_var = |name: &str| lookup(name).map(|value| expand_with_home(&value, home));

        let base = path_var("SAVESYNC_ROOT").unwrap_or_else(|| data_dir.join(APP_DIR_NAME));
        let defaults = CategoryRoots::under(&base);
        let roots = CategoryRoots {
            saves: path_var("SAVESYNC_SAVES_DIR").unwrap_or(defaults.saves),
            states: path_var("SAVESYNC_STATES_DIR").unwrap_or(defaults.states),
            state_previews: path_var("SAVESYNC_STATE_PREVIEWS_DIR")
                .unwrap_or(defaults.state_previews),
        };
        let app_config = config_dir.join(APP_DIR_NAME);

        Self {
            roots,
            state_file: path_var("SAVESYNC_STATE_FILE")
                .unwrap_or_else(|| app_config.join(STATE_FILE_NAME)),
            credentials_file: path_var("SAVESYNC_CREDENTIALS_FILE")
                .unwrap_or_else(|| app_config.join(CREDENTIALS_FILE_NAME)),
            include_states: lookup("SAVESYNC_INCLUDE_STATES")
                .map(|value| parse_bool(&value))
                .unwrap_or(false),
            api_base_url: non_empty(lookup("SAVESYNC_API_URL")),
            access_token: non_empty(lookup("SAVESYNC_TOKEN")),
            client_id: non_empty(lookup("SAVESYNC_CLIENT_ID")),
            client_secret: non_empty(lookup("SAVESYNC_CLIENT_SECRET")),
        }
    }

    pub fn root(&self, category: Category) -> &Path {
        self.roots.root(category)
    }
}

fn expand_with_home(value: &str, home: &Path) -> PathBuf {
    if value == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = value.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(value)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
