/// Workbench configuration file
use collaboration::{AutosaveConfig, BackendConfig, RetryPolicy};
use editor::EditorConfig;
use panes::SyncConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{Result, WorkbenchError};

/// Environment variable overriding `backend.api_url`.
pub const API_URL_ENV: &str = "WORKBENCH_API_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub backend: BackendConfig,
    pub retry: RetryPolicy,
    pub autosave: AutosaveConfig,
    pub editor: EditorConfig,
    pub sync: SyncConfig,
}

impl WorkbenchConfig {
    /// `~/.config/translation-workbench/config.json` or the platform
    /// equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("translation-workbench").join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.api_url.trim().is_empty() {
            return Err(WorkbenchError::Config("backend.api_url is empty".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(WorkbenchError::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.editor.max_table_rows == 0 || self.editor.max_table_cols == 0 {
            return Err(WorkbenchError::Config("table limits must be positive".into()));
        }
        Ok(())
    }

    /// Applies [`API_URL_ENV`] when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.api_url = url;
            }
        }
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_autosave(mut self, autosave: AutosaveConfig) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn with_editor(mut self, editor: EditorConfig) -> Self {
        self.editor = editor;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}
