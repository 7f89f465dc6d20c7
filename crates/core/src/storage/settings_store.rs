use std::path::{Path, PathBuf};

use crate::errors::CoreError;
use crate::models::settings::Settings;

/// Persistence for the dashboard selection.
pub trait SettingsStore: Send {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Settings>, CoreError>;

    fn save(&self, settings: &Settings) -> Result<(), CoreError>;
}

/// Settings stored as `settings.json`.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    /// Settings are a convenience: an unreadable file is treated as absent.
    fn load(&self) -> Result<Option<Settings>, CoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Settings>(&text) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable settings file");
                Ok(None)
            }
        }
    }

    fn save(&self, settings: &Settings) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| CoreError::Serialization(format!("Failed to serialize settings: {e}")))?;
        super::write_atomic(&self.path, json.as_bytes())
    }
}
