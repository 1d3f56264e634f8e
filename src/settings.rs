//! Persisted board settings.
//!
//! A single JSON record, `{"deviceIds": "1, 5, 20"}`, read once at startup
//! and written only when the user explicitly saves.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::AllowList;
use crate::error::SettingsError;

// ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSettings {
    /// Comma-separated device ids; empty shows every device.
    #[serde(default)]
    pub device_ids: String,
}

impl BoardSettings {
    pub fn allow_list(&self) -> AllowList {
        AllowList::parse(&self.device_ids)
    }
}

/// File-backed store for [`BoardSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved settings.
    ///
    /// A missing file yields defaults. A corrupt file is logged and also
    /// yields defaults, so a bad record never blocks the board from starting.
    pub fn load(&self) -> Result<BoardSettings, SettingsError> {
        // ---
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No saved settings at {}, using defaults", self.path.display());
                return Ok(BoardSettings::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str::<BoardSettings>(&raw) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Failed to parse settings {}: {}", self.path.display(), e);
                Ok(BoardSettings::default())
            }
        }
    }

    /// Persist `settings`, replacing the previous record.
    pub fn save(&self, settings: &BoardSettings) -> Result<(), SettingsError> {
        // ---
        let encoded = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, encoded).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        info!("Saved settings to {}", self.path.display());
        Ok(())
    }
}
