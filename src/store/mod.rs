//! Flat-JSON persistence for model state and team performance stats.
//!
//! Two files, loaded at startup and written back after any mutating command.
//! A missing file is not an error (first run starts fresh); anything else
//! surfaces as a [`StoreError`] so the call site can state its fallback
//! policy explicitly.

pub mod models;

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use models::{ModelState, TeamStatsFile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handle on the two state files.
#[derive(Debug, Clone)]
pub struct JsonStore {
    predictions_path: PathBuf,
    team_stats_path: PathBuf,
}

impl JsonStore {
    pub fn new(predictions_path: impl Into<PathBuf>, team_stats_path: impl Into<PathBuf>) -> Self {
        JsonStore {
            predictions_path: predictions_path.into(),
            team_stats_path: team_stats_path.into(),
        }
    }

    pub fn load_model(&self) -> Result<ModelState, StoreError> {
        load_json(&self.predictions_path)
    }

    pub fn save_model(&self, state: &ModelState) -> Result<(), StoreError> {
        save_json(&self.predictions_path, state)
    }

    pub fn load_team_stats(&self) -> Result<TeamStatsFile, StoreError> {
        load_json(&self.team_stats_path)
    }

    pub fn save_team_stats(&self, stats: &TeamStatsFile) -> Result<(), StoreError> {
        save_json(&self.team_stats_path, stats)
    }
}

fn load_json<T: DeserializeOwned + Default>(path: &Path) -> Result<T, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No state file at {}, starting fresh", path.display());
            return Ok(T::default());
        }
        Err(e) => {
            return Err(StoreError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };
    let value = serde_json::from_str(&text).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!("Loaded state from {}", path.display());
    Ok(value)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    fs::write(path, text).map_err(|e| StoreError::Write {
        path: path.display().to_string(),
        source: e,
    })?;
    debug!("Saved state to {}", path.display());
    Ok(())
}
