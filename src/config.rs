use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::model::DownloadOptions;
use crate::queue::DEFAULT_CAPACITY;

pub const CONFIG_FILE: &str = "settings.json";

/// User settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub download_dir: PathBuf,
    /// Simultaneous downloads; fixed for the lifetime of the process
    pub max_concurrent: usize,
    pub history_file: PathBuf,
    /// Explicit yt-dlp binary, otherwise searched on PATH
    pub ytdlp_path: Option<PathBuf>,
    pub dark_mode: bool,
    pub show_thumbnails: bool,
    /// Form state of the last download
    pub options: DownloadOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from("./downloads")),
            max_concurrent: DEFAULT_CAPACITY,
            history_file: PathBuf::from("download_history.json"),
            ytdlp_path: None,
            dark_mode: true,
            show_thumbnails: true,
            options: DownloadOptions::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`; a missing or broken file yields the defaults.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), "settings loaded");
                config
            }
            Ok(None) => Self::default(),
            Err(e) => {
                warn!(path = %path.display(), "ignoring unreadable settings: {}", e);
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) {
        let result = serde_json::to_string_pretty(self)
            .map_err(StoreError::from)
            .and_then(|content| fs::write(path, content).map_err(StoreError::from));
        if let Err(e) = result {
            error!(path = %path.display(), "could not save settings: {}", e);
        }
    }
}
