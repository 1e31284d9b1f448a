use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::model::DownloadOptions;

pub const MAX_ENTRIES: usize = 1000;
pub const RECENT_LIMIT: usize = 100;

pub const STATUS_COMPLETED: &str = "completed";

fn default_status() -> String {
    STATUS_COMPLETED.to_string()
}

/// One finished download as stored in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub url: String,
    pub filename: String,
    pub save_path: PathBuf,
    #[serde(default)]
    pub options: DownloadOptions,
    pub timestamp: NaiveDateTime,
    /// Kept as free text so entries written by other tools survive a rewrite
    #[serde(default = "default_status")]
    pub status: String,
}

impl HistoryEntry {
    pub fn new(url: &str, filename: &str, save_path: &Path, options: DownloadOptions) -> Self {
        Self {
            url: url.to_string(),
            filename: filename.to_string(),
            save_path: save_path.to_path_buf(),
            options,
            timestamp: Local::now().naive_local(),
            status: default_status(),
        }
    }

    /// Case-insensitive substring match against the URL and the file name.
    pub fn matches(&self, keyword_lower: &str) -> bool {
        self.url.to_lowercase().contains(keyword_lower) || self.filename.to_lowercase().contains(keyword_lower)
    }

    pub fn file_path(&self) -> PathBuf {
        self.save_path.join(&self.filename)
    }
}

/// Newest-first list of completed downloads mirrored to a JSON file.
///
/// Best effort: read and write failures are logged and never reach the caller.
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
}

impl HistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), "could not load history, starting empty: {}", e);
                Vec::new()
            }
        };
        info!(path = %path.display(), count = entries.len(), "history loaded");
        Self { path, entries }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_entry(&mut self, url: &str, filename: &str, save_path: &Path, options: DownloadOptions) {
        self.entries.insert(0, HistoryEntry::new(url, filename, save_path, options));
        self.entries.truncate(MAX_ENTRIES);
        self.save();
    }

    pub fn recent(&self, limit: usize) -> &[HistoryEntry] {
        &self.entries[..limit.min(self.entries.len())]
    }

    pub fn search(&self, keyword: &str) -> Vec<&HistoryEntry> {
        let keyword = keyword.to_lowercase();
        self.entries.iter().filter(|e| e.matches(&keyword)).collect()
    }

    /// Drops every entry `search(keyword)` would return and hands them back.
    pub fn remove_matching(&mut self, keyword: &str) -> Vec<HistoryEntry> {
        let keyword = keyword.to_lowercase();
        let (removed, kept): (Vec<_>, Vec<_>) = self.entries.drain(..).partition(|e| e.matches(&keyword));
        self.entries = kept;
        if !removed.is_empty() {
            self.save();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.save();
    }

    pub fn save(&self) {
        if let Err(e) = write_entries(&self.path, &self.entries) {
            error!(path = %self.path.display(), "could not save history: {}", e);
        }
    }
}

fn read_entries(path: &Path) -> Result<Vec<HistoryEntry>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    let raw: Vec<serde_json::Value> = match serde_json::from_str(&content) {
        Ok(raw) => raw,
        Err(e) => {
            backup(path);
            return Err(e.into());
        }
    };

    let total = raw.len();
    let entries: Vec<HistoryEntry> = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), "skipping unreadable history entry: {}", e);
                None
            }
        })
        .collect();
    if entries.len() < total {
        backup(path);
    }
    Ok(entries)
}

/// Copies the file aside before it gets rewritten without the parts we could not read.
fn backup(path: &Path) {
    let bak = path.with_extension("json.bak");
    match fs::copy(path, &bak) {
        Ok(_) => info!(backup = %bak.display(), "kept a copy of the history file"),
        Err(e) => warn!(backup = %bak.display(), "could not back up history file: {}", e),
    }
}

fn write_entries(path: &Path, entries: &[HistoryEntry]) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(entries)?;
    fs::write(path, content)?;
    Ok(())
}
