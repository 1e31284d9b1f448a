//! Duplicate and overwrite checks run before a download is queued.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::downloader::Downloader;
use crate::error::DownloadError;
use crate::history::HistoryStore;
use crate::manager::DownloadManager;
use crate::model::DownloadOptions;

/// Why the user has to confirm a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conflict {
    AlreadyDownloaded { url: String },
    FileExists { path: PathBuf },
}

impl Conflict {
    pub fn message(&self) -> String {
        match self {
            Conflict::AlreadyDownloaded { .. } => "This video has been downloaded before. Download it again?".to_string(),
            Conflict::FileExists { path } => format!("{} already exists. Overwrite it?", path.display()),
        }
    }
}

/// Request/response port used to ask the user about a conflict.
pub trait ConfirmPrompt {
    fn confirm(&mut self, conflict: &Conflict) -> bool;
}

impl<F: FnMut(&Conflict) -> bool> ConfirmPrompt for F {
    fn confirm(&mut self, conflict: &Conflict) -> bool {
        self(conflict)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Queued,
    Skipped,
}

/// A URL and options as submitted from the form.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub url: String,
    pub save_dir: PathBuf,
    pub options: DownloadOptions,
}

/// File the download is expected to produce, used for the overwrite check.
pub fn expected_target(url: &str, save_dir: &Path, history: &HistoryStore) -> PathBuf {
    let recorded = history.entries().iter().find(|e| e.url == url).map(|e| e.filename.clone());
    let filename = recorded.unwrap_or_else(|| sanitize_filename::sanitize(url));
    save_dir.join(filename)
}

/// A validated submission waiting for at most one user decision.
#[derive(Debug)]
pub struct Submission {
    request: DownloadRequest,
    target: PathBuf,
    conflict: Option<Conflict>,
}

impl Submission {
    /// Validates the request and looks for conflicts. Nothing is changed yet.
    pub fn begin(mut request: DownloadRequest, history: &HistoryStore) -> Result<Self, DownloadError> {
        request.url = request.url.trim().to_string();
        if request.url.is_empty() {
            return Err(DownloadError::EmptyUrl);
        }
        let target = expected_target(&request.url, &request.save_dir, history);
        let conflict = if !history.search(&request.url).is_empty() {
            Some(Conflict::AlreadyDownloaded { url: request.url.clone() })
        } else if target.exists() {
            Some(Conflict::FileExists { path: target.clone() })
        } else {
            None
        };
        Ok(Self { request, target, conflict })
    }

    pub fn question(&self) -> Option<&Conflict> {
        self.conflict.as_ref()
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    /// Applies the decision. `accepted` is ignored when there was no conflict.
    pub fn finish<D: Downloader>(
        self,
        accepted: bool,
        history: &mut HistoryStore,
        manager: &mut DownloadManager<D>,
    ) -> Result<Verdict, DownloadError> {
        if self.conflict.is_some() && !accepted {
            info!(url = %self.request.url, "duplicate download skipped");
            return Ok(Verdict::Skipped);
        }
        resolve_overwrite(&self.request.url, &self.target, history);
        let DownloadRequest { url, save_dir, options } = self.request;
        manager.add_download(&url, save_dir, options)?;
        Ok(Verdict::Queued)
    }

    /// Asks `prompt` if needed, then finishes; blocks only as long as the prompt does.
    pub fn run<D: Downloader, P: ConfirmPrompt>(
        self,
        prompt: &mut P,
        history: &mut HistoryStore,
        manager: &mut DownloadManager<D>,
    ) -> Result<Verdict, DownloadError> {
        let accepted = match &self.conflict {
            Some(conflict) => prompt.confirm(conflict),
            None => true,
        };
        self.finish(accepted, history, manager)
    }
}

/// Forgets earlier downloads of `url` and removes files the new download would replace.
///
/// History entries are dropped by keyword match, but only files recorded for exactly
/// `url` (and the target itself) are deleted.
pub fn resolve_overwrite(url: &str, target: &Path, history: &mut HistoryStore) {
    let removed = history.remove_matching(url);
    let mut stale = vec![target.to_path_buf()];
    for path in removed.iter().filter(|e| e.url == url).map(|e| e.file_path()) {
        if !stale.contains(&path) {
            stale.push(path);
        }
    }

    for path in stale {
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "removed existing file"),
            Err(e) => warn!(path = %path.display(), "could not delete existing file: {}", e),
        }
    }
}
