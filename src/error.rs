use std::io;

use thiserror::Error;

/// Errors raised while submitting or starting a download.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The URL field was empty (or whitespace only).
    #[error("please enter a URL")]
    EmptyUrl,
    /// No yt-dlp binary on the configured path, the search path or in the bundled assets.
    #[error("yt-dlp was not found; install it or place it next to the application")]
    ToolMissing,
    /// The yt-dlp process could not be launched.
    #[error("failed to start yt-dlp: {0}")]
    Spawn(#[source] io::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the JSON-backed stores (history and settings).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
