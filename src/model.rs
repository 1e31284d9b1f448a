use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Represents the current state of a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Waiting for a free slot in the queue
    Queued,
    /// yt-dlp is transferring data
    Downloading,
    /// Download has completed successfully
    Finished,
    /// yt-dlp reported a failure or could not be started
    Error,
}

impl DownloadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadStatus::Finished | DownloadStatus::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            DownloadStatus::Queued => "⏳ Queued",
            DownloadStatus::Downloading => "⬇️ Downloading",
            DownloadStatus::Finished => "✅ Done",
            DownloadStatus::Error => "❌ Error",
        }
    }
}

/// What kind of media the user wants out of the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    #[default]
    #[serde(alias = "视频")]
    Video,
    #[serde(alias = "音频")]
    Audio,
    #[serde(alias = "播放列表")]
    Playlist,
}

impl DownloadType {
    pub const ALL: [DownloadType; 3] = [DownloadType::Video, DownloadType::Audio, DownloadType::Playlist];

    pub fn label(self) -> &'static str {
        match self {
            DownloadType::Video => "Video",
            DownloadType::Audio => "Audio",
            DownloadType::Playlist => "Playlist",
        }
    }
}

/// Quality tier; each maps to a fixed yt-dlp format expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best", alias = "最佳质量")]
    Best,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "360p")]
    P360,
}

impl Quality {
    pub const ALL: [Quality; 5] = [Quality::Best, Quality::P1080, Quality::P720, Quality::P480, Quality::P360];

    pub fn label(self) -> &'static str {
        match self {
            Quality::Best => "Best",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P480 => "480p",
            Quality::P360 => "360p",
        }
    }

    /// Maximum frame height, `None` for the unrestricted tier.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Quality::Best => None,
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P480 => Some(480),
            Quality::P360 => Some(360),
        }
    }
}

/// Target container for video or codec for audio extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
    Mp3,
    M4a,
    Flac,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 6] = [
        MediaFormat::Mp4,
        MediaFormat::Mkv,
        MediaFormat::Webm,
        MediaFormat::Mp3,
        MediaFormat::M4a,
        MediaFormat::Flac,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Webm => "webm",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::M4a => "m4a",
            MediaFormat::Flac => "flac",
        }
    }

    pub fn is_audio_codec(self) -> bool {
        matches!(self, MediaFormat::Mp3 | MediaFormat::M4a | MediaFormat::Flac)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options chosen in the form; stored with every history entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadOptions {
    pub download_type: DownloadType,
    pub quality: Quality,
    pub format: MediaFormat,
    pub subtitle_enabled: bool,
    pub include_audio: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            download_type: DownloadType::Video,
            quality: Quality::Best,
            format: MediaFormat::Mp4,
            subtitle_enabled: false,
            include_audio: true,
        }
    }
}

/// A submitted download. Never mutated after it enters the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub url: String,
    pub save_dir: PathBuf,
    pub options: DownloadOptions,
}

/// Progress of one URL as shown in the task table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// File name reported by yt-dlp, the URL until the first report
    pub display_name: String,
    /// Progress percentage (0.0 to 100.0)
    pub percent: f32,
    /// Formatted transfer rate, empty when unknown
    pub rate: String,
    pub status: DownloadStatus,
    /// Final location once post-processing moved the file into place
    pub saved_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ProgressSnapshot {
    pub fn queued(url: &str) -> Self {
        Self {
            display_name: url.to_string(),
            percent: 0.0,
            rate: String::new(),
            status: DownloadStatus::Queued,
            saved_path: None,
            error: None,
        }
    }
}
