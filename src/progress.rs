//! yt-dlp progress lines and how they move a [`ProgressSnapshot`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::format::{PROGRESS_MARKER, SAVED_MARKER};
use crate::model::{DownloadStatus, ProgressSnapshot};

/// One report from the download tool about a single task.
#[derive(Debug, Clone, PartialEq)]
pub enum LibraryEvent {
    Downloading {
        filename: Option<String>,
        downloaded: u64,
        total: Option<u64>,
        /// Bytes per second
        speed: Option<f64>,
    },
    /// Post-processing moved the final file into place.
    Saved { path: PathBuf },
    Finished,
    Error { message: String },
}

/// What applying an event means for the rest of the system.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Updated,
    Completed,
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct RawProgress {
    status: String,
    filename: Option<String>,
    downloaded_bytes: Option<f64>,
    total_bytes: Option<f64>,
    total_bytes_estimate: Option<f64>,
    speed: Option<f64>,
    error: Option<String>,
}

/// Parses one stdout line of a yt-dlp process started with our progress template.
///
/// Per-file `finished` lines become a 100% `Downloading` report: a merged download
/// finishes several files, and the task itself is only finished when the process exits.
pub fn parse_progress_from_line(line: &str) -> Option<LibraryEvent> {
    let line = line.trim();
    if let Some(path) = line.strip_prefix(SAVED_MARKER) {
        let path = path.trim();
        if path.is_empty() || path == "NA" {
            return None;
        }
        return Some(LibraryEvent::Saved { path: PathBuf::from(path) });
    }

    let json = line.strip_prefix(PROGRESS_MARKER)?;
    let raw: RawProgress = serde_json::from_str(json).ok()?;
    let total = raw.total_bytes.or(raw.total_bytes_estimate).map(|t| t as u64);
    match raw.status.as_str() {
        "downloading" => Some(LibraryEvent::Downloading {
            filename: raw.filename,
            downloaded: raw.downloaded_bytes.unwrap_or(0.0) as u64,
            total,
            speed: raw.speed,
        }),
        "finished" => {
            let downloaded = raw.downloaded_bytes.map(|d| d as u64).or(total).unwrap_or(0);
            Some(LibraryEvent::Downloading {
                filename: raw.filename,
                downloaded,
                total: Some(downloaded.max(1)),
                speed: None,
            })
        }
        "error" => Some(LibraryEvent::Error {
            message: raw.error.unwrap_or_else(|| "unknown error".to_string()),
        }),
        _ => None,
    }
}

/// Human readable rate, empty when the tool does not know it yet.
pub fn format_rate(bytes_per_sec: Option<f64>) -> String {
    match bytes_per_sec {
        Some(speed) if speed > 0.0 => format!("{:.1} MB/s", speed / 1024.0 / 1024.0),
        _ => String::new(),
    }
}

fn base_name(filename: &str) -> String {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

impl ProgressSnapshot {
    pub fn apply(&mut self, event: LibraryEvent) -> Transition {
        match event {
            LibraryEvent::Downloading { filename, downloaded, total, speed } => {
                self.display_name = filename.as_deref().map(base_name).unwrap_or_else(|| "unknown file".to_string());
                // unknown totals divide by one, like the tool's own hooks
                let total = total.filter(|t| *t > 0).unwrap_or(1);
                self.percent = (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0) as f32;
                self.rate = format_rate(speed);
                self.status = DownloadStatus::Downloading;
                Transition::Updated
            }
            LibraryEvent::Saved { path } => {
                self.display_name = base_name(&path.to_string_lossy());
                self.saved_path = Some(path);
                Transition::Updated
            }
            LibraryEvent::Finished => {
                self.percent = 100.0;
                self.rate.clear();
                self.status = DownloadStatus::Finished;
                Transition::Completed
            }
            LibraryEvent::Error { message } => {
                self.rate.clear();
                self.status = DownloadStatus::Error;
                self.error = Some(message.clone());
                Transition::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloading(downloaded: u64, total: Option<u64>) -> LibraryEvent {
        LibraryEvent::Downloading {
            filename: Some("/videos/clip.f137.mp4".to_string()),
            downloaded,
            total,
            speed: Some(2.5 * 1024.0 * 1024.0),
        }
    }

    #[test]
    fn quarter_done() {
        let mut snap = ProgressSnapshot::queued("u");
        assert_eq!(snap.apply(downloading(50, Some(200))), Transition::Updated);
        assert_eq!(snap.percent, 25.0);
        assert_eq!(snap.rate, "2.5 MB/s");
        assert_eq!(snap.display_name, "clip.f137.mp4");
        assert_eq!(snap.status, DownloadStatus::Downloading);
    }

    #[test]
    fn finished_is_always_full() {
        let mut snap = ProgressSnapshot::queued("u");
        snap.apply(downloading(10, Some(1000)));
        assert_eq!(snap.apply(LibraryEvent::Finished), Transition::Completed);
        assert_eq!(snap.percent, 100.0);
        assert_eq!(snap.status, DownloadStatus::Finished);
    }

    #[test]
    fn unknown_total_stays_in_range() {
        let mut snap = ProgressSnapshot::queued("u");
        snap.apply(downloading(4096, None));
        assert_eq!(snap.percent, 100.0);
        snap.apply(downloading(0, None));
        assert_eq!(snap.percent, 0.0);
    }

    #[test]
    fn error_keeps_message_verbatim() {
        let mut snap = ProgressSnapshot::queued("u");
        let t = snap.apply(LibraryEvent::Error { message: "ERROR: Video unavailable".into() });
        assert_eq!(t, Transition::Failed("ERROR: Video unavailable".into()));
        assert_eq!(snap.status, DownloadStatus::Error);
        assert_eq!(snap.error.as_deref(), Some("ERROR: Video unavailable"));
    }

    #[test]
    fn saved_path_renames_row() {
        let mut snap = ProgressSnapshot::queued("u");
        snap.apply(LibraryEvent::Saved { path: PathBuf::from("/videos/Clip [abc].mp4") });
        assert_eq!(snap.display_name, "Clip [abc].mp4");
        assert_eq!(snap.saved_path, Some(PathBuf::from("/videos/Clip [abc].mp4")));
    }

    #[test]
    fn parses_downloading_line() {
        let line = format!(
            "{PROGRESS_MARKER}{{\"status\": \"downloading\", \"filename\": \"a.mp4\", \"downloaded_bytes\": 50, \"total_bytes\": 200, \"speed\": 1048576.0}}"
        );
        assert_eq!(
            parse_progress_from_line(&line),
            Some(LibraryEvent::Downloading {
                filename: Some("a.mp4".into()),
                downloaded: 50,
                total: Some(200),
                speed: Some(1048576.0),
            })
        );
    }

    #[test]
    fn estimate_used_when_total_missing() {
        let line = format!(
            "{PROGRESS_MARKER}{{\"status\": \"downloading\", \"downloaded_bytes\": 10, \"total_bytes_estimate\": 40.5, \"speed\": null}}"
        );
        let Some(LibraryEvent::Downloading { total, speed, .. }) = parse_progress_from_line(&line) else {
            panic!("expected a downloading event");
        };
        assert_eq!(total, Some(40));
        assert_eq!(speed, None);
    }

    #[test]
    fn per_file_finished_is_full_progress() {
        let line = format!("{PROGRESS_MARKER}{{\"status\": \"finished\", \"filename\": \"a.webm\", \"total_bytes\": 300}}");
        let mut snap = ProgressSnapshot::queued("u");
        let event = parse_progress_from_line(&line).unwrap();
        assert_eq!(snap.apply(event), Transition::Updated);
        assert_eq!(snap.percent, 100.0);
        assert_eq!(snap.status, DownloadStatus::Downloading);
    }

    #[test]
    fn saved_and_noise_lines() {
        assert_eq!(
            parse_progress_from_line(&format!("{SAVED_MARKER}/v/a.mkv")),
            Some(LibraryEvent::Saved { path: PathBuf::from("/v/a.mkv") })
        );
        assert_eq!(parse_progress_from_line("[youtube] abc: Downloading webpage"), None);
        assert_eq!(parse_progress_from_line(&format!("{PROGRESS_MARKER}not json")), None);
    }

    #[test]
    fn rate_formatting() {
        assert_eq!(format_rate(None), "");
        assert_eq!(format_rate(Some(0.0)), "");
        assert_eq!(format_rate(Some(1024.0 * 1024.0)), "1.0 MB/s");
    }
}
