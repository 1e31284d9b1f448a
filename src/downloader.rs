use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::{Child, Command},
    runtime::Handle,
    sync::mpsc::UnboundedSender,
};
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::format::DownloadPlan;
use crate::model::DownloadTask;
use crate::progress::{parse_progress_from_line, LibraryEvent};
use crate::tools;

/// An event from a running download, tagged with the task that produced it.
#[derive(Debug, Clone)]
pub struct TaskMessage {
    pub task: Arc<DownloadTask>,
    pub event: LibraryEvent,
}

/// Boundary to the tool doing the actual transfer.
///
/// `start` returns once the download is running; progress and exactly one terminal
/// event (`Finished` or `Error`) arrive later through `events`, from any thread.
pub trait Downloader {
    fn start(&self, task: Arc<DownloadTask>, events: UnboundedSender<TaskMessage>) -> Result<(), DownloadError>;
}

/// Runs every download as a `yt-dlp` child process on the tokio runtime.
pub struct YtDlp {
    runtime: Handle,
    binary: Option<PathBuf>,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(runtime: Handle, binary: Option<PathBuf>, ffmpeg_location: Option<PathBuf>) -> Self {
        Self { runtime, binary, ffmpeg_location }
    }
}

impl Downloader for YtDlp {
    fn start(&self, task: Arc<DownloadTask>, events: UnboundedSender<TaskMessage>) -> Result<(), DownloadError> {
        let bin = tools::locate_ytdlp(self.binary.as_deref())?;
        let args = DownloadPlan::new(&task.options, &task.save_dir)
            .with_ffmpeg_location(self.ffmpeg_location.clone())
            .to_args(&task.url);
        debug!(?args, "yt-dlp arguments");

        // tokio's Command needs a reactor to register the child's pipes
        let _guard = self.runtime.enter();
        let child = Command::new(&bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(DownloadError::Spawn)?;
        info!(url = %task.url, bin = %bin.display(), "download started");

        self.runtime.spawn(watch_child(child, task, events));
        Ok(())
    }
}

/// Decodes one raw output line; yt-dlp may emit bytes that are not UTF-8.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

async fn watch_child(mut child: Child, task: Arc<DownloadTask>, events: UnboundedSender<TaskMessage>) {
    let send = |event: LibraryEvent| {
        let _ = events.send(TaskMessage { task: Arc::clone(&task), event });
    };

    // both pipes are read until EOF so yt-dlp never writes into a closed pipe
    let stderr = child.stderr.take().map(|err| {
        tokio::spawn(async move {
            let mut last_error = None;
            let mut lines = BufReader::new(err).split(b'\n');
            loop {
                match lines.next_segment().await {
                    Ok(Some(raw)) => {
                        let line = decode_line(&raw);
                        if line.starts_with("ERROR:") {
                            last_error = Some(line);
                        } else {
                            debug!("yt-dlp stderr> {}", line);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("reading yt-dlp stderr failed: {}", e);
                        break;
                    }
                }
            }
            last_error
        })
    });

    if let Some(out) = child.stdout.take() {
        let mut lines = BufReader::new(out).split(b'\n');
        loop {
            match lines.next_segment().await {
                Ok(Some(raw)) => {
                    let line = decode_line(&raw);
                    match parse_progress_from_line(&line) {
                        Some(event) => send(event),
                        None => debug!("yt-dlp> {}", line),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(url = %task.url, "reading yt-dlp output failed: {}", e);
                    break;
                }
            }
        }
    }

    let status = child.wait().await;
    let last_error = match stderr {
        Some(handle) => handle.await.ok().flatten(),
        None => None,
    };

    let terminal = match status {
        Ok(s) if s.success() => LibraryEvent::Finished,
        Ok(s) => LibraryEvent::Error {
            message: last_error.unwrap_or_else(|| format!("yt-dlp exited with {}", s)),
        },
        Err(e) => LibraryEvent::Error { message: e.to_string() },
    };
    info!(url = %task.url, event = ?terminal, "download ended");
    send(terminal);
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::DownloadOptions;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tokio::sync::mpsc::unbounded_channel;

    fn script(dir: &std::path::Path, body: &str) -> PathBuf {
        let path = dir.join("fake-yt-dlp");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn task() -> Arc<DownloadTask> {
        Arc::new(DownloadTask {
            url: "https://example.com/v".into(),
            save_dir: std::env::temp_dir(),
            options: DownloadOptions::default(),
        })
    }

    async fn collect(mut rx: tokio::sync::mpsc::UnboundedReceiver<TaskMessage>) -> Vec<LibraryEvent> {
        let mut out = Vec::new();
        while let Some(msg) = rx.recv().await {
            let terminal = matches!(msg.event, LibraryEvent::Finished | LibraryEvent::Error { .. });
            out.push(msg.event);
            if terminal {
                break;
            }
        }
        out
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reports_progress_then_finished() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(
            dir.path(),
            r#"echo '[vd-progress]{"status": "downloading", "downloaded_bytes": 50, "total_bytes": 200}'
echo '[info] something else'
echo '[vd-saved]/tmp/Clip.mp4'"#,
        );
        let runner = YtDlp::new(Handle::current(), Some(bin), None);
        let (tx, rx) = unbounded_channel();
        runner.start(task(), tx).unwrap();

        let events = collect(rx).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], LibraryEvent::Downloading { downloaded: 50, total: Some(200), .. }));
        assert_eq!(events[1], LibraryEvent::Saved { path: PathBuf::from("/tmp/Clip.mp4") });
        assert_eq!(events[2], LibraryEvent::Finished);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn survives_output_that_is_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(
            dir.path(),
            r#"printf '[vd-saved]/tmp/Caf\351.mp4\n'
printf 'WARNING: \377\376\n' >&2
i=0
while [ $i -lt 2000 ]; do
  echo '[vd-progress]{"status": "downloading", "downloaded_bytes": 1, "total_bytes": 2}'
  i=$((i + 1))
done"#,
        );
        let runner = YtDlp::new(Handle::current(), Some(bin), None);
        let (tx, rx) = unbounded_channel();
        runner.start(task(), tx).unwrap();

        let events = collect(rx).await;
        assert_eq!(events.last(), Some(&LibraryEvent::Finished));
        let LibraryEvent::Saved { path } = &events[0] else {
            panic!("expected the saved path first, got {:?}", events[0]);
        };
        assert!(path.to_string_lossy().starts_with("/tmp/Caf"));
        let progress = events.iter().filter(|e| matches!(e, LibraryEvent::Downloading { .. })).count();
        assert_eq!(progress, 2000);
    }

    #[test]
    fn decode_line_strips_carriage_return_and_replaces_bad_bytes() {
        assert_eq!(decode_line(b"[info] ok\r"), "[info] ok");
        assert_eq!(decode_line(b"Caf\xe9"), "Caf\u{fffd}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failing_process_reports_last_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let bin = script(dir.path(), "echo 'ERROR: [generic] Unsupported URL' >&2\nexit 1");
        let runner = YtDlp::new(Handle::current(), Some(bin), None);
        let (tx, rx) = unbounded_channel();
        runner.start(task(), tx).unwrap();

        let events = collect(rx).await;
        assert_eq!(events, vec![LibraryEvent::Error { message: "ERROR: [generic] Unsupported URL".into() }]);
    }
}
