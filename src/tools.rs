//! Locating yt-dlp and ffmpeg on this machine.

use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use rust_embed::RustEmbed;
use tracing::{info, warn};

use crate::error::DownloadError;

/// Optional bundled binaries; drop `yt-dlp`/`yt-dlp.exe` into `assets/` before building.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

static FFMPEG: OnceCell<FfmpegStatus> = OnceCell::new();

pub fn ytdlp_name() -> &'static str {
    if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }
}

fn ffmpeg_name() -> &'static str {
    if cfg!(target_os = "windows") { "ffmpeg.exe" } else { "ffmpeg" }
}

/// Searches every directory of `PATH` for an executable file called `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Where ffmpeg was found at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FfmpegStatus {
    OnPath,
    /// Next to the working directory; passed to yt-dlp explicitly.
    Local(PathBuf),
    Missing,
}

impl FfmpegStatus {
    pub fn location(&self) -> Option<PathBuf> {
        match self {
            FfmpegStatus::Local(path) => Some(path.clone()),
            _ => None,
        }
    }
}

fn probe_ffmpeg(working_dir: &Path) -> FfmpegStatus {
    if find_on_path(ffmpeg_name()).is_some() {
        return FfmpegStatus::OnPath;
    }
    let local = working_dir.join(ffmpeg_name());
    if local.is_file() {
        return FfmpegStatus::Local(local);
    }
    FfmpegStatus::Missing
}

/// One-time startup check; later calls return the cached answer.
pub fn check_ffmpeg() -> &'static FfmpegStatus {
    FFMPEG.get_or_init(|| {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let status = probe_ffmpeg(&cwd);
        match &status {
            FfmpegStatus::OnPath => info!("ffmpeg found on PATH"),
            FfmpegStatus::Local(path) => info!(path = %path.display(), "using bundled ffmpeg"),
            FfmpegStatus::Missing => warn!("ffmpeg not found; merging video and audio will fail"),
        }
        status
    })
}

/// Resolves the yt-dlp binary: configured path, then `PATH`, then the embedded copy.
pub fn locate_ytdlp(configured: Option<&Path>) -> Result<PathBuf, DownloadError> {
    if let Some(path) = configured {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "configured yt-dlp path does not exist");
    }
    if let Some(path) = find_on_path(ytdlp_name()) {
        return Ok(path);
    }
    extract_embedded()
}

fn extract_embedded() -> Result<PathBuf, DownloadError> {
    let bin = ytdlp_name();
    let data = Asset::get(bin).ok_or(DownloadError::ToolMissing)?;
    let tmp = env::temp_dir().join(bin);
    if !tmp.exists() {
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, fs::Permissions::from_mode(0o755))?;
        }
        info!(path = %tmp.display(), "extracted bundled yt-dlp");
    }
    Ok(tmp)
}
