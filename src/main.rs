//! Main application for the video downloader GUI

// egui front end
mod app;
// Settings file
mod config;
// yt-dlp process runner
mod downloader;
// Duplicate and overwrite checks before queueing
mod duplicate;
// Error types
mod error;
// Options -> yt-dlp arguments
mod format;
// Download history file
mod history;
// Links dropped onto the window
mod links;
// Queue orchestration
mod manager;
// Data models for download tasks and status
mod model;
// Progress parsing utilities
mod progress;
// Bounded FIFO download queue
mod queue;
// Thumbnail fetching module
mod thumbnail;
// External tool discovery (yt-dlp, ffmpeg)
mod tools;

use std::{path::PathBuf, sync::Arc};

use eframe::egui;
use tokio::runtime::Runtime;
use tracing::{error, info};

use app::DownloaderApp;
use config::{AppConfig, CONFIG_FILE};
use downloader::YtDlp;
use history::HistoryStore;
use manager::DownloadManager;
use tools::FfmpegStatus;

/// Program entry point: initializes runtime and launches GUI
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let rt = match Runtime::new() {
        Ok(rt) => Arc::new(rt),
        Err(e) => {
            error!("could not start the async runtime: {}", e);
            std::process::exit(1);
        }
    };

    let config_path = PathBuf::from(CONFIG_FILE);
    let config = AppConfig::load(&config_path);
    let ffmpeg = tools::check_ffmpeg();

    let runner = YtDlp::new(rt.handle().clone(), config.ytdlp_path.clone(), ffmpeg.location());
    let manager = DownloadManager::new(runner, config.max_concurrent);
    let history = HistoryStore::open(&config.history_file);
    info!(capacity = config.max_concurrent, folder = %config.download_dir.display(), "starting");

    let app = DownloaderApp::new(config, config_path, rt, manager, history, *ffmpeg == FfmpegStatus::Missing);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([960.0, 640.0])
            .with_min_inner_size([800.0, 600.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };
    eframe::run_native(
        "Video Downloader",
        options,
        Box::new(move |cc| {
            cc.egui_ctx.set_visuals(app.visuals());
            Box::new(app)
        }),
    )
}
