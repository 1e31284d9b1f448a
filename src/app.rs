//! egui front end: download form, task list, history window and prompts.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use eframe::{egui, App, Frame};
use egui::{Align2, Color32, ColorImage, TextureOptions, Visuals};
use rfd::FileDialog;
use tokio::runtime::Runtime;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::downloader::YtDlp;
use crate::duplicate::{DownloadRequest, Submission, Verdict};
use crate::history::{HistoryEntry, HistoryStore, RECENT_LIMIT};
use crate::manager::{DownloadManager, ManagerEvent};
use crate::model::{DownloadOptions, DownloadStatus, DownloadType, MediaFormat, ProgressSnapshot, Quality};
use crate::{links, thumbnail};

/// One line of the task list
struct TaskRow {
    url: String,
    snapshot: ProgressSnapshot,
    /// Failure text from yt-dlp, shown under the progress bar
    message: Option<String>,
}

/// Application state for the GUI
pub struct DownloaderApp {
    config: AppConfig,
    config_path: PathBuf,
    runtime: Arc<Runtime>,
    manager: DownloadManager<YtDlp>,
    history: HistoryStore,
    /// Input field for the video URL
    url_input: String,
    /// Destination folder for downloads
    download_folder: String,
    options: DownloadOptions,
    rows: Vec<TaskRow>,
    pending_count: usize,
    active_count: usize,
    /// Submission waiting for the user's yes/no
    prompt: Option<Submission>,
    notice: Option<String>,
    ffmpeg_missing: bool,
    history_open: bool,
    history_query: String,
    /// Cached textures for video thumbnails, by URL
    thumbnails: HashMap<String, egui::TextureHandle>,
    /// Incoming thumbnail fetch results (url, image)
    thumbnail_results: Arc<Mutex<Vec<(String, ColorImage)>>>,
}

impl DownloaderApp {
    pub fn new(
        config: AppConfig,
        config_path: PathBuf,
        runtime: Arc<Runtime>,
        manager: DownloadManager<YtDlp>,
        history: HistoryStore,
        ffmpeg_missing: bool,
    ) -> Self {
        Self {
            url_input: String::new(),
            download_folder: config.download_dir.display().to_string(),
            options: config.options.clone(),
            config,
            config_path,
            runtime,
            pending_count: manager.pending_count(),
            active_count: manager.active_count(),
            manager,
            history,
            rows: Vec::new(),
            prompt: None,
            notice: None,
            ffmpeg_missing,
            history_open: false,
            history_query: String::new(),
            thumbnails: HashMap::new(),
            thumbnail_results: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn visuals(&self) -> Visuals {
        if self.config.dark_mode { Visuals::dark() } else { Visuals::light() }
    }

    fn persist(&mut self) {
        self.config.download_dir = PathBuf::from(&self.download_folder);
        self.config.options = self.options.clone();
        self.config.save(&self.config_path);
    }

    fn handle_events(&mut self) {
        for event in self.manager.poll() {
            match event {
                ManagerEvent::ProgressUpdated { url, snapshot } => {
                    match self.rows.iter_mut().find(|r| r.url == url) {
                        Some(row) => {
                            if snapshot.status == DownloadStatus::Queued {
                                row.message = None;
                            }
                            row.snapshot = snapshot;
                        }
                        None => self.rows.push(TaskRow { url, snapshot, message: None }),
                    }
                }
                ManagerEvent::Completed { task, filename } => {
                    self.history.add_entry(&task.url, &filename, &task.save_dir, task.options.clone());
                }
                ManagerEvent::Failed { url, message } => {
                    if let Some(row) = self.rows.iter_mut().find(|r| r.url == url) {
                        row.message = Some(message);
                    }
                }
                ManagerEvent::QueueChanged { pending, active } => {
                    self.pending_count = pending;
                    self.active_count = active;
                }
            }
        }
    }

    fn start_download(&mut self, ctx: &egui::Context, url: String, save_dir: PathBuf) {
        if self.prompt.is_some() {
            self.notice = Some("Answer the open question first".to_string());
            return;
        }
        let request = DownloadRequest { url, save_dir, options: self.options.clone() };
        match Submission::begin(request, &self.history) {
            Ok(submission) if submission.question().is_some() => self.prompt = Some(submission),
            Ok(submission) => self.finish_submission(ctx, submission, true),
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn finish_submission(&mut self, ctx: &egui::Context, submission: Submission, accepted: bool) {
        let url = submission.url().to_string();
        match submission.finish(accepted, &mut self.history, &mut self.manager) {
            Ok(Verdict::Queued) => {
                self.notice = None;
                self.url_input.clear();
                self.persist();
                self.fetch_thumbnail(ctx, &url);
            }
            Ok(Verdict::Skipped) => {}
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    fn paste_url(&mut self) {
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.get_text()) {
            Ok(text) => self.url_input = text.trim().to_string(),
            Err(e) => {
                warn!("could not read the clipboard: {}", e);
                self.notice = Some(format!("Could not paste from clipboard: {e}"));
            }
        }
    }

    /// Starts a download for a supported link dropped onto the window.
    fn handle_drop(&mut self, ctx: &egui::Context) {
        let Some(url) = ctx.input(|i| links::dropped_link(&i.raw.dropped_files)) else {
            return;
        };
        info!(url = %url, "link dropped");
        self.url_input = url.clone();
        let folder = PathBuf::from(&self.download_folder);
        self.start_download(ctx, url, folder);
    }

    fn fetch_thumbnail(&self, ctx: &egui::Context, url: &str) {
        if !self.config.show_thumbnails || self.thumbnails.contains_key(url) {
            return;
        }
        let Some(video_id) = thumbnail::youtube_video_id(url) else {
            return;
        };
        let url = url.to_string();
        let results = Arc::clone(&self.thumbnail_results);
        let ctx = ctx.clone();
        self.runtime.spawn_blocking(move || {
            if let Some(img) = thumbnail::fetch_thumbnail(&video_id) {
                if let Ok(mut pending) = results.lock() {
                    pending.push((url, img));
                }
                ctx.request_repaint();
            }
        });
    }

    fn load_thumbnails(&mut self, ctx: &egui::Context) {
        let ready: Vec<(String, ColorImage)> = match self.thumbnail_results.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(_) => return,
        };
        for (url, img) in ready {
            let tex = ctx.load_texture(&url, img, TextureOptions::default());
            self.thumbnails.insert(url, tex);
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Download history").clicked() {
                        self.history_open = true;
                        ui.close_menu();
                    }
                });
                ui.menu_button("Theme", |ui| {
                    let before = self.config.dark_mode;
                    ui.radio_value(&mut self.config.dark_mode, false, "Light");
                    ui.radio_value(&mut self.config.dark_mode, true, "Dark");
                    if before != self.config.dark_mode {
                        ctx.set_visuals(self.visuals());
                        self.persist();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn status_bar(&self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Queue: {} | Active: {}", self.pending_count, self.active_count));
                if self.ffmpeg_missing {
                    ui.separator();
                    ui.colored_label(
                        Color32::YELLOW,
                        "⚠ ffmpeg not found: video and audio cannot be merged. Install it from https://ffmpeg.org",
                    );
                }
            });
        });
    }

    fn task_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("downloads_panel").min_width(320.0).show(ctx, |ui| {
            ui.heading("Downloads");
            ui.separator();

            egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                let mut to_remove = vec![];

                for row in &self.rows {
                    ui.group(|ui| {
                        ui.horizontal(|ui| {
                            if let Some(tex) = self.thumbnails.get(&row.url) {
                                ui.add(egui::Image::new(tex).max_height(54.0));
                            }
                            ui.vertical(|ui| {
                                ui.label(&row.snapshot.display_name);
                                ui.horizontal(|ui| {
                                    ui.label(row.snapshot.status.label());
                                    if !row.snapshot.rate.is_empty() {
                                        ui.label(&row.snapshot.rate);
                                    }
                                });
                                ui.add(egui::ProgressBar::new(row.snapshot.percent / 100.0).show_percentage());
                                if let Some(message) = &row.message {
                                    ui.colored_label(Color32::RED, message);
                                }
                                if row.snapshot.status.is_terminal() {
                                    ui.horizontal(|ui| {
                                        if row.snapshot.status == DownloadStatus::Finished && ui.button("Open Folder").clicked() {
                                            let folder = row
                                                .snapshot
                                                .saved_path
                                                .as_deref()
                                                .and_then(Path::parent)
                                                .map(Path::to_path_buf)
                                                .unwrap_or_else(|| PathBuf::from(&self.download_folder));
                                            open_folder(folder);
                                        }
                                        if ui.add(egui::Button::new("❌").fill(Color32::RED)).clicked() {
                                            to_remove.push(row.url.clone());
                                        }
                                    });
                                }
                            });
                        });
                    });
                }

                if !to_remove.is_empty() {
                    self.rows.retain(|r| !to_remove.contains(&r.url));
                    for url in to_remove {
                        self.thumbnails.remove(&url);
                    }
                }
            });
        });
    }

    fn download_form(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Video Downloader");

            ui.label("Paste video URL:");
            ui.horizontal(|ui| {
                if ui.button("📋 Paste").clicked() {
                    self.paste_url();
                }
                ui.add(egui::TextEdit::singleline(&mut self.url_input).hint_text("https://…").desired_width(f32::INFINITY));
            });

            ui.horizontal(|ui| {
                ui.label("Download folder:");
                ui.text_edit_singleline(&mut self.download_folder);
                if ui.button("Browse…").clicked() {
                    if let Some(folder) = FileDialog::new().set_directory(&self.download_folder).pick_folder() {
                        self.download_folder = folder.display().to_string();
                        self.persist();
                    }
                }
            });

            ui.separator();
            egui::Grid::new("options_grid").num_columns(2).spacing([12.0, 6.0]).show(ui, |ui| {
                ui.label("Type:");
                egui::ComboBox::from_id_source("download_type")
                    .selected_text(self.options.download_type.label())
                    .show_ui(ui, |ui| {
                        for t in DownloadType::ALL {
                            ui.selectable_value(&mut self.options.download_type, t, t.label());
                        }
                    });
                ui.end_row();

                ui.label("Quality:");
                egui::ComboBox::from_id_source("quality")
                    .selected_text(self.options.quality.label())
                    .show_ui(ui, |ui| {
                        for q in Quality::ALL {
                            ui.selectable_value(&mut self.options.quality, q, q.label());
                        }
                    });
                ui.end_row();

                ui.label("Format:");
                egui::ComboBox::from_id_source("format")
                    .selected_text(self.options.format.as_str())
                    .show_ui(ui, |ui| {
                        for f in MediaFormat::ALL {
                            ui.selectable_value(&mut self.options.format, f, f.as_str());
                        }
                    });
                ui.end_row();
            });
            ui.checkbox(&mut self.options.include_audio, "Include audio when downloading video");
            ui.checkbox(&mut self.options.subtitle_enabled, "Download subtitles");
            ui.separator();

            let ready = self.prompt.is_none();
            if ui.add_enabled(ready, egui::Button::new("⬇ Start download")).clicked() {
                let url = self.url_input.clone();
                let folder = PathBuf::from(&self.download_folder);
                self.start_download(ctx, url, folder);
            }

            if let Some(notice) = &self.notice {
                ui.colored_label(Color32::RED, notice);
            }
        });
    }

    fn prompt_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.prompt.as_ref().and_then(Submission::question).map(|c| c.message()) else {
            return;
        };
        let mut answer = None;
        egui::Window::new("Warning")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.horizontal(|ui| {
                    if ui.button("Yes").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("No").clicked() {
                        answer = Some(false);
                    }
                });
            });
        if let Some(accepted) = answer {
            if let Some(submission) = self.prompt.take() {
                self.finish_submission(ctx, submission, accepted);
            }
        }
    }

    fn history_window(&mut self, ctx: &egui::Context) {
        let mut open = self.history_open;
        let mut redownload = None;
        let mut clear = false;

        egui::Window::new(format!("Download history ({})", self.history.len()))
            .id(egui::Id::new("history_window"))
            .open(&mut open)
            .default_size([680.0, 420.0])
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label("Search:");
                    ui.text_edit_singleline(&mut self.history_query);
                });
                let entries: Vec<&HistoryEntry> = if self.history_query.is_empty() {
                    self.history.recent(RECENT_LIMIT).iter().collect()
                } else {
                    self.history.search(&self.history_query)
                };

                egui::ScrollArea::vertical().max_height(320.0).show(ui, |ui| {
                    egui::Grid::new("history_grid").striped(true).num_columns(6).show(ui, |ui| {
                        for header in ["File", "URL", "Folder", "Time", "Status", ""] {
                            ui.strong(header);
                        }
                        ui.end_row();
                        for entry in entries {
                            ui.label(&entry.filename);
                            ui.label(&entry.url);
                            ui.label(entry.save_path.display().to_string());
                            ui.label(entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string());
                            ui.label("completed");
                            if ui.small_button("Re-download").clicked() {
                                redownload = Some((entry.url.clone(), entry.save_path.clone()));
                            }
                            ui.end_row();
                        }
                    });
                });

                ui.separator();
                if ui.button("Clear history").clicked() {
                    clear = true;
                }
            });

        self.history_open = open;
        if clear {
            info!("history cleared by user");
            self.history.clear();
        }
        if let Some((url, save_path)) = redownload {
            self.download_folder = save_path.display().to_string();
            self.start_download(ctx, url, save_path);
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for DownloaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.handle_events();
        self.load_thumbnails(ctx);
        self.handle_drop(ctx);

        self.menu_bar(ctx);
        self.status_bar(ctx);
        self.task_panel(ctx);
        self.download_form(ctx);
        self.prompt_window(ctx);
        if self.history_open {
            self.history_window(ctx);
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(std::time::Duration::from_millis(100));
    }
}

fn open_folder(folder: PathBuf) {
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let result = std::process::Command::new("explorer").arg(&folder).spawn();
        #[cfg(target_os = "macos")]
        let result = std::process::Command::new("open").arg(&folder).spawn();
        #[cfg(all(unix, not(target_os = "macos")))]
        let result = std::process::Command::new("xdg-open").arg(&folder).spawn();
        if let Err(e) = result {
            warn!(folder = %folder.display(), "could not open folder: {}", e);
        }
    });
}
