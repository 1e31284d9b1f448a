//! Translates form options into the yt-dlp configuration for one download.

use std::path::{Path, PathBuf};

use crate::model::{DownloadOptions, DownloadType, MediaFormat, Quality};

/// Marker put in front of every machine-readable line we ask yt-dlp to print.
pub const PROGRESS_MARKER: &str = "[vd-progress]";
pub const SAVED_MARKER: &str = "[vd-saved]";

/// Post-processing step run by yt-dlp after the transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    ExtractAudio { codec: MediaFormat },
}

/// Everything yt-dlp needs to know about one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadPlan {
    pub format: String,
    pub home: PathBuf,
    pub postprocessors: Vec<PostProcessor>,
    pub write_subtitles: bool,
    pub subtitle_langs: Vec<String>,
    pub no_playlist: bool,
    pub ignore_errors: bool,
    pub ffmpeg_location: Option<PathBuf>,
}

fn quality_expression(quality: Quality) -> String {
    match quality.max_height() {
        None => "bestvideo+bestaudio/best".to_string(),
        Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
    }
}

/// Format selector for the video path of the form.
pub fn format_expression(options: &DownloadOptions) -> String {
    let mut expr = quality_expression(options.quality);
    if !options.include_audio {
        expr = expr.replace("+bestaudio", "");
    }
    if matches!(options.format, MediaFormat::Mp4 | MediaFormat::Mkv) {
        expr.push_str(&format!("[ext={}]", options.format));
    }
    expr
}

impl DownloadPlan {
    pub fn new(options: &DownloadOptions, save_dir: &Path) -> Self {
        let mut plan = Self {
            format: format_expression(options),
            home: save_dir.to_path_buf(),
            postprocessors: Vec::new(),
            write_subtitles: false,
            subtitle_langs: Vec::new(),
            no_playlist: options.download_type != DownloadType::Playlist,
            ignore_errors: true,
            ffmpeg_location: None,
        };

        if options.download_type == DownloadType::Audio {
            let codec = if options.format.is_audio_codec() { options.format } else { MediaFormat::Mp3 };
            plan.format = "bestaudio/best".to_string();
            plan.postprocessors.push(PostProcessor::ExtractAudio { codec });
        }

        if options.subtitle_enabled {
            plan.write_subtitles = true;
            plan.subtitle_langs = vec!["all".to_string()];
        }

        plan
    }

    pub fn with_ffmpeg_location(mut self, location: Option<PathBuf>) -> Self {
        self.ffmpeg_location = location;
        self
    }

    /// Command line for yt-dlp, ending with `url`.
    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args = vec!["-f".to_owned(), self.format.clone()];

        args.push("-P".to_owned());
        args.push(format!("home:{}", self.home.display()));

        if self.ignore_errors {
            args.push("-i".to_owned());
        }
        args.push(if self.no_playlist { "--no-playlist" } else { "--yes-playlist" }.to_owned());

        for pp in &self.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec } => {
                    args.push("-x".to_owned());
                    args.push("--audio-format".to_owned());
                    args.push(codec.as_str().to_owned());
                }
            }
        }

        if self.write_subtitles {
            args.push("--write-subs".to_owned());
            args.push("--sub-langs".to_owned());
            args.push(self.subtitle_langs.join(","));
        }

        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_owned());
            args.push(ffmpeg.display().to_string());
        }

        args.push("--newline".to_owned());
        args.push("--progress".to_owned());
        args.push("--progress-template".to_owned());
        args.push(format!("download:{PROGRESS_MARKER}%(progress)j"));
        args.push("--print".to_owned());
        args.push(format!("after_move:{SAVED_MARKER}%(filepath)s"));

        args.push("--".to_owned());
        args.push(url.to_owned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(quality: Quality, include_audio: bool, format: MediaFormat) -> DownloadOptions {
        DownloadOptions { quality, include_audio, format, ..Default::default() }
    }

    #[test]
    fn p720_with_audio_in_mp4() {
        let expr = format_expression(&options(Quality::P720, true, MediaFormat::Mp4));
        assert_eq!(expr, "bestvideo[height<=720]+bestaudio/best[height<=720][ext=mp4]");
    }

    #[test]
    fn best_without_audio_strips_combinator() {
        let expr = format_expression(&options(Quality::Best, false, MediaFormat::Webm));
        assert_eq!(expr, "bestvideo/best");
    }

    #[test]
    fn mkv_suffix_and_no_suffix_for_webm() {
        assert_eq!(
            format_expression(&options(Quality::P1080, true, MediaFormat::Mkv)),
            "bestvideo[height<=1080]+bestaudio/best[height<=1080][ext=mkv]"
        );
        assert_eq!(
            format_expression(&options(Quality::P360, false, MediaFormat::Webm)),
            "bestvideo[height<=360]/best[height<=360]"
        );
    }

    #[test]
    fn audio_download_overrides_expression() {
        let opts = DownloadOptions {
            download_type: DownloadType::Audio,
            quality: Quality::P480,
            format: MediaFormat::Flac,
            ..Default::default()
        };
        let plan = DownloadPlan::new(&opts, Path::new("/music"));
        assert_eq!(plan.format, "bestaudio/best");
        assert_eq!(plan.postprocessors, vec![PostProcessor::ExtractAudio { codec: MediaFormat::Flac }]);
        assert!(plan.no_playlist);

        let args = plan.to_args("https://example.com/v");
        let x = args.iter().position(|a| a == "-x").unwrap();
        assert_eq!(args[x + 1], "--audio-format");
        assert_eq!(args[x + 2], "flac");
    }

    #[test]
    fn audio_download_with_video_container_falls_back_to_mp3() {
        let opts = DownloadOptions { download_type: DownloadType::Audio, ..Default::default() };
        let plan = DownloadPlan::new(&opts, Path::new("."));
        assert_eq!(plan.postprocessors, vec![PostProcessor::ExtractAudio { codec: MediaFormat::Mp3 }]);
    }

    #[test]
    fn playlist_and_subtitles() {
        let opts = DownloadOptions {
            download_type: DownloadType::Playlist,
            subtitle_enabled: true,
            ..Default::default()
        };
        let plan = DownloadPlan::new(&opts, Path::new("/videos"));
        assert!(!plan.no_playlist);
        assert!(plan.write_subtitles);
        assert_eq!(plan.subtitle_langs, vec!["all"]);

        let args = plan.to_args("https://example.com/list");
        assert!(args.contains(&"--yes-playlist".to_owned()));
        assert!(args.contains(&"--write-subs".to_owned()));
        assert!(args.contains(&"-i".to_owned()));
        assert_eq!(args[args.len() - 2..], ["--".to_owned(), "https://example.com/list".to_owned()]);
    }

    #[test]
    fn args_carry_home_and_ffmpeg_location() {
        let plan = DownloadPlan::new(&DownloadOptions::default(), Path::new("/videos"))
            .with_ffmpeg_location(Some(PathBuf::from("/opt/ffmpeg")));
        let args = plan.to_args("u");
        assert_eq!(args[0..2], ["-f".to_owned(), "bestvideo+bestaudio/best[ext=mp4]".to_owned()]);
        assert!(args.contains(&"home:/videos".to_owned()));
        let f = args.iter().position(|a| a == "--ffmpeg-location").unwrap();
        assert_eq!(args[f + 1], "/opt/ffmpeg");
        assert!(args.contains(&"--no-playlist".to_owned()));
    }
}
