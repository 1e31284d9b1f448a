use eframe::egui::ColorImage;
use tracing::debug;
use url::Url;

/// Module for downloading and decoding video thumbnails from YouTube.
pub fn fetch_thumbnail(video_id: &str) -> Option<ColorImage> {
    // Construct URL for the YouTube thumbnail (standard high-quality default)
    let url = format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id);
    let resp = match reqwest::blocking::get(&url).and_then(|r| r.error_for_status()).and_then(|r| r.bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(video_id, "thumbnail fetch failed: {}", e);
            return None;
        }
    };
    // Load image data into an image::DynamicImage and convert to RGBA8
    let img = image::load_from_memory(&resp).ok()?.to_rgba8();
    let size = [img.width() as usize, img.height() as usize];
    Some(ColorImage::from_rgba_unmultiplied(size, &img))
}

/// Extracts the video id from the usual YouTube URL shapes.
pub fn youtube_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let id = match host {
        "youtu.be" => url.path_segments()?.next()?.to_string(),
        "youtube.com" | "music.youtube.com" => {
            let mut segments = url.path_segments()?;
            match segments.next()? {
                "watch" => url.query_pairs().find(|(k, _)| k == "v")?.1.into_owned(),
                "shorts" | "embed" | "live" => segments.next()?.to_string(),
                _ => return None,
            }
        }
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}
