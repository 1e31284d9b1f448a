//! Links dropped onto the window.

use std::fs;

use eframe::egui::DroppedFile;

const SUPPORTED_SITES: [&str; 3] = ["youtube.com", "youtu.be", "bilibili.com"];

pub fn is_supported_link(text: &str) -> bool {
    let lower = text.to_lowercase();
    SUPPORTED_SITES.iter().any(|site| lower.contains(site))
}

/// Target of an internet shortcut file (`URL=...` line).
fn shortcut_target(contents: &str) -> Option<String> {
    contents
        .lines()
        .find_map(|line| line.trim().strip_prefix("URL="))
        .map(|url| url.trim().to_string())
}

fn shortcut_contents(file: &DroppedFile) -> Option<String> {
    if let Some(bytes) = &file.bytes {
        return Some(String::from_utf8_lossy(bytes).into_owned());
    }
    let path = file.path.as_ref()?;
    if !path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("url")) {
        return None;
    }
    fs::read_to_string(path).ok()
}

/// First link among the dropped items that points at a supported site.
pub fn dropped_link(files: &[DroppedFile]) -> Option<String> {
    files.iter().find_map(|file| {
        let from_shortcut = shortcut_contents(file).as_deref().and_then(shortcut_target);
        [from_shortcut, Some(file.name.trim().to_string())]
            .into_iter()
            .flatten()
            .find(|candidate| is_supported_link(candidate))
    })
}
