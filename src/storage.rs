// SPDX-License-Identifier: GPL-3.0-only

//! Output destination naming
//!
//! Builds timestamped file names and destination paths for captured media.
//! Nothing here touches the filesystem except directory creation; actual
//! writing is the media sink's job.

use chrono::Local;
use std::path::PathBuf;

/// What kind of media an output destination holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Timelapse,
}

impl MediaKind {
    fn prefix(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Timelapse => "timelapse",
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "png",
            MediaKind::Video | MediaKind::Timelapse => "mkv",
        }
    }

    /// Logical folder the media lands in, under the pictures/videos dir
    fn folder(&self) -> Option<PathBuf> {
        match self {
            MediaKind::Photo => dirs::picture_dir(),
            MediaKind::Video | MediaKind::Timelapse => dirs::video_dir(),
        }
    }
}

/// Timestamped display name, e.g. `video_2026-08-23_14-03-52.mkv`
pub fn display_name(kind: MediaKind) -> String {
    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("{}_{}.{}", kind.prefix(), stamp, kind.extension())
}

/// Full destination path for a new capture.
///
/// Falls back to the current directory when the platform media directory
/// is unavailable. The parent directory is created if needed.
pub fn destination(kind: MediaKind) -> std::io::Result<PathBuf> {
    let folder = kind
        .folder()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Camera");
    std::fs::create_dir_all(&folder)?;
    Ok(folder.join(display_name(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_has_prefix_and_extension() {
        let name = display_name(MediaKind::Video);
        assert!(name.starts_with("video_"));
        assert!(name.ends_with(".mkv"));
    }

    #[test]
    fn test_photo_uses_png() {
        let name = display_name(MediaKind::Photo);
        assert!(name.starts_with("photo_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_names_embed_a_timestamp() {
        let name = display_name(MediaKind::Timelapse);
        // timelapse_YYYY-MM-DD_HH-MM-SS.mkv
        assert_eq!(name.len(), "timelapse_".len() + 19 + 4);
    }
}
