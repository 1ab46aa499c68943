//! Output file path resolution.

use std::path::{Path, PathBuf};

use crate::settings::ExportType;

/// File stem used when the user leaves the name blank.
pub const DEFAULT_FILE_NAME: &str = "Untitled Project";

/// Where an export will be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub path: PathBuf,
    pub export_type: ExportType,
}

impl OutputTarget {
    /// Whether writing would replace an existing single-file export.
    pub fn would_overwrite(&self) -> bool {
        self.export_type.is_single_file() && self.path.exists()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Inputs the path is resolved from, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct OutputRequest<'a> {
    pub folder: &'a str,
    pub file_name: &'a str,
    pub export_type: ExportType,
    /// Container extension without the dot, e.g. `mp4`.
    pub video_format: &'a str,
    /// Image sequence suffix appended verbatim, e.g. `%05d.png`.
    pub image_suffix: &'a str,
}

/// Build the final output path.
///
/// Blank names become [`DEFAULT_FILE_NAME`], blank folders become
/// `default_folder`. The container extension is appended unless the name
/// already ends with it. Leading whitespace is always dropped from the folder;
/// trailing whitespace only when the folder does not exist as typed but does
/// once trimmed.
pub fn resolve_output_path(request: &OutputRequest<'_>, default_folder: &Path) -> OutputTarget {
    let name = request.file_name.trim();
    let name = if name.is_empty() {
        DEFAULT_FILE_NAME
    } else {
        name
    };

    let file_name = if request.export_type == ExportType::ImageSequence {
        format!("{name}{}", request.image_suffix.trim())
    } else {
        let ext = request.video_format.trim();
        if ext.is_empty() || name.ends_with(ext) {
            name.to_string()
        } else {
            format!("{name}.{ext}")
        }
    };

    let mut folder = request.folder.trim_start();
    if !folder.is_empty() && !Path::new(folder).is_dir() {
        let trimmed = folder.trim_end();
        if Path::new(trimmed).is_dir() {
            tracing::debug!(folder = trimmed, "Using folder without trailing whitespace");
            folder = trimmed;
        }
    }

    let base = if folder.is_empty() {
        default_folder.to_path_buf()
    } else {
        PathBuf::from(folder)
    };

    OutputTarget {
        path: base.join(file_name),
        export_type: request.export_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(folder: &'a str, name: &'a str) -> OutputRequest<'a> {
        OutputRequest {
            folder,
            file_name: name,
            export_type: ExportType::VideoAndAudio,
            video_format: "mp4",
            image_suffix: "%05d.png",
        }
    }

    #[test]
    fn test_blank_name_and_folder_use_defaults() {
        let target = resolve_output_path(&request("", "   "), Path::new("/home/me"));
        assert_eq!(target.path, PathBuf::from("/home/me/Untitled Project.mp4"));
    }

    #[test]
    fn test_extension_not_duplicated() {
        let target = resolve_output_path(&request("/out", "clip.mp4"), Path::new("/home"));
        assert_eq!(target.path, PathBuf::from("/out/clip.mp4"));
        assert_eq!(target.file_name(), "clip.mp4");
    }

    #[test]
    fn test_image_sequence_appends_suffix() {
        let mut req = request("/frames", "shot");
        req.export_type = ExportType::ImageSequence;
        let target = resolve_output_path(&req, Path::new("/home"));
        assert_eq!(target.path, PathBuf::from("/frames/shot%05d.png"));
        assert!(!target.would_overwrite());
    }

    #[test]
    fn test_trailing_whitespace_trimmed_when_folder_exists() {
        let dir = std::env::temp_dir();
        let typed = format!("  {}  ", dir.display());
        let target = resolve_output_path(&request(&typed, "a"), Path::new("/home"));
        assert_eq!(target.path, dir.join("a.mp4"));
    }
}
