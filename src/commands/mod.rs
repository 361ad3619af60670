pub mod scan;
pub mod work;

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ffmpeg::MediaFileType;

/// A media file found under the media root that still needs converting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub file_type: MediaFileType,
}

/// Fail early on a media root that is missing or not a directory
pub(crate) fn ensure_media_dir(media_root: &Path) -> Result<()> {
    if !media_root.exists() {
        return Err(anyhow!("Media directory does not exist: {:?}", media_root));
    }

    if !media_root.is_dir() {
        return Err(anyhow!("Path is not a directory: {:?}", media_root));
    }

    Ok(())
}

/// Where the .mp4 for `input` goes: next to the source, or mirrored under
/// `output_dir` when one is given
pub fn output_path_for(media_root: &Path, input: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => {
            let relative = input.strip_prefix(media_root).unwrap_or(input);
            dir.join(relative).with_extension("mp4")
        }
        None => input.with_extension("mp4"),
    }
}

/// Walk the media root and collect .webm/.mkv files whose output is missing.
///
/// WebM files without a sibling .vtt subtitle are skipped with a warning.
/// Results are sorted by path so job order is stable between runs.
pub fn find_pending_files(media_root: &Path, output_dir: Option<&Path>) -> Vec<PendingFile> {
    let mut pending = Vec::new();

    for entry in WalkDir::new(media_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_type) = MediaFileType::from_path(path) else {
            continue;
        };

        let output = output_path_for(media_root, path, output_dir);
        if output.exists() {
            debug!("Output already exists for: {:?}", path);
            continue;
        }

        if file_type == MediaFileType::WebM && !path.with_extension("vtt").exists() {
            warn!("⚠️ SKIPPING: Missing subtitle file for '{:?}'", path);
            continue;
        }

        pending.push(PendingFile {
            input: path.to_path_buf(),
            output,
            file_type,
        });
    }

    pending.sort_by(|a, b| a.input.cmp(&b.input));
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_find_pending_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("Season 01")).unwrap();

        fs::write(root.join("video1.webm"), "").unwrap();
        fs::write(root.join("video1.vtt"), "").unwrap();
        fs::write(root.join("Season 01/video2.mkv"), "").unwrap();
        fs::write(root.join("video3.webm"), "").unwrap(); // No .vtt file
        fs::write(root.join("done.mkv"), "").unwrap();
        fs::write(root.join("done.mp4"), "").unwrap();
        fs::write(root.join("notes.txt"), "").unwrap();

        let pending = find_pending_files(root, None);
        let inputs: Vec<_> = pending.iter().map(|p| p.input.clone()).collect();
        assert_eq!(
            inputs,
            vec![root.join("Season 01/video2.mkv"), root.join("video1.webm")]
        );
        assert_eq!(pending[0].file_type, MediaFileType::Mkv);
        assert_eq!(pending[0].output, root.join("Season 01/video2.mp4"));
    }

    #[test]
    fn test_output_path_mirrors_under_output_dir() {
        let root = Path::new("/media");
        let out = Path::new("/converted");
        assert_eq!(
            output_path_for(root, Path::new("/media/Show/ep1.mkv"), Some(out)),
            PathBuf::from("/converted/Show/ep1.mp4")
        );
        assert_eq!(
            output_path_for(root, Path::new("/media/Show/ep1.mkv"), None),
            PathBuf::from("/media/Show/ep1.mp4")
        );
    }

    #[test]
    fn test_ensure_media_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(ensure_media_dir(temp_dir.path()).is_ok());
        assert!(ensure_media_dir(Path::new("/nonexistent/path")).is_err());

        let file = temp_dir.path().join("file.mkv");
        fs::write(&file, "").unwrap();
        assert!(ensure_media_dir(&file).is_err());
    }
}
