use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use super::{ensure_media_dir, find_pending_files, PendingFile};
use crate::ffmpeg::MediaFileType;

/// Command to list media files that the work command would convert
pub struct ScanCommand {
    media_root: PathBuf,
    output_dir: Option<PathBuf>,
}

impl ScanCommand {
    pub fn new(media_root: PathBuf, output_dir: Option<PathBuf>) -> Self {
        Self {
            media_root,
            output_dir,
        }
    }

    pub async fn execute(&self) -> Result<Vec<PendingFile>> {
        ensure_media_dir(&self.media_root)?;

        info!("🔎 Scanning directory: {:?}", self.media_root);
        let pending = find_pending_files(&self.media_root, self.output_dir.as_deref());

        for file in &pending {
            match file.file_type {
                MediaFileType::WebM => info!("➕ Would convert: {:?}", file.input),
                MediaFileType::Mkv => {
                    info!("➕ Would convert: {:?} (embedded subs assumed)", file.input)
                }
            }
        }

        info!("✅ Scan complete. Found {} files to convert.", pending.len());
        Ok(pending)
    }
}
