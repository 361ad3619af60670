use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::job::{Job, JobFailure};

/// Supported media file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFileType {
    /// WebM file with external VTT subtitle
    WebM,
    /// MKV file with embedded subtitles
    Mkv,
}

impl MediaFileType {
    /// Determine file type from extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "webm" => Some(MediaFileType::WebM),
            "mkv" => Some(MediaFileType::Mkv),
            _ => None,
        }
    }
}

/// Encoder settings applied to every transcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSettings {
    pub ffmpeg_preset: String,
    pub ffmpeg_crf: String,
    pub ffmpeg_audio_bitrate: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for TranscodeSettings {
    fn from(config: &Config) -> Self {
        Self {
            ffmpeg_preset: config.ffmpeg_preset.clone(),
            ffmpeg_crf: config.ffmpeg_crf.clone(),
            ffmpeg_audio_bitrate: config.ffmpeg_audio_bitrate.clone(),
        }
    }
}

/// Converts one .webm or .mkv file to .mp4 by shelling out to FFmpeg
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    id: String,
    input: PathBuf,
    output: PathBuf,
    file_type: MediaFileType,
    settings: TranscodeSettings,
    background: bool,
}

impl TranscodeJob {
    pub fn new(
        input: PathBuf,
        output: PathBuf,
        settings: TranscodeSettings,
        background: bool,
    ) -> Result<Self> {
        let file_type = MediaFileType::from_path(&input).ok_or_else(|| {
            anyhow!(
                "Unsupported file type. Only .webm and .mkv files are supported. Got: {:?}",
                input
            )
        })?;
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            input,
            output,
            file_type,
            settings,
            background,
        })
    }

    /// Replace the generated identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn file_type(&self) -> MediaFileType {
        self.file_type
    }

    /// Get the subtitle file path for WebM files
    pub fn subtitle_path(&self) -> Option<PathBuf> {
        match self.file_type {
            MediaFileType::WebM => Some(self.input.with_extension("vtt")),
            MediaFileType::Mkv => None, // MKV uses embedded subtitles
        }
    }

    /// Build the full FFmpeg invocation for this job
    fn build_command(&self) -> Result<Command> {
        let mut cmd = if self.background {
            let mut c = Command::new("nice");
            c.args(["-n", "19"]);
            c.arg("ffmpeg");
            c
        } else {
            Command::new("ffmpeg")
        };

        cmd.args(["-fflags", "+genpts", "-avoid_negative_ts", "make_zero"]);

        match self.file_type {
            MediaFileType::WebM => {
                let vtt_path = self
                    .subtitle_path()
                    .ok_or_else(|| anyhow!("WebM job missing subtitle path"))?;
                if !vtt_path.exists() {
                    return Err(anyhow!("Required subtitle file not found: {vtt_path:?}"));
                }
                cmd.arg("-i").arg(&self.input);
                cmd.arg("-i").arg(&vtt_path);
                cmd.args(["-map", "0:v:0", "-map", "0:a:0", "-map", "1:s:0"]);
            }
            MediaFileType::Mkv => {
                cmd.arg("-fix_sub_duration");
                cmd.arg("-i").arg(&self.input);
                cmd.args(["-map", "0:v:0", "-map", "0:a:0", "-map", "0:s:0"]);
            }
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-preset",
            self.settings.ffmpeg_preset.as_str(),
            "-crf",
            self.settings.ffmpeg_crf.as_str(),
            "-c:a",
            "aac",
            "-b:a",
            self.settings.ffmpeg_audio_bitrate.as_str(),
            "-c:s",
            "mov_text",
            "-y",
        ]);
        cmd.arg(&self.output);

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        Ok(cmd)
    }

    async fn transcode(&self) -> Result<()> {
        if !self.input.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", self.input));
        }

        if let Some(parent) = self.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut cmd = self.build_command()?;
        info!("🚀 Starting conversion for: {:?}", self.input);
        debug!("Executing FFmpeg command: {:?}", cmd);

        let output = cmd.output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("FFmpeg failed: {}", stderr);
            return Err(anyhow!("FFmpeg conversion failed ({}): {}", output.status, stderr.trim()));
        }

        match probe_duration(&self.output).await {
            Ok(duration) => info!(
                "✅ Conversion successful: {:?} -> {:?} ({:.1}s)",
                self.input, self.output, duration
            ),
            Err(e) => {
                warn!("Could not probe duration of {:?}: {}", self.output, e);
                info!(
                    "✅ Conversion successful: {:?} -> {:?}",
                    self.input, self.output
                );
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Job for TranscodeJob {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), JobFailure> {
        self.transcode().await.map_err(JobFailure::from)
    }
}

/// Get duration of a media file in seconds using ffprobe
pub async fn probe_duration(file_path: &Path) -> Result<f64> {
    if !file_path.exists() {
        return Err(anyhow!("File does not exist: {file_path:?}"));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-show_entries",
            "format=duration",
            "-of",
            "csv=p=0",
        ])
        .arg(file_path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe failed: {stderr}"));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
    duration_str
        .parse::<f64>()
        .map_err(|e| anyhow!("Failed to parse duration '{}': {}", duration_str, e))
}
