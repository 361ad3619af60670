use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::dispatcher::DispatcherConfig;

const DEFAULT_QUEUE_CAPACITY: usize = 16;
const DEFAULT_RESUBMIT_INTERVAL_MS: u64 = 250;

/// Configuration for the worker pool, FFmpeg and producer behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub ffmpeg_preset: String,
    pub ffmpeg_crf: String,
    pub ffmpeg_audio_bitrate: String,
    /// How long a producer waits before resubmitting a rejected job
    pub resubmit_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_workers: parse_var("MAX_WORKERS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_workers),
            queue_capacity: parse_var("QUEUE_CAPACITY").unwrap_or(defaults.queue_capacity),
            ffmpeg_preset: env::var("FFMPEG_PRESET").unwrap_or(defaults.ffmpeg_preset),
            ffmpeg_crf: env::var("FFMPEG_CRF").unwrap_or(defaults.ffmpeg_crf),
            ffmpeg_audio_bitrate: env::var("FFMPEG_AUDIO_BITRATE")
                .unwrap_or(defaults.ffmpeg_audio_bitrate),
            resubmit_interval_ms: parse_var("RESUBMIT_INTERVAL_MS")
                .unwrap_or(defaults.resubmit_interval_ms),
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig::new(self.max_workers, self.queue_capacity)
    }

    pub fn resubmit_interval(&self) -> Duration {
        Duration::from_millis(self.resubmit_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            ffmpeg_preset: "veryfast".to_string(),
            ffmpeg_crf: "23".to_string(),
            ffmpeg_audio_bitrate: "128k".to_string(),
            resubmit_interval_ms: DEFAULT_RESUBMIT_INTERVAL_MS,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
