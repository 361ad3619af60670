use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{debug, info, warn};

use super::{ensure_media_dir, find_pending_files, PendingFile};
use crate::config::Config;
use crate::dispatcher::{Dispatcher, JobSubmitter};
use crate::events::{EventKind, EventSink, FanoutSink, JsonLinesSink, MemorySink, TracingSink};
use crate::ffmpeg::{TranscodeJob, TranscodeSettings};
use crate::job::Job;

/// Pool sizing and output options for the work command
#[derive(Debug, Clone, Default)]
pub struct WorkOptions {
    pub output_dir: Option<PathBuf>,
    pub background: bool,
    pub workers: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub json_events: bool,
}

/// Outcome counts of one work run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkSummary {
    /// Jobs accepted by the pool
    pub submitted: usize,
    pub finished: usize,
    pub failed: usize,
    /// Submissions bounced by a full queue and retried
    pub rejected: usize,
}

/// What the producer side did before it finished or was interrupted
#[derive(Debug, Default)]
struct SubmitTally {
    accepted: usize,
    resubmitted: usize,
}

/// Command to convert every pending media file through the worker pool
pub struct WorkCommand {
    media_root: PathBuf,
    options: WorkOptions,
    config: Config,
}

impl WorkCommand {
    pub fn new(media_root: PathBuf, options: WorkOptions) -> Self {
        Self::with_config(media_root, options, Config::from_env())
    }

    pub fn with_config(media_root: PathBuf, options: WorkOptions, mut config: Config) -> Self {
        if let Some(workers) = options.workers {
            config.max_workers = workers;
        }
        if let Some(capacity) = options.queue_capacity {
            config.queue_capacity = capacity;
        }
        Self {
            media_root,
            options,
            config,
        }
    }

    pub async fn execute(&self) -> Result<WorkSummary> {
        ensure_media_dir(&self.media_root)?;

        let mode = if self.options.background {
            "Low Priority Worker"
        } else {
            "Power Worker (Foreground)"
        };
        let pending = find_pending_files(&self.media_root, self.options.output_dir.as_deref());
        info!("Found {} files to convert in {:?}", pending.len(), self.media_root);

        let outcomes = Arc::new(MemorySink::new());
        let mut sink = FanoutSink::new()
            .with(Arc::new(TracingSink))
            .with(outcomes.clone() as Arc<dyn EventSink>);
        if self.options.json_events {
            sink = sink.with(Arc::new(JsonLinesSink::new(std::io::stdout())));
        }

        let mut dispatcher = Dispatcher::new(self.config.dispatcher_config(), Arc::new(sink))?;
        info!(
            "✅ Starting {} workers in {} mode.",
            dispatcher.config().max_workers,
            mode
        );
        dispatcher.run()?;
        let submitter = dispatcher.submitter();

        // Set up signal handling for graceful shutdown
        let mut tally = SubmitTally::default();
        tokio::select! {
            _ = self.submit_all(&submitter, pending, &mut tally) => {}
            _ = signal::ctrl_c() => {
                info!("🛑 Shutdown signal received. Finishing accepted jobs.");
            }
        }

        debug!(
            "{} jobs submitted, {} resubmissions",
            tally.accepted, tally.resubmitted
        );
        dispatcher.stop().await?;

        // stop() drains the pool, so every accepted job has an outcome by now.
        let finished = outcomes.count(EventKind::Finished);
        let failed = outcomes.count(EventKind::Failed);
        let summary = WorkSummary {
            submitted: finished + failed,
            finished,
            failed,
            rejected: tally.resubmitted,
        };
        info!(
            "🏁 Done: {} finished, {} failed, {} resubmissions after a full queue.",
            summary.finished, summary.failed, summary.rejected
        );
        Ok(summary)
    }

    /// Feed every pending file to the pool, backing off while the queue is full.
    async fn submit_all(
        &self,
        submitter: &JobSubmitter,
        pending: Vec<PendingFile>,
        tally: &mut SubmitTally,
    ) {
        let settings = TranscodeSettings::from(&self.config);

        for file in pending {
            let job = match TranscodeJob::new(
                file.input.clone(),
                file.output,
                settings.clone(),
                self.options.background,
            ) {
                Ok(job) => job,
                Err(e) => {
                    warn!("Skipping {:?}: {}", file.input, e);
                    continue;
                }
            };

            loop {
                match submitter.submit_job(job.clone()) {
                    Ok(()) => {
                        debug!(
                            "➕ Queued {:?} job {} for {:?} -> {:?}",
                            job.file_type(),
                            job.id(),
                            job.input(),
                            job.output()
                        );
                        tally.accepted += 1;
                        break;
                    }
                    Err(e) if e.is_backpressure() => {
                        tally.resubmitted += 1;
                        tokio::time::sleep(self.config.resubmit_interval()).await;
                    }
                    Err(e) => {
                        warn!("Stopped submitting: {}", e);
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatcherConfig;
    use crate::ffmpeg::MediaFileType;
    use std::time::Duration;
    use tempfile::TempDir;

    fn pending_mkv(root: &std::path::Path, stem: &str) -> PendingFile {
        PendingFile {
            input: root.join(format!("{stem}.mkv")),
            output: root.join(format!("{stem}.mp4")),
            file_type: MediaFileType::Mkv,
        }
    }

    fn test_config() -> Config {
        Config {
            max_workers: 2,
            queue_capacity: 1,
            resubmit_interval_ms: 5,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_work_command_overrides_pool_size() {
        let temp_dir = TempDir::new().unwrap();
        let options = WorkOptions {
            workers: Some(3),
            queue_capacity: Some(0),
            ..WorkOptions::default()
        };
        let work_cmd =
            WorkCommand::with_config(temp_dir.path().to_path_buf(), options, test_config());

        assert_eq!(work_cmd.config.max_workers, 3);
        assert_eq!(work_cmd.config.queue_capacity, 0);
    }

    #[tokio::test]
    async fn test_work_nonexistent_directory() {
        let work_cmd = WorkCommand::with_config(
            PathBuf::from("/nonexistent/path"),
            WorkOptions::default(),
            test_config(),
        );

        let result = work_cmd.execute().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_work_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let work_cmd = WorkCommand::with_config(
            temp_dir.path().to_path_buf(),
            WorkOptions::default(),
            test_config(),
        );

        let summary = work_cmd.execute().await.unwrap();
        assert_eq!(summary, WorkSummary::default());
    }

    #[tokio::test]
    async fn test_zero_workers_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let options = WorkOptions {
            workers: Some(0),
            ..WorkOptions::default()
        };
        let work_cmd =
            WorkCommand::with_config(temp_dir.path().to_path_buf(), options, test_config());

        assert!(work_cmd.execute().await.is_err());
    }

    #[tokio::test]
    async fn test_broken_media_is_reported_as_failure() {
        let temp_dir = TempDir::new().unwrap();
        // Not a real Matroska file, so FFmpeg (if present at all) fails on it.
        std::fs::write(temp_dir.path().join("broken.mkv"), "not a video").unwrap();
        std::fs::write(temp_dir.path().join("also-broken.mkv"), "").unwrap();

        let work_cmd = WorkCommand::with_config(
            temp_dir.path().to_path_buf(),
            WorkOptions::default(),
            test_config(),
        );

        let summary = work_cmd.execute().await.unwrap();
        assert_eq!(summary.submitted, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.finished, 0);
    }

    #[tokio::test]
    async fn test_full_queue_counts_resubmissions() {
        let temp_dir = TempDir::new().unwrap();
        let work_cmd = WorkCommand::with_config(
            temp_dir.path().to_path_buf(),
            WorkOptions::default(),
            test_config(),
        );
        let sink = Arc::new(MemorySink::new());
        // Never run, so the single queue slot stays taken.
        let dispatcher = Dispatcher::new(DispatcherConfig::new(1, 1), sink).unwrap();

        let pending = vec![
            pending_mkv(temp_dir.path(), "first"),
            pending_mkv(temp_dir.path(), "second"),
        ];
        let mut tally = SubmitTally::default();
        let submitter = dispatcher.submitter();
        let _ = tokio::time::timeout(
            Duration::from_millis(50),
            work_cmd.submit_all(&submitter, pending, &mut tally),
        )
        .await;

        assert_eq!(tally.accepted, 1);
        assert!(tally.resubmitted >= 1);
    }

    #[tokio::test]
    async fn test_closed_pool_is_not_counted_as_resubmission() {
        let temp_dir = TempDir::new().unwrap();
        let work_cmd = WorkCommand::with_config(
            temp_dir.path().to_path_buf(),
            WorkOptions::default(),
            test_config(),
        );
        let sink = Arc::new(MemorySink::new());
        let mut dispatcher = Dispatcher::new(DispatcherConfig::new(1, 4), sink.clone()).unwrap();
        dispatcher.run().unwrap();
        dispatcher.stop().await.unwrap();

        let pending = vec![
            pending_mkv(temp_dir.path(), "late-1"),
            pending_mkv(temp_dir.path(), "late-2"),
        ];
        let mut tally = SubmitTally::default();
        work_cmd
            .submit_all(&dispatcher.submitter(), pending, &mut tally)
            .await;

        assert_eq!(tally.accepted, 0);
        assert_eq!(tally.resubmitted, 0);
        // The first refusal ends submission; it is still reported as dropped.
        assert_eq!(sink.count(EventKind::Dropped), 1);
    }
}
