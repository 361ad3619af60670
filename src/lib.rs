//! # transcode-pool
//!
//! A bounded worker pool that accepts jobs, routes each one to an idle worker
//! and shuts down without abandoning accepted work. The bundled CLI uses it to
//! convert .webm and .mkv files to .mp4 with FFmpeg.
//!
//! ```no_run
//! use std::sync::Arc;
//! use transcode_pool::{Dispatcher, DispatcherConfig, FnJob, TracingSink};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let mut dispatcher = Dispatcher::new(DispatcherConfig::new(4, 16), Arc::new(TracingSink))?;
//! dispatcher.run()?;
//! dispatcher.submit_job(FnJob::new("hello", || async { Ok(()) }))?;
//! dispatcher.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod ffmpeg;
pub mod job;
pub mod queue;
pub mod worker;

pub use dispatcher::{Dispatcher, DispatcherConfig, JobSubmitter};
pub use error::DispatchError;
pub use events::{EventKind, EventSink, JobEvent, MemorySink, TracingSink};
pub use job::{BoxedJob, FnJob, Job, JobFailure};
