//! Structured job events and the sinks that receive them.
//!
//! Workers and the dispatcher never format log lines for job outcomes
//! themselves; they emit a [`JobEvent`] into the [`EventSink`] they were
//! constructed with. The sink observes every failure, so retry or
//! dead-letter handling can be attached here.

use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// What happened to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Started,
    Finished,
    Failed,
    Dropped,
}

/// A single job lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEvent {
    /// Worker that handled the job; `None` for jobs dropped before dispatch.
    pub worker_id: Option<usize>,
    pub job_id: String,
    pub event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobEvent {
    pub fn started(worker_id: usize, job_id: impl Into<String>) -> Self {
        Self {
            worker_id: Some(worker_id),
            job_id: job_id.into(),
            event: EventKind::Started,
            error: None,
        }
    }

    pub fn finished(worker_id: usize, job_id: impl Into<String>) -> Self {
        Self {
            worker_id: Some(worker_id),
            job_id: job_id.into(),
            event: EventKind::Finished,
            error: None,
        }
    }

    pub fn failed(worker_id: usize, job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            worker_id: Some(worker_id),
            job_id: job_id.into(),
            event: EventKind::Failed,
            error: Some(error.into()),
        }
    }

    pub fn dropped(job_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            worker_id: None,
            job_id: job_id.into(),
            event: EventKind::Dropped,
            error: Some(error.into()),
        }
    }
}

/// Receiver of job events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Default sink: forwards every event to `tracing` with structured fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: JobEvent) {
        let JobEvent {
            worker_id,
            job_id,
            event,
            error,
        } = event;
        match event {
            EventKind::Started => {
                debug!(worker_id = ?worker_id, job_id = %job_id, "➡️ Job started");
            }
            EventKind::Finished => {
                info!(worker_id = ?worker_id, job_id = %job_id, "✅ Job finished");
            }
            EventKind::Failed => {
                error!(
                    worker_id = ?worker_id,
                    job_id = %job_id,
                    error = error.as_deref().unwrap_or(""),
                    "❌ Job failed"
                );
            }
            EventKind::Dropped => {
                warn!(
                    job_id = %job_id,
                    error = error.as_deref().unwrap_or(""),
                    "⚠️ Job dropped"
                );
            }
        }
    }
}

/// Writes each event as one JSON object per line.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    fn emit(&self, event: JobEvent) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = serde_json::to_writer(&mut *writer, &event)
            .map_err(std::io::Error::from)
            .and_then(|_| writer.write_all(b"\n"))
            .and_then(|_| writer.flush());
        if let Err(e) = result {
            warn!("Failed to write job event for {}: {}", event.job_id, e);
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<JobEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far, in emission order.
    pub fn events(&self) -> Vec<JobEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event == kind)
            .count()
    }

    /// Job ids of all events of the given kind, in emission order.
    pub fn job_ids(&self, kind: EventKind) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.event == kind)
            .map(|e| e.job_id.clone())
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: JobEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

/// Forwards every event to each of its sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn emit(&self, event: JobEvent) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.emit(event.clone());
            }
            last.emit(event);
        }
    }
}
