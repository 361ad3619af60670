use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::events::{EventSink, JobEvent};
use crate::job::{BoxedJob, JobFailure};

/// Sending half of a worker's private single-slot inbox.
///
/// A worker publishes a clone of it into the availability registry each time
/// it becomes idle.
pub type Inbox = mpsc::Sender<BoxedJob>;

/// Lifecycle states of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Publishing its inbox into the availability registry.
    Registering,
    /// Idle, waiting for a job or the stop signal.
    Awaiting,
    /// Running a job.
    Executing,
    Stopped,
}

/// A long-lived execution agent that runs at most one job at a time.
pub struct Worker {
    id: usize,
    registry: mpsc::Sender<Inbox>,
    stop: watch::Receiver<bool>,
    sink: Arc<dyn EventSink>,
    state: WorkerState,
}

impl Worker {
    pub fn new(
        id: usize,
        registry: mpsc::Sender<Inbox>,
        stop: watch::Receiver<bool>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id,
            registry,
            stop,
            sink,
            state: WorkerState::Registering,
        }
    }

    /// Drive the worker until it is told to stop.
    ///
    /// A stop signal never interrupts a running job: the worker finishes it
    /// and notices the signal the next time it would register. Jobs already
    /// delivered to the inbox are always run. Returns the number of jobs
    /// this worker executed.
    pub async fn run(mut self) -> usize {
        let (inbox, mut jobs) = mpsc::channel::<BoxedJob>(1);
        let mut processed = 0;

        loop {
            self.transition(WorkerState::Registering, None);
            if *self.stop.borrow_and_update() {
                break;
            }

            let published = tokio::select! {
                biased;
                sent = self.registry.send(inbox.clone()) => sent.is_ok(),
                _ = self.stop.changed() => false,
            };
            if !published {
                break;
            }

            self.transition(WorkerState::Awaiting, None);
            let job = tokio::select! {
                biased;
                job = jobs.recv() => job,
                _ = self.stop.changed() => None,
            };
            let Some(job) = job else {
                break;
            };

            self.execute(job).await;
            processed += 1;
        }

        // A match may have landed between publishing and observing the stop.
        while let Ok(job) = jobs.try_recv() {
            self.execute(job).await;
            processed += 1;
        }

        self.transition(WorkerState::Stopped, None);
        debug!(worker_id = self.id, processed, "Worker stopped");
        processed
    }

    async fn execute(&mut self, job: BoxedJob) {
        let job_id = job.id().to_string();
        self.transition(WorkerState::Executing, Some(job_id.as_str()));
        self.sink.emit(JobEvent::started(self.id, job_id.as_str()));

        // The job runs in its own task so a panic surfaces as a JoinError
        // here instead of unwinding through the worker loop.
        let outcome = match tokio::spawn(async move { job.execute().await }).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => Err(JobFailure::from_panic(e.into_panic())),
            Err(e) => Err(JobFailure::new(format!("job task did not complete: {e}"))),
        };

        match outcome {
            Ok(()) => self.sink.emit(JobEvent::finished(self.id, job_id)),
            Err(failure) => {
                self.sink
                    .emit(JobEvent::failed(self.id, job_id, failure.reason()))
            }
        }
    }

    fn transition(&mut self, next: WorkerState, job_id: Option<&str>) {
        debug!(
            worker_id = self.id,
            job_id,
            from = ?self.state,
            to = ?next,
            "Worker state change"
        );
        self.state = next;
    }
}
