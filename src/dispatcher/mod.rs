//! Bounded worker pool: a FIFO submission queue, a registry of idle worker
//! inboxes, and the loop that matches one to the other.
//!
//! ```text
//! submit_job ──► JobQueue ──► dispatch loop ──► match task ──► worker inbox
//!                                                  ▲
//!                       availability registry ─────┘ (idle workers publish here)
//! ```

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

use crate::error::DispatchError;
use crate::events::{EventSink, JobEvent};
use crate::job::{BoxedJob, Job};
use crate::queue::{JobQueue, PushError};
use crate::worker::{Inbox, Worker};

/// Pool sizing, fixed for the lifetime of a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of workers; must be positive.
    pub max_workers: usize,
    /// Bound on pending submissions. Zero means a submission is only
    /// accepted while the dispatch loop is idle and waiting for one.
    pub queue_capacity: usize,
}

impl DispatcherConfig {
    pub fn new(max_workers: usize, queue_capacity: usize) -> Self {
        Self {
            max_workers,
            queue_capacity,
        }
    }

    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_workers == 0 {
            return Err(DispatchError::InvalidConfig(
                "max_workers must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cloneable producer handle onto a dispatcher's submission queue.
#[derive(Clone)]
pub struct JobSubmitter {
    queue: Arc<JobQueue<BoxedJob>>,
    sink: Arc<dyn EventSink>,
}

impl JobSubmitter {
    /// Try to enqueue a job without blocking.
    ///
    /// A rejected job is dropped and reported to the event sink; the caller
    /// decides whether to build and submit it again.
    pub fn submit_job<J: Job + 'static>(&self, job: J) -> Result<(), DispatchError> {
        self.submit_boxed(Box::new(job))
    }

    pub fn submit_boxed(&self, job: BoxedJob) -> Result<(), DispatchError> {
        match self.queue.try_push(job) {
            Ok(()) => Ok(()),
            Err(PushError::Full(job)) => {
                let job_id = job.id().to_string();
                self.sink
                    .emit(JobEvent::dropped(job_id.as_str(), "submission queue full"));
                Err(DispatchError::QueueFull {
                    job_id,
                    capacity: self.queue.capacity(),
                })
            }
            Err(PushError::Closed(job)) => {
                let job_id = job.id().to_string();
                self.sink.emit(JobEvent::dropped(job_id.as_str(), "pool closed"));
                Err(DispatchError::PoolClosed { job_id })
            }
        }
    }
}

enum Lifecycle {
    Idle,
    Running(Running),
    Stopped,
}

struct Running {
    workers: Vec<JoinHandle<usize>>,
    dispatch_loop: JoinHandle<()>,
    stop_workers: watch::Sender<bool>,
    registry: Arc<Mutex<mpsc::Receiver<Inbox>>>,
}

/// Owns the worker pool and its lifecycle.
pub struct Dispatcher {
    config: DispatcherConfig,
    queue: Arc<JobQueue<BoxedJob>>,
    sink: Arc<dyn EventSink>,
    lifecycle: Lifecycle,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig, sink: Arc<dyn EventSink>) -> Result<Self, DispatchError> {
        config.validate()?;
        Ok(Self {
            config,
            queue: Arc::new(JobQueue::new(config.queue_capacity)),
            sink,
            lifecycle: Lifecycle::Idle,
        })
    }

    pub fn config(&self) -> DispatcherConfig {
        self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Running(_))
    }

    /// Jobs accepted but not yet taken by the dispatch loop.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn submitter(&self) -> JobSubmitter {
        JobSubmitter {
            queue: Arc::clone(&self.queue),
            sink: Arc::clone(&self.sink),
        }
    }

    /// See [`JobSubmitter::submit_job`].
    pub fn submit_job<J: Job + 'static>(&self, job: J) -> Result<(), DispatchError> {
        self.submitter().submit_job(job)
    }

    /// Start the workers and the dispatch loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn run(&mut self) -> Result<(), DispatchError> {
        match self.lifecycle {
            Lifecycle::Idle => {}
            Lifecycle::Running(_) => return Err(DispatchError::AlreadyRunning),
            Lifecycle::Stopped => return Err(DispatchError::Terminated),
        }

        let DispatcherConfig {
            max_workers,
            queue_capacity,
        } = self.config;
        let (registry_tx, registry_rx) = mpsc::channel::<Inbox>(max_workers);
        let (stop_workers, _) = watch::channel(false);

        let workers = (1..=max_workers)
            .map(|id| {
                let worker = Worker::new(
                    id,
                    registry_tx.clone(),
                    stop_workers.subscribe(),
                    Arc::clone(&self.sink),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        // Only workers may hold the registry's sending side.
        drop(registry_tx);

        let registry = Arc::new(Mutex::new(registry_rx));
        let dispatch_loop = tokio::spawn(dispatch_loop(
            Arc::clone(&self.queue),
            Arc::clone(&registry),
            Arc::clone(&self.sink),
            max_workers,
        ));

        info!(
            max_workers,
            queue_capacity, "🚀 Dispatcher started with {} workers", max_workers
        );
        self.lifecycle = Lifecycle::Running(Running {
            workers,
            dispatch_loop,
            stop_workers,
            registry,
        });
        Ok(())
    }

    /// Shut the pool down gracefully.
    ///
    /// New submissions are refused from the moment this is called. Every job
    /// accepted before that is still dispatched and run to completion. The
    /// returned future resolves once all workers have stopped, with the total
    /// number of jobs the pool executed.
    pub async fn stop(&mut self) -> Result<usize, DispatchError> {
        let running = match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(running) => running,
            Lifecycle::Idle => {
                self.lifecycle = Lifecycle::Idle;
                return Err(DispatchError::NotRunning);
            }
            Lifecycle::Stopped => return Err(DispatchError::Terminated),
        };
        let Running {
            workers,
            dispatch_loop,
            stop_workers,
            registry,
        } = running;

        info!("🛑 Stopping dispatcher, draining {} queued jobs", self.queue.len());

        // The loop drains what was already accepted and waits for its
        // outstanding matches before returning.
        self.queue.close();
        if let Err(e) = dispatch_loop.await {
            warn!("Dispatch loop ended abnormally: {}", e);
        }

        stop_workers.send_replace(true);

        let mut executed = 0;
        for (index, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(count) => executed += count,
                Err(e) => warn!(worker_id = index + 1, "Worker task ended abnormally: {}", e),
            }
        }

        // Every worker has exited; the registry can go.
        drop(registry);
        info!(executed, "✅ Dispatcher stopped, {} jobs executed", executed);
        Ok(executed)
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Lifecycle::Running(running) = &self.lifecycle {
            warn!("Dispatcher dropped without stop(); workers will wind down in the background");
            self.queue.close();
            running.stop_workers.send_replace(true);
        }
    }
}

/// Pull jobs in FIFO order and hand each to its own match task.
///
/// At most `max_matches` jobs can be waiting for a worker at once, so the
/// loop never holds more jobs out of the queue than there are workers.
async fn dispatch_loop(
    queue: Arc<JobQueue<BoxedJob>>,
    registry: Arc<Mutex<mpsc::Receiver<Inbox>>>,
    sink: Arc<dyn EventSink>,
    max_matches: usize,
) {
    let permits = Arc::new(Semaphore::new(max_matches));
    let mut matches = JoinSet::new();

    loop {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let Some(job) = queue.pop().await else {
            break;
        };
        trace!(job_id = job.id(), "Dequeued job");

        let registry = Arc::clone(&registry);
        let sink = Arc::clone(&sink);
        matches.spawn(async move {
            deliver(job, &registry, sink.as_ref()).await;
            drop(permit);
        });

        while let Some(result) = matches.try_join_next() {
            if let Err(e) = result {
                warn!("Match task ended abnormally: {}", e);
            }
        }
    }

    while let Some(result) = matches.join_next().await {
        if let Err(e) = result {
            warn!("Match task ended abnormally: {}", e);
        }
    }
    debug!("Dispatch loop finished");
}

/// Wait for the next idle worker and put the job in its inbox.
async fn deliver(mut job: BoxedJob, registry: &Mutex<mpsc::Receiver<Inbox>>, sink: &dyn EventSink) {
    loop {
        let inbox = registry.lock().await.recv().await;
        let Some(inbox) = inbox else {
            let job_id = job.id().to_string();
            warn!(job_id = %job_id, "No worker left to take job");
            sink.emit(JobEvent::dropped(job_id, "no workers available"));
            return;
        };
        match inbox.send(job).await {
            Ok(()) => return,
            // The worker behind this inbox is gone; try the next one.
            Err(mpsc::error::SendError(returned)) => job = returned,
        }
    }
}
