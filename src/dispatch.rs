//! In-process dispatch of jobs to the orchestrator.
//!
//! Job ids go into a bounded queue; a worker loop runs each on its own task
//! under a concurrency cap. An id already queued or running is refused, so at
//! most one execution per job is ever in flight from this process.

use crate::config::WorkerSettings;
use crate::error::{Result, VidscanError};
use crate::job::JobId;
use crate::orchestrator::Orchestrator;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, warn};

const EVENT_CAPACITY: usize = 256;

/// Event emitted by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    JobStarted { job_id: JobId },
    JobCompleted { job_id: JobId },
    JobFailed { job_id: JobId, error: String },
    WorkerStopped,
}

/// Handle for queueing jobs onto a running worker loop.
pub struct Dispatcher {
    queue_tx: mpsc::Sender<JobId>,
    active: Arc<Mutex<HashSet<JobId>>>,
    event_tx: broadcast::Sender<DispatchEvent>,
    worker: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn the worker loop. Must be called inside a tokio runtime.
    pub fn start(orchestrator: Arc<Orchestrator>, settings: &WorkerSettings) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let active = Arc::new(Mutex::new(HashSet::new()));
        let max_concurrent = settings.max_concurrent_jobs.max(1);

        info!(
            max_concurrent,
            queue_capacity = settings.queue_capacity,
            "Dispatcher started"
        );

        let worker = tokio::spawn(run_loop(
            orchestrator,
            queue_rx,
            Arc::new(Semaphore::new(max_concurrent)),
            active.clone(),
            event_tx.clone(),
        ));

        Self {
            queue_tx,
            active,
            event_tx,
            worker,
        }
    }

    /// Queue a job. Returns `false` if the id is already queued or running.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn dispatch(&self, job_id: JobId) -> Result<bool> {
        {
            let mut active = self
                .active
                .lock()
                .map_err(|e| VidscanError::Dispatch(format!("Failed to acquire lock: {}", e)))?;
            if !active.insert(job_id) {
                debug!("Job {} already active, not dispatching again", job_id);
                return Ok(false);
            }
        }

        if self.queue_tx.send(job_id).await.is_err() {
            forget(&self.active, job_id);
            return Err(VidscanError::Dispatch("worker loop has stopped".to_string()));
        }

        debug!("Queued job {}", job_id);
        Ok(true)
    }

    /// Whether a job is queued or running here.
    pub fn is_active(&self, job_id: JobId) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(&job_id))
            .unwrap_or(false)
    }

    /// Number of jobs queued or running.
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|active| active.len()).unwrap_or(0)
    }

    /// Get a receiver for dispatcher events.
    pub fn events(&self) -> broadcast::Receiver<DispatchEvent> {
        self.event_tx.subscribe()
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    pub async fn shutdown(self) {
        let Self {
            queue_tx, worker, ..
        } = self;
        drop(queue_tx);
        if let Err(e) = worker.await {
            error!(error = ?e, "Dispatcher worker loop panicked");
        }
    }
}

fn forget(active: &Mutex<HashSet<JobId>>, job_id: JobId) {
    if let Ok(mut active) = active.lock() {
        active.remove(&job_id);
    }
}

async fn run_loop(
    orchestrator: Arc<Orchestrator>,
    mut queue_rx: mpsc::Receiver<JobId>,
    semaphore: Arc<Semaphore>,
    active: Arc<Mutex<HashSet<JobId>>>,
    event_tx: broadcast::Sender<DispatchEvent>,
) {
    let mut tasks = JoinSet::new();

    while let Some(job_id) = queue_rx.recv().await {
        // Blocks here while the concurrency cap is reached
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };

        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!(error = ?e, "Job task panicked");
            }
        }

        let orchestrator = orchestrator.clone();
        let active = active.clone();
        let event_tx = event_tx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            execute(&orchestrator, job_id, &active, &event_tx).await;
        });
    }

    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            error!(error = ?e, "Job task panicked");
        }
    }

    let _ = event_tx.send(DispatchEvent::WorkerStopped);
    info!("Dispatcher stopped");
}

async fn execute(
    orchestrator: &Orchestrator,
    job_id: JobId,
    active: &Mutex<HashSet<JobId>>,
    event_tx: &broadcast::Sender<DispatchEvent>,
) {
    let _ = event_tx.send(DispatchEvent::JobStarted { job_id });

    let outcome = orchestrator.run(job_id).await;
    forget(active, job_id);

    let event = match outcome {
        Ok(()) => DispatchEvent::JobCompleted { job_id },
        Err(e) if e.is_infrastructure() => {
            error!(%job_id, error = %e, "Infrastructure fault while running job");
            DispatchEvent::JobFailed {
                job_id,
                error: e.to_string(),
            }
        }
        Err(e) => {
            warn!(%job_id, error = %e, "Job failed");
            DispatchEvent::JobFailed {
                job_id,
                error: e.to_string(),
            }
        }
    };
    let _ = event_tx.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::orchestrator::testing::{Harness, Script};
    use crate::store::JobStore;
    use std::time::Duration;

    async fn wait_for_finish(
        events: &mut broadcast::Receiver<DispatchEvent>,
        count: usize,
    ) -> Vec<DispatchEvent> {
        let mut finished = Vec::new();
        while finished.len() < count {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("dispatcher stalled")
                .unwrap();
            if matches!(
                event,
                DispatchEvent::JobCompleted { .. } | DispatchEvent::JobFailed { .. }
            ) {
                finished.push(event);
            }
        }
        finished
    }

    #[tokio::test]
    async fn test_dispatched_jobs_run_to_completion() {
        let h = Harness::new(Script::default());
        let first = h.submit().await;
        let second = h.submit().await;
        let store = h.store.clone();

        let dispatcher = Dispatcher::start(Arc::new(h.orchestrator), &WorkerSettings::default());
        let mut events = dispatcher.events();

        assert!(dispatcher.dispatch(first).await.unwrap());
        assert!(dispatcher.dispatch(second).await.unwrap());

        let finished = wait_for_finish(&mut events, 2).await;
        assert!(finished.contains(&DispatchEvent::JobCompleted { job_id: first }));
        assert!(finished.contains(&DispatchEvent::JobCompleted { job_id: second }));

        assert_eq!(store.get(first).await.unwrap().status, JobStatus::Completed);
        assert_eq!(store.get(second).await.unwrap().status, JobStatus::Completed);
        assert_eq!(dispatcher.active_count(), 0);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_dispatch_is_refused() {
        let h = Harness::new(Script::default());
        let id = h.submit().await;
        let store = h.store.clone();

        let dispatcher = Dispatcher::start(Arc::new(h.orchestrator), &WorkerSettings::default());
        let mut events = dispatcher.events();

        assert!(dispatcher.dispatch(id).await.unwrap());
        assert!(dispatcher.is_active(id));
        assert!(!dispatcher.dispatch(id).await.unwrap());

        wait_for_finish(&mut events, 1).await;
        assert!(!dispatcher.is_active(id));

        let processing_writes = store
            .writes
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == Some(JobStatus::Processing))
            .count();
        assert_eq!(processing_writes, 1);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_job_emits_failure_event() {
        let h = Harness::new(Script {
            fail_transcribe: true,
            ..Default::default()
        });
        let id = h.submit().await;

        let dispatcher = Dispatcher::start(Arc::new(h.orchestrator), &WorkerSettings::default());
        let mut events = dispatcher.events();
        dispatcher.dispatch(id).await.unwrap();

        let finished = wait_for_finish(&mut events, 1).await;
        match &finished[0] {
            DispatchEvent::JobFailed { job_id, error } => {
                assert_eq!(*job_id, id);
                assert!(error.contains("Unsupported audio"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queue() {
        let h = Harness::new(Script::default());
        let ids = [h.submit().await, h.submit().await, h.submit().await];
        let store = h.store.clone();

        let settings = WorkerSettings {
            max_concurrent_jobs: 1,
            queue_capacity: 4,
        };
        let dispatcher = Dispatcher::start(Arc::new(h.orchestrator), &settings);
        for id in ids {
            dispatcher.dispatch(id).await.unwrap();
        }
        dispatcher.shutdown().await;

        for id in ids {
            assert_eq!(store.get(id).await.unwrap().status, JobStatus::Completed);
        }
    }
}
