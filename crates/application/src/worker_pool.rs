use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use refdata_core::{AppError, AppResult};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, Receiver};
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::task::{JoinError, JoinSet};
use tracing::debug;

const SUBMIT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Sizing of a bounded worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    core_pool_size: usize,
    max_pool_size: usize,
    queue_capacity: usize,
    keep_alive: Duration,
}

impl WorkerPoolConfig {
    /// Creates a validated pool configuration.
    pub fn new(
        core_pool_size: usize,
        max_pool_size: usize,
        queue_capacity: usize,
        keep_alive: Duration,
    ) -> AppResult<Self> {
        if core_pool_size == 0 {
            return Err(AppError::Validation(
                "core pool size must be greater than zero".to_owned(),
            ));
        }
        if max_pool_size < core_pool_size {
            return Err(AppError::Validation(format!(
                "max pool size {max_pool_size} must not be below core pool size {core_pool_size}"
            )));
        }
        if queue_capacity == 0 {
            return Err(AppError::Validation(
                "queue capacity must be greater than zero".to_owned(),
            ));
        }
        if keep_alive.is_zero() {
            return Err(AppError::Validation(
                "keep-alive must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            core_pool_size,
            max_pool_size,
            queue_capacity,
            keep_alive,
        })
    }

    /// Returns the number of workers started up front.
    #[must_use]
    pub fn core_pool_size(&self) -> usize {
        self.core_pool_size
    }

    /// Returns the upper bound of concurrent workers.
    #[must_use]
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Returns the number of jobs that may wait for a worker.
    #[must_use]
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Returns how long a worker above the core size may stay idle.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            core_pool_size: 2,
            max_pool_size: 4,
            queue_capacity: 32,
            keep_alive: Duration::from_secs(60),
        }
    }
}

/// Outputs of one pool run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPoolOutcome<T> {
    /// Job outputs in completion order per worker.
    pub outputs: Vec<T>,
    /// Highest number of workers alive at once.
    pub peak_workers: usize,
}

/// Bounded pool running jobs on tokio tasks.
///
/// `core_pool_size` workers start immediately. When the queue is full an
/// extra worker is spawned, up to `max_pool_size`; extra workers exit once
/// idle for the keep-alive duration. The first failing job stops the run.
#[derive(Debug, Clone, Default)]
pub struct WorkerPool {
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// Creates a pool with the given sizing.
    #[must_use]
    pub fn new(config: WorkerPoolConfig) -> Self {
        Self { config }
    }

    /// Returns the pool sizing.
    #[must_use]
    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Runs every job through the handler and collects the outputs.
    pub async fn execute<J, T, F, Fut>(
        &self,
        jobs: impl IntoIterator<Item = J>,
        handler: F,
    ) -> AppResult<WorkerPoolOutcome<T>>
    where
        J: Send + 'static,
        T: Send + 'static,
        F: Fn(J) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<J>(self.config.queue_capacity);
        let run = PoolRun {
            receiver: Arc::new(Mutex::new(receiver)),
            handler: Arc::new(handler),
            aborted: Arc::new(AtomicBool::new(false)),
        };
        let mut workers = JoinSet::new();
        let mut collected = Collected::default();

        for _ in 0..self.config.core_pool_size {
            workers.spawn(run.clone().work(None));
        }
        collected.peak_workers = workers.len();

        'submit: for job in jobs {
            let mut pending = match sender.try_send(job) {
                Ok(()) => continue,
                Err(TrySendError::Closed(_)) => break,
                Err(TrySendError::Full(job)) => job,
            };

            loop {
                while let Some(joined) = workers.try_join_next() {
                    collected.absorb(joined, &run.aborted);
                }
                if run.aborted.load(Ordering::Acquire) {
                    break 'submit;
                }
                if workers.len() < self.config.max_pool_size {
                    workers.spawn(run.clone().work(Some(self.config.keep_alive)));
                    collected.peak_workers = collected.peak_workers.max(workers.len());
                    debug!(workers = workers.len(), "worker pool grew above core size");
                }

                match sender.send_timeout(pending, SUBMIT_RETRY_INTERVAL).await {
                    Ok(()) => break,
                    Err(SendTimeoutError::Timeout(job)) => pending = job,
                    Err(SendTimeoutError::Closed(_)) => break 'submit,
                }
            }
        }
        drop(sender);

        while let Some(joined) = workers.join_next().await {
            collected.absorb(joined, &run.aborted);
        }

        match collected.first_error {
            Some(error) => Err(error),
            None => Ok(WorkerPoolOutcome {
                outputs: collected.outputs,
                peak_workers: collected.peak_workers,
            }),
        }
    }
}

struct PoolRun<J, F> {
    receiver: Arc<Mutex<Receiver<J>>>,
    handler: Arc<F>,
    aborted: Arc<AtomicBool>,
}

impl<J, F> Clone for PoolRun<J, F> {
    fn clone(&self) -> Self {
        Self {
            receiver: Arc::clone(&self.receiver),
            handler: Arc::clone(&self.handler),
            aborted: Arc::clone(&self.aborted),
        }
    }
}

impl<J, F> PoolRun<J, F> {
    async fn work<T, Fut>(self, keep_alive: Option<Duration>) -> AppResult<Vec<T>>
    where
        F: Fn(J) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut outputs = Vec::new();

        loop {
            if self.aborted.load(Ordering::Acquire) {
                return Ok(outputs);
            }

            let next = match keep_alive {
                Some(keep_alive) => {
                    match tokio::time::timeout(keep_alive, self.next_job()).await {
                        Ok(next) => next,
                        Err(_) => {
                            debug!("idle worker left the pool");
                            return Ok(outputs);
                        }
                    }
                }
                None => self.next_job().await,
            };
            let Some(job) = next else {
                return Ok(outputs);
            };
            if self.aborted.load(Ordering::Acquire) {
                return Ok(outputs);
            }

            match (self.handler)(job).await {
                Ok(output) => outputs.push(output),
                Err(error) => {
                    self.aborted.store(true, Ordering::Release);
                    return Err(error);
                }
            }
        }
    }

    async fn next_job(&self) -> Option<J> {
        self.receiver.lock().await.recv().await
    }
}

struct Collected<T> {
    outputs: Vec<T>,
    first_error: Option<AppError>,
    peak_workers: usize,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            outputs: Vec::new(),
            first_error: None,
            peak_workers: 0,
        }
    }
}

impl<T> Collected<T> {
    fn absorb(&mut self, joined: Result<AppResult<Vec<T>>, JoinError>, aborted: &AtomicBool) {
        let result = joined.map_err(|error| {
            aborted.store(true, Ordering::Release);
            AppError::Internal(format!("worker task failed: {error}"))
        });

        match result {
            Ok(Ok(outputs)) => self.outputs.extend(outputs),
            Ok(Err(error)) | Err(error) => {
                if self.first_error.is_none() {
                    self.first_error = Some(error);
                }
            }
        }
    }
}
