//! Worker pool for running previews and resolves in parallel.
//!
//! A small, bounded, thread-based runtime. Submission never blocks: a full
//! queue is reported as `QueueFull` so ingestion pipelines can apply their own
//! backpressure. Identity-level serialization is the resolver's job; the pool
//! only provides parallelism.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::debug;

use crate::confidence::Confidence;
use crate::config::RuntimeConfig;
use crate::contact::RawRecord;
use crate::error::{ResolveError, ResolveResult};
use crate::matcher::MatchResult;
use crate::resolver::{Resolution, Resolver};

enum Job {
    Preview {
        record: RawRecord,
        reply: Sender<ResolveResult<MatchResult>>,
    },
    Resolve {
        record: RawRecord,
        min_confidence: Confidence,
        reply: Sender<ResolveResult<Resolution>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize, resolver: &Arc<Resolver>) -> ResolveResult<Self> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let resolver = Arc::clone(resolver);
            let handle = thread::Builder::new()
                .name(format!("contactlink-worker-{idx}"))
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Preview { record, reply }) => {
                            let _ = reply.send(resolver.find_best_match(&record));
                        }
                        Ok(Job::Resolve {
                            record,
                            min_confidence,
                            reply,
                        }) => {
                            let _ = reply.send(resolver.resolve(&record, min_confidence));
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                })
                .map_err(|e| ResolveError::internal(format!("failed to spawn worker: {e}")))?;
            handles.push(handle);
        }
        debug!(workers, queue_capacity, "worker pool started");

        Ok(Self {
            tx,
            workers: handles,
            queue_capacity,
        })
    }

    fn try_submit(&self, job: Job) -> ResolveResult<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ResolveError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ResolveError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Closing the channel lets workers drain queued jobs, then exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Pending result of a submitted job.
#[must_use = "a job handle does nothing unless joined"]
pub struct JobHandle<T> {
    rx: Receiver<ResolveResult<T>>,
}

impl<T> JobHandle<T> {
    /// Waits for the job to complete.
    ///
    /// # Errors
    ///
    /// Returns the job's own error, or `Disconnected` if the worker died.
    pub fn join(self) -> ResolveResult<T> {
        self.rx.recv().map_err(|_| ResolveError::Disconnected)?
    }

    /// Waits for the job with a timeout.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no result arrives in time.
    pub fn join_timeout(self, timeout: Duration) -> ResolveResult<T> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => ResolveError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => ResolveError::Disconnected,
        })?
    }
}

/// Parallel front-end over a shared [`Resolver`].
pub struct ResolutionRuntime {
    resolver: Arc<Resolver>,
    pool: Option<WorkerPool>,
}

impl ResolutionRuntime {
    /// Starts the worker pool.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if a worker thread cannot be spawned.
    pub fn start(resolver: Arc<Resolver>, config: &RuntimeConfig) -> ResolveResult<Self> {
        let pool = WorkerPool::start(config.workers, config.queue_capacity, &resolver)?;
        Ok(Self {
            resolver,
            pool: Some(pool),
        })
    }

    /// The resolver jobs run against.
    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    fn submit(&self, job: Job) -> ResolveResult<()> {
        self.pool
            .as_ref()
            .ok_or(ResolveError::Disconnected)?
            .try_submit(job)
    }

    fn capacity(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.queue_capacity)
    }

    /// Queues a read-only match preview.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` or `Disconnected` if the job cannot be queued.
    pub fn preview_async(&self, record: RawRecord) -> ResolveResult<JobHandle<MatchResult>> {
        let (reply, rx) = bounded(1);
        self.submit(Job::Preview { record, reply })?;
        Ok(JobHandle { rx })
    }

    /// Queues a resolve.
    ///
    /// # Errors
    ///
    /// Returns `QueueFull` or `Disconnected` if the job cannot be queued.
    pub fn resolve_async(
        &self,
        record: RawRecord,
        min_confidence: Confidence,
    ) -> ResolveResult<JobHandle<Resolution>> {
        let (reply, rx) = bounded(1);
        self.submit(Job::Resolve {
            record,
            min_confidence,
            reply,
        })?;
        Ok(JobHandle { rx })
    }

    /// Previews on the pool and waits for the result.
    ///
    /// # Errors
    ///
    /// See [`ResolutionRuntime::preview_async`] and [`JobHandle::join`].
    pub fn preview(&self, record: RawRecord) -> ResolveResult<MatchResult> {
        self.preview_async(record)?.join()
    }

    /// Resolves on the pool and waits for the result.
    ///
    /// # Errors
    ///
    /// See [`ResolutionRuntime::resolve_async`] and [`JobHandle::join`].
    pub fn resolve(&self, record: RawRecord, min_confidence: Confidence) -> ResolveResult<Resolution> {
        self.resolve_async(record, min_confidence)?.join()
    }

    /// Previews many records in parallel, returning results in input order.
    ///
    /// Submits at most one queue's worth at a time and drains it before the
    /// next chunk.
    ///
    /// # Errors
    ///
    /// Returns the first submission or job error.
    pub fn preview_all(&self, records: Vec<RawRecord>) -> ResolveResult<Vec<MatchResult>> {
        let capacity = self.capacity();
        let mut out = Vec::with_capacity(records.len());
        let mut pending = Vec::with_capacity(capacity);

        for record in records {
            pending.push(self.preview_async(record)?);
            if pending.len() == capacity {
                for handle in pending.drain(..) {
                    out.push(handle.join()?);
                }
            }
        }
        for handle in pending {
            out.push(handle.join()?);
        }
        Ok(out)
    }

    /// Stops accepting work, drains queued jobs and joins the workers.
    pub fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }

    #[cfg(test)]
    fn submit_sleep(&self, duration: Duration) -> ResolveResult<Receiver<()>> {
        let (reply, rx) = bounded(1);
        self.submit(Job::Sleep { duration, reply })?;
        Ok(rx)
    }
}

impl Drop for ResolutionRuntime {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown();
        }
    }
}
