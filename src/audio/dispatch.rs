use anyhow::Result;
use std::sync::{Mutex, PoisonError, mpsc};
use std::thread::{self, JoinHandle, ThreadId};
use tracing::{debug, warn};

pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// Execution context that thread-affine state must be mutated on.
///
/// `invoke` runs the job synchronously: it returns only after the job has
/// finished (or has been dropped because the context is gone).
pub trait Dispatcher: Send + Sync {
    fn invoke(&self, job: DispatchJob);
}

/// Runs every job on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn invoke(&self, job: DispatchJob) {
        job();
    }
}

/// A dedicated worker thread, for state bound to one thread or apartment.
///
/// Jobs submitted from the worker thread itself run inline so a notification
/// handled on the worker cannot deadlock waiting on itself.
pub struct ThreadDispatcher {
    sender: Mutex<Option<mpsc::Sender<DispatchJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl ThreadDispatcher {
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<DispatchJob>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                for job in receiver {
                    job();
                }
            })?;
        let worker_id = worker.thread().id();
        debug!("Dispatcher thread '{}' started", name);

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            worker_id,
        })
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }

    /// Stop accepting jobs and wait for the worker to drain. Idempotent.
    pub fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            if self.is_worker_thread() {
                return;
            }
            if worker.join().is_err() {
                warn!("Dispatcher thread panicked");
            }
        }
    }
}

impl Dispatcher for ThreadDispatcher {
    fn invoke(&self, job: DispatchJob) {
        if self.is_worker_thread() {
            job();
            return;
        }

        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            warn!("Dispatcher is shut down, dropping job");
            return;
        };

        let (done_tx, done_rx) = mpsc::channel::<()>();
        let wrapped: DispatchJob = Box::new(move || {
            job();
            let _ = done_tx.send(());
        });

        if sender.send(wrapped).is_err() {
            warn!("Dispatcher thread is gone, dropping job");
            return;
        }
        // An Err here means the job panicked or was dropped unrun.
        let _ = done_rx.recv();
    }
}

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
