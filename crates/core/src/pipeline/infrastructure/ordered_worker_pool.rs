use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerPoolError {
    #[error("worker panicked on unit {index}: {message}")]
    Panicked { index: usize, message: String },
    #[error("all workers have stopped")]
    Disconnected,
}

type WorkResult<R> = (usize, Result<R, String>);

/// Fixed-size pool that runs `(index, task)` pairs in parallel and hands
/// results back in index order.
///
/// Tasks queue on a bounded channel, so `submit` blocks once `capacity`
/// tasks are waiting. Results arrive in completion order and are parked in
/// a reorder buffer until `wait_for` asks for their index. A panicking task
/// becomes [`WorkerPoolError::Panicked`] for that index only.
pub struct OrderedWorkerPool<T, R> {
    task_tx: Option<Sender<(usize, T)>>,
    result_rx: Receiver<WorkResult<R>>,
    pending: BTreeMap<usize, Result<R, String>>,
    workers: Vec<JoinHandle<()>>,
    abandoned: Arc<AtomicBool>,
}

impl<T, R> OrderedWorkerPool<T, R>
where
    T: Send + 'static,
    R: Send + 'static,
{
    pub fn new<F>(workers: usize, capacity: usize, work: F) -> Self
    where
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let (task_tx, task_rx) = crossbeam_channel::bounded::<(usize, T)>(capacity.max(1));
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<WorkResult<R>>();
        let work = Arc::new(work);
        let abandoned = Arc::new(AtomicBool::new(false));

        let handles = (0..workers.max(1))
            .map(|_| {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let work = work.clone();
                let abandoned = abandoned.clone();
                std::thread::spawn(move || {
                    for (index, task) in task_rx {
                        if abandoned.load(Ordering::Relaxed) {
                            break;
                        }
                        let result = catch_unwind(AssertUnwindSafe(|| work(task)))
                            .map_err(|payload| panic_message(payload.as_ref()));
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();

        Self {
            task_tx: Some(task_tx),
            result_rx,
            pending: BTreeMap::new(),
            workers: handles,
            abandoned,
        }
    }

    /// Queues `task` under `index`. Indices must be unique.
    pub fn submit(&self, index: usize, task: T) -> Result<(), WorkerPoolError> {
        let tx = self.task_tx.as_ref().ok_or(WorkerPoolError::Disconnected)?;
        tx.send((index, task))
            .map_err(|_| WorkerPoolError::Disconnected)
    }

    /// Blocks until the result for `index` is available.
    pub fn wait_for(&mut self, index: usize) -> Result<R, WorkerPoolError> {
        loop {
            if let Some(result) = self.pending.remove(&index) {
                return result.map_err(|message| WorkerPoolError::Panicked { index, message });
            }
            let (done, result) = self
                .result_rx
                .recv()
                .map_err(|_| WorkerPoolError::Disconnected)?;
            self.pending.insert(done, result);
        }
    }

    /// Results received but not yet claimed.
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Lets queued tasks finish, then joins every worker.
    pub fn shutdown(mut self) {
        self.task_tx = None;
        for handle in std::mem::take(&mut self.workers) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked outside a task");
            }
        }
    }

    /// Stops without waiting: queued tasks are skipped and results of
    /// in-flight tasks are dropped when they complete.
    pub fn abandon(mut self) {
        self.detach();
    }
}

impl<T, R> OrderedWorkerPool<T, R> {
    fn detach(&mut self) {
        self.abandoned.store(true, Ordering::Relaxed);
        self.task_tx = None;
        self.workers.clear();
    }
}

impl<T, R> Drop for OrderedWorkerPool<T, R> {
    fn drop(&mut self) {
        self.detach();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
