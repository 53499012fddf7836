//! FIFO command queue.

use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{QueueError, Result};

/// Default number of invocations a queue holds before refusing more.
pub const DEFAULT_CAPACITY: usize = 1024;

type CommandFn<T, A, R> = Box<dyn FnOnce(T, A) -> R + Send + 'static>;

struct Job<T, A, R> {
    command_type: T,
    args: A,
    command_fn: CommandFn<T, A, R>,
    completion: oneshot::Sender<Result<R>>,
}

#[derive(Default)]
struct QueueState {
    pending: AtomicUsize,
    processing: AtomicBool,
}

/// Runs queued command invocations one at a time, in enqueue order.
///
/// Each invocation `(command_type, args, command_fn)` runs on the blocking
/// thread pool and is awaited before the next one is taken, so invocations
/// never interleave. The worker yields between invocations. Every
/// invocation gets a [`Completion`] resolving to the value `command_fn`
/// returned.
pub struct CommandQueue<T, A, R> {
    sender: Mutex<Option<mpsc::Sender<Job<T, A, R>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    state: Arc<QueueState>,
    capacity: usize,
}

impl<T, A, R> CommandQueue<T, A, R>
where
    T: Debug + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    /// Creates a queue holding up to [`DEFAULT_CAPACITY`] invocations.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a queue holding up to `capacity` invocations.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let state = Arc::new(QueueState::default());
        let worker = tokio::spawn(drain(receiver, Arc::clone(&state)));

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            state,
            capacity,
        }
    }

    /// Appends an invocation to the queue.
    ///
    /// Fails with [`QueueError::Full`] when the queue is at capacity and
    /// with [`QueueError::Closed`] after [`shutdown`](Self::shutdown).
    pub fn enqueue(
        &self,
        command_type: T,
        args: A,
        command_fn: impl FnOnce(T, A) -> R + Send + 'static,
    ) -> Result<Completion<R>> {
        let (completion, receiver) = oneshot::channel();
        let job = Job {
            command_type,
            args,
            command_fn: Box::new(command_fn),
            completion,
        };

        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = guard.as_ref() else {
            return Err(QueueError::Closed);
        };

        // Counted before sending so the worker never decrements below zero.
        self.state.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(error) = sender.try_send(job) {
            self.state.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(match error {
                mpsc::error::TrySendError::Full(_) => QueueError::Full {
                    capacity: self.capacity,
                },
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            });
        }

        metrics::counter!("queue_commands_enqueued_total").increment(1);
        Ok(Completion { receiver })
    }

    /// Returns the number of invocations enqueued and not yet completed,
    /// including the one running.
    pub fn pending(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Returns true while an invocation is running.
    pub fn is_processing(&self) -> bool {
        self.state.processing.load(Ordering::SeqCst)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stops accepting invocations, runs the ones already queued, then
    /// waits for the worker to exit.
    pub async fn shutdown(&self) {
        drop(
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take(),
        );
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker
            && let Err(error) = worker.await
        {
            tracing::error!(%error, "command queue worker failed");
        }
    }
}

impl<T, A, R> Default for CommandQueue<T, A, R>
where
    T: Debug + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A, R> Debug for CommandQueue<T, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("capacity", &self.capacity)
            .field("pending", &self.state.pending.load(Ordering::SeqCst))
            .field("processing", &self.state.processing.load(Ordering::SeqCst))
            .finish()
    }
}

async fn drain<T, A, R>(mut receiver: mpsc::Receiver<Job<T, A, R>>, state: Arc<QueueState>)
where
    T: Debug + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    while let Some(job) = receiver.recv().await {
        let Job {
            command_type,
            args,
            command_fn,
            completion,
        } = job;
        let label = format!("{command_type:?}");

        state.processing.store(true, Ordering::SeqCst);
        let outcome = tokio::task::spawn_blocking(move || command_fn(command_type, args)).await;
        state.processing.store(false, Ordering::SeqCst);
        state.pending.fetch_sub(1, Ordering::SeqCst);

        let result = match outcome {
            Ok(value) => {
                metrics::counter!("queue_commands_completed_total").increment(1);
                Ok(value)
            }
            Err(error) if error.is_panic() => {
                metrics::counter!("queue_commands_panicked_total").increment(1);
                tracing::error!(command_type = %label, "queued command panicked");
                Err(QueueError::Panicked {
                    command_type: label,
                })
            }
            Err(error) => {
                tracing::error!(command_type = %label, %error, "queued command did not finish");
                Err(QueueError::WorkerStopped)
            }
        };

        if completion.send(result).is_err() {
            tracing::debug!("completion dropped before the command finished");
        }

        tokio::task::yield_now().await;
    }

    tracing::debug!("command queue drained");
}

/// Resolves to the value returned by a queued command function.
#[must_use = "dropping a completion discards the command result"]
#[derive(Debug)]
pub struct Completion<R> {
    receiver: oneshot::Receiver<Result<R>>,
}

impl<R> Completion<R> {
    /// Waits for the invocation to finish.
    pub async fn wait(self) -> Result<R> {
        self.await
    }
}

impl<R> Future for Completion<R> {
    type Output = Result<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(QueueError::WorkerStopped)))
    }
}
