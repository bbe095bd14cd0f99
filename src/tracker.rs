//! `AsyncOperationTracker` – observable `{Idle, Loading, Success, Error}` record
//! for one asynchronous unit of work.
//!
//! Every network-backed call exposed to UI code (login, register, password
//! reset, subscription flush) goes through a tracker. The tracker owns the
//! only writer of its record; UI code reads snapshots with
//! [`state()`](AsyncOperationTracker::state) or follows changes through a
//! [`watch::Receiver`] from [`subscribe()`](AsyncOperationTracker::subscribe).
//!
//! Invocations follow a last-write-wins policy: each `invoke` bumps a
//! generation counter, and a resolution is applied only while its generation
//! is still the current one. A superseded call still completes and its
//! [`OperationHandle`] still yields its own result; it just never reaches the
//! shared record.
//!
//! # Example
//!
//! ```rust,no_run
//! use kalam_bind::{AsyncOperationTracker, OperationError};
//!
//! # async fn example() {
//! let tracker: AsyncOperationTracker<u32> = AsyncOperationTracker::named("answer");
//! assert!(tracker.state().is_idle());
//!
//! let handle = tracker.invoke(async { Ok::<_, OperationError>(42) });
//! assert!(tracker.state().is_loading());
//!
//! assert_eq!(handle.await, Ok(42));
//! assert_eq!(tracker.value(), Some(42));
//! # }
//! ```

use crate::error::OperationError;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Observable state of a tracked operation.
///
/// Exactly one variant holds at a time; the value only exists in `Success`
/// and the error only in `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "data", rename_all = "snake_case")]
pub enum OperationState<T> {
    /// Never invoked, or reset
    Idle,
    /// Most recent invocation is still running
    Loading,
    /// Most recent invocation resolved with a value
    Success(T),
    /// Most recent invocation failed
    Error(OperationError),
}

impl<T> OperationState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Value of a successful operation
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Error of a failed operation
    pub fn error(&self) -> Option<&OperationError> {
        match self {
            Self::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Short lowercase name of the variant, for logs and UI bridges
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

impl<T> Default for OperationState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

/// Runs under the record's write lock when the current invocation succeeds.
type PublishHook<T> = Box<dyn FnOnce(&T) + Send>;

struct TrackerInner<T> {
    label: String,
    state_tx: watch::Sender<OperationState<T>>,
    /// Generation of the invocation allowed to write the record.
    generation: AtomicU64,
}

impl<T: Clone> TrackerInner<T> {
    /// Apply a resolution if `generation` is still current.
    ///
    /// The generation check runs inside the watch write lock, so it cannot
    /// interleave with `arm` or `reset`. `publish` runs under the same lock and
    /// only when the resolution is applied.
    fn settle(
        &self,
        generation: u64,
        result: &Result<T, OperationError>,
        publish: Option<PublishHook<T>>,
    ) -> bool {
        let mut publish = publish;
        self.state_tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = match result {
                Ok(value) => {
                    if let Some(publish) = publish.take() {
                        publish(value);
                    }
                    OperationState::Success(value.clone())
                },
                Err(err) => OperationState::Error(err.clone()),
            };
            true
        })
    }

    fn state(&self) -> OperationState<T> {
        self.state_tx.borrow().clone()
    }

    async fn settled(&self) -> OperationState<T> {
        let mut rx = self.state_tx.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if !state.is_loading() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

/// Tracks the lifecycle of repeated invocations of one asynchronous operation.
///
/// Cloning is cheap and yields a handle to the same record. Hand out a
/// [`TrackerView`] to code that should only observe it.
pub struct AsyncOperationTracker<T> {
    inner: Arc<TrackerInner<T>>,
}

impl<T> Clone for AsyncOperationTracker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for AsyncOperationTracker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncOperationTracker")
            .field("label", &self.inner.label)
            .field("state", &self.inner.state_tx.borrow().label())
            .field("generation", &self.inner.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl<T> Default for AsyncOperationTracker<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsyncOperationTracker<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an idle tracker
    pub fn new() -> Self {
        Self::named("operation")
    }

    /// Create an idle tracker with a label used in log output
    pub fn named(label: impl Into<String>) -> Self {
        let (state_tx, _) = watch::channel(OperationState::Idle);
        Self {
            inner: Arc::new(TrackerInner {
                label: label.into(),
                state_tx,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Label given at construction
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Start a new invocation.
    ///
    /// The record switches to `Loading` before this returns, superseding any
    /// invocation still in flight. The operation runs on the current tokio
    /// runtime; called outside one, the operation is dropped unrun and the
    /// record goes straight to `Error` with [`ErrorKind::Unknown`](crate::ErrorKind).
    ///
    /// The returned handle resolves with this invocation's own result even if
    /// a later `invoke` or `reset` kept it from reaching the record. Dropping
    /// the handle does not cancel the operation.
    pub fn invoke<F>(&self, operation: F) -> OperationHandle<T>
    where
        F: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        self.start(operation, None)
    }

    /// Like [`invoke`](Self::invoke), but `publish` also sees the value when,
    /// and only when, the success reaches the record.
    pub(crate) fn invoke_publishing<F, P>(&self, operation: F, publish: P) -> OperationHandle<T>
    where
        F: Future<Output = Result<T, OperationError>> + Send + 'static,
        P: FnOnce(&T) + Send + 'static,
    {
        self.start(operation, Some(Box::new(publish)))
    }

    /// Force the record back to `Idle`.
    ///
    /// Any invocation still in flight is treated as superseded.
    pub fn reset(&self) {
        self.inner.state_tx.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            *state = OperationState::Idle;
        });
        log::debug!("[TRACKER] {} reset", self.inner.label);
    }

    /// Read-only handle to this tracker's record
    pub fn view(&self) -> TrackerView<T> {
        TrackerView {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.inner.state()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state_tx.borrow().is_loading()
    }

    /// Value of the last successful invocation, if the record is in `Success`
    pub fn value(&self) -> Option<T> {
        self.inner.state_tx.borrow().value().cloned()
    }

    /// Error of the last failed invocation, if the record is in `Error`
    pub fn error(&self) -> Option<OperationError> {
        self.inner.state_tx.borrow().error().cloned()
    }

    /// Wait until the record is no longer `Loading` and return that state.
    pub async fn settled(&self) -> OperationState<T> {
        self.inner.settled().await
    }

    fn start<F>(&self, operation: F, publish: Option<PublishHook<T>>) -> OperationHandle<T>
    where
        F: Future<Output = Result<T, OperationError>> + Send + 'static,
    {
        let generation = self.arm();

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!(
                    "[TRACKER] {} invocation #{} called outside a tokio runtime",
                    self.inner.label,
                    generation
                );
                let result = Err(OperationError::unknown(format!(
                    "{} needs a tokio runtime to run",
                    self.inner.label
                )));
                self.inner.settle(generation, &result, None);
                return OperationHandle {
                    generation,
                    inner: HandleInner::Ready(Some(result)),
                };
            },
        };

        log::debug!(
            "[TRACKER] {} invocation #{} started",
            self.inner.label,
            generation
        );

        let inner = Arc::clone(&self.inner);
        let task = runtime.spawn(async move {
            // Run the operation in its own task so a panic still settles the record.
            let result = match tokio::spawn(operation).await {
                Ok(result) => result,
                Err(join_err) => Err(OperationError::unknown(format!(
                    "{} task failed: {}",
                    inner.label, join_err
                ))),
            };

            if inner.settle(generation, &result, publish) {
                match &result {
                    Ok(_) => log::debug!(
                        "[TRACKER] {} invocation #{} succeeded",
                        inner.label,
                        generation
                    ),
                    Err(err) => log::debug!(
                        "[TRACKER] {} invocation #{} failed: {}",
                        inner.label,
                        generation,
                        err
                    ),
                }
            } else {
                log::debug!(
                    "[TRACKER] {} invocation #{} superseded, result discarded",
                    inner.label,
                    generation
                );
            }
            result
        });

        OperationHandle {
            generation,
            inner: HandleInner::Task(task),
        }
    }

    /// Switch to `Loading` and claim a new generation, atomically.
    fn arm(&self) -> u64 {
        let mut generation = 0;
        self.inner.state_tx.send_modify(|state| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *state = OperationState::Loading;
        });
        generation
    }
}

/// Read-only access to a tracker's record.
///
/// Observers get snapshots and change notifications but cannot start or
/// reset invocations.
///
/// ```rust,compile_fail
/// use kalam_bind::{AsyncOperationTracker, OperationError};
///
/// let tracker: AsyncOperationTracker<u32> = AsyncOperationTracker::new();
/// let view = tracker.view();
/// let _ = view.invoke(async { Ok::<_, OperationError>(1) });
/// ```
pub struct TrackerView<T> {
    inner: Arc<TrackerInner<T>>,
}

impl<T> Clone for TrackerView<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for TrackerView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackerView")
            .field("label", &self.inner.label)
            .field("state", &self.inner.state_tx.borrow().label())
            .finish()
    }
}

impl<T> TrackerView<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Snapshot of the current state
    pub fn state(&self) -> OperationState<T> {
        self.inner.state()
    }

    /// Receiver that is notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<OperationState<T>> {
        self.inner.state_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state_tx.borrow().is_loading()
    }

    pub fn value(&self) -> Option<T> {
        self.inner.state_tx.borrow().value().cloned()
    }

    pub fn error(&self) -> Option<OperationError> {
        self.inner.state_tx.borrow().error().cloned()
    }

    /// Wait until the record is no longer `Loading` and return that state.
    pub async fn settled(&self) -> OperationState<T> {
        self.inner.settled().await
    }
}

enum HandleInner<T> {
    Task(JoinHandle<Result<T, OperationError>>),
    /// Resolved without spawning (no runtime)
    Ready(Option<Result<T, OperationError>>),
}

/// Handle to one invocation of a tracked operation.
///
/// Awaiting it yields that invocation's result, independent of whether a
/// later invocation superseded it on the tracker.
#[must_use = "the operation keeps running, but its result is only available through the handle"]
pub struct OperationHandle<T> {
    generation: u64,
    inner: HandleInner<T>,
}

// The result is moved out, never pinned.
impl<T> Unpin for OperationHandle<T> {}

impl<T> OperationHandle<T> {
    /// Generation this invocation was started with
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `true` once the underlying operation has resolved
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            HandleInner::Task(task) => task.is_finished(),
            HandleInner::Ready(_) => true,
        }
    }
}

impl<T> fmt::Debug for OperationHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("generation", &self.generation)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl<T> Future for OperationHandle<T> {
    type Output = Result<T, OperationError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.inner {
            HandleInner::Task(task) => match Pin::new(task).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(join_err)) => Poll::Ready(Err(OperationError::unknown(
                    format!("operation task failed: {}", join_err),
                ))),
                Poll::Pending => Poll::Pending,
            },
            HandleInner::Ready(result) => Poll::Ready(result.take().unwrap_or_else(|| {
                Err(OperationError::unknown("operation handle polled after completion"))
            })),
        }
    }
}
