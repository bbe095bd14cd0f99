//! `SubscriptionBatchCoordinator` – coalesces subscription changes into one
//! transport call per batching window.
//!
//! UI code declares subscriptions synchronously (`add` returns the id right
//! away, `remove` never blocks). The first mutation of a window schedules one
//! deferred flush task; every mutation made before that task runs joins the
//! same batch. The flush commits the net batch through
//! [`SyncTransport::commit_subscriptions`](crate::SyncTransport::commit_subscriptions)
//! and reports through an [`AsyncOperationTracker<BatchReceipt>`].
//!
//! On a current-thread runtime the flush task only yields before taking the
//! batch, so the window is exactly the caller's synchronous section. On a
//! multi-thread runtime another worker may run the task at once, so the
//! window is widened to at least
//! [`MULTI_THREAD_MIN_FLUSH_DELAY_MS`](crate::options::MULTI_THREAD_MIN_FLUSH_DELAY_MS).
//!
//! Flights are serialized per coordinator: a batch accumulated while another
//! flush is in flight waits for it before being taken, so the transport always
//! sees subscription sets in request order.
//!
//! # Example
//!
//! ```rust,no_run
//! use kalam_bind::{ArcSyncTransport, QueryDescriptor, SubscriptionBatchCoordinator};
//!
//! # async fn example(transport: ArcSyncTransport) {
//! let coordinator = SubscriptionBatchCoordinator::new(transport);
//!
//! let cats = coordinator.add(QueryDescriptor::collection("Cat"));
//! let dogs = coordinator.add(QueryDescriptor::collection("Dog"));
//! coordinator.remove(cats);
//!
//! // One commit_subscriptions call containing only the Dog subscription
//! coordinator.wait_until_idle().await;
//! assert!(coordinator.status(cats).is_none());
//! # let _ = dogs;
//! # }
//! ```

use crate::{
    error::OperationResult,
    models::{
        BatchReceipt, QueryDescriptor, SubscriptionId, SubscriptionInfo, SubscriptionMutation,
        SubscriptionOperation, SubscriptionStatus,
    },
    options::CoordinatorOptions,
    subscription::batch::{Batch, RemoveOutcome},
    tracker::{AsyncOperationTracker, OperationState, TrackerView},
    transport::ArcSyncTransport,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::{runtime::Handle, sync::watch};

/// Counters describing what a coordinator has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorStats {
    /// Deferred flush tasks scheduled (one per batching window)
    pub flushes_scheduled: u64,
    /// Flushes that reached the transport and succeeded
    pub flushes_committed: u64,
    /// Flushes that reached the transport and failed
    pub flushes_failed: u64,
    /// Add/Remove pairs cancelled inside a batch before reaching the transport
    pub mutations_elided: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlushTrigger {
    Deferred,
    Immediate,
}

struct SubscriptionEntry {
    descriptor: QueryDescriptor,
    status: SubscriptionStatus,
}

struct CoordinatorState {
    pending: Batch,
    flush_scheduled: bool,
    /// Every subscription that is pending, committed or active, in add order.
    subscriptions: IndexMap<SubscriptionId, SubscriptionEntry>,
    stats: CoordinatorStats,
}

impl CoordinatorState {
    /// Returns `true` when the caller must spawn the deferred flush.
    fn claim_schedule(&mut self) -> bool {
        if self.flush_scheduled {
            return false;
        }
        self.flush_scheduled = true;
        self.stats.flushes_scheduled += 1;
        true
    }

    /// Move the pending batch out, marking Adds as committed and dropping
    /// Removes whose target never became active.
    fn take_batch(&mut self) -> Vec<SubscriptionMutation> {
        let batch = std::mem::take(&mut self.pending);
        let mut mutations = Vec::with_capacity(batch.len());

        for mutation in batch.into_mutations() {
            match mutation.operation {
                SubscriptionOperation::Add => {
                    if let Some(entry) = self.subscriptions.get_mut(&mutation.id) {
                        entry.status = SubscriptionStatus::Committed;
                        mutations.push(mutation);
                    }
                },
                SubscriptionOperation::Remove => {
                    let active = self
                        .subscriptions
                        .get(&mutation.id)
                        .is_some_and(|entry| entry.status == SubscriptionStatus::Active);
                    if active {
                        mutations.push(mutation);
                    } else {
                        log::debug!(
                            "[BATCH] Dropping removal of {}: subscription is no longer tracked",
                            mutation.id
                        );
                    }
                },
            }
        }
        mutations
    }

    /// Apply the transport's verdict on a committed batch.
    fn settle_batch(
        &mut self,
        mutations: &[SubscriptionMutation],
        result: &OperationResult<()>,
    ) -> OperationResult<BatchReceipt> {
        match result {
            Ok(()) => {
                let mut receipt = BatchReceipt::default();
                for mutation in mutations {
                    match mutation.operation {
                        SubscriptionOperation::Add => {
                            if let Some(entry) = self.subscriptions.get_mut(&mutation.id) {
                                entry.status = SubscriptionStatus::Active;
                            }
                            receipt.added.push(mutation.id);
                        },
                        SubscriptionOperation::Remove => {
                            self.subscriptions.shift_remove(&mutation.id);
                            receipt.removed.push(mutation.id);
                        },
                    }
                }
                self.stats.flushes_committed += 1;
                Ok(receipt)
            },
            Err(err) => {
                self.revert_committed(mutations);
                self.stats.flushes_failed += 1;
                Err(err.clone())
            },
        }
    }

    /// Forget subscriptions introduced by a failed batch. Active
    /// subscriptions targeted by a Remove in that batch stay active.
    fn revert_committed(&mut self, mutations: &[SubscriptionMutation]) -> usize {
        let mut reverted = 0;
        for mutation in mutations.iter().filter(|m| m.is_add()) {
            let committed = self
                .subscriptions
                .get(&mutation.id)
                .is_some_and(|entry| entry.status == SubscriptionStatus::Committed);
            if committed {
                self.subscriptions.shift_remove(&mutation.id);
                reverted += 1;
            }
        }
        reverted
    }
}

struct CoordinatorInner {
    transport: ArcSyncTransport,
    options: CoordinatorOptions,
    state: Mutex<CoordinatorState>,
    /// Held for the whole of a flight; serializes flushes.
    flight: tokio::sync::Mutex<()>,
    tracker: AsyncOperationTracker<BatchReceipt>,
    /// Scheduled flush tasks plus `flush_now` calls still running.
    outstanding: watch::Sender<usize>,
}

/// Decrements the outstanding-work counter when dropped.
struct OutstandingWork(Arc<CoordinatorInner>);

impl Drop for OutstandingWork {
    fn drop(&mut self) {
        self.0.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }
}

impl CoordinatorInner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_work(self: &Arc<Self>) -> OutstandingWork {
        self.outstanding.send_modify(|n| *n += 1);
        OutstandingWork(Arc::clone(self))
    }

    fn spawn_deferred_flush(self: &Arc<Self>) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                log::warn!(
                    "[BATCH] No async runtime available; pending subscriptions wait for the next flush"
                );
                let mut state = self.lock_state();
                state.flush_scheduled = false;
                state.stats.flushes_scheduled = state.stats.flushes_scheduled.saturating_sub(1);
                return;
            },
        };

        let delay = self.options.effective_flush_delay(handle.runtime_flavor());
        let work = self.begin_work();
        let inner = Arc::clone(self);
        handle.spawn(async move {
            let _work = work;
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            // Failures are already recorded on the flush tracker.
            let _ = inner.flush(FlushTrigger::Deferred).await;
        });
    }

    async fn flush(self: &Arc<Self>, trigger: FlushTrigger) -> OperationResult<BatchReceipt> {
        let _flight = self.flight.lock().await;

        let mutations = {
            let mut state = self.lock_state();
            if trigger == FlushTrigger::Deferred {
                state.flush_scheduled = false;
            }
            state.take_batch()
        };

        if mutations.is_empty() {
            log::debug!("[FLUSH] Nothing to commit ({:?} flush)", trigger);
            return Ok(BatchReceipt::default());
        }

        log::debug!(
            "[FLUSH] Committing {} subscription mutation(s) ({:?} flush)",
            mutations.len(),
            trigger
        );

        let inner = Arc::clone(self);
        let committed = mutations.clone();
        let result = self
            .tracker
            .invoke(async move {
                let result = inner.transport.commit_subscriptions(committed.clone()).await;
                inner.lock_state().settle_batch(&committed, &result)
            })
            .await;

        match &result {
            Ok(receipt) => log::info!(
                "[FLUSH] Committed batch: {} added, {} removed",
                receipt.added.len(),
                receipt.removed.len()
            ),
            Err(err) => {
                // Settling already reverted the batch unless the commit task died
                // before reaching it.
                let reverted = self.lock_state().revert_committed(&mutations);
                log::warn!(
                    "[FLUSH] Batch of {} mutation(s) failed: {} ({} late revert(s))",
                    mutations.len(),
                    err,
                    reverted
                );
            },
        }
        result
    }
}

/// Coalesces subscription add/remove calls into batched commits.
///
/// Cloning is cheap; clones share the same pending batch and registry.
#[derive(Clone)]
pub struct SubscriptionBatchCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl fmt::Debug for SubscriptionBatchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("SubscriptionBatchCoordinator")
            .field("pending", &state.pending.len())
            .field("flush_scheduled", &state.flush_scheduled)
            .field("subscriptions", &state.subscriptions.len())
            .field("flush", &self.inner.tracker.state().label())
            .finish()
    }
}

impl SubscriptionBatchCoordinator {
    /// Create a coordinator with default options
    pub fn new(transport: ArcSyncTransport) -> Self {
        Self::with_options(transport, CoordinatorOptions::default())
    }

    /// Create a coordinator with explicit options
    pub fn with_options(transport: ArcSyncTransport, options: CoordinatorOptions) -> Self {
        if let Ok(handle) = Handle::try_current() {
            let effective = options.effective_flush_delay(handle.runtime_flavor());
            if effective != options.flush_delay() {
                log::warn!(
                    "[BATCH] Multi-thread runtime: batching window raised from {}ms to {}ms",
                    options.flush_delay_ms,
                    effective.as_millis()
                );
            }
        }
        let (outstanding, _) = watch::channel(0);
        Self {
            inner: Arc::new(CoordinatorInner {
                transport,
                options,
                state: Mutex::new(CoordinatorState {
                    pending: Batch::new(),
                    flush_scheduled: false,
                    subscriptions: IndexMap::new(),
                    stats: CoordinatorStats::default(),
                }),
                flight: tokio::sync::Mutex::new(()),
                tracker: AsyncOperationTracker::named("subscription flush"),
                outstanding,
            }),
        }
    }

    /// Declare a subscription.
    ///
    /// Returns the new id immediately; the subscription is `Pending` until the
    /// batch it joined is flushed.
    pub fn add(&self, descriptor: impl Into<QueryDescriptor>) -> SubscriptionId {
        let descriptor = descriptor.into();
        let id = SubscriptionId::next();

        let schedule = {
            let mut state = self.inner.lock_state();
            state.subscriptions.insert(
                id,
                SubscriptionEntry {
                    descriptor: descriptor.clone(),
                    status: SubscriptionStatus::Pending,
                },
            );
            state.pending.push_add(id, descriptor);
            state.claim_schedule()
        };

        log::debug!("[BATCH] Queued add {}", id);
        if schedule {
            self.inner.spawn_deferred_flush();
        }
        id
    }

    /// Withdraw a subscription.
    ///
    /// Unknown or already removed ids are ignored. Removing a subscription
    /// whose Add has not been flushed yet cancels it without any transport
    /// traffic.
    pub fn remove(&self, id: SubscriptionId) {
        let schedule = {
            let mut state = self.inner.lock_state();
            let descriptor = match state.subscriptions.get(&id) {
                Some(entry) => entry.descriptor.clone(),
                None => {
                    log::debug!("[BATCH] Ignoring removal of unknown subscription {}", id);
                    return;
                },
            };

            match state.pending.push_remove(id, descriptor) {
                RemoveOutcome::Elided => {
                    state.subscriptions.shift_remove(&id);
                    state.stats.mutations_elided += 1;
                    log::debug!("[BATCH] Elided add/remove pair for {}", id);
                    false
                },
                RemoveOutcome::Queued => {
                    log::debug!("[BATCH] Queued remove {}", id);
                    state.claim_schedule()
                },
                RemoveOutcome::AlreadyQueued => false,
            }
        };

        if schedule {
            self.inner.spawn_deferred_flush();
        }
    }

    /// Like [`add`](Self::add), but the subscription is removed when the
    /// returned guard is dropped.
    pub fn add_scoped(&self, descriptor: impl Into<QueryDescriptor>) -> super::SubscriptionGuard {
        let id = self.add(descriptor);
        super::SubscriptionGuard::new(self.clone(), id)
    }

    /// Flush the pending batch now instead of waiting for the deferred task.
    ///
    /// Still waits for any flight in progress first. Resolves with an empty
    /// receipt, without calling the transport, when nothing is pending.
    pub async fn flush_now(&self) -> OperationResult<BatchReceipt> {
        let _work = self.inner.begin_work();
        self.inner.flush(FlushTrigger::Immediate).await
    }

    /// Wait until no flush is scheduled or in flight.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.outstanding.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }

    /// Lifecycle state of `id`; `None` once removed, reverted or never added
    pub fn status(&self, id: SubscriptionId) -> Option<SubscriptionStatus> {
        self.inner
            .lock_state()
            .subscriptions
            .get(&id)
            .map(|entry| entry.status)
    }

    /// Every tracked subscription, in add order
    pub fn subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.inner
            .lock_state()
            .subscriptions
            .iter()
            .map(|(id, entry)| SubscriptionInfo {
                id: *id,
                descriptor: entry.descriptor.clone(),
                status: entry.status,
            })
            .collect()
    }

    /// Subscriptions acknowledged by the transport, in add order
    pub fn active_subscriptions(&self) -> Vec<SubscriptionInfo> {
        self.subscriptions()
            .into_iter()
            .filter(|info| info.status == SubscriptionStatus::Active)
            .collect()
    }

    /// Net mutations waiting for the next flush
    pub fn pending_mutations(&self) -> Vec<SubscriptionMutation> {
        self.inner.lock_state().pending.mutations().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock_state().pending.len()
    }

    /// `true` while a deferred flush is scheduled but has not taken its batch
    pub fn is_flush_scheduled(&self) -> bool {
        self.inner.lock_state().flush_scheduled
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.inner.lock_state().stats.clone()
    }

    /// Read-only view of the tracker reporting the most recent flush
    pub fn flush_tracker(&self) -> TrackerView<BatchReceipt> {
        self.inner.tracker.view()
    }

    /// Snapshot of the most recent flush
    pub fn flush_state(&self) -> OperationState<BatchReceipt> {
        self.inner.tracker.state()
    }

    /// Follow flush state changes
    pub fn subscribe_flush(&self) -> watch::Receiver<OperationState<BatchReceipt>> {
        self.inner.tracker.subscribe()
    }

    pub fn options(&self) -> &CoordinatorOptions {
        &self.inner.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::OperationError,
        models::{Credentials, RegisterFields, User},
        transport::SyncTransport,
    };

    struct Unreachable;

    #[async_trait::async_trait]
    impl SyncTransport for Unreachable {
        async fn login(&self, _credentials: Credentials) -> OperationResult<User> {
            Err(OperationError::unknown("unreachable"))
        }

        async fn register(&self, _fields: RegisterFields) -> OperationResult<Option<User>> {
            Err(OperationError::unknown("unreachable"))
        }

        async fn send_reset_password_email(&self, _email: String) -> OperationResult<()> {
            Err(OperationError::unknown("unreachable"))
        }

        async fn reset_password(
            &self,
            _token: String,
            _token_id: String,
            _password: String,
        ) -> OperationResult<()> {
            Err(OperationError::unknown("unreachable"))
        }

        async fn commit_subscriptions(
            &self,
            _batch: Vec<SubscriptionMutation>,
        ) -> OperationResult<()> {
            Err(OperationError::unknown("unreachable"))
        }
    }

    fn state() -> CoordinatorState {
        CoordinatorState {
            pending: Batch::new(),
            flush_scheduled: false,
            subscriptions: IndexMap::new(),
            stats: CoordinatorStats::default(),
        }
    }

    fn track(
        state: &mut CoordinatorState,
        name: &str,
        status: SubscriptionStatus,
    ) -> SubscriptionId {
        let id = SubscriptionId::next();
        state.subscriptions.insert(
            id,
            SubscriptionEntry {
                descriptor: QueryDescriptor::collection(name),
                status,
            },
        );
        id
    }

    #[test]
    fn test_claim_schedule_once_per_window() {
        let mut state = state();
        assert!(state.claim_schedule());
        assert!(!state.claim_schedule());
        assert_eq!(state.stats.flushes_scheduled, 1);

        state.flush_scheduled = false;
        assert!(state.claim_schedule());
        assert_eq!(state.stats.flushes_scheduled, 2);
    }

    #[test]
    fn test_take_batch_marks_adds_committed_and_drops_stale_removes() {
        let mut state = state();
        let cat = track(&mut state, "Cat", SubscriptionStatus::Pending);
        let dog = track(&mut state, "Dog", SubscriptionStatus::Active);
        let gone = SubscriptionId::next();

        state.pending.push_add(cat, QueryDescriptor::collection("Cat"));
        state.pending.push_remove(dog, QueryDescriptor::collection("Dog"));
        state.pending.push_remove(gone, QueryDescriptor::collection("Gone"));

        let mutations = state.take_batch();
        let ids: Vec<_> = mutations.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![cat, dog]);
        assert_eq!(state.pending.len(), 0);
        assert_eq!(state.subscriptions[&cat].status, SubscriptionStatus::Committed);
    }

    #[test]
    fn test_settle_success_builds_receipt() {
        let mut state = state();
        let cat = track(&mut state, "Cat", SubscriptionStatus::Committed);
        let dog = track(&mut state, "Dog", SubscriptionStatus::Active);
        let mutations = vec![
            SubscriptionMutation::add(cat, QueryDescriptor::collection("Cat")),
            SubscriptionMutation::remove(dog, QueryDescriptor::collection("Dog")),
        ];

        let receipt = state.settle_batch(&mutations, &Ok(())).unwrap();

        assert_eq!(receipt.added, vec![cat]);
        assert_eq!(receipt.removed, vec![dog]);
        assert_eq!(state.subscriptions[&cat].status, SubscriptionStatus::Active);
        assert!(!state.subscriptions.contains_key(&dog));
        assert_eq!(state.stats.flushes_committed, 1);
    }

    #[test]
    fn test_settle_failure_reverts_adds_only() {
        let mut state = state();
        let cat = track(&mut state, "Cat", SubscriptionStatus::Committed);
        let dog = track(&mut state, "Dog", SubscriptionStatus::Active);
        let mutations = vec![
            SubscriptionMutation::add(cat, QueryDescriptor::collection("Cat")),
            SubscriptionMutation::remove(dog, QueryDescriptor::collection("Dog")),
        ];

        let err = state
            .settle_batch(&mutations, &Err(OperationError::unknown("down")))
            .unwrap_err();

        assert_eq!(err.message, "down");
        assert!(!state.subscriptions.contains_key(&cat));
        assert_eq!(state.subscriptions[&dog].status, SubscriptionStatus::Active);
        assert_eq!(state.stats.flushes_failed, 1);
        // Already reverted; nothing left for a second pass
        assert_eq!(state.revert_committed(&mutations), 0);
    }

    #[test]
    fn test_mutations_without_runtime_stay_pending() {
        let coordinator = SubscriptionBatchCoordinator::new(Arc::new(Unreachable));

        let cat = coordinator.add("Cat");
        assert_eq!(coordinator.status(cat), Some(SubscriptionStatus::Pending));
        assert_eq!(coordinator.pending_len(), 1);
        assert!(!coordinator.is_flush_scheduled());
        assert_eq!(coordinator.stats().flushes_scheduled, 0);

        {
            let _guard = coordinator.add_scoped("Dog");
        }
        assert_eq!(coordinator.pending_len(), 1);
        assert_eq!(coordinator.stats().mutations_elided, 1);
    }
}
