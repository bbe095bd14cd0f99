//! Pending batch of subscription mutations.
//!
//! Keyed by subscription id with insertion order preserved, so a flush sends
//! mutations in the order they were first requested and each id carries at
//! most one net operation.

use crate::models::{QueryDescriptor, SubscriptionId, SubscriptionMutation};
use indexmap::IndexMap;

/// Result of queueing a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    /// The id's Add was still in this batch; both cancel out
    Elided,
    /// A Remove was appended
    Queued,
    /// A Remove for the id was already queued
    AlreadyQueued,
}

/// Net subscription mutations collected since the last flush.
#[derive(Debug, Default)]
pub(crate) struct Batch {
    ops: IndexMap<SubscriptionId, SubscriptionMutation>,
}

impl Batch {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue an Add for a freshly allocated id.
    pub(crate) fn push_add(&mut self, id: SubscriptionId, descriptor: QueryDescriptor) {
        self.ops.insert(id, SubscriptionMutation::add(id, descriptor));
    }

    /// Queue a Remove, cancelling a same-batch Add instead when there is one.
    pub(crate) fn push_remove(
        &mut self,
        id: SubscriptionId,
        descriptor: QueryDescriptor,
    ) -> RemoveOutcome {
        match self.ops.get(&id) {
            Some(existing) if existing.is_add() => {
                self.ops.shift_remove(&id);
                RemoveOutcome::Elided
            },
            Some(_) => RemoveOutcome::AlreadyQueued,
            None => {
                self.ops.insert(id, SubscriptionMutation::remove(id, descriptor));
                RemoveOutcome::Queued
            },
        }
    }

    /// Number of net mutations
    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    /// Mutations in first-request order
    pub(crate) fn mutations(&self) -> impl Iterator<Item = &SubscriptionMutation> {
        self.ops.values()
    }

    pub(crate) fn into_mutations(self) -> impl Iterator<Item = SubscriptionMutation> {
        self.ops.into_values()
    }
}
