//! RAII handle tying a subscription to the lifetime of its owner.

use super::coordinator::SubscriptionBatchCoordinator;
use crate::models::{SubscriptionId, SubscriptionStatus};
use std::fmt;

/// Removes its subscription from the coordinator when dropped.
///
/// Intended for component-scoped subscriptions: create it on mount with
/// [`SubscriptionBatchCoordinator::add_scoped`] and let unmount drop it. The
/// removal goes through the normal batching path, so a guard created and
/// dropped within the same tick never reaches the transport.
pub struct SubscriptionGuard {
    coordinator: SubscriptionBatchCoordinator,
    id: SubscriptionId,
    armed: bool,
}

impl SubscriptionGuard {
    pub(crate) fn new(coordinator: SubscriptionBatchCoordinator, id: SubscriptionId) -> Self {
        Self {
            coordinator,
            id,
            armed: true,
        }
    }

    /// Id of the guarded subscription
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Current lifecycle state of the guarded subscription
    pub fn status(&self) -> Option<SubscriptionStatus> {
        self.coordinator.status(self.id)
    }

    /// Give up the guard without removing the subscription.
    pub fn detach(mut self) -> SubscriptionId {
        self.armed = false;
        self.id
    }
}

impl fmt::Debug for SubscriptionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionGuard")
            .field("id", &self.id)
            .field("armed", &self.armed)
            .finish()
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.remove(self.id);
        }
    }
}
