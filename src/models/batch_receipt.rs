use serde::{Deserialize, Serialize};

use super::subscription_id::SubscriptionId;

/// Outcome of a successful flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    /// Subscriptions that became active, in commit order
    pub added: Vec<SubscriptionId>,
    /// Subscriptions whose removal was committed, in commit order
    pub removed: Vec<SubscriptionId>,
}

impl BatchReceipt {
    /// `true` when the flush had nothing to send
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Number of mutations the flush committed
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}
