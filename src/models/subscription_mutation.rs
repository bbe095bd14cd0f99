use serde::{Deserialize, Serialize};

use super::query_descriptor::QueryDescriptor;
use super::subscription_id::SubscriptionId;

/// Kind of change requested for a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionOperation {
    Add,
    Remove,
}

/// One entry of a committed batch, as handed to
/// [`SyncTransport::commit_subscriptions`](crate::SyncTransport::commit_subscriptions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionMutation {
    /// Subscription the mutation applies to
    pub id: SubscriptionId,
    /// Add or Remove
    pub operation: SubscriptionOperation,
    /// Query the subscription was registered with (also sent for removals)
    pub descriptor: QueryDescriptor,
}

impl SubscriptionMutation {
    pub fn add(id: SubscriptionId, descriptor: QueryDescriptor) -> Self {
        Self {
            id,
            operation: SubscriptionOperation::Add,
            descriptor,
        }
    }

    pub fn remove(id: SubscriptionId, descriptor: QueryDescriptor) -> Self {
        Self {
            id,
            operation: SubscriptionOperation::Remove,
            descriptor,
        }
    }

    pub fn is_add(&self) -> bool {
        self.operation == SubscriptionOperation::Add
    }
}
