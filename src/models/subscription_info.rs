use serde::{Deserialize, Serialize};

use super::query_descriptor::QueryDescriptor;
use super::subscription_id::SubscriptionId;
use super::subscription_status::SubscriptionStatus;

/// Snapshot of one subscription tracked by a coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub descriptor: QueryDescriptor,
    pub status: SubscriptionStatus,
}
