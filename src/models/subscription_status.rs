use serde::{Deserialize, Serialize};

/// Lifecycle of a subscription tracked by the coordinator.
///
/// Removed and failed subscriptions are forgotten, so they show up as
/// absent (`None`) rather than as a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Queued in the pending batch, not yet sent
    Pending,
    /// Part of a batch whose flush is in flight
    Committed,
    /// Acknowledged by the transport
    Active,
}
