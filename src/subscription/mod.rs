//! Batched live-query subscriptions.
//!
//! - [`SubscriptionBatchCoordinator`] collects add/remove calls made within
//!   one batching window and commits them as a single transport call.
//! - [`SubscriptionGuard`] removes a subscription when its owner goes away.

mod batch;
mod coordinator;
mod guard;

pub use coordinator::{CoordinatorStats, SubscriptionBatchCoordinator};
pub use guard::SubscriptionGuard;
