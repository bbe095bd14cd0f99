//! # kalam-bind: observable data binding for KalamDB sync clients
//!
//! Glue between UI code and an asynchronous sync service. Network-backed
//! operations are exposed as observable state machines, and subscription
//! changes made in quick succession are coalesced into one round trip.
//!
//! ## Features
//!
//! - **Operation trackers**: `idle → loading → success | error` for any async
//!   operation, with last-invocation-wins semantics
//! - **Subscription batching**: adds and removes within one scheduler turn
//!   reach the transport as a single net batch
//! - **Auth binding**: login, registration and password reset with one tracker
//!   per operation
//! - **Pluggable transport**: bring your own [`SyncTransport`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kalam_bind::{ArcSyncTransport, Credentials, KalamBindClient, QueryDescriptor};
//!
//! # async fn example(transport: ArcSyncTransport) -> kalam_bind::Result<()> {
//! let client = KalamBindClient::builder().transport(transport).build()?;
//!
//! // Observe the login button
//! let mut login = client.auth().login_tracker().subscribe();
//! let handle = client
//!     .auth()
//!     .login(Credentials::email_password("a@b.com", "secret123"));
//! login.changed().await.ok();
//! println!("login: {}", login.borrow().label());
//! handle.await?;
//!
//! // Both subscriptions go out in one commit
//! let subs = client.subscriptions();
//! let dogs = subs.add(QueryDescriptor::collection("Dog").with_filter("age > 10"));
//! let cats = subs.add("Cat");
//! subs.wait_until_idle().await;
//! # let _ = (dogs, cats);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod options;
pub mod subscription;
pub mod tracker;
pub mod transport;

// Re-export main types for convenience
pub use auth::AuthBinding;
pub use client::{KalamBindClient, KalamBindClientBuilder};
pub use error::{ErrorKind, KalamBindError, OperationError, OperationResult, Result};
pub use models::{
    BatchReceipt, Credentials, QueryDescriptor, RegisterFields, ResetPasswordRequest,
    SubscriptionId, SubscriptionInfo, SubscriptionMutation, SubscriptionOperation,
    SubscriptionStatus, User,
};
pub use options::{AuthOptions, BindOptions, CoordinatorOptions};
pub use subscription::{CoordinatorStats, SubscriptionBatchCoordinator, SubscriptionGuard};
pub use tracker::{AsyncOperationTracker, OperationHandle, OperationState, TrackerView};
pub use transport::{ArcSyncTransport, SyncTransport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
