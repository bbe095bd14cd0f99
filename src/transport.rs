//! Transport seam between the binding layer and the sync service.
//!
//! kalam-bind never talks to the network itself. Applications plug in a
//! [`SyncTransport`] (HTTP client, WebSocket session, in-process engine, test
//! double) and the binding layer drives it from trackers and the subscription
//! coordinator.
//!
//! ```rust,no_run
//! use kalam_bind::{
//!     Credentials, OperationError, OperationResult, RegisterFields, SubscriptionMutation,
//!     SyncTransport, User,
//! };
//!
//! struct Offline;
//!
//! #[async_trait::async_trait]
//! impl SyncTransport for Offline {
//!     async fn login(&self, credentials: Credentials) -> OperationResult<User> {
//!         Ok(User::new("local").with_email(credentials.email))
//!     }
//!     async fn register(&self, _fields: RegisterFields) -> OperationResult<Option<User>> {
//!         Err(OperationError::unknown("registration needs a connection"))
//!     }
//!     async fn send_reset_password_email(&self, _email: String) -> OperationResult<()> {
//!         Ok(())
//!     }
//!     async fn reset_password(
//!         &self,
//!         _token: String,
//!         _token_id: String,
//!         _password: String,
//!     ) -> OperationResult<()> {
//!         Ok(())
//!     }
//!     async fn commit_subscriptions(
//!         &self,
//!         _batch: Vec<SubscriptionMutation>,
//!     ) -> OperationResult<()> {
//!         Ok(())
//!     }
//! }
//! ```

use crate::error::OperationResult;
use crate::models::{Credentials, RegisterFields, SubscriptionMutation, User};
use std::sync::Arc;

/// Asynchronous client for the authentication and subscription endpoints of
/// the sync service.
///
/// Every call either resolves with a value or fails with an
/// [`OperationError`](crate::OperationError) carrying a classified kind.
/// Timeouts and retries on the wire are the implementation's concern; the
/// binding layer imposes none.
#[async_trait::async_trait]
pub trait SyncTransport: Send + Sync + 'static {
    /// Authenticate with email and password
    async fn login(&self, credentials: Credentials) -> OperationResult<User>;

    /// Create an account. Some services log the new user in directly, others
    /// require confirmation first and return `None`.
    async fn register(&self, fields: RegisterFields) -> OperationResult<Option<User>>;

    /// Start the password reset flow for `email`
    async fn send_reset_password_email(&self, email: String) -> OperationResult<()>;

    /// Complete the password reset flow
    async fn reset_password(
        &self,
        token: String,
        token_id: String,
        password: String,
    ) -> OperationResult<()>;

    /// Apply one batch of subscription mutations atomically
    async fn commit_subscriptions(&self, batch: Vec<SubscriptionMutation>)
        -> OperationResult<()>;
}

/// A reference-counted [`SyncTransport`].
pub type ArcSyncTransport = Arc<dyn SyncTransport>;
