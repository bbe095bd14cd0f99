//! Main kalam-bind client with builder pattern.
//!
//! Bundles an [`AuthBinding`] and a [`SubscriptionBatchCoordinator`] over one
//! shared [`SyncTransport`](crate::SyncTransport).

use crate::{
    auth::AuthBinding,
    error::{KalamBindError, Result},
    options::{AuthOptions, BindOptions, CoordinatorOptions},
    subscription::SubscriptionBatchCoordinator,
    transport::ArcSyncTransport,
};
use std::{fmt, sync::Arc, time::Duration};

/// Entry point for data-binding code.
///
/// Use [`KalamBindClientBuilder`] to construct instances.
///
/// # Examples
///
/// ```rust,no_run
/// use kalam_bind::{ArcSyncTransport, Credentials, KalamBindClient, QueryDescriptor};
///
/// # async fn example(transport: ArcSyncTransport) -> kalam_bind::Result<()> {
/// let client = KalamBindClient::builder()
///     .transport(transport)
///     .flush_delay(std::time::Duration::from_millis(16))
///     .build()?;
///
/// let user = client
///     .auth()
///     .login(Credentials::email_password("a@b.com", "secret123"))
///     .await?;
///
/// let dogs = client.subscriptions().add(QueryDescriptor::collection("Dog"));
/// client.subscriptions().wait_until_idle().await;
/// # let _ = (user, dogs);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KalamBindClient {
    transport: ArcSyncTransport,
    options: BindOptions,
    auth: AuthBinding,
    subscriptions: SubscriptionBatchCoordinator,
}

impl fmt::Debug for KalamBindClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KalamBindClient")
            .field("options", &self.options)
            .field("auth", &self.auth)
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl KalamBindClient {
    /// Create a new builder for configuring the client
    pub fn builder() -> KalamBindClientBuilder {
        KalamBindClientBuilder::new()
    }

    /// Auth operations and their trackers
    pub fn auth(&self) -> &AuthBinding {
        &self.auth
    }

    /// The client's shared subscription coordinator
    pub fn subscriptions(&self) -> &SubscriptionBatchCoordinator {
        &self.subscriptions
    }

    /// Create an independent coordinator over the same transport.
    ///
    /// Its batches and flushes are not ordered against the shared one.
    pub fn new_coordinator(&self) -> SubscriptionBatchCoordinator {
        SubscriptionBatchCoordinator::with_options(
            Arc::clone(&self.transport),
            self.options.coordinator.clone(),
        )
    }

    pub fn options(&self) -> &BindOptions {
        &self.options
    }
}

/// Builder for configuring [`KalamBindClient`] instances.
pub struct KalamBindClientBuilder {
    transport: Option<ArcSyncTransport>,
    options: BindOptions,
}

impl KalamBindClientBuilder {
    fn new() -> Self {
        Self {
            transport: None,
            options: BindOptions::default(),
        }
    }

    /// Set the transport used for every remote call (required)
    pub fn transport(mut self, transport: ArcSyncTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace all options at once
    ///
    /// Overrides earlier `flush_delay` / `min_password_length` calls.
    pub fn options(mut self, options: BindOptions) -> Self {
        self.options = options;
        self
    }

    pub fn coordinator_options(mut self, options: CoordinatorOptions) -> Self {
        self.options.coordinator = options;
        self
    }

    pub fn auth_options(mut self, options: AuthOptions) -> Self {
        self.options.auth = options;
        self
    }

    /// Set the subscription accumulation window
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.options.coordinator.flush_delay_ms =
            u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Reject passwords shorter than `min` before they reach the transport
    pub fn min_password_length(mut self, min: usize) -> Self {
        self.options.auth.min_password_length = Some(min);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<KalamBindClient> {
        let transport = self
            .transport
            .ok_or_else(|| KalamBindError::ConfigurationError("transport is required".into()))?;
        self.options.validate()?;

        log::debug!(
            "[CLIENT] Building client (flush_delay_ms={}, min_password_length={:?})",
            self.options.coordinator.flush_delay_ms,
            self.options.auth.min_password_length
        );

        let auth = AuthBinding::with_options(Arc::clone(&transport), self.options.auth.clone());
        let subscriptions = SubscriptionBatchCoordinator::with_options(
            Arc::clone(&transport),
            self.options.coordinator.clone(),
        );

        Ok(KalamBindClient {
            transport,
            options: self.options,
            auth,
            subscriptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::OperationResult,
        models::{Credentials, RegisterFields, SubscriptionMutation, User},
        transport::SyncTransport,
    };

    struct Offline;

    #[async_trait::async_trait]
    impl SyncTransport for Offline {
        async fn login(&self, _credentials: Credentials) -> OperationResult<User> {
            Err(crate::OperationError::unknown("offline"))
        }

        async fn register(&self, _fields: RegisterFields) -> OperationResult<Option<User>> {
            Err(crate::OperationError::unknown("offline"))
        }

        async fn send_reset_password_email(&self, _email: String) -> OperationResult<()> {
            Err(crate::OperationError::unknown("offline"))
        }

        async fn reset_password(
            &self,
            _token: String,
            _token_id: String,
            _password: String,
        ) -> OperationResult<()> {
            Err(crate::OperationError::unknown("offline"))
        }

        async fn commit_subscriptions(
            &self,
            _mutations: Vec<SubscriptionMutation>,
        ) -> OperationResult<()> {
            Err(crate::OperationError::unknown("offline"))
        }
    }

    #[test]
    fn test_builder_pattern() {
        let client = KalamBindClient::builder()
            .transport(Arc::new(Offline))
            .flush_delay(Duration::from_millis(16))
            .min_password_length(8)
            .build()
            .unwrap();

        assert_eq!(client.options().coordinator.flush_delay_ms, 16);
        assert_eq!(client.options().auth.min_password_length, Some(8));
        assert_eq!(client.subscriptions().options().flush_delay_ms, 16);
        assert_eq!(client.auth().options().min_password_length, Some(8));
    }

    #[test]
    fn test_builder_missing_transport() {
        let result = KalamBindClient::builder().build();
        assert!(matches!(result, Err(KalamBindError::ConfigurationError(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_options() {
        let result = KalamBindClient::builder()
            .transport(Arc::new(Offline))
            .flush_delay(Duration::from_secs(3600))
            .build();
        assert!(matches!(result, Err(KalamBindError::ConfigurationError(_))));
    }

    #[test]
    fn test_new_coordinator_is_independent() {
        let client = KalamBindClient::builder()
            .transport(Arc::new(Offline))
            .build()
            .unwrap();

        let other = client.new_coordinator();
        let id = other.add("Dog");

        assert!(other.status(id).is_some());
        assert!(client.subscriptions().status(id).is_none());
        assert!(client.subscriptions().subscriptions().is_empty());
    }
}
