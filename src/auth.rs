//! Email/password authentication bound to observable trackers.
//!
//! [`AuthBinding`] owns one [`AsyncOperationTracker`] per auth operation so UI
//! code can render `loading`, `success` and `error` for each button
//! independently. Requests are checked client-side first; obviously malformed
//! input fails with [`ErrorKind::MalformedRequest`](crate::ErrorKind) without a
//! round trip.
//!
//! Operations run on the current tokio runtime. Called outside one, they fail
//! immediately with `ErrorKind::Unknown` instead of reaching the transport.
//!
//! # Example
//!
//! ```rust,no_run
//! use kalam_bind::{AuthBinding, ArcSyncTransport, Credentials};
//!
//! # async fn example(transport: ArcSyncTransport) {
//! let auth = AuthBinding::new(transport);
//!
//! let handle = auth.login(Credentials::email_password("a@b.com", "secret123"));
//! assert!(auth.login_state().is_loading());
//!
//! match handle.await {
//!     Ok(user) => println!("Logged in as {}", user.id),
//!     Err(err) => eprintln!("Login failed ({}): {}", err.kind, err.message),
//! }
//! # }
//! ```

use crate::{
    error::{OperationError, OperationResult},
    models::{Credentials, RegisterFields, ResetPasswordRequest, User},
    options::AuthOptions,
    tracker::{AsyncOperationTracker, OperationHandle, OperationState, TrackerView},
    transport::ArcSyncTransport,
};
use std::{fmt, sync::Arc};
use tokio::sync::watch;

/// Observable auth operations backed by a [`SyncTransport`](crate::SyncTransport).
///
/// Cloning is cheap; clones share trackers and the current user.
#[derive(Clone)]
pub struct AuthBinding {
    transport: ArcSyncTransport,
    options: AuthOptions,
    login: AsyncOperationTracker<User>,
    register: AsyncOperationTracker<Option<User>>,
    send_reset: AsyncOperationTracker<()>,
    reset: AsyncOperationTracker<()>,
    current_user: Arc<watch::Sender<Option<User>>>,
}

impl fmt::Debug for AuthBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthBinding")
            .field("login", &self.login.state().label())
            .field("register", &self.register.state().label())
            .field("send_reset_password_email", &self.send_reset.state().label())
            .field("reset_password", &self.reset.state().label())
            .field("logged_in", &self.current_user.borrow().is_some())
            .finish()
    }
}

impl AuthBinding {
    /// Create a binding with default options
    pub fn new(transport: ArcSyncTransport) -> Self {
        Self::with_options(transport, AuthOptions::default())
    }

    pub fn with_options(transport: ArcSyncTransport, options: AuthOptions) -> Self {
        let (current_user, _) = watch::channel(None);
        Self {
            transport,
            options,
            login: AsyncOperationTracker::named("login"),
            register: AsyncOperationTracker::named("register"),
            send_reset: AsyncOperationTracker::named("send reset password email"),
            reset: AsyncOperationTracker::named("reset password"),
            current_user: Arc::new(current_user),
        }
    }

    /// Log in with email and password.
    ///
    /// On success the user is also published as the current user, unless a
    /// later login or [`log_out`](Self::log_out) has superseded this call.
    pub fn login(&self, credentials: Credentials) -> OperationHandle<User> {
        let checked = self
            .check_email(&credentials.email)
            .and_then(|_| self.check_password(&credentials.password));
        let transport = Arc::clone(&self.transport);
        let current_user = Arc::clone(&self.current_user);

        self.login.invoke_publishing(
            async move {
                checked?;
                log::debug!("[AUTH] Logging in '{}'", credentials.email);
                transport.login(credentials).await
            },
            move |user| {
                log::debug!("[AUTH] Logged in as '{}'", user.id);
                current_user.send_replace(Some(user.clone()));
            },
        )
    }

    /// Register a new account.
    ///
    /// Resolves with the new user when the service logs them in directly,
    /// `None` when it requires confirmation first.
    pub fn register(&self, fields: RegisterFields) -> OperationHandle<Option<User>> {
        let checked = self
            .check_email(&fields.email)
            .and_then(|_| self.check_password(&fields.password));
        let transport = Arc::clone(&self.transport);

        self.register.invoke(async move {
            checked?;
            log::debug!("[AUTH] Registering '{}'", fields.email);
            transport.register(fields).await
        })
    }

    /// Ask the service to email a password reset link
    pub fn send_reset_password_email(&self, email: impl Into<String>) -> OperationHandle<()> {
        let email = email.into();
        let checked = self.check_email(&email);
        let transport = Arc::clone(&self.transport);

        self.send_reset.invoke(async move {
            checked?;
            log::debug!("[AUTH] Requesting password reset for '{}'", email);
            transport.send_reset_password_email(email).await
        })
    }

    /// Complete a password reset with the token from the reset email
    pub fn reset_password(&self, request: ResetPasswordRequest) -> OperationHandle<()> {
        let checked = check_present("token", &request.token)
            .and_then(|_| check_present("token id", &request.token_id))
            .and_then(|_| self.check_password(&request.password));
        let transport = Arc::clone(&self.transport);

        self.reset.invoke(async move {
            checked?;
            log::debug!("[AUTH] Resetting password");
            transport
                .reset_password(request.token, request.token_id, request.password)
                .await
        })
    }

    /// Forget the current user and return the login tracker to `Idle`.
    ///
    /// Local only; the transport is not involved.
    pub fn log_out(&self) {
        // Reset first: a login settling after this point is stale and cannot
        // publish its user.
        self.login.reset();
        self.current_user.send_replace(None);
        log::debug!("[AUTH] Logged out");
    }

    /// User from the most recent successful login
    pub fn current_user(&self) -> Option<User> {
        self.current_user.borrow().clone()
    }

    /// Follow login/logout changes
    pub fn subscribe_current_user(&self) -> watch::Receiver<Option<User>> {
        self.current_user.subscribe()
    }

    pub fn login_tracker(&self) -> TrackerView<User> {
        self.login.view()
    }

    pub fn register_tracker(&self) -> TrackerView<Option<User>> {
        self.register.view()
    }

    pub fn send_reset_password_email_tracker(&self) -> TrackerView<()> {
        self.send_reset.view()
    }

    pub fn reset_password_tracker(&self) -> TrackerView<()> {
        self.reset.view()
    }

    pub fn login_state(&self) -> OperationState<User> {
        self.login.state()
    }

    pub fn register_state(&self) -> OperationState<Option<User>> {
        self.register.state()
    }

    pub fn send_reset_password_email_state(&self) -> OperationState<()> {
        self.send_reset.state()
    }

    pub fn reset_password_state(&self) -> OperationState<()> {
        self.reset.state()
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    fn check_email(&self, email: &str) -> OperationResult<()> {
        check_present("email", email)?;
        if !email.contains('@') {
            return Err(OperationError::malformed_request(format!(
                "'{}' is not a valid email address",
                email
            )));
        }
        Ok(())
    }

    fn check_password(&self, password: &str) -> OperationResult<()> {
        check_present("password", password)?;
        if let Some(min) = self.options.min_password_length {
            if password.chars().count() < min {
                return Err(OperationError::malformed_request(format!(
                    "password must be at least {} characters",
                    min
                )));
            }
        }
        Ok(())
    }
}

fn check_present(field: &str, value: &str) -> OperationResult<()> {
    if value.trim().is_empty() {
        return Err(OperationError::malformed_request(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}
