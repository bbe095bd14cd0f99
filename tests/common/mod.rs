//! In-memory `SyncTransport` for integration tests.
//!
//! Records every call, lets a test script failures, and can hold commits or
//! individual logins in flight until the test releases them.

#![allow(dead_code)]

use async_trait::async_trait;
use kalam_bind::{
    ArcSyncTransport, Credentials, OperationError, OperationResult, RegisterFields,
    SubscriptionMutation, SyncTransport, User,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};

/// Shortest password the mock "server" accepts
pub const SERVER_MIN_PASSWORD: usize = 8;

/// Token accepted by `reset_password`
pub const VALID_RESET_TOKEN: &str = "valid-token";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct ScriptedLogin {
    result: OperationResult<User>,
    release: Option<oneshot::Receiver<()>>,
}

pub struct MockTransport {
    accounts: Mutex<HashMap<String, String>>,
    login_script: Mutex<VecDeque<ScriptedLogin>>,
    login_calls: AtomicUsize,
    register_calls: AtomicUsize,
    reset_emails: Mutex<Vec<String>>,
    password_resets: Mutex<Vec<(String, String, String)>>,
    commits: Mutex<Vec<Vec<SubscriptionMutation>>>,
    commit_failures: Mutex<VecDeque<OperationError>>,
    /// `true` while commits may proceed
    commit_gate: watch::Sender<bool>,
    /// Commits that have started, including held ones
    commit_calls: watch::Sender<usize>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        let (commit_gate, _) = watch::channel(true);
        let (commit_calls, _) = watch::channel(0);
        Arc::new(Self {
            accounts: Mutex::new(HashMap::new()),
            login_script: Mutex::new(VecDeque::new()),
            login_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            reset_emails: Mutex::new(Vec::new()),
            password_resets: Mutex::new(Vec::new()),
            commits: Mutex::new(Vec::new()),
            commit_failures: Mutex::new(VecDeque::new()),
            commit_gate,
            commit_calls,
        })
    }

    pub fn transport(self: &Arc<Self>) -> ArcSyncTransport {
        Arc::clone(self) as ArcSyncTransport
    }

    pub fn with_account(self: Arc<Self>, email: &str, password: &str) -> Arc<Self> {
        self.accounts
            .lock()
            .unwrap()
            .insert(email.to_string(), password.to_string());
        self
    }

    // ── auth ─────────────────────────────────────────────────────────────────

    /// Resolve the next login with `result` instead of checking accounts
    pub fn script_login(&self, result: OperationResult<User>) {
        self.login_script.lock().unwrap().push_back(ScriptedLogin {
            result,
            release: None,
        });
    }

    /// Like `script_login`, but the call blocks until the sender fires
    pub fn script_login_gated(&self, result: OperationResult<User>) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.login_script.lock().unwrap().push_back(ScriptedLogin {
            result,
            release: Some(rx),
        });
        tx
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn reset_emails(&self) -> Vec<String> {
        self.reset_emails.lock().unwrap().clone()
    }

    pub fn password_resets(&self) -> Vec<(String, String, String)> {
        self.password_resets.lock().unwrap().clone()
    }

    // ── subscriptions ────────────────────────────────────────────────────────

    /// Every batch passed to `commit_subscriptions`, failed ones included
    pub fn commits(&self) -> Vec<Vec<SubscriptionMutation>> {
        self.commits.lock().unwrap().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    pub fn fail_next_commit(&self, err: OperationError) {
        self.commit_failures.lock().unwrap().push_back(err);
    }

    /// Make commits wait in flight until `release_commits`
    pub fn hold_commits(&self) {
        self.commit_gate.send_replace(false);
    }

    pub fn release_commits(&self) {
        self.commit_gate.send_replace(true);
    }

    /// Wait until at least `n` commits have started
    pub async fn wait_for_commit_calls(&self, n: usize) {
        let mut rx = self.commit_calls.subscribe();
        let _ = rx.wait_for(|calls| *calls >= n).await;
    }
}

fn user_for(email: &str) -> User {
    User::new(format!("user-{}", email))
        .with_email(email)
        .with_access_token(format!("token-{}", email))
}

fn check_server_password(password: &str) -> OperationResult<()> {
    if password.len() < SERVER_MIN_PASSWORD {
        return Err(OperationError::malformed_request("password too short"));
    }
    Ok(())
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn login(&self, credentials: Credentials) -> OperationResult<User> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.login_script.lock().unwrap().pop_front();
        if let Some(step) = scripted {
            if let Some(release) = step.release {
                let _ = release.await;
            }
            return step.result;
        }

        check_server_password(&credentials.password)?;
        let known = self
            .accounts
            .lock()
            .unwrap()
            .get(&credentials.email)
            .is_some_and(|password| *password == credentials.password);
        if !known {
            return Err(OperationError::invalid_credentials("invalid email or password"));
        }
        Ok(user_for(&credentials.email))
    }

    async fn register(&self, fields: RegisterFields) -> OperationResult<Option<User>> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        check_server_password(&fields.password)?;

        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&fields.email) {
            return Err(OperationError::conflict("account already exists"));
        }
        accounts.insert(fields.email.clone(), fields.password);
        Ok(Some(user_for(&fields.email)))
    }

    async fn send_reset_password_email(&self, email: String) -> OperationResult<()> {
        self.reset_emails.lock().unwrap().push(email);
        Ok(())
    }

    async fn reset_password(
        &self,
        token: String,
        token_id: String,
        password: String,
    ) -> OperationResult<()> {
        if token != VALID_RESET_TOKEN {
            return Err(OperationError::invalid_credentials("reset token is invalid or expired"));
        }
        check_server_password(&password)?;
        self.password_resets
            .lock()
            .unwrap()
            .push((token, token_id, password));
        Ok(())
    }

    async fn commit_subscriptions(
        &self,
        batch: Vec<SubscriptionMutation>,
    ) -> OperationResult<()> {
        self.commit_calls.send_modify(|calls| *calls += 1);

        let mut gate = self.commit_gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        self.commits.lock().unwrap().push(batch);
        match self.commit_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
