use serde::{Deserialize, Serialize};

/// Email/password credentials for `login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn email_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Account registration fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFields {
    pub email: String,
    pub password: String,
}

impl RegisterFields {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Completion of the reset flow started by `send_reset_password_email`.
///
/// `token` and `token_id` come from the link in the reset email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[serde(rename = "tokenId")]
    pub token_id: String,
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn new(
        token: impl Into<String>,
        token_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            token_id: token_id.into(),
            password: password.into(),
        }
    }
}
