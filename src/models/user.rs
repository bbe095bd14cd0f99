use serde::{Deserialize, Serialize};

/// Authenticated user returned by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Server-assigned user identifier
    pub id: String,

    /// Email the user logged in with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Access token for subsequent calls, when the transport issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            access_token: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}
