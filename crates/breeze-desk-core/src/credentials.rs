use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::FieldErrors;

/// BreezeConnect API credentials as supplied by the user.
/// Missing fields deserialize as empty strings so that `validate` can report them.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub session_token: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            session_token: session_token.into(),
        }
    }

    /// Flags exactly the fields that are blank after trimming.
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.api_key.trim().is_empty() {
            errors.insert("api_key", "API Key is required");
        }
        if self.secret_key.trim().is_empty() {
            errors.insert("secret_key", "Secret Key is required");
        }
        if self.session_token.trim().is_empty() {
            errors.insert("session_token", "Session Token is required");
        }
        errors.into_result(())
    }

    /// True when no credential field was supplied at all.
    pub fn is_blank(&self) -> bool {
        self.api_key.trim().is_empty()
            && self.secret_key.trim().is_empty()
            && self.session_token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}
