use std::fmt;

use async_trait::async_trait;
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::query::HistoricalQuery;
use serde_json::Value;

use crate::error::BrokerError;

/// An authenticated broker session, bound to the app key it was opened with.
#[derive(Clone, PartialEq, Eq)]
pub struct BrokerSession {
    api_key: String,
    user_id: String,
    session_token: String,
}

impl BrokerSession {
    pub fn new(
        api_key: impl Into<String>,
        user_id: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            user_id: user_id.into(),
            session_token: session_token.into(),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_token(&self) -> &str {
        &self.session_token
    }
}

impl fmt::Debug for BrokerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("api_key", &self.api_key)
            .field("user_id", &self.user_id)
            .field("session_token", &"<redacted>")
            .finish()
    }
}

/// Trait for the brokerage operations the desk relies on.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Broker name (for logging/display).
    fn name(&self) -> &str;

    /// Open a session for the given credentials.
    async fn generate_session(&self, credentials: &Credentials)
    -> Result<BrokerSession, BrokerError>;

    /// Fetch historical bars. Rows are returned exactly as the broker sent them.
    async fn historical_data(
        &self,
        session: &BrokerSession,
        query: &HistoricalQuery,
    ) -> Result<Vec<Value>, BrokerError>;
}
