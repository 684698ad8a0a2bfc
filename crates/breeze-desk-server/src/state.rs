use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use breeze_desk_broker::breeze::BreezeClient;
use breeze_desk_broker::broker::{Broker, BrokerSession};
use breeze_desk_broker::error::BrokerError;
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::display::DisplayLimit;
use breeze_desk_core::error::FieldErrors;
use breeze_desk_core::query::{HistoricalQuery, HistoricalRequest};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::sessions::{SessionId, SessionRegistry};

pub struct AppState {
    pub broker: Arc<dyn Broker>,
    pub sessions: SessionRegistry,
    pub redirect_delay: Duration,
    pub display_limit: DisplayLimit,
    /// Upper bound on each broker call.
    pub broker_timeout: Duration,
}

impl AppState {
    pub fn new(broker: Arc<dyn Broker>, config: &Config) -> Self {
        Self {
            broker,
            sessions: SessionRegistry::new(config.session_ttl()),
            redirect_delay: config.redirect_delay(),
            display_limit: config.display_limit(),
            broker_timeout: config.request_timeout(),
        }
    }

    /// Wire up the live Breeze client.
    pub fn from_config(config: &Config) -> Arc<Self> {
        let broker = BreezeClient::with_base_urls(
            config.breeze_api_url.clone(),
            config.breeze_charts_url.clone(),
        );
        Arc::new(Self::new(Arc::new(broker), config))
    }

    /// Validate credentials, open a broker session and register it.
    pub async fn open_session(&self, credentials: &Credentials) -> ApiResult<SessionId> {
        credentials.validate()?;
        debug!("{}: authenticating", self.broker.name());
        let session = self
            .bounded(self.broker.generate_session(credentials))
            .await
            .map_err(|e| {
                warn!("init-session failed: {e}");
                ApiError::SessionInit(e)
            })?;
        let id = self.sessions.open(session);
        info!("Session {id} initialized");
        Ok(id)
    }

    /// Authenticate for a historical request.
    /// Supplied credentials always open a fresh session; otherwise `session_id`
    /// must name a live registered session.
    pub async fn resolve_session(&self, request: &HistoricalRequest) -> ApiResult<BrokerSession> {
        if uses_registered_session(request) {
            let raw = request.session_id.as_deref().unwrap_or_default();
            return self.sessions.lookup(raw).ok_or(ApiError::UnknownSession);
        }

        let credentials = &request.credentials;
        credentials.validate()?;
        debug!("{}: authenticating", self.broker.name());
        self.bounded(self.broker.generate_session(credentials))
            .await
            .map_err(|e| {
                warn!("Historical data fetch failed during authentication: {e}");
                ApiError::Upstream(e)
            })
    }

    pub async fn fetch(
        &self,
        session: &BrokerSession,
        query: &HistoricalQuery,
    ) -> ApiResult<Vec<Value>> {
        debug!(
            "{}: querying {} {} {} from {} to {}",
            self.broker.name(),
            query.exchange_code,
            query.stock_code,
            query.interval,
            query.from_date,
            query.to_date
        );
        self.bounded(self.broker.historical_data(session, query))
            .await
            .map_err(|e| {
                warn!("Historical data fetch failed: {e}");
                ApiError::Upstream(e)
            })
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, BrokerError>>,
    ) -> Result<T, BrokerError> {
        tokio::time::timeout(self.broker_timeout, call)
            .await
            .unwrap_or_else(|_| Err(BrokerError::Timeout(self.broker_timeout)))
    }

    /// Full historical flow: validate, authenticate, query.
    /// Nothing reaches the broker unless the query is valid.
    pub async fn historical(&self, request: &HistoricalRequest) -> ApiResult<Vec<Value>> {
        let mut errors = FieldErrors::new();
        if !uses_registered_session(request) {
            if let Err(missing) = request.credentials.validate() {
                errors.extend(missing);
            }
        }
        let query = match request.validate() {
            Ok(query) if errors.is_empty() => query,
            Ok(_) => return Err(errors.into()),
            Err(invalid) => {
                errors.extend(invalid);
                return Err(errors.into());
            }
        };

        let session = self.resolve_session(request).await?;
        self.fetch(&session, &query).await
    }
}

fn uses_registered_session(request: &HistoricalRequest) -> bool {
    request.credentials.is_blank() && request.session_id.is_some()
}
