use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::datetime::format_timestamp;
use breeze_desk_core::query::HistoricalQuery;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::broker::{Broker, BrokerSession};
use crate::error::BrokerError;

const BREEZE_API_URL: &str = "https://api.icicidirect.com/breezeapi/api/v1";
const BREEZE_CHARTS_URL: &str = "https://breezeapi.icicidirect.com/api/v2";

/// ICICI Direct BreezeConnect client.
/// Sessions come from the customer-details endpoint; history from the v2 charts API,
/// authenticated via `X-SessionToken` and `apikey` headers.
pub struct BreezeClient {
    client: Client,
    api_url: String,
    charts_url: String,
}

impl BreezeClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            api_url: BREEZE_API_URL.to_string(),
            charts_url: BREEZE_CHARTS_URL.to_string(),
        }
    }

    /// Create with base URL overrides (for testing or a sandbox).
    pub fn with_base_urls(api_url: Option<String>, charts_url: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.unwrap_or_else(|| BREEZE_API_URL.to_string()),
            charts_url: charts_url.unwrap_or_else(|| BREEZE_CHARTS_URL.to_string()),
        }
    }
}

impl Default for BreezeClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Every Breeze response wraps its payload the same way.
#[derive(Debug, Deserialize)]
struct BreezeEnvelope<T> {
    #[serde(rename = "Success")]
    success: Option<T>,
    #[serde(rename = "Status")]
    status: Option<u16>,
    #[serde(rename = "Error")]
    error: Option<Value>,
}

impl<T> BreezeEnvelope<T> {
    fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CustomerDetailsRequest<'a> {
    #[serde(rename = "SessionToken")]
    session_token: &'a str,
    #[serde(rename = "AppKey")]
    app_key: &'a str,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    /// base64 of `user_id:token`
    session_token: String,
    idirect_userid: Option<String>,
}

impl CustomerDetails {
    fn user_id(&self) -> Result<String, BrokerError> {
        match decode_user_id(&self.session_token) {
            Ok(user_id) => Ok(user_id),
            Err(e) => self.idirect_userid.clone().ok_or(e),
        }
    }
}

fn decode_user_id(session_token: &str) -> Result<String, BrokerError> {
    let bytes = BASE64
        .decode(session_token.trim())
        .map_err(|e| BrokerError::Parse(format!("session token is not base64: {e}")))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|e| BrokerError::Parse(format!("session token is not UTF-8: {e}")))?;
    match decoded.split_once(':') {
        Some((user_id, _)) if !user_id.is_empty() => Ok(user_id.to_string()),
        _ => Err(BrokerError::Parse("session token has no user id".into())),
    }
}

/// Query parameters for the v2 historical charts endpoint.
fn chart_params(query: &HistoricalQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("stock_code", query.stock_code.clone()),
        ("exch_code", query.exchange_code.clone()),
        ("from_date", format_timestamp(&query.from_date)),
        ("to_date", format_timestamp(&query.to_date)),
        ("interval", query.interval.to_string()),
        ("product_type", query.product_type.to_string()),
    ];
    if let Some(expiry) = &query.expiry_date {
        params.push(("expiry_date", format_timestamp(expiry)));
    }
    if let Some(strike) = &query.strike_price {
        params.push(("strike_price", strike.to_string()));
    }
    if query.include_right() {
        if let Some(right) = &query.right {
            params.push(("right", right.to_string()));
        }
    }
    params
}

/// Read a Breeze envelope, turning non-2xx responses into API errors.
async fn read_envelope<T: DeserializeOwned>(
    response: Response,
) -> Result<BreezeEnvelope<T>, BrokerError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<BreezeEnvelope<Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.error_message())
            .unwrap_or(body);
        return Err(BrokerError::Api {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body)
        .map_err(|e| BrokerError::Parse(format!("failed to parse response: {e}")))
}

#[async_trait]
impl Broker for BreezeClient {
    fn name(&self) -> &str {
        "breeze"
    }

    async fn generate_session(
        &self,
        credentials: &Credentials,
    ) -> Result<BrokerSession, BrokerError> {
        let api_key = credentials.api_key.trim();
        if api_key.is_empty() {
            return Err(BrokerError::Config("app key is required".into()));
        }

        debug!("Requesting customer details from {}", self.api_url);
        let response = self
            .client
            .get(format!("{}/customerdetails", self.api_url))
            .json(&CustomerDetailsRequest {
                session_token: credentials.session_token.trim(),
                app_key: api_key,
            })
            .send()
            .await?;

        let envelope: BreezeEnvelope<CustomerDetails> = read_envelope(response).await?;
        if let Some(message) = envelope.error_message() {
            return Err(BrokerError::Auth(message));
        }
        let details = envelope.success.ok_or_else(|| {
            BrokerError::Auth("session generation returned no customer details".into())
        })?;

        let user_id = details.user_id()?;
        info!("Breeze session opened for user {user_id}");
        Ok(BrokerSession::new(api_key, user_id, details.session_token))
    }

    async fn historical_data(
        &self,
        session: &BrokerSession,
        query: &HistoricalQuery,
    ) -> Result<Vec<Value>, BrokerError> {
        let response = self
            .client
            .get(format!("{}/historicalcharts", self.charts_url))
            .header("X-SessionToken", session.session_token())
            .header("apikey", session.api_key())
            .query(&chart_params(query))
            .send()
            .await?;

        let envelope: BreezeEnvelope<Vec<Value>> = read_envelope(response).await?;
        if let Some(message) = envelope.error_message() {
            return Err(BrokerError::Api {
                status: envelope.status.unwrap_or(500),
                message,
            });
        }

        let rows = envelope.success.unwrap_or_default();
        info!(
            "{} {}: received {} row(s) at {}",
            query.exchange_code,
            query.stock_code,
            rows.len(),
            query.interval
        );
        Ok(rows)
    }
}
