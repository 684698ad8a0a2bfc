#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode, header};
use breeze_desk_broker::broker::{Broker, BrokerSession};
use breeze_desk_broker::error::BrokerError;
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::query::HistoricalQuery;
use breeze_desk_server::config::Config;
use breeze_desk_server::{AppState, app_router};
use clap::Parser;
use serde_json::{Value, json};
use tower::ServiceExt;

pub enum Failure {
    Message(String),
    Transport,
}

/// Broker double that records calls and replays canned rows.
#[derive(Default)]
pub struct MockBroker {
    pub session_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub last_query: Mutex<Option<HistoricalQuery>>,
    session_failure: Option<Failure>,
    history_failure: Option<Failure>,
    history_delay: Option<Duration>,
    rows: Vec<Value>,
}

impl MockBroker {
    pub fn with_rows(rows: Vec<Value>) -> Arc<Self> {
        Arc::new(Self {
            rows,
            ..Default::default()
        })
    }

    pub fn failing_session(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            session_failure: Some(failure),
            ..Default::default()
        })
    }

    pub fn failing_history(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            history_failure: Some(failure),
            ..Default::default()
        })
    }

    /// Answers historical queries only after `delay`.
    pub fn slow_history(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            history_delay: Some(delay),
            rows: breeze_rows(),
            ..Default::default()
        })
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }
}

/// A real connection-refused error from reqwest.
async fn transport_error() -> BrokerError {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = reqwest::get(format!("http://{addr}/")).await.unwrap_err();
    BrokerError::Http(err)
}

async fn fail(failure: &Failure, api: bool) -> BrokerError {
    match failure {
        Failure::Transport => transport_error().await,
        Failure::Message(message) if api => BrokerError::Api {
            status: 500,
            message: message.clone(),
        },
        Failure::Message(message) => BrokerError::Auth(message.clone()),
    }
}

#[async_trait]
impl Broker for MockBroker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate_session(
        &self,
        credentials: &Credentials,
    ) -> Result<BrokerSession, BrokerError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.session_failure {
            return Err(fail(failure, false).await);
        }
        Ok(BrokerSession::new(
            credentials.api_key.clone(),
            "USER1",
            "VVNFUjE6YWJjMTIz",
        ))
    }

    async fn historical_data(
        &self,
        _session: &BrokerSession,
        query: &HistoricalQuery,
    ) -> Result<Vec<Value>, BrokerError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some(query.clone());
        if let Some(delay) = self.history_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(failure) = &self.history_failure {
            return Err(fail(failure, true).await);
        }
        Ok(self.rows.clone())
    }
}

pub fn config(args: &[&str]) -> Config {
    let argv = std::iter::once("breeze-desk").chain(args.iter().copied());
    Config::try_parse_from(argv).unwrap()
}

pub fn app_with(broker: Arc<MockBroker>, args: &[&str]) -> (Router, Arc<AppState>) {
    let config = config(args);
    let state = Arc::new(AppState::new(broker, &config));
    (app_router(state.clone(), &config), state)
}

pub fn app(broker: Arc<MockBroker>) -> (Router, Arc<AppState>) {
    app_with(broker, &[])
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn post_form(app: &Router, uri: &str, body: &str) -> TestResponse {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    send(app, builder.body(Body::empty()).unwrap()).await
}

pub fn credentials_json() -> Value {
    json!({"api_key": "good-key", "secret_key": "secret", "session_token": "12345"})
}

/// The default NIFTY call query with credentials attached.
pub fn historical_json() -> Value {
    json!({
        "api_key": "good-key",
        "secret_key": "secret",
        "session_token": "12345",
        "interval": "1minute",
        "from_date": "2025-02-03T09:20:00.000Z",
        "to_date": "2025-02-03T09:21:00.000Z",
        "stock_code": "NIFTY",
        "exchange_code": "NFO",
        "product_type": "options",
        "expiry_date": "2025-02-06T07:00:00.000Z",
        "right": "call",
        "strike_price": "23200"
    })
}

pub fn breeze_rows() -> Vec<Value> {
    vec![
        json!({
            "close": 115.35, "datetime": "2025-02-03 14:50:00", "exchange_code": "NFO",
            "high": 118.0, "low": 113.05, "open": 117.1, "open_interest": 4410375,
            "right": "Call", "stock_code": "NIFTY", "strike_price": "23200", "volume": 1203225
        }),
        json!({
            "close": 116.2, "datetime": "2025-02-03 14:51:00", "exchange_code": "NFO",
            "high": 116.9, "low": 114.8, "open": 115.35, "open_interest": 4402125,
            "right": "Call", "stock_code": "NIFTY", "strike_price": "23200", "volume": 845625
        }),
    ]
}
