use std::collections::HashMap;

use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use breeze_desk_broker::breeze::BreezeClient;
use breeze_desk_broker::broker::{Broker, BrokerSession};
use breeze_desk_broker::error::BrokerError;
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::query::HistoricalRequest;
use serde_json::{Value, json};

/// Serve `router` on an ephemeral local port and return its base URL.
async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn customer_details(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["AppKey"] == "good-key" && body["SessionToken"] == "12345" {
        (
            StatusCode::OK,
            Json(json!({
                "Success": {
                    "idirect_userid": "USER1",
                    "session_token": "VVNFUjE6YWJjMTIz"
                },
                "Status": 200,
                "Error": null
            })),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({"Success": null, "Status": 500, "Error": "Public Key does not exist."})),
        )
    }
}

async fn historical_charts(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let authorized = headers.get("X-SessionToken").and_then(|v| v.to_str().ok())
        == Some("VVNFUjE6YWJjMTIz")
        && headers.get("apikey").and_then(|v| v.to_str().ok()) == Some("good-key");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"Success": null, "Status": 401, "Error": "Session key is expired."})),
        );
    }

    if params.get("stock_code").map(String::as_str) == Some("BADCODE") {
        return (
            StatusCode::OK,
            Json(json!({"Success": null, "Status": 500, "Error": "Stock code is invalid"})),
        );
    }

    let mut echoed: Vec<String> = params.keys().cloned().collect();
    echoed.sort();
    (
        StatusCode::OK,
        Json(json!({
            "Success": [
                {
                    "datetime": "2025-02-03 14:50:00",
                    "open": 117.1, "high": 118.0, "low": 113.05, "close": 115.35,
                    "volume": 1203225, "open_interest": 4410375,
                    "params": echoed,
                    "right": params.get("right"),
                    "exch_code": params.get("exch_code")
                }
            ],
            "Status": 200,
            "Error": null
        })),
    )
}

async fn stub_client() -> BreezeClient {
    let router = Router::new()
        .route("/v1/customerdetails", get(customer_details))
        .route("/v2/historicalcharts", get(historical_charts));
    let base = spawn_stub(router).await;
    BreezeClient::with_base_urls(Some(format!("{base}/v1")), Some(format!("{base}/v2")))
}

fn nifty_call_request() -> HistoricalRequest {
    HistoricalRequest {
        interval: "1minute".into(),
        from_date: "2025-02-03T09:20:00.000Z".into(),
        to_date: "2025-02-03T09:21:00.000Z".into(),
        stock_code: "NIFTY".into(),
        exchange_code: "NFO".into(),
        product_type: "options".into(),
        expiry_date: "2025-02-06T07:00:00.000Z".into(),
        right: "call".into(),
        strike_price: "23200".into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn generate_session_decodes_user_id() {
    let client = stub_client().await;
    let session = client
        .generate_session(&Credentials::new("good-key", "secret", "12345"))
        .await
        .unwrap();

    assert_eq!(session.api_key(), "good-key");
    assert_eq!(session.user_id(), "USER1");
    assert_eq!(session.session_token(), "VVNFUjE6YWJjMTIz");
}

#[tokio::test]
async fn generate_session_surfaces_broker_message() {
    let client = stub_client().await;
    let err = client
        .generate_session(&Credentials::new("wrong-key", "secret", "12345"))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::Auth(_)));
    assert_eq!(err.to_string(), "Public Key does not exist.");
}

#[tokio::test]
async fn generate_session_requires_app_key() {
    let client = stub_client().await;
    let err = client
        .generate_session(&Credentials::new("  ", "secret", "12345"))
        .await
        .unwrap_err();
    assert!(matches!(err, BrokerError::Config(_)));
}

#[tokio::test]
async fn historical_data_passes_rows_through() {
    let client = stub_client().await;
    let session = client
        .generate_session(&Credentials::new("good-key", "secret", "12345"))
        .await
        .unwrap();
    let query = nifty_call_request().validate().unwrap();

    let rows = client.historical_data(&session, &query).await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["close"], json!(115.35));
    assert_eq!(rows[0]["right"], json!("call"));
    assert_eq!(rows[0]["exch_code"], json!("NFO"));
    assert_eq!(
        rows[0]["params"],
        json!([
            "exch_code",
            "expiry_date",
            "from_date",
            "interval",
            "product_type",
            "right",
            "stock_code",
            "strike_price",
            "to_date"
        ])
    );
}

#[tokio::test]
async fn historical_data_reports_envelope_error() {
    let client = stub_client().await;
    let session = BrokerSession::new("good-key", "USER1", "VVNFUjE6YWJjMTIz");
    let mut request = nifty_call_request();
    request.stock_code = "BADCODE".into();
    let query = request.validate().unwrap();

    let err = client.historical_data(&session, &query).await.unwrap_err();
    match err {
        BrokerError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Stock code is invalid");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn historical_data_reports_http_status() {
    let client = stub_client().await;
    let session = BrokerSession::new("good-key", "USER1", "stale-token");
    let query = nifty_call_request().validate().unwrap();

    let err = client.historical_data(&session, &query).await.unwrap_err();
    match err {
        BrokerError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Session key is expired.");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_broker_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = BreezeClient::with_base_urls(Some(format!("http://{addr}")), None);
    let err = client
        .generate_session(&Credentials::new("good-key", "secret", "12345"))
        .await
        .unwrap_err();
    assert!(err.is_transport());
}
