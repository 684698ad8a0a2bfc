use std::sync::Arc;

use axum::{
    Form, Router,
    extract::{RawQuery, State},
    http::{HeaderMap, HeaderName, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use breeze_desk_core::credentials::Credentials;
use breeze_desk_core::datetime::reconstitute;
use breeze_desk_core::error::FieldErrors;
use breeze_desk_core::normalize::normalize_rows;
use breeze_desk_core::query::{DERIVATIVES_EXCHANGE, HistoricalRequest, ProductType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::html::{self, Notice, ResultsView};
use crate::routes::SESSION_INITIALIZED;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "breeze_session";
pub const QUERY_PAGE: &str = "/historical-data";

const SESSION_FAILED: &str = "Failed to initialize session. Please check your credentials.";
const FETCH_FAILED: &str = "Failed to fetch historical data";
const NO_SESSION: &str = "No active session. Initialize a session first.";

/// Query form values as the browser edits them: dates in `datetime-local` form.
///
/// `Default` is the prefilled first-load form. A submitted query string leaves
/// absent fields empty so validation sees exactly what the browser sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub interval: String,
    #[serde(default)]
    pub from_date: String,
    #[serde(default)]
    pub to_date: String,
    #[serde(default)]
    pub stock_code: String,
    #[serde(default)]
    pub exchange_code: String,
    #[serde(default)]
    pub product_type: String,
    #[serde(default)]
    pub expiry_date: String,
    #[serde(default)]
    pub right: String,
    #[serde(default)]
    pub strike_price: String,
}

impl Default for QueryForm {
    fn default() -> Self {
        Self {
            interval: "1minute".into(),
            from_date: "2025-02-03T09:20".into(),
            to_date: "2025-02-03T09:21".into(),
            stock_code: "NIFTY".into(),
            exchange_code: "NFO".into(),
            product_type: "options".into(),
            expiry_date: "2025-02-06T07:00".into(),
            right: "call".into(),
            strike_price: "23200".into(),
        }
    }
}

impl QueryForm {
    /// Build the wire request, turning display dates back into millisecond UTC.
    pub fn to_request(&self) -> HistoricalRequest {
        let wire_date = |value: &str| {
            let value = value.trim();
            if value.is_empty() {
                String::new()
            } else {
                reconstitute(value)
            }
        };
        HistoricalRequest {
            interval: self.interval.clone(),
            from_date: wire_date(&self.from_date),
            to_date: wire_date(&self.to_date),
            stock_code: self.stock_code.clone(),
            exchange_code: self.exchange_code.clone(),
            product_type: self.product_type.clone(),
            expiry_date: wire_date(&self.expiry_date),
            right: self.right.clone(),
            strike_price: self.strike_price.clone(),
            ..Default::default()
        }
    }

    fn product(&self) -> Option<ProductType> {
        self.product_type.parse().ok()
    }

    pub fn shows_expiry(&self) -> bool {
        self.product().is_some_and(|p| p.is_derivative())
    }

    pub fn shows_strike(&self) -> bool {
        self.product() == Some(ProductType::Options)
    }

    pub fn shows_right(&self) -> bool {
        self.shows_strike() && self.exchange_code.trim().eq_ignore_ascii_case(DERIVATIVES_EXCHANGE)
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(credential_form).post(submit_credentials))
        .route(QUERY_PAGE, get(query_page))
}

async fn credential_form() -> Html<String> {
    Html(html::credential_page("", &FieldErrors::new(), None, None))
}

async fn submit_credentials(
    State(state): State<Arc<AppState>>,
    Form(credentials): Form<Credentials>,
) -> Response {
    match state.open_session(&credentials).await {
        Ok(session_id) => {
            let delay_secs = redirect_secs(&state);
            let notice = Notice::Success(SESSION_INITIALIZED.to_string());
            let page = html::credential_page(
                &credentials.api_key,
                &FieldErrors::new(),
                Some(&notice),
                Some((delay_secs, QUERY_PAGE)),
            );
            let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");
            let refresh = format!("{delay_secs}; url={QUERY_PAGE}");
            (
                [
                    (header::SET_COOKIE, cookie),
                    (HeaderName::from_static("refresh"), refresh),
                ],
                Html(page),
            )
                .into_response()
        }
        Err(ApiError::Validation(errors)) => {
            let page = html::credential_page(&credentials.api_key, &errors, None, None);
            (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response()
        }
        Err(e) => {
            let notice = Notice::Error(e.page_message(SESSION_FAILED));
            let page =
                html::credential_page(&credentials.api_key, &FieldErrors::new(), Some(&notice), None);
            (e.status(), Html(page)).into_response()
        }
    }
}

/// Whole seconds for the refresh, rounded up so the redirect never comes early.
fn redirect_secs(state: &AppState) -> u64 {
    state.redirect_delay.as_millis().div_ceil(1000) as u64
}

/// Each page load runs exactly one fetch: the defaults when there is no query
/// string, otherwise the submitted values.
async fn query_page(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let form = match raw.as_deref().filter(|q| !q.is_empty()) {
        None => QueryForm::default(),
        Some(q) => match serde_urlencoded::from_str::<QueryForm>(q) {
            Ok(form) => form,
            Err(e) => {
                let notice = Notice::Error(format!("Invalid query: {e}"));
                let page = html::query_page(&QueryForm::default(), &FieldErrors::new(), Some(&notice), None);
                return (StatusCode::BAD_REQUEST, Html(page)).into_response();
            }
        },
    };

    let query = match form.to_request().validate() {
        Ok(query) => query,
        Err(errors) => {
            let page = html::query_page(&form, &errors, None, None);
            return (StatusCode::UNPROCESSABLE_ENTITY, Html(page)).into_response();
        }
    };

    let Some(session) = session_cookie(&headers).and_then(|id| state.sessions.lookup(id)) else {
        debug!("Query page requested without a live session");
        let notice = Notice::Error(NO_SESSION.to_string());
        let page = html::query_page(&form, &FieldErrors::new(), Some(&notice), None);
        return (StatusCode::UNAUTHORIZED, Html(page)).into_response();
    };

    match state.fetch(&session, &query).await {
        Ok(rows) => {
            let bars = normalize_rows(&Value::Array(rows));
            let shown = state.display_limit.apply(&bars);
            let notice = Notice::Success(format!("Retrieved {} data points", bars.len()));
            let view = ResultsView {
                bars: shown,
                total: bars.len(),
            };
            let page = html::query_page(&form, &FieldErrors::new(), Some(&notice), Some(&view));
            Html(page).into_response()
        }
        Err(e) => {
            let notice = Notice::Error(e.page_message(FETCH_FAILED));
            let page = html::query_page(&form, &FieldErrors::new(), Some(&notice), None);
            (e.status(), Html(page)).into_response()
        }
    }
}

/// Value of the session cookie, if the request carries one.
fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn default_form_is_valid() {
        let query = QueryForm::default().to_request().validate().unwrap();
        assert_eq!(
            breeze_desk_core::datetime::format_timestamp(&query.from_date),
            "2025-02-03T09:20:00.000Z"
        );
        assert!(query.include_right());
    }

    #[test]
    fn to_request_reconstitutes_dates() {
        let form = QueryForm {
            from_date: "2025-02-03T09:20:15".into(),
            expiry_date: String::new(),
            ..QueryForm::default()
        };
        let request = form.to_request();
        assert_eq!(request.from_date, "2025-02-03T09:20:15.000Z");
        assert_eq!(request.to_date, "2025-02-03T09:21:00.000Z");
        assert!(request.expiry_date.is_empty());
    }

    #[test]
    fn reversed_dates_are_rejected() {
        let form = QueryForm {
            from_date: "2025-02-03T09:21".into(),
            to_date: "2025-02-03T09:20".into(),
            ..QueryForm::default()
        };
        let errors = form.to_request().validate().unwrap_err();
        assert_eq!(errors.get("to_date"), Some("To date must be after from date"));
    }

    #[test]
    fn submitted_query_leaves_absent_fields_empty() {
        let form: QueryForm = serde_urlencoded::from_str(
            "interval=1day&from_date=2025-01-01T00%3A00&to_date=2025-01-31T00%3A00\
             &stock_code=NIFTY&exchange_code=NSE&product_type=futures",
        )
        .unwrap();
        assert!(form.expiry_date.is_empty());
        assert!(form.strike_price.is_empty());
        assert!(form.right.is_empty());

        let errors = form.to_request().validate().unwrap_err();
        assert_eq!(errors.get("expiry_date"), Some("Expiry date is required"));
    }

    #[test]
    fn visibility_rules() {
        let mut form = QueryForm::default();
        assert!(form.shows_expiry() && form.shows_strike() && form.shows_right());

        form.exchange_code = "nfo".into();
        assert!(form.shows_right());

        form.product_type = "futures".into();
        assert!(form.shows_expiry());
        assert!(!form.shows_strike());
        assert!(!form.shows_right());

        form.product_type = "cash".into();
        assert!(!form.shows_expiry());
    }

    #[test]
    fn finds_session_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("foo=1; breeze_session=abc-123"),
        );
        assert_eq!(session_cookie(&headers), Some("abc-123"));
    }

    #[test]
    fn missing_session_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark"));
        assert_eq!(session_cookie(&headers), None);
        assert_eq!(session_cookie(&HeaderMap::new()), None);
    }
}
