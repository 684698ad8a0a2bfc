//! Server-rendered markup for the credential and query pages.

use breeze_desk_core::bar::HistoricalBar;
use breeze_desk_core::display::{format_count, format_inr, format_local};
use breeze_desk_core::error::FieldErrors;
use breeze_desk_core::query::{Interval, OptionRight, ProductType};

use crate::pages::QueryForm;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:64rem;margin:2rem auto;padding:0 1rem;color:#1f2937}\
label{display:block;font-weight:600;margin-top:.75rem}\
input,select{width:100%;padding:.4rem;margin-top:.25rem;box-sizing:border-box}\
.field-error{color:#b91c1c;font-size:.85rem}\
.notice{padding:.75rem;border-radius:.375rem;margin:1rem 0}\
.notice.success{background:#dcfce7;color:#166534}.notice.error{background:#fee2e2;color:#991b1b}\
.badge{display:inline-block;border:1px solid #d1d5db;border-radius:9999px;padding:.1rem .6rem;margin-right:.25rem;font-size:.8rem}\
table{width:100%;border-collapse:collapse;margin-top:1rem}th,td{padding:.4rem;border-bottom:1px solid #e5e7eb;text-align:right}\
th:first-child,td:first-child{text-align:left}button{margin-top:1rem;padding:.5rem 1rem}";

const EXCHANGES: &[(&str, &str)] = &[
    ("NSE", "NSE (Equity)"),
    ("NFO", "NFO (Derivatives)"),
    ("BSE", "BSE (Equity)"),
];

/// Outcome banner shown above a form or results table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

/// What a results table needs beyond the form values.
pub struct ResultsView<'a> {
    pub bars: &'a [HistoricalBar],
    pub total: usize,
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn layout(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{STYLE}</style>\n{head_extra}</head>\n<body>\n{body}</body>\n</html>\n",
        escape(title)
    )
}

fn notice_html(notice: Option<&Notice>) -> String {
    match notice {
        Some(Notice::Success(message)) => format!(
            "<div class=\"notice success\" role=\"status\">{}</div>\n",
            escape(message)
        ),
        Some(Notice::Error(message)) => format!(
            "<div class=\"notice error\" role=\"alert\">{}</div>\n",
            escape(message)
        ),
        None => String::new(),
    }
}

fn field_error(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .map(|message| {
            format!(
                "<p class=\"field-error\" id=\"{field}-error\">{}</p>\n",
                escape(message)
            )
        })
        .unwrap_or_default()
}

fn input(field: &str, label: &str, kind: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        "<label for=\"{field}\">{label}</label>\n\
         <input id=\"{field}\" name=\"{field}\" type=\"{kind}\" value=\"{}\">\n{}",
        escape(value),
        field_error(errors, field)
    )
}

fn select<'a>(
    field: &str,
    label: &str,
    selected: &str,
    options: impl IntoIterator<Item = (&'a str, &'a str)>,
    errors: &FieldErrors,
) -> String {
    let mut html = format!("<label for=\"{field}\">{label}</label>\n<select id=\"{field}\" name=\"{field}\">\n");
    for (value, text) in options {
        let marker = if value == selected { " selected" } else { "" };
        html.push_str(&format!(
            "<option value=\"{}\"{marker}>{}</option>\n",
            escape(value),
            escape(text)
        ));
    }
    html.push_str("</select>\n");
    html.push_str(&field_error(errors, field));
    html
}

/// Credential form. Only the API key is echoed back; secrets are never rendered.
pub fn credential_page(
    api_key: &str,
    errors: &FieldErrors,
    notice: Option<&Notice>,
    redirect: Option<(u64, &str)>,
) -> String {
    let head_extra = redirect
        .map(|(secs, target)| {
            format!(
                "<meta http-equiv=\"refresh\" content=\"{secs};url={}\">\n",
                escape(target)
            )
        })
        .unwrap_or_default();

    let mut body = String::from(
        "<h1>BreezeConnect Session</h1>\n\
         <p>Enter your BreezeConnect API credentials to initialize your trading session.</p>\n",
    );
    body.push_str(&notice_html(notice));
    body.push_str("<form method=\"post\" action=\"/\" novalidate>\n");
    body.push_str(&input("api_key", "API Key", "text", api_key, errors));
    body.push_str(&input("secret_key", "Secret Key", "password", "", errors));
    body.push_str(&input("session_token", "Session Token", "password", "", errors));
    body.push_str("<button type=\"submit\">Initialize Session</button>\n</form>\n");

    layout("BreezeConnect Session", &head_extra, &body)
}

pub fn query_page(
    form: &QueryForm,
    errors: &FieldErrors,
    notice: Option<&Notice>,
    results: Option<&ResultsView<'_>>,
) -> String {
    let mut body = String::from(
        "<p><a href=\"/\">&larr; Back</a></p>\n<h1>Historical Data</h1>\n\
         <form method=\"get\" action=\"/historical-data\" novalidate>\n",
    );

    body.push_str(&select(
        "interval",
        "Interval",
        &form.interval,
        Interval::ALL.iter().map(|i| (i.as_str(), i.label())),
        errors,
    ));
    body.push_str(&input(
        "from_date",
        "From Date &amp; Time",
        "datetime-local",
        &form.from_date,
        errors,
    ));
    body.push_str(&input(
        "to_date",
        "To Date &amp; Time",
        "datetime-local",
        &form.to_date,
        errors,
    ));
    body.push_str(&input("stock_code", "Stock Code", "text", &form.stock_code, errors));
    body.push_str(&select(
        "exchange_code",
        "Exchange Code",
        &form.exchange_code,
        EXCHANGES.iter().copied(),
        errors,
    ));
    body.push_str(&select(
        "product_type",
        "Product Type",
        &form.product_type,
        ProductType::ALL.iter().map(|p| (p.as_str(), p.label())),
        errors,
    ));
    if form.shows_expiry() {
        body.push_str(&input(
            "expiry_date",
            "Expiry Date",
            "datetime-local",
            &form.expiry_date,
            errors,
        ));
    }
    if form.shows_right() {
        body.push_str(&select(
            "right",
            "Option Type",
            &form.right,
            OptionRight::ALL
                .iter()
                .filter(|r| **r != OptionRight::Others)
                .map(|r| (r.as_str(), r.label())),
            errors,
        ));
    }
    if form.shows_strike() {
        body.push_str(&input(
            "strike_price",
            "Strike Price",
            "number",
            &form.strike_price,
            errors,
        ));
    }
    body.push_str("<button type=\"submit\">Fetch Historical Data</button>\n</form>\n");

    body.push_str(&format!(
        "<h2>Historical Data Results</h2>\n<p>Market data for {} ({})</p>\n",
        escape(&form.stock_code),
        escape(&form.exchange_code)
    ));
    body.push_str(&notice_html(notice));

    match results {
        Some(view) if !view.bars.is_empty() => body.push_str(&results_table(form, view)),
        _ => body.push_str(
            "<p>No data available. Configure parameters and fetch historical data.</p>\n",
        ),
    }

    layout("Historical Data", "", &body)
}

fn results_table(form: &QueryForm, view: &ResultsView<'_>) -> String {
    let mut html = format!(
        "<p><span class=\"badge\">{} Data Points</span><span class=\"badge\">{} Interval</span>\
         <span class=\"badge\">{}</span></p>\n",
        view.total,
        escape(&form.interval),
        escape(&form.product_type.to_uppercase())
    );
    if view.bars.len() < view.total {
        html.push_str(&format!(
            "<p>Showing first {} of {} rows.</p>\n",
            view.bars.len(),
            view.total
        ));
    }
    html.push_str(
        "<table>\n<thead><tr><th>Date &amp; Time</th><th>Open</th><th>High</th><th>Low</th>\
         <th>Close</th><th>Volume</th><th>Open Interest</th></tr></thead>\n<tbody>\n",
    );
    for bar in view.bars {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            format_local(&bar.datetime),
            format_inr(bar.open),
            format_inr(bar.high),
            format_inr(bar.low),
            format_inr(bar.close),
            format_count(bar.volume),
            format_count(bar.open_interest),
        ));
    }
    html.push_str("</tbody>\n</table>\n");
    html
}
