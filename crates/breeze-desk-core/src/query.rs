use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::credentials::Credentials;
use crate::datetime;
use crate::error::{DeskError, FieldErrors};

/// Bar interval supported by the historical charts endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1second")]
    OneSecond,
    #[serde(rename = "1minute")]
    OneMinute,
    #[serde(rename = "5minute")]
    FiveMinute,
    #[serde(rename = "30minute")]
    ThirtyMinute,
    #[serde(rename = "1day")]
    OneDay,
}

impl Interval {
    pub const ALL: [Interval; 5] = [
        Interval::OneSecond,
        Interval::OneMinute,
        Interval::FiveMinute,
        Interval::ThirtyMinute,
        Interval::OneDay,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneSecond => "1second",
            Interval::OneMinute => "1minute",
            Interval::FiveMinute => "5minute",
            Interval::ThirtyMinute => "30minute",
            Interval::OneDay => "1day",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Interval::OneSecond => "1 Second",
            Interval::OneMinute => "1 Minute",
            Interval::FiveMinute => "5 Minutes",
            Interval::ThirtyMinute => "30 Minutes",
            Interval::OneDay => "1 Day",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| DeskError::UnknownVariant {
                kind: "interval",
                value: s.to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Cash,
    Futures,
    Options,
}

impl ProductType {
    pub const ALL: [ProductType; 3] = [ProductType::Cash, ProductType::Futures, ProductType::Options];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Cash => "cash",
            ProductType::Futures => "futures",
            ProductType::Options => "options",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProductType::Cash => "Cash",
            ProductType::Futures => "Futures",
            ProductType::Options => "Options",
        }
    }

    /// Futures and options carry an expiry.
    pub fn is_derivative(&self) -> bool {
        !matches!(self, ProductType::Cash)
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProductType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DeskError::UnknownVariant {
                kind: "product type",
                value: s.to_string(),
            })
    }
}

/// Option type ("right") of an options contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionRight {
    Call,
    Put,
    Others,
}

impl OptionRight {
    pub const ALL: [OptionRight; 3] = [OptionRight::Call, OptionRight::Put, OptionRight::Others];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionRight::Call => "call",
            OptionRight::Put => "put",
            OptionRight::Others => "others",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OptionRight::Call => "Call",
            OptionRight::Put => "Put",
            OptionRight::Others => "Others",
        }
    }
}

impl fmt::Display for OptionRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionRight {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OptionRight::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DeskError::UnknownVariant {
                kind: "option type",
                value: s.to_string(),
            })
    }
}

/// Exchange on which options carry a right.
pub const DERIVATIVES_EXCHANGE: &str = "NFO";

/// Raw historical-data request as it arrives from a JSON body or form.
/// Every field is a string so that validation can report all problems at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoricalRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    /// Session registered by an earlier init-session call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub interval: String,
    #[serde(deserialize_with = "lenient_string")]
    pub from_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub to_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub stock_code: String,
    #[serde(deserialize_with = "lenient_string")]
    pub exchange_code: String,
    #[serde(deserialize_with = "lenient_string")]
    pub product_type: String,
    #[serde(deserialize_with = "lenient_string")]
    pub expiry_date: String,
    #[serde(deserialize_with = "lenient_string")]
    pub right: String,
    #[serde(deserialize_with = "lenient_string")]
    pub strike_price: String,
}

/// Validated query, ready to send upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricalQuery {
    pub interval: Interval,
    pub from_date: DateTime<Utc>,
    pub to_date: DateTime<Utc>,
    pub stock_code: String,
    pub exchange_code: String,
    pub product_type: ProductType,
    pub expiry_date: Option<DateTime<Utc>>,
    pub right: Option<OptionRight>,
    pub strike_price: Option<Decimal>,
}

impl HistoricalQuery {
    /// `right` only applies to options traded on NFO.
    pub fn include_right(&self) -> bool {
        self.product_type == ProductType::Options && self.exchange_code == DERIVATIVES_EXCHANGE
    }
}

impl HistoricalRequest {
    /// Check the query fields and build a typed query.
    /// Collects every problem rather than stopping at the first.
    /// Credentials are not checked here.
    pub fn validate(&self) -> Result<HistoricalQuery, FieldErrors> {
        let mut errors = FieldErrors::new();

        let interval = parse_required(
            &mut errors,
            "interval",
            &self.interval,
            "Interval is required",
            str::parse::<Interval>,
        );
        let from_date = parse_required(
            &mut errors,
            "from_date",
            &self.from_date,
            "From date is required",
            datetime::parse_rfc3339,
        );
        let to_date = parse_required(
            &mut errors,
            "to_date",
            &self.to_date,
            "To date is required",
            datetime::parse_rfc3339,
        );
        let stock_code = parse_required(
            &mut errors,
            "stock_code",
            &self.stock_code,
            "Stock code is required",
            |s| Ok(s.to_uppercase()),
        );
        let exchange_code = parse_required(
            &mut errors,
            "exchange_code",
            &self.exchange_code,
            "Exchange code is required",
            |s| Ok(s.to_uppercase()),
        );
        let product_type = parse_required(
            &mut errors,
            "product_type",
            &self.product_type,
            "Product type is required",
            str::parse::<ProductType>,
        );

        if let (Some(from), Some(to)) = (from_date, to_date) {
            if from >= to {
                errors.insert("to_date", "To date must be after from date");
            }
        }

        let mut expiry_date = None;
        let mut strike_price = None;
        let mut right = None;

        if let Some(product) = product_type {
            if product.is_derivative() {
                expiry_date = parse_required(
                    &mut errors,
                    "expiry_date",
                    &self.expiry_date,
                    "Expiry date is required",
                    datetime::parse_rfc3339,
                );
            }
            if product == ProductType::Options {
                strike_price = parse_required(
                    &mut errors,
                    "strike_price",
                    &self.strike_price,
                    "Strike price is required",
                    parse_strike,
                );
                if exchange_code.as_deref() == Some(DERIVATIVES_EXCHANGE) {
                    right = parse_required(
                        &mut errors,
                        "right",
                        &self.right,
                        "Option type is required",
                        str::parse::<OptionRight>,
                    );
                }
            }
        }

        match (interval, from_date, to_date, stock_code, exchange_code, product_type) {
            (
                Some(interval),
                Some(from_date),
                Some(to_date),
                Some(stock_code),
                Some(exchange_code),
                Some(product_type),
            ) if errors.is_empty() => Ok(HistoricalQuery {
                interval,
                from_date,
                to_date,
                stock_code,
                exchange_code,
                product_type,
                expiry_date,
                right,
                strike_price,
            }),
            _ => Err(errors),
        }
    }
}

fn parse_required<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    missing: &str,
    parse: impl FnOnce(&str) -> Result<T, DeskError>,
) -> Option<T> {
    let value = value.trim();
    if value.is_empty() {
        errors.insert(field, missing);
        return None;
    }
    match parse(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            errors.insert(field, e.to_string());
            None
        }
    }
}

fn parse_strike(value: &str) -> Result<Decimal, DeskError> {
    let strike =
        Decimal::from_str(value).map_err(|_| DeskError::InvalidNumber(value.to_string()))?;
    if strike.is_sign_negative() {
        return Err(DeskError::InvalidNumber(value.to_string()));
    }
    Ok(strike)
}

/// Accepts a string, a number (strike prices from some API clients) or `null`,
/// which reads as an absent field.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
