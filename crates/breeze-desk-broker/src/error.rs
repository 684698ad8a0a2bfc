use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("Broker did not respond within {} seconds", .0.as_secs())]
    Timeout(Duration),
}

impl BrokerError {
    /// True when the broker could not be reached or never answered.
    pub fn is_transport(&self) -> bool {
        matches!(self, BrokerError::Http(_) | BrokerError::Timeout(_))
    }
}
