use std::net::SocketAddr;
use std::time::Duration;

use breeze_desk_core::display::DisplayLimit;
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "breeze-desk",
    about = "Web front end and proxy for BreezeConnect historical data"
)]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    pub listen: SocketAddr,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,

    /// Timeout in seconds for each call to the broker
    #[arg(long, default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins (comma-separated, `*` allows any)
    #[arg(long, value_delimiter = ',', default_value = "http://localhost:3000")]
    pub cors_origins: Vec<String>,

    /// Override the Breeze REST base URL (customer details)
    #[arg(long)]
    pub breeze_api_url: Option<String>,

    /// Override the Breeze historical charts base URL
    #[arg(long)]
    pub breeze_charts_url: Option<String>,

    /// Lifetime of a registered session in minutes
    #[arg(long, default_value_t = 1440)]
    pub session_ttl_mins: u64,

    /// Delay before the credential page moves on to the query page, in milliseconds
    #[arg(long, default_value_t = 2000)]
    pub redirect_delay_ms: u64,

    /// Maximum rows shown in the results table (all rows if omitted)
    #[arg(long)]
    pub display_limit: Option<usize>,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_mins * 60)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }

    pub fn display_limit(&self) -> DisplayLimit {
        DisplayLimit::from(self.display_limit)
    }
}
