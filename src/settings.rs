//! Application settings.
//!
//! Values are layered, later sources win:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`StockMonitor.toml` in the working directory)
//! 3. environment variables prefixed with `STOCK_MONITOR_`, e.g. `STOCK_MONITOR_API_KEY`

use std::fmt;
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::StartupError;

pub const DEFAULT_SETTINGS_FILE: &str = "StockMonitor.toml";
const ENV_PREFIX: &str = "STOCK_MONITOR";

pub const DEFAULT_API_KEY: &str = "YOUR_ALPHA_VANTAGE_API_KEY";
pub const DEFAULT_SYMBOL: &str = "GOOG";
pub const DEFAULT_DISPLAY_NAME: &str = "Google";
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co";
pub const DEFAULT_INTERVAL_SECS: i64 = 60;
pub const DEFAULT_WINDOW_TITLE: &str = "Stock Price Monitor";
pub const DEFAULT_CHART_TITLE: &str = "Stock Monitoring, 2024";
pub const DEFAULT_WINDOW_WIDTH: f64 = 800.0;
pub const DEFAULT_WINDOW_HEIGHT: f64 = 600.0;

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub api_key: String,
    pub symbol: String,
    /// Name shown in the chart legend.
    pub display_name: String,
    /// Scheme and host of the quote provider, without a trailing `/query`.
    pub base_url: String,
    pub interval_secs: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    pub window_title: String,
    pub chart_title: String,
    pub window_width: f64,
    pub window_height: f64,
}

impl Settings {
    /// Loads settings using `StockMonitor.toml` from the working directory, if present.
    pub fn load() -> Result<Self, StartupError> {
        Self::load_from(DEFAULT_SETTINGS_FILE)
    }

    /// Loads settings with `path` as the (optional) settings file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let settings: Settings = Config::builder()
            .set_default("api_key", DEFAULT_API_KEY)?
            .set_default("symbol", DEFAULT_SYMBOL)?
            .set_default("display_name", DEFAULT_DISPLAY_NAME)?
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("interval_secs", DEFAULT_INTERVAL_SECS)?
            .set_default("window_title", DEFAULT_WINDOW_TITLE)?
            .set_default("chart_title", DEFAULT_CHART_TITLE)?
            .set_default("window_width", DEFAULT_WINDOW_WIDTH)?
            .set_default("window_height", DEFAULT_WINDOW_HEIGHT)?
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), StartupError> {
        if self.api_key.trim().is_empty() {
            return Err(invalid("api_key", "must not be empty"));
        }
        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol", "must not be empty"));
        }
        if self.interval_secs == 0 {
            return Err(invalid("interval_secs", "must be at least 1 second"));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(invalid("request_timeout_secs", "must be at least 1 second"));
        }
        if self.window_width <= 0.0 || self.window_height <= 0.0 {
            return Err(invalid("window_width/window_height", "must be positive"));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// True while the placeholder key is still configured.
    pub fn uses_placeholder_key(&self) -> bool {
        self.api_key == DEFAULT_API_KEY
    }
}

fn invalid(key: &'static str, reason: &str) -> StartupError {
    StartupError::InvalidSetting {
        key,
        reason: reason.to_string(),
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &"[REDACTED]")
            .field("symbol", &self.symbol)
            .field("display_name", &self.display_name)
            .field("base_url", &self.base_url)
            .field("interval_secs", &self.interval_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("window_title", &self.window_title)
            .field("chart_title", &self.chart_title)
            .field("window_width", &self.window_width)
            .field("window_height", &self.window_height)
            .finish()
    }
}
