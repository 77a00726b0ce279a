use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::QuoteError;
use crate::settings::{Settings, DEFAULT_BASE_URL};

const TIME_SERIES_FIELD: &str = "Time Series (1min)";
const CLOSE_FIELD: &str = "4. close";

/// Anything that can produce the latest price of the tracked symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Makes exactly one attempt. Retrying is up to the caller.
    async fn fetch_latest_price(&self) -> Result<f64, QuoteError>;
}

/// The most recent bar of an intraday series.
#[derive(Clone, Debug, PartialEq)]
pub struct LatestQuote {
    pub timestamp: String,
    pub price: f64,
}

/// Body of a `TIME_SERIES_INTRADAY` response. Only the fields we branch on are modelled.
///
/// A field counts as present whenever its key is, even with a `null` value.
#[derive(Debug, Deserialize)]
struct IntradayResponse {
    #[serde(rename = "Time Series (1min)", default, deserialize_with = "present")]
    time_series: Option<Value>,
    #[serde(rename = "Note", default, deserialize_with = "present")]
    note: Option<Value>,
    #[serde(rename = "Error Message", default, deserialize_with = "present")]
    error_message: Option<Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Picks the latest close out of an intraday response body.
///
/// The provider lists bars most recent first, so the first key of the series
/// is taken as is. Keys are never sorted.
pub fn parse_latest_quote(body: &str) -> Result<LatestQuote, QuoteError> {
    let response: IntradayResponse = serde_json::from_str(body)?;

    if let Some(series) = response.time_series {
        let series: Map<String, Value> = match series {
            Value::Object(series) => series,
            other => {
                return Err(QuoteError::UnexpectedSchema(format!(
                    "`{}` is not an object: {}",
                    TIME_SERIES_FIELD, other
                )))
            }
        };
        let (timestamp, bar) = series.into_iter().next().ok_or_else(|| {
            QuoteError::UnexpectedSchema(format!("`{}` contains no bars", TIME_SERIES_FIELD))
        })?;
        let price = close_price(&timestamp, &bar)?;
        return Ok(LatestQuote { timestamp, price });
    }
    if let Some(note) = response.note {
        return Err(QuoteError::RateLimited(message_text(note)));
    }
    if let Some(message) = response.error_message {
        return Err(QuoteError::InvalidRequest(message_text(message)));
    }

    Err(QuoteError::UnexpectedSchema(format!(
        "expected `{}` field missing",
        TIME_SERIES_FIELD
    )))
}

pub fn parse_latest_close(body: &str) -> Result<f64, QuoteError> {
    parse_latest_quote(body).map(|quote| quote.price)
}

fn close_price(timestamp: &str, bar: &Value) -> Result<f64, QuoteError> {
    let missing = || {
        QuoteError::UnexpectedSchema(format!(
            "bar {} has no usable `{}` value",
            timestamp, CLOSE_FIELD
        ))
    };

    let price = match bar.get(CLOSE_FIELD) {
        Some(Value::String(text)) => text.trim().parse::<f64>().map_err(|_| missing())?,
        Some(Value::Number(number)) => number.as_f64().ok_or_else(missing)?,
        _ => return Err(missing()),
    };

    if price.is_finite() {
        Ok(price)
    } else {
        Err(missing())
    }
}

fn message_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

/// Fetches intraday quotes for one symbol over HTTP.
pub struct QuoteFetcher {
    http_client: HttpClient,
    symbol: String,
    api_key: String,
    base_url: String,
}

impl QuoteFetcher {
    pub fn new(symbol: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_base_url(symbol, api_key, DEFAULT_BASE_URL)
    }

    /// Same as [`QuoteFetcher::new`] but talking to another host, e.g. a mock server.
    pub fn with_base_url(
        symbol: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            symbol: symbol.into(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        let mut builder = HttpClient::builder();
        if let Some(timeout) = settings.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            symbol: settings.symbol.clone(),
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    fn query_url(&self) -> String {
        format!("{}/query", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl QuoteSource for QuoteFetcher {
    async fn fetch_latest_price(&self) -> Result<f64, QuoteError> {
        let url = self.query_url();
        debug!(%url, symbol = %self.symbol, "requesting intraday series");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", self.symbol.as_str()),
                ("interval", "1min"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuoteError::Transport {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let quote = parse_latest_quote(&body)?;
        debug!(timestamp = %quote.timestamp, price = quote.price, "latest bar");
        Ok(quote.price)
    }
}
