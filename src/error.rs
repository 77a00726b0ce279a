use thiserror::Error;

/// Everything that can go wrong while fetching a single quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// The provider answered with a non-success status code.
    #[error("unexpected response code {status}")]
    Transport { status: u16 },

    /// The provider is throttling us ("Note" field in the response).
    #[error("API call frequency exceeded: {0}")]
    RateLimited(String),

    /// The provider rejected the request ("Error Message" field in the response).
    #[error("invalid API call: {0}")]
    InvalidRequest(String),

    #[error("unexpected response schema: {0}")]
    UnexpectedSchema(String),

    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("response is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The UI event loop refused a sample, usually because the window is gone.
#[derive(Debug, Error)]
#[error("could not hand sample to the chart: {0}")]
pub struct DispatchError(pub String);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load settings: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to start ticker thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("window platform error: {0}")]
    Platform(#[from] druid::PlatformError),
}
