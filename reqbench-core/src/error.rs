pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`concurrency` must be a positive integer")]
    InvalidConcurrency,

    #[error("`limit` must be a positive integer")]
    InvalidLimit,

    #[error("`duration` must be a positive duration")]
    InvalidDuration,

    #[error("`limit` and `duration` are mutually exclusive")]
    ConflictingStopConditions,

    #[error("`timeout` must be a positive duration")]
    InvalidTimeout,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("only http:// and https:// URLs are supported: {0}")]
    UnsupportedScheme(String),

    #[error("invalid http header name: {0}")]
    HeaderName(#[from] http::header::InvalidHeaderName),

    #[error("invalid http header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("request data rows must not be empty")]
    EmptyDataRows,

    #[error("at most one of `data`, `data_rows` or `body` may be set")]
    ConflictingData,

    #[error("failed to encode request body: {0}")]
    BodyEncode(#[from] serde_json::Error),

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// Configuration errors are detected before any request is sent.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        !matches!(self, Self::Join(_))
    }
}
