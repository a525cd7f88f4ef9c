use std::time::Duration;

use crate::runner::FailureKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http request build failed: {0}")]
    RequestBuild(#[from] http::Error),

    #[error("http request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    BodyRead(#[from] hyper::Error),
}

impl Error {
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::RequestBuild(_) => FailureKind::Request,
            Self::Request(err) if err.is_connect() => FailureKind::Connect,
            Self::Request(_) => FailureKind::Request,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::BodyRead(_) => FailureKind::BodyRead,
        }
    }
}
