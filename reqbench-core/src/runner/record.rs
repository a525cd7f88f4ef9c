use std::time::Duration;

use bytes::Bytes;

/// Transport-level failure classes. HTTP status codes are never failures.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused, DNS resolution failure, TLS handshake failure, connect timeout.
    Connect,
    /// The whole exchange exceeded the request timeout.
    Timeout,
    /// The connection broke while sending the request or reading the response head.
    Request,
    /// The response head arrived but the body could not be read.
    BodyRead,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { status: u16, body_size: u64 },
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } => Some(*status),
            Self::Failure { .. } => None,
        }
    }
}

/// Response headers and body, kept only under full retention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// The immutable outcome of one request attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    /// 1-based, assigned in completion order.
    pub sequence: u64,
    /// 0-based index of the permit the request was sent under.
    pub issue_index: u64,
    pub outcome: Outcome,
    /// Offset of the send from the run start.
    pub started_at: Duration,
    /// Send until the response head arrived, or until the failure.
    pub latency: Duration,
    pub response: Option<RawResponse>,
}
