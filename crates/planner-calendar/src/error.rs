//! Calendar-specific error types.

use planner_core::NetworkError;
use thiserror::Error;

/// One calendar's events could not be retrieved.
#[derive(Error, Debug)]
#[error("Failed to load events for calendar {source_id}: {kind}")]
pub struct RetrievalError {
    pub source_id: String,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    #[source]
    pub kind: RetrievalErrorKind,
}

#[derive(Error, Debug)]
pub enum RetrievalErrorKind {
    #[error("Access token rejected")]
    Unauthorized,

    #[error("Calendar not found")]
    NotFound,

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("API error: {0}")]
    Api(String),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl RetrievalError {
    pub fn new(source_id: impl Into<String>, status: Option<u16>, kind: RetrievalErrorKind) -> Self {
        Self {
            source_id: source_id.into(),
            status,
            kind,
        }
    }

    /// Transport-level failure (no usable response).
    pub fn network(source_id: impl Into<String>, error: NetworkError) -> Self {
        let status = error.status();
        Self::new(source_id, status, RetrievalErrorKind::Network(error))
    }

    /// Non-success HTTP status.
    pub fn from_status(source_id: impl Into<String>, status: u16, body: String) -> Self {
        let kind = match status {
            401 | 403 => RetrievalErrorKind::Unauthorized,
            404 => RetrievalErrorKind::NotFound,
            _ => RetrievalErrorKind::Api(format!("{status}: {body}")),
        };
        Self::new(source_id, Some(status), kind)
    }

    pub fn malformed(source_id: impl Into<String>, status: Option<u16>, detail: impl Into<String>) -> Self {
        Self::new(
            source_id,
            status,
            RetrievalErrorKind::MalformedResponse(detail.into()),
        )
    }

    /// User-friendly error message for the card.
    pub fn user_message(&self) -> String {
        match &self.kind {
            RetrievalErrorKind::Unauthorized => {
                "Home Assistant rejected the access token".to_string()
            }
            RetrievalErrorKind::NotFound => format!("Calendar {} not found", self.source_id),
            RetrievalErrorKind::MalformedResponse(_) => {
                format!("Calendar {} returned unreadable data", self.source_id)
            }
            RetrievalErrorKind::Api(_) => format!("Could not load calendar {}", self.source_id),
            RetrievalErrorKind::Network(e) => e.user_message().to_string(),
        }
    }
}

/// A raw record that cannot become an event. Such records are dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecordError {
    #[error("Event record has no start marker")]
    MissingStart,
}

/// Failure surfaced to callers of the aggregator in fail-fast mode.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl FetchError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Retrieval(e) => e.user_message(),
        }
    }
}
