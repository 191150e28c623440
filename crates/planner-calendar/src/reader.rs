//! Retrieval strategies: one calendar's raw records for a date range.

use std::sync::Arc;

use async_trait::async_trait;
use planner_core::RetrievalStrategy;
use serde_json::Value;

use crate::client::CalendarApi;
use crate::error::RetrievalError;
use crate::resolve::{self, marker_instant};
use crate::state::StateLookup;
use crate::types::{DateRange, RawEventRecord, RawStateRecord, SourceRef};

#[async_trait]
pub trait SourceReader: Send + Sync {
    /// # Errors
    /// Returns a [`RetrievalError`] when the calendar cannot be read.
    async fn read(
        &self,
        source: &SourceRef,
        range: &DateRange,
    ) -> Result<Vec<RawEventRecord>, RetrievalError>;
}

/// Reads each calendar through the host's calendar API.
pub struct RemoteReader {
    api: Arc<dyn CalendarApi>,
}

impl RemoteReader {
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SourceReader for RemoteReader {
    async fn read(
        &self,
        source: &SourceRef,
        range: &DateRange,
    ) -> Result<Vec<RawEventRecord>, RetrievalError> {
        self.api
            .get_events(source.as_str(), &range.start, &range.end)
            .await
    }
}

/// Reads events embedded in resident entity state. Never touches the network.
pub struct LocalReader {
    lookup: Arc<dyn StateLookup>,
}

impl LocalReader {
    pub fn new(lookup: Arc<dyn StateLookup>) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl SourceReader for LocalReader {
    async fn read(
        &self,
        source: &SourceRef,
        range: &DateRange,
    ) -> Result<Vec<RawEventRecord>, RetrievalError> {
        let Some(state) = self.lookup.get_local_state(source.as_str()) else {
            tracing::debug!(calendar = %source, "No resident state");
            return Ok(Vec::new());
        };

        Ok(extract_events(&state)
            .into_iter()
            .filter(|record| overlaps(record, range))
            .collect())
    }
}

/// Pick the reader matching a configured strategy.
pub fn for_strategy(
    strategy: RetrievalStrategy,
    api: Arc<dyn CalendarApi>,
    lookup: Arc<dyn StateLookup>,
) -> Arc<dyn SourceReader> {
    match strategy {
        RetrievalStrategy::Remote => Arc::new(RemoteReader::new(api)),
        RetrievalStrategy::Local => Arc::new(LocalReader::new(lookup)),
    }
}

/// Event entries carried by a state record.
///
/// An `events` list attribute wins; otherwise a calendar entity's own
/// attributes describe its current or next event, titled by `message`.
fn extract_events(state: &RawStateRecord) -> Vec<RawEventRecord> {
    if let Some(Value::Array(items)) = state.attributes.get("events") {
        return items
            .iter()
            .cloned()
            .filter_map(RawEventRecord::from_value)
            .collect();
    }

    if !state.attributes.contains_key("start_time") {
        return Vec::new();
    }

    let mut fields = state.attributes.clone();
    if !fields.contains_key("summary") {
        if let Some(message) = fields.get("message").cloned() {
            fields.insert("summary".to_string(), message);
        }
    }
    vec![RawEventRecord::new(fields)]
}

/// Whether a record intersects `[range.start, range.end)`.
///
/// Records whose markers don't parse are kept.
fn overlaps(record: &RawEventRecord, range: &DateRange) -> bool {
    let start = resolve::START.resolve_text(record);
    let end = resolve::END.resolve_text(record).or_else(|| start.clone());

    let parsed = (
        start.as_deref().and_then(marker_instant),
        end.as_deref().and_then(marker_instant),
        marker_instant(&range.start),
        marker_instant(&range.end),
    );

    match parsed {
        (Some(start), Some(end), Some(window_start), Some(window_end)) => {
            start < window_end && (end > window_start || start >= window_start)
        }
        _ => true,
    }
}
