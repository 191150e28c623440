//! Event aggregation across calendars.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use planner_core::{CardConfig, EventOrdering, FailurePolicy};
use tracing::instrument;

use crate::error::{FetchError, RetrievalError};
use crate::reader::SourceReader;
use crate::resolve;
use crate::sink::{FailureSink, TracingSink};
use crate::types::{DateRange, NormalizedEvent, SourceRef, SourceSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorOptions {
    pub failure_policy: FailurePolicy,
    pub ordering: EventOrdering,
    pub placeholder_title: String,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self::from(&CardConfig::default())
    }
}

impl From<&CardConfig> for AggregatorOptions {
    fn from(card: &CardConfig) -> Self {
        Self {
            failure_policy: card.failure_policy,
            ordering: card.ordering,
            placeholder_title: card.placeholder_title.clone(),
        }
    }
}

/// Turns a set of calendars and a visible window into one event list.
///
/// Holds no per-query state; every call is independent.
#[derive(Clone)]
pub struct EventAggregator {
    reader: Arc<dyn SourceReader>,
    sink: Arc<dyn FailureSink>,
    options: AggregatorOptions,
}

impl EventAggregator {
    pub fn new(reader: Arc<dyn SourceReader>) -> Self {
        Self {
            reader,
            sink: Arc::new(TracingSink),
            options: AggregatorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AggregatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn options(&self) -> &AggregatorOptions {
        &self.options
    }

    /// Fetch and normalize the events of every calendar in `sources`.
    ///
    /// All calendars are queried concurrently. In best-effort mode a
    /// failing calendar contributes nothing and is reported to the sink;
    /// this never returns an error.
    ///
    /// # Errors
    /// In fail-fast mode, the first calendar failure. Retrievals still in
    /// flight at that point are dropped.
    #[instrument(skip_all, fields(calendars = sources.len(), start = %range.start, end = %range.end))]
    pub async fn fetch_events(
        &self,
        sources: &SourceSet,
        range: &DateRange,
    ) -> Result<Vec<NormalizedEvent>, FetchError> {
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let fetches = sources.iter().map(|source| self.fetch_source(source, range));

        let batches = match self.options.failure_policy {
            FailurePolicy::BestEffort => join_all(fetches)
                .await
                .into_iter()
                .zip(sources)
                .filter_map(|(result, source)| match result {
                    Ok(events) => Some(events),
                    Err(e) => {
                        self.sink
                            .report(&format!("Failed to load events for calendar {source}"), &e);
                        None
                    }
                })
                .collect::<Vec<_>>(),
            FailurePolicy::FailFast => try_join_all(fetches).await?,
        };

        let mut events: Vec<NormalizedEvent> = batches.into_iter().flatten().collect();
        if self.options.ordering == EventOrdering::Chronological {
            resolve::sort_chronologically(&mut events);
        }

        tracing::debug!("Aggregated {} events", events.len());
        Ok(events)
    }

    /// Callback-style entry point for rendering surfaces that want a
    /// success/failure pair. Exactly one of the callbacks runs.
    pub async fn fetch_events_with_callbacks<S, F>(
        &self,
        sources: &SourceSet,
        range: &DateRange,
        on_success: S,
        on_failure: F,
    ) where
        S: FnOnce(Vec<NormalizedEvent>),
        F: FnOnce(FetchError),
    {
        match self.fetch_events(sources, range).await {
            Ok(events) => on_success(events),
            Err(e) => {
                tracing::error!("Error fetching calendar events: {}", e);
                on_failure(e);
            }
        }
    }

    async fn fetch_source(
        &self,
        source: &SourceRef,
        range: &DateRange,
    ) -> Result<Vec<NormalizedEvent>, RetrievalError> {
        let records = self.reader.read(source, range).await?;
        Ok(resolve::normalize_all(
            records,
            source,
            &self.options.placeholder_title,
        ))
    }
}
