//! Host-side refresh loop for a rendering surface.
//!
//! The aggregator is stateless; `EventFeed` is what a host keeps around to
//! re-query when the visible window or upstream entity state changes, and
//! to make sure listeners only ever see the most recently requested result.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::aggregator::EventAggregator;
use crate::error::FetchError;
use crate::types::{DateRange, NormalizedEvent, SourceSet};

type EventsListener = Box<dyn Fn(&[NormalizedEvent]) + Send + Sync>;
type ErrorListener = Box<dyn Fn(&FetchError) + Send + Sync>;

#[derive(Clone)]
pub struct EventFeed {
    inner: Arc<FeedInner>,
}

struct FeedInner {
    aggregator: EventAggregator,
    sources: SourceSet,
    range: Mutex<Option<DateRange>>,
    generation: AtomicU64,
    listeners: RwLock<Vec<EventsListener>>,
    error_listeners: RwLock<Vec<ErrorListener>>,
}

impl EventFeed {
    pub fn new(aggregator: EventAggregator, sources: SourceSet) -> Self {
        Self {
            inner: Arc::new(FeedInner {
                aggregator,
                sources,
                range: Mutex::new(None),
                generation: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                error_listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a listener for fresh event lists.
    pub fn subscribe(&self, listener: impl Fn(&[NormalizedEvent]) + Send + Sync + 'static) {
        self.inner.listeners.write().push(Box::new(listener));
    }

    /// Register a listener for query failures (fail-fast mode only).
    pub fn subscribe_errors(&self, listener: impl Fn(&FetchError) + Send + Sync + 'static) {
        self.inner.error_listeners.write().push(Box::new(listener));
    }

    pub fn range(&self) -> Option<DateRange> {
        self.inner.range.lock().clone()
    }

    /// The visible window changed: remember it and re-query.
    ///
    /// Returns whether the result was delivered (see [`EventFeed::refresh`]).
    pub async fn set_range(&self, range: DateRange) -> bool {
        *self.inner.range.lock() = Some(range);
        self.refresh().await
    }

    /// Upstream entity state changed: re-query the current window.
    pub async fn notify_state_changed(&self) -> bool {
        self.refresh().await
    }

    /// Query the current window and hand the result to listeners.
    ///
    /// Returns `false` without notifying anyone when no window has been set
    /// yet, or when a newer refresh started while this one was in flight.
    pub async fn refresh(&self) -> bool {
        let Some(range) = self.range() else {
            return false;
        };
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let result = self
            .inner
            .aggregator
            .fetch_events(&self.inner.sources, &range)
            .await;

        if self.inner.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(
                start = %range.start,
                end = %range.end,
                "Discarding superseded calendar result"
            );
            return false;
        }

        match result {
            Ok(events) => {
                for listener in self.inner.listeners.read().iter() {
                    listener(&events);
                }
            }
            Err(e) => {
                tracing::error!("Error fetching calendar events: {}", e);
                for listener in self.inner.error_listeners.read().iter() {
                    listener(&e);
                }
            }
        }
        true
    }

    /// Run [`EventFeed::refresh`] in the background.
    pub fn spawn_refresh(&self) -> JoinHandle<bool> {
        let feed = self.clone();
        tokio::spawn(async move { feed.refresh().await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::AggregatorOptions;
    use crate::error::RetrievalError;
    use crate::reader::SourceReader;
    use crate::types::{RawEventRecord, SourceRef};
    use async_trait::async_trait;
    use planner_core::FailurePolicy;
    use serde_json::json;
    use std::time::Duration;

    /// Echoes the window start as the event title; the window "slow" lags.
    struct EchoReader;

    #[async_trait]
    impl SourceReader for EchoReader {
        async fn read(
            &self,
            source: &SourceRef,
            range: &DateRange,
        ) -> Result<Vec<RawEventRecord>, RetrievalError> {
            match range.start.as_str() {
                "slow" => tokio::time::sleep(Duration::from_millis(200)).await,
                "broken" => {
                    return Err(RetrievalError::from_status(source.as_str(), 502, String::new()))
                }
                _ => {}
            }
            Ok(serde_json::from_value(json!([{"summary": range.start, "start": "2024-01-01"}]))
                .unwrap())
        }
    }

    fn feed(policy: FailurePolicy) -> (EventFeed, Arc<Mutex<Vec<String>>>) {
        let aggregator = EventAggregator::new(Arc::new(EchoReader)).with_options(AggregatorOptions {
            failure_policy: policy,
            ..AggregatorOptions::default()
        });
        let feed = EventFeed::new(aggregator, SourceSet::new(["calendar.home"]));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        feed.subscribe(move |events| {
            sink.lock()
                .extend(events.iter().map(|event| event.title.clone()));
        });
        (feed, seen)
    }

    #[tokio::test]
    async fn test_refresh_without_range_does_nothing() {
        let (feed, seen) = feed(FailurePolicy::BestEffort);
        assert!(!feed.refresh().await);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_set_range_and_state_change_notify() {
        let (feed, seen) = feed(FailurePolicy::BestEffort);
        assert!(feed.set_range(DateRange::new("2024-01-01", "2024-01-08")).await);
        assert!(feed.notify_state_changed().await);
        assert_eq!(*seen.lock(), vec!["2024-01-01", "2024-01-01"]);
    }

    #[tokio::test]
    async fn test_superseded_result_is_discarded() {
        let (feed, seen) = feed(FailurePolicy::BestEffort);

        let stale = {
            let feed = feed.clone();
            tokio::spawn(async move { feed.set_range(DateRange::new("slow", "x")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(feed.set_range(DateRange::new("fresh", "x")).await);
        assert!(!stale.await.unwrap());
        assert_eq!(*seen.lock(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_spawned_refresh_delivers() {
        let (feed, seen) = feed(FailurePolicy::BestEffort);
        *feed.inner.range.lock() = Some(DateRange::new("2024-02-01", "2024-03-01"));
        assert!(feed.spawn_refresh().await.unwrap());
        assert_eq!(*seen.lock(), vec!["2024-02-01"]);
    }

    #[tokio::test]
    async fn test_fail_fast_errors_reach_error_listeners() {
        let (feed, seen) = feed(FailurePolicy::FailFast);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        feed.subscribe_errors(move |e| sink.lock().push(e.to_string()));

        assert!(feed.set_range(DateRange::new("broken", "x")).await);
        assert!(seen.lock().is_empty());
        assert_eq!(errors.lock().len(), 1);
    }
}
