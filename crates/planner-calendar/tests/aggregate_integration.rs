//! Integration tests for EventAggregator against a mock Home Assistant.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use planner_calendar::{
    AggregatorOptions, DateRange, EventAggregator, FailurePolicy, FailureSink, FetchError,
    HomeAssistantClient, LocalReader, NormalizedEvent, RawStateRecord, RemoteReader,
    RetrievalError, SourceSet, StateStore,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Sink that remembers every reported calendar.
#[derive(Default)]
struct RecordingSink {
    reports: Mutex<Vec<(String, Option<u16>)>>,
}

impl FailureSink for RecordingSink {
    fn report(&self, _message: &str, error: &RetrievalError) {
        self.reports
            .lock()
            .push((error.source_id.clone(), error.status));
    }
}

fn week() -> DateRange {
    DateRange::new("2024-01-01", "2024-01-08")
}

fn event(title: &str, start: &str, end: &str, all_day: bool) -> NormalizedEvent {
    NormalizedEvent {
        title: title.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        all_day,
    }
}

async fn mount_calendar(server: &MockServer, entity: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/api/calendars/{entity}")))
        .and(query_param("start", "2024-01-01"))
        .and(query_param("end", "2024-01-08"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_work_and_home(server: &MockServer) {
    mount_calendar(
        server,
        "calendar.work",
        serde_json::json!([
            {"summary": "Standup", "start": "2024-01-02T09:00", "end": "2024-01-02T09:30"}
        ]),
    )
    .await;
    mount_calendar(
        server,
        "calendar.home",
        serde_json::json!([
            {"title": "Trash day", "start_time": "2024-01-03", "all_day": true}
        ]),
    )
    .await;
}

fn remote_aggregator(server: &MockServer, options: AggregatorOptions) -> EventAggregator {
    let client =
        HomeAssistantClient::new(&server.uri(), Some("token".into()), Duration::from_secs(5))
            .unwrap();
    EventAggregator::new(Arc::new(RemoteReader::new(Arc::new(client)))).with_options(options)
}

fn sorted(mut events: Vec<NormalizedEvent>) -> Vec<NormalizedEvent> {
    events.sort_by(|a, b| a.title.cmp(&b.title));
    events
}

#[tokio::test]
async fn test_work_and_home_scenario() {
    let server = MockServer::start().await;
    mount_work_and_home(&server).await;

    let aggregator = remote_aggregator(&server, AggregatorOptions::default());
    let events = aggregator
        .fetch_events(&SourceSet::new(["calendar.work", "calendar.home"]), &week())
        .await
        .unwrap();

    assert_eq!(
        sorted(events),
        vec![
            event("Standup", "2024-01-02T09:00", "2024-01-02T09:30", false),
            event("Trash day", "2024-01-03", "2024-01-03", true),
        ]
    );
}

#[tokio::test]
async fn test_best_effort_skips_failed_calendar() {
    let server = MockServer::start().await;
    mount_work_and_home(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/calendars/calendar.broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let sink = Arc::new(RecordingSink::default());
    let aggregator =
        remote_aggregator(&server, AggregatorOptions::default()).with_sink(sink.clone());

    let events = aggregator
        .fetch_events(
            &SourceSet::new(["calendar.work", "calendar.broken", "calendar.home"]),
            &week(),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(
        *sink.reports.lock(),
        vec![("calendar.broken".to_string(), Some(500))]
    );
}

#[tokio::test]
async fn test_fail_fast_surfaces_failure() {
    let server = MockServer::start().await;
    mount_work_and_home(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/calendars/calendar.broken"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let aggregator = remote_aggregator(
        &server,
        AggregatorOptions {
            failure_policy: FailurePolicy::FailFast,
            ..AggregatorOptions::default()
        },
    );

    let result = aggregator
        .fetch_events(
            &SourceSet::new(["calendar.work", "calendar.broken", "calendar.home"]),
            &week(),
        )
        .await;

    match result {
        Err(FetchError::Retrieval(e)) => {
            assert_eq!(e.source_id, "calendar.broken");
            assert_eq!(e.status, Some(404));
        }
        other => panic!("expected a retrieval failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_sources_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let aggregator = remote_aggregator(
        &server,
        AggregatorOptions {
            failure_policy: FailurePolicy::FailFast,
            ..AggregatorOptions::default()
        },
    );
    let events = aggregator
        .fetch_events(&SourceSet::from_config_value(None), &week())
        .await
        .unwrap();

    assert!(events.is_empty());
}

#[tokio::test]
async fn test_repeated_fetch_is_idempotent() {
    let server = MockServer::start().await;
    mount_work_and_home(&server).await;

    let aggregator = remote_aggregator(&server, AggregatorOptions::default());
    let sources = SourceSet::new(["calendar.work", "calendar.home"]);

    let first = aggregator.fetch_events(&sources, &week()).await.unwrap();
    let second = aggregator.fetch_events(&sources, &week()).await.unwrap();

    assert_eq!(sorted(first), sorted(second));
}

#[tokio::test]
async fn test_calendars_are_fetched_concurrently() {
    let server = MockServer::start().await;
    for entity in ["calendar.a", "calendar.b", "calendar.c"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/calendars/{entity}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{"summary": entity, "start": "2024-01-02"}]))
                    .set_delay(Duration::from_millis(400)),
            )
            .mount(&server)
            .await;
    }

    let aggregator = remote_aggregator(&server, AggregatorOptions::default());
    let started = Instant::now();
    let events = aggregator
        .fetch_events(
            &SourceSet::new(["calendar.a", "calendar.b", "calendar.c"]),
            &week(),
        )
        .await
        .unwrap();

    assert_eq!(events.len(), 3);
    assert!(
        started.elapsed() < Duration::from_millis(1000),
        "took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_local_strategy_reads_resident_state() {
    let store = Arc::new(StateStore::new());
    let state: RawStateRecord = serde_json::from_value(serde_json::json!({
        "entity_id": "calendar.home",
        "state": "on",
        "attributes": {
            "message": "Trash day",
            "all_day": true,
            "start_time": "2024-01-03 00:00:00",
            "end_time": "2024-01-04 00:00:00"
        }
    }))
    .unwrap();
    store.set(state);

    let aggregator = EventAggregator::new(Arc::new(LocalReader::new(store)));
    let events = aggregator
        .fetch_events(&SourceSet::new(["calendar.home", "calendar.unknown"]), &week())
        .await
        .unwrap();

    assert_eq!(
        events,
        vec![event(
            "Trash day",
            "2024-01-03 00:00:00",
            "2024-01-04 00:00:00",
            true
        )]
    );
}
