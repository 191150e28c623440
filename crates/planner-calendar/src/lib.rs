//! Calendar event aggregation for the planner card.
//!
//! Fetches events for a set of Home Assistant calendar entities, either
//! from the REST API or from resident entity state, and normalizes them
//! into one uniform shape for a calendar-rendering surface.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod feed;
pub mod reader;
pub mod resolve;
pub mod sink;
pub mod state;
pub mod types;

pub use aggregator::{AggregatorOptions, EventAggregator};
pub use client::{CalendarApi, HomeAssistantClient};
pub use error::{FetchError, MalformedRecordError, RetrievalError, RetrievalErrorKind};
pub use feed::EventFeed;
pub use planner_core::{EventOrdering, FailurePolicy, RetrievalStrategy};
pub use reader::{LocalReader, RemoteReader, SourceReader};
pub use sink::{FailureSink, TracingSink};
pub use state::{StateLookup, StateStore};
pub use types::{
    CalendarInfo, DateRange, NormalizedEvent, RawEventRecord, RawStateRecord, SourceRef, SourceSet,
};
