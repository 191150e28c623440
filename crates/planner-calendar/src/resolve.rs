//! Field resolution from raw event records to normalized events.
//!
//! Raw records name the same concept differently depending on where they
//! came from (`summary` vs `title`, `start` vs `start_time`). Each
//! normalized field has one ordered list of candidate raw fields; the first
//! candidate holding a non-empty value wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::error::MalformedRecordError;
use crate::types::{NormalizedEvent, RawEventRecord, SourceRef};

/// Normalized field a resolution list feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedField {
    Title,
    Start,
    End,
    AllDay,
}

/// Ordered candidate raw field names for one normalized field.
#[derive(Debug, Clone, Copy)]
pub struct FieldResolution {
    pub field: NormalizedField,
    pub candidates: &'static [&'static str],
}

pub const TITLE: FieldResolution = FieldResolution {
    field: NormalizedField::Title,
    candidates: &["summary", "title"],
};

pub const START: FieldResolution = FieldResolution {
    field: NormalizedField::Start,
    candidates: &["start", "start_time"],
};

pub const END: FieldResolution = FieldResolution {
    field: NormalizedField::End,
    candidates: &["end", "end_time"],
};

pub const ALL_DAY: FieldResolution = FieldResolution {
    field: NormalizedField::AllDay,
    candidates: &["all_day"],
};

impl FieldResolution {
    /// First candidate carrying a non-empty textual value.
    ///
    /// Date markers may arrive nested as `{"dateTime": ..}` or `{"date": ..}`.
    pub fn resolve_text(&self, record: &RawEventRecord) -> Option<String> {
        self.candidates
            .iter()
            .filter_map(|name| record.get(name))
            .find_map(text_value)
    }

    /// First candidate carrying a boolean (or `"true"`/`"false"`).
    pub fn resolve_flag(&self, record: &RawEventRecord) -> Option<bool> {
        self.candidates
            .iter()
            .filter_map(|name| record.get(name))
            .find_map(flag_value)
    }
}

fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(nested) => ["dateTime", "date"]
            .iter()
            .filter_map(|key| nested.get(*key))
            .find_map(text_value),
        _ => None,
    }
}

fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Map one raw record to the uniform event shape.
///
/// # Errors
/// Returns [`MalformedRecordError::MissingStart`] when no start candidate is present.
pub fn normalize(
    record: &RawEventRecord,
    placeholder_title: &str,
) -> Result<NormalizedEvent, MalformedRecordError> {
    let start = START
        .resolve_text(record)
        .ok_or(MalformedRecordError::MissingStart)?;
    let end = END.resolve_text(record).unwrap_or_else(|| start.clone());
    let title = TITLE
        .resolve_text(record)
        .unwrap_or_else(|| placeholder_title.to_string());
    let all_day = ALL_DAY.resolve_flag(record).unwrap_or(false);

    Ok(NormalizedEvent {
        title,
        start,
        end,
        all_day,
    })
}

/// Normalize a calendar's records, dropping the ones without a start.
pub fn normalize_all(
    records: Vec<RawEventRecord>,
    source: &SourceRef,
    placeholder_title: &str,
) -> Vec<NormalizedEvent> {
    records
        .iter()
        .filter_map(|record| match normalize(record, placeholder_title) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(calendar = %source, "Dropping event record: {}", e);
                None
            }
        })
        .collect()
}

/// Interpret a date marker as a naive instant, if it has a known shape.
///
/// Every marker is read as the wall-clock time it spells out. Offsets are
/// not applied, so `09:00-05:00` and a naive `09:00` compare equal.
pub fn marker_instant(marker: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(marker) {
        return Some(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(marker, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(marker, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Stable ascending sort by start. Unparseable starts go last, in string order.
pub fn sort_chronologically(events: &mut [NormalizedEvent]) {
    events.sort_by_key(|event| {
        let instant = marker_instant(&event.start);
        (instant.is_none(), instant, event.start.clone())
    });
}
