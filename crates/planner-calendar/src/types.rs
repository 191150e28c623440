//! Calendar card types and data structures.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of one calendar entity, e.g. `calendar.work`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The calendars a card is configured to show, in configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet(Vec<SourceRef>);

impl SourceSet {
    pub fn new<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SourceRef>,
    {
        Self(sources.into_iter().map(Into::into).collect())
    }

    /// Build from a loosely typed card config value (the `entities` key).
    ///
    /// Anything other than an array yields an empty set; non-string
    /// members are skipped.
    pub fn from_config_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Array(items)) => {
                let sources: Vec<SourceRef> = items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(id) if !id.is_empty() => Some(SourceRef::new(id.as_str())),
                        other => {
                            tracing::debug!("Ignoring non-string calendar entity: {}", other);
                            None
                        }
                    })
                    .collect();
                Self(sources)
            }
            Some(other) => {
                tracing::debug!("Calendar entities is not a list: {}", other);
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceRef> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a SourceSet {
    type Item = &'a SourceRef;
    type IntoIter = std::slice::Iter<'a, SourceRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Visible window requested by the rendering surface.
///
/// Markers are opaque and handed to the retrieval mechanism verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
}

/// Event data as received, before any field resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEventRecord(Map<String, Value>);

impl RawEventRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Only JSON objects are event records.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for RawEventRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Resident entity state as the host keeps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawStateRecord {
    pub entity_id: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Calendar entity as listed by `GET /api/calendars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub entity_id: String,
    #[serde(default)]
    pub name: String,
}

/// Uniform event shape consumed by the rendering surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub title: String,
    pub start: String,
    pub end: String,
    #[serde(rename = "allDay")]
    pub all_day: bool,
}
