//! Record types, filters and ordering keys.

use serde::{Deserialize, Serialize};

/// Name of a record type known to a job (e.g. `"discussion"`).
///
/// Names are normalized to trimmed lowercase so `"Comment"` and `"comment"`
/// address the same registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RecordType(String);

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.0
    }
}

impl core::fmt::Display for RecordType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which record types a job covers. Wire form is `"all"` or a type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordFilter {
    All,
    Only(RecordType),
}

impl RecordFilter {
    pub const ALL: &'static str = "all";

    pub fn parse(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        if normalized == Self::ALL {
            RecordFilter::All
        } else {
            RecordFilter::Only(RecordType::new(normalized))
        }
    }

    pub fn only(record_type: impl Into<RecordType>) -> Self {
        RecordFilter::Only(record_type.into())
    }
}

impl From<String> for RecordFilter {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<RecordFilter> for String {
    fn from(value: RecordFilter) -> Self {
        match value {
            RecordFilter::All => RecordFilter::ALL.to_string(),
            RecordFilter::Only(t) => t.into(),
        }
    }
}

impl core::fmt::Display for RecordFilter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RecordFilter::All => f.write_str(RecordFilter::ALL),
            RecordFilter::Only(t) => write!(f, "{t}"),
        }
    }
}

/// Stable position of a record within a job: record type plus primary key.
///
/// Keys only compare meaningfully within one record type; ordering across
/// types is defined by the registry's registration order (see `Cursor`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingKey {
    pub record_type: RecordType,
    pub record_id: i64,
}

impl OrderingKey {
    pub fn new(record_type: impl Into<RecordType>, record_id: i64) -> Self {
        Self {
            record_type: record_type.into(),
            record_id,
        }
    }
}

impl core::fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.record_type, self.record_id)
    }
}

/// A unit of work handed to an item action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub record_type: RecordType,
    pub record_id: i64,
}

impl WorkItem {
    pub fn new(record_type: impl Into<RecordType>, record_id: i64) -> Self {
        Self {
            record_type: record_type.into(),
            record_id,
        }
    }

    pub fn key(&self) -> OrderingKey {
        OrderingKey {
            record_type: self.record_type.clone(),
            record_id: self.record_id,
        }
    }
}

impl core::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.record_type, self.record_id)
    }
}
