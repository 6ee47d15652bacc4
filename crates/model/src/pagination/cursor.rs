use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KeyError {
    #[error("Cannot read '{value}' as a {kind} ordering key")]
    Parse { kind: KeyKind, value: String },

    #[error("Ordering key field '{0}' is missing from the document")]
    Missing(String),

    #[error("Invalid month {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },
}

/// The type of the field a job orders and resumes on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Numeric document id, resumed at `last + 1`.
    #[default]
    Integer,

    /// Creation timestamp, resumed at `last` (inclusive).
    Timestamp,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Integer => f.write_str("integer"),
            KeyKind::Timestamp => f.write_str("timestamp"),
        }
    }
}

impl KeyKind {
    /// Parse a key from its textual form (CLI argument or checkpoint value).
    pub fn parse(&self, raw: &str) -> Result<OrderingKey, KeyError> {
        let raw = raw.trim();
        let parsed = match self {
            KeyKind::Integer => raw.parse::<i64>().ok().map(OrderingKey::Integer),
            KeyKind::Timestamp => parse_timestamp(raw).map(OrderingKey::Timestamp),
        };

        parsed.ok_or_else(|| KeyError::Parse {
            kind: *self,
            value: raw.to_string(),
        })
    }

    /// Read a key out of a JSON field value.
    pub fn from_json(&self, value: &Value) -> Result<OrderingKey, KeyError> {
        match (self, value) {
            (KeyKind::Integer, Value::Number(n)) => {
                n.as_i64().map(OrderingKey::Integer).ok_or_else(|| KeyError::Parse {
                    kind: *self,
                    value: n.to_string(),
                })
            }
            (KeyKind::Timestamp, Value::Number(n)) => n
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(OrderingKey::Timestamp)
                .ok_or_else(|| KeyError::Parse {
                    kind: *self,
                    value: n.to_string(),
                }),
            (_, Value::String(s)) => self.parse(s),
            (_, other) => Err(KeyError::Parse {
                kind: *self,
                value: other.to_string(),
            }),
        }
    }
}

/// Accepts RFC 3339, the `YYYY-MM-DD HH:MM:SS.fff+hhmm` form the log
/// indices were written with, and naive UTC datetimes.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%.f%z"] {
        if let Ok(ts) = DateTime::parse_from_str(raw, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Position of a document in the source's declared sort order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OrderingKey {
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl OrderingKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            OrderingKey::Integer(_) => KeyKind::Integer,
            OrderingKey::Timestamp(_) => KeyKind::Timestamp,
        }
    }

    /// First key a resumed job must request after `self` was committed.
    ///
    /// Integer ids are unique, so the next id is safe. Timestamps are not,
    /// so the boundary is re-requested and documents sharing it are
    /// delivered again rather than skipped.
    pub fn successor(&self) -> OrderingKey {
        match self {
            OrderingKey::Integer(id) => OrderingKey::Integer(id.saturating_add(1)),
            OrderingKey::Timestamp(ts) => OrderingKey::Timestamp(*ts),
        }
    }

    /// Render the key as a query bound.
    pub fn to_json(&self) -> Value {
        match self {
            OrderingKey::Integer(id) => Value::from(*id),
            OrderingKey::Timestamp(_) => Value::String(self.to_string()),
        }
    }
}

impl fmt::Display for OrderingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderingKey::Integer(id) => write!(f, "{id}"),
            OrderingKey::Timestamp(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

/// Inclusive range of ordering keys a job instance owns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KeyRange {
    pub start: OrderingKey,
    pub end: OrderingKey,
}

impl KeyRange {
    pub fn new(start: OrderingKey, end: OrderingKey) -> Self {
        Self { start, end }
    }

    /// Every millisecond of a calendar month, UTC.
    pub fn for_month(year: i32, month: u32) -> Result<Self, KeyError> {
        let invalid = || KeyError::InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = first.checked_add_months(Months::new(1)).ok_or_else(invalid)?;

        let start = first.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc();
        let end = next.and_hms_opt(0, 0, 0).ok_or_else(invalid)?.and_utc()
            - TimeDelta::milliseconds(1);

        Ok(Self::new(
            OrderingKey::Timestamp(start),
            OrderingKey::Timestamp(end),
        ))
    }

    /// Parse a `YYYY-MM` month label.
    pub fn parse_month(label: &str) -> Result<Self, KeyError> {
        let (year, month) = parse_month_label(label)?;
        Self::for_month(year, month)
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, key: &OrderingKey) -> bool {
        &self.start <= key && key <= &self.end
    }

    /// Narrow the range so it starts no earlier than `from`.
    pub fn starting_at(&self, from: OrderingKey) -> Self {
        Self::new(self.start.max(from), self.end)
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Year and month of a `YYYY-MM` label.
pub fn parse_month_label(label: &str) -> Result<(i32, u32), KeyError> {
    let bad = || KeyError::Parse {
        kind: KeyKind::Timestamp,
        value: label.to_string(),
    };
    let (year, month) = label.trim().split_once('-').ok_or_else(bad)?;
    let year = year.parse::<i32>().map_err(|_| bad())?;
    let month = month.parse::<u32>().map_err(|_| bad())?;
    Ok((year, month))
}

/// Extraction position: the server-issued scroll handle plus the last key
/// seen through it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursor {
    pub handle: Option<String>,
    pub last_key: Option<OrderingKey>,
}

impl Cursor {
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }
}
