//! Core domain types for clickstream
//!
//! These types represent the canonical record model that every analysis
//! consumes.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One user-activity entry in the log (a page view, a song play, ...) |
//! | **Page** | The action an event represents (`NextSong`, `Home`, `Submit Downgrade`) |
//! | **Anonymous** | An event logged with an empty user id (not signed in) |
//! | **Missing** | An event with no user id at all |
//! | **Field** | One named column of an [`EventRecord`] |
//! | **Value** | A dynamically typed cell read from a field or derived column |
//!
//! ### Anonymous vs Missing
//!
//! Raw logs overload the user id: an empty string means "not signed in",
//! a null means "unknown". Analyses treat the two differently (the anonymous
//! cohort is a real grouping key, missing ids are dropped), so [`UserId`]
//! keeps them apart instead of relying on string conventions.

use crate::error::{Error, Result};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================
// User identity
// ============================================

/// Who produced an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UserId {
    /// A signed-in user
    Known(String),
    /// Logged with an empty user id
    Anonymous,
    /// No user id recorded
    Missing,
}

impl UserId {
    /// Build from the raw log representation.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => UserId::Missing,
            Some("") => UserId::Anonymous,
            Some(id) => UserId::Known(id.to_string()),
        }
    }

    /// The raw string form: `""` for anonymous, `None` for missing.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            UserId::Known(id) => Some(id),
            UserId::Anonymous => Some(""),
            UserId::Missing => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, UserId::Known(_))
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, UserId::Anonymous)
    }

    /// Project into a [`Value`]. Anonymous stays a (empty) string, missing is null.
    pub fn to_value(&self) -> Value {
        match self.as_str() {
            Some(id) => Value::Str(id.to_string()),
            None => Value::Null,
        }
    }
}

impl From<&str> for UserId {
    fn from(raw: &str) -> Self {
        UserId::from_raw(Some(raw))
    }
}

impl From<Option<&str>> for UserId {
    fn from(raw: Option<&str>) -> Self {
        UserId::from_raw(raw)
    }
}

impl Serialize for UserId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(id) => serializer.serialize_str(id),
            None => serializer.serialize_none(),
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Known(id) => write!(f, "{}", id),
            UserId::Anonymous => write!(f, "<anonymous>"),
            UserId::Missing => write!(f, "<missing>"),
        }
    }
}

// ============================================
// Event record
// ============================================

/// One user-activity entry.
///
/// Records are immutable once ingested. Analyses never modify them; derived
/// columns are attached through [`crate::analytics::EventFrame`].
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Who produced the event
    pub user_id: UserId,
    /// Session the event belongs to (absent for some anonymous traffic)
    pub session_id: Option<i64>,
    /// Epoch milliseconds
    pub timestamp_ms: i64,
    /// Page / action name (e.g. "NextSong", "Home")
    pub page: String,
    /// Subscription level ("free" / "paid") at the time of the event
    pub level: Option<String>,
    /// Artist, only present on playback events
    pub artist: Option<String>,
    /// Song title, only present on playback events
    pub song: Option<String>,
    pub gender: Option<String>,
    /// Song length in seconds, only present on playback events
    pub length: Option<f64>,
}

impl EventRecord {
    /// Create a record with only the required fields set.
    pub fn new(user_id: impl Into<UserId>, timestamp_ms: i64, page: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            timestamp_ms,
            page: page.into(),
            level: None,
            artist: None,
            song: None,
            gender: None,
            length: None,
        }
    }

    pub fn with_session(mut self, session_id: i64) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_song(mut self, song: impl Into<String>) -> Self {
        self.song = Some(song.into());
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    /// Read one field as a [`Value`].
    pub fn get(&self, field: Field) -> Value {
        field.value_of(self)
    }
}

// ============================================
// Fields
// ============================================

/// The closed set of columns an [`EventRecord`] exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    UserId,
    SessionId,
    Timestamp,
    Page,
    Level,
    Artist,
    Song,
    Gender,
    Length,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::UserId,
        Field::SessionId,
        Field::Timestamp,
        Field::Page,
        Field::Level,
        Field::Artist,
        Field::Song,
        Field::Gender,
        Field::Length,
    ];

    /// Column name as it appears in the event log.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::UserId => "userId",
            Field::SessionId => "sessionId",
            Field::Timestamp => "ts",
            Field::Page => "page",
            Field::Level => "level",
            Field::Artist => "artist",
            Field::Song => "song",
            Field::Gender => "gender",
            Field::Length => "length",
        }
    }

    pub fn value_of(&self, record: &EventRecord) -> Value {
        match self {
            Field::UserId => record.user_id.to_value(),
            Field::SessionId => record.session_id.map_or(Value::Null, Value::Int),
            Field::Timestamp => Value::Int(record.timestamp_ms),
            Field::Page => Value::Str(record.page.clone()),
            Field::Level => Value::from(record.level.as_deref()),
            Field::Artist => Value::from(record.artist.as_deref()),
            Field::Song => Value::from(record.song.as_deref()),
            Field::Gender => Value::from(record.gender.as_deref()),
            Field::Length => record.length.map_or(Value::Null, Value::Float),
        }
    }
}

impl std::str::FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "userId" | "user_id" => Ok(Field::UserId),
            "sessionId" | "session_id" => Ok(Field::SessionId),
            "ts" | "timestamp_ms" | "timestampMs" => Ok(Field::Timestamp),
            "page" => Ok(Field::Page),
            "level" => Ok(Field::Level),
            "artist" => Ok(Field::Artist),
            "song" => Ok(Field::Song),
            "gender" => Ok(Field::Gender),
            "length" => Ok(Field::Length),
            _ => Err(Error::InvalidKey(format!("unknown field: {}", s))),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================
// Values
// ============================================

/// A dynamically typed cell.
///
/// `Value` has a total order so it can key partitions, groups and sets:
/// `Null` sorts first, numbers compare numerically (an `Int` sorts just
/// before an equal `Float`), strings sort last. Equality and hashing agree
/// with that order, so `Int(1)` and `Float(1.0)` are different values.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
        }
    }

    /// Numeric view; `None` for null, an error for strings.
    pub fn as_f64(&self, column: &str) -> Result<Option<f64>> {
        match self {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v as f64)),
            Value::Float(v) => Ok(Some(*v)),
            Value::Str(_) => Err(self.mismatch(column, "number")),
        }
    }

    /// Integer view; `None` for null, an error for anything non-integral.
    pub fn as_i64(&self, column: &str) -> Result<Option<i64>> {
        match self {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            _ => Err(self.mismatch(column, "integer")),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn mismatch(&self, column: &str, expected: &'static str) -> Error {
        Error::TypeMismatch {
            column: column.to_string(),
            expected,
            found: self.type_name(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Value::Float(a), Value::Int(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Int(v) => {
                1u8.hash(state);
                v.hash(state);
            }
            Value::Float(v) => {
                2u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::Str(s) => {
                3u8.hash(state);
                s.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Option<&str>> for Value {
    fn from(v: Option<&str>) -> Self {
        v.map_or(Value::Null, Value::from)
    }
}
