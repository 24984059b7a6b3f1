//! Event log ingestion
//!
//! Reads the JSON-lines activity log format, one event object per line:
//!
//! ```json
//! {"userId":"30","sessionId":29,"ts":1538352117000,"page":"NextSong","level":"paid","artist":"Martha Tilston","song":"Rockpools","gender":"M","length":277.89016}
//! ```
//!
//! `ts` and `page` are required. `userId` may be a string, a number, empty
//! (anonymous) or absent/null (missing). Unknown fields are ignored and
//! blank lines are skipped.

use crate::error::{Error, Result};
use crate::types::{EventRecord, UserId};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One line of the log as written by the event collector.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEvent {
    #[serde(default)]
    user_id: Option<RawId>,
    #[serde(default)]
    session_id: Option<i64>,
    ts: i64,
    page: String,
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    song: Option<String>,
    #[serde(default)]
    gender: Option<String>,
    #[serde(default)]
    length: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawEvent> for EventRecord {
    fn from(raw: RawEvent) -> Self {
        let user_id = match raw.user_id {
            Some(RawId::Text(id)) => UserId::from_raw(Some(&id)),
            Some(RawId::Number(id)) => UserId::Known(id.to_string()),
            None => UserId::Missing,
        };
        EventRecord {
            user_id,
            session_id: raw.session_id,
            timestamp_ms: raw.ts,
            page: raw.page,
            level: raw.level,
            artist: raw.artist,
            song: raw.song,
            gender: raw.gender,
            length: raw.length,
        }
    }
}

/// Parse a JSON-lines event log. Line numbers in errors are 1-based.
pub fn parse_event_log<R: BufRead>(reader: R) -> Result<Vec<EventRecord>> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawEvent = serde_json::from_str(&line).map_err(|e| Error::Parse {
            line: idx + 1,
            message: e.to_string(),
        })?;
        records.push(raw.into());
    }

    Ok(records)
}

/// Read and parse an event log file.
pub fn load_event_log(path: &Path) -> Result<Vec<EventRecord>> {
    let file = File::open(path)?;
    let records = parse_event_log(BufReader::new(file))?;

    tracing::info!(
        path = %path.display(),
        records = records.len(),
        "Loaded event log"
    );

    Ok(records)
}
