//! Named analyses over an event log
//!
//! Each analysis is a pure function of the records and an explicit
//! [`PipelineConfig`]; nothing reads ambient state (host timezone, globals).
//! They are built from the engine pieces:
//!
//! | Analysis | Built from |
//! |----------|------------|
//! | [`hourly_histogram`] | filter, hour projection, GROUP BY + ORDER BY key |
//! | [`tag_phases`] | filter, flag column, descending cumulative window SUM |
//! | [`unvisited_pages`] | distinct values, set difference |
//! | [`top_artists`] | filter, GROUP BY, ORDER BY metric, LIMIT |
//! | [`average_events_between_markers`] | ascending cumulative window SUM, GROUP BY, AVG |
//! | [`distinct_users_where`] | filter, COUNT DISTINCT |
//!
//! [`Report::generate`] runs all of them.

use super::clock::{FixedOffsetClock, HourClock};
use super::frame::{Column, EventFrame, KeySelector};
use super::group::{Aggregate, GroupBy};
use super::partition::{Direction, OrderSpec};
use super::sets::{count_distinct, distinct_values, set_difference};
use super::window::{FrameSpec, WindowFunction, WindowSpec};
use crate::error::{Error, Result};
use crate::types::{EventRecord, Field, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Derived column: 1 on downgrade events, 0 otherwise
pub const DOWNGRADED_COLUMN: &str = "downgraded";
/// Derived column: number of downgrades at or after the row
pub const PHASE_COLUMN: &str = "phase";
/// Derived column: 1 on home visits, 0 otherwise
pub const HOME_FLAG_COLUMN: &str = "home_flag";
/// Derived column: number of home visits at or before the row
pub const SEGMENT_COLUMN: &str = "segment";

// ============================================
// Configuration
// ============================================

/// Page names that drive the analyses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Markers {
    /// A song being played
    #[serde(default = "default_song_play")]
    pub song_play: String,
    /// A visit to the home page
    #[serde(default = "default_home")]
    pub home: String,
    /// A subscription downgrade
    #[serde(default = "default_downgrade")]
    pub downgrade: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            song_play: default_song_play(),
            home: default_home(),
            downgrade: default_downgrade(),
        }
    }
}

fn default_song_play() -> String {
    "NextSong".to_string()
}

fn default_home() -> String {
    "Home".to_string()
}

fn default_downgrade() -> String {
    "Submit Downgrade".to_string()
}

/// How a fractional average becomes an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Ties go to the even neighbour (2.5 -> 2, 3.5 -> 4)
    #[default]
    HalfEven,
    /// Ties go up (2.5 -> 3)
    HalfUp,
}

impl RoundingPolicy {
    pub fn round(&self, x: f64) -> i64 {
        let floor = x.floor();
        let diff = x - floor;
        let rounded = match self {
            RoundingPolicy::HalfUp if diff >= 0.5 => floor + 1.0,
            RoundingPolicy::HalfUp => floor,
            RoundingPolicy::HalfEven if diff > 0.5 => floor + 1.0,
            RoundingPolicy::HalfEven if diff < 0.5 => floor,
            RoundingPolicy::HalfEven if floor % 2.0 == 0.0 => floor,
            RoundingPolicy::HalfEven => floor + 1.0,
        };
        rounded as i64
    }
}

impl std::str::FromStr for RoundingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "half_even" | "half-even" => Ok(RoundingPolicy::HalfEven),
            "half_up" | "half-up" => Ok(RoundingPolicy::HalfUp),
            _ => Err(Error::Config(format!("unknown rounding policy: {}", s))),
        }
    }
}

/// Everything the analyses depend on besides the records.
#[derive(Clone)]
pub struct PipelineConfig {
    pub markers: Markers,
    pub clock: Arc<dyn HourClock>,
    pub rounding: RoundingPolicy,
}

impl PipelineConfig {
    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_clock(mut self, clock: impl HourClock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.rounding = rounding;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            clock: Arc::new(FixedOffsetClock::utc()),
            rounding: RoundingPolicy::default(),
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("markers", &self.markers)
            .field("rounding", &self.rounding)
            .finish_non_exhaustive()
    }
}

// ============================================
// Hourly histogram
// ============================================

/// Song plays within one hour of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCount {
    pub hour: u8,
    pub count: i64,
}

/// Song plays per hour of day, ascending by hour. Hours without plays are
/// omitted.
pub fn hourly_histogram(records: &[EventRecord], config: &PipelineConfig) -> Result<Vec<HourCount>> {
    let songs = EventFrame::new(records).filter(|r| r.page == config.markers.song_play);

    let clock = Arc::clone(&config.clock);
    let hour = KeySelector::projection("hour", move |r: &EventRecord| {
        Value::Int(i64::from(clock.hour_of(r.timestamp_ms)))
    });

    let result = GroupBy::by(hour)
        .aggregate(Aggregate::count_all("count"))
        .order_by_key(0, Direction::Ascending)
        .execute(&songs)?;

    result
        .rows
        .iter()
        .map(|row| {
            let hour = expect_int(&row.key[0], "hour")?;
            if !(0..24).contains(&hour) {
                return Err(Error::TypeMismatch {
                    column: "hour".to_string(),
                    expected: "hour of day in 0..=23",
                    found: "out-of-range integer",
                });
            }
            Ok(HourCount {
                hour: hour as u8,
                count: expect_int(&row.values[0], "count")?,
            })
        })
        .collect()
}

// ============================================
// Phase tagging
// ============================================

/// A record's lifecycle phase relative to downgrade events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTag {
    /// Index of the record in the input slice
    pub record_index: usize,
    pub user_id: String,
    pub timestamp_ms: i64,
    /// Whether this record is itself a downgrade
    pub downgraded: bool,
    /// Downgrades by this user at or after this record (0 = after the last one)
    pub phase: i64,
}

/// Frame of taggable records with [`DOWNGRADED_COLUMN`] and [`PHASE_COLUMN`]
/// attached.
///
/// Records without a known user or without a session are dropped. The phase
/// is a cumulative sum of the downgrade flag over each user's events in
/// descending time order, so it counts downgrades still ahead of the row;
/// events sharing a timestamp are peers and get the same phase.
pub fn phase_frame<'a>(records: &'a [EventRecord], config: &PipelineConfig) -> Result<EventFrame<'a>> {
    let valid = EventFrame::new(records).filter(|r| r.user_id.is_known() && r.session_id.is_some());

    let flags = valid
        .records()
        .map(|r| Value::Int(i64::from(r.page == config.markers.downgrade)))
        .collect();
    let valid = valid.with_column(DOWNGRADED_COLUMN, flags)?;

    let phases = WindowSpec::new()
        .partition_by(Field::UserId)
        .order_by(OrderSpec::desc(Field::Timestamp))
        .frame(FrameSpec::cumulative())
        .evaluate(
            &valid,
            &KeySelector::derived(DOWNGRADED_COLUMN),
            WindowFunction::Sum,
        )?;

    valid.with_column(PHASE_COLUMN, phases)
}

/// Phase of every taggable record, in input order.
pub fn tag_phases(records: &[EventRecord], config: &PipelineConfig) -> Result<Vec<PhaseTag>> {
    let frame = phase_frame(records, config)?;
    let downgraded = Column::derived(DOWNGRADED_COLUMN);
    let phase = Column::derived(PHASE_COLUMN);

    (0..frame.len())
        .map(|row| {
            let record = frame.record(row);
            Ok(PhaseTag {
                record_index: frame.record_index(row),
                user_id: record.user_id.as_str().unwrap_or_default().to_string(),
                timestamp_ms: record.timestamp_ms,
                downgraded: expect_int(&frame.value(row, &downgraded)?, DOWNGRADED_COLUMN)? == 1,
                phase: expect_int(&frame.value(row, &phase)?, PHASE_COLUMN)?,
            })
        })
        .collect()
}

/// Aggregate view of [`tag_phases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PhaseSummary {
    pub users: usize,
    pub users_with_downgrade: usize,
    /// Records with phase 0
    pub records_after_last_downgrade: usize,
    /// Records with phase >= 1
    pub records_before_a_downgrade: usize,
}

impl PhaseSummary {
    pub fn from_tags(tags: &[PhaseTag]) -> Self {
        let users: BTreeSet<&str> = tags.iter().map(|t| t.user_id.as_str()).collect();
        let downgraders: BTreeSet<&str> = tags
            .iter()
            .filter(|t| t.downgraded)
            .map(|t| t.user_id.as_str())
            .collect();
        let before = tags.iter().filter(|t| t.phase > 0).count();
        Self {
            users: users.len(),
            users_with_downgrade: downgraders.len(),
            records_after_last_downgrade: tags.len() - before,
            records_before_a_downgrade: before,
        }
    }
}

// ============================================
// Unvisited pages
// ============================================

/// Pages that appear in the log but never for anonymous users.
pub fn unvisited_pages(records: &[EventRecord]) -> Result<BTreeSet<String>> {
    let frame = EventFrame::new(records);
    let page = KeySelector::field(Field::Page);

    let all = distinct_values(&frame, &page)?;
    let anonymous = distinct_values(&frame.filter(|r| r.user_id.is_anonymous()), &page)?;

    Ok(set_difference(&all, &anonymous)
        .into_iter()
        .filter_map(|v| match v {
            Value::Str(s) => Some(s),
            _ => None,
        })
        .collect())
}

// ============================================
// Top artists
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtistPlays {
    pub artist: String,
    pub plays: i64,
}

/// The `k` most played artists, most plays first. Ties keep the artist
/// that appeared first in the log ahead.
pub fn top_artists(records: &[EventRecord], k: usize) -> Result<Vec<ArtistPlays>> {
    let with_artist = EventFrame::new(records).filter(|r| r.artist.is_some());

    let result = GroupBy::by(Field::Artist)
        .aggregate(Aggregate::count_all("plays"))
        .order_by_metric("plays", Direction::Descending)
        .limit(k)
        .execute(&with_artist)?;

    result
        .rows
        .iter()
        .map(|row| {
            Ok(ArtistPlays {
                artist: row.key[0].to_string(),
                plays: expect_int(&row.values[0], "plays")?,
            })
        })
        .collect()
}

/// The most played artist, or `None` when no record names an artist.
pub fn top_artist(records: &[EventRecord]) -> Result<Option<ArtistPlays>> {
    Ok(top_artists(records, 1)?.into_iter().next())
}

// ============================================
// Events between markers
// ============================================

/// Song plays by one user between two home visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentCount {
    pub user_id: Value,
    /// Home visits at or before the segment (0 = before the first visit)
    pub segment: i64,
    pub events: i64,
}

/// Song plays per `(user, segment)`.
///
/// A segment id is the running count of home visits in ascending time order,
/// so plays before a user's first home visit are segment 0 and plays after
/// the last visit belong to the last segment. Segments without plays do not
/// appear. A play sharing its timestamp with a home visit is that visit's
/// peer and counts in the segment the visit opens, whatever the input order.
pub fn segment_counts(records: &[EventRecord], config: &PipelineConfig) -> Result<Vec<SegmentCount>> {
    let markers = &config.markers;
    let frame = EventFrame::new(records)
        .filter(|r| r.page == markers.home || r.page == markers.song_play);

    let flags = frame
        .records()
        .map(|r| Value::Int(i64::from(r.page == markers.home)))
        .collect();
    let frame = frame.with_column(HOME_FLAG_COLUMN, flags)?;

    let segments = WindowSpec::new()
        .partition_by(Field::UserId)
        .order_by(OrderSpec::asc(Field::Timestamp))
        .frame(FrameSpec::cumulative())
        .evaluate(
            &frame,
            &KeySelector::derived(HOME_FLAG_COLUMN),
            WindowFunction::Sum,
        )?;
    let frame = frame.with_column(SEGMENT_COLUMN, segments)?;

    let songs = frame.filter(|r| r.page == markers.song_play);
    let result = GroupBy::new(vec![
        KeySelector::field(Field::UserId),
        KeySelector::derived(SEGMENT_COLUMN),
    ])
    .aggregate(Aggregate::count(Field::Page, "events"))
    .execute(&songs)?;

    result
        .rows
        .into_iter()
        .map(|row| {
            let mut key = row.key.into_iter();
            let user_id = key.next().unwrap_or(Value::Null);
            let segment = key.next().unwrap_or(Value::Null);
            Ok(SegmentCount {
                user_id,
                segment: expect_int(&segment, SEGMENT_COLUMN)?,
                events: expect_int(&row.values[0], "events")?,
            })
        })
        .collect()
}

/// Average song plays between home visits, rounded with the configured
/// policy. Fails with [`Error::EmptyInput`] when there are no segments.
pub fn average_events_between_markers(records: &[EventRecord], config: &PipelineConfig) -> Result<i64> {
    let segments = segment_counts(records, config)?;
    if segments.is_empty() {
        return Err(Error::EmptyInput(format!(
            "no {} events to average between {} visits",
            config.markers.song_play, config.markers.home
        )));
    }

    let total: i64 = segments.iter().map(|s| s.events).sum();
    let mean = total as f64 / segments.len() as f64;
    tracing::debug!(segments = segments.len(), mean, "Averaged events between markers");

    Ok(config.rounding.round(mean))
}

// ============================================
// Cohorts
// ============================================

/// Number of distinct user ids among records whose `field` equals `value`.
pub fn distinct_users_where(records: &[EventRecord], field: Field, value: &str) -> Result<usize> {
    let cohort = EventFrame::new(records).filter_by(&Column::Field(field), |v| v.as_str() == Some(value))?;
    count_distinct(&cohort, &KeySelector::field(Field::UserId))
}

// ============================================
// Report
// ============================================

/// Knobs for [`Report::generate`] that are not engine configuration.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// How many artists to rank
    pub top_artists: usize,
    /// Gender value whose distinct users are counted (None to skip)
    pub gender: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            top_artists: 1,
            gender: Some("F".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortCount {
    pub field: String,
    pub value: String,
    pub users: usize,
}

/// Every analysis over one log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub records: usize,
    pub hourly_histogram: Vec<HourCount>,
    pub phases: PhaseSummary,
    pub unvisited_pages: Vec<String>,
    pub top_artists: Vec<ArtistPlays>,
    /// `None` when the log has no play after a home visit.
    pub average_events_between_markers: Option<i64>,
    pub cohort: Option<CohortCount>,
}

impl Report {
    /// Run every analysis. The first failing analysis fails the report,
    /// except that a log without segments leaves the average unset.
    pub fn generate(
        records: &[EventRecord],
        config: &PipelineConfig,
        options: &ReportOptions,
    ) -> Result<Self> {
        let hourly_histogram = hourly_histogram(records, config)?;
        let phases = PhaseSummary::from_tags(&tag_phases(records, config)?);
        let unvisited_pages = unvisited_pages(records)?.into_iter().collect();
        let top_artists = top_artists(records, options.top_artists)?;
        let average = match average_events_between_markers(records, config) {
            Ok(average) => Some(average),
            Err(Error::EmptyInput(reason)) => {
                tracing::debug!(%reason, "No segments, average left unset");
                None
            }
            Err(e) => return Err(e),
        };
        let cohort = options
            .gender
            .as_ref()
            .map(|gender| {
                distinct_users_where(records, Field::Gender, gender).map(|users| CohortCount {
                    field: Field::Gender.as_str().to_string(),
                    value: gender.clone(),
                    users,
                })
            })
            .transpose()?;

        tracing::info!(
            records = records.len(),
            hours = hourly_histogram.len(),
            users = phases.users,
            average_between_markers = ?average,
            "Report generated"
        );

        Ok(Self {
            records: records.len(),
            hourly_histogram,
            phases,
            unvisited_pages,
            top_artists,
            average_events_between_markers: average,
            cohort,
        })
    }
}

fn expect_int(value: &Value, column: &str) -> Result<i64> {
    match value {
        Value::Int(v) => Ok(*v),
        other => Err(other.mismatch(column, "integer")),
    }
}
