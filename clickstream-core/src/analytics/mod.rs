//! Windowed and grouped aggregation over event logs
//!
//! The engine is a small set of composable pieces, each usable on its own:
//!
//! - [`EventFrame`]: a row selection over ingested records plus derived columns
//! - [`PartitionIndex`]: rows split by key and ordered within each partition
//! - window evaluation ([`WindowSpec`], [`evaluate`]): per-row aggregates over
//!   a frame of neighbouring rows
//! - [`GroupBy`]: one output row per distinct key, sorted and limited
//! - set utilities ([`distinct_values`], [`set_difference`])
//!
//! The [`pipeline`] module composes them into the named analyses and the
//! [`Report`].
//!
//! ## Example
//!
//! ```rust
//! use clickstream_core::analytics::{EventFrame, FrameSpec, OrderSpec, WindowFunction, WindowSpec};
//! use clickstream_core::{EventRecord, Field};
//!
//! let records = vec![
//!     EventRecord::new("1", 100, "NextSong").with_length(200.0),
//!     EventRecord::new("1", 200, "NextSong").with_length(180.0),
//! ];
//! let frame = EventFrame::new(&records);
//! let running = WindowSpec::new()
//!     .partition_by(Field::UserId)
//!     .order_by(OrderSpec::asc(Field::Timestamp))
//!     .frame(FrameSpec::cumulative())
//!     .evaluate(&frame, &Field::Length.into(), WindowFunction::Sum)
//!     .unwrap();
//! assert_eq!(running[1].as_f64("length").unwrap(), Some(380.0));
//! ```

pub mod clock;
pub mod frame;
pub mod group;
pub mod partition;
pub mod pipeline;
pub mod sets;
pub mod window;

pub use clock::{FixedOffsetClock, HourClock};
pub use frame::{Column, EventFrame, KeySelector, Projection};
pub use group::{count_by, Aggregate, AggregateFn, AggregateResult, AggregateRow, GroupBy, GroupOrder};
pub use partition::{Direction, OrderSpec, Partition, PartitionIndex};
pub use pipeline::{
    average_events_between_markers, distinct_users_where, hourly_histogram, phase_frame,
    segment_counts, tag_phases, top_artist, top_artists, unvisited_pages, ArtistPlays,
    CohortCount, HourCount, Markers, PhaseSummary, PhaseTag, PipelineConfig, Report,
    ReportOptions, RoundingPolicy, SegmentCount,
};
pub use sets::{count_distinct, distinct_values, set_difference, ValueSet};
pub use window::{
    evaluate, evaluate_partition, FrameBound, FrameSpec, FrameUnits, WindowFunction, WindowSpec,
};
