//! Window frame evaluator
//!
//! Computes one value per row from the rows around it, without collapsing
//! rows the way a GROUP BY does. Each partition of a [`PartitionIndex`] is
//! evaluated independently (in parallel with the `parallel` feature), and
//! the per-partition results are scattered back to frame row order.
//!
//! Supported functions:
//! - Aggregates over the frame: SUM, COUNT, MIN, MAX, AVG, FIRST
//! - Ranking: RANK, ROW_NUMBER (these ignore the frame)
//!
//! ## Frames
//!
//! A [`FrameSpec`] has a unit and two bounds:
//!
//! | Units | `Offset(k)` counts | `CurrentRow` covers |
//! |-------|--------------------|---------------------|
//! | `Rows` | rows | the row itself |
//! | `Groups` | peer groups | the row's whole peer group |
//!
//! Peers are rows with equal order keys. `FrameSpec::cumulative()` (groups,
//! unbounded preceding to current row) therefore gives rows that share a
//! timestamp the same running total, whatever their tie-break order.

use super::frame::{EventFrame, KeySelector, ResolvedKey};
use super::partition::{OrderSpec, Partition, PartitionIndex};
use crate::error::Result;
use crate::types::Value;
use std::cmp::Ordering;
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Below this many rows, partitions are evaluated sequentially.
#[cfg(feature = "parallel")]
const PARALLEL_MIN_ROWS: usize = 10_000;

// ============================================
// Frame specification
// ============================================

/// One end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    /// Partition start as a lower bound, partition end as an upper bound
    Unbounded,
    CurrentRow,
    /// Signed distance from the current row (negative = preceding)
    Offset(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUnits {
    Rows,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpec {
    pub units: FrameUnits,
    pub lower: FrameBound,
    pub upper: FrameBound,
}

impl FrameSpec {
    pub fn rows(lower: FrameBound, upper: FrameBound) -> Self {
        Self {
            units: FrameUnits::Rows,
            lower,
            upper,
        }
    }

    pub fn groups(lower: FrameBound, upper: FrameBound) -> Self {
        Self {
            units: FrameUnits::Groups,
            lower,
            upper,
        }
    }

    /// Partition start through the current row's peer group.
    pub fn cumulative() -> Self {
        Self::groups(FrameBound::Unbounded, FrameBound::CurrentRow)
    }

    /// Partition start through the current row, ignoring peers.
    pub fn running_rows() -> Self {
        Self::rows(FrameBound::Unbounded, FrameBound::CurrentRow)
    }

    pub fn whole_partition() -> Self {
        Self::rows(FrameBound::Unbounded, FrameBound::Unbounded)
    }
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::cumulative()
    }
}

/// Functions the evaluator can compute per row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunction {
    /// Nulls count as zero
    Sum,
    /// Non-null values
    Count,
    Min,
    Max,
    Avg,
    /// Value of the first row in the frame
    First,
    Rank,
    RowNumber,
}

impl WindowFunction {
    pub fn name(&self) -> &'static str {
        match self {
            WindowFunction::Sum => "sum",
            WindowFunction::Count => "count",
            WindowFunction::Min => "min",
            WindowFunction::Max => "max",
            WindowFunction::Avg => "avg",
            WindowFunction::First => "first",
            WindowFunction::Rank => "rank",
            WindowFunction::RowNumber => "row_number",
        }
    }
}

// ============================================
// Window specification
// ============================================

/// PARTITION BY / ORDER BY / frame, bundled for one-shot evaluation.
#[derive(Debug, Clone, Default)]
pub struct WindowSpec {
    pub partition_by: Vec<KeySelector>,
    pub order_by: Vec<OrderSpec>,
    pub frame: FrameSpec,
}

impl WindowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by(mut self, key: impl Into<KeySelector>) -> Self {
        self.partition_by.push(key.into());
        self
    }

    pub fn order_by(mut self, order: OrderSpec) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn frame(mut self, frame: FrameSpec) -> Self {
        self.frame = frame;
        self
    }

    /// Build the partition index for `frame`.
    pub fn index(&self, frame: &EventFrame<'_>) -> Result<PartitionIndex> {
        PartitionIndex::build(frame, &self.partition_by, &self.order_by)
    }

    /// Partition, order and evaluate in one call. Output is in frame row order.
    pub fn evaluate(
        &self,
        frame: &EventFrame<'_>,
        input: &KeySelector,
        function: WindowFunction,
    ) -> Result<Vec<Value>> {
        let index = self.index(frame)?;
        evaluate(frame, &index, input, function, &self.frame)
    }
}

// ============================================
// Evaluation
// ============================================

/// Evaluate `function` over every partition of `index`.
///
/// Returns one value per frame row, in frame row order.
pub fn evaluate(
    frame: &EventFrame<'_>,
    index: &PartitionIndex,
    input: &KeySelector,
    function: WindowFunction,
    spec: &FrameSpec,
) -> Result<Vec<Value>> {
    let key = frame.resolve(input)?;
    let column = input.name();

    let per_partition = evaluate_partitions(frame, index, &key, column, function, spec)?;

    let mut out = vec![Value::Null; frame.len()];
    for (partition, values) in index.iter().zip(per_partition) {
        for (&row, value) in partition.rows.iter().zip(values) {
            out[row] = value;
        }
    }

    tracing::debug!(
        function = function.name(),
        input = column,
        rows = frame.len(),
        partitions = index.len(),
        "Evaluated window function"
    );

    Ok(out)
}

/// Evaluate `function` over one partition. Output is aligned with `partition.rows`.
pub fn evaluate_partition(
    frame: &EventFrame<'_>,
    partition: &Partition,
    input: &KeySelector,
    function: WindowFunction,
    spec: &FrameSpec,
) -> Result<Vec<Value>> {
    let key = frame.resolve(input)?;
    evaluate_resolved(frame, partition, &key, input.name(), function, spec)
}

#[cfg(feature = "parallel")]
fn evaluate_partitions(
    frame: &EventFrame<'_>,
    index: &PartitionIndex,
    key: &ResolvedKey,
    column: &str,
    function: WindowFunction,
    spec: &FrameSpec,
) -> Result<Vec<Vec<Value>>> {
    if index.len() > 1 && frame.len() >= PARALLEL_MIN_ROWS {
        index
            .partitions()
            .par_iter()
            .map(|p| evaluate_resolved(frame, p, key, column, function, spec))
            .collect()
    } else {
        index
            .iter()
            .map(|p| evaluate_resolved(frame, p, key, column, function, spec))
            .collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn evaluate_partitions(
    frame: &EventFrame<'_>,
    index: &PartitionIndex,
    key: &ResolvedKey,
    column: &str,
    function: WindowFunction,
    spec: &FrameSpec,
) -> Result<Vec<Vec<Value>>> {
    index
        .iter()
        .map(|p| evaluate_resolved(frame, p, key, column, function, spec))
        .collect()
}

fn evaluate_resolved(
    frame: &EventFrame<'_>,
    partition: &Partition,
    key: &ResolvedKey,
    column: &str,
    function: WindowFunction,
    spec: &FrameSpec,
) -> Result<Vec<Value>> {
    let n = partition.len();

    match function {
        WindowFunction::RowNumber => return Ok((1..=n as i64).map(Value::Int).collect()),
        WindowFunction::Rank => return Ok(rank(partition)),
        _ => {}
    }

    let values: Vec<Value> = partition
        .rows
        .iter()
        .map(|&row| frame.read(row, key))
        .collect();
    let resolver = FrameResolver::new(partition, spec);
    let ranges: Vec<Range<usize>> = (0..n).map(|pos| resolver.range(pos)).collect();

    match function {
        WindowFunction::Sum | WindowFunction::Count | WindowFunction::Avg => {
            let sums = PrefixSums::new(&values, column)?;
            Ok(ranges
                .into_iter()
                .map(|range| sums.aggregate(&values, function, range))
                .collect())
        }
        WindowFunction::Min => Ok(extremum(&values, &ranges, spec, Ordering::Less)),
        WindowFunction::Max => Ok(extremum(&values, &ranges, spec, Ordering::Greater)),
        WindowFunction::First => Ok(ranges
            .into_iter()
            .map(|range| {
                if range.is_empty() {
                    Value::Null
                } else {
                    values[range.start].clone()
                }
            })
            .collect()),
        WindowFunction::Rank | WindowFunction::RowNumber => unreachable!("handled above"),
    }
}

/// 1 + the number of rows in earlier peer groups.
fn rank(partition: &Partition) -> Vec<Value> {
    let mut out = Vec::with_capacity(partition.len());
    for group in partition.peer_groups() {
        let rank = group.start as i64 + 1;
        out.extend(group.map(|_| Value::Int(rank)));
    }
    out
}

// ============================================
// Frame resolution
// ============================================

struct FrameResolver {
    spec: FrameSpec,
    len: usize,
    groups: Vec<Range<usize>>,
    group_of: Vec<usize>,
}

impl FrameResolver {
    fn new(partition: &Partition, spec: &FrameSpec) -> Self {
        let (groups, group_of) = match spec.units {
            FrameUnits::Rows => (Vec::new(), Vec::new()),
            FrameUnits::Groups => {
                let groups = partition.peer_groups();
                let mut group_of = vec![0; partition.len()];
                for (g, range) in groups.iter().enumerate() {
                    for pos in range.clone() {
                        group_of[pos] = g;
                    }
                }
                (groups, group_of)
            }
        };
        Self {
            spec: *spec,
            len: partition.len(),
            groups,
            group_of,
        }
    }

    /// Half-open position range of the frame for `pos`; empty when the
    /// bounds cross or fall outside the partition.
    fn range(&self, pos: usize) -> Range<usize> {
        let start = match self.spec.lower {
            FrameBound::Unbounded => 0,
            FrameBound::CurrentRow => match self.spec.units {
                FrameUnits::Rows => pos,
                FrameUnits::Groups => self.groups[self.group_of[pos]].start,
            },
            FrameBound::Offset(k) => match self.spec.units {
                FrameUnits::Rows => self.clamp((pos as i64).saturating_add(k)),
                FrameUnits::Groups => match self.shifted_group(pos, k) {
                    Shifted::Before => 0,
                    Shifted::After => self.len,
                    Shifted::At(g) => self.groups[g].start,
                },
            },
        };
        let end = match self.spec.upper {
            FrameBound::Unbounded => self.len,
            FrameBound::CurrentRow => match self.spec.units {
                FrameUnits::Rows => pos + 1,
                FrameUnits::Groups => self.groups[self.group_of[pos]].end,
            },
            FrameBound::Offset(k) => match self.spec.units {
                FrameUnits::Rows => self.clamp((pos as i64).saturating_add(k).saturating_add(1)),
                FrameUnits::Groups => match self.shifted_group(pos, k) {
                    Shifted::Before => 0,
                    Shifted::After => self.len,
                    Shifted::At(g) => self.groups[g].end,
                },
            },
        };
        start..end.max(start)
    }

    fn clamp(&self, pos: i64) -> usize {
        pos.clamp(0, self.len as i64) as usize
    }

    fn shifted_group(&self, pos: usize, k: i64) -> Shifted {
        let g = (self.group_of[pos] as i64).saturating_add(k);
        if g < 0 {
            Shifted::Before
        } else if g >= self.groups.len() as i64 {
            Shifted::After
        } else {
            Shifted::At(g as usize)
        }
    }
}

enum Shifted {
    Before,
    At(usize),
    After,
}

// ============================================
// Aggregation kernels
// ============================================

/// Prefix sums over the numeric view of a partition's values.
///
/// Integers are summed exactly; a frame containing any float yields a float.
/// Float prefixes are only used for frames starting at the partition head:
/// differencing two float prefixes absorbs small values next to large ones
/// and carries a NaN into every later frame.
struct PrefixSums {
    ints: Vec<i128>,
    floats: Vec<f64>,
    float_count: Vec<usize>,
    non_null: Vec<usize>,
}

impl PrefixSums {
    fn new(values: &[Value], column: &str) -> Result<Self> {
        let n = values.len();
        let mut sums = Self {
            ints: Vec::with_capacity(n + 1),
            floats: Vec::with_capacity(n + 1),
            float_count: Vec::with_capacity(n + 1),
            non_null: Vec::with_capacity(n + 1),
        };
        let (mut int, mut float, mut floats, mut non_null) = (0i128, 0f64, 0usize, 0usize);
        sums.push(int, float, floats, non_null);

        for value in values {
            match value {
                Value::Null => {}
                Value::Int(v) => {
                    int += i128::from(*v);
                    non_null += 1;
                }
                Value::Float(v) => {
                    float += v;
                    floats += 1;
                    non_null += 1;
                }
                Value::Str(_) => return Err(value.mismatch(column, "number")),
            }
            sums.push(int, float, floats, non_null);
        }
        Ok(sums)
    }

    fn push(&mut self, int: i128, float: f64, floats: usize, non_null: usize) {
        self.ints.push(int);
        self.floats.push(float);
        self.float_count.push(floats);
        self.non_null.push(non_null);
    }

    fn aggregate(&self, values: &[Value], function: WindowFunction, range: Range<usize>) -> Value {
        let (s, e) = (range.start, range.end);
        let count = self.non_null[e] - self.non_null[s];
        let int = self.ints[e] - self.ints[s];
        let has_float = self.float_count[e] > self.float_count[s];
        let float = if !has_float {
            0.0
        } else if s == 0 {
            self.floats[e]
        } else {
            values[range]
                .iter()
                .filter_map(|v| match v {
                    Value::Float(f) => Some(*f),
                    _ => None,
                })
                .sum::<f64>()
        };
        let total = int as f64 + float;

        match function {
            WindowFunction::Count => Value::Int(count as i64),
            WindowFunction::Sum if has_float => Value::Float(total),
            WindowFunction::Sum => i64::try_from(int)
                .map(Value::Int)
                .unwrap_or(Value::Float(total)),
            WindowFunction::Avg if count == 0 => Value::Null,
            WindowFunction::Avg => Value::Float(total / count as f64),
            _ => Value::Null,
        }
    }
}

/// MIN/MAX over each frame, skipping nulls. `keep` is the ordering a new
/// value must have against the current best to replace it.
fn extremum(values: &[Value], ranges: &[Range<usize>], spec: &FrameSpec, keep: Ordering) -> Vec<Value> {
    let better = |best: Option<&Value>, candidate: &Value| {
        !candidate.is_null() && best.map_or(true, |b| candidate.cmp(b) == keep)
    };

    // With an unbounded lower bound every frame starts at 0 and ends move
    // forward, so a running fold is enough.
    if spec.lower == FrameBound::Unbounded {
        let mut best: Option<&Value> = None;
        let mut cursor = 0;
        return ranges
            .iter()
            .map(|range| {
                while cursor < range.end {
                    if better(best, &values[cursor]) {
                        best = Some(&values[cursor]);
                    }
                    cursor += 1;
                }
                if range.is_empty() {
                    Value::Null
                } else {
                    best.cloned().unwrap_or(Value::Null)
                }
            })
            .collect();
    }

    ranges
        .iter()
        .map(|range| {
            let mut best: Option<&Value> = None;
            for value in &values[range.clone()] {
                if better(best, value) {
                    best = Some(value);
                }
            }
            best.cloned().unwrap_or(Value::Null)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::frame::Column;
    use crate::error::Error;
    use crate::types::{EventRecord, Field};

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    /// One user, timestamps 1..=5 with a numeric "x" column.
    fn single_partition(xs: Vec<Value>) -> (Vec<EventRecord>, Vec<Value>) {
        let records = (1..=xs.len() as i64)
            .map(|ts| EventRecord::new("u", ts, "NextSong"))
            .collect();
        (records, xs)
    }

    fn eval(
        records: &[EventRecord],
        xs: Vec<Value>,
        function: WindowFunction,
        frame: FrameSpec,
    ) -> Result<Vec<Value>> {
        let events = EventFrame::new(records).with_column("x", xs)?;
        WindowSpec::new()
            .partition_by(Field::UserId)
            .order_by(OrderSpec::asc(Field::Timestamp))
            .frame(frame)
            .evaluate(&events, &KeySelector::derived("x"), function)
    }

    #[test]
    fn test_cumulative_sum() {
        let (records, xs) = single_partition(ints(&[1, 0, 2, 0, 3]));
        let out = eval(&records, xs, WindowFunction::Sum, FrameSpec::cumulative()).unwrap();
        assert_eq!(out, ints(&[1, 1, 3, 3, 6]));
    }

    #[test]
    fn test_sum_treats_nulls_as_zero() {
        let (records, xs) =
            single_partition(vec![Value::Int(2), Value::Null, Value::Int(5), Value::Null]);
        let out = eval(&records, xs, WindowFunction::Sum, FrameSpec::running_rows()).unwrap();
        assert_eq!(out, ints(&[2, 2, 7, 7]));
    }

    #[test]
    fn test_sum_mixed_numbers_is_float() {
        let (records, xs) = single_partition(vec![Value::Int(1), Value::Float(0.5)]);
        let out = eval(&records, xs, WindowFunction::Sum, FrameSpec::running_rows()).unwrap();
        assert_eq!(out, vec![Value::Int(1), Value::Float(1.5)]);
    }

    #[test]
    fn test_descending_cumulative_counts_future_events() {
        let records = vec![
            EventRecord::new("u", 100, "Home"),
            EventRecord::new("u", 200, "Submit Downgrade"),
            EventRecord::new("u", 300, "Home"),
            EventRecord::new("v", 150, "Home"),
        ];
        let flags = records
            .iter()
            .map(|r| Value::Int(i64::from(r.page == "Submit Downgrade")))
            .collect();
        let events = EventFrame::new(&records).with_column("flag", flags).unwrap();

        let out = WindowSpec::new()
            .partition_by(Field::UserId)
            .order_by(OrderSpec::desc(Field::Timestamp))
            .evaluate(&events, &KeySelector::derived("flag"), WindowFunction::Sum)
            .unwrap();

        // Output stays in frame order.
        assert_eq!(out, ints(&[1, 1, 0, 0]));
    }

    #[test]
    fn test_groups_frame_includes_peers() {
        let records = vec![
            EventRecord::new("u", 100, "NextSong"),
            EventRecord::new("u", 200, "NextSong"),
            EventRecord::new("u", 200, "Home"),
            EventRecord::new("u", 300, "NextSong"),
        ];
        let xs = ints(&[1, 1, 1, 1]);

        let groups = eval(&records, xs.clone(), WindowFunction::Sum, FrameSpec::cumulative())
            .unwrap();
        assert_eq!(groups, ints(&[1, 3, 3, 4]));

        let rows = eval(&records, xs, WindowFunction::Sum, FrameSpec::running_rows()).unwrap();
        assert_eq!(rows, ints(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_sliding_row_frame() {
        let (records, xs) = single_partition(ints(&[1, 2, 3, 4, 5]));
        let frame = FrameSpec::rows(FrameBound::Offset(-1), FrameBound::Offset(1));

        let sums = eval(&records, xs.clone(), WindowFunction::Sum, frame).unwrap();
        assert_eq!(sums, ints(&[3, 6, 9, 12, 9]));

        let firsts = eval(&records, xs.clone(), WindowFunction::First, frame).unwrap();
        assert_eq!(firsts, ints(&[1, 1, 2, 3, 4]));

        let maxes = eval(&records, xs, WindowFunction::Max, frame).unwrap();
        assert_eq!(maxes, ints(&[2, 3, 4, 5, 5]));
    }

    #[test]
    fn test_sliding_float_sums_are_exact() {
        let current = FrameSpec::rows(FrameBound::CurrentRow, FrameBound::CurrentRow);

        let (records, xs) =
            single_partition(vec![Value::Float(1e20), Value::Float(1.0), Value::Float(1.0)]);
        let sums = eval(&records, xs, WindowFunction::Sum, current).unwrap();
        assert_eq!(
            sums,
            vec![Value::Float(1e20), Value::Float(1.0), Value::Float(1.0)]
        );

        let (records, xs) =
            single_partition(vec![Value::Float(f64::NAN), Value::Float(1.0), Value::Float(2.0)]);
        let sums = eval(&records, xs.clone(), WindowFunction::Sum, current).unwrap();
        assert!(matches!(sums[0], Value::Float(v) if v.is_nan()));
        assert_eq!(sums[1..], [Value::Float(1.0), Value::Float(2.0)]);

        let avgs = eval(&records, xs, WindowFunction::Avg, current).unwrap();
        assert_eq!(avgs[1..], [Value::Float(1.0), Value::Float(2.0)]);
    }

    #[test]
    fn test_sliding_mixed_sum_keeps_integer_part() {
        let (records, xs) =
            single_partition(vec![Value::Int(5), Value::Float(0.5), Value::Int(2)]);
        let frame = FrameSpec::rows(FrameBound::Offset(-1), FrameBound::CurrentRow);
        let sums = eval(&records, xs, WindowFunction::Sum, frame).unwrap();
        assert_eq!(
            sums,
            vec![Value::Int(5), Value::Float(5.5), Value::Float(2.5)]
        );
    }

    #[test]
    fn test_extreme_offsets_saturate() {
        let (records, xs) = single_partition(ints(&[1, 2, 3]));

        let rows = FrameSpec::rows(FrameBound::Unbounded, FrameBound::Offset(i64::MAX));
        let sums = eval(&records, xs.clone(), WindowFunction::Sum, rows).unwrap();
        assert_eq!(sums, ints(&[6, 6, 6]));

        let groups = FrameSpec::groups(FrameBound::Unbounded, FrameBound::Offset(i64::MAX));
        let sums = eval(&records, xs.clone(), WindowFunction::Sum, groups).unwrap();
        assert_eq!(sums, ints(&[6, 6, 6]));

        let behind = FrameSpec::rows(FrameBound::Offset(i64::MIN), FrameBound::CurrentRow);
        let sums = eval(&records, xs.clone(), WindowFunction::Sum, behind).unwrap();
        assert_eq!(sums, ints(&[1, 3, 6]));

        let groups_behind = FrameSpec::groups(FrameBound::Offset(i64::MIN), FrameBound::CurrentRow);
        let sums = eval(&records, xs, WindowFunction::Sum, groups_behind).unwrap();
        assert_eq!(sums, ints(&[1, 3, 6]));
    }

    #[test]
    fn test_empty_frames() {
        let (records, xs) = single_partition(ints(&[1, 2, 3]));
        // Two to three rows behind: empty for the first two rows.
        let frame = FrameSpec::rows(FrameBound::Offset(-3), FrameBound::Offset(-2));

        let sums = eval(&records, xs.clone(), WindowFunction::Sum, frame).unwrap();
        assert_eq!(sums, ints(&[0, 0, 1]));

        let counts = eval(&records, xs.clone(), WindowFunction::Count, frame).unwrap();
        assert_eq!(counts, ints(&[0, 0, 1]));

        let avgs = eval(&records, xs.clone(), WindowFunction::Avg, frame).unwrap();
        assert_eq!(avgs, vec![Value::Null, Value::Null, Value::Float(1.0)]);

        let firsts = eval(&records, xs, WindowFunction::First, frame).unwrap();
        assert_eq!(firsts, vec![Value::Null, Value::Null, Value::Int(1)]);
    }

    #[test]
    fn test_group_offsets() {
        let records = vec![
            EventRecord::new("u", 1, "a"),
            EventRecord::new("u", 2, "b"),
            EventRecord::new("u", 2, "c"),
            EventRecord::new("u", 3, "d"),
        ];
        let xs = ints(&[1, 10, 100, 1000]);
        let previous_group = FrameSpec::groups(FrameBound::Offset(-1), FrameBound::Offset(-1));
        let out = eval(&records, xs, WindowFunction::Sum, previous_group).unwrap();
        assert_eq!(out, ints(&[0, 1, 1, 110]));
    }

    #[test]
    fn test_count_and_avg_skip_nulls() {
        let (records, xs) =
            single_partition(vec![Value::Null, Value::Int(4), Value::Null, Value::Int(8)]);
        let frame = FrameSpec::whole_partition();

        let counts = eval(&records, xs.clone(), WindowFunction::Count, frame).unwrap();
        assert_eq!(counts, ints(&[2, 2, 2, 2]));

        let avgs = eval(&records, xs, WindowFunction::Avg, frame).unwrap();
        assert_eq!(avgs, vec![Value::Float(6.0); 4]);
    }

    #[test]
    fn test_running_min_max() {
        let (records, xs) =
            single_partition(vec![Value::Null, Value::Int(3), Value::Int(1), Value::Int(5)]);

        let maxes = eval(&records, xs.clone(), WindowFunction::Max, FrameSpec::running_rows())
            .unwrap();
        assert_eq!(
            maxes,
            vec![Value::Null, Value::Int(3), Value::Int(3), Value::Int(5)]
        );

        let mins = eval(&records, xs, WindowFunction::Min, FrameSpec::running_rows()).unwrap();
        assert_eq!(
            mins,
            vec![Value::Null, Value::Int(3), Value::Int(1), Value::Int(1)]
        );
    }

    #[test]
    fn test_rank_and_row_number() {
        let records = vec![
            EventRecord::new("u", 10, "a"),
            EventRecord::new("u", 20, "b"),
            EventRecord::new("u", 20, "c"),
            EventRecord::new("u", 30, "d"),
        ];
        let xs = vec![Value::Null; 4];

        let ranks = eval(&records, xs.clone(), WindowFunction::Rank, FrameSpec::cumulative())
            .unwrap();
        assert_eq!(ranks, ints(&[1, 2, 2, 4]));

        let numbers = eval(&records, xs, WindowFunction::RowNumber, FrameSpec::cumulative())
            .unwrap();
        assert_eq!(numbers, ints(&[1, 2, 3, 4]));
    }

    #[test]
    fn test_string_input_is_type_mismatch() {
        let records = vec![EventRecord::new("u", 1, "Home")];
        let events = EventFrame::new(&records);
        let err = WindowSpec::new()
            .evaluate(&events, &Field::Page.into(), WindowFunction::Sum)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));

        // FIRST and MAX accept any value.
        let out = WindowSpec::new()
            .evaluate(&events, &Field::Page.into(), WindowFunction::Max)
            .unwrap();
        assert_eq!(out, vec![Value::from("Home")]);
    }

    #[test]
    fn test_unknown_input_column() {
        let records = vec![EventRecord::new("u", 1, "Home")];
        let events = EventFrame::new(&records);
        let err = WindowSpec::new()
            .evaluate(
                &events,
                &KeySelector::Column(Column::derived("missing")),
                WindowFunction::Sum,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }

    #[test]
    fn test_large_input_matches_sequential_evaluation() {
        // Enough rows to take the parallel path when the feature is on.
        let records: Vec<EventRecord> = (0..12_000)
            .map(|i| EventRecord::new(format!("u{}", i % 7).as_str(), i / 3, "NextSong"))
            .collect();
        let xs: Vec<Value> = (0..12_000).map(|i| Value::Int(i % 2)).collect();
        let events = EventFrame::new(&records).with_column("x", xs).unwrap();
        let spec = WindowSpec::new()
            .partition_by(Field::UserId)
            .order_by(OrderSpec::asc(Field::Timestamp));
        let index = spec.index(&events).unwrap();

        let all = evaluate(
            &events,
            &index,
            &KeySelector::derived("x"),
            WindowFunction::Sum,
            &FrameSpec::cumulative(),
        )
        .unwrap();

        for partition in index.iter() {
            let expected = evaluate_partition(
                &events,
                partition,
                &KeySelector::derived("x"),
                WindowFunction::Sum,
                &FrameSpec::cumulative(),
            )
            .unwrap();
            let got: Vec<Value> = partition.rows.iter().map(|&r| all[r].clone()).collect();
            assert_eq!(got, expected);
        }
    }
}
