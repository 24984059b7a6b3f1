//! Partitioned order index
//!
//! Splits a frame into partitions by key and orders each partition. A
//! partition stores frame-row indices, never copies of records, so results
//! computed per partition can be scattered back onto the frame.
//!
//! Ordering rules:
//! - nulls sort first ascending and last descending ([`Value`]'s order, reversed);
//! - rows equal on every order key keep ingestion order, whatever the direction.

use super::frame::{EventFrame, KeySelector};
use crate::error::Result;
use crate::types::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::ops::Range;

/// Sort direction for an order key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn apply(&self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// One ORDER BY term.
#[derive(Debug, Clone)]
pub struct OrderSpec {
    pub key: KeySelector,
    pub direction: Direction,
}

impl OrderSpec {
    pub fn asc(key: impl Into<KeySelector>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(key: impl Into<KeySelector>) -> Self {
        Self {
            key: key.into(),
            direction: Direction::Descending,
        }
    }
}

/// Rows sharing a partition key, in partition order.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Partition key values (empty when partitioning by nothing)
    pub key: Vec<Value>,
    /// Frame rows in order
    pub rows: Vec<usize>,
    /// Order-key values, aligned with `rows`
    pub order_keys: Vec<Vec<Value>>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether two positions share their order keys.
    pub fn is_peer(&self, a: usize, b: usize) -> bool {
        self.order_keys[a] == self.order_keys[b]
    }

    /// Contiguous runs of peer rows, as position ranges.
    pub fn peer_groups(&self) -> Vec<Range<usize>> {
        let mut groups = Vec::new();
        let mut start = 0;
        for pos in 1..=self.len() {
            if pos == self.len() || !self.is_peer(start, pos) {
                groups.push(start..pos);
                start = pos;
            }
        }
        groups
    }
}

/// All partitions of a frame, in first-seen key order.
#[derive(Debug, Clone, Default)]
pub struct PartitionIndex {
    partitions: Vec<Partition>,
    lookup: HashMap<Vec<Value>, usize>,
}

impl PartitionIndex {
    /// Partition `frame` by `partition_by` and order each partition by `order_by`.
    ///
    /// Fails with [`crate::Error::InvalidKey`] if any selector names a column the
    /// frame does not have.
    pub fn build(
        frame: &EventFrame<'_>,
        partition_by: &[KeySelector],
        order_by: &[OrderSpec],
    ) -> Result<Self> {
        let partition_keys = frame.resolve_all(partition_by)?;
        let order_selectors: Vec<KeySelector> = order_by.iter().map(|o| o.key.clone()).collect();
        let order_keys = frame.resolve_all(&order_selectors)?;
        let directions: Vec<Direction> = order_by.iter().map(|o| o.direction).collect();

        let mut partitions: Vec<Partition> = Vec::new();
        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();

        for row in 0..frame.len() {
            let key = frame.read_all(row, &partition_keys);
            let slot = match lookup.get(&key) {
                Some(&slot) => slot,
                None => {
                    lookup.insert(key.clone(), partitions.len());
                    partitions.push(Partition {
                        key,
                        rows: Vec::new(),
                        order_keys: Vec::new(),
                    });
                    partitions.len() - 1
                }
            };
            let partition = &mut partitions[slot];
            partition.rows.push(row);
            partition.order_keys.push(frame.read_all(row, &order_keys));
        }

        if !directions.is_empty() {
            for partition in &mut partitions {
                sort_partition(partition, &directions);
            }
        }

        tracing::debug!(
            rows = frame.len(),
            partitions = partitions.len(),
            "Built partition index"
        );

        Ok(Self { partitions, lookup })
    }

    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.iter()
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, key: &[Value]) -> Option<&Partition> {
        self.lookup.get(key).map(|&slot| &self.partitions[slot])
    }

    /// Total number of rows across partitions.
    pub fn row_count(&self) -> usize {
        self.partitions.iter().map(Partition::len).sum()
    }
}

/// Stable sort: rows start in ingestion order, so ties keep it.
fn sort_partition(partition: &mut Partition, directions: &[Direction]) {
    let mut positions: Vec<usize> = (0..partition.len()).collect();
    positions.sort_by(|&a, &b| {
        compare_keys(
            &partition.order_keys[a],
            &partition.order_keys[b],
            directions,
        )
    });

    let rows = positions.iter().map(|&p| partition.rows[p]).collect();
    let order_keys = positions
        .iter()
        .map(|&p| std::mem::take(&mut partition.order_keys[p]))
        .collect();
    partition.rows = rows;
    partition.order_keys = order_keys;
}

fn compare_keys(a: &[Value], b: &[Value], directions: &[Direction]) -> Ordering {
    a.iter()
        .zip(b)
        .zip(directions)
        .map(|((x, y), dir)| dir.apply(x.cmp(y)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::frame::Column;
    use crate::error::Error;
    use crate::types::{EventRecord, Field};

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord::new("a", 300, "Home"),
            EventRecord::new("b", 100, "Home"),
            EventRecord::new("a", 100, "NextSong"),
            EventRecord::new("a", 200, "NextSong"),
            EventRecord::new("b", 100, "Logout"),
            EventRecord::new("a", 200, "Home"),
        ]
    }

    fn pages(frame: &EventFrame<'_>, partition: &Partition) -> Vec<String> {
        partition
            .rows
            .iter()
            .map(|&row| frame.record(row).page.clone())
            .collect()
    }

    #[test]
    fn test_partitions_in_first_seen_order() {
        let records = records();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(&frame, &[Field::UserId.into()], &[]).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.partitions()[0].key, vec![Value::from("a")]);
        assert_eq!(index.partitions()[1].key, vec![Value::from("b")]);
        assert_eq!(index.row_count(), records.len());
        // Without ORDER BY, rows stay in ingestion order.
        assert_eq!(index.partitions()[0].rows, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_ascending_order_with_stable_ties() {
        let records = records();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(
            &frame,
            &[Field::UserId.into()],
            &[OrderSpec::asc(Field::Timestamp)],
        )
        .unwrap();

        let a = index.get(&[Value::from("a")]).unwrap();
        assert_eq!(pages(&frame, a), vec!["NextSong", "NextSong", "Home", "Home"]);
        assert_eq!(a.rows, vec![2, 3, 5, 0]);
    }

    #[test]
    fn test_descending_order_keeps_ingestion_ties() {
        let records = records();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(
            &frame,
            &[Field::UserId.into()],
            &[OrderSpec::desc(Field::Timestamp)],
        )
        .unwrap();

        let a = index.get(&[Value::from("a")]).unwrap();
        // ts=200 ties keep row 3 before row 5.
        assert_eq!(a.rows, vec![0, 3, 5, 2]);

        let b = index.get(&[Value::from("b")]).unwrap();
        assert_eq!(b.rows, vec![1, 4]);
    }

    #[test]
    fn test_peer_groups() {
        let records = records();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(
            &frame,
            &[Field::UserId.into()],
            &[OrderSpec::asc(Field::Timestamp)],
        )
        .unwrap();

        let a = index.get(&[Value::from("a")]).unwrap();
        assert_eq!(a.peer_groups(), vec![0..1, 1..3, 3..4]);
        let b = index.get(&[Value::from("b")]).unwrap();
        assert_eq!(b.peer_groups(), vec![0..2]);
    }

    #[test]
    fn test_nulls_first_ascending_last_descending() {
        let records = vec![
            EventRecord::new("a", 1, "NextSong").with_artist("Muse"),
            EventRecord::new("a", 2, "Home"),
            EventRecord::new("a", 3, "NextSong").with_artist("Adele"),
        ];
        let frame = EventFrame::new(&records);

        let asc = PartitionIndex::build(&frame, &[], &[OrderSpec::asc(Field::Artist)]).unwrap();
        assert_eq!(asc.partitions()[0].rows, vec![1, 2, 0]);

        let desc = PartitionIndex::build(&frame, &[], &[OrderSpec::desc(Field::Artist)]).unwrap();
        assert_eq!(desc.partitions()[0].rows, vec![0, 2, 1]);
    }

    #[test]
    fn test_no_partition_key_is_single_partition() {
        let records = records();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(&frame, &[], &[]).unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.partitions()[0].key.is_empty());
        assert_eq!(index.partitions()[0].len(), records.len());
    }

    #[test]
    fn test_empty_frame_has_no_partitions() {
        let records: Vec<EventRecord> = Vec::new();
        let frame = EventFrame::new(&records);
        let index = PartitionIndex::build(&frame, &[Field::UserId.into()], &[]).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_unknown_column_fails() {
        let records = records();
        let frame = EventFrame::new(&records);
        let err = PartitionIndex::build(&frame, &[Column::derived("cohort").into()], &[])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));

        let err = PartitionIndex::build(&frame, &[], &[OrderSpec::asc(Column::derived("rank"))])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey(_)));
    }
}
