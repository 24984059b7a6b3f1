//! Group aggregator
//!
//! GROUP BY over arbitrary key selectors with named aggregates, optional
//! ordering by a metric or key, and a top-k limit.
//!
//! ## Null handling
//!
//! `count(*)` counts every row. Every other aggregate skips nulls, and
//! `sum`/`avg`/`min`/`max` of a group with no non-null input is null. The
//! aggregator never filters rows itself; callers filter the frame first when
//! they want rows excluded from `count(*)`.
//!
//! ## Ordering
//!
//! Groups come out in first-seen order. Sorting is stable, so groups that
//! tie on the sort key keep that order, which makes `limit` deterministic.

use super::frame::{Column, EventFrame, KeySelector, ResolvedKey};
use super::partition::Direction;
use crate::error::{Error, Result};
use crate::types::Value;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// ============================================
// Aggregate definitions
// ============================================

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFn {
    /// `count(*)`: every row in the group
    CountAll,
    /// `count(col)`: non-null values
    Count,
    Sum,
    Avg,
    Min,
    Max,
    CountDistinct,
}

/// One output metric: a function, its input column and an alias.
#[derive(Debug, Clone)]
pub struct Aggregate {
    pub function: AggregateFn,
    pub input: Option<KeySelector>,
    pub alias: String,
}

impl Aggregate {
    pub fn count_all(alias: impl Into<String>) -> Self {
        Self {
            function: AggregateFn::CountAll,
            input: None,
            alias: alias.into(),
        }
    }

    pub fn new(function: AggregateFn, input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self {
            function,
            input: Some(input.into()),
            alias: alias.into(),
        }
    }

    pub fn count(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Count, input, alias)
    }

    pub fn sum(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Sum, input, alias)
    }

    pub fn avg(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Avg, input, alias)
    }

    pub fn min(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Min, input, alias)
    }

    pub fn max(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::Max, input, alias)
    }

    pub fn count_distinct(input: impl Into<KeySelector>, alias: impl Into<String>) -> Self {
        Self::new(AggregateFn::CountDistinct, input, alias)
    }
}

/// What to sort groups by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOrder {
    /// A metric, by alias
    Metric(String, Direction),
    /// A key column, by position in the key
    Key(usize, Direction),
}

// ============================================
// Results
// ============================================

/// One output group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub key: Vec<Value>,
    pub values: Vec<Value>,
}

/// Output of a [`GroupBy`]: one row per distinct key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub key_names: Vec<String>,
    pub metric_names: Vec<String>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a metric by alias.
    pub fn metric_index(&self, alias: &str) -> Result<usize> {
        self.metric_names
            .iter()
            .position(|name| name == alias)
            .ok_or_else(|| Error::InvalidKey(format!("unknown metric: {}", alias)))
    }

    /// All values of one metric, in row order.
    pub fn metric(&self, alias: &str) -> Result<Vec<&Value>> {
        let idx = self.metric_index(alias)?;
        Ok(self.rows.iter().map(|row| &row.values[idx]).collect())
    }
}

// ============================================
// GroupBy
// ============================================

/// A GROUP BY query, built up and then run with [`GroupBy::execute`].
#[derive(Debug, Clone, Default)]
pub struct GroupBy {
    keys: Vec<KeySelector>,
    aggregates: Vec<Aggregate>,
    order: Vec<GroupOrder>,
    limit: Option<usize>,
    require_groups: bool,
}

impl GroupBy {
    pub fn new(keys: Vec<KeySelector>) -> Self {
        Self {
            keys,
            ..Default::default()
        }
    }

    pub fn by(key: impl Into<KeySelector>) -> Self {
        Self::new(vec![key.into()])
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    pub fn order_by_metric(mut self, alias: impl Into<String>, direction: Direction) -> Self {
        self.order.push(GroupOrder::Metric(alias.into(), direction));
        self
    }

    pub fn order_by_key(mut self, position: usize, direction: Direction) -> Self {
        self.order.push(GroupOrder::Key(position, direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Fail with [`Error::EmptyGroup`] instead of returning no groups.
    pub fn require_groups(mut self, required: bool) -> Self {
        self.require_groups = required;
        self
    }

    pub fn execute(&self, frame: &EventFrame<'_>) -> Result<AggregateResult> {
        let keys = frame.resolve_all(&self.keys)?;
        let inputs: Vec<Option<ResolvedKey>> = self
            .aggregates
            .iter()
            .map(|agg| agg.input.as_ref().map(|s| frame.resolve(s)).transpose())
            .collect::<Result<_>>()?;
        let sort_plan = self.sort_plan()?;

        let mut groups: Vec<(Vec<Value>, Vec<Accumulator>)> = Vec::new();
        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();

        for row in 0..frame.len() {
            let key = frame.read_all(row, &keys);
            let slot = match lookup.get(&key) {
                Some(&slot) => slot,
                None => {
                    lookup.insert(key.clone(), groups.len());
                    let accs = self.aggregates.iter().map(|a| Accumulator::new(a.function)).collect();
                    groups.push((key, accs));
                    groups.len() - 1
                }
            };

            let (_, accs) = &mut groups[slot];
            for ((acc, input), agg) in accs.iter_mut().zip(&inputs).zip(&self.aggregates) {
                let value = input.as_ref().map(|key| frame.read(row, key));
                acc.update(value, agg.input.as_ref().map_or("*", |s| s.name()))?;
            }
        }

        if groups.is_empty() && self.require_groups {
            return Err(Error::EmptyGroup);
        }

        let mut rows: Vec<AggregateRow> = groups
            .into_iter()
            .map(|(key, accs)| AggregateRow {
                key,
                values: accs.into_iter().map(Accumulator::finish).collect(),
            })
            .collect();

        if !sort_plan.is_empty() {
            rows.sort_by(|a, b| {
                sort_plan
                    .iter()
                    .map(|(target, dir)| {
                        let ordering = match target {
                            SortTarget::Key(i) => a.key[*i].cmp(&b.key[*i]),
                            SortTarget::Metric(i) => a.values[*i].cmp(&b.values[*i]),
                        };
                        dir.apply(ordering)
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if let Some(n) = self.limit {
            rows.truncate(n);
        }

        tracing::debug!(
            rows = frame.len(),
            groups = rows.len(),
            "Grouped rows"
        );

        Ok(AggregateResult {
            key_names: self.keys.iter().map(|k| k.name().to_string()).collect(),
            metric_names: self.aggregates.iter().map(|a| a.alias.clone()).collect(),
            rows,
        })
    }

    fn sort_plan(&self) -> Result<Vec<(SortTarget, Direction)>> {
        self.order
            .iter()
            .map(|order| match order {
                GroupOrder::Metric(alias, dir) => self
                    .aggregates
                    .iter()
                    .position(|a| &a.alias == alias)
                    .map(|i| (SortTarget::Metric(i), *dir))
                    .ok_or_else(|| Error::InvalidKey(format!("unknown metric: {}", alias))),
                GroupOrder::Key(position, dir) if *position < self.keys.len() => {
                    Ok((SortTarget::Key(*position), *dir))
                }
                GroupOrder::Key(position, _) => Err(Error::InvalidKey(format!(
                    "group key position {} out of range",
                    position
                ))),
            })
            .collect()
    }
}

enum SortTarget {
    Key(usize),
    Metric(usize),
}

/// Convenience: count rows per distinct value of one column.
pub fn count_by(frame: &EventFrame<'_>, column: Column, alias: &str) -> Result<AggregateResult> {
    GroupBy::by(column)
        .aggregate(Aggregate::count_all(alias))
        .execute(frame)
}

// ============================================
// Accumulators
// ============================================

enum Accumulator {
    Count(i64),
    Sum {
        int: i128,
        float: f64,
        any_float: bool,
        seen: bool,
    },
    Avg {
        total: f64,
        count: i64,
    },
    Extremum {
        best: Option<Value>,
        keep: std::cmp::Ordering,
    },
    Distinct(HashSet<Value>),
    CountAll(i64),
}

impl Accumulator {
    fn new(function: AggregateFn) -> Self {
        match function {
            AggregateFn::CountAll => Accumulator::CountAll(0),
            AggregateFn::Count => Accumulator::Count(0),
            AggregateFn::Sum => Accumulator::Sum {
                int: 0,
                float: 0.0,
                any_float: false,
                seen: false,
            },
            AggregateFn::Avg => Accumulator::Avg { total: 0.0, count: 0 },
            AggregateFn::Min => Accumulator::Extremum {
                best: None,
                keep: std::cmp::Ordering::Less,
            },
            AggregateFn::Max => Accumulator::Extremum {
                best: None,
                keep: std::cmp::Ordering::Greater,
            },
            AggregateFn::CountDistinct => Accumulator::Distinct(HashSet::new()),
        }
    }

    fn update(&mut self, value: Option<Value>, column: &str) -> Result<()> {
        match (self, value) {
            (Accumulator::CountAll(n), _) => *n += 1,
            (_, None) | (_, Some(Value::Null)) => {}
            (Accumulator::Count(n), Some(_)) => *n += 1,
            (
                Accumulator::Sum {
                    int,
                    float,
                    any_float,
                    seen,
                },
                Some(value),
            ) => {
                match value {
                    Value::Int(v) => *int += i128::from(v),
                    Value::Float(v) => {
                        *float += v;
                        *any_float = true;
                    }
                    other => return Err(other.mismatch(column, "number")),
                }
                *seen = true;
            }
            (Accumulator::Avg { total, count }, Some(value)) => {
                if let Some(v) = value.as_f64(column)? {
                    *total += v;
                    *count += 1;
                }
            }
            (Accumulator::Extremum { best, keep }, Some(value)) => {
                if best.as_ref().map_or(true, |b| value.cmp(b) == *keep) {
                    *best = Some(value);
                }
            }
            (Accumulator::Distinct(seen), Some(value)) => {
                seen.insert(value);
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::CountAll(n) | Accumulator::Count(n) => Value::Int(n),
            Accumulator::Sum { seen: false, .. } => Value::Null,
            Accumulator::Sum {
                int,
                float,
                any_float: true,
                ..
            } => Value::Float(int as f64 + float),
            Accumulator::Sum { int, float, .. } => i64::try_from(int)
                .map(Value::Int)
                .unwrap_or(Value::Float(int as f64 + float)),
            Accumulator::Avg { count: 0, .. } => Value::Null,
            Accumulator::Avg { total, count } => Value::Float(total / count as f64),
            Accumulator::Extremum { best, .. } => best.unwrap_or(Value::Null),
            Accumulator::Distinct(seen) => Value::Int(seen.len() as i64),
        }
    }
}
