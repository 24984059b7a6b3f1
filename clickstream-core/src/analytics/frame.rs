//! Event frames: read-only views over a record slice
//!
//! A frame is a row selection (indices into the original records) plus any
//! derived columns computed so far. Filtering and adding columns return new
//! frames; the records themselves are never copied or modified, and every
//! frame row can be traced back to its original record with
//! [`EventFrame::record_index`].

use crate::error::{Error, Result};
use crate::types::{EventRecord, Field, Value};
use std::fmt;
use std::sync::Arc;

// ============================================
// Column references
// ============================================

/// A column a frame can read: a record field or a derived column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Column {
    Field(Field),
    Derived(String),
}

impl Column {
    pub fn derived(name: impl Into<String>) -> Self {
        Column::Derived(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Column::Field(field) => field.as_str(),
            Column::Derived(name) => name,
        }
    }
}

impl From<Field> for Column {
    fn from(field: Field) -> Self {
        Column::Field(field)
    }
}

/// Field names resolve to [`Column::Field`]; anything else is taken as a
/// derived column name and checked when the frame resolves it.
impl std::str::FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::InvalidKey("empty column name".to_string()));
        }
        Ok(s.parse::<Field>()
            .map(Column::Field)
            .unwrap_or_else(|_| Column::Derived(s.to_string())))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================
// Key selectors
// ============================================

type ProjectionFn = dyn Fn(&EventRecord) -> Value + Send + Sync;

/// A named function computing a key from a record (e.g. the hour of day).
#[derive(Clone)]
pub struct Projection {
    name: String,
    func: Arc<ProjectionFn>,
}

impl Projection {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&EventRecord) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn apply(&self, record: &EventRecord) -> Value {
        (self.func)(record)
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection").field("name", &self.name).finish()
    }
}

/// Something that yields one [`Value`] per frame row: used for partition
/// keys, order keys, group keys and window inputs.
#[derive(Debug, Clone)]
pub enum KeySelector {
    Column(Column),
    Projection(Projection),
}

impl KeySelector {
    pub fn field(field: Field) -> Self {
        KeySelector::Column(Column::Field(field))
    }

    pub fn derived(name: impl Into<String>) -> Self {
        KeySelector::Column(Column::derived(name))
    }

    pub fn projection<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&EventRecord) -> Value + Send + Sync + 'static,
    {
        KeySelector::Projection(Projection::new(name, func))
    }

    pub fn name(&self) -> &str {
        match self {
            KeySelector::Column(column) => column.name(),
            KeySelector::Projection(projection) => projection.name(),
        }
    }
}

impl From<Field> for KeySelector {
    fn from(field: Field) -> Self {
        KeySelector::field(field)
    }
}

impl From<Column> for KeySelector {
    fn from(column: Column) -> Self {
        KeySelector::Column(column)
    }
}

impl std::str::FromStr for KeySelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Column>().map(KeySelector::Column)
    }
}

/// A selector checked against a frame, ready for per-row reads.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedKey {
    Field(Field),
    Derived(usize),
    Projection(Projection),
}

// ============================================
// Frames
// ============================================

#[derive(Debug, Clone)]
struct DerivedColumn {
    name: String,
    values: Vec<Value>,
}

/// A read-only selection of rows over a record slice, plus derived columns.
#[derive(Debug, Clone)]
pub struct EventFrame<'a> {
    records: &'a [EventRecord],
    rows: Vec<usize>,
    derived: Vec<DerivedColumn>,
}

impl<'a> EventFrame<'a> {
    /// A frame selecting every record, in ingestion order.
    pub fn new(records: &'a [EventRecord]) -> Self {
        Self {
            records,
            rows: (0..records.len()).collect(),
            derived: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The record behind a frame row.
    pub fn record(&self, row: usize) -> &'a EventRecord {
        &self.records[self.rows[row]]
    }

    /// Index of a frame row in the original record slice.
    pub fn record_index(&self, row: usize) -> usize {
        self.rows[row]
    }

    /// Records in frame order.
    pub fn records(&self) -> impl Iterator<Item = &'a EventRecord> + '_ {
        self.rows.iter().map(move |&idx| &self.records[idx])
    }

    /// Names of the derived columns, in the order they were added.
    pub fn derived_columns(&self) -> impl Iterator<Item = &str> {
        self.derived.iter().map(|c| c.name.as_str())
    }

    /// Keep the rows whose record matches `predicate`.
    pub fn filter<P>(&self, mut predicate: P) -> Self
    where
        P: FnMut(&EventRecord) -> bool,
    {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| predicate(self.record(row)))
            .collect();
        self.select(&keep)
    }

    /// Keep the rows whose value in `column` matches `predicate`.
    pub fn filter_by<P>(&self, column: &Column, mut predicate: P) -> Result<Self>
    where
        P: FnMut(&Value) -> bool,
    {
        let key = self.resolve_column(column)?;
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| predicate(&self.read(row, &key)))
            .collect();
        Ok(self.select(&keep))
    }

    /// A new frame with `values` attached as a derived column.
    pub fn with_column(&self, name: impl Into<String>, values: Vec<Value>) -> Result<Self> {
        let name = name.into();
        if name.parse::<Field>().is_ok() {
            return Err(Error::InvalidKey(format!(
                "derived column {} shadows a record field",
                name
            )));
        }
        if values.len() != self.len() {
            return Err(Error::ColumnLength {
                column: name,
                expected: self.len(),
                actual: values.len(),
            });
        }

        let mut frame = self.clone();
        match frame.derived.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => frame.derived.push(DerivedColumn { name, values }),
        }
        Ok(frame)
    }

    /// Read one cell.
    pub fn value(&self, row: usize, column: &Column) -> Result<Value> {
        let key = self.resolve_column(column)?;
        Ok(self.read(row, &key))
    }

    /// Every value of a selector, in frame row order.
    pub fn column_values(&self, selector: &KeySelector) -> Result<Vec<Value>> {
        let key = self.resolve(selector)?;
        Ok((0..self.len()).map(|row| self.read(row, &key)).collect())
    }

    /// Check that a column exists on this frame.
    pub fn check_column(&self, column: &Column) -> Result<()> {
        self.resolve_column(column).map(|_| ())
    }

    pub(crate) fn resolve_column(&self, column: &Column) -> Result<ResolvedKey> {
        match column {
            Column::Field(field) => Ok(ResolvedKey::Field(*field)),
            Column::Derived(name) => self
                .derived
                .iter()
                .position(|c| &c.name == name)
                .map(ResolvedKey::Derived)
                .ok_or_else(|| Error::InvalidKey(format!("unknown column: {}", name))),
        }
    }

    pub(crate) fn resolve(&self, selector: &KeySelector) -> Result<ResolvedKey> {
        match selector {
            KeySelector::Column(column) => self.resolve_column(column),
            KeySelector::Projection(projection) => Ok(ResolvedKey::Projection(projection.clone())),
        }
    }

    pub(crate) fn resolve_all(&self, selectors: &[KeySelector]) -> Result<Vec<ResolvedKey>> {
        selectors.iter().map(|s| self.resolve(s)).collect()
    }

    pub(crate) fn read(&self, row: usize, key: &ResolvedKey) -> Value {
        match key {
            ResolvedKey::Field(field) => field.value_of(self.record(row)),
            ResolvedKey::Derived(idx) => self.derived[*idx].values[row].clone(),
            ResolvedKey::Projection(projection) => projection.apply(self.record(row)),
        }
    }

    pub(crate) fn read_all(&self, row: usize, keys: &[ResolvedKey]) -> Vec<Value> {
        keys.iter().map(|key| self.read(row, key)).collect()
    }

    fn select(&self, keep: &[usize]) -> Self {
        Self {
            records: self.records,
            rows: keep.iter().map(|&row| self.rows[row]).collect(),
            derived: self
                .derived
                .iter()
                .map(|c| DerivedColumn {
                    name: c.name.clone(),
                    values: keep.iter().map(|&row| c.values[row].clone()).collect(),
                })
                .collect(),
        }
    }
}
