//! Time-indexed observation tables
//!
//! The central data structure of the crate: a `Table` is an ordered collection
//! of named numeric columns sharing one timezone-aware time index. Tables grow
//! by column-wise union when chunks are merged on read, or when a write merges
//! with pre-existing on-disk data.

use chrono::{DateTime, Duration, LocalResult, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::fmt;

/// A single named column of observations, aligned to the table index
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name; unit and source semantics are external to the table
    pub name: String,
    /// One entry per index timestamp, `None` for a missing cell
    pub values: Vec<Option<f64>>,
}

/// A time-indexed table of named numeric columns
///
/// Invariants:
/// - every index entry carries an explicit timezone (never naive)
/// - after any merge, timestamps are unique and monotonically non-decreasing
/// - all columns have exactly as many values as the index has timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index_name: String,
    timezone: Tz,
    index: Vec<DateTime<Tz>>,
    columns: Vec<Column>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new(Tz::UTC)
    }
}

impl Table {
    /// Create an empty table with no columns
    pub fn new(timezone: Tz) -> Self {
        Self {
            index_name: "time".to_string(),
            timezone,
            index: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Create an empty table with the given column names
    pub fn with_columns<I, S>(timezone: Tz, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(timezone);
        for name in names {
            table.columns.push(Column {
                name: name.into(),
                values: Vec::new(),
            });
        }
        table
    }

    /// Name of the index column (default `time`)
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn set_index_name(&mut self, name: impl Into<String>) {
        self.index_name = name.into();
    }

    /// Timezone shared by all index entries
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn index(&self) -> &[DateTime<Tz>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of rows (index entries)
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if the table holds no rows; it may still carry column names
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn first_time(&self) -> Option<DateTime<Tz>> {
        self.index.first().copied()
    }

    /// Append a row; `values` is padded with `None` to the column count
    pub fn push_row(&mut self, time: DateTime<Tz>, mut values: Vec<Option<f64>>) {
        values.resize(self.columns.len(), None);
        self.index.push(time);
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }
    }

    /// Set a single cell, creating the column and row as needed
    ///
    /// Rows are kept sorted by time; an existing row at the same instant is
    /// updated in place.
    pub fn insert(&mut self, time: DateTime<Tz>, column: &str, value: f64) {
        let col = self.ensure_column(column);
        let row = match self.index.binary_search(&time) {
            Ok(row) => row,
            Err(pos) => {
                self.index.insert(pos, time);
                for c in &mut self.columns {
                    c.values.insert(pos, None);
                }
                pos
            }
        };
        self.columns[col].values[row] = Some(value);
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.columns.iter().position(|c| c.name == name) {
            return idx;
        }
        self.columns.push(Column {
            name: name.to_string(),
            values: vec![None; self.index.len()],
        });
        self.columns.len() - 1
    }

    /// Cell value for a column at an exact instant
    pub fn value_at(&self, column: &str, time: DateTime<Tz>) -> Option<f64> {
        let column = self.column(column)?;
        let row = self.index.iter().position(|t| *t == time)?;
        column.values.get(row).copied().flatten()
    }

    fn cell(&self, column: &str, row: usize) -> Option<f64> {
        self.column(column)
            .and_then(|c| c.values.get(row).copied().flatten())
    }

    /// Convert the index to another timezone; instants are unchanged
    pub fn convert(&self, timezone: Tz) -> Table {
        Table {
            index_name: self.index_name.clone(),
            timezone,
            index: self
                .index
                .iter()
                .map(|t| t.with_timezone(&timezone))
                .collect(),
            columns: self.columns.clone(),
        }
    }

    /// Union with another table; values of `self` take precedence
    ///
    /// The result index is the sorted union of both indexes, compared by
    /// instant. For cells present in both tables, `self` wins except where its
    /// value is missing, in which case `other` fills the gap. Columns of
    /// `self` come first; columns only in `other` are appended unchanged. The
    /// result carries the timezone and index name of `self`.
    pub fn combine_first(&self, other: &Table) -> Table {
        if self.index.is_empty() && self.columns.is_empty() {
            return other.clone();
        }
        if other.index.is_empty() && other.columns.is_empty() {
            return self.clone();
        }

        // first occurrence wins for duplicate timestamps within one source
        let mut rows: BTreeMap<DateTime<Utc>, (Option<usize>, Option<usize>)> = BTreeMap::new();
        for (row, time) in self.index.iter().enumerate() {
            let entry = rows.entry(time.with_timezone(&Utc)).or_insert((None, None));
            if entry.0.is_none() {
                entry.0 = Some(row);
            }
        }
        for (row, time) in other.index.iter().enumerate() {
            let entry = rows.entry(time.with_timezone(&Utc)).or_insert((None, None));
            if entry.1.is_none() {
                entry.1 = Some(row);
            }
        }

        let mut names: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        for column in &other.columns {
            if !names.iter().any(|n| *n == column.name) {
                names.push(column.name.clone());
            }
        }

        let mut result = Table::with_columns(self.timezone, names.iter().cloned());
        result.index_name = self.index_name.clone();
        for (instant, (ours, theirs)) in rows {
            let values = names
                .iter()
                .map(|name| {
                    ours.and_then(|row| self.cell(name, row))
                        .or_else(|| theirs.and_then(|row| other.cell(name, row)))
                })
                .collect();
            result.push_row(instant.with_timezone(&self.timezone), values);
        }
        result
    }

    /// Rows within the closed range `[start, end]`
    pub fn slice(&self, start: DateTime<Tz>, end: DateTime<Tz>) -> Table {
        self.filter_rows(|t| *t >= start && *t <= end)
    }

    /// Rows at or after `start`
    pub fn truncate_before(&self, start: DateTime<Tz>) -> Table {
        self.filter_rows(|t| *t >= start)
    }

    /// The first `n` rows
    pub fn head(&self, n: usize) -> Table {
        let mut count = 0;
        self.filter_rows(|_| {
            count += 1;
            count <= n
        })
    }

    fn filter_rows(&self, mut keep: impl FnMut(&DateTime<Tz>) -> bool) -> Table {
        let mut result = Table::with_columns(self.timezone, self.columns.iter().map(|c| c.name.clone()));
        result.index_name = self.index_name.clone();
        for (row, time) in self.index.iter().enumerate() {
            if keep(time) {
                let values = self.columns.iter().map(|c| c.values[row]).collect();
                result.push_row(*time, values);
            }
        }
        result
    }

    /// Sum values into fixed-width bins of `interval` seconds
    ///
    /// Bin boundaries are phase-aligned: the origin is midnight of the first
    /// row's day shifted by `offset` seconds, so repeated queries with the
    /// same phase produce identically aligned bins regardless of the day the
    /// data starts on. Only bins containing at least one source row are
    /// materialized; missing cells contribute nothing to the sum.
    pub fn resample_sum(&self, interval: i64, offset: i64) -> Table {
        if interval <= 0 || self.index.is_empty() {
            return self.clone();
        }

        let first = self.index[0];
        let midnight = first.date_naive().and_hms_opt(0, 0, 0).unwrap();
        let origin = match self.timezone.from_local_datetime(&midnight) {
            LocalResult::Single(t) => t,
            LocalResult::Ambiguous(t, _) => t,
            LocalResult::None => first,
        } + Duration::seconds(offset);

        let mut bins: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for (row, time) in self.index.iter().enumerate() {
            let bin = (*time - origin).num_seconds().div_euclid(interval);
            let sums = bins
                .entry(bin)
                .or_insert_with(|| vec![0.0; self.columns.len()]);
            for (col, column) in self.columns.iter().enumerate() {
                if let Some(value) = column.values[row] {
                    sums[col] += value;
                }
            }
        }

        let mut result =
            Table::with_columns(self.timezone, self.columns.iter().map(|c| c.name.clone()));
        result.index_name = self.index_name.clone();
        for (bin, sums) in bins {
            let time = origin + Duration::seconds(bin * interval);
            result.push_row(time, sums.into_iter().map(Some).collect());
        }
        result
    }

    /// Phase offset of a query start: seconds since its midnight, mod interval
    pub fn resample_offset(start: DateTime<Tz>, interval: i64) -> i64 {
        if interval <= 0 {
            return 0;
        }
        i64::from(start.time().num_seconds_from_midnight()) % interval
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index_name)?;
        for column in &self.columns {
            write!(f, ",{}", column.name)?;
        }
        writeln!(f)?;
        for (row, time) in self.index.iter().enumerate() {
            write!(f, "{}", time.format("%Y-%m-%d %H:%M:%S%.f%:z"))?;
            for column in &self.columns {
                match column.values[row] {
                    Some(value) => write!(f, ",{}", value)?,
                    None => write!(f, ",")?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
