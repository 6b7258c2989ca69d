//! In-memory table used by every stage of the lake
//!
//! A `Frame` is row-oriented: a header of column names plus rows of typed
//! cells. Cell equality is structural (floats compare by bit pattern), which
//! is what deduplication and joins need.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

/// A single typed cell
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Text rendering used for concatenations and string columns.
    /// `Null` renders as the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Date(a), Value::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Str(s) => s.hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::Date(d) => d.hash(state),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Row-oriented table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a frame from a header and rows. Rows are padded with `Null` or
    /// truncated to the header width.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Value::Null);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, mut row: Vec<Value>) {
        row.resize(self.columns.len(), Value::Null);
        self.rows.push(row);
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Cells of one column, in row order
    pub fn column_values(&self, name: &str) -> Vec<Value> {
        match self.column_index(name) {
            Some(idx) => self.rows.iter().map(|r| r[idx].clone()).collect(),
            None => Vec::new(),
        }
    }

    /// Rename `from` to `to` unless `from` is missing or `to` already exists.
    pub fn rename(mut self, from: &str, to: &str) -> Self {
        if self.has_column(to) {
            return self;
        }
        if let Some(idx) = self.column_index(from) {
            self.columns[idx] = to.to_string();
        }
        self
    }

    /// Keep the named columns that exist, in the given order.
    pub fn select(&self, names: &[&str]) -> Frame {
        let picks: Vec<(usize, String)> = names
            .iter()
            .filter_map(|n| self.column_index(n).map(|i| (i, n.to_string())))
            .collect();
        Frame {
            columns: picks.iter().map(|(_, n)| n.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| picks.iter().map(|(i, _)| r[*i].clone()).collect())
                .collect(),
        }
    }

    /// Drop every column matching the predicate.
    pub fn drop_columns<F>(&self, mut predicate: F) -> Frame
    where
        F: FnMut(&str) -> bool,
    {
        let keep: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !predicate(c))
            .map(String::as_str)
            .collect();
        self.select(&keep)
    }

    /// Keep columns up to and including `last`. No-op when `last` is absent.
    pub fn truncate_after(&self, last: &str) -> Frame {
        match self.column_index(last) {
            Some(idx) => {
                let keep: Vec<&str> = self.columns[..=idx].iter().map(String::as_str).collect();
                self.select(&keep)
            }
            None => self.clone(),
        }
    }

    /// Replace every cell of `name` with `f(cell)`. No-op when absent.
    pub fn map_column<F>(mut self, name: &str, mut f: F) -> Self
    where
        F: FnMut(&Value) -> Value,
    {
        if let Some(idx) = self.column_index(name) {
            for row in &mut self.rows {
                row[idx] = f(&row[idx]);
            }
        }
        self
    }

    /// Append (or overwrite) a column computed from each row.
    pub fn with_column<F>(mut self, name: &str, mut f: F) -> Self
    where
        F: FnMut(&Frame, usize) -> Value,
    {
        let values: Vec<Value> = (0..self.rows.len()).map(|i| f(&self, i)).collect();
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        self
    }

    /// Drop duplicate rows, keeping the first occurrence.
    pub fn dedup(mut self) -> Self {
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|r| seen.insert(r.clone()));
        self
    }

    /// Drop rows whose key columns repeat an earlier row, keeping the first.
    /// A null key never matches, so rows with a null key are all kept.
    /// Missing key columns fall back to full-row dedup.
    pub fn dedup_by(mut self, keys: &[&str]) -> Self {
        let idx: Option<Vec<usize>> = keys.iter().map(|k| self.column_index(k)).collect();
        let Some(idx) = idx else {
            return self.dedup();
        };
        let mut seen: HashSet<Vec<Value>> = HashSet::with_capacity(self.rows.len());
        self.rows.retain(|r| {
            let key: Vec<Value> = idx.iter().map(|i| r[*i].clone()).collect();
            key.iter().any(Value::is_null) || seen.insert(key)
        });
        self
    }

    /// Drop rows with a null in any of the named columns.
    pub fn drop_nulls(mut self, names: &[&str]) -> Self {
        let idx: Vec<usize> = names.iter().filter_map(|n| self.column_index(n)).collect();
        self.rows.retain(|r| idx.iter().all(|i| !r[*i].is_null()));
        self
    }

    /// Left join: for each row, append `take` columns from the first matching
    /// row of `other` on `on`. Unmatched rows get nulls. Columns already
    /// present on the left are not duplicated.
    pub fn left_join(&self, other: &Frame, on: &str, take: &[&str]) -> Frame {
        let (Some(left_key), Some(right_key)) = (self.column_index(on), other.column_index(on))
        else {
            return self.clone();
        };
        let take: Vec<(usize, &str)> = take
            .iter()
            .filter(|c| !self.has_column(c))
            .filter_map(|c| other.column_index(c).map(|i| (i, *c)))
            .collect();

        let mut lookup: HashMap<&Value, &Vec<Value>> = HashMap::new();
        for row in &other.rows {
            lookup.entry(&row[right_key]).or_insert(row);
        }

        let mut columns = self.columns.clone();
        columns.extend(take.iter().map(|(_, c)| c.to_string()));
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out = row.clone();
                let matched = if row[left_key].is_null() {
                    None
                } else {
                    lookup.get(&row[left_key])
                };
                for (i, _) in &take {
                    out.push(matched.map(|m| m[*i].clone()).unwrap_or(Value::Null));
                }
                out
            })
            .collect();
        Frame { columns, rows }
    }
}
