//! FILENAME: pivot-engine/src/source.rs
//! PURPOSE: The contract between the pivot engine and a tabular row source.
//! CONTEXT: The engine only needs three things from a table: its typed
//! columns, its row count, and a way to read one cell. `MemoryTable` is the
//! in-memory implementation used by tests, benches and small callers.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use timebin::parse_timestamp;

/// 0-based sequential position of a row in its source.
pub type RowId = usize;

/// Index of a column in its source (0-based).
pub type ColumnIndex = usize;

/// Placeholder used as the dimension value of an absent/empty cell.
pub const NULL_VALUE: &str = "(null)";

// ============================================================================
// CELL VALUES
// ============================================================================

/// A single cell read from a row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    DateTime(DateTime<Utc>),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// The string a dimension level is keyed by.
    pub fn to_dimension_string(&self) -> String {
        match self {
            CellValue::Empty => NULL_VALUE.to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
            CellValue::Boolean(b) => {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            }
            CellValue::DateTime(t) => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// The UTC timestamp this cell holds, if any. Text is parsed.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::DateTime(t) => Some(*t),
            CellValue::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(value: DateTime<Utc>) -> Self {
        CellValue::DateTime(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Empty, Into::into)
    }
}

// ============================================================================
// COLUMNS
// ============================================================================

/// Semantic type of a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Number,
    Boolean,
    DateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        ColumnDef {
            name: name.into(),
            column_type,
        }
    }
}

// ============================================================================
// ROW SOURCE
// ============================================================================

/// A finite, randomly addressable table of rows.
pub trait RowSource {
    fn columns(&self) -> &[ColumnDef];

    fn row_count(&self) -> usize;

    /// Reads one cell. `None` when the row or column does not exist.
    fn cell(&self, row: RowId, column: ColumnIndex) -> Option<&CellValue>;

    fn column_index(&self, name: &str) -> Option<ColumnIndex> {
        self.columns().iter().position(|c| c.name == name)
    }

    /// Iterates row handles in source order.
    fn rows(&self) -> SourceRows<'_, Self> {
        SourceRows {
            source: self,
            next: 0,
        }
    }
}

/// Borrowed handle to one row of a [`RowSource`].
pub struct SourceRow<'a, S: ?Sized> {
    source: &'a S,
    id: RowId,
}

impl<S: ?Sized> Clone for SourceRow<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: ?Sized> Copy for SourceRow<'_, S> {}

impl<'a, S: RowSource + ?Sized> SourceRow<'a, S> {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn value(&self, column: ColumnIndex) -> Option<&'a CellValue> {
        self.source.cell(self.id, column)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&'a CellValue> {
        let column = self.source.column_index(name)?;
        self.value(column)
    }

    /// Text representation of a named cell, or `None` when absent or empty.
    pub fn text(&self, name: &str) -> Option<String> {
        self.value_by_name(name)
            .filter(|v| !v.is_empty())
            .map(CellValue::to_dimension_string)
    }
}

pub struct SourceRows<'a, S: ?Sized> {
    source: &'a S,
    next: RowId,
}

impl<'a, S: RowSource + ?Sized> Iterator for SourceRows<'a, S> {
    type Item = SourceRow<'a, S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.source.row_count() {
            return None;
        }
        let row = SourceRow {
            source: self.source,
            id: self.next,
        };
        self.next += 1;
        Some(row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.source.row_count().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

// ============================================================================
// IN-MEMORY TABLE
// ============================================================================

/// A simple column-typed, row-major table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTable {
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<CellValue>>,
}

impl MemoryTable {
    pub fn new() -> Self {
        MemoryTable::default()
    }

    /// Creates a table with the given `(name, type)` columns.
    pub fn with_columns<N: Into<String>>(
        columns: impl IntoIterator<Item = (N, ColumnType)>,
    ) -> Self {
        let mut table = MemoryTable::new();
        for (name, column_type) in columns {
            table.add_column(name, column_type);
        }
        table
    }

    /// Appends a column. Existing rows read it as `Empty`.
    pub fn add_column(&mut self, name: impl Into<String>, column_type: ColumnType) -> ColumnIndex {
        self.columns.push(ColumnDef::new(name, column_type));
        for row in &mut self.rows {
            row.push(CellValue::Empty);
        }
        self.columns.len() - 1
    }

    /// Reserves capacity for expected row count.
    pub fn reserve(&mut self, rows: usize) {
        self.rows.reserve(rows);
    }

    /// Appends a row in column order and returns its id.
    /// Short rows are padded with `Empty`; extra values are dropped.
    pub fn push_row(&mut self, mut values: Vec<CellValue>) -> RowId {
        values.resize(self.columns.len(), CellValue::Empty);
        self.rows.push(values);
        self.rows.len() - 1
    }
}

impl RowSource for MemoryTable {
    fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: RowId, column: ColumnIndex) -> Option<&CellValue> {
        self.rows.get(row)?.get(column)
    }
}
