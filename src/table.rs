//! In-memory tables consumed by the merge and rule engines.
//!
//! A [`Table`] is an ordered list of uniquely named columns plus row-major
//! cells; every row is exactly as wide as the header. Tables handed to the
//! merge engine are only ever read. The rule engine clones its target before
//! editing it.

use std::borrow::Cow;
use std::fmt::Write as _;

use sha2::{Digest, Sha256};

use crate::{
    data::{Cell, Value, cell_to_string, normalize_cell},
    error::{Error, Result},
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Builds a table from ingested headers, trimming header names and
    /// rejecting duplicate names or ragged rows.
    pub fn new<S: AsRef<str>>(columns: Vec<S>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let columns = columns
            .iter()
            .map(|name| name.as_ref().trim().to_string())
            .collect::<Vec<_>>();
        Self::build(columns, rows)
    }

    fn build(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        for (idx, name) in columns.iter().enumerate() {
            if columns[..idx].contains(name) {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }
        let mut normalized = Vec::with_capacity(rows.len());
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::RaggedRow {
                    row: row_idx,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
            normalized.push(row.into_iter().map(normalize_cell).collect());
        }
        Ok(Self {
            columns,
            rows: normalized,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Assembles a table from `(name, values)` pairs. Names are kept exactly as
    /// given. Every column must hold the same number of values.
    pub fn from_columns(columns: Vec<(String, Vec<Cell>)>) -> Result<Self> {
        let row_count = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut names = Vec::with_capacity(columns.len());
        let mut rows: Vec<Vec<Cell>> = (0..row_count)
            .map(|_| Vec::with_capacity(columns.len()))
            .collect();
        for (name, values) in columns {
            if values.len() != row_count {
                return Err(Error::RaggedRow {
                    row: values.len().min(row_count),
                    expected: row_count,
                    found: values.len(),
                });
            }
            for (row, value) in rows.iter_mut().zip(values) {
                row.push(value);
            }
            names.push(name);
        }
        Self::build(names, rows)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|cells| Row {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(|(index, cells)| Row {
            index,
            columns: &self.columns,
            cells,
        })
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Cell> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|cells| &cells[col])
    }

    /// Replaces one cell and returns the previous value. Out-of-range
    /// coordinates leave the table untouched.
    pub fn set_cell(&mut self, row: usize, column: usize, value: Cell) -> Option<Cell> {
        let slot = self.rows.get_mut(row)?.get_mut(column)?;
        Some(std::mem::replace(slot, normalize_cell(value)))
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().filter_map(move |row| row.get(column))
    }

    pub fn head(&self, rows: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(rows).cloned().collect(),
        }
    }

    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect()
    }

    /// SHA-256 over the header and every typed cell. Two tables share a
    /// fingerprint only if names, order, types and values all agree.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
            hasher.update([0x1f]);
        }
        hasher.update([0x1e]);
        for row in &self.rows {
            for cell in row {
                let (tag, text) = match cell {
                    None => ("n", String::new()),
                    Some(Value::Boolean(b)) => ("b", b.to_string()),
                    Some(Value::Integer(i)) => ("i", i.to_string()),
                    Some(Value::Number(n)) => ("f", format!("{:016x}", n.to_bits())),
                    Some(Value::String(s)) => ("s", s.clone()),
                };
                hasher.update(tag.as_bytes());
                hasher.update(text.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Borrowed view of one row, resolving cells by column name.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    index: usize,
    columns: &'a [String],
    cells: &'a [Cell],
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &'a [Cell] {
        self.cells
    }

    /// `None` when the column does not exist; `Some(&None)` for a null cell.
    pub fn get(&self, column: &str) -> Option<&'a Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.cells.get(idx)
    }

    /// Exact lookup first, then a whitespace-trimmed comparison of names.
    pub fn get_lenient(&self, column: &str) -> Option<&'a Cell> {
        self.get(column).or_else(|| {
            let wanted = column.trim();
            let idx = self.columns.iter().position(|c| c.trim() == wanted)?;
            self.cells.get(idx)
        })
    }
}

/// Input tables keyed by file id, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    entries: Vec<(String, Table)>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the table for `file_id`. Replacing keeps the original
    /// position.
    pub fn insert(&mut self, file_id: impl Into<String>, table: Table) {
        let file_id = file_id.into();
        match self.entries.iter_mut().find(|(id, _)| *id == file_id) {
            Some(entry) => entry.1 = table,
            None => self.entries.push((file_id, table)),
        }
    }

    pub fn get(&self, file_id: &str) -> Option<&Table> {
        self.entries
            .iter()
            .find(|(id, _)| id == file_id)
            .map(|(_, table)| table)
    }

    pub fn contains(&self, file_id: &str) -> bool {
        self.get(file_id).is_some()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.entries.iter().map(|(id, table)| (id.as_str(), table))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Table)> for TableSet {
    fn from_iter<I: IntoIterator<Item = (S, Table)>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for (id, table) in iter {
            set.insert(id, table);
        }
        set
    }
}

/// Renders an elastic, two-space separated text table.
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(headers, &widths));
    let rule_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<_>>();
    let rules = rule_widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_line(&rules, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_line(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let clean = strip_control(value);
            let pad = width.saturating_sub(display_width(&clean));
            format!("{clean}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end_matches(' ').to_string()
}

// ANSI colour sequences occupy no columns on screen.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            chars.by_ref().find(|c| *c == 'm');
        } else {
            width += 1;
        }
    }
    width
}

fn strip_control(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
