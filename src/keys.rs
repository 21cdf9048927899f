//! Key resolution for the merge engine.
//!
//! [`resolve_join()`] decides which key values seed output rows, and
//! [`RowResolver`] finds, for one key, the matching row in every input file.
//!
//! Ordering is deterministic for every join type:
//!
//! - `left` / `right`: first-seen order of the seeding file
//! - `inner`: first-seen order of the first keyed file, filtered to keys that
//!   every other keyed file also has
//! - `full`: first-seen order across keyed files, taken file by file
//!
//! "File order" is the workflow's configured file list, followed by any
//! supplied tables the workflow does not list, in the order they were supplied.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{
    data::{Cell, cell_to_string},
    table::{Row, Table, TableSet},
    workflow::{FileDescriptor, JoinSpec, JoinType, KeyColumnMapping},
};

/// Unmatched keys kept per file for the summary warning.
pub const UNMATCHED_SAMPLE_LIMIT: usize = 10;
/// Keys quoted in a warning before "(and N more...)".
pub const WARNING_SAMPLE_LIMIT: usize = 5;

/// A cell is a usable key when it is non-null and non-blank once trimmed.
pub fn clean_key(cell: &Cell) -> Option<String> {
    let text = cell_to_string(cell);
    let trimmed = text.trim();
    if cell.is_none() || trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyUniverse {
    /// Distinct cleaned key values, one output row each.
    Keys(Vec<String>),
    /// No key mapping configured: output row `i` pairs row `i` of every file.
    Positional(usize),
}

impl KeyUniverse {
    pub fn len(&self) -> usize {
        match self {
            KeyUniverse::Keys(keys) => keys.len(),
            KeyUniverse::Positional(rows) => *rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Key value per output row; the offset in positional mode.
    pub fn labels(&self) -> Vec<String> {
        match self {
            KeyUniverse::Keys(keys) => keys.clone(),
            KeyUniverse::Positional(rows) => (0..*rows).map(|i| i.to_string()).collect(),
        }
    }

    pub fn key_at(&self, position: usize) -> Option<&str> {
        match self {
            KeyUniverse::Keys(keys) => keys.get(position).map(String::as_str),
            KeyUniverse::Positional(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JoinResolution {
    /// `None` when the join could not be resolved at all; the merge then
    /// returns an empty table.
    pub universe: Option<KeyUniverse>,
    pub warnings: Vec<String>,
}

impl JoinResolution {
    fn aborted(mut warnings: Vec<String>, reason: String) -> Self {
        warnings.push(reason);
        Self {
            universe: None,
            warnings,
        }
    }
}

/// Input files in resolution order, paired with their tables.
pub fn ordered_files<'a>(
    tables: &'a TableSet,
    files: &'a [FileDescriptor],
) -> Vec<(&'a str, &'a Table)> {
    let mut ordered = Vec::with_capacity(tables.len());
    for file in files {
        if let Some(table) = tables.get(&file.id)
            && !ordered.iter().any(|(id, _)| *id == file.id.as_str())
        {
            ordered.push((file.id.as_str(), table));
        }
    }
    for (id, table) in tables.iter() {
        if !ordered.iter().any(|(seen, _)| *seen == id) {
            ordered.push((id, table));
        }
    }
    ordered
}

/// Display name for warnings; the id itself when the file is unknown or
/// unnamed.
pub(crate) fn file_label<'a>(files: &'a [FileDescriptor], file_id: &'a str) -> &'a str {
    files
        .iter()
        .find(|f| f.id == file_id)
        .map(|f| f.name.as_str())
        .filter(|name| !name.is_empty())
        .unwrap_or(file_id)
}

pub(crate) fn format_samples(samples: &[String], total: usize) -> String {
    let mut text = samples
        .iter()
        .take(WARNING_SAMPLE_LIMIT)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if total > WARNING_SAMPLE_LIMIT {
        text.push_str(&format!(" (and {} more...)", total - WARNING_SAMPLE_LIMIT));
    }
    text
}

/// Cleaned keys of one column in first-seen order, without duplicates.
fn distinct_keys(table: &Table, column: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    table
        .column_values(column)
        .filter_map(clean_key)
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Key column index for a file, or the reason it has none.
fn key_column(
    table: &Table,
    file_id: &str,
    label: &str,
    mapping: &KeyColumnMapping,
) -> Result<usize, String> {
    let Some(column) = mapping.column_for(file_id) else {
        return Err(format!(
            "No key column mapping for '{label}'; its rows are matched by position"
        ));
    };
    table.column_index(column).ok_or_else(|| {
        format!(
            "Key column '{column}' not found in '{label}'. Available: {:?}; its rows are matched by position",
            table.columns()
        )
    })
}

/// Resolves the ordered key universe for a merge.
///
/// Configuration gaps are reported as warnings. An unresolvable seeding file
/// aborts the resolution (`universe: None`).
pub fn resolve_join(
    tables: &TableSet,
    files: &[FileDescriptor],
    mapping: Option<&KeyColumnMapping>,
    join: &JoinSpec,
) -> JoinResolution {
    let ordered = ordered_files(tables, files);
    let mut warnings = Vec::new();
    for file in files {
        if !tables.contains(&file.id) {
            warnings.push(format!(
                "File '{}' is configured but was not supplied",
                file_label(files, &file.id)
            ));
        }
    }

    let Some(mapping) = mapping else {
        let rows = ordered.iter().map(|(_, t)| t.row_count()).max().unwrap_or(0);
        debug!("No key mapping configured; pairing {rows} row(s) by position");
        return JoinResolution {
            universe: Some(KeyUniverse::Positional(rows)),
            warnings,
        };
    };
    if mapping.mappings.is_empty() {
        return JoinResolution::aborted(warnings, "No key column mappings defined".to_string());
    }

    let mut keyed: Vec<(&str, &Table, usize)> = Vec::new();
    for (id, table) in &ordered {
        match key_column(table, id, file_label(files, id), mapping) {
            Ok(column) => keyed.push((*id, *table, column)),
            Err(reason) => warnings.push(reason),
        }
    }

    // Seeding files come from the configured list when there is one, even if
    // the table was not supplied; that case aborts below.
    let seed_order: Vec<&str> = if files.is_empty() {
        ordered.iter().map(|(id, _)| *id).collect()
    } else {
        files.iter().map(|f| f.id.as_str()).collect()
    };

    let join_type = match &join.join_type {
        JoinType::Unknown(tag) => {
            warnings.push(format!("Unknown join type '{tag}'; using a left join"));
            JoinType::Left
        }
        other => other.clone(),
    };

    let keys = match join_type {
        JoinType::Left | JoinType::Right | JoinType::Unknown(_) => {
            let seed = if join_type == JoinType::Right {
                seed_order.last().copied()
            } else {
                join.primary_file_id
                    .as_deref()
                    .filter(|id| !id.is_empty())
                    .or_else(|| seed_order.first().copied())
            };
            let Some(seed) = seed else {
                return JoinResolution::aborted(warnings, "No files available for merge".into());
            };
            let label = file_label(files, seed);
            if !tables.contains(seed) {
                return JoinResolution::aborted(
                    warnings,
                    format!("Primary file '{label}' not found in provided tables"),
                );
            }
            let Some((_, table, column)) = keyed.iter().find(|(id, _, _)| *id == seed) else {
                return JoinResolution::aborted(
                    warnings,
                    format!("No usable key column for primary file '{label}'"),
                );
            };
            distinct_keys(table, *column)
        }
        JoinType::Inner => {
            let Some(((_, first, first_col), rest)) = keyed.split_first() else {
                return JoinResolution::aborted(
                    warnings,
                    "No key column mapping resolves to a supplied table".into(),
                );
            };
            let others = rest
                .iter()
                .map(|(_, table, column)| {
                    distinct_keys(table, *column).into_iter().collect::<HashSet<_>>()
                })
                .collect::<Vec<_>>();
            distinct_keys(first, *first_col)
                .into_iter()
                .filter(|key| others.iter().all(|set| set.contains(key)))
                .collect()
        }
        JoinType::Full => {
            if keyed.is_empty() {
                return JoinResolution::aborted(
                    warnings,
                    "No key column mapping resolves to a supplied table".into(),
                );
            }
            let mut seen = HashSet::new();
            keyed
                .iter()
                .flat_map(|(_, table, column)| distinct_keys(table, *column))
                .filter(|key| seen.insert(key.clone()))
                .collect()
        }
    };

    let universe: HashSet<&str> = keys.iter().map(String::as_str).collect();
    for (id, table, column) in &keyed {
        let dropped = distinct_keys(table, *column)
            .into_iter()
            .filter(|key| !universe.contains(key.as_str()))
            .collect::<Vec<_>>();
        if !dropped.is_empty() {
            warnings.push(format!(
                "'{}' had {} key(s) not present in the output: {}",
                file_label(files, id),
                dropped.len(),
                format_samples(&dropped, dropped.len())
            ));
        }
    }

    debug!("Resolved {} key(s) for {:?} join", keys.len(), join_type);
    JoinResolution {
        universe: Some(KeyUniverse::Keys(keys)),
        warnings,
    }
}

/// Matched row per file for one output row; `None` means absent.
#[derive(Debug, Clone, Default)]
pub struct RowCorrespondence<'a> {
    rows: Vec<(&'a str, Option<Row<'a>>)>,
}

impl<'a> RowCorrespondence<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_id: &'a str, row: Option<Row<'a>>) {
        match self.rows.iter_mut().find(|(id, _)| *id == file_id) {
            Some(slot) => slot.1 = row,
            None => self.rows.push((file_id, row)),
        }
    }

    pub fn row(&self, file_id: &str) -> Option<Row<'a>> {
        self.rows
            .iter()
            .find(|(id, _)| *id == file_id)
            .and_then(|(_, row)| *row)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedKeys {
    pub file_id: String,
    pub count: usize,
    pub samples: Vec<String>,
}

enum Lookup {
    Keyed(HashMap<String, usize>),
    Positional,
}

struct FileRows<'a> {
    id: &'a str,
    table: &'a Table,
    lookup: Lookup,
    unmatched: usize,
    samples: Vec<String>,
}

/// Per-file key→row lookup, counting keys that find no row.
pub struct RowResolver<'a> {
    files: Vec<FileRows<'a>>,
}

impl<'a> RowResolver<'a> {
    pub fn new(
        tables: &'a TableSet,
        files: &'a [FileDescriptor],
        mapping: Option<&KeyColumnMapping>,
    ) -> Self {
        let files = ordered_files(tables, files)
            .into_iter()
            .map(|(id, table)| {
                let column = mapping
                    .and_then(|m| m.column_for(id))
                    .and_then(|column| table.column_index(column));
                let lookup = match column {
                    Some(column) => {
                        let mut positions = HashMap::new();
                        for (idx, cell) in table.column_values(column).enumerate() {
                            if let Some(key) = clean_key(cell) {
                                positions.entry(key).or_insert(idx);
                            }
                        }
                        Lookup::Keyed(positions)
                    }
                    None => Lookup::Positional,
                };
                FileRows {
                    id,
                    table,
                    lookup,
                    unmatched: 0,
                    samples: Vec::new(),
                }
            })
            .collect();
        Self { files }
    }

    /// Rows for output position `position`. `key` is `None` in positional
    /// mode, in which case every file is read by offset.
    pub fn correspondence(&mut self, position: usize, key: Option<&str>) -> RowCorrespondence<'a> {
        let mut correspondence = RowCorrespondence::new();
        for file in &mut self.files {
            let row = match (&file.lookup, key) {
                (Lookup::Keyed(positions), Some(key)) => {
                    let found = positions.get(key.trim()).and_then(|idx| file.table.row(*idx));
                    if found.is_none() {
                        file.unmatched += 1;
                        if file.samples.len() < UNMATCHED_SAMPLE_LIMIT {
                            file.samples.push(key.to_string());
                        }
                    }
                    found
                }
                _ => file.table.row(position),
            };
            correspondence.insert(file.id, row);
        }
        correspondence
    }

    pub fn unmatched(&self) -> Vec<UnmatchedKeys> {
        self.files
            .iter()
            .filter(|file| file.unmatched > 0)
            .map(|file| UnmatchedKeys {
                file_id: file.id.to_string(),
                count: file.unmatched,
                samples: file.samples.clone(),
            })
            .collect()
    }
}
