//! Cell-level diffs between an original and a modified table.
//!
//! [`build_diff()`] groups rule-engine changes by row and annotates them;
//! [`compare_tables()`] derives changes directly from two tables by row
//! position when no change log exists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Cell, Value, cell_to_string, values_equal},
    table::Table,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    #[default]
    Modified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellChange {
    pub row: usize,
    pub column: String,
    pub key_value: String,
    pub old_value: Cell,
    pub new_value: Cell,
    #[serde(default)]
    pub change_type: ChangeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowChange {
    pub row_index: usize,
    pub key_value: String,
    pub cells: Vec<CellChange>,
    pub has_warning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    NegativeValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub message: String,
    pub row: usize,
    pub column: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub rows_affected: usize,
    pub cells_modified: usize,
    pub total_rows: usize,
    pub warnings: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub summary: DiffSummary,
    pub changes: Vec<RowChange>,
    pub warnings: Vec<DiffWarning>,
    pub columns: Vec<String>,
    pub key_column: String,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn is_negative(cell: &Cell) -> bool {
    cell.as_ref()
        .and_then(Value::as_f64)
        .is_some_and(|n| n < 0.0)
}

/// Groups `changes` by ascending row index and flags rows whose new values
/// went negative.
///
/// When `key_column` is not given and there are changes, the first column of
/// `original` is reported as the key column.
pub fn build_diff(
    original: &Table,
    modified: &Table,
    changes: &[CellChange],
    key_column: Option<&str>,
) -> DiffResult {
    let key_column = match key_column.filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None if !changes.is_empty() => original.columns().first().cloned().unwrap_or_default(),
        None => String::new(),
    };

    let mut by_row: BTreeMap<usize, Vec<CellChange>> = BTreeMap::new();
    for change in changes {
        by_row.entry(change.row).or_default().push(change.clone());
    }

    let mut warnings = Vec::new();
    let rows = by_row
        .into_iter()
        .map(|(row_index, cells)| {
            let mut warning_message = None;
            for cell in cells.iter().filter(|cell| is_negative(&cell.new_value)) {
                let message = format!("Value became negative in column '{}'", cell.column);
                warnings.push(DiffWarning {
                    kind: WarningKind::NegativeValue,
                    message: message.clone(),
                    row: row_index,
                    column: cell.column.clone(),
                });
                warning_message = Some(message);
            }
            RowChange {
                row_index,
                key_value: cells
                    .first()
                    .map(|cell| cell.key_value.clone())
                    .unwrap_or_default(),
                has_warning: warning_message.is_some(),
                warning_message,
                cells,
            }
        })
        .collect::<Vec<_>>();

    DiffResult {
        summary: DiffSummary {
            rows_affected: rows.len(),
            cells_modified: changes.len(),
            total_rows: modified.row_count(),
            warnings: warnings.len(),
            errors: 0,
        },
        changes: rows,
        warnings,
        columns: original.columns().to_vec(),
        key_column,
    }
}

/// Position-by-position comparison of two tables. Rows beyond the shorter
/// table and columns absent from `modified` are not compared.
pub fn compare_tables(original: &Table, modified: &Table, key_column: &str) -> Vec<CellChange> {
    let shared = original
        .columns()
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| modified.column_index(name).map(|m| (idx, m, name)))
        .collect::<Vec<_>>();

    let mut changes = Vec::new();
    for (old_row, new_row) in original.rows().zip(modified.rows()) {
        let key_value = old_row
            .get(key_column)
            .map(cell_to_string)
            .unwrap_or_else(|| old_row.index().to_string());
        for (old_idx, new_idx, name) in &shared {
            let old_value = &old_row.cells()[*old_idx];
            let new_value = &new_row.cells()[*new_idx];
            if values_equal(old_value, new_value) {
                continue;
            }
            changes.push(CellChange {
                row: old_row.index(),
                column: (*name).clone(),
                key_value: key_value.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
                change_type: ChangeType::Modified,
                step_id: None,
                step_name: None,
            });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(values: &[(&str, f64)]) -> Table {
        Table::new(
            vec!["sku", "stock"],
            values
                .iter()
                .map(|(sku, n)| vec![Some(Value::from(*sku)), Some(Value::from(*n))])
                .collect(),
        )
        .expect("table")
    }

    fn change(row: usize, column: &str, old: f64, new: f64) -> CellChange {
        CellChange {
            row,
            column: column.into(),
            key_value: format!("k{row}"),
            old_value: Some(Value::from(old)),
            new_value: Some(Value::from(new)),
            change_type: ChangeType::Modified,
            step_id: Some("s1".into()),
            step_name: Some("Deduct".into()),
        }
    }

    #[test]
    fn groups_changes_by_ascending_row() {
        let table = stock(&[("a", 1.0), ("b", 2.0), ("c", 3.0)]);
        let changes = vec![
            change(2, "stock", 3.0, 1.0),
            change(0, "stock", 1.0, 0.0),
            change(2, "stock", 1.0, 0.5),
        ];
        let diff = build_diff(&table, &table, &changes, Some("sku"));
        assert_eq!(diff.changes.len(), 2);
        assert_eq!(diff.changes[0].row_index, 0);
        assert_eq!(diff.changes[1].row_index, 2);
        assert_eq!(diff.changes[1].cells.len(), 2);
        assert_eq!(diff.changes[1].key_value, "k2");
        assert_eq!(
            diff.summary,
            DiffSummary {
                rows_affected: 2,
                cells_modified: 3,
                total_rows: 3,
                warnings: 0,
                errors: 0,
            }
        );
    }

    #[test]
    fn negative_values_flag_the_row() {
        let table = stock(&[("a", 1.0)]);
        let diff = build_diff(&table, &table, &[change(0, "stock", 1.0, -4.0)], None);
        assert_eq!(diff.summary.warnings, 1);
        assert!(diff.changes[0].has_warning);
        assert_eq!(
            diff.changes[0].warning_message.as_deref(),
            Some("Value became negative in column 'stock'")
        );
        assert_eq!(diff.key_column, "sku");
    }

    #[test]
    fn key_column_stays_empty_without_changes() {
        let table = stock(&[("a", 1.0)]);
        let diff = build_diff(&table, &table, &[], None);
        assert!(diff.is_empty());
        assert_eq!(diff.key_column, "");
    }

    #[test]
    fn compare_preserves_nulls_and_skips_missing_columns() {
        let original = Table::new(
            vec!["sku", "stock", "note"],
            vec![vec![Some(Value::from("a")), None, Some(Value::from("x"))]],
        )
        .expect("table");
        let modified = Table::new(
            vec!["sku", "stock"],
            vec![vec![Some(Value::from("a")), Some(Value::from(3.0))]],
        )
        .expect("table");
        let changes = compare_tables(&original, &modified, "sku");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].column, "stock");
        assert_eq!(changes[0].key_value, "a");
        assert_eq!(changes[0].old_value, None);
        assert_eq!(changes[0].new_value, Some(Value::from(3.0)));
    }

    #[test]
    fn compare_falls_back_to_row_index_key() {
        let original = stock(&[("a", 1.0), ("b", 2.0)]);
        let modified = stock(&[("a", 1.0), ("b", 5.0)]);
        let changes = compare_tables(&original, &modified, "missing");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key_value, "1");
    }

    #[test]
    fn serializes_with_camel_case_tags() {
        let json = serde_json::to_value(change(0, "stock", 1.0, 2.0)).expect("encode");
        assert_eq!(json["changeType"], "modified");
        assert_eq!(json["keyValue"], "k0");
        assert_eq!(json["oldValue"], 1.0);
        let warning = DiffWarning {
            kind: WarningKind::NegativeValue,
            message: "m".into(),
            row: 0,
            column: "c".into(),
        };
        assert_eq!(serde_json::to_value(warning).expect("encode")["type"], "negative_value");
    }
}
