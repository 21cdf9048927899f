//! Merge/join engine: turns N input tables into one output table.
//!
//! Output rows follow the key universe from [`crate::keys::resolve_join()`];
//! output columns follow ascending `order` (ties keep definition order). The
//! engine never fails on data quality: unmatched keys, missing columns and
//! math errors become warnings next to a best-effort table. Only inputs it
//! cannot interpret at all (no tables, duplicate output names) are errors.

use itertools::Itertools;
use log::debug;

use crate::{
    data::Cell,
    error::{Error, Result},
    evaluate::evaluate_column,
    keys::{RowResolver, file_label, format_samples, resolve_join},
    table::{Table, TableSet},
    workflow::{
        ColumnRef, ColumnSource, ConcatPart, FileDescriptor, JoinSpec, KeyColumnMapping,
        MathOperand, MathOperation, MergeWorkflow, OutputColumn,
    },
};

pub const NO_OUTPUT_COLUMNS: &str = "No output columns defined";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub table: Table,
    pub warnings: Vec<String>,
    /// Key value (or row offset when matching by position) per output row.
    pub row_keys: Vec<String>,
}

impl MergeOutcome {
    fn empty(warnings: Vec<String>) -> Self {
        Self {
            table: Table::empty(),
            warnings,
            row_keys: Vec::new(),
        }
    }
}

pub struct MergeEngine<'w> {
    workflow: &'w MergeWorkflow,
}

impl<'w> MergeEngine<'w> {
    pub fn new(workflow: &'w MergeWorkflow) -> Self {
        Self { workflow }
    }

    pub fn execute(&self, tables: &TableSet) -> Result<MergeOutcome> {
        if tables.is_empty() {
            return Err(Error::NoInputFiles);
        }
        if self.workflow.output_columns.is_empty() {
            return Ok(MergeOutcome::empty(vec![NO_OUTPUT_COLUMNS.to_string()]));
        }

        let columns = self
            .workflow
            .output_columns
            .iter()
            .sorted_by_key(|column| column.order)
            .collect::<Vec<_>>();
        if let Some(duplicate) = columns.iter().map(|c| &c.name).duplicates().next() {
            return Err(Error::DuplicateOutputColumn(duplicate.clone()));
        }

        let files = &self.workflow.files;
        let mapping = self.workflow.key_column.as_ref();
        let join = self.workflow.join_config.clone().unwrap_or_default();

        let mut warnings = Vec::new();
        for column in &columns {
            warnings.extend(source_warnings(column, tables, files));
        }

        let resolution = resolve_join(tables, files, mapping, &join);
        warnings.extend(resolution.warnings);
        let Some(universe) = resolution.universe else {
            return Ok(MergeOutcome::empty(warnings));
        };
        debug!(
            "Merging {} table(s) into {} row(s) x {} column(s)",
            tables.len(),
            universe.len(),
            columns.len()
        );

        let mut resolver = RowResolver::new(tables, files, mapping);
        let mut values: Vec<Vec<Cell>> = columns
            .iter()
            .map(|_| Vec::with_capacity(universe.len()))
            .collect();
        let mut cell_warnings = Vec::new();
        for position in 0..universe.len() {
            let rows = resolver.correspondence(position, universe.key_at(position));
            for (column, output) in columns.iter().zip(values.iter_mut()) {
                output.push(evaluate_column(&column.source, &rows, &mut cell_warnings));
                for warning in cell_warnings.drain(..) {
                    warnings.push(format!(
                        "Column '{}', row {}: {warning}",
                        column.name,
                        position + 1
                    ));
                }
            }
        }

        let table = Table::from_columns(
            columns
                .iter()
                .map(|column| column.name.clone())
                .zip(values)
                .collect(),
        )?;

        for unmatched in resolver.unmatched() {
            warnings.push(format!(
                "'{}' had {} key(s) with no match: {}",
                file_label(files, &unmatched.file_id),
                unmatched.count,
                format_samples(&unmatched.samples, unmatched.count)
            ));
        }

        Ok(MergeOutcome {
            table,
            warnings,
            row_keys: universe.labels(),
        })
    }

    /// Full merge truncated to `max_rows`.
    pub fn preview(&self, tables: &TableSet, max_rows: usize) -> Result<MergeOutcome> {
        let mut outcome = self.execute(tables)?;
        if outcome.table.row_count() > max_rows {
            outcome.table = outcome.table.head(max_rows);
            outcome.row_keys.truncate(max_rows);
            outcome
                .warnings
                .push(format!("Preview limited to {max_rows} rows"));
        }
        Ok(outcome)
    }
}

/// Runs a merge without a stored workflow. Files are taken in the order the
/// tables were supplied, so a right join seeds from the last supplied table.
pub fn run_merge(
    tables: &TableSet,
    output_columns: &[OutputColumn],
    key_mapping: Option<&KeyColumnMapping>,
    join: Option<&JoinSpec>,
) -> Result<MergeOutcome> {
    let workflow = MergeWorkflow {
        files: tables
            .ids()
            .map(|id| FileDescriptor::new(id, id))
            .collect(),
        key_column: key_mapping.cloned(),
        join_config: join.cloned(),
        output_columns: output_columns.to_vec(),
        ..MergeWorkflow::default()
    };
    MergeEngine::new(&workflow).execute(tables)
}

/// One warning per reference the data cannot satisfy, raised once per column
/// rather than once per cell.
fn source_warnings(
    column: &OutputColumn,
    tables: &TableSet,
    files: &[FileDescriptor],
) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut check = |reference: &ColumnRef, lenient: bool| {
        if reference.file_id.is_empty() || reference.column.is_empty() {
            warnings.push(format!(
                "Column '{}' has an incomplete column reference",
                column.name
            ));
            return;
        }
        let Some(table) = tables.get(&reference.file_id) else {
            warnings.push(format!(
                "Column '{}' references file '{}' which was not supplied",
                column.name,
                file_label(files, &reference.file_id)
            ));
            return;
        };
        let found = table.has_column(&reference.column)
            || (lenient
                && table
                    .columns()
                    .iter()
                    .any(|c| c.trim() == reference.column.trim()));
        if !found {
            warnings.push(format!(
                "Column '{}' references missing column '{}' in '{}'",
                column.name,
                reference.column,
                file_label(files, &reference.file_id)
            ));
        }
    };

    match &column.source {
        ColumnSource::Direct(reference) => check(reference, false),
        ColumnSource::Concat { parts, .. } => {
            for part in parts {
                if let ConcatPart::Column(reference) = part {
                    check(reference, false);
                }
            }
        }
        ColumnSource::Math {
            operation,
            operands,
        } => {
            for operand in operands {
                if let MathOperand::Column(reference) = operand {
                    check(reference, true);
                }
            }
            if let MathOperation::Unknown(tag) = operation {
                warnings.push(format!(
                    "Column '{}' uses unknown math operation '{tag}'; its cells are empty",
                    column.name
                ));
            }
        }
        ColumnSource::Custom { .. } => {}
        ColumnSource::Unknown(tag) => warnings.push(format!(
            "Column '{}' has unknown source type '{tag}'; its cells are empty",
            column.name
        )),
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, workflow::JoinType};

    fn table(columns: &[&str], rows: Vec<Vec<Cell>>) -> Table {
        Table::new(columns.to_vec(), rows).expect("table")
    }

    fn s(value: &str) -> Cell {
        Some(Value::from(value))
    }

    fn n(value: f64) -> Cell {
        Some(Value::from(value))
    }

    fn inventory_and_sales() -> TableSet {
        TableSet::from_iter([
            (
                "inv",
                table(&["id", "qty"], vec![vec![s("A"), n(10.0)], vec![s("B"), n(5.0)]]),
            ),
            (
                "sales",
                table(&["id", "sold"], vec![vec![s("A"), n(12.0)], vec![s("C"), n(1.0)]]),
            ),
        ])
    }

    fn remaining_workflow() -> MergeWorkflow {
        MergeWorkflow {
            name: "Remaining stock".into(),
            files: vec![
                FileDescriptor::new("inv", "Inventory"),
                FileDescriptor::new("sales", "Sales"),
            ],
            key_column: Some(KeyColumnMapping::from_iter([("inv", "id"), ("sales", "id")])),
            join_config: Some(JoinSpec::new(JoinType::Left, Some("inv"))),
            output_columns: vec![
                OutputColumn::new(
                    "remaining",
                    2,
                    ColumnSource::Math {
                        operation: MathOperation::Subtract,
                        operands: vec![
                            MathOperand::Column(ColumnRef::new("inv", "qty")),
                            MathOperand::Column(ColumnRef::new("sales", "sold")),
                        ],
                    },
                ),
                OutputColumn::new("id", 1, ColumnSource::direct("inv", "id")),
            ],
            ..MergeWorkflow::default()
        }
    }

    #[test]
    fn left_join_subtracts_with_zero_fallback() {
        let outcome = MergeEngine::new(&remaining_workflow())
            .execute(&inventory_and_sales())
            .expect("merge");
        assert_eq!(outcome.table.columns(), &["id".to_string(), "remaining".to_string()]);
        assert_eq!(outcome.table.display_rows(), vec![vec!["A", "-2"], vec!["B", "5"]]);
        assert_eq!(outcome.row_keys, vec!["A", "B"]);
        assert!(
            outcome
                .warnings
                .iter()
                .any(|w| w.starts_with("'Sales' had 1 key(s) with no match: B"))
        );
        assert!(
            outcome
                .warnings
                .iter()
                .any(|w| w.starts_with("'Sales'") && w.contains("C"))
        );
    }

    #[test]
    fn no_output_columns_is_a_warning() {
        let workflow = MergeWorkflow::default();
        let outcome = MergeEngine::new(&workflow)
            .execute(&inventory_and_sales())
            .expect("merge");
        assert!(outcome.table.columns().is_empty());
        assert_eq!(outcome.warnings, vec![NO_OUTPUT_COLUMNS]);
    }

    #[test]
    fn zero_tables_is_an_error() {
        let err = MergeEngine::new(&remaining_workflow())
            .execute(&TableSet::new())
            .unwrap_err();
        assert!(matches!(err, Error::NoInputFiles));
    }

    #[test]
    fn duplicate_output_names_are_rejected() {
        let mut workflow = remaining_workflow();
        workflow.output_columns[0].name = "id".into();
        let err = MergeEngine::new(&workflow)
            .execute(&inventory_and_sales())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateOutputColumn(name) if name == "id"));
    }

    #[test]
    fn positional_mode_pads_short_files() {
        let mut workflow = remaining_workflow();
        workflow.key_column = None;
        let mut tables = inventory_and_sales();
        tables.insert(
            "sales",
            table(&["id", "sold"], vec![vec![s("A"), n(1.0)]]),
        );
        let outcome = MergeEngine::new(&workflow).execute(&tables).expect("merge");
        assert_eq!(outcome.table.display_rows(), vec![vec!["A", "9"], vec!["B", "5"]]);
        assert_eq!(outcome.row_keys, vec!["0", "1"]);
    }

    #[test]
    fn missing_references_warn_once_per_column() {
        let mut workflow = remaining_workflow();
        workflow
            .output_columns
            .push(OutputColumn::new("ghost", 3, ColumnSource::direct("inv", "nope")));
        let outcome = MergeEngine::new(&workflow)
            .execute(&inventory_and_sales())
            .expect("merge");
        let hits = outcome
            .warnings
            .iter()
            .filter(|w| w.contains("missing column 'nope'"))
            .count();
        assert_eq!(hits, 1);
        assert_eq!(outcome.table.cell(0, "ghost"), Some(&None));
    }

    #[test]
    fn preview_truncates_and_says_so() {
        let outcome = MergeEngine::new(&remaining_workflow())
            .preview(&inventory_and_sales(), 1)
            .expect("preview");
        assert_eq!(outcome.table.row_count(), 1);
        assert_eq!(outcome.row_keys, vec!["A"]);
        assert_eq!(
            outcome.warnings.last().map(String::as_str),
            Some("Preview limited to 1 rows")
        );
    }

    #[test]
    fn run_merge_uses_supplied_order_for_right_join() {
        let tables = inventory_and_sales();
        let mapping = KeyColumnMapping::from_iter([("inv", "id"), ("sales", "id")]);
        let join = JoinSpec::new(JoinType::Right, None);
        let columns = vec![OutputColumn::new("id", 0, ColumnSource::direct("sales", "id"))];
        let outcome = run_merge(&tables, &columns, Some(&mapping), Some(&join)).expect("merge");
        assert_eq!(outcome.row_keys, vec!["A", "C"]);
    }
}
