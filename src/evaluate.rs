//! Per-cell evaluation of output column sources.
//!
//! Evaluation never fails. Missing rows, missing columns and non-numeric
//! operands degrade to null, `""` or `0.0` as each source kind prescribes;
//! division by zero yields null and pushes a warning.

use crate::{
    data::{Cell, Value, cell_to_f64, cell_to_string},
    keys::RowCorrespondence,
    workflow::{ColumnRef, ColumnSource, ConcatPart, MathOperand, MathOperation},
};

pub const DIVISION_BY_ZERO: &str = "Division by zero encountered";

pub fn evaluate_column(
    source: &ColumnSource,
    rows: &RowCorrespondence<'_>,
    warnings: &mut Vec<String>,
) -> Cell {
    match source {
        ColumnSource::Direct(column) => direct(column, rows),
        ColumnSource::Concat { parts, separator } => {
            Some(Value::String(concat(parts, separator, rows)))
        }
        ColumnSource::Math {
            operation,
            operands,
        } => math(operation, operands, rows, warnings),
        ColumnSource::Custom { default_value } => Some(Value::String(default_value.clone())),
        ColumnSource::Unknown(_) => None,
    }
}

fn lookup<'a>(column: &ColumnRef, rows: &RowCorrespondence<'a>) -> Option<&'a Cell> {
    if column.file_id.is_empty() || column.column.is_empty() {
        return None;
    }
    rows.row(&column.file_id)?.get(&column.column)
}

fn direct(column: &ColumnRef, rows: &RowCorrespondence<'_>) -> Cell {
    lookup(column, rows).cloned().flatten()
}

fn concat(parts: &[ConcatPart], separator: &str, rows: &RowCorrespondence<'_>) -> String {
    parts
        .iter()
        .map(|part| match part {
            ConcatPart::Literal(text) => text.clone(),
            ConcatPart::Column(column) => lookup(column, rows)
                .map(cell_to_string)
                .unwrap_or_default(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}

/// Column operands fall back to a trimmed column-name match and coerce
/// anything unreadable to `0.0`.
fn operand_value(column: &ColumnRef, rows: &RowCorrespondence<'_>) -> f64 {
    if column.file_id.is_empty() || column.column.is_empty() {
        return 0.0;
    }
    rows.row(&column.file_id)
        .and_then(|row| row.get_lenient(&column.column))
        .and_then(cell_to_f64)
        .unwrap_or(0.0)
}

fn math(
    operation: &MathOperation,
    operands: &[MathOperand],
    rows: &RowCorrespondence<'_>,
    warnings: &mut Vec<String>,
) -> Cell {
    let values = operands
        .iter()
        .filter_map(|operand| match operand {
            MathOperand::Literal(value) => *value,
            MathOperand::Column(column) => Some(operand_value(column, rows)),
        })
        .collect::<Vec<_>>();
    let (first, rest) = values.split_first()?;

    let result = match operation {
        MathOperation::Add => values.iter().sum(),
        MathOperation::Subtract => rest.iter().fold(*first, |acc, v| acc - v),
        MathOperation::Multiply => values.iter().product(),
        MathOperation::Divide => {
            let mut acc = *first;
            for divisor in rest {
                if *divisor == 0.0 {
                    warnings.push(DIVISION_BY_ZERO.to_string());
                    return None;
                }
                acc /= divisor;
            }
            acc
        }
        MathOperation::Unknown(_) => return None,
    };
    Some(Value::Number(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Table;

    fn inventory() -> Table {
        Table::new(
            vec!["id", "qty", "note", "label "],
            vec![vec![
                Some(Value::from("A")),
                Some(Value::from(10.0)),
                None,
                Some(Value::from("7")),
            ]],
        )
        .expect("table")
    }

    fn op(file: &str, column: &str) -> MathOperand {
        MathOperand::Column(ColumnRef::new(file, column))
    }

    #[test]
    fn direct_copies_and_nulls_missing() {
        let table = inventory();
        let mut rows = RowCorrespondence::new();
        rows.insert("inv", table.row(0));
        rows.insert("sales", None);
        let mut warnings = Vec::new();
        assert_eq!(
            evaluate_column(&ColumnSource::direct("inv", "qty"), &rows, &mut warnings),
            Some(Value::from(10.0))
        );
        assert_eq!(
            evaluate_column(&ColumnSource::direct("inv", "missing"), &rows, &mut warnings),
            None
        );
        assert_eq!(
            evaluate_column(&ColumnSource::direct("sales", "qty"), &rows, &mut warnings),
            None
        );
    }

    #[test]
    fn concat_renders_null_as_empty() {
        let table = inventory();
        let mut rows = RowCorrespondence::new();
        rows.insert("inv", table.row(0));
        let source = ColumnSource::Concat {
            parts: vec![
                ConcatPart::Column(ColumnRef::new("inv", "id")),
                ConcatPart::Column(ColumnRef::new("inv", "note")),
                ConcatPart::Literal("x".into()),
            ],
            separator: "|".into(),
        };
        let value = evaluate_column(&source, &rows, &mut Vec::new());
        assert_eq!(value, Some(Value::from("A||x")));
    }

    #[test]
    fn math_coerces_absent_operands_to_zero() {
        let table = inventory();
        let mut rows = RowCorrespondence::new();
        rows.insert("inv", table.row(0));
        rows.insert("sales", None);
        let source = ColumnSource::Math {
            operation: MathOperation::Subtract,
            operands: vec![op("inv", "qty"), op("sales", "sold"), op("inv", "id")],
        };
        assert_eq!(
            evaluate_column(&source, &rows, &mut Vec::new()),
            Some(Value::from(10.0))
        );
    }

    #[test]
    fn math_matches_trimmed_column_names() {
        let table = inventory();
        let mut rows = RowCorrespondence::new();
        rows.insert("inv", table.row(0));
        let source = ColumnSource::Math {
            operation: MathOperation::Add,
            operands: vec![op("inv", " label"), MathOperand::Literal(Some(1.0))],
        };
        assert_eq!(
            evaluate_column(&source, &rows, &mut Vec::new()),
            Some(Value::from(8.0))
        );
    }

    #[test]
    fn divide_by_zero_nulls_the_cell_and_warns() {
        let table = inventory();
        let mut rows = RowCorrespondence::new();
        rows.insert("inv", table.row(0));
        let source = ColumnSource::Math {
            operation: MathOperation::Divide,
            operands: vec![op("inv", "qty"), op("inv", "note")],
        };
        let mut warnings = Vec::new();
        assert_eq!(evaluate_column(&source, &rows, &mut warnings), None);
        assert_eq!(warnings, vec![DIVISION_BY_ZERO]);
    }

    #[test]
    fn multiply_and_unknown_operations() {
        let rows = RowCorrespondence::new();
        let literals = vec![MathOperand::Literal(Some(2.0)), MathOperand::Literal(Some(4.5))];
        let multiply = ColumnSource::Math {
            operation: MathOperation::Multiply,
            operands: literals.clone(),
        };
        assert_eq!(
            evaluate_column(&multiply, &rows, &mut Vec::new()),
            Some(Value::from(9.0))
        );
        let unknown = ColumnSource::Math {
            operation: MathOperation::Unknown("pow".into()),
            operands: literals,
        };
        assert_eq!(evaluate_column(&unknown, &rows, &mut Vec::new()), None);
        let empty = ColumnSource::Math {
            operation: MathOperation::Add,
            operands: vec![MathOperand::Literal(None)],
        };
        assert_eq!(evaluate_column(&empty, &rows, &mut Vec::new()), None);
    }

    #[test]
    fn custom_ignores_rows() {
        let rows = RowCorrespondence::new();
        assert_eq!(
            evaluate_column(&ColumnSource::custom("fixed"), &rows, &mut Vec::new()),
            Some(Value::from("fixed"))
        );
        assert_eq!(
            evaluate_column(&ColumnSource::Unknown("lookup".into()), &rows, &mut Vec::new()),
            None
        );
    }
}
