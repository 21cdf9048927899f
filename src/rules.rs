//! Conditional rule engine: patches a target table from a source table.
//!
//! Steps run in definition order. Each step selects source rows whose
//! conditions all hold, finds the target row sharing the key value and applies
//! the step's actions to it. Every action that actually changes a cell yields
//! one [`CellChange`]; actions compare against the value immediately before
//! them, so a cell touched twice can yield two changes.

use std::collections::HashMap;

use log::debug;

use crate::{
    data::{Cell, Value, cell_to_f64, cell_to_string, normalize_cell, values_equal},
    diff::{CellChange, ChangeType},
    error::{Error, Result},
    steps::{Action, ActionType, Condition, ConditionOperator, RuleWorkflow, WorkflowStep},
    table::{Row, Table},
};

/// Written by `flag` when the action carries no value of its own.
pub const FLAG_MARKER: &str = "FLAGGED";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    pub changes: Vec<CellChange>,
    /// The patched copy of the target; the caller's table is left untouched.
    pub table: Table,
}

pub struct RuleEngine<'w> {
    steps: &'w [WorkflowStep],
    key_column: &'w str,
}

impl<'w> RuleEngine<'w> {
    pub fn new(workflow: &'w RuleWorkflow) -> Self {
        Self {
            steps: &workflow.steps,
            key_column: &workflow.source_config.key_column,
        }
    }

    pub fn with_key_column(mut self, key_column: &'w str) -> Self {
        self.key_column = key_column;
        self
    }

    pub fn key_column(&self) -> &str {
        self.key_column
    }

    pub fn execute(&self, source: &Table, target: &Table) -> Result<RuleOutcome> {
        run_rules(source, target, self.steps, self.key_column)
    }
}

/// Target rows by stringified key, first occurrence wins. Null keys are not
/// indexed.
struct KeyIndex {
    column: usize,
    rows: HashMap<String, usize>,
}

impl KeyIndex {
    fn build(table: &Table, column: usize) -> Self {
        let mut rows = HashMap::new();
        for (idx, cell) in table.column_values(column).enumerate() {
            if let Some(value) = cell {
                rows.entry(value.as_display()).or_insert(idx);
            }
        }
        Self { column, rows }
    }

    fn find(&self, key: &str) -> Option<usize> {
        self.rows.get(key).copied()
    }
}

pub fn run_rules(
    source: &Table,
    target: &Table,
    steps: &[WorkflowStep],
    key_column: &str,
) -> Result<RuleOutcome> {
    let key_idx = target
        .column_index(key_column)
        .ok_or_else(|| Error::MissingKeyColumn {
            column: key_column.to_string(),
            available: target.columns().to_vec(),
        })?;
    if !source.has_column(key_column) {
        debug!("Source has no '{key_column}' column; no rows can match");
    }

    let mut table = target.clone();
    let mut index = KeyIndex::build(&table, key_idx);
    let mut changes = Vec::new();

    for step in steps {
        let matched = source
            .rows()
            .filter(|row| step.conditions.iter().all(|c| condition_holds(c, row)))
            .collect::<Vec<_>>();
        let before = changes.len();
        for row in &matched {
            let Some(Some(key)) = row.get(key_column) else {
                continue;
            };
            let key = key.as_display();
            let Some(target_row) = index.find(&key) else {
                continue;
            };
            for action in &step.actions {
                let Some(change) = apply_action(&mut table, target_row, action, row, &key, step)
                else {
                    continue;
                };
                if table.column_index(&change.column) == Some(index.column) {
                    index = KeyIndex::build(&table, key_idx);
                }
                changes.push(change);
            }
        }
        debug!(
            "Step '{}' matched {} source row(s), {} change(s)",
            step.name,
            matched.len(),
            changes.len() - before
        );
    }

    Ok(RuleOutcome { changes, table })
}

/// Evaluates one condition against a source row. A condition on a column the
/// source does not have is ignored.
pub fn condition_holds(condition: &Condition, row: &Row<'_>) -> bool {
    let Some(cell) = row.get(&condition.column) else {
        return true;
    };
    let text = cell_to_string(cell);
    let expected = condition
        .value
        .as_ref()
        .map(Value::as_display)
        .unwrap_or_default();
    let numeric = |cmp: fn(f64, f64) -> bool| {
        match (cell_to_f64(cell), condition.value.as_ref().and_then(Value::as_f64)) {
            (Some(lhs), Some(rhs)) => cmp(lhs, rhs),
            _ => false,
        }
    };

    match &condition.operator {
        ConditionOperator::Equals => text == expected,
        ConditionOperator::NotEquals => text != expected,
        ConditionOperator::Contains => text.to_lowercase().contains(&expected.to_lowercase()),
        ConditionOperator::NotContains => !text.to_lowercase().contains(&expected.to_lowercase()),
        ConditionOperator::StartsWith => text.starts_with(&expected),
        ConditionOperator::EndsWith => text.ends_with(&expected),
        ConditionOperator::Exists => cell.is_some() && !text.is_empty(),
        ConditionOperator::IsEmpty => cell.is_none() || text.is_empty(),
        ConditionOperator::GreaterThan => numeric(|a, b| a > b),
        ConditionOperator::LessThan => numeric(|a, b| a < b),
        ConditionOperator::GreaterThanOrEqual => numeric(|a, b| a >= b),
        ConditionOperator::LessThanOrEqual => numeric(|a, b| a <= b),
        ConditionOperator::Unknown(_) => true,
    }
}

/// Adds or subtracts a delta as floats. Null counts as zero on either side; a
/// base or delta that is not numeric leaves the cell as it was.
fn shift(old: &Cell, action: &Action, source: &Row<'_>, sign: f64) -> Cell {
    let base = match old {
        None => Some(0.0),
        Some(value) => value.as_f64(),
    };
    let from_source = action
        .source_column
        .as_deref()
        .filter(|column| !column.is_empty())
        .and_then(|column| source.get(column));
    let delta = match (from_source, &action.value) {
        (Some(None), _) | (None, None) => Some(0.0),
        (Some(Some(value)), _) | (None, Some(value)) => value.as_f64(),
    };
    match (base, delta) {
        (Some(base), Some(delta)) => Some(Value::Number(base + sign * delta)),
        _ => old.clone(),
    }
}

fn next_value(old: &Cell, action: &Action, source: &Row<'_>) -> Cell {
    match &action.action_type {
        ActionType::SetValue => action.value.clone(),
        ActionType::Increment => shift(old, action, source, 1.0),
        ActionType::Decrement => shift(old, action, source, -1.0),
        ActionType::CopyFrom => action
            .source_column
            .as_deref()
            .and_then(|column| source.get(column))
            .cloned()
            .unwrap_or_else(|| old.clone()),
        ActionType::Clear => None,
        ActionType::Flag => Some(
            action
                .value
                .clone()
                .unwrap_or_else(|| Value::from(FLAG_MARKER)),
        ),
        ActionType::Unknown(_) => old.clone(),
    }
}

fn apply_action(
    table: &mut Table,
    row: usize,
    action: &Action,
    source: &Row<'_>,
    key: &str,
    step: &WorkflowStep,
) -> Option<CellChange> {
    let column = table.column_index(&action.target_column)?;
    let old_value = table.row(row)?.cells().get(column)?.clone();
    let new_value = normalize_cell(next_value(&old_value, action, source));
    if values_equal(&old_value, &new_value) {
        return None;
    }
    table.set_cell(row, column, new_value.clone())?;
    Some(CellChange {
        row,
        column: action.target_column.clone(),
        key_value: key.to_string(),
        old_value,
        new_value,
        change_type: ChangeType::Modified,
        step_id: Some(step.id.clone()),
        step_name: Some(step.name.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(value: &str) -> Cell {
        Some(Value::from(value))
    }

    fn n(value: f64) -> Cell {
        Some(Value::from(value))
    }

    fn sales() -> Table {
        Table::new(
            vec!["sku", "qty", "channel"],
            vec![
                vec![s("A"), n(3.0), s("Online")],
                vec![s("B"), n(0.0), s("store")],
                vec![None, n(9.0), s("online")],
            ],
        )
        .expect("table")
    }

    fn inventory() -> Table {
        Table::new(
            vec!["sku", "stock", "status"],
            vec![
                vec![s("A"), n(10.0), s("ok")],
                vec![s("B"), n(1.0), None],
            ],
        )
        .expect("table")
    }

    fn row_of(table: &Table, idx: usize) -> Row<'_> {
        table.row(idx).expect("row")
    }

    #[test]
    fn decrement_uses_source_column() {
        let step = WorkflowStep::new("s1", "Deduct")
            .when(Condition::new(
                "qty",
                ConditionOperator::GreaterThan,
                Some(Value::from(0.0)),
            ))
            .then(Action::new(ActionType::Decrement, "stock").with_source("qty"));
        let target = inventory();
        let outcome = run_rules(&sales(), &target, &[step], "sku").expect("rules");
        assert_eq!(outcome.changes.len(), 1);
        let change = &outcome.changes[0];
        assert_eq!(change.key_value, "A");
        assert_eq!(change.old_value, n(10.0));
        assert_eq!(change.new_value, n(7.0));
        assert_eq!(change.step_id.as_deref(), Some("s1"));
        assert_eq!(outcome.table.cell(0, "stock"), Some(&n(7.0)));
        assert_eq!(target.cell(0, "stock"), Some(&n(10.0)));
    }

    #[test]
    fn unchanged_values_produce_no_change() {
        let step = WorkflowStep::new("s1", "Mark")
            .then(Action::new(ActionType::SetValue, "status").with_value("ok"));
        let outcome = run_rules(&sales(), &inventory(), &[step], "sku").expect("rules");
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(outcome.changes[0].key_value, "B");
        assert_eq!(outcome.changes[0].old_value, None);
    }

    #[test]
    fn successive_actions_each_record_a_change() {
        let step = WorkflowStep::new("s1", "Twice")
            .when(Condition::new("sku", ConditionOperator::Equals, Some(Value::from("A"))))
            .then(Action::new(ActionType::Increment, "stock").with_value(1.0))
            .then(Action::new(ActionType::Increment, "stock").with_value(2.0));
        let outcome = run_rules(&sales(), &inventory(), &[step], "sku").expect("rules");
        let news = outcome
            .changes
            .iter()
            .map(|c| c.new_value.clone())
            .collect::<Vec<_>>();
        assert_eq!(news, vec![n(11.0), n(13.0)]);
    }

    #[test]
    fn missing_target_key_column_is_an_error() {
        let err = run_rules(&sales(), &inventory(), &[], "code").unwrap_err();
        assert!(matches!(err, Error::MissingKeyColumn { column, .. } if column == "code"));
    }

    #[test]
    fn flag_and_clear() {
        let step = WorkflowStep::new("s1", "Flag")
            .when(Condition::new(
                "channel",
                ConditionOperator::Contains,
                Some(Value::from("ONLINE")),
            ))
            .then(Action::new(ActionType::Flag, "status"))
            .then(Action::new(ActionType::Clear, "stock"));
        let outcome = run_rules(&sales(), &inventory(), &[step], "sku").expect("rules");
        assert_eq!(outcome.table.cell(0, "status"), Some(&s(FLAG_MARKER)));
        assert_eq!(outcome.table.cell(0, "stock"), Some(&None));
        assert_eq!(outcome.table.cell(1, "status"), Some(&None));
    }

    #[test]
    fn non_numeric_base_is_left_alone() {
        let target = Table::new(vec!["sku", "stock"], vec![vec![s("A"), s("n/a")]]).expect("table");
        let step = WorkflowStep::new("s1", "Inc")
            .then(Action::new(ActionType::Increment, "stock").with_value(1.0));
        let outcome = run_rules(&sales(), &target, &[step], "sku").expect("rules");
        assert!(outcome.changes.is_empty());
    }

    #[test]
    fn operators_follow_string_and_numeric_rules() {
        let table = sales();
        let first = row_of(&table, 0);
        let cond = |column: &str, op, value: Option<Value>| {
            condition_holds(&Condition::new(column, op, value), &first)
        };
        assert!(cond("channel", ConditionOperator::StartsWith, Some("On".into())));
        assert!(!cond("channel", ConditionOperator::StartsWith, Some("on".into())));
        assert!(cond("channel", ConditionOperator::EndsWith, Some("line".into())));
        assert!(cond("channel", ConditionOperator::NotContains, Some("store".into())));
        assert!(cond("qty", ConditionOperator::GreaterThanOrEqual, Some(3.0.into())));
        assert!(!cond("qty", ConditionOperator::LessThan, Some("abc".into())));
        assert!(!cond("channel", ConditionOperator::GreaterThan, Some(1.0.into())));
        assert!(cond("qty", ConditionOperator::Unknown("regex".into()), None));
        assert!(cond("ghost", ConditionOperator::Equals, Some("x".into())));
        assert!(cond("qty", ConditionOperator::Exists, None));

        let third = row_of(&table, 2);
        assert!(condition_holds(
            &Condition::new("sku", ConditionOperator::IsEmpty, None),
            &third
        ));
    }

    #[test]
    fn rule_engine_reads_key_from_workflow() {
        let workflow = RuleWorkflow {
            source_config: crate::steps::SourceConfig {
                key_column: "sku".into(),
            },
            steps: vec![
                WorkflowStep::new("s1", "Copy")
                    .then(Action::new(ActionType::CopyFrom, "status").with_source("channel")),
            ],
            ..RuleWorkflow::default()
        };
        let outcome = RuleEngine::new(&workflow)
            .execute(&sales(), &inventory())
            .expect("rules");
        assert_eq!(outcome.table.cell(0, "status"), Some(&s("Online")));
        assert_eq!(outcome.table.cell(1, "status"), Some(&s("store")));
    }
}
