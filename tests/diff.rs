mod common;

use common::{int, num, table, text};
use proptest::prelude::*;
use sheet_workflow::{
    Table, Value, build_diff, compare_tables,
    diff::{CellChange, ChangeType},
};

#[test]
fn compare_reports_one_side_nulls_as_modified() {
    let original = table(&["id", "qty", "note"], &[&["A", "1", ""], &["B", "2", "x"]]);
    let modified = table(&["id", "qty", "note"], &[&["A", "1", "new"], &["B", "", "x"]]);
    let changes = compare_tables(&original, &modified, "id");
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0].column, "note");
    assert_eq!(changes[0].old_value, None);
    assert_eq!(changes[0].new_value, text("new"));
    assert_eq!(changes[1].key_value, "B");
    assert_eq!(changes[1].old_value, int(2));
    assert_eq!(changes[1].new_value, None);
    assert!(changes.iter().all(|c| c.change_type == ChangeType::Modified));
}

#[test]
fn compare_stops_at_the_shorter_table() {
    let original = table(&["id", "qty"], &[&["A", "1"], &["B", "2"], &["C", "3"]]);
    let modified = table(&["id", "qty"], &[&["A", "9"]]);
    let changes = compare_tables(&original, &modified, "id");
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].row, 0);
}

#[test]
fn compare_output_feeds_build_diff() {
    let original = table(&["id", "qty"], &[&["A", "1"], &["B", "2"]]);
    let modified = table(&["id", "qty"], &[&["A", "-1"], &["B", "2"]]);
    let changes = compare_tables(&original, &modified, "id");
    let diff = build_diff(&original, &modified, &changes, None);
    assert_eq!(diff.key_column, "id");
    assert_eq!(diff.summary.rows_affected, 1);
    assert_eq!(diff.warnings.len(), 1);
    assert_eq!(diff.warnings[0].row, 0);
    assert_eq!(diff.warnings[0].column, "qty");
}

#[test]
fn last_negative_column_names_the_row_warning() {
    let original = table(&["id", "a", "b"], &[&["A", "1", "1"]]);
    let change = |column: &str| CellChange {
        row: 0,
        column: column.into(),
        key_value: "A".into(),
        old_value: num(1.0),
        new_value: num(-1.0),
        change_type: ChangeType::Modified,
        step_id: None,
        step_name: None,
    };
    let diff = build_diff(&original, &original, &[change("a"), change("b")], Some("id"));
    assert_eq!(diff.summary.warnings, 2);
    assert_eq!(
        diff.changes[0].warning_message.as_deref(),
        Some("Value became negative in column 'b'")
    );
}

#[test]
fn diff_json_uses_wire_names() {
    let original = table(&["id", "qty"], &[&["A", "1"]]);
    let modified = table(&["id", "qty"], &[&["A", "-3"]]);
    let changes = compare_tables(&original, &modified, "id");
    let diff = build_diff(&original, &modified, &changes, Some("id"));
    let json = serde_json::to_value(&diff).expect("encode");
    assert_eq!(json["summary"]["rowsAffected"], 1);
    assert_eq!(json["summary"]["errors"], 0);
    assert_eq!(json["changes"][0]["hasWarning"], true);
    assert_eq!(json["changes"][0]["cells"][0]["newValue"], -3);
    assert_eq!(json["warnings"][0]["type"], "negative_value");
    assert_eq!(json["keyColumn"], "id");
}

fn arbitrary_cell() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        any::<bool>().prop_map(|b| Some(Value::Boolean(b))),
        (-1000i32..1000).prop_map(|n| Some(Value::Number(f64::from(n) / 4.0))),
        "[a-z]{0,4}".prop_map(|s| Some(Value::String(s))),
    ]
}

proptest! {
    #[test]
    fn table_compared_with_itself_has_no_changes(
        rows in prop::collection::vec(prop::collection::vec(arbitrary_cell(), 3), 0..10)
    ) {
        let table = Table::new(vec!["id", "a", "b"], rows).expect("table");
        prop_assert!(compare_tables(&table, &table, "id").is_empty());
        prop_assert!(compare_tables(&table, &table.clone(), "missing").is_empty());
    }
}
