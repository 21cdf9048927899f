//! Column profiles of a loaded table: inferred kind, sample values and
//! null/distinct counts. Used by `inspect` to help authors pick key columns.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, cell_to_string},
    table::Table,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Text,
    Number,
    Integer,
    Boolean,
    Empty,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Number => "number",
            ColumnKind::Integer => "integer",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    pub name: String,
    pub kind: ColumnKind,
    pub sample_values: Vec<Value>,
    pub null_count: usize,
    pub unique_count: usize,
}

#[derive(Debug, Clone)]
struct KindCandidate {
    seen: bool,
    possible_boolean: bool,
    possible_integer: bool,
    possible_number: bool,
}

impl KindCandidate {
    fn new() -> Self {
        Self {
            seen: false,
            possible_boolean: true,
            possible_integer: true,
            possible_number: true,
        }
    }

    fn observe(&mut self, value: &Value) {
        self.seen = true;
        match value {
            Value::Boolean(_) => {
                self.possible_integer = false;
                self.possible_number = false;
            }
            Value::Integer(_) => self.possible_boolean = false,
            Value::Number(n) => {
                self.possible_boolean = false;
                if n.fract() != 0.0 || !n.is_finite() {
                    self.possible_integer = false;
                }
            }
            Value::String(_) => {
                self.possible_boolean = false;
                self.possible_integer = false;
                self.possible_number = false;
            }
        }
    }

    fn decide(&self) -> ColumnKind {
        if !self.seen {
            ColumnKind::Empty
        } else if self.possible_boolean {
            ColumnKind::Boolean
        } else if self.possible_integer {
            ColumnKind::Integer
        } else if self.possible_number {
            ColumnKind::Number
        } else {
            ColumnKind::Text
        }
    }
}

/// Profiles every column, keeping up to `samples` leading non-null values.
pub fn profile_table(table: &Table, samples: usize) -> Vec<ColumnProfile> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let mut candidate = KindCandidate::new();
            let mut sample_values = Vec::new();
            let mut distinct = HashSet::new();
            let mut null_count = 0;
            for cell in table.column_values(idx) {
                match cell {
                    None => null_count += 1,
                    Some(value) => {
                        candidate.observe(value);
                        if sample_values.len() < samples {
                            sample_values.push(value.clone());
                        }
                        distinct.insert(cell_to_string(cell));
                    }
                }
            }
            ColumnProfile {
                name: name.clone(),
                kind: candidate.decide(),
                sample_values,
                null_count,
                unique_count: distinct.len(),
            }
        })
        .collect()
}

/// Rows for the elastic text renderer.
pub fn profile_rows(profiles: &[ColumnProfile]) -> Vec<Vec<String>> {
    profiles
        .iter()
        .map(|profile| {
            vec![
                profile.name.clone(),
                profile.kind.as_str().to_string(),
                profile.null_count.to_string(),
                profile.unique_count.to_string(),
                profile
                    .sample_values
                    .iter()
                    .map(Value::as_display)
                    .collect::<Vec<_>>()
                    .join(", "),
            ]
        })
        .collect()
}
