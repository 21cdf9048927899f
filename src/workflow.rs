//! Merge workflow definitions.
//!
//! These records mirror the persisted JSON shape (`files`, `keyColumn`,
//! `joinConfig`, `outputColumns`). Decoding never fails on a missing or
//! unrecognised field: absent values fall back to defaults and unknown tags
//! are kept as `Unknown(tag)` so the evaluator can apply its fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergeWorkflow {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<KeyColumnMapping>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_config: Option<JoinSpec>,
    #[serde(default)]
    pub output_columns: Vec<OutputColumn>,
}

impl MergeWorkflow {
    pub fn file(&self, file_id: &str) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.id == file_id)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl FileDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            filename: None,
        }
    }
}

/// Per-file key column names; files may call their key column differently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KeyColumnMapping {
    #[serde(default)]
    pub mappings: BTreeMap<String, String>,
}

impl KeyColumnMapping {
    pub fn column_for(&self, file_id: &str) -> Option<&str> {
        self.mappings
            .get(file_id)
            .map(|c| c.as_str())
            .filter(|c| !c.trim().is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyColumnMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            mappings: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
    Unknown(String),
}

impl From<String> for JoinType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "inner" => JoinType::Inner,
            "left" => JoinType::Left,
            "right" => JoinType::Right,
            "full" => JoinType::Full,
            _ => JoinType::Unknown(tag),
        }
    }
}

impl From<JoinType> for String {
    fn from(join: JoinType) -> Self {
        match join {
            JoinType::Inner => "inner".into(),
            JoinType::Left => "left".into(),
            JoinType::Right => "right".into(),
            JoinType::Full => "full".into(),
            JoinType::Unknown(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinSpec {
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_file_id: Option<String>,
}

impl JoinSpec {
    pub fn new(join_type: JoinType, primary_file_id: Option<&str>) -> Self {
        Self {
            join_type,
            primary_file_id: primary_file_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutputColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub source: ColumnSource,
}

impl OutputColumn {
    pub fn new(name: impl Into<String>, order: i64, source: ColumnSource) -> Self {
        Self {
            id: None,
            name: name.into(),
            order,
            source,
        }
    }
}

/// Reference to one column of one input file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnRef {
    pub file_id: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(file_id: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConcatPart {
    Literal(String),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MathOperand {
    /// `None` when the literal carried no value; such operands are skipped.
    Literal(Option<f64>),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathOperation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Unknown(String),
}

impl MathOperation {
    fn parse(tag: &str) -> Self {
        match tag {
            "add" => MathOperation::Add,
            "subtract" => MathOperation::Subtract,
            "multiply" => MathOperation::Multiply,
            "divide" => MathOperation::Divide,
            other => MathOperation::Unknown(other.to_string()),
        }
    }

    fn as_str(&self) -> &str {
        match self {
            MathOperation::Add => "add",
            MathOperation::Subtract => "subtract",
            MathOperation::Multiply => "multiply",
            MathOperation::Divide => "divide",
            MathOperation::Unknown(tag) => tag,
        }
    }
}

/// How one output column derives its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawColumnSource", into = "RawColumnSource")]
pub enum ColumnSource {
    Direct(ColumnRef),
    Concat {
        parts: Vec<ConcatPart>,
        separator: String,
    },
    Math {
        operation: MathOperation,
        operands: Vec<MathOperand>,
    },
    Custom {
        default_value: String,
    },
    Unknown(String),
}

impl Default for ColumnSource {
    fn default() -> Self {
        ColumnSource::Custom {
            default_value: String::new(),
        }
    }
}

impl ColumnSource {
    pub fn direct(file_id: impl Into<String>, column: impl Into<String>) -> Self {
        ColumnSource::Direct(ColumnRef::new(file_id, column))
    }

    pub fn custom(default_value: impl Into<String>) -> Self {
        ColumnSource::Custom {
            default_value: default_value.into(),
        }
    }
}

// Flat wire shape shared by every source kind. Fields that do not apply to a
// given `type` are simply absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColumnSource {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parts: Option<Vec<RawPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    separator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operands: Option<Vec<RawPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
}

impl RawPart {
    fn column_ref(&self) -> ColumnRef {
        ColumnRef::new(
            self.file_id.clone().unwrap_or_default(),
            self.column.clone().unwrap_or_default(),
        )
    }

    fn from_column(column: ColumnRef) -> Self {
        Self {
            kind: Some("column".into()),
            file_id: Some(column.file_id),
            column: Some(column.column),
            value: None,
        }
    }

    fn literal(value: Option<Value>) -> Self {
        Self {
            kind: Some("literal".into()),
            value,
            ..Self::default()
        }
    }
}

impl From<RawColumnSource> for ColumnSource {
    fn from(raw: RawColumnSource) -> Self {
        let kind = raw.kind.unwrap_or_else(|| "custom".to_string());
        match kind.as_str() {
            "direct" => ColumnSource::Direct(ColumnRef::new(
                raw.file_id.unwrap_or_default(),
                raw.column.unwrap_or_default(),
            )),
            "concat" => ColumnSource::Concat {
                parts: raw
                    .parts
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|part| match part.kind.as_deref() {
                        Some("literal") => Some(ConcatPart::Literal(
                            part.value.map(|v| v.as_display()).unwrap_or_default(),
                        )),
                        Some("column") => Some(ConcatPart::Column(part.column_ref())),
                        _ => None,
                    })
                    .collect(),
                separator: raw.separator.unwrap_or_default(),
            },
            "math" => ColumnSource::Math {
                operation: MathOperation::parse(raw.operation.as_deref().unwrap_or("add")),
                operands: raw
                    .operands
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|operand| match operand.kind.as_deref() {
                        Some("literal") => Some(MathOperand::Literal(
                            operand.value.map(|v| v.as_f64().unwrap_or(0.0)),
                        )),
                        Some("column") => Some(MathOperand::Column(operand.column_ref())),
                        _ => None,
                    })
                    .collect(),
            },
            "custom" => ColumnSource::Custom {
                default_value: raw.default_value.unwrap_or_default(),
            },
            _ => ColumnSource::Unknown(kind),
        }
    }
}

impl From<ColumnSource> for RawColumnSource {
    fn from(source: ColumnSource) -> Self {
        match source {
            ColumnSource::Direct(column) => RawColumnSource {
                kind: Some("direct".into()),
                file_id: Some(column.file_id),
                column: Some(column.column),
                ..Default::default()
            },
            ColumnSource::Concat { parts, separator } => RawColumnSource {
                kind: Some("concat".into()),
                parts: Some(
                    parts
                        .into_iter()
                        .map(|part| match part {
                            ConcatPart::Literal(text) => RawPart::literal(Some(Value::String(text))),
                            ConcatPart::Column(column) => RawPart::from_column(column),
                        })
                        .collect(),
                ),
                separator: Some(separator),
                ..Default::default()
            },
            ColumnSource::Math {
                operation,
                operands,
            } => RawColumnSource {
                kind: Some("math".into()),
                operation: Some(operation.as_str().to_string()),
                operands: Some(
                    operands
                        .into_iter()
                        .map(|operand| match operand {
                            MathOperand::Literal(value) => {
                                RawPart::literal(value.map(Value::Number))
                            }
                            MathOperand::Column(column) => RawPart::from_column(column),
                        })
                        .collect(),
                ),
                ..Default::default()
            },
            ColumnSource::Custom { default_value } => RawColumnSource {
                kind: Some("custom".into()),
                default_value: Some(default_value),
                ..Default::default()
            },
            ColumnSource::Unknown(kind) => RawColumnSource {
                kind: Some(kind),
                ..Default::default()
            },
        }
    }
}
