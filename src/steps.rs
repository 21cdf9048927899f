//! Rule workflow definitions: ordered steps of AND-combined conditions and
//! ordered actions.
//!
//! Operator and action tags are decoded leniently. Anything unrecognised is
//! kept as `Unknown(tag)`; an unknown operator matches every row and an
//! unknown action changes nothing.

use serde::{Deserialize, Serialize};

use crate::data::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuleWorkflow {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub source_config: SourceConfig,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default)]
    pub key_column: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl WorkflowStep {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn then(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub column: String,
    #[serde(default)]
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Condition {
    pub fn new(column: impl Into<String>, operator: ConditionOperator, value: Option<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Exists,
    IsEmpty,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Unknown(String),
}

impl Default for ConditionOperator {
    fn default() -> Self {
        ConditionOperator::Unknown(String::new())
    }
}

const OPERATOR_TAGS: &[(&str, ConditionOperator)] = &[
    ("equals", ConditionOperator::Equals),
    ("notEquals", ConditionOperator::NotEquals),
    ("contains", ConditionOperator::Contains),
    ("notContains", ConditionOperator::NotContains),
    ("startsWith", ConditionOperator::StartsWith),
    ("endsWith", ConditionOperator::EndsWith),
    ("exists", ConditionOperator::Exists),
    ("isEmpty", ConditionOperator::IsEmpty),
    ("greaterThan", ConditionOperator::GreaterThan),
    ("lessThan", ConditionOperator::LessThan),
    ("greaterThanOrEqual", ConditionOperator::GreaterThanOrEqual),
    ("lessThanOrEqual", ConditionOperator::LessThanOrEqual),
];

impl From<String> for ConditionOperator {
    fn from(tag: String) -> Self {
        OPERATOR_TAGS
            .iter()
            .find(|(name, _)| *name == tag)
            .map(|(_, op)| op.clone())
            .unwrap_or(ConditionOperator::Unknown(tag))
    }
}

impl From<ConditionOperator> for String {
    fn from(op: ConditionOperator) -> Self {
        if let ConditionOperator::Unknown(tag) = op {
            return tag;
        }
        OPERATOR_TAGS
            .iter()
            .find(|(_, known)| *known == op)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub target_column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Action {
    pub fn new(action_type: ActionType, target_column: impl Into<String>) -> Self {
        Self {
            action_type,
            target_column: target_column.into(),
            source_column: None,
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_source(mut self, column: impl Into<String>) -> Self {
        self.source_column = Some(column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    SetValue,
    Increment,
    Decrement,
    CopyFrom,
    Clear,
    Flag,
    Unknown(String),
}

impl Default for ActionType {
    fn default() -> Self {
        ActionType::Unknown(String::new())
    }
}

impl From<String> for ActionType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "setValue" => ActionType::SetValue,
            "increment" => ActionType::Increment,
            "decrement" => ActionType::Decrement,
            "copyFrom" => ActionType::CopyFrom,
            "clear" => ActionType::Clear,
            "flag" => ActionType::Flag,
            _ => ActionType::Unknown(tag),
        }
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        match action {
            ActionType::SetValue => "setValue".into(),
            ActionType::Increment => "increment".into(),
            ActionType::Decrement => "decrement".into(),
            ActionType::CopyFrom => "copyFrom".into(),
            ActionType::Clear => "clear".into(),
            ActionType::Flag => "flag".into(),
            ActionType::Unknown(tag) => tag,
        }
    }
}
