use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Comparison operator
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonOperator {
    // for string or array
    Contains,
    NotContains,
    StartWith,
    EndWith,
    Is,
    IsNot,
    Empty,
    NotEmpty,
    In,
    NotIn,
    AllOf,
    // for number
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Null,
    NotNull,
}

impl ComparisonOperator {
    /// Operators that are decided by the presence of the value alone.
    pub fn checks_presence(&self) -> bool {
        matches!(self, ComparisonOperator::Null | ComparisonOperator::NotNull | ComparisonOperator::Empty | ComparisonOperator::NotEmpty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Bool(bool),
    Number(f64),
    Str(String),
    List(Vec<Value>),
}

/// One comparison of a context value against an expected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// A context path (`parent.status`, `initial.user.email`, `nodes.a.id`)
    /// or an output placeholder (`{{#a.id#}}`).
    pub variable_selector: String,
    pub comparison_operator: ComparisonOperator,
    pub value: Option<ConditionValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub logical_operator: LogicalOperator,
    pub conditions: Vec<Rule>,
}
