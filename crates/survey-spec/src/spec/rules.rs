use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to another question: `uuid` preferred, `sequence` is the legacy
/// fallback. Lookup always tries the uuid first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
}

impl QuestionRef {
    pub fn by_uuid(uuid: impl Into<String>) -> Self {
        Self {
            uuid: Some(uuid.into()),
            sequence: None,
        }
    }

    pub fn by_sequence(sequence: u32) -> Self {
        Self {
            uuid: None,
            sequence: Some(sequence),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.uuid.is_none() && self.sequence.is_none()
    }
}

impl std::fmt::Display for QuestionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.uuid, self.sequence) {
            (Some(uuid), _) => write!(f, "uuid:{uuid}"),
            (None, Some(sequence)) => write!(f, "seq:{sequence}"),
            (None, None) => write!(f, "<empty ref>"),
        }
    }
}

/// Comparison operators shared by numeric conditions and branch rules.
///
/// Legacy payloads occasionally carry operators this engine never supported;
/// they deserialize to `Unknown` and evaluation fails open with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    #[serde(other)]
    Unknown,
}

/// Multi-choice match semantics: does the answer need one or all of the
/// expected options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    Any,
    All,
}

/// Expected-answer shape of a conditional-visibility rule; which variant is
/// meaningful depends on the base question's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionValue {
    /// Single-choice base: the literal expected option text.
    Option { text: String },
    /// Multi-choice base: expected options plus the match predicate.
    Options {
        options: Vec<String>,
        #[serde(default)]
        match_type: MatchType,
    },
    /// Numeric base: operator comparison. The value stays a raw JSON value so
    /// non-parsable payloads degrade at evaluation time instead of at load.
    Compare { op: CompareOp, value: Value },
}

/// Visibility rule attached to a dependent question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConditionRule {
    #[serde(flatten)]
    pub base: QuestionRef,
    pub value: ConditionValue,
}

/// Screen-out configuration of one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisqualifySpec {
    #[serde(default)]
    pub enabled: bool,
    /// Message shown on termination; falls back to the survey-level message,
    /// then to the built-in default text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<DisqualifyRule>,
}

/// One termination rule; matched against the answer of the question it is
/// attached to, in list order, first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DisqualifyRule {
    /// Matches when the answer (scalar or array) contains the option text.
    Option { option: String },
    /// Numeric comparison; non-numeric answers never disqualify.
    Value { condition: ValueCondition, value: Value },
    /// Calendar-date comparison with time-of-day stripped.
    Date { condition: DateCondition, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValueCondition {
    Less,
    Greater,
    Equal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DateCondition {
    Before,
    After,
    On,
}
