use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::branch::{BranchSpec, NumericBranchRule};
use crate::spec::rules::{ConditionRule, DisqualifySpec};

/// Answer shape of a question; decides which evaluator semantics apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    SingleChoice,
    Dropdown,
    MultiChoice,
    Text,
    Email,
    Number,
    #[serde(alias = "slider")]
    Rating,
    Nps,
    Date,
    RadioGrid,
    CheckboxGrid,
    RatingGrid,
    Ranking,
    Signature,
}

impl QuestionType {
    /// Choice kinds that select exactly one option.
    pub fn is_single_select(&self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::Dropdown)
    }

    /// Kinds whose answers compare as floating-point numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            QuestionType::Number | QuestionType::Rating | QuestionType::Nps
        )
    }

    pub fn is_grid(&self) -> bool {
        matches!(
            self,
            QuestionType::RadioGrid | QuestionType::CheckboxGrid | QuestionType::RatingGrid
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::SingleChoice => "single_choice",
            QuestionType::Dropdown => "dropdown",
            QuestionType::MultiChoice => "multi_choice",
            QuestionType::Text => "text",
            QuestionType::Email => "email",
            QuestionType::Number => "number",
            QuestionType::Rating => "rating",
            QuestionType::Nps => "nps",
            QuestionType::Date => "date",
            QuestionType::RadioGrid => "radio_grid",
            QuestionType::CheckboxGrid => "checkbox_grid",
            QuestionType::RatingGrid => "rating_grid",
            QuestionType::Ranking => "ranking",
            QuestionType::Signature => "signature",
        }
    }
}

/// One selectable choice of a choice-type question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChoiceOption {
    pub text: String,
    /// Detour entered when this option is the answer at forward navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchSpec>,
    /// Not-applicable marker; selecting it satisfies required-ness on its own.
    #[serde(default)]
    pub not_applicable: bool,
    /// "Other" marker; the selection carries free text alongside the option.
    #[serde(default)]
    pub other_text: bool,
}

impl ChoiceOption {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            branch: None,
            not_applicable: false,
            other_text: false,
        }
    }

    /// Special selections satisfy a required question without a normal answer.
    pub fn is_special(&self) -> bool {
        self.not_applicable || self.other_text
    }
}

/// Value constraints enforced by the validation evaluator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Constraint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_len: Option<usize>,
}

/// One item of the questionnaire, in the main flow or inside a branch.
///
/// `sequence` is 1-based and unique within the flow the question belongs to,
/// not globally; `uuid` survives reordering and is optional for legacy data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionSpec {
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numeric_branch_rules: Vec<NumericBranchRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ConditionRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disqualify: Option<DisqualifySpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Cell text treated as an explicit N/A marker in grid answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub na_text: Option<String>,
}

impl QuestionSpec {
    pub fn new(sequence: u32, kind: QuestionType, title: impl Into<String>) -> Self {
        Self {
            sequence,
            uuid: None,
            kind,
            title: title.into(),
            description: None,
            required: false,
            options: Vec::new(),
            numeric_branch_rules: Vec::new(),
            condition: None,
            disqualify: None,
            constraint: None,
            rows: Vec::new(),
            columns: Vec::new(),
            na_text: None,
        }
    }

    pub fn option_by_text(&self, text: &str) -> Option<(usize, &ChoiceOption)> {
        self.options
            .iter()
            .enumerate()
            .find(|(_, option)| option.text == text)
    }

    /// Marker text for an explicitly skipped grid cell.
    pub fn grid_na_marker(&self) -> &str {
        self.na_text.as_deref().unwrap_or("N/A")
    }
}
