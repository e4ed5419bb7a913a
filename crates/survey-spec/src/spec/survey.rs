use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::question::QuestionSpec;

/// Traversal-relevant messages of a survey definition. The host renders the
/// actual screens; the engine only supplies the text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveySettings {
    /// Fallback shown when a disqualify rule matches and the question carries
    /// no message of its own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disqualify_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_message: Option<String>,
}

/// Top-level survey definition: the immutable input of one traversal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SurveySpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SurveySettings>,
    pub questions: Vec<QuestionSpec>,
}

impl SurveySpec {
    pub fn question_by_sequence(&self, sequence: u32) -> Option<&QuestionSpec> {
        self.questions
            .iter()
            .find(|question| question.sequence == sequence)
    }

    /// Main-flow index of the question carrying `sequence`.
    pub fn index_of_sequence(&self, sequence: u32) -> Option<usize> {
        self.questions
            .iter()
            .position(|question| question.sequence == sequence)
    }
}
