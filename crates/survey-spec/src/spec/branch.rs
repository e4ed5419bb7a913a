use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::question::QuestionSpec;
use crate::spec::rules::CompareOp;

/// What happens once the last question of a branch is answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EndAction {
    /// Return to the question immediately after the one that triggered the
    /// branch.
    #[default]
    Resume,
    /// Jump to an explicit sequence number in the main flow. A missing target
    /// is a configuration error; lint reports it and the traversal falls back
    /// to `Resume` with a warning rather than deadlocking.
    Jump {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<u32>,
    },
    /// Terminate the survey successfully.
    End,
}

/// Detour sub-sequence entered from a triggering answer, with its own
/// 1-based sequence numbering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BranchSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuestionSpec>,
    #[serde(default)]
    pub end_action: EndAction,
}

impl BranchSpec {
    /// An armed branch with zero questions is a no-op, not an error.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Rule-based branch trigger for number/date questions. The value is numeric
/// for a `number` question and a calendar date for a `date` question; the
/// operator semantics match numeric conditional logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumericBranchRule {
    pub op: CompareOp,
    pub value: Value,
    pub branch: BranchSpec,
}
