pub mod branch;
pub mod question;
pub mod rules;
pub mod survey;

pub use branch::{BranchSpec, EndAction, NumericBranchRule};
pub use question::{ChoiceOption, Constraint, QuestionSpec, QuestionType};
pub use rules::{
    CompareOp, ConditionRule, ConditionValue, DateCondition, DisqualifyRule, DisqualifySpec,
    MatchType, QuestionRef, ValueCondition,
};
pub use survey::{SurveySettings, SurveySpec};
