#![allow(missing_docs)]

pub mod answers;
pub mod answers_schema;
pub mod branching;
pub mod condition;
pub mod disqualify;
pub mod lint;
pub mod refs;
pub mod spec;
pub mod template;
pub mod traversal;
pub mod validate;
pub mod view;

pub use answers::{AnswerSet, AnswerStore, is_blank};
pub use answers_schema::generate as answers_schema;
pub use branching::{BranchHit, BranchSource, branch_by_source, resolve_branch};
pub use condition::should_skip;
pub use disqualify::{DEFAULT_DISQUALIFY_MESSAGE, disqualify_message, is_disqualified};
pub use lint::{LintFinding, lint};
pub use refs::{KeyScope, QuestionLookup, ResolvedRef, answer_keys, primary_key};
pub use spec::{
    BranchSpec, ChoiceOption, CompareOp, ConditionRule, ConditionValue, Constraint, DateCondition,
    DisqualifyRule, DisqualifySpec, EndAction, MatchType, NumericBranchRule, QuestionRef,
    QuestionSpec, QuestionType, SurveySettings, SurveySpec, ValueCondition,
};
pub use template::{TemplateEngine, TemplateError};
pub use traversal::{
    BranchHop, CurrentQuestion, FlowEntry, Position, Progress, SessionState, StepOutcome,
    Traversal, TraversalError, active_flow,
};
pub use validate::{ValidationIssue, check_answer};
pub use view::{
    OptionView, QuestionView, SessionView, ViewStatus, build_session_view, view_json, view_text,
};
