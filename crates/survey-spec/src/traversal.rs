//! Navigation state machine over a survey definition.
//!
//! The cursor lives in the main flow or inside a stack of entered branches.
//! Forward moves validate the current answer, consult disqualification, enter
//! branches, and skip-scan over condition-hidden questions; backward moves
//! mirror the scan and re-enter a completed branch at its last visible
//! question. Skipped questions lose their stored answers as the scan passes
//! them, so stale values never feed downstream conditions or the export.

use std::collections::BTreeMap;

use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::{AnswerSet, AnswerStore, is_blank};
use crate::branching::{BranchSource, branch_by_source, resolve_branch};
use crate::condition::should_skip;
use crate::disqualify::{disqualify_message, is_disqualified};
use crate::refs::{
    KeyScope, QuestionLookup, option_branch_scope, primary_key, rule_branch_scope,
};
use crate::spec::{EndAction, QuestionSpec, SurveySettings, SurveySpec};
use crate::validate::{ValidationIssue, check_answer};

/// Where the cursor sits. Terminal variants never transition again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Position {
    /// At `questions[index]` of the innermost active flow.
    Question { index: usize },
    Completed,
    Disqualified { message: String },
}

/// One level of branch nesting. Only the owner index and trigger source are
/// stored; the branch body and resume point are re-derived from the survey
/// definition, so restored sessions cannot disagree with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BranchHop {
    /// Index of the branch-owning question in its parent flow.
    pub owner: usize,
    pub source: BranchSource,
}

/// Serializable session snapshot: everything besides the survey definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SessionState {
    pub position: Position,
    /// Innermost branch last; empty while in the main flow.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<BranchHop>,
    #[serde(default)]
    pub answers: AnswerStore,
}

/// Result of one navigation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Cursor moved; `Traversal::current` has the new question.
    Moved,
    /// Forward navigation refused: the current answer fails validation.
    Blocked { issue: ValidationIssue },
    /// Backward navigation refused: no earlier visible question exists.
    AtStart,
    Completed,
    Disqualified { message: String },
}

#[derive(Debug, Error)]
pub enum TraversalError {
    #[error("survey session already completed")]
    AlreadyCompleted,
    #[error("survey session ended by disqualification")]
    AlreadyDisqualified,
    #[error("saved session no longer matches the survey: {0}")]
    StaleSession(String),
    #[error("cannot submit while unanswered questions remain")]
    QuestionsRemain,
}

/// The question under the cursor.
#[derive(Debug, Clone)]
pub struct CurrentQuestion<'a> {
    pub question: &'a QuestionSpec,
    pub scope: KeyScope,
    /// Branch nesting depth, zero in the main flow.
    pub depth: usize,
}

/// One currently-visible question on the active path; branch questions are
/// interleaved after their owner in traversal order.
#[derive(Debug, Clone)]
pub struct FlowEntry<'a> {
    pub question: &'a QuestionSpec,
    pub scope: KeyScope,
}

/// Answered-versus-visible counts along the active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Progress {
    pub answered: usize,
    pub visible: usize,
}

impl Progress {
    /// Whole-number percentage, clamped to 100.
    pub fn percent(&self) -> u8 {
        if self.visible == 0 {
            return 100;
        }
        (self.answered * 100 / self.visible).min(100) as u8
    }
}

struct FlowView<'a> {
    questions: &'a [QuestionSpec],
    scope: KeyScope,
}

/// Single-threaded navigation session over an immutable survey definition.
#[derive(Clone)]
pub struct Traversal<'a> {
    spec: &'a SurveySpec,
    state: SessionState,
}

impl<'a> Traversal<'a> {
    /// Fresh session, settled onto the first visible question. A survey with
    /// no visible questions completes immediately.
    pub fn start(spec: &'a SurveySpec) -> Result<Self, TraversalError> {
        Self::start_with(spec, AnswerStore::new())
    }

    /// Fresh session seeded with imported answers; visibility is derived from
    /// them when choosing the starting question.
    pub fn start_with(
        spec: &'a SurveySpec,
        mut answers: AnswerStore,
    ) -> Result<Self, TraversalError> {
        answers.normalize(&spec.questions);
        let mut traversal = Self {
            spec,
            state: SessionState {
                position: Position::Question { index: 0 },
                stack: Vec::new(),
                answers,
            },
        };
        traversal.settle_forward(0)?;
        Ok(traversal)
    }

    /// Rehydrate a serialized session. Fails when the saved branch stack or
    /// cursor no longer fits the definition; a cursor question that has since
    /// become hidden settles forward instead of failing.
    pub fn resume(spec: &'a SurveySpec, state: SessionState) -> Result<Self, TraversalError> {
        let mut traversal = Self { spec, state };
        traversal.state.answers.normalize(&spec.questions);
        let cursor = match &traversal.state.position {
            Position::Question { index } => Some(*index),
            Position::Completed | Position::Disqualified { .. } => None,
        };
        if let Some(index) = cursor {
            let flow = resolve_flow(spec, &traversal.state.stack)?;
            let Some(question) = flow.questions.get(index) else {
                return Err(TraversalError::StaleSession(format!(
                    "cursor index {index} out of range"
                )));
            };
            let lookup = flow_lookup(spec, flow.questions, &flow.scope);
            if should_skip(question.condition.as_ref(), &lookup, &traversal.state.answers) {
                traversal.settle_forward(index)?;
            }
        }
        Ok(traversal)
    }

    pub fn spec(&self) -> &'a SurveySpec {
        self.spec
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }

    pub fn position(&self) -> &Position {
        &self.state.position
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.state.answers
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.state.position, Position::Question { .. })
    }

    pub fn current(&self) -> Option<CurrentQuestion<'a>> {
        let Position::Question { index } = &self.state.position else {
            return None;
        };
        let flow = resolve_flow(self.spec, &self.state.stack).ok()?;
        let question = flow.questions.get(*index)?;
        Some(CurrentQuestion {
            question,
            scope: flow.scope,
            depth: self.state.stack.len(),
        })
    }

    pub fn current_answer(&self) -> Option<&Value> {
        let current = self.current()?;
        self.state
            .answers
            .usable_answer_for(current.question, &current.scope)
    }

    /// Whether a backward step would land on a question.
    pub fn can_retreat(&self) -> bool {
        let mut probe = self.clone();
        matches!(probe.retreat(), Ok(StepOutcome::Moved))
    }

    pub fn progress(&self) -> Progress {
        let entries = active_flow(self.spec, &self.state.answers);
        let answered = entries
            .iter()
            .filter(|entry| {
                self.state
                    .answers
                    .usable_answer_for(entry.question, &entry.scope)
                    .is_some()
            })
            .count();
        Progress {
            answered,
            visible: entries.len(),
        }
    }

    /// Record or clear the current question's answer. A blank value deletes
    /// the stored entry. Does not move the cursor; disqualification and
    /// branch entry are decided by the following `advance`.
    pub fn set_answer(&mut self, value: Value) -> Result<(), TraversalError> {
        let index = self.require_index()?;
        let flow = resolve_flow(self.spec, &self.state.stack)?;
        let question = cursor_question(&flow, index)?;
        if is_blank(&value) {
            self.state.answers.remove(question, &flow.scope);
        } else {
            self.state.answers.insert(question, &flow.scope, value);
        }
        Ok(())
    }

    /// Accumulate host-reported time spent on the current question.
    pub fn record_elapsed(&mut self, seconds: u64) -> Result<(), TraversalError> {
        let index = self.require_index()?;
        let flow = resolve_flow(self.spec, &self.state.stack)?;
        let question = cursor_question(&flow, index)?;
        self.state.answers.record_elapsed(question, &flow.scope, seconds);
        Ok(())
    }

    /// Forward navigation: validate, check disqualification, enter a branch
    /// the answer activates, or skip-scan to the next visible question. The
    /// cursor does not move on `Blocked`.
    pub fn advance(&mut self) -> Result<StepOutcome, TraversalError> {
        let index = self.require_index()?;
        let flow = resolve_flow(self.spec, &self.state.stack)?;
        let question = cursor_question(&flow, index)?;
        let answer = self.state.answers.usable_answer_for(question, &flow.scope);

        if let Some(issue) = check_answer(question, answer) {
            return Ok(StepOutcome::Blocked { issue });
        }
        if let Some(answer) = answer {
            if is_disqualified(question, answer) {
                let fallback = SurveySettings::default();
                let settings = self.spec.settings.as_ref().unwrap_or(&fallback);
                let message = disqualify_message(question, settings).to_string();
                self.state.position = Position::Disqualified {
                    message: message.clone(),
                };
                return Ok(StepOutcome::Disqualified { message });
            }
            if let Some(hit) = resolve_branch(question, answer) {
                let source = hit.source;
                self.state.stack.push(BranchHop {
                    owner: index,
                    source,
                });
                return self.settle_forward(0);
            }
        }
        self.settle_forward(index + 1)
    }

    /// Backward navigation. Exiting a branch backward lands on the question
    /// that owns it; landing on a question whose stored answer still activates
    /// a branch re-enters that branch at its last visible question. The
    /// cursor and stack are untouched on `AtStart`.
    pub fn retreat(&mut self) -> Result<StepOutcome, TraversalError> {
        let saved = self.state.clone();
        let outcome = self.retreat_inner();
        if !matches!(outcome, Ok(StepOutcome::Moved)) {
            self.state = saved;
        }
        outcome
    }

    /// Final gate: like `advance`, but refuses to land on another question.
    pub fn submit(&mut self) -> Result<StepOutcome, TraversalError> {
        let saved = self.state.clone();
        match self.advance()? {
            StepOutcome::Moved => {
                self.state = saved;
                Err(TraversalError::QuestionsRemain)
            }
            outcome => Ok(outcome),
        }
    }

    /// Submission payload: answers and elapsed times of the currently-active
    /// path only, keyed by each question's primary key. Orphaned branch
    /// answers and twin-key duplicates are left out.
    pub fn export(&self) -> AnswerSet {
        let entries = active_flow(self.spec, &self.state.answers);
        let mut answers = serde_json::Map::new();
        let mut elapsed = BTreeMap::new();
        for entry in &entries {
            let key = primary_key(entry.question, &entry.scope);
            if let Some(value) = self
                .state
                .answers
                .usable_answer_for(entry.question, &entry.scope)
            {
                answers.insert(key.clone(), value.clone());
            }
            if let Some(&seconds) = self.state.answers.elapsed().get(&key) {
                elapsed.insert(key, seconds);
            }
        }
        AnswerSet {
            survey_id: self.spec.id.clone(),
            survey_version: self.spec.version.clone(),
            answers: Value::Object(answers),
            elapsed: (!elapsed.is_empty()).then_some(elapsed),
        }
    }

    fn require_index(&self) -> Result<usize, TraversalError> {
        match &self.state.position {
            Position::Question { index } => Ok(*index),
            Position::Completed => Err(TraversalError::AlreadyCompleted),
            Position::Disqualified { .. } => Err(TraversalError::AlreadyDisqualified),
        }
    }

    /// Land on the first visible question at or after `start` in the current
    /// flow, unwinding branch end actions as flows run out. Hidden questions
    /// lose their stored answers as the scan passes them.
    fn settle_forward(&mut self, mut start: usize) -> Result<StepOutcome, TraversalError> {
        loop {
            let flow = resolve_flow(self.spec, &self.state.stack)?;
            let lookup = flow_lookup(self.spec, flow.questions, &flow.scope);
            let mut landed = None;
            let mut index = start;
            while index < flow.questions.len() {
                let question = &flow.questions[index];
                if should_skip(question.condition.as_ref(), &lookup, &self.state.answers) {
                    self.state.answers.remove(question, &flow.scope);
                    index += 1;
                    continue;
                }
                landed = Some(index);
                break;
            }
            if let Some(index) = landed {
                self.state.position = Position::Question { index };
                return Ok(StepOutcome::Moved);
            }

            let Some(hop) = self.state.stack.last().copied() else {
                self.state.position = Position::Completed;
                return Ok(StepOutcome::Completed);
            };
            let parent = resolve_flow(self.spec, &self.state.stack[..self.state.stack.len() - 1])?;
            let owner = cursor_question(&parent, hop.owner)?;
            let Some(branch) = branch_by_source(owner, hop.source) else {
                return Err(TraversalError::StaleSession(format!(
                    "branch on question {} no longer resolves",
                    owner.sequence
                )));
            };
            match &branch.end_action {
                EndAction::End => {
                    self.state.position = Position::Completed;
                    return Ok(StepOutcome::Completed);
                }
                EndAction::Resume => {
                    self.state.stack.pop();
                    start = hop.owner + 1;
                }
                EndAction::Jump { target } => {
                    match target.and_then(|sequence| self.spec.index_of_sequence(sequence)) {
                        Some(main_index) => {
                            self.state.stack.clear();
                            start = main_index;
                        }
                        None => {
                            warn!(
                                "branch after question {} jumps to a missing target; resuming",
                                owner.sequence
                            );
                            self.state.stack.pop();
                            start = hop.owner + 1;
                        }
                    }
                }
            }
        }
    }

    fn retreat_inner(&mut self) -> Result<StepOutcome, TraversalError> {
        let mut boundary = self.require_index()?;
        loop {
            let flow = resolve_flow(self.spec, &self.state.stack)?;
            let lookup = flow_lookup(self.spec, flow.questions, &flow.scope);
            let mut found = None;
            for index in (0..boundary.min(flow.questions.len())).rev() {
                let question = &flow.questions[index];
                if should_skip(question.condition.as_ref(), &lookup, &self.state.answers) {
                    self.state.answers.remove(question, &flow.scope);
                    continue;
                }
                found = Some(index);
                break;
            }
            if let Some(index) = found {
                return self.descend_to_tail(index);
            }

            // Top of the current flow: exit the branch onto its owner, or
            // report the start of the survey.
            let Some(hop) = self.state.stack.pop() else {
                return Ok(StepOutcome::AtStart);
            };
            let parent = resolve_flow(self.spec, &self.state.stack)?;
            let parent_lookup = flow_lookup(self.spec, parent.questions, &parent.scope);
            let owner_visible = parent.questions.get(hop.owner).is_some_and(|owner| {
                !should_skip(owner.condition.as_ref(), &parent_lookup, &self.state.answers)
            });
            if owner_visible {
                self.state.position = Position::Question { index: hop.owner };
                return Ok(StepOutcome::Moved);
            }
            boundary = hop.owner;
        }
    }

    /// Re-enter the branch chain the answer at `index` activates, landing on
    /// the deepest last visible question. Branches with no visible questions
    /// leave the cursor on the owner itself.
    fn descend_to_tail(&mut self, mut index: usize) -> Result<StepOutcome, TraversalError> {
        loop {
            let flow = resolve_flow(self.spec, &self.state.stack)?;
            let question = cursor_question(&flow, index)?;
            let Some(hit) = self
                .state
                .answers
                .usable_answer_for(question, &flow.scope)
                .and_then(|answer| resolve_branch(question, answer))
            else {
                break;
            };
            let child_scope = scope_for(&flow.scope, question, hit.source);
            let lookup =
                QuestionLookup::with_local(self.spec, &hit.branch.questions, child_scope.clone());
            let mut tail = None;
            for candidate_index in (0..hit.branch.questions.len()).rev() {
                let candidate = &hit.branch.questions[candidate_index];
                if should_skip(candidate.condition.as_ref(), &lookup, &self.state.answers) {
                    self.state.answers.remove(candidate, &child_scope);
                    continue;
                }
                tail = Some(candidate_index);
                break;
            }
            let Some(tail) = tail else {
                break;
            };
            self.state.stack.push(BranchHop {
                owner: index,
                source: hit.source,
            });
            index = tail;
        }
        self.state.position = Position::Question { index };
        Ok(StepOutcome::Moved)
    }
}

/// Every currently-visible question along the active path, in traversal
/// order: each branch owner is followed by the branch its answer activates.
pub fn active_flow<'a>(spec: &'a SurveySpec, answers: &AnswerStore) -> Vec<FlowEntry<'a>> {
    let mut entries = Vec::new();
    collect_active(spec, &spec.questions, &KeyScope::Main, answers, &mut entries);
    entries
}

fn collect_active<'a>(
    spec: &'a SurveySpec,
    questions: &'a [QuestionSpec],
    scope: &KeyScope,
    answers: &AnswerStore,
    out: &mut Vec<FlowEntry<'a>>,
) {
    let lookup = flow_lookup(spec, questions, scope);
    for question in questions {
        if should_skip(question.condition.as_ref(), &lookup, answers) {
            continue;
        }
        out.push(FlowEntry {
            question,
            scope: scope.clone(),
        });
        if let Some(answer) = answers.usable_answer_for(question, scope)
            && let Some(hit) = resolve_branch(question, answer)
        {
            let child = scope_for(scope, question, hit.source);
            collect_active(spec, &hit.branch.questions, &child, answers, out);
        }
    }
}

fn resolve_flow<'a>(
    spec: &'a SurveySpec,
    stack: &[BranchHop],
) -> Result<FlowView<'a>, TraversalError> {
    let mut questions: &'a [QuestionSpec] = &spec.questions;
    let mut scope = KeyScope::Main;
    for (depth, hop) in stack.iter().enumerate() {
        let Some(owner) = questions.get(hop.owner) else {
            return Err(TraversalError::StaleSession(format!(
                "branch level {depth} owner index {} out of range",
                hop.owner
            )));
        };
        let Some(branch) = branch_by_source(owner, hop.source) else {
            return Err(TraversalError::StaleSession(format!(
                "branch level {depth} no longer resolves on question {}",
                owner.sequence
            )));
        };
        scope = scope_for(&scope, owner, hop.source);
        questions = &branch.questions;
    }
    Ok(FlowView { questions, scope })
}

fn flow_lookup<'a>(
    spec: &'a SurveySpec,
    questions: &'a [QuestionSpec],
    scope: &KeyScope,
) -> QuestionLookup<'a> {
    QuestionLookup::with_local(spec, questions, scope.clone())
}

fn scope_for(parent: &KeyScope, owner: &QuestionSpec, source: BranchSource) -> KeyScope {
    match source {
        BranchSource::Option { index } => option_branch_scope(parent, owner.sequence, index),
        BranchSource::Rule { index } => rule_branch_scope(parent, owner.sequence, index),
    }
}

fn cursor_question<'a>(
    flow: &FlowView<'a>,
    index: usize,
) -> Result<&'a QuestionSpec, TraversalError> {
    flow.questions.get(index).ok_or_else(|| {
        TraversalError::StaleSession(format!("cursor index {index} out of range"))
    })
}
