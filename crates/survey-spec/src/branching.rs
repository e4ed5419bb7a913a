use log::{debug, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{answer_text, as_f64, calendar_date, compare_dates, compare_f64};
use crate::spec::{BranchSpec, CompareOp, QuestionSpec, QuestionType};

/// Where a branch hangs off its owning question. Serialized into session
/// state so a restored session re-enters the same detour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchSource {
    /// Branch attached to `question.options[index]`.
    Option { index: usize },
    /// Branch attached to `question.numeric_branch_rules[index]`.
    Rule { index: usize },
}

/// Branch selected for the current answer, paired with its source so the
/// traversal can record where it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchHit<'a> {
    pub source: BranchSource,
    pub branch: &'a BranchSpec,
}

/// Decides which branch, if any, the given answer activates.
///
/// Single-select questions match the selected option's text; numeric-family
/// and date questions take the first rule whose comparison holds. A branch
/// with no questions is treated as absent, and rules that cannot be evaluated
/// are skipped rather than matched. Both forward navigation and backward
/// re-entry go through here, so revisiting a question replays the identical
/// decision.
pub fn resolve_branch<'a>(question: &'a QuestionSpec, answer: &Value) -> Option<BranchHit<'a>> {
    if question.kind.is_single_select() {
        let text = answer_text(answer)?;
        let (index, option) = question.option_by_text(text)?;
        let branch = option.branch.as_ref().filter(|branch| !branch.is_empty())?;
        return Some(BranchHit {
            source: BranchSource::Option { index },
            branch,
        });
    }
    if question.kind.is_numeric() {
        let left = as_f64(answer)?;
        return first_rule_hit(question, |op, value| {
            let right = as_f64(value)?;
            compare_f64(op, left, right)
        });
    }
    if question.kind == QuestionType::Date {
        let left = calendar_date(answer)?;
        return first_rule_hit(question, |op, value| {
            let right = calendar_date(value)?;
            compare_dates(op, left, right)
        });
    }
    None
}

/// Looks a previously recorded source back up on its question. Used when
/// restoring a serialized session, where the answer has already been matched
/// once and only the branch body is needed.
pub fn branch_by_source(question: &QuestionSpec, source: BranchSource) -> Option<&BranchSpec> {
    let branch = match source {
        BranchSource::Option { index } => question.options.get(index)?.branch.as_ref()?,
        BranchSource::Rule { index } => &question.numeric_branch_rules.get(index)?.branch,
    };
    if branch.is_empty() { None } else { Some(branch) }
}

fn first_rule_hit<'a>(
    question: &'a QuestionSpec,
    mut holds: impl FnMut(CompareOp, &Value) -> Option<bool>,
) -> Option<BranchHit<'a>> {
    for (index, rule) in question.numeric_branch_rules.iter().enumerate() {
        if rule.branch.is_empty() {
            continue;
        }
        match holds(rule.op, &rule.value) {
            Some(true) => {
                return Some(BranchHit {
                    source: BranchSource::Rule { index },
                    branch: &rule.branch,
                });
            }
            Some(false) => {}
            None => {
                if rule.op == CompareOp::Unknown {
                    warn!(
                        "branch rule {} on question {} uses an unknown operator; skipped",
                        index, question.sequence
                    );
                } else {
                    debug!(
                        "branch rule {} on question {} has non-comparable operands; skipped",
                        index, question.sequence
                    );
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{ChoiceOption, CompareOp, EndAction, NumericBranchRule};
    use serde_json::json;

    fn branch_of(sequences: &[u32]) -> BranchSpec {
        BranchSpec {
            questions: sequences
                .iter()
                .map(|seq| QuestionSpec::new(*seq, QuestionType::Text, format!("B{seq}")))
                .collect(),
            end_action: EndAction::Resume,
        }
    }

    fn choice_question() -> QuestionSpec {
        let mut question = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick one");
        let mut detour = ChoiceOption::new("Yes");
        detour.branch = Some(branch_of(&[1, 2]));
        question.options = vec![ChoiceOption::new("No"), detour];
        question
    }

    #[test]
    fn option_branch_matches_selected_text() {
        let question = choice_question();
        let hit = resolve_branch(&question, &json!("Yes")).unwrap();
        assert_eq!(hit.source, BranchSource::Option { index: 1 });
        assert_eq!(hit.branch.questions.len(), 2);
        assert!(resolve_branch(&question, &json!("No")).is_none());
        assert!(resolve_branch(&question, &json!("Maybe")).is_none());
    }

    #[test]
    fn option_branch_accepts_other_text_object_form() {
        let question = choice_question();
        let hit = resolve_branch(&question, &json!({"option": "Yes", "text": "details"}));
        assert!(hit.is_some());
    }

    #[test]
    fn empty_branch_is_no_branch() {
        let mut question = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick one");
        let mut option = ChoiceOption::new("Yes");
        option.branch = Some(branch_of(&[]));
        question.options = vec![option];
        assert!(resolve_branch(&question, &json!("Yes")).is_none());
    }

    #[test]
    fn numeric_rules_take_first_match() {
        let mut question = QuestionSpec::new(3, QuestionType::Number, "Team size");
        question.numeric_branch_rules = vec![
            NumericBranchRule {
                op: CompareOp::Lt,
                value: json!(10),
                branch: branch_of(&[1]),
            },
            NumericBranchRule {
                op: CompareOp::Lt,
                value: json!(100),
                branch: branch_of(&[1, 2]),
            },
        ];
        let hit = resolve_branch(&question, &json!(5)).unwrap();
        assert_eq!(hit.source, BranchSource::Rule { index: 0 });
        let hit = resolve_branch(&question, &json!("42")).unwrap();
        assert_eq!(hit.source, BranchSource::Rule { index: 1 });
        assert!(resolve_branch(&question, &json!(500)).is_none());
        assert!(resolve_branch(&question, &json!("n/a")).is_none());
    }

    #[test]
    fn rules_apply_across_the_numeric_family() {
        let mut question = QuestionSpec::new(2, QuestionType::Nps, "Recommend us?");
        question.numeric_branch_rules = vec![NumericBranchRule {
            op: CompareOp::Lte,
            value: json!(3),
            branch: branch_of(&[1]),
        }];
        assert!(resolve_branch(&question, &json!(2)).is_some());
        assert!(resolve_branch(&question, &json!(8)).is_none());
    }

    #[test]
    fn unknown_operator_rule_is_skipped() {
        let mut question = QuestionSpec::new(3, QuestionType::Number, "Team size");
        question.numeric_branch_rules = vec![
            NumericBranchRule {
                op: CompareOp::Unknown,
                value: json!(0),
                branch: branch_of(&[1]),
            },
            NumericBranchRule {
                op: CompareOp::Gte,
                value: json!(0),
                branch: branch_of(&[2]),
            },
        ];
        let hit = resolve_branch(&question, &json!(7)).unwrap();
        assert_eq!(hit.source, BranchSource::Rule { index: 1 });
    }

    #[test]
    fn date_rules_compare_calendar_days() {
        let mut question = QuestionSpec::new(4, QuestionType::Date, "Start date");
        question.numeric_branch_rules = vec![NumericBranchRule {
            op: CompareOp::Lt,
            value: json!("2024-01-01"),
            branch: branch_of(&[1]),
        }];
        assert!(resolve_branch(&question, &json!("2023-12-31")).is_some());
        assert!(resolve_branch(&question, &json!("2024-01-01")).is_none());
    }

    #[test]
    fn source_round_trips_through_lookup() {
        let question = choice_question();
        let hit = resolve_branch(&question, &json!("Yes")).unwrap();
        let reloaded = branch_by_source(&question, hit.source).unwrap();
        assert_eq!(reloaded.questions.len(), 2);
    }
}
