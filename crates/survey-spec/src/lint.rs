use std::collections::HashMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::condition::parse_date_text;
use crate::refs::{KeyScope, QuestionLookup, option_branch_scope, rule_branch_scope};
use crate::spec::{
    CompareOp, ConditionValue, DisqualifyRule, EndAction, QuestionSpec, QuestionType, SurveySpec,
};

/// One authoring problem found in a survey definition. The traversal
/// tolerates all of these at runtime via the documented fallbacks; lint
/// exists so they are caught before a respondent ever sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LintFinding {
    /// Stable machine-readable code, e.g. `jump_missing_target`.
    pub code: String,
    pub message: String,
    /// Flow path of the offending question, e.g. `main q2 > option 1 branch q1`.
    pub location: String,
}

/// Check a survey definition for configuration errors and suspicious rules.
pub fn lint(spec: &SurveySpec) -> Vec<LintFinding> {
    let mut findings = Vec::new();
    check_duplicate_uuids(spec, &mut findings);
    walk_flow(spec, &spec.questions, &KeyScope::Main, "main", &mut findings);
    findings
}

fn finding(code: &str, location: &str, message: impl Into<String>) -> LintFinding {
    LintFinding {
        code: code.into(),
        message: message.into(),
        location: location.into(),
    }
}

fn check_duplicate_uuids(spec: &SurveySpec, findings: &mut Vec<LintFinding>) {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    collect_uuids(&spec.questions, &mut seen);
    for (uuid, count) in seen {
        if count > 1 {
            findings.push(finding(
                "duplicate_uuid",
                "survey",
                format!("uuid '{uuid}' is used by {count} questions"),
            ));
        }
    }
}

fn collect_uuids<'a>(questions: &'a [QuestionSpec], seen: &mut HashMap<&'a str, u32>) {
    for question in questions {
        if let Some(uuid) = &question.uuid {
            *seen.entry(uuid.as_str()).or_insert(0) += 1;
        }
        for option in &question.options {
            if let Some(branch) = &option.branch {
                collect_uuids(&branch.questions, seen);
            }
        }
        for rule in &question.numeric_branch_rules {
            collect_uuids(&rule.branch.questions, seen);
        }
    }
}

fn walk_flow(
    spec: &SurveySpec,
    questions: &[QuestionSpec],
    scope: &KeyScope,
    label: &str,
    findings: &mut Vec<LintFinding>,
) {
    let mut sequences: HashMap<u32, u32> = HashMap::new();
    for question in questions {
        *sequences.entry(question.sequence).or_insert(0) += 1;
    }
    for (sequence, count) in sequences {
        if count > 1 {
            findings.push(finding(
                "duplicate_sequence",
                label,
                format!("sequence {sequence} appears {count} times in this flow"),
            ));
        }
    }

    let lookup = QuestionLookup::with_local(spec, questions, scope.clone());
    for question in questions {
        let here = format!("{label} q{}", question.sequence);
        lint_question(question, scope, &lookup, &here, findings);

        if question.options.iter().any(|option| option.branch.is_some())
            && !question.kind.is_single_select()
        {
            findings.push(finding(
                "branch_on_unsupported_kind",
                &here,
                format!(
                    "option branches on a '{}' question are never entered",
                    question.kind.label()
                ),
            ));
        }
        for (index, option) in question.options.iter().enumerate() {
            let Some(branch) = &option.branch else {
                continue;
            };
            let at = format!("{here} option {}", index + 1);
            if branch.is_empty() {
                findings.push(finding(
                    "empty_branch",
                    &at,
                    "branch is armed but has no questions; it will never be entered",
                ));
                continue;
            }
            lint_end_action(spec, &branch.end_action, &at, findings);
            let child = option_branch_scope(scope, question.sequence, index);
            walk_flow(spec, &branch.questions, &child, &format!("{at} branch"), findings);
        }

        if !question.numeric_branch_rules.is_empty()
            && !question.kind.is_numeric()
            && question.kind != QuestionType::Date
        {
            findings.push(finding(
                "rules_on_unsupported_kind",
                &here,
                format!(
                    "numeric branch rules on a '{}' question are never evaluated",
                    question.kind.label()
                ),
            ));
        }
        for (index, rule) in question.numeric_branch_rules.iter().enumerate() {
            let at = format!("{here} rule {}", index + 1);
            if rule.op == CompareOp::Unknown {
                findings.push(finding(
                    "unknown_operator",
                    &at,
                    "unrecognized comparison operator; the rule is skipped at runtime",
                ));
            }
            if rule.branch.is_empty() {
                findings.push(finding(
                    "empty_branch",
                    &at,
                    "branch is armed but has no questions; it will never be entered",
                ));
                continue;
            }
            lint_end_action(spec, &rule.branch.end_action, &at, findings);
            let child = rule_branch_scope(scope, question.sequence, index);
            walk_flow(spec, &rule.branch.questions, &child, &format!("{at} branch"), findings);
        }
    }
}

fn lint_question(
    question: &QuestionSpec,
    scope: &KeyScope,
    lookup: &QuestionLookup<'_>,
    here: &str,
    findings: &mut Vec<LintFinding>,
) {
    let needs_options = matches!(
        question.kind,
        QuestionType::SingleChoice
            | QuestionType::Dropdown
            | QuestionType::MultiChoice
            | QuestionType::Ranking
    );
    if needs_options && question.options.is_empty() {
        findings.push(finding(
            "missing_options",
            here,
            format!("'{}' question has no options", question.kind.label()),
        ));
    }
    if question.kind.is_grid() && (question.rows.is_empty() || question.columns.is_empty()) {
        findings.push(finding(
            "missing_grid_axes",
            here,
            "grid question needs at least one row and one column",
        ));
    }

    if let Some(constraint) = &question.constraint {
        if let (Some(min), Some(max)) = (constraint.min, constraint.max)
            && min > max
        {
            findings.push(finding("constraint_inverted", here, "min exceeds max"));
        }
        if let (Some(min), Some(max)) = (constraint.min_selections, constraint.max_selections)
            && min > max
        {
            findings.push(finding(
                "constraint_inverted",
                here,
                "min_selections exceeds max_selections",
            ));
        }
    }

    if let Some(rule) = &question.condition {
        lint_condition(question, rule, scope, lookup, here, findings);
    }

    if let Some(screen) = &question.disqualify {
        if screen.enabled && screen.rules.is_empty() {
            findings.push(finding(
                "disqualify_no_rules",
                here,
                "disqualification is enabled but has no rules",
            ));
        }
        for rule in &screen.rules {
            match rule {
                DisqualifyRule::Option { option } => {
                    if !question.options.is_empty() && question.option_by_text(option).is_none() {
                        findings.push(finding(
                            "disqualify_unknown_option",
                            here,
                            format!("disqualify rule references option '{option}' which does not exist"),
                        ));
                    }
                }
                DisqualifyRule::Date { value, .. } => {
                    if parse_date_text(value).is_none() {
                        findings.push(finding(
                            "disqualify_bad_date",
                            here,
                            format!("'{value}' is not a calendar date"),
                        ));
                    }
                }
                DisqualifyRule::Value { .. } => {}
            }
        }
    }
}

fn lint_condition(
    question: &QuestionSpec,
    rule: &crate::spec::ConditionRule,
    scope: &KeyScope,
    lookup: &QuestionLookup<'_>,
    here: &str,
    findings: &mut Vec<LintFinding>,
) {
    if rule.base.is_empty() {
        findings.push(finding(
            "condition_missing_base",
            here,
            "conditional logic names no base question",
        ));
        return;
    }
    let Some(base) = lookup.resolve(&rule.base) else {
        findings.push(finding(
            "condition_unresolvable",
            here,
            format!("conditional logic references unknown question {}", rule.base),
        ));
        return;
    };

    let kind = base.question.kind;
    let shape_ok = if kind.is_single_select() {
        matches!(rule.value, ConditionValue::Option { .. })
    } else if kind == QuestionType::MultiChoice {
        matches!(rule.value, ConditionValue::Options { .. })
    } else if kind.is_numeric() {
        matches!(rule.value, ConditionValue::Compare { .. })
    } else {
        findings.push(finding(
            "condition_unsupported_base",
            here,
            format!(
                "conditional logic on a '{}' base question is never satisfied",
                kind.label()
            ),
        ));
        return;
    };
    if !shape_ok {
        findings.push(finding(
            "condition_shape_mismatch",
            here,
            format!(
                "condition value does not fit a '{}' base question",
                kind.label()
            ),
        ));
    }
    if let ConditionValue::Compare {
        op: CompareOp::Unknown,
        ..
    } = rule.value
    {
        findings.push(finding(
            "unknown_operator",
            here,
            "unrecognized comparison operator; the dependent stays visible at runtime",
        ));
    }

    if base.scope == *scope {
        if base.question.sequence == question.sequence {
            findings.push(finding(
                "condition_self_reference",
                here,
                "question's visibility depends on its own answer",
            ));
        } else if base.question.sequence > question.sequence {
            findings.push(finding(
                "condition_forward_reference",
                here,
                "visibility depends on a question that comes later in the same flow",
            ));
        }
    } else if scope.is_main() && !base.scope.is_main() {
        findings.push(finding(
            "condition_branch_base",
            here,
            "main-flow visibility depends on a branch answer that may never be entered",
        ));
    }
}

fn lint_end_action(
    spec: &SurveySpec,
    end_action: &EndAction,
    location: &str,
    findings: &mut Vec<LintFinding>,
) {
    let EndAction::Jump { target } = end_action else {
        return;
    };
    match target {
        None => findings.push(finding(
            "jump_missing_target",
            location,
            "jump end action has no target sequence; the traversal falls back to resume",
        )),
        Some(sequence) => {
            if spec.index_of_sequence(*sequence).is_none() {
                findings.push(finding(
                    "jump_unknown_target",
                    location,
                    format!("jump targets sequence {sequence} which is not in the main flow"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{BranchSpec, ChoiceOption, ConditionRule, DisqualifySpec, QuestionRef};
    use serde_json::json;

    fn survey(questions: Vec<QuestionSpec>) -> SurveySpec {
        SurveySpec {
            id: "s".into(),
            title: "S".into(),
            version: "1".into(),
            description: None,
            settings: None,
            questions,
        }
    }

    fn codes(findings: &[LintFinding]) -> Vec<&str> {
        findings.iter().map(|finding| finding.code.as_str()).collect()
    }

    #[test]
    fn clean_survey_has_no_findings() {
        let mut pick = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick");
        pick.options = vec![ChoiceOption::new("A"), ChoiceOption::new("B")];
        let spec = survey(vec![pick, QuestionSpec::new(2, QuestionType::Text, "Notes")]);
        assert!(lint(&spec).is_empty());
    }

    #[test]
    fn jump_without_target_is_flagged() {
        let mut pick = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick");
        let mut option = ChoiceOption::new("Yes");
        option.branch = Some(BranchSpec {
            questions: vec![QuestionSpec::new(1, QuestionType::Text, "Inside")],
            end_action: EndAction::Jump { target: None },
        });
        pick.options = vec![option];
        let spec = survey(vec![pick]);
        assert!(codes(&lint(&spec)).contains(&"jump_missing_target"));
    }

    #[test]
    fn unresolvable_and_forward_conditions_are_flagged() {
        let mut q1 = QuestionSpec::new(1, QuestionType::Text, "One");
        q1.condition = Some(ConditionRule {
            base: QuestionRef::by_sequence(99),
            value: ConditionValue::Option { text: "X".into() },
        });
        let mut q2 = QuestionSpec::new(2, QuestionType::Text, "Two");
        q2.condition = Some(ConditionRule {
            base: QuestionRef::by_sequence(3),
            value: ConditionValue::Option { text: "Yes".into() },
        });
        let mut q3 = QuestionSpec::new(3, QuestionType::SingleChoice, "Three");
        q3.options = vec![ChoiceOption::new("Yes")];
        let spec = survey(vec![q1, q2, q3]);
        let findings = lint(&spec);
        let found = codes(&findings);
        assert!(found.contains(&"condition_unresolvable"));
        assert!(found.contains(&"condition_forward_reference"));
    }

    #[test]
    fn duplicate_sequences_and_missing_options_are_flagged() {
        let duplicate = QuestionSpec::new(1, QuestionType::Text, "Again");
        let bare = QuestionSpec::new(1, QuestionType::MultiChoice, "Bare");
        let spec = survey(vec![duplicate, bare]);
        let findings = lint(&spec);
        let found = codes(&findings);
        assert!(found.contains(&"duplicate_sequence"));
        assert!(found.contains(&"missing_options"));
    }

    #[test]
    fn disqualify_rules_are_checked_against_options() {
        let mut pick = QuestionSpec::new(1, QuestionType::SingleChoice, "Age");
        pick.options = vec![ChoiceOption::new("18+"), ChoiceOption::new("Under 18")];
        pick.disqualify = Some(DisqualifySpec {
            enabled: true,
            message: None,
            rules: vec![
                DisqualifyRule::Option {
                    option: "No such option".into(),
                },
                DisqualifyRule::Value {
                    condition: crate::spec::ValueCondition::Less,
                    value: json!(18),
                },
            ],
        });
        let spec = survey(vec![pick]);
        assert!(codes(&lint(&spec)).contains(&"disqualify_unknown_option"));
    }

    #[test]
    fn branches_on_multi_select_and_reused_uuids_are_flagged() {
        let mut multi = QuestionSpec::new(1, QuestionType::MultiChoice, "Pick any");
        let mut option = ChoiceOption::new("Yes");
        option.branch = Some(BranchSpec {
            questions: vec![QuestionSpec::new(1, QuestionType::Text, "Inside")],
            end_action: EndAction::Resume,
        });
        multi.options = vec![option, ChoiceOption::new("No")];
        multi.uuid = Some("dup".into());
        let mut twin = QuestionSpec::new(2, QuestionType::Text, "Twin");
        twin.uuid = Some("dup".into());
        let spec = survey(vec![multi, twin]);
        let findings = lint(&spec);
        let found = codes(&findings);
        assert!(found.contains(&"branch_on_unsupported_kind"));
        assert!(found.contains(&"duplicate_uuid"));
    }

    #[test]
    fn branch_flows_are_walked_recursively() {
        let mut inner = QuestionSpec::new(1, QuestionType::RadioGrid, "Grid");
        inner.rows = vec![];
        inner.columns = vec![];
        let mut pick = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick");
        let mut option = ChoiceOption::new("Yes");
        option.branch = Some(BranchSpec {
            questions: vec![inner],
            end_action: EndAction::Resume,
        });
        pick.options = vec![option];
        let spec = survey(vec![pick]);
        let findings = lint(&spec);
        let grid = findings
            .iter()
            .find(|finding| finding.code == "missing_grid_axes")
            .expect("grid finding");
        assert!(grid.location.contains("branch"));
    }
}
