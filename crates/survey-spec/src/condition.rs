use chrono::NaiveDate;
use log::{debug, warn};
use serde_json::Value;

use crate::answers::{AnswerStore, is_blank};
use crate::refs::QuestionLookup;
use crate::spec::{CompareOp, ConditionRule, ConditionValue, MatchType, QuestionType};

/// Numeric coercion shared by conditions, branch rules, and disqualification:
/// JSON numbers and numeric strings parse, everything else is `None`.
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Calendar date with any time-of-day stripped. Accepts `YYYY-MM-DD` and
/// RFC 3339 timestamps.
pub(crate) fn calendar_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date_text)
}

pub(crate) fn parse_date_text(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|stamp| stamp.date_naive())
}

/// `None` for `CompareOp::Unknown`; callers fail open and warn.
pub(crate) fn compare_f64(op: CompareOp, left: f64, right: f64) -> Option<bool> {
    Some(match op {
        CompareOp::Eq => left == right,
        CompareOp::Neq => left != right,
        CompareOp::Gt => left > right,
        CompareOp::Gte => left >= right,
        CompareOp::Lt => left < right,
        CompareOp::Lte => left <= right,
        CompareOp::Unknown => return None,
    })
}

pub(crate) fn compare_dates(op: CompareOp, left: NaiveDate, right: NaiveDate) -> Option<bool> {
    Some(match op {
        CompareOp::Eq => left == right,
        CompareOp::Neq => left != right,
        CompareOp::Gt => left > right,
        CompareOp::Gte => left >= right,
        CompareOp::Lt => left < right,
        CompareOp::Lte => left <= right,
        CompareOp::Unknown => return None,
    })
}

/// Selected option text of a single-select answer; tolerates the
/// other-with-text object form `{"option": ..., "text": ...}`.
pub(crate) fn answer_text(value: &Value) -> Option<&str> {
    match value {
        Value::String(text) => Some(text),
        Value::Object(map) => map.get("option").and_then(Value::as_str),
        _ => None,
    }
}

/// Selected option texts of a multi-choice answer; a scalar string counts as
/// a one-element selection.
pub(crate) fn selected_texts(value: &Value) -> Vec<&str> {
    match value {
        Value::Array(items) => items.iter().filter_map(answer_text).collect(),
        other => answer_text(other).into_iter().collect(),
    }
}

/// Decides whether a dependent question's conditional-logic rule hides it
/// right now. `true` means skip.
///
/// Fail-closed when the base question was never answered, fail-open when the
/// rule itself cannot be evaluated (unresolvable reference, shape mismatch,
/// non-parsable numbers, unknown operator). Pure: the same `(rule, answers)`
/// pair always yields the same result.
pub fn should_skip(
    rule: Option<&ConditionRule>,
    lookup: &QuestionLookup<'_>,
    answers: &AnswerStore,
) -> bool {
    let Some(rule) = rule else {
        return false;
    };
    let Some(base) = lookup.resolve(&rule.base) else {
        warn!(
            "conditional logic references unknown question {}; leaving dependent visible",
            rule.base
        );
        return false;
    };
    let Some(answer) = answers.answer_for(base.question, &base.scope) else {
        return true;
    };
    if is_blank(answer) {
        return true;
    }

    let kind = base.question.kind;
    if kind.is_single_select() {
        let ConditionValue::Option { text } = &rule.value else {
            warn!("condition on {} expects an option value", rule.base);
            return false;
        };
        answer_text(answer) != Some(text.as_str())
    } else if kind == QuestionType::MultiChoice {
        let ConditionValue::Options {
            options,
            match_type,
        } = &rule.value
        else {
            warn!("condition on {} expects an options value", rule.base);
            return false;
        };
        let selected = selected_texts(answer);
        let holds = match match_type {
            MatchType::All => options
                .iter()
                .all(|option| selected.contains(&option.as_str())),
            MatchType::Any => options
                .iter()
                .any(|option| selected.contains(&option.as_str())),
        };
        !holds
    } else if kind.is_numeric() {
        let ConditionValue::Compare { op, value } = &rule.value else {
            warn!("condition on {} expects a comparison value", rule.base);
            return false;
        };
        let (Some(left), Some(right)) = (as_f64(answer), as_f64(value)) else {
            debug!("condition on {} has non-numeric operands", rule.base);
            return false;
        };
        match compare_f64(*op, left, right) {
            Some(holds) => !holds,
            None => {
                warn!("condition on {} uses an unknown operator", rule.base);
                false
            }
        }
    } else {
        warn!(
            "conditional logic on unsupported base kind '{}'",
            kind.label()
        );
        false
    }
}
