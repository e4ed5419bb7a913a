use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use crate::answers::is_blank;
use crate::condition::{answer_text, as_f64, calendar_date, selected_texts};
use crate::spec::{QuestionSpec, QuestionType};

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Bounds applied to NPS answers when the question carries no explicit
/// constraint.
const NPS_MIN: f64 = 0.0;
const NPS_MAX: f64 = 10.0;

/// One reason the current answer blocks forward navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationIssue {
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    pub message: String,
    pub code: String,
}

/// Validates one question's answer. `None` means navigation may proceed.
///
/// A blank answer passes unless the question is required; a present answer is
/// checked against the question's kind and constraints even when optional.
/// Callers only invoke this for visible questions, so hidden answers are
/// never judged.
pub fn check_answer(question: &QuestionSpec, answer: Option<&Value>) -> Option<ValidationIssue> {
    let value = match answer {
        Some(value) if !is_blank(value) => value,
        _ => {
            return question
                .required
                .then(|| issue(question, "an answer is required", "required"));
        }
    };

    match question.kind {
        QuestionType::SingleChoice | QuestionType::Dropdown => check_single(question, value),
        QuestionType::MultiChoice => check_multi(question, value),
        QuestionType::Text => check_text(question, value),
        QuestionType::Email => check_email(question, value),
        QuestionType::Number | QuestionType::Rating => check_number(question, value, None),
        QuestionType::Nps => check_number(question, value, Some((NPS_MIN, NPS_MAX))),
        QuestionType::Date => check_date(question, value),
        QuestionType::RadioGrid | QuestionType::RatingGrid | QuestionType::CheckboxGrid => {
            check_grid(question, value)
        }
        QuestionType::Ranking => check_ranking(question, value),
        QuestionType::Signature => None,
    }
}

fn check_single(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let Some(text) = answer_text(value) else {
        return Some(issue(question, "expected a selected option", "type_mismatch"));
    };
    if !question.options.is_empty() && question.option_by_text(text).is_none() {
        return Some(issue(question, "not one of the listed options", "unknown_option"));
    }
    None
}

fn check_multi(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let selected = selected_texts(value);
    if selected.is_empty() {
        return Some(issue(question, "expected selected options", "type_mismatch"));
    }
    if !question.options.is_empty() {
        for text in &selected {
            if question.option_by_text(text).is_none() {
                return Some(issue(question, "not one of the listed options", "unknown_option"));
            }
        }
        // A lone special selection (not-applicable / other) satisfies the
        // question without meeting selection counts.
        if selected.len() == 1
            && let Some((_, option)) = question.option_by_text(selected[0])
            && option.is_special()
        {
            return None;
        }
    }

    let constraint = question.constraint.unwrap_or_default();
    if let Some(min) = constraint.min_selections
        && selected.len() < min
    {
        return Some(issue(question, "too few selections", "min_selections"));
    }
    if let Some(max) = constraint.max_selections
        && selected.len() > max
    {
        return Some(issue(question, "too many selections", "max_selections"));
    }
    None
}

fn check_text(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let Some(text) = value.as_str() else {
        return Some(issue(question, "expected text", "type_mismatch"));
    };
    let constraint = question.constraint.unwrap_or_default();
    if let Some(max_len) = constraint.max_len
        && text.len() > max_len
    {
        return Some(issue(question, "text longer than max length", "max_length"));
    }
    None
}

fn check_email(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let Some(text) = value.as_str() else {
        return Some(issue(question, "expected text", "type_mismatch"));
    };
    if let Ok(regex) = Regex::new(EMAIL_PATTERN)
        && !regex.is_match(text.trim())
    {
        return Some(issue(question, "not a valid email address", "email"));
    }
    None
}

fn check_number(
    question: &QuestionSpec,
    value: &Value,
    fallback: Option<(f64, f64)>,
) -> Option<ValidationIssue> {
    let Some(number) = as_f64(value) else {
        return Some(issue(question, "expected a number", "number"));
    };
    let constraint = question.constraint.unwrap_or_default();
    let (fallback_min, fallback_max) = match fallback {
        Some((min, max)) => (Some(min), Some(max)),
        None => (None, None),
    };
    if let Some(min) = constraint.min.or(fallback_min)
        && number < min
    {
        return Some(issue(question, "value below minimum", "min"));
    }
    if let Some(max) = constraint.max.or(fallback_max)
        && number > max
    {
        return Some(issue(question, "value above maximum", "max"));
    }
    None
}

fn check_date(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    if calendar_date(value).is_none() {
        return Some(issue(question, "expected a calendar date", "date"));
    }
    None
}

fn check_grid(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let Some(map) = value.as_object() else {
        return Some(issue(question, "expected one answer per row", "type_mismatch"));
    };
    // The N/A marker is a non-blank string, so explicitly skipped rows count
    // as answered.
    let incomplete = question
        .rows
        .iter()
        .any(|row| map.get(row).is_none_or(is_blank));
    if incomplete {
        return Some(issue(question, "answer every row", "grid_incomplete"));
    }
    None
}

fn check_ranking(question: &QuestionSpec, value: &Value) -> Option<ValidationIssue> {
    let Some(items) = value.as_array() else {
        return Some(issue(question, "expected a ranked list", "type_mismatch"));
    };
    let ranked: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
    if ranked.len() != items.len() {
        return Some(issue(question, "expected a ranked list", "type_mismatch"));
    }
    if question.options.is_empty() {
        return None;
    }
    let expected: BTreeSet<&str> = question
        .options
        .iter()
        .map(|option| option.text.as_str())
        .collect();
    let got: BTreeSet<&str> = ranked.iter().copied().collect();
    if got.len() != ranked.len() || got != expected {
        return Some(issue(question, "rank every item exactly once", "ranking_incomplete"));
    }
    None
}

fn issue(question: &QuestionSpec, message: &str, code: &str) -> ValidationIssue {
    ValidationIssue {
        sequence: question.sequence,
        uuid: question.uuid.clone(),
        message: message.into(),
        code: code.into(),
    }
}
