use serde_json::Value;

use crate::answers::is_blank;
use crate::condition::{as_f64, calendar_date, parse_date_text, selected_texts};
use crate::spec::{
    DateCondition, DisqualifyRule, QuestionSpec, SurveySettings, ValueCondition,
};

/// Shown when neither the question nor the survey settings carry a custom
/// disqualification message.
pub const DEFAULT_DISQUALIFY_MESSAGE: &str =
    "Sorry, you do not qualify to complete this survey.";

/// Checks a freshly recorded answer against the question's screening rules.
/// First matching rule wins; a blank answer never disqualifies.
pub fn is_disqualified(question: &QuestionSpec, answer: &Value) -> bool {
    let Some(screen) = &question.disqualify else {
        return false;
    };
    if !screen.enabled || is_blank(answer) {
        return false;
    }
    screen.rules.iter().any(|rule| rule_matches(rule, answer))
}

/// Message precedence: question-level override, then survey settings, then
/// the built-in default.
pub fn disqualify_message<'a>(question: &'a QuestionSpec, settings: &'a SurveySettings) -> &'a str {
    question
        .disqualify
        .as_ref()
        .and_then(|screen| screen.message.as_deref())
        .filter(|message| !message.trim().is_empty())
        .or_else(|| {
            settings
                .disqualify_message
                .as_deref()
                .filter(|message| !message.trim().is_empty())
        })
        .unwrap_or(DEFAULT_DISQUALIFY_MESSAGE)
}

fn rule_matches(rule: &DisqualifyRule, answer: &Value) -> bool {
    match rule {
        DisqualifyRule::Option { option } => selected_texts(answer).contains(&option.as_str()),
        DisqualifyRule::Value { condition, value } => {
            let (Some(left), Some(right)) = (as_f64(answer), as_f64(value)) else {
                return false;
            };
            match condition {
                ValueCondition::Less => left < right,
                ValueCondition::Greater => left > right,
                ValueCondition::Equal => left == right,
            }
        }
        DisqualifyRule::Date { condition, value } => {
            let (Some(left), Some(right)) = (calendar_date(answer), parse_date_text(value)) else {
                return false;
            };
            match condition {
                DateCondition::Before => left < right,
                DateCondition::After => left > right,
                DateCondition::On => left == right,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{DisqualifySpec, QuestionType};
    use serde_json::json;

    fn screener(rules: Vec<DisqualifyRule>) -> QuestionSpec {
        let mut question = QuestionSpec::new(1, QuestionType::SingleChoice, "Age bracket");
        question.disqualify = Some(DisqualifySpec {
            enabled: true,
            message: None,
            rules,
        });
        question
    }

    #[test]
    fn option_rule_matches_any_selection() {
        let question = screener(vec![DisqualifyRule::Option {
            option: "Under 18".into(),
        }]);
        assert!(is_disqualified(&question, &json!("Under 18")));
        assert!(is_disqualified(&question, &json!(["25-34", "Under 18"])));
        assert!(!is_disqualified(&question, &json!("25-34")));
    }

    #[test]
    fn value_rule_compares_numerically() {
        let question = screener(vec![DisqualifyRule::Value {
            condition: ValueCondition::Less,
            value: json!(18),
        }]);
        assert!(is_disqualified(&question, &json!(17)));
        assert!(is_disqualified(&question, &json!("12")));
        assert!(!is_disqualified(&question, &json!(18)));
        assert!(!is_disqualified(&question, &json!("not a number")));
    }

    #[test]
    fn date_rule_uses_calendar_days() {
        let question = screener(vec![DisqualifyRule::Date {
            condition: DateCondition::After,
            value: "2024-06-30".into(),
        }]);
        assert!(is_disqualified(&question, &json!("2024-07-01")));
        assert!(is_disqualified(
            &question,
            &json!("2024-07-01T09:30:00+02:00")
        ));
        assert!(!is_disqualified(&question, &json!("2024-06-30")));
    }

    #[test]
    fn disabled_screen_never_fires() {
        let mut question = screener(vec![DisqualifyRule::Option {
            option: "Under 18".into(),
        }]);
        if let Some(screen) = &mut question.disqualify {
            screen.enabled = false;
        }
        assert!(!is_disqualified(&question, &json!("Under 18")));
    }

    #[test]
    fn blank_answer_never_disqualifies() {
        let question = screener(vec![DisqualifyRule::Option {
            option: "Under 18".into(),
        }]);
        assert!(!is_disqualified(&question, &Value::Null));
        assert!(!is_disqualified(&question, &json!([])));
    }

    #[test]
    fn message_precedence_prefers_question_then_settings() {
        let mut question = screener(vec![]);
        let mut settings = SurveySettings::default();
        assert_eq!(
            disqualify_message(&question, &settings),
            DEFAULT_DISQUALIFY_MESSAGE
        );

        settings.disqualify_message = Some("Survey-wide message".into());
        assert_eq!(disqualify_message(&question, &settings), "Survey-wide message");

        if let Some(screen) = &mut question.disqualify {
            screen.message = Some("Question message".into());
        }
        assert_eq!(disqualify_message(&question, &settings), "Question message");
    }
}
