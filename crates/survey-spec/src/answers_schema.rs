use serde_json::{Map, Value, json};

use crate::answers::AnswerStore;
use crate::refs::primary_key;
use crate::spec::{QuestionSpec, QuestionType, SurveySpec};
use crate::traversal::active_flow;

/// JSON schema for the answers object as it stands right now: one property
/// per currently-visible question on the active path, keyed by primary key.
/// Hidden questions and inactive branches contribute nothing, so the schema
/// shifts as answers change.
pub fn generate(spec: &SurveySpec, answers: &AnswerStore) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for entry in active_flow(spec, answers) {
        let key = primary_key(entry.question, &entry.scope);
        properties.insert(key.clone(), question_schema(entry.question));
        if entry.question.required {
            required.push(Value::String(key));
        }
    }
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": true,
    })
}

fn question_schema(question: &QuestionSpec) -> Value {
    let constraint = question.constraint.unwrap_or_default();
    let mut schema = match question.kind {
        QuestionType::SingleChoice | QuestionType::Dropdown => enum_string(question),
        QuestionType::MultiChoice => {
            let mut map = Map::new();
            map.insert("type".into(), json!("array"));
            map.insert("items".into(), enum_string(question));
            if let Some(min) = constraint.min_selections {
                map.insert("minItems".into(), json!(min));
            }
            if let Some(max) = constraint.max_selections {
                map.insert("maxItems".into(), json!(max));
            }
            Value::Object(map)
        }
        QuestionType::Text | QuestionType::Signature => {
            let mut map = Map::new();
            map.insert("type".into(), json!("string"));
            if let Some(max_len) = constraint.max_len {
                map.insert("maxLength".into(), json!(max_len));
            }
            Value::Object(map)
        }
        QuestionType::Email => json!({ "type": "string", "format": "email" }),
        QuestionType::Number | QuestionType::Rating | QuestionType::Nps => {
            let mut map = Map::new();
            map.insert("type".into(), json!("number"));
            let (fallback_min, fallback_max) = if question.kind == QuestionType::Nps {
                (Some(0.0), Some(10.0))
            } else {
                (None, None)
            };
            if let Some(min) = constraint.min.or(fallback_min) {
                map.insert("minimum".into(), json!(min));
            }
            if let Some(max) = constraint.max.or(fallback_max) {
                map.insert("maximum".into(), json!(max));
            }
            Value::Object(map)
        }
        QuestionType::Date => json!({ "type": "string", "format": "date" }),
        QuestionType::RadioGrid | QuestionType::RatingGrid | QuestionType::CheckboxGrid => {
            grid_schema(question)
        }
        QuestionType::Ranking => {
            let texts = option_texts(question);
            let count = texts.len();
            let mut map = Map::new();
            map.insert("type".into(), json!("array"));
            map.insert("items".into(), enum_string(question));
            map.insert("uniqueItems".into(), json!(true));
            if count > 0 {
                map.insert("minItems".into(), json!(count));
                map.insert("maxItems".into(), json!(count));
            }
            Value::Object(map)
        }
    };
    if let Value::Object(map) = &mut schema {
        map.insert("title".into(), json!(question.title));
    }
    schema
}

fn option_texts(question: &QuestionSpec) -> Vec<&str> {
    question
        .options
        .iter()
        .map(|option| option.text.as_str())
        .collect()
}

fn enum_string(question: &QuestionSpec) -> Value {
    let texts = option_texts(question);
    // An other-with-text option carries free text, so the enum cannot be
    // closed over the listed values.
    let open = texts.is_empty() || question.options.iter().any(|option| option.other_text);
    if open {
        json!({ "type": "string" })
    } else {
        json!({ "type": "string", "enum": texts })
    }
}

fn grid_schema(question: &QuestionSpec) -> Value {
    let na = question.grid_na_marker();
    let cell = match question.kind {
        QuestionType::CheckboxGrid => json!({
            "anyOf": [
                { "type": "array", "items": { "type": "string", "enum": question.columns } },
                { "const": na },
            ]
        }),
        QuestionType::RatingGrid => json!({
            "anyOf": [
                { "type": "number" },
                { "const": na },
            ]
        }),
        _ => {
            let mut values: Vec<&str> = question.columns.iter().map(String::as_str).collect();
            values.push(na);
            json!({ "type": "string", "enum": values })
        }
    };
    let properties: Map<String, Value> = question
        .rows
        .iter()
        .map(|row| (row.clone(), cell.clone()))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": question.rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::KeyScope;
    use crate::spec::{BranchSpec, ChoiceOption, EndAction};

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

    #[test]
    fn required_visible_questions_are_listed() {
        let mut q1 = QuestionSpec::new(1, QuestionType::SingleChoice, "Pick");
        q1.uuid = Some("q-pick".into());
        q1.required = true;
        q1.options = vec![ChoiceOption::new("Red"), ChoiceOption::new("Blue")];
        let spec = survey(vec![q1, QuestionSpec::new(2, QuestionType::Text, "Notes")]);

        let schema = generate(&spec, &AnswerStore::new());
        assert_eq!(schema["required"], json!(["q-pick"]));
        assert_eq!(
            schema["properties"]["q-pick"]["enum"],
            json!(["Red", "Blue"])
        );
        assert_eq!(schema["properties"]["2"]["type"], json!("string"));
    }

    #[test]
    fn active_branch_questions_appear_with_scoped_keys() {
        let mut owner = QuestionSpec::new(1, QuestionType::SingleChoice, "Branch?");
        let mut yes = ChoiceOption::new("Yes");
        yes.branch = Some(BranchSpec {
            questions: vec![QuestionSpec::new(1, QuestionType::Number, "How many?")],
            end_action: EndAction::Resume,
        });
        owner.options = vec![ChoiceOption::new("No"), yes];
        let spec = survey(vec![owner]);

        let empty = generate(&spec, &AnswerStore::new());
        assert!(empty["properties"].get("b1o1.1").is_none());

        let mut answers = AnswerStore::new();
        answers.insert(&spec.questions[0], &KeyScope::Main, json!("Yes"));
        let active = generate(&spec, &answers);
        assert_eq!(active["properties"]["b1o1.1"]["type"], json!("number"));
    }

    #[test]
    fn nps_gets_default_bounds() {
        let spec = survey(vec![QuestionSpec::new(1, QuestionType::Nps, "Recommend?")]);
        let schema = generate(&spec, &AnswerStore::new());
        assert_eq!(schema["properties"]["1"]["minimum"], json!(0.0));
        assert_eq!(schema["properties"]["1"]["maximum"], json!(10.0));
    }
}
