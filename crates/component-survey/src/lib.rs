use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use survey_spec::{
    AnswerStore, Position, SessionState, StepOutcome, SurveySpec, TemplateEngine, Traversal,
    TraversalError, answers_schema, build_session_view, lint, view_json, view_text,
};

const DEFAULT_SPEC: &str = include_str!("../../survey-spec/tests/fixtures/screener.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("survey '{0}' is not available")]
    SurveyUnavailable(String),
    #[error("failed to parse session state: {0}")]
    SessionParse(#[source] serde_json::Error),
    #[error("failed to parse answer value: {0}")]
    AnswerParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Session(#[from] TraversalError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    survey_spec_json: Option<String>,
}

fn load_survey_spec(config_json: &str) -> Result<SurveySpec, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let spec_json = config.survey_spec_json.as_deref().unwrap_or(DEFAULT_SPEC);

    serde_json::from_str(spec_json).map_err(ComponentError::ConfigParse)
}

fn ensure_survey(survey_id: &str, config_json: &str) -> Result<SurveySpec, ComponentError> {
    let spec = load_survey_spec(config_json)?;
    if spec.id != survey_id {
        Err(ComponentError::SurveyUnavailable(survey_id.to_string()))
    } else {
        Ok(spec)
    }
}

fn restore<'a>(spec: &'a SurveySpec, session_json: &str) -> Result<Traversal<'a>, ComponentError> {
    let state: SessionState =
        serde_json::from_str(session_json).map_err(ComponentError::SessionParse)?;
    Ok(Traversal::resume(spec, state)?)
}

fn session_answers(session_json: &str) -> AnswerStore {
    if session_json.trim().is_empty() {
        return AnswerStore::new();
    }
    serde_json::from_str::<SessionState>(session_json)
        .map(|state| state.answers)
        .unwrap_or_else(|_| AnswerStore::new())
}

fn parse_answers(answers_json: &str) -> AnswerStore {
    serde_json::from_str::<Value>(answers_json)
        .map(|value| AnswerStore::from_object(&value))
        .unwrap_or_else(|_| AnswerStore::new())
}

fn session_status(traversal: &Traversal<'_>, step: Option<&StepOutcome>) -> &'static str {
    if matches!(step, Some(StepOutcome::Blocked { .. })) {
        return "error";
    }
    match traversal.position() {
        Position::Question { .. } => "need_input",
        Position::Completed => "complete",
        Position::Disqualified { .. } => "disqualified",
    }
}

/// Common payload of the session-carrying operations: the status label, the
/// step outcome when a navigation op produced one, the serialized session the
/// host passes back on the next call, and the display view.
fn session_payload(
    traversal: &Traversal<'_>,
    step: Option<StepOutcome>,
) -> Result<Value, ComponentError> {
    let engine = TemplateEngine::new();
    let view = build_session_view(traversal, &engine);
    let mut map = Map::new();
    map.insert(
        "status".into(),
        json!(session_status(traversal, step.as_ref())),
    );
    if let Some(step) = step {
        let step = serde_json::to_value(step).map_err(ComponentError::JsonEncode)?;
        map.insert("step".into(), step);
    }
    let session = serde_json::to_value(traversal.state()).map_err(ComponentError::JsonEncode)?;
    map.insert("session".into(), session);
    map.insert("view".into(), view_json(&view));
    Ok(Value::Object(map))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(survey_id: &str, config_json: &str) -> String {
    respond(
        ensure_survey(survey_id, config_json)
            .and_then(|spec| serde_json::to_value(spec).map_err(ComponentError::JsonEncode)),
    )
}

pub fn lint_survey(survey_id: &str, config_json: &str) -> String {
    respond(
        ensure_survey(survey_id, config_json)
            .and_then(|spec| serde_json::to_value(lint(&spec)).map_err(ComponentError::JsonEncode)),
    )
}

/// JSON Schema of the answers a submission would need right now. Follows the
/// session's stored answers, so conditionally hidden questions and inactive
/// branches stay out of the schema.
pub fn get_answer_schema(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).map(|spec| {
        let answers = session_answers(session_json);
        answers_schema(&spec, &answers)
    }))
}

/// Open a fresh session positioned on the first visible question. An
/// `answers_json` object (uuid- or sequence-keyed) seeds the session with
/// previously collected answers; visibility is derived from them.
pub fn start(survey_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let traversal = Traversal::start_with(&spec, parse_answers(answers_json))?;
        session_payload(&traversal, None)
    }))
}

/// Record or clear the current question's answer without moving the cursor.
pub fn set_answer(
    survey_id: &str,
    config_json: &str,
    session_json: &str,
    value_json: &str,
) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let mut traversal = restore(&spec, session_json)?;
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::AnswerParse)?;
        traversal.set_answer(value)?;
        session_payload(&traversal, None)
    }))
}

/// Accumulate host-reported time spent on the current question.
pub fn record_elapsed(
    survey_id: &str,
    config_json: &str,
    session_json: &str,
    seconds: u64,
) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let mut traversal = restore(&spec, session_json)?;
        traversal.record_elapsed(seconds)?;
        session_payload(&traversal, None)
    }))
}

/// Forward navigation. The `step` field of the payload reports whether the
/// cursor moved, the answer was rejected, a branch end action finished the
/// survey, or a disqualification rule fired.
pub fn next(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let mut traversal = restore(&spec, session_json)?;
        let step = traversal.advance()?;
        session_payload(&traversal, Some(step))
    }))
}

/// Backward navigation; `at_start` when no earlier visible question exists.
pub fn previous(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let mut traversal = restore(&spec, session_json)?;
        let step = traversal.retreat()?;
        session_payload(&traversal, Some(step))
    }))
}

/// Final gate: succeeds only when no visible question remains unanswered.
pub fn submit(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let mut traversal = restore(&spec, session_json)?;
        let step = traversal.submit()?;
        session_payload(&traversal, Some(step))
    }))
}

pub fn render_text(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond_string(ensure_survey(survey_id, config_json).and_then(|spec| {
        let traversal = restore(&spec, session_json)?;
        let engine = TemplateEngine::new();
        Ok(view_text(&build_session_view(&traversal, &engine)))
    }))
}

pub fn render_json(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let traversal = restore(&spec, session_json)?;
        let engine = TemplateEngine::new();
        Ok(view_json(&build_session_view(&traversal, &engine)))
    }))
}

/// Submission payload of the active path: primary-keyed answers plus any
/// recorded per-question elapsed times.
pub fn export_answers(survey_id: &str, config_json: &str, session_json: &str) -> String {
    respond(ensure_survey(survey_id, config_json).and_then(|spec| {
        let traversal = restore(&spec, session_json)?;
        serde_json::to_value(traversal.export()).map_err(ComponentError::JsonEncode)
    }))
}
