use serde_json::{Map, Value, json};

use crate::spec::SurveySpec;
use crate::template::TemplateEngine;
use crate::traversal::{Position, Progress, Traversal};

/// Session status labels exposed to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    InProgress,
    Completed,
    Disqualified,
}

impl ViewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewStatus::InProgress => "in_progress",
            ViewStatus::Completed => "completed",
            ViewStatus::Disqualified => "disqualified",
        }
    }
}

/// One selectable option prepared for display.
#[derive(Debug, Clone)]
pub struct OptionView {
    pub text: String,
    pub not_applicable: bool,
    pub other_text: bool,
}

/// The current question prepared for display: text templated against earlier
/// answers, options and grid axes flattened.
#[derive(Debug, Clone)]
pub struct QuestionView {
    pub sequence: u32,
    pub uuid: Option<String>,
    pub kind: &'static str,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    /// Branch nesting depth, zero in the main flow.
    pub depth: usize,
    pub options: Vec<OptionView>,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub current_value: Option<Value>,
}

/// Collected payload used by both text and JSON views.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub survey_id: String,
    pub survey_title: String,
    pub survey_version: String,
    pub status: ViewStatus,
    pub progress: Progress,
    pub can_go_back: bool,
    pub question: Option<QuestionView>,
    /// Completion or disqualification message when the session is terminal.
    pub message: Option<String>,
}

/// Build the view payload for the session's current state.
pub fn build_session_view(traversal: &Traversal<'_>, engine: &TemplateEngine<'_>) -> SessionView {
    let spec: &SurveySpec = traversal.spec();
    let (status, message) = match traversal.position() {
        Position::Question { .. } => (ViewStatus::InProgress, None),
        Position::Completed => {
            let message = spec
                .settings
                .as_ref()
                .and_then(|settings| settings.completion_message.clone());
            (ViewStatus::Completed, message)
        }
        Position::Disqualified { message } => (ViewStatus::Disqualified, Some(message.clone())),
    };

    let question = traversal.current().map(|current| QuestionView {
        sequence: current.question.sequence,
        uuid: current.question.uuid.clone(),
        kind: current.question.kind.label(),
        title: engine.question_title(current.question, traversal.answers()),
        description: engine.question_description(current.question, traversal.answers()),
        required: current.question.required,
        depth: current.depth,
        options: current
            .question
            .options
            .iter()
            .map(|option| OptionView {
                text: option.text.clone(),
                not_applicable: option.not_applicable,
                other_text: option.other_text,
            })
            .collect(),
        rows: current.question.rows.clone(),
        columns: current.question.columns.clone(),
        current_value: traversal.current_answer().cloned(),
    });

    SessionView {
        survey_id: spec.id.clone(),
        survey_title: spec.title.clone(),
        survey_version: spec.version.clone(),
        status,
        progress: traversal.progress(),
        can_go_back: traversal.can_retreat(),
        question,
        message,
    }
}

/// Render the view as a structured JSON-friendly value.
pub fn view_json(view: &SessionView) -> Value {
    let question = view.question.as_ref().map(|question| {
        let mut map = Map::new();
        map.insert("sequence".into(), json!(question.sequence));
        if let Some(uuid) = &question.uuid {
            map.insert("uuid".into(), json!(uuid));
        }
        map.insert("type".into(), json!(question.kind));
        map.insert("title".into(), json!(question.title));
        if let Some(description) = &question.description {
            map.insert("description".into(), json!(description));
        }
        map.insert("required".into(), json!(question.required));
        map.insert("depth".into(), json!(question.depth));
        if !question.options.is_empty() {
            let options = question
                .options
                .iter()
                .map(|option| {
                    let mut entry = Map::new();
                    entry.insert("text".into(), json!(option.text));
                    if option.not_applicable {
                        entry.insert("not_applicable".into(), json!(true));
                    }
                    if option.other_text {
                        entry.insert("other_text".into(), json!(true));
                    }
                    Value::Object(entry)
                })
                .collect::<Vec<_>>();
            map.insert("options".into(), Value::Array(options));
        }
        if !question.rows.is_empty() {
            map.insert("rows".into(), json!(question.rows));
            map.insert("columns".into(), json!(question.columns));
        }
        if let Some(value) = &question.current_value {
            map.insert("current_value".into(), value.clone());
        }
        Value::Object(map)
    });

    json!({
        "survey_id": view.survey_id,
        "survey_title": view.survey_title,
        "survey_version": view.survey_version,
        "status": view.status.as_str(),
        "progress": {
            "answered": view.progress.answered,
            "visible": view.progress.visible,
            "percent": view.progress.percent(),
        },
        "can_go_back": view.can_go_back,
        "question": question,
        "message": view.message,
    })
}

/// Render the view as human-friendly text.
pub fn view_text(view: &SessionView) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Survey: {} ({})", view.survey_title, view.survey_id));
    lines.push(format!(
        "Status: {} ({}/{})",
        view.status.as_str(),
        view.progress.answered,
        view.progress.visible
    ));
    if let Some(message) = &view.message {
        lines.push(format!("Message: {message}"));
    }

    if let Some(question) = &view.question {
        let mut heading = format!("Question {}: {}", question.sequence, question.title);
        if question.depth > 0 {
            heading.push_str(&format!(" [branch depth {}]", question.depth));
        }
        lines.push(heading);
        if let Some(description) = &question.description {
            lines.push(format!("  {description}"));
        }
        if question.required {
            lines.push("  Required: yes".to_string());
        }
        if !question.options.is_empty() {
            lines.push("  Options:".to_string());
            for (index, option) in question.options.iter().enumerate() {
                let mut entry = format!("   {}. {}", index + 1, option.text);
                if option.not_applicable {
                    entry.push_str(" [n/a]");
                }
                if option.other_text {
                    entry.push_str(" [other]");
                }
                lines.push(entry);
            }
        }
        if !question.rows.is_empty() {
            lines.push(format!("  Rows: {}", question.rows.join(", ")));
            lines.push(format!("  Columns: {}", question.columns.join(", ")));
        }
        if let Some(value) = &question.current_value {
            lines.push(format!("  Current answer: {value}"));
        }
    }

    lines.join("\n")
}
