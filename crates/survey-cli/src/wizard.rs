use std::fmt::Write;

use serde_json::Value;
use survey_spec::AnswerSet;

/// Controls which bits of session state the runner prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: question prompts only.
    Clean,
    /// Verbose output: status lines, progress, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and outcomes once the engine yields a question.
pub struct SurveyPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl SurveyPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, screen: &SessionScreen) {
        if self.header_printed {
            return;
        }
        println!("Survey: {}", screen.survey_title);
        self.header_printed = true;
    }

    pub fn show_status(&self, screen: &SessionScreen) {
        if self.verbosity.is_verbose() {
            println!(
                "Status: {} ({}/{})",
                screen.status.as_str(),
                screen.progress.answered,
                screen.progress.visible
            );
        }
    }

    pub fn show_prompt(&self, screen: &SessionScreen) {
        let Some(question) = &screen.question else {
            return;
        };
        let index = (screen.progress.answered + 1).max(1);
        let mut line = format!("{}/{} {}", index, screen.progress.visible, question.title);
        if question.depth > 0 {
            line.push_str(&format!(" [branch depth {}]", question.depth));
        }
        if question.required {
            line.push_str(" *");
        }
        if let Some(hint) = question.kind.hint(&question.options) {
            line.push(' ');
            line.push_str(&hint);
        }
        println!("{line}");
        if let Some(description) = &question.description {
            println!("{description}");
        }
        for (number, option) in question.options.iter().enumerate() {
            let mut entry = format!("  {}. {}", number + 1, option.text);
            if option.not_applicable {
                entry.push_str(" [n/a]");
            }
            if option.other_text {
                entry.push_str(" [other]");
            }
            println!("{entry}");
        }
        if !question.rows.is_empty() {
            println!("  Rows: {}", question.rows.join(", "));
            println!("  Columns: {}", question.columns.join(", "));
        }
        if let Some(value) = &question.current_value {
            println!("  Current answer: {value}");
        }
        if screen.can_go_back && self.verbosity.is_verbose() {
            println!("  (type 'back' to return to the previous question)");
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_blocked(&self, message: &str) {
        eprintln!("Invalid answer: {}", message);
    }

    pub fn show_completion(&self, answer_set: &AnswerSet, message: Option<&str>) {
        println!("Done ✅");
        if let Some(message) = message {
            println!("{message}");
        }
        match answer_set.to_cbor() {
            Ok(bytes) => {
                println!("Answers (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize answers to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match answer_set.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize answers to JSON: {}", err);
                }
            }
        }
    }

    pub fn show_disqualified(&self, message: Option<&str>) {
        println!("Screened out 🚫");
        if let Some(message) = message {
            println!("{message}");
        }
    }
}

/// One renderable snapshot extracted from the component's session payload.
pub struct SessionScreen {
    pub survey_title: String,
    pub status: SessionStatus,
    pub progress: ScreenProgress,
    pub can_go_back: bool,
    pub question: Option<ScreenQuestion>,
    /// Completion or disqualification message when the session is terminal.
    pub message: Option<String>,
    /// Validation message when the last step was refused.
    pub step_error: Option<String>,
    /// Serialized session state to hand back on the next call.
    pub session_json: String,
}

impl SessionScreen {
    pub fn from_envelope(envelope: &Value) -> Result<Self, String> {
        let status = envelope
            .get("status")
            .and_then(Value::as_str)
            .map(SessionStatus::from_label)
            .ok_or_else(|| "session payload missing status".to_string())?;
        let view = envelope
            .get("view")
            .ok_or_else(|| "session payload missing view".to_string())?;
        let survey_title = view
            .get("survey_title")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let progress = view
            .get("progress")
            .and_then(Value::as_object)
            .ok_or_else(|| "session payload missing progress".to_string())?;
        let answered = progress
            .get("answered")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let visible = progress.get("visible").and_then(Value::as_u64).unwrap_or(0) as usize;
        let can_go_back = view
            .get("can_go_back")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let question = view
            .get("question")
            .filter(|value| !value.is_null())
            .map(ScreenQuestion::from_json)
            .transpose()?;
        let message = view
            .get("message")
            .and_then(Value::as_str)
            .map(String::from);
        let step_error = envelope
            .pointer("/step/issue/message")
            .and_then(Value::as_str)
            .map(String::from);
        let session_json = envelope
            .get("session")
            .map(Value::to_string)
            .ok_or_else(|| "session payload missing session state".to_string())?;
        Ok(Self {
            survey_title,
            status,
            progress: ScreenProgress { answered, visible },
            can_go_back,
            question,
            message,
            step_error,
            session_json,
        })
    }
}

/// Progress counters over the currently-active path.
pub struct ScreenProgress {
    pub answered: usize,
    pub visible: usize,
}

/// Session status reported by the component surface.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    NeedInput,
    Complete,
    Disqualified,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NeedInput => "need_input",
            SessionStatus::Complete => "complete",
            SessionStatus::Disqualified => "disqualified",
            SessionStatus::Error => "error",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "complete" => SessionStatus::Complete,
            "disqualified" => SessionStatus::Disqualified,
            "error" => SessionStatus::Error,
            _ => SessionStatus::NeedInput,
        }
    }
}

/// Minimal view of the current question used for rendering prompts.
pub struct ScreenQuestion {
    pub sequence: u64,
    pub title: String,
    pub description: Option<String>,
    pub kind: QuestionKind,
    pub required: bool,
    pub depth: u64,
    pub options: Vec<ScreenOption>,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub current_value: Option<Value>,
}

pub struct ScreenOption {
    pub text: String,
    pub not_applicable: bool,
    pub other_text: bool,
}

impl ScreenQuestion {
    fn from_json(value: &Value) -> Result<Self, String> {
        let sequence = value
            .get("sequence")
            .and_then(Value::as_u64)
            .ok_or_else(|| "question missing sequence".to_string())?;
        let title = value
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("question {} missing title", sequence))?
            .to_string();
        let description = value
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);
        let kind_label = value.get("type").and_then(Value::as_str).unwrap_or("text");
        let kind = QuestionKind::from_label(kind_label);
        let required = value
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let depth = value.get("depth").and_then(Value::as_u64).unwrap_or(0);
        let options = value
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .map(|option| ScreenOption {
                        text: option
                            .get("text")
                            .and_then(Value::as_str)
                            .unwrap_or("")
                            .to_string(),
                        not_applicable: option
                            .get("not_applicable")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                        other_text: option
                            .get("other_text")
                            .and_then(Value::as_bool)
                            .unwrap_or(false),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let rows = string_list(value.get("rows"));
        let columns = string_list(value.get("columns"));
        let current_value = value.get("current_value").cloned();
        Ok(Self {
            sequence,
            title,
            description,
            kind,
            required,
            depth,
            options,
            rows,
            columns,
            current_value,
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Input families for answer parsing; grouped coarser than the definition's
/// question types because several kinds share an input shape.
#[derive(Copy, Clone)]
pub enum QuestionKind {
    SingleSelect,
    MultiChoice,
    Text,
    Number,
    Date,
    Grid,
    Ranking,
    Unknown,
}

impl QuestionKind {
    pub fn from_label(label: &str) -> Self {
        match label {
            "single_choice" | "dropdown" => QuestionKind::SingleSelect,
            "multi_choice" => QuestionKind::MultiChoice,
            "text" | "email" | "signature" => QuestionKind::Text,
            "number" | "rating" | "nps" => QuestionKind::Number,
            "date" => QuestionKind::Date,
            "radio_grid" | "checkbox_grid" | "rating_grid" => QuestionKind::Grid,
            "ranking" => QuestionKind::Ranking,
            _ => QuestionKind::Unknown,
        }
    }

    pub fn hint(&self, options: &[ScreenOption]) -> Option<String> {
        match self {
            QuestionKind::SingleSelect if !options.is_empty() => {
                Some(format!("(1-{} or option text)", options.len()))
            }
            QuestionKind::MultiChoice if !options.is_empty() => {
                Some("(comma-separated options)".to_string())
            }
            QuestionKind::Number => Some("(number)".to_string()),
            QuestionKind::Date => Some("(YYYY-MM-DD)".to_string()),
            QuestionKind::Grid => Some("(JSON object keyed by row)".to_string()),
            QuestionKind::Ranking => Some("(options in rank order, comma-separated)".to_string()),
            _ => None,
        }
    }
}

/// Error produced when parsing answers typed by the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{:02x}", byte).expect("writing to string cannot fail");
    }
    encoded
}
