mod wizard;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use component_survey::{
    export_answers, get_answer_schema, lint_survey, next as survey_next,
    previous as survey_previous, set_answer as survey_set_answer, start as survey_start,
};
use serde_json::{Number, Value, json};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use survey_spec::AnswerSet;
use wizard::{
    AnswerParseError, QuestionKind, ScreenQuestion, SessionScreen, SessionStatus, SurveyPresenter,
    Verbosity,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Text-based survey runner",
    long_about = "Runs branching surveys in a text shell, with validation, lint, and schema helpers backed by the survey component"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a survey interactively in a text shell.
    Run {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional JSON file with previously collected answers to seed from.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Show verbose output (status lines, progress, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the final answers as pretty JSON.
        #[arg(long)]
        answers_json: bool,
        /// Render output mode for each step.
        #[arg(long, value_enum, default_value_t = RenderMode::Text)]
        format: RenderMode,
    },
    /// Walk an answers file through the survey without prompting.
    Validate {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Path to the answers JSON file.
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
    },
    /// Report authoring-time configuration errors in a survey definition.
    Lint {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
    },
    /// Print the JSON schema of the answers a submission needs.
    Schema {
        /// Path to the survey definition JSON.
        #[arg(long, value_name = "SPEC")]
        spec: PathBuf,
        /// Optional answers file; question visibility follows these answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
    },
}

fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            spec,
            answers,
            verbose,
            answers_json,
            format,
        } => run_survey(spec, answers, verbose, answers_json, format),
        Command::Validate { spec, answers } => run_validate(spec, answers),
        Command::Lint { spec } => run_lint(spec),
        Command::Schema { spec, answers } => run_schema(spec, answers),
    }
}

fn run_survey(
    spec_path: PathBuf,
    answers_path: Option<PathBuf>,
    verbose: bool,
    answers_json: bool,
    format: RenderMode,
) -> CliResult<()> {
    let spec_str = fs::read_to_string(&spec_path)?;
    let (survey_id, config_json) = survey_config(&spec_str)?;
    let seed = match answers_path {
        Some(path) => fs::read_to_string(path)?,
        None => String::new(),
    };

    let mut presenter = SurveyPresenter::new(Verbosity::from_verbose(verbose), answers_json);
    let mut envelope = component_result(&survey_start(&survey_id, &config_json, &seed))?;

    loop {
        let screen = SessionScreen::from_envelope(&envelope)?;
        if let Some(issue) = &screen.step_error {
            presenter.show_blocked(issue);
        }
        match screen.status {
            SessionStatus::Complete => {
                let set = fetch_answer_set(&survey_id, &config_json, &screen.session_json)?;
                presenter.show_completion(&set, screen.message.as_deref());
                break;
            }
            SessionStatus::Disqualified => {
                presenter.show_disqualified(screen.message.as_deref());
                break;
            }
            SessionStatus::NeedInput | SessionStatus::Error => {}
        }

        if matches!(format, RenderMode::Json) {
            println!("View:\n{}", serde_json::to_string_pretty(&envelope["view"])?);
        }
        presenter.show_header(&screen);
        presenter.show_status(&screen);
        let Some(question) = &screen.question else {
            return Err("survey session yielded no question to show".into());
        };
        presenter.show_prompt(&screen);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input closed before the survey finished".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("survey aborted by user".into());
        }
        if trimmed.eq_ignore_ascii_case("back") {
            let stepped =
                component_result(&survey_previous(&survey_id, &config_json, &screen.session_json))?;
            if stepped["step"]["outcome"] == "at_start" {
                println!("Already at the first question.");
            }
            envelope = stepped;
            continue;
        }

        let value = match parse_answer(question, trimmed) {
            Ok(value) => value,
            Err(error) => {
                presenter.show_parse_error(&error);
                continue;
            }
        };
        let value_json = serde_json::to_string(&value)?;
        let written = component_result(&survey_set_answer(
            &survey_id,
            &config_json,
            &screen.session_json,
            &value_json,
        ))?;
        let session = written["session"].to_string();
        envelope = component_result(&survey_next(&survey_id, &config_json, &session))?;
    }

    Ok(())
}

/// Non-interactive traversal of an answers file. Completion and
/// disqualification are both clean exits; a validation refusal is not.
fn run_validate(spec_path: PathBuf, answers_path: PathBuf) -> CliResult<()> {
    let spec_str = fs::read_to_string(&spec_path)?;
    let (survey_id, config_json) = survey_config(&spec_str)?;
    let answers_str = fs::read_to_string(&answers_path)?;

    let mut envelope = component_result(&survey_start(&survey_id, &config_json, &answers_str))?;
    loop {
        let screen = SessionScreen::from_envelope(&envelope)?;
        if let Some(issue) = &screen.step_error {
            println!("Validation result: invalid");
            if let Some(question) = &screen.question {
                println!("  question {}: {}", question.sequence, issue);
            } else {
                println!("  {}", issue);
            }
            return Err("validation failed".into());
        }
        match screen.status {
            SessionStatus::Complete => {
                println!("Validation result: valid");
                let set = fetch_answer_set(&survey_id, &config_json, &screen.session_json)?;
                println!("{}", set.to_json_pretty()?);
                return Ok(());
            }
            SessionStatus::Disqualified => {
                println!("Validation result: disqualified");
                if let Some(message) = &screen.message {
                    println!("  {message}");
                }
                return Ok(());
            }
            SessionStatus::NeedInput | SessionStatus::Error => {}
        }
        envelope = component_result(&survey_next(&survey_id, &config_json, &screen.session_json))?;
    }
}

fn run_lint(spec_path: PathBuf) -> CliResult<()> {
    let spec_str = fs::read_to_string(&spec_path)?;
    let (survey_id, config_json) = survey_config(&spec_str)?;
    let findings = component_result(&lint_survey(&survey_id, &config_json))?;
    let findings = findings.as_array().cloned().unwrap_or_default();
    if findings.is_empty() {
        println!("No findings.");
        return Ok(());
    }
    println!("{} finding(s):", findings.len());
    for finding in &findings {
        println!(
            "  [{}] {} ({})",
            finding["code"].as_str().unwrap_or("unknown"),
            finding["message"].as_str().unwrap_or(""),
            finding["location"].as_str().unwrap_or("survey"),
        );
    }
    Err("lint found configuration errors".into())
}

fn run_schema(spec_path: PathBuf, answers_path: Option<PathBuf>) -> CliResult<()> {
    let spec_str = fs::read_to_string(&spec_path)?;
    let (survey_id, config_json) = survey_config(&spec_str)?;
    let session_json = match answers_path {
        Some(path) => {
            let answers_str = fs::read_to_string(path)?;
            let envelope = component_result(&survey_start(&survey_id, &config_json, &answers_str))?;
            envelope["session"].to_string()
        }
        None => String::new(),
    };
    let schema = component_result(&get_answer_schema(&survey_id, &config_json, &session_json))?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn survey_config(spec_str: &str) -> CliResult<(String, String)> {
    let spec_value: Value = serde_json::from_str(spec_str)?;
    let survey_id = spec_value
        .get("id")
        .and_then(Value::as_str)
        .ok_or("survey definition is missing an id")?
        .to_string();
    let config_json = json!({ "survey_spec_json": spec_str }).to_string();
    Ok((survey_id, config_json))
}

fn component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn fetch_answer_set(survey_id: &str, config_json: &str, session_json: &str) -> CliResult<AnswerSet> {
    let payload = component_result(&export_answers(survey_id, config_json, session_json))?;
    Ok(serde_json::from_value(payload)?)
}

fn parse_answer(question: &ScreenQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        if question.required {
            return Err(AnswerParseError::new(
                "This question requires an answer.",
                None,
            ));
        }
        // Blank clears any stored answer and moves on.
        return Ok(Value::Null);
    }

    match question.kind {
        QuestionKind::SingleSelect => parse_selection(question, trimmed),
        QuestionKind::MultiChoice => parse_multi_selection(question, trimmed),
        QuestionKind::Number => parse_number(trimmed),
        QuestionKind::Date => parse_date(trimmed),
        QuestionKind::Grid => parse_grid(question, trimmed),
        QuestionKind::Ranking => parse_ranking(question, trimmed),
        QuestionKind::Text | QuestionKind::Unknown => Ok(Value::String(trimmed.to_string())),
    }
}

/// Match user input against the option list: a 1-based number or the option
/// text (case-insensitive). Returns the canonical option text.
fn match_option(question: &ScreenQuestion, raw: &str) -> Option<String> {
    if let Ok(number) = raw.parse::<usize>()
        && number >= 1
        && let Some(option) = question.options.get(number - 1)
    {
        return Some(option.text.clone());
    }
    question
        .options
        .iter()
        .find(|option| option.text.eq_ignore_ascii_case(raw))
        .map(|option| option.text.clone())
}

fn option_texts(question: &ScreenQuestion) -> Vec<&str> {
    question
        .options
        .iter()
        .map(|option| option.text.as_str())
        .collect()
}

fn parse_selection(question: &ScreenQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    if let Some(text) = match_option(question, raw) {
        return Ok(Value::String(text));
    }
    Err(AnswerParseError::new(
        format!("Choose one of: {}.", option_texts(question).join(", ")),
        Some(format!(
            "the option text or its number (1-{})",
            question.options.len()
        )),
    ))
}

fn parse_multi_selection(question: &ScreenQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    let mut selected = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match match_option(question, part) {
            Some(text) => selected.push(Value::String(text)),
            None => {
                return Err(AnswerParseError::new(
                    format!(
                        "'{}' is not an option. Choose from: {}.",
                        part,
                        option_texts(question).join(", ")
                    ),
                    Some("comma-separated option texts or numbers".to_string()),
                ));
            }
        }
    }
    if selected.is_empty() {
        return Err(AnswerParseError::new(
            "Select at least one option.",
            Some("comma-separated option texts or numbers".to_string()),
        ));
    }
    Ok(Value::Array(selected))
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(int_value) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(int_value)));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            AnswerParseError::new("Please enter a number.", Some("a finite number".to_string()))
        })
}

fn parse_date(raw: &str) -> Result<Value, AnswerParseError> {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(_) => Ok(Value::String(raw.to_string())),
        Err(_) => Err(AnswerParseError::new(
            "Please enter a date as YYYY-MM-DD.",
            Some("a calendar date like 2025-06-30".to_string()),
        )),
    }
}

fn parse_grid(question: &ScreenQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(AnswerParseError::new(
            "Grid answers must be a JSON object keyed by row.",
            Some(format!("an object with rows: {}", question.rows.join(", "))),
        )),
        Err(err) => Err(AnswerParseError::new(
            "Invalid grid; provide a JSON object (e.g. {\"Row\": \"Column\"}).",
            Some(err.to_string()),
        )),
    }
}

fn parse_ranking(question: &ScreenQuestion, raw: &str) -> Result<Value, AnswerParseError> {
    if raw.starts_with('[') {
        return match serde_json::from_str::<Value>(raw) {
            Ok(value) if value.is_array() => Ok(value),
            Ok(_) => Err(AnswerParseError::new(
                "Ranking answers must be a JSON array.",
                Some("an array of option texts in rank order".to_string()),
            )),
            Err(err) => Err(AnswerParseError::new(
                "Invalid ranking; provide a JSON array or a comma-separated list.",
                Some(err.to_string()),
            )),
        };
    }
    let mut ranked = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match match_option(question, part) {
            Some(text) => ranked.push(Value::String(text)),
            None => {
                return Err(AnswerParseError::new(
                    format!(
                        "'{}' is not an option. Rank these: {}.",
                        part,
                        option_texts(question).join(", ")
                    ),
                    Some("every option exactly once, in order".to_string()),
                ));
            }
        }
    }
    if ranked.is_empty() {
        return Err(AnswerParseError::new(
            "Rank the listed options.",
            Some("every option exactly once, in order".to_string()),
        ));
    }
    Ok(Value::Array(ranked))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;
    use serde_json::json;
    use std::fs;
    use crate::wizard::ScreenOption;
    use tempfile::TempDir;

    const SCREENER: &str = include_str!("../../survey-spec/tests/fixtures/screener.json");

    fn question_of(kind: QuestionKind, options: &[&str]) -> ScreenQuestion {
        ScreenQuestion {
            sequence: 1,
            title: "Q".into(),
            description: None,
            kind,
            required: true,
            depth: 0,
            options: options
                .iter()
                .map(|text| ScreenOption {
                    text: (*text).to_string(),
                    not_applicable: false,
                    other_text: false,
                })
                .collect(),
            rows: vec!["Support".into(), "Docs".into()],
            columns: vec!["Good".into(), "Bad".into()],
            current_value: None,
        }
    }

    #[test]
    fn parse_answer_selects_options_by_number_or_text() {
        let question = question_of(QuestionKind::SingleSelect, &["Red", "Blue"]);
        assert_eq!(parse_answer(&question, "2").unwrap(), json!("Blue"));
        assert_eq!(parse_answer(&question, "red").unwrap(), json!("Red"));
        assert!(parse_answer(&question, "Green").is_err());
    }

    #[test]
    fn parse_answer_splits_multi_choice_input() {
        let question = question_of(QuestionKind::MultiChoice, &["Price", "Quality", "Support"]);
        assert_eq!(
            parse_answer(&question, "1, support").unwrap(),
            json!(["Price", "Support"])
        );
        assert!(parse_answer(&question, "Price, Speed").is_err());
    }

    #[test]
    fn parse_answer_keeps_integers_integral() {
        let question = question_of(QuestionKind::Number, &[]);
        assert_eq!(parse_answer(&question, "42").unwrap(), json!(42));
        assert_eq!(parse_answer(&question, "2.5").unwrap(), json!(2.5));
        assert!(parse_answer(&question, "many").is_err());
    }

    #[test]
    fn parse_answer_checks_date_shape() {
        let question = question_of(QuestionKind::Date, &[]);
        assert_eq!(
            parse_answer(&question, "2024-02-29").unwrap(),
            json!("2024-02-29")
        );
        assert!(parse_answer(&question, "02/29/2024").is_err());
    }

    #[test]
    fn parse_answer_requires_grid_objects() {
        let question = question_of(QuestionKind::Grid, &[]);
        let value = parse_answer(&question, r#"{"Support": "Good", "Docs": "Bad"}"#).unwrap();
        assert!(value.is_object());
        assert!(parse_answer(&question, r#"["Good"]"#).is_err());
    }

    #[test]
    fn parse_answer_ranks_by_comma_list() {
        let question = question_of(QuestionKind::Ranking, &["Speed", "Price"]);
        assert_eq!(
            parse_answer(&question, "price, speed").unwrap(),
            json!(["Price", "Speed"])
        );
        assert!(parse_answer(&question, "price, cost").is_err());
    }

    #[test]
    fn parse_answer_blank_clears_optional_questions_only() {
        let mut question = question_of(QuestionKind::Text, &[]);
        question.required = false;
        assert_eq!(parse_answer(&question, "").unwrap(), Value::Null);
        question.required = true;
        assert!(parse_answer(&question, "").is_err());
    }

    #[test]
    fn run_completes_with_scripted_input() -> CliResult<()> {
        let workspace = assert_fs::TempDir::new()?;
        let spec_path = workspace.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("run")
            .arg("--spec")
            .arg(&spec_path)
            .write_stdin("34\nno\nann@example.com\n")
            .assert()
            .success()
            .stdout(predicate::str::contains("Survey: Health Study Screener"))
            .stdout(predicate::str::contains("Done ✅"))
            .stdout(predicate::str::contains("Answers (CBOR hex):"));
        Ok(())
    }

    #[test]
    fn validate_accepts_a_complete_answers_file() -> CliResult<()> {
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;
        let answers_path = dir.path().join("answers.json");
        fs::write(
            &answers_path,
            r#"{"age": 34, "smoker": "No", "contact": "ann@example.com"}"#,
        )?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("validate")
            .arg("--spec")
            .arg(&spec_path)
            .arg("--answers")
            .arg(&answers_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Validation result: valid"))
            .stdout(predicate::str::contains("\"age\": 34"));
        Ok(())
    }

    #[test]
    fn validate_reports_disqualification() -> CliResult<()> {
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;
        let answers_path = dir.path().join("answers.json");
        fs::write(&answers_path, r#"{"age": 70}"#)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("validate")
            .arg("--spec")
            .arg(&spec_path)
            .arg("--answers")
            .arg(&answers_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Validation result: disqualified"))
            .stdout(predicate::str::contains("not a fit"));
        Ok(())
    }

    #[test]
    fn validate_rejects_missing_required_answers() -> CliResult<()> {
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;
        let answers_path = dir.path().join("answers.json");
        fs::write(&answers_path, r#"{"age": 34}"#)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("validate")
            .arg("--spec")
            .arg(&spec_path)
            .arg("--answers")
            .arg(&answers_path)
            .assert()
            .failure()
            .stdout(predicate::str::contains("Validation result: invalid"))
            .stdout(predicate::str::contains("question 2"));
        Ok(())
    }

    #[test]
    fn lint_passes_a_clean_definition() -> CliResult<()> {
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("lint")
            .arg("--spec")
            .arg(&spec_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("No findings."));
        Ok(())
    }

    #[test]
    fn lint_flags_a_dangling_jump_target() -> CliResult<()> {
        let spec = json!({
            "id": "bad-jump",
            "title": "Bad Jump",
            "version": "1.0.0",
            "questions": [
                {
                    "sequence": 1,
                    "uuid": "score",
                    "type": "number",
                    "title": "Score?",
                    "numeric_branch_rules": [
                        {
                            "op": "lte",
                            "value": 3,
                            "branch": {
                                "questions": [
                                    { "sequence": 1, "type": "text", "title": "Why?" }
                                ],
                                "end_action": { "action": "jump", "target": 99 }
                            }
                        }
                    ]
                },
                { "sequence": 2, "type": "text", "title": "Anything else?" }
            ]
        });
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("bad_jump.json");
        fs::write(&spec_path, serde_json::to_string_pretty(&spec)?)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("lint")
            .arg("--spec")
            .arg(&spec_path)
            .assert()
            .failure()
            .stdout(predicate::str::contains("jump_unknown_target"));
        Ok(())
    }

    #[test]
    fn schema_prints_visible_answer_properties() -> CliResult<()> {
        let dir = TempDir::new()?;
        let spec_path = dir.path().join("screener.json");
        fs::write(&spec_path, SCREENER)?;

        let mut cmd = Command::cargo_bin("trailform")?;
        cmd.arg("schema")
            .arg("--spec")
            .arg(&spec_path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"age\""))
            .stdout(predicate::str::contains("\"required\""));
        Ok(())
    }
}
