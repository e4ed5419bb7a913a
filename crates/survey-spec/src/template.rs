use handlebars::Handlebars;
use log::debug;
use serde_json::json;
use thiserror::Error;

use crate::answers::AnswerStore;
use crate::spec::QuestionSpec;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template render failed: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Substitutes earlier answers into question text, so a title can read
/// "Why did you pick {{answers.q-color}}?". Positional keys render via an
/// escaped segment: `{{answers.[2]}}`. Unanswered placeholders come out
/// empty rather than failing.
pub struct TemplateEngine<'reg> {
    registry: Handlebars<'reg>,
}

impl TemplateEngine<'_> {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Output goes to terminals and JSON payloads, not HTML.
        registry.register_escape_fn(handlebars::no_escape);
        Self { registry }
    }

    /// Render arbitrary template text against the answer store. Both key
    /// spellings of a dual-keyed answer resolve.
    pub fn render(&self, template: &str, answers: &AnswerStore) -> Result<String, TemplateError> {
        let data = json!({ "answers": answers.as_object() });
        Ok(self.registry.render_template(template, &data)?)
    }

    /// Question title with placeholders substituted. A bad template must not
    /// block survey-taking, so render failures fall back to the raw text.
    pub fn question_title(&self, question: &QuestionSpec, answers: &AnswerStore) -> String {
        self.render_or_raw(&question.title, answers)
    }

    pub fn question_description(
        &self,
        question: &QuestionSpec,
        answers: &AnswerStore,
    ) -> Option<String> {
        question
            .description
            .as_ref()
            .map(|text| self.render_or_raw(text, answers))
    }

    fn render_or_raw(&self, text: &str, answers: &AnswerStore) -> String {
        if !text.contains("{{") {
            return text.to_string();
        }
        match self.render(text, answers) {
            Ok(rendered) => rendered,
            Err(error) => {
                debug!("question text failed to render: {error}");
                text.to_string()
            }
        }
    }
}

impl Default for TemplateEngine<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refs::KeyScope;
    use crate::spec::QuestionType;
    use serde_json::json;

    fn store_with(sequence: u32, uuid: Option<&str>, value: serde_json::Value) -> AnswerStore {
        let mut question =
            QuestionSpec::new(sequence, QuestionType::Text, format!("Q{sequence}"));
        question.uuid = uuid.map(String::from);
        let mut store = AnswerStore::new();
        store.insert(&question, &KeyScope::Main, value);
        store
    }

    #[test]
    fn substitutes_uuid_keyed_answers() {
        let engine = TemplateEngine::new();
        let store = store_with(1, Some("q-color"), json!("teal"));
        let mut question = QuestionSpec::new(2, QuestionType::Text, "Why {{answers.q-color}}?");
        assert_eq!(engine.question_title(&question, &store), "Why teal?");

        question.title = "Earlier you said {{answers.[1]}}".into();
        assert_eq!(
            engine.question_title(&question, &store),
            "Earlier you said teal"
        );
    }

    #[test]
    fn answers_are_not_html_escaped() {
        let engine = TemplateEngine::new();
        let store = store_with(1, Some("q-carrier"), json!("AT&T"));
        let question = QuestionSpec::new(2, QuestionType::Text, "Why {{answers.q-carrier}}?");
        assert_eq!(engine.question_title(&question, &store), "Why AT&T?");
    }

    #[test]
    fn unanswered_placeholder_renders_empty() {
        let engine = TemplateEngine::new();
        let question = QuestionSpec::new(1, QuestionType::Text, "Hello {{answers.missing}}!");
        assert_eq!(
            engine.question_title(&question, &AnswerStore::new()),
            "Hello !"
        );
    }

    #[test]
    fn broken_template_falls_back_to_raw_text() {
        let engine = TemplateEngine::new();
        let question = QuestionSpec::new(1, QuestionType::Text, "Broken {{#if}} text");
        assert_eq!(
            engine.question_title(&question, &AnswerStore::new()),
            "Broken {{#if}} text"
        );
    }

    #[test]
    fn plain_text_passes_through() {
        let engine = TemplateEngine::new();
        let question = QuestionSpec::new(1, QuestionType::Text, "No placeholders here");
        assert_eq!(
            engine.question_title(&question, &AnswerStore::new()),
            "No placeholders here"
        );
    }
}
