use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::refs::{KeyScope, answer_keys, primary_key};
use crate::spec::QuestionSpec;

/// A value that counts as "never answered" for conditional logic: missing,
/// null, or an empty array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Mutable per-session answer state.
///
/// Entries are dual-keyed: written under the question's uuid *and* its
/// positional key, because legacy conditional logic may only carry a sequence
/// reference. Both forms are deleted together when a question becomes hidden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerStore {
    #[serde(default)]
    values: BTreeMap<String, Value>,
    /// Per-question elapsed seconds, fed by the host, keyed like `values`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    elapsed: BTreeMap<String, u64>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a prior answers object (uuid- or sequence-keyed). Keys are
    /// adopted as-is; `normalize` back-fills the missing twin keys.
    pub fn from_object(object: &Value) -> Self {
        let values = object
            .as_object()
            .map(|map| map.clone().into_iter().collect())
            .unwrap_or_default();
        Self {
            values,
            elapsed: BTreeMap::new(),
        }
    }

    /// Dual-write the twin key of any main-flow answer that was seeded under
    /// only one of its keys.
    pub fn normalize(&mut self, questions: &[QuestionSpec]) {
        for question in questions {
            let keys = answer_keys(question, &KeyScope::Main);
            let present = keys
                .iter()
                .find_map(|key| self.values.get(key).cloned().map(|value| (value, key)));
            if let Some((value, _)) = present {
                for key in &keys {
                    self.values.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
    }

    pub fn insert(&mut self, question: &QuestionSpec, scope: &KeyScope, value: Value) {
        for key in answer_keys(question, scope) {
            self.values.insert(key, value.clone());
        }
    }

    /// Remove every key form of this question's answer (and its elapsed time).
    pub fn remove(&mut self, question: &QuestionSpec, scope: &KeyScope) {
        for key in answer_keys(question, scope) {
            self.values.remove(&key);
            self.elapsed.remove(&key);
        }
    }

    /// Read an answer, uuid first, positional key as the fallback.
    pub fn answer_for(&self, question: &QuestionSpec, scope: &KeyScope) -> Option<&Value> {
        for key in answer_keys(question, scope) {
            if let Some(value) = self.values.get(&key) {
                return Some(value);
            }
        }
        None
    }

    /// Non-blank answer, hiding null/empty-array placeholders the UI may have
    /// written while clearing an input.
    pub fn usable_answer_for(&self, question: &QuestionSpec, scope: &KeyScope) -> Option<&Value> {
        self.answer_for(question, scope).filter(|value| !is_blank(value))
    }

    pub fn has_answer(&self, question: &QuestionSpec, scope: &KeyScope) -> bool {
        self.usable_answer_for(question, scope).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Accumulate host-reported time spent on a question.
    pub fn record_elapsed(&mut self, question: &QuestionSpec, scope: &KeyScope, seconds: u64) {
        let key = primary_key(question, scope);
        *self.elapsed.entry(key).or_insert(0) += seconds;
    }

    pub fn elapsed(&self) -> &BTreeMap<String, u64> {
        &self.elapsed
    }

    /// Raw view of every stored key-value pair, twin keys included. Used by
    /// prompt templating, where both key spellings should resolve.
    pub fn as_object(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Value::Object(map)
    }
}

/// Final answer payload handed to the submission transport, keyed by each
/// question's primary key only (no twin duplicates).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerSet {
    pub survey_id: String,
    pub survey_version: String,
    pub answers: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<BTreeMap<String, u64>>,
}

impl AnswerSet {
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{QuestionSpec, QuestionType};
    use serde_json::json;

    fn question(sequence: u32, uuid: Option<&str>) -> QuestionSpec {
        let mut question = QuestionSpec::new(sequence, QuestionType::Text, format!("Q{sequence}"));
        question.uuid = uuid.map(String::from);
        question
    }

    #[test]
    fn insert_writes_both_key_forms() {
        let mut store = AnswerStore::new();
        let q = question(2, Some("q-two"));
        store.insert(&q, &KeyScope::Main, json!("hello"));
        assert_eq!(store.get("q-two"), Some(&json!("hello")));
        assert_eq!(store.get("2"), Some(&json!("hello")));
    }

    #[test]
    fn remove_deletes_both_key_forms() {
        let mut store = AnswerStore::new();
        let q = question(2, Some("q-two"));
        store.insert(&q, &KeyScope::Main, json!("hello"));
        store.record_elapsed(&q, &KeyScope::Main, 4);
        store.remove(&q, &KeyScope::Main);
        assert!(store.get("q-two").is_none());
        assert!(store.get("2").is_none());
        assert!(store.elapsed().is_empty());
    }

    #[test]
    fn blank_values_are_not_usable_answers() {
        let mut store = AnswerStore::new();
        let q = question(1, None);
        store.insert(&q, &KeyScope::Main, Value::Null);
        assert!(!store.has_answer(&q, &KeyScope::Main));
        store.insert(&q, &KeyScope::Main, json!([]));
        assert!(!store.has_answer(&q, &KeyScope::Main));
        store.insert(&q, &KeyScope::Main, json!(["a"]));
        assert!(store.has_answer(&q, &KeyScope::Main));
    }

    #[test]
    fn normalize_backfills_twin_keys() {
        let questions = vec![question(1, Some("alpha"))];
        let mut store = AnswerStore::from_object(&json!({ "1": "legacy" }));
        store.normalize(&questions);
        assert_eq!(store.get("alpha"), Some(&json!("legacy")));
    }

    #[test]
    fn elapsed_accumulates() {
        let mut store = AnswerStore::new();
        let q = question(1, Some("alpha"));
        store.record_elapsed(&q, &KeyScope::Main, 3);
        store.record_elapsed(&q, &KeyScope::Main, 2);
        assert_eq!(store.elapsed().get("alpha"), Some(&5));
    }

    #[test]
    fn answer_set_round_trips_cbor() {
        let set = AnswerSet {
            survey_id: "s1".into(),
            survey_version: "1.0".into(),
            answers: json!({ "q1": "Yes" }),
            elapsed: None,
        };
        let bytes = set.to_cbor().expect("cbor");
        let back: AnswerSet = serde_cbor::from_slice(&bytes).expect("decode");
        assert_eq!(back, set);
    }
}
