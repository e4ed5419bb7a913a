use std::collections::HashMap;

use crate::spec::{QuestionRef, QuestionSpec, SurveySpec};

/// Which flow a question's answers are keyed by. Branch flows reuse sequence
/// numbers starting at 1, so their positional keys carry a scope prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyScope {
    Main,
    Branch { prefix: String },
}

impl KeyScope {
    /// Legacy positional key of a sequence number inside this scope.
    pub fn legacy_key(&self, sequence: u32) -> String {
        match self {
            KeyScope::Main => sequence.to_string(),
            KeyScope::Branch { prefix } => format!("{prefix}.{sequence}"),
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, KeyScope::Main)
    }
}

fn child_prefix(parent: &KeyScope, parent_sequence: u32, tag: char, index: usize) -> String {
    let segment = format!("b{parent_sequence}{tag}{index}");
    match parent {
        KeyScope::Main => segment,
        KeyScope::Branch { prefix } => format!("{prefix}.{segment}"),
    }
}

/// Scope of a branch hanging off `options[option_index]`.
pub fn option_branch_scope(parent: &KeyScope, parent_sequence: u32, option_index: usize) -> KeyScope {
    KeyScope::Branch {
        prefix: child_prefix(parent, parent_sequence, 'o', option_index),
    }
}

/// Scope of a branch hanging off `numeric_branch_rules[rule_index]`.
pub fn rule_branch_scope(parent: &KeyScope, parent_sequence: u32, rule_index: usize) -> KeyScope {
    KeyScope::Branch {
        prefix: child_prefix(parent, parent_sequence, 'r', rule_index),
    }
}

/// Primary storage key of a question: uuid when present, positional otherwise.
pub fn primary_key(question: &QuestionSpec, scope: &KeyScope) -> String {
    match &question.uuid {
        Some(uuid) => uuid.clone(),
        None => scope.legacy_key(question.sequence),
    }
}

/// Every key an answer for this question is stored under. Questions with a
/// uuid are dual-written so legacy sequence references keep resolving.
pub fn answer_keys(question: &QuestionSpec, scope: &KeyScope) -> Vec<String> {
    let legacy = scope.legacy_key(question.sequence);
    match &question.uuid {
        Some(uuid) => vec![uuid.clone(), legacy],
        None => vec![legacy],
    }
}

/// A resolved question reference: the definition plus the scope its answers
/// are keyed by.
#[derive(Debug, Clone)]
pub struct ResolvedRef<'a> {
    pub question: &'a QuestionSpec,
    pub scope: KeyScope,
}

/// Centralized uuid-then-sequence lookup shared by the condition evaluator
/// and the answer store accessors, instead of duplicating the fallback at
/// every call site.
///
/// Uuids resolve globally (they are stable across flows); sequence fallback
/// resolves against the flow the dependent question lives in first, then the
/// main flow.
pub struct QuestionLookup<'a> {
    main: &'a [QuestionSpec],
    local: &'a [QuestionSpec],
    local_scope: KeyScope,
    by_uuid: HashMap<&'a str, (&'a QuestionSpec, KeyScope)>,
}

impl<'a> QuestionLookup<'a> {
    /// Lookup scoped to the main flow.
    pub fn over_main(spec: &'a SurveySpec) -> Self {
        Self::with_local(spec, &spec.questions, KeyScope::Main)
    }

    /// Lookup for a dependent question living in `local` (a branch flow, or
    /// the main flow itself).
    pub fn with_local(
        spec: &'a SurveySpec,
        local: &'a [QuestionSpec],
        local_scope: KeyScope,
    ) -> Self {
        let mut by_uuid = HashMap::new();
        index_flow(&mut by_uuid, &spec.questions, &KeyScope::Main);
        Self {
            main: &spec.questions,
            local,
            local_scope,
            by_uuid,
        }
    }

    /// Uuid first, sequence fallback. Returns `None` when neither resolves;
    /// callers decide the fail-open/fail-closed consequence.
    pub fn resolve(&self, reference: &QuestionRef) -> Option<ResolvedRef<'a>> {
        if let Some(uuid) = &reference.uuid
            && let Some((question, scope)) = self.by_uuid.get(uuid.as_str())
        {
            return Some(ResolvedRef {
                question,
                scope: scope.clone(),
            });
        }
        let sequence = reference.sequence?;
        if !self.local_scope.is_main()
            && let Some(question) = self
                .local
                .iter()
                .find(|question| question.sequence == sequence)
        {
            return Some(ResolvedRef {
                question,
                scope: self.local_scope.clone(),
            });
        }
        self.main
            .iter()
            .find(|question| question.sequence == sequence)
            .map(|question| ResolvedRef {
                question,
                scope: KeyScope::Main,
            })
    }
}

fn index_flow<'a>(
    map: &mut HashMap<&'a str, (&'a QuestionSpec, KeyScope)>,
    questions: &'a [QuestionSpec],
    scope: &KeyScope,
) {
    for question in questions {
        if let Some(uuid) = &question.uuid {
            map.insert(uuid.as_str(), (question, scope.clone()));
        }
        for (index, option) in question.options.iter().enumerate() {
            if let Some(branch) = &option.branch {
                let child = option_branch_scope(scope, question.sequence, index);
                index_flow(map, &branch.questions, &child);
            }
        }
        for (index, rule) in question.numeric_branch_rules.iter().enumerate() {
            let child = rule_branch_scope(scope, question.sequence, index);
            index_flow(map, &rule.branch.questions, &child);
        }
    }
}
