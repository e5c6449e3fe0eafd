//! String assertions over agent responses.

use serde::{Deserialize, Serialize};

const ACCURACY_KEYWORDS: &[&str] = &["accuracy", "correct", "fact", "contains", "answer"];
const RELEVANCE_KEYWORDS: &[&str] = &["relevance", "relevant", "topic", "length", "order"];

pub fn is_accuracy_check(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ACCURACY_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn is_relevance_check(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    RELEVANCE_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

pub fn contains_ignore_case(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(&needle.to_lowercase())
}

/// Index of the first needle that is missing or whose first occurrence
/// comes before the first occurrence of the previous needle. `None` when
/// the first occurrences run left to right.
pub fn first_out_of_order(text: &str, needles: &[&str]) -> Option<usize> {
    let mut previous = None;
    for (idx, needle) in needles.iter().enumerate() {
        let Some(pos) = text.find(needle) else {
            return Some(idx);
        };
        if previous.is_some_and(|prev| pos < prev) {
            return Some(idx);
        }
        previous = Some(pos);
    }
    None
}

/// Ordered-substring assertion with a readable failure message.
pub fn ensure_in_order(text: &str, needles: &[&str]) -> anyhow::Result<()> {
    let Some(idx) = first_out_of_order(text, needles) else {
        return Ok(());
    };
    if idx == 0 {
        return Err(anyhow::anyhow!(
            "response does not contain '{}'",
            needles[0]
        ));
    }
    if text.contains(needles[idx]) {
        return Err(anyhow::anyhow!(
            "response mentions '{}' before '{}'",
            needles[idx],
            needles[idx - 1]
        ));
    }
    Err(anyhow::anyhow!(
        "response does not contain '{}'",
        needles[idx]
    ))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckKind {
    Contains { value: String },
    ContainsIgnoreCase { value: String },
    NotContains { value: String },
    InOrder { values: Vec<String> },
    MinLength { chars: usize },
    MaxLength { chars: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCheck {
    pub name: String,
    #[serde(flatten)]
    pub kind: CheckKind,
}

impl EvalCheck {
    pub fn new(name: impl Into<String>, kind: CheckKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn passes(&self, text: &str) -> bool {
        match &self.kind {
            CheckKind::Contains { value } => text.contains(value.as_str()),
            CheckKind::ContainsIgnoreCase { value } => contains_ignore_case(text, value),
            CheckKind::NotContains { value } => !contains_ignore_case(text, value),
            CheckKind::InOrder { values } => {
                let needles = values.iter().map(String::as_str).collect::<Vec<&str>>();
                first_out_of_order(text, &needles).is_none()
            }
            CheckKind::MinLength { chars } => text.trim().chars().count() >= *chars,
            CheckKind::MaxLength { chars } => text.trim().chars().count() <= *chars,
        }
    }

    pub fn is_accuracy(&self) -> bool {
        is_accuracy_check(&self.name)
    }

    pub fn is_relevance(&self) -> bool {
        is_relevance_check(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub name: String,
    pub passed: bool,
    pub accuracy: bool,
    pub relevance: bool,
}

pub fn run_checks(checks: &[EvalCheck], text: &str) -> Vec<CheckOutcome> {
    checks
        .iter()
        .map(|check| CheckOutcome {
            name: check.name.clone(),
            passed: check.passes(text),
            accuracy: check.is_accuracy(),
            relevance: check.is_relevance(),
        })
        .collect()
}
