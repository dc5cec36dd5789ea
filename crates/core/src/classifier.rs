//! Mode classification for inbound operator text.
//!
//! Routing is a fixed-priority rule table over case-folded input:
//! alert keywords win over action keywords, which win over question
//! prefixes, and anything unmatched falls back to `Ask`. The keyword
//! sets are configuration data, not compiled logic, so the table can
//! be swapped for a real intent classifier without touching callers.

use serde::{Deserialize, Serialize};

/// Routing decision for an inbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Ask,
    Act,
    Alert,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierRules {
    pub alert_keywords: Vec<String>,
    pub action_keywords: Vec<String>,
    pub question_words: Vec<String>,
}

impl Default for ClassifierRules {
    fn default() -> Self {
        Self {
            alert_keywords: to_owned_vec(&["alert", "alerts", "notification", "notifications"]),
            action_keywords: to_owned_vec(&[
                "change", "update", "execute", "approve", "create", "delete", "add", "remove",
                "fix", "do",
            ]),
            question_words: to_owned_vec(&[
                "what", "why", "how", "when", "where", "which", "who", "whose", "whom",
            ]),
        }
    }
}

fn to_owned_vec(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| (*word).to_string()).collect()
}

#[derive(Clone, Debug, Default)]
pub struct ModeClassifier {
    rules: ClassifierRules,
}

impl ModeClassifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    /// Pure function of the input text; first matching rule wins.
    pub fn classify(&self, text: &str) -> Mode {
        let normalized = text.trim().to_lowercase();
        let tokens = tokenize(&normalized);

        if self.rules.alert_keywords.iter().any(|kw| keyword_matches(kw, &normalized, &tokens)) {
            return Mode::Alert;
        }

        if self.rules.action_keywords.iter().any(|kw| keyword_matches(kw, &normalized, &tokens)) {
            return Mode::Act;
        }

        if let Some(first) = tokens.first() {
            if self.rules.question_words.iter().any(|word| word.eq_ignore_ascii_case(first)) {
                return Mode::Ask;
            }
        }

        Mode::Ask
    }
}

/// Single-word keywords match whole tokens only, so "do" does not
/// fire inside "does". Multi-word keywords match as substrings.
fn keyword_matches(keyword: &str, normalized: &str, tokens: &[String]) -> bool {
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() {
        return false;
    }
    if keyword.contains(char::is_whitespace) {
        return normalized.contains(&keyword);
    }
    tokens.iter().any(|token| token == &keyword)
}

fn tokenize(normalized: &str) -> Vec<String> {
    normalized
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .collect()
}
