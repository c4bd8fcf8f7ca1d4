// Partial-field extractor: last-resort recovery when no decode tier works.
// Each canonical field is searched independently by name in the raw text.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::types::{
    empty_canonical_object, FIELD_ALIASES, FIELD_CHIEF_COMPLAINT, FIELD_LEGAL_EXPOSURE,
    FIELD_RECOMMENDED_TESTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    /// `"field": "value"`
    Scalar,
    /// `"field": ["a", "b", ...]`
    List,
    /// `"field": [...]` holding bare names, test objects with a name key, or both.
    Tests,
}

fn kind_of(canonical: &str) -> FieldKind {
    match canonical {
        FIELD_CHIEF_COMPLAINT | FIELD_LEGAL_EXPOSURE => FieldKind::Scalar,
        FIELD_RECOMMENDED_TESTS => FieldKind::Tests,
        _ => FieldKind::List,
    }
}

/// A JSON string literal body (escapes allowed), captured in group 1.
const QUOTED: &str = r#""((?:[^"\\]|\\.)*)""#;

struct FieldSearch {
    canonical: &'static str,
    kind: FieldKind,
    patterns: Vec<Regex>,
}

static SEARCHES: LazyLock<Vec<FieldSearch>> = LazyLock::new(|| {
    FIELD_ALIASES
        .iter()
        .map(|&(canonical, aliases)| {
            let kind = kind_of(canonical);
            let value = match kind {
                FieldKind::Scalar => QUOTED.to_string(),
                // Bracket contents up to `]` or end of text (truncated arrays).
                FieldKind::List | FieldKind::Tests => r"\[([^\]]*)".to_string(),
            };
            FieldSearch {
                canonical,
                kind,
                patterns: aliases
                    .iter()
                    .map(|alias| {
                        Regex::new(&format!(r#""{}"\s*:\s*{value}"#, regex::escape(alias)))
                            .unwrap()
                    })
                    .collect(),
            }
        })
        .collect()
});

static QUOTED_ITEM: LazyLock<Regex> = LazyLock::new(|| Regex::new(QUOTED).unwrap());

/// One test entry: a flat object (closed, or cut off at end of text) or a
/// quoted bare name in group 1.
static TEST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"\{{[^{{}}]*(?:\}}|$)|{QUOTED}")).unwrap());

static TEST_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r#""(?:name|nombre|test)"\s*:\s*{QUOTED}"#)).unwrap());

/// Recover whatever canonical fields can be found in undecodable text.
///
/// Always returns a complete canonical-shaped object; fields that cannot be
/// located keep their empty default. One field failing never affects another.
pub fn extract_partial_fields(text: &str) -> Map<String, Value> {
    let mut object = empty_canonical_object();
    let mut recovered = 0usize;

    for search in SEARCHES.iter() {
        let found = search
            .patterns
            .iter()
            .find_map(|pattern| pattern.captures(text))
            .and_then(|captures| captures.get(1).map(|m| m.as_str()));
        let Some(raw) = found else {
            continue;
        };

        let value = match search.kind {
            FieldKind::Scalar => Value::String(unescape(raw)),
            FieldKind::List => Value::Array(quoted_items(raw)),
            FieldKind::Tests => Value::Array(test_items(raw)),
        };
        object.insert(search.canonical.to_string(), value);
        recovered += 1;
    }

    tracing::warn!(
        recovered_fields = recovered,
        input_len = text.len(),
        "Structured decode failed; using partial field extraction"
    );
    object
}

fn quoted_items(bracket_contents: &str) -> Vec<Value> {
    QUOTED_ITEM
        .captures_iter(bracket_contents)
        .map(|c| Value::String(unescape(&c[1])))
        .collect()
}

/// Bare names stay as they are; objects reduce to their name, or are dropped
/// when no name survived the cut.
fn test_items(bracket_contents: &str) -> Vec<Value> {
    TEST_ITEM
        .captures_iter(bracket_contents)
        .filter_map(|c| match c.get(1) {
            Some(name) => Some(unescape(name.as_str())),
            None => TEST_NAME.captures(&c[0]).map(|n| unescape(&n[1])),
        })
        .map(Value::String)
        .collect()
}

/// Decode JSON string escapes; keeps the raw text when they are malformed.
fn unescape(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\"")).unwrap_or_else(|_| raw.to_string())
}
