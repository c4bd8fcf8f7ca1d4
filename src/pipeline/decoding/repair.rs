//! Textual repair tiers for malformed model output.
//!
//! Each tier is a total, side-effect-free `fn(&str) -> Option<String>`:
//! `None` means the tier found nothing to repair. The decoder runs them in
//! `REPAIR_TIERS` order, feeding each tier the output of the previous one.

use std::sync::LazyLock;

use regex::Regex;

use super::types::RepairTier;

/// A named repair step.
pub type RepairFn = fn(&str) -> Option<String>;

/// Ordered, fixed list of repair tiers. Never extended at runtime.
pub const REPAIR_TIERS: &[(RepairTier, RepairFn)] = &[
    (RepairTier::TruncationCloser, close_truncated_json),
    (RepairTier::PunctuationRepair, insert_missing_commas),
    (RepairTier::BlockExtraction, extract_relaxed_block),
];

// ──────────────────────────────────────────────
// Tier 1: truncation closer
// ──────────────────────────────────────────────

/// Close a payload cut off mid-string or mid-structure.
///
/// Scans from the first `{` tracking string state and the open bracket
/// stack, remembering the last point where a complete element ended or a
/// container opened. If the text ends unbalanced, it is cut back to that
/// point and the brackets open there are closed in order. The half-written
/// element is dropped.
pub fn close_truncated_json(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let body = &text[start..];

    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut string_is_value = false;
    let mut prev_significant = ' ';
    let mut last_cut: Option<(usize, Vec<char>)> = None;

    for (i, c) in body.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                prev_significant = '"';
                if string_is_value {
                    last_cut = Some((i + 1, stack.clone()));
                }
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                string_is_value = match stack.last() {
                    Some('[') => true,
                    Some('{') => prev_significant == ':',
                    _ => false,
                };
            }
            '{' | '[' => {
                stack.push(c);
                last_cut = Some((i + 1, stack.clone()));
            }
            '}' | ']' => {
                stack.pop();
                last_cut = Some((i + 1, stack.clone()));
                if stack.is_empty() {
                    break;
                }
            }
            ',' => {
                if !matches!(prev_significant, ',' | '{' | '[' | ':') {
                    last_cut = Some((i, stack.clone()));
                }
            }
            _ => {}
        }
        if !c.is_whitespace() {
            prev_significant = c;
        }
    }

    if !in_string && stack.is_empty() {
        return None;
    }

    let (cut, open) = last_cut?;
    if open.is_empty() {
        return None;
    }

    let mut repaired = body[..cut].trim_end().to_string();
    for bracket in open.iter().rev() {
        repaired.push(if *bracket == '{' { '}' } else { ']' });
    }
    Some(repaired)
}

// ──────────────────────────────────────────────
// Tier 2: punctuation repair
// ──────────────────────────────────────────────

/// Value end (number, literal, closing quote or bracket) followed by a newline
/// and a quoted token, with no comma in between.
static MISSING_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([0-9"\]}]|\btrue|\bfalse|\bnull)([ \t]*\r?\n\s*)""#).unwrap()
});

/// Insert commas models drop when they emit one element per line.
pub fn insert_missing_commas(text: &str) -> Option<String> {
    if !MISSING_COMMA.is_match(text) {
        return None;
    }
    let repaired = MISSING_COMMA.replace_all(text, "$1,$2\"").into_owned();
    (repaired != text).then_some(repaired)
}

// ──────────────────────────────────────────────
// Tier 3: block extraction with relaxed grammar
// ──────────────────────────────────────────────

static BAREWORD_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):").unwrap());

static SINGLE_QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([\[{,:]\s*)'([^'"\\]*)'"#).unwrap());

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

/// Slice from the first `{` to the last `}` and relax the grammar: turn
/// single-quoted strings into double-quoted ones, quote bareword keys and
/// drop trailing commas. Text inside double-quoted strings is never rewritten.
pub fn extract_relaxed_block(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if start >= end {
        return None;
    }
    let block = &text[start..=end];

    let double_quoted = replace_outside_strings(block, &SINGLE_QUOTED, "$1\"$2\"");
    let quoted_keys = replace_outside_strings(&double_quoted, &BAREWORD_KEY, "$1\"$2\"$3:");
    Some(replace_outside_strings(&quoted_keys, &TRAILING_COMMA, "$1"))
}

/// Apply `pattern` to the stretches of `text` between double-quoted string
/// literals, copying the literals (escapes included) unchanged.
fn replace_outside_strings(text: &str, pattern: &Regex, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut segment_start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
                out.push_str(&text[segment_start..=i]);
                segment_start = i + 1;
            }
        } else if c == '"' {
            out.push_str(&pattern.replace_all(&text[segment_start..i], replacement));
            segment_start = i;
            in_string = true;
        }
    }

    let tail = &text[segment_start..];
    if in_string {
        out.push_str(tail);
    } else {
        out.push_str(&pattern.replace_all(tail, replacement));
    }
    out
}
