//! Canonical mapper: structured and legacy payloads into `CanonicalAnalysis`.
//!
//! Both mappers are total and deterministic. Source values are coerced, never
//! trusted: a string becomes a one-element list, arrays are trimmed,
//! stringified and stripped of empties, anything else is empty.

use serde_json::{Map, Value};

use super::types::{
    field_aliases, CanonicalAnalysis, DecodedShape, LegalExposure, RecommendedTest, FIELD_BIOLOGICAL,
    FIELD_CHIEF_COMPLAINT, FIELD_HISTORY, FIELD_KEY_FINDINGS, FIELD_LEGAL_EXPOSURE,
    FIELD_MEDICATIONS, FIELD_MEDICOLEGAL_RECOMMENDATIONS, FIELD_PSYCHOLOGICAL,
    FIELD_RECOMMENDED_TESTS, FIELD_RED_FLAGS, FIELD_SOCIAL, FIELD_YELLOW_FLAGS, MARKER_ALERTS,
    MARKER_BIOPSYCHOSOCIAL, MARKER_HIGHLIGHTS, MARKER_TESTS,
};

/// Separator between the rationale, region and evidence parts of a synthesized
/// test justification.
pub const JUSTIFICATION_SEPARATOR: &str = " | ";

/// Boilerplate the model writes into flag lists when it found nothing.
const NOISE_PHRASES: &[&str] = &[
    "none",
    "none identified",
    "none reported",
    "no red flags identified",
    "no yellow flags identified",
    "no flags identified",
    "no findings",
    "no significant findings",
    "not identified",
    "not applicable",
    "n/a",
    "na",
    "ninguno",
    "ninguna",
    "no se identificaron",
    "no se identifican",
    "sin hallazgos",
    "no aplica",
];

/// Map any classified shape. Exhaustive over `DecodedShape`.
pub fn map_to_canonical(shape: DecodedShape) -> CanonicalAnalysis {
    match shape {
        // A canonical record read through the flat mapper comes back unchanged.
        DecodedShape::AlreadyNormalized(object) => map_legacy(&object),
        DecodedShape::StructuredPayload(object) => map_structured(&object),
        DecodedShape::LegacyPayload(object) => map_legacy(&object),
        DecodedShape::Unclassified(object) => {
            tracing::debug!(
                keys = object.len(),
                "No canonical field or structured marker; defaulting to legacy mapping"
            );
            map_legacy(&object)
        }
    }
}

// ──────────────────────────────────────────────
// Structured schema
// ──────────────────────────────────────────────

/// Map the four-container structured schema.
pub fn map_structured(object: &Map<String, Value>) -> CanonicalAnalysis {
    let highlights = container(object, MARKER_HIGHLIGHTS);
    let alerts = container(object, MARKER_ALERTS);
    let factors = container(object, MARKER_BIOPSYCHOSOCIAL);

    let mut yellow_flags = flag_list(field(alerts, &["yellow_flags"]));
    yellow_flags.extend(flag_list(field(
        factors,
        &["legal_employment_context", "employment_legal_context", "legal_context"],
    )));

    let analysis = CanonicalAnalysis {
        chief_complaint: field(highlights, &["chief_complaint", "motivo_consulta"])
            .map(coerce_scalar)
            .unwrap_or_default(),
        key_findings: coerce_list_opt(field(highlights, &["key_findings"])),
        medications: coerce_list_opt(field(highlights, &["medications", "current_medications"])),
        history: coerce_list_opt(field(highlights, &["relevant_history", "history"])),
        red_flags: flag_list(field(alerts, &["red_flags"])),
        yellow_flags: dedupe(yellow_flags),
        legal_exposure: coerce_exposure(field(alerts, &["legal_exposure", "exposure_level"])),
        medicolegal_recommendations: coerce_list_opt(field(
            alerts,
            &["documentation_recommendations", "recommendations"],
        )),
        biological_factors: coerce_list_opt(field(factors, &["biological"])),
        psychological_factors: coerce_list_opt(field(factors, &["psychological"])),
        social_factors: coerce_list_opt(field(factors, &["social"])),
        recommended_tests: object
            .get(MARKER_TESTS)
            .map(coerce_test_container)
            .unwrap_or_default(),
    };

    tracing::debug!(
        red_flags = analysis.red_flags.len(),
        yellow_flags = analysis.yellow_flags.len(),
        tests = analysis.recommended_tests.len(),
        "Mapped structured payload"
    );
    analysis
}

fn container<'a>(object: &'a Map<String, Value>, marker: &str) -> Option<&'a Map<String, Value>> {
    object.get(marker).and_then(Value::as_object)
}

/// First non-null value under any of `keys`.
fn field<'a>(container: Option<&'a Map<String, Value>>, keys: &[&str]) -> Option<&'a Value> {
    let container = container?;
    keys.iter()
        .filter_map(|key| container.get(*key))
        .find(|value| !value.is_null())
}

/// `recommended_physical_tests` is a list, or an object wrapping one.
fn coerce_test_container(value: &Value) -> Vec<RecommendedTest> {
    match value {
        Value::Object(wrapper) => ["tests", "pruebas", "items"]
            .iter()
            .find_map(|key| wrapper.get(*key))
            .map(coerce_tests)
            .unwrap_or_else(|| coerce_tests(value)),
        _ => coerce_tests(value),
    }
}

// ──────────────────────────────────────────────
// Legacy (flat) schema
// ──────────────────────────────────────────────

/// Map the flat schema keyed by canonical names (or their structured sub-field
/// spelling). Starts from the empty record and overwrites only the fields
/// actually present.
pub fn map_legacy(object: &Map<String, Value>) -> CanonicalAnalysis {
    let mut analysis = CanonicalAnalysis::empty();

    if let Some(value) = flat_value(object, FIELD_CHIEF_COMPLAINT) {
        analysis.chief_complaint = coerce_scalar(value);
    }
    if let Some(value) = flat_value(object, FIELD_KEY_FINDINGS) {
        analysis.key_findings = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_MEDICATIONS) {
        analysis.medications = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_HISTORY) {
        analysis.history = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_RED_FLAGS) {
        analysis.red_flags = flag_list(Some(value));
    }
    if let Some(value) = flat_value(object, FIELD_YELLOW_FLAGS) {
        analysis.yellow_flags = dedupe(flag_list(Some(value)));
    }
    if let Some(value) = flat_value(object, FIELD_LEGAL_EXPOSURE) {
        analysis.legal_exposure = coerce_exposure(Some(value));
    }
    if let Some(value) = flat_value(object, FIELD_MEDICOLEGAL_RECOMMENDATIONS) {
        analysis.medicolegal_recommendations = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_BIOLOGICAL) {
        analysis.biological_factors = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_PSYCHOLOGICAL) {
        analysis.psychological_factors = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_SOCIAL) {
        analysis.social_factors = coerce_list(value);
    }
    if let Some(value) = flat_value(object, FIELD_RECOMMENDED_TESTS) {
        analysis.recommended_tests = coerce_tests(value);
    }

    analysis
}

/// Value of a canonical field under the first accepted name present.
fn flat_value<'a>(object: &'a Map<String, Value>, canonical: &str) -> Option<&'a Value> {
    field_aliases(canonical)
        .iter()
        .find_map(|name| object.get(*name))
}

// ──────────────────────────────────────────────
// Coercion rules
// ──────────────────────────────────────────────

/// Scalar string: strings are trimmed, numbers and booleans stringified,
/// lists joined with "; ". Anything else is empty.
pub fn coerce_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) => coerce_list(value).join("; "),
        Value::Null | Value::Object(_) => String::new(),
    }
}

/// Ordered list of strings. A single string becomes one element.
pub fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                vec![]
            } else {
                vec![trimmed.to_string()]
            }
        }
        Value::Array(items) => items.iter().filter_map(stringify_item).collect(),
        _ => vec![],
    }
}

fn coerce_list_opt(value: Option<&Value>) -> Vec<String> {
    value.map(coerce_list).unwrap_or_default()
}

/// One list element as text. Objects contribute their descriptive field, or
/// their compact JSON form when they have none.
fn stringify_item(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(text) => text.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(fields) => ["description", "text", "name", "descripcion", "nombre"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| item.to_string()),
        Value::Null | Value::Array(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Flag list with boilerplate "nothing found" entries removed.
fn flag_list(value: Option<&Value>) -> Vec<String> {
    coerce_list_opt(value)
        .into_iter()
        .filter(|flag| !is_noise_phrase(flag))
        .collect()
}

pub fn is_noise_phrase(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(['.', '!', ';'])
        .trim()
        .to_lowercase();
    NOISE_PHRASES.contains(&normalized.as_str())
}

/// Remove duplicates, keeping the first occurrence in place.
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

fn coerce_exposure(value: Option<&Value>) -> LegalExposure {
    value
        .and_then(Value::as_str)
        .map(LegalExposure::parse_lenient)
        .unwrap_or_default()
}

// ──────────────────────────────────────────────
// Recommended tests
// ──────────────────────────────────────────────

/// Test list: each entry a bare name or a structured test object.
pub fn coerce_tests(value: &Value) -> Vec<RecommendedTest> {
    match value {
        Value::String(_) => coerce_list(value).into_iter().map(RecommendedTest::named).collect(),
        Value::Array(items) => items.iter().filter_map(coerce_test_entry).collect(),
        Value::Object(_) => coerce_test_entry(value).into_iter().collect(),
        _ => vec![],
    }
}

fn coerce_test_entry(entry: &Value) -> Option<RecommendedTest> {
    match entry {
        Value::String(name) => {
            let name = name.trim();
            (!name.is_empty()).then(|| RecommendedTest::named(name))
        }
        Value::Object(test) => {
            let name = first_text(test, &["name", "test", "nombre", "test_name"])?;
            let justification = first_text(test, &["justification", "justificacion"])
                .unwrap_or_else(|| synthesize_justification(test));
            Some(RecommendedTest {
                name,
                sensitivity: first_ratio(test, &["sensitivity", "sensibilidad"]),
                specificity: first_ratio(test, &["specificity", "especificidad"]),
                justification,
            })
        }
        _ => None,
    }
}

/// Rationale, region and evidence level, in that order, skipping absent parts.
fn synthesize_justification(test: &Map<String, Value>) -> String {
    [
        &["rationale", "justificacion_clinica"][..],
        &["region", "body_region"][..],
        &["evidence_level", "evidence"][..],
    ]
    .iter()
    .filter_map(|keys| first_text(test, keys))
    .collect::<Vec<_>>()
    .join(JUSTIFICATION_SEPARATOR)
}

fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .map(coerce_scalar)
        .find(|text| !text.is_empty())
}

/// Diagnostic accuracy as a 0..=1 ratio. Accepts numbers and numeric strings;
/// percentages (values above 1, up to 100) are scaled down.
fn first_ratio(object: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| {
            let raw = match value {
                Value::Number(n) => n.as_f64()?,
                Value::String(text) => text.trim().trim_end_matches('%').trim().parse().ok()?,
                _ => return None,
            };
            match raw {
                r if (0.0..=1.0).contains(&r) => Some(r),
                r if r > 1.0 && r <= 100.0 => Some(r / 100.0),
                _ => None,
            }
        })
}
