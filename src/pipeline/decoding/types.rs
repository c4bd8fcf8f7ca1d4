use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ──────────────────────────────────────────────
// Input
// ──────────────────────────────────────────────

/// Raw provider response, fully untrusted.
///
/// Either the text body as received, or a value the transport already
/// decoded (envelope object, canonical record, anything else).
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Text(String),
    Json(Value),
}

impl RawResponse {
    /// Build from raw bytes. Invalid UTF-8 sequences are replaced, never rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::Text(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl From<String> for RawResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawResponse {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

// ──────────────────────────────────────────────
// Diagnostics
// ──────────────────────────────────────────────

/// Which extraction path produced the payload. Carried for diagnostics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    /// The response was a bare string.
    DirectString,
    /// The response was already a decoded object.
    DirectObject,
    /// A top-level `text` field.
    TextField,
    /// `candidates → content → parts → text`.
    NestedContent,
    /// A function-call argument inside a part.
    FunctionCall,
    /// Base64 inline data inside a part.
    InlineData,
    /// Legacy `output_text` field.
    OutputText,
    /// Legacy `result` field.
    LegacyResult,
    /// Strict decode succeeded after a truncation or punctuation repair.
    RepairedJson,
    /// Decoded from the relaxed `{ ... }` block slice.
    ExtractedJson,
    /// Recovered field by field from undecodable text.
    PartialExtraction,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectString => "direct-string",
            Self::DirectObject => "direct-object",
            Self::TextField => "text-field",
            Self::NestedContent => "nested-content",
            Self::FunctionCall => "function-call",
            Self::InlineData => "inline-data",
            Self::OutputText => "output-text",
            Self::LegacyResult => "legacy-result",
            Self::RepairedJson => "repaired-json",
            Self::ExtractedJson => "extracted-json",
            Self::PartialExtraction => "partial-extraction",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Textual repair steps, applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairTier {
    TruncationCloser,
    PunctuationRepair,
    BlockExtraction,
}

impl RepairTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TruncationCloser => "truncation_closer",
            Self::PunctuationRepair => "punctuation_repair",
            Self::BlockExtraction => "block_extraction",
        }
    }
}

/// Result of the tolerant structured decoder.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    Decoded {
        object: Map<String, Value>,
        source: SourceTag,
        repair: Option<RepairTier>,
    },
    /// Strict decode and every repair tier failed. Not fatal: the
    /// partial-field extractor takes over.
    Failed { reason: String, source: SourceTag },
}

// ──────────────────────────────────────────────
// Classification
// ──────────────────────────────────────────────

/// A decoded object, classified by structure.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedShape {
    /// Every canonical field is present.
    AlreadyNormalized(Map<String, Value>),
    /// At least one of the four structured marker containers is present.
    StructuredPayload(Map<String, Value>),
    /// Flat schema keyed by canonical names (some of them present).
    LegacyPayload(Map<String, Value>),
    /// No canonical name and no marker. Mapped as legacy, all defaults.
    Unclassified(Map<String, Value>),
}

impl DecodedShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::AlreadyNormalized(_) => ShapeKind::AlreadyNormalized,
            Self::StructuredPayload(_) => ShapeKind::Structured,
            Self::LegacyPayload(_) => ShapeKind::Legacy,
            Self::Unclassified(_) => ShapeKind::Unclassified,
        }
    }
}

/// Payload-free classification tag, for reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    AlreadyNormalized,
    Structured,
    Legacy,
    Unclassified,
}

// ──────────────────────────────────────────────
// Canonical output
// ──────────────────────────────────────────────

/// Canonical (flat) field names, as they appear on the wire.
pub const FIELD_CHIEF_COMPLAINT: &str = "motivo_consulta";
pub const FIELD_KEY_FINDINGS: &str = "hallazgos_clave";
pub const FIELD_MEDICATIONS: &str = "medicamentos";
pub const FIELD_HISTORY: &str = "antecedentes";
pub const FIELD_RED_FLAGS: &str = "red_flags";
pub const FIELD_YELLOW_FLAGS: &str = "yellow_flags";
pub const FIELD_LEGAL_EXPOSURE: &str = "exposicion_legal";
pub const FIELD_MEDICOLEGAL_RECOMMENDATIONS: &str = "recomendaciones_medicolegales";
pub const FIELD_BIOLOGICAL: &str = "factores_biologicos";
pub const FIELD_PSYCHOLOGICAL: &str = "factores_psicologicos";
pub const FIELD_SOCIAL: &str = "factores_sociales";
pub const FIELD_RECOMMENDED_TESTS: &str = "evaluaciones_sugeridas";

pub const CANONICAL_FIELDS: &[&str] = &[
    FIELD_CHIEF_COMPLAINT,
    FIELD_KEY_FINDINGS,
    FIELD_MEDICATIONS,
    FIELD_HISTORY,
    FIELD_RED_FLAGS,
    FIELD_YELLOW_FLAGS,
    FIELD_LEGAL_EXPOSURE,
    FIELD_MEDICOLEGAL_RECOMMENDATIONS,
    FIELD_BIOLOGICAL,
    FIELD_PSYCHOLOGICAL,
    FIELD_SOCIAL,
    FIELD_RECOMMENDED_TESTS,
];

/// Names a canonical field may appear under in a flat payload: the wire name
/// first, then the matching structured sub-field name.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    (FIELD_CHIEF_COMPLAINT, &[FIELD_CHIEF_COMPLAINT, "chief_complaint"]),
    (FIELD_KEY_FINDINGS, &[FIELD_KEY_FINDINGS, "key_findings"]),
    (FIELD_MEDICATIONS, &[FIELD_MEDICATIONS, "medications"]),
    (FIELD_HISTORY, &[FIELD_HISTORY, "relevant_history"]),
    (FIELD_RED_FLAGS, &[FIELD_RED_FLAGS]),
    (FIELD_YELLOW_FLAGS, &[FIELD_YELLOW_FLAGS]),
    (FIELD_LEGAL_EXPOSURE, &[FIELD_LEGAL_EXPOSURE, "legal_exposure"]),
    (
        FIELD_MEDICOLEGAL_RECOMMENDATIONS,
        &[FIELD_MEDICOLEGAL_RECOMMENDATIONS, "documentation_recommendations"],
    ),
    (FIELD_BIOLOGICAL, &[FIELD_BIOLOGICAL, "biological"]),
    (FIELD_PSYCHOLOGICAL, &[FIELD_PSYCHOLOGICAL, "psychological"]),
    (FIELD_SOCIAL, &[FIELD_SOCIAL, "social"]),
    (FIELD_RECOMMENDED_TESTS, &[FIELD_RECOMMENDED_TESTS, MARKER_TESTS]),
];

/// Accepted names for one canonical field, wire name first.
pub fn field_aliases(canonical: &str) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(field, _)| *field == canonical)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// True when `object` carries any canonical field under any accepted name.
pub fn has_any_flat_field(object: &Map<String, Value>) -> bool {
    FIELD_ALIASES
        .iter()
        .flat_map(|(_, aliases)| aliases.iter())
        .any(|name| object.contains_key(*name))
}

/// Structured schema marker containers.
pub const MARKER_ALERTS: &str = "medicolegal_alerts";
pub const MARKER_HIGHLIGHTS: &str = "conversation_highlights";
pub const MARKER_TESTS: &str = "recommended_physical_tests";
pub const MARKER_BIOPSYCHOSOCIAL: &str = "biopsychosocial_factors";

pub const STRUCTURED_MARKERS: &[&str] = &[
    MARKER_ALERTS,
    MARKER_HIGHLIGHTS,
    MARKER_TESTS,
    MARKER_BIOPSYCHOSOCIAL,
];

/// True when `object` carries every name in `fields`.
pub fn has_all_fields(object: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().all(|field| object.contains_key(*field))
}

/// True when `object` carries at least one name in `fields`.
pub fn has_any_field(object: &Map<String, Value>, fields: &[&str]) -> bool {
    fields.iter().any(|field| object.contains_key(*field))
}

/// Medicolegal exposure level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegalExposure {
    #[default]
    Low,
    Moderate,
    High,
}

impl LegalExposure {
    /// Lenient parse: English or Spanish, any case. Unknown values are `Low`.
    pub fn parse_lenient(text: &str) -> Self {
        match text.trim().to_lowercase().as_str() {
            "moderate" | "medium" | "moderado" | "moderada" | "media" | "medio" => Self::Moderate,
            "high" | "alto" | "alta" => Self::High,
            _ => Self::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }
}

/// A suggested physical examination test.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTest {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "sensibilidad", default, skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f64>,
    #[serde(rename = "especificidad", default, skip_serializing_if = "Option::is_none")]
    pub specificity: Option<f64>,
    #[serde(rename = "justificacion", default)]
    pub justification: String,
}

impl RecommendedTest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// The single stable output record. Always fully populated: absence is the
/// empty default, never a null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalAnalysis {
    #[serde(rename = "motivo_consulta")]
    pub chief_complaint: String,
    #[serde(rename = "hallazgos_clave")]
    pub key_findings: Vec<String>,
    #[serde(rename = "medicamentos")]
    pub medications: Vec<String>,
    #[serde(rename = "antecedentes")]
    pub history: Vec<String>,
    pub red_flags: Vec<String>,
    pub yellow_flags: Vec<String>,
    #[serde(rename = "exposicion_legal")]
    pub legal_exposure: LegalExposure,
    #[serde(rename = "recomendaciones_medicolegales")]
    pub medicolegal_recommendations: Vec<String>,
    #[serde(rename = "factores_biologicos")]
    pub biological_factors: Vec<String>,
    #[serde(rename = "factores_psicologicos")]
    pub psychological_factors: Vec<String>,
    #[serde(rename = "factores_sociales")]
    pub social_factors: Vec<String>,
    #[serde(rename = "evaluaciones_sugeridas")]
    pub recommended_tests: Vec<RecommendedTest>,
}

impl CanonicalAnalysis {
    /// Fresh, fully-defaulted record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field carries content.
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

/// Fresh empty canonical-shaped JSON object (every field at its default).
pub fn empty_canonical_object() -> Map<String, Value> {
    let mut object = Map::new();
    for field in CANONICAL_FIELDS {
        let default = match *field {
            FIELD_CHIEF_COMPLAINT => Value::String(String::new()),
            FIELD_LEGAL_EXPOSURE => Value::String(LegalExposure::Low.as_str().to_string()),
            _ => Value::Array(Vec::new()),
        };
        object.insert((*field).to_string(), default);
    }
    object
}

/// Full decode result with diagnostics. Diagnostics never affect `analysis`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodeReport {
    pub analysis: CanonicalAnalysis,
    pub source: SourceTag,
    pub shape: ShapeKind,
    pub repair: Option<RepairTier>,
}
