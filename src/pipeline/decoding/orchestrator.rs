use super::classify::classify_payload;
use super::decoder::decode_text;
use super::envelope::{unwrap_envelope, Unwrapped};
use super::mapper::map_to_canonical;
use super::partial::extract_partial_fields;
use super::types::{CanonicalAnalysis, DecodeOutcome, DecodeReport, RawResponse, SourceTag};
use super::DecodeError;
use crate::config::DecoderConfig;

/// Decode a raw provider response into the canonical analysis record.
///
/// The only public contract of the pipeline: either a fully-populated record
/// (possibly sparse) or one of the two terminal errors.
pub fn normalize_response(raw: impl Into<RawResponse>) -> Result<CanonicalAnalysis, DecodeError> {
    ResponseNormalizer::default().normalize(raw)
}

/// Runs unwrap → decode (→ partial extraction) → classify → map.
///
/// Holds configuration only; no state survives a call, so one instance can be
/// shared freely across threads.
#[derive(Debug, Clone, Default)]
pub struct ResponseNormalizer {
    config: DecoderConfig,
}

impl ResponseNormalizer {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn normalize(&self, raw: impl Into<RawResponse>) -> Result<CanonicalAnalysis, DecodeError> {
        self.decode(raw).map(|report| report.analysis)
    }

    /// Same as `normalize`, with diagnostics about the path taken.
    pub fn decode(&self, raw: impl Into<RawResponse>) -> Result<DecodeReport, DecodeError> {
        let (object, source, repair) = match unwrap_envelope(raw.into(), self.config.max_unwrap_depth)? {
            Unwrapped::Object { object, source } => (object, source, None),
            Unwrapped::Text { text, source } => match decode_text(&text, source) {
                DecodeOutcome::Decoded {
                    object,
                    source,
                    repair,
                } => (object, source, repair),
                DecodeOutcome::Failed { reason, source } => {
                    tracing::debug!(source = %source, error = %reason, "All decode tiers failed");
                    (extract_partial_fields(&text), SourceTag::PartialExtraction, None)
                }
            },
        };

        let shape = classify_payload(object);
        let kind = shape.kind();
        let analysis = map_to_canonical(shape);

        tracing::debug!(
            source = %source,
            shape = ?kind,
            repair = repair.map(|tier| tier.as_str()),
            "Response normalized"
        );

        Ok(DecodeReport {
            analysis,
            source,
            shape: kind,
            repair,
        })
    }
}
