use serde_json::{Map, Value};

use super::envelope::strip_code_fences;
use super::repair::REPAIR_TIERS;
use super::types::{DecodeOutcome, RepairTier, SourceTag};

/// Decode unwrapped text into a JSON object.
///
/// Strict decode first; on failure each repair tier runs at most once, in
/// order, on the output of the previous tier, and strict decode is retried
/// after each. Stops at the first success. `Failed` is not terminal: the
/// caller falls back to partial-field extraction.
pub fn decode_text(text: &str, source: SourceTag) -> DecodeOutcome {
    let cleaned = strip_code_fences(text);

    let reason = match strict_decode(cleaned) {
        Ok(object) => {
            return DecodeOutcome::Decoded {
                object,
                source,
                repair: None,
            }
        }
        Err(reason) => reason,
    };

    let mut working = cleaned.to_string();
    for (tier, repair) in REPAIR_TIERS {
        let Some(repaired) = repair(&working) else {
            continue;
        };
        match strict_decode(&repaired) {
            Ok(object) => {
                tracing::debug!(
                    tier = tier.as_str(),
                    input_len = cleaned.len(),
                    repaired_len = repaired.len(),
                    "Payload decoded after repair"
                );
                return DecodeOutcome::Decoded {
                    object,
                    source: repaired_source(*tier),
                    repair: Some(*tier),
                };
            }
            Err(e) => {
                tracing::debug!(tier = tier.as_str(), error = %e, "Repair tier did not yield valid JSON");
                working = repaired;
            }
        }
    }

    DecodeOutcome::Failed { reason, source }
}

/// Strict decode; anything but a JSON object is a failure.
pub fn strict_decode(text: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err("payload is valid JSON but not an object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn repaired_source(tier: RepairTier) -> SourceTag {
    match tier {
        RepairTier::TruncationCloser | RepairTier::PunctuationRepair => SourceTag::RepairedJson,
        RepairTier::BlockExtraction => SourceTag::ExtractedJson,
    }
}
