use serde_json::{Map, Value};

use super::types::{
    has_all_fields, has_any_field, has_any_flat_field, DecodedShape, CANONICAL_FIELDS,
    STRUCTURED_MARKERS,
};

/// Classify a decoded object by structure alone.
///
/// Order matters: a full canonical record wins over markers, markers win over
/// flat field names (canonical or structured sub-field spelling). Objects with
/// neither are `Unclassified` and are mapped as legacy (all defaults) downstream.
pub fn classify_payload(object: Map<String, Value>) -> DecodedShape {
    if has_all_fields(&object, CANONICAL_FIELDS) {
        return DecodedShape::AlreadyNormalized(object);
    }
    if has_any_field(&object, STRUCTURED_MARKERS) {
        return DecodedShape::StructuredPayload(object);
    }
    if has_any_flat_field(&object) {
        return DecodedShape::LegacyPayload(object);
    }
    DecodedShape::Unclassified(object)
}
