// Envelope unwrapper: peels provider-specific wrapping until a text or
// object payload remains. Bounded loop over a fixed list of wrapper shapes.

use base64::Engine as _;
use serde_json::{Map, Value};

use super::types::{
    has_all_fields, RawResponse, SourceTag, CANONICAL_FIELDS, STRUCTURED_MARKERS,
};
use super::DecodeError;

/// Default bound on the number of envelope layers peeled per call.
pub const DEFAULT_MAX_UNWRAP_DEPTH: usize = 8;

/// Payload left once every known envelope layer is removed.
#[derive(Debug, Clone, PartialEq)]
pub enum Unwrapped {
    /// Text that is not itself a decodable envelope. Goes to the tolerant decoder.
    Text { text: String, source: SourceTag },
    /// An object that matches no wrapper shape (or is already a payload).
    Object {
        object: Map<String, Value>,
        source: SourceTag,
    },
}

/// Strip envelope layers from a raw response.
///
/// Upstream error descriptors become `DecodeError::Upstream` before any decode
/// is attempted. Decoded values carrying no payload at all (null, numbers,
/// arrays, a candidate list without a usable part) are `UnrecognizedFormat`;
/// the same envelope reached through text passes through instead. Any other
/// object passes through unchanged.
pub fn unwrap_envelope(raw: RawResponse, max_depth: usize) -> Result<Unwrapped, DecodeError> {
    let (mut current, mut source) = match raw {
        RawResponse::Text(text) => (Value::String(text), SourceTag::DirectString),
        RawResponse::Json(Value::String(text)) => (Value::String(text), SourceTag::DirectString),
        RawResponse::Json(value) => (value, SourceTag::DirectObject),
    };

    // Text input stays total: an envelope decoded out of text never raises
    // `UnrecognizedFormat`.
    let mut from_text = false;

    for depth in 0..max_depth.max(1) {
        match current {
            Value::String(text) => match parse_embedded(&text) {
                Some(inner) => {
                    tracing::debug!(depth, source = %source, "Text payload holds another JSON layer");
                    from_text = true;
                    current = inner;
                }
                None => return Ok(Unwrapped::Text { text, source }),
            },
            Value::Object(object) => {
                if let Some(message) = upstream_error(&object) {
                    tracing::warn!(depth, "Provider response carries an explicit error");
                    return Err(DecodeError::Upstream { message });
                }
                if has_all_fields(&object, CANONICAL_FIELDS)
                    || has_all_fields(&object, STRUCTURED_MARKERS)
                {
                    return Ok(Unwrapped::Object { object, source });
                }
                match peel_layer(&object) {
                    Ok(Some((inner, tag))) => {
                        tracing::debug!(depth, source = %tag, "Envelope layer stripped");
                        current = inner;
                        source = tag;
                    }
                    Ok(None) => return Ok(Unwrapped::Object { object, source }),
                    Err(e) if from_text => {
                        tracing::debug!(depth, error = %e, "Payload-less envelope in text; passing through");
                        return Ok(Unwrapped::Object { object, source });
                    }
                    Err(e) => return Err(e),
                }
            }
            other => {
                return Err(DecodeError::UnrecognizedFormat(format!(
                    "expected text or object, found {}",
                    json_kind(&other)
                )))
            }
        }
    }

    tracing::debug!(max_depth, "Envelope depth limit reached; handing off current layer");
    match current {
        Value::String(text) => Ok(Unwrapped::Text { text, source }),
        Value::Object(object) => Ok(Unwrapped::Object { object, source }),
        other => Err(DecodeError::UnrecognizedFormat(format!(
            "expected text or object, found {}",
            json_kind(&other)
        ))),
    }
}

/// Strip a Markdown code fence around a JSON body, if present.
///
/// Handles preamble prose before the fence and an unclosed fence (truncated
/// output). Fences whose body is not JSON-looking are left alone, and so is
/// text that already opens as JSON: any fence in it sits inside a string value.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.starts_with(['{', '[', '"']) {
        return trimmed;
    }
    let Some(start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = trimmed[start + 3..]
        .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
        .trim_start();
    if !(after_fence.starts_with('{') || after_fence.starts_with('[')) {
        return trimmed;
    }
    match after_fence.find("```") {
        Some(end) => after_fence[..end].trim(),
        None => after_fence.trim_end(),
    }
}

/// Strictly decode text that is itself JSON (object or double-encoded string).
fn parse_embedded(text: &str) -> Option<Value> {
    let body = strip_code_fences(text);
    if !(body.starts_with('{') || body.starts_with('"')) {
        return None;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value @ (Value::Object(_) | Value::String(_))) => Some(value),
        _ => None,
    }
}

/// Extract an explicit provider error message, if the object carries one.
fn upstream_error(object: &Map<String, Value>) -> Option<String> {
    match object.get("error")? {
        Value::String(message) if !message.trim().is_empty() => Some(message.clone()),
        Value::Object(detail) => {
            let message = detail
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| detail.get("status").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| Value::Object(detail.clone()).to_string());
            Some(message)
        }
        _ => None,
    }
}

/// Try every known wrapper shape, in order. `Ok(None)` means no wrapper matched.
fn peel_layer(object: &Map<String, Value>) -> Result<Option<(Value, SourceTag)>, DecodeError> {
    if let Some(candidates) = object.get("candidates").and_then(Value::as_array) {
        let found = candidates
            .iter()
            .filter_map(|candidate| candidate.get("content"))
            .find_map(scan_content);
        return match found {
            Some(payload) => Ok(Some(payload)),
            None => Err(DecodeError::UnrecognizedFormat(
                "candidate list carries no text, function-call or inline-data part".into(),
            )),
        };
    }

    if let Some(choices) = object.get("choices").and_then(Value::as_array) {
        let found = choices.iter().find_map(|choice| {
            choice
                .get("message")
                .and_then(|message| message.get("content"))
                .or_else(|| choice.get("text"))
                .and_then(non_blank_str)
        });
        return match found {
            Some(text) => Ok(Some((Value::String(text.to_string()), SourceTag::NestedContent))),
            None => Err(DecodeError::UnrecognizedFormat(
                "choice list carries no message content".into(),
            )),
        };
    }

    if let Some(payload) = object.get("content").and_then(scan_content) {
        return Ok(Some(payload));
    }

    if let Some(parts) = object.get("parts").and_then(Value::as_array) {
        if let Some(payload) = parts.iter().find_map(scan_part) {
            return Ok(Some(payload));
        }
    }

    if let Some(text) = object
        .get("message")
        .and_then(|message| message.get("content"))
        .and_then(non_blank_str)
    {
        return Ok(Some((Value::String(text.to_string()), SourceTag::NestedContent)));
    }

    if let Some(text) = object.get("output_text").and_then(Value::as_str) {
        return Ok(Some((Value::String(text.to_string()), SourceTag::OutputText)));
    }

    match object.get("result") {
        Some(Value::String(text)) => {
            return Ok(Some((Value::String(text.clone()), SourceTag::LegacyResult)))
        }
        Some(inner @ Value::Object(_)) => return Ok(Some((inner.clone(), SourceTag::LegacyResult))),
        _ => {}
    }

    for key in ["response", "text"] {
        if let Some(text) = object.get(key).and_then(Value::as_str) {
            return Ok(Some((Value::String(text.to_string()), SourceTag::TextField)));
        }
    }

    Ok(None)
}

/// `content` is either a text string or an object holding `parts`.
fn scan_content(content: &Value) -> Option<(Value, SourceTag)> {
    match content {
        Value::String(text) if !text.trim().is_empty() => {
            Some((Value::String(text.clone()), SourceTag::NestedContent))
        }
        Value::Object(inner) => inner
            .get("parts")
            .and_then(Value::as_array)
            .and_then(|parts| parts.iter().find_map(scan_part)),
        Value::Array(parts) => parts.iter().find_map(scan_part),
        _ => None,
    }
}

/// First payload exposed by a single part: text, function-call argument, or inline data.
fn scan_part(part: &Value) -> Option<(Value, SourceTag)> {
    if let Some(text) = non_blank_str(part) {
        return Some((Value::String(text.to_string()), SourceTag::NestedContent));
    }

    if let Some(text) = part.get("text").and_then(non_blank_str) {
        return Some((Value::String(text.to_string()), SourceTag::NestedContent));
    }

    let call = part.get("functionCall").or_else(|| part.get("function_call"));
    if let Some(args) = call.and_then(|c| c.get("args").or_else(|| c.get("arguments"))) {
        if let Some(payload) = function_args_payload(args) {
            return Some((payload, SourceTag::FunctionCall));
        }
    }

    let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
    if let Some(data) = inline.and_then(|d| d.get("data")).and_then(Value::as_str) {
        match decode_inline_data(data) {
            Some(text) => return Some((Value::String(text), SourceTag::InlineData)),
            None => tracing::debug!(len = data.len(), "Skipping undecodable inline data part"),
        }
    }

    None
}

/// Function-call arguments: a string is text, an object is the payload itself,
/// unless it only wraps a single text field.
fn function_args_payload(args: &Value) -> Option<Value> {
    match args {
        Value::String(text) if !text.trim().is_empty() => Some(Value::String(text.clone())),
        Value::Object(fields) if !fields.is_empty() => {
            if fields.len() == 1 {
                for key in ["text", "json", "content"] {
                    if let Some(text) = fields.get(key).and_then(Value::as_str) {
                        return Some(Value::String(text.to_string()));
                    }
                }
            }
            Some(args.clone())
        }
        _ => None,
    }
}

fn decode_inline_data(data: &str) -> Option<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    (!text.trim().is_empty()).then_some(text)
}

fn non_blank_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|text| !text.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
