// End-to-end tests for the full chain: unwrap → decode → extract → classify → map.

use serde_json::{json, Value};

use super::orchestrator::{normalize_response, ResponseNormalizer};
use super::types::{
    CanonicalAnalysis, LegalExposure, RawResponse, RecommendedTest, ShapeKind, SourceTag,
};
use super::DecodeError;

fn structured_payload() -> Value {
    json!({
        "conversation_highlights": {
            "chief_complaint": "Right shoulder pain when reaching overhead",
            "key_findings": ["Painful arc 60-120°", "Weak external rotation"],
            "medications": ["Paracetamol 1g PRN"],
            "relevant_history": ["Fall on outstretched hand 3 months ago"]
        },
        "medicolegal_alerts": {
            "red_flags": ["No red flags identified"],
            "yellow_flags": ["Believes shoulder is 'ruined'"],
            "legal_exposure": "high",
            "documentation_recommendations": ["Document mechanism of injury"]
        },
        "biopsychosocial_factors": {
            "biological": ["Age 58"],
            "psychological": ["Sleep disturbance"],
            "social": ["Manual labourer"],
            "legal_employment_context": ["Workplace injury claim"]
        },
        "recommended_physical_tests": [
            {
                "name": "Drop arm test",
                "sensitivity": 0.27,
                "specificity": 0.88,
                "rationale": "Full-thickness cuff tear",
                "region": "Shoulder"
            },
            "Hawkins-Kennedy"
        ]
    })
}

fn legacy_equivalent() -> Value {
    json!({
        "motivo_consulta": "Right shoulder pain when reaching overhead",
        "hallazgos_clave": ["Painful arc 60-120°", "Weak external rotation"],
        "medicamentos": ["Paracetamol 1g PRN"],
        "antecedentes": ["Fall on outstretched hand 3 months ago"],
        "red_flags": [],
        "yellow_flags": ["Believes shoulder is 'ruined'", "Workplace injury claim"],
        "exposicion_legal": "high",
        "recomendaciones_medicolegales": ["Document mechanism of injury"],
        "factores_biologicos": ["Age 58"],
        "factores_psicologicos": ["Sleep disturbance"],
        "factores_sociales": ["Manual labourer"],
        "evaluaciones_sugeridas": [
            {"name": "Drop arm test", "sensitivity": 0.27, "specificity": 0.88,
             "justification": "Full-thickness cuff tear | Shoulder"},
            "Hawkins-Kennedy"
        ]
    })
}

fn candidates_envelope(text: &str) -> Value {
    json!({"candidates": [{"content": {"parts": [{"text": text}], "role": "model"}}]})
}

#[test]
fn example_envelope_filters_boilerplate_red_flag() {
    let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"conversation_highlights\":{\"chief_complaint\":\"low back pain\"},\"medicolegal_alerts\":{\"red_flags\":[\"none identified\"]}}"}]}}]}"#;
    let analysis = normalize_response(raw).unwrap();
    assert_eq!(analysis.chief_complaint, "low back pain");
    assert!(analysis.red_flags.is_empty());
}

#[test]
fn structured_payload_maps_fully() {
    let analysis = normalize_response(structured_payload()).unwrap();
    assert_eq!(analysis.legal_exposure, LegalExposure::High);
    assert!(analysis.red_flags.is_empty());
    assert_eq!(
        analysis.yellow_flags,
        vec!["Believes shoulder is 'ruined'", "Workplace injury claim"]
    );
    assert_eq!(
        analysis.recommended_tests,
        vec![
            RecommendedTest {
                name: "Drop arm test".into(),
                sensitivity: Some(0.27),
                specificity: Some(0.88),
                justification: "Full-thickness cuff tear | Shoulder".into(),
            },
            RecommendedTest::named("Hawkins-Kennedy"),
        ]
    );
}

#[test]
fn text_input_is_total() {
    let inputs = [
        "",
        "   ",
        "I'm sorry, I can't help with that.",
        "{",
        "}{",
        "[1, 2, 3]",
        "\"just a string\"",
        "null",
        "{\"a\": ",
        "```json\n{\"red_flags\": [\"x\",",
        "{{{{[[[[\"",
        "\\u0000\u{0}\u{feff}",
        "{\"candidates\": []}",
        "{\"choices\": []}",
        "{\"candidates\": [{\"content\": {\"parts\": []}}]}",
    ];
    for input in inputs {
        let result = normalize_response(input);
        assert!(result.is_ok(), "input {input:?} gave {result:?}");
    }
}

#[test]
fn normalizing_a_canonical_record_is_idempotent() {
    let first = normalize_response(structured_payload()).unwrap();
    let reencoded = serde_json::to_value(&first).unwrap();
    let second = normalize_response(reencoded.clone()).unwrap();
    assert_eq!(first, second);

    // Also through the text path.
    let third = normalize_response(reencoded.to_string()).unwrap();
    assert_eq!(first, third);
}

#[test]
fn empty_record_round_trips() {
    let empty = serde_json::to_value(CanonicalAnalysis::empty()).unwrap();
    assert_eq!(normalize_response(empty).unwrap(), CanonicalAnalysis::empty());
}

#[test]
fn truncated_structured_text_recovers_complete_elements() {
    let text = r#"{"conversation_highlights": {"chief_complaint": "Knee pain", "key_findings": ["Effusion", "Joint line tenderness"]}, "medicolegal_alerts": {"yellow_flags": ["Fear of re-injury", "Mod"#;
    let report = ResponseNormalizer::default().decode(text).unwrap();
    assert_eq!(report.source, SourceTag::RepairedJson);
    assert_eq!(report.analysis.chief_complaint, "Knee pain");
    assert_eq!(
        report.analysis.key_findings,
        vec!["Effusion", "Joint line tenderness"]
    );
    assert_eq!(report.analysis.yellow_flags, vec!["Fear of re-injury"]);
}

#[test]
fn envelope_transparency() {
    let payload = structured_payload().to_string();
    let bare = normalize_response(payload.as_str()).unwrap();
    let wrapped = normalize_response(candidates_envelope(&payload)).unwrap();
    let wrapped_text = normalize_response(candidates_envelope(&payload).to_string()).unwrap();
    let text_field = normalize_response(json!({"text": payload})).unwrap();
    assert_eq!(bare, wrapped);
    assert_eq!(bare, wrapped_text);
    assert_eq!(bare, text_field);
}

#[test]
fn envelope_transparency_for_truncated_payloads() {
    let text = r#"{"medicolegal_alerts": {"red_flags": ["Saddle anaesthesia", "Urinary retention", "Bil"#;
    let bare = normalize_response(text).unwrap();
    let wrapped = normalize_response(candidates_envelope(text)).unwrap();
    assert_eq!(bare, wrapped);
    assert_eq!(bare.red_flags, vec!["Saddle anaesthesia", "Urinary retention"]);
}

#[test]
fn legacy_and_structured_payloads_are_equivalent() {
    let structured = normalize_response(structured_payload()).unwrap();
    let legacy = normalize_response(legacy_equivalent()).unwrap();
    assert_eq!(structured, legacy);
}

#[test]
fn partial_extraction_floor() {
    let text = "The analysis: \"chief_complaint\": \"Hip pain on stairs\" ... <truncated> ] } ]";
    let analysis = normalize_response(text).unwrap();
    assert_eq!(analysis.chief_complaint, "Hip pain on stairs");
    assert_eq!(
        analysis,
        CanonicalAnalysis {
            chief_complaint: "Hip pain on stairs".into(),
            ..CanonicalAnalysis::empty()
        }
    );
}

#[test]
fn partial_floor_holds_for_prose_wrapped_block() {
    let report = ResponseNormalizer::default()
        .decode("Here is the analysis: {\"chief_complaint\": \"Hip pain on stairs\"} thanks")
        .unwrap();
    assert_eq!(report.source, SourceTag::ExtractedJson);
    assert_eq!(
        report.analysis,
        CanonicalAnalysis {
            chief_complaint: "Hip pain on stairs".into(),
            ..CanonicalAnalysis::empty()
        }
    );
}

#[test]
fn partial_floor_holds_for_truncated_flat_block() {
    let report = ResponseNormalizer::default()
        .decode("{\"chief_complaint\": \"Hip pain on stairs\", \"key_findings\": [\"Antalgic ga")
        .unwrap();
    assert_eq!(report.source, SourceTag::RepairedJson);
    assert_eq!(report.shape, ShapeKind::Legacy);
    assert_eq!(report.analysis.chief_complaint, "Hip pain on stairs");
    assert!(report.analysis.key_findings.is_empty());
}

#[test]
fn fence_inside_string_value_keeps_text_and_object_inputs_equal() {
    let payload = json!({
        "recommended_physical_tests": [{
            "name": "SLR",
            "sensitivity": 0.9,
            "rationale": "see ```json {x}``` note",
            "region": "Lumbar"
        }]
    });
    let from_object = normalize_response(payload.clone()).unwrap();
    let from_text = ResponseNormalizer::default()
        .decode(payload.to_string())
        .unwrap();
    assert_eq!(from_text.source, SourceTag::DirectString);
    assert_eq!(from_text.analysis, from_object);
    assert_eq!(from_object.recommended_tests[0].sensitivity, Some(0.9));
    assert_eq!(
        from_object.recommended_tests[0].justification,
        "see ```json {x}``` note | Lumbar"
    );
}

#[test]
fn payloadless_envelope_text_maps_to_empty_record() {
    assert_eq!(
        normalize_response("{\"candidates\": []}").unwrap(),
        CanonicalAnalysis::empty()
    );
    assert_eq!(
        normalize_response("{\"choices\": []}").unwrap(),
        CanonicalAnalysis::empty()
    );
}

#[test]
fn upstream_errors_surface_verbatim() {
    assert_eq!(
        normalize_response(json!({"error": "The model is overloaded. Please try again later."})),
        Err(DecodeError::Upstream {
            message: "The model is overloaded. Please try again later.".into()
        })
    );
    assert!(matches!(
        normalize_response(r#"{"error": {"code": 400, "message": "API key not valid"}}"#),
        Err(DecodeError::Upstream { .. })
    ));
}

#[test]
fn payloadless_envelopes_are_unrecognized() {
    let empty_parts = json!({"candidates": [{"content": {"parts": []}}]});
    assert!(matches!(
        normalize_response(empty_parts),
        Err(DecodeError::UnrecognizedFormat(_))
    ));
    assert!(matches!(
        normalize_response(RawResponse::Json(Value::Null)),
        Err(DecodeError::UnrecognizedFormat(_))
    ));
}

#[test]
fn bytes_input_decodes() {
    let bytes = structured_payload().to_string().into_bytes();
    let analysis = normalize_response(RawResponse::from_bytes(&bytes)).unwrap();
    assert_eq!(analysis.medications, vec!["Paracetamol 1g PRN"]);
}

#[test]
fn concurrent_calls_are_independent() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let text = format!(r#"{{"motivo_consulta": "case {i}"}}"#);
                normalize_response(text).unwrap().chief_complaint
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("case {i}"));
    }
}
