//! Integration tests for scene documents in and out

use pretty_assertions::assert_eq;
use room_layout::{resolve, resolve_with_config, DocumentError, ResolveConfig, ResolveError};

#[test]
fn test_output_carries_deletions() {
    let resolution = resolve(include_str!("fixtures/oversized.json")).expect("Should resolve");
    let json = resolution.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["user_intent"], "A study with a desk");
    let ids: Vec<&str> = value["objects_in_room"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["new_object_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["desk_1", "rug_1"]);
    assert_eq!(value["deletions"][0]["object"], "wardrobe_1");
    assert_eq!(value["deletions"][0]["removed"].as_array().map(Vec::len), Some(3));
}

#[test]
fn test_output_is_readable_again() {
    let resolution = resolve(include_str!("fixtures/study.json")).expect("Should resolve");
    let json = resolution.to_json().unwrap();
    let again = resolve(&json).expect("Should resolve its own output");
    assert_eq!(
        again.scene.get("chair_1").unwrap().position,
        resolution.scene.get("chair_1").unwrap().position
    );
}

#[test]
fn test_intent_override_protects_objects() {
    let config = ResolveConfig::new().with_user_intent("a room with a wardrobe and a mirror");
    let resolution = resolve_with_config(include_str!("fixtures/oversized.json"), config);
    // The wardrobe can no longer be deleted and never fits
    assert!(matches!(resolution, Err(ResolveError::Engine(_))));
}

#[test]
fn test_syntax_error_is_located() {
    let source = "{\n  \"room_dimensions\": [4.0, 3.0 2.5]\n}";
    let err = match resolve(source) {
        Err(ResolveError::Document(err)) => err,
        other => panic!("expected a document error, got {other:?}"),
    };
    match &err {
        DocumentError::Json { line, .. } => assert_eq!(*line, 2),
        other => panic!("expected a JSON error, got {other:?}"),
    }
    let report = err.format(source, "room.json");
    assert!(report.contains("room.json"));
}
