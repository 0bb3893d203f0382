//! Scene documents
//!
//! A document is either a JSON object
//! `{"room_dimensions": [x, y, z], "user_intent": "...", "objects_in_room": [...]}`
//! or a bare array of objects, in which case the room comes from elsewhere.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DocumentError;
use crate::pipeline::{Deletion, ResolvedScene};
use crate::scene::{Room, SceneObject};

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    room_dimensions: Option<[f64; 3]>,
    #[serde(default)]
    user_intent: String,
    #[serde(default)]
    objects_in_room: Vec<SceneObject>,
}

/// A parsed scene document
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDocument {
    pub room: Option<Room>,
    pub user_intent: String,
    pub objects: Vec<SceneObject>,
}

impl SceneDocument {
    /// Parse a document from JSON text
    pub fn from_json(source: &str) -> Result<Self, DocumentError> {
        if source.trim_start().starts_with('[') {
            let objects: Vec<SceneObject> =
                serde_json::from_str(source).map_err(|e| DocumentError::json(e, source))?;
            return Ok(Self {
                room: None,
                user_intent: String::new(),
                objects,
            });
        }

        let raw: RawDocument =
            serde_json::from_str(source).map_err(|e| DocumentError::json(e, source))?;
        let room = raw.room_dimensions.map(room_from_dimensions).transpose()?;
        Ok(Self {
            room,
            user_intent: raw.user_intent,
            objects: raw.objects_in_room,
        })
    }

    /// Load a document from a file
    pub fn from_file(path: &Path) -> Result<Self, DocumentError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Validate room dimensions given as `[x, y, z]`
pub fn room_from_dimensions(dimensions: [f64; 3]) -> Result<Room, DocumentError> {
    if dimensions.iter().all(|d| d.is_finite() && *d > 0.0) {
        Ok(Room::new(dimensions[0], dimensions[1], dimensions[2]))
    } else {
        Err(DocumentError::InvalidRoom(dimensions))
    }
}

/// The resolved scene in document form
#[derive(Debug, Serialize)]
pub struct SceneOutput<'a> {
    pub room_dimensions: [f64; 3],
    #[serde(skip_serializing_if = "str::is_empty")]
    pub user_intent: &'a str,
    pub objects_in_room: &'a [SceneObject],
    pub room_layout_elements: Vec<SceneObject>,
    #[serde(skip_serializing_if = "no_items")]
    pub deletions: &'a [Deletion],
}

impl<'a> SceneOutput<'a> {
    pub fn new(scene: &'a ResolvedScene, user_intent: &'a str) -> Self {
        let room = scene.room;
        Self {
            room_dimensions: [room.x, room.y, room.z],
            user_intent,
            objects_in_room: &scene.objects,
            room_layout_elements: room.priors(),
            deletions: &scene.deletions,
        }
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        serde_json::to_string_pretty(self).map_err(DocumentError::Write)
    }
}

fn no_items<T>(items: &&[T]) -> bool {
    items.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{LayoutElement, LayoutPreposition, ObjectPreposition};
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"{
        "room_dimensions": [4.0, 3.0, 2.5],
        "user_intent": "A study with a desk and a chair",
        "objects_in_room": [
            {
                "new_object_id": "desk_1",
                "style": "Modern",
                "material": "Oak",
                "size_in_meters": {"length": 1.2, "width": 0.6, "height": 0.75},
                "is_on_the_floor": true,
                "facing": "north_wall",
                "placement": {
                    "room_layout_elements": [
                        {"layout_element_id": "south_wall", "preposition": "in the corner"}
                    ],
                    "objects_in_room": []
                }
            },
            {
                "new_object_id": "chair_1",
                "size_in_meters": {"length": 0.5, "width": 0.5, "height": 0.9},
                "is_on_the_floor": true,
                "facing": "desk_1",
                "placement": {
                    "room_layout_elements": [],
                    "objects_in_room": [
                        {"object_id": "desk_1", "preposition": "in front", "is_adjacent": true}
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_object_document() {
        let doc = SceneDocument::from_json(DOCUMENT).unwrap();
        assert_eq!(doc.room, Some(Room::new(4.0, 3.0, 2.5)));
        assert_eq!(doc.user_intent, "A study with a desk and a chair");
        assert_eq!(doc.objects.len(), 2);

        let desk = &doc.objects[0];
        assert_eq!(desk.style.as_deref(), Some("Modern"));
        assert_eq!(desk.layout_relations()[0].element, LayoutElement::SouthWall);
        assert_eq!(desk.layout_relations()[0].preposition, LayoutPreposition::InTheCorner);

        let chair = &doc.objects[1];
        assert_eq!(chair.object_relations()[0].preposition, ObjectPreposition::InFront);
        assert!(chair.object_relations()[0].is_adjacent);
    }

    #[test]
    fn test_parse_bare_array() {
        let source = r#"[{"new_object_id": "rug_1", "size_in_meters": {"length": 2.0, "width": 1.5, "height": 0.01}}]"#;
        let doc = SceneDocument::from_json(source).unwrap();
        assert_eq!(doc.room, None);
        assert_eq!(doc.objects[0].id, "rug_1");
        assert!(!doc.objects[0].on_floor);
    }

    #[test]
    fn test_invalid_room() {
        let source = r#"{"room_dimensions": [4.0, 0.0, 2.5], "objects_in_room": []}"#;
        assert!(matches!(
            SceneDocument::from_json(source),
            Err(DocumentError::InvalidRoom(_))
        ));
    }

    #[test]
    fn test_missing_size_is_a_json_error() {
        let source = r#"{"objects_in_room": [{"new_object_id": "rug_1"}]}"#;
        let Err(DocumentError::Json { message, .. }) = SceneDocument::from_json(source) else {
            panic!("expected a JSON error");
        };
        insta::assert_snapshot!(message, @"missing field `size_in_meters`");
    }
}
