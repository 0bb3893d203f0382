//! Room Layout - scene-graph resolution for furnished rooms
//!
//! This library turns a scene graph of furnishing objects and their spatial
//! relations into concrete positions and rotations inside a box-shaped room.
//!
//! # Example
//!
//! ```rust
//! use room_layout::resolve;
//!
//! let resolution = resolve(r#"{
//!     "room_dimensions": [4.0, 3.0, 2.5],
//!     "objects_in_room": [{
//!         "new_object_id": "desk_1",
//!         "size_in_meters": {"length": 1.2, "width": 0.6, "height": 0.75},
//!         "is_on_the_floor": true,
//!         "placement": {
//!             "room_layout_elements": [
//!                 {"layout_element_id": "south_wall", "preposition": "in the corner"}
//!             ]
//!         }
//!     }]
//! }"#).unwrap();
//!
//! assert!(resolution.scene.get("desk_1").unwrap().position.is_some());
//! ```

pub mod document;
pub mod error;
pub mod pipeline;
pub mod scene;

pub use document::{SceneDocument, SceneOutput};
pub use error::DocumentError;
pub use pipeline::{
    Correction, Corrector, Deleter, Deletion, Refiner, ResolvedScene, Resolver,
};
pub use scene::{ConfigError, EngineConfig, EngineError, Room, SceneObject};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur while resolving a scene document
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The document could not be read or parsed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The engine configuration is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Resolution failed
    #[error("resolution failed: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration for resolving a document
#[derive(Debug, Clone, Default)]
pub struct ResolveConfig {
    pub engine: EngineConfig,
    /// Room used when the document does not carry its dimensions
    pub room: Option<Room>,
    /// Overrides the document's user intent
    pub user_intent: Option<String>,
    /// Dump every resolved object at debug level
    pub debug: bool,
}

impl ResolveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.room = Some(room);
        self
    }

    pub fn with_user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = Some(intent.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// A resolved document
#[derive(Debug, Clone)]
pub struct Resolution {
    pub scene: ResolvedScene,
    pub user_intent: String,
}

impl Resolution {
    /// The resolved scene as a pretty-printed JSON document
    pub fn to_json(&self) -> Result<String, DocumentError> {
        SceneOutput::new(&self.scene, &self.user_intent).to_json()
    }
}

/// Resolve a JSON scene document with default configuration
pub fn resolve(source: &str) -> Result<Resolution, ResolveError> {
    resolve_with_config(source, ResolveConfig::default())
}

/// Resolve a JSON scene document with the fallback collaborators
///
/// The document's room wins over `config.room`; the configured user intent
/// wins over the document's.
pub fn resolve_with_config(source: &str, config: ResolveConfig) -> Result<Resolution, ResolveError> {
    let doc = SceneDocument::from_json(source)?;
    let room = doc.room.or(config.room).ok_or(DocumentError::MissingRoom)?;
    let user_intent = config.user_intent.unwrap_or(doc.user_intent);

    let scene = Resolver::new(config.engine)
        .with_user_intent(user_intent.as_str())
        .resolve(doc.objects, room)?;

    if config.debug {
        debug!("=== resolved scene ===");
        for obj in &scene.objects {
            let (x, y) = obj.reserved_span();
            match obj.position {
                Some(p) => debug!(
                    "[{}] x={:.2} y={:.2} z={:.2} angle={} span={:.2}x{:.2}",
                    obj.id,
                    p.x,
                    p.y,
                    p.z,
                    obj.z_angle(),
                    x,
                    y
                ),
                None => debug!("[{}] unplaced", obj.id),
            }
        }
        for deletion in &scene.deletions {
            debug!("deleted {:?}: {}", deletion.removed, deletion.reason);
        }
    }

    Ok(Resolution { scene, user_intent })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDY: &str = r#"{
        "room_dimensions": [4.0, 3.0, 2.5],
        "user_intent": "a study",
        "objects_in_room": [
            {
                "new_object_id": "desk_1",
                "size_in_meters": {"length": 1.2, "width": 0.6, "height": 0.75},
                "is_on_the_floor": true,
                "placement": {
                    "room_layout_elements": [
                        {"layout_element_id": "south_wall", "preposition": "in the corner"}
                    ]
                }
            },
            {
                "new_object_id": "chair_1",
                "size_in_meters": {"length": 0.5, "width": 0.5, "height": 0.9},
                "is_on_the_floor": true,
                "facing": "desk_1",
                "placement": {
                    "objects_in_room": [
                        {"object_id": "desk_1", "preposition": "in front", "is_adjacent": true}
                    ]
                }
            }
        ]
    }"#;

    #[test]
    fn test_resolve_document() {
        let resolution = resolve(STUDY).unwrap();
        assert_eq!(resolution.user_intent, "a study");
        assert!(resolution.scene.objects.iter().all(|o| o.position.is_some()));
    }

    #[test]
    fn test_output_document() {
        let json = resolve(STUDY).unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["room_dimensions"][0], 4.0);
        assert_eq!(value["objects_in_room"][1]["new_object_id"], "chair_1");
        assert!(value["objects_in_room"][1]["position"]["x"].is_f64());
        assert_eq!(value["room_layout_elements"].as_array().map(Vec::len), Some(6));
        assert!(value.get("deletions").is_none());
    }

    #[test]
    fn test_bare_array_needs_room() {
        let source = r#"[{"new_object_id": "rug_1", "size_in_meters": {"length": 2.0, "width": 1.5, "height": 0.01}, "is_on_the_floor": true}]"#;
        assert!(matches!(
            resolve(source),
            Err(ResolveError::Document(DocumentError::MissingRoom))
        ));
        let resolution = resolve_with_config(
            source,
            ResolveConfig::new().with_room(Room::new(3.0, 3.0, 2.5)),
        )
        .unwrap();
        assert_eq!(resolution.scene.room, Room::new(3.0, 3.0, 2.5));
    }

    #[test]
    fn test_unknown_reference_is_an_engine_error() {
        let source = r#"{
            "room_dimensions": [4.0, 3.0, 2.5],
            "objects_in_room": [{
                "new_object_id": "chair_1",
                "size_in_meters": {"length": 0.5, "width": 0.5, "height": 0.9},
                "placement": {"objects_in_room": [
                    {"object_id": "dsk_1", "preposition": "in front", "is_adjacent": true}
                ]}
            }]
        }"#;
        let err = resolve(source).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Engine(EngineError::UnknownReference { .. })
        ));
    }
}
