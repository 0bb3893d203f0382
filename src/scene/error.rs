//! Error types for the resolution engine

use thiserror::Error;

/// Errors that abort a resolution run
#[derive(Debug, Error)]
pub enum EngineError {
    /// A relation or deletion names an id that is not in the scene
    #[error("object '{object}' references unknown id '{target}'")]
    UnknownReference {
        object: String,
        target: String,
        suggestions: Vec<String>,
    },

    /// A collaborator returned an id that is not in the scene
    #[error("unknown object '{name}'")]
    UnknownObject {
        name: String,
        suggestions: Vec<String>,
    },

    /// Two objects share the same id
    #[error("duplicate object id '{name}'")]
    DuplicateObject { name: String },

    /// Non-finite or negative footprint
    #[error("invalid dimensions for object '{object}': {reason}")]
    InvalidDimensions { object: String, reason: String },

    /// Circular dependency between objects that should have been acyclic
    #[error("circular dependency: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// Spatial conflicts were still present after the correction bound
    #[error("spatial conflicts remain after {rounds} correction rounds: {remaining}")]
    CorrectionLimit { rounds: usize, remaining: String },

    /// Size conflicts were still present after the deletion bound
    #[error("size conflicts remain after {rounds} deletions: {remaining}")]
    DeletionLimit { rounds: usize, remaining: String },

    /// The placement search exceeded its backjump bound
    #[error("placement did not converge after {backjumps} backjumps at depth {depth}: {reason}")]
    PlacementDiverged {
        backjumps: usize,
        depth: usize,
        reason: String,
    },

    /// An external correction/deletion/refinement collaborator failed
    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl EngineError {
    /// Create an unknown reference error with suggestions
    pub fn unknown_reference(
        object: impl Into<String>,
        target: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::UnknownReference {
            object: object.into(),
            target: target.into(),
            suggestions,
        }
    }

    /// Create an unknown object error with suggestions
    pub fn unknown_object(name: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::UnknownObject {
            name: name.into(),
            suggestions,
        }
    }

    /// Create a circular dependency error
    pub fn circular(cycle: Vec<String>) -> Self {
        Self::CircularDependency { cycle }
    }

    pub fn invalid_dimensions(object: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            object: object.into(),
            reason: reason.into(),
        }
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UnknownReference { suggestions, .. } => Some(suggestions),
            Self::UnknownObject { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_reference_display() {
        let err = EngineError::unknown_reference("chair_1", "dsk_1", vec!["desk_1".to_string()]);
        assert!(err.to_string().contains("dsk_1"));
        assert_eq!(err.suggestions(), Some(&["desk_1".to_string()][..]));
    }

    #[test]
    fn test_circular_display() {
        let err = EngineError::circular(vec!["a".to_string(), "b".to_string(), "a".to_string()]);
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_diverged_display() {
        let err = EngineError::PlacementDiverged {
            backjumps: 10,
            depth: 2,
            reason: "no free space for 'lamp_1'".to_string(),
        };
        insta::assert_snapshot!(
            err.to_string(),
            @"placement did not converge after 10 backjumps at depth 2: no free space for 'lamp_1'"
        );
    }
}
