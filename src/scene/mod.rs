//! Scene resolution engine
//!
//! This module turns a list of furnishing objects with symbolic relations
//! into a placed scene: it builds the relation graph, detects spatial and
//! size conflicts, groups objects into clusters, computes placement depths
//! and runs the backjumping placement search.

pub mod cluster;
pub mod config;
pub mod conflict;
pub mod depth;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod lint;
pub mod orientation;
pub mod placer;
pub mod types;

pub use cluster::{assign_cluster_extents, group_clusters, refine_clusters, ClusterKey};
pub use config::{ConfigError, EngineConfig};
pub use conflict::{detect_size_conflicts, detect_spatial_conflicts, Conflict, ConflictKind};
pub use depth::{compute_depth, DepthMap};
pub use error::EngineError;
pub use graph::{normalize_relations, SceneGraph};
pub use orientation::{assign_rotations, Heading};
pub use placer::{pin_absolute, place_all, PlacementStats};
pub use types::*;

use std::collections::HashSet;

/// Validate that every relation target names an object or a layout element.
pub fn validate_references(objects: &[SceneObject]) -> Result<(), EngineError> {
    let mut defined: HashSet<String> = objects.iter().map(|o| o.id.clone()).collect();
    defined.extend(LayoutElement::ALL.iter().map(|e| e.id().to_string()));

    for obj in objects {
        for rel in obj.object_relations() {
            if !defined.contains(&rel.target) && LayoutElement::from_id(&rel.target).is_none() {
                return Err(EngineError::unknown_reference(
                    &obj.id,
                    &rel.target,
                    find_similar(&defined, &rel.target, 2),
                ));
            }
        }
    }
    Ok(())
}

/// Compute Levenshtein edit distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut row = vec![0usize; n + 1];
    for i in 1..=m {
        row[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            row[j] = (prev[j] + 1).min(row[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut row);
    }
    prev[n]
}

/// Known ids within `max_distance` edits of `target`, closest first
pub(crate) fn find_similar(defined: &HashSet<String>, target: &str, max_distance: usize) -> Vec<String> {
    let mut candidates: Vec<(String, usize)> = defined
        .iter()
        .filter_map(|name| {
            let dist = levenshtein_distance(name, target);
            if dist <= max_distance && dist > 0 {
                Some((name.clone(), dist))
            } else {
                None
            }
        })
        .collect();

    candidates.sort_by(|(a, da), (b, db)| da.cmp(db).then_with(|| a.cmp(b)));
    candidates
        .into_iter()
        .map(|(name, _)| name)
        .take(3)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_same() {
        assert_eq!(levenshtein_distance("desk_1", "desk_1"), 0);
    }

    #[test]
    fn test_levenshtein_one_off() {
        assert_eq!(levenshtein_distance("chair_1", "chair_2"), 1);
        assert_eq!(levenshtein_distance("sofa_1", "sofa1"), 1);
    }

    #[test]
    fn test_levenshtein_different() {
        assert_eq!(levenshtein_distance("bed", "rug"), 3);
    }

    #[test]
    fn test_find_similar_orders_by_distance() {
        let defined: HashSet<String> = ["desk_1", "desk_2", "lamp_1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            find_similar(&defined, "dsk_1", 2),
            vec!["desk_1".to_string(), "desk_2".to_string()]
        );
    }

    #[test]
    fn test_validate_references() {
        let objects = vec![
            SceneObject::new("desk_1", Dimensions::new(1.2, 0.6, 0.75)),
            SceneObject::new("chair_1", Dimensions::new(0.5, 0.5, 0.9)).with_relation(
                "desk_1",
                ObjectPreposition::InFront,
                true,
            ),
        ];
        assert!(validate_references(&objects).is_ok());

        let broken = vec![SceneObject::new("chair_1", Dimensions::new(0.5, 0.5, 0.9))
            .with_relation("desk_1", ObjectPreposition::InFront, true)];
        let err = validate_references(&broken).unwrap_err();
        assert!(matches!(err, EngineError::UnknownReference { .. }));
    }
}
