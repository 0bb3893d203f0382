//! Placement depth: how many object references separate an object from a fixed anchor.

use std::collections::{HashMap, HashSet};

use super::error::EngineError;
use super::graph::SceneGraph;

/// Depth of every object, in graph insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepthMap {
    order: Vec<String>,
    depths: HashMap<String, usize>,
}

impl DepthMap {
    pub fn get(&self, id: &str) -> Option<usize> {
        self.depths.get(id).copied()
    }

    pub fn max_depth(&self) -> usize {
        self.depths.values().copied().max().unwrap_or(0)
    }

    /// Ids grouped by depth; index `d` holds every object of depth `d`
    pub fn levels(&self) -> Vec<Vec<String>> {
        let mut levels = vec![Vec::new(); self.max_depth() + 1];
        for id in &self.order {
            levels[self.depths[id]].push(id.clone());
        }
        levels
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Compute depths: 0 for pinned objects and objects constrained only by the
/// room, otherwise one more than the deepest object they reference.
pub fn compute_depth(graph: &SceneGraph, pinned: &HashSet<String>) -> Result<DepthMap, EngineError> {
    if let Some(cycle) = graph.cycles().into_iter().next() {
        return Err(EngineError::circular(cycle));
    }

    let order = graph.object_ids();
    let mut depths = HashMap::new();
    for id in &order {
        depth_of(id, graph, pinned, &mut depths);
    }
    Ok(DepthMap { order, depths })
}

fn depth_of(
    id: &str,
    graph: &SceneGraph,
    pinned: &HashSet<String>,
    depths: &mut HashMap<String, usize>,
) -> usize {
    if let Some(depth) = depths.get(id) {
        return *depth;
    }
    let depth = if pinned.contains(id) {
        0
    } else {
        graph
            .references(id)
            .into_iter()
            .filter(|n| n.is_object())
            .map(|n| 1 + depth_of(&n.id, graph, pinned, depths))
            .max()
            .unwrap_or(0)
    };
    depths.insert(id.to_string(), depth);
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::{
        Dimensions, LayoutElement, LayoutPreposition, ObjectPreposition, SceneObject,
    };
    use pretty_assertions::assert_eq;

    fn obj(id: &str) -> SceneObject {
        SceneObject::new(id, Dimensions::new(0.5, 0.5, 0.5))
    }

    fn scene() -> Vec<SceneObject> {
        vec![
            obj("desk_1").with_layout(LayoutElement::SouthWall, LayoutPreposition::On),
            obj("chair_1").with_relation("desk_1", ObjectPreposition::InFront, true),
            obj("lamp_1").with_relation("desk_1", ObjectPreposition::On, true),
            obj("cushion_1").with_relation("chair_1", ObjectPreposition::On, true),
            obj("rug_1"),
        ]
    }

    #[test]
    fn test_depths_follow_object_references() {
        let graph = SceneGraph::build(&scene()).unwrap();
        let depths = compute_depth(&graph, &HashSet::new()).unwrap();
        assert_eq!(depths.get("desk_1"), Some(0));
        assert_eq!(depths.get("chair_1"), Some(1));
        assert_eq!(depths.get("cushion_1"), Some(2));
        assert_eq!(depths.get("rug_1"), Some(0));
        assert_eq!(depths.max_depth(), 2);
        assert_eq!(
            depths.levels(),
            vec![
                vec!["desk_1".to_string(), "rug_1".to_string()],
                vec!["chair_1".to_string(), "lamp_1".to_string()],
                vec!["cushion_1".to_string()],
            ]
        );
    }

    #[test]
    fn test_pinned_objects_are_anchors() {
        let graph = SceneGraph::build(&scene()).unwrap();
        let pinned: HashSet<String> = ["chair_1".to_string()].into_iter().collect();
        let depths = compute_depth(&graph, &pinned).unwrap();
        assert_eq!(depths.get("chair_1"), Some(0));
        assert_eq!(depths.get("cushion_1"), Some(1));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let objects = vec![
            obj("a").with_relation("b", ObjectPreposition::LeftOf, true),
            obj("b").with_relation("a", ObjectPreposition::LeftOf, true),
        ];
        let graph = SceneGraph::build(&objects).unwrap();
        assert!(matches!(
            compute_depth(&graph, &HashSet::new()),
            Err(EngineError::CircularDependency { .. })
        ));
    }
}
