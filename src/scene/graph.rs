//! Directed relation graph over objects and room layout elements.
//!
//! Every edge runs from the reference (the entity that constrains a position)
//! to the dependent. `A left of B` becomes `B -> A [left of]`, and
//! `A under B` is turned around into `A -> B [on]` (or `[above]` when the two
//! are not adjacent) so the lower object is placed first.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::{has_path_connecting, is_cyclic_directed, tarjan_scc};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef};
use petgraph::Direction;
use tracing::debug;

use super::error::EngineError;
use super::find_similar;
use super::types::{
    LayoutElement, LayoutPreposition, ObjectPreposition, ObjectRelation, RelationAxis,
    SceneObject,
};

/// Kind of node in the scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Object,
    Layout(LayoutElement),
}

#[derive(Debug, Clone)]
pub struct SceneNode {
    pub id: String,
    pub kind: NodeKind,
}

/// Preposition carried by an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgePreposition {
    Object(ObjectPreposition),
    Layout(LayoutPreposition),
}

impl EdgePreposition {
    pub fn object(&self) -> Option<ObjectPreposition> {
        match self {
            EdgePreposition::Object(p) => Some(*p),
            EdgePreposition::Layout(_) => None,
        }
    }
}

impl fmt::Display for EdgePreposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgePreposition::Object(p) => write!(f, "{}", p),
            EdgePreposition::Layout(p) => write!(f, "{}", p),
        }
    }
}

/// `{preposition, is_adjacent}` on a reference -> dependent edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationEdge {
    pub preposition: EdgePreposition,
    pub is_adjacent: bool,
}

/// One side of an edge as seen from the other node
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: String,
    pub kind: NodeKind,
    pub edge: RelationEdge,
}

impl Neighbor {
    pub fn is_object(&self) -> bool {
        self.kind == NodeKind::Object
    }
}

/// Rewrite every `A under B` relation into the canonical `B on A` (adjacent)
/// or `B above A` on the upper object.
///
/// Returns the number of rewritten relations. Relations naming unknown ids are
/// left untouched for [`SceneGraph::build`] to report.
pub fn normalize_relations(objects: &mut [SceneObject]) -> usize {
    let index: HashMap<String, usize> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id.clone(), i))
        .collect();

    let mut moved: Vec<(usize, ObjectRelation)> = Vec::new();
    for obj in objects.iter_mut() {
        let id = obj.id.clone();
        obj.placement.objects_in_room.retain(|rel| {
            if rel.preposition != ObjectPreposition::Under {
                return true;
            }
            match index.get(&rel.target) {
                Some(&upper) => {
                    let preposition = if rel.is_adjacent {
                        ObjectPreposition::On
                    } else {
                        ObjectPreposition::Above
                    };
                    moved.push((upper, ObjectRelation::new(&id, preposition, rel.is_adjacent)));
                    false
                }
                None => true,
            }
        });
    }

    let count = moved.len();
    for (upper, relation) in moved {
        let relations = &mut objects[upper].placement.objects_in_room;
        if !relations.contains(&relation) {
            relations.push(relation);
        }
    }
    if count > 0 {
        debug!(count, "rewrote 'under' relations");
    }
    count
}

/// The scene relation graph
#[derive(Debug, Clone)]
pub struct SceneGraph {
    graph: StableDiGraph<SceneNode, RelationEdge>,
    index: HashMap<String, NodeIndex>,
}

impl SceneGraph {
    /// Build the graph from the object list.
    ///
    /// Fails on duplicate ids, invalid footprints and relations naming ids that
    /// exist neither as objects nor as layout elements. Self-relations are kept
    /// as self-loops so that conflict detection can report them.
    pub fn build(objects: &[SceneObject]) -> Result<Self, EngineError> {
        let mut graph = StableDiGraph::new();
        let mut index = HashMap::new();

        for element in LayoutElement::ALL {
            let node = graph.add_node(SceneNode {
                id: element.id().to_string(),
                kind: NodeKind::Layout(element),
            });
            index.insert(element.id().to_string(), node);
        }

        for obj in objects {
            validate_dimensions(obj)?;
            if index.contains_key(&obj.id) {
                return Err(EngineError::DuplicateObject {
                    name: obj.id.clone(),
                });
            }
            let node = graph.add_node(SceneNode {
                id: obj.id.clone(),
                kind: NodeKind::Object,
            });
            index.insert(obj.id.clone(), node);
        }

        let mut scene = Self { graph, index };

        for obj in objects {
            let dependent = scene.index[&obj.id];
            for rel in obj.layout_relations() {
                let reference = scene.index[rel.element.id()];
                scene.graph.add_edge(
                    reference,
                    dependent,
                    RelationEdge {
                        preposition: EdgePreposition::Layout(rel.preposition),
                        is_adjacent: true,
                    },
                );
            }
            for rel in obj.object_relations() {
                scene.add_relation(&obj.id, rel)?;
            }
        }

        debug!(
            nodes = scene.graph.node_count(),
            edges = scene.graph.edge_count(),
            "built scene graph"
        );
        Ok(scene)
    }

    /// Add the edge for one object relation declared by `subject`
    pub fn add_relation(&mut self, subject: &str, rel: &ObjectRelation) -> Result<(), EngineError> {
        let Some(&dependent) = self.index.get(subject) else {
            let known: HashSet<String> = self.object_ids().into_iter().collect();
            return Err(EngineError::unknown_object(subject, find_similar(&known, subject, 2)));
        };
        let target = self.resolve_target(subject, &rel.target)?;
        let (from, to, preposition) = if rel.preposition == ObjectPreposition::Under {
            let upright = if rel.is_adjacent {
                ObjectPreposition::On
            } else {
                ObjectPreposition::Above
            };
            (dependent, target, upright)
        } else {
            (target, dependent, rel.preposition)
        };
        self.graph.add_edge(
            from,
            to,
            RelationEdge {
                preposition: EdgePreposition::Object(preposition),
                is_adjacent: rel.is_adjacent,
            },
        );
        Ok(())
    }

    fn resolve_target(&self, object: &str, target: &str) -> Result<NodeIndex, EngineError> {
        if let Some(node) = self.index.get(target) {
            return Ok(*node);
        }
        if let Some(element) = LayoutElement::from_id(target) {
            return Ok(self.index[element.id()]);
        }
        let known: HashSet<String> = self.index.keys().cloned().collect();
        Err(EngineError::unknown_reference(
            object,
            target,
            find_similar(&known, target, 2),
        ))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn kind(&self, id: &str) -> Option<NodeKind> {
        self.index.get(id).map(|n| self.graph[*n].kind)
    }

    /// Object node ids in insertion order
    pub fn object_ids(&self) -> Vec<String> {
        let mut nodes: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|n| self.graph[*n].kind == NodeKind::Object)
            .collect();
        nodes.sort_by_key(|n| n.index());
        nodes.into_iter().map(|n| self.graph[n].id.clone()).collect()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<Neighbor> {
        let Some(&node) = self.index.get(id) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self.graph.edges_directed(node, direction).collect();
        edges.sort_by_key(|e| e.id().index());
        edges
            .into_iter()
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                Neighbor {
                    id: self.graph[other].id.clone(),
                    kind: self.graph[other].kind,
                    edge: *e.weight(),
                }
            })
            .collect()
    }

    /// Entities constraining `id`, in declaration order
    pub fn references(&self, id: &str) -> Vec<Neighbor> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Entities constrained by `id`, in declaration order
    pub fn dependents(&self, id: &str) -> Vec<Neighbor> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Every node reachable from `id` along dependent edges, excluding `id`
    pub fn descendants(&self, id: &str) -> Vec<String> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut found = Vec::new();
        while let Some(node) = dfs.next(&self.graph) {
            if node != start {
                found.push(node);
            }
        }
        found.sort_by_key(|n| n.index());
        found.into_iter().map(|n| self.graph[n].id.clone()).collect()
    }

    /// Remove an object together with its descendant subtree.
    ///
    /// Returns the removed ids, `id` first. Layout elements are never removed.
    pub fn remove_with_descendants(&mut self, id: &str) -> Result<Vec<String>, EngineError> {
        match self.kind(id) {
            Some(NodeKind::Object) => {}
            Some(NodeKind::Layout(_)) | None => {
                let known: HashSet<String> = self.object_ids().into_iter().collect();
                return Err(EngineError::unknown_object(id, find_similar(&known, id, 2)));
            }
        }
        let mut removed = vec![id.to_string()];
        removed.extend(
            self.descendants(id)
                .into_iter()
                .filter(|d| self.kind(d) == Some(NodeKind::Object)),
        );
        for name in &removed {
            if let Some(node) = self.index.remove(name) {
                self.graph.remove_node(node);
            }
        }
        Ok(removed)
    }

    /// True when `a` and `b` are connected by at least one edge in either direction
    pub fn are_related(&self, a: &str, b: &str) -> bool {
        match (self.index.get(a), self.index.get(b)) {
            (Some(&na), Some(&nb)) => {
                self.graph.find_edge(na, nb).is_some() || self.graph.find_edge(nb, na).is_some()
            }
            _ => false,
        }
    }

    /// True when adding `reference -> dependent` would close a cycle
    pub fn would_create_cycle(&self, reference: &str, dependent: &str) -> bool {
        match (self.index.get(reference), self.index.get(dependent)) {
            (Some(&r), Some(&d)) => r == d || has_path_connecting(&self.graph, d, r, None),
            _ => false,
        }
    }

    pub fn is_acyclic(&self) -> bool {
        !is_cyclic_directed(&self.graph)
    }

    /// Every support cycle: strongly connected components with more than one
    /// node, plus self-loops. Ids inside a cycle are in insertion order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|c| c.len() > 1 || self.graph.find_edge(c[0], c[0]).is_some())
            .collect();
        for component in &mut components {
            component.sort_by_key(|n| n.index());
        }
        components.sort_by_key(|c| c[0].index());
        components
            .into_iter()
            .map(|c| c.into_iter().map(|n| self.graph[n].id.clone()).collect())
            .collect()
    }

    /// Drop edges that repeat a constraint already carried by another edge.
    ///
    /// Removes, keeping the earliest declaration:
    /// - exact duplicates (same ordered pair, same preposition)
    /// - the second edge of a mutually inverse pair (`A left of B` and `B right of A`)
    /// - a shortcut `u -> w` when `u -> v -> w` carries the same object preposition
    ///
    /// Returns the number of removed edges.
    pub fn prune_redundant(&mut self) -> usize {
        let mut edges: Vec<EdgeIndex> = self.graph.edge_indices().collect();
        edges.sort_by_key(|e| e.index());

        let mut seen: HashSet<(NodeIndex, NodeIndex, EdgePreposition)> = HashSet::new();
        let mut redundant: Vec<EdgeIndex> = Vec::new();

        for edge in &edges {
            let Some((from, to)) = self.graph.edge_endpoints(*edge) else {
                continue;
            };
            let preposition = self.graph[*edge].preposition;
            if !seen.insert((from, to, preposition)) {
                redundant.push(*edge);
                continue;
            }
            if let EdgePreposition::Object(p) = preposition {
                let inverse = EdgePreposition::Object(p.inverse());
                if p.axis() != RelationAxis::Vertical
                    && seen.contains(&(to, from, inverse))
                {
                    redundant.push(*edge);
                }
            }
        }
        for edge in &redundant {
            self.graph.remove_edge(*edge);
        }
        let mut removed = redundant.len();

        let mut shortcuts = Vec::new();
        for edge in self.graph.edge_indices() {
            let Some((u, w)) = self.graph.edge_endpoints(edge) else {
                continue;
            };
            let EdgePreposition::Object(p) = self.graph[edge].preposition else {
                continue;
            };
            if u == w {
                continue;
            }
            let implied = self
                .graph
                .edges_directed(u, Direction::Outgoing)
                .filter(|e| e.target() != w && e.target() != u)
                .filter(|e| e.weight().preposition == EdgePreposition::Object(p))
                .any(|e| {
                    self.graph
                        .edges_directed(e.target(), Direction::Outgoing)
                        .any(|second| {
                            second.target() == w
                                && second.weight().preposition == EdgePreposition::Object(p)
                        })
                });
            if implied {
                shortcuts.push(edge);
            }
        }
        for edge in &shortcuts {
            self.graph.remove_edge(*edge);
        }
        removed += shortcuts.len();

        if removed > 0 {
            debug!(removed, "pruned redundant edges");
        }
        removed
    }
}

fn validate_dimensions(obj: &SceneObject) -> Result<(), EngineError> {
    let size = obj.size;
    for (name, value) in [
        ("length", size.length),
        ("width", size.width),
        ("height", size.height),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(EngineError::invalid_dimensions(
                &obj.id,
                format!("{} must be a non-negative number, got {}", name, value),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::Dimensions;
    use pretty_assertions::assert_eq;

    fn obj(id: &str) -> SceneObject {
        SceneObject::new(id, Dimensions::new(1.0, 1.0, 1.0)).on_floor(true)
    }

    #[test]
    fn test_edges_point_from_reference_to_dependent() {
        let objects = vec![
            obj("desk_1").with_layout(LayoutElement::SouthWall, LayoutPreposition::On),
            obj("chair_1").with_relation("desk_1", ObjectPreposition::InFront, true),
        ];
        let graph = SceneGraph::build(&objects).unwrap();
        let refs = graph.references("chair_1");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "desk_1");
        assert_eq!(
            refs[0].edge.preposition,
            EdgePreposition::Object(ObjectPreposition::InFront)
        );
        assert_eq!(graph.references("desk_1")[0].id, "south_wall");
        assert_eq!(graph.dependents("desk_1")[0].id, "chair_1");
    }

    #[test]
    fn test_under_is_turned_around() {
        let objects = vec![
            obj("rug_1").with_relation("table_1", ObjectPreposition::Under, true),
            obj("table_1"),
        ];
        let graph = SceneGraph::build(&objects).unwrap();
        let refs = graph.references("table_1");
        assert_eq!(refs[0].id, "rug_1");
        assert_eq!(
            refs[0].edge.preposition,
            EdgePreposition::Object(ObjectPreposition::On)
        );
        assert!(graph.references("rug_1").is_empty());
    }

    #[test]
    fn test_normalize_relations_moves_under() {
        let mut objects = vec![
            obj("lamp_1").with_relation("shelf_1", ObjectPreposition::Under, false),
            obj("shelf_1"),
        ];
        assert_eq!(normalize_relations(&mut objects), 1);
        assert!(objects[0].object_relations().is_empty());
        assert_eq!(
            objects[1].object_relations(),
            &[ObjectRelation::new("lamp_1", ObjectPreposition::Above, false)]
        );
    }

    #[test]
    fn test_unknown_reference_is_fatal() {
        let objects = vec![obj("chair_1").with_relation("dsk_1", ObjectPreposition::InFront, true), obj("desk_1")];
        let err = SceneGraph::build(&objects).unwrap_err();
        match err {
            EngineError::UnknownReference {
                target, suggestions, ..
            } => {
                assert_eq!(target, "dsk_1");
                assert!(suggestions.contains(&"desk_1".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let objects = vec![obj("a"), obj("a")];
        assert!(matches!(
            SceneGraph::build(&objects),
            Err(EngineError::DuplicateObject { .. })
        ));
    }

    #[test]
    fn test_self_loop_is_kept() {
        let objects = vec![obj("a").with_relation("a", ObjectPreposition::LeftOf, true)];
        let graph = SceneGraph::build(&objects).unwrap();
        assert_eq!(graph.cycles(), vec![vec!["a".to_string()]]);
        assert!(!graph.is_acyclic());
    }

    #[test]
    fn test_prune_duplicates_and_inverse_pairs() {
        let objects = vec![
            obj("a")
                .with_relation("b", ObjectPreposition::LeftOf, true)
                .with_relation("b", ObjectPreposition::LeftOf, true),
            obj("b").with_relation("a", ObjectPreposition::RightOf, true),
        ];
        let mut graph = SceneGraph::build(&objects).unwrap();
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(graph.prune_redundant(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.is_acyclic());
        assert_eq!(graph.references("a")[0].id, "b");
    }

    #[test]
    fn test_prune_transitive_shortcut() {
        let objects = vec![
            obj("table_1"),
            obj("tray_1").with_relation("table_1", ObjectPreposition::On, true),
            obj("cup_1")
                .with_relation("tray_1", ObjectPreposition::On, true)
                .with_relation("table_1", ObjectPreposition::On, true),
        ];
        let mut graph = SceneGraph::build(&objects).unwrap();
        assert_eq!(graph.prune_redundant(), 1);
        let refs: Vec<String> = graph.references("cup_1").into_iter().map(|n| n.id).collect();
        assert_eq!(refs, vec!["tray_1".to_string()]);
    }

    #[test]
    fn test_descendants_and_removal() {
        let objects = vec![
            obj("table_1"),
            obj("lamp_1").with_relation("table_1", ObjectPreposition::On, true),
            obj("book_1").with_relation("lamp_1", ObjectPreposition::LeftOf, true),
            obj("sofa_1"),
        ];
        let mut graph = SceneGraph::build(&objects).unwrap();
        assert_eq!(
            graph.descendants("table_1"),
            vec!["lamp_1".to_string(), "book_1".to_string()]
        );
        let removed = graph.remove_with_descendants("table_1").unwrap();
        assert_eq!(removed, vec!["table_1", "lamp_1", "book_1"]);
        assert_eq!(graph.object_ids(), vec!["sofa_1".to_string()]);
        assert!(graph.remove_with_descendants("south_wall").is_err());
    }

    #[test]
    fn test_would_create_cycle() {
        let objects = vec![
            obj("a"),
            obj("b").with_relation("a", ObjectPreposition::LeftOf, true),
        ];
        let graph = SceneGraph::build(&objects).unwrap();
        assert!(graph.would_create_cycle("b", "a"));
        assert!(!graph.would_create_cycle("a", "b"));
        assert!(graph.are_related("a", "b"));
    }

    #[test]
    fn test_invalid_dimensions() {
        let objects = vec![SceneObject::new("a", Dimensions::new(-1.0, 1.0, 1.0))];
        assert!(matches!(
            SceneGraph::build(&objects),
            Err(EngineError::InvalidDimensions { .. })
        ));
    }
}
