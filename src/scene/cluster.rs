//! Clusters of dependent objects and their reserved extents.
//!
//! A cluster is every object sharing the same primary relation (parent and
//! preposition), optionally split further by the relation the refinement
//! step placed between siblings. The extents of an object reserve room for
//! itself plus every adjacent side cluster hanging off it, expressed in the
//! object's own frame.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use super::error::EngineError;
use super::graph::{EdgePreposition, SceneGraph};
use super::orientation::extent_toward;
use super::types::{
    ClusterInfo, Extents, LayoutElement, LayoutPreposition, ObjectPreposition, ObjectRelation,
    RelationAxis, SceneObject,
};
use crate::pipeline::Refiner;

/// `(parent, preposition[, secondary preposition])`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub parent: String,
    pub preposition: EdgePreposition,
    pub secondary: Option<ObjectPreposition>,
}

/// Primary relation of an object: its first adjacent object relation, else
/// its first object relation, else its first layout relation
fn primary_relation(obj: &SceneObject) -> Option<(String, EdgePreposition)> {
    let objects = obj.object_relations();
    if let Some(rel) = objects.iter().find(|r| r.is_adjacent).or_else(|| objects.first()) {
        return Some((rel.target.clone(), EdgePreposition::Object(rel.preposition)));
    }
    obj.layout_relations()
        .first()
        .map(|rel| (rel.element.id().to_string(), EdgePreposition::Layout(rel.preposition)))
}

/// Group objects by cluster key. Objects without any relation form no cluster.
pub fn group_clusters(objects: &[SceneObject]) -> BTreeMap<ClusterKey, Vec<String>> {
    let primaries: HashMap<&str, (String, EdgePreposition)> = objects
        .iter()
        .filter_map(|o| primary_relation(o).map(|p| (o.id.as_str(), p)))
        .collect();

    let mut clusters: BTreeMap<ClusterKey, Vec<String>> = BTreeMap::new();
    for obj in objects {
        let Some(primary) = primaries.get(obj.id.as_str()) else {
            continue;
        };
        let secondary = obj
            .object_relations()
            .iter()
            .find(|r| r.target != primary.0 && primaries.get(r.target.as_str()) == Some(primary))
            .map(|r| r.preposition);
        clusters
            .entry(ClusterKey {
                parent: primary.0.clone(),
                preposition: primary.1,
                secondary,
            })
            .or_default()
            .push(obj.id.clone());
    }
    clusters
}

/// Sibling prepositions allowed inside a cluster.
///
/// `delta` is the sibling's rotation minus the parent's rotation, in degrees.
/// Siblings line up in front of or behind each other when a side cluster
/// (`left of`/`right of`) shares the parent's axis, or when a cluster facing
/// the parent (`in front`, `behind`, `on`) is turned a quarter. Every other
/// cluster lines up side by side.
pub fn allowed_sibling_prepositions(
    primary: EdgePreposition,
    delta: f64,
) -> [ObjectPreposition; 2] {
    let straight = ((delta / 90.0).round() as i64).rem_euclid(2) == 0;
    let side_by_side = [ObjectPreposition::LeftOf, ObjectPreposition::RightOf];
    let in_line = [ObjectPreposition::InFront, ObjectPreposition::Behind];
    let lateral = matches!(
        primary,
        EdgePreposition::Object(ObjectPreposition::LeftOf | ObjectPreposition::RightOf)
    );
    let facing = matches!(
        primary,
        EdgePreposition::Object(
            ObjectPreposition::InFront | ObjectPreposition::Behind | ObjectPreposition::On
        ) | EdgePreposition::Layout(LayoutPreposition::On)
    );
    if (straight && lateral) || (!straight && facing) {
        in_line
    } else {
        side_by_side
    }
}

/// Extents reserved by `id` and every adjacent side cluster below it
pub fn compute_cluster_extents(
    id: &str,
    graph: &SceneGraph,
    objects: &[SceneObject],
) -> Result<Extents, EngineError> {
    let by_id: HashMap<&str, &SceneObject> = objects.iter().map(|o| (o.id.as_str(), o)).collect();
    let mut memo = HashMap::new();
    let mut in_progress = Vec::new();
    extents_of(id, graph, &by_id, &mut memo, &mut in_progress)
}

/// Compute and store the cluster extents of every object
pub fn assign_cluster_extents(
    graph: &SceneGraph,
    objects: &mut [SceneObject],
) -> Result<(), EngineError> {
    let computed = {
        let by_id: HashMap<&str, &SceneObject> =
            objects.iter().map(|o| (o.id.as_str(), o)).collect();
        let mut memo = HashMap::new();
        let mut in_progress = Vec::new();
        let mut computed = Vec::with_capacity(objects.len());
        for obj in objects.iter() {
            computed.push(extents_of(&obj.id, graph, &by_id, &mut memo, &mut in_progress)?);
        }
        computed
    };
    for (obj, extents) in objects.iter_mut().zip(computed) {
        debug!(
            object = %obj.id,
            left = extents.left,
            right = extents.right,
            front = extents.front,
            behind = extents.behind,
            "cluster extents"
        );
        obj.cluster = Some(ClusterInfo {
            constraint_area: extents,
        });
    }
    Ok(())
}

/// An adjacent side child as seen from its parent
struct SideChild {
    id: String,
    preposition: ObjectPreposition,
    /// Span along the axis pointing away from the parent
    depth: f64,
    /// Span along the parent's face
    face: f64,
}

fn extents_of(
    id: &str,
    graph: &SceneGraph,
    by_id: &HashMap<&str, &SceneObject>,
    memo: &mut HashMap<String, Extents>,
    in_progress: &mut Vec<String>,
) -> Result<Extents, EngineError> {
    if let Some(extents) = memo.get(id) {
        return Ok(*extents);
    }
    if let Some(start) = in_progress.iter().position(|v| v == id) {
        let mut cycle = in_progress[start..].to_vec();
        cycle.push(id.to_string());
        return Err(EngineError::circular(cycle));
    }
    let Some(obj) = by_id.get(id).copied() else {
        return Ok(Extents::default());
    };
    in_progress.push(id.to_string());

    let heading = obj.heading();
    let mut children = Vec::new();
    for neighbor in graph.dependents(id) {
        let Some(preposition) = neighbor.edge.preposition.object() else {
            continue;
        };
        if !neighbor.is_object() || !neighbor.edge.is_adjacent {
            continue;
        }
        let Some(outward) = heading.toward(preposition) else {
            continue;
        };
        let Some(child) = by_id.get(neighbor.id.as_str()).copied() else {
            continue;
        };
        let ext = extents_of(&child.id, graph, by_id, memo, in_progress)?;
        let ch = child.heading();
        let across = outward.left();
        children.push(SideChild {
            id: child.id.clone(),
            preposition,
            depth: extent_toward(&ext, ch, outward) + extent_toward(&ext, ch, outward.opposite()),
            face: extent_toward(&ext, ch, across) + extent_toward(&ext, ch, across.opposite()),
        });
    }

    // A sibling already chained behind another side child is covered by that child
    let chained: Vec<bool> = children
        .iter()
        .map(|c| {
            children.iter().any(|other| {
                other.id != c.id
                    && other.preposition == c.preposition
                    && graph.dependents(&other.id).iter().any(|n| {
                        n.id == c.id
                            && n.edge.is_adjacent
                            && n.edge
                                .preposition
                                .object()
                                .is_some_and(|p| p.axis() != RelationAxis::Vertical)
                    })
            })
        })
        .collect();

    let mut extents = obj.own_extents();
    for preposition in [
        ObjectPreposition::LeftOf,
        ObjectPreposition::RightOf,
        ObjectPreposition::InFront,
        ObjectPreposition::Behind,
    ] {
        let side: Vec<&SideChild> = children
            .iter()
            .zip(&chained)
            .filter(|(c, chained)| c.preposition == preposition && !**chained)
            .map(|(c, _)| c)
            .collect();
        if side.is_empty() {
            continue;
        }
        let depth = side.iter().map(|c| c.depth).fold(0.0, f64::max);
        let half_face = side.iter().map(|c| c.face).sum::<f64>() / 2.0;
        match preposition {
            ObjectPreposition::LeftOf => extents.left += depth,
            ObjectPreposition::RightOf => extents.right += depth,
            ObjectPreposition::InFront => extents.front += depth,
            _ => extents.behind += depth,
        }
        if preposition.axis() == RelationAxis::Lateral {
            extents.front = extents.front.max(half_face);
            extents.behind = extents.behind.max(half_face);
        } else {
            extents.left = extents.left.max(half_face);
            extents.right = extents.right.max(half_face);
        }
    }

    in_progress.pop();
    memo.insert(id.to_string(), extents);
    Ok(extents)
}

/// What the refiner is asked about: one cluster with at least two members
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRequest {
    pub key: ClusterKey,
    pub members: Vec<String>,
    /// Sibling prepositions the parity rule accepts for the first member
    pub allowed: [ObjectPreposition; 2],
}

/// `object preposition sibling`, proposed by the refiner
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingProposal {
    pub object: String,
    pub preposition: ObjectPreposition,
    pub sibling: String,
    pub is_adjacent: bool,
}

impl SiblingProposal {
    pub fn new(
        object: impl Into<String>,
        preposition: ObjectPreposition,
        sibling: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            preposition,
            sibling: sibling.into(),
            is_adjacent: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingOutcome {
    /// Added to the proposed object
    Added,
    /// Added to the sibling as the inverse relation
    Flipped,
    /// The pair is already related
    AlreadyRelated,
    /// Either direction would close a cycle
    Dropped,
}

fn rotation_of(id: &str, objects: &[SceneObject]) -> f64 {
    match LayoutElement::from_id(id) {
        Some(element) => element.inward().angle(),
        None => objects
            .iter()
            .find(|o| o.id == id)
            .map(|o| o.z_angle())
            .unwrap_or(0.0),
    }
}

/// Add one sibling relation, flipping it onto the sibling when the direct form
/// would close a cycle
pub(crate) fn add_sibling_relation(
    graph: &mut SceneGraph,
    objects: &mut [SceneObject],
    proposal: &SiblingProposal,
) -> Result<SiblingOutcome, EngineError> {
    if graph.are_related(&proposal.object, &proposal.sibling) {
        return Ok(SiblingOutcome::AlreadyRelated);
    }

    let (subject, relation, outcome) =
        if !graph.would_create_cycle(&proposal.sibling, &proposal.object) {
            (
                proposal.object.as_str(),
                ObjectRelation::new(&proposal.sibling, proposal.preposition, proposal.is_adjacent),
                SiblingOutcome::Added,
            )
        } else if !graph.would_create_cycle(&proposal.object, &proposal.sibling) {
            (
                proposal.sibling.as_str(),
                ObjectRelation::new(
                    &proposal.object,
                    proposal.preposition.inverse(),
                    proposal.is_adjacent,
                ),
                SiblingOutcome::Flipped,
            )
        } else {
            return Ok(SiblingOutcome::Dropped);
        };

    graph.add_relation(subject, &relation)?;
    if let Some(obj) = objects.iter_mut().find(|o| o.id == subject) {
        obj.placement.objects_in_room.push(relation);
    }
    Ok(outcome)
}

/// Ask the refiner for sibling relations inside every multi-member cluster and
/// add the accepted ones. Returns the number of relations added.
pub fn refine_clusters<R: Refiner + ?Sized>(
    objects: &mut [SceneObject],
    refiner: &mut R,
) -> Result<usize, EngineError> {
    let mut graph = SceneGraph::build(objects)?;
    let clusters = group_clusters(objects);
    let mut added = 0;

    for (key, members) in clusters {
        if members.len() < 2 {
            continue;
        }
        let parent_angle = rotation_of(&key.parent, objects);
        let first_delta = rotation_of(&members[0], objects) - parent_angle;
        let request = ClusterRequest {
            allowed: allowed_sibling_prepositions(key.preposition, first_delta),
            key: key.clone(),
            members: members.clone(),
        };
        let proposals = refiner.propose(&request)?;

        for proposal in proposals {
            if proposal.object == proposal.sibling
                || !members.contains(&proposal.object)
                || !members.contains(&proposal.sibling)
            {
                warn!(
                    object = %proposal.object,
                    sibling = %proposal.sibling,
                    parent = %key.parent,
                    "ignoring sibling proposal outside the cluster"
                );
                continue;
            }
            let delta = rotation_of(&proposal.object, objects) - parent_angle;
            if !allowed_sibling_prepositions(key.preposition, delta).contains(&proposal.preposition)
            {
                debug!(
                    object = %proposal.object,
                    preposition = %proposal.preposition,
                    sibling = %proposal.sibling,
                    "sibling proposal violates parity"
                );
                continue;
            }
            let outcome = add_sibling_relation(&mut graph, objects, &proposal)?;
            debug!(
                object = %proposal.object,
                preposition = %proposal.preposition,
                sibling = %proposal.sibling,
                ?outcome,
                "sibling proposal"
            );
            if matches!(outcome, SiblingOutcome::Added | SiblingOutcome::Flipped) {
                added += 1;
            }
        }
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::orientation::{assign_rotations, Heading};
    use crate::scene::types::Dimensions;
    use pretty_assertions::assert_eq;

    struct Scripted(Vec<SiblingProposal>);

    impl Refiner for Scripted {
        fn propose(&mut self, _request: &ClusterRequest) -> Result<Vec<SiblingProposal>, EngineError> {
            Ok(std::mem::take(&mut self.0))
        }
    }

    fn desk_and_chairs(chairs: usize) -> Vec<SceneObject> {
        let mut objects = vec![SceneObject::new("desk_1", Dimensions::new(1.2, 0.6, 0.75))
            .on_floor(true)
            .with_layout(LayoutElement::SouthWall, LayoutPreposition::On)];
        for i in 1..=chairs {
            objects.push(
                SceneObject::new(format!("chair_{i}"), Dimensions::new(0.5, 0.5, 0.9))
                    .on_floor(true)
                    .facing("desk_1")
                    .with_relation("desk_1", ObjectPreposition::InFront, true),
            );
        }
        assign_rotations(&mut objects);
        objects
    }

    #[test]
    fn test_group_clusters() {
        let objects = desk_and_chairs(2);
        let clusters = group_clusters(&objects);
        let key = ClusterKey {
            parent: "desk_1".to_string(),
            preposition: EdgePreposition::Object(ObjectPreposition::InFront),
            secondary: None,
        };
        assert_eq!(clusters[&key], vec!["chair_1", "chair_2"]);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn test_secondary_splits_cluster() {
        let mut objects = desk_and_chairs(2);
        objects[2]
            .placement
            .objects_in_room
            .push(ObjectRelation::new("chair_1", ObjectPreposition::RightOf, true));
        let clusters = group_clusters(&objects);
        assert!(clusters.keys().any(|k| k.secondary == Some(ObjectPreposition::RightOf)));
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn test_extents_of_desk_with_chair() {
        let objects = desk_and_chairs(1);
        let graph = SceneGraph::build(&objects).unwrap();
        let extents = compute_cluster_extents("desk_1", &graph, &objects).unwrap();
        assert_eq!(extents, Extents::new(0.6, 0.6, 0.8, 0.3));
        let chair = compute_cluster_extents("chair_1", &graph, &objects).unwrap();
        assert_eq!(chair, Extents::new(0.25, 0.25, 0.25, 0.25));
    }

    #[test]
    fn test_extents_widen_for_many_chairs() {
        let objects = desk_and_chairs(3);
        let graph = SceneGraph::build(&objects).unwrap();
        let extents = compute_cluster_extents("desk_1", &graph, &objects).unwrap();
        assert_eq!(extents, Extents::new(0.75, 0.75, 0.8, 0.3));
    }

    #[test]
    fn test_assign_cluster_extents() {
        let mut objects = desk_and_chairs(1);
        let graph = SceneGraph::build(&objects).unwrap();
        assign_cluster_extents(&graph, &mut objects).unwrap();
        let desk = &objects[0];
        assert_eq!(desk.extents().front, 0.8);
        // Desk faces north from the south wall, so its front reach points north
        assert_eq!(desk.reach(Heading::North), 0.8);
    }

    #[test]
    fn test_parity_rule() {
        let side = EdgePreposition::Object(ObjectPreposition::LeftOf);
        let front = EdgePreposition::Object(ObjectPreposition::InFront);
        let wall = EdgePreposition::Layout(LayoutPreposition::On);
        assert_eq!(
            allowed_sibling_prepositions(side, 0.0),
            [ObjectPreposition::InFront, ObjectPreposition::Behind]
        );
        assert_eq!(
            allowed_sibling_prepositions(side, 90.0),
            [ObjectPreposition::LeftOf, ObjectPreposition::RightOf]
        );
        assert_eq!(
            allowed_sibling_prepositions(front, 180.0),
            [ObjectPreposition::LeftOf, ObjectPreposition::RightOf]
        );
        assert_eq!(
            allowed_sibling_prepositions(front, -90.0),
            [ObjectPreposition::InFront, ObjectPreposition::Behind]
        );
        assert_eq!(
            allowed_sibling_prepositions(wall, 0.0),
            [ObjectPreposition::LeftOf, ObjectPreposition::RightOf]
        );
        assert_eq!(
            allowed_sibling_prepositions(wall, 90.0),
            [ObjectPreposition::InFront, ObjectPreposition::Behind]
        );
    }

    #[test]
    fn test_parity_for_corner_and_above() {
        let corner = EdgePreposition::Layout(LayoutPreposition::InTheCorner);
        let above = EdgePreposition::Object(ObjectPreposition::Above);
        for primary in [corner, above] {
            for delta in [90.0, -90.0, 0.0, 180.0] {
                assert_eq!(
                    allowed_sibling_prepositions(primary, delta),
                    [ObjectPreposition::LeftOf, ObjectPreposition::RightOf],
                    "{primary:?} at {delta}"
                );
            }
        }
        let on = EdgePreposition::Object(ObjectPreposition::On);
        assert_eq!(
            allowed_sibling_prepositions(on, -90.0),
            [ObjectPreposition::InFront, ObjectPreposition::Behind]
        );
    }

    #[test]
    fn test_refine_accepts_parity_and_rejects_violation() {
        let mut objects = desk_and_chairs(2);
        let mut refiner = Scripted(vec![
            SiblingProposal::new("chair_2", ObjectPreposition::InFront, "chair_1"),
            SiblingProposal::new("chair_2", ObjectPreposition::RightOf, "chair_1"),
        ]);
        let added = refine_clusters(&mut objects, &mut refiner).unwrap();
        assert_eq!(added, 1);
        assert_eq!(
            objects[2].object_relations().last(),
            Some(&ObjectRelation::new("chair_1", ObjectPreposition::RightOf, true))
        );
    }

    #[test]
    fn test_sibling_relation_flips_to_avoid_cycle() {
        let mut objects: Vec<SceneObject> = ["a", "b", "c"]
            .iter()
            .map(|id| SceneObject::new(*id, Dimensions::new(0.5, 0.5, 0.5)))
            .collect();
        objects[1] = objects[1]
            .clone()
            .with_relation("a", ObjectPreposition::LeftOf, true);
        objects[2] = objects[2]
            .clone()
            .with_relation("b", ObjectPreposition::LeftOf, true);
        let mut graph = SceneGraph::build(&objects).unwrap();

        // a left of c would need c -> a while a -> b -> c exists
        let proposal = SiblingProposal::new("a", ObjectPreposition::LeftOf, "c");
        let outcome = add_sibling_relation(&mut graph, &mut objects, &proposal).unwrap();
        assert_eq!(outcome, SiblingOutcome::Flipped);
        assert_eq!(
            objects[2].object_relations().last(),
            Some(&ObjectRelation::new("a", ObjectPreposition::RightOf, true))
        );
        assert!(graph.is_acyclic());

        let again = add_sibling_relation(&mut graph, &mut objects, &proposal).unwrap();
        assert_eq!(again, SiblingOutcome::AlreadyRelated);
    }
}
