//! Resolution pipeline
//!
//! Drives one scene from raw relations to placed objects. Spatial conflicts
//! are repaired one at a time by a [`Corrector`], size conflicts by a
//! [`Deleter`], and sibling order inside clusters comes from a [`Refiner`].
//! The fallback collaborators make the pipeline usable without an external
//! proposal process.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::scene::cluster::{ClusterRequest, SiblingProposal};
use crate::scene::conflict::Conflict;
use crate::scene::graph::EdgePreposition;
use crate::scene::placer::PlacementStats;
use crate::scene::{
    assign_cluster_extents, assign_rotations, compute_depth, detect_size_conflicts,
    detect_spatial_conflicts, normalize_relations, pin_absolute, place_all, refine_clusters,
    validate_references, EngineConfig, EngineError, LayoutElement, Placement, Room, SceneGraph,
    SceneObject,
};

/// Replacement record for the one object named by a spatial conflict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    #[serde(rename = "new_object_id", alias = "object_id")]
    pub object_id: String,
    #[serde(rename = "is_on_the_floor", alias = "floor_contact", default)]
    pub on_floor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<String>,
    #[serde(default)]
    pub placement: Placement,
}

impl Correction {
    /// A correction that keeps the object exactly as it is
    pub fn from_object(obj: &SceneObject) -> Self {
        Self {
            object_id: obj.id.clone(),
            on_floor: obj.on_floor,
            facing: obj.facing.clone(),
            placement: obj.placement.clone(),
        }
    }
}

/// Repairs one spatial conflict by rewriting one object
pub trait Corrector {
    fn correct(&mut self, conflict: &Conflict, object: &SceneObject)
        -> Result<Correction, EngineError>;
}

/// Picks the object to delete for one size conflict
pub trait Deleter {
    fn choose(&mut self, conflict: &Conflict, objects: &[SceneObject])
        -> Result<String, EngineError>;
}

/// Proposes relations between the siblings of one cluster
pub trait Refiner {
    fn propose(&mut self, request: &ClusterRequest) -> Result<Vec<SiblingProposal>, EngineError>;
}

impl<F> Corrector for F
where
    F: FnMut(&Conflict, &SceneObject) -> Result<Correction, EngineError>,
{
    fn correct(
        &mut self,
        conflict: &Conflict,
        object: &SceneObject,
    ) -> Result<Correction, EngineError> {
        self(conflict, object)
    }
}

impl<F> Deleter for F
where
    F: FnMut(&Conflict, &[SceneObject]) -> Result<String, EngineError>,
{
    fn choose(&mut self, conflict: &Conflict, objects: &[SceneObject]) -> Result<String, EngineError> {
        self(conflict, objects)
    }
}

/// Drops the last relation of the conflicting object named by the conflict
#[derive(Debug, Clone, Copy, Default)]
pub struct DropConflictingRelation;

impl Corrector for DropConflictingRelation {
    fn correct(
        &mut self,
        conflict: &Conflict,
        object: &SceneObject,
    ) -> Result<Correction, EngineError> {
        let mut correction = Correction::from_object(object);
        let Some(relation) = conflict
            .relations
            .iter()
            .rev()
            .find(|r| r.subject == object.id)
        else {
            return Err(EngineError::collaborator(format!(
                "no relation of '{}' to drop for: {}",
                object.id, conflict
            )));
        };

        let names = |target: &str| {
            target == relation.reference
                || LayoutElement::from_id(target).is_some_and(|e| e.id() == relation.reference)
        };
        let placement = &mut correction.placement;
        let dropped = match relation.preposition {
            EdgePreposition::Object(preposition) => placement
                .objects_in_room
                .iter()
                .rposition(|r| r.preposition == preposition && names(&r.target))
                .map(|i| placement.objects_in_room.remove(i))
                .is_some(),
            EdgePreposition::Layout(preposition) => placement
                .room_layout_elements
                .iter()
                .rposition(|r| r.preposition == preposition && r.element.id() == relation.reference)
                .map(|i| placement.room_layout_elements.remove(i))
                .is_some(),
        };
        if !dropped {
            return Err(EngineError::collaborator(format!(
                "'{}' does not declare '{}'",
                object.id, relation
            )));
        }
        debug!(object = %object.id, relation = %relation, "dropped conflicting relation");
        Ok(correction)
    }
}

/// Deletes the candidate with the largest footprint
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteLargestCandidate;

impl Deleter for DeleteLargestCandidate {
    fn choose(&mut self, conflict: &Conflict, objects: &[SceneObject]) -> Result<String, EngineError> {
        let mut best: Option<&SceneObject> = None;
        for id in &conflict.candidates {
            let Some(obj) = objects.iter().find(|o| &o.id == id) else {
                continue;
            };
            if best.map_or(true, |b| obj.footprint_area() > b.footprint_area()) {
                best = Some(obj);
            }
        }
        best.map(|o| o.id.clone())
            .ok_or_else(|| EngineError::collaborator(format!("no deletion candidate for: {}", conflict)))
    }
}

/// Adds no sibling relations
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefinement;

impl Refiner for NoRefinement {
    fn propose(&mut self, _request: &ClusterRequest) -> Result<Vec<SiblingProposal>, EngineError> {
        Ok(Vec::new())
    }
}

/// One audited deletion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deletion {
    /// The object chosen by the deleter
    pub object: String,
    /// Every id removed with it, the chosen object first
    pub removed: Vec<String>,
    pub reason: String,
}

/// The outcome of one resolution run
#[derive(Debug, Clone)]
pub struct ResolvedScene {
    pub room: Room,
    pub objects: Vec<SceneObject>,
    pub deletions: Vec<Deletion>,
    pub corrections: usize,
    pub refinements: usize,
    pub stats: PlacementStats,
}

impl ResolvedScene {
    pub fn get(&self, id: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }
}

/// Runs the resolution phases with injected collaborators
pub struct Resolver<'a> {
    config: EngineConfig,
    user_intent: String,
    corrector: Box<dyn Corrector + 'a>,
    deleter: Box<dyn Deleter + 'a>,
    refiner: Box<dyn Refiner + 'a>,
}

impl<'a> Resolver<'a> {
    /// A resolver using the fallback collaborators
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            user_intent: String::new(),
            corrector: Box::new(DropConflictingRelation),
            deleter: Box::new(DeleteLargestCandidate),
            refiner: Box::new(NoRefinement),
        }
    }

    /// Objects the intent names by type are never deleted
    pub fn with_user_intent(mut self, intent: impl Into<String>) -> Self {
        self.user_intent = intent.into();
        self
    }

    pub fn with_corrector(mut self, corrector: impl Corrector + 'a) -> Self {
        self.corrector = Box::new(corrector);
        self
    }

    pub fn with_deleter(mut self, deleter: impl Deleter + 'a) -> Self {
        self.deleter = Box::new(deleter);
        self
    }

    pub fn with_refiner(mut self, refiner: impl Refiner + 'a) -> Self {
        self.refiner = Box::new(refiner);
        self
    }

    /// Resolve `objects` inside `room` into a placed scene
    pub fn resolve(
        &mut self,
        mut objects: Vec<SceneObject>,
        room: Room,
    ) -> Result<ResolvedScene, EngineError> {
        info!(objects = objects.len(), x = room.x, y = room.y, z = room.z, "resolving scene");
        for obj in &mut objects {
            obj.position = None;
            obj.cluster = None;
        }
        prepare(&mut objects)?;

        let corrections = self.correct_spatial(&mut objects)?;

        let mut graph = build_graph(&objects)?;
        assign_cluster_extents(&graph, &mut objects)?;
        let deletions = self.delete_oversized(&mut objects, &room)?;

        let refinements = refine_clusters(&mut objects, self.refiner.as_mut())?;
        if refinements > 0 {
            info!(refinements, "added sibling relations");
        }
        graph = build_graph(&objects)?;
        assign_cluster_extents(&graph, &mut objects)?;

        let pinned = pin_absolute(&mut objects, &room);
        let depths = compute_depth(&graph, &pinned)?;
        let stats = place_all(&mut objects, &graph, &depths, &pinned, &room, &self.config)?;

        for obj in &objects {
            if let Some(p) = obj.position {
                debug!(object = %obj.id, x = p.x, y = p.y, z = p.z, angle = obj.z_angle(), "resolved");
            }
        }

        Ok(ResolvedScene {
            room,
            objects,
            deletions,
            corrections,
            refinements,
            stats,
        })
    }

    fn correct_spatial(&mut self, objects: &mut [SceneObject]) -> Result<usize, EngineError> {
        let mut rounds = 0;
        loop {
            let graph = build_graph(objects)?;
            let conflicts = detect_spatial_conflicts(&graph, objects);
            let Some(conflict) = conflicts.into_iter().next() else {
                return Ok(rounds);
            };
            if rounds >= self.config.max_correction_rounds {
                return Err(EngineError::CorrectionLimit {
                    rounds,
                    remaining: conflict.to_string(),
                });
            }
            info!(round = rounds + 1, %conflict, "correcting spatial conflict");

            let index = objects
                .iter()
                .position(|o| o.id == conflict.object)
                .ok_or_else(|| EngineError::unknown_object(&conflict.object, Vec::new()))?;
            let correction = self.corrector.correct(&conflict, &objects[index])?;
            if correction.object_id != conflict.object {
                return Err(EngineError::collaborator(format!(
                    "correction for '{}' names '{}'",
                    conflict.object, correction.object_id
                )));
            }
            let obj = &mut objects[index];
            obj.on_floor = correction.on_floor;
            obj.facing = correction.facing;
            obj.placement = correction.placement;
            prepare(objects)?;
            rounds += 1;
        }
    }

    fn delete_oversized(
        &mut self,
        objects: &mut Vec<SceneObject>,
        room: &Room,
    ) -> Result<Vec<Deletion>, EngineError> {
        let mut deletions = Vec::new();
        loop {
            let mut graph = build_graph(objects)?;
            let conflicts = detect_size_conflicts(&graph, objects, &self.user_intent, room);
            let Some(conflict) = conflicts.into_iter().next() else {
                return Ok(deletions);
            };
            if deletions.len() >= self.config.max_deletion_rounds {
                return Err(EngineError::DeletionLimit {
                    rounds: deletions.len(),
                    remaining: conflict.to_string(),
                });
            }

            let chosen = self.deleter.choose(&conflict, objects)?;
            if !conflict.candidates.contains(&chosen) {
                warn!(object = %chosen, %conflict, "deleting an object outside the candidates");
            }
            let removed = graph.remove_with_descendants(&chosen)?;
            info!(object = %chosen, removed = ?removed, %conflict, "deleted object");
            remove_objects(objects, &removed);

            deletions.push(Deletion {
                object: chosen,
                removed,
                reason: conflict.to_string(),
            });
            assign_rotations(objects);
            let graph = build_graph(objects)?;
            assign_cluster_extents(&graph, objects)?;
        }
    }
}

/// Rotations and relation normalization, redone after every edit
fn prepare(objects: &mut [SceneObject]) -> Result<(), EngineError> {
    validate_references(objects)?;
    normalize_relations(objects);
    assign_rotations(objects);
    Ok(())
}

/// Build the relation graph without redundant edges
fn build_graph(objects: &[SceneObject]) -> Result<SceneGraph, EngineError> {
    let mut graph = SceneGraph::build(objects)?;
    graph.prune_redundant();
    Ok(graph)
}

/// Drop the removed objects and every relation or facing that names them
fn remove_objects(objects: &mut Vec<SceneObject>, removed: &[String]) {
    let removed: HashSet<&str> = removed.iter().map(String::as_str).collect();
    objects.retain(|o| !removed.contains(o.id.as_str()));
    for obj in objects.iter_mut() {
        obj.placement
            .objects_in_room
            .retain(|r| !removed.contains(r.target.as_str()));
        if obj
            .facing
            .as_deref()
            .is_some_and(|f| removed.contains(f))
        {
            obj.facing = Some(LayoutElement::MiddleOfRoom.id().to_string());
        }
    }
}
