//! Spatial and size conflict detection.
//!
//! Conflicts are data, not errors: the resolution loop hands the first one to
//! an external collaborator, applies the answer and detects again.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use super::geometry::EPSILON;
use super::graph::{EdgePreposition, NodeKind, SceneGraph};
use super::types::{LayoutElement, LayoutPreposition, ObjectPreposition, Room, SceneObject};

/// Subject id used for conflicts about the floor as a whole
pub const FLOOR: &str = "floor";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Relations that cannot hold together, or a support cycle
    Spatial,
    /// A footprint that does not fit its available area
    Size,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::Spatial => write!(f, "spatial"),
            ConflictKind::Size => write!(f, "size"),
        }
    }
}

/// One declared relation taking part in a conflict: `subject preposition reference`
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRelation {
    pub subject: String,
    pub preposition: EdgePreposition,
    pub reference: String,
}

impl fmt::Display for ConflictRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.preposition, self.reference)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub kind: ConflictKind,
    /// The object to correct (spatial) or the entity whose area is exceeded (size)
    pub object: String,
    pub relations: Vec<ConflictRelation>,
    /// Objects that may be deleted to resolve a size conflict
    pub candidates: Vec<String>,
    pub reason: String,
}

impl Conflict {
    fn spatial(object: &str, relations: Vec<ConflictRelation>, reason: impl Into<String>) -> Self {
        Self {
            kind: ConflictKind::Spatial,
            object: object.to_string(),
            relations,
            candidates: Vec::new(),
            reason: reason.into(),
        }
    }

    fn size(object: &str, candidates: Vec<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: ConflictKind::Size,
            object: object.to_string(),
            relations: Vec::new(),
            candidates,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict on '{}': {}", self.kind, self.object, self.reason)?;
        if !self.relations.is_empty() {
            let relations: Vec<String> = self.relations.iter().map(|r| r.to_string()).collect();
            write!(f, " ({})", relations.join(", "))?;
        }
        if !self.candidates.is_empty() {
            write!(f, " [candidates: {}]", self.candidates.join(", "))?;
        }
        Ok(())
    }
}

/// Lowercase words of an object id without its numeric suffix: `coffee_table_1`
/// becomes `["coffee", "table"]`
fn name_words(id: &str) -> Vec<String> {
    let stem = id.trim_end_matches(|c: char| c.is_ascii_digit());
    let stem = if stem.len() < id.len() {
        stem.strip_suffix('_').unwrap_or(stem)
    } else {
        id
    };
    stem.split('_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn intent_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Plurals count: `armchairs` names an `armchair`
fn word_matches(word: &str, name: &str) -> bool {
    word == name
        || word.strip_suffix('s') == Some(name)
        || word.strip_suffix("es") == Some(name)
}

/// Word ranges of the intent that spell out `name`
fn mentions(words: &[String], name: &[String]) -> Vec<(usize, usize)> {
    if name.is_empty() || name.len() > words.len() {
        return Vec::new();
    }
    (0..=words.len() - name.len())
        .filter(|&start| {
            name.iter()
                .enumerate()
                .all(|(k, part)| word_matches(&words[start + k], part))
        })
        .map(|start| (start, start + name.len()))
        .collect()
}

/// Ids among `ids` the user intent asks for by name.
///
/// Names match on whole words, case-insensitively. A mention inside a longer
/// name of another object does not count: with `coffee_table_1` in the scene,
/// "a coffee table" does not request `table_1`.
pub fn requested_objects<'a>(ids: &[&'a str], user_intent: &str) -> HashSet<&'a str> {
    let words = intent_words(user_intent);
    let found: Vec<(&str, Vec<(usize, usize)>, usize)> = ids
        .iter()
        .map(|id| {
            let name = name_words(id);
            (*id, mentions(&words, &name), name.len())
        })
        .collect();

    found
        .iter()
        .filter(|(id, ranges, len)| {
            ranges.iter().any(|&(start, end)| {
                !found.iter().any(|(other, others, other_len)| {
                    other != id
                        && other_len > len
                        && others.iter().any(|&(s, e)| s <= start && end <= e)
                })
            })
        })
        .map(|(id, _, _)| *id)
        .collect()
}

/// Detect contradictory relations and support cycles, in object input order.
pub fn detect_spatial_conflicts(graph: &SceneGraph, objects: &[SceneObject]) -> Vec<Conflict> {
    let cycles = graph.cycles();
    let mut conflicts = Vec::new();

    for obj in objects {
        if !graph.contains(&obj.id) {
            continue;
        }

        for cycle in cycles.iter().filter(|c| c[0] == obj.id) {
            conflicts.push(cycle_conflict(graph, cycle));
        }

        let references = graph.references(&obj.id);
        let relation = |reference: &str, preposition: EdgePreposition| ConflictRelation {
            subject: obj.id.clone(),
            preposition,
            reference: reference.to_string(),
        };

        // Opposing directions toward the same reference
        let object_refs: Vec<_> = references.iter().filter(|n| n.is_object()).collect();
        for (i, first) in object_refs.iter().enumerate() {
            for second in object_refs.iter().skip(i + 1) {
                if first.id != second.id {
                    continue;
                }
                let (Some(a), Some(b)) = (
                    first.edge.preposition.object(),
                    second.edge.preposition.object(),
                ) else {
                    continue;
                };
                if a.opposes(&b) {
                    conflicts.push(Conflict::spatial(
                        &obj.id,
                        vec![
                            relation(&first.id, first.edge.preposition),
                            relation(&second.id, second.edge.preposition),
                        ],
                        format!("cannot be both {} and {} '{}'", a, b, first.id),
                    ));
                }
            }
        }

        let supports: Vec<_> = object_refs
            .iter()
            .filter(|n| n.edge.preposition == EdgePreposition::Object(ObjectPreposition::On))
            .collect();
        let distinct: BTreeSet<&str> = supports.iter().map(|n| n.id.as_str()).collect();
        if distinct.len() > 1 {
            conflicts.push(Conflict::spatial(
                &obj.id,
                supports
                    .iter()
                    .map(|n| relation(&n.id, n.edge.preposition))
                    .collect(),
                "rests on more than one object",
            ));
        }

        let layout: Vec<(LayoutElement, EdgePreposition)> = references
            .iter()
            .filter_map(|n| match n.kind {
                NodeKind::Layout(element) => Some((element, n.edge.preposition)),
                NodeKind::Object => None,
            })
            .collect();
        for (i, (wall, first)) in layout.iter().enumerate() {
            let Some(opposite) = wall.opposite() else {
                continue;
            };
            if let Some((other, second)) = layout[i + 1..].iter().find(|(e, _)| *e == opposite) {
                conflicts.push(Conflict::spatial(
                    &obj.id,
                    vec![relation(wall.id(), *first), relation(other.id(), *second)],
                    "cannot stand against opposite walls",
                ));
            }
        }

        if obj.on_floor {
            if let Some(support) = supports.first() {
                conflicts.push(Conflict::spatial(
                    &obj.id,
                    vec![relation(&support.id, support.edge.preposition)],
                    format!("is on the floor and on top of '{}'", support.id),
                ));
            }
            let ceiling = EdgePreposition::Layout(LayoutPreposition::On);
            if layout
                .iter()
                .any(|(e, p)| *e == LayoutElement::Ceiling && *p == ceiling)
            {
                conflicts.push(Conflict::spatial(
                    &obj.id,
                    vec![relation(LayoutElement::Ceiling.id(), ceiling)],
                    "is on the floor and on the ceiling",
                ));
            }
        }
    }

    conflicts
}

fn cycle_conflict(graph: &SceneGraph, cycle: &[String]) -> Conflict {
    let mut relations = Vec::new();
    for member in cycle {
        for reference in graph.references(member) {
            if cycle.contains(&reference.id) {
                relations.push(ConflictRelation {
                    subject: member.clone(),
                    preposition: reference.edge.preposition,
                    reference: reference.id.clone(),
                });
            }
        }
    }
    let reason = if cycle.len() == 1 {
        "relation refers to the object itself".to_string()
    } else {
        format!("support cycle through {}", cycle.join(", "))
    };
    Conflict::spatial(&cycle[0], relations, reason)
}

/// Detect footprints that do not fit, in object input order.
///
/// Expects rotations (and, for cluster footprints, extents) to be assigned.
/// Objects named in `user_intent` are never deletion candidates; a conflict
/// whose candidates are all protected is not reported.
pub fn detect_size_conflicts(
    graph: &SceneGraph,
    objects: &[SceneObject],
    user_intent: &str,
    room: &Room,
) -> Vec<Conflict> {
    let by_id: HashMap<&str, &SceneObject> = objects.iter().map(|o| (o.id.as_str(), o)).collect();
    let ids: Vec<&str> = objects.iter().map(|o| o.id.as_str()).collect();
    let protected = requested_objects(&ids, user_intent);
    let deletable = |ids: Vec<String>| -> Vec<String> {
        ids.into_iter()
            .filter(|id| !protected.contains(id.as_str()))
            .collect()
    };
    let live: Vec<&SceneObject> = objects.iter().filter(|o| graph.contains(&o.id)).collect();
    let mut conflicts = Vec::new();

    // Cluster footprint against the room
    for obj in &live {
        let (span_x, span_y) = obj.reserved_span();
        let too_wide = span_x > room.x + EPSILON || span_y > room.y + EPSILON;
        let too_tall = obj.size.height > room.z + EPSILON;
        if !(too_wide || too_tall) {
            continue;
        }
        let mut ids = vec![obj.id.clone()];
        ids.extend(
            graph
                .descendants(&obj.id)
                .into_iter()
                .filter(|d| graph.kind(d) == Some(NodeKind::Object)),
        );
        let candidates = deletable(ids);
        if candidates.is_empty() {
            continue;
        }
        let reason = if too_wide {
            format!(
                "footprint {:.2} x {:.2} m does not fit the {:.2} x {:.2} m room",
                span_x, span_y, room.x, room.y
            )
        } else {
            format!(
                "height {:.2} m exceeds the {:.2} m ceiling",
                obj.size.height, room.z
            )
        };
        conflicts.push(Conflict::size(&obj.id, candidates, reason));
    }

    // Wall length against the floor-standing objects along it
    for wall in LayoutElement::ALL.iter().filter(|e| e.is_wall()) {
        let along: Vec<&&SceneObject> = live
            .iter()
            .filter(|o| o.on_floor && o.layout_relations().iter().any(|r| r.element == *wall))
            .collect();
        let needed: f64 = along
            .iter()
            .map(|o| {
                let (span_x, span_y) = o.reserved_span();
                if wall.inward().is_north_south() {
                    span_x
                } else {
                    span_y
                }
            })
            .sum();
        let available = room.wall_length(*wall);
        if needed <= available + EPSILON {
            continue;
        }
        let candidates = deletable(along.iter().map(|o| o.id.clone()).collect());
        if !candidates.is_empty() {
            conflicts.push(Conflict::size(
                wall.id(),
                candidates,
                format!(
                    "needs {:.2} m of wall but only {:.2} m is available",
                    needed, available
                ),
            ));
        }
    }

    // Top area of each support against the objects resting on it
    for support in &live {
        let resting: Vec<&SceneObject> = graph
            .dependents(&support.id)
            .into_iter()
            .filter(|n| n.edge.preposition == EdgePreposition::Object(ObjectPreposition::On))
            .filter_map(|n| by_id.get(n.id.as_str()).copied())
            .collect();
        if resting.is_empty() {
            continue;
        }
        let needed: f64 = resting.iter().map(|o| o.footprint_area()).sum();
        let available = support.footprint_area();
        if needed <= available + EPSILON {
            continue;
        }
        let candidates = deletable(resting.iter().map(|o| o.id.clone()).collect());
        if !candidates.is_empty() {
            conflicts.push(Conflict::size(
                &support.id,
                candidates,
                format!(
                    "objects on top need {:.2} m² but the surface has {:.2} m²",
                    needed, available
                ),
            ));
        }
    }

    // Floor area against every floor-standing object
    let standing: Vec<&&SceneObject> = live.iter().filter(|o| o.on_floor).collect();
    let needed: f64 = standing.iter().map(|o| o.footprint_area()).sum();
    if needed > room.floor_area() + EPSILON {
        let candidates = deletable(standing.iter().map(|o| o.id.clone()).collect());
        if !candidates.is_empty() {
            conflicts.push(Conflict::size(
                FLOOR,
                candidates,
                format!(
                    "floor objects need {:.2} m² but the room has {:.2} m²",
                    needed,
                    room.floor_area()
                ),
            ));
        }
    }

    conflicts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::types::Dimensions;
    use pretty_assertions::assert_eq;

    fn obj(id: &str, length: f64, width: f64) -> SceneObject {
        SceneObject::new(id, Dimensions::new(length, width, 1.0)).on_floor(true)
    }

    fn spatial(objects: &[SceneObject]) -> Vec<Conflict> {
        let graph = SceneGraph::build(objects).unwrap();
        detect_spatial_conflicts(&graph, objects)
    }

    #[test]
    fn test_left_and_right_of_same_reference() {
        let objects = vec![
            obj("desk_1", 1.2, 0.6),
            obj("chair_1", 0.5, 0.5)
                .with_relation("desk_1", ObjectPreposition::LeftOf, true)
                .with_relation("desk_1", ObjectPreposition::RightOf, true),
        ];
        let conflicts = spatial(&objects);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::Spatial);
        assert_eq!(conflicts[0].object, "chair_1");
        insta::assert_snapshot!(
            conflicts[0].to_string(),
            @"spatial conflict on 'chair_1': cannot be both left of and right of 'desk_1' (chair_1 left of desk_1, chair_1 right of desk_1)"
        );
    }

    #[test]
    fn test_support_cycle() {
        let objects = vec![
            obj("a", 1.0, 1.0).with_relation("b", ObjectPreposition::On, true),
            obj("b", 1.0, 1.0).with_relation("a", ObjectPreposition::On, true),
        ];
        let conflicts = spatial(&objects);
        let cycle = conflicts
            .iter()
            .find(|c| c.reason.starts_with("support cycle"))
            .unwrap();
        assert_eq!(cycle.object, "a");
        assert_eq!(cycle.relations.len(), 2);
    }

    #[test]
    fn test_self_relation() {
        let objects = vec![obj("a", 1.0, 1.0).with_relation("a", ObjectPreposition::LeftOf, true)];
        let conflicts = spatial(&objects);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reason, "relation refers to the object itself");
    }

    #[test]
    fn test_two_supports() {
        let objects = vec![
            obj("table_1", 1.0, 1.0),
            obj("shelf_1", 1.0, 1.0),
            SceneObject::new("vase_1", Dimensions::new(0.2, 0.2, 0.3))
                .with_relation("table_1", ObjectPreposition::On, true)
                .with_relation("shelf_1", ObjectPreposition::On, true),
        ];
        let conflicts = spatial(&objects);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reason, "rests on more than one object");
    }

    #[test]
    fn test_opposite_walls() {
        let objects = vec![obj("sofa_1", 2.0, 0.9)
            .with_layout(LayoutElement::WestWall, LayoutPreposition::On)
            .with_layout(LayoutElement::EastWall, LayoutPreposition::On)];
        let conflicts = spatial(&objects);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].reason, "cannot stand against opposite walls");
    }

    #[test]
    fn test_floor_object_on_another_object() {
        let objects = vec![
            obj("table_1", 1.0, 1.0),
            obj("lamp_1", 0.3, 0.3).with_relation("table_1", ObjectPreposition::On, true),
        ];
        let conflicts = spatial(&objects);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].object, "lamp_1");
    }

    #[test]
    fn test_consistent_scene_has_no_spatial_conflict() {
        let objects = vec![
            obj("desk_1", 1.2, 0.6).with_layout(LayoutElement::SouthWall, LayoutPreposition::On),
            obj("chair_1", 0.5, 0.5).with_relation("desk_1", ObjectPreposition::InFront, true),
        ];
        assert!(spatial(&objects).is_empty());
    }

    #[test]
    fn test_requested_objects() {
        fn requested(ids: &[&'static str], intent: &str) -> Vec<&'static str> {
            let mut found: Vec<&str> = requested_objects(ids, intent).into_iter().collect();
            found.sort();
            found
        }
        assert_eq!(
            requested(&["armchair_2", "lamp_1", "bed_1"], "Two armchairs and a lamp"),
            vec!["armchair_2", "lamp_1"]
        );
        assert_eq!(
            requested(&["coffee_table_1", "table_1"], "a coffee table"),
            vec!["coffee_table_1"]
        );
        assert_eq!(
            requested(&["bed_1", "lamp_1"], "a bedroom with a bedside lamp"),
            vec!["lamp_1"]
        );
        assert!(requested(&["lamp_1"], "a bed").is_empty());
    }

    #[test]
    fn test_wall_overflow() {
        let room = Room::new(2.0, 3.0, 2.5);
        let objects: Vec<SceneObject> = ["wardrobe_1", "wardrobe_2", "dresser_1"]
            .iter()
            .map(|id| obj(id, 1.0, 0.5).with_layout(LayoutElement::SouthWall, LayoutPreposition::On))
            .collect();
        let graph = SceneGraph::build(&objects).unwrap();

        let conflicts = detect_size_conflicts(&graph, &objects, "a bedroom", &room);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].object, "south_wall");
        assert_eq!(
            conflicts[0].candidates,
            vec!["wardrobe_1", "wardrobe_2", "dresser_1"]
        );

        let protected = detect_size_conflicts(&graph, &objects, "a wardrobe", &room);
        assert_eq!(protected[0].candidates, vec!["dresser_1"]);

        let all_protected = detect_size_conflicts(&graph, &objects, "wardrobes and a dresser", &room);
        assert!(all_protected.is_empty());
    }

    #[test]
    fn test_object_larger_than_room() {
        let room = Room::new(4.0, 3.0, 2.5);
        let objects = vec![obj("sectional_1", 5.0, 1.0)];
        let graph = SceneGraph::build(&objects).unwrap();
        let conflicts = detect_size_conflicts(&graph, &objects, "", &room);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].object, "sectional_1");
        assert_eq!(conflicts[0].kind, ConflictKind::Size);
    }

    #[test]
    fn test_crowded_surface() {
        let room = Room::new(4.0, 3.0, 2.5);
        let objects = vec![
            obj("side_table_1", 0.5, 0.5),
            SceneObject::new("lamp_1", Dimensions::new(0.4, 0.4, 0.5))
                .with_relation("side_table_1", ObjectPreposition::On, true),
            SceneObject::new("plant_1", Dimensions::new(0.4, 0.4, 0.5))
                .with_relation("side_table_1", ObjectPreposition::On, true),
        ];
        let graph = SceneGraph::build(&objects).unwrap();
        let conflicts = detect_size_conflicts(&graph, &objects, "", &room);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].object, "side_table_1");
        assert_eq!(conflicts[0].candidates, vec!["lamp_1", "plant_1"]);
    }
}
