//! Placement search.
//!
//! Objects whose layout relations fix every coordinate are pinned first and
//! never move. The rest are placed one depth level at a time: each object's
//! feasible region is the intersection of its absolute region, the room
//! minus its reserved extents, and one region per referenced object. A
//! level that cannot be completed sends the search back one level, which
//! then tries a later feasible candidate.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, info, warn};

use super::config::EngineConfig;
use super::depth::DepthMap;
use super::error::EngineError;
use super::geometry::{Aabb, Axis, Interval, Point3, EPSILON};
use super::graph::SceneGraph;
use super::orientation::Heading;
use super::types::{LayoutElement, LayoutPreposition, ObjectPreposition, Room, SceneObject};

/// Why one object could not be placed
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReason {
    /// The constraints leave no feasible interval on an axis
    EmptyInterval { axis: Axis },
    /// A referenced object has no position yet
    UnplacedReference { reference: String },
    /// Every sampled position collides with a placed object
    NoFreeSpace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacementFailure {
    pub object: String,
    pub reason: FailureReason,
}

impl fmt::Display for PlacementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            FailureReason::EmptyInterval { axis } => {
                write!(f, "no feasible {} interval for '{}'", axis, self.object)
            }
            FailureReason::UnplacedReference { reference } => write!(
                f,
                "'{}' references '{}' which has no position",
                self.object, reference
            ),
            FailureReason::NoFreeSpace => write!(f, "no free space for '{}'", self.object),
        }
    }
}

/// Counters collected during one placement run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementStats {
    pub pinned: usize,
    pub placed: usize,
    pub backjumps: usize,
    pub level_attempts: usize,
}

/// A feasible box plus the preferred coordinate on each axis
#[derive(Debug, Clone, Copy)]
struct Region {
    bounds: Aabb,
    preferred: [Option<f64>; 3],
}

impl Region {
    fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            preferred: [None; 3],
        }
    }

    fn prefer(mut self, axis: Axis, value: f64) -> Self {
        let slot = &mut self.preferred[axis_index(axis)];
        if slot.is_none() {
            *slot = Some(value);
        }
        self
    }

    /// Intersect bounds; earlier preferences win
    fn intersect(&self, other: &Region) -> Result<Region, Axis> {
        let bounds = Aabb::new(
            self.bounds.x.intersect(&other.bounds.x),
            self.bounds.y.intersect(&other.bounds.y),
            self.bounds.z.intersect(&other.bounds.z),
        );
        if let Some(axis) = bounds.first_empty_axis() {
            return Err(axis);
        }
        let mut preferred = self.preferred;
        for (slot, theirs) in preferred.iter_mut().zip(other.preferred) {
            if slot.is_none() {
                *slot = theirs;
            }
        }
        Ok(Region { bounds, preferred })
    }
}

fn axis_index(axis: Axis) -> usize {
    match axis {
        Axis::X => 0,
        Axis::Y => 1,
        Axis::Z => 2,
    }
}

fn horizontal(heading: Heading) -> (Axis, Axis) {
    match heading.axis() {
        Axis::X => (Axis::X, Axis::Y),
        _ => (Axis::Y, Axis::X),
    }
}

/// The room shrunk by the object's half sizes, resting on the floor when it has floor contact
fn envelope(obj: &SceneObject, room: &Room) -> Region {
    let [hx, hy, hz] = obj.half_size();
    let z = if obj.on_floor {
        Interval::point(hz)
    } else {
        Interval::new(hz, room.z - hz)
    };
    Region::new(Aabb::new(
        Interval::new(hx, room.x - hx),
        Interval::new(hy, room.y - hy),
        z,
    ))
}

/// Candidate regions for one layout relation
fn layout_alternatives(
    obj: &SceneObject,
    element: LayoutElement,
    preposition: LayoutPreposition,
    room: &Room,
) -> Vec<Region> {
    let [hx, hy, hz] = obj.half_size();
    let free = Aabb::unbounded();
    let flush = |axis: Axis, value: f64| Region::new(free.with_axis(axis, Interval::point(value)));
    let corner = |x: f64, y: f64| {
        Region::new(
            free.with_axis(Axis::X, Interval::point(x))
                .with_axis(Axis::Y, Interval::point(y)),
        )
    };
    let (west, east, south, north) = (hx, room.x - hx, hy, room.y - hy);

    match (element, preposition) {
        (LayoutElement::SouthWall, LayoutPreposition::On) => vec![flush(Axis::Y, south)],
        (LayoutElement::NorthWall, LayoutPreposition::On) => vec![flush(Axis::Y, north)],
        (LayoutElement::WestWall, LayoutPreposition::On) => vec![flush(Axis::X, west)],
        (LayoutElement::EastWall, LayoutPreposition::On) => vec![flush(Axis::X, east)],
        (LayoutElement::SouthWall, LayoutPreposition::InTheCorner) => {
            vec![corner(west, south), corner(east, south)]
        }
        (LayoutElement::NorthWall, LayoutPreposition::InTheCorner) => {
            vec![corner(west, north), corner(east, north)]
        }
        (LayoutElement::WestWall, LayoutPreposition::InTheCorner) => {
            vec![corner(west, south), corner(west, north)]
        }
        (LayoutElement::EastWall, LayoutPreposition::InTheCorner) => {
            vec![corner(east, south), corner(east, north)]
        }
        (LayoutElement::MiddleOfRoom, _) => vec![corner(room.x / 2.0, room.y / 2.0)],
        (LayoutElement::Ceiling, _) => vec![flush(Axis::Z, room.z - hz)],
    }
}

/// Every non-empty combination of the object's absolute regions, in
/// declaration order of its layout relations
fn absolute_alternatives(obj: &SceneObject, room: &Room) -> Result<Vec<Region>, Axis> {
    let base = envelope(obj, room);
    if let Some(axis) = base.bounds.first_empty_axis() {
        return Err(axis);
    }
    let mut combos = vec![base];
    let mut first_empty = None;
    for rel in obj.layout_relations() {
        let options = layout_alternatives(obj, rel.element, rel.preposition, room);
        let mut next = Vec::new();
        for combo in &combos {
            for option in &options {
                match combo.intersect(option) {
                    Ok(region) => next.push(region),
                    Err(axis) => {
                        first_empty.get_or_insert(axis);
                    }
                }
            }
        }
        combos = next;
    }
    if combos.is_empty() {
        return Err(first_empty.unwrap_or(Axis::X));
    }
    Ok(combos)
}

/// Pin every object whose layout relations fix all three coordinates.
///
/// Alternatives are tried in order. A point whose reserved extents leave the
/// room is skipped; the first remaining point that does not overlap an
/// already pinned object wins. Returns the pinned ids.
pub fn pin_absolute(objects: &mut [SceneObject], room: &Room) -> HashSet<String> {
    let mut pinned = HashSet::new();
    let mut boxes: Vec<Aabb> = Vec::new();

    for obj in objects.iter_mut() {
        let Ok(alternatives) = absolute_alternatives(obj, room) else {
            continue;
        };
        let reserved = reservation(obj, room);
        let half = obj.half_size();
        let spot = alternatives
            .iter()
            .filter(|r| r.bounds.is_point())
            .filter(|r| r.intersect(&reserved).is_ok())
            .map(|r| Aabb::from_center(r.bounds.center(), half))
            .find(|b| !boxes.iter().any(|other| other.overlaps(b)));
        if let Some(bounds) = spot {
            let center = bounds.center();
            debug!(object = %obj.id, x = center.x, y = center.y, z = center.z, "pinned");
            obj.position = Some(center.into());
            boxes.push(bounds);
            pinned.insert(obj.id.clone());
        }
    }
    pinned
}

/// Region imposed by one relation toward an already placed reference
fn relation_region(
    obj: &SceneObject,
    reference: &SceneObject,
    preposition: ObjectPreposition,
    is_adjacent: bool,
    config: &EngineConfig,
) -> Option<Region> {
    let center = reference.center()?;
    let ref_half = reference.half_size();
    let half = obj.half_size();
    let free = Aabb::unbounded();
    let top = center.z + ref_half[2];

    let within = |axis: Axis| {
        let i = axis_index(axis);
        if half[i] <= ref_half[i] + EPSILON {
            Interval::new(
                center.get(axis) - ref_half[i] + half[i],
                center.get(axis) + ref_half[i] - half[i],
            )
        } else {
            Interval::point(center.get(axis))
        }
    };
    let span = |axis: Axis| {
        let i = axis_index(axis);
        Interval::new(center.get(axis) - ref_half[i], center.get(axis) + ref_half[i])
    };

    let region = match preposition {
        ObjectPreposition::On => Region::new(
            free.with_axis(Axis::X, within(Axis::X))
                .with_axis(Axis::Y, within(Axis::Y))
                .with_axis(Axis::Z, Interval::point(top + half[2])),
        ),
        ObjectPreposition::Above => {
            let z = if is_adjacent {
                Interval::point(top + half[2])
            } else {
                Interval::new(top + half[2], f64::INFINITY)
            };
            Region::new(
                free.with_axis(Axis::X, span(Axis::X))
                    .with_axis(Axis::Y, span(Axis::Y))
                    .with_axis(Axis::Z, z),
            )
        }
        // The graph carries `under` as `on`/`above` from the other side
        ObjectPreposition::Under => return None,
        directional => {
            let outward = reference.heading().toward(directional)?;
            let (along, across) = horizontal(outward);
            let a = axis_index(along);
            let sign = outward.sign();
            let along_interval = if is_adjacent {
                Interval::point(center.get(along) + sign * (ref_half[a] + half[a]))
            } else {
                let edge = center.get(along) + sign * (reference.reach(outward) + config.spacing + half[a]);
                if sign > 0.0 {
                    Interval::new(edge, f64::INFINITY)
                } else {
                    Interval::new(f64::NEG_INFINITY, edge)
                }
            };
            let across_interval = if is_adjacent {
                span(across)
            } else {
                Interval::unbounded()
            };
            Region::new(
                free.with_axis(along, along_interval)
                    .with_axis(across, across_interval),
            )
            .prefer(along, along_interval.clamp(center.get(along)))
            .prefer(across, center.get(across))
        }
    };

    let region = match preposition {
        ObjectPreposition::On | ObjectPreposition::Above => region
            .prefer(Axis::X, center.x)
            .prefer(Axis::Y, center.y),
        _ => region,
    };
    Some(region)
}

/// Keep the object's reserved extents inside the room
fn reservation(obj: &SceneObject, room: &Room) -> Region {
    Region::new(Aabb::new(
        Interval::new(obj.reach(Heading::West), room.x - obj.reach(Heading::East)),
        Interval::new(obj.reach(Heading::South), room.y - obj.reach(Heading::North)),
        Interval::unbounded(),
    ))
}

/// Values to try on one axis: the preferred value, both bounds, then a grid
/// ordered by distance from the preferred value
fn axis_samples(interval: Interval, preferred: Option<f64>, step: f64, limit: usize) -> Vec<f64> {
    if interval.is_point() {
        return vec![interval.center()];
    }
    let first = interval.clamp(preferred.unwrap_or_else(|| interval.center()));
    let mut values = vec![first, interval.min, interval.max];

    let mut grid = Vec::new();
    let mut k = (interval.min / step).ceil() as i64;
    while (k as f64) * step <= interval.max + EPSILON && grid.len() < limit * 2 {
        grid.push((k as f64) * step);
        k += 1;
    }
    grid.sort_by(|a, b| (a - first).abs().total_cmp(&(b - first).abs()));
    values.extend(grid.into_iter().map(|v| interval.clamp(v)));

    let mut unique: Vec<f64> = Vec::new();
    for value in values {
        if !unique.iter().any(|u| (u - value).abs() <= EPSILON) {
            unique.push(value);
        }
        if unique.len() >= limit {
            break;
        }
    }
    unique
}

/// Candidate centers inside `region`, best first, at most `limit`
fn candidates(region: &Region, step: f64, limit: usize) -> Vec<Point3> {
    let samples: Vec<Vec<f64>> = Axis::ALL
        .iter()
        .map(|a| {
            axis_samples(
                region.bounds.axis(*a),
                region.preferred[axis_index(*a)],
                step,
                limit,
            )
        })
        .collect();
    let (nx, ny, nz) = (samples[0].len(), samples[1].len(), samples[2].len());

    // Enumerate by rank sum so that every axis advances evenly
    let mut points = Vec::new();
    'outer: for sum in 0..(nx + ny + nz) {
        for i in 0..nx.min(sum + 1) {
            for j in 0..ny.min(sum - i + 1) {
                let k = sum - i - j;
                if k >= nz {
                    continue;
                }
                points.push(Point3::new(samples[0][i], samples[1][j], samples[2][k]));
                if points.len() >= limit {
                    break 'outer;
                }
            }
        }
    }
    points
}

struct Placer<'a> {
    graph: &'a SceneGraph,
    room: &'a Room,
    config: &'a EngineConfig,
    pinned: &'a HashSet<String>,
    index: HashMap<String, usize>,
}

impl Placer<'_> {
    fn place_object(
        &self,
        objects: &mut [SceneObject],
        i: usize,
        retry: usize,
    ) -> Result<(), PlacementFailure> {
        let obj = &objects[i];
        let fail = |reason| PlacementFailure {
            object: obj.id.clone(),
            reason,
        };

        let alternatives =
            absolute_alternatives(obj, self.room).map_err(|axis| fail(FailureReason::EmptyInterval { axis }))?;

        let mut constraints = vec![reservation(obj, self.room)];
        for neighbor in self.graph.references(&obj.id) {
            if !neighbor.is_object() {
                continue;
            }
            let Some(preposition) = neighbor.edge.preposition.object() else {
                continue;
            };
            let Some(&r) = self.index.get(&neighbor.id) else {
                continue;
            };
            let reference = &objects[r];
            if reference.position.is_none() {
                return Err(fail(FailureReason::UnplacedReference {
                    reference: neighbor.id.clone(),
                }));
            }
            if let Some(region) =
                relation_region(obj, reference, preposition, neighbor.edge.is_adjacent, self.config)
            {
                constraints.push(region);
            }
        }

        let placed: Vec<Aabb> = objects
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .filter_map(|(_, o)| o.bounds())
            .collect();
        let half = obj.half_size();

        let mut empty_axis = None;
        let mut searched = false;
        let mut feasible = Vec::new();
        for alternative in &alternatives {
            let region = constraints
                .iter()
                .try_fold(*alternative, |region, constraint| region.intersect(constraint));
            let region = match region {
                Ok(region) => region,
                Err(axis) => {
                    empty_axis.get_or_insert(axis);
                    continue;
                }
            };
            searched = true;
            for center in candidates(&region, self.config.search_step, self.config.max_candidates) {
                let bounds = Aabb::from_center(center, half);
                if !placed.iter().any(|b| b.overlaps(&bounds)) {
                    feasible.push(center);
                }
            }
        }

        if feasible.is_empty() {
            return Err(match empty_axis {
                Some(axis) if !searched => fail(FailureReason::EmptyInterval { axis }),
                _ => fail(FailureReason::NoFreeSpace),
            });
        }
        let center = feasible[retry % feasible.len()];
        debug!(object = %obj.id, x = center.x, y = center.y, z = center.z, retry, "placed");
        objects[i].position = Some(center.into());
        Ok(())
    }

    fn place_level(
        &self,
        objects: &mut [SceneObject],
        level: &[String],
        retry: usize,
    ) -> Result<usize, PlacementFailure> {
        let mut placed = 0;
        for id in level {
            if self.pinned.contains(id) {
                continue;
            }
            let Some(&i) = self.index.get(id) else {
                continue;
            };
            self.place_object(objects, i, retry)?;
            placed += 1;
        }
        Ok(placed)
    }
}

/// Place every unpinned object, level by level, backjumping on failure.
pub fn place_all(
    objects: &mut [SceneObject],
    graph: &SceneGraph,
    depths: &DepthMap,
    pinned: &HashSet<String>,
    room: &Room,
    config: &EngineConfig,
) -> Result<PlacementStats, EngineError> {
    let placer = Placer {
        graph,
        room,
        config,
        pinned,
        index: objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.id.clone(), i))
            .collect(),
    };
    let levels = depths.levels();
    let mut retries = vec![0usize; levels.len()];
    let mut stats = PlacementStats {
        pinned: pinned.len(),
        ..PlacementStats::default()
    };

    info!(
        objects = objects.len(),
        pinned = pinned.len(),
        levels = levels.len(),
        "placing objects"
    );

    let mut level = 0;
    while level < levels.len() {
        stats.level_attempts += 1;
        match placer.place_level(objects, &levels[level], retries[level]) {
            Ok(_) => level += 1,
            Err(failure) => {
                stats.backjumps += 1;
                if stats.backjumps > config.max_backjumps {
                    return Err(EngineError::PlacementDiverged {
                        backjumps: config.max_backjumps,
                        depth: level,
                        reason: failure.to_string(),
                    });
                }
                let resume = level.saturating_sub(1);
                warn!(
                    depth = level,
                    resume,
                    backjumps = stats.backjumps,
                    "{}; backjumping",
                    failure
                );
                for obj in objects.iter_mut() {
                    let deep = depths.get(&obj.id).is_some_and(|d| d >= resume);
                    if deep && !pinned.contains(&obj.id) {
                        obj.position = None;
                    }
                }
                retries[resume] += 1;
                for retry in retries.iter_mut().skip(resume + 1) {
                    *retry = 0;
                }
                level = resume;
            }
        }
    }

    stats.placed = objects
        .iter()
        .filter(|o| o.position.is_some() && !pinned.contains(&o.id))
        .count();
    info!(
        placed = stats.placed,
        backjumps = stats.backjumps,
        "placement complete"
    );
    Ok(stats)
}
