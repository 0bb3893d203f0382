//! Quarter-turn orientation and rotation assignment from `facing`.
//!
//! ## Rotation Convention
//!
//! Rotations are counter-clockwise around +z, in degrees, snapped to quarter turns:
//! - 0° faces north (+y)
//! - 90° faces west (-x)
//! - 180° faces south (-y)
//! - 270° faces east (+x)
//!
//! An object's right hand points one quarter turn clockwise of its front.
//!
//! ## Facing
//!
//! `facing` names either a layout element or another object. Facing a wall turns
//! the object toward that wall. Facing an object turns it toward that object
//! using the relation declared between them (a chair "in front" of a desk and
//! facing it looks back at the desk). Without a usable relation the object
//! copies the target's heading.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::geometry::Axis;
use super::types::{
    Extents, LayoutElement, LayoutPreposition, ObjectPreposition, Rotation, SceneObject,
};

/// One of the four quarter-turn headings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Heading {
    North,
    West,
    South,
    East,
}

impl Heading {
    const ORDER: [Heading; 4] = [Heading::North, Heading::West, Heading::South, Heading::East];

    /// Snap an angle in degrees to the nearest quarter turn
    pub fn from_angle(degrees: f64) -> Self {
        let quarters = (degrees / 90.0).round() as i64;
        Self::ORDER[quarters.rem_euclid(4) as usize]
    }

    fn index(self) -> i32 {
        match self {
            Heading::North => 0,
            Heading::West => 1,
            Heading::South => 2,
            Heading::East => 3,
        }
    }

    pub fn angle(self) -> f64 {
        f64::from(self.index()) * 90.0
    }

    /// Turn counter-clockwise by `quarters` (negative turns clockwise)
    pub fn turn(self, quarters: i32) -> Self {
        Self::ORDER[(self.index() + quarters).rem_euclid(4) as usize]
    }

    pub fn opposite(self) -> Self {
        self.turn(2)
    }

    pub fn left(self) -> Self {
        self.turn(1)
    }

    pub fn right(self) -> Self {
        self.turn(-1)
    }

    pub fn is_north_south(self) -> bool {
        matches!(self, Heading::North | Heading::South)
    }

    /// World axis this heading points along
    pub fn axis(self) -> Axis {
        if self.is_north_south() {
            Axis::Y
        } else {
            Axis::X
        }
    }

    /// +1 when pointing toward increasing coordinates
    pub fn sign(self) -> f64 {
        match self {
            Heading::North | Heading::East => 1.0,
            Heading::South | Heading::West => -1.0,
        }
    }

    /// Number of counter-clockwise quarter turns from `self` to `other`
    pub fn quarters_to(self, other: Heading) -> i32 {
        (other.index() - self.index()).rem_euclid(4)
    }

    /// World heading of a directional preposition relative to a reference facing `self`
    pub fn toward(self, preposition: ObjectPreposition) -> Option<Heading> {
        match preposition {
            ObjectPreposition::InFront => Some(self),
            ObjectPreposition::Behind => Some(self.opposite()),
            ObjectPreposition::LeftOf => Some(self.left()),
            ObjectPreposition::RightOf => Some(self.right()),
            ObjectPreposition::On | ObjectPreposition::Above | ObjectPreposition::Under => None,
        }
    }
}

/// Extent of `ext`, expressed in a frame facing `front`, toward world heading `toward`
pub fn extent_toward(ext: &Extents, front: Heading, toward: Heading) -> f64 {
    match front.quarters_to(toward) {
        0 => ext.front,
        1 => ext.left,
        2 => ext.behind,
        _ => ext.right,
    }
}

/// Assign `rotation.z_angle` to every object from its `facing` target.
///
/// Facing chains are followed recursively; a chain that loops back falls
/// back to the object's wall-derived heading.
pub fn assign_rotations(objects: &mut [SceneObject]) {
    let index: HashMap<&str, usize> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (o.id.as_str(), i))
        .collect();

    let mut resolved: HashMap<usize, Heading> = HashMap::new();
    let mut headings = Vec::with_capacity(objects.len());
    for i in 0..objects.len() {
        let mut visiting = Vec::new();
        headings.push(resolve_heading(
            i,
            objects,
            &index,
            &mut resolved,
            &mut visiting,
        ));
    }

    for (obj, heading) in objects.iter_mut().zip(headings) {
        debug!(object = %obj.id, angle = heading.angle(), "assigned rotation");
        obj.rotation = Some(Rotation {
            z_angle: heading.angle(),
        });
    }
}

fn resolve_heading(
    i: usize,
    objects: &[SceneObject],
    index: &HashMap<&str, usize>,
    resolved: &mut HashMap<usize, Heading>,
    visiting: &mut Vec<usize>,
) -> Heading {
    if let Some(h) = resolved.get(&i) {
        return *h;
    }
    let obj = &objects[i];
    if visiting.contains(&i) {
        return default_heading(obj);
    }
    visiting.push(i);

    let heading = match obj.facing.as_deref() {
        None => default_heading(obj),
        Some(target) => {
            if let Some(element) = LayoutElement::from_id(target) {
                if element.is_wall() {
                    // Face the wall itself
                    element.inward().opposite()
                } else {
                    default_heading(obj)
                }
            } else if let Some(&j) = index.get(target) {
                let target_heading = resolve_heading(j, objects, index, resolved, visiting);
                let relation = obj
                    .object_relations()
                    .iter()
                    .find(|r| r.target == target)
                    .map(|r| r.preposition);
                match relation {
                    Some(ObjectPreposition::InFront) => target_heading.opposite(),
                    Some(ObjectPreposition::Behind) => target_heading,
                    Some(ObjectPreposition::LeftOf) => target_heading.right(),
                    Some(ObjectPreposition::RightOf) => target_heading.left(),
                    _ => target_heading,
                }
            } else {
                warn!(object = %obj.id, facing = target, "facing target not found");
                default_heading(obj)
            }
        }
    };

    visiting.pop();
    resolved.insert(i, heading);
    heading
}

/// Heading used when `facing` gives no direction: away from the first wall the
/// object stands on, otherwise north
fn default_heading(obj: &SceneObject) -> Heading {
    obj.layout_relations()
        .iter()
        .find(|r| {
            r.element.is_wall()
                && matches!(
                    r.preposition,
                    LayoutPreposition::On | LayoutPreposition::InTheCorner
                )
        })
        .map(|r| r.element.inward())
        .unwrap_or(Heading::North)
}
