//! Core types for the scene resolution engine
//!
//! Field names follow the scene-graph documents exchanged with the proposal
//! process and downstream renderers (`new_object_id`, `size_in_meters`,
//! `placement.objects_in_room`, ...). The shorter names (`id`, `dimensions`,
//! `floor_contact`) are accepted as aliases on input.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::{Aabb, Interval, Point3};
use super::orientation::{extent_toward, Heading};

/// Fixed room layout elements, the anchors of every scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayoutElement {
    #[serde(rename = "south_wall")]
    SouthWall,
    #[serde(rename = "north_wall")]
    NorthWall,
    #[serde(rename = "west_wall")]
    WestWall,
    #[serde(rename = "east_wall")]
    EastWall,
    #[serde(rename = "ceiling")]
    Ceiling,
    #[serde(rename = "middle of the room", alias = "middle_of_room")]
    MiddleOfRoom,
}

impl LayoutElement {
    pub const ALL: [LayoutElement; 6] = [
        LayoutElement::SouthWall,
        LayoutElement::NorthWall,
        LayoutElement::WestWall,
        LayoutElement::EastWall,
        LayoutElement::Ceiling,
        LayoutElement::MiddleOfRoom,
    ];

    /// Node id of this element in the scene graph
    pub fn id(&self) -> &'static str {
        match self {
            LayoutElement::SouthWall => "south_wall",
            LayoutElement::NorthWall => "north_wall",
            LayoutElement::WestWall => "west_wall",
            LayoutElement::EastWall => "east_wall",
            LayoutElement::Ceiling => "ceiling",
            LayoutElement::MiddleOfRoom => "middle of the room",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "middle_of_room" => Some(LayoutElement::MiddleOfRoom),
            _ => Self::ALL.into_iter().find(|e| e.id() == id),
        }
    }

    pub fn is_wall(&self) -> bool {
        matches!(
            self,
            LayoutElement::SouthWall
                | LayoutElement::NorthWall
                | LayoutElement::WestWall
                | LayoutElement::EastWall
        )
    }

    /// The wall on the other side of the room
    pub fn opposite(&self) -> Option<Self> {
        match self {
            LayoutElement::SouthWall => Some(LayoutElement::NorthWall),
            LayoutElement::NorthWall => Some(LayoutElement::SouthWall),
            LayoutElement::WestWall => Some(LayoutElement::EastWall),
            LayoutElement::EastWall => Some(LayoutElement::WestWall),
            _ => None,
        }
    }

    /// Direction the element faces, pointing into the room
    pub fn inward(&self) -> Heading {
        match self {
            LayoutElement::SouthWall => Heading::North,
            LayoutElement::NorthWall => Heading::South,
            LayoutElement::WestWall => Heading::East,
            LayoutElement::EastWall => Heading::West,
            LayoutElement::Ceiling | LayoutElement::MiddleOfRoom => Heading::North,
        }
    }
}

impl fmt::Display for LayoutElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Relation of an object toward another object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectPreposition {
    #[serde(rename = "on")]
    On,
    #[serde(rename = "left of")]
    LeftOf,
    #[serde(rename = "right of")]
    RightOf,
    #[serde(rename = "in front", alias = "in front of")]
    InFront,
    #[serde(rename = "behind")]
    Behind,
    #[serde(rename = "under")]
    Under,
    #[serde(rename = "above")]
    Above,
}

/// The axis a preposition constrains, in the reference's own frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationAxis {
    /// Left/right of the reference
    Lateral,
    /// In front of/behind the reference
    Frontal,
    /// On, above or under the reference
    Vertical,
}

impl ObjectPreposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectPreposition::On => "on",
            ObjectPreposition::LeftOf => "left of",
            ObjectPreposition::RightOf => "right of",
            ObjectPreposition::InFront => "in front",
            ObjectPreposition::Behind => "behind",
            ObjectPreposition::Under => "under",
            ObjectPreposition::Above => "above",
        }
    }

    /// The preposition describing the same relation seen from the other side
    pub fn inverse(&self) -> ObjectPreposition {
        match self {
            ObjectPreposition::On | ObjectPreposition::Above => ObjectPreposition::Under,
            ObjectPreposition::Under => ObjectPreposition::Above,
            ObjectPreposition::LeftOf => ObjectPreposition::RightOf,
            ObjectPreposition::RightOf => ObjectPreposition::LeftOf,
            ObjectPreposition::InFront => ObjectPreposition::Behind,
            ObjectPreposition::Behind => ObjectPreposition::InFront,
        }
    }

    pub fn axis(&self) -> RelationAxis {
        match self {
            ObjectPreposition::LeftOf | ObjectPreposition::RightOf => RelationAxis::Lateral,
            ObjectPreposition::InFront | ObjectPreposition::Behind => RelationAxis::Frontal,
            ObjectPreposition::On | ObjectPreposition::Above | ObjectPreposition::Under => {
                RelationAxis::Vertical
            }
        }
    }

    /// True for prepositions that rest the dependent on top of the reference
    pub fn is_support(&self) -> bool {
        matches!(self, ObjectPreposition::On)
    }

    /// True when both prepositions constrain the same axis in opposite directions
    pub fn opposes(&self, other: &ObjectPreposition) -> bool {
        matches!(
            (self, other),
            (ObjectPreposition::LeftOf, ObjectPreposition::RightOf)
                | (ObjectPreposition::RightOf, ObjectPreposition::LeftOf)
                | (ObjectPreposition::InFront, ObjectPreposition::Behind)
                | (ObjectPreposition::Behind, ObjectPreposition::InFront)
                | (ObjectPreposition::On, ObjectPreposition::Under)
                | (ObjectPreposition::Above, ObjectPreposition::Under)
                | (ObjectPreposition::Under, ObjectPreposition::On)
                | (ObjectPreposition::Under, ObjectPreposition::Above)
        )
    }
}

impl fmt::Display for ObjectPreposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relation of an object toward a room layout element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LayoutPreposition {
    #[serde(rename = "on")]
    On,
    #[serde(rename = "in the corner")]
    InTheCorner,
}

impl fmt::Display for LayoutPreposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutPreposition::On => write!(f, "on"),
            LayoutPreposition::InTheCorner => write!(f, "in the corner"),
        }
    }
}

/// `{object_id, preposition, is_adjacent}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRelation {
    #[serde(rename = "object_id")]
    pub target: String,
    pub preposition: ObjectPreposition,
    #[serde(default)]
    pub is_adjacent: bool,
}

impl ObjectRelation {
    pub fn new(target: impl Into<String>, preposition: ObjectPreposition, is_adjacent: bool) -> Self {
        Self {
            target: target.into(),
            preposition,
            is_adjacent,
        }
    }
}

/// `{layout_element_id, preposition}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRelation {
    #[serde(rename = "layout_element_id")]
    pub element: LayoutElement,
    pub preposition: LayoutPreposition,
}

/// Declared relations of one object
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Placement {
    #[serde(default)]
    pub room_layout_elements: Vec<LayoutRelation>,
    #[serde(default)]
    pub objects_in_room: Vec<ObjectRelation>,
}

/// Footprint in meters: length is the left/right extent, width the front/back extent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub length: f64,
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<Point3> for Position {
    fn from(p: Point3) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

impl From<Position> for Point3 {
    fn from(p: Position) -> Self {
        Point3::new(p.x, p.y, p.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub z_angle: f64,
}

/// Reserved distance around an object in its own rotated frame.
///
/// Serialized as the `constraint_area` of the object's cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extents {
    #[serde(rename = "x_neg")]
    pub left: f64,
    #[serde(rename = "x_pos")]
    pub right: f64,
    #[serde(rename = "y_neg")]
    pub behind: f64,
    #[serde(rename = "y_pos")]
    pub front: f64,
}

impl Extents {
    pub fn new(left: f64, right: f64, front: f64, behind: f64) -> Self {
        Self {
            left,
            right,
            front,
            behind,
        }
    }

    pub fn lateral_span(&self) -> f64 {
        self.left + self.right
    }

    pub fn frontal_span(&self) -> f64 {
        self.front + self.behind
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub constraint_area: Extents,
}

/// A furnishing object and its resolution state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    #[serde(rename = "new_object_id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(rename = "size_in_meters", alias = "dimensions")]
    pub size: Dimensions,
    #[serde(rename = "is_on_the_floor", alias = "floor_contact", default)]
    pub on_floor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<String>,
    #[serde(default)]
    pub placement: Placement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Rotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterInfo>,
}

impl SceneObject {
    pub fn new(id: impl Into<String>, size: Dimensions) -> Self {
        Self {
            id: id.into(),
            style: None,
            material: None,
            size,
            on_floor: false,
            facing: None,
            placement: Placement::default(),
            rotation: None,
            position: None,
            cluster: None,
        }
    }

    pub fn on_floor(mut self, on_floor: bool) -> Self {
        self.on_floor = on_floor;
        self
    }

    pub fn facing(mut self, target: impl Into<String>) -> Self {
        self.facing = Some(target.into());
        self
    }

    pub fn with_relation(
        mut self,
        target: impl Into<String>,
        preposition: ObjectPreposition,
        is_adjacent: bool,
    ) -> Self {
        self.placement
            .objects_in_room
            .push(ObjectRelation::new(target, preposition, is_adjacent));
        self
    }

    pub fn with_layout(mut self, element: LayoutElement, preposition: LayoutPreposition) -> Self {
        self.placement.room_layout_elements.push(LayoutRelation {
            element,
            preposition,
        });
        self
    }

    pub fn object_relations(&self) -> &[ObjectRelation] {
        &self.placement.objects_in_room
    }

    pub fn layout_relations(&self) -> &[LayoutRelation] {
        &self.placement.room_layout_elements
    }

    pub fn z_angle(&self) -> f64 {
        self.rotation.map(|r| r.z_angle).unwrap_or(0.0)
    }

    pub fn heading(&self) -> Heading {
        Heading::from_angle(self.z_angle())
    }

    /// Half sizes along world x, y, z for the current rotation
    pub fn half_size(&self) -> [f64; 3] {
        let (along_x, along_y) = if self.heading().is_north_south() {
            (self.size.length, self.size.width)
        } else {
            (self.size.width, self.size.length)
        };
        [along_x / 2.0, along_y / 2.0, self.size.height / 2.0]
    }

    /// The object's own half extents in its local frame
    pub fn own_extents(&self) -> Extents {
        let hl = self.size.length / 2.0;
        let hw = self.size.width / 2.0;
        Extents::new(hl, hl, hw, hw)
    }

    /// Cluster extents if assigned, otherwise the object's own half extents
    pub fn extents(&self) -> Extents {
        self.cluster
            .map(|c| c.constraint_area)
            .unwrap_or_else(|| self.own_extents())
    }

    /// Reserved distance from the center toward a world heading
    pub fn reach(&self, toward: Heading) -> f64 {
        extent_toward(&self.extents(), self.heading(), toward)
    }

    /// Reserved spans along world x and y
    pub fn reserved_span(&self) -> (f64, f64) {
        (
            self.reach(Heading::West) + self.reach(Heading::East),
            self.reach(Heading::South) + self.reach(Heading::North),
        )
    }

    pub fn center(&self) -> Option<Point3> {
        self.position.map(Point3::from)
    }

    /// Occupied volume, if the object has been placed
    pub fn bounds(&self) -> Option<Aabb> {
        self.center().map(|c| Aabb::from_center(c, self.half_size()))
    }

    /// Footprint area on the floor plane
    pub fn footprint_area(&self) -> f64 {
        self.size.length * self.size.width
    }

    /// True when the object rests on another object
    pub fn support(&self) -> Option<&ObjectRelation> {
        self.object_relations()
            .iter()
            .find(|r| r.preposition.is_support())
    }
}

/// Room dimensions in meters along x (east-west), y (north-south) and z
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Room {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The whole room volume
    pub fn envelope(&self) -> Aabb {
        Aabb::new(
            Interval::new(0.0, self.x),
            Interval::new(0.0, self.y),
            Interval::new(0.0, self.z),
        )
    }

    pub fn floor_area(&self) -> f64 {
        self.x * self.y
    }

    /// Usable length along a wall
    pub fn wall_length(&self, element: LayoutElement) -> f64 {
        match element {
            LayoutElement::SouthWall | LayoutElement::NorthWall => self.x,
            LayoutElement::WestWall | LayoutElement::EastWall => self.y,
            LayoutElement::Ceiling | LayoutElement::MiddleOfRoom => self.x.max(self.y),
        }
    }

    /// The element as a solved anchor object ("room prior")
    pub fn prior(&self, element: LayoutElement) -> SceneObject {
        let (position, size) = match element {
            LayoutElement::SouthWall => (
                Point3::new(self.x / 2.0, 0.0, self.z / 2.0),
                Dimensions::new(self.x, 0.0, self.z),
            ),
            LayoutElement::NorthWall => (
                Point3::new(self.x / 2.0, self.y, self.z / 2.0),
                Dimensions::new(self.x, 0.0, self.z),
            ),
            LayoutElement::WestWall => (
                Point3::new(0.0, self.y / 2.0, self.z / 2.0),
                Dimensions::new(self.y, 0.0, self.z),
            ),
            LayoutElement::EastWall => (
                Point3::new(self.x, self.y / 2.0, self.z / 2.0),
                Dimensions::new(self.y, 0.0, self.z),
            ),
            LayoutElement::Ceiling => (
                Point3::new(self.x / 2.0, self.y / 2.0, self.z),
                Dimensions::new(self.x, self.y, 0.0),
            ),
            LayoutElement::MiddleOfRoom => (
                Point3::new(self.x / 2.0, self.y / 2.0, 0.0),
                Dimensions::new(0.0, 0.0, 0.0),
            ),
        };
        let mut prior = SceneObject::new(element.id(), size);
        prior.rotation = Some(Rotation {
            z_angle: element.inward().angle(),
        });
        prior.position = Some(position.into());
        prior
    }

    pub fn priors(&self) -> Vec<SceneObject> {
        LayoutElement::ALL.iter().map(|e| self.prior(*e)).collect()
    }
}
