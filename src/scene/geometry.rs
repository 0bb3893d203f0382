//! Interval and axis-aligned box arithmetic
//!
//! Every coordinate in the engine uses the same axis order:
//! x runs west to east, y runs south to north (room depth), z is vertical.

use std::fmt;

/// Tolerance used for degeneracy and touching tests
pub const EPSILON: f64 = 1e-6;

/// One of the three world axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

/// A closed interval `[min, max]` on one axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A degenerate interval holding a single value
    pub fn point(value: f64) -> Self {
        Self::new(value, value)
    }

    /// An interval that places no restriction on its axis
    pub fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    /// `[max(minA, minB), min(maxA, maxB)]`; may be inverted
    pub fn intersect(&self, other: &Interval) -> Interval {
        Interval::new(self.min.max(other.min), self.max.min(other.max))
    }

    /// True when the interval is inverted beyond tolerance
    pub fn is_empty(&self) -> bool {
        self.min > self.max + EPSILON
    }

    pub fn is_point(&self) -> bool {
        !self.is_empty() && (self.max - self.min).abs() <= EPSILON
    }

    pub fn length(&self) -> f64 {
        (self.max - self.min).max(0.0)
    }

    pub fn center(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min - EPSILON && value <= self.max + EPSILON
    }

    /// True when the two intervals share more than a touching boundary
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.min.max(other.min) < self.max.min(other.max) - EPSILON
    }

    /// Nearest value inside the interval
    pub fn clamp(&self, value: f64) -> f64 {
        if self.is_empty() {
            return self.center();
        }
        value.max(self.min).min(self.max)
    }
}

/// A 3D point, used for object centers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// An axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

impl Aabb {
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Box centered on `center` with the given half sizes per axis
    pub fn from_center(center: Point3, half: [f64; 3]) -> Self {
        Self::new(
            Interval::new(center.x - half[0], center.x + half[0]),
            Interval::new(center.y - half[1], center.y + half[1]),
            Interval::new(center.z - half[2], center.z + half[2]),
        )
    }

    /// A degenerate box at a single point
    pub fn point(p: Point3) -> Self {
        Self::from_center(p, [0.0; 3])
    }

    pub fn unbounded() -> Self {
        Self::new(
            Interval::unbounded(),
            Interval::unbounded(),
            Interval::unbounded(),
        )
    }

    pub fn axis(&self, axis: Axis) -> Interval {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut Interval {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// Replace one axis interval, returning the modified box
    pub fn with_axis(mut self, axis: Axis, interval: Interval) -> Self {
        *self.axis_mut(axis) = interval;
        self
    }

    /// Per-axis intersection.
    ///
    /// Returns `None` when any axis interval is inverted, i.e. the boxes are disjoint.
    pub fn intersect(&self, other: &Aabb) -> Option<Aabb> {
        let result = Aabb::new(
            self.x.intersect(&other.x),
            self.y.intersect(&other.y),
            self.z.intersect(&other.z),
        );
        if result.first_empty_axis().is_some() {
            None
        } else {
            Some(result)
        }
    }

    /// The first axis whose interval is inverted, if any
    pub fn first_empty_axis(&self) -> Option<Axis> {
        Axis::ALL.into_iter().find(|a| self.axis(*a).is_empty())
    }

    /// True iff min == max on every axis
    pub fn is_point(&self) -> bool {
        self.x.is_point() && self.y.is_point() && self.z.is_point()
    }

    pub fn center(&self) -> Point3 {
        Point3::new(self.x.center(), self.y.center(), self.z.center())
    }

    /// True when `other` lies entirely inside this box
    pub fn contains(&self, other: &Aabb) -> bool {
        Axis::ALL.into_iter().all(|a| {
            let outer = self.axis(a);
            let inner = other.axis(a);
            inner.min >= outer.min - EPSILON && inner.max <= outer.max + EPSILON
        })
    }

    pub fn contains_point(&self, p: Point3) -> bool {
        Axis::ALL.into_iter().all(|a| self.axis(a).contains(p.get(a)))
    }

    /// True when the boxes share volume; touching faces do not count
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.x.overlaps(&other.x) && self.y.overlaps(&other.y) && self.z.overlaps(&other.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(min: f64, max: f64) -> Aabb {
        Aabb::new(
            Interval::new(min, max),
            Interval::new(min, max),
            Interval::new(min, max),
        )
    }

    #[test]
    fn test_interval_intersection() {
        let a = Interval::new(0.0, 2.0);
        let b = Interval::new(1.0, 3.0);
        assert_eq!(a.intersect(&b), Interval::new(1.0, 2.0));
        assert!(a.intersect(&Interval::new(2.5, 3.0)).is_empty());
    }

    #[test]
    fn test_interval_point() {
        assert!(Interval::point(1.5).is_point());
        assert!(!Interval::new(1.0, 1.1).is_point());
        assert!(!Interval::new(2.0, 1.0).is_point());
    }

    #[test]
    fn test_interval_clamp() {
        let i = Interval::new(1.0, 2.0);
        assert_eq!(i.clamp(0.0), 1.0);
        assert_eq!(i.clamp(1.5), 1.5);
        assert_eq!(i.clamp(9.0), 2.0);
    }

    #[test]
    fn test_touching_intervals_do_not_overlap() {
        let a = Interval::new(0.0, 1.0);
        let b = Interval::new(1.0, 2.0);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Interval::new(0.9, 2.0)));
    }

    #[test]
    fn test_box_intersection() {
        let a = cube(0.0, 2.0);
        let b = cube(1.0, 3.0);
        assert_eq!(a.intersect(&b), Some(cube(1.0, 2.0)));
    }

    #[test]
    fn test_disjoint_boxes_have_no_intersection() {
        let a = cube(0.0, 1.0);
        let b = Aabb::new(
            Interval::new(0.0, 1.0),
            Interval::new(5.0, 6.0),
            Interval::new(0.0, 1.0),
        );
        assert!(a.intersect(&b).is_none());
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_point_box() {
        let p = Aabb::point(Point3::new(1.0, 2.0, 3.0));
        assert!(p.is_point());
        assert!(!cube(0.0, 1.0).is_point());

        // A line segment is not a point
        let line = Aabb::point(Point3::new(1.0, 2.0, 3.0)).with_axis(Axis::X, Interval::new(0.0, 4.0));
        assert!(!line.is_point());
        assert_eq!(line.first_empty_axis(), None);
    }

    #[test]
    fn test_box_containment() {
        let room = cube(0.0, 10.0);
        assert!(room.contains(&cube(1.0, 2.0)));
        assert!(room.contains(&room));
        assert!(!room.contains(&cube(9.0, 11.0)));
    }

    #[test]
    fn test_from_center() {
        let b = Aabb::from_center(Point3::new(1.0, 1.0, 0.5), [0.5, 0.25, 0.5]);
        assert_eq!(b.x, Interval::new(0.5, 1.5));
        assert_eq!(b.y, Interval::new(0.75, 1.25));
        assert_eq!(b.z, Interval::new(0.0, 1.0));
        assert_eq!(b.center(), Point3::new(1.0, 1.0, 0.5));
    }
}
