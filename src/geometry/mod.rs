mod aabb;
mod ray_box_intersection;

use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

pub use aabb::{AABB, CutError};
pub use ray_box_intersection::RayIntersectionExt;

pub type FloatType = f64;

/// Tolerance used for box containment and for biasing split planes.
pub const EPSILON: FloatType = 1e-6;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = Vector2<u32>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = Unit::new_normalize(direction);
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// Axis used for splitting at given tree depth, cycling X, Y, Z.
    pub fn for_depth(depth: usize) -> Axis {
        match depth % 3 {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Axis aligned plane, `{p | p[axis] == offset}`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AAPlane {
    pub axis: Axis,
    pub offset: FloatType,
}

impl AAPlane {
    pub fn new(axis: Axis, offset: FloatType) -> AAPlane {
        AAPlane { axis, offset }
    }

    /// True if the point lies on the high side of the plane (or on the plane itself).
    pub fn is_above(&self, point: &WorldPoint) -> bool {
        point[self.axis.index()] >= self.offset
    }
}
