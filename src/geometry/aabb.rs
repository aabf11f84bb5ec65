use thiserror::Error;

use super::{AAPlane, EPSILON, FloatType, WorldPoint, WorldVector};

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

#[derive(Copy, Clone, Debug, Error, PartialEq)]
#[error("Plane {plane:?} does not divide the box along its axis ({min} - {max})")]
pub struct CutError {
    pub plane: AAPlane,
    pub min: FloatType,
    pub max: FloatType,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl AABB<WorldPoint> {
    /// Box centered at `center`, extending `half_size` to every side.
    pub fn around(center: WorldPoint, half_size: WorldVector) -> Self {
        AABB {
            min: center - half_size,
            max: center + half_size,
        }
    }

    /// Smallest box containing all points, None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(AABB::new(first, first), |acc, p| acc.union_point(p)))
    }

    /// Smallest box containing all boxes, None if the iterator is empty.
    pub fn from_boxes(boxes: impl IntoIterator<Item = Self>) -> Option<Self> {
        boxes.into_iter().reduce(|a, b| a.union(&b))
    }

    pub fn union(&self, other: &Self) -> Self {
        AABB {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn union_point(&self, point: &WorldPoint) -> Self {
        AABB {
            min: self.min.inf(point),
            max: self.max.sup(point),
        }
    }

    pub fn size(&self) -> WorldVector {
        self.max - self.min
    }

    pub fn center(&self) -> WorldPoint {
        nalgebra::center(&self.min, &self.max)
    }

    /// Inclusive containment test, tolerant to `EPSILON` on every side.
    pub fn contain(&self, point: &WorldPoint) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] - EPSILON && point[i] <= self.max[i] + EPSILON)
    }

    /// True if the boxes overlap, touching faces count as overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        (0..3).all(|i| self.min[i] <= other.max[i] && other.min[i] <= self.max[i])
    }

    /// Splits the box into the part below and the part above the plane.
    /// Fails if the plane does not lie strictly inside the box extent along its axis,
    /// because one of the halves would then be the whole box again.
    pub fn cut(&self, plane: &AAPlane) -> Result<(Self, Self), CutError> {
        let axis = plane.axis.index();
        let (min, max) = (self.min[axis], self.max[axis]);

        if !(plane.offset > min && plane.offset < max) {
            return Err(CutError {
                plane: *plane,
                min,
                max,
            });
        }

        let mut low = *self;
        let mut high = *self;
        low.max[axis] = plane.offset;
        high.min[axis] = plane.offset;

        Ok((low, high))
    }
}
