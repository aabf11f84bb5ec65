use nalgebra::Unit;

use crate::geometry::{
    EPSILON, FloatType, Ray, RayIntersectionExt as _, WorldBox, WorldPoint, WorldVector,
};

use super::{Mesh, Object, Surface, Trace};

#[derive(Copy, Clone, Debug)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
    pub surface: Surface,
}

impl Object for Sphere {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        let oc = ray.origin - self.center;
        let b = oc.dot(ray.direction.as_ref());
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = -b - sqrt_disc;
        let t2 = -b + sqrt_disc;
        let t = if t1 > 0.0 {
            t1
        } else if t2 > 0.0 {
            t2
        } else {
            return None;
        };

        let point = ray.point_at(t);
        let normal = Unit::new_normalize(point - self.center);

        Some(Trace {
            distance: t,
            point,
            normal,
            surface: self.surface,
        })
    }

    fn get_aabb(&self) -> WorldBox {
        WorldBox::around(self.center, WorldVector::repeat(self.radius))
    }
}

/// Solid axis aligned box.
#[derive(Copy, Clone, Debug)]
pub struct Cuboid {
    pub bounds: WorldBox,
    pub surface: Surface,
}

impl Object for Cuboid {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        let (t1, t2) = self.bounds.intersect(ray)?;
        // Rays starting inside hit the far wall
        let t = if t1 > 0.0 { t1 } else { t2 };
        if t <= 0.0 {
            return None;
        }

        let point = ray.point_at(t);

        // Normal of the face closest to the hit point
        let to_min = point - self.bounds.min;
        let to_max = self.bounds.max - point;
        let (axis, sign) = (0..3)
            .flat_map(|i| [(i, -1.0, to_min[i].abs()), (i, 1.0, to_max[i].abs())])
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(i, sign, _)| (i, sign))
            .unwrap_or((0, 1.0));
        let mut normal = WorldVector::zeros();
        normal[axis] = sign;

        Some(Trace {
            distance: t,
            point,
            normal: Unit::new_unchecked(normal),
            surface: self.surface,
        })
    }

    fn get_aabb(&self) -> WorldBox {
        self.bounds
    }
}

/// Two sided triangle.
#[derive(Copy, Clone, Debug)]
pub struct Triangle {
    pub vertices: [WorldPoint; 3],
    pub surface: Surface,
}

impl Triangle {
    pub fn new(a: WorldPoint, b: WorldPoint, c: WorldPoint, surface: Surface) -> Triangle {
        Triangle {
            vertices: [a, b, c],
            surface,
        }
    }

    pub fn normal(&self) -> Unit<WorldVector> {
        let [a, b, c] = self.vertices;
        Unit::new_normalize((b - a).cross(&(c - a)))
    }
}

impl Triangle {
    /// Distance to the hit along the ray and the barycentric coordinates
    /// of the hit relative to the second and third vertex.
    ///
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType, FloatType)> {
        let [a, b, c] = self.vertices;
        let e1 = b - a;
        let e2 = c - a;

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);
        if det.abs() < FloatType::EPSILON {
            // Parallel with the triangle
            return None;
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - a;
        let u = inv_det * s.dot(&ray_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * e2.dot(&s_cross_e1);
        if t <= EPSILON {
            return None;
        }

        Some((t, u, v))
    }
}

impl Object for Triangle {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        let (t, _u, _v) = self.intersect(ray)?;
        Some(Trace::new(ray, t, self.normal(), self.surface))
    }

    fn get_aabb(&self) -> WorldBox {
        WorldBox::from_points(&self.vertices).unwrap_or_default()
    }
}

/// Closed set of primitives that a scene is made of.
#[derive(Debug)]
pub enum Primitive {
    Sphere(Sphere),
    Cuboid(Cuboid),
    Triangle(Triangle),
    Mesh(Mesh),
}

impl Object for Primitive {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        match self {
            Primitive::Sphere(sphere) => sphere.get_trace(ray),
            Primitive::Cuboid(cuboid) => cuboid.get_trace(ray),
            Primitive::Triangle(triangle) => triangle.get_trace(ray),
            Primitive::Mesh(mesh) => mesh.get_trace(ray),
        }
    }

    fn get_aabb(&self) -> WorldBox {
        match self {
            Primitive::Sphere(sphere) => sphere.get_aabb(),
            Primitive::Cuboid(cuboid) => cuboid.get_aabb(),
            Primitive::Triangle(triangle) => triangle.get_aabb(),
            Primitive::Mesh(mesh) => mesh.get_aabb(),
        }
    }
}

impl From<Sphere> for Primitive {
    fn from(value: Sphere) -> Self {
        Primitive::Sphere(value)
    }
}

impl From<Cuboid> for Primitive {
    fn from(value: Cuboid) -> Self {
        Primitive::Cuboid(value)
    }
}

impl From<Triangle> for Primitive {
    fn from(value: Triangle) -> Self {
        Primitive::Triangle(value)
    }
}

impl From<Mesh> for Primitive {
    fn from(value: Mesh) -> Self {
        Primitive::Mesh(value)
    }
}
