pub mod kd_tree;
pub mod mesh;
pub mod primitives;

use nalgebra::Unit;

use crate::{
    geometry::{FloatType, Ray, WorldBox, WorldPoint, WorldVector},
    util::Rgba,
};

pub use kd_tree::{KdTree, KdTreeSettings, TreeStatistics};
pub use mesh::{Mesh, MeshFace, MeshVertex, ObjOpenError};
pub use primitives::{Cuboid, Primitive, Sphere, Triangle};

/// Renderable object
pub trait Object {
    /// Nearest intersection of the ray with the object in front of the ray origin.
    fn get_trace(&self, ray: &Ray) -> Option<Trace>;

    /// Box bounding everything `get_trace` may ever return.
    fn get_aabb(&self) -> WorldBox;
}

impl<O: Object + ?Sized> Object for std::sync::Arc<O> {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        (**self).get_trace(ray)
    }

    fn get_aabb(&self) -> WorldBox {
        (**self).get_aabb()
    }
}

/// Result of a successful ray-object intersection test.
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    /// Distance along the ray
    pub distance: FloatType,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    pub surface: Surface,
}

impl Trace {
    pub fn new(ray: &Ray, distance: FloatType, normal: Unit<WorldVector>, surface: Surface) -> Self {
        Trace {
            distance,
            point: ray.point_at(distance),
            normal,
            surface,
        }
    }
}

/// Shading properties at the intersection point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Surface {
    pub diffuse: Rgba,
    pub emission: Rgba,
}

impl Surface {
    pub const WHITE: Surface = Surface::diffuse(Rgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    });

    pub const fn diffuse(color: Rgba) -> Surface {
        Surface {
            diffuse: color,
            emission: Rgba {
                r: 0.0,
                g: 0.0,
                b: 0.0,
                a: 0.0,
            },
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Surface::WHITE
    }
}

/// Objects indexed for ray queries, with the minimal shading rule used for previews.
pub struct Scene<O: Object + ?Sized> {
    pub tree: KdTree<O>,
    pub background: Rgba,
}

impl<O: Object + ?Sized> Scene<O> {
    pub fn new(tree: KdTree<O>) -> Self {
        Scene {
            tree,
            background: Rgba::new(0.0, 0.0, 0.0, 1.0),
        }
    }

    /// Head-light shading: surfaces facing the ray are lit, background on miss.
    pub fn color_for(&self, ray: &Ray) -> Rgba {
        let Some(trace) = self.tree.get_trace(ray) else {
            return self.background;
        };

        let facing = ray.direction.dot(trace.normal.as_ref()).abs() as f32;
        let Surface { diffuse, emission } = trace.surface;
        Rgba::new(
            diffuse.r * facing + emission.r,
            diffuse.g * facing + emission.g,
            diffuse.b * facing + emission.b,
            1.0,
        )
    }
}
