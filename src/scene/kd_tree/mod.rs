mod building;
mod printing;
mod ray_kd_tree_intersection;

use std::sync::Arc;

use index_vec::IndexVec;

use crate::geometry::{AAPlane, EPSILON, FloatType, Ray, WorldBox};

use super::{Object, Trace};

pub use printing::TreeStatistics;

/// Depth at which nodes stop splitting, regardless of how many objects they hold.
pub const DEFAULT_MAX_DEPTH: usize = 30;

/// Offset of the split plane above the median of object minimum corners.
/// Objects whose minimum lies exactly on the median end up on both sides.
pub const SPLIT_EPSILON: FloatType = 2.0 * EPSILON;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KdTreeSettings {
    pub max_depth: usize,
}

impl Default for KdTreeSettings {
    fn default() -> Self {
        KdTreeSettings {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Kd-tree over shared objects.
/// Objects straddling a split plane are referenced from both sides.
#[derive(Debug)]
pub struct KdTree<O: Object + ?Sized> {
    region: WorldBox,
    root: Option<NodeIdx>,
    settings: KdTreeSettings,

    nodes: IndexVec<NodeIdx, Node>,
    objects: IndexVec<ObjectIdx, Arc<O>>,
}

#[derive(Clone, Debug, PartialEq)]
enum Node {
    Inner {
        bounding_box: WorldBox,
        plane: AAPlane,
        /// Children below and above the plane, None if the side has no objects.
        children: [Option<NodeIdx>; 2],
    },
    Leaf {
        bounding_box: WorldBox,
        objects: Vec<ObjectIdx>,
    },
}

impl Node {
    fn bounding_box(&self) -> &WorldBox {
        match self {
            Node::Inner { bounding_box, .. } | Node::Leaf { bounding_box, .. } => bounding_box,
        }
    }
}

index_vec::define_index_type! {
    struct NodeIdx = u32;
}

index_vec::define_index_type! {
    struct ObjectIdx = u32;
}

impl<O: Object + ?Sized> KdTree<O> {
    /// Builds the tree with default settings over objects inside `region`.
    pub fn new(objects: Vec<Arc<O>>, region: WorldBox) -> Self {
        Self::build_with(objects, region, KdTreeSettings::default())
    }

    /// Region covered by the root node.
    pub fn region(&self) -> &WorldBox {
        &self.region
    }

    pub fn settings(&self) -> &KdTreeSettings {
        &self.settings
    }

    pub fn objects(&self) -> impl ExactSizeIterator<Item = &Arc<O>> {
        self.objects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

impl<O: Object + ?Sized> Object for KdTree<O> {
    fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        KdTree::get_trace(self, ray)
    }

    fn get_aabb(&self) -> WorldBox {
        self.region
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::{
        geometry::{RayIntersectionExt as _, WorldPoint, WorldVector},
        scene::{Cuboid, Primitive, Sphere, Surface, Triangle},
        util::Rgba,
    };

    use assert2::{assert, let_assert};
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn sphere(center: [FloatType; 3], radius: FloatType) -> Arc<Primitive> {
        Arc::new(Primitive::Sphere(Sphere {
            center: center.into(),
            radius,
            surface: Surface::WHITE,
        }))
    }

    fn union_of(objects: &[Arc<Primitive>]) -> WorldBox {
        WorldBox::from_boxes(objects.iter().map(|o| o.get_aabb())).unwrap_or_default()
    }

    /// Linear scan over all objects, the reference for indexed queries.
    fn brute_force_trace(objects: &[Arc<Primitive>], ray: &Ray) -> Option<Trace> {
        objects
            .iter()
            .filter_map(|o| o.get_trace(ray))
            .fold(None, |best: Option<Trace>, t| match best {
                Some(b) if b.distance <= t.distance => Some(b),
                _ => Some(t),
            })
    }

    #[test]
    fn unit_sphere_hit() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 5.0), WorldVector::new(0.0, 0.0, -1.0));
        let_assert!(Some(trace) = tree.get_trace(&ray));
        assert!((trace.distance - 4.0).abs() < 1e-9);
        assert!((trace.point - WorldPoint::new(0.0, 0.0, 1.0)).norm() < 1e-9);
    }

    #[test]
    fn unit_sphere_diverging_miss() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        let ray = Ray::new(WorldPoint::new(5.0, 5.0, 5.0), WorldVector::new(1.0, 1.0, 1.0));
        assert!(tree.get_trace(&ray).is_none());
    }

    #[test]
    fn far_box_is_found_behind_empty_near_side() {
        let red = Surface::diffuse(Rgba::new(1.0, 0.0, 0.0, 1.0));
        let blue = Surface::diffuse(Rgba::new(0.0, 0.0, 1.0, 1.0));
        let cuboid = |min: [FloatType; 3], surface| {
            let min = WorldPoint::from(min);
            Arc::new(Primitive::Cuboid(Cuboid {
                bounds: WorldBox::new(min, min + WorldVector::repeat(1.0)),
                surface,
            }))
        };
        let objects = vec![cuboid([0.0, 0.0, 0.0], red), cuboid([100.0, 0.0, 0.0], blue)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        // Passes along the first box's side without touching it, then hits the second one
        let ray = Ray::new(WorldPoint::new(-5.0, 0.5, 3.0), WorldVector::new(105.5, 0.0, -2.5));
        let_assert!(Some(trace) = tree.get_trace(&ray));
        assert!(trace.surface == blue);
        assert!(trace.point.x >= 100.0 - EPSILON);

        // Straight through both boxes, the first one wins
        let ray = Ray::new(WorldPoint::new(-5.0, 0.5, 0.5), WorldVector::new(1.0, 0.0, 0.0));
        let_assert!(Some(trace) = tree.get_trace(&ray));
        assert!(trace.surface == red);
        assert!((trace.distance - 5.0).abs() < 1e-9);

        // Straight through both boxes from the other side
        let ray = Ray::new(WorldPoint::new(200.0, 0.5, 0.5), WorldVector::new(-1.0, 0.0, 0.0));
        let_assert!(Some(trace) = tree.get_trace(&ray));
        assert!(trace.surface == blue);
        assert!((trace.distance - 99.0).abs() < 1e-9);
    }

    #[test]
    fn empty_tree() {
        let tree: KdTree<Primitive> = KdTree::new(Vec::new(), WorldBox::default());
        assert!(tree.is_empty());

        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 5.0), WorldVector::new(0.0, 0.0, -1.0));
        assert!(tree.get_trace(&ray).is_none());
    }

    #[test]
    fn ray_missing_region() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0), sphere([3.0, 0.0, 0.0], 1.0)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        let ray = Ray::new(WorldPoint::new(0.0, 10.0, 0.0), WorldVector::new(1.0, 0.0, 0.0));
        assert!(tree.get_trace(&ray).is_none());
    }

    #[test]
    fn ties_go_to_first_object() {
        let first = Surface::diffuse(Rgba::new(1.0, 0.0, 0.0, 1.0));
        let second = Surface::diffuse(Rgba::new(0.0, 1.0, 0.0, 1.0));
        let triangle = |surface| {
            Arc::new(Primitive::Triangle(Triangle::new(
                [-1.0, -1.0, 0.0].into(),
                [1.0, -1.0, 0.0].into(),
                [0.0, 1.0, 0.0].into(),
                surface,
            )))
        };
        let objects = vec![triangle(first), triangle(second)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 2.0), WorldVector::new(0.0, 0.0, -1.0));
        let_assert!(Some(trace) = tree.get_trace(&ray));
        assert!(trace.surface == first);
    }

    #[test]
    fn build_is_deterministic() {
        let objects: Vec<_> = (0..40)
            .map(|i| {
                let i = i as FloatType;
                sphere([(i * 7.3) % 11.0, (i * 3.1) % 5.0, (i * 1.7) % 13.0], 0.4)
            })
            .collect();
        let region = union_of(&objects);

        let a = KdTree::new(objects.clone(), region);
        let b = KdTree::new(objects, region);

        assert!(a.root == b.root);
        assert!(a.nodes == b.nodes);
    }

    #[test]
    fn depth_cap_is_respected() {
        // Identical objects can never be separated, only the depth cap stops the recursion
        let objects: Vec<_> = (0..8)
            .map(|i| sphere([i as FloatType * 1e-3, 0.0, 0.0], 1.0))
            .collect();
        let region = union_of(&objects);

        for max_depth in [0, 1, 2, 5] {
            let tree = KdTree::builder()
                .objects(objects.clone())
                .region(region)
                .max_depth(max_depth)
                .build();
            let stats = tree.statistics();
            assert!(stats.depth.max <= max_depth);
        }
    }

    #[test]
    fn zero_depth_is_single_leaf() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0), sphere([5.0, 0.0, 0.0], 1.0)];
        let tree = KdTree::builder().objects(objects).max_depth(0).build();

        let_assert!(Some(root) = tree.root);
        let_assert!(Node::Leaf { objects, .. } = &tree.nodes[root]);
        assert!(objects.len() == 2);
    }

    #[test]
    fn builder_defaults_region_to_objects() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0), sphere([5.0, 0.0, 0.0], 1.0)];
        let tree = KdTree::builder().objects(objects.clone()).build();

        assert!(*tree.region() == union_of(&objects));
        assert!(tree.settings().max_depth == DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn straddling_objects_are_shared() {
        let objects = vec![
            sphere([0.0, 0.0, 0.0], 1.0),
            sphere([1.0, 0.0, 0.0], 1.0),
            sphere([2.0, 0.0, 0.0], 1.0),
            sphere([3.0, 0.0, 0.0], 1.0),
        ];
        let tree = KdTree::new(objects.clone(), union_of(&objects));
        let stats = tree.statistics();

        assert!(tree.objects().len() == objects.len());
        assert!(stats.object_references > objects.len());
        // Leaves share the scene's objects instead of copying them
        assert!(Arc::strong_count(&objects[1]) == 2);
    }

    #[test]
    fn nested_tree_is_an_object() {
        let inner = KdTree::new(
            vec![sphere([0.0, 0.0, 0.0], 1.0), sphere([4.0, 0.0, 0.0], 1.0)],
            WorldBox::new([-1.0, -1.0, -1.0].into(), [5.0, 1.0, 1.0].into()),
        );
        let outer = KdTree::new(vec![Arc::new(inner)], WorldBox::new(
            [-1.0, -1.0, -1.0].into(),
            [5.0, 1.0, 1.0].into(),
        ));

        let ray = Ray::new(WorldPoint::new(4.0, 0.0, 5.0), WorldVector::new(0.0, 0.0, -1.0));
        let_assert!(Some(trace) = outer.get_trace(&ray));
        assert!((trace.distance - 4.0).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "neither child")]
    fn ray_missing_both_children_panics() {
        let objects = vec![sphere([0.0, 0.0, 0.0], 1.0), sphere([10.0, 0.0, 0.0], 1.0)];
        let mut tree = KdTree::new(objects.clone(), union_of(&objects));

        let_assert!(Some(root) = tree.root);
        let_assert!(Node::Inner { children: [Some(low), Some(high)], .. } = tree.nodes[root].clone());

        // Move both children away so that they no longer cover the root's box
        let far_away = WorldBox::new([100.0, 100.0, 100.0].into(), [101.0, 101.0, 101.0].into());
        for child in [low, high] {
            let (Node::Inner { bounding_box, .. } | Node::Leaf { bounding_box, .. }) =
                &mut tree.nodes[child];
            *bounding_box = far_away;
        }

        let ray = Ray::new(WorldPoint::new(0.0, 0.0, 5.0), WorldVector::new(0.0, 0.0, -1.0));
        let _ = tree.get_trace(&ray);
    }

    fn scene_strategy() -> impl Strategy<Value = Vec<Arc<Primitive>>> {
        let coordinate = -20.0..20.0f64;
        let sphere_strategy = (
            (coordinate.clone(), coordinate.clone(), coordinate.clone()),
            0.1..4.0f64,
        )
            .prop_map(|((x, y, z), r)| sphere([x, y, z], r));
        let triangle_strategy = proptest::array::uniform3((
            coordinate.clone(),
            coordinate.clone(),
            coordinate.clone(),
        ))
        .prop_map(|vertices| {
            Arc::new(Primitive::Triangle(Triangle {
                vertices: vertices.map(|(x, y, z)| WorldPoint::new(x, y, z)),
                surface: Surface::WHITE,
            }))
        });

        proptest::collection::vec(prop_oneof![3 => sphere_strategy, 1 => triangle_strategy], 1..60)
    }

    fn ray_strategy() -> impl Strategy<Value = Ray> {
        let coordinate = -40.0..40.0f64;
        (
            (coordinate.clone(), coordinate.clone(), coordinate.clone()),
            (coordinate.clone(), coordinate.clone(), coordinate),
        )
            .prop_filter_map("zero direction", |((ox, oy, oz), (tx, ty, tz))| {
                let origin = WorldPoint::new(ox, oy, oz);
                let direction = WorldPoint::new(tx, ty, tz) - origin;
                (direction.norm() > 1e-3).then(|| Ray::new(origin, direction))
            })
    }

    /// Indexed queries must agree with a linear scan over all objects.
    #[proptest(ProptestConfig::with_cases(64))]
    fn matches_brute_force(
        #[strategy(scene_strategy())] objects: Vec<Arc<Primitive>>,
        #[strategy(proptest::collection::vec(ray_strategy(), 32))] rays: Vec<Ray>,
    ) {
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        for ray in rays {
            let indexed = tree.get_trace(&ray);
            let expected = brute_force_trace(&objects, &ray);

            match (indexed, expected) {
                (None, None) => {}
                (Some(indexed), Some(expected)) => {
                    prop_assert!(
                        (indexed.distance - expected.distance).abs() < 1e-6,
                        "{} != {}",
                        indexed.distance,
                        expected.distance
                    );
                }
                (indexed, expected) => {
                    prop_assert!(false, "indexed {indexed:?}, expected {expected:?}");
                }
            }
        }
    }

    /// A ray that can only hit one object finds it at the object's own distance.
    #[proptest]
    fn single_object_distance(
        #[strategy((-20.0..20.0f64, -20.0..20.0f64, -20.0..20.0f64))] center: (
            FloatType,
            FloatType,
            FloatType,
        ),
        #[strategy(0.1..5.0f64)] radius: FloatType,
        #[strategy(ray_strategy())] ray: Ray,
    ) {
        let objects = vec![sphere([center.0, center.1, center.2], radius)];
        let tree = KdTree::new(objects.clone(), union_of(&objects));

        let direct = objects[0].get_trace(&ray).map(|t| t.distance);
        let indexed = tree.get_trace(&ray).map(|t| t.distance);
        match (direct, indexed) {
            (Some(a), Some(b)) => prop_assert!((a - b).abs() < 1e-9),
            (a, b) => prop_assert!(a.is_none() && b.is_none()),
        }
    }

    #[proptest]
    fn rays_missing_region_find_nothing(
        #[strategy(scene_strategy())] objects: Vec<Arc<Primitive>>,
        #[strategy(ray_strategy())] ray: Ray,
    ) {
        let region = union_of(&objects);
        prop_assume!(region.intersect(&ray).is_none());

        let tree = KdTree::new(objects, region);
        prop_assert!(tree.get_trace(&ray).is_none());
    }

    #[proptest(ProptestConfig::with_cases(32))]
    fn leaves_respect_depth_cap(
        #[strategy(scene_strategy())] objects: Vec<Arc<Primitive>>,
        #[strategy(0usize..12)] max_depth: usize,
    ) {
        let tree = KdTree::builder()
            .objects(objects)
            .max_depth(max_depth)
            .build();
        prop_assert!(tree.statistics().depth.max <= max_depth);
    }
}
