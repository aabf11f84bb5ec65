use assert2::debug_assert;

use super::{KdTree, Node, NodeIdx, Object, ObjectIdx};
use crate::{
    geometry::{EPSILON, FloatType, Ray, RayIntersectionExt as _},
    scene::Trace,
};

impl<O: Object + ?Sized> KdTree<O> {
    /// Nearest object hit by the ray, in front of the ray origin.
    pub fn get_trace(&self, ray: &Ray) -> Option<Trace> {
        let root = self.root?;
        let (entry, _exit) = self.nodes[root].bounding_box().intersect(ray)?;
        self.query(root, ray, entry)
    }

    /// Searches the subtree of `node_index`, which the ray enters at `entry_distance`.
    /// Children are visited near side first, the far side is only searched
    /// when the near side has no hit inside its own box.
    fn query(&self, node_index: NodeIdx, ray: &Ray, entry_distance: FloatType) -> Option<Trace> {
        match &self.nodes[node_index] {
            Node::Leaf { objects, .. } => self.nearest_in_leaf(objects, ray),
            Node::Inner {
                plane, children, ..
            } => {
                let entry_point = ray.point_at(entry_distance);
                let near_side = usize::from(plane.is_above(&entry_point));
                let far_side = 1 - near_side;

                let near = self.child_entry(children[near_side], ray);
                let far = self.child_entry(children[far_side], ray);

                if let (Some((_, near_entry)), Some((_, far_entry))) = (near, far) {
                    debug_assert!(near_entry <= far_entry + EPSILON);
                }

                if near.is_none() && far.is_none() {
                    // The children split this node's box exactly, so a ray that hit the
                    // node must hit one of them. Only absent children may be skipped.
                    ::std::assert!(
                        children[0].is_none() || children[1].is_none(),
                        "ray {ray:?} entered node {node_index:?} but neither child"
                    );
                    return None;
                }

                [near, far]
                    .into_iter()
                    .flatten()
                    .find_map(|(child, child_entry)| {
                        let child_box = self.nodes[child].bounding_box();
                        self.query(child, ray, child_entry)
                            .filter(|trace| child_box.contain(&trace.point))
                    })
            }
        }
    }

    fn child_entry(&self, child: Option<NodeIdx>, ray: &Ray) -> Option<(NodeIdx, FloatType)> {
        let child = child?;
        let (entry, _exit) = self.nodes[child].bounding_box().intersect(ray)?;
        Some((child, entry))
    }

    /// Smallest positive distance wins, the first listed object wins ties.
    fn nearest_in_leaf(&self, objects: &[ObjectIdx], ray: &Ray) -> Option<Trace> {
        objects
            .iter()
            .filter_map(|&index| self.objects[index].get_trace(ray))
            .filter(|trace| trace.distance > 0.0)
            .fold(None, |best: Option<Trace>, trace| match best {
                Some(best) if best.distance <= trace.distance => Some(best),
                _ => Some(trace),
            })
    }
}
