use std::sync::Arc;

use bon::bon;
use index_vec::IndexVec;
use ordered_float::OrderedFloat;

use crate::geometry::{AAPlane, Axis, WorldBox};

use super::{
    DEFAULT_MAX_DEPTH, KdTree, KdTreeSettings, Node, NodeIdx, ObjectIdx, Object, SPLIT_EPSILON,
};

/// Object reference together with its precomputed bounding box.
/// Only lives during the build.
#[derive(Copy, Clone, Debug)]
struct RenderWrapper {
    index: ObjectIdx,
    bounding_box: WorldBox,
}

#[bon]
impl<O: Object + ?Sized> KdTree<O> {
    /// Builds the tree with explicit settings.
    /// When `region` is not given, the union of the objects' boxes is used.
    #[builder(start_fn = builder, finish_fn = build)]
    pub fn with_settings(
        objects: Vec<Arc<O>>,
        region: Option<WorldBox>,
        #[builder(default = DEFAULT_MAX_DEPTH)] max_depth: usize,
    ) -> Self {
        let region = region.unwrap_or_else(|| {
            WorldBox::from_boxes(objects.iter().map(|o| o.get_aabb())).unwrap_or_default()
        });
        Self::build_with(objects, region, KdTreeSettings { max_depth })
    }
}

impl<O: Object + ?Sized> KdTree<O> {
    #[tracing::instrument(skip_all, fields(object_count = objects.len()))]
    pub(super) fn build_with(objects: Vec<Arc<O>>, region: WorldBox, settings: KdTreeSettings) -> Self {
        let objects: IndexVec<ObjectIdx, Arc<O>> = IndexVec::from_vec(objects);
        let wrappers: Vec<RenderWrapper> = objects
            .iter_enumerated()
            .map(|(index, object)| RenderWrapper {
                index,
                bounding_box: object.get_aabb(),
            })
            .collect();

        let mut tree = KdTree {
            region,
            root: None,
            settings,
            nodes: IndexVec::new(),
            objects,
        };
        tree.root = tree.build_recursive(&wrappers, region, 0);

        let stats = tree.statistics();
        tracing::info!(
            nodes = tree.nodes.len(),
            leaves = stats.leaf_count,
            depth = stats.depth.max,
            references = stats.object_references,
            "kd-tree built"
        );

        tree
    }

    fn build_recursive(
        &mut self,
        objects: &[RenderWrapper],
        region: WorldBox,
        depth: usize,
    ) -> Option<NodeIdx> {
        if objects.is_empty() {
            return None;
        }

        if depth >= self.settings.max_depth {
            return Some(self.push_leaf(objects, region));
        }

        let plane = split_plane(objects, depth);
        let (low_region, high_region) = match region.cut(&plane) {
            Ok(halves) => halves,
            Err(e) => {
                tracing::trace!(depth, "{e}, keeping a leaf");
                return Some(self.push_leaf(objects, region));
            }
        };

        // Objects overlapping both halves go to both children
        let low: Vec<RenderWrapper> = objects
            .iter()
            .filter(|o| o.bounding_box.intersects(&low_region))
            .copied()
            .collect();
        let high: Vec<RenderWrapper> = objects
            .iter()
            .filter(|o| o.bounding_box.intersects(&high_region))
            .copied()
            .collect();
        tracing::trace!(depth, low = low.len(), high = high.len(), "split");

        // Create placeholder node that will be overwritten later
        let node_index = self.nodes.push(Node::Leaf {
            bounding_box: region,
            objects: Vec::new(),
        });

        let children = [
            self.build_recursive(&low, low_region, depth + 1),
            self.build_recursive(&high, high_region, depth + 1),
        ];

        self.nodes[node_index] = Node::Inner {
            bounding_box: region,
            plane,
            children,
        };

        Some(node_index)
    }

    fn push_leaf(&mut self, objects: &[RenderWrapper], region: WorldBox) -> NodeIdx {
        self.nodes.push(Node::Leaf {
            bounding_box: region,
            objects: objects.iter().map(|o| o.index).collect(),
        })
    }
}

/// Plane on the axis for this depth, slightly above the median of the objects' minimum corners.
fn split_plane(objects: &[RenderWrapper], depth: usize) -> AAPlane {
    let axis = Axis::for_depth(depth);

    let mut min_list: Vec<OrderedFloat<_>> = objects
        .iter()
        .map(|o| OrderedFloat(o.bounding_box.min[axis.index()]))
        .collect();
    let middle = min_list.len() / 2;
    let (_, median, _) = min_list.select_nth_unstable(middle);

    AAPlane::new(axis, median.0 + SPLIT_EPSILON)
}
