use crate::util::Stats;

use super::{KdTree, Node, NodeIdx, Object};

/// Shape summary of a built tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of leaves, root has depth 0
    pub depth: Stats,
    /// Number of objects referenced from each leaf
    pub leaf_size: Stats,
    /// Sum of leaf sizes, larger than the object count when objects straddle split planes
    pub object_references: usize,
}

impl<O: Object + ?Sized> KdTree<O> {
    pub fn statistics(&self) -> TreeStatistics {
        let mut stats = TreeStatistics {
            node_count: self.nodes.len(),
            ..TreeStatistics::default()
        };
        if let Some(root) = self.root {
            self.statistics_recursive(root, 0, &mut stats);
        }
        stats
    }

    fn statistics_recursive(&self, node: NodeIdx, depth: usize, stats: &mut TreeStatistics) {
        match &self.nodes[node] {
            Node::Inner { children, .. } => {
                for child in children.iter().flatten() {
                    self.statistics_recursive(*child, depth + 1, stats);
                }
            }
            Node::Leaf { objects, .. } => {
                stats.leaf_count += 1;
                stats.depth.add_sample(depth);
                stats.leaf_size.add_sample(objects.len());
                stats.object_references += objects.len();
            }
        }
    }

    pub fn print_tree(&self) {
        match self.root {
            Some(root) => self.print_recursive(0, root),
            None => println!("<EMPTY>"),
        }
    }

    pub fn print_statistics(&self) {
        let stats = self.statistics();
        println!("Objects: {}", self.objects.len());
        println!("Nodes: {}; leaves: {}", stats.node_count, stats.leaf_count);
        println!("Leaf depth: {}", stats.depth);
        println!("Leaf size: {}", stats.leaf_size);
        println!("Object references: {}", stats.object_references);
    }

    fn print_recursive(&self, indent: usize, node: NodeIdx) {
        let prefix = "  ".repeat(indent);
        match &self.nodes[node] {
            Node::Inner {
                bounding_box,
                plane,
                children,
            } => {
                println!(
                    "{prefix}- I{}: {:?}-{:?}, split {:?} at {}",
                    node.index(),
                    bounding_box.min,
                    bounding_box.max,
                    plane.axis,
                    plane.offset
                );
                for child in children {
                    match child {
                        Some(child) => self.print_recursive(indent + 1, *child),
                        None => println!("{prefix}  - <EMPTY>"),
                    }
                }
            }
            Node::Leaf {
                bounding_box,
                objects,
            } => {
                println!(
                    "{prefix}- L{}: {:?}-{:?}, objects {:?}",
                    node.index(),
                    bounding_box.min,
                    bounding_box.max,
                    objects.iter().map(|o| o.index()).collect::<Vec<_>>()
                );
            }
        }
    }
}
