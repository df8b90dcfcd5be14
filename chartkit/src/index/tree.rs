//! Bulk-loaded bounding-box tree.
//!
//! Built bottom-up with sort-tile-recursive packing: at every level the
//! entries are sorted by the centre of their bounds along one axis, cut into
//! vertical slabs, each slab sorted along the other axis and cut into nodes
//! of `fanout` entries. The axis alternates per level. Every leaf sits at the
//! same depth; only the last node of each slab may be partly filled.

use crate::feature::Feature;
use crate::geo::Bounds;

use super::SpatialIndex;

/// Fanout used by [`TreeIndex::build`].
pub const DEFAULT_FANOUT: usize = 16;
/// Smallest accepted fanout.
pub const MIN_FANOUT: usize = 8;
/// Largest accepted fanout.
pub const MAX_FANOUT: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    fn key(self, bounds: &Bounds) -> f64 {
        match self {
            Axis::Latitude => (bounds.north + bounds.south) / 2.0,
            Axis::Longitude => (bounds.east + bounds.west) / 2.0,
        }
    }

    fn other(self) -> Self {
        match self {
            Axis::Latitude => Axis::Longitude,
            Axis::Longitude => Axis::Latitude,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf { bounds: Bounds, entries: Vec<usize> },
    Internal { bounds: Bounds, children: Vec<Node> },
}

impl Node {
    fn bounds(&self) -> Bounds {
        match self {
            Node::Leaf { bounds, .. } | Node::Internal { bounds, .. } => *bounds,
        }
    }
}

/// Bounding-box tree over a fixed feature set.
///
/// # Example
///
/// ```ignore
/// use chartkit::geo::Bounds;
/// use chartkit::index::{SpatialIndex, TreeIndex};
///
/// let index = TreeIndex::build(features);
/// let visible = index.query_bounds(&Bounds::new(42.40, 42.30, -70.95, -71.10));
/// ```
#[derive(Debug, Clone)]
pub struct TreeIndex {
    features: Vec<Feature>,
    root: Option<Node>,
    fanout: usize,
}

impl TreeIndex {
    /// Bulk-load with a custom fanout, clamped to
    /// [`MIN_FANOUT`]..=[`MAX_FANOUT`].
    pub fn with_fanout(features: Vec<Feature>, fanout: usize) -> Self {
        let fanout = fanout.clamp(MIN_FANOUT, MAX_FANOUT);
        let bounds: Vec<Bounds> = features.iter().map(Feature::bounds).collect();

        let mut nodes: Vec<Node> = pack(
            (0..features.len()).collect(),
            fanout,
            Axis::Longitude,
            |&i| bounds[i],
        )
        .into_iter()
        .map(|entries| Node::Leaf {
            bounds: union_all(entries.iter().map(|&i| bounds[i])),
            entries,
        })
        .collect();

        let mut axis = Axis::Latitude;
        while nodes.len() > 1 {
            nodes = pack(nodes, fanout, axis, Node::bounds)
                .into_iter()
                .map(|children| Node::Internal {
                    bounds: union_all(children.iter().map(Node::bounds)),
                    children,
                })
                .collect();
            axis = axis.other();
        }

        let index = Self {
            features,
            root: nodes.pop(),
            fanout,
        };
        tracing::debug!(
            features = index.features.len(),
            fanout,
            depth = index.depth(),
            nodes = index.node_count(),
            "Bulk-loaded tree index"
        );
        index
    }

    /// Maximum number of entries per node.
    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Number of levels, leaves included. Zero when empty.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut node = self.root.as_ref();
        while let Some(n) = node {
            depth += 1;
            node = match n {
                Node::Leaf { .. } => None,
                Node::Internal { children, .. } => children.first(),
            };
        }
        depth
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Internal { children, .. } => 1 + children.iter().map(count).sum::<usize>(),
            }
        }
        self.root.as_ref().map_or(0, count)
    }

    fn search(&self, node: &Node, query: &Bounds, hits: &mut Vec<usize>) {
        match node {
            Node::Leaf { entries, .. } => {
                hits.extend(
                    entries
                        .iter()
                        .copied()
                        .filter(|&i| self.features[i].bounds().intersects(query)),
                );
            }
            Node::Internal { children, .. } => {
                for child in children {
                    if child.bounds().intersects(query) {
                        self.search(child, query, hits);
                    }
                }
            }
        }
    }
}

impl SpatialIndex for TreeIndex {
    fn build(features: Vec<Feature>) -> Self {
        Self::with_fanout(features, DEFAULT_FANOUT)
    }

    fn query_bounds(&self, bounds: &Bounds) -> Vec<&Feature> {
        let Some(root) = &self.root else {
            return Vec::new();
        };
        if !root.bounds().intersects(bounds) {
            return Vec::new();
        }
        let mut hits = Vec::new();
        self.search(root, bounds, &mut hits);
        hits.sort_unstable();
        hits.into_iter().map(|i| &self.features[i]).collect()
    }

    fn calculate_bounds(&self) -> Option<Bounds> {
        self.root.as_ref().map(Node::bounds)
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }
}

/// Group `items` into runs of at most `fanout`, tiled along `axis` first.
fn pack<T>(
    mut items: Vec<T>,
    fanout: usize,
    axis: Axis,
    bounds_of: impl Fn(&T) -> Bounds,
) -> Vec<Vec<T>> {
    let parents = items.len().div_ceil(fanout);
    let slabs = (parents as f64).sqrt().ceil().max(1.0) as usize;
    let slab_len = slabs * fanout;

    let by = |axis: Axis| {
        let bounds_of = &bounds_of;
        move |a: &T, b: &T| axis.key(&bounds_of(a)).total_cmp(&axis.key(&bounds_of(b)))
    };

    items.sort_by(by(axis));

    let mut groups = Vec::with_capacity(parents);
    while !items.is_empty() {
        let rest = items.split_off(slab_len.min(items.len()));
        let mut slab = std::mem::replace(&mut items, rest);
        slab.sort_by(by(axis.other()));
        while !slab.is_empty() {
            let rest = slab.split_off(fanout.min(slab.len()));
            groups.push(std::mem::replace(&mut slab, rest));
        }
    }
    groups
}

fn union_all(mut bounds: impl Iterator<Item = Bounds>) -> Bounds {
    let first = bounds.next().unwrap_or_else(|| Bounds::new(0.0, 0.0, 0.0, 0.0));
    bounds.fold(first, |acc, b| acc.union(&b))
}
