//! Bounding-volume hierarchy over a fixed set of boxes.
//!
//! The tree is built bottom-up once and never changes afterwards. Leaves are
//! ordered along a Morton (Z-order) curve of their box centres, then adjacent
//! entries are merged pairwise level by level until a single root remains. An
//! odd entry at the end of a level is carried up unchanged. Ties in the
//! Morton order fall back to the input position, so the same input always
//! produces the same tree.
//!
//! Leaves carry the index of the box in the slice passed to [`Bvh::build`];
//! callers map that back to their own items.

use crate::geometry::BoundingBox;

/// Quantization steps per axis for the Morton key.
const MORTON_STEPS: f64 = 65_535.0;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        bbox: BoundingBox,
        item: usize,
    },
    Internal {
        bbox: BoundingBox,
        left: usize,
        right: usize,
    },
}

impl Node {
    const fn bbox(&self) -> &BoundingBox {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => bbox,
        }
    }
}

/// A static bounding-volume hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Bvh {
    nodes: Vec<Node>,
    root: Option<usize>,
    leaves: usize,
}

impl Bvh {
    /// Build a hierarchy over `boxes`.
    pub fn build(boxes: &[BoundingBox]) -> Self {
        let Some(extent) = boxes
            .iter()
            .map(BoundingBox::center)
            .map(BoundingBox::from_point)
            .reduce(|acc, b| acc.union(&b))
        else {
            return Self::default();
        };

        let mut order: Vec<(u32, usize)> = boxes
            .iter()
            .enumerate()
            .map(|(i, b)| (morton_key(b, &extent), i))
            .collect();
        order.sort_unstable();

        let mut nodes: Vec<Node> = Vec::with_capacity(boxes.len().saturating_mul(2));
        let mut level: Vec<usize> = Vec::with_capacity(order.len());
        for (_, item) in order {
            if let Some(bbox) = boxes.get(item) {
                level.push(nodes.len());
                nodes.push(Node::Leaf { bbox: *bbox, item });
            }
        }

        while level.len() > 1 {
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in level.chunks(2) {
                match pair {
                    &[left, right] => {
                        let bbox = match (nodes.get(left), nodes.get(right)) {
                            (Some(l), Some(r)) => l.bbox().union(r.bbox()),
                            _ => continue,
                        };
                        next.push(nodes.len());
                        nodes.push(Node::Internal { bbox, left, right });
                    }
                    &[single] => next.push(single),
                    _ => {}
                }
            }
            level = next;
        }

        Self {
            root: level.first().copied(),
            leaves: boxes.len(),
            nodes,
        }
    }

    /// Number of leaves.
    pub const fn len(&self) -> usize {
        self.leaves
    }

    /// Whether the hierarchy holds no leaves.
    pub const fn is_empty(&self) -> bool {
        self.leaves == 0
    }

    /// The box enclosing every leaf.
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.root.and_then(|r| self.nodes.get(r)).map(|n| *n.bbox())
    }

    /// Indices of every leaf whose box intersects `query`, ascending.
    ///
    /// Subtrees whose box misses `query` are never visited.
    pub fn query(&self, query: &BoundingBox) -> Vec<usize> {
        let mut hits = Vec::new();
        let mut stack: Vec<usize> = self.root.into_iter().collect();

        while let Some(idx) = stack.pop() {
            let Some(node) = self.nodes.get(idx) else {
                continue;
            };
            if !node.bbox().intersects(query) {
                continue;
            }
            match node {
                Node::Leaf { item, .. } => hits.push(*item),
                Node::Internal { left, right, .. } => {
                    stack.push(*right);
                    stack.push(*left);
                }
            }
        }

        hits.sort_unstable();
        hits
    }

    /// Indices of every leaf intersecting any of `queries`, ascending and
    /// without duplicates.
    pub fn query_any(&self, queries: &[BoundingBox]) -> Vec<usize> {
        let mut hits: Vec<usize> = queries.iter().flat_map(|q| self.query(q)).collect();
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Height of the tree; 0 when empty, 1 for a single leaf.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut stack: Vec<(usize, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((idx, d)) = stack.pop() {
            deepest = deepest.max(d);
            if let Some(Node::Internal { left, right, .. }) = self.nodes.get(idx) {
                let child = d.saturating_add(1);
                stack.push((*left, child));
                stack.push((*right, child));
            }
        }
        deepest
    }
}

/// Morton key of a box centre, normalised against `extent`.
fn morton_key(bbox: &BoundingBox, extent: &BoundingBox) -> u32 {
    let c = bbox.center();
    let x = quantize(c.lon, extent.min_lon, extent.max_lon);
    let y = quantize(c.lat, extent.min_lat, extent.max_lat);
    spread_bits(x) | (spread_bits(y) << 1)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(value: f64, min: f64, max: f64) -> u16 {
    let span = max - min;
    if span.is_nan() || span <= 0.0 || !value.is_finite() {
        return 0;
    }
    (((value - min) / span) * MORTON_STEPS).round().clamp(0.0, MORTON_STEPS) as u16
}

/// Interleave the 16 bits of `v` with zeros.
fn spread_bits(v: u16) -> u32 {
    let mut x = u32::from(v);
    x = (x | (x << 8)) & 0x00FF_00FF;
    x = (x | (x << 4)) & 0x0F0F_0F0F;
    x = (x | (x << 2)) & 0x3333_3333;
    x = (x | (x << 1)) & 0x5555_5555;
    x
}
