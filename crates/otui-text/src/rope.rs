#![forbid(unsafe_code)]

//! A balanced tree of segments with metric aggregation and marker
//! indexing.
//!
//! [`Rope<T>`] stores a sequence of segments. Every internal node caches
//! the sum of its subtree's [`Metrics`] and, for each of the segment
//! type's marker variants, the count of marked segments below it. That
//! buys:
//!
//! - `marker_count(variant)` in O(1) (read at the root)
//! - `get_marker(variant, n)` in O(log n) (count-guided descent)
//! - `find_by_metric(pred)` in O(log n) (monotone metric descent)
//!
//! # Structure
//!
//! A B-tree-ish shape: leaves hold up to [`MAX_LEAF`] segments, internal
//! nodes up to [`MAX_CHILDREN`] children. Inserts split on overflow;
//! deletes drop empty nodes without merging. A height guard rebuilds the
//! tree from scratch when deletions leave it taller than `2·log₂(len)+2`,
//! which keeps every path logarithmic without merge bookkeeping.
//!
//! # Invariants (checked by `debug_validate` in tests)
//!
//! 1. Every cached metric equals the sum of the metrics below it.
//! 2. Every cached marker count equals the number of marked leaves below.
//! 3. Height ≤ 2·log₂(segment count) + 2.

use smallvec::SmallVec;

/// Associative aggregate over segments.
pub trait Metrics: Copy + Default + std::fmt::Debug {
    /// Combine two aggregates. Must be associative with `default()` as
    /// identity.
    #[must_use]
    fn add(self, other: Self) -> Self;

    /// Scalar weight used by balancing heuristics (e.g. byte count).
    fn weight(&self) -> usize;
}

/// A rope segment.
pub trait Segment {
    /// The aggregate this segment contributes.
    type Metrics: Metrics;

    /// Number of marker variants this segment type declares.
    const MARKER_VARIANTS: usize;

    /// Measure this segment.
    fn measure(&self) -> Self::Metrics;

    /// The marker variant this segment carries, if any. Must be below
    /// [`Self::MARKER_VARIANTS`].
    fn marker(&self) -> Option<usize> {
        None
    }

    /// Whether the segment carries no content (eligible for pruning on
    /// delete).
    fn is_empty(&self) -> bool {
        false
    }
}

/// Max segments per leaf.
const MAX_LEAF: usize = 4;
/// Max children per internal node.
const MAX_CHILDREN: usize = 4;

type Counts = SmallVec<[u32; 4]>;

#[derive(Debug, Clone)]
enum Node<T: Segment> {
    Leaf {
        items: Vec<T>,
    },
    Internal {
        children: Vec<Node<T>>,
        /// Cached subtree segment count.
        len: usize,
        /// Cached subtree metric sum.
        metrics: T::Metrics,
        /// Cached subtree marker counts, one per variant.
        markers: Counts,
        /// Height above the leaves (leaf = 0).
        height: usize,
    },
}

impl<T: Segment + Clone> Node<T> {
    fn len(&self) -> usize {
        match self {
            Node::Leaf { items } => items.len(),
            Node::Internal { len, .. } => *len,
        }
    }

    fn height(&self) -> usize {
        match self {
            Node::Leaf { .. } => 0,
            Node::Internal { height, .. } => *height,
        }
    }

    fn metrics(&self) -> T::Metrics {
        match self {
            Node::Leaf { items } => items
                .iter()
                .fold(T::Metrics::default(), |acc, i| acc.add(i.measure())),
            Node::Internal { metrics, .. } => *metrics,
        }
    }

    fn marker_count(&self, variant: usize) -> u32 {
        match self {
            Node::Leaf { items } => items
                .iter()
                .filter(|i| i.marker() == Some(variant))
                .count() as u32,
            Node::Internal { markers, .. } => markers.get(variant).copied().unwrap_or(0),
        }
    }

    /// Build an internal node from children, computing the caches.
    fn internal(children: Vec<Node<T>>) -> Self {
        debug_assert!(!children.is_empty());
        let len = children.iter().map(Node::len).sum();
        let metrics = children
            .iter()
            .fold(T::Metrics::default(), |acc, c| acc.add(c.metrics()));
        let mut markers: Counts = SmallVec::from_elem(0, T::MARKER_VARIANTS);
        for child in &children {
            for (v, slot) in markers.iter_mut().enumerate() {
                *slot += child.marker_count(v);
            }
        }
        let height = children.iter().map(Node::height).max().unwrap_or(0) + 1;
        Node::Internal {
            children,
            len,
            metrics,
            markers,
            height,
        }
    }

    /// Insert at `index`; returns a split-off right sibling on overflow.
    fn insert(&mut self, index: usize, item: T) -> Option<Node<T>> {
        match self {
            Node::Leaf { items } => {
                items.insert(index.min(items.len()), item);
                if items.len() <= MAX_LEAF {
                    return None;
                }
                let right = items.split_off(items.len() / 2);
                Some(Node::Leaf { items: right })
            }
            Node::Internal { children, .. } => {
                // A boundary index goes into the left child's end.
                let mut idx = index;
                let mut child_i = children.len() - 1;
                for (i, child) in children.iter().enumerate() {
                    let l = child.len();
                    if idx <= l {
                        child_i = i;
                        break;
                    }
                    idx -= l;
                }

                let split = children[child_i].insert(idx, item);
                if let Some(right) = split {
                    children.insert(child_i + 1, right);
                }

                let overflow = if children.len() > MAX_CHILDREN {
                    let right = children.split_off(children.len() / 2);
                    Some(Node::internal(right))
                } else {
                    None
                };

                self.recompute();
                overflow
            }
        }
    }

    /// Delete the segment at `index`. Returns it.
    fn delete(&mut self, index: usize) -> T {
        match self {
            Node::Leaf { items } => items.remove(index),
            Node::Internal { children, .. } => {
                let mut idx = index;
                let mut child_i = 0;
                for (i, child) in children.iter().enumerate() {
                    let l = child.len();
                    if idx < l {
                        child_i = i;
                        break;
                    }
                    idx -= l;
                    child_i = i;
                }

                let removed = children[child_i].delete(idx);
                if children[child_i].len() == 0 {
                    children.remove(child_i);
                }
                self.recompute();
                removed
            }
        }
    }

    /// Refresh this internal node's caches from its children.
    fn recompute(&mut self) {
        if let Node::Internal { children, .. } = self {
            let children = std::mem::take(children);
            *self = Node::internal(children);
        }
    }

    fn get(&self, index: usize) -> Option<&T> {
        match self {
            Node::Leaf { items } => items.get(index),
            Node::Internal { children, .. } => {
                let mut idx = index;
                for child in children {
                    let l = child.len();
                    if idx < l {
                        return child.get(idx);
                    }
                    idx -= l;
                }
                None
            }
        }
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match self {
            Node::Leaf { items } => items.get_mut(index),
            Node::Internal { children, .. } => {
                let mut idx = index;
                for child in children.iter_mut() {
                    let l = child.len();
                    if idx < l {
                        return child.get_mut(idx);
                    }
                    idx -= l;
                }
                None
            }
        }
    }

    /// Index of the `n`-th segment of `variant` below this node, counting
    /// from this node's leftmost leaf.
    fn marker_index(&self, variant: usize, n: u32) -> Option<usize> {
        match self {
            Node::Leaf { items } => {
                let mut seen = 0;
                for (i, item) in items.iter().enumerate() {
                    if item.marker() == Some(variant) {
                        if seen == n {
                            return Some(i);
                        }
                        seen += 1;
                    }
                }
                None
            }
            Node::Internal { children, .. } => {
                let mut n = n;
                let mut base = 0;
                for child in children {
                    let c = child.marker_count(variant);
                    if n < c {
                        return child.marker_index(variant, n).map(|i| base + i);
                    }
                    n -= c;
                    base += child.len();
                }
                None
            }
        }
    }

    /// First index where `pred(cumulative_metrics_through_index)` holds.
    fn find_by_metric(
        &self,
        acc: T::Metrics,
        pred: &impl Fn(&T::Metrics) -> bool,
    ) -> Option<(usize, T::Metrics)> {
        match self {
            Node::Leaf { items } => {
                let mut acc = acc;
                for (i, item) in items.iter().enumerate() {
                    let next = acc.add(item.measure());
                    if pred(&next) {
                        return Some((i, acc));
                    }
                    acc = next;
                }
                None
            }
            Node::Internal { children, .. } => {
                let mut acc = acc;
                let mut base = 0;
                for child in children {
                    let through = acc.add(child.metrics());
                    if pred(&through) {
                        return child
                            .find_by_metric(acc, pred)
                            .map(|(i, m)| (base + i, m));
                    }
                    acc = through;
                    base += child.len();
                }
                None
            }
        }
    }

    fn collect_into(&self, out: &mut Vec<T>) {
        match self {
            Node::Leaf { items } => out.extend(items.iter().cloned()),
            Node::Internal { children, .. } => {
                for child in children {
                    child.collect_into(out);
                }
            }
        }
    }

    #[cfg(test)]
    fn debug_validate(&self) {
        if let Node::Internal {
            children,
            len,
            metrics: _,
            markers,
            height,
        } = self
        {
            assert!(!children.is_empty());
            assert_eq!(*len, children.iter().map(Node::len).sum::<usize>());
            assert_eq!(
                *height,
                children.iter().map(Node::height).max().unwrap() + 1
            );
            for (v, &count) in markers.iter().enumerate() {
                assert_eq!(
                    count,
                    children.iter().map(|c| c.marker_count(v)).sum::<u32>()
                );
            }
            for child in children {
                child.debug_validate();
            }
        }
    }
}

/// A sequence of segments with O(log n) positional structure.
#[derive(Debug, Clone)]
pub struct Rope<T: Segment> {
    root: Node<T>,
}

impl<T: Segment + Clone> Default for Rope<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Segment + Clone> Rope<T> {
    /// An empty rope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: Node::Leaf { items: Vec::new() },
        }
    }

    /// Build a balanced rope from a slice of segments.
    #[must_use]
    pub fn from_slice(items: &[T]) -> Self {
        if items.is_empty() {
            return Self::new();
        }

        // Leaves of MAX_LEAF, then levels of MAX_CHILDREN, bottom-up.
        let mut level: Vec<Node<T>> = items
            .chunks(MAX_LEAF)
            .map(|chunk| Node::Leaf {
                items: chunk.to_vec(),
            })
            .collect();

        while level.len() > 1 {
            level = level
                .chunks(MAX_CHILDREN)
                .map(|chunk| Node::internal(chunk.to_vec()))
                .collect();
        }

        Self {
            root: level.pop().unwrap(),
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether the rope holds no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all segment metrics.
    #[must_use]
    pub fn metrics(&self) -> T::Metrics {
        self.root.metrics()
    }

    /// The segment at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.root.get(index)
    }

    /// Mutable segment access.
    ///
    /// The caller must not change the segment's metrics or marker through
    /// this reference without a follow-up [`refresh`](Self::refresh).
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.root.get_mut(index)
    }

    /// Recompute every cached aggregate (after in-place segment edits).
    pub fn refresh(&mut self) {
        let items = self.to_vec();
        *self = Self::from_slice(&items);
    }

    /// Insert a segment at `index` (clamped to the end).
    pub fn insert(&mut self, index: usize, item: T) {
        let index = index.min(self.len());
        if let Some(right) = self.root.insert(index, item) {
            let left = std::mem::replace(&mut self.root, Node::Leaf { items: Vec::new() });
            self.root = Node::internal(vec![left, right]);
        }
        self.maybe_rebuild();
    }

    /// Append a segment.
    pub fn append(&mut self, item: T) {
        self.insert(self.len(), item);
    }

    /// Delete and return the segment at `index`.
    pub fn delete(&mut self, index: usize) -> Option<T> {
        if index >= self.len() {
            return None;
        }
        let removed = self.root.delete(index);

        // Collapse a single-child root.
        while let Node::Internal { children, .. } = &mut self.root {
            if children.len() == 1 {
                self.root = children.pop().unwrap();
            } else {
                break;
            }
        }

        self.maybe_rebuild();
        Some(removed)
    }

    /// O(1) count of segments carrying `variant`.
    #[must_use]
    pub fn marker_count(&self, variant: usize) -> u32 {
        self.root.marker_count(variant)
    }

    /// The absolute index of the `n`-th segment carrying `variant`, in
    /// sequence order.
    #[must_use]
    pub fn get_marker(&self, variant: usize, n: u32) -> Option<(usize, &T)> {
        let index = self.root.marker_index(variant, n)?;
        self.get(index).map(|item| (index, item))
    }

    /// First index whose cumulative metric (inclusive) satisfies `pred`,
    /// with the cumulative metric *before* that segment.
    ///
    /// `pred` must be monotone over the cumulative sum.
    #[must_use]
    pub fn find_by_metric(
        &self,
        pred: impl Fn(&T::Metrics) -> bool,
    ) -> Option<(usize, T::Metrics)> {
        self.root.find_by_metric(T::Metrics::default(), &pred)
    }

    /// All segments in order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        self.root.collect_into(&mut out);
        out
    }

    /// Iterate segments from `start` onward.
    pub fn iter_from(&self, start: usize) -> impl Iterator<Item = &T> + '_ {
        (start..self.len()).filter_map(move |i| self.get(i))
    }

    /// Height-guard rebuild: deletes never merge, so pathological delete
    /// patterns could leave tall skinny paths. Rebuilding restores a
    /// packed tree.
    fn maybe_rebuild(&mut self) {
        let len = self.len().max(1);
        let limit = 2 * (usize::BITS - len.leading_zeros()) as usize + 2;
        if self.root.height() > limit {
            let items = self.to_vec();
            *self = Self::from_slice(&items);
        }
    }

    #[cfg(test)]
    pub(crate) fn debug_validate(&self) {
        self.root.debug_validate();
        let len = self.len().max(1);
        let limit = 2 * (usize::BITS - len.leading_zeros()) as usize + 2;
        assert!(
            self.root.height() <= limit,
            "height {} exceeds {limit} for {len} items",
            self.root.height()
        );
    }
}
