use gridroute_core::{GridId, GridProvider, Point, PortalEnd, PortalEntry, PortalId, Range};

/// Sentinel parent index of a root node.
pub(crate) const NONE: usize = usize::MAX;

/// What a search node stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum NodeKey {
    Cell { grid: GridId, cell: Point },
    /// Standing in a portal, having entered it at `end`.
    Portal(PortalEntry),
}

// ---------------------------------------------------------------------------
// Internal node for best-first searches
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub(crate) struct Node {
    pub(crate) g: i32,
    pub(crate) h: i32,
    pub(crate) f: i32,
    pub(crate) parent: usize,
    pub(crate) generation: u32,
    pub(crate) open: bool,
    pub(crate) closed: bool,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            g: 0,
            h: 0,
            f: 0,
            parent: NONE,
            generation: 0,
            open: false,
            closed: false,
        }
    }
}

/// Reference into the node arena, ordered for `BinaryHeap` so that the
/// smallest `f` pops first, ties going to the smallest `h`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct NodeRef {
    pub(crate) idx: usize,
    pub(crate) f: i32,
    pub(crate) h: i32,
}

impl Ord for NodeRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for NodeRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

// ---------------------------------------------------------------------------
// NodeArena
// ---------------------------------------------------------------------------

/// Flat node storage for every cell of every grid, followed by two nodes
/// per portal (one per entry side).
///
/// Nodes are reused across searches. Bumping the generation invalidates
/// them all lazily: a node whose stamp differs from the current generation
/// is treated as unseen.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Node>,
    offsets: Vec<usize>,
    bounds: Vec<Range>,
    portal_offset: usize,
    portal_count: usize,
    generation: u32,
}

impl NodeArena {
    pub(crate) fn new(grids: &dyn GridProvider) -> Self {
        let mut arena = Self::default();
        arena.layout(grids);
        arena
    }

    /// Re-lay the arena if the provider's grids or portals changed shape.
    pub(crate) fn sync(&mut self, grids: &dyn GridProvider) {
        let same = self.bounds.len() == grids.grid_count()
            && self.portal_count == grids.portal_count()
            && self
                .bounds
                .iter()
                .enumerate()
                .all(|(i, b)| grids.grid(GridId(i as u32)).map(|g| g.bounds()) == Some(*b));
        if !same {
            log::debug!("node arena re-laid for {} grids", grids.grid_count());
            self.layout(grids);
        }
    }

    fn layout(&mut self, grids: &dyn GridProvider) {
        self.offsets.clear();
        self.bounds.clear();
        let mut len = 0;
        for i in 0..grids.grid_count() {
            let bounds = grids
                .grid(GridId(i as u32))
                .map(|g| g.bounds())
                .unwrap_or_default();
            self.offsets.push(len);
            self.bounds.push(bounds);
            len += bounds.len();
        }
        self.portal_offset = len;
        self.portal_count = grids.portal_count();
        len += self.portal_count * 2;
        self.nodes.clear();
        self.nodes.resize(len, Node::default());
        self.generation = 0;
    }

    /// Start a new search, invalidating every node.
    pub(crate) fn begin(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            for n in &mut self.nodes {
                n.generation = 0;
            }
            self.generation = 1;
        }
        self.generation
    }

    #[inline]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn index(&self, key: NodeKey) -> Option<usize> {
        match key {
            NodeKey::Cell { grid, cell } => {
                let i = grid.index();
                let local = self.bounds.get(i)?.index(cell)?;
                Some(self.offsets[i] + local)
            }
            NodeKey::Portal(entry) => {
                let p = entry.portal.index();
                (p < self.portal_count).then(|| self.portal_offset + p * 2 + entry.end.index())
            }
        }
    }

    pub(crate) fn key(&self, idx: usize) -> Option<NodeKey> {
        if idx >= self.nodes.len() {
            return None;
        }
        if idx >= self.portal_offset {
            let rel = idx - self.portal_offset;
            let end = if rel % 2 == 0 { PortalEnd::A } else { PortalEnd::B };
            return Some(NodeKey::Portal(PortalEntry {
                portal: PortalId((rel / 2) as u32),
                end,
            }));
        }
        let i = self.offsets.partition_point(|&o| o <= idx).checked_sub(1)?;
        let bounds = self.bounds[i];
        Some(NodeKey::Cell {
            grid: GridId(i as u32),
            cell: bounds.point(idx - self.offsets[i]),
        })
    }

    /// The node at `idx` if it was touched by the current search.
    #[inline]
    pub(crate) fn current(&self, idx: usize) -> Option<&Node> {
        self.nodes
            .get(idx)
            .filter(|n| n.generation == self.generation)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<&mut Node> {
        self.nodes.get_mut(idx)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridroute_core::{CellGrid, GridSet, PortalEndpoint, PortalKind, Vec2};
    use std::collections::BinaryHeap;

    fn world() -> GridSet {
        let mut set = GridSet::new();
        set.add_grid(CellGrid::new(3, 2, 1.0).unwrap());
        set.add_grid(
            CellGrid::new(2, 2, 1.0)
                .unwrap()
                .with_origin(Vec2::new(10.0, 0.0)),
        );
        let end = |g, x, y| PortalEndpoint {
            grid: GridId(g),
            cell: Point::new(x, y),
        };
        set.add_portal(end(0, 2, 0), end(1, 0, 0), PortalKind::Connector, true, None)
            .unwrap();
        set
    }

    #[test]
    fn keys_round_trip() {
        let set = world();
        let arena = NodeArena::new(&set);
        assert_eq!(arena.len(), 6 + 4 + 2);
        for idx in 0..arena.len() {
            let key = arena.key(idx).unwrap();
            assert_eq!(arena.index(key), Some(idx));
        }
        assert_eq!(
            arena.key(7),
            Some(NodeKey::Cell {
                grid: GridId(1),
                cell: Point::new(1, 0)
            })
        );
        assert!(arena.key(arena.len()).is_none());
    }

    #[test]
    fn generation_invalidates_nodes() {
        let set = world();
        let mut arena = NodeArena::new(&set);
        let g = arena.begin();
        arena.get_mut(3).unwrap().generation = g;
        assert!(arena.current(3).is_some());
        arena.begin();
        assert!(arena.current(3).is_none());
    }

    #[test]
    fn generation_wrap_resets_stamps() {
        let set = world();
        let mut arena = NodeArena::new(&set);
        arena.generation = u32::MAX - 1;
        let g = arena.begin();
        arena.get_mut(0).unwrap().generation = g;
        assert_eq!(arena.begin(), 1);
        assert!(arena.current(0).is_none());
    }

    #[test]
    fn sync_relays_on_shape_change() {
        let mut set = world();
        let mut arena = NodeArena::new(&set);
        arena.sync(&set);
        assert_eq!(arena.len(), 12);
        set.add_grid(CellGrid::new(5, 5, 1.0).unwrap());
        arena.sync(&set);
        assert_eq!(arena.len(), 37);
    }

    #[test]
    fn heap_orders_by_f_then_h() {
        let mut heap = BinaryHeap::new();
        heap.push(NodeRef { idx: 0, f: 20, h: 5 });
        heap.push(NodeRef { idx: 1, f: 10, h: 8 });
        heap.push(NodeRef { idx: 2, f: 10, h: 2 });
        let order: Vec<usize> = std::iter::from_fn(|| heap.pop()).map(|r| r.idx).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }
}
