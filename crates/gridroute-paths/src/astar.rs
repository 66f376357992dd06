//! Best-first search over cells and portal nodes, one expansion at a time.

use std::collections::BinaryHeap;

use gridroute_core::{GridId, GridLayer, GridProvider, Point, Portal, PortalEnd, PortalId, UnitProperties, Vec2};

use crate::cost::CellCostStrategy;
use crate::distance::CostProvider;
use crate::engine::SearchKind;
use crate::error::EngineError;
use crate::neighbors::{self, move_offsets};
use crate::nodes::{NONE, NodeArena, NodeKey, NodeRef};
use crate::request::PathOptions;
use crate::result::PathStatus;
use crate::smoother::ChainNode;

/// Goal and bookkeeping of one leg's search.
#[derive(Debug)]
pub(crate) struct Search {
    pub(crate) unit: UnitProperties,
    pub(crate) options: PathOptions,
    pub(crate) goal_grid: GridId,
    pub(crate) goal_cell: Point,
    pub(crate) goal_pos: Vec2,
    pub(crate) goal: usize,
    /// Expanded cell node closest to the goal, for the nearest fallback.
    pub(crate) best: usize,
    /// Closeness of `best`: off the goal's grid, then `h`, then `g`. Cells
    /// on the goal's grid always win since `h` is not measured elsewhere.
    best_rank: (bool, i32, i32),
    pub(crate) expanded: usize,
}

impl Search {
    pub(crate) fn new(
        unit: UnitProperties,
        options: PathOptions,
        goal_grid: &dyn GridLayer,
        goal_cell: Point,
    ) -> Self {
        Self {
            unit,
            options,
            goal_grid: goal_grid.id(),
            goal_cell,
            goal_pos: goal_grid.position(goal_cell),
            goal: NONE,
            best: NONE,
            best_rank: (true, i32::MAX, i32::MAX),
            expanded: 0,
        }
    }
}

/// Result of a single expansion.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Step {
    Running,
    /// `goal` was reached. `fallback` carries the reason when it is only
    /// the closest node to an unreachable destination.
    Found {
        goal: usize,
        fallback: Option<PathStatus>,
    },
    Failed(PathStatus),
}

/// The engine's search state, borrowed for one call.
pub(crate) struct Searcher<'a> {
    pub(crate) grids: &'a dyn GridProvider,
    pub(crate) costs: &'a dyn CostProvider,
    pub(crate) cell_costs: &'a dyn CellCostStrategy,
    pub(crate) kind: SearchKind,
    pub(crate) arena: &'a mut NodeArena,
    pub(crate) open: &'a mut BinaryHeap<NodeRef>,
    pub(crate) nbuf: &'a mut Vec<(usize, i32)>,
    pub(crate) search: &'a mut Search,
}

impl<'a> Searcher<'a> {
    pub(crate) fn layer(&self, id: GridId) -> Result<&'a dyn GridLayer, EngineError> {
        let grids: &'a dyn GridProvider = self.grids;
        grids.grid(id).ok_or(EngineError::UnknownGrid(id))
    }

    fn portal(&self, id: PortalId) -> Result<&'a Portal, EngineError> {
        let grids: &'a dyn GridProvider = self.grids;
        grids.portal(id).ok_or(EngineError::UnknownPortal(id))
    }

    /// Reset the arena and seed the open set with `start`.
    pub(crate) fn begin(&mut self, grid: GridId, start: Point) -> Result<(), EngineError> {
        let generation = self.arena.begin();
        self.open.clear();
        let goal = NodeKey::Cell {
            grid: self.search.goal_grid,
            cell: self.search.goal_cell,
        };
        self.search.goal = self
            .arena
            .index(goal)
            .ok_or(EngineError::UnknownGrid(self.search.goal_grid))?;
        let idx = self
            .arena
            .index(NodeKey::Cell { grid, cell: start })
            .ok_or(EngineError::UnknownGrid(grid))?;
        let h = self.cell_heuristic(self.layer(grid)?, start);
        let node = self
            .arena
            .get_mut(idx)
            .ok_or(EngineError::NodeOutOfRange(idx))?;
        node.g = 0;
        node.h = h;
        node.f = h;
        node.parent = NONE;
        node.generation = generation;
        node.open = true;
        node.closed = false;
        self.open.push(NodeRef { idx, f: h, h });
        self.search.best = idx;
        self.search.best_rank = (grid != self.search.goal_grid, h, 0);
        Ok(())
    }

    /// Pop and expand the most promising node.
    pub(crate) fn process_next(&mut self) -> Result<Step, EngineError> {
        let current = loop {
            let Some(r) = self.open.pop() else {
                return Ok(self.exhausted());
            };
            // Lazy deletion: skip entries superseded by a cheaper push.
            if self
                .arena
                .current(r.idx)
                .is_some_and(|n| n.open && n.f == r.f)
            {
                break r.idx;
            }
        };

        let node = self
            .arena
            .get_mut(current)
            .ok_or(EngineError::NodeOutOfRange(current))?;
        node.open = false;
        node.closed = true;
        let (g, h) = (node.g, node.h);
        self.search.expanded += 1;

        let key = self
            .arena
            .key(current)
            .ok_or(EngineError::NodeOutOfRange(current))?;
        if let NodeKey::Cell { grid, .. } = key {
            let rank = (grid != self.search.goal_grid, h, g);
            if rank < self.search.best_rank {
                self.search.best = current;
                self.search.best_rank = rank;
            }
        }
        if current == self.search.goal {
            return Ok(Step::Found {
                goal: current,
                fallback: None,
            });
        }

        let mut nbuf = std::mem::take(self.nbuf);
        nbuf.clear();
        let res = match (self.kind, key) {
            (SearchKind::JumpPoint, NodeKey::Cell { grid, cell }) => {
                self.jump_successors(current, grid, cell, &mut nbuf)
            }
            _ => self.successors(key, &mut nbuf),
        };
        if res.is_ok() {
            for &(child, step) in &nbuf {
                self.relax(current, g, h, child, step);
            }
        }
        *self.nbuf = nbuf;
        res.map(|()| Step::Running)
    }

    /// Plain successor enumeration: the legal single steps out of a cell
    /// plus its portals, or the far side of a portal.
    fn successors(&self, key: NodeKey, out: &mut Vec<(usize, i32)>) -> Result<(), EngineError> {
        let unit = self.search.unit;
        let options = self.search.options;
        match key {
            NodeKey::Cell { grid, cell } => {
                let layer = self.layer(grid)?;
                let cut = !options.prevent_corner_cutting;
                let open = layer.walkable_directions(cell, &unit);
                for off in move_offsets(!options.prevent_diagonal_moves) {
                    let Some(n) = neighbors::step_in(open, cell, off, cut) else {
                        continue;
                    };
                    if let Some(idx) = self.arena.index(NodeKey::Cell { grid, cell: n }) {
                        out.push((idx, self.enter_cost(layer, cell, n)));
                    }
                }
                self.portal_successors(grid, cell, out);
            }
            NodeKey::Portal(entry) => {
                let portal = self.portal(entry.portal)?;
                let exit = portal.endpoint(entry.end.twin());
                let layer = self.layer(exit.grid)?;
                if !layer.is_walkable(exit.cell, &unit) {
                    return Ok(());
                }
                let cost = self.portal_cost(portal, entry.end)?.saturating_add(self.cell_cost(layer, exit.cell));
                let key = NodeKey::Cell {
                    grid: exit.grid,
                    cell: exit.cell,
                };
                if let Some(idx) = self.arena.index(key) {
                    out.push((idx, cost));
                }
            }
        }
        Ok(())
    }

    /// Entering a portal from its access cell is free; crossing it is
    /// paid on the way out.
    pub(crate) fn portal_successors(&self, grid: GridId, cell: Point, out: &mut Vec<(usize, i32)>) {
        for &entry in self.grids.portals_at(grid, cell) {
            if let Some(idx) = self.arena.index(NodeKey::Portal(entry)) {
                out.push((idx, 0));
            }
        }
    }

    pub(crate) fn cell_cost(&self, layer: &dyn GridLayer, cell: Point) -> i32 {
        layer
            .cell(cell)
            .map_or(0, |c| self.cell_costs.cell_cost(c, &self.search.unit))
    }

    /// Cost of stepping from `from` into the adjacent `to`.
    pub(crate) fn enter_cost(&self, layer: &dyn GridLayer, from: Point, to: Point) -> i32 {
        let step = self
            .costs
            .move_cost(layer.position(from), layer.position(to), layer.cell_size());
        self.cell_cost(layer, to).saturating_add(step)
    }

    /// Traversal cost of `portal` entered at `end`.
    fn portal_cost(&self, portal: &Portal, end: PortalEnd) -> Result<i32, EngineError> {
        if let Some(cost) = portal.cost {
            return Ok(cost.max(0));
        }
        let a = portal.endpoint(end);
        let b = portal.endpoint(end.twin());
        let la = self.layer(a.grid)?;
        let lb = self.layer(b.grid)?;
        Ok(self
            .costs
            .move_cost(la.position(a.cell), lb.position(b.cell), la.cell_size()))
    }

    /// Estimated cost from `cell` to the goal. Only same-grid distances are
    /// counted; shortcut portals on the cell's grid can lower the estimate.
    fn cell_heuristic(&self, layer: &dyn GridLayer, cell: Point) -> i32 {
        let pos = layer.position(cell);
        let cs = layer.cell_size();
        let goal_grid = self.search.goal_grid;
        let goal_pos = self.search.goal_pos;
        let mut h = if layer.id() == goal_grid {
            self.costs.heuristic(pos, goal_pos, cs)
        } else {
            0
        };
        for entry in self.grids.shortcut_portals(layer.id()) {
            let Ok(portal) = self.portal(entry.portal) else {
                continue;
            };
            let enter = portal.endpoint(entry.end);
            let exit = portal.endpoint(entry.end.twin());
            let (Ok(cost), Ok(exit_layer)) = (self.portal_cost(portal, entry.end), self.layer(exit.grid))
            else {
                continue;
            };
            let rest = if exit.grid == goal_grid {
                self.costs
                    .heuristic(exit_layer.position(exit.cell), goal_pos, exit_layer.cell_size())
            } else {
                0
            };
            let via = self
                .costs
                .heuristic(pos, layer.position(enter.cell), cs)
                .saturating_add(cost)
                .saturating_add(rest);
            h = h.min(via);
        }
        h.max(0)
    }

    fn relax(&mut self, parent: usize, parent_g: i32, parent_h: i32, child: usize, step: i32) {
        let g = parent_g.saturating_add(step);
        let seen = self.arena.current(child).map(|n| n.g);
        if seen.is_some_and(|old| g >= old) {
            return;
        }
        let h = match seen {
            Some(_) => None,
            None => match self.arena.key(child) {
                Some(NodeKey::Cell { grid, cell }) => match self.layer(grid) {
                    Ok(layer) => Some(self.cell_heuristic(layer, cell)),
                    Err(_) => return,
                },
                // Portal nodes inherit the estimate of whoever entered them.
                Some(NodeKey::Portal(_)) => Some(parent_h),
                None => return,
            },
        };
        let generation = self.arena.generation();
        let Some(node) = self.arena.get_mut(child) else {
            return;
        };
        if let Some(h) = h {
            node.h = h;
            node.generation = generation;
        }
        node.g = g;
        node.f = g.saturating_add(node.h);
        node.parent = parent;
        node.open = true;
        node.closed = false;
        self.open.push(NodeRef {
            idx: child,
            f: node.f,
            h: node.h,
        });
    }

    fn exhausted(&self) -> Step {
        let goal_open = self
            .layer(self.search.goal_grid)
            .is_ok_and(|l| l.is_walkable(self.search.goal_cell, &self.search.unit));
        let reason = if goal_open {
            PathStatus::NoRouteExists
        } else {
            PathStatus::DestinationBlocked
        };
        if self.search.options.navigate_to_nearest_if_blocked && self.search.best != NONE {
            log::trace!("open set exhausted, falling back to nearest node");
            return Step::Found {
                goal: self.search.best,
                fallback: Some(reason),
            };
        }
        Step::Failed(reason)
    }

    /// Cost to reach `idx` in the current search.
    pub(crate) fn cost_to(&self, idx: usize) -> Result<i32, EngineError> {
        self.arena
            .current(idx)
            .map(|n| n.g)
            .ok_or(EngineError::NodeOutOfRange(idx))
    }

    /// The node chain from the search start to `goal`, oldest first.
    pub(crate) fn chain(&self, goal: usize) -> Result<Vec<ChainNode>, EngineError> {
        let mut out = Vec::new();
        let mut idx = goal;
        while idx != NONE {
            let node = self
                .arena
                .current(idx)
                .ok_or(EngineError::NodeOutOfRange(idx))?;
            let key = self.arena.key(idx).ok_or(EngineError::NodeOutOfRange(idx))?;
            out.push(match key {
                NodeKey::Cell { grid, cell } => ChainNode::cell(self.layer(grid)?, cell),
                NodeKey::Portal(entry) => {
                    let at = self.portal(entry.portal)?.endpoint(entry.end);
                    ChainNode {
                        portal: Some(entry.portal),
                        ..ChainNode::cell(self.layer(at.grid)?, at.cell)
                    }
                }
            });
            idx = node.parent;
        }
        out.reverse();
        Ok(out)
    }
}
