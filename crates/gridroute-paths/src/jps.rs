//! Jump Point Search: successor generation for cell nodes.
//!
//! Instead of adding every neighbour to the open set, JPS keeps only the
//! pruned neighbours of the travel direction and "jumps" along each of them
//! until it meets a jump point: the goal, a cell with portals, a cell whose
//! cost differs from the previous one, or a cell with a forced neighbour.
//! Diagonal jumps also stop where a straight probe along either of their
//! components would find a jump point. Jumps are plain loops; nothing
//! recurses.
//!
//! Pruning assumes uniform cell costs. On weighted grids the cost-change
//! stop keeps routes valid, but A* remains the search that guarantees
//! optimal costs.

use gridroute_core::{GridId, GridLayer, Point};

use crate::astar::Searcher;
use crate::error::EngineError;
use crate::neighbors::{self, has_forced_neighbor, move_offsets, open_offsets, pruned_neighbors};
use crate::nodes::{NONE, NodeKey};

impl Searcher<'_> {
    pub(crate) fn jump_successors(
        &self,
        idx: usize,
        grid: GridId,
        cell: Point,
        out: &mut Vec<(usize, i32)>,
    ) -> Result<(), EngineError> {
        let layer = self.layer(grid)?;
        let unit = self.search.unit;
        let cut = !self.search.options.prevent_corner_cutting;

        // Only a parent cell on the same grid gives a travel direction.
        let parent = self.arena.current(idx).map_or(NONE, |n| n.parent);
        let from = match self.arena.key(parent) {
            Some(NodeKey::Cell { grid: g, cell: p }) if g == grid => Some(p),
            _ => None,
        };

        let open = layer.walkable_directions(cell, &unit);
        let dirs: Vec<Point> = match from {
            Some(p) => pruned_neighbors((cell - p).signum(), cut, open_offsets(open)),
            None => move_offsets(true)
                .filter(|&o| neighbors::step_in(open, cell, o, cut).is_some())
                .collect(),
        };

        for dir in dirs {
            let Some((jp, cost)) = self.jump(layer, cell, dir) else {
                continue;
            };
            if let Some(i) = self.arena.index(NodeKey::Cell { grid, cell: jp }) {
                out.push((i, cost));
            }
        }
        self.portal_successors(grid, cell, out);
        Ok(())
    }

    /// Walk from `from` along `dir` to the next jump point, returning it
    /// with the accumulated cost.
    fn jump(&self, layer: &dyn GridLayer, from: Point, dir: Point) -> Option<(Point, i32)> {
        let unit = self.search.unit;
        let cut = !self.search.options.prevent_corner_cutting;
        let mut cur = from;
        let mut cost = 0i32;
        loop {
            let next = neighbors::step(layer, cur, dir, &unit, cut)?;
            cost = cost.saturating_add(self.enter_cost(layer, cur, next));
            let prev = cur;
            cur = next;
            if self.is_jump_point(layer, prev, cur, dir) {
                return Some((cur, cost));
            }
            if dir.is_diagonal()
                && (self.probe(layer, cur, Point::new(dir.x, 0))
                    || self.probe(layer, cur, Point::new(0, dir.y)))
            {
                return Some((cur, cost));
            }
        }
    }

    /// Whether a straight walk from `from` along `dir` meets a jump point.
    fn probe(&self, layer: &dyn GridLayer, from: Point, dir: Point) -> bool {
        let unit = self.search.unit;
        let cut = !self.search.options.prevent_corner_cutting;
        let mut cur = from;
        while let Some(next) = neighbors::step(layer, cur, dir, &unit, cut) {
            if self.is_jump_point(layer, cur, next, dir) {
                return true;
            }
            cur = next;
        }
        false
    }

    fn is_jump_point(&self, layer: &dyn GridLayer, prev: Point, cur: Point, dir: Point) -> bool {
        if layer.id() == self.search.goal_grid && cur == self.search.goal_cell {
            return true;
        }
        if !self.grids.portals_at(layer.id(), cur).is_empty() {
            return true;
        }
        if self.cell_cost(layer, prev) != self.cell_cost(layer, cur) {
            return true;
        }
        let unit = self.search.unit;
        let cut = !self.search.options.prevent_corner_cutting;
        has_forced_neighbor(dir, cut, open_offsets(layer.walkable_directions(cur, &unit)))
    }
}
