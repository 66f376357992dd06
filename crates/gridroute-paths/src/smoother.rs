//! Turns the raw node chain of a search into a short, radius-aware list of
//! waypoints.
//!
//! Smoothing runs in two passes. Bend compaction keeps only the nodes where
//! the travel direction changes, plus everything touching a portal. Then,
//! when diagonal movement is allowed, middle points are elided for as long
//! as a clear straight corridor joins their neighbours.

use gridroute_core::{GridId, GridLayer, GridProvider, Point, PortalId, UnitProperties, Vec2};

use crate::corridor::can_reduce_path;
use crate::cost::CellCostStrategy;
use crate::path::{Path, PathPoint};
use crate::request::PathOptions;

/// One node of a search chain, oldest first.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChainNode {
    pub grid: GridId,
    pub cell: Point,
    /// World position: the cell centre, or the literal start for an escape
    /// origin.
    pub pos: Vec2,
    /// Set on the node standing in a portal; `cell` is then the access cell
    /// the portal was entered from.
    pub portal: Option<PortalId>,
}

impl ChainNode {
    pub fn cell(grid: &dyn GridLayer, cell: Point) -> Self {
        Self {
            grid: grid.id(),
            cell,
            pos: grid.position(cell),
            portal: None,
        }
    }

    fn to_point(self) -> PathPoint {
        match self.portal {
            Some(id) => PathPoint::portal(self.pos, Some(self.grid), id),
            None => PathPoint::waypoint(self.pos, Some(self.grid)),
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct Draft {
    point: PathPoint,
    pinned: bool,
}

pub struct PathSmoother<'a> {
    grids: &'a dyn GridProvider,
    cell_costs: &'a dyn CellCostStrategy,
    unit: UnitProperties,
    options: PathOptions,
}

impl<'a> PathSmoother<'a> {
    pub fn new(
        grids: &'a dyn GridProvider,
        cell_costs: &'a dyn CellCostStrategy,
        unit: UnitProperties,
        options: PathOptions,
    ) -> Self {
        Self {
            grids,
            cell_costs,
            unit,
            options,
        }
    }

    /// Build the route for `chain`, whose first and last nodes are replaced
    /// by the literal `from` and `to`.
    ///
    /// `escaped` means `chain[0]` is a pseudo origin in a blocked cell and
    /// `chain[1]` the walkable cell the search actually started from; that
    /// cell is always kept.
    pub fn smooth(&self, chain: &[ChainNode], from: Vec2, to: Vec2, escaped: bool) -> Path {
        let Some(first) = chain.first() else {
            return Path::new();
        };
        let mut drafts = if chain.len() == 1 {
            vec![
                Draft {
                    point: first.to_point(),
                    pinned: false,
                },
                Draft {
                    point: first.to_point(),
                    pinned: false,
                },
            ]
        } else if self.options.use_path_smoothing {
            self.compact(chain, escaped)
        } else {
            self.interpolate(chain, escaped)
        };
        if let Some(d) = drafts.first_mut() {
            d.point.pos = from;
        }
        if let Some(d) = drafts.last_mut() {
            d.point.pos = to;
        }
        if self.options.use_path_smoothing && !self.options.prevent_diagonal_moves {
            self.reduce(&mut drafts);
        }
        drafts.into_iter().map(|d| d.point).collect()
    }

    fn compact(&self, chain: &[ChainNode], escaped: bool) -> Vec<Draft> {
        let last = chain.len() - 1;
        let mut drafts: Vec<Draft> = chain
            .iter()
            .enumerate()
            .filter(|&(i, node)| {
                i == 0
                    || i == last
                    || node.portal.is_some()
                    || chain[i - 1].portal.is_some()
                    || chain[i + 1].portal.is_some()
                    || chain[i - 1].grid != node.grid
                    || chain[i + 1].grid != node.grid
                    || (escaped && i == 1)
                    || (node.cell - chain[i - 1].cell).signum()
                        != (chain[i + 1].cell - node.cell).signum()
            })
            .map(|(i, node)| Draft {
                point: node.to_point(),
                pinned: escaped && i == 1,
            })
            .collect();
        if chain.len() > 2 && drafts.len() == 2 {
            drafts.insert(
                1,
                Draft {
                    point: chain[chain.len() / 2].to_point(),
                    pinned: false,
                },
            );
        }
        drafts
    }

    /// Every chain node, with straight or diagonal jumps between distant
    /// cells filled back in step by step.
    fn interpolate(&self, chain: &[ChainNode], escaped: bool) -> Vec<Draft> {
        let mut drafts = Vec::with_capacity(chain.len());
        for (i, node) in chain.iter().enumerate() {
            drafts.push(Draft {
                point: node.to_point(),
                pinned: escaped && i == 1,
            });
            let Some(next) = chain.get(i + 1) else {
                continue;
            };
            if (escaped && i == 0)
                || node.portal.is_some()
                || next.portal.is_some()
                || node.grid != next.grid
            {
                continue;
            }
            let Some(grid) = self.grids.grid(node.grid) else {
                continue;
            };
            let mut c = node.cell;
            loop {
                c = c + (next.cell - c).signum();
                if c == next.cell {
                    break;
                }
                drafts.push(Draft {
                    point: PathPoint::waypoint(grid.position(c), Some(node.grid)),
                    pinned: false,
                });
            }
        }
        drafts
    }

    fn reduce(&self, drafts: &mut Vec<Draft>) {
        loop {
            let mut changed = false;
            let mut i = 1;
            while i + 1 < drafts.len() {
                if self.can_elide(&drafts[i - 1], &drafts[i], &drafts[i + 1]) {
                    drafts.remove(i);
                    changed = true;
                } else {
                    i += 1;
                }
            }
            if !changed {
                break;
            }
        }
    }

    fn can_elide(&self, a: &Draft, b: &Draft, c: &Draft) -> bool {
        if b.pinned || [a, b, c].iter().any(|d| d.point.is_portal()) {
            return false;
        }
        let grid = b.point.grid;
        if a.point.grid != grid || c.point.grid != grid {
            return false;
        }
        let Some(layer) = grid.and_then(|id| self.grids.grid(id)) else {
            return false;
        };
        can_reduce_path(layer, a.point.pos, c.point.pos, &self.unit, self.cell_costs)
    }
}

/// Nudge a final position away from walls so a unit of `radius` standing
/// there does not overlap them. The point never leaves its cell and is
/// never pushed past the cell centre by a straight wall.
pub fn fix_end_point(grid: &dyn GridLayer, pos: Vec2, radius: f32) -> Vec2 {
    let Some(cell) = grid.cell_at(pos) else {
        return pos;
    };
    let half = grid.cell_size() * 0.5;
    let r = radius.clamp(0.0, half);
    if r == 0.0 {
        return pos;
    }
    let centre = grid.position(cell);
    let lo = centre - Vec2::splat(half);
    let hi = centre + Vec2::splat(half);
    let blocked = |dx: i32, dy: i32| {
        grid.cell(cell.shift(dx, dy))
            .is_none_or(|c| c.blocked)
    };

    let mut p = pos;
    if blocked(-1, 0) {
        p.x = p.x.max(lo.x + r);
    }
    if blocked(1, 0) {
        p.x = p.x.min(hi.x - r);
    }
    if blocked(0, -1) {
        p.y = p.y.max(lo.y + r);
    }
    if blocked(0, 1) {
        p.y = p.y.min(hi.y - r);
    }

    for (dx, dy) in [(-1, -1), (1, -1), (1, 1), (-1, 1)] {
        if !blocked(dx, dy) {
            continue;
        }
        let corner = Vec2::new(
            if dx < 0 { lo.x } else { hi.x },
            if dy < 0 { lo.y } else { hi.y },
        );
        let away = p - corner;
        let d = away.length();
        if d >= r {
            continue;
        }
        let dir = if d > f32::EPSILON {
            away / d
        } else {
            (centre - corner).normalize_or_zero()
        };
        p = corner + dir * r;
    }
    p.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::DefaultCellCost;
    use gridroute_core::{CellGrid, GridSet};

    fn chain(g: &CellGrid, cells: &[(i32, i32)]) -> Vec<ChainNode> {
        cells
            .iter()
            .map(|&(x, y)| ChainNode::cell(g, Point::new(x, y)))
            .collect()
    }

    fn smoother(set: &GridSet, options: PathOptions) -> PathSmoother<'_> {
        PathSmoother::new(set, &DefaultCellCost, UnitProperties::with_radius(0.3), options)
    }

    const OPEN: &str = "
        ......
        ......
        ......
        ......
    ";

    #[test]
    fn open_l_turn_collapses_to_a_line() {
        let set = GridSet::single(CellGrid::from_ascii(OPEN, 1.0).unwrap());
        let g = set.grids().next().unwrap();
        let c = chain(g, &[(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2)]);
        let s = smoother(&set, PathOptions::default());
        let from = Vec2::new(0.5, 0.5);
        let to = Vec2::new(3.5, 2.5);
        let path = s.smooth(&c, from, to, false);
        assert_eq!(path.points().collect::<Vec<_>>(), vec![from, to]);
    }

    #[test]
    fn corner_around_wall_is_kept() {
        let set = GridSet::single(
            CellGrid::from_ascii(
                "
                ....
                ###.
                ....
                ",
                1.0,
            )
            .unwrap(),
        );
        let g = set.grids().next().unwrap();
        let c = chain(g, &[(0, 0), (1, 0), (2, 0), (3, 1), (2, 2), (1, 2), (0, 2)]);
        let opts = PathOptions::default().with_corner_cutting(true);
        let path = smoother(&set, opts).smooth(&c, Vec2::new(0.5, 0.5), Vec2::new(0.5, 2.5), false);
        let pts: Vec<Vec2> = path.points().collect();
        assert_eq!(pts.first(), Some(&Vec2::new(0.5, 0.5)));
        assert_eq!(pts.last(), Some(&Vec2::new(0.5, 2.5)));
        assert!(pts.contains(&Vec2::new(3.5, 1.5)));
        assert!(pts.len() < c.len());
    }

    #[test]
    fn reduction_is_a_fixpoint() {
        let set = GridSet::single(
            CellGrid::from_ascii(
                "
                .....
                .###.
                .#...
                .....
                ",
                1.0,
            )
            .unwrap(),
        );
        let g = set.grids().next().unwrap();
        let c = chain(
            g,
            &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 1), (4, 2), (3, 3), (2, 3), (1, 3)],
        );
        let s = smoother(&set, PathOptions::default());
        let path = s.smooth(&c, Vec2::new(0.5, 0.5), Vec2::new(1.5, 3.5), false);
        let mut drafts: Vec<Draft> = path
            .iter()
            .map(|&point| Draft {
                point,
                pinned: false,
            })
            .collect();
        s.reduce(&mut drafts);
        let again: Vec<Vec2> = drafts.iter().map(|d| d.point.pos).collect();
        assert_eq!(again, path.points().collect::<Vec<_>>());
    }

    #[test]
    fn straight_chain_injects_then_drops_midpoint() {
        let set = GridSet::single(CellGrid::from_ascii(OPEN, 1.0).unwrap());
        let g = set.grids().next().unwrap();
        let c = chain(g, &[(0, 1), (1, 1), (2, 1), (3, 1)]);
        // Without the reduction pass the injected midpoint survives.
        let cardinal = PathOptions::default().with_diagonals(false);
        let path = smoother(&set, cardinal).smooth(&c, Vec2::new(0.5, 1.5), Vec2::new(3.5, 1.5), false);
        assert_eq!(path.count(), 3);
        let path = smoother(&set, PathOptions::default()).smooth(
            &c,
            Vec2::new(0.5, 1.5),
            Vec2::new(3.5, 1.5),
            false,
        );
        assert_eq!(path.count(), 2);
    }

    #[test]
    fn escape_cell_is_pinned() {
        let set = GridSet::single(
            CellGrid::from_ascii(
                "
                #....
                .....
                ",
                1.0,
            )
            .unwrap(),
        );
        let g = set.grids().next().unwrap();
        let from = Vec2::new(0.5, 0.5);
        let mut c = vec![ChainNode {
            pos: from,
            ..ChainNode::cell(g, Point::new(0, 0))
        }];
        c.extend(chain(g, &[(1, 0), (2, 0), (3, 0), (4, 0)]));
        let path = smoother(&set, PathOptions::default()).smooth(&c, from, Vec2::new(4.5, 0.5), true);
        let pts: Vec<Vec2> = path.points().collect();
        assert_eq!(pts[0], from);
        assert_eq!(pts[1], Vec2::new(1.5, 0.5));
        assert_eq!(pts.last(), Some(&Vec2::new(4.5, 0.5)));
    }

    #[test]
    fn smoothing_off_interpolates_jumps() {
        let set = GridSet::single(CellGrid::from_ascii(OPEN, 1.0).unwrap());
        let g = set.grids().next().unwrap();
        let c = chain(g, &[(0, 0), (2, 2), (5, 2)]);
        let opts = PathOptions::default().with_smoothing(false);
        let path = smoother(&set, opts).smooth(&c, Vec2::new(0.5, 0.5), Vec2::new(5.5, 2.5), false);
        assert_eq!(path.count(), 6);
        let cells: Vec<Vec2> = path.points().collect();
        assert_eq!(cells[1], Vec2::new(1.5, 1.5));
        assert_eq!(cells[3], Vec2::new(3.5, 2.5));
    }

    #[test]
    fn portal_neighbourhood_is_kept() {
        let mut set = GridSet::new();
        let a = set.add_grid(CellGrid::from_ascii("....", 1.0).unwrap());
        let b = set.add_grid(
            CellGrid::from_ascii("....", 1.0)
                .unwrap()
                .with_origin(Vec2::new(100.0, 0.0)),
        );
        let ga = set.grids().next().unwrap();
        let gb = set.grids().nth(1).unwrap();
        let mut c = chain(ga, &[(0, 0), (1, 0), (2, 0), (3, 0)]);
        c.push(ChainNode {
            portal: Some(PortalId(0)),
            ..ChainNode::cell(ga, Point::new(3, 0))
        });
        c.extend(chain(gb, &[(0, 0), (1, 0), (2, 0), (3, 0)]));
        let path = smoother(&set, PathOptions::default()).smooth(
            &c,
            Vec2::new(0.5, 0.5),
            Vec2::new(103.5, 0.5),
            false,
        );
        let kinds: Vec<(bool, Option<GridId>)> =
            path.iter().map(|p| (p.is_portal(), p.grid)).collect();
        assert_eq!(
            kinds,
            vec![
                (false, Some(a)),
                (false, Some(a)),
                (true, Some(a)),
                (false, Some(b)),
                (false, Some(b)),
            ]
        );
        assert!(path.is_well_formed());
    }

    #[test]
    fn fix_end_point_pushes_off_walls() {
        let g = CellGrid::from_ascii(
            "
            ###
            #..
            #..
            ",
            1.0,
        )
        .unwrap();
        let p = fix_end_point(&g, Vec2::new(1.05, 1.05), 0.3);
        assert!((p.x - 1.3).abs() < 1e-5 && (p.y - 1.3).abs() < 1e-5);
        // Open neighbours: no change.
        let q = Vec2::new(2.5, 2.5);
        assert_eq!(fix_end_point(&g, q, 0.3), q);
        // Never past the centre.
        let p = fix_end_point(&g, Vec2::new(1.05, 1.5), 0.9);
        assert!(p.x <= 1.5 + 1e-6);
    }

    #[test]
    fn fix_end_point_clears_blocked_corner() {
        let g = CellGrid::from_ascii(
            "
            #..
            ...
            ",
            1.0,
        )
        .unwrap();
        let p = fix_end_point(&g, Vec2::new(1.05, 1.05), 0.3);
        assert!(p.distance(Vec2::new(1.0, 1.0)) >= 0.3 - 1e-5);
    }
}
