//! Movement rules: which single steps are legal, and which neighbours Jump
//! Point Search keeps after pruning.
//!
//! The pruning table is a pure function of the travel direction and the
//! corner-cutting model so it can be checked in isolation.

use gridroute_core::{Direction, DirectionMask, GridLayer, Point, UnitProperties};

/// A neighbour offset considered when expanding a node reached while
/// travelling in some direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Candidate {
    /// Kept whenever the step is legal.
    Natural(Point),
    /// Kept only when the cell at `blocked` (relative to the node) is not
    /// walkable.
    Forced { offset: Point, blocked: Point },
}

impl Candidate {
    pub const fn offset(self) -> Point {
        match self {
            Candidate::Natural(offset) | Candidate::Forced { offset, .. } => offset,
        }
    }
}

fn perpendiculars(d: Point) -> [Point; 2] {
    if d.x != 0 {
        [Point::new(0, 1), Point::new(0, -1)]
    } else {
        [Point::new(1, 0), Point::new(-1, 0)]
    }
}

/// Pruned neighbour rules for a node entered travelling along `dir`.
///
/// `dir` must be one of the eight unit offsets. With `corner_cutting` a
/// diagonal step is legal when at least one of the two cardinals it
/// straddles is walkable; without it, both must be.
pub fn neighbor_offsets(dir: Point, corner_cutting: bool) -> Vec<Candidate> {
    let mut out = Vec::with_capacity(5);
    if dir.is_diagonal() {
        let (dx, dy) = (dir.x, dir.y);
        out.push(Candidate::Natural(Point::new(dx, 0)));
        out.push(Candidate::Natural(Point::new(0, dy)));
        out.push(Candidate::Natural(dir));
        if corner_cutting {
            out.push(Candidate::Forced {
                offset: Point::new(-dx, dy),
                blocked: Point::new(-dx, 0),
            });
            out.push(Candidate::Forced {
                offset: Point::new(dx, -dy),
                blocked: Point::new(0, -dy),
            });
        }
    } else {
        out.push(Candidate::Natural(dir));
        for p in perpendiculars(dir) {
            if corner_cutting {
                out.push(Candidate::Forced {
                    offset: dir + p,
                    blocked: p,
                });
            } else {
                // The wall ended behind us: turning becomes possible.
                out.push(Candidate::Forced {
                    offset: p,
                    blocked: p - dir,
                });
                out.push(Candidate::Forced {
                    offset: dir + p,
                    blocked: p - dir,
                });
            }
        }
    }
    out
}

/// Whether the diagonal (or straight) step `offset` may be taken given the
/// walkability of the cells relative to the origin.
pub fn diagonal_ok(offset: Point, corner_cutting: bool, walkable: &impl Fn(Point) -> bool) -> bool {
    if !offset.is_diagonal() {
        return true;
    }
    let a = walkable(Point::new(offset.x, 0));
    let b = walkable(Point::new(0, offset.y));
    if corner_cutting { a || b } else { a && b }
}

fn active(c: Candidate, corner_cutting: bool, walkable: &impl Fn(Point) -> bool) -> bool {
    let offset = c.offset();
    if !walkable(offset) || !diagonal_ok(offset, corner_cutting, walkable) {
        return false;
    }
    match c {
        Candidate::Natural(_) => true,
        Candidate::Forced { blocked, .. } => !walkable(blocked),
    }
}

/// Offsets to explore from a node entered travelling along `dir`.
///
/// `walkable` answers for offsets relative to the node.
pub fn pruned_neighbors(
    dir: Point,
    corner_cutting: bool,
    walkable: impl Fn(Point) -> bool,
) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(5);
    for c in neighbor_offsets(dir, corner_cutting) {
        if active(c, corner_cutting, &walkable) && !out.contains(&c.offset()) {
            out.push(c.offset());
        }
    }
    out
}

/// Whether a node entered along `dir` has at least one forced neighbour.
pub fn has_forced_neighbor(
    dir: Point,
    corner_cutting: bool,
    walkable: impl Fn(Point) -> bool,
) -> bool {
    neighbor_offsets(dir, corner_cutting)
        .into_iter()
        .any(|c| matches!(c, Candidate::Forced { .. }) && active(c, corner_cutting, &walkable))
}

const CARDINALS: [Point; 4] = [
    Point::new(0, -1),
    Point::new(1, 0),
    Point::new(0, 1),
    Point::new(-1, 0),
];

const DIAGONALS: [Point; 4] = [
    Point::new(1, -1),
    Point::new(1, 1),
    Point::new(-1, 1),
    Point::new(-1, -1),
];

/// Unit offsets a search may try, cardinals first.
pub fn move_offsets(diagonals: bool) -> impl Iterator<Item = Point> {
    let diag: &'static [Point] = if diagonals { &DIAGONALS } else { &[] };
    CARDINALS.iter().chain(diag).copied()
}

/// Walkability of the offsets around a node, answered from the node's
/// open directions.
pub fn open_offsets(open: DirectionMask) -> impl Fn(Point) -> bool {
    move |o| Direction::from_offset(o).is_some_and(|d| open.contains(d))
}

/// The cell reached by stepping `offset` from `from`, given the directions
/// open out of `from`.
pub fn step_in(
    open: DirectionMask,
    from: Point,
    offset: Point,
    corner_cutting: bool,
) -> Option<Point> {
    let walkable = open_offsets(open);
    (walkable(offset) && diagonal_ok(offset, corner_cutting, &walkable)).then_some(from + offset)
}

/// The cell reached by stepping `offset` from `from`, if that step is
/// legal for `unit`.
pub fn step(
    grid: &dyn GridLayer,
    from: Point,
    offset: Point,
    unit: &UnitProperties,
    corner_cutting: bool,
) -> Option<Point> {
    step_in(grid.walkable_directions(from, unit), from, offset, corner_cutting)
}
