//! Straight-corridor clearance test used by the smoother and by the
//! unobstructed-path shortcut.
//!
//! The corridor is the rectangle swept by a disc of the unit's radius
//! moving from one point to the other, with flat caps at both ends. It is
//! rasterised column by column: in each cell column the rectangle's two
//! tangent edges and two secant caps are clipped to the column slab, which
//! gives the covered row span.

use gridroute_core::{GridLayer, Point, UnitProperties, Vec2};

use crate::cost::CellCostStrategy;

/// Cells that the corridor only touches along an edge are not covered.
const EPS: f32 = 1e-4;

/// Minimum half-width, as a fraction of the cell size, so that point-sized
/// units still see the cells their line grazes.
const MIN_HALF_WIDTH: f32 = 0.05;

/// Whether a unit can walk in a straight line from `from` to `to` on
/// `grid`: every cell under the corridor lies on the grid, admits the unit,
/// and costs no more than the cells under either endpoint.
pub fn can_reduce_path(
    grid: &dyn GridLayer,
    from: Vec2,
    to: Vec2,
    unit: &UnitProperties,
    cell_costs: &dyn CellCostStrategy,
) -> bool {
    let cost_at = |pos: Vec2| -> Option<i32> {
        let cell = grid.cell(grid.cell_at(pos)?)?;
        Some(cell_costs.cell_cost(cell, unit))
    };
    let (Some(ca), Some(cb)) = (cost_at(from), cost_at(to)) else {
        return false;
    };
    let max_cost = ca.min(cb);
    let point_unit = unit.point_sized();
    let ok = |p: Point| {
        grid.is_walkable(p, &point_unit)
            && grid
                .cell(p)
                .is_some_and(|c| cell_costs.cell_cost(c, unit) <= max_cost)
    };

    let cs = grid.cell_size();
    let min = grid.bounds().min;
    let local = |pos: Vec2| (pos - grid.origin()) / cs + Vec2::new(min.x as f32, min.y as f32);
    let (a, b) = (local(from), local(to));
    let hw = (unit.radius.max(MIN_HALF_WIDTH * cs)) / cs;

    let dir = b - a;
    let len = dir.length();
    if len < EPS {
        return cells_in_box(a - Vec2::splat(hw), a + Vec2::splat(hw)).all(ok);
    }
    let n = Vec2::new(-dir.y, dir.x) / len * hw;
    let corners = [a + n, b + n, b - n, a - n];
    let lo_x = corners.iter().map(|c| c.x).fold(f32::INFINITY, f32::min);
    let hi_x = corners.iter().map(|c| c.x).fold(f32::NEG_INFINITY, f32::max);

    let x0 = (lo_x + EPS).floor() as i32;
    let x1 = (hi_x - EPS).floor() as i32;
    for x in x0..=x1 {
        let slab_lo = (x as f32).max(lo_x);
        let slab_hi = ((x + 1) as f32).min(hi_x);
        let Some((y_lo, y_hi)) = column_span(&corners, slab_lo, slab_hi) else {
            continue;
        };
        let y0 = (y_lo + EPS).floor() as i32;
        let y1 = (y_hi - EPS).floor() as i32;
        if !(y0..=y1).all(|y| ok(Point::new(x, y))) {
            return false;
        }
    }
    true
}

fn cells_in_box(lo: Vec2, hi: Vec2) -> impl Iterator<Item = Point> {
    let (x0, x1) = ((lo.x + EPS).floor() as i32, (hi.x - EPS).floor() as i32);
    let (y0, y1) = ((lo.y + EPS).floor() as i32, (hi.y - EPS).floor() as i32);
    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| Point::new(x, y)))
}

/// Row span of the convex polygon `corners` between `x = lo` and `x = hi`.
fn column_span(corners: &[Vec2; 4], lo: f32, hi: f32) -> Option<(f32, f32)> {
    let mut span: Option<(f32, f32)> = None;
    let mut add = |y: f32| {
        span = Some(match span {
            Some((a, b)) => (a.min(y), b.max(y)),
            None => (y, y),
        });
    };
    for i in 0..4 {
        let (p, q) = (corners[i], corners[(i + 1) % 4]);
        let (ex_lo, ex_hi) = (p.x.min(q.x), p.x.max(q.x));
        if ex_hi < lo || ex_lo > hi {
            continue;
        }
        if (q.x - p.x).abs() < f32::EPSILON {
            add(p.y);
            add(q.y);
            continue;
        }
        let at = |x: f32| p.y + (q.y - p.y) * (x - p.x) / (q.x - p.x);
        add(at(ex_lo.max(lo)));
        add(at(ex_hi.min(hi)));
    }
    span
}
