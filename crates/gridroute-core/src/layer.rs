//! The narrow interfaces the search engine consumes: a single [`GridLayer`]
//! and the multi-grid [`GridProvider`] that resolves positions to grids and
//! exposes portal links between them.

use glam::Vec2;

use crate::cell::Cell;
use crate::geom::{Direction, DirectionMask, Point, Range};
use crate::portal::{Portal, PortalEntry, PortalId};
use crate::unit::UnitProperties;

/// Dense index of a grid inside its provider (`0..grid_count`).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridId(pub u32);

impl GridId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A rectangular grid of cells placed in world space.
///
/// Only [`id`](Self::id), [`bounds`](Self::bounds),
/// [`cell_size`](Self::cell_size), [`origin`](Self::origin) and
/// [`cell`](Self::cell) are required; everything else derives from them and
/// may be overridden by hosts with richer rules (height steps, dynamic
/// obstacles, …).
pub trait GridLayer: Send + Sync {
    fn id(&self) -> GridId;

    /// Cell-space extent.
    fn bounds(&self) -> Range;

    /// Edge length of one cell in world units.
    fn cell_size(&self) -> f32;

    /// World position of the outer corner of `bounds().min`.
    fn origin(&self) -> Vec2;

    /// Cell data at `p`, or `None` outside the grid.
    fn cell(&self, p: Point) -> Option<&Cell>;

    /// Cell containing the world position, if any.
    fn cell_at(&self, pos: Vec2) -> Option<Point> {
        let p = self.unclamped_cell(pos);
        self.bounds().contains(p).then_some(p)
    }

    /// Cell coordinate of `pos`, possibly outside the grid.
    fn unclamped_cell(&self, pos: Vec2) -> Point {
        let rel = (pos - self.origin()) / self.cell_size();
        let min = self.bounds().min;
        Point::new(rel.x.floor() as i32 + min.x, rel.y.floor() as i32 + min.y)
    }

    /// Whether `pos` lies on this grid.
    fn contains(&self, pos: Vec2) -> bool {
        self.cell_at(pos).is_some()
    }

    /// World position of the centre of `p`.
    fn position(&self, p: Point) -> Vec2 {
        let min = self.bounds().min;
        let cs = self.cell_size();
        self.origin()
            + Vec2::new(
                (p.x - min.x) as f32 * cs + cs * 0.5,
                (p.y - min.y) as f32 * cs + cs * 0.5,
            )
    }

    /// Neighbour of `p` at `offset`, if it exists.
    fn neighbor(&self, p: Point, offset: Point) -> Option<Point> {
        let n = p + offset;
        self.bounds().contains(n).then_some(n)
    }

    /// Whether `unit` fits in `p`: open, admitted by attributes and with
    /// enough clearance for its radius.
    fn is_walkable(&self, p: Point, unit: &UnitProperties) -> bool {
        self.cell(p)
            .is_some_and(|c| c.admits(unit.attributes) && c.clearance >= unit.radius)
    }

    /// Whether `unit` may step from `from` into the adjacent `to`.
    fn is_walkable_from(&self, _from: Point, to: Point, unit: &UnitProperties) -> bool {
        self.is_walkable(to, unit)
    }

    /// Directions in which a step out of `p` lands on a walkable cell.
    fn walkable_directions(&self, p: Point, unit: &UnitProperties) -> DirectionMask {
        Direction::ALL
            .into_iter()
            .filter(|d| {
                self.neighbor(p, d.offset())
                    .is_some_and(|n| self.is_walkable_from(p, n, unit))
            })
            .collect()
    }

    /// Walkable cell nearest to `pos`, searching square rings out to
    /// `max_distance` cells around the (clamped) cell under `pos`.
    fn nearest_walkable(
        &self,
        pos: Vec2,
        max_distance: i32,
        unit: &UnitProperties,
    ) -> Option<Point> {
        let bounds = self.bounds();
        if bounds.is_empty() {
            return None;
        }
        let center = bounds.clamp(self.unclamped_cell(pos));
        for r in 0..=max_distance.max(0) {
            let mut best: Option<(f32, Point)> = None;
            for p in ring(center, r) {
                if !bounds.contains(p) || !self.is_walkable(p, unit) {
                    continue;
                }
                let d = self.position(p).distance_squared(pos);
                if best.is_none_or(|(bd, _)| d < bd) {
                    best = Some((d, p));
                }
            }
            if let Some((_, p)) = best {
                return Some(p);
            }
        }
        None
    }
}

/// Cells at Chebyshev distance exactly `r` from `center`.
pub fn ring(center: Point, r: i32) -> impl Iterator<Item = Point> {
    let side = (-r..=r).flat_map(move |dy| (-r..=r).map(move |dx| Point::new(dx, dy)));
    side.filter(move |d| d.chebyshev_len() == r)
        .map(move |d| center + d)
}

/// Registry of grids and the portals linking them.
///
/// Grid ids are dense indices `0..grid_count()`, portal ids dense indices
/// `0..portal_count()`, so the engine can lay out node storage flat.
pub trait GridProvider: Send + Sync {
    fn grid_count(&self) -> usize;

    fn grid(&self, id: GridId) -> Option<&dyn GridLayer>;

    /// The grid that owns world position `pos`.
    fn grid_at(&self, pos: Vec2) -> Option<&dyn GridLayer> {
        (0..self.grid_count() as u32)
            .filter_map(|i| self.grid(GridId(i)))
            .find(|g| g.contains(pos))
    }

    fn portal_count(&self) -> usize {
        0
    }

    fn portal(&self, _id: PortalId) -> Option<&Portal> {
        None
    }

    /// Portal ends that can be entered from `cell` on `grid`.
    fn portals_at(&self, _grid: GridId, _cell: Point) -> &[PortalEntry] {
        &[]
    }

    /// Shortcut portal ends that can be entered somewhere on `grid`.
    fn shortcut_portals(&self, _grid: GridId) -> &[PortalEntry] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_sizes() {
        assert_eq!(ring(Point::ZERO, 0).count(), 1);
        assert_eq!(ring(Point::ZERO, 1).count(), 8);
        assert_eq!(ring(Point::ZERO, 2).count(), 16);
        assert!(ring(Point::new(5, 5), 2).all(|p| (p - Point::new(5, 5)).chebyshev_len() == 2));
    }
}
