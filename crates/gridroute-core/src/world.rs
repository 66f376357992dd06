//! [`GridSet`], the reference [`GridProvider`]: an ordered list of
//! [`CellGrid`]s plus the portals linking them.

use std::collections::HashMap;

use glam::Vec2;

use crate::error::GridError;
use crate::geom::Point;
use crate::grid::CellGrid;
use crate::layer::{GridId, GridLayer, GridProvider};
use crate::portal::{Portal, PortalEndpoint, PortalEntry, PortalId, PortalKind};

/// A registry of grids and portals.
///
/// When grids overlap in world space, [`grid_at`](GridProvider::grid_at)
/// returns the one added first.
#[derive(Debug, Default, Clone)]
pub struct GridSet {
    grids: Vec<CellGrid>,
    portals: Vec<Portal>,
    by_cell: HashMap<(GridId, Point), Vec<PortalEntry>>,
    shortcuts: Vec<Vec<PortalEntry>>,
}

impl GridSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A set holding a single grid.
    pub fn single(grid: CellGrid) -> Self {
        let mut set = Self::new();
        set.add_grid(grid);
        set
    }

    /// Register a grid and return its id.
    pub fn add_grid(&mut self, mut grid: CellGrid) -> GridId {
        let id = GridId(self.grids.len() as u32);
        grid.set_id(id);
        self.grids.push(grid);
        self.shortcuts.push(Vec::new());
        id
    }

    /// Mutable access to a registered grid.
    pub fn grid_mut(&mut self, id: GridId) -> Option<&mut CellGrid> {
        self.grids.get_mut(id.index())
    }

    /// Link two cells with a portal.
    pub fn add_portal(
        &mut self,
        a: PortalEndpoint,
        b: PortalEndpoint,
        kind: PortalKind,
        bidirectional: bool,
        cost: Option<i32>,
    ) -> Result<PortalId, GridError> {
        for end in [a, b] {
            let grid = self
                .grids
                .get(end.grid.index())
                .ok_or(GridError::UnknownGrid(end.grid))?;
            if !grid.bounds().contains(end.cell) {
                return Err(GridError::CellOutOfBounds {
                    grid: end.grid,
                    cell: end.cell,
                });
            }
        }
        let id = PortalId(self.portals.len() as u32);
        let portal = Portal {
            id,
            a,
            b,
            kind,
            bidirectional,
            cost,
        };
        for entry in portal.entries() {
            let at = portal.endpoint(entry.end);
            self.by_cell.entry((at.grid, at.cell)).or_default().push(entry);
            if kind == PortalKind::Shortcut {
                self.shortcuts[at.grid.index()].push(entry);
            }
        }
        self.portals.push(portal);
        Ok(id)
    }

    /// Iterate registered grids in id order.
    pub fn grids(&self) -> impl Iterator<Item = &CellGrid> {
        self.grids.iter()
    }
}

impl GridProvider for GridSet {
    fn grid_count(&self) -> usize {
        self.grids.len()
    }

    fn grid(&self, id: GridId) -> Option<&dyn GridLayer> {
        self.grids.get(id.index()).map(|g| g as &dyn GridLayer)
    }

    fn grid_at(&self, pos: Vec2) -> Option<&dyn GridLayer> {
        self.grids
            .iter()
            .find(|g| g.contains(pos))
            .map(|g| g as &dyn GridLayer)
    }

    fn portal_count(&self) -> usize {
        self.portals.len()
    }

    fn portal(&self, id: PortalId) -> Option<&Portal> {
        self.portals.get(id.index())
    }

    fn portals_at(&self, grid: GridId, cell: Point) -> &[PortalEntry] {
        self.by_cell
            .get(&(grid, cell))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn shortcut_portals(&self, grid: GridId) -> &[PortalEntry] {
        self.shortcuts
            .get(grid.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::PortalEnd;

    fn two_grids() -> GridSet {
        let mut set = GridSet::new();
        set.add_grid(CellGrid::new(4, 4, 1.0).unwrap());
        set.add_grid(
            CellGrid::new(4, 4, 1.0)
                .unwrap()
                .with_origin(Vec2::new(10.0, 0.0)),
        );
        set
    }

    fn end(grid: u32, x: i32, y: i32) -> PortalEndpoint {
        PortalEndpoint {
            grid: GridId(grid),
            cell: Point::new(x, y),
        }
    }

    #[test]
    fn grid_lookup_by_position() {
        let set = two_grids();
        assert_eq!(set.grid_at(Vec2::new(1.0, 1.0)).map(|g| g.id()), Some(GridId(0)));
        assert_eq!(set.grid_at(Vec2::new(11.0, 1.0)).map(|g| g.id()), Some(GridId(1)));
        assert!(set.grid_at(Vec2::new(6.0, 1.0)).is_none());
    }

    #[test]
    fn portals_indexed_by_entry_cell() {
        let mut set = two_grids();
        let id = set
            .add_portal(end(0, 3, 1), end(1, 0, 1), PortalKind::Shortcut, false, None)
            .unwrap();
        assert_eq!(
            set.portals_at(GridId(0), Point::new(3, 1)),
            &[PortalEntry {
                portal: id,
                end: PortalEnd::A
            }]
        );
        // One-way: the far side is not an entry.
        assert!(set.portals_at(GridId(1), Point::new(0, 1)).is_empty());
        assert_eq!(set.shortcut_portals(GridId(0)).len(), 1);
        assert!(set.shortcut_portals(GridId(1)).is_empty());
    }

    #[test]
    fn portal_validation() {
        let mut set = two_grids();
        assert!(matches!(
            set.add_portal(end(0, 0, 0), end(7, 0, 0), PortalKind::Connector, true, None),
            Err(GridError::UnknownGrid(GridId(7)))
        ));
        assert!(matches!(
            set.add_portal(end(0, 9, 0), end(1, 0, 0), PortalKind::Connector, true, None),
            Err(GridError::CellOutOfBounds { .. })
        ));
    }
}
