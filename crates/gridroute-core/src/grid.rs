//! [`CellGrid`], the reference [`GridLayer`]: a dense row-major array of
//! [`Cell`]s with per-cell clearance kept up to date as cells are blocked
//! and opened.

use glam::Vec2;

use crate::cell::{AttributeMask, Cell};
use crate::error::GridError;
use crate::geom::{Point, Range};
use crate::layer::{GridId, GridLayer};

/// How far (in cells) clearance is measured. Cells with no blocked cell
/// within this window report unbounded clearance.
pub const CLEARANCE_WINDOW: i32 = 8;

/// Attribute required by `~` cells in ASCII maps.
pub const SWIM: AttributeMask = AttributeMask(1);

/// A dense grid of cells.
#[derive(Debug, Clone)]
pub struct CellGrid {
    id: GridId,
    origin: Vec2,
    cell_size: f32,
    bounds: Range,
    cells: Vec<Cell>,
}

impl CellGrid {
    /// Create an open `width × height` grid with its corner at the world
    /// origin.
    pub fn new(width: i32, height: i32, cell_size: f32) -> Result<Self, GridError> {
        if !(cell_size > 0.0) {
            return Err(GridError::InvalidCellSize(cell_size));
        }
        let bounds = Range::new(0, 0, width.max(0), height.max(0));
        Ok(Self {
            id: GridId(0),
            origin: Vec2::ZERO,
            cell_size,
            bounds,
            cells: vec![Cell::OPEN; bounds.len()],
        })
    }

    /// Parse an ASCII map, one row per line.
    ///
    /// | char | cell |
    /// |---|---|
    /// | `.` | open |
    /// | `#` | blocked |
    /// | `1`–`9` | open, extra cost of ten times the digit |
    /// | `~` | open, requires [`SWIM`] |
    ///
    /// Leading and trailing blank lines are ignored.
    pub fn from_ascii(map: &str, cell_size: f32) -> Result<Self, GridError> {
        let rows: Vec<&str> = map
            .lines()
            .map(str::trim)
            .skip_while(|l| l.is_empty())
            .collect();
        let rows: Vec<&str> = match rows.iter().rposition(|l| !l.is_empty()) {
            Some(last) => rows[..=last].to_vec(),
            None => Vec::new(),
        };
        let width = rows.first().map_or(0, |r| r.chars().count());
        let mut grid = Self::new(width as i32, rows.len() as i32, cell_size)?;
        for (y, row) in rows.iter().enumerate() {
            let got = row.chars().count();
            if got != width {
                return Err(GridError::InconsistentWidth {
                    line: y,
                    expected: width,
                    got,
                });
            }
            for (x, ch) in row.chars().enumerate() {
                let pos = Point::new(x as i32, y as i32);
                let cell = match ch {
                    '.' => Cell::OPEN,
                    '#' => Cell::BLOCKED,
                    '~' => Cell::OPEN.with_required(SWIM),
                    '1'..='9' => Cell::OPEN.with_cost(10 * (ch as i32 - '0' as i32)),
                    _ => return Err(GridError::InvalidChar { ch, pos }),
                };
                grid.put(pos, cell);
            }
        }
        grid.recompute_clearance(grid.bounds);
        Ok(grid)
    }

    /// Place the grid's outer corner at `origin` (builder).
    pub fn with_origin(mut self, origin: Vec2) -> Self {
        self.origin = origin;
        self
    }

    pub(crate) fn set_id(&mut self, id: GridId) {
        self.id = id;
    }

    /// Width in cells.
    pub fn width(&self) -> i32 {
        self.bounds.width()
    }

    /// Height in cells.
    pub fn height(&self) -> i32 {
        self.bounds.height()
    }

    /// Mutable access for bulk edits; call
    /// [`recompute_clearance`](Self::recompute_clearance) afterwards.
    pub fn cell_mut(&mut self, p: Point) -> Option<&mut Cell> {
        let i = self.bounds.index(p)?;
        self.cells.get_mut(i)
    }

    /// Replace the cell at `p`, keeping clearance consistent.
    pub fn set(&mut self, p: Point, cell: Cell) -> Result<(), GridError> {
        if !self.put(p, cell) {
            return Err(GridError::CellOutOfBounds {
                grid: self.id,
                cell: p,
            });
        }
        let w = CLEARANCE_WINDOW;
        let window = Range::new(p.x - w, p.y - w, p.x + w + 1, p.y + w + 1);
        self.recompute_clearance(window.intersect(self.bounds));
        Ok(())
    }

    /// Block or open the cell at `p`.
    pub fn set_blocked(&mut self, p: Point, blocked: bool) -> Result<(), GridError> {
        let cell = match self.cell(p) {
            Some(c) => Cell { blocked, ..*c },
            None => {
                return Err(GridError::CellOutOfBounds {
                    grid: self.id,
                    cell: p,
                });
            }
        };
        self.set(p, cell)
    }

    /// Block every cell of `rng` (clipped to the grid).
    pub fn block_range(&mut self, rng: Range) {
        let rng = rng.intersect(self.bounds);
        for p in rng {
            if let Some(c) = self.cell_mut(p) {
                c.blocked = true;
            }
        }
        let w = CLEARANCE_WINDOW;
        let window = Range::new(
            rng.min.x - w,
            rng.min.y - w,
            rng.max.x + w,
            rng.max.y + w,
        );
        self.recompute_clearance(window.intersect(self.bounds));
    }

    /// Recompute clearance for every cell of `rng`.
    pub fn recompute_clearance(&mut self, rng: Range) {
        for p in rng.intersect(self.bounds) {
            let clearance = self.measure_clearance(p);
            if let Some(c) = self.cell_mut(p) {
                c.clearance = clearance;
            }
        }
    }

    fn put(&mut self, p: Point, cell: Cell) -> bool {
        match self.cell_mut(p) {
            Some(c) => {
                *c = cell;
                true
            }
            None => false,
        }
    }

    /// Distance from the centre of `p` to the closest blocked cell square.
    fn measure_clearance(&self, p: Point) -> f32 {
        let w = CLEARANCE_WINDOW;
        let mut best = f32::MAX;
        for dy in -w..=w {
            for dx in -w..=w {
                let q = p.shift(dx, dy);
                if !self.cell(q).is_some_and(|c| c.blocked) {
                    continue;
                }
                let ex = (dx.abs() as f32 - 0.5).max(0.0);
                let ey = (dy.abs() as f32 - 0.5).max(0.0);
                let d = if dx == 0 && dy == 0 {
                    0.0
                } else {
                    (ex * ex + ey * ey).sqrt() * self.cell_size
                };
                best = best.min(d);
            }
        }
        best
    }
}

impl GridLayer for CellGrid {
    fn id(&self) -> GridId {
        self.id
    }

    fn bounds(&self) -> Range {
        self.bounds
    }

    fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn origin(&self) -> Vec2 {
        self.origin
    }

    fn cell(&self, p: Point) -> Option<&Cell> {
        self.cells.get(self.bounds.index(p)?)
    }
}
