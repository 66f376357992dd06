//! Errors raised while building grids and registries.

use thiserror::Error;

use crate::geom::Point;
use crate::layer::GridId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Rows of an ASCII map have different lengths.
    #[error("grid: inconsistent row width at line {line} (expected {expected}, got {got})")]
    InconsistentWidth {
        line: usize,
        expected: usize,
        got: usize,
    },
    /// An ASCII map contains a character outside the legend.
    #[error("grid: invalid character {ch:?} at {pos}")]
    InvalidChar { ch: char, pos: Point },
    #[error("grid: cell size must be positive, got {0}")]
    InvalidCellSize(f32),
    #[error("unknown grid {0:?}")]
    UnknownGrid(GridId),
    #[error("cell {cell} is outside grid {grid:?}")]
    CellOutOfBounds { grid: GridId, cell: Point },
}
