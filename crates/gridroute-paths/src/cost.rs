use gridroute_core::{Cell, UnitProperties};

/// Extra cost a unit pays for entering a cell, on top of the move cost.
pub trait CellCostStrategy: Send + Sync {
    fn cell_cost(&self, cell: &Cell, unit: &UnitProperties) -> i32;
}

/// Uses the cell's own cost, ignoring negative values.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultCellCost;

impl CellCostStrategy for DefaultCellCost {
    #[inline]
    fn cell_cost(&self, cell: &Cell, _unit: &UnitProperties) -> i32 {
        cell.cost.max(0)
    }
}
