//! The [`Cell`] type (walkability, traversal cost and clearance of one grid
//! square) and the [`AttributeMask`] that gates which units may enter it.

use std::ops::BitOr;

/// A set of unit attribute flags (e.g. "can swim", "is large").
///
/// Cells carry the attributes a unit must have to enter; units carry the
/// attributes they possess.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeMask(pub u32);

impl AttributeMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    /// Whether every flag of `other` is also set in `self`.
    #[inline]
    pub const fn contains(self, other: AttributeMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for AttributeMask {
    type Output = Self;
    #[inline]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// A single grid square.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    /// Statically blocked (wall, pit, …).
    pub blocked: bool,
    /// Extra traversal cost added when a path enters this cell.
    pub cost: i32,
    /// Attributes a unit needs to enter.
    pub required: AttributeMask,
    /// Distance in world units from the cell centre to the nearest blocked
    /// cell. Maintained by the owning grid.
    pub clearance: f32,
}

impl Cell {
    /// An open cell with no extra cost.
    pub const OPEN: Cell = Cell {
        blocked: false,
        cost: 0,
        required: AttributeMask::NONE,
        clearance: f32::MAX,
    };

    /// A blocked cell.
    pub const BLOCKED: Cell = Cell {
        blocked: true,
        cost: 0,
        required: AttributeMask::NONE,
        clearance: 0.0,
    };

    /// Set the extra cost (builder).
    #[inline]
    pub const fn with_cost(mut self, cost: i32) -> Self {
        self.cost = cost;
        self
    }

    /// Set the required attributes (builder).
    #[inline]
    pub const fn with_required(mut self, required: AttributeMask) -> Self {
        self.required = required;
        self
    }

    /// Whether a unit with `attributes` may stand here, ignoring its size.
    #[inline]
    pub fn admits(&self, attributes: AttributeMask) -> bool {
        !self.blocked && attributes.contains(self.required)
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::OPEN
    }
}
