//! Portals: non-adjacent links between two cells, possibly on different
//! grids (teleporters, ladders, stitched grid seams).

use crate::geom::Point;
use crate::layer::GridId;

/// Dense index of a portal inside its provider.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortalId(pub u32);

impl PortalId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which side of a portal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortalEnd {
    A,
    B,
}

impl PortalEnd {
    /// The opposite side.
    #[inline]
    pub const fn twin(self) -> Self {
        match self {
            PortalEnd::A => PortalEnd::B,
            PortalEnd::B => PortalEnd::A,
        }
    }

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            PortalEnd::A => 0,
            PortalEnd::B => 1,
        }
    }
}

/// A portal side anchored at an access cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortalEndpoint {
    pub grid: GridId,
    pub cell: Point,
}

/// How the engine treats a portal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortalKind {
    /// Joins grids; only discovered by expanding its access cell.
    #[default]
    Connector,
    /// Also folded into the heuristic of every node on its entry grid, so
    /// the search is pulled toward it when it shortens the way to the goal.
    Shortcut,
}

/// A link between two [`PortalEndpoint`]s.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Portal {
    pub id: PortalId,
    pub a: PortalEndpoint,
    pub b: PortalEndpoint,
    pub kind: PortalKind,
    /// If `false` the portal can only be entered at `a`.
    pub bidirectional: bool,
    /// Fixed traversal cost; `None` means the metric distance between the
    /// two endpoint positions.
    pub cost: Option<i32>,
}

impl Portal {
    /// The endpoint on side `end`.
    #[inline]
    pub const fn endpoint(&self, end: PortalEnd) -> PortalEndpoint {
        match end {
            PortalEnd::A => self.a,
            PortalEnd::B => self.b,
        }
    }

    /// Whether the portal may be entered at `end`.
    #[inline]
    pub const fn enterable_at(&self, end: PortalEnd) -> bool {
        matches!(end, PortalEnd::A) || self.bidirectional
    }

    /// Sides through which the portal can be entered.
    pub fn entries(&self) -> impl Iterator<Item = PortalEntry> + '_ {
        [PortalEnd::A, PortalEnd::B]
            .into_iter()
            .filter(|&end| self.enterable_at(end))
            .map(|end| PortalEntry {
                portal: self.id,
                end,
            })
    }
}

/// "Portal `portal` can be entered at side `end`".
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortalEntry {
    pub portal: PortalId,
    pub end: PortalEnd,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn portal(bidirectional: bool) -> Portal {
        Portal {
            id: PortalId(3),
            a: PortalEndpoint {
                grid: GridId(0),
                cell: Point::new(1, 1),
            },
            b: PortalEndpoint {
                grid: GridId(1),
                cell: Point::new(4, 2),
            },
            kind: PortalKind::Connector,
            bidirectional,
            cost: None,
        }
    }

    #[test]
    fn one_way_portal_has_single_entry() {
        let p = portal(false);
        let entries: Vec<_> = p.entries().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].end, PortalEnd::A);
        assert!(!p.enterable_at(PortalEnd::B));
    }

    #[test]
    fn twin_endpoints() {
        let p = portal(true);
        assert_eq!(p.entries().count(), 2);
        assert_eq!(p.endpoint(PortalEnd::A.twin()), p.b);
        assert_eq!(PortalEnd::B.twin().index(), 0);
    }
}
