//! Identity and physical properties of whoever asks for a path.

use crate::cell::AttributeMask;

/// Opaque identity of a requester (unit, group, script …).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RequesterId(pub u64);

/// Size and capabilities of the moving unit.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitProperties {
    /// Body radius in world units.
    pub radius: f32,
    /// Attributes the unit possesses.
    pub attributes: AttributeMask,
}

impl UnitProperties {
    /// A unit of the given radius with no special attributes.
    pub const fn with_radius(radius: f32) -> Self {
        Self {
            radius,
            attributes: AttributeMask::NONE,
        }
    }

    /// The same unit shrunk to a point, for corridor scans that account
    /// for the radius geometrically.
    pub const fn point_sized(self) -> Self {
        Self {
            radius: 0.0,
            attributes: self.attributes,
        }
    }
}

impl Default for UnitProperties {
    fn default() -> Self {
        Self::with_radius(0.5)
    }
}
