//! **gridroute-core**: the grid model consumed by the gridroute search
//! engine.
//!
//! The engine only talks to the [`GridLayer`] and [`GridProvider`] traits.
//! [`CellGrid`] and [`GridSet`] are ready-made implementations for hosts
//! that do not bring their own world representation, and for tests.

pub mod cell;
pub mod error;
pub mod geom;
pub mod grid;
pub mod layer;
pub mod portal;
pub mod unit;
pub mod world;

pub use cell::{AttributeMask, Cell};
pub use error::GridError;
pub use geom::{Direction, DirectionMask, Point, Range};
pub use glam::Vec2;
pub use grid::{CellGrid, SWIM};
pub use layer::{GridId, GridLayer, GridProvider, ring};
pub use portal::{Portal, PortalEnd, PortalEndpoint, PortalEntry, PortalId, PortalKind};
pub use unit::{RequesterId, UnitProperties};
pub use world::GridSet;
