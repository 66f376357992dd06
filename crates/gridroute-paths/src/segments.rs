//! Splitting a `from → via… → to` request into single-destination legs.

use gridroute_core::{UnitProperties, Vec2};

use crate::request::PathOptions;

/// One leg of a request, as the search engine sees it. Pre-processors may
/// rewrite `from` and `to`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SegmentRequest {
    pub from: Vec2,
    pub to: Vec2,
    pub unit: UnitProperties,
    pub options: PathOptions,
    /// Position of this leg, starting at 0.
    pub index: usize,
    /// Whether `to` is the request's final destination.
    pub is_last: bool,
}

/// Walks the legs of a request in order.
#[derive(Clone, Debug)]
pub struct Segments {
    from: Vec2,
    waypoints: Vec<Vec2>,
    index: usize,
}

impl Segments {
    pub fn new(from: Vec2, via: &[Vec2], to: Vec2) -> Self {
        let mut waypoints = Vec::with_capacity(via.len() + 1);
        waypoints.extend_from_slice(via);
        waypoints.push(to);
        Self {
            from,
            waypoints,
            index: 0,
        }
    }

    /// Total number of legs.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_done(&self) -> bool {
        self.index >= self.waypoints.len()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.waypoints.len()
    }

    /// The current leg, or `None` once every leg was walked.
    pub fn request(&self, unit: UnitProperties, options: PathOptions) -> Option<SegmentRequest> {
        let to = *self.waypoints.get(self.index)?;
        Some(SegmentRequest {
            from: self.from,
            to,
            unit,
            options,
            index: self.index,
            is_last: self.is_last(),
        })
    }

    /// Move to the next leg, which starts where the current one ended.
    pub fn advance(&mut self, reached: Vec2) {
        self.from = reached;
        self.index = (self.index + 1).min(self.waypoints.len());
    }

    /// The current leg's destination and every later waypoint.
    pub fn pending_waypoints(&self) -> &[Vec2] {
        &self.waypoints[self.index.min(self.waypoints.len())..]
    }
}
