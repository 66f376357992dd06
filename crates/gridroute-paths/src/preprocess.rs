//! Hooks that may rewrite a leg before it is searched.

use std::fmt;

use gridroute_core::GridProvider;

use crate::request::CustomData;
use crate::segments::SegmentRequest;

pub trait Preprocessor: Send + Sync {
    /// Higher runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inspect or rewrite `segment`. Returning `true` claims the segment and
    /// stops lower-priority pre-processors from running.
    fn process(
        &self,
        segment: &mut SegmentRequest,
        custom: &mut CustomData,
        grids: &dyn GridProvider,
    ) -> bool;
}

/// Priority-ordered pre-processor chain.
#[derive(Default)]
pub struct Preprocessors {
    list: Vec<Box<dyn Preprocessor>>,
}

impl Preprocessors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, p: impl Preprocessor + 'static) {
        self.list.push(Box::new(p));
        // Stable: equal priorities keep insertion order.
        self.list.sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Run the chain; returns whether some pre-processor claimed the leg.
    pub fn run(
        &self,
        segment: &mut SegmentRequest,
        custom: &mut CustomData,
        grids: &dyn GridProvider,
    ) -> bool {
        self.list.iter().any(|p| p.process(segment, custom, grids))
    }
}

impl fmt::Debug for Preprocessors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocessors")
            .field("len", &self.list.len())
            .finish()
    }
}

/// Moves an unwalkable destination to the nearest walkable cell centre
/// within `max_distance` rings.
#[derive(Copy, Clone, Debug)]
pub struct ClearDestination {
    pub max_distance: i32,
    pub priority: i32,
}

impl Default for ClearDestination {
    fn default() -> Self {
        Self {
            max_distance: 3,
            priority: 0,
        }
    }
}

impl Preprocessor for ClearDestination {
    fn priority(&self) -> i32 {
        self.priority
    }

    fn process(
        &self,
        segment: &mut SegmentRequest,
        _custom: &mut CustomData,
        grids: &dyn GridProvider,
    ) -> bool {
        let Some(grid) = grids.grid_at(segment.to) else {
            return false;
        };
        let Some(cell) = grid.cell_at(segment.to) else {
            return false;
        };
        if grid.is_walkable(cell, &segment.unit) {
            return false;
        }
        match grid.nearest_walkable(segment.to, self.max_distance, &segment.unit) {
            Some(p) => {
                let to = grid.position(p);
                log::trace!("destination {} moved to {}", segment.to, to);
                segment.to = to;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::PathOptions;
    use gridroute_core::{CellGrid, GridSet, UnitProperties, Vec2};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn segment(to: Vec2) -> SegmentRequest {
        SegmentRequest {
            from: Vec2::new(0.5, 0.5),
            to,
            unit: UnitProperties::with_radius(0.0),
            options: PathOptions::default(),
            index: 0,
            is_last: true,
        }
    }

    #[test]
    fn clear_destination_snaps_to_open_cell() {
        let grids = GridSet::single(CellGrid::from_ascii("..#", 1.0).unwrap());
        let mut seg = segment(Vec2::new(2.5, 0.5));
        let mut custom = None;
        assert!(ClearDestination::default().process(&mut seg, &mut custom, &grids));
        assert_eq!(seg.to, Vec2::new(1.5, 0.5));

        let mut open = segment(Vec2::new(1.2, 0.5));
        assert!(!ClearDestination::default().process(&mut open, &mut custom, &grids));
        assert_eq!(open.to, Vec2::new(1.2, 0.5));
    }

    struct Counter {
        priority: i32,
        claim: bool,
        order: Arc<AtomicUsize>,
        seen_at: Arc<AtomicUsize>,
    }

    impl Preprocessor for Counter {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn process(&self, _: &mut SegmentRequest, _: &mut CustomData, _: &dyn GridProvider) -> bool {
            let n = self.order.fetch_add(1, Ordering::SeqCst);
            self.seen_at.store(n + 1, Ordering::SeqCst);
            self.claim
        }
    }

    #[test]
    fn chain_runs_by_priority_until_claimed() {
        let order = Arc::new(AtomicUsize::new(0));
        let low = Arc::new(AtomicUsize::new(0));
        let high = Arc::new(AtomicUsize::new(0));
        let mid = Arc::new(AtomicUsize::new(0));
        let mut chain = Preprocessors::new();
        for (priority, claim, seen) in [(1, false, &low), (9, false, &high), (5, true, &mid)] {
            chain.push(Counter {
                priority,
                claim,
                order: order.clone(),
                seen_at: seen.clone(),
            });
        }
        let grids = GridSet::new();
        let mut seg = segment(Vec2::ZERO);
        assert!(chain.run(&mut seg, &mut None, &grids));
        assert_eq!(high.load(Ordering::SeqCst), 1);
        assert_eq!(mid.load(Ordering::SeqCst), 2);
        assert_eq!(low.load(Ordering::SeqCst), 0);
    }
}
