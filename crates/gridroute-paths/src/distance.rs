//! Distance metrics and the [`CostProvider`] seam.
//!
//! Costs are integers in units of [`DEFAULT_BASE_COST`] per cell step.
//! Move costs round (Euclidean rounds up) while heuristics round down, so
//! every built-in metric stays admissible against its own move costs.

use glam::Vec2;

/// Cost of one straight cell step.
pub const DEFAULT_BASE_COST: i32 = 10;

/// Slack absorbed before rounding up, so that a float step of `1.0000001`
/// cells does not cost an extra unit.
const ROUNDING_SLACK: f32 = 1e-3;

/// Built-in distance metrics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Metric {
    /// Octile: straight steps cost `base`, diagonal steps `round(base·√2)`.
    #[default]
    Diagonal,
    /// Straight-line distance.
    Euclidean,
    /// Chebyshev: a diagonal step costs the same as a straight one.
    Cardinal,
    /// Manhattan: a diagonal step costs two straight ones.
    Manhattan,
}

impl Metric {
    /// Distance in cost units for a displacement of `(dx, dy)` cells.
    pub fn distance(self, dx: f32, dy: f32, base: i32) -> f32 {
        let (dx, dy) = (dx.abs(), dy.abs());
        let base = base as f32;
        match self {
            Metric::Diagonal => {
                let (lo, hi) = if dx < dy { (dx, dy) } else { (dy, dx) };
                let diag = (base * std::f32::consts::SQRT_2).round();
                (hi - lo) * base + lo * diag
            }
            Metric::Euclidean => dx.hypot(dy) * base,
            Metric::Cardinal => dx.max(dy) * base,
            Metric::Manhattan => (dx + dy) * base,
        }
    }
}

/// Move-cost and heuristic functions used by the search engine.
pub trait CostProvider: Send + Sync {
    /// Cost of one straight cell step.
    fn base_cost(&self) -> i32;

    /// Cost of moving between two world positions on a grid with the given
    /// cell size. Must be positive for distinct cells.
    fn move_cost(&self, from: Vec2, to: Vec2, cell_size: f32) -> i32;

    /// Estimated cost from `from` to `to`. Must never overestimate the sum
    /// of [`move_cost`](Self::move_cost)s along any route (admissible).
    fn heuristic(&self, from: Vec2, to: Vec2, cell_size: f32) -> i32;
}

/// [`CostProvider`] backed by one of the built-in [`Metric`]s.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricCost {
    pub metric: Metric,
    pub base: i32,
}

impl MetricCost {
    pub const fn new(metric: Metric) -> Self {
        Self {
            metric,
            base: DEFAULT_BASE_COST,
        }
    }

    fn cells(from: Vec2, to: Vec2, cell_size: f32) -> (f32, f32) {
        let d = (to - from) / cell_size;
        (d.x, d.y)
    }
}

impl Default for MetricCost {
    fn default() -> Self {
        Self::new(Metric::default())
    }
}

impl CostProvider for MetricCost {
    fn base_cost(&self) -> i32 {
        self.base
    }

    fn move_cost(&self, from: Vec2, to: Vec2, cell_size: f32) -> i32 {
        let (dx, dy) = Self::cells(from, to, cell_size);
        let d = self.metric.distance(dx, dy, self.base);
        let cost = match self.metric {
            Metric::Euclidean => (d - ROUNDING_SLACK).ceil(),
            _ => d.round(),
        };
        (cost as i32).max(1)
    }

    fn heuristic(&self, from: Vec2, to: Vec2, cell_size: f32) -> i32 {
        let (dx, dy) = Self::cells(from, to, cell_size);
        (self.metric.distance(dx, dy, self.base) + ROUNDING_SLACK).floor() as i32
    }
}
