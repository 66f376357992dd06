//! Pathfinding over one or more grids linked by portals.
//!
//! [`PathEngine`] answers [`PathRequest`]s one at a time:
//!
//! - **A\*** or **Jump Point Search** ([`SearchKind`]) over cells and
//!   portal nodes, with integer costs from a [`CostProvider`] and
//!   per-cell costs from a [`CellCostStrategy`]
//! - **Via points**: a request is split into legs ([`Segments`]) whose
//!   routes are stitched into one [`Path`]
//! - **Smoothing** ([`PathSmoother`]): bends are compacted and corners cut
//!   wherever a corridor as wide as the unit is clear ([`can_reduce_path`])
//!
//! The engine can run a request to completion
//! ([`PathEngine::process_request`]) or one expansion at a time
//! ([`PathEngine::step`]) so that a host can spread the work over frames.
//!
//! # Collaborators
//!
//! | Trait | Supplies |
//! |---|---|
//! | [`GridProvider`](gridroute_core::GridProvider) | grids and portals |
//! | [`CostProvider`] | move costs and the heuristic |
//! | [`CellCostStrategy`] | extra cost of entering a cell |
//! | [`Preprocessor`] | per-leg request rewriting |

mod astar;
mod corridor;
mod cost;
mod distance;
mod engine;
mod error;
mod jps;
mod neighbors;
mod nodes;
mod path;
mod preprocess;
mod request;
mod result;
mod segments;
mod smoother;

pub use corridor::can_reduce_path;
pub use cost::{CellCostStrategy, DefaultCellCost};
pub use distance::{CostProvider, DEFAULT_BASE_COST, Metric, MetricCost};
pub use engine::{EngineContext, EngineSettings, PathEngine, SearchKind};
pub use error::{EngineError, Rejected, RequestError};
pub use neighbors::{Candidate, neighbor_offsets};
pub use path::{Path, PathPoint, PointKind};
pub use preprocess::{ClearDestination, Preprocessor, Preprocessors};
pub use request::{CustomData, DecayFlag, PathOptions, PathRequest, RequestKind, validate};
pub use result::{InnerResult, PathResult, PathStatus, Progress, SearchStats};
pub use segments::{SegmentRequest, Segments};
pub use smoother::{ChainNode, PathSmoother, fix_end_point};
