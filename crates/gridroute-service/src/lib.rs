//! **gridroute-service**: queues path requests by priority and runs them
//! on a [`PathEngine`](gridroute_paths::PathEngine).
//!
//! ```no_run
//! use std::sync::Arc;
//! use gridroute_core::{CellGrid, GridSet, RequesterId, UnitProperties, Vec2};
//! use gridroute_paths::{EngineContext, EngineSettings, PathEngine, PathRequest};
//! use gridroute_service::{PathService, ServiceConfig};
//!
//! let grid = CellGrid::from_ascii("....\n.##.\n....", 1.0).unwrap();
//! let ctx = EngineContext::new(Arc::new(GridSet::single(grid)));
//! let service = PathService::new(
//!     PathEngine::new(ctx, EngineSettings::default()),
//!     ServiceConfig::default(),
//! );
//! let request = PathRequest::new(
//!     Vec2::new(0.5, 1.5),
//!     Vec2::new(3.5, 1.5),
//!     RequesterId(7),
//!     UnitProperties::default(),
//! );
//! let ticket = service.queue_request(request, 0).unwrap();
//! let result = ticket.wait().unwrap();
//! println!("{:?}: {:?}", result.status, result.path.points().collect::<Vec<_>>());
//! ```

mod config;
mod error;
mod queue;
mod service;
mod ticket;
mod worker;

pub use config::{ExecutionMode, ServiceConfig};
pub use error::ServiceError;
pub use queue::RequestQueue;
pub use service::{PathService, ServiceEvent, TickOutcome};
pub use ticket::{PathCallback, PathTicket};
