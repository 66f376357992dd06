use gridroute_core::{GridId, PortalId};
use thiserror::Error;

use crate::request::PathRequest;

/// Why a request was refused before any search ran.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("request has no requester")]
    MissingRequester,
    #[error("request has no unit properties")]
    MissingUnitProperties,
    #[error("request has no path options")]
    MissingOptions,
    #[error("request contains a non-finite position")]
    NonFinitePosition,
    #[error("unit radius {0} is not a finite non-negative number")]
    InvalidRadius(f32),
    #[error("unsupported request: {0}")]
    Unsupported(&'static str),
    #[error("engine is busy with another request")]
    Busy,
    #[error("service has been disposed")]
    Disposed,
}

/// Internal engine failures. These end the request with
/// [`PathStatus::Failed`](crate::PathStatus::Failed).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("grid {0:?} is not registered")]
    UnknownGrid(GridId),
    #[error("portal {0:?} is not registered")]
    UnknownPortal(PortalId),
    #[error("node {0} is outside the node arena")]
    NodeOutOfRange(usize),
    #[error("no segment left to search")]
    NoSegment,
}

/// A request handed back to the caller together with the reason it was
/// refused.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejected {
    #[source]
    pub error: RequestError,
    pub request: PathRequest,
}
