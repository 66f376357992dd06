use gridroute_core::Vec2;

use crate::path::Path;
use crate::request::PathRequest;

/// Final outcome of a request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PathStatus {
    Complete,
    /// Some leading segments were routed, a later one failed. See
    /// [`PathResult::inner`].
    CompletePartial,
    /// The request was decayed before it was searched.
    Decayed,
    StartOutsideGrid,
    EndOutsideGrid,
    DestinationBlocked,
    NoRouteExists,
    Failed,
}

impl PathStatus {
    /// Whether the result carries a usable path.
    pub const fn is_success(self) -> bool {
        matches!(self, PathStatus::Complete | PathStatus::CompletePartial)
    }
}

/// Why a multi-segment route stopped early.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InnerResult {
    /// Status of the segment that did not complete.
    pub status: PathStatus,
    /// The unreached destination of that segment, then every later
    /// waypoint, ending with the request's `to`.
    pub pending: Vec<Vec2>,
}

/// Search diagnostics.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchStats {
    /// Nodes popped from the open set over all segments.
    pub expanded: usize,
    /// Segments that completed.
    pub segments: usize,
}

/// A finished request, handing the original request back.
#[derive(Debug)]
pub struct PathResult {
    pub status: PathStatus,
    pub path: Path,
    pub cost: i32,
    pub request: PathRequest,
    pub error: Option<String>,
    pub inner: Option<InnerResult>,
    pub stats: SearchStats,
}

impl PathResult {
    /// A result with no path for `status`.
    pub fn empty(request: PathRequest, status: PathStatus) -> Self {
        Self {
            status,
            path: Path::new(),
            cost: 0,
            request,
            error: None,
            inner: None,
            stats: SearchStats::default(),
        }
    }

    /// A [`PathStatus::Failed`] result carrying `message`.
    pub fn failed(request: PathRequest, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::empty(request, PathStatus::Failed)
        }
    }
}

/// What one engine step left behind.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// No request is loaded.
    Idle,
    Running,
    /// The loaded request is done; collect it with
    /// [`PathEngine::finish`](crate::PathEngine::finish).
    Finished(PathStatus),
}
