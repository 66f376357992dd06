//! What callers ask for: [`PathRequest`] and its [`PathOptions`].

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use gridroute_core::{RequesterId, UnitProperties, Vec2};

use crate::engine::SearchKind;
use crate::error::RequestError;

/// Opaque payload carried through the pipeline for pre-processors.
pub type CustomData = Option<Box<dyn Any + Send>>;

/// Per-request search and post-processing switches.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PathOptions {
    /// Restrict movement to the four cardinal directions.
    pub prevent_diagonal_moves: bool,
    /// Require both straddled cardinals to be walkable for a diagonal step.
    pub prevent_corner_cutting: bool,
    pub use_path_smoothing: bool,
    /// Skip the search when a clear straight corridor joins the endpoints.
    pub optimize_unobstructed_paths: bool,
    /// How many cell rings to search for a walkable cell when the start is
    /// blocked.
    pub max_escape_distance: i32,
    /// Route to the closest reachable cell instead of failing.
    pub navigate_to_nearest_if_blocked: bool,
}

impl Default for PathOptions {
    fn default() -> Self {
        Self {
            prevent_diagonal_moves: false,
            prevent_corner_cutting: true,
            use_path_smoothing: true,
            optimize_unobstructed_paths: true,
            max_escape_distance: 3,
            navigate_to_nearest_if_blocked: false,
        }
    }
}

impl PathOptions {
    pub fn with_diagonals(mut self, allowed: bool) -> Self {
        self.prevent_diagonal_moves = !allowed;
        self
    }

    pub fn with_corner_cutting(mut self, allowed: bool) -> Self {
        self.prevent_corner_cutting = !allowed;
        self
    }

    pub fn with_smoothing(mut self, on: bool) -> Self {
        self.use_path_smoothing = on;
        self
    }

    pub fn with_unobstructed_optimization(mut self, on: bool) -> Self {
        self.optimize_unobstructed_paths = on;
        self
    }

    pub fn with_escape_distance(mut self, rings: i32) -> Self {
        self.max_escape_distance = rings;
        self
    }

    pub fn with_nearest_fallback(mut self, on: bool) -> Self {
        self.navigate_to_nearest_if_blocked = on;
        self
    }
}

/// Whether the caller wants a route or only its cost.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RequestKind {
    #[default]
    Normal,
    /// Cost only: smoothing is skipped and the returned path is empty.
    Intel,
}

/// Shared cancellation flag. Any clone may mark the request decayed; the
/// dispatcher checks it when the request is dequeued.
#[derive(Clone, Debug, Default)]
pub struct DecayFlag(Arc<AtomicBool>);

impl DecayFlag {
    pub fn decay(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_decayed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A request for a route from `from` through every `via` point to `to`.
pub struct PathRequest {
    pub from: Vec2,
    pub to: Vec2,
    pub via: Vec<Vec2>,
    pub requester: Option<RequesterId>,
    pub unit: Option<UnitProperties>,
    pub options: Option<PathOptions>,
    pub kind: RequestKind,
    pub created: Instant,
    pub custom_data: CustomData,
    decay: DecayFlag,
}

impl PathRequest {
    /// A normal request with default options.
    pub fn new(from: Vec2, to: Vec2, requester: RequesterId, unit: UnitProperties) -> Self {
        Self {
            from,
            to,
            via: Vec::new(),
            requester: Some(requester),
            unit: Some(unit),
            options: Some(PathOptions::default()),
            kind: RequestKind::Normal,
            created: Instant::now(),
            custom_data: None,
            decay: DecayFlag::default(),
        }
    }

    pub fn with_via(mut self, via: impl IntoIterator<Item = Vec2>) -> Self {
        self.via = via.into_iter().collect();
        self
    }

    pub fn with_options(mut self, options: PathOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_kind(mut self, kind: RequestKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_custom_data(mut self, data: impl Any + Send) -> Self {
        self.custom_data = Some(Box::new(data));
        self
    }

    /// Mark the request as no longer wanted.
    pub fn decay(&self) {
        self.decay.decay();
    }

    pub fn is_decayed(&self) -> bool {
        self.decay.is_decayed()
    }

    /// A handle that can decay this request after it was handed off.
    pub fn decay_flag(&self) -> DecayFlag {
        self.decay.clone()
    }
}

impl fmt::Debug for PathRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathRequest")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("via", &self.via)
            .field("requester", &self.requester)
            .field("unit", &self.unit)
            .field("options", &self.options)
            .field("kind", &self.kind)
            .field("decayed", &self.is_decayed())
            .field("custom_data", &self.custom_data.is_some())
            .finish()
    }
}

/// Check a request before it is queued or started.
pub fn validate(request: &PathRequest, search: SearchKind) -> Result<(), RequestError> {
    if request.requester.is_none() {
        return Err(RequestError::MissingRequester);
    }
    let unit = request.unit.ok_or(RequestError::MissingUnitProperties)?;
    let options = request.options.ok_or(RequestError::MissingOptions)?;
    let finite = std::iter::once(request.from)
        .chain(request.via.iter().copied())
        .chain(std::iter::once(request.to))
        .all(Vec2::is_finite);
    if !finite {
        return Err(RequestError::NonFinitePosition);
    }
    if !unit.radius.is_finite() || unit.radius < 0.0 {
        return Err(RequestError::InvalidRadius(unit.radius));
    }
    if search == SearchKind::JumpPoint && options.prevent_diagonal_moves {
        return Err(RequestError::Unsupported(
            "jump point search requires diagonal moves",
        ));
    }
    Ok(())
}
