//! [`PathEngine`]: runs one request at a time, leg by leg, in steps small
//! enough to be time-sliced.

use std::any::Any;
use std::collections::BinaryHeap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use gridroute_core::{GridLayer, GridProvider, UnitProperties, Vec2};

use crate::astar::{Search, Searcher, Step};
use crate::corridor::can_reduce_path;
use crate::cost::{CellCostStrategy, DefaultCellCost};
use crate::distance::{CostProvider, DEFAULT_BASE_COST, Metric, MetricCost};
use crate::error::{EngineError, Rejected, RequestError};
use crate::nodes::{NodeArena, NodeRef};
use crate::path::{Path, PathPoint};
use crate::preprocess::{Preprocessor, Preprocessors};
use crate::request::{PathOptions, PathRequest, RequestKind, validate};
use crate::result::{InnerResult, PathResult, PathStatus, Progress, SearchStats};
use crate::segments::{SegmentRequest, Segments};
use crate::smoother::{ChainNode, PathSmoother, fix_end_point};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Search algorithm used for every leg.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchKind {
    #[default]
    AStar,
    /// Jump Point Search. Requires diagonal moves.
    JumpPoint,
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineSettings {
    pub search: SearchKind,
    /// Metric of the built-in cost provider. Ignored when the context
    /// brings its own [`CostProvider`].
    pub metric: Metric,
    pub base_cost: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            search: SearchKind::AStar,
            metric: Metric::Diagonal,
            base_cost: DEFAULT_BASE_COST,
        }
    }
}

impl EngineSettings {
    pub fn with_search(mut self, search: SearchKind) -> Self {
        self.search = search;
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_base_cost(mut self, base_cost: i32) -> Self {
        self.base_cost = base_cost;
        self
    }
}

/// Collaborators injected into the engine.
pub struct EngineContext {
    pub grids: Arc<dyn GridProvider>,
    /// Replaces the metric cost provider built from [`EngineSettings`].
    pub costs: Option<Arc<dyn CostProvider>>,
    pub cell_costs: Arc<dyn CellCostStrategy>,
    pub preprocessors: Preprocessors,
}

impl EngineContext {
    pub fn new(grids: Arc<dyn GridProvider>) -> Self {
        Self {
            grids,
            costs: None,
            cell_costs: Arc::new(DefaultCellCost),
            preprocessors: Preprocessors::new(),
        }
    }

    pub fn with_costs(mut self, costs: Arc<dyn CostProvider>) -> Self {
        self.costs = Some(costs);
        self
    }

    pub fn with_cell_costs(mut self, cell_costs: Arc<dyn CellCostStrategy>) -> Self {
        self.cell_costs = cell_costs;
        self
    }

    pub fn with_preprocessor(mut self, p: impl Preprocessor + 'static) -> Self {
        self.preprocessors.push(p);
        self
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("grids", &self.grids.grid_count())
            .field("custom_costs", &self.costs.is_some())
            .field("preprocessors", &self.preprocessors)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Job state
// ---------------------------------------------------------------------------

struct Outcome {
    status: PathStatus,
    inner: Option<InnerResult>,
    error: Option<String>,
}

impl Outcome {
    fn status(status: PathStatus) -> Self {
        Self {
            status,
            inner: None,
            error: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            error: Some(message),
            ..Self::status(PathStatus::Failed)
        }
    }
}

/// A leg whose search spans several steps.
struct Leg {
    segment: SegmentRequest,
    search: Search,
    /// Pseudo node at the literal start when it had to escape a blocked cell.
    origin: Option<ChainNode>,
}

struct Job {
    request: PathRequest,
    unit: UnitProperties,
    options: PathOptions,
    segments: Segments,
    parts: Vec<Path>,
    cost: i32,
    stats: SearchStats,
    leg: Option<Leg>,
    outcome: Option<Outcome>,
}

impl Job {
    fn into_result(self) -> PathResult {
        let Outcome {
            status,
            inner,
            error,
        } = self
            .outcome
            .unwrap_or_else(|| Outcome::failed("request abandoned before completion".into()));
        let (path, cost) = if status.is_success() {
            (Path::from_segments(self.parts), self.cost)
        } else {
            (Path::new(), 0)
        };
        PathResult {
            status,
            path,
            cost,
            request: self.request,
            error,
            inner,
            stats: self.stats,
        }
    }

    /// End the current leg without a route.
    fn fail_leg(&mut self, status: PathStatus) {
        self.leg = None;
        self.outcome = Some(if self.segments.index() == 0 {
            Outcome::status(status)
        } else {
            Outcome {
                inner: Some(InnerResult {
                    status,
                    pending: self.segments.pending_waypoints().to_vec(),
                }),
                ..Outcome::status(PathStatus::CompletePartial)
            }
        });
    }

    /// Record a routed leg and move on.
    fn finish_leg(&mut self, segment: &SegmentRequest, path: Path, cost: i32, fallback: Option<PathStatus>) {
        self.leg = None;
        self.cost = self.cost.saturating_add(cost);
        self.stats.segments += 1;
        self.parts.push(match self.request.kind {
            RequestKind::Intel => Path::new(),
            RequestKind::Normal => path,
        });
        match fallback {
            Some(reason) if !segment.is_last => {
                // Stopped short of a via point: the rest is unreachable.
                self.outcome = Some(Outcome {
                    inner: Some(InnerResult {
                        status: reason,
                        pending: self.segments.pending_waypoints().to_vec(),
                    }),
                    ..Outcome::status(PathStatus::CompletePartial)
                });
            }
            _ => {
                self.segments.advance(segment.to);
                if self.segments.is_done() {
                    self.outcome = Some(Outcome::status(PathStatus::Complete));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// PathEngine
// ---------------------------------------------------------------------------

/// A* / Jump Point Search engine working through one request at a time.
///
/// Drive it either with [`process_request`](Self::process_request), or
/// incrementally with [`start`](Self::start), [`step`](Self::step) and
/// [`finish`](Self::finish) when the work must be spread over frames.
pub struct PathEngine {
    ctx: EngineContext,
    settings: EngineSettings,
    costs: Arc<dyn CostProvider>,
    arena: NodeArena,
    open: BinaryHeap<NodeRef>,
    nbuf: Vec<(usize, i32)>,
    job: Option<Job>,
}

impl PathEngine {
    pub fn new(ctx: EngineContext, settings: EngineSettings) -> Self {
        let costs = ctx.costs.clone().unwrap_or_else(|| {
            Arc::new(MetricCost {
                metric: settings.metric,
                base: settings.base_cost,
            })
        });
        let arena = NodeArena::new(&*ctx.grids);
        Self {
            ctx,
            settings,
            costs,
            arena,
            open: BinaryHeap::new(),
            nbuf: Vec::with_capacity(16),
            job: None,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn grids(&self) -> &Arc<dyn GridProvider> {
        &self.ctx.grids
    }

    /// Whether a request is loaded (running or waiting to be collected).
    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    /// Check `request` against this engine's search kind.
    pub fn validate(&self, request: &PathRequest) -> Result<(), RequestError> {
        validate(request, self.settings.search)
    }

    /// Load a request. Fails with [`RequestError::Busy`] while another one
    /// is loaded.
    pub fn start(&mut self, request: PathRequest) -> Result<(), Rejected> {
        if self.job.is_some() {
            return Err(Rejected {
                error: RequestError::Busy,
                request,
            });
        }
        self.job = Some(self.make_job(request)?);
        Ok(())
    }

    /// Advance the loaded request by one expansion (or one leg transition).
    pub fn step(&mut self) -> Progress {
        let Some(mut job) = self.job.take() else {
            return Progress::Idle;
        };
        self.advance(&mut job);
        let progress = match &job.outcome {
            Some(o) => Progress::Finished(o.status),
            None => Progress::Running,
        };
        self.job = Some(job);
        progress
    }

    /// Collect the loaded request once [`step`](Self::step) reported it
    /// finished.
    pub fn finish(&mut self) -> Option<PathResult> {
        if !self.job.as_ref().is_some_and(|j| j.outcome.is_some()) {
            return None;
        }
        let result = self.job.take()?.into_result();
        log::debug!(
            "path request finished: {:?}, cost {}, {} nodes expanded",
            result.status,
            result.cost,
            result.stats.expanded
        );
        Some(result)
    }

    /// Abort the loaded request as [`PathStatus::Failed`].
    pub fn fail(&mut self, message: impl Into<String>) -> Option<PathResult> {
        let mut job = self.job.take()?;
        self.open.clear();
        let message = message.into();
        log::warn!("path request failed: {message}");
        job.outcome = Some(Outcome::failed(message));
        Some(job.into_result())
    }

    /// Run a request to completion.
    pub fn process_request(&mut self, request: PathRequest) -> Result<PathResult, Rejected> {
        if self.job.is_some() {
            return Err(Rejected {
                error: RequestError::Busy,
                request,
            });
        }
        let mut job = self.make_job(request)?;
        while job.outcome.is_none() {
            self.advance(&mut job);
        }
        let result = job.into_result();
        log::debug!(
            "path request finished: {:?}, cost {}, {} nodes expanded",
            result.status,
            result.cost,
            result.stats.expanded
        );
        Ok(result)
    }

    fn make_job(&mut self, request: PathRequest) -> Result<Job, Rejected> {
        if let Err(error) = self.validate(&request) {
            return Err(Rejected { error, request });
        }
        let (Some(unit), Some(options)) = (request.unit, request.options) else {
            return Err(Rejected {
                error: RequestError::MissingOptions,
                request,
            });
        };
        self.arena.sync(&*self.ctx.grids);
        let decayed = request.is_decayed();
        log::debug!(
            "path request {:?}: {} -> {} via {} points",
            request.requester,
            request.from,
            request.to,
            request.via.len()
        );
        Ok(Job {
            segments: Segments::new(request.from, &request.via, request.to),
            request,
            unit,
            options,
            parts: Vec::new(),
            cost: 0,
            stats: SearchStats::default(),
            leg: None,
            outcome: decayed.then(|| {
                log::trace!("request decayed before search");
                Outcome::status(PathStatus::Decayed)
            }),
        })
    }

    /// One unit of work on `job`. Engine errors and panics raised by
    /// collaborators end the job as [`PathStatus::Failed`].
    fn advance(&mut self, job: &mut Job) {
        if job.outcome.is_some() {
            return;
        }
        let message = match panic::catch_unwind(AssertUnwindSafe(|| self.drive(job))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => panic_message(&*payload),
        };
        log::warn!("path request failed: {message}");
        self.open.clear();
        job.leg = None;
        job.outcome = Some(Outcome::failed(message));
    }

    fn searcher<'s>(&'s mut self, search: &'s mut Search) -> Searcher<'s> {
        Searcher {
            grids: &*self.ctx.grids,
            costs: &*self.costs,
            cell_costs: &*self.ctx.cell_costs,
            kind: self.settings.search,
            arena: &mut self.arena,
            open: &mut self.open,
            nbuf: &mut self.nbuf,
            search,
        }
    }

    fn drive(&mut self, job: &mut Job) -> Result<(), EngineError> {
        let Some(mut leg) = job.leg.take() else {
            return self.begin_leg(job);
        };
        let step = self.searcher(&mut leg.search).process_next();
        if !matches!(step, Ok(Step::Running)) {
            job.stats.expanded += leg.search.expanded;
        }
        match step? {
            Step::Running => {
                job.leg = Some(leg);
                Ok(())
            }
            Step::Found { goal, fallback } => self.complete_leg(job, leg, goal, fallback),
            Step::Failed(status) => {
                job.fail_leg(status);
                Ok(())
            }
        }
    }

    fn begin_leg(&mut self, job: &mut Job) -> Result<(), EngineError> {
        let mut segment = job
            .segments
            .request(job.unit, job.options)
            .ok_or(EngineError::NoSegment)?;
        let grids = Arc::clone(&self.ctx.grids);
        self.ctx
            .preprocessors
            .run(&mut segment, &mut job.request.custom_data, &*grids);
        let (from, to) = (segment.from, segment.to);
        let (unit, opts) = (segment.unit, segment.options);

        let (fg, tg) = match (grids.grid_at(from), grids.grid_at(to)) {
            (None, None) => {
                let cost = self.costs.heuristic(from, to, 1.0);
                let path = [PathPoint::waypoint(from, None), PathPoint::waypoint(to, None)]
                    .into_iter()
                    .collect();
                job.finish_leg(&segment, path, cost, None);
                return Ok(());
            }
            (None, Some(_)) => {
                job.fail_leg(PathStatus::StartOutsideGrid);
                return Ok(());
            }
            (Some(_), None) => {
                job.fail_leg(PathStatus::EndOutsideGrid);
                return Ok(());
            }
            (Some(fg), Some(tg)) => (fg, tg),
        };

        let start_cell = fg.bounds().clamp(fg.unclamped_cell(from));
        let start_open = fg.is_walkable(start_cell, &unit);
        if fg.id() == tg.id()
            && opts.use_path_smoothing
            && opts.optimize_unobstructed_paths
            && !opts.prevent_diagonal_moves
            && start_open
            && can_reduce_path(fg, from, to, &unit, &*self.ctx.cell_costs)
        {
            let cost = self.costs.heuristic(from, to, fg.cell_size());
            let path = two_point(fg, from, to);
            let path = self.finish_path(&segment, path);
            job.finish_leg(&segment, path, cost, None);
            return Ok(());
        }

        let (start, origin) = if start_open {
            (start_cell, None)
        } else {
            match fg.nearest_walkable(from, opts.max_escape_distance, &unit) {
                Some(cell) => {
                    log::trace!("start {from} blocked, escaping to {cell}");
                    let origin = ChainNode {
                        pos: from,
                        ..ChainNode::cell(fg, start_cell)
                    };
                    (cell, Some(origin))
                }
                None => {
                    job.fail_leg(PathStatus::NoRouteExists);
                    return Ok(());
                }
            }
        };

        let goal_cell = tg.bounds().clamp(tg.unclamped_cell(to));
        if !opts.navigate_to_nearest_if_blocked && !tg.is_walkable(goal_cell, &unit) {
            job.fail_leg(PathStatus::DestinationBlocked);
            return Ok(());
        }

        let mut search = Search::new(unit, opts, tg, goal_cell);
        self.searcher(&mut search).begin(fg.id(), start)?;
        job.leg = Some(Leg {
            segment,
            search,
            origin,
        });
        Ok(())
    }

    fn complete_leg(
        &mut self,
        job: &mut Job,
        mut leg: Leg,
        goal: usize,
        fallback: Option<PathStatus>,
    ) -> Result<(), EngineError> {
        // Costed from the escape cell; the literal start only leads the path.
        let (mut chain, cost) = {
            let searcher = self.searcher(&mut leg.search);
            (searcher.chain(goal)?, searcher.cost_to(goal)?)
        };
        let escaped = leg.origin.is_some();
        if let Some(origin) = leg.origin {
            chain.insert(0, origin);
        }
        let segment = leg.segment;
        let path = match job.request.kind {
            RequestKind::Intel => Path::new(),
            RequestKind::Normal => {
                let to = match (fallback, chain.last()) {
                    (Some(_), Some(last)) => last.pos,
                    _ => segment.to,
                };
                let smoother = PathSmoother::new(
                    &*self.ctx.grids,
                    &*self.ctx.cell_costs,
                    segment.unit,
                    segment.options,
                );
                let path = smoother.smooth(&chain, segment.from, to, escaped);
                self.finish_path(&segment, path)
            }
        };
        job.finish_leg(&segment, path, cost, fallback);
        Ok(())
    }

    /// Keep the final point of the route clear of walls.
    fn finish_path(&self, segment: &SegmentRequest, mut path: Path) -> Path {
        if !segment.is_last {
            return path;
        }
        if let Some(mut last) = path.pop_back() {
            if let Some(layer) = last.grid.and_then(|id| self.ctx.grids.grid(id)) {
                last.pos = fix_end_point(layer, last.pos, segment.unit.radius);
            }
            path.push_back(last);
        }
        path
    }
}

impl fmt::Debug for PathEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathEngine")
            .field("settings", &self.settings)
            .field("context", &self.ctx)
            .field("busy", &self.is_busy())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned());
    match detail {
        Some(d) => format!("search panicked: {d}"),
        None => "search panicked".to_string(),
    }
}

fn two_point(grid: &dyn GridLayer, from: Vec2, to: Vec2) -> Path {
    let id = Some(grid.id());
    [PathPoint::waypoint(from, id), PathPoint::waypoint(to, id)]
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::cmp::Reverse;

    use gridroute_core::{
        CellGrid, GridSet, Point, PortalEndpoint, PortalKind, RequesterId,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::neighbors::{self, move_offsets};
    use crate::preprocess::ClearDestination;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    fn engine_for(set: GridSet, settings: EngineSettings) -> PathEngine {
        let _ = env_logger::builder().is_test(true).try_init();
        PathEngine::new(EngineContext::new(Arc::new(set)), settings)
    }

    fn engine(map: &str) -> PathEngine {
        let grid = CellGrid::from_ascii(map, 1.0).unwrap();
        engine_for(GridSet::single(grid), EngineSettings::default())
    }

    fn request(from: Vec2, to: Vec2) -> PathRequest {
        PathRequest::new(from, to, RequesterId(1), UnitProperties::default())
    }

    fn searched(from: Vec2, to: Vec2) -> PathRequest {
        request(from, to)
            .with_options(PathOptions::default().with_unobstructed_optimization(false))
    }

    const ROOM: &str = "
        .....
        .###.
        .#.#.
        .###.
    ";

    // -----------------------------------------------------------------------
    // Reference search
    // -----------------------------------------------------------------------

    fn random_grid(rng: &mut StdRng, w: usize, h: usize, weighted: bool) -> CellGrid {
        let map: Vec<String> = (0..h)
            .map(|_| {
                (0..w)
                    .map(|_| {
                        let r: f32 = rng.random();
                        if r < 0.22 {
                            '#'
                        } else if weighted && r < 0.34 {
                            '3'
                        } else {
                            '.'
                        }
                    })
                    .collect()
            })
            .collect();
        CellGrid::from_ascii(&map.join("\n"), 1.0).unwrap()
    }

    fn random_open_cell(rng: &mut StdRng, grid: &CellGrid) -> Point {
        let unit = UnitProperties::default();
        loop {
            let p = Point::new(
                rng.random_range(0..grid.width()),
                rng.random_range(0..grid.height()),
            );
            if grid.is_walkable(p, &unit) {
                return p;
            }
        }
    }

    /// Plain Dijkstra over single cell steps.
    fn reference_cost(grid: &CellGrid, from: Point, to: Point, cut: bool) -> Option<i32> {
        let costs = MetricCost::default();
        let cells = DefaultCellCost;
        let unit = UnitProperties::default();
        let bounds = grid.bounds();
        let mut dist = vec![i32::MAX; bounds.len()];
        let mut heap = BinaryHeap::new();
        let start = bounds.index(from)?;
        dist[start] = 0;
        heap.push(Reverse((0, start)));
        while let Some(Reverse((d, i))) = heap.pop() {
            if d > dist[i] {
                continue;
            }
            let p = bounds.point(i);
            if p == to {
                return Some(d);
            }
            for off in move_offsets(true) {
                let Some(n) = neighbors::step(grid, p, off, &unit, cut) else {
                    continue;
                };
                let extra = grid.cell(n).map_or(0, |c| cells.cell_cost(c, &unit));
                let nd = d + extra + costs.move_cost(grid.position(p), grid.position(n), 1.0);
                let Some(j) = bounds.index(n) else {
                    continue;
                };
                if nd < dist[j] {
                    dist[j] = nd;
                    heap.push(Reverse((nd, j)));
                }
            }
        }
        None
    }

    fn check_against_reference(settings: EngineSettings, cut: bool, weighted: bool, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..40 {
            let grid = random_grid(&mut rng, 14, 11, weighted);
            let a = random_open_cell(&mut rng, &grid);
            let b = random_open_cell(&mut rng, &grid);
            let expected = reference_cost(&grid, a, b, cut);
            let (from, to) = (grid.position(a), grid.position(b));
            let mut engine = engine_for(GridSet::single(grid), settings);
            let options = PathOptions::default()
                .with_unobstructed_optimization(false)
                .with_corner_cutting(cut);
            let res = engine
                .process_request(request(from, to).with_options(options))
                .unwrap();
            match expected {
                Some(cost) => {
                    assert_eq!(res.status, PathStatus::Complete, "{a} -> {b}");
                    assert_eq!(res.cost, cost, "{a} -> {b}");
                    assert!(res.path.is_well_formed());
                    assert_eq!(res.path.peek().map(|p| p.pos), Some(from));
                }
                None => {
                    assert_eq!(res.status, PathStatus::NoRouteExists, "{a} -> {b}");
                    assert!(res.path.is_empty());
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Optimality
    // -----------------------------------------------------------------------

    #[test]
    fn astar_costs_are_optimal() {
        check_against_reference(EngineSettings::default(), false, false, 1);
        check_against_reference(EngineSettings::default(), true, false, 2);
    }

    #[test]
    fn astar_costs_are_optimal_on_weighted_grids() {
        check_against_reference(EngineSettings::default(), false, true, 3);
    }

    #[test]
    fn jump_point_costs_match_reference() {
        let jps = EngineSettings::default().with_search(SearchKind::JumpPoint);
        check_against_reference(jps, false, false, 4);
        check_against_reference(jps, true, false, 5);
    }

    #[test]
    fn smoothing_never_lengthens_the_route() {
        let mut rng = StdRng::seed_from_u64(6);
        for _ in 0..40 {
            let grid = random_grid(&mut rng, 14, 11, false);
            let a = random_open_cell(&mut rng, &grid);
            let b = random_open_cell(&mut rng, &grid);
            let (from, to) = (grid.position(a), grid.position(b));
            let mut engine = engine_for(GridSet::single(grid), EngineSettings::default());
            let opts = PathOptions::default().with_unobstructed_optimization(false);
            let raw = engine
                .process_request(request(from, to).with_options(opts.with_smoothing(false)))
                .unwrap();
            let smooth = engine
                .process_request(request(from, to).with_options(opts))
                .unwrap();
            assert_eq!(raw.status, smooth.status);
            assert_eq!(raw.cost, smooth.cost);
            assert!(smooth.path.len() <= raw.path.len().max(2));
            assert!(smooth.path.length() <= raw.path.length() + 1e-3);
        }
    }

    // -----------------------------------------------------------------------
    // Leg setup
    // -----------------------------------------------------------------------

    #[test]
    fn clear_line_is_a_two_point_route() {
        let mut e = engine(
            "
            .....
            .....
            .....
            ",
        );
        let res = e
            .process_request(request(v(0.5, 1.5), v(4.5, 1.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 40);
        assert_eq!(res.path.len(), 2);
        assert_eq!(res.stats.expanded, 0);
        assert_eq!(res.stats.segments, 1);
    }

    #[test]
    fn blocked_destination_is_reported_without_search() {
        let mut e = engine(
            "
            ...
            .#.
            ...
            ",
        );
        let res = e
            .process_request(request(v(0.5, 0.5), v(1.5, 1.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::DestinationBlocked);
        assert!(res.path.is_empty());
        assert_eq!(res.cost, 0);
    }

    #[test]
    fn walled_in_destination_has_no_route() {
        let mut e = engine(ROOM);
        let res = e
            .process_request(request(v(0.5, 0.5), v(2.5, 2.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::NoRouteExists);
        assert!(res.path.is_empty());
        assert!(res.stats.expanded > 0);
    }

    #[test]
    fn nearest_fallback_stops_at_the_closest_cell() {
        let mut e = engine(ROOM);
        let opts = PathOptions::default().with_nearest_fallback(true);
        let goal = v(2.5, 2.5);
        let res = e
            .process_request(request(v(0.5, 0.5), goal).with_options(opts))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 20);
        let end = res.path.last().unwrap().pos;
        let d = end.distance(goal);
        assert!((1.5..=2.5).contains(&d), "{end}");
    }

    #[test]
    fn blocked_start_escapes_to_open_cell() {
        let mut e = engine("#....");
        let res = e
            .process_request(request(v(0.5, 0.5), v(4.5, 0.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        // Measured from the escape cell at (1, 0).
        assert_eq!(res.cost, 30);
        let pts: Vec<Vec2> = res.path.points().collect();
        assert_eq!(pts[0], v(0.5, 0.5));
        assert_eq!(pts[1], v(1.5, 0.5));
    }

    #[test]
    fn enclosed_blocked_start_has_no_route() {
        let mut e = engine(
            "
            #####.
            #####.
            #####.
            ",
        );
        let opts = PathOptions::default().with_escape_distance(1);
        let res = e
            .process_request(request(v(0.5, 1.5), v(5.5, 0.5)).with_options(opts))
            .unwrap();
        assert_eq!(res.status, PathStatus::NoRouteExists);
    }

    #[test]
    fn off_grid_endpoints() {
        let mut e = engine("...");
        let res = e
            .process_request(request(v(-10.0, -10.0), v(-10.0, -5.0)))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 50);
        assert_eq!(res.path.len(), 2);
        assert!(res.path.iter().all(|p| p.grid.is_none()));

        let res = e
            .process_request(request(v(-10.0, -10.0), v(1.5, 0.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::StartOutsideGrid);
        let res = e
            .process_request(request(v(1.5, 0.5), v(-10.0, -10.0)))
            .unwrap();
        assert_eq!(res.status, PathStatus::EndOutsideGrid);
    }

    #[test]
    fn preprocessor_rewrites_destination() {
        let grid = CellGrid::from_ascii("....#", 1.0).unwrap();
        let ctx = EngineContext::new(Arc::new(GridSet::single(grid)))
            .with_preprocessor(ClearDestination::default());
        let mut e = PathEngine::new(ctx, EngineSettings::default());
        let res = e
            .process_request(request(v(0.5, 0.5), v(4.5, 0.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 30);
    }

    // -----------------------------------------------------------------------
    // Portals
    // -----------------------------------------------------------------------

    #[test]
    fn connector_portal_joins_grids() {
        let mut set = GridSet::new();
        let a = set.add_grid(CellGrid::from_ascii("...", 1.0).unwrap());
        let b = set.add_grid(
            CellGrid::from_ascii("...", 1.0)
                .unwrap()
                .with_origin(v(10.0, 0.0)),
        );
        set.add_portal(
            PortalEndpoint { grid: a, cell: Point::new(2, 0) },
            PortalEndpoint { grid: b, cell: Point::new(0, 0) },
            PortalKind::Connector,
            true,
            None,
        )
        .unwrap();
        let mut e = engine_for(set, EngineSettings::default());
        let res = e
            .process_request(request(v(0.5, 0.5), v(12.5, 0.5)))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 20 + 80 + 20);
        assert_eq!(res.path.iter().filter(|p| p.is_portal()).count(), 1);
        assert!(res.path.is_well_formed());
        assert_eq!(res.path.peek().and_then(|p| p.grid), Some(a));
        assert_eq!(res.path.last().and_then(|p| p.grid), Some(b));
    }

    #[test]
    fn nearest_fallback_prefers_the_goal_grid() {
        let mut set = GridSet::new();
        let a = set.add_grid(CellGrid::from_ascii("...", 1.0).unwrap());
        let b = set.add_grid(
            CellGrid::from_ascii("..#.", 1.0)
                .unwrap()
                .with_origin(v(10.0, 0.0)),
        );
        set.add_portal(
            PortalEndpoint { grid: a, cell: Point::new(2, 0) },
            PortalEndpoint { grid: b, cell: Point::new(0, 0) },
            PortalKind::Connector,
            true,
            None,
        )
        .unwrap();
        let mut e = engine_for(set, EngineSettings::default());
        let opts = PathOptions::default().with_nearest_fallback(true);
        let res = e
            .process_request(request(v(0.5, 0.5), v(13.5, 0.5)).with_options(opts))
            .unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.cost, 20 + 80 + 10);
        let end = res.path.last().unwrap();
        assert_eq!(end.grid, Some(b));
        assert_eq!(end.pos, v(11.5, 0.5));
    }

    #[test]
    fn shortcut_portal_is_taken_when_cheaper() {
        let mut set = GridSet::new();
        let g = set.add_grid(CellGrid::from_ascii("..........", 1.0).unwrap());
        set.add_portal(
            PortalEndpoint { grid: g, cell: Point::new(0, 0) },
            PortalEndpoint { grid: g, cell: Point::new(9, 0) },
            PortalKind::Shortcut,
            false,
            Some(5),
        )
        .unwrap();
        for kind in [SearchKind::AStar, SearchKind::JumpPoint] {
            let mut e = engine_for(set.clone(), EngineSettings::default().with_search(kind));
            let res = e
                .process_request(searched(v(0.5, 0.5), v(9.5, 0.5)))
                .unwrap();
            assert_eq!(res.status, PathStatus::Complete);
            assert_eq!(res.cost, 5, "{kind:?}");
            assert!(res.path.iter().any(PathPoint::is_portal));
        }
    }

    // -----------------------------------------------------------------------
    // Requests and lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn decayed_request_is_never_searched() {
        let mut e = engine(".....");
        let req = request(v(0.5, 0.5), v(4.5, 0.5));
        req.decay();
        let res = e.process_request(req).unwrap();
        assert_eq!(res.status, PathStatus::Decayed);
        assert!(res.path.is_empty());
        assert_eq!(res.cost, 0);
        assert_eq!(res.stats.expanded, 0);
    }

    #[test]
    fn unreachable_via_point_yields_partial_route() {
        let mut e = engine(ROOM);
        let via_b = v(2.5, 2.5);
        let to = v(4.5, 3.5);
        let req = request(v(0.5, 0.5), to).with_via([v(4.5, 0.5), via_b]);
        let res = e.process_request(req).unwrap();
        assert_eq!(res.status, PathStatus::CompletePartial);
        assert_eq!(res.cost, 40);
        assert!(!res.path.is_empty());
        let inner = res.inner.unwrap();
        assert_eq!(inner.status, PathStatus::NoRouteExists);
        assert_eq!(inner.pending, vec![via_b, to]);
    }

    #[test]
    fn nearest_fallback_before_last_via_stops_the_route() {
        let mut e = engine(ROOM);
        let via = v(2.5, 2.5);
        let to = v(4.5, 3.5);
        let opts = PathOptions::default().with_nearest_fallback(true);
        let req = request(v(0.5, 0.5), to)
            .with_via([via])
            .with_options(opts);
        let res = e.process_request(req).unwrap();
        assert_eq!(res.status, PathStatus::CompletePartial);
        assert_eq!(res.stats.segments, 1);
        assert_eq!(res.cost, 20);
        let inner = res.inner.unwrap();
        assert_eq!(inner.status, PathStatus::NoRouteExists);
        assert_eq!(inner.pending, vec![via, to]);
        // Ends on a cell two steps from the enclosed via point.
        let end = res.path.last().unwrap().pos;
        assert!((end.distance(via) - 2.0).abs() < 1e-4, "{end}");
    }

    #[test]
    fn via_points_are_joined() {
        let mut e = engine(
            "
            .....
            .....
            ",
        );
        let req = request(v(0.5, 0.5), v(0.5, 1.5)).with_via([v(4.5, 0.5)]);
        let res = e.process_request(req).unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert_eq!(res.stats.segments, 2);
        assert_eq!(res.cost, 40 + 44);
        let pts: Vec<Vec2> = res.path.points().collect();
        assert_eq!(pts.iter().filter(|&&p| p == v(4.5, 0.5)).count(), 1);
    }

    #[test]
    fn intel_request_reports_cost_only() {
        let map = "
            .....
            .###.
            .....
        ";
        let normal = engine(map)
            .process_request(request(v(0.5, 1.5), v(4.5, 1.5)))
            .unwrap();
        let intel = engine(map)
            .process_request(request(v(0.5, 1.5), v(4.5, 1.5)).with_kind(RequestKind::Intel))
            .unwrap();
        assert_eq!(intel.status, PathStatus::Complete);
        assert_eq!(intel.cost, normal.cost);
        assert!(intel.path.is_empty());
        assert!(!normal.path.is_empty());
    }

    #[test]
    fn jump_point_rejects_cardinal_only_requests() {
        let grid = CellGrid::from_ascii("...", 1.0).unwrap();
        let mut e = engine_for(
            GridSet::single(grid),
            EngineSettings::default().with_search(SearchKind::JumpPoint),
        );
        let req = request(v(0.5, 0.5), v(2.5, 0.5))
            .with_options(PathOptions::default().with_diagonals(false));
        let err = e.process_request(req).unwrap_err();
        assert!(matches!(err.error, RequestError::Unsupported(_)));
        assert!(!e.is_busy());
    }

    #[test]
    fn stepping_reports_progress_and_busy() {
        let mut e = engine(
            "
            ......
            .####.
            ......
            ",
        );
        assert_eq!(e.step(), Progress::Idle);
        e.start(searched(v(0.5, 1.5), v(5.5, 1.5))).unwrap();
        assert!(e.is_busy());
        let err = e.start(searched(v(0.5, 0.5), v(1.5, 0.5))).unwrap_err();
        assert_eq!(err.error, RequestError::Busy);
        assert!(e.finish().is_none());

        let mut steps = 0;
        let status = loop {
            steps += 1;
            match e.step() {
                Progress::Running => continue,
                Progress::Finished(s) => break s,
                Progress::Idle => panic!("engine went idle"),
            }
        };
        assert!(steps > 2);
        assert_eq!(status, PathStatus::Complete);
        let res = e.finish().unwrap();
        assert_eq!(res.status, PathStatus::Complete);
        assert!(!e.is_busy());
    }

    #[test]
    fn fail_aborts_the_loaded_request() {
        let mut e = engine(".....\n.....");
        assert!(e.fail("nothing loaded").is_none());
        e.start(searched(v(0.5, 0.5), v(4.5, 1.5))).unwrap();
        e.step();
        let res = e.fail("boom").unwrap();
        assert_eq!(res.status, PathStatus::Failed);
        assert_eq!(res.error.as_deref(), Some("boom"));
        assert!(res.path.is_empty());
        assert!(!e.is_busy());
    }

    struct Explodes;

    impl Preprocessor for Explodes {
        fn process(
            &self,
            _segment: &mut SegmentRequest,
            _custom: &mut crate::request::CustomData,
            _grids: &dyn GridProvider,
        ) -> bool {
            panic!("bad preprocessor");
        }
    }

    #[test]
    fn panicking_collaborator_fails_the_request() {
        let grid = CellGrid::from_ascii("...", 1.0).unwrap();
        let ctx = EngineContext::new(Arc::new(GridSet::single(grid))).with_preprocessor(Explodes);
        let mut e = PathEngine::new(ctx, EngineSettings::default());
        e.start(request(v(0.5, 0.5), v(2.5, 0.5))).unwrap();
        assert_eq!(e.step(), Progress::Finished(PathStatus::Failed));
        let res = e.finish().unwrap();
        assert_eq!(res.error.as_deref(), Some("search panicked: bad preprocessor"));
        assert_eq!(res.request.to, v(2.5, 0.5));

        // The engine stays usable.
        let res = e.process_request(request(v(0.5, 0.5), v(2.5, 0.5))).unwrap();
        assert_eq!(res.status, PathStatus::Failed);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn settings_round_trip() {
        let s = EngineSettings::default()
            .with_search(SearchKind::JumpPoint)
            .with_metric(Metric::Euclidean)
            .with_base_cost(100);
        let json = serde_json::to_string(&s).unwrap();
        let back: EngineSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        let partial: EngineSettings = serde_json::from_str(r#"{"search":"JumpPoint"}"#).unwrap();
        assert_eq!(partial.base_cost, DEFAULT_BASE_COST);
    }
}
