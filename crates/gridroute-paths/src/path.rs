//! The route handed to callers, and the assembler that stitches segment
//! routes into one.

use std::collections::VecDeque;

use gridroute_core::{GridId, PortalId, Vec2};

/// Two waypoints closer than this are considered the same junction.
const JUNCTION_EPSILON: f32 = 1e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PointKind {
    Waypoint,
    /// Enter portal `PortalId` here; the next point is on its far side.
    Portal(PortalId),
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PathPoint {
    pub pos: Vec2,
    /// The grid the point lies on; `None` for routes that never touch one.
    pub grid: Option<GridId>,
    pub kind: PointKind,
}

impl PathPoint {
    pub const fn waypoint(pos: Vec2, grid: Option<GridId>) -> Self {
        Self {
            pos,
            grid,
            kind: PointKind::Waypoint,
        }
    }

    pub const fn portal(pos: Vec2, grid: Option<GridId>, portal: PortalId) -> Self {
        Self {
            pos,
            grid,
            kind: PointKind::Portal(portal),
        }
    }

    #[inline]
    pub const fn is_portal(&self) -> bool {
        matches!(self.kind, PointKind::Portal(_))
    }
}

/// Distance walked between two consecutive points. Nothing is walked into
/// or out of a portal.
fn leg(a: &PathPoint, b: &PathPoint) -> f32 {
    if a.is_portal() || b.is_portal() {
        0.0
    } else {
        a.pos.distance(b.pos)
    }
}

/// An ordered route with a cached walking length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    points: VecDeque<PathPoint>,
    length: f32,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, point: PathPoint) {
        if let Some(last) = self.points.back() {
            self.length += leg(last, &point);
        }
        self.points.push_back(point);
    }

    pub fn push_front(&mut self, point: PathPoint) {
        if let Some(first) = self.points.front() {
            self.length += leg(&point, first);
        }
        self.points.push_front(point);
    }

    pub fn pop_front(&mut self) -> Option<PathPoint> {
        let p = self.points.pop_front()?;
        match self.points.front() {
            Some(next) => self.length -= leg(&p, next),
            None => self.length = 0.0,
        }
        Some(p)
    }

    pub fn pop_back(&mut self) -> Option<PathPoint> {
        let p = self.points.pop_back()?;
        match self.points.back() {
            Some(prev) => self.length -= leg(prev, &p),
            None => self.length = 0.0,
        }
        Some(p)
    }

    /// The next point to head for.
    pub fn peek(&self) -> Option<&PathPoint> {
        self.points.front()
    }

    /// Look `n` points ahead (`peek_at(0) == peek()`).
    pub fn peek_at(&self, n: usize) -> Option<&PathPoint> {
        self.points.get(n)
    }

    pub fn last(&self) -> Option<&PathPoint> {
        self.points.back()
    }

    /// Number of entries, portal entries included.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of waypoints.
    pub fn count(&self) -> usize {
        self.points.iter().filter(|p| !p.is_portal()).count()
    }

    /// Waypoint positions in walking order.
    pub fn points(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.points
            .iter()
            .filter(|p| !p.is_portal())
            .map(|p| p.pos)
    }

    /// Every entry in walking order.
    pub fn iter(&self) -> impl Iterator<Item = &PathPoint> + '_ {
        self.points.iter()
    }

    /// Total walking length in world units.
    pub fn length(&self) -> f32 {
        self.length.max(0.0)
    }

    /// Append `segment`, dropping its first point when it repeats this
    /// path's last one.
    pub fn append_segment(&mut self, segment: Path) {
        let mut points = segment.points.into_iter();
        let first = points.next();
        if let Some(first) = first {
            let duplicate = self.points.back().is_some_and(|last| {
                !last.is_portal()
                    && !first.is_portal()
                    && last.grid == first.grid
                    && last.pos.distance(first.pos) <= JUNCTION_EPSILON
            });
            if !duplicate {
                self.push_back(first);
            }
        }
        for p in points {
            self.push_back(p);
        }
    }

    /// Join consecutive segment routes into one.
    pub fn from_segments(segments: impl IntoIterator<Item = Path>) -> Path {
        let mut segments = segments.into_iter();
        let Some(mut path) = segments.next() else {
            return Path::new();
        };
        for seg in segments {
            path.append_segment(seg);
        }
        path
    }

    /// Whether the route never starts or ends with a portal entry and never
    /// holds two in a row.
    pub fn is_well_formed(&self) -> bool {
        if self.peek().is_some_and(PathPoint::is_portal)
            || self.last().is_some_and(PathPoint::is_portal)
        {
            return false;
        }
        !self
            .points
            .iter()
            .zip(self.points.iter().skip(1))
            .any(|(a, b)| a.is_portal() && b.is_portal())
    }
}

impl FromIterator<PathPoint> for Path {
    fn from_iter<I: IntoIterator<Item = PathPoint>>(iter: I) -> Self {
        let mut path = Path::new();
        for p in iter {
            path.push_back(p);
        }
        path
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathPoint;
    type IntoIter = std::collections::vec_deque::Iter<'a, PathPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
