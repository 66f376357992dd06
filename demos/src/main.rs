//! gridroute-demo: route across an ASCII map and draw the result.
//!
//! ```text
//! gridroute-demo [MAP_FILE] [--jps]
//! ```
//!
//! Without a map file a built-in map is used. `S` and `G` in the map mark
//! the start and the goal; both count as open cells. Set `RUST_LOG=debug`
//! to watch the engine.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use gridroute_core::{CellGrid, GridLayer, GridSet, Point, RequesterId, UnitProperties, Vec2};
use gridroute_paths::{EngineContext, EngineSettings, PathEngine, PathRequest, PathResult, SearchKind};
use gridroute_service::{ExecutionMode, PathService, ServiceConfig};

const MAP: &str = "
S.........#.........
..........#.........
....####..#...####..
....#.....#......#..
....#..######....#..
....#............#..
....######...#####..
.............#......
..2222.......#....G.
..2222.......#......
";

struct Scenario {
    grid: CellGrid,
    start: Point,
    goal: Point,
}

fn parse(map: &str) -> Result<Scenario, Box<dyn Error>> {
    let (mut start, mut goal) = (None, None);
    let mut cleaned = String::with_capacity(map.len());
    for (y, line) in map.lines().map(str::trim).filter(|l| !l.is_empty()).enumerate() {
        for (x, ch) in line.chars().enumerate() {
            let p = Point::new(x as i32, y as i32);
            cleaned.push(match ch {
                'S' => {
                    start = Some(p);
                    '.'
                }
                'G' => {
                    goal = Some(p);
                    '.'
                }
                c => c,
            });
        }
        cleaned.push('\n');
    }
    Ok(Scenario {
        grid: CellGrid::from_ascii(&cleaned, 1.0)?,
        start: start.ok_or("map has no start (S)")?,
        goal: goal.ok_or("map has no goal (G)")?,
    })
}

/// Cells crossed by the straight legs of the path.
fn trace(grid: &CellGrid, result: &PathResult) -> Vec<Point> {
    let mut cells = Vec::new();
    let points: Vec<_> = result.path.iter().collect();
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        if a.is_portal() || b.is_portal() || a.grid != b.grid {
            continue;
        }
        let steps = (a.pos.distance(b.pos) * 4.0).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let pos: Vec2 = a.pos.lerp(b.pos, i as f32 / steps as f32);
            if let Some(c) = grid.cell_at(pos) {
                cells.push(c);
            }
        }
    }
    cells
}

fn render(scenario: &Scenario, result: &PathResult) -> String {
    let grid = &scenario.grid;
    let mut rows: Vec<Vec<char>> = (0..grid.height())
        .map(|y| {
            (0..grid.width())
                .map(|x| match grid.cell(Point::new(x, y)) {
                    Some(c) if c.blocked => '#',
                    Some(c) if c.cost > 0 => ',',
                    _ => '.',
                })
                .collect()
        })
        .collect();
    let mut put = |p: Point, ch: char| {
        if let Some(cell) = rows
            .get_mut(p.y as usize)
            .and_then(|row| row.get_mut(p.x as usize))
        {
            *cell = ch;
        }
    };
    for p in trace(grid, result) {
        put(p, '*');
    }
    for pos in result.path.points() {
        if let Some(p) = grid.cell_at(pos) {
            put(p, 'o');
        }
    }
    put(scenario.start, 'S');
    put(scenario.goal, 'G');
    rows.into_iter()
        .map(|r| r.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut map = MAP.to_string();
    let mut search = SearchKind::AStar;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--jps" => search = SearchKind::JumpPoint,
            path => map = std::fs::read_to_string(path)?,
        }
    }
    let scenario = parse(&map)?;
    let from = scenario.grid.position(scenario.start);
    let to = scenario.grid.position(scenario.goal);

    let ctx = EngineContext::new(Arc::new(GridSet::single(scenario.grid.clone())));
    let engine = PathEngine::new(ctx, EngineSettings::default().with_search(search));
    let service = PathService::new(
        engine,
        ServiceConfig::default().with_mode(ExecutionMode::DedicatedThread),
    );

    log::info!("routing {from} -> {to} with {search:?}");
    let request = PathRequest::new(from, to, RequesterId(1), UnitProperties::with_radius(0.3));
    let ticket = service.queue_request(request, 0)?;
    let result = ticket.wait_timeout(Duration::from_secs(30))?;

    println!("{}", render(&scenario, &result));
    println!();
    println!(
        "{:?} with {search:?}: cost {}, length {:.2}, {} waypoints, {} nodes expanded",
        result.status,
        result.cost,
        result.path.length(),
        result.path.count(),
        result.stats.expanded,
    );
    for pos in result.path.points() {
        println!("  ({:.2}, {:.2})", pos.x, pos.y);
    }
    service.dispose();
    Ok(())
}
