//! Region boundary tracing along pixel edges.
//!
//! Each boundary cell edge becomes a directed unit segment with the region on
//! its right (grid coordinates: x = column, y = row, y grows downward). The
//! segments of one region form closed cycles, followed with a right-turn
//! preference at pinch vertices. A cycle that passes a vertex twice is split
//! there, so every emitted ring is simple: a region that is 8-connected
//! through a corner comes out as parts touching at that corner, and holes
//! meeting diagonally stay separate holes.
use std::collections::HashMap;

use super::regions::RegionLabels;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dir {
    E,
    S,
    W,
    N,
}

impl Dir {
    fn delta(self) -> (i64, i64) {
        match self {
            Dir::E => (1, 0),
            Dir::S => (0, 1),
            Dir::W => (-1, 0),
            Dir::N => (0, -1),
        }
    }

    /// Clockwise on screen (y down).
    fn right(self) -> Dir {
        match self {
            Dir::E => Dir::S,
            Dir::S => Dir::W,
            Dir::W => Dir::N,
            Dir::N => Dir::E,
        }
    }

    fn left(self) -> Dir {
        match self {
            Dir::E => Dir::N,
            Dir::N => Dir::W,
            Dir::W => Dir::S,
            Dir::S => Dir::E,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: GridPoint,
    dir: Dir,
}

impl Segment {
    fn end(&self) -> GridPoint {
        let (dx, dy) = self.dir.delta();
        GridPoint::new(self.start.x + dx, self.start.y + dy)
    }
}

/// One traced part: exterior ring plus holes, grid coordinates, closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GridPolygon {
    pub exterior: Vec<GridPoint>,
    pub holes: Vec<Vec<GridPoint>>,
}

struct TracedRing {
    points: Vec<GridPoint>,
    doubled_area: i64,
    probe: (i64, i64),
}

/// Trace the boundary of region `id` into polygon parts with holes assigned.
pub(crate) fn trace_region(labels: &RegionLabels, id: u32) -> Vec<GridPolygon> {
    let segments = boundary_segments(labels, id);
    let rings = link_rings(&segments);

    let (mut outers, holes): (Vec<TracedRing>, Vec<TracedRing>) =
        rings.into_iter().partition(|r| r.doubled_area > 0);

    let mut parts: Vec<GridPolygon> = outers
        .iter_mut()
        .map(|r| GridPolygon {
            exterior: std::mem::take(&mut r.points),
            holes: Vec::new(),
        })
        .collect();

    for hole in holes {
        let owner = parts
            .iter()
            .zip(outers.iter())
            .enumerate()
            .filter(|(_, (part, _))| contains_doubled(&part.exterior, hole.probe))
            .min_by_key(|(_, (_, outer))| outer.doubled_area)
            .map(|(i, _)| i);
        match owner {
            Some(i) => parts[i].holes.push(hole.points),
            None => log::warn!("region {id}: hole ring without enclosing exterior dropped"),
        }
    }
    parts
}

fn boundary_segments(labels: &RegionLabels, id: u32) -> Vec<Segment> {
    let grid = &labels.labels;
    let (w, h) = (grid.width, grid.height);
    let mut segments = Vec::new();

    for &idx in labels.cells_of(id) {
        let idx = idx as usize;
        let (r, c) = (idx / w, idx % w);
        let (x, y) = (c as i64, r as i64);
        if r == 0 || grid.get(r - 1, c) != id {
            segments.push(Segment { start: GridPoint::new(x, y), dir: Dir::E });
        }
        if c + 1 == w || grid.get(r, c + 1) != id {
            segments.push(Segment { start: GridPoint::new(x + 1, y), dir: Dir::S });
        }
        if r + 1 == h || grid.get(r + 1, c) != id {
            segments.push(Segment { start: GridPoint::new(x + 1, y + 1), dir: Dir::W });
        }
        if c == 0 || grid.get(r, c - 1) != id {
            segments.push(Segment { start: GridPoint::new(x, y + 1), dir: Dir::N });
        }
    }
    segments
}

fn link_rings(segments: &[Segment]) -> Vec<TracedRing> {
    let mut outgoing: HashMap<GridPoint, Vec<usize>> = HashMap::new();
    for (i, s) in segments.iter().enumerate() {
        outgoing.entry(s.start).or_default().push(i);
    }

    let next = |i: usize| -> Option<usize> {
        let heading = segments[i].dir;
        let candidates = outgoing.get(&segments[i].end())?;
        [heading.right(), heading, heading.left()]
            .into_iter()
            .find_map(|d| candidates.iter().copied().find(|&j| segments[j].dir == d))
    };

    let mut used = vec![false; segments.len()];
    let mut rings = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        let mut cycle = Vec::new();
        let mut cur = start;
        loop {
            used[cur] = true;
            cycle.push(cur);
            match next(cur) {
                Some(n) if n != start && !used[n] => cur = n,
                _ => break,
            }
        }

        // Keep only the corners.
        let m = cycle.len();
        let corners: Vec<GridPoint> = (0..m)
            .filter(|&k| segments[cycle[k]].dir != segments[cycle[(k + m - 1) % m]].dir)
            .map(|k| segments[cycle[k]].start)
            .collect();

        for points in split_at_touches(&corners) {
            if points.len() < 5 {
                log::warn!("degenerate boundary ring of {} vertices skipped", points.len());
                continue;
            }
            rings.push(TracedRing {
                doubled_area: doubled_signed_area(&points),
                probe: left_cell_doubled(&points),
                points,
            });
        }
    }
    rings
}

/// Split an open corner cycle into closed simple rings at every vertex it
/// visits more than once.
fn split_at_touches(corners: &[GridPoint]) -> Vec<Vec<GridPoint>> {
    let Some(&first) = corners.first() else {
        return Vec::new();
    };
    let mut stack: Vec<GridPoint> = Vec::with_capacity(corners.len());
    let mut seen: HashMap<GridPoint, usize> = HashMap::new();
    let mut out = Vec::new();

    for &p in corners.iter().chain(std::iter::once(&first)) {
        if let Some(&pos) = seen.get(&p) {
            let mut ring: Vec<GridPoint> = stack.drain(pos..).collect();
            for q in &ring {
                seen.remove(q);
            }
            ring.push(p);
            out.push(ring);
        }
        seen.insert(p, stack.len());
        stack.push(p);
    }
    out
}

/// Centre of the cell left of a ring's first edge, in doubled coordinates so
/// it stays integral: `(2x + 1, 2y + 1)` for cell `(x, y)`. The region is on
/// the right of every edge, so for a hole this cell lies inside the hole.
fn left_cell_doubled(points: &[GridPoint]) -> (i64, i64) {
    let (p0, p1) = (points[0], points[1]);
    let ux = (p1.x - p0.x).signum();
    let uy = (p1.y - p0.y).signum();
    (2 * p0.x + ux + uy, 2 * p0.y + uy - ux)
}

fn doubled_signed_area(points: &[GridPoint]) -> i64 {
    points
        .windows(2)
        .map(|p| p[0].x * p[1].y - p[1].x * p[0].y)
        .sum()
}

/// Even-odd test of a doubled-coordinate cell centre against an axis-aligned
/// ring. Centres have odd coordinates and never lie on a ring edge.
fn contains_doubled(ring: &[GridPoint], (px, py): (i64, i64)) -> bool {
    let mut inside = false;
    for e in ring.windows(2) {
        let (ax, ay) = (2 * e[0].x, 2 * e[0].y);
        let (bx, by) = (2 * e[1].x, 2 * e[1].y);
        if (ay > py) != (by > py) && ax == bx && ax > px {
            inside = !inside;
        }
    }
    inside
}
