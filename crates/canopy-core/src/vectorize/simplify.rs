//! Douglas–Peucker simplification of closed rings.
//!
//! Area bound: a simplified polygon part never differs in area from its
//! pixel-edge original by more than [`MAX_AREA_DRIFT`] of the original. Parts
//! that Douglas–Peucker would push past the bound keep their exact rings, so
//! the geometry of a feature stays within 1% of its `area_ha`.
use super::geometry::{Polygon, Ring};
use crate::raster::Crs;

/// Largest relative area change simplification may introduce per part.
pub const MAX_AREA_DRIFT: f64 = 0.01;

/// Simplify every ring of `part`, falling back to `part` itself when the
/// result drifts more than [`MAX_AREA_DRIFT`] in area.
pub fn simplify_polygon(part: &Polygon, tolerance: f64, crs: &Crs) -> Polygon {
    if tolerance <= 0.0 {
        return part.clone();
    }
    let simplified = Polygon {
        exterior: simplify_ring(&part.exterior, tolerance),
        holes: part.holes.iter().map(|h| simplify_ring(h, tolerance)).collect(),
    };
    let exact = part.area_m2(crs);
    let drift = (simplified.area_m2(crs) - exact).abs();
    if drift > MAX_AREA_DRIFT * exact {
        log::debug!("simplify: area drift {drift:.1} m² over {exact:.1} m², keeping exact rings");
        return part.clone();
    }
    simplified
}

/// Simplify a closed ring with tolerance `tolerance` (CRS units).
///
/// The ring is split at its first vertex and the vertex farthest from it, and
/// each half is simplified independently. A ring that would drop below three
/// distinct vertices is returned unchanged.
pub fn simplify_ring(ring: &Ring, tolerance: f64) -> Ring {
    let pts = ring.points();
    // Four distinct vertices plus the closing one: nothing to drop safely.
    if tolerance <= 0.0 || pts.len() <= 5 {
        return ring.clone();
    }
    let open = &pts[..pts.len() - 1];
    let m = open.len();

    let far = (1..m)
        .max_by(|&a, &b| {
            dist_sq(open[0], open[a])
                .partial_cmp(&dist_sq(open[0], open[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(m / 2);

    let mut keep = vec![false; m];
    keep[0] = true;
    keep[far] = true;

    let first_half: Vec<usize> = (0..=far).collect();
    let second_half: Vec<usize> = (far..m).chain(std::iter::once(0)).collect();
    mark(open, &first_half, tolerance, &mut keep);
    mark(open, &second_half, tolerance, &mut keep);

    let mut out: Vec<[f64; 2]> = open
        .iter()
        .zip(&keep)
        .filter(|&(_, &k)| k)
        .map(|(p, _)| *p)
        .collect();
    if out.len() < 3 {
        return ring.clone();
    }
    out.push(out[0]);
    Ring(out)
}

/// Mark the vertices of the chain `chain` (indices into `points`) that survive
/// simplification. Endpoints are assumed kept.
fn mark(points: &[[f64; 2]], chain: &[usize], tolerance: f64, keep: &mut [bool]) {
    let tol_sq = tolerance * tolerance;
    let mut stack = vec![(0usize, chain.len() - 1)];
    while let Some((s, e)) = stack.pop() {
        if e <= s + 1 {
            continue;
        }
        let (a, b) = (points[chain[s]], points[chain[e]]);
        let mut best = (s, 0.0f64);
        for i in s + 1..e {
            let d = segment_dist_sq(points[chain[i]], a, b);
            if d > best.1 {
                best = (i, d);
            }
        }
        if best.1 > tol_sq {
            keep[chain[best.0]] = true;
            stack.push((s, best.0));
            stack.push((best.0, e));
        }
    }
}

fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn segment_dist_sq(p: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    let abx = b[0] - a[0];
    let aby = b[1] - a[1];
    let len_sq = abx * abx + aby * aby;
    if len_sq <= f64::EPSILON {
        return dist_sq(p, a);
    }
    let t = (((p[0] - a[0]) * abx + (p[1] - a[1]) * aby) / len_sq).clamp(0.0, 1.0);
    dist_sq(p, [a[0] + abx * t, a[1] + aby * t])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rectangle_is_untouched() {
        let r = Ring(vec![[0.0, 0.0], [3.0, 0.0], [3.0, 2.0], [0.0, 2.0], [0.0, 0.0]]);
        assert_eq!(simplify_ring(&r, 10.0), r);
    }

    #[test]
    fn shallow_notch_is_removed() {
        // 300 × 90 rectangle with a one-unit notch in the top edge.
        let r = Ring(vec![
            [0.0, 0.0],
            [300.0, 0.0],
            [300.0, 90.0],
            [160.0, 90.0],
            [160.0, 89.0],
            [150.0, 89.0],
            [150.0, 90.0],
            [0.0, 90.0],
            [0.0, 0.0],
        ]);
        let s = simplify_ring(&r, 5.0);
        assert_eq!(s.points().len(), 5);
        assert_eq!(s.points().first(), s.points().last());
    }

    #[test]
    fn zero_tolerance_is_identity() {
        let r = Ring(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
            [0.0, 0.0],
        ]);
        assert_eq!(simplify_ring(&r, 0.0), r);
    }

    #[test]
    fn part_that_would_lose_too_much_area_keeps_exact_rings() {
        // 300 × 4 strip with a low gable; simplifying it leaves a triangle of
        // half the area.
        let sliver = Polygon {
            exterior: Ring(vec![
                [0.0, 0.0],
                [300.0, 0.0],
                [300.0, 4.0],
                [150.0, 8.0],
                [0.0, 4.0],
                [0.0, 0.0],
            ]),
            holes: Vec::new(),
        };
        let crs = Crs::epsg(32644);
        assert_eq!(simplify_ring(&sliver.exterior, 5.0).points().len(), 4);
        assert_eq!(simplify_polygon(&sliver, 5.0, &crs), sliver);

        let notched = Polygon {
            exterior: Ring(vec![
                [0.0, 0.0],
                [300.0, 0.0],
                [300.0, 90.0],
                [160.0, 90.0],
                [160.0, 89.0],
                [150.0, 89.0],
                [150.0, 90.0],
                [0.0, 90.0],
                [0.0, 0.0],
            ]),
            holes: Vec::new(),
        };
        let s = simplify_polygon(&notched, 5.0, &crs);
        assert_eq!(s.exterior.points().len(), 5);
        let drift = (s.area_m2(&crs) - notched.area_m2(&crs)).abs();
        assert!(drift <= MAX_AREA_DRIFT * notched.area_m2(&crs));
    }
}
